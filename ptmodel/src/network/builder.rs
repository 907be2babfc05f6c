// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Ensamblado de la red térmica a partir del modelo de prismas (C7)
//!
//! Para cada prisma se derivan capacidad, inyecciones de potencia y
//! resistencias laterales y verticales a la temperatura inicial dada; los
//! segmentos de hilo aportan su resistencia axial y el calentamiento Joule.
//! El reparto de prismas en rangos contiguos se ejecuta en paralelo y cada
//! tarea escribe en una red parcial que se fusiona al final.

use log::trace;
use rayon::prelude::*;

use epkg::{Layout, MatPropKind};
use geom::{point_segment_distance_sq, FPoint2, FPoint3};

use crate::common::{with_thread_pool, BcType, Orientation, ThermalBoundaryCondition};
use crate::network::ThermalNetwork;
use crate::prism::{PrismModelQuery, PrismThermalModel, VerticalLink};

/// Resumen del ensamblado de la red
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkBuildSummary {
    pub total_nodes: usize,
    pub fixed_t_nodes: usize,
    pub boundary_nodes: usize,
    /// Flujo de calor entrante [W]
    pub i_heat_flow: f64,
    /// Flujo de calor saliente [W]
    pub o_heat_flow: f64,
    /// Calentamiento Joule total [W]
    pub joule_heat: f64,
}

impl NetworkBuildSummary {
    pub(crate) fn accumulate(&mut self, other: &NetworkBuildSummary) {
        self.fixed_t_nodes += other.fixed_t_nodes;
        self.boundary_nodes += other.boundary_nodes;
        self.i_heat_flow += other.i_heat_flow;
        self.o_heat_flow += other.o_heat_flow;
        self.joule_heat += other.joule_heat;
    }
}

/// Constructor de red térmica sobre un modelo de prismas
pub trait ThermalNetworkBuilder {
    fn model(&self) -> &PrismThermalModel;
    fn layout(&self) -> &Layout;
    /// Ensambla la red a las temperaturas iniciales dadas (una por elemento)
    fn build(&self, ini_t: &[f64]) -> (ThermalNetwork, NetworkBuildSummary);
}

/// Ensamblador para modelos de plantilla única
pub struct PrismThermalNetworkBuilder<'a> {
    pub(crate) model: &'a PrismThermalModel,
    pub(crate) layout: &'a Layout,
    pub threads: usize,
}

impl<'a> PrismThermalNetworkBuilder<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout, threads: usize) -> Self {
        Self {
            model,
            layout,
            threads,
        }
    }

    /// Reparte los prismas en `2·hilos` rangos contiguos, ensambla redes
    /// parciales en paralelo y las fusiona en serie
    pub(crate) fn assemble_prisms<F>(
        &self,
        prism_fn: F,
    ) -> (ThermalNetwork, NetworkBuildSummary)
    where
        F: Fn(usize, &mut ThermalNetwork, &mut NetworkBuildSummary) + Sync,
    {
        let size = self.model.total_elements();
        let total = self.model.total_prism_elements();
        let mut network = ThermalNetwork::new(size);
        let mut summary = NetworkBuildSummary::default();

        if self.threads != 1 && total > 1 {
            let partials: Vec<(ThermalNetwork, NetworkBuildSummary)> =
                with_thread_pool(self.threads, || {
                    let blocks = (rayon::current_num_threads() * 2).max(1);
                    let block_size = (total / blocks).max(1);
                    let mut ranges = Vec::new();
                    let mut begin = 0;
                    while begin < total {
                        let end = (begin + block_size).min(total);
                        ranges.push((begin, end));
                        begin = end;
                    }
                    ranges
                        .into_par_iter()
                        .map(|(start, end)| {
                            let mut net = ThermalNetwork::new(size);
                            let mut sum = NetworkBuildSummary::default();
                            for i in start..end {
                                prism_fn(i, &mut net, &mut sum);
                            }
                            (net, sum)
                        })
                        .collect()
                });
            for (net, sum) in partials {
                network.merge(net);
                summary.accumulate(&sum);
            }
        } else {
            for i in 0..total {
                prism_fn(i, &mut network, &mut summary);
            }
        }
        summary.total_nodes = size;
        (network, summary)
    }

    /// Ensambla un prisma: potencia, capacidad, aristas laterales y caras
    /// verticales con su condición de contorno o su vecino único
    pub(crate) fn build_prism_element(
        &self,
        ini_t: &[f64],
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
        i: usize,
    ) {
        let model = self.model;
        let inst = model.get_prism(i);
        let element = model.get_prism_element(inst.layer, inst.element);

        if let Some(lut_id) = element.power_lut_id {
            let power = self.layout.power_luts[lut_id].lookup(ini_t[i], false)
                * element.power_ratio;
            summary.i_heat_flow += power;
            network.add_hf(i, power);
            network.set_scenario(i, element.scen_id);
        }

        let c = self.mat_specific_heat(element.mat_id, ini_t[i]);
        let rho = self.mat_mass_density(element.mat_id, ini_t[i]);
        network.set_c(i, c * rho * self.prism_volume(i));

        let k = self.mat_thermal_conductivity(element.mat_id, ini_t[i]);
        let ct = self.prism_center_2d(i);

        // aristas laterales, estampadas una sola vez con i < vecino
        for ie in 0..3 {
            match inst.neighbors[ie] {
                None => {
                    // condición de contorno lateral pendiente
                }
                Some(nid) if i < nid => {
                    let v_area = self.prism_side_area(i, ie);
                    let nb = model.get_prism(nid);
                    let nb_ele = model.get_prism_element(nb.layer, nb.element);
                    let ct_nb = self.prism_center_2d(nid);
                    let dist = (ct_nb - ct).norm() * model.unit_scale2meter(1);
                    let kxy = 0.5 * (k[0] + k[1]);
                    let dist2edge = self.prism_center_dist2side(i, ie);
                    let r1 = dist2edge / kxy / v_area;
                    let k_nb = self.mat_thermal_conductivity(nb_ele.mat_id, ini_t[nid]);
                    let k_nb_xy = 0.5 * (k_nb[0] + k_nb[1]);
                    let r2 = (dist - dist2edge) / k_nb_xy / v_area;
                    network.set_r(i, nid, r1 + r2);
                }
                _ => {}
            }
        }

        let height = self.prism_height(i);
        let h_area = self.prism_top_bot_area(i);
        // cara superior
        match inst.top {
            VerticalLink::Open => {
                if let Some(bc) = model.uniform_bc(Orientation::Top) {
                    self.stamp_face_bc(network, summary, i, bc, h_area, 1.0);
                }
            }
            VerticalLink::Element(n_top) => {
                if i < n_top {
                    let nb = model.get_prism(n_top);
                    let nb_ele = model.get_prism_element(nb.layer, nb.element);
                    let h_nb = self.prism_height(n_top);
                    let k_nb = self.mat_thermal_conductivity(nb_ele.mat_id, ini_t[n_top]);
                    let r = (0.5 * height / k[2] + 0.5 * h_nb / k_nb[2]) / h_area;
                    network.set_r(i, n_top, r);
                }
            }
            VerticalLink::Contacts => {
                debug_assert!(false, "contactos fraccionales en el ensamblador base");
            }
        }
        // cara inferior
        match inst.bot {
            VerticalLink::Open => {
                if let Some(bc) = model.uniform_bc(Orientation::Bot) {
                    self.stamp_face_bc(network, summary, i, bc, h_area, 1.0);
                }
            }
            VerticalLink::Element(n_bot) => {
                if i < n_bot {
                    let nb = model.get_prism(n_bot);
                    let nb_ele = model.get_prism_element(nb.layer, nb.element);
                    let h_nb = self.prism_height(n_bot);
                    let k_nb = self.mat_thermal_conductivity(nb_ele.mat_id, ini_t[n_bot]);
                    let r = (0.5 * height / k[2] + 0.5 * h_nb / k_nb[2]) / h_area;
                    network.set_r(i, n_bot, r);
                }
            }
            VerticalLink::Contacts => {
                debug_assert!(false, "contactos fraccionales en el ensamblador base");
            }
        }
    }

    /// Estampa una condición de contorno sobre la fracción `ratio` de una cara
    ///
    /// Una temperatura impuesta no admite exposición parcial: con `ratio < 1`
    /// solo se estampan película y flujo
    pub(crate) fn stamp_face_bc(
        &self,
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
        i: usize,
        bc: &ThermalBoundaryCondition,
        area: f64,
        ratio: f64,
    ) {
        if !bc.is_valid() {
            return;
        }
        match bc.bc_type {
            BcType::Htc => {
                network.add_htc(i, bc.value * area * ratio);
                summary.boundary_nodes += 1;
            }
            BcType::HeatFlux => {
                let heat_flow = bc.value * area * ratio;
                network.add_hf(i, heat_flow);
                if heat_flow > 0.0 {
                    summary.i_heat_flow += heat_flow;
                } else {
                    summary.o_heat_flow += heat_flow;
                }
            }
            BcType::Temperature => {
                if ratio >= 1.0 {
                    network.set_t(i, bc.value);
                    summary.fixed_t_nodes += 1;
                }
            }
        }
    }

    /// Resistencias y Joule de los segmentos de hilo
    pub(crate) fn build_line_elements(
        &self,
        ini_t: &[f64],
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
    ) {
        let model = self.model;
        for local in 0..model.total_line_elements() {
            let line = model.get_line_element(local);
            let index = line.id;
            let rho = self.mat_mass_density(line.mat_id, ini_t[index]);
            let c = self.mat_specific_heat(line.mat_id, ini_t[index]);
            network.set_c(index, c * rho * self.line_volume(index));
            network.set_scenario(index, line.scen_id);

            let joule = self.line_joule_heat(index, ini_t[index]);
            if joule > 0.0 {
                network.add_hf(index, joule);
                summary.i_heat_flow += joule;
                summary.joule_heat += joule;
            }

            let k = self.mat_thermal_conductivity(line.mat_id, ini_t[index]);
            let ave_k = (k[0] + k[1] + k[2]) / 3.0;
            let area = self.line_area(index);
            let len = self.line_length(index);

            let mut stamp_neighbor = |nb: usize, network: &mut ThermalNetwork| {
                if model.is_prism(nb) {
                    network.set_r(nb, index, 0.5 * len / ave_k / area);
                } else if index < nb {
                    let line_nb = model.get_line_element(model.line_local_index(nb));
                    let k_nb = self.mat_thermal_conductivity(line_nb.mat_id, ini_t[nb]);
                    let ave_k_nb = (k_nb[0] + k_nb[1] + k_nb[2]) / 3.0;
                    let area_nb = self.line_area(nb);
                    let len_nb = self.line_length(nb);
                    let r = 0.5 * len / ave_k / area + 0.5 * len_nb / ave_k_nb / area_nb;
                    network.set_r(index, nb, r);
                }
            };
            for nb in &line.neighbors[0] {
                stamp_neighbor(*nb, network);
            }
            for nb in &line.neighbors[1] {
                stamp_neighbor(*nb, network);
            }
        }
    }

    /// Condiciones de contorno por bloque: actúan sobre los prismas cuyo
    /// baricentro cae en la caja y cuya cara correspondiente está expuesta
    pub(crate) fn apply_block_bcs(
        &self,
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
    ) {
        let model = self.model;
        let top = model.block_bcs(Orientation::Top);
        let bot = model.block_bcs(Orientation::Bot);
        if top.is_empty() && bot.is_empty() {
            return;
        }
        let query = PrismModelQuery::new(model);
        for (ori, blocks) in [(Orientation::Top, top), (Orientation::Bot, bot)].iter() {
            for (bbox, bc) in blocks.iter() {
                if !bc.is_valid() {
                    continue;
                }
                for layer in 0..model.total_layers() {
                    for gid in query.search_prisms(layer, bbox) {
                        let inst = model.get_prism(gid);
                        if inst.vertical_link(*ori) != VerticalLink::Open {
                            continue;
                        }
                        let area = self.prism_top_bot_area(gid);
                        self.stamp_face_bc(network, summary, gid, bc, area, 1.0);
                    }
                }
            }
        }
    }

    // --- propiedades de material (§7: la ausencia es un error de importación) ---

    pub(crate) fn mat_thermal_conductivity(&self, mat_id: Option<usize>, ref_t: f64) -> [f64; 3] {
        let mat = self
            .layout
            .materials
            .get(mat_id.expect("elemento sin material"))
            .expect("material desconocido");
        let prop = mat
            .property(MatPropKind::ThermalConductivity)
            .expect("material sin conductividad térmica");
        let mut result = [0.0; 3];
        for (axis, value) in result.iter_mut().enumerate() {
            *value = prop
                .anisotropic_property(ref_t, axis)
                .expect("conductividad térmica no evaluable");
        }
        result
    }

    pub(crate) fn mat_mass_density(&self, mat_id: Option<usize>, ref_t: f64) -> f64 {
        let mat = self
            .layout
            .materials
            .get(mat_id.expect("elemento sin material"))
            .expect("material desconocido");
        mat.property(MatPropKind::MassDensity)
            .expect("material sin densidad")
            .simple_property(ref_t)
            .expect("densidad no evaluable")
    }

    pub(crate) fn mat_specific_heat(&self, mat_id: Option<usize>, ref_t: f64) -> f64 {
        let mat = self
            .layout
            .materials
            .get(mat_id.expect("elemento sin material"))
            .expect("material desconocido");
        mat.property(MatPropKind::SpecificHeat)
            .expect("material sin calor específico")
            .simple_property(ref_t)
            .expect("calor específico no evaluable")
    }

    pub(crate) fn mat_resistivity(&self, mat_id: Option<usize>, ref_t: f64) -> f64 {
        let mat = self
            .layout
            .materials
            .get(mat_id.expect("elemento sin material"))
            .expect("material desconocido");
        mat.property(MatPropKind::Resistivity)
            .expect("material sin resistividad")
            .simple_property(ref_t)
            .expect("resistividad no evaluable")
    }

    // --- geometría de prismas, en unidades del SI ---

    pub(crate) fn prism_vertex_point_2d(&self, idx: usize, iv: usize) -> FPoint2 {
        let p = &self.model.points[self.model.get_prism(idx).vertices[iv]];
        FPoint2::new(p.x, p.y)
    }

    pub(crate) fn prism_center_2d(&self, idx: usize) -> FPoint2 {
        let p0 = self.prism_vertex_point_2d(idx, 0);
        let p1 = self.prism_vertex_point_2d(idx, 1);
        let p2 = self.prism_vertex_point_2d(idx, 2);
        FPoint2::new((p0.x + p1.x + p2.x) / 3.0, (p0.y + p1.y + p2.y) / 3.0)
    }

    pub(crate) fn prism_center_dist2side(&self, idx: usize, ie: usize) -> f64 {
        let ct = self.prism_center_2d(idx);
        let p1 = self.prism_vertex_point_2d(idx, ie % 3);
        let p2 = self.prism_vertex_point_2d(idx, (ie + 1) % 3);
        point_segment_distance_sq(&ct, &p1, &p2).sqrt() * self.model.unit_scale2meter(1)
    }

    pub(crate) fn prism_edge_length(&self, idx: usize, ie: usize) -> f64 {
        let p1 = self.prism_vertex_point_2d(idx, ie % 3);
        let p2 = self.prism_vertex_point_2d(idx, (ie + 1) % 3);
        (p2 - p1).norm() * self.model.unit_scale2meter(1)
    }

    pub(crate) fn prism_side_area(&self, idx: usize, ie: usize) -> f64 {
        self.prism_height(idx) * self.prism_edge_length(idx, ie)
    }

    pub(crate) fn prism_top_bot_area(&self, idx: usize) -> f64 {
        let p0 = self.prism_vertex_point_2d(idx, 0);
        let p1 = self.prism_vertex_point_2d(idx, 1);
        let p2 = self.prism_vertex_point_2d(idx, 2);
        geom::triangle_area(&[p0, p1, p2]) * self.model.unit_scale2meter(2)
    }

    pub(crate) fn prism_volume(&self, idx: usize) -> f64 {
        self.prism_top_bot_area(idx) * self.prism_height(idx)
    }

    pub(crate) fn prism_height(&self, idx: usize) -> f64 {
        let layer = self.model.get_prism(idx).layer;
        self.model.get_layer(layer).thickness * self.model.unit_scale2meter(1)
    }

    // --- geometría de segmentos de hilo ---

    pub(crate) fn line_joule_heat(&self, idx: usize, ref_t: f64) -> f64 {
        let line = self.model.get_line_element(self.model.line_local_index(idx));
        if line.current == 0.0 {
            return 0.0;
        }
        let rho = self.mat_resistivity(line.mat_id, ref_t);
        rho * self.line_length(idx) * line.current * line.current / self.line_area(idx)
    }

    pub(crate) fn line_volume(&self, idx: usize) -> f64 {
        self.line_area(idx) * self.line_length(idx)
    }

    pub(crate) fn line_length(&self, idx: usize) -> f64 {
        let line = self.model.get_line_element(self.model.line_local_index(idx));
        let p1: &FPoint3 = self.model.get_point(line.end_pts[0]);
        let p2: &FPoint3 = self.model.get_point(line.end_pts[1]);
        (p2 - p1).norm() * self.model.unit_scale2meter(1)
    }

    pub(crate) fn line_area(&self, idx: usize) -> f64 {
        let line = self.model.get_line_element(self.model.line_local_index(idx));
        std::f64::consts::PI * (line.radius * self.model.unit_scale2meter(1)).powi(2)
    }
}

impl<'a> ThermalNetworkBuilder for PrismThermalNetworkBuilder<'a> {
    fn model(&self) -> &PrismThermalModel {
        self.model
    }

    fn layout(&self) -> &Layout {
        self.layout
    }

    fn build(&self, ini_t: &[f64]) -> (ThermalNetwork, NetworkBuildSummary) {
        assert_eq!(self.model.total_elements(), ini_t.len());
        let (mut network, mut summary) = self.assemble_prisms(|i, net, sum| {
            self.build_prism_element(ini_t, net, sum, i);
        });
        self.build_line_elements(ini_t, &mut network, &mut summary);
        self.apply_block_bcs(&mut network, &mut summary);
        network.build_index_map();
        trace!(
            "red ensamblada: {} nodos, {} incógnitas, {} fuentes",
            network.node_size(),
            network.matrix_size(),
            network.source_size()
        );
        (network, summary)
    }
}
