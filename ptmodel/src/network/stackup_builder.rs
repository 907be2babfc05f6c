// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Ensamblado de red para la variante de apilado (C7)
//!
//! Difiere del ensamblador base en las caras verticales: cada contacto
//! fraccional aporta su resistencia sobre la fracción de área compartida y la
//! fracción no cubierta queda expuesta a la condición de contorno uniforme.

use log::trace;

use epkg::Layout;

use crate::common::{BcType, Orientation};
use crate::network::builder::{
    NetworkBuildSummary, PrismThermalNetworkBuilder, ThermalNetworkBuilder,
};
use crate::network::ThermalNetwork;
use crate::prism::{Contact, PrismModelQuery, PrismThermalModel, VerticalLink, BOT, TOP};

/// Ensamblador para modelos de apilado con contactos fraccionales
pub struct PrismStackupThermalNetworkBuilder<'a> {
    inner: PrismThermalNetworkBuilder<'a>,
}

impl<'a> PrismStackupThermalNetworkBuilder<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout, threads: usize) -> Self {
        Self {
            inner: PrismThermalNetworkBuilder::new(model, layout, threads),
        }
    }

    /// Resistencias de los contactos de una cara; devuelve la fracción de
    /// área que queda sin cubrir
    ///
    /// Cada pareja se estampa una sola vez (la posee el prisma de índice
    /// menor); la fracción descontada es la propia aunque la pareja se salte
    fn stamp_contacts(
        &self,
        ini_t: &[f64],
        network: &mut ThermalNetwork,
        i: usize,
        contacts: &[Contact],
        height: f64,
        h_area: f64,
        kz: f64,
    ) -> f64 {
        let model = self.inner.model;
        let mut ratio = 1.0;
        for contact in contacts {
            debug_assert!(contact.ratio > 0.0);
            ratio -= contact.ratio;
            if contact.id < i {
                continue;
            }
            let nb = model.get_prism(contact.id);
            let nb_ele = model.get_prism_element(nb.layer, nb.element);
            let h_nb = self.inner.prism_height(contact.id);
            let k_nb = self
                .inner
                .mat_thermal_conductivity(nb_ele.mat_id, ini_t[contact.id]);
            let area = h_area * contact.ratio;
            let r = (0.5 * height / kz + 0.5 * h_nb / k_nb[2]) / area;
            network.set_r(i, contact.id, r);
        }
        ratio.max(0.0)
    }

    /// Versión con contactos del ensamblado por prisma
    fn build_prism_element(
        &self,
        ini_t: &[f64],
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
        i: usize,
    ) {
        let model = self.inner.model;
        let inst = model.get_prism(i);
        let element = model.get_prism_element(inst.layer, inst.element);

        if let Some(lut_id) = element.power_lut_id {
            let power = self.inner.layout.power_luts[lut_id].lookup(ini_t[i], false)
                * element.power_ratio;
            summary.i_heat_flow += power;
            network.add_hf(i, power);
            network.set_scenario(i, element.scen_id);
        }

        let c = self.inner.mat_specific_heat(element.mat_id, ini_t[i]);
        let rho = self.inner.mat_mass_density(element.mat_id, ini_t[i]);
        network.set_c(i, c * rho * self.inner.prism_volume(i));

        let k = self.inner.mat_thermal_conductivity(element.mat_id, ini_t[i]);
        let ct = self.inner.prism_center_2d(i);

        for ie in 0..3 {
            match inst.neighbors[ie] {
                None => {}
                Some(nid) if i < nid => {
                    let v_area = self.inner.prism_side_area(i, ie);
                    let nb = model.get_prism(nid);
                    let nb_ele = model.get_prism_element(nb.layer, nb.element);
                    let ct_nb = self.inner.prism_center_2d(nid);
                    let dist = (ct_nb - ct).norm() * model.unit_scale2meter(1);
                    let kxy = 0.5 * (k[0] + k[1]);
                    let dist2edge = self.inner.prism_center_dist2side(i, ie);
                    let r1 = dist2edge / kxy / v_area;
                    let k_nb = self.inner.mat_thermal_conductivity(nb_ele.mat_id, ini_t[nid]);
                    let r2 = (dist - dist2edge) / (0.5 * (k_nb[0] + k_nb[1])) / v_area;
                    network.set_r(i, nid, r1 + r2);
                }
                _ => {}
            }
        }

        let height = self.inner.prism_height(i);
        let h_area = self.inner.prism_top_bot_area(i);
        // cara superior
        match inst.top {
            VerticalLink::Open => {
                if let Some(bc) = model.uniform_bc(Orientation::Top) {
                    self.inner.stamp_face_bc(network, summary, i, bc, h_area, 1.0);
                }
            }
            VerticalLink::Contacts => {
                let exposed = self.stamp_contacts(
                    ini_t,
                    network,
                    i,
                    &inst.contacts[TOP],
                    height,
                    h_area,
                    k[2],
                );
                if exposed > 0.0 {
                    if let Some(bc) = model.uniform_bc(Orientation::Top) {
                        if bc.bc_type != BcType::Temperature {
                            self.inner
                                .stamp_face_bc(network, summary, i, bc, h_area, exposed);
                        }
                    }
                }
            }
            VerticalLink::Element(_) => {
                debug_assert!(false, "vecino único en la variante de apilado");
            }
        }
        // cara inferior
        match inst.bot {
            VerticalLink::Open => {
                if let Some(bc) = model.uniform_bc(Orientation::Bot) {
                    self.inner.stamp_face_bc(network, summary, i, bc, h_area, 1.0);
                }
            }
            VerticalLink::Contacts => {
                let exposed = self.stamp_contacts(
                    ini_t,
                    network,
                    i,
                    &inst.contacts[BOT],
                    height,
                    h_area,
                    k[2],
                );
                if exposed > 0.0 {
                    if let Some(bc) = model.uniform_bc(Orientation::Bot) {
                        if bc.bc_type != BcType::Temperature {
                            self.inner
                                .stamp_face_bc(network, summary, i, bc, h_area, exposed);
                        }
                    }
                }
            }
            VerticalLink::Element(_) => {
                debug_assert!(false, "vecino único en la variante de apilado");
            }
        }
    }

    /// Condiciones por bloque; el flujo de calor del bloque se normaliza por
    /// su área, de modo que el valor se interpreta como potencia total [W]
    fn apply_block_bcs(
        &self,
        network: &mut ThermalNetwork,
        summary: &mut NetworkBuildSummary,
    ) {
        let model = self.inner.model;
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
                let mut bc = *bc;
                if bc.bc_type == BcType::HeatFlux {
                    let block_area = bbox.area() * model.coord_scale2meter(2);
                    if block_area > 0.0 {
                        bc.value /= block_area;
                    }
                }
                for layer in 0..model.total_layers() {
                    for gid in query.search_prisms(layer, bbox) {
                        let inst = model.get_prism(gid);
                        if inst.vertical_link(*ori) != VerticalLink::Open {
                            continue;
                        }
                        let area = self.inner.prism_top_bot_area(gid);
                        self.inner.stamp_face_bc(network, summary, gid, &bc, area, 1.0);
                    }
                }
            }
        }
    }
}

impl<'a> ThermalNetworkBuilder for PrismStackupThermalNetworkBuilder<'a> {
    fn model(&self) -> &PrismThermalModel {
        self.inner.model
    }

    fn layout(&self) -> &Layout {
        self.inner.layout
    }

    fn build(&self, ini_t: &[f64]) -> (ThermalNetwork, NetworkBuildSummary) {
        assert_eq!(self.inner.model.total_elements(), ini_t.len());
        let (mut network, mut summary) = self.inner.assemble_prisms(|i, net, sum| {
            self.build_prism_element(ini_t, net, sum, i);
        });
        self.inner
            .build_line_elements(ini_t, &mut network, &mut summary);
        self.apply_block_bcs(&mut network, &mut summary);
        network.build_index_map();
        trace!(
            "red de apilado ensamblada: {} nodos, {} incógnitas, {} fuentes",
            network.node_size(),
            network.matrix_size(),
            network.source_size()
        );
        (network, summary)
    }
}
