// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Modelo térmico volumétrico de prismas (C4)
//!
//! Grafo de elementos prismáticos triangulares por capa más segmentos de hilo
//! tratados como resistencias 1D. Las referencias entre elementos son siempre
//! índices; las triangulaciones compartidas viven en una tabla propia del
//! modelo y cada capa guarda el índice de su plantilla.

mod builder;
mod query;
mod stackup_builder;

pub use builder::{create_prism_thermal_model, create_thermal_model, PrismThermalModelBuilder};
pub use query::PrismModelQuery;
pub use stackup_builder::{create_prism_stackup_thermal_model, PrismStackupThermalModelBuilder};

use std::collections::HashMap;

use anyhow::Error;
use log::warn;
use serde::{Deserialize, Serialize};

use geom::{Box2, FPoint3, Point2};

use crate::common::{Orientation, PrismModelExtractionSettings, ThermalBoundaryCondition};
use crate::mesh::PrismTemplate;
use crate::stackup::LayerStackupModel;

/// Índice de la cara superior en las tablas por orientación
pub const TOP: usize = 0;
/// Índice de la cara inferior en las tablas por orientación
pub const BOT: usize = 1;

/// Enlace vertical de un prisma con la capa adyacente
///
/// La variante de apilado usa `Contacts` en lugar de autorreferencias; la
/// convención queda así en el tipo y no se infiere durante el estampado
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalLink {
    /// Cara expuesta a la condición de contorno
    Open,
    /// Vecino único con la misma plantilla (índice global)
    Element(usize),
    /// Vecindad por fracciones de área en la lista de contactos
    Contacts,
}

/// Contacto parcial con un prisma de la capa adyacente
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Índice global del otro prisma
    pub id: usize,
    /// Fracción de la cara propia cubierta por el contacto
    pub ratio: f64,
}

/// Elemento prismático local a su capa
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismElement {
    pub id: usize,
    pub net_id: Option<usize>,
    pub mat_id: Option<usize>,
    pub scen_id: Option<usize>,
    /// Índice del triángulo en la plantilla de la capa
    pub template_id: usize,
    pub power_lut_id: Option<usize>,
    pub power_ratio: f64,
    /// Vecinos del mismo nivel (índices locales), por arista del triángulo
    pub neighbors: [Option<usize>; 3],
    /// Vecino superior/inferior (índice local de la capa adyacente);
    /// solo en la variante de plantilla única
    pub top: Option<usize>,
    pub bot: Option<usize>,
}

impl PrismElement {
    fn new(id: usize, template_id: usize) -> Self {
        Self {
            id,
            net_id: None,
            mat_id: None,
            scen_id: None,
            template_id,
            power_lut_id: None,
            power_ratio: 0.0,
            neighbors: [None; 3],
            top: None,
            bot: None,
        }
    }
}

/// Capa de prismas con su cota y espesor en unidades de usuario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismLayer {
    pub id: usize,
    pub elevation: f64,
    pub thickness: f64,
    pub elements: Vec<PrismElement>,
}

impl PrismLayer {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            elevation: 0.0,
            thickness: 0.0,
            elements: Vec::new(),
        }
    }

    /// Añade un elemento con la plantilla dada y devuelve su índice local
    pub fn add_element(&mut self, template_id: usize) -> &mut PrismElement {
        let id = self.elements.len();
        self.elements.push(PrismElement::new(id, template_id));
        self.elements.last_mut().unwrap()
    }

    pub fn total_elements(&self) -> usize {
        self.elements.len()
    }
}

/// Instancia global de prisma con sus vértices y vecindad resuelta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismInstance {
    pub layer: usize,
    pub element: usize,
    /// Índices de punto [superiores 0..3, inferiores 3..6]
    pub vertices: [usize; 6],
    /// Vecinos del mismo nivel (índices globales), por arista
    pub neighbors: [Option<usize>; 3],
    pub top: VerticalLink,
    pub bot: VerticalLink,
    /// Contactos fraccionales [top, bot]; solo en la variante de apilado
    pub contacts: [Vec<Contact>; 2],
}

impl PrismInstance {
    fn new(layer: usize, element: usize) -> Self {
        Self {
            layer,
            element,
            vertices: [0; 6],
            neighbors: [None; 3],
            top: VerticalLink::Open,
            bot: VerticalLink::Open,
            contacts: [Vec::new(), Vec::new()],
        }
    }

    /// Enlace vertical por orientación
    pub fn vertical_link(&self, ori: Orientation) -> VerticalLink {
        match ori {
            Orientation::Top => self.top,
            Orientation::Bot => self.bot,
        }
    }
}

/// Segmento cilíndrico de hilo de soldadura como elemento 1D
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineElement {
    /// Índice global (tras todos los prismas)
    pub id: usize,
    pub net_id: Option<usize>,
    pub mat_id: Option<usize>,
    pub scen_id: Option<usize>,
    /// Radio en unidades de usuario
    pub radius: f64,
    /// Corriente [A]
    pub current: f64,
    /// Índices de punto de los extremos
    pub end_pts: [usize; 2],
    /// Vecinos globales por extremo (prismas o segmentos encadenados)
    pub neighbors: [Vec<usize>; 2],
}

/// Modelo térmico de prismas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismThermalModel {
    pub(crate) scale_h2unit: f64,
    pub(crate) scale2meter: f64,
    pub(crate) settings: PrismModelExtractionSettings,
    pub(crate) points: Vec<FPoint3>,
    pub(crate) lines: Vec<LineElement>,
    pub(crate) prisms: Vec<PrismInstance>,
    pub(crate) index_offset: Vec<usize>,
    pub(crate) uniform_bcs: [Option<ThermalBoundaryCondition>; 2],
    pub(crate) block_bcs: [Vec<(Box2, ThermalBoundaryCondition)>; 2],
    /// Tabla de triangulaciones únicas
    pub(crate) templates: Vec<PrismTemplate>,
    /// Índice de plantilla de cada capa
    pub(crate) layer_templates: Vec<usize>,
    pub(crate) layers: Vec<PrismLayer>,
}

impl PrismThermalModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // --- capas y plantillas ---

    pub fn append_layer(&mut self, layer: PrismLayer) -> &mut PrismLayer {
        self.layers.push(layer);
        self.layers.last_mut().unwrap()
    }

    pub(crate) fn add_template(&mut self, template: PrismTemplate) -> usize {
        self.templates.push(template);
        self.templates.len() - 1
    }

    pub(crate) fn set_layer_template(&mut self, layer: usize, template_idx: usize) {
        if self.layer_templates.len() <= layer {
            self.layer_templates.resize(layer + 1, 0);
        }
        self.layer_templates[layer] = template_idx;
    }

    /// Plantilla de triangulación de una capa
    pub fn layer_template(&self, layer: usize) -> &PrismTemplate {
        &self.templates[self.layer_templates[layer]]
    }

    /// Índice en la tabla de plantillas de la capa; capas con la misma
    /// geometría comparten índice
    pub fn layer_template_index(&self, layer: usize) -> usize {
        self.layer_templates[layer]
    }

    pub fn get_layer(&self, layer: usize) -> &PrismLayer {
        &self.layers[layer]
    }

    pub fn layers(&self) -> &[PrismLayer] {
        &self.layers
    }

    // --- condiciones de contorno ---

    pub fn set_uniform_bc(&mut self, ori: Orientation, bc: ThermalBoundaryCondition) {
        self.uniform_bcs[ori.index()] = Some(bc);
    }

    pub fn uniform_bc(&self, ori: Orientation) -> Option<&ThermalBoundaryCondition> {
        self.uniform_bcs[ori.index()].as_ref()
    }

    pub fn add_block_bc(&mut self, ori: Orientation, bbox: Box2, bc: ThermalBoundaryCondition) {
        self.block_bcs[ori.index()].push((bbox, bc));
    }

    pub fn block_bcs(&self, ori: Orientation) -> &[(Box2, ThermalBoundaryCondition)] {
        &self.block_bcs[ori.index()]
    }

    // --- índices ---

    pub fn total_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn total_elements(&self) -> usize {
        self.total_prism_elements() + self.total_line_elements()
    }

    pub fn total_prism_elements(&self) -> usize {
        self.prisms.len()
    }

    pub fn total_line_elements(&self) -> usize {
        self.lines.len()
    }

    /// Índice global a partir de capa e índice local
    #[inline]
    pub fn global_index(&self, layer: usize, element: usize) -> usize {
        self.index_offset[layer] + element
    }

    /// Capa e índice local a partir del índice global de prisma
    pub fn prism_local_index(&self, global_index: usize) -> (usize, usize) {
        let mut layer = 0;
        while !(self.index_offset[layer] <= global_index
            && global_index < self.index_offset[layer + 1])
        {
            layer += 1;
        }
        (layer, global_index - self.index_offset[layer])
    }

    /// Índice local de un segmento a partir de su índice global
    pub fn line_local_index(&self, global_index: usize) -> usize {
        debug_assert!(global_index >= self.total_prism_elements());
        global_index - self.total_prism_elements()
    }

    pub fn is_prism(&self, index: usize) -> bool {
        index < self.total_prism_elements()
    }

    pub fn is_top_layer(&self, layer: usize) -> bool {
        layer == 0
    }

    pub fn is_bot_layer(&self, layer: usize) -> bool {
        layer + 1 == self.total_layers()
    }

    // --- geometría ---

    pub fn points(&self) -> &[FPoint3] {
        &self.points
    }

    pub fn get_point(&self, idx: usize) -> &FPoint3 {
        &self.points[idx]
    }

    pub fn get_prism(&self, idx: usize) -> &PrismInstance {
        &self.prisms[idx]
    }

    pub fn prisms(&self) -> &[PrismInstance] {
        &self.prisms
    }

    pub fn get_prism_element(&self, layer: usize, element: usize) -> &PrismElement {
        &self.layers[layer].elements[element]
    }

    pub fn get_line_element(&self, local_idx: usize) -> &LineElement {
        &self.lines[local_idx]
    }

    pub fn lines(&self) -> &[LineElement] {
        &self.lines
    }

    /// Unidades de usuario por coordenada de retícula
    pub fn scale_h2unit(&self) -> f64 {
        self.scale_h2unit
    }

    /// Potencia de la escala unidad → metro
    pub fn unit_scale2meter(&self, order: i32) -> f64 {
        self.scale2meter.powi(order)
    }

    /// Potencia de la escala coordenada → metro
    pub fn coord_scale2meter(&self, order: i32) -> f64 {
        (self.scale_h2unit * self.scale2meter).powi(order)
    }

    pub(crate) fn add_point(&mut self, point: FPoint3) -> usize {
        self.points.push(point);
        self.points.len() - 1
    }

    /// Posición 3D de un vértice de plantilla: xy escaladas a unidades y
    /// z en la cota superior o inferior de la capa
    fn template_point(&self, layer: usize, template_id: usize, vtx: usize, top: bool) -> FPoint3 {
        let template = self.layer_template(layer);
        let pt2d = &template.points[template.triangles[template_id].vertices[vtx]];
        let height = if top {
            self.layers[layer].elevation
        } else if self.is_bot_layer(layer) {
            self.layers[layer].elevation - self.layers[layer].thickness
        } else {
            self.layers[layer + 1].elevation
        };
        FPoint3::new(
            pt2d.x as f64 * self.scale_h2unit,
            pt2d.y as f64 * self.scale_h2unit,
            height,
        )
    }

    /// Capa cuyo rango vertical contiene la altura dada (unidades de usuario)
    pub fn nearest_layer(&self, height: f64) -> usize {
        if self.layers.is_empty() {
            return 0;
        }
        if height >= self.layers[0].elevation {
            return 0;
        }
        for (i, layer) in self.layers.iter().enumerate() {
            let top = layer.elevation;
            let bot = top - layer.thickness;
            if height >= bot && height < top {
                return i;
            }
        }
        self.layers.len() - 1
    }

    // --- construcción ---

    /// Instancia los prismas: reparte los desplazamientos por capa, crea los
    /// vértices (con deduplicación entre capas de plantilla compartida si
    /// `dedup_points`) y resuelve la vecindad en índices globales
    pub(crate) fn build_prism_model(
        &mut self,
        scale_h2unit: f64,
        scale2meter: f64,
        dedup_points: bool,
    ) {
        self.scale_h2unit = scale_h2unit;
        self.scale2meter = scale2meter;
        self.index_offset = vec![0];
        for layer in &self.layers {
            let last = *self.index_offset.last().unwrap();
            self.index_offset.push(last + layer.total_elements());
        }

        let total = *self.index_offset.last().unwrap();
        self.points.clear();
        self.prisms.clear();
        self.prisms.reserve(total);

        // (interfaz entre capas, vértice de plantilla) → índice de punto
        let mut iface_points: HashMap<(usize, usize), usize> = HashMap::new();

        for gid in 0..total {
            let (lyr, eid) = self.prism_local_index(gid);
            let element = &self.layers[lyr].elements[eid];
            let template_id = element.template_id;
            let (nb_local, top_local, bot_local) =
                (element.neighbors, element.top, element.bot);
            let tri_vertices = self.layer_template(lyr).triangles[template_id].vertices;

            let mut inst = PrismInstance::new(lyr, eid);
            for v in 0..3 {
                let top_pt = self.template_point(lyr, template_id, v, true);
                let bot_pt = self.template_point(lyr, template_id, v, false);
                if dedup_points {
                    let top_key = (lyr, tri_vertices[v]);
                    inst.vertices[v] = match iface_points.get(&top_key) {
                        Some(&idx) => idx,
                        None => {
                            let idx = self.add_point(top_pt);
                            iface_points.insert(top_key, idx);
                            idx
                        }
                    };
                    let bot_key = (lyr + 1, tri_vertices[v]);
                    inst.vertices[v + 3] = match iface_points.get(&bot_key) {
                        Some(&idx) => idx,
                        None => {
                            let idx = self.add_point(bot_pt);
                            iface_points.insert(bot_key, idx);
                            idx
                        }
                    };
                } else {
                    inst.vertices[v] = self.add_point(top_pt);
                    inst.vertices[v + 3] = self.add_point(bot_pt);
                }
            }

            for (n, nb) in nb_local.iter().enumerate() {
                if let Some(nid) = nb {
                    inst.neighbors[n] = Some(self.global_index(lyr, *nid));
                }
            }
            if let Some(nid) = top_local {
                inst.top = VerticalLink::Element(self.global_index(lyr - 1, nid));
            }
            if let Some(nid) = bot_local {
                inst.bot = VerticalLink::Element(self.global_index(lyr + 1, nid));
            }
            self.prisms.push(inst);
        }
    }

    /// Añade un segmento de hilo; los extremos crean puntos propios
    pub(crate) fn add_line_element(
        &mut self,
        start: FPoint3,
        end: FPoint3,
        net_id: Option<usize>,
        mat_id: Option<usize>,
        radius: f64,
        current: f64,
        scen_id: Option<usize>,
    ) -> usize {
        assert!(
            self.total_prism_elements() > 0,
            "los segmentos se añaden tras instanciar los prismas"
        );
        let p0 = self.add_point(start);
        let p1 = self.add_point(end);
        let local = self.lines.len();
        self.lines.push(LineElement {
            id: self.total_prism_elements() + local,
            net_id,
            mat_id,
            scen_id,
            radius,
            current,
            end_pts: [p0, p1],
            neighbors: [Vec::new(), Vec::new()],
        });
        local
    }

    /// Convierte los hilos del modelo de apilado en cadenas de segmentos
    ///
    /// Los segmentos consecutivos se encadenan por sus extremos; el primero y
    /// el último se conectan además al prisma más cercano de la capa que
    /// contiene la altura del extremo
    pub(crate) fn add_bonding_wires(&mut self, stackup: &LayerStackupModel) {
        struct WirePlan {
            segments: Vec<(FPoint3, FPoint3)>,
            net_id: Option<usize>,
            mat_id: Option<usize>,
            scen_id: Option<usize>,
            radius: f64,
            current: f64,
            first_prism: Option<usize>,
            last_prism: Option<usize>,
        }

        let plans: Vec<WirePlan> = {
            let query = PrismModelQuery::new(self);
            stackup
                .all_bonding_wires()
                .iter()
                .filter(|bw| bw.pt2ds.len() >= 2)
                .map(|bw| {
                    let to3d = |pt: &Point2, h: f64| {
                        FPoint3::new(
                            pt.x as f64 * self.scale_h2unit,
                            pt.y as f64 * self.scale_h2unit,
                            h,
                        )
                    };
                    let segments: Vec<(FPoint3, FPoint3)> = bw
                        .pt2ds
                        .windows(2)
                        .zip(bw.heights.windows(2))
                        .map(|(pts, hs)| (to3d(&pts[0], hs[0]), to3d(&pts[1], hs[1])))
                        .collect();
                    let first_layer = self.nearest_layer(bw.heights[0]);
                    let last_layer = self.nearest_layer(*bw.heights.last().unwrap());
                    let first_prism = query.nearest_prism(first_layer, &bw.pt2ds[0]);
                    let last_prism =
                        query.nearest_prism(last_layer, bw.pt2ds.last().unwrap());
                    if first_prism.is_none() || last_prism.is_none() {
                        warn!("hilo de soldadura sin prisma de anclaje en alguno de sus extremos");
                    }
                    WirePlan {
                        segments,
                        net_id: bw.net_id,
                        mat_id: bw.mat_id,
                        scen_id: bw.scenario,
                        radius: bw.radius,
                        current: bw.current,
                        first_prism,
                        last_prism,
                    }
                })
                .collect()
        };

        for plan in plans {
            let n = plan.segments.len();
            let mut prev_local: Option<usize> = None;
            for (i, (start, end)) in plan.segments.iter().enumerate() {
                let local = self.add_line_element(
                    *start,
                    *end,
                    plan.net_id,
                    plan.mat_id,
                    plan.radius,
                    plan.current,
                    plan.scen_id,
                );
                let gid = self.lines[local].id;
                if let Some(prev) = prev_local {
                    let prev_gid = self.lines[prev].id;
                    self.lines[prev].neighbors[1].push(gid);
                    self.lines[local].neighbors[0].push(prev_gid);
                }
                if i == 0 {
                    if let Some(prism) = plan.first_prism {
                        self.lines[local].neighbors[0].push(prism);
                    }
                }
                if i + 1 == n {
                    if let Some(prism) = plan.last_prism {
                        self.lines[local].neighbors[1].push(prism);
                    }
                }
                prev_local = Some(local);
            }
        }
    }

    /// Índices de elemento más cercanos a cada punto de observación
    pub fn search_element_indices(&self, monitors: &[FPoint3]) -> Vec<usize> {
        if self.prisms.is_empty() {
            return Vec::new();
        }
        let query = PrismModelQuery::new(self);
        monitors
            .iter()
            .filter_map(|monitor| {
                let layer = self.nearest_layer(monitor.z);
                let pt = Point2::new(
                    (monitor.x / self.scale_h2unit).round() as i64,
                    (monitor.y / self.scale_h2unit).round() as i64,
                );
                let found = query.nearest_prism(layer, &pt);
                if found.is_none() {
                    warn!("punto de observación sin prisma asociado: {:?}", monitor);
                }
                found
            })
            .collect()
    }

    // --- entrada/salida ---

    /// Volcado VTK del modelo, con temperaturas por elemento opcionales
    pub fn write_vtk<P: AsRef<std::path::Path>>(
        &self,
        path: P,
        temperatures: Option<&[f64]>,
    ) -> Result<(), Error> {
        crate::vtk::write_vtk(self, path, temperatures)
    }

    /// Serialización JSON del modelo
    pub fn as_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialización JSON del modelo
    pub fn from_json(data: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(data)?)
    }

    /// Archivo binario versionado del modelo
    pub fn save_bin<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        crate::io::save_bin(path, self)
    }

    /// Carga del archivo binario versionado
    pub fn load_bin<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        crate::io::load_bin(path)
    }
}
