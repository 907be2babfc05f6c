// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Modelo de apilado de capas (C1)
//!
//! Representación canónica del trazado 2.5D: una sopa de polígonos con
//! atribución de red y material, rangos verticales en alturas enteras
//! escaladas por `10^layer_cut_precision`, bloques de potencia e hilos de
//! soldadura. `build_layer_polygon_lut` corta el apilado en rebanadas por las
//! alturas únicas y comparte entre rebanadas idénticas la lista de polígonos.

mod builder;
mod merge;
mod query;

pub use builder::{create_layer_stackup_model, LayerStackupModelBuilder};
pub use merge::{LayoutPolygonMerger, MergedPolygon};
pub use query::LayerStackupModelQuery;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Error;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use geom::{Point2, Polygon};

use crate::common::LayerStackupSettings;

/// Altura vertical entera, escalada por `10^layer_cut_precision`
pub type Height = i64;

/// Rango vertical [low, high) de un polígono, en alturas escaladas
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRange {
    pub high: Height,
    pub low: Height,
}

impl Default for LayerRange {
    fn default() -> Self {
        // rango inválido hasta que se asignen cotas reales
        Self {
            high: Height::MIN,
            low: Height::MAX,
        }
    }
}

impl LayerRange {
    pub fn new(high: Height, low: Height) -> Self {
        Self { high, low }
    }

    pub fn is_valid(&self) -> bool {
        self.high > self.low
    }

    pub fn thickness(&self) -> Height {
        self.high - self.low
    }
}

/// Bloque de potencia: polígono que inyecta potencia según una tabla por temperatura
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct PowerBlock {
    pub polygon: usize,
    pub range: LayerRange,
    pub scenario: usize,
    pub power_lut: usize,
}

/// Hilo de soldadura muestreado como polilínea con alturas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondingWire {
    /// Radio del hilo en unidades de usuario
    pub radius: f64,
    /// Corriente [A]
    pub current: f64,
    pub net_id: Option<usize>,
    pub mat_id: Option<usize>,
    pub scenario: Option<usize>,
    /// Alturas en unidades de usuario; `heights.len() == pt2ds.len()`
    pub heights: Vec<f64>,
    pub pt2ds: Vec<Point2>,
}

/// Modelo de apilado de capas con corte vertical canónico
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerStackupModel {
    pub(crate) nets: Vec<Option<usize>>,
    pub(crate) materials: Vec<Option<usize>>,
    pub(crate) polygons: Vec<Polygon>,
    pub(crate) steiner_points: Vec<Point2>,
    pub(crate) layer_ranges: Vec<LayerRange>,
    pub(crate) bonding_wires: Vec<BondingWire>,
    pub(crate) power_blocks: IndexMap<usize, PowerBlock>,
    pub(crate) settings: LayerStackupSettings,
    /// Lista de polígonos presentes en cada rebanada; compartida entre
    /// rebanadas de geometría idéntica
    pub(crate) layer_polygons: Vec<Arc<Vec<usize>>>,
    pub(crate) height2indices: HashMap<Height, usize>,
    /// Alturas únicas en orden descendente
    pub(crate) layer_order: Vec<Height>,
    pub(crate) v_scale2int: f64,
}

impl LayerStackupModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Altura escalada a partir de una cota en unidades de usuario
    #[inline]
    pub fn get_height(&self, height: f64) -> Height {
        (height * self.v_scale2int).round() as Height
    }

    /// Rango vertical de una lámina dada por cota superior y espesor
    pub fn layer_range(&self, elevation: f64, thickness: f64) -> LayerRange {
        LayerRange::new(
            self.get_height(elevation),
            self.get_height(elevation - thickness),
        )
    }

    /// Número de rebanadas del corte vertical
    pub fn total_layers(&self) -> usize {
        self.layer_order.len().saturating_sub(1)
    }

    pub fn has_polygon(&self, layer: usize) -> bool {
        self.layer_polygons
            .get(layer)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    /// Cota superior y espesor de una rebanada, en unidades de usuario
    pub fn layer_height_thickness(&self, layer: usize) -> Option<(f64, f64)> {
        if layer >= self.total_layers() {
            return None;
        }
        let elevation = self.layer_order[layer] as f64 / self.v_scale2int;
        let thickness = elevation - self.layer_order[layer + 1] as f64 / self.v_scale2int;
        Some((elevation, thickness))
    }

    /// Índice de la rebanada cuya cota superior es la altura dada
    pub fn layer_index_by_height(&self, height: Height) -> Option<usize> {
        self.height2indices.get(&height).copied()
    }

    /// Contorno del trazado (el polígono 0)
    pub fn layout_boundary(&self) -> &Polygon {
        &self.polygons[0]
    }

    pub fn all_polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn steiner_points(&self) -> &[Point2] {
        &self.steiner_points
    }

    pub fn all_power_blocks(&self) -> &IndexMap<usize, PowerBlock> {
        &self.power_blocks
    }

    pub fn all_bonding_wires(&self) -> &[BondingWire] {
        &self.bonding_wires
    }

    pub fn net_id(&self, pid: usize) -> Option<usize> {
        self.nets[pid]
    }

    pub fn material_id(&self, pid: usize) -> Option<usize> {
        self.materials[pid]
    }

    /// Identificadores de los polígonos presentes en la rebanada
    pub fn layer_polygon_ids(&self, layer: usize) -> Arc<Vec<usize>> {
        Arc::clone(&self.layer_polygons[layer])
    }

    /// Polígonos presentes en la rebanada
    pub fn layer_polygons(&self, layer: usize) -> Vec<Polygon> {
        self.layer_polygons[layer]
            .iter()
            .map(|&i| self.polygons[i].clone())
            .collect()
    }

    /// Construye el corte vertical: alturas únicas descendentes, lista de
    /// polígonos por rebanada y bisección de rebanadas sobreespesas
    ///
    /// Tras la llamada, si `transition_ratio > 1` los espesores de rebanadas
    /// adyacentes difieren como mucho en ese factor
    pub fn build_layer_polygon_lut(&mut self, transition_ratio: f64) {
        self.layer_order.clear();
        self.height2indices.clear();

        let mut heights: BTreeSet<Height> = BTreeSet::new();
        for i in 0..self.layer_ranges.len() {
            if self.materials[i].is_none() {
                continue;
            }
            let range = self.layer_ranges[i];
            if !range.is_valid() {
                continue;
            }
            heights.insert(range.high);
            heights.insert(range.low);
            if let Some(pb) = self.power_blocks.get(&i) {
                heights.insert(pb.range.high);
                heights.insert(pb.range.low);
            }
        }
        self.layer_order = heights.into_iter().rev().collect();
        for (i, h) in self.layer_order.iter().enumerate() {
            self.height2indices.insert(*h, i);
        }

        // lista de polígonos por rebanada
        let total = self.total_layers();
        let mut per_layer: Vec<Vec<usize>> = vec![Vec::new(); total];
        for i in 0..self.polygons.len() {
            let range = self.layer_ranges[i];
            if !range.is_valid() || self.materials[i].is_none() {
                continue;
            }
            let s_layer = self.height2indices[&range.high];
            let e_layer = total.min(self.height2indices[&range.low]);
            for layer in s_layer..e_layer {
                per_layer[layer].push(i);
            }
        }
        self.layer_polygons = share_equal_layers(per_layer);

        if transition_ratio > 1.0 && self.layer_order.len() > 1 {
            let mut ranges: Vec<LayerRange> = Vec::with_capacity(self.layer_order.len() - 1);
            for w in self.layer_order.windows(2) {
                ranges.push(LayerRange::new(w[0], w[1]));
            }
            while slice_overheight_layers(&mut ranges, transition_ratio) {}

            let mut layer_order = Vec::with_capacity(ranges.len() + 1);
            for range in &ranges {
                layer_order.push(range.high);
            }
            layer_order.push(ranges[ranges.len() - 1].low);

            // las rebanadas nuevas heredan los polígonos de la que bisecan
            let mut lyr_polygons: Vec<Arc<Vec<usize>>> = Vec::with_capacity(ranges.len());
            for (i, h) in layer_order.iter().take(ranges.len()).enumerate() {
                match self.height2indices.get(h) {
                    Some(&old) => lyr_polygons.push(Arc::clone(&self.layer_polygons[old])),
                    None => lyr_polygons.push(Arc::clone(&lyr_polygons[i - 1])),
                }
            }
            self.layer_polygons = lyr_polygons;
            self.layer_order = layer_order;
            self.height2indices.clear();
            for (i, h) in self.layer_order.iter().enumerate() {
                self.height2indices.insert(*h, i);
            }
        }

        log::debug!(
            "corte vertical: {} rebanadas, {} polígonos, {} bloques de potencia",
            self.total_layers(),
            self.polygons.len(),
            self.power_blocks.len()
        );
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

/// Comparte la lista de polígonos entre rebanadas consecutivas idénticas
fn share_equal_layers(per_layer: Vec<Vec<usize>>) -> Vec<Arc<Vec<usize>>> {
    let mut out: Vec<Arc<Vec<usize>>> = Vec::with_capacity(per_layer.len());
    for ids in per_layer {
        let same = out
            .last()
            .map(|prev| prev.as_slice() == ids.as_slice())
            .unwrap_or(false);
        if same {
            let shared = Arc::clone(out.last().unwrap());
            out.push(shared);
        } else {
            out.push(Arc::new(ids));
        }
    }
    out
}

/// Biseca iterativamente la más gruesa de cada par de rebanadas adyacentes
/// cuyo cociente de espesores supere `ratio`
///
/// Devuelve true si se ha cortado alguna rebanada en esta pasada
pub fn slice_overheight_layers(ranges: &mut Vec<LayerRange>, ratio: f64) -> bool {
    let slice = |r: LayerRange| -> Option<(LayerRange, LayerRange)> {
        let mid = (0.5 * (r.high as f64 + r.low as f64)).round() as Height;
        if mid <= r.low || mid >= r.high {
            // la retícula vertical no da para más cortes
            return None;
        }
        Some((LayerRange::new(r.high, mid), LayerRange::new(mid, r.low)))
    };

    let mut sliced = false;
    let mut i = 0;
    while i < ranges.len() {
        debug_assert!(ranges[i].thickness() > 0);
        if i > 0 {
            let curr_h = ranges[i].thickness() as f64;
            let prev_h = ranges[i - 1].thickness() as f64;
            if curr_h > ratio * prev_h {
                if let Some((top, bot)) = slice(ranges[i]) {
                    ranges[i] = top;
                    ranges.insert(i + 1, bot);
                    sliced = true;
                    i += 1;
                }
            }
        }
        if i + 1 < ranges.len() {
            let curr_h = ranges[i].thickness() as f64;
            let next_h = ranges[i + 1].thickness() as f64;
            if curr_h > ratio * next_h {
                if let Some((top, bot)) = slice(ranges[i]) {
                    ranges[i] = top;
                    ranges.insert(i + 1, bot);
                    sliced = true;
                    i += 1;
                }
            }
        }
        i += 1;
    }
    sliced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rango_de_capa() {
        let r = LayerRange::default();
        assert!(!r.is_valid());
        let r = LayerRange::new(1000, 0);
        assert!(r.is_valid());
        assert_eq!(r.thickness(), 1000);
    }

    #[test]
    fn biseccion_de_rebanadas() {
        // espesores 1000, 50, 1000 con cociente máximo 2
        let mut ranges = vec![
            LayerRange::new(2050, 1050),
            LayerRange::new(1050, 1000),
            LayerRange::new(1000, 0),
        ];
        while slice_overheight_layers(&mut ranges, 2.0) {}

        // continuidad y monotonía
        for w in ranges.windows(2) {
            assert_eq!(w[0].low, w[1].high);
        }
        assert_eq!(ranges[0].high, 2050);
        assert_eq!(ranges[ranges.len() - 1].low, 0);
        // ninguna pareja adyacente supera el cociente
        for w in ranges.windows(2) {
            let r1 = w[0].thickness() as f64;
            let r2 = w[1].thickness() as f64;
            assert!(r1 / r2 <= 2.0 + 1e-9 && r2 / r1 <= 2.0 + 1e-9);
        }
        // la rebanada fina no se ha tocado
        assert!(ranges.iter().any(|r| r.thickness() == 50));
    }

    #[test]
    fn biseccion_sin_trabajo() {
        let mut ranges = vec![LayerRange::new(2000, 1000), LayerRange::new(1000, 0)];
        assert!(!slice_overheight_layers(&mut ranges, 2.0));
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn comparticion_de_rebanadas_identicas() {
        let shared = share_equal_layers(vec![vec![0, 1], vec![0, 1], vec![2]]);
        assert!(Arc::ptr_eq(&shared[0], &shared[1]));
        assert!(!Arc::ptr_eq(&shared[1], &shared[2]));
    }
}
