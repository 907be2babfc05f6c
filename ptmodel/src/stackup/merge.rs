// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Agrupación de polígonos de conexión por capa y atributo (red, material)
//!
//! Reúne las formas de pistas y padstacks de cada capa del apilado con su
//! atribución y las ordena por clave, una tarea por capa. La unión booleana
//! de polígonos corresponde al colaborador externo de fusión; la resolución
//! de solapes queda delegada en la preferencia por el polígono envolvente de
//! menor área durante la atribución de elementos.

use std::collections::BTreeMap;

use rayon::prelude::*;

use epkg::{ConnObj, Layout, Shape};
use geom::Polygon;

use crate::common::with_thread_pool;

/// Polígono agrupado con su atribución
#[derive(Debug, Clone)]
pub struct MergedPolygon {
    pub net: Option<usize>,
    pub mat: Option<usize>,
    pub solid: Polygon,
    pub holes: Vec<Polygon>,
}

/// Agrupador de polígonos del trazado por capa
pub struct LayoutPolygonMerger<'a> {
    layout: &'a Layout,
    layers: BTreeMap<usize, Vec<MergedPolygon>>,
}

impl<'a> LayoutPolygonMerger<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self {
            layout,
            layers: BTreeMap::new(),
        }
    }

    /// Recoge las formas del trazado y agrupa cada capa en paralelo
    pub fn merge(&mut self, threads: usize) {
        self.fill_polygons_from_layout();
        let layers = &mut self.layers;
        with_thread_pool(threads, || {
            layers
                .par_iter_mut()
                .for_each(|(_, polygons)| Self::merge_one_layer(polygons));
        });
    }

    /// Polígonos agrupados de una capa del apilado
    pub fn merged_polygons(&self, layer: usize) -> &[MergedPolygon] {
        self.layers.get(&layer).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn fill_polygons_from_layout(&mut self) {
        for obj in self.layout.conn_objs() {
            match obj {
                ConnObj::RoutingWire(rw) => {
                    let mat = self
                        .layout
                        .get_layer(rw.layer)
                        .and_then(|l| l.conducting_mat);
                    self.fill_one_shape(rw.layer, rw.net, mat, &rw.shape);
                }
                ConnObj::PadstackInst(ps) => {
                    let (first, last) = ps.layer_range;
                    for layer in first..=last {
                        if self.layout.get_layer(layer).is_none() {
                            continue;
                        }
                        if let Some(shape) = ps.pad_shapes.get(&layer) {
                            let shape = shape.clone();
                            self.fill_one_shape(layer, ps.net, ps.material, &shape);
                        } else if let Some(via) = ps.via_shape.clone() {
                            self.fill_one_shape(layer, ps.net, ps.material, &via);
                        }
                    }
                }
                ConnObj::BondingWire(_) => {}
            }
        }
    }

    fn fill_one_shape(&mut self, layer: usize, net: Option<usize>, mat: Option<usize>, shape: &Shape) {
        let entry = self.layers.entry(layer).or_insert_with(Vec::new);
        entry.push(MergedPolygon {
            net,
            mat,
            solid: shape.outline(),
            holes: shape.holes().to_vec(),
        });
    }

    /// Agrupa los polígonos de una capa por (red, material) en orden estable
    fn merge_one_layer(polygons: &mut Vec<MergedPolygon>) {
        polygons.sort_by_key(|p| (p.net, p.mat));
    }
}
