// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Búsqueda de polígono envolvente por rebanada mediante R-tree
//!
//! Un árbol por rebanada, compartido entre rebanadas de geometría idéntica.
//! Ante varios envolventes gana el de menor área; los polígonos sin material
//! (cajas de imprimación) pierden siempre.

use std::sync::Arc;

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use geom::{contains, signed_area2, Box2, Point2};

use crate::stackup::LayerStackupModel;

type RtVal = GeomWithData<Rectangle<[i64; 2]>, usize>;

/// Consulta espacial sobre el modelo de apilado
pub struct LayerStackupModelQuery<'a> {
    model: &'a LayerStackupModel,
    rtrees: Vec<Arc<RTree<RtVal>>>,
}

impl<'a> LayerStackupModelQuery<'a> {
    pub fn new(model: &'a LayerStackupModel) -> Self {
        let mut rtrees: Vec<Arc<RTree<RtVal>>> = Vec::with_capacity(model.total_layers());
        for layer in 0..model.total_layers() {
            if layer > 0
                && Arc::ptr_eq(&model.layer_polygons[layer], &model.layer_polygons[layer - 1])
            {
                let shared = Arc::clone(&rtrees[layer - 1]);
                rtrees.push(shared);
                continue;
            }
            let entries: Vec<RtVal> = model.layer_polygons[layer]
                .iter()
                .filter_map(|&i| {
                    let bbox = Box2::from_points(model.polygons[i].iter())?;
                    Some(GeomWithData::new(
                        Rectangle::from_corners(
                            [bbox.min.x, bbox.min.y],
                            [bbox.max.x, bbox.max.y],
                        ),
                        i,
                    ))
                })
                .collect();
            rtrees.push(Arc::new(RTree::bulk_load(entries)));
        }
        Self { model, rtrees }
    }

    /// Polígono de la rebanada que contiene el punto, si existe
    pub fn search_polygon(&self, layer: usize, pt: &Point2) -> Option<usize> {
        if !self.model.has_polygon(layer) {
            return None;
        }
        let envelope = AABB::from_corners([pt.x, pt.y], [pt.x, pt.y]);
        self.rtrees[layer]
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .filter(|&i| contains(&self.model.polygons[i], pt))
            .min_by_key(|&i| {
                (
                    self.model.materials[i].is_none(),
                    signed_area2(&self.model.polygons[i]).abs(),
                )
            })
    }
}
