// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Consultas espaciales sobre el modelo de prismas
//!
//! Un R-tree de baricentros por capa, construido de forma perezosa en el
//! primer acceso; `OnceCell` garantiza una única construcción por capa aunque
//! consulten varios hilos.

use once_cell::sync::OnceCell;
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use geom::{Box2, Point2};

use crate::prism::PrismThermalModel;

type RtVal = GeomWithData<[i64; 2], usize>;

/// Consulta sobre los prismas del modelo por capa
pub struct PrismModelQuery<'a> {
    model: &'a PrismThermalModel,
    layer_trees: Vec<OnceCell<RTree<RtVal>>>,
}

impl<'a> PrismModelQuery<'a> {
    pub fn new(model: &'a PrismThermalModel) -> Self {
        let layer_trees = (0..model.total_layers()).map(|_| OnceCell::new()).collect();
        Self { model, layer_trees }
    }

    fn layer_tree(&self, layer: usize) -> &RTree<RtVal> {
        self.layer_trees[layer].get_or_init(|| {
            let model = self.model;
            let template = model.layer_template(layer);
            let mut entries = Vec::new();
            for gid in model.index_offset[layer]..model.index_offset[layer + 1] {
                let prism = model.get_prism(gid);
                debug_assert_eq!(prism.layer, layer);
                let element = model.get_prism_element(layer, prism.element);
                let center = template.triangle_center(element.template_id);
                entries.push(GeomWithData::new([center.x, center.y], gid));
            }
            RTree::bulk_load(entries)
        })
    }

    /// Prismas de la capa cuyo baricentro cae en la caja
    pub fn search_prisms(&self, layer: usize, bbox: &Box2) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [bbox.min.x, bbox.min.y],
            [bbox.max.x, bbox.max.y],
        );
        self.layer_tree(layer)
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect()
    }

    /// Prisma de la capa con el baricentro más próximo al punto
    pub fn nearest_prism(&self, layer: usize, pt: &Point2) -> Option<usize> {
        if layer >= self.layer_trees.len() {
            return None;
        }
        self.layer_tree(layer)
            .nearest_neighbor(&[pt.x, pt.y])
            .map(|entry| entry.data)
    }
}
