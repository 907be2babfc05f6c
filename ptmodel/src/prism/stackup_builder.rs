// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Constructor del modelo de prismas por apilado (C5, variante de apilado)
//!
//! Una triangulación por conjunto único de polígonos de rebanada; los vecinos
//! verticales se calculan como fracciones de área de la intersección de cada
//! triángulo con los de la capa adyacente, de modo que capas con mallas
//! distintas quedan acopladas por contactos parciales.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Error};
use log::{debug, trace};
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use epkg::Layout;
use geom::{triangle_area, triangle_intersection_area, Polygon};

use crate::common::{with_thread_pool, PrismModelExtractionSettings};
use crate::mesh::{generate_mesh, PrismTemplate};
use crate::prism::builder::{
    collect_fluid_materials, populate_layer_elements, stamp_boundary_conditions,
    wire_layer_neighbors,
};
use crate::prism::{Contact, PrismLayer, PrismThermalModel, VerticalLink, BOT, TOP};
use crate::stackup::{create_layer_stackup_model, LayerStackupModel, LayerStackupModelQuery};

/// Fracción de área mínima para conservar un contacto
const MIN_CONTACT_RATIO: f64 = 1e-9;

/// Crea un modelo térmico de prismas por apilado a partir del trazado
pub fn create_prism_stackup_thermal_model(
    layout: &Layout,
    settings: PrismModelExtractionSettings,
) -> Result<PrismThermalModel, Error> {
    let stackup = create_layer_stackup_model(layout, settings.layer_settings.clone())?;
    let mut model = PrismThermalModel::new();
    PrismStackupThermalModelBuilder::new(&mut model, layout)
        .build_with_stackup(&stackup, settings)?;
    Ok(model)
}

/// Constructor de la variante de apilado
pub struct PrismStackupThermalModelBuilder<'a> {
    model: &'a mut PrismThermalModel,
    layout: &'a Layout,
}

impl<'a> PrismStackupThermalModelBuilder<'a> {
    pub fn new(model: &'a mut PrismThermalModel, layout: &'a Layout) -> Self {
        Self { model, layout }
    }

    /// Construye el modelo a partir de un modelo de apilado ya montado
    pub fn build_with_stackup(
        &mut self,
        stackup: &LayerStackupModel,
        settings: PrismModelExtractionSettings,
    ) -> Result<(), Error> {
        self.model.reset();
        ensure!(stackup.total_layers() > 0, "el modelo de apilado está vacío");

        let coord_unit = self.layout.coord_unit;

        // un conjunto de polígonos por plantilla única; rebanadas con la
        // misma lista comparten plantilla
        let mut layer_polygons: Vec<Vec<Polygon>> = vec![stackup.layer_polygons(0)];
        let mut layer2template: Vec<usize> = vec![0];
        for layer in 1..stackup.total_layers() {
            let shared = Arc::ptr_eq(
                &stackup.layer_polygon_ids(layer),
                &stackup.layer_polygon_ids(layer - 1),
            );
            if !shared {
                let mut polygons = stackup.layer_polygons(layer);
                if settings.mesh_settings.imprint_upper_layer {
                    let upper = layer_polygons.last().unwrap().clone();
                    polygons.extend(upper);
                }
                layer_polygons.push(polygons);
            }
            layer2template.push(layer_polygons.len() - 1);
        }

        trace!("generando malla para {} plantillas", layer_polygons.len());
        let steiner = stackup.steiner_points();
        let mesh_settings = &settings.mesh_settings;
        let templates: Vec<PrismTemplate> = with_thread_pool(mesh_settings.threads, || {
            layer_polygons
                .par_iter()
                .enumerate()
                .map(|(i, polygons)| {
                    generate_mesh(
                        polygons,
                        steiner,
                        &coord_unit,
                        mesh_settings,
                        &format!("mesh{}", i),
                    )
                })
                .collect::<Result<Vec<_>, Error>>()
        })?;
        for template in templates {
            self.model.add_template(template);
        }

        for layer in 0..stackup.total_layers() {
            self.model.set_layer_template(layer, layer2template[layer]);
            let mut prism_layer = PrismLayer::new(layer);
            let (elevation, thickness) = stackup
                .layer_height_thickness(layer)
                .expect("rebanada sin cota");
            prism_layer.elevation = elevation;
            prism_layer.thickness = thickness;
            self.model.append_layer(prism_layer);
        }

        let fluids = collect_fluid_materials(self.layout);
        let query = LayerStackupModelQuery::new(stackup);
        let mut template_id_maps: Vec<HashMap<usize, usize>> =
            Vec::with_capacity(self.model.total_layers());
        for layer in 0..self.model.total_layers() {
            let id_map = populate_layer_elements(self.model, stackup, &query, &fluids, layer);
            template_id_maps.push(id_map);
        }
        for layer in 0..self.model.total_layers() {
            wire_layer_neighbors(self.model, layer, &template_id_maps[layer]);
        }

        self.model
            .build_prism_model(coord_unit.scale2unit(), coord_unit.scale2meter(), false);
        build_prism_contacts(self.model);
        self.model.add_bonding_wires(stackup);
        debug!(
            "elementos totales: {}, prismas: {}, segmentos: {}",
            self.model.total_elements(),
            self.model.total_prism_elements(),
            self.model.total_line_elements()
        );

        stamp_boundary_conditions(self.model, self.layout, &settings.bc_settings);
        if settings.mesh_settings.dump_mesh_file {
            let path = settings.mesh_settings.work_dir.join("mesh.vtk");
            self.model.write_vtk(&path, None)?;
        }
        self.model.settings = settings;
        Ok(())
    }
}

/// Calcula los contactos fraccionales entre capas adyacentes
///
/// Para cada prisma se consulta un R-tree de cajas de triángulos de la capa
/// inferior y se recorta triángulo contra triángulo; el contacto es simétrico:
/// `ratio_p · area(p) == ratio_q · area(q)` salvo redondeo del recorte
fn build_prism_contacts(model: &mut PrismThermalModel) {
    type RtVal = GeomWithData<Rectangle<[i64; 2]>, usize>;

    let mut pairs: Vec<(usize, usize, f64, f64)> = Vec::new();
    for layer in 0..model.total_layers().saturating_sub(1) {
        let lower = layer + 1;
        let entries: Vec<RtVal> = (model.index_offset[lower]..model.index_offset[lower + 1])
            .map(|gid| {
                let inst = model.get_prism(gid);
                let tid = model.get_prism_element(lower, inst.element).template_id;
                let bbox = model.layer_template(lower).triangle_bbox(tid);
                GeomWithData::new(
                    Rectangle::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]),
                    gid,
                )
            })
            .collect();
        let tree = RTree::bulk_load(entries);

        for gid in model.index_offset[layer]..model.index_offset[layer + 1] {
            let inst = model.get_prism(gid);
            let tid = model.get_prism_element(layer, inst.element).template_id;
            let tri_p = model.layer_template(layer).triangle_fpoints(tid);
            let area_p = triangle_area(&tri_p);
            if area_p <= 0.0 {
                continue;
            }
            let bbox = model.layer_template(layer).triangle_bbox(tid);
            let envelope =
                AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]);
            for entry in tree.locate_in_envelope_intersecting(&envelope) {
                let qgid = entry.data;
                let qinst = model.get_prism(qgid);
                let qtid = model.get_prism_element(lower, qinst.element).template_id;
                let tri_q = model.layer_template(lower).triangle_fpoints(qtid);
                let area_q = triangle_area(&tri_q);
                if area_q <= 0.0 {
                    continue;
                }
                let area = triangle_intersection_area(&tri_p, &tri_q);
                if area / area_p.max(area_q) > MIN_CONTACT_RATIO {
                    pairs.push((gid, qgid, area / area_p, area / area_q));
                }
            }
        }
    }

    for (p, q, ratio_p, ratio_q) in pairs {
        model.prisms[p].contacts[BOT].push(Contact { id: q, ratio: ratio_p });
        model.prisms[q].contacts[TOP].push(Contact { id: p, ratio: ratio_q });
    }
    for prism in &mut model.prisms {
        prism.top = if prism.contacts[TOP].is_empty() {
            VerticalLink::Open
        } else {
            VerticalLink::Contacts
        };
        prism.bot = if prism.contacts[BOT].is_empty() {
            VerticalLink::Open
        } else {
            VerticalLink::Contacts
        };
    }
}
