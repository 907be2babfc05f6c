// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Constructor del modelo de prismas de plantilla única (C5)
//!
//! Genera una sola triangulación a partir de la unión de todos los polígonos
//! del apilado y la comparte entre capas, de modo que los vecinos verticales
//! se resuelven emparejando triángulos con el mismo índice de plantilla.

use std::collections::{HashMap, HashSet};

use anyhow::{ensure, Error};
use log::{debug, trace};

use epkg::Layout;

use crate::common::{BoundaryConditionSettings, Orientation, PrismModelExtractionSettings};
use crate::mesh::generate_mesh;
use crate::prism::{PrismLayer, PrismThermalModel};
use crate::stackup::{create_layer_stackup_model, LayerStackupModel, LayerStackupModelQuery};

/// Crea un modelo térmico de prismas de plantilla única a partir del trazado
pub fn create_prism_thermal_model(
    layout: &Layout,
    settings: PrismModelExtractionSettings,
) -> Result<PrismThermalModel, Error> {
    let stackup = create_layer_stackup_model(layout, settings.layer_settings.clone())?;
    let mut model = PrismThermalModel::new();
    PrismThermalModelBuilder::new(&mut model, layout).build_with_stackup(&stackup, settings)?;
    Ok(model)
}

/// Crea el modelo con la variante que pidan los ajustes: una malla por capa
/// (`gen_mesh_by_layer`) o una plantilla única compartida
pub fn create_thermal_model(
    layout: &Layout,
    settings: PrismModelExtractionSettings,
) -> Result<PrismThermalModel, Error> {
    if settings.mesh_settings.gen_mesh_by_layer {
        crate::prism::create_prism_stackup_thermal_model(layout, settings)
    } else {
        create_prism_thermal_model(layout, settings)
    }
}

/// Constructor de la variante de plantilla única
pub struct PrismThermalModelBuilder<'a> {
    model: &'a mut PrismThermalModel,
    layout: &'a Layout,
}

impl<'a> PrismThermalModelBuilder<'a> {
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
        let template = generate_mesh(
            stackup.all_polygons(),
            stackup.steiner_points(),
            &coord_unit,
            &settings.mesh_settings,
            "mesh",
        )?;
        trace!("elementos totales de la malla: {}", template.triangles.len());

        let template_idx = self.model.add_template(template);
        for layer in 0..stackup.total_layers() {
            self.model.set_layer_template(layer, template_idx);
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
        // vecinos verticales: mismo índice de plantilla en la capa inferior
        for layer in 0..self.model.total_layers() {
            if self.model.is_bot_layer(layer) {
                continue;
            }
            let lower_map = &template_id_maps[layer + 1];
            let upper: Vec<(usize, usize)> = self.model.layers[layer]
                .elements
                .iter()
                .map(|e| (e.id, e.template_id))
                .collect();
            for (eid, tid) in upper {
                if let Some(&lower_local) = lower_map.get(&tid) {
                    self.model.layers[layer + 1].elements[lower_local].top = Some(eid);
                    self.model.layers[layer].elements[eid].bot = Some(lower_local);
                }
            }
        }

        self.model
            .build_prism_model(coord_unit.scale2unit(), coord_unit.scale2meter(), true);
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

/// Materiales fluidos del trazado, excluidos de la malla sólida
pub(crate) fn collect_fluid_materials(layout: &Layout) -> HashSet<usize> {
    layout
        .materials
        .iter()
        .filter(|(_, m)| m.is_fluid())
        .map(|(id, _)| id)
        .collect()
}

/// Atribuye a cada triángulo de la capa su polígono envolvente y crea los
/// elementos; devuelve el mapa índice de plantilla → índice local
///
/// Se omiten los triángulos sin polígono, con material ausente o fluido. Si el
/// polígono es un bloque de potencia y la rebanada contiene su cota superior,
/// el elemento recibe la fracción de potencia proporcional a su área
pub(crate) fn populate_layer_elements(
    model: &mut PrismThermalModel,
    stackup: &LayerStackupModel,
    query: &LayerStackupModelQuery,
    fluids: &HashSet<usize>,
    layer: usize,
) -> HashMap<usize, usize> {
    let total_triangles = model.layer_template(layer).triangles.len();
    let mut id_map: HashMap<usize, usize> = HashMap::new();
    for it in 0..total_triangles {
        debug_assert!(stackup.has_polygon(layer));
        let center = model.layer_template(layer).triangle_center(it);
        let pid = match query.search_polygon(layer, &center) {
            Some(pid) => pid,
            None => continue,
        };
        let mat = match stackup.material_id(pid) {
            Some(mat) => mat,
            None => continue,
        };
        if fluids.contains(&mat) {
            continue;
        }

        let power = stackup.all_power_blocks().get(&pid).and_then(|pb| {
            if stackup.layer_index_by_height(pb.range.high) == Some(layer) {
                let area = model.layer_template(layer).triangle_area(it);
                let poly_area = geom::polygon_area(&stackup.all_polygons()[pid]);
                Some((area / poly_area, pb.scenario, pb.power_lut))
            } else {
                None
            }
        });
        let net = stackup.net_id(pid);

        let element = model.layers[layer].add_element(it);
        id_map.insert(it, element.id);
        element.mat_id = Some(mat);
        element.net_id = net;
        if let Some((ratio, scenario, power_lut)) = power {
            element.power_ratio = ratio;
            element.scen_id = Some(scenario);
            element.power_lut_id = Some(power_lut);
        }
    }
    trace!(
        "capa {}: {} elementos",
        layer,
        model.layers[layer].total_elements()
    );
    id_map
}

/// Copia la vecindad de triángulos de la plantilla a los elementos de la capa,
/// saltando los triángulos sin elemento (p. ej. fluidos)
pub(crate) fn wire_layer_neighbors(
    model: &mut PrismThermalModel,
    layer: usize,
    id_map: &HashMap<usize, usize>,
) {
    let tri_neighbors: Vec<[Option<usize>; 3]> = {
        let template = model.layer_template(layer);
        model.layers[layer]
            .elements
            .iter()
            .map(|e| template.triangles[e.template_id].neighbors)
            .collect()
    };
    for (e_idx, neighbors) in tri_neighbors.iter().enumerate() {
        for (n, nb) in neighbors.iter().enumerate() {
            if let Some(tid) = nb {
                if let Some(&local) = id_map.get(tid) {
                    model.layers[layer].elements[e_idx].neighbors[n] = Some(local);
                }
            }
        }
    }
}

/// Estampa en el modelo las condiciones de contorno válidas; las cajas de
/// bloque se convierten a coordenadas de retícula
pub(crate) fn stamp_boundary_conditions(
    model: &mut PrismThermalModel,
    layout: &Layout,
    bc_settings: &BoundaryConditionSettings,
) {
    for (i, ori) in [Orientation::Top, Orientation::Bot].iter().enumerate() {
        if let Some(bc) = bc_settings.uniform_bcs[i] {
            if bc.is_valid() {
                model.set_uniform_bc(*ori, bc);
            }
        }
        for (bbox, bc) in &bc_settings.block_bcs[i] {
            if bc.is_valid() {
                model.add_block_bc(*ori, layout.coord_unit.to_coord_box(bbox), *bc);
            }
        }
    }
}
