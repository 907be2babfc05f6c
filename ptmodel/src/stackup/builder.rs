// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Construcción del modelo de apilado a partir del trazado (C2)
//!
//! Recorre el trazado: rellena cada capa con su dieléctrico, añade los
//! componentes (como polígono o como bloque de potencia más la junta de
//! soldadura), muestrea los hilos de soldadura, vuelca pistas y padstacks y
//! termina construyendo el corte vertical.

use anyhow::{bail, ensure, Error};
use log::{debug, trace};

use epkg::{ConnObj, Layout, LayoutRetriever, Shape};
use geom::{is_ccw, Box2, Polygon};

use crate::common::LayerStackupSettings;
use crate::stackup::{
    BondingWire, LayerRange, LayerStackupModel, LayoutPolygonMerger, PowerBlock,
};

/// Posición relativa de la lámina de potencia bajo la cara superior del dado
const PWR_POSITION: f64 = 0.1;
/// Espesor relativo de la lámina de potencia
const PWR_THICKNESS: f64 = 0.1;
/// Número mínimo de segmentos al muestrear un hilo de soldadura
const WIRE_MIN_SEGS: usize = 10;

/// Crea un modelo de apilado a partir del trazado
pub fn create_layer_stackup_model(
    layout: &Layout,
    settings: LayerStackupSettings,
) -> Result<LayerStackupModel, Error> {
    let mut model = LayerStackupModel::new();
    LayerStackupModelBuilder::new(&mut model, layout).build(settings)?;
    Ok(model)
}

/// Constructor del modelo de apilado
pub struct LayerStackupModelBuilder<'a> {
    model: &'a mut LayerStackupModel,
    layout: &'a Layout,
    retriever: LayoutRetriever<'a>,
}

impl<'a> LayerStackupModelBuilder<'a> {
    pub fn new(model: &'a mut LayerStackupModel, layout: &'a Layout) -> Self {
        Self {
            model,
            layout,
            retriever: LayoutRetriever::new(layout),
        }
    }

    /// Puebla el modelo; ante un error recuperable lo deja reiniciado
    pub fn build(&mut self, settings: LayerStackupSettings) -> Result<(), Error> {
        self.model.reset();
        ensure!(
            !self.layout.layers.is_empty(),
            "el trazado no tiene capas de apilado"
        );
        ensure!(
            self.layout.boundary.len() >= 3,
            "el contorno del trazado es degenerado"
        );
        self.layout.validate()?;
        self.model.v_scale2int = 10f64.powi(settings.layer_cut_precision as i32);
        self.model.settings = settings;

        // fusión opcional de polígonos de conexión por capa
        let merger = if self.model.settings.merge_polygons {
            trace!("fusionando polígonos del trazado");
            let mut merger = LayoutPolygonMerger::new(self.layout);
            merger.merge(self.model.settings.threads);
            Some(merger)
        } else {
            None
        };

        // cada capa queda rellena por su dieléctrico por defecto
        let layout = self.layout;
        let boundary = Shape::Polygon(layout.boundary.clone());
        for (layer_id, layer) in layout.stackup_layers() {
            let (elevation, thickness) = self
                .retriever
                .stackup_layer_height_thickness(layer_id)
                .expect("no se pudo resolver la cota de la capa de apilado");
            self.add_shape(None, layer.dielectric_mat, None, &boundary, elevation, thickness);

            if let Some(merger) = &merger {
                for merged in merger.merged_polygons(layer_id) {
                    self.add_polygon(
                        merged.net,
                        merged.mat,
                        merged.solid.clone(),
                        false,
                        elevation,
                        thickness,
                    );
                    for hole in &merged.holes {
                        self.add_polygon(
                            merged.net,
                            merged.mat,
                            hole.clone(),
                            true,
                            elevation,
                            thickness,
                        );
                    }
                }
            }
        }

        for component in &layout.components {
            self.add_component(component)?;
        }

        for obj in &layout.conn_objs {
            match obj {
                ConnObj::BondingWire(bw) => self.add_bonding_wire(bw),
                // con fusión previa, pistas y padstacks ya entraron por capa
                ConnObj::RoutingWire(rw) if merger.is_none() => self.add_routing_wire(rw),
                ConnObj::PadstackInst(ps) if merger.is_none() => self.add_padstack_inst(ps),
                _ => {}
            }
        }

        let imprint_boxes = self.model.settings.imprint_boxes.clone();
        let coord_unit = self.layout.coord_unit;
        for bbox in &imprint_boxes {
            self.add_imprint_box(&coord_unit.to_coord_box(bbox));
        }

        let ratio = self.model.settings.layer_transition_ratio;
        self.model.build_layer_polygon_lut(ratio);
        debug!(
            "modelo de apilado construido: {} rebanadas, {} polígonos, {} hilos",
            self.model.total_layers(),
            self.model.polygons.len(),
            self.model.bonding_wires.len()
        );
        Ok(())
    }

    /// Añade un polígono con su atribución; devuelve su índice o None si el
    /// rango vertical es inválido
    ///
    /// Los huecos se almacenan en sentido horario y los sólidos en antihorario
    pub fn add_polygon(
        &mut self,
        net: Option<usize>,
        mat: Option<usize>,
        mut polygon: Polygon,
        is_hole: bool,
        elevation: f64,
        thickness: f64,
    ) -> Option<usize> {
        let layer_range = self.model.layer_range(elevation, thickness);
        if !layer_range.is_valid() {
            trace!(
                "descartado polígono con rango vertical inválido ({}, {})",
                elevation,
                thickness
            );
            return None;
        }
        if is_hole == is_ccw(&polygon) {
            polygon.reverse();
        }
        self.model.layer_ranges.push(layer_range);
        self.model.polygons.push(polygon);
        self.model.materials.push(mat);
        self.model.nets.push(net);
        Some(self.model.polygons.len() - 1)
    }

    /// Descompone una forma en contorno y huecos y los añade
    pub fn add_shape(
        &mut self,
        net: Option<usize>,
        solid_mat: Option<usize>,
        hole_mat: Option<usize>,
        shape: &Shape,
        elevation: f64,
        thickness: f64,
    ) {
        if self.model.settings.add_circle_center_as_steiner_point {
            if let Shape::Circle { center, .. } = shape {
                self.model.steiner_points.push(*center);
            }
        }
        if shape.has_hole() {
            self.add_polygon(net, solid_mat, shape.outline(), false, elevation, thickness);
            let holes: Vec<Polygon> = shape.holes().to_vec();
            for hole in holes {
                self.add_polygon(net, hole_mat, hole, true, elevation, thickness);
            }
        } else {
            self.add_polygon(net, solid_mat, shape.outline(), false, elevation, thickness);
        }
    }

    /// Añade un bloque de potencia: el polígono más una lámina de potencia
    /// concentrada cerca de su cara superior
    pub fn add_power_block(
        &mut self,
        mat: Option<usize>,
        polygon: Polygon,
        scenario: usize,
        power_lut: usize,
        elevation: f64,
        thickness: f64,
        pwr_position: f64,
        pwr_thickness: f64,
    ) -> bool {
        let index = match self.add_polygon(None, mat, polygon, false, elevation, thickness) {
            Some(index) => index,
            None => return false,
        };
        let pe = elevation - thickness * pwr_position;
        // el espesor de la lámina queda acotado por la distancia al fondo
        let pt = (thickness * pwr_thickness).min(pe - (elevation - thickness));
        let range = self.model.layer_range(pe, pt);
        self.model.power_blocks.insert(
            index,
            PowerBlock {
                polygon: index,
                range,
                scenario,
                power_lut,
            },
        );
        true
    }

    fn add_component(&mut self, component: &epkg::Component) -> Result<(), Error> {
        if !component.black_box {
            bail!(
                "el componente '{}' no es de caja negra; los componentes jerárquicos no están implementados",
                component.name
            );
        }
        let (elevation, thickness) = self
            .retriever
            .component_height_thickness(component)
            .expect("no se pudo resolver la cota del componente");
        let outline = component.boundary.outline();

        if let Some(loss_power) = component.loss_power {
            let ok = self.add_power_block(
                component.material,
                outline,
                loss_power.scenario,
                loss_power.lut,
                elevation,
                thickness,
                PWR_POSITION,
                PWR_THICKNESS,
            );
            assert!(ok, "no se pudo añadir el bloque de potencia del componente");
        } else {
            self.add_polygon(None, component.material, outline, false, elevation, thickness);
        }

        // junta de soldadura entre el fondo del dado y la placa
        let (elevation, thickness) = self
            .retriever
            .component_layer_height_thickness(component)
            .expect("no se pudo resolver la cota de la capa de ensamblado");
        if thickness > 0.0 {
            self.add_polygon(
                None,
                component.assembly.solder_filling_material,
                component.boundary.outline(),
                false,
                elevation,
                thickness,
            );
        }
        Ok(())
    }

    fn add_bonding_wire(&mut self, bw: &epkg::BondingWire) {
        let (pt2ds, heights) = self
            .retriever
            .bonding_wire_segments_with_min_seg(bw, WIRE_MIN_SEGS);
        assert_eq!(pt2ds.len(), heights.len());
        self.model.bonding_wires.push(BondingWire {
            radius: bw.radius,
            current: bw.current,
            net_id: bw.net,
            mat_id: bw.material,
            scenario: bw.scenario,
            heights,
            pt2ds,
        });

        // uniones de soldadura declaradas en los extremos
        if let Some((shape, elevation, thickness, mat)) =
            self.retriever.bonding_wire_start_solder_joint(bw)
        {
            self.add_shape(bw.net, Some(mat), None, &shape, elevation, thickness);
        }
        if let Some((shape, elevation, thickness, mat)) =
            self.retriever.bonding_wire_end_solder_joint(bw)
        {
            self.add_shape(bw.net, Some(mat), None, &shape, elevation, thickness);
        }
    }

    fn add_routing_wire(&mut self, rw: &epkg::RoutingWire) {
        let (elevation, thickness) = self
            .retriever
            .stackup_layer_height_thickness(rw.layer)
            .expect("no se pudo resolver la cota de la capa de la pista");
        let layer = &self.layout.layers[rw.layer];
        let (conducting_mat, dielectric_mat) = (layer.conducting_mat, layer.dielectric_mat);
        self.add_shape(
            rw.net,
            conducting_mat,
            dielectric_mat,
            &rw.shape,
            elevation,
            thickness,
        );
    }

    fn add_padstack_inst(&mut self, ps: &epkg::PadstackInst) {
        let (first, last) = ps.layer_range;
        for layer in first..=last.min(self.layout.layers.len().saturating_sub(1)) {
            let (elevation, thickness) = self
                .retriever
                .stackup_layer_height_thickness(layer)
                .expect("no se pudo resolver la cota de la capa del padstack");
            let shape = ps
                .pad_shapes
                .get(&layer)
                .or_else(|| ps.via_shape.as_ref())
                .cloned();
            if let Some(shape) = shape {
                self.add_shape(ps.net, ps.material, None, &shape, elevation, thickness);
            }
        }
    }

    /// Caja de imprimación: guía la malla sin atribución térmica ni rango válido
    fn add_imprint_box(&mut self, bbox: &Box2) {
        self.model.layer_ranges.push(LayerRange::default());
        self.model.polygons.push(bbox.to_polygon());
        self.model.materials.push(None);
        self.model.nets.push(None);
    }
}
