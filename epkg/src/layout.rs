// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Trazado 2.5D del encapsulado: contorno, capas de apilado, componentes y
//! objetos de conexión
//!
//! Los objetos de conexión forman un tipo suma: cada uno es exactamente un
//! hilo de soldadura, una pista o una instancia de padstack. Los
//! identificadores de red, material y tabla de potencia son índices dentro
//! del propio trazado; la ausencia se expresa con `None`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geom::{Box2, NCoord, Point2, Polygon};

use crate::material::{LookupTable1D, MaterialLib};
use crate::units::CoordUnit;

/// Número de lados con el que se poligonaliza un círculo
const CIRCLE_SEGMENTS: usize = 24;

/// Red eléctrica
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
}

/// Forma geométrica de un objeto del trazado, en coordenadas de retícula
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Shape {
    Rect(Box2),
    Circle { center: Point2, radius: NCoord },
    Polygon(Polygon),
    PolygonWithHoles { outline: Polygon, holes: Vec<Polygon> },
}

impl Shape {
    pub fn has_hole(&self) -> bool {
        match self {
            Shape::PolygonWithHoles { holes, .. } => !holes.is_empty(),
            _ => false,
        }
    }

    /// Contorno exterior como polígono; los círculos se poligonalizan
    pub fn outline(&self) -> Polygon {
        match self {
            Shape::Rect(b) => b.to_polygon(),
            Shape::Circle { center, radius } => {
                let mut poly = Vec::with_capacity(CIRCLE_SEGMENTS);
                for i in 0..CIRCLE_SEGMENTS {
                    let ang = 2.0 * std::f64::consts::PI * i as f64 / CIRCLE_SEGMENTS as f64;
                    poly.push(Point2::new(
                        center.x + (*radius as f64 * ang.cos()).round() as NCoord,
                        center.y + (*radius as f64 * ang.sin()).round() as NCoord,
                    ));
                }
                poly
            }
            Shape::Polygon(p) => p.clone(),
            Shape::PolygonWithHoles { outline, .. } => outline.clone(),
        }
    }

    pub fn holes(&self) -> &[Polygon] {
        match self {
            Shape::PolygonWithHoles { holes, .. } => holes,
            _ => &[],
        }
    }
}

/// Capa del apilado: lámina conductora o dieléctrica
///
/// `elevation` es la cota superior de la capa en unidades de usuario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackupLayer {
    pub name: String,
    pub elevation: f64,
    pub thickness: f64,
    pub conducting_mat: Option<usize>,
    pub dielectric_mat: Option<usize>,
}

/// Potencia disipada por un componente, indexada por temperatura
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct LossPower {
    pub scenario: usize,
    pub lut: usize,
}

/// Datos de montaje del componente sobre su capa de ensamblado
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyInfo {
    pub solder_material: Option<usize>,
    pub solder_filling_material: Option<usize>,
    pub solder_thickness: f64,
}

/// Componente de caja negra montado sobre una capa del apilado
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub boundary: Shape,
    pub material: Option<usize>,
    /// Altura del dado en unidades de usuario
    pub height: f64,
    /// Índice de la capa de apilado de ensamblado
    pub assembly_layer: usize,
    pub assembly: AssemblyInfo,
    pub loss_power: Option<LossPower>,
    pub black_box: bool,
}

/// Unión de soldadura en el extremo de un hilo
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct SolderJoint {
    pub material: usize,
    /// Radio de la unión en coordenadas de retícula
    pub radius: NCoord,
    /// Espesor de la unión en unidades de usuario
    pub thickness: f64,
}

/// Hilo de soldadura entre dos puntos del encapsulado
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondingWire {
    pub net: Option<usize>,
    pub material: Option<usize>,
    /// Radio del hilo en unidades de usuario
    pub radius: f64,
    /// Corriente [A] para el calentamiento Joule
    pub current: f64,
    pub scenario: Option<usize>,
    pub start: (Point2, f64),
    pub end: (Point2, f64),
    /// Altura del bucle sobre la línea entre extremos, en unidades de usuario
    pub loop_height: f64,
    pub start_joint: Option<SolderJoint>,
    pub end_joint: Option<SolderJoint>,
}

/// Pista de enrutado sobre una capa del apilado
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingWire {
    pub net: Option<usize>,
    pub layer: usize,
    pub shape: Shape,
}

/// Instancia de padstack atravesando un rango de capas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadstackInst {
    pub net: Option<usize>,
    pub material: Option<usize>,
    /// Rango inclusivo de capas del apilado
    pub layer_range: (usize, usize),
    /// Forma del pad por capa; si falta se usa la forma de la vía
    pub pad_shapes: BTreeMap<usize, Shape>,
    pub via_shape: Option<Shape>,
}

/// Objeto de conexión del trazado
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnObj {
    BondingWire(BondingWire),
    RoutingWire(RoutingWire),
    PadstackInst(PadstackInst),
}

/// Trazado del encapsulado con su biblioteca de materiales y tablas de potencia
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub coord_unit: CoordUnit,
    /// Contorno del trazado en coordenadas de retícula
    pub boundary: Polygon,
    pub nets: Vec<Net>,
    pub layers: Vec<StackupLayer>,
    pub components: Vec<Component>,
    pub conn_objs: Vec<ConnObj>,
    pub materials: MaterialLib,
    pub power_luts: Vec<LookupTable1D>,
}

impl Layout {
    pub fn new<S: Into<String>>(name: S, coord_unit: CoordUnit, boundary: Polygon) -> Self {
        Self {
            name: name.into(),
            coord_unit,
            boundary,
            nets: Vec::new(),
            layers: Vec::new(),
            components: Vec::new(),
            conn_objs: Vec::new(),
            materials: MaterialLib::new("mat_lib"),
            power_luts: Vec::new(),
        }
    }

    pub fn add_net<S: Into<String>>(&mut self, name: S) -> usize {
        self.nets.push(Net { name: name.into() });
        self.nets.len() - 1
    }

    pub fn add_layer(&mut self, layer: StackupLayer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn add_component(&mut self, component: Component) -> usize {
        self.components.push(component);
        self.components.len() - 1
    }

    pub fn add_conn_obj(&mut self, obj: ConnObj) -> usize {
        self.conn_objs.push(obj);
        self.conn_objs.len() - 1
    }

    pub fn add_power_lut(&mut self, lut: LookupTable1D) -> usize {
        self.power_luts.push(lut);
        self.power_luts.len() - 1
    }

    /// Iterador reiniciable sobre las capas del apilado
    pub fn stackup_layers(&self) -> impl Iterator<Item = (usize, &StackupLayer)> {
        self.layers.iter().enumerate()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn conn_objs(&self) -> impl Iterator<Item = &ConnObj> {
        self.conn_objs.iter()
    }

    pub fn get_layer(&self, id: usize) -> Option<&StackupLayer> {
        self.layers.get(id)
    }

    /// El problema térmico depende de la temperatura si lo hacen los
    /// materiales o alguna tabla de potencia
    pub fn is_temperature_dependent(&self) -> bool {
        self.materials.is_temperature_dependent()
            || self.power_luts.iter().any(|l| l.is_temperature_dependent())
    }

    /// Comprueba la coherencia interna de las referencias del trazado
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        use anyhow::ensure;

        let check_mat = |mat: Option<usize>, what: &str| -> Result<(), anyhow::Error> {
            if let Some(id) = mat {
                ensure!(
                    self.materials.get(id).is_some(),
                    "material {} desconocido en {}",
                    id,
                    what
                );
            }
            Ok(())
        };
        for layer in &self.layers {
            check_mat(layer.conducting_mat, &layer.name)?;
            check_mat(layer.dielectric_mat, &layer.name)?;
        }
        for component in &self.components {
            ensure!(
                component.assembly_layer < self.layers.len(),
                "el componente '{}' referencia una capa de ensamblado inexistente",
                component.name
            );
            check_mat(component.material, &component.name)?;
            check_mat(component.assembly.solder_filling_material, &component.name)?;
            if let Some(loss_power) = component.loss_power {
                ensure!(
                    loss_power.lut < self.power_luts.len(),
                    "el componente '{}' referencia una tabla de potencia inexistente",
                    component.name
                );
            }
        }
        for obj in &self.conn_objs {
            match obj {
                ConnObj::RoutingWire(rw) => {
                    ensure!(
                        rw.layer < self.layers.len(),
                        "pista sobre una capa de apilado inexistente"
                    );
                }
                ConnObj::PadstackInst(ps) => {
                    ensure!(
                        ps.layer_range.0 <= ps.layer_range.1,
                        "rango de capas de padstack invertido"
                    );
                    check_mat(ps.material, "padstack")?;
                }
                ConnObj::BondingWire(bw) => {
                    check_mat(bw.material, "hilo de soldadura")?;
                }
            }
        }
        log::debug!(
            "trazado '{}' validado: {} capas, {} componentes, {} conexiones",
            self.name,
            self.layers.len(),
            self.components.len(),
            self.conn_objs.len()
        );
        Ok(())
    }
}
