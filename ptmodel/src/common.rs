// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Tipos comunes: orientaciones, condiciones de contorno y ajustes de extracción

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use epkg::FBox2;

/// Cara del modelo sobre la que actúa una condición de contorno
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Top,
    Bot,
}

impl Orientation {
    /// Índice de la orientación en las tablas [top, bot]
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Orientation::Top => 0,
            Orientation::Bot => 1,
        }
    }
}

/// Clase de condición de contorno térmica
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BcType {
    /// Coeficiente de película [W/m²·K]
    Htc,
    /// Flujo de calor [W/m²]
    HeatFlux,
    /// Temperatura impuesta [K]
    Temperature,
}

/// Condición de contorno térmica
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalBoundaryCondition {
    pub bc_type: BcType,
    pub value: f64,
}

impl ThermalBoundaryCondition {
    pub fn new(bc_type: BcType, value: f64) -> Self {
        Self { bc_type, value }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }
}

/// Ajustes de extracción del modelo de apilado (C1/C2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStackupSettings {
    /// Nodos de malla forzados en los centros de los círculos
    pub add_circle_center_as_steiner_point: bool,
    /// Escala vertical = 10^k; mayor precisión conserva más rebanadas
    pub layer_cut_precision: u32,
    /// Cociente máximo de espesores entre rebanadas adyacentes (≥ 1)
    pub layer_transition_ratio: f64,
    /// Rectángulos guía adicionales para la malla, en unidades de usuario
    pub imprint_boxes: Vec<FBox2>,
    /// Fusión previa de polígonos por capa y (red, material)
    pub merge_polygons: bool,
    /// Hilos de trabajo (0 = automático, 1 = secuencial)
    pub threads: usize,
}

impl Default for LayerStackupSettings {
    fn default() -> Self {
        Self {
            add_circle_center_as_steiner_point: false,
            layer_cut_precision: 6,
            layer_transition_ratio: 2.0,
            imprint_boxes: Vec::new(),
            merge_polygons: false,
            threads: 1,
        }
    }
}

/// Ajustes del generador de mallas de prismas (C3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismMeshSettings {
    /// Volcado WKT/VTK de la malla al directorio de trabajo
    pub dump_mesh_file: bool,
    /// Una triangulación por conjunto de polígonos de capa (variante de apilado)
    pub gen_mesh_by_layer: bool,
    /// Imprime los polígonos de la capa superior en la malla de la actual
    pub imprint_upper_layer: bool,
    /// Ángulo mínimo de los triángulos [grados], en (0, 60)
    pub min_alpha: f64,
    /// Longitud mínima de arista, en unidades de usuario
    pub min_len: f64,
    /// Longitud máxima de arista, en unidades de usuario
    pub max_len: f64,
    /// Radio de fusión de puntos próximos, en unidades de usuario
    pub tolerance: f64,
    /// Tope de iteraciones (vértices añadidos) del refinado
    pub max_iter: usize,
    /// Troceado previo de aristas más largas que max_len
    pub pre_split_edge: bool,
    /// Siembra de puntos desde un quadtree equilibrado sobre la envolvente
    pub add_balanced_points: bool,
    /// Informe de calidad de malla en el registro
    pub report_mesh_quality: bool,
    /// Directorio de trabajo para los volcados
    pub work_dir: PathBuf,
    /// Hilos de trabajo (0 = automático, 1 = secuencial)
    pub threads: usize,
}

impl Default for PrismMeshSettings {
    fn default() -> Self {
        Self {
            dump_mesh_file: false,
            gen_mesh_by_layer: false,
            imprint_upper_layer: false,
            min_alpha: 15.0,
            min_len: 1e-2,
            max_len: 3.0,
            tolerance: 0.0,
            max_iter: 10_000,
            pre_split_edge: false,
            add_balanced_points: false,
            report_mesh_quality: false,
            work_dir: PathBuf::from("."),
            threads: 1,
        }
    }
}

/// Condiciones de contorno del modelo: uniformes y por bloques, por cara
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryConditionSettings {
    /// Condición uniforme [top, bot]
    pub uniform_bcs: [Option<ThermalBoundaryCondition>; 2],
    /// Condiciones por bloque (caja en unidades de usuario) [top, bot]
    pub block_bcs: [Vec<(FBox2, ThermalBoundaryCondition)>; 2],
}

impl BoundaryConditionSettings {
    pub fn set_top_uniform_bc(&mut self, bc_type: BcType, value: f64) {
        self.uniform_bcs[0] = Some(ThermalBoundaryCondition::new(bc_type, value));
    }

    pub fn set_bot_uniform_bc(&mut self, bc_type: BcType, value: f64) {
        self.uniform_bcs[1] = Some(ThermalBoundaryCondition::new(bc_type, value));
    }

    pub fn add_block_bc(&mut self, ori: Orientation, bbox: FBox2, bc_type: BcType, value: f64) {
        self.block_bcs[ori.index()].push((bbox, ThermalBoundaryCondition::new(bc_type, value)));
    }
}

/// Ajustes completos de extracción del modelo térmico de prismas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismModelExtractionSettings {
    pub layer_settings: LayerStackupSettings,
    pub mesh_settings: PrismMeshSettings,
    pub bc_settings: BoundaryConditionSettings,
}

/// Ejecuta el cierre sobre un pool de rayon con el número de hilos pedido
///
/// `threads == 0` delega el tamaño en rayon; `threads == 1` es el modo
/// secuencial obligatorio
pub(crate) fn with_thread_pool<R: Send>(threads: usize, f: impl FnOnce() -> R + Send) -> R {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(f),
        Err(e) => {
            log::warn!("no se pudo crear el pool de hilos ({}); modo secuencial", e);
            f()
        }
    }
}
