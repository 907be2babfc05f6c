// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Resolución estática de la red térmica (C8)
//!
//! Iteración de Picard sobre las propiedades dependientes de la temperatura:
//! en cada pasada se reensambla la red a las temperaturas del iterado previo,
//! se eliminan los nodos de temperatura fija y se resuelve el sistema
//! disperso con gradiente conjugado precondicionado. Converge cuando el
//! residuo entre iterados baja del umbral o se agotan las iteraciones.

mod cg;
mod mna;

pub use cg::{solve_jacobi_cg, CgReport};
pub use mna::{make_mna, make_rhs, MnaSystem};

use std::path::PathBuf;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use epkg::{kelvin2celsius, Layout, TempUnit, Temperature};

use crate::network::{
    PrismStackupThermalNetworkBuilder, PrismThermalNetworkBuilder, ThermalNetworkBuilder,
};
use crate::prism::PrismThermalModel;

/// Tolerancia relativa del gradiente conjugado
const CG_TOL: f64 = 1e-10;

/// Ajustes del resolutor estático
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Umbral de convergencia del punto fijo [K]
    pub residual: f64,
    /// Tope de iteraciones de Picard
    pub max_iter: usize,
    /// Residuo como máximo de |ΔT| en lugar de la media
    pub maximum_res: bool,
    /// Índices globales de elemento a observar
    pub probs: Vec<usize>,
    /// Temperatura ambiente de referencia
    pub env_t: Temperature,
    /// Amortiguación del punto fijo: T ← α·T_nueva + (1−α)·T_previa
    pub damping: f64,
    /// Volcado VTK del campo de temperaturas
    pub dump_hotmap: bool,
    /// Directorio de trabajo para los volcados
    pub work_dir: PathBuf,
    /// Hilos de trabajo del ensamblado (0 = automático, 1 = secuencial)
    pub threads: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            residual: 0.1,
            max_iter: 10,
            maximum_res: true,
            probs: Vec::new(),
            env_t: Temperature::celsius(25.0),
            damping: 1.0,
            dump_hotmap: false,
            work_dir: PathBuf::from("."),
            threads: 1,
        }
    }
}

/// Residuo entre dos iterados: máximo o media de |ΔT|
fn calculate_residual(v1: &[f64], v2: &[f64], maximum_res: bool) -> f64 {
    debug_assert_eq!(v1.len(), v2.len());
    if v1.is_empty() {
        return 0.0;
    }
    if maximum_res {
        v1.iter()
            .zip(v2)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    } else {
        v1.iter().zip(v2).map(|(a, b)| (a - b).abs()).sum::<f64>() / v1.len() as f64
    }
}

/// Resolutor estático genérico sobre un ensamblador de red
pub struct ThermalNetworkStaticSolver {
    pub settings: SolverSettings,
}

impl ThermalNetworkStaticSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Itera hasta el punto fijo; devuelve las temperaturas por elemento, el
    /// residuo del último iterado y las iteraciones consumidas
    ///
    /// Sin convergencia se devuelve el último iterado, nunca un error
    pub fn solve<B: ThermalNetworkBuilder>(&self, builder: &B) -> (Vec<f64>, f64, usize) {
        let env_t = self.settings.env_t.in_kelvins();
        let total = builder.model().total_elements();
        let mut results = vec![env_t; total];

        // sin dependencia térmica el sistema es lineal y basta una pasada
        let needs_iteration = builder.layout().is_temperature_dependent();
        let max_iter = if needs_iteration {
            self.settings.max_iter.max(1)
        } else {
            1
        };

        let mut residual = f64::MAX;
        let mut iteration = 0;
        loop {
            let (network, summary) = builder.build(&results);
            debug!(
                "tamaño de la matriz: {}, Joule: {:.4} W, entrante: {:.4} W, saliente: {:.4} W",
                network.matrix_size(),
                summary.joule_heat,
                summary.i_heat_flow,
                summary.o_heat_flow
            );

            let mut new_results = results.clone();
            for i in 0..network.node_size() {
                if let Some(t) = network.get_t(i) {
                    new_results[i] = t;
                }
            }

            let mna = make_mna(&network, &[]);
            let rhs = make_rhs(&network, env_t);
            let max_cg = 10 * network.matrix_size() + 100;
            let (x, report) = solve_jacobi_cg(&mna.g, &rhs, CG_TOL, max_cg);
            debug!(
                "CG: {} iteraciones, error {:.3e}",
                report.iterations, report.error
            );
            for mid in 0..network.matrix_size() {
                new_results[network.node_id(mid)] = x[mid];
            }

            let alpha = self.settings.damping.clamp(0.0, 1.0);
            if alpha < 1.0 {
                for (new, old) in new_results.iter_mut().zip(&results) {
                    *new = alpha * *new + (1.0 - alpha) * old;
                }
            }

            residual = calculate_residual(&results, &new_results, self.settings.maximum_res);
            results = new_results;
            iteration += 1;
            debug!(
                "iteración P-T {}: residuo {:.4}, T máx {:.2} °C",
                iteration,
                residual,
                kelvin2celsius(results.iter().copied().fold(f64::MIN, f64::max))
            );
            if residual <= self.settings.residual || iteration >= max_iter {
                break;
            }
        }

        if self.settings.env_t.unit == TempUnit::Celsius {
            for t in results.iter_mut() {
                *t = kelvin2celsius(*t);
            }
        }
        (results, residual, iteration)
    }
}

/// Extremos y sondas del campo resuelto
fn collect_results(
    model: &PrismThermalModel,
    settings: &SolverSettings,
    results: &[f64],
    temperatures: &mut Vec<f64>,
) -> [f64; 2] {
    temperatures.clear();
    if results.is_empty() {
        return [f64::NAN, f64::NAN];
    }
    let min = results.iter().copied().fold(f64::MAX, f64::min);
    let max = results.iter().copied().fold(f64::MIN, f64::max);
    temperatures.extend(settings.probs.iter().map(|&p| results[p]));
    if settings.dump_hotmap {
        let path = settings.work_dir.join("hotmap.vtk");
        if let Err(e) = model.write_vtk(&path, Some(results)) {
            warn!("no se pudo volcar el mapa térmico en {:?}: {}", path, e);
        }
    }
    [min, max]
}

/// Resolutor estático para modelos de plantilla única
pub struct PrismThermalNetworkStaticSolver<'a> {
    pub model: &'a PrismThermalModel,
    pub layout: &'a Layout,
    pub settings: SolverSettings,
}

impl<'a> PrismThermalNetworkStaticSolver<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout) -> Self {
        Self {
            model,
            layout,
            settings: SolverSettings::default(),
        }
    }

    /// Resuelve y devuelve [T mínima, T máxima]; `temperatures` recoge las sondas
    pub fn solve(&self, temperatures: &mut Vec<f64>) -> [f64; 2] {
        let builder =
            PrismThermalNetworkBuilder::new(self.model, self.layout, self.settings.threads);
        let solver = ThermalNetworkStaticSolver::new(self.settings.clone());
        let (results, residual, iterations) = solver.solve(&builder);
        debug!(
            "resolución estática: {} iteraciones, residuo final {:.4}",
            iterations, residual
        );
        collect_results(self.model, &self.settings, &results, temperatures)
    }
}

/// Resolutor estático para modelos de apilado
pub struct PrismStackupThermalNetworkStaticSolver<'a> {
    pub model: &'a PrismThermalModel,
    pub layout: &'a Layout,
    pub settings: SolverSettings,
}

impl<'a> PrismStackupThermalNetworkStaticSolver<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout) -> Self {
        Self {
            model,
            layout,
            settings: SolverSettings::default(),
        }
    }

    /// Resuelve y devuelve [T mínima, T máxima]; `temperatures` recoge las sondas
    pub fn solve(&self, temperatures: &mut Vec<f64>) -> [f64; 2] {
        let builder = PrismStackupThermalNetworkBuilder::new(
            self.model,
            self.layout,
            self.settings.threads,
        );
        let solver = ThermalNetworkStaticSolver::new(self.settings.clone());
        let (results, residual, iterations) = solver.solve(&builder);
        debug!(
            "resolución estática de apilado: {} iteraciones, residuo final {:.4}",
            iterations, residual
        );
        collect_results(self.model, &self.settings, &results, temperatures)
    }
}
