// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Fachada de simulación térmica sobre el modelo de prismas
//!
//! Resuelve el régimen estacionario con los puntos de observación traducidos
//! a sondas de elemento. El transitorio expone su interfaz pero no está
//! implementado; un integrador explícito sobre `C·dx/dt = −G·x + B·u(t)`
//! encajaría sin tocar la fachada.

use geom::FPoint3;

use epkg::Layout;

use crate::prism::PrismThermalModel;
use crate::solver::{
    PrismStackupThermalNetworkStaticSolver, PrismThermalNetworkStaticSolver, SolverSettings,
};

/// Excitación transitoria: factor de escala por instante y escenario
pub type ThermalTransientExcitation = dyn Fn(f64, usize) -> f64;

/// Preparación de una simulación térmica
#[derive(Debug, Clone, Default)]
pub struct SimulationSetup {
    /// Puntos de observación en unidades de usuario
    pub monitors: Vec<FPoint3>,
    pub solver: SolverSettings,
}

/// Simulación sobre un modelo de plantilla única
pub struct PrismThermalSimulation<'a> {
    model: &'a PrismThermalModel,
    layout: &'a Layout,
    setup: SimulationSetup,
}

impl<'a> PrismThermalSimulation<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout, setup: SimulationSetup) -> Self {
        Self {
            model,
            layout,
            setup,
        }
    }

    /// Régimen estacionario; devuelve [T mínima, T máxima] y las temperaturas
    /// de los puntos de observación
    pub fn run_static(&self, temperatures: &mut Vec<f64>) -> [f64; 2] {
        let mut solver = PrismThermalNetworkStaticSolver::new(self.model, self.layout);
        solver.settings = self.setup.solver.clone();
        solver.settings.probs = self.model.search_element_indices(&self.setup.monitors);
        solver.solve(temperatures)
    }

    /// Régimen transitorio: interfaz expuesta, sin implementación
    pub fn run_transient(&self, _excitation: &ThermalTransientExcitation) -> Option<[f64; 2]> {
        None
    }
}

/// Simulación sobre un modelo de apilado
pub struct PrismStackupThermalSimulation<'a> {
    model: &'a PrismThermalModel,
    layout: &'a Layout,
    setup: SimulationSetup,
}

impl<'a> PrismStackupThermalSimulation<'a> {
    pub fn new(model: &'a PrismThermalModel, layout: &'a Layout, setup: SimulationSetup) -> Self {
        Self {
            model,
            layout,
            setup,
        }
    }

    /// Régimen estacionario; devuelve [T mínima, T máxima] y las temperaturas
    /// de los puntos de observación
    pub fn run_static(&self, temperatures: &mut Vec<f64>) -> [f64; 2] {
        let mut solver = PrismStackupThermalNetworkStaticSolver::new(self.model, self.layout);
        solver.settings = self.setup.solver.clone();
        solver.settings.probs = self.model.search_element_indices(&self.setup.monitors);
        solver.solve(temperatures)
    }

    /// Régimen transitorio: interfaz expuesta, sin implementación
    pub fn run_transient(&self, _excitation: &ThermalTransientExcitation) -> Option<[f64; 2]> {
        None
    }
}
