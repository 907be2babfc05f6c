// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Modelo térmico volumétrico de encapsulados electrónicos 2.5D
//!
//! A partir de la base de datos del trazado (`epkg`) se construye un modelo de
//! apilado cortado en rebanadas verticales, se triangula cada plantilla de
//! capa, se levantan elementos prismáticos con su vecindad, se ensambla una
//! red térmica de resistencias y capacidades y se resuelve el sistema lineal
//! disperso hasta el punto fijo de las propiedades dependientes de la
//! temperatura.
//!
//! Flujo de datos:
//! `Layout ─► LayerStackupModel ─► PrismThermalModel ─► ThermalNetwork ─► T`

pub mod common;
pub mod io;
pub mod mesh;
pub mod network;
pub mod prism;
pub mod simulation;
pub mod solver;
pub mod stackup;
pub mod vtk;

pub use common::{
    BcType, BoundaryConditionSettings, LayerStackupSettings, Orientation,
    PrismMeshSettings, PrismModelExtractionSettings, ThermalBoundaryCondition,
};
pub use mesh::{generate_mesh, PrismTemplate, TriangleElement};
pub use network::{NetworkBuildSummary, ThermalNetwork};
pub use prism::{
    create_prism_stackup_thermal_model, create_prism_thermal_model, create_thermal_model, Contact,
    LineElement, PrismElement, PrismInstance, PrismLayer, PrismThermalModel, VerticalLink,
};
pub use simulation::{
    PrismStackupThermalSimulation, PrismThermalSimulation, SimulationSetup,
    ThermalTransientExcitation,
};
pub use solver::{
    PrismStackupThermalNetworkStaticSolver, PrismThermalNetworkStaticSolver, SolverSettings,
};
pub use stackup::{create_layer_stackup_model, LayerStackupModel};

/// Versión del programa
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
