// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Base de datos de encapsulados electrónicos: apilado de capas, materiales,
//! componentes y objetos de conexión
//!
//! El modelo térmico consume esta base de datos a través de interfaces
//! estrechas: iteradores sobre capas, componentes y conexiones, la biblioteca
//! de materiales con propiedades dependientes de la temperatura y el
//! `LayoutRetriever` que resuelve alturas y muestrea hilos de soldadura.

pub mod layout;
pub mod material;
pub mod retriever;
pub mod units;

pub use layout::{
    AssemblyInfo, BondingWire, Component, ConnObj, Layout, LossPower, Net, PadstackInst,
    RoutingWire, Shape, SolderJoint, StackupLayer,
};
pub use material::{LookupTable1D, MatProp, MatPropKind, Material, MaterialLib, MaterialType};
pub use retriever::LayoutRetriever;
pub use units::{
    celsius2kelvin, kelvin2celsius, CoordUnit, FBox2, LengthUnit, TempUnit, Temperature,
    KELVIN_OFFSET,
};

/// Versión del programa
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
