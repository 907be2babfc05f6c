// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Biblioteca de materiales y tablas de consulta
//!
//! Las propiedades pueden ser constantes, anisótropas por eje o polinómicas en
//! la temperatura (coeficientes en orden creciente de grado). Los materiales
//! fluidos solo se reconocen para excluirlos de la malla sólida.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Naturaleza del material
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialType {
    Solid,
    Fluid,
}

/// Clase de propiedad de material
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatPropKind {
    /// Conductividad térmica [W/m·K]
    ThermalConductivity,
    /// Calor específico [J/kg·K]
    SpecificHeat,
    /// Densidad [kg/m³]
    MassDensity,
    /// Resistividad eléctrica [Ω·m]
    Resistivity,
}

/// Propiedad de material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatProp {
    /// Valor constante e isótropo
    Value(f64),
    /// Valor constante por eje (x, y, z)
    Anisotropic([f64; 3]),
    /// Polinomios en T (Kelvin); una fila por eje, una sola fila si es isótropo
    Polynomial(Vec<Vec<f64>>),
}

fn eval_poly(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

impl MatProp {
    /// Valor escalar a la temperatura dada; None para propiedades anisótropas
    pub fn simple_property(&self, t: f64) -> Option<f64> {
        match self {
            MatProp::Value(v) => Some(*v),
            MatProp::Anisotropic(_) => None,
            MatProp::Polynomial(rows) => rows.first().map(|r| eval_poly(r, t)),
        }
    }

    /// Valor por eje (0 = x, 1 = y, 2 = z) a la temperatura dada
    pub fn anisotropic_property(&self, t: f64, axis: usize) -> Option<f64> {
        match self {
            MatProp::Value(v) => Some(*v),
            MatProp::Anisotropic(vs) => vs.get(axis).copied(),
            MatProp::Polynomial(rows) => {
                let row = rows.get(axis).or_else(|| rows.first())?;
                Some(eval_poly(row, t))
            }
        }
    }

    /// La propiedad varía con la temperatura
    pub fn is_temperature_dependent(&self) -> bool {
        match self {
            MatProp::Polynomial(rows) => rows.iter().any(|r| r.len() > 1),
            _ => false,
        }
    }
}

/// Material con propiedades térmicas y eléctricas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub mat_type: MaterialType,
    props: BTreeMap<MatPropKind, MatProp>,
}

impl Material {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            mat_type: MaterialType::Solid,
            props: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, mat_type: MaterialType) -> Self {
        self.mat_type = mat_type;
        self
    }

    pub fn with_property(mut self, kind: MatPropKind, prop: MatProp) -> Self {
        self.props.insert(kind, prop);
        self
    }

    pub fn set_property(&mut self, kind: MatPropKind, prop: MatProp) {
        self.props.insert(kind, prop);
    }

    pub fn property(&self, kind: MatPropKind) -> Option<&MatProp> {
        self.props.get(&kind)
    }

    pub fn is_fluid(&self) -> bool {
        self.mat_type == MaterialType::Fluid
    }

    pub fn is_temperature_dependent(&self) -> bool {
        self.props.values().any(|p| p.is_temperature_dependent())
    }
}

/// Biblioteca de materiales; los identificadores son índices de inserción
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialLib {
    pub name: String,
    materials: Vec<Material>,
}

impl MaterialLib {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            materials: Vec::new(),
        }
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn find<S: AsRef<str>>(&self, name: S) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name.as_ref())
    }

    pub fn get(&self, id: usize) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Material)> {
        self.materials.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn is_temperature_dependent(&self) -> bool {
        self.materials.iter().any(|m| m.is_temperature_dependent())
    }
}

/// Tabla de consulta 1D lineal a trozos sobre claves ordenadas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable1D {
    keys: Vec<f64>,
    values: Vec<f64>,
}

impl LookupTable1D {
    /// Construye la tabla; las claves deben estar ordenadas de forma creciente
    pub fn new(keys: Vec<f64>, values: Vec<f64>) -> Self {
        assert_eq!(keys.len(), values.len(), "tabla de consulta desparejada");
        assert!(!keys.is_empty(), "tabla de consulta vacía");
        assert!(
            keys.windows(2).all(|w| w[0] < w[1]),
            "claves de tabla sin ordenar"
        );
        Self { keys, values }
    }

    /// Interpola el valor en t; sin extrapolación se fija a los extremos
    pub fn lookup(&self, t: f64, extrapolate: bool) -> f64 {
        let n = self.keys.len();
        if n == 1 {
            return self.values[0];
        }
        let seg = |i: usize| {
            let (k0, k1) = (self.keys[i], self.keys[i + 1]);
            let (v0, v1) = (self.values[i], self.values[i + 1]);
            v0 + (v1 - v0) * (t - k0) / (k1 - k0)
        };
        if t <= self.keys[0] {
            return if extrapolate { seg(0) } else { self.values[0] };
        }
        if t >= self.keys[n - 1] {
            return if extrapolate {
                seg(n - 2)
            } else {
                self.values[n - 1]
            };
        }
        let i = match self
            .keys
            .binary_search_by(|k| k.partial_cmp(&t).expect("clave no comparable"))
        {
            Ok(i) => return self.values[i],
            Err(i) => i - 1,
        };
        seg(i)
    }

    /// El valor de la tabla varía con la clave
    pub fn is_temperature_dependent(&self) -> bool {
        self.values.windows(2).any(|w| (w[0] - w[1]).abs() > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propiedad_polinomica() {
        // conductividad del cobre en función de T
        let prop = MatProp::Polynomial(vec![vec![437.6, -0.165, 1.825e-4]]);
        let k300 = prop.simple_property(300.0).unwrap();
        assert!((k300 - (437.6 - 0.165 * 300.0 + 1.825e-4 * 300.0 * 300.0)).abs() < 1e-9);
        assert!(prop.is_temperature_dependent());
        assert!(!MatProp::Value(400.0).is_temperature_dependent());
    }

    #[test]
    fn propiedad_anisotropa() {
        let prop = MatProp::Anisotropic([10.0, 20.0, 30.0]);
        assert_eq!(prop.anisotropic_property(300.0, 2), Some(30.0));
        assert_eq!(prop.simple_property(300.0), None);
        // una propiedad isótropa responde igual en todos los ejes
        let iso = MatProp::Value(5.0);
        assert_eq!(iso.anisotropic_property(300.0, 0), Some(5.0));
        assert_eq!(iso.anisotropic_property(300.0, 2), Some(5.0));
    }

    #[test]
    fn tabla_de_consulta() {
        let lut = LookupTable1D::new(vec![300.0, 400.0], vec![10.0, 20.0]);
        assert!((lut.lookup(350.0, false) - 15.0).abs() < 1e-12);
        // sin extrapolación se fija a los extremos
        assert!((lut.lookup(200.0, false) - 10.0).abs() < 1e-12);
        assert!((lut.lookup(500.0, false) - 20.0).abs() < 1e-12);
        // con extrapolación sigue la pendiente
        assert!((lut.lookup(500.0, true) - 30.0).abs() < 1e-12);
        assert!(lut.is_temperature_dependent());
        let flat = LookupTable1D::new(vec![298.15], vec![20.0]);
        assert!((flat.lookup(1000.0, false) - 20.0).abs() < 1e-12);
        assert!(!flat.is_temperature_dependent());
    }

    #[test]
    fn biblioteca_de_materiales() {
        let mut lib = MaterialLib::new("mat_lib");
        let cu = lib.add_material(
            Material::new("Cu")
                .with_property(MatPropKind::ThermalConductivity, MatProp::Value(400.0)),
        );
        let air = lib.add_material(Material::new("Air").with_type(MaterialType::Fluid));
        assert_eq!(lib.find("Cu"), Some(cu));
        assert_eq!(lib.find("Air"), Some(air));
        assert!(lib.get(air).unwrap().is_fluid());
        assert!(!lib.is_temperature_dependent());
    }
}
