// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Unidades de coordenadas y de temperatura
//!
//! Las coordenadas de trazado son enteros de retícula (NCoord); la unidad de
//! usuario (p. ej. mm) y el metro se obtienen con los factores de escala de
//! `CoordUnit`.

use serde::{Deserialize, Serialize};

use geom::{Box2, FPoint2, NCoord, Point2};

/// Desplazamiento del cero Celsius en Kelvin
pub const KELVIN_OFFSET: f64 = 273.15;

/// Unidad de longitud del trazado
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    Micrometer,
    Millimeter,
    Meter,
}

impl LengthUnit {
    /// Metros por unidad
    pub fn meters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Micrometer => 1e-6,
            LengthUnit::Millimeter => 1e-3,
            LengthUnit::Meter => 1.0,
        }
    }
}

/// Unidad de coordenadas del trazado
///
/// `precision` es el número de coordenadas de retícula por unidad de usuario
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordUnit {
    pub unit: LengthUnit,
    pub precision: f64,
}

impl Default for CoordUnit {
    fn default() -> Self {
        // retícula de 1 µm sobre trazados en mm
        Self {
            unit: LengthUnit::Millimeter,
            precision: 1000.0,
        }
    }
}

impl CoordUnit {
    pub fn new(unit: LengthUnit, precision: f64) -> Self {
        Self { unit, precision }
    }

    /// Unidades de usuario por coordenada de retícula
    pub fn scale2unit(&self) -> f64 {
        1.0 / self.precision
    }

    /// Metros por unidad de usuario
    pub fn scale2meter(&self) -> f64 {
        self.unit.meters_per_unit()
    }

    /// Convierte un valor en unidades de usuario a coordenadas
    pub fn to_coord(&self, v: f64) -> NCoord {
        (v * self.precision).round() as NCoord
    }

    /// Convierte un punto en unidades de usuario a coordenadas
    pub fn to_coord_point(&self, p: &FPoint2) -> Point2 {
        Point2::new(self.to_coord(p.x), self.to_coord(p.y))
    }

    /// Convierte una caja en unidades de usuario a coordenadas
    pub fn to_coord_box(&self, b: &FBox2) -> Box2 {
        Box2::new(self.to_coord_point(&b.min), self.to_coord_point(&b.max))
    }

    /// Convierte una coordenada de retícula a unidades de usuario
    pub fn to_unit(&self, c: NCoord) -> f64 {
        c as f64 / self.precision
    }
}

/// Caja 2D en unidades de usuario (para condiciones de contorno y cajas de imprimación)
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FBox2 {
    pub min: FPoint2,
    pub max: FPoint2,
}

impl FBox2 {
    pub fn new(min: FPoint2, max: FPoint2) -> Self {
        Self {
            min: FPoint2::new(min.x.min(max.x), min.y.min(max.y)),
            max: FPoint2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }
}

/// Unidad de temperatura
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempUnit {
    Celsius,
    Kelvin,
}

/// Temperatura con unidad
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TempUnit,
}

impl Temperature {
    pub fn celsius(value: f64) -> Self {
        Self {
            value,
            unit: TempUnit::Celsius,
        }
    }

    pub fn kelvin(value: f64) -> Self {
        Self {
            value,
            unit: TempUnit::Kelvin,
        }
    }

    pub fn in_kelvins(&self) -> f64 {
        match self.unit {
            TempUnit::Celsius => celsius2kelvin(self.value),
            TempUnit::Kelvin => self.value,
        }
    }

    pub fn in_celsius(&self) -> f64 {
        match self.unit {
            TempUnit::Celsius => self.value,
            TempUnit::Kelvin => kelvin2celsius(self.value),
        }
    }
}

#[inline]
pub fn celsius2kelvin(v: f64) -> f64 {
    v + KELVIN_OFFSET
}

#[inline]
pub fn kelvin2celsius(v: f64) -> f64 {
    v - KELVIN_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unidades_de_coordenadas() {
        let cu = CoordUnit::default();
        assert_eq!(cu.to_coord(1.5), 1500);
        assert!((cu.to_unit(1500) - 1.5).abs() < 1e-12);
        assert!((cu.scale2meter() - 1e-3).abs() < 1e-18);
        // 1 coordenada = 1 µm
        assert!((cu.scale2unit() * cu.scale2meter() - 1e-6).abs() < 1e-18);
    }

    #[test]
    fn temperaturas() {
        let t = Temperature::celsius(25.0);
        assert!((t.in_kelvins() - 298.15).abs() < 1e-12);
        assert!((Temperature::kelvin(298.15).in_celsius() - 25.0).abs() < 1e-12);
    }
}
