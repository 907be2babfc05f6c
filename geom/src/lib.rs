// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Geometría 2D sobre retícula entera para el modelado térmico de encapsulados
//!
//! Las coordenadas de trazado se almacenan como enteros (NCoord) y los valores
//! físicos se obtienen multiplicando por la escala de la unidad de coordenadas.

mod bbox;
mod hull;
mod polygon;
mod segment;
mod triangle;

pub use bbox::Box2;
pub use hull::convex_hull;
pub use polygon::{centroid, contains, is_ccw, perimeter, polygon_area, signed_area2, Polygon};
pub use segment::{intersect_segments, SegmentIntersection};
pub use triangle::{
    point_segment_distance_sq, triangle_area, triangle_center, triangle_intersection_area,
};

/// Coordenada entera de retícula
pub type NCoord = i64;
/// Punto 2D en coordenadas de retícula
pub type Point2 = nalgebra::Point2<NCoord>;
/// Punto 2D en coma flotante (unidades de trazado o metros)
pub type FPoint2 = nalgebra::Point2<f64>;
/// Punto 3D en coma flotante
pub type FPoint3 = nalgebra::Point3<f64>;
/// Vector 2D en coma flotante
pub type FVector2 = nalgebra::Vector2<f64>;

/// Conversión de punto de retícula a coma flotante
#[inline]
pub fn to_fpoint(p: &Point2) -> FPoint2 {
    FPoint2::new(p.x as f64, p.y as f64)
}

/// Redondeo de punto en coma flotante a la retícula
#[inline]
pub fn to_npoint(p: &FPoint2) -> Point2 {
    Point2::new(p.x.round() as NCoord, p.y.round() as NCoord)
}
