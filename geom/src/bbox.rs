// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Caja alineada con los ejes sobre la retícula entera

use serde::{Deserialize, Serialize};

use crate::{NCoord, Point2};

/// Caja 2D alineada con los ejes, definida por sus esquinas extremas
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Box2 {
    pub min: Point2,
    pub max: Point2,
}

impl Box2 {
    pub fn new(min: Point2, max: Point2) -> Self {
        Self {
            min: Point2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Point2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// Caja envolvente de una colección de puntos. None si está vacía
    pub fn from_points<'a, I: IntoIterator<Item = &'a Point2>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Box2 {
            min: *first,
            max: *first,
        };
        for p in iter {
            bbox.expand(p);
        }
        Some(bbox)
    }

    /// Amplía la caja para incluir el punto
    pub fn expand(&mut self, p: &Point2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Unión con otra caja
    pub fn join(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn width(&self) -> NCoord {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> NCoord {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    pub fn center(&self) -> Point2 {
        Point2::new((self.min.x + self.max.x) / 2, (self.min.y + self.max.y) / 2)
    }

    pub fn contains_point(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Contorno CCW de la caja
    pub fn to_polygon(&self) -> Vec<Point2> {
        vec![
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_basico() {
        let pts = vec![
            Point2::new(2, 3),
            Point2::new(-1, 5),
            Point2::new(4, -2),
        ];
        let bbox = Box2::from_points(&pts).unwrap();
        assert_eq!(bbox.min, Point2::new(-1, -2));
        assert_eq!(bbox.max, Point2::new(4, 5));
        assert!(bbox.contains_point(&Point2::new(0, 0)));
        assert!(!bbox.contains_point(&Point2::new(5, 0)));
        assert!(crate::is_ccw(&bbox.to_polygon()));
    }
}
