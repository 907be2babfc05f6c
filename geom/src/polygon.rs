// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Operaciones sobre polígonos de retícula entera
//!
//! El producto cruzado de dos aristas puede desbordar i64 con coordenadas
//! grandes, de modo que el área y la contención se acumulan en i128.

use crate::{FPoint2, Point2};

/// Polígono como secuencia de vértices sin repetir el primero
pub type Polygon = Vec<Point2>;

/// Doble del área con signo (fórmula del cordón)
///
/// Positivo para contornos CCW, negativo para CW
pub fn signed_area2(poly: &[Point2]) -> i128 {
    let n = poly.len();
    if n < 3 {
        return 0;
    }
    let mut acc: i128 = 0;
    for i in 0..n {
        let a = &poly[i];
        let b = &poly[(i + 1) % n];
        acc += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
    }
    acc
}

/// Área bruta del polígono, en unidades de retícula al cuadrado
pub fn polygon_area(poly: &[Point2]) -> f64 {
    (signed_area2(poly).abs() as f64) * 0.5
}

/// Orientación del contorno (true si es antihorario)
pub fn is_ccw(poly: &[Point2]) -> bool {
    signed_area2(poly) > 0
}

/// Perímetro del polígono, en unidades de retícula
pub fn perimeter(poly: &[Point2]) -> f64 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let a = &poly[i];
            let b = &poly[(i + 1) % n];
            let dx = (b.x - a.x) as f64;
            let dy = (b.y - a.y) as f64;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// Centroide del polígono
///
/// Para polígonos degenerados (área nula) devuelve la media de los vértices
pub fn centroid(poly: &[Point2]) -> FPoint2 {
    let n = poly.len();
    let area2 = signed_area2(poly);
    if n == 0 {
        return FPoint2::new(0.0, 0.0);
    }
    if area2 == 0 {
        let (sx, sy) = poly
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        return FPoint2::new(sx / n as f64, sy / n as f64);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = &poly[i];
        let b = &poly[(i + 1) % n];
        let cross = (a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128) as f64;
        cx += (a.x as f64 + b.x as f64) * cross;
        cy += (a.y as f64 + b.y as f64) * cross;
    }
    let inv = 1.0 / (3.0 * area2 as f64);
    FPoint2::new(cx * inv, cy * inv)
}

/// Contención punto-polígono por paridad de cruces (independiente de la orientación)
pub fn contains(poly: &[Point2], pt: &Point2) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let (px, py) = (pt.x as i128, pt.y as i128);
    let mut inside = false;
    for i in 0..n {
        let a = &poly[i];
        let b = &poly[(i + 1) % n];
        let (ax, ay) = (a.x as i128, a.y as i128);
        let (bx, by) = (b.x as i128, b.y as i128);
        if (ay > py) != (by > py) {
            // cruce del lado con la horizontal por pt, a la derecha del punto
            let d = (py - ay) * (bx - ax) - (px - ax) * (by - ay);
            let crosses = if by > ay { d > 0 } else { d < 0 };
            if crosses {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuadrado() -> Polygon {
        vec![
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(10, 10),
            Point2::new(0, 10),
        ]
    }

    #[test]
    fn area_y_orientacion() {
        let mut sq = cuadrado();
        assert_eq!(signed_area2(&sq), 200);
        assert!(is_ccw(&sq));
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-12);
        sq.reverse();
        assert!(!is_ccw(&sq));
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn contencion() {
        let sq = cuadrado();
        assert!(contains(&sq, &Point2::new(5, 5)));
        assert!(contains(&sq, &Point2::new(1, 9)));
        assert!(!contains(&sq, &Point2::new(11, 5)));
        assert!(!contains(&sq, &Point2::new(-1, -1)));
        // la contención no depende de la orientación
        let mut cw = sq.clone();
        cw.reverse();
        assert!(contains(&cw, &Point2::new(5, 5)));
    }

    #[test]
    fn centroide() {
        let sq = cuadrado();
        let c = centroid(&sq);
        assert!((c.x - 5.0).abs() < 1e-12);
        assert!((c.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn perimetro() {
        assert!((perimeter(&cuadrado()) - 40.0).abs() < 1e-12);
    }
}
