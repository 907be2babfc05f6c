// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Intersección de segmentos en coma flotante
//!
//! Se usa durante la preparación de la malla para trocear los lados de los
//! polígonos en sus cruces antes de la triangulación restringida.

use crate::FPoint2;

/// Resultado de intersecar dos segmentos
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentIntersection {
    /// Sin intersección
    None,
    /// Cruce en un punto (incluye contactos en extremos)
    Point(FPoint2),
    /// Solape colineal entre dos puntos
    Overlap(FPoint2, FPoint2),
}

const EPS: f64 = 1e-12;

/// Interseca los segmentos (a1, a2) y (b1, b2)
pub fn intersect_segments(
    a1: &FPoint2,
    a2: &FPoint2,
    b1: &FPoint2,
    b2: &FPoint2,
) -> SegmentIntersection {
    let r = a2 - a1;
    let s = b2 - b1;
    let qp = b1 - a1;
    let rxs = r.x * s.y - r.y * s.x;
    let qpxr = qp.x * r.y - qp.y * r.x;

    if rxs.abs() < EPS {
        if qpxr.abs() > EPS {
            // paralelos no colineales
            return SegmentIntersection::None;
        }
        // colineales: proyección sobre r
        let rr = r.x * r.x + r.y * r.y;
        if rr < EPS {
            return SegmentIntersection::None;
        }
        let t0 = (qp.x * r.x + qp.y * r.y) / rr;
        let t1 = t0 + (s.x * r.x + s.y * r.y) / rr;
        let (tmin, tmax) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
        let lo = tmin.max(0.0);
        let hi = tmax.min(1.0);
        if hi < lo - EPS {
            return SegmentIntersection::None;
        }
        let p_lo = FPoint2::new(a1.x + r.x * lo, a1.y + r.y * lo);
        let p_hi = FPoint2::new(a1.x + r.x * hi, a1.y + r.y * hi);
        if (hi - lo).abs() < EPS {
            return SegmentIntersection::Point(p_lo);
        }
        return SegmentIntersection::Overlap(p_lo, p_hi);
    }

    let t = (qp.x * s.y - qp.y * s.x) / rxs;
    let u = qpxr / rxs;
    if (-EPS..=1.0 + EPS).contains(&t) && (-EPS..=1.0 + EPS).contains(&u) {
        SegmentIntersection::Point(FPoint2::new(a1.x + r.x * t, a1.y + r.y * t))
    } else {
        SegmentIntersection::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cruce_simple() {
        let res = intersect_segments(
            &FPoint2::new(0.0, 0.0),
            &FPoint2::new(10.0, 10.0),
            &FPoint2::new(0.0, 10.0),
            &FPoint2::new(10.0, 0.0),
        );
        assert_eq!(res, SegmentIntersection::Point(FPoint2::new(5.0, 5.0)));
    }

    #[test]
    fn sin_cruce() {
        let res = intersect_segments(
            &FPoint2::new(0.0, 0.0),
            &FPoint2::new(1.0, 0.0),
            &FPoint2::new(0.0, 1.0),
            &FPoint2::new(1.0, 1.0),
        );
        assert_eq!(res, SegmentIntersection::None);
    }

    #[test]
    fn solape_colineal() {
        let res = intersect_segments(
            &FPoint2::new(0.0, 0.0),
            &FPoint2::new(10.0, 0.0),
            &FPoint2::new(5.0, 0.0),
            &FPoint2::new(15.0, 0.0),
        );
        match res {
            SegmentIntersection::Overlap(p, q) => {
                assert!((p.x - 5.0).abs() < 1e-9);
                assert!((q.x - 10.0).abs() < 1e-9);
            }
            other => panic!("esperaba solape, se obtuvo {:?}", other),
        }
    }
}
