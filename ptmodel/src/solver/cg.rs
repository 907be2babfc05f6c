// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Gradiente conjugado con precondicionador de Jacobi sobre matrices CSR
//!
//! G es simétrica definida positiva: las entradas fuera de la diagonal son
//! `-1/R` y la diagonal acumula `Σ 1/R + htc`, de modo que el gradiente
//! conjugado con escalado diagonal converge sin factorizaciones.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

/// Resultado de la resolución iterativa
#[derive(Debug, Clone, Copy)]
pub struct CgReport {
    pub iterations: usize,
    /// Residuo relativo ‖b − Ax‖ / ‖b‖
    pub error: f64,
}

/// Producto matriz dispersa × vector
fn spmv(a: &CsrMatrix<f64>, x: &DVector<f64>, y: &mut DVector<f64>) {
    y.fill(0.0);
    for (i, j, v) in a.triplet_iter() {
        y[i] += v * x[j];
    }
}

/// Resuelve `A·x = b` por gradiente conjugado precondicionado con la diagonal
pub fn solve_jacobi_cg(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> (DVector<f64>, CgReport) {
    let n = b.len();
    let mut x = DVector::zeros(n);
    let b_norm = b.norm();
    if n == 0 || b_norm == 0.0 {
        return (
            x,
            CgReport {
                iterations: 0,
                error: 0.0,
            },
        );
    }

    let mut diag = DVector::from_element(n, 1.0);
    for (i, j, v) in a.triplet_iter() {
        if i == j && *v != 0.0 {
            diag[i] = *v;
        }
    }
    let m_inv = diag.map(|d| if d.abs() > 0.0 { 1.0 / d } else { 1.0 });

    let mut r = b.clone();
    let mut z = m_inv.component_mul(&r);
    let mut p = z.clone();
    let mut rz = r.dot(&z);
    let mut ap = DVector::zeros(n);
    let mut error = 1.0;
    let mut iterations = 0;

    for it in 0..max_iter {
        iterations = it + 1;
        spmv(a, &p, &mut ap);
        let pap = p.dot(&ap);
        if pap.abs() <= f64::MIN_POSITIVE {
            break;
        }
        let alpha = rz / pap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);
        error = r.norm() / b_norm;
        if error <= tol {
            break;
        }
        z = m_inv.component_mul(&r);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        rz = rz_new;
        p *= beta;
        p += &z;
    }

    (x, CgReport { iterations, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn sistema_pequeno() {
        // laplaciano 1D de 4 nodos con diagonal reforzada
        let n = 4;
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 3.0);
            if i + 1 < n {
                coo.push(i, i + 1, -1.0);
                coo.push(i + 1, i, -1.0);
            }
        }
        let a = CsrMatrix::from(&coo);
        let b = DVector::from_element(n, 1.0);
        let (x, report) = solve_jacobi_cg(&a, &b, 1e-12, 100);
        assert!(report.error <= 1e-12);
        // comprobación del residuo
        let mut ax = DVector::zeros(n);
        spmv(&a, &x, &mut ax);
        assert!((ax - b).norm() < 1e-9);
    }
}
