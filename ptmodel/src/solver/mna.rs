// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Ensamblado nodal modificado (MNA) de la red térmica
//!
//! G recoge conductancias y películas, C las capacidades, B la selección de
//! fuentes y L la observación (identidad o selección de sondas). Los nodos de
//! temperatura fija se eliminan: su acoplamiento pasa a la diagonal del
//! vecino incógnita y su aportación al término independiente.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::network::ThermalNetwork;

/// Sistema MNA disperso
pub struct MnaSystem {
    /// Matriz de conductancias [W/K], simétrica definida positiva
    pub g: CsrMatrix<f64>,
    /// Diagonal de capacidades [J/K]
    pub c: CsrMatrix<f64>,
    /// Selección de fuentes
    pub b: CsrMatrix<f64>,
    /// Selección de observación
    pub l: CsrMatrix<f64>,
}

/// Ensambla las matrices del sistema
///
/// El acoplamiento con nodos fijos se estampa desde cualquiera de los dos
/// extremos de la arista canónica, con independencia de cuál sea el fijo
pub fn make_mna(network: &ThermalNetwork, probs: &[usize]) -> MnaSystem {
    let ms = network.matrix_size();
    let ss = network.source_size();
    let mut tg = CooMatrix::new(ms, ms);
    let mut tc = CooMatrix::new(ms, ms);
    let mut tb = CooMatrix::new(ms, ss);

    for n1 in 0..network.node_size() {
        let m1 = network.matrix_id(n1);
        for (&n2, &r) in &network.node(n1).ns {
            let g = 1.0 / r;
            let m2 = network.matrix_id(n2);
            match (m1, m2) {
                (Some(a), Some(b)) => {
                    tg.push(a, a, g);
                    tg.push(b, b, g);
                    tg.push(a, b, -g);
                    tg.push(b, a, -g);
                }
                (Some(a), None) => tg.push(a, a, g),
                (None, Some(b)) => tg.push(b, b, g),
                (None, None) => {}
            }
        }
    }

    let mut source_col = 0;
    for mid in 0..ms {
        let nid = network.node_id(mid);
        let node = network.node(nid);
        if node.htc != 0.0 {
            tg.push(mid, mid, node.htc);
        }
        if node.c > 0.0 {
            tc.push(mid, mid, node.c);
        }
        if network.is_source(nid) && source_col < ss {
            tb.push(mid, source_col, 1.0);
            source_col += 1;
        }
    }

    let l = if probs.is_empty() {
        CsrMatrix::identity(ms)
    } else {
        let mut tl = CooMatrix::new(ms, probs.len());
        for (j, &p) in probs.iter().enumerate() {
            if let Some(mid) = network.matrix_id(p) {
                tl.push(mid, j, 1.0);
            } else {
                log::warn!("la sonda {} apunta a un nodo de temperatura fija", p);
            }
        }
        CsrMatrix::from(&tl)
    };

    MnaSystem {
        g: CsrMatrix::from(&tg),
        c: CsrMatrix::from(&tc),
        b: CsrMatrix::from(&tb),
        l,
    }
}

/// Término independiente: inyección, película a la temperatura de referencia
/// y aportación de los vecinos de temperatura fija
pub fn make_rhs(network: &ThermalNetwork, ref_t: f64) -> DVector<f64> {
    let ms = network.matrix_size();
    let mut rhs = DVector::zeros(ms);
    for mid in 0..ms {
        let node = network.node(network.node_id(mid));
        rhs[mid] = node.hf + node.htc * ref_t;
    }
    for n1 in 0..network.node_size() {
        let t1 = network.get_t(n1);
        let m1 = network.matrix_id(n1);
        for (&n2, &r) in &network.node(n1).ns {
            let t2 = network.get_t(n2);
            match (t1, t2) {
                (Some(t1), None) => {
                    if let Some(m2) = network.matrix_id(n2) {
                        rhs[m2] += t1 / r;
                    }
                }
                (None, Some(t2)) => {
                    if let Some(m1) = m1 {
                        rhs[m1] += t2 / r;
                    }
                }
                _ => {}
            }
        }
    }
    rhs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sistema_de_dos_nodos() {
        // nodo 0 fijo a 300 K, nodo 1 incógnita con R = 2 K/W y 1 W inyectado
        let mut network = ThermalNetwork::new(2);
        network.set_t(0, 300.0);
        network.set_r(0, 1, 2.0);
        network.add_hf(1, 1.0);
        network.build_index_map();

        let mna = make_mna(&network, &[]);
        let rhs = make_rhs(&network, 298.15);
        assert_eq!(mna.g.nrows(), 1);
        // G = 1/R aunque la arista viva en el nodo fijo
        let g00: f64 = mna.g.triplet_iter().map(|(_, _, v)| *v).sum();
        assert!((g00 - 0.5).abs() < 1e-12);
        // rhs = hf + T_fija / R
        assert!((rhs[0] - (1.0 + 150.0)).abs() < 1e-12);
        // solución: T = rhs / G = 302 K
        assert!((rhs[0] / g00 - 302.0).abs() < 1e-12);
    }
}
