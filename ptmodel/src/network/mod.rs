// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Red térmica de nodos (C6)
//!
//! Cada nodo lleva temperatura fija opcional, capacidad, flujo de calor,
//! coeficiente de película y un mapa de resistencias hacia sus vecinos. El
//! mapa se almacena de forma canónica (nodo menor → nodo mayor) y añadir una
//! resistencia entre nodos ya conectados las combina en paralelo.

mod builder;
mod stackup_builder;

pub use builder::{NetworkBuildSummary, PrismThermalNetworkBuilder, ThermalNetworkBuilder};
pub use stackup_builder::PrismStackupThermalNetworkBuilder;

use std::collections::BTreeMap;
use std::collections::HashMap;

/// Resistencia mínima admitida [K/W]
pub const MIN_R: f64 = f64::EPSILON;

/// Nodo de la red térmica
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Escenario de potencia al que pertenece el nodo
    pub scen: Option<usize>,
    /// Temperatura fija [K]; None si es incógnita
    pub t: Option<f64>,
    /// Capacidad térmica [J/K]
    pub c: f64,
    /// Flujo de calor inyectado [W]
    pub hf: f64,
    /// Conductancia de película acumulada [W/K]
    pub htc: f64,
    /// Resistencias hacia vecinos de índice mayor [K/W]
    pub ns: BTreeMap<usize, f64>,
}

/// Red térmica de resistencias y capacidades
#[derive(Debug, Clone)]
pub struct ThermalNetwork {
    nodes: Vec<Node>,
    /// nodo → fila de la matriz (solo incógnitas)
    nm_map: HashMap<usize, usize>,
    /// fila de la matriz → nodo
    mn_map: Vec<usize>,
    /// el nodo tiene algún vecino de temperatura fija
    fixed_neighbor: Vec<bool>,
}

impl ThermalNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes: vec![Node::default(); nodes],
            nm_map: HashMap::new(),
            mn_map: Vec::new(),
            fixed_neighbor: Vec::new(),
        }
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn set_t(&mut self, node: usize, t: f64) {
        self.nodes[node].t = Some(t);
    }

    pub fn get_t(&self, node: usize) -> Option<f64> {
        self.nodes[node].t
    }

    pub fn add_hf(&mut self, node: usize, hf: f64) {
        self.nodes[node].hf += hf;
    }

    pub fn add_htc(&mut self, node: usize, htc: f64) {
        self.nodes[node].htc += htc;
    }

    pub fn set_c(&mut self, node: usize, c: f64) {
        self.nodes[node].c = c;
    }

    pub fn set_scenario(&mut self, node: usize, scen: Option<usize>) {
        if scen.is_some() {
            self.nodes[node].scen = scen;
        }
    }

    /// Añade una resistencia entre dos nodos; si ya están conectados se
    /// combinan en paralelo
    pub fn set_r(&mut self, node1: usize, node2: usize, r: f64) {
        debug_assert_ne!(node1, node2);
        let r = r.max(MIN_R);
        let (n1, n2) = if node1 > node2 {
            (node2, node1)
        } else {
            (node1, node2)
        };
        let entry = self.nodes[n1].ns.entry(n2);
        entry
            .and_modify(|prev| *prev = 1.0 / (1.0 / r + 1.0 / *prev))
            .or_insert(r);
    }

    /// Construye los mapas nodo ↔ fila y la detección simétrica de vecinos
    /// de temperatura fija
    pub fn build_index_map(&mut self) {
        self.nm_map.clear();
        self.mn_map.clear();
        self.fixed_neighbor = vec![false; self.nodes.len()];
        for (n, node) in self.nodes.iter().enumerate() {
            if node.t.is_none() {
                self.nm_map.insert(n, self.mn_map.len());
                self.mn_map.push(n);
            }
        }
        // la arista vive solo en el extremo menor: se recorre una vez y se
        // marca en ambos sentidos
        for n1 in 0..self.nodes.len() {
            let n1_fixed = self.nodes[n1].t.is_some();
            let neighbors: Vec<usize> = self.nodes[n1].ns.keys().copied().collect();
            for n2 in neighbors {
                if self.nodes[n2].t.is_some() {
                    self.fixed_neighbor[n1] = true;
                }
                if n1_fixed {
                    self.fixed_neighbor[n2] = true;
                }
            }
        }
    }

    /// El nodo aporta término fuente: inyección, película o vecino fijo
    pub fn is_source(&self, node: usize) -> bool {
        let n = &self.nodes[node];
        n.hf != 0.0 || n.htc != 0.0 || self.fixed_neighbor.get(node).copied().unwrap_or(false)
    }

    pub fn node_size(&self) -> usize {
        self.nodes.len()
    }

    pub fn matrix_size(&self) -> usize {
        self.mn_map.len()
    }

    pub fn source_size(&self) -> usize {
        (0..self.nodes.len()).filter(|&n| self.is_source(n)).count()
    }

    /// Nodo correspondiente a una fila de la matriz
    pub fn node_id(&self, matrix_id: usize) -> usize {
        self.mn_map[matrix_id]
    }

    /// Fila de la matriz de un nodo incógnita
    pub fn matrix_id(&self, node_id: usize) -> Option<usize> {
        self.nm_map.get(&node_id).copied()
    }

    /// Fusiona una red parcial construida por otra tarea
    ///
    /// Las capacidades, flujos y películas se suman; las temperaturas fijas
    /// se conservan; las resistencias se insertan con la misma semántica de
    /// combinación en paralelo
    pub fn merge(&mut self, other: ThermalNetwork) {
        debug_assert_eq!(self.nodes.len(), other.nodes.len());
        for (n, node) in other.nodes.into_iter().enumerate() {
            let target = &mut self.nodes[n];
            target.c += node.c;
            target.hf += node.hf;
            target.htc += node.htc;
            if target.t.is_none() {
                target.t = node.t;
            }
            if target.scen.is_none() {
                target.scen = node.scen;
            }
            for (n2, r) in node.ns {
                self.set_r(n, n2, r);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resistencias_en_paralelo() {
        let mut network = ThermalNetwork::new(3);
        network.set_r(1, 0, 6.0);
        // clave canónica: la arista vive en el nodo menor
        assert!(network.node(0).ns.contains_key(&1));
        assert!(network.node(1).ns.is_empty());
        network.set_r(0, 1, 3.0);
        let r = network.node(0).ns[&1];
        assert!((r - 2.0).abs() < 1e-12);
    }

    #[test]
    fn mapa_de_indices() {
        let mut network = ThermalNetwork::new(4);
        network.set_t(2, 300.0);
        network.set_r(0, 1, 1.0);
        network.set_r(1, 2, 1.0);
        network.build_index_map();
        assert_eq!(network.matrix_size(), 3);
        // ida y vuelta nodo ↔ fila
        for mid in 0..network.matrix_size() {
            let nid = network.node_id(mid);
            assert_eq!(network.matrix_id(nid), Some(mid));
        }
        assert_eq!(network.matrix_id(2), None);
        // el nodo 1 ve al fijo 2 aunque la arista viva en el nodo 1
        assert!(network.is_source(1));
        assert!(!network.is_source(0));
    }

    #[test]
    fn fusion_de_redes_parciales() {
        let mut a = ThermalNetwork::new(3);
        let mut b = ThermalNetwork::new(3);
        a.set_r(0, 1, 2.0);
        b.set_r(1, 2, 4.0);
        b.add_hf(1, 5.0);
        b.set_c(2, 1.0);
        a.merge(b);
        assert!((a.node(0).ns[&1] - 2.0).abs() < 1e-12);
        assert!((a.node(1).ns[&2] - 4.0).abs() < 1e-12);
        assert!((a.node(1).hf - 5.0).abs() < 1e-12);
        assert!((a.node(2).c - 1.0).abs() < 1e-12);
    }
}
