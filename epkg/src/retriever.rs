// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Resolución de alturas y muestreo de hilos de soldadura sobre el trazado

use geom::{Point2, Polygon};

use crate::layout::{BondingWire, Component, Layout, Shape};

/// Consulta de cotas y espesores sobre un trazado
pub struct LayoutRetriever<'a> {
    layout: &'a Layout,
}

impl<'a> LayoutRetriever<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Cota superior y espesor de una capa del apilado, en unidades de usuario
    pub fn stackup_layer_height_thickness(&self, layer: usize) -> Option<(f64, f64)> {
        let l = self.layout.get_layer(layer)?;
        Some((l.elevation, l.thickness))
    }

    /// Cota superior y espesor del dado de un componente
    ///
    /// El dado descansa sobre la capa de ensamblado, separado por la junta de
    /// soldadura
    pub fn component_height_thickness(&self, component: &Component) -> Option<(f64, f64)> {
        let layer = self.layout.get_layer(component.assembly_layer)?;
        let bottom = layer.elevation + component.assembly.solder_thickness;
        Some((bottom + component.height, component.height))
    }

    /// Cota superior y espesor de la junta de soldadura bajo el dado
    pub fn component_layer_height_thickness(&self, component: &Component) -> Option<(f64, f64)> {
        let layer = self.layout.get_layer(component.assembly_layer)?;
        Some((
            layer.elevation + component.assembly.solder_thickness,
            component.assembly.solder_thickness,
        ))
    }

    /// Muestrea el hilo como arco parabólico con al menos `min_segs` segmentos
    ///
    /// Devuelve `n + 1` puntos y otras tantas alturas (unidades de usuario)
    pub fn bonding_wire_segments_with_min_seg(
        &self,
        bw: &BondingWire,
        min_segs: usize,
    ) -> (Vec<Point2>, Vec<f64>) {
        let n = min_segs.max(1);
        let (p0, h0) = (&bw.start.0, bw.start.1);
        let (p1, h1) = (&bw.end.0, bw.end.1);
        let mut pts = Vec::with_capacity(n + 1);
        let mut heights = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let x = p0.x as f64 + (p1.x - p0.x) as f64 * t;
            let y = p0.y as f64 + (p1.y - p0.y) as f64 * t;
            pts.push(Point2::new(x.round() as i64, y.round() as i64));
            heights.push(h0 + (h1 - h0) * t + 4.0 * bw.loop_height * t * (1.0 - t));
        }
        (pts, heights)
    }

    /// Forma, cota y espesor de la unión de soldadura inicial del hilo
    pub fn bonding_wire_start_solder_joint(
        &self,
        bw: &BondingWire,
    ) -> Option<(Shape, f64, f64, usize)> {
        let joint = bw.start_joint.as_ref()?;
        Some((
            Shape::Circle {
                center: bw.start.0,
                radius: joint.radius,
            },
            bw.start.1,
            joint.thickness,
            joint.material,
        ))
    }

    /// Forma, cota y espesor de la unión de soldadura final del hilo
    pub fn bonding_wire_end_solder_joint(
        &self,
        bw: &BondingWire,
    ) -> Option<(Shape, f64, f64, usize)> {
        let joint = bw.end_joint.as_ref()?;
        Some((
            Shape::Circle {
                center: bw.end.0,
                radius: joint.radius,
            },
            bw.end.1,
            joint.thickness,
            joint.material,
        ))
    }

    /// Contorno del trazado
    pub fn boundary(&self) -> &Polygon {
        &self.layout.boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ConnObj, StackupLayer};
    use crate::units::CoordUnit;

    fn trazado_simple() -> Layout {
        let cu = CoordUnit::default();
        let boundary = vec![
            Point2::new(0, 0),
            Point2::new(cu.to_coord(10.0), 0),
            Point2::new(cu.to_coord(10.0), cu.to_coord(10.0)),
            Point2::new(0, cu.to_coord(10.0)),
        ];
        let mut layout = Layout::new("test", cu, boundary);
        layout.add_layer(StackupLayer {
            name: "TOP".into(),
            elevation: 0.3,
            thickness: 0.3,
            conducting_mat: None,
            dielectric_mat: None,
        });
        layout
    }

    #[test]
    fn alturas_de_capa() {
        let layout = trazado_simple();
        let retriever = LayoutRetriever::new(&layout);
        assert_eq!(
            retriever.stackup_layer_height_thickness(0),
            Some((0.3, 0.3))
        );
        assert_eq!(retriever.stackup_layer_height_thickness(7), None);
    }

    #[test]
    fn muestreo_de_hilo() {
        let mut layout = trazado_simple();
        let cu = layout.coord_unit;
        let bw = BondingWire {
            net: None,
            material: None,
            radius: 0.1,
            current: 0.0,
            scenario: None,
            start: (Point2::new(0, 0), 0.5),
            end: (cu.to_coord_point(&geom::FPoint2::new(3.0, 0.0)), 0.5),
            loop_height: 0.2,
            start_joint: None,
            end_joint: None,
        };
        layout.add_conn_obj(ConnObj::BondingWire(bw.clone()));
        let retriever = LayoutRetriever::new(&layout);
        let (pts, heights) = retriever.bonding_wire_segments_with_min_seg(&bw, 10);
        assert_eq!(pts.len(), 11);
        assert_eq!(pts.len(), heights.len());
        // extremos exactos y vértice del bucle en el centro
        assert_eq!(pts[0], Point2::new(0, 0));
        assert!((heights[0] - 0.5).abs() < 1e-12);
        assert!((heights[10] - 0.5).abs() < 1e-12);
        assert!((heights[5] - 0.7).abs() < 1e-12);
    }
}
