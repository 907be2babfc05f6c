// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Generación de la malla 2D de plantillas de prismas (C3)
//!
//! Triangulación de Delaunay restringida con refinado de calidad sobre los
//! polígonos de una rebanada: se extraen los lados, se trocean en sus cruces,
//! se fusionan los puntos próximos, se insertan los puntos de Steiner y se
//! refina acotando el ángulo mínimo y las longitudes de arista.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Error};
use log::{debug, trace};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};
use spade::{
    AngleLimit, ConstrainedDelaunayTriangulation, Point2 as SpadePoint, RefinementParameters,
    Triangulation,
};

use epkg::CoordUnit;
use geom::{
    contains, convex_hull, intersect_segments, to_fpoint, Box2, FPoint2, Point2, Polygon,
    SegmentIntersection,
};

use crate::common::PrismMeshSettings;

/// Triángulo de la plantilla con sus vecinos por arista
///
/// `neighbors[i]` comparte la arista (vertices[i], vertices[i+1])
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct TriangleElement {
    pub vertices: [usize; 3],
    pub neighbors: [Option<usize>; 3],
}

/// Triangulación 2D de una rebanada, en coordenadas de retícula
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismTemplate {
    pub points: Vec<Point2>,
    pub triangles: Vec<TriangleElement>,
}

impl PrismTemplate {
    /// Vértices del triángulo en coma flotante
    pub fn triangle_fpoints(&self, it: usize) -> [FPoint2; 3] {
        let t = &self.triangles[it];
        [
            to_fpoint(&self.points[t.vertices[0]]),
            to_fpoint(&self.points[t.vertices[1]]),
            to_fpoint(&self.points[t.vertices[2]]),
        ]
    }

    /// Baricentro del triángulo en coordenadas de retícula
    pub fn triangle_center(&self, it: usize) -> Point2 {
        let c = geom::triangle_center(&self.triangle_fpoints(it));
        Point2::new(c.x.round() as i64, c.y.round() as i64)
    }

    /// Área del triángulo en unidades de retícula al cuadrado
    pub fn triangle_area(&self, it: usize) -> f64 {
        geom::triangle_area(&self.triangle_fpoints(it))
    }

    /// Caja envolvente del triángulo
    pub fn triangle_bbox(&self, it: usize) -> Box2 {
        let t = &self.triangles[it];
        let mut bbox = Box2::new(self.points[t.vertices[0]], self.points[t.vertices[0]]);
        bbox.expand(&self.points[t.vertices[1]]);
        bbox.expand(&self.points[t.vertices[2]]);
        bbox
    }
}

/// Genera la triangulación de los polígonos de una rebanada
///
/// `label` distingue los volcados cuando se mallan varias plantillas
pub fn generate_mesh(
    polygons: &[Polygon],
    steiner_points: &[Point2],
    coord_unit: &CoordUnit,
    settings: &PrismMeshSettings,
    label: &str,
) -> Result<PrismTemplate, Error> {
    let min_len = coord_unit.to_coord(settings.min_len) as f64;
    let max_len = coord_unit.to_coord(settings.max_len) as f64;
    let tolerance = coord_unit.to_coord(settings.tolerance) as f64;

    if settings.dump_mesh_file {
        let path = settings.work_dir.join(format!("{}_meshIn.wkt", label));
        crate::io::write_wkt(&path, polygons)
            .with_context(|| format!("volcado WKT en {:?}", path))?;
        trace!(
            "malla {}: min_alpha {}º, min_len {}, max_len {}, tolerance {}",
            label,
            settings.min_alpha,
            min_len,
            max_len,
            tolerance
        );
    }

    // lados de los polígonos más los de la caja envolvente como semillas
    let mut segments: Vec<(FPoint2, FPoint2)> = Vec::new();
    let all_points = polygons.iter().flat_map(|p| p.iter());
    if let Some(bbox) = Box2::from_points(all_points) {
        extract_segments(&bbox.to_polygon(), &mut segments);
    }
    for polygon in polygons {
        extract_segments(polygon, &mut segments);
    }

    let cuts = segment_intersections(&segments);
    let (mut points, mut edges) = build_topology(&segments, &cuts);
    if tolerance > 0.0 {
        merge_close_points(&mut points, &mut edges, tolerance);
    }
    // los puntos de Steiner no pasan por la fusión
    for sp in steiner_points {
        points.push(to_fpoint(sp));
    }
    if settings.pre_split_edge && max_len > 0.0 {
        split_overlength_edges(&mut points, &mut edges, max_len);
    }

    let mut cdt: ConstrainedDelaunayTriangulation<SpadePoint<f64>> =
        ConstrainedDelaunayTriangulation::new();
    let mut handles = Vec::with_capacity(points.len());
    for p in &points {
        let handle = cdt
            .insert(SpadePoint::new(p.x, p.y))
            .map_err(|e| anyhow::anyhow!("inserción en la triangulación: {:?}", e))?;
        handles.push(handle);
    }
    for (a, b) in &edges {
        let (ha, hb) = (handles[*a], handles[*b]);
        if ha == hb {
            continue;
        }
        if cdt.can_add_constraint(ha, hb) {
            cdt.add_constraint(ha, hb);
        } else {
            // arista residual que aún cruza otra restricción tras el troceado
            trace!("restricción descartada entre los puntos {} y {}", a, b);
        }
    }

    if settings.add_balanced_points && max_len > 0.0 {
        add_balanced_points(&mut cdt, polygons, max_len);
    }

    let mut params = RefinementParameters::<f64>::new()
        .with_angle_limit(AngleLimit::from_deg(settings.min_alpha.clamp(0.0, 60.0)))
        .with_max_additional_vertices(settings.max_iter);
    if min_len > 0.0 {
        params = params.with_min_required_area(equilateral_area(min_len));
    }
    if max_len > 0.0 {
        params = params.with_max_allowed_area(equilateral_area(max_len));
    }
    let _ = cdt.refine(params);

    let template = extract_template(&cdt);
    debug!(
        "malla {}: {} nodos, {} triángulos",
        label,
        template.points.len(),
        template.triangles.len()
    );
    if settings.report_mesh_quality {
        report_quality(label, &template);
    }
    Ok(template)
}

/// Área del triángulo equilátero de lado `len`
#[inline]
fn equilateral_area(len: f64) -> f64 {
    3f64.sqrt() / 4.0 * len * len
}

fn extract_segments(polygon: &[Point2], segments: &mut Vec<(FPoint2, FPoint2)>) {
    let n = polygon.len();
    for i in 0..n {
        let a = to_fpoint(&polygon[i]);
        let b = to_fpoint(&polygon[(i + 1) % n]);
        if a != b {
            segments.push((a, b));
        }
    }
}

/// Parámetros de corte de cada segmento en sus cruces con los demás
fn segment_intersections(segments: &[(FPoint2, FPoint2)]) -> Vec<Vec<f64>> {
    type SegVal = GeomWithData<Rectangle<[f64; 2]>, usize>;
    let entries: Vec<SegVal> = segments
        .iter()
        .enumerate()
        .map(|(i, (a, b))| {
            GeomWithData::new(
                Rectangle::from_corners([a.x.min(b.x), a.y.min(b.y)], [a.x.max(b.x), a.y.max(b.y)]),
                i,
            )
        })
        .collect();
    let rtree = RTree::bulk_load(entries);

    let mut cuts: Vec<Vec<f64>> = vec![Vec::new(); segments.len()];
    let param = |seg: &(FPoint2, FPoint2), p: &FPoint2| -> f64 {
        let d = seg.1 - seg.0;
        let len_sq = d.x * d.x + d.y * d.y;
        if len_sq <= f64::EPSILON {
            return 0.0;
        }
        ((p - seg.0).x * d.x + (p - seg.0).y * d.y) / len_sq
    };
    for (i, seg) in segments.iter().enumerate() {
        let envelope = AABB::from_corners(
            [seg.0.x.min(seg.1.x), seg.0.y.min(seg.1.y)],
            [seg.0.x.max(seg.1.x), seg.0.y.max(seg.1.y)],
        );
        for other in rtree.locate_in_envelope_intersecting(&envelope) {
            let j = other.data;
            if j <= i {
                continue;
            }
            match intersect_segments(&seg.0, &seg.1, &segments[j].0, &segments[j].1) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point(p) => {
                    cuts[i].push(param(seg, &p));
                    cuts[j].push(param(&segments[j], &p));
                }
                SegmentIntersection::Overlap(p, q) => {
                    cuts[i].push(param(seg, &p));
                    cuts[i].push(param(seg, &q));
                    cuts[j].push(param(&segments[j], &p));
                    cuts[j].push(param(&segments[j], &q));
                }
            }
        }
    }
    cuts
}

/// Construye la topología de puntos y aristas troceando cada segmento por sus cortes
fn build_topology(
    segments: &[(FPoint2, FPoint2)],
    cuts: &[Vec<f64>],
) -> (Vec<FPoint2>, Vec<(usize, usize)>) {
    let mut points: Vec<FPoint2> = Vec::new();
    let mut keys: HashMap<(i64, i64), usize> = HashMap::new();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();

    let mut point_id = |p: &FPoint2, points: &mut Vec<FPoint2>| -> usize {
        let key = (p.x.round() as i64, p.y.round() as i64);
        *keys.entry(key).or_insert_with(|| {
            points.push(FPoint2::new(key.0 as f64, key.1 as f64));
            points.len() - 1
        })
    };

    for (i, seg) in segments.iter().enumerate() {
        let mut ts: Vec<f64> = Vec::with_capacity(cuts[i].len() + 2);
        ts.push(0.0);
        ts.extend(cuts[i].iter().copied().filter(|t| (0.0..=1.0).contains(t)));
        ts.push(1.0);
        ts.sort_by(|a, b| a.partial_cmp(b).expect("parámetro no comparable"));
        ts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        let d = seg.1 - seg.0;
        let mut prev: Option<usize> = None;
        for t in ts {
            let p = FPoint2::new(seg.0.x + d.x * t, seg.0.y + d.y * t);
            let id = point_id(&p, &mut points);
            if let Some(prev_id) = prev {
                if prev_id != id {
                    let key = (prev_id.min(id), prev_id.max(id));
                    if edge_set.insert(key) {
                        edges.push(key);
                    }
                }
            }
            prev = Some(id);
        }
    }
    (points, edges)
}

/// Fusiona los puntos a distancia menor que `tolerance` y reencamina las aristas
fn merge_close_points(points: &mut Vec<FPoint2>, edges: &mut Vec<(usize, usize)>, tolerance: f64) {
    let cell = |p: &FPoint2| -> (i64, i64) {
        ((p.x / tolerance).floor() as i64, (p.y / tolerance).floor() as i64)
    };
    // representantes por celda; cada punto se adhiere al primero a su alcance
    let mut reps: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let mut remap: Vec<usize> = Vec::with_capacity(points.len());
    let mut kept: Vec<FPoint2> = Vec::new();

    for p in points.iter() {
        let (cx, cy) = cell(p);
        let mut found: Option<usize> = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(cands) = reps.get(&(cx + dx, cy + dy)) {
                    for &k in cands {
                        let q = &kept[k];
                        let d = p - q;
                        if (d.x * d.x + d.y * d.y).sqrt() <= tolerance {
                            found = Some(k);
                            break 'search;
                        }
                    }
                }
            }
        }
        match found {
            Some(k) => remap.push(k),
            None => {
                kept.push(*p);
                let k = kept.len() - 1;
                reps.entry((cx, cy)).or_insert_with(Vec::new).push(k);
                remap.push(k);
            }
        }
    }

    let mut new_edges: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();
    for (a, b) in edges.iter() {
        let (na, nb) = (remap[*a], remap[*b]);
        if na == nb {
            continue;
        }
        let key = (na.min(nb), na.max(nb));
        if edge_set.insert(key) {
            new_edges.push(key);
        }
    }
    *points = kept;
    *edges = new_edges;
}

/// Trocea las aristas más largas que `max_len`
fn split_overlength_edges(
    points: &mut Vec<FPoint2>,
    edges: &mut Vec<(usize, usize)>,
    max_len: f64,
) {
    let mut out: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    for (a, b) in edges.iter() {
        let (pa, pb) = (points[*a], points[*b]);
        let d = pb - pa;
        let len = (d.x * d.x + d.y * d.y).sqrt();
        if len <= max_len {
            out.push((*a, *b));
            continue;
        }
        let n = (len / max_len).ceil() as usize;
        let mut prev = *a;
        for k in 1..n {
            let t = k as f64 / n as f64;
            points.push(FPoint2::new(pa.x + d.x * t, pa.y + d.y * t));
            let id = points.len() - 1;
            out.push((prev, id));
            prev = id;
        }
        out.push((prev, *b));
    }
    *edges = out;
}

/// Siembra puntos de un quadtree equilibrado sobre la envolvente convexa
fn add_balanced_points(
    cdt: &mut ConstrainedDelaunayTriangulation<SpadePoint<f64>>,
    polygons: &[Polygon],
    max_len: f64,
) {
    let all: Vec<Point2> = polygons.iter().flat_map(|p| p.iter().copied()).collect();
    let hull = convex_hull(&all);
    if hull.len() < 3 {
        return;
    }
    let bbox = match Box2::from_points(hull.iter()) {
        Some(b) => b,
        None => return,
    };
    // celdas ocupadas por vértices ya presentes
    let step = max_len;
    let occupied: HashSet<(i64, i64)> = cdt
        .vertices()
        .map(|v| {
            let p = v.position();
            ((p.x / step).floor() as i64, (p.y / step).floor() as i64)
        })
        .collect();
    let nx = (bbox.width() as f64 / step).ceil() as i64;
    let ny = (bbox.height() as f64 / step).ceil() as i64;
    for ix in 0..nx {
        for iy in 0..ny {
            let x = bbox.min.x as f64 + (ix as f64 + 0.5) * step;
            let y = bbox.min.y as f64 + (iy as f64 + 0.5) * step;
            let cell = ((x / step).floor() as i64, (y / step).floor() as i64);
            if occupied.contains(&cell) {
                continue;
            }
            let lattice = Point2::new(x.round() as i64, y.round() as i64);
            if contains(&hull, &lattice) {
                let _ = cdt.insert(SpadePoint::new(x, y));
            }
        }
    }
}

/// Vuelca la triangulación de spade a la plantilla con vecindad por aristas
fn extract_template(cdt: &ConstrainedDelaunayTriangulation<SpadePoint<f64>>) -> PrismTemplate {
    let mut points = vec![Point2::new(0, 0); cdt.num_vertices()];
    for v in cdt.vertices() {
        let p = v.position();
        points[v.fix().index()] = Point2::new(p.x.round() as i64, p.y.round() as i64);
    }

    let mut triangles: Vec<TriangleElement> = Vec::with_capacity(cdt.num_inner_faces());
    for face in cdt.inner_faces() {
        let vs = face.vertices();
        triangles.push(TriangleElement {
            vertices: [
                vs[0].fix().index(),
                vs[1].fix().index(),
                vs[2].fix().index(),
            ],
            neighbors: [None; 3],
        });
    }

    // vecindad reconstruida por aristas compartidas
    let mut edge_map: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (it, tri) in triangles.iter().enumerate() {
        for ie in 0..3 {
            let a = tri.vertices[ie];
            let b = tri.vertices[(ie + 1) % 3];
            edge_map
                .entry((a.min(b), a.max(b)))
                .or_insert_with(Vec::new)
                .push((it, ie));
        }
    }
    let mut neighbors: Vec<[Option<usize>; 3]> = vec![[None; 3]; triangles.len()];
    for users in edge_map.values() {
        if users.len() == 2 {
            let (t1, e1) = users[0];
            let (t2, e2) = users[1];
            neighbors[t1][e1] = Some(t2);
            neighbors[t2][e2] = Some(t1);
        }
    }
    for (tri, nb) in triangles.iter_mut().zip(neighbors) {
        tri.neighbors = nb;
    }

    PrismTemplate { points, triangles }
}

/// Informe de calidad de la malla en el registro
fn report_quality(label: &str, template: &PrismTemplate) {
    let mut min_angle = f64::MAX;
    let mut max_angle: f64 = 0.0;
    let mut min_edge = f64::MAX;
    let mut max_edge: f64 = 0.0;
    for it in 0..template.triangles.len() {
        let pts = template.triangle_fpoints(it);
        for i in 0..3 {
            let a = &pts[i];
            let b = &pts[(i + 1) % 3];
            let c = &pts[(i + 2) % 3];
            let ab = b - a;
            let ac = c - a;
            let lab = (ab.x * ab.x + ab.y * ab.y).sqrt();
            let lac = (ac.x * ac.x + ac.y * ac.y).sqrt();
            if lab <= 0.0 || lac <= 0.0 {
                continue;
            }
            let cosang = ((ab.x * ac.x + ab.y * ac.y) / (lab * lac)).clamp(-1.0, 1.0);
            let ang = cosang.acos().to_degrees();
            min_angle = min_angle.min(ang);
            max_angle = max_angle.max(ang);
            min_edge = min_edge.min(lab);
            max_edge = max_edge.max(lab);
        }
    }
    debug!(
        "calidad de malla {}: nodos {}, elementos {}, ángulo [{:.2}º, {:.2}º], arista [{:.1}, {:.1}]",
        label,
        template.points.len(),
        template.triangles.len(),
        min_angle,
        max_angle,
        min_edge,
        max_edge
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use epkg::CoordUnit;

    fn cuadrado(side: i64) -> Polygon {
        vec![
            Point2::new(0, 0),
            Point2::new(side, 0),
            Point2::new(side, side),
            Point2::new(0, side),
        ]
    }

    #[test]
    fn malla_de_cuadrado() {
        let polygons = vec![cuadrado(10_000)];
        let settings = PrismMeshSettings {
            max_len: 5.0,
            ..Default::default()
        };
        let cu = CoordUnit::default();
        let template = generate_mesh(&polygons, &[], &cu, &settings, "test").unwrap();
        assert!(template.triangles.len() >= 2);
        // los triángulos cubren el cuadrado
        let total: f64 = (0..template.triangles.len())
            .map(|it| template.triangle_area(it))
            .sum();
        assert!((total - 10_000.0 * 10_000.0).abs() / (10_000.0 * 10_000.0) < 1e-6);
    }

    #[test]
    fn vecindad_simetrica() {
        let polygons = vec![cuadrado(10_000), cuadrado(4_000)];
        let settings = PrismMeshSettings::default();
        let cu = CoordUnit::default();
        let template = generate_mesh(&polygons, &[], &cu, &settings, "test").unwrap();
        for (it, tri) in template.triangles.iter().enumerate() {
            for nb in tri.neighbors.iter().flatten() {
                let back = &template.triangles[*nb];
                assert!(
                    back.neighbors.iter().flatten().any(|&t| t == it),
                    "la vecindad de triángulos no es simétrica"
                );
            }
        }
    }

    #[test]
    fn punto_de_steiner_presente() {
        let polygons = vec![cuadrado(10_000)];
        let steiner = vec![Point2::new(3_333, 3_333)];
        let settings = PrismMeshSettings::default();
        let cu = CoordUnit::default();
        let template = generate_mesh(&polygons, &steiner, &cu, &settings, "test").unwrap();
        assert!(template
            .points
            .iter()
            .any(|p| *p == Point2::new(3_333, 3_333)));
    }
}
