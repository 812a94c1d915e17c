#![warn(missing_docs)]

//! B-rep primitive construction for the facet kernel.
//!
//! Builds complete topology + geometry (including the pcurves every
//! Edge use needs in its Face's parameter plane) for the standard test
//! solids: box, cylinder, and sphere.

use std::collections::HashMap;
use std::f64::consts::PI;

use facet_kernel_geom::{
    Circle3, CirclePcurve, CylinderSurface, GeometryStore, Line3, LinePcurve, Plane,
    SphereSurface, Surface,
};
use facet_kernel_math::{Point2, Point3, Vec3};
use facet_kernel_topo::{BodyId, BodyKind, LoopUse, Topology};

/// A constructed primitive: topology + geometry + the Body entity.
#[derive(Debug, Clone)]
pub struct BrepSolid {
    /// The topological structure.
    pub topology: Topology,
    /// Surfaces, curves and pcurves referenced by the topology.
    pub geometry: GeometryStore,
    /// The Body entity.
    pub body: BodyId,
}

/// Build a solid box with one corner at `corner` and extents
/// `(sx, sy, sz)` along the axes: 6 planar Faces, 12 line Edges,
/// 8 Nodes.
pub fn make_box(corner: Point3, sx: f64, sy: f64, sz: f64) -> BrepSolid {
    let mut topo = Topology::new();
    let mut geom = GeometryStore::new();

    let p = |dx: f64, dy: f64, dz: f64| {
        Point3::new(corner.x + dx, corner.y + dy, corner.z + dz)
    };
    let pts = [
        p(0.0, 0.0, 0.0),
        p(sx, 0.0, 0.0),
        p(sx, sy, 0.0),
        p(0.0, sy, 0.0),
        p(0.0, 0.0, sz),
        p(sx, 0.0, sz),
        p(sx, sy, sz),
        p(0.0, sy, sz),
    ];
    let nodes: Vec<_> = pts.iter().map(|&q| topo.add_node(q)).collect();

    // corner orders are CCW viewed from outside the solid
    let face_corners: [[usize; 4]; 6] = [
        [0, 3, 2, 1], // bottom  (-z)
        [4, 5, 6, 7], // top     (+z)
        [0, 1, 5, 4], // front   (-y)
        [2, 3, 7, 6], // back    (+y)
        [0, 4, 7, 3], // left    (-x)
        [1, 2, 6, 5], // right   (+x)
    ];

    // shared Edges keyed by the unordered node pair; value records the
    // curve direction as built
    let mut edge_map: HashMap<(usize, usize), (facet_kernel_topo::EdgeId, usize, usize)> =
        HashMap::new();
    let mut faces = Vec::new();

    for corners in face_corners.iter() {
        let c: Vec<Point3> = corners.iter().map(|&i| pts[i]).collect();
        let x_dir = c[1] - c[0];
        let normal = x_dir.cross(&(c[3] - c[0]));
        let y_dir = normal.cross(&x_dir);
        let plane = Plane::new(c[0], x_dir, y_dir);
        let project = |q: &Point3| plane.inverse_evaluate(q).0;
        let surf = geom.add_surface(Box::new(plane.clone()));

        let mut uses = Vec::new();
        for j in 0..4 {
            let a = corners[j];
            let b = corners[(j + 1) % 4];
            let key = (a.min(b), a.max(b));
            let (eid, ca, _cb) = *edge_map.entry(key).or_insert_with(|| {
                let curve = geom.add_curve(Box::new(Line3::through(pts[a], pts[b])));
                let eid = topo.add_edge(curve, (0.0, 1.0), [nodes[a], nodes[b]]);
                (eid, a, b)
            });
            let sense = if ca == a { 1 } else { -1 };
            // pcurve follows the curve parameter, not the traversal
            let (t0_pt, t1_pt) = if ca == a { (pts[a], pts[b]) } else { (pts[b], pts[a]) };
            let pc = geom.add_pcurve(Box::new(LinePcurve::through(
                0.0,
                project(&t0_pt),
                1.0,
                project(&t1_pt),
            )));
            uses.push(LoopUse {
                edge: eid,
                sense,
                pcurve: Some(pc),
            });
        }
        let lp = topo.add_loop(uses);
        faces.push(topo.add_face(surf, vec![lp], 1));
    }

    let shell = topo.add_shell(faces);
    let body = topo.add_body(BodyKind::Solid, vec![shell]);
    BrepSolid {
        topology: topo,
        geometry: geom,
        body,
    }
}

/// Build a solid cylinder of the given radius and height with its axis
/// along +Z from the origin: a lateral cylindrical Face with a seam,
/// plus two planar caps. 2 Nodes, 3 Edges, 3 Faces.
pub fn make_cylinder(radius: f64, height: f64) -> BrepSolid {
    let mut topo = Topology::new();
    let mut geom = GeometryStore::new();

    let n_bot = topo.add_node(Point3::new(radius, 0.0, 0.0));
    let n_top = topo.add_node(Point3::new(radius, 0.0, height));

    let c_bot = geom.add_curve(Box::new(Circle3::new(
        Point3::origin(),
        Vec3::x(),
        Vec3::y(),
        radius,
    )));
    let c_top = geom.add_curve(Box::new(Circle3::new(
        Point3::new(0.0, 0.0, height),
        Vec3::x(),
        Vec3::y(),
        radius,
    )));
    let c_seam = geom.add_curve(Box::new(Line3::through(
        Point3::new(radius, 0.0, 0.0),
        Point3::new(radius, 0.0, height),
    )));

    let e_bot = topo.add_edge(c_bot, (0.0, 2.0 * PI), [n_bot, n_bot]);
    let e_top = topo.add_edge(c_top, (0.0, 2.0 * PI), [n_top, n_top]);
    let e_seam = topo.add_edge(c_seam, (0.0, 1.0), [n_bot, n_top]);

    // lateral face: UV rectangle [0, 2π] × [0, height], seam used twice
    let lat_surf = geom.add_surface(Box::new(CylinderSurface::new(
        Point3::origin(),
        Vec3::z(),
        radius,
    )));
    let pc_bot = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(0.0, 0.0),
        2.0 * PI,
        Point2::new(2.0 * PI, 0.0),
    )));
    let pc_seam_hi = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(2.0 * PI, 0.0),
        1.0,
        Point2::new(2.0 * PI, height),
    )));
    let pc_top = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(0.0, height),
        2.0 * PI,
        Point2::new(2.0 * PI, height),
    )));
    let pc_seam_lo = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(0.0, 0.0),
        1.0,
        Point2::new(0.0, height),
    )));
    let lat_loop = topo.add_loop(vec![
        LoopUse { edge: e_bot, sense: 1, pcurve: Some(pc_bot) },
        LoopUse { edge: e_seam, sense: 1, pcurve: Some(pc_seam_hi) },
        LoopUse { edge: e_top, sense: -1, pcurve: Some(pc_top) },
        LoopUse { edge: e_seam, sense: -1, pcurve: Some(pc_seam_lo) },
    ]);
    let lat_face = topo.add_face(lat_surf, vec![lat_loop], 1);

    // bottom cap, outward normal -Z
    let bot_plane = Plane::new(Point3::origin(), Vec3::x(), -Vec3::y());
    let bot_surf = geom.add_surface(Box::new(bot_plane));
    let pc_cap_bot = geom.add_pcurve(Box::new(CirclePcurve {
        center: Point2::new(0.0, 0.0),
        x_vec: facet_kernel_math::Vec2::new(radius, 0.0),
        y_vec: facet_kernel_math::Vec2::new(0.0, -radius),
    }));
    let bot_loop = topo.add_loop(vec![LoopUse {
        edge: e_bot,
        sense: -1,
        pcurve: Some(pc_cap_bot),
    }]);
    let bot_face = topo.add_face(bot_surf, vec![bot_loop], 1);

    // top cap, outward normal +Z
    let top_plane = Plane::new(Point3::new(0.0, 0.0, height), Vec3::x(), Vec3::y());
    let top_surf = geom.add_surface(Box::new(top_plane));
    let pc_cap_top = geom.add_pcurve(Box::new(CirclePcurve {
        center: Point2::new(0.0, 0.0),
        x_vec: facet_kernel_math::Vec2::new(radius, 0.0),
        y_vec: facet_kernel_math::Vec2::new(0.0, radius),
    }));
    let top_loop = topo.add_loop(vec![LoopUse {
        edge: e_top,
        sense: 1,
        pcurve: Some(pc_cap_top),
    }]);
    let top_face = topo.add_face(top_surf, vec![top_loop], 1);

    let shell = topo.add_shell(vec![lat_face, bot_face, top_face]);
    let body = topo.add_body(BodyKind::Solid, vec![shell]);
    BrepSolid {
        topology: topo,
        geometry: geom,
        body,
    }
}

/// Build a solid sphere centered at `center`: a single Face over the
/// full sphere, bounded by a meridian seam Edge (used on both sides)
/// and two degenerate pole Edges. 2 Nodes, 3 Edges, 1 Face.
pub fn make_sphere(center: Point3, radius: f64) -> BrepSolid {
    let mut topo = Topology::new();
    let mut geom = GeometryStore::new();

    let south = Point3::new(center.x, center.y, center.z - radius);
    let north = Point3::new(center.x, center.y, center.z + radius);
    let n_s = topo.add_node(south);
    let n_n = topo.add_node(north);

    // meridian at u = 0: P(t) = center + r (cos t · x + sin t · z)
    let c_seam = geom.add_curve(Box::new(Circle3::new(center, Vec3::x(), Vec3::z(), radius)));
    let e_seam = topo.add_edge(c_seam, (-PI / 2.0, PI / 2.0), [n_s, n_n]);
    let e_south = topo.add_degenerate_edge(c_seam, (0.0, 2.0 * PI), n_s);
    let e_north = topo.add_degenerate_edge(c_seam, (0.0, 2.0 * PI), n_n);

    let surf = geom.add_surface(Box::new(SphereSurface::new(center, radius)));
    let ((_, u_hi), (v_lo, v_hi)) = {
        let s: &dyn Surface = geom.surfaces[surf].as_ref();
        s.param_range()
    };

    let pc_south = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(0.0, v_lo),
        2.0 * PI,
        Point2::new(u_hi, v_lo),
    )));
    let pc_seam_hi = geom.add_pcurve(Box::new(LinePcurve::through(
        v_lo,
        Point2::new(u_hi, v_lo),
        v_hi,
        Point2::new(u_hi, v_hi),
    )));
    let pc_north = geom.add_pcurve(Box::new(LinePcurve::through(
        0.0,
        Point2::new(0.0, v_hi),
        2.0 * PI,
        Point2::new(u_hi, v_hi),
    )));
    let pc_seam_lo = geom.add_pcurve(Box::new(LinePcurve::through(
        v_lo,
        Point2::new(0.0, v_lo),
        v_hi,
        Point2::new(0.0, v_hi),
    )));

    let lp = topo.add_loop(vec![
        LoopUse { edge: e_south, sense: 1, pcurve: Some(pc_south) },
        LoopUse { edge: e_seam, sense: 1, pcurve: Some(pc_seam_hi) },
        LoopUse { edge: e_north, sense: -1, pcurve: Some(pc_north) },
        LoopUse { edge: e_seam, sense: -1, pcurve: Some(pc_seam_lo) },
    ]);
    let face = topo.add_face(surf, vec![lp], 1);
    let shell = topo.add_shell(vec![face]);
    let body = topo.add_body(BodyKind::Solid, vec![shell]);
    BrepSolid {
        topology: topo,
        geometry: geom,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_topology_counts() {
        let brep = make_box(Point3::origin(), 1.0, 1.0, 1.0);
        let b = &brep.topology.bodies[brep.body];
        assert_eq!(b.nodes.len(), 8);
        assert_eq!(b.edges.len(), 12);
        assert_eq!(b.faces.len(), 6);
        assert_eq!(brep.geometry.surfaces.len(), 6);
        assert_eq!(brep.geometry.curves.len(), 12);
        // every face contributes 4 pcurves
        assert_eq!(brep.geometry.pcurves.len(), 24);
    }

    #[test]
    fn test_box_edges_manifold() {
        let brep = make_box(Point3::origin(), 2.0, 1.0, 1.0);
        let sides = brep.topology.edge_sides(brep.body);
        for s in &sides {
            // each edge bounds exactly one face per side
            assert_eq!(s.neg.len(), 1);
            assert_eq!(s.pos.len(), 1);
            assert_ne!(s.neg[0], s.pos[0]);
        }
    }

    #[test]
    fn test_box_pcurves_match_curves() {
        // pcurve(t) mapped through the surface must land on curve(t)
        let brep = make_box(Point3::new(1.0, 2.0, 3.0), 2.0, 1.5, 1.0);
        for &fid in &brep.topology.bodies[brep.body].faces {
            let face = &brep.topology.faces[fid];
            let surf = &brep.geometry.surfaces[face.surface];
            for &lid in &face.loops {
                for lu in &brep.topology.loops[lid].uses {
                    let edge = &brep.topology.edges[lu.edge];
                    let curve = &brep.geometry.curves[edge.curve];
                    let pc = &brep.geometry.pcurves[lu.pcurve.unwrap()];
                    for &t in &[0.0, 0.5, 1.0] {
                        let on_curve = curve.evaluate(t).point;
                        let on_surf = surf.evaluate(pc.evaluate(t)).point;
                        assert!((on_curve - on_surf).norm() < 1e-10);
                    }
                }
            }
        }
    }

    #[test]
    fn test_cylinder_topology() {
        let brep = make_cylinder(1.0, 2.0);
        let b = &brep.topology.bodies[brep.body];
        assert_eq!(b.nodes.len(), 2);
        assert_eq!(b.edges.len(), 3);
        assert_eq!(b.faces.len(), 3);
        let sides = brep.topology.edge_sides(brep.body);
        // seam edge (second in loop order) is used twice by the lateral face
        let seam = &sides[1];
        assert_eq!(seam.neg, vec![1]);
        assert_eq!(seam.pos, vec![1]);
    }

    #[test]
    fn test_cylinder_seam_pcurves_differ() {
        let brep = make_cylinder(1.0, 2.0);
        let b = &brep.topology.bodies[brep.body];
        let lat = b.faces[0];
        let seam = b.edges[1];
        let hi = brep.topology.pcurve_for(lat, seam, 1).unwrap();
        let lo = brep.topology.pcurve_for(lat, seam, -1).unwrap();
        let uv_hi = brep.geometry.pcurves[hi].evaluate(0.5);
        let uv_lo = brep.geometry.pcurves[lo].evaluate(0.5);
        assert!((uv_hi.x - 2.0 * PI).abs() < 1e-12);
        assert!(uv_lo.x.abs() < 1e-12);
        assert!((uv_hi.y - uv_lo.y).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_topology() {
        let brep = make_sphere(Point3::origin(), 1.0);
        let b = &brep.topology.bodies[brep.body];
        assert_eq!(b.nodes.len(), 2);
        assert_eq!(b.edges.len(), 3);
        assert_eq!(b.faces.len(), 1);
        let degen: Vec<_> = b
            .edges
            .iter()
            .filter(|&&e| brep.topology.edges[e].degenerate)
            .collect();
        assert_eq!(degen.len(), 2);
    }

    #[test]
    fn test_sphere_seam_endpoints() {
        let brep = make_sphere(Point3::new(0.0, 0.0, 1.0), 2.0);
        let b = &brep.topology.bodies[brep.body];
        let seam = &brep.topology.edges[b.edges[1]];
        assert!(!seam.degenerate);
        let curve = &brep.geometry.curves[seam.curve];
        let lo = curve.evaluate(seam.t_range.0).point;
        let hi = curve.evaluate(seam.t_range.1).point;
        assert!((lo - Point3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
        assert!((hi - Point3::new(0.0, 0.0, 3.0)).norm() < 1e-12);
    }
}
