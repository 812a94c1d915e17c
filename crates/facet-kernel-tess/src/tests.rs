use std::f64::consts::PI;

use facet_kernel_geom::{GeometryStore, Line3, LinePcurve, Plane, SphereSurface};
use facet_kernel_math::{area2d, facet_normal, Point2, Point3, Vec3};
use facet_kernel_primitives::{make_box, make_cylinder, make_sphere, BrepSolid};
use facet_kernel_topo::{BodyKind, LoopUse, Topology};

use crate::{tessellate_body, tessellate_curve, tessellate_surface};
use crate::{QuadParams, RetessTarget, TessParams, Tessellation};

const SIDES: [[usize; 2]; 3] = [[1, 2], [2, 0], [0, 1]];

/// Sample numbers (1-based) a face vertex may correspond to on an Edge.
fn edge_samples_of(tess: &Tessellation, e: usize, ptype: i32, pindex: i32) -> Vec<usize> {
    let et = tess.edge(e).unwrap();
    if ptype > 0 {
        if pindex == e as i32 {
            vec![ptype as usize]
        } else {
            vec![]
        }
    } else if ptype == 0 {
        let mut out = Vec::new();
        if pindex == et.nodes[0] as i32 {
            out.push(1);
        }
        if pindex == et.nodes[1] as i32 {
            out.push(et.npts());
        }
        out
    } else {
        vec![]
    }
}

/// The structural invariants every finished tessellation must satisfy:
/// in-range distinct triangle vertices, reciprocal neighbor records
/// (including the Edge-side tables), vertex/Edge-sample agreement, and
/// positive parameter-plane orientation.
fn check_invariants(tess: &Tessellation) {
    for fidx in 1..=tess.num_faces() {
        let f = tess.face(fidx).unwrap();
        if f.ntris() == 0 {
            continue;
        }
        for (ti, tri) in f.tris.iter().enumerate() {
            for &v in tri {
                assert!(v >= 1 && v as usize <= f.npts(), "vertex id out of range");
            }
            assert!(
                tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2],
                "repeated vertex in face {} tri {}",
                fidx,
                ti
            );
            assert!(
                area2d(
                    f.uv[(tri[0] - 1) as usize],
                    f.uv[(tri[1] - 1) as usize],
                    f.uv[(tri[2] - 1) as usize],
                ) > 0.0,
                "face {} tri {} has reversed orientation",
                fidx,
                ti
            );

            for s in 0..3 {
                let n = f.tric[ti][s];
                let a = tri[SIDES[s][0]];
                let b = tri[SIDES[s][1]];
                if n > 0 {
                    let nt = (n - 1) as usize;
                    let mut found = false;
                    for s2 in 0..3 {
                        if f.tric[nt][s2] != ti as i32 + 1 {
                            continue;
                        }
                        let a2 = f.tris[nt][SIDES[s2][0]];
                        let b2 = f.tris[nt][SIDES[s2][1]];
                        if (a2 == a && b2 == b) || (a2 == b && b2 == a) {
                            found = true;
                        }
                    }
                    assert!(
                        found,
                        "face {} tri {} side {} not reciprocated by {}",
                        fidx, ti, s, n
                    );
                } else {
                    assert!(n != 0, "face {} tri {} side {} unconnected", fidx, ti, s);
                    let e = (-n) as usize;
                    let et = tess.edge(e).unwrap();
                    // both side vertices lie on Edge e
                    let sa = edge_samples_of(
                        tess,
                        e,
                        f.ptype[(a - 1) as usize],
                        f.pindex[(a - 1) as usize],
                    );
                    let sb = edge_samples_of(
                        tess,
                        e,
                        f.ptype[(b - 1) as usize],
                        f.pindex[(b - 1) as usize],
                    );
                    assert!(
                        !sa.is_empty() && !sb.is_empty(),
                        "face {} tri {} boundary side not on edge {}",
                        fidx,
                        ti,
                        e
                    );
                    // the segment's neighbor record points back here
                    let mut reciprocal = false;
                    for &ka in &sa {
                        for &kb in &sb {
                            if ka.abs_diff(kb) != 1 {
                                continue;
                            }
                            let row = ka.min(kb) - 1;
                            for link in &et.links {
                                let nf = link.faces.len();
                                if let Some(slot) =
                                    link.faces.iter().position(|&x| x == fidx)
                                {
                                    if link.tric[row * nf + slot] == ti as i32 + 1 {
                                        reciprocal = true;
                                    }
                                }
                            }
                        }
                    }
                    assert!(
                        reciprocal,
                        "edge {} record does not reciprocate face {} tri {}",
                        e,
                        fidx,
                        ti + 1
                    );
                }
            }
        }

        // every interior Edge sample of every adjacent Edge appears in
        // the Face with matching coordinates
        for e in 1..=tess.num_edges() {
            let et = tess.edge(e).unwrap();
            for link in &et.links {
                if !link.faces.contains(&fidx) {
                    continue;
                }
                let seam = et.links[0].faces.contains(&fidx) && et.links[1].faces.contains(&fidx);
                let expect = if seam { 2 } else { 1 };
                for k in 2..et.npts() {
                    let hits = (0..f.npts())
                        .filter(|&i| f.pindex[i] == e as i32 && f.ptype[i] == k as i32)
                        .count();
                    assert_eq!(
                        hits, expect,
                        "edge {} sample {} appears {} times on face {}",
                        e, k, hits, fidx
                    );
                    for i in 0..f.npts() {
                        if f.pindex[i] == e as i32 && f.ptype[i] == k as i32 {
                            assert!(
                                (f.xyz[i] - et.xyz[k - 1]).norm() < 1e-12,
                                "edge {} sample {} diverges on face {}",
                                e,
                                k,
                                fidx
                            );
                        }
                    }
                }
                break;
            }
        }
    }
}

fn box_tess(params: TessParams) -> (BrepSolid, TessParams) {
    (make_box(Point3::origin(), 1.0, 1.0, 1.0), params)
}

#[test]
fn test_s1_unit_box() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    assert_eq!(tess.num_faces(), 6);
    assert_eq!(tess.num_edges(), 12);
    for e in 1..=12 {
        assert_eq!(tess.edge(e).unwrap().npts(), 5, "edge {}", e);
    }
    for f in 1..=6 {
        assert!(tess.face(f).unwrap().ntris() >= 2, "face {}", f);
    }
    check_invariants(&tess);
}

#[test]
fn test_s1_deterministic_rebuild() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let t1 = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    let t2 = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    for f in 1..=6 {
        let a = t1.face(f).unwrap();
        let b = t2.face(f).unwrap();
        assert_eq!(a.tris, b.tris);
        assert_eq!(a.tric, b.tric);
        assert_eq!(a.ptype, b.ptype);
        assert_eq!(a.pindex, b.pindex);
        assert_eq!(a.xyz, b.xyz);
    }
}

#[test]
fn test_s2_sphere_angle_driven() {
    let brep = make_sphere(Point3::origin(), 1.0);
    let tess = tessellate_body(
        &brep.topology,
        &brep.geometry,
        brep.body,
        TessParams::new(0.0, 0.0, 10.0),
    )
    .unwrap();

    // seam Edge (index 2) is a semicircle; poles are degenerate
    let seam = tess.edge(2).unwrap();
    assert!(
        (19..=37).contains(&seam.npts()),
        "seam has {} samples",
        seam.npts()
    );
    assert_eq!(tess.edge(1).unwrap().npts(), 2);
    assert_eq!(tess.edge(3).unwrap().npts(), 2);

    let f = tess.face(1).unwrap();
    assert!(f.ntris() > 0);
    check_invariants(&tess);

    // facet normals agree with the outward sphere normal at the centroid
    let mut agree = 0usize;
    for tri in &f.tris {
        let p0 = f.xyz[(tri[0] - 1) as usize];
        let p1 = f.xyz[(tri[1] - 1) as usize];
        let p2 = f.xyz[(tri[2] - 1) as usize];
        let Some(n) = facet_normal(&p0, &p1, &p2) else {
            continue;
        };
        let c = Point3::new(
            (p0.x + p1.x + p2.x) / 3.0,
            (p0.y + p1.y + p2.y) / 3.0,
            (p0.z + p1.z + p2.z) / 3.0,
        );
        let outward = c.coords / c.coords.norm();
        if n.dot(&outward) >= (15.0_f64).to_radians().cos() {
            agree += 1;
        }
    }
    assert!(
        agree as f64 >= 0.99 * f.ntris() as f64,
        "{} of {} facets aligned",
        agree,
        f.ntris()
    );

    // coarser angle gives a coarser mesh
    let coarse = tessellate_body(
        &brep.topology,
        &brep.geometry,
        brep.body,
        TessParams::new(0.0, 0.0, 30.0),
    )
    .unwrap();
    assert!(coarse.face(1).unwrap().ntris() <= f.ntris());
}

/// Planar square Face with a central square hole (no hole primitive, so
/// the B-rep is assembled by hand).
fn holed_square() -> BrepSolid {
    let mut topo = Topology::new();
    let mut geom = GeometryStore::new();
    let plane = Plane::new(Point3::origin(), Vec3::x(), Vec3::y());
    let surf = geom.add_surface(Box::new(plane));

    let mut ring = |pts: &[(f64, f64)]| {
        let nodes: Vec<_> = pts
            .iter()
            .map(|&(x, y)| topo.add_node(Point3::new(x, y, 0.0)))
            .collect();
        let mut uses = Vec::new();
        for i in 0..pts.len() {
            let j = (i + 1) % pts.len();
            let a = Point3::new(pts[i].0, pts[i].1, 0.0);
            let b = Point3::new(pts[j].0, pts[j].1, 0.0);
            let curve = geom.add_curve(Box::new(Line3::through(a, b)));
            let eid = topo.add_edge(curve, (0.0, 1.0), [nodes[i], nodes[j]]);
            let pc = geom.add_pcurve(Box::new(LinePcurve::through(
                0.0,
                Point2::new(pts[i].0, pts[i].1),
                1.0,
                Point2::new(pts[j].0, pts[j].1),
            )));
            uses.push(LoopUse {
                edge: eid,
                sense: 1,
                pcurve: Some(pc),
            });
        }
        topo.add_loop(uses)
    };

    // outer CCW, inner CW
    let outer = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    let inner = ring(&[(0.4, 0.4), (0.4, 0.6), (0.6, 0.6), (0.6, 0.4)]);
    let face = topo.add_face(surf, vec![outer, inner], 1);
    let shell = topo.add_shell(vec![face]);
    let body = topo.add_body(BodyKind::Sheet, vec![shell]);
    BrepSolid {
        topology: topo,
        geometry: geom,
        body,
    }
}

#[test]
fn test_s3_square_with_hole() {
    let brep = holed_square();
    let tess = tessellate_body(
        &brep.topology,
        &brep.geometry,
        brep.body,
        TessParams::new(0.0, 0.0, 15.0),
    )
    .unwrap();
    let f = tess.face(1).unwrap();
    // 8 boundary points, 1 hole
    assert_eq!(f.ntris(), 8);
    let area: f64 = f
        .tris
        .iter()
        .map(|t| {
            0.5 * area2d(
                f.uv[(t[0] - 1) as usize],
                f.uv[(t[1] - 1) as usize],
                f.uv[(t[2] - 1) as usize],
            )
        })
        .sum();
    assert!((area - 0.96).abs() < 1e-10, "annulus area {}", area);
    check_invariants(&tess);
}

#[test]
fn test_s4_insert_delete_round_trip() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    check_invariants(&tess);

    let e = 3usize;
    let before_t = tess.edge(e).unwrap().t.clone();
    let before_faces: Vec<_> = (1..=6)
        .map(|f| {
            let ft = tess.face(f).unwrap();
            (ft.npts(), ft.ntris(), ft.ptype.clone(), ft.pindex.clone())
        })
        .collect();

    let t_mid = 0.5 * (before_t[1] + before_t[2]);
    tess.insert_edge_verts(e, 2, &[t_mid]).unwrap();

    assert_eq!(tess.edge(e).unwrap().npts(), before_t.len() + 1);
    assert_eq!(tess.edge(e).unwrap().t[2], t_mid);
    let affected: Vec<usize> = {
        let et = tess.edge(e).unwrap();
        et.links.iter().flat_map(|l| l.faces.clone()).collect()
    };
    for (f, before) in before_faces.iter().enumerate() {
        let ft = tess.face(f + 1).unwrap();
        if affected.contains(&(f + 1)) {
            assert_eq!(ft.npts(), before.0 + 1);
            assert_eq!(ft.ntris(), before.1 + 1);
        } else {
            assert_eq!(ft.npts(), before.0);
            assert_eq!(ft.ntris(), before.1);
        }
    }
    check_invariants(&tess);

    tess.delete_edge_vert(e, 3, -1).unwrap();
    assert_eq!(tess.edge(e).unwrap().t, before_t);
    for (f, before) in before_faces.iter().enumerate() {
        let ft = tess.face(f + 1).unwrap();
        assert_eq!(ft.npts(), before.0);
        assert_eq!(ft.ntris(), before.1);
        assert_eq!(ft.ptype, before.2);
        assert_eq!(ft.pindex, before.3);
    }
    check_invariants(&tess);
}

#[test]
fn test_move_edge_vert() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    let t_old = tess.edge(1).unwrap().t[2];
    let t_new = t_old + 0.05;
    tess.move_edge_vert(1, 3, t_new).unwrap();
    let et = tess.edge(1).unwrap();
    assert_eq!(et.t[2], t_new);
    check_invariants(&tess);

    // out-of-range parameters are rejected without mutation
    assert!(tess.move_edge_vert(1, 3, 2.0).is_err());
    assert!(tess.move_edge_vert(1, 1, 0.1).is_err());
    assert_eq!(tess.edge(1).unwrap().t[2], t_new);
}

#[test]
fn test_s6_quad_patch() {
    let (brep, params) = box_tess(TessParams::new(0.0, 0.0, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();

    // bring every Edge of Face 1 to 8 samples
    let ts: Vec<f64> = (1..=6).map(|i| i as f64 / 7.0).collect();
    let face_edges: Vec<usize> = (1..=12)
        .filter(|&e| {
            let et = tess.edge(e).unwrap();
            et.links.iter().any(|l| l.faces.contains(&1))
        })
        .collect();
    assert_eq!(face_edges.len(), 4);
    for &e in &face_edges {
        tess.insert_edge_verts(e, 1, &ts).unwrap();
        assert_eq!(tess.edge(e).unwrap().npts(), 8);
    }
    check_invariants(&tess);

    tess.make_quads(1, QuadParams::default()).unwrap();
    assert_eq!(tess.quad_faces(), vec![1]);
    let q = tess.quads(1).unwrap();
    assert_eq!(q.patches.len(), 1);
    let p = &q.patches[0];
    assert_eq!((p.nu, p.nv), (8, 8));
    assert_eq!(q.xyz.len(), 64);
    assert_eq!(p.ipts.len(), 64);
    assert_eq!(p.bounds.len(), 28);

    // boundary grid points coincide with the Edge samples
    for j in 0..p.nv {
        for i in 0..p.nu {
            if i != 0 && i != p.nu - 1 && j != 0 && j != p.nv - 1 {
                continue;
            }
            let v = (p.ipts[j * p.nu + i] - 1) as usize;
            assert_ne!(q.ptype[v], -1);
            if q.ptype[v] > 0 {
                let e = q.pindex[v] as usize;
                let et = tess.edge(e).unwrap();
                let k = q.ptype[v] as usize;
                assert!((q.xyz[v] - et.xyz[k - 1]).norm() < 1e-12);
            }
        }
    }

    // edits drop the patches
    let t_new = 0.5 * (tess.edge(face_edges[0]).unwrap().t[1] + tess.edge(face_edges[0]).unwrap().t[2]);
    tess.move_edge_vert(face_edges[0], 2, t_new + 1e-3).unwrap();
    assert!(tess.quads(1).is_err());
    assert!(tess.quad_faces().is_empty());
}

#[test]
fn test_quad_rejects_mismatched_sides() {
    let (brep, params) = box_tess(TessParams::new(0.0, 0.0, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    let e = {
        let et = (1..=12).find(|&e| {
            tess.edge(e)
                .unwrap()
                .links
                .iter()
                .any(|l| l.faces.contains(&1))
        });
        et.unwrap()
    };
    tess.insert_edge_verts(e, 1, &[0.5]).unwrap();
    assert!(matches!(
        tess.make_quads(1, QuadParams::default()),
        Err(crate::TessError::ConstraintViolation(_))
    ));
}

#[test]
fn test_wire_body() {
    let mut topo = Topology::new();
    let mut geom = GeometryStore::new();
    let n0 = topo.add_node(Point3::origin());
    let n1 = topo.add_node(Point3::new(1.0, 0.0, 0.0));
    let c = geom.add_curve(Box::new(Line3::through(
        Point3::origin(),
        Point3::new(1.0, 0.0, 0.0),
    )));
    let e = topo.add_edge(c, (0.0, 1.0), [n0, n1]);
    let body = topo.add_wire_body(vec![e]);

    let tess = tessellate_body(&topo, &geom, body, TessParams::new(0.3, 0.0, 15.0)).unwrap();
    assert_eq!(tess.num_faces(), 0);
    assert_eq!(tess.edge(1).unwrap().npts(), 5);
    assert!(tess.face(1).is_err());
}

#[test]
fn test_retessellate_face_subset() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    let before: Vec<_> = (1..=6).map(|f| tess.face(f).unwrap().ntris()).collect();

    // denser cap on one edge refills only the adjacent faces
    tess.retessellate(&[RetessTarget::Edge(1)], TessParams::new(0.125, 0.001, 15.0))
        .unwrap();
    assert_eq!(tess.edge(1).unwrap().npts(), 9);
    let affected: Vec<usize> = tess
        .edge(1)
        .unwrap()
        .links
        .iter()
        .flat_map(|l| l.faces.clone())
        .collect();
    for f in 1..=6 {
        let nt = tess.face(f).unwrap().ntris();
        if affected.contains(&f) {
            assert!(nt > before[f - 1], "face {} not refined", f);
        } else {
            assert_eq!(nt, before[f - 1], "face {} should be untouched", f);
        }
    }
    check_invariants(&tess);
}

#[test]
fn test_cylinder_build() {
    let brep = make_cylinder(1.0, 2.0);
    let tess = tessellate_body(
        &brep.topology,
        &brep.geometry,
        brep.body,
        TessParams::new(0.0, 0.0, 20.0),
    )
    .unwrap();
    // closed circles refine under the angle criterion
    assert!(tess.edge(1).unwrap().npts() >= 9);
    assert!(tess.edge(3).unwrap().npts() >= 9);
    // straight seam stays at its endpoints
    assert_eq!(tess.edge(2).unwrap().npts(), 2);
    for f in 1..=3 {
        assert!(tess.face(f).unwrap().ntris() > 0, "face {}", f);
    }
    check_invariants(&tess);
}

#[test]
fn test_tessellate_geom_grids() {
    let line = Line3::through(Point3::origin(), Point3::new(2.0, 0.0, 0.0));
    let g = tessellate_curve(&line, (0.0, 1.0), 5).unwrap();
    assert_eq!(g.nu, 5);
    assert!((g.xyz[4] - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
    // reversed axis
    let r = tessellate_curve(&line, (0.0, 1.0), -5).unwrap();
    assert!((r.xyz[0] - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);

    let sph = SphereSurface::new(Point3::origin(), 1.0);
    let g = tessellate_surface(&sph, (0.0, PI), (0.0, PI / 2.0), (9, 5)).unwrap();
    assert_eq!(g.xyz.len(), 45);
    for p in &g.xyz {
        assert!(((p - Point3::origin()).norm() - 1.0).abs() < 1e-12);
    }

    assert!(tessellate_curve(&line, (0.0, 1.0), 1).is_err());
}

#[test]
fn test_insert_validation() {
    let (brep, params) = box_tess(TessParams::new(0.25, 0.001, 15.0));
    let mut tess = tessellate_body(&brep.topology, &brep.geometry, brep.body, params).unwrap();
    // non-monotonic
    assert!(tess.insert_edge_verts(1, 2, &[0.4, 0.3]).is_err());
    // outside the host segment
    assert!(tess.insert_edge_verts(1, 2, &[0.9]).is_err());
    // empty
    assert!(tess.insert_edge_verts(1, 2, &[]).is_err());
    // nothing changed
    assert_eq!(tess.edge(1).unwrap().npts(), 5);
    check_invariants(&tess);
}
