//! Edge discretizer: sample boundary curves into conforming point
//! sequences.
//!
//! Each Edge starts from its two endpoint samples (plus a midpoint for
//! closed Edges) and is refined by four phases run in order: tangent
//! turn angle, chord-height sag, adjacent-Face normal agreement, and
//! maximum side length. Every phase inserts one sample between the
//! worst-scoring adjacent pair and re-scores only the touched pairs.

use facet_kernel_geom::{GeometryStore, Surface};
use facet_kernel_math::{dist2, Point2, Point3, Vec3};
use facet_kernel_topo::{BodyId, EdgeSides, Topology};

use crate::error::{Result, TessError};
use crate::params::TessParams;
use crate::{EdgeTess, FaceLink};

/// Hard cap on samples per Edge.
pub(crate) const MAX_ELEN: usize = 1024;

/// Surface normal agreement across a boundary segment: the normal at
/// the segment's UV midpoint dotted with the normal a probe step inside
/// the Face. Returns -2.0 when either normal cannot be formed.
fn curv_normal(
    surf: &dyn Surface,
    uv_a: Point2,
    uv_b: Point2,
    seg_len2: f64,
    dx: Vec3,
    into_face: bool,
) -> f64 {
    let uv = Point2::new(0.5 * (uv_a.x + uv_b.x), 0.5 * (uv_a.y + uv_b.y));
    let ev = surf.evaluate(uv);
    let Some(nrme) = ev.normal() else {
        return -2.0;
    };

    let len = seg_len2.sqrt();
    let dxn = dx / len;
    let mut ds = dxn.cross(&nrme);
    if into_face {
        ds = -ds;
    }
    // probe step is a quarter of the segment length
    let step = len / 4.0;
    let probe = ev.point + step * ds;
    let (uv_in, _) = surf.inverse_evaluate(&probe);
    let Some(nrmi) = surf.evaluate(uv_in).normal() else {
        return -2.0;
    };
    nrme.dot(&nrmi)
}

struct Sample {
    t: f64,
    xyz: Point3,
    /// phase-local payload: tangent, sag midpoint, uv+flag, or length²
    aux: [f64; 3],
}

fn eval_tangent(geom: &GeometryStore, curve: usize, t: f64) -> (Point3, Vec3) {
    let ev = geom.curves[curve].evaluate(t);
    let mut d = ev.d1.norm();
    if d == 0.0 {
        d = 1.0;
    }
    (ev.point, ev.d1 / d)
}

/// Discretize one Edge of the Body. `sides` is the adjacency record for
/// this Edge; the returned tessellation carries pre-zeroed neighbor
/// blocks for every adjacent Face slot.
pub(crate) fn discretize_edge(
    topo: &Topology,
    geom: &GeometryStore,
    body: BodyId,
    eidx: usize,
    sides: &EdgeSides,
    params: &TessParams,
) -> Result<EdgeTess> {
    let b = &topo.bodies[body];
    let eid = b.edges[eidx - 1];
    let edge = &topo.edges[eid];
    let curve = &geom.curves[edge.curve];
    let (t_lo, t_hi) = edge.t_range;
    let dotnrm = params.dot_threshold();

    let node0 = topo.node_index(body, edge.nodes[0]);
    let node1 = topo.node_index(body, edge.nodes[1]);
    let p0 = topo.nodes[edge.nodes[0]].point;
    let p1 = topo.nodes[edge.nodes[1]].point;

    // degenerate Edges carry only their endpoints
    if edge.degenerate {
        return Ok(finish(
            vec![
                Sample { t: t_lo, xyz: p0, aux: [0.0; 3] },
                Sample { t: t_hi, xyz: p1, aux: [0.0; 3] },
            ],
            [node0, node1],
            true,
            sides,
        ));
    }

    let mut pts = vec![
        Sample { t: t_lo, xyz: p0, aux: [0.0; 3] },
        Sample { t: t_hi, xyz: p1, aux: [0.0; 3] },
    ];

    // noise floor: endpoint discrepancy of the curve vs the Nodes,
    // with a fraction of the sag parameter as a lower bound
    let mut mindist = dist2(&p0, &curve.evaluate(t_lo).point)
        .max(dist2(&p1, &curve.evaluate(t_hi).point))
        .sqrt();
    if 0.1 * params.chord > mindist {
        mindist = 0.1 * params.chord;
    }
    let mindist2 = mindist * mindist;

    // closed Edge: seed the midpoint so both halves exist
    if edge.closed() {
        let tm = 0.5 * (t_lo + t_hi);
        let (p, _) = eval_tangent(geom, edge.curve, tm);
        pts.insert(1, Sample { t: tm, xyz: p, aux: [0.0; 3] });
    }

    let is_line = curve.kind() == facet_kernel_geom::CurveKind::Line;

    if !is_line {
        // angle phase: aux is the normalized tangent
        if params.angle_active() {
            for s in pts.iter_mut() {
                let (_, tan) = eval_tangent(geom, edge.curve, s.t);
                s.aux = [tan.x, tan.y, tan.z];
            }
            while pts.len() < MAX_ELEN {
                let mut k = None;
                let mut dot = 1.0;
                for i in 0..pts.len() - 1 {
                    if dist2(&pts[i].xyz, &pts[i + 1].xyz) < mindist2 {
                        continue;
                    }
                    let a = Vec3::new(pts[i].aux[0], pts[i].aux[1], pts[i].aux[2]);
                    let b = Vec3::new(pts[i + 1].aux[0], pts[i + 1].aux[1], pts[i + 1].aux[2]);
                    let d = a.dot(&b);
                    if d < dot {
                        dot = d;
                        k = Some(i);
                    }
                }
                let Some(k) = k else { break };
                if dot > dotnrm {
                    break;
                }
                let tm = 0.5 * (pts[k].t + pts[k + 1].t);
                let (p, tan) = eval_tangent(geom, edge.curve, tm);
                pts.insert(
                    k + 1,
                    Sample { t: tm, xyz: p, aux: [tan.x, tan.y, tan.z] },
                );
            }
        }

        // sag phase: aux is the true curve point at the pair midpoint
        if params.chord > 0.0 {
            for i in 0..pts.len() - 1 {
                let tm = 0.5 * (pts[i].t + pts[i + 1].t);
                let p = curve.evaluate(tm).point;
                pts[i].aux = [p.x, p.y, p.z];
            }
            while pts.len() < MAX_ELEN {
                let mut k = None;
                let mut worst = 0.0;
                for i in 0..pts.len() - 1 {
                    if dist2(&pts[i].xyz, &pts[i + 1].xyz) < mindist2 {
                        continue;
                    }
                    let mid = Point3::new(
                        0.5 * (pts[i].xyz.x + pts[i + 1].xyz.x),
                        0.5 * (pts[i].xyz.y + pts[i + 1].xyz.y),
                        0.5 * (pts[i].xyz.z + pts[i + 1].xyz.z),
                    );
                    let sampled = Point3::new(pts[i].aux[0], pts[i].aux[1], pts[i].aux[2]);
                    let d = dist2(&sampled, &mid);
                    if d > worst {
                        worst = d;
                        k = Some(i);
                    }
                }
                let Some(k) = k else { break };
                if worst < params.chord * params.chord {
                    break;
                }
                let tm = 0.5 * (pts[k].t + pts[k + 1].t);
                let xyz = Point3::new(pts[k].aux[0], pts[k].aux[1], pts[k].aux[2]);
                pts.insert(k + 1, Sample { t: tm, xyz, aux: [0.0; 3] });
                for i in [k, k + 1] {
                    let tm = 0.5 * (pts[i].t + pts[i + 1].t);
                    let p = curve.evaluate(tm).point;
                    pts[i].aux = [p.x, p.y, p.z];
                }
            }
        }
    }

    // face-normal phase: aux is (u, v, active flag) per adjacent Face
    if params.angle_deg > 0.0 {
        for m in 0..2 {
            let side_sense = if m == 0 { -1 } else { 1 };
            for &fpos in sides.side(m) {
                let fid = b.faces[fpos - 1];
                let face = &topo.faces[fid];
                let surf = geom.surfaces[face.surface].as_ref();
                if surf.kind() == facet_kernel_geom::SurfaceKind::Plane {
                    continue;
                }
                let mut tol = face.tolerance;
                if params.chord > tol {
                    tol = params.chord;
                }
                let pcurve = topo
                    .pcurve_for(fid, eid, side_sense)
                    .map(|i| geom.pcurves[i].as_ref());
                let into_face = side_sense * face.sense == 1;

                for s in pts.iter_mut() {
                    match pcurve {
                        Some(pc) => {
                            let uv = pc.evaluate(s.t);
                            s.aux = [uv.x, uv.y, 1.0];
                        }
                        None => s.aux = [0.0, 0.0, 0.0],
                    }
                }
                for i in 0..pts.len() - 1 {
                    if pts[i].aux[2] <= 0.0 || pts[i + 1].aux[2] == 0.0 {
                        continue;
                    }
                    let dx = pts[i + 1].xyz - pts[i].xyz;
                    let d = dx.norm_squared();
                    if d < tol * tol {
                        pts[i].aux[2] = -1.0;
                        continue;
                    }
                    let dot = curv_normal(
                        surf,
                        Point2::new(pts[i].aux[0], pts[i].aux[1]),
                        Point2::new(pts[i + 1].aux[0], pts[i + 1].aux[1]),
                        d,
                        dx,
                        into_face,
                    );
                    if dot > dotnrm || dot < -1.1 {
                        pts[i].aux[2] = -1.0;
                    }
                }

                while pts.len() < MAX_ELEN {
                    // split the longest still-unsatisfied segment
                    let mut k = None;
                    let mut dist = tol * tol;
                    for i in 0..pts.len() - 1 {
                        if pts[i].aux[2] <= 0.0 || pts[i + 1].aux[2] == 0.0 {
                            continue;
                        }
                        let d = dist2(&pts[i].xyz, &pts[i + 1].xyz);
                        if d < tol * tol {
                            pts[i].aux[2] = -1.0;
                            continue;
                        }
                        if d < dist {
                            continue;
                        }
                        dist = d;
                        k = Some(i);
                    }
                    let Some(k) = k else { break };

                    let tmid = 0.5 * (pts[k].t + pts[k + 1].t);
                    let p = curve.evaluate(tmid).point;
                    let mut flag = 0.0;
                    let mut uv = [0.0, 0.0];
                    if let Some(pc) = pcurve {
                        let q = pc.evaluate(tmid);
                        uv = [q.x, q.y];
                        flag = 1.0;
                    }
                    pts.insert(k + 1, Sample { t: tmid, xyz: p, aux: [uv[0], uv[1], flag] });
                    for i in [k, k + 1] {
                        if pts[i].aux[2] <= 0.0 || pts[i + 1].aux[2] == 0.0 {
                            continue;
                        }
                        let dx = pts[i + 1].xyz - pts[i].xyz;
                        let d = dx.norm_squared();
                        let dot = curv_normal(
                            surf,
                            Point2::new(pts[i].aux[0], pts[i].aux[1]),
                            Point2::new(pts[i + 1].aux[0], pts[i + 1].aux[1]),
                            d,
                            dx,
                            into_face,
                        );
                        if dot > dotnrm || dot < -1.1 {
                            pts[i].aux[2] = -1.0;
                        }
                    }
                }
            }
        }
    }

    // max-side phase: aux is the segment length²
    if params.max_side > 0.0 {
        let cap2 = params.max_side * params.max_side;
        for i in 0..pts.len() - 1 {
            pts[i].aux[0] = dist2(&pts[i].xyz, &pts[i + 1].xyz);
        }
        let n = pts.len();
        pts[n - 1].aux[0] = 0.0;
        while pts.len() < MAX_ELEN {
            let mut k = 0;
            let mut dist = pts[0].aux[0];
            for i in 1..pts.len() - 1 {
                if pts[i].aux[0] > dist {
                    dist = pts[i].aux[0];
                    k = i;
                }
            }
            if dist <= cap2 {
                break;
            }
            let tm = 0.5 * (pts[k].t + pts[k + 1].t);
            let p = curve.evaluate(tm).point;
            pts.insert(k + 1, Sample { t: tm, xyz: p, aux: [0.0; 3] });
            let d = dist2(&pts[k].xyz, &pts[k + 1].xyz);
            pts[k].aux[0] = d;
            if d < 0.0625 * cap2 {
                break;
            }
            let d = dist2(&pts[k + 1].xyz, &pts[k + 2].xyz);
            pts[k + 1].aux[0] = d;
            if d < 0.0625 * cap2 {
                break;
            }
        }
    }

    if pts.len() >= MAX_ELEN {
        tracing::warn!(edge = eidx, "edge sample cap reached");
    }
    Ok(finish(pts, [node0, node1], false, sides))
}

fn finish(pts: Vec<Sample>, nodes: [usize; 2], degenerate: bool, sides: &EdgeSides) -> EdgeTess {
    let npts = pts.len();
    let mut xyz = Vec::with_capacity(npts);
    let mut t = Vec::with_capacity(npts);
    for s in pts {
        xyz.push(s.xyz);
        t.push(s.t);
    }
    let links = [0, 1].map(|m| {
        let faces = sides.side(m).to_vec();
        let tric = vec![0i32; faces.len() * (npts - 1)];
        FaceLink { faces, tric }
    });
    EdgeTess {
        xyz,
        t,
        nodes,
        links,
        degenerate,
    }
}

/// Discretize every Edge of the Body (or the subset flagged in
/// `retess`). Per-Edge failures abort the build, since Face fills
/// depend on the Edge samples.
pub(crate) fn discretize_edges(
    topo: &Topology,
    geom: &GeometryStore,
    body: BodyId,
    sides: &[EdgeSides],
    params: &TessParams,
    retess: Option<&[bool]>,
    out: &mut Vec<EdgeTess>,
) -> Result<()> {
    let nedge = topo.bodies[body].edges.len();
    if out.is_empty() {
        out.reserve(nedge);
        for _ in 0..nedge {
            out.push(EdgeTess::default());
        }
    }
    for eidx in 1..=nedge {
        if let Some(flags) = retess {
            if !flags[eidx - 1] {
                continue;
            }
        }
        out[eidx - 1] = discretize_edge(topo, geom, body, eidx, &sides[eidx - 1], params)
            .map_err(|e| {
                tracing::warn!(edge = eidx, "edge discretization failed");
                e
            })?;
    }
    if out.iter().any(|e| e.xyz.is_empty()) {
        return Err(TessError::NoDataYet);
    }
    Ok(())
}
