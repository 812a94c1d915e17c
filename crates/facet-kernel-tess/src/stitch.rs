//! Face assembly and stitching.
//!
//! Assembles the discretized boundary Loops of a Face into the working
//! mesh (vertices, boundary segments, seed triangles from the loop
//! filler), derives triangle neighbors through a vertex-threaded
//! connect table, and writes the finished triangulation back into the
//! tessellation — propagating boundary-triangle ids into the adjacent
//! Edge records.

use facet_kernel_geom::{GeometryStore, SurfaceKind};
use facet_kernel_math::Point2;
use facet_kernel_topo::{BodyId, FaceId, Topology};

use crate::error::{Result, TessError};
use crate::fill::{expected_tris, fill_area, FillFail, FillScratch};
use crate::refine::{TriSeg, TriTri, TriVert, VertKind, WorkMesh};
use crate::{EdgeTess, FaceTess};

const NOTFILLED: i32 = -1;

/// Vertex-threaded edge-connect table: pairs up the two slots that
/// reference each unordered vertex pair, exchanging their seed values.
/// Shared by triangle stitching and quad patch bounds.
pub(crate) struct Connect {
    ntab: Vec<i32>,
    node1: Vec<i32>,
    node2: Vec<i32>,
    slot: Vec<Option<usize>>,
    thread: Vec<i32>,
}

impl Connect {
    pub(crate) fn new(nverts: usize) -> Self {
        Self {
            ntab: vec![NOTFILLED; nverts],
            node1: Vec::new(),
            node2: Vec::new(),
            slot: Vec::new(),
            thread: Vec::new(),
        }
    }

    /// Register that `values[slot]` lies on the side `(k1, k2)`; when
    /// the matching slot arrives the two seed values are exchanged.
    pub(crate) fn add(&mut self, k1: i32, k2: i32, slot: usize, values: &mut [i32], face: usize) {
        let (kn1, kn2) = if k1 > k2 {
            ((k2 - 1) as usize, k1 - 1)
        } else {
            ((k1 - 1) as usize, k2 - 1)
        };

        if self.ntab[kn1] == NOTFILLED {
            self.ntab[kn1] = self.node1.len() as i32;
            self.node1.push(kn1 as i32);
            self.node2.push(kn2);
            self.slot.push(Some(slot));
            self.thread.push(NOTFILLED);
            return;
        }

        let mut iface = self.ntab[kn1] as usize;
        loop {
            if self.node2[iface] == kn2 {
                match self.slot[iface].take() {
                    Some(other) => {
                        values.swap(other, slot);
                    }
                    None => {
                        tracing::warn!(
                            face,
                            k1,
                            k2,
                            "side already paired; non-manifold connectivity"
                        );
                    }
                }
                return;
            }
            if self.thread[iface] == NOTFILLED {
                self.thread[iface] = self.node1.len() as i32;
                self.node1.push(kn1 as i32);
                self.node2.push(kn2);
                self.slot.push(Some(slot));
                self.thread.push(NOTFILLED);
                return;
            }
            iface = self.thread[iface] as usize;
        }
    }

    /// Zero any seed value whose side never found its partner.
    pub(crate) fn finish(&mut self, values: &mut [i32], face: usize) {
        for i in 0..self.node1.len() {
            if let Some(slot) = self.slot[i] {
                tracing::warn!(
                    face,
                    v0 = self.node1[i] + 1,
                    v1 = self.node2[i] + 1,
                    "unconnected side"
                );
                values[slot] = 0;
            }
        }
    }
}

/// Derive triangle/segment adjacency for a freshly seeded working mesh.
pub(crate) fn make_neighbors(ts: &mut WorkMesh, face: usize) {
    let ntris = ts.tris.len();
    let nsegs = ts.segs.len();
    let mut values = vec![0i32; 3 * ntris + nsegs];
    for (i, v) in values.iter_mut().enumerate().take(3 * ntris) {
        *v = (i / 3) as i32 + 1;
    }
    for s in 0..nsegs {
        values[3 * ntris + s] = -(s as i32 + 1);
    }

    let mut conn = Connect::new(ts.verts.len());
    for i in 0..ntris {
        let t = ts.tris[i].verts;
        conn.add(t[1], t[2], 3 * i, &mut values, face);
        conn.add(t[0], t[2], 3 * i + 1, &mut values, face);
        conn.add(t[0], t[1], 3 * i + 2, &mut values, face);
    }
    for s in 0..nsegs {
        let sv = ts.segs[s].verts;
        conn.add(sv[0], sv[1], 3 * ntris + s, &mut values, face);
    }
    conn.finish(&mut values, face);

    for i in 0..ntris {
        for j in 0..3 {
            ts.tris[i].nbrs[j] = values[3 * i + j];
        }
    }
    for s in 0..nsegs {
        ts.segs[s].neighbor = values[3 * ntris + s];
    }
}

/// Assemble the boundary Loops of the Face into the working mesh and
/// run the loop filler (with UV renormalization retries) to seed the
/// triangle list.
pub(crate) fn fill_face(
    ts: &mut WorkMesh,
    topo: &Topology,
    geom: &GeometryStore,
    body: BodyId,
    fid: FaceId,
    edges: &[EdgeTess],
    scratch: &mut FillScratch,
) -> Result<()> {
    let face = &topo.faces[fid];
    let face_index = ts.face_index;
    let or = face.sense;
    ts.planar = geom.surfaces[face.surface].kind() == SurfaceKind::Plane;

    let mut uvs: Vec<Point2> = vec![Point2::new(0.0, 0.0)];
    let mut lps: Vec<usize> = Vec::new();
    ts.verts.clear();
    ts.segs.clear();
    ts.tris.clear();

    for &lid in &face.loops {
        let uses = &topo.loops[lid].uses;
        let st = uvs.len();
        let mut loop_total = 0usize;
        let mut degen = false;

        let ordered: Vec<usize> = if or < 0 {
            (0..uses.len()).rev().collect()
        } else {
            (0..uses.len()).collect()
        };
        for &ui in &ordered {
            let lu = uses[ui];
            let eidx = topo.edge_index(body, lu.edge);
            if eidx == 0 {
                return Err(TessError::NotFound(format!(
                    "edge of face {} not in body",
                    face_index
                )));
            }
            let et = &edges[eidx - 1];
            if et.degenerate {
                degen = true;
                continue;
            }
            let npts = et.xyz.len();
            let pcurve = topo
                .pcurve_for(fid, lu.edge, lu.sense)
                .map(|i| geom.pcurves[i].as_ref())
                .ok_or_else(|| {
                    TessError::GeometryError(format!(
                        "missing pcurve on face {} edge {}",
                        face_index, eidx
                    ))
                })?;

            let sen = lu.sense * or;
            if sen == 1 {
                for m in 0..npts - 1 {
                    let uv = pcurve.evaluate(et.t[m]);
                    uvs.push(uv);
                    let kind = if m == 0 {
                        let node = et.nodes[0];
                        let k = VertKind::Node {
                            node: node as i32,
                            degen,
                        };
                        degen = false;
                        k
                    } else {
                        VertKind::Edge {
                            edge: eidx as i32,
                            index: m as i32 + 1,
                        }
                    };
                    let np = uvs.len() - 1;
                    ts.verts.push(TriVert {
                        kind,
                        xyz: et.xyz[m],
                        uv,
                    });
                    ts.segs.push(TriSeg {
                        verts: [np as i32, np as i32 + 1],
                        neighbor: -(np as i32),
                        edge: lu.sense * eidx as i32,
                        index: m as i32 + 1,
                    });
                }
            } else {
                for m in (1..npts).rev() {
                    let uv = pcurve.evaluate(et.t[m]);
                    uvs.push(uv);
                    let kind = if m == npts - 1 {
                        let node = et.nodes[1];
                        let k = VertKind::Node {
                            node: node as i32,
                            degen,
                        };
                        degen = false;
                        k
                    } else {
                        VertKind::Edge {
                            edge: eidx as i32,
                            index: m as i32 + 1,
                        }
                    };
                    let np = uvs.len() - 1;
                    ts.verts.push(TriVert {
                        kind,
                        xyz: et.xyz[m],
                        uv,
                    });
                    ts.segs.push(TriSeg {
                        verts: [np as i32, np as i32 + 1],
                        neighbor: -(np as i32),
                        edge: lu.sense * eidx as i32,
                        index: m as i32,
                    });
                }
            }
            loop_total += npts - 1;
        }
        if loop_total == 0 {
            return Err(TessError::DegenerateEdge(face_index));
        }
        // close the loop
        let nsegs = ts.segs.len();
        ts.segs[nsegs - 1].verts[1] = st as i32;
        // a trailing degenerate Edge marks the loop's first vertex
        if degen {
            let first = &mut ts.verts[st - 1];
            if let VertKind::Node { node, degen: d } = first.kind {
                if !d {
                    first.kind = VertKind::Node { node, degen: true };
                }
            } else {
                tracing::warn!(face = face_index, "degenerate marker fell on an Edge vertex");
            }
        }
        lps.push(loop_total);
    }

    let np = uvs.len();
    let expected_full = expected_tris(np - 1, lps.len());

    // conservative pass on the raw coordinates
    let mut outcome = fill_area(scratch, &lps, &uvs, false);
    let mut accepted = None;
    match &outcome {
        Ok(out) => {
            let mut expect = expected_full;
            for i in 0..=out.n_fig8 {
                if out.tris.len() + 2 * i == expected_full {
                    expect = out.tris.len();
                }
            }
            if out.tris.len() == expect {
                accepted = Some(out.tris.clone());
            }
        }
        Err(FillFail::DegenerateContour) => {
            return Err(TessError::DegenerateEdge(face_index));
        }
        Err(FillFail::Incomplete) => {}
    }

    // renormalize to the unit box and retry with increasing tolerance
    if accepted.is_none() {
        let mut lo = uvs[1];
        let mut hi = uvs[1];
        for q in &uvs[1..] {
            lo.x = lo.x.min(q.x);
            lo.y = lo.y.min(q.y);
            hi.x = hi.x.max(q.x);
            hi.y = hi.y.max(q.y);
        }
        let mut unit: Vec<Point2> = uvs
            .iter()
            .map(|q| {
                Point2::new(
                    (q.x - lo.x) / (hi.x - lo.x),
                    (q.y - lo.y) / (hi.y - lo.y),
                )
            })
            .collect();
        unit[0] = Point2::new(0.0, 0.0);

        const SCL: [[f64; 2]; 3] = [[1.0, 1.0], [10.0, 1.0], [0.1, 10.0]];
        let mut scaled = unit.clone();
        for (j, s) in SCL.iter().enumerate() {
            for (q, u) in scaled.iter_mut().zip(unit.iter()) {
                q.x = u.x * s[0];
                q.y = u.y * s[1];
            }
            unit = scaled.clone();
            outcome = fill_area(scratch, &lps, &scaled, true);
            tracing::warn!(
                face = face_index,
                pass = j,
                "renormalizing parameter plane for loop fill"
            );
            if let Ok(out) = &outcome {
                let mut expect = expected_full;
                for i in 0..=out.n_fig8 {
                    if out.tris.len() + 2 * i == expected_full {
                        expect = out.tris.len();
                    }
                }
                if out.tris.len() == expect {
                    accepted = Some(out.tris.clone());
                    break;
                }
            }
        }
    }

    let Some(tris) = accepted else {
        return Err(TessError::GeometryError(format!(
            "face {} loop fill failed to close",
            face_index
        )));
    };

    for t in &tris {
        let mut verts = [t[0], t[1], t[2]];
        if or < 0 {
            verts.swap(1, 2);
        }
        ts.tris.push(TriTri {
            verts,
            nbrs: [0, 0, 0],
            mid: facet_kernel_math::Point3::origin(),
            area: 0.0,
            mark: 0,
            close: crate::refine::NOTFILLED,
            hit: false,
            count: 0,
        });
    }
    for i in 0..ts.tris.len() {
        ts.tris[i].nbrs = [i as i32 + 1; 3];
    }

    make_neighbors(ts, face_index);
    Ok(())
}

/// Write the refined working mesh into a `FaceTess`, decoding boundary
/// segment references into Edge indices and filling the adjacent
/// Edges' neighbor tables.
pub(crate) fn update_tess(ts: &WorkMesh, edges: &mut [EdgeTess], face_index: usize) -> FaceTess {
    let mut out = FaceTess::default();
    out.xyz.reserve(ts.verts.len());
    out.uv.reserve(ts.verts.len());
    for v in &ts.verts {
        out.xyz.push(v.xyz);
        out.uv.push(v.uv);
        match v.kind {
            VertKind::Node { node, .. } => {
                out.ptype.push(0);
                out.pindex.push(node);
            }
            VertKind::Edge { edge, index } => {
                out.ptype.push(index);
                out.pindex.push(edge);
            }
            VertKind::Face => {
                out.ptype.push(-1);
                out.pindex.push(-1);
            }
        }
    }

    for t in &ts.tris {
        out.tris.push(t.verts);
        out.tric.push(t.nbrs);
    }
    for i in 0..out.tric.len() {
        for j in 0..3 {
            if out.tric[i][j] >= 0 {
                continue;
            }
            let n = (-out.tric[i][j]) as usize;
            let seg = &ts.segs[n - 1];
            let edge = seg.edge.unsigned_abs() as usize;
            let k = (seg.index - 1) as usize;
            let side = usize::from(seg.edge > 0);
            let link = &mut edges[edge - 1].links[side];
            let nf = link.faces.len();
            match link.faces.iter().position(|&f| f == face_index) {
                Some(slot) => link.tric[k * nf + slot] = i as i32 + 1,
                None => tracing::warn!(
                    face = face_index,
                    edge,
                    "face not recorded on edge side"
                ),
            }
            out.tric[i][j] = -(edge as i32);
        }
    }
    out
}
