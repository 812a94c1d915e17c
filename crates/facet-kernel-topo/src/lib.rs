#![warn(missing_docs)]

//! B-rep topology for the facet kernel.
//!
//! Arena-backed topological entities (Node, Edge, Loop, Face, Shell,
//! Body) with the adjacency queries the tessellator walks: ordered
//! per-Body Edge/Face index lists, Faces on each side of an Edge, and
//! pcurve lookup for an Edge as used by a Face.
//!
//! Geometry is referenced by plain indices into a
//! `facet_kernel_geom::GeometryStore` owned alongside the topology; the
//! arenas here carry only structure.

use facet_kernel_math::Point3;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key for a Node.
    pub struct NodeId;
    /// Key for an Edge.
    pub struct EdgeId;
    /// Key for a Loop.
    pub struct LoopId;
    /// Key for a Face.
    pub struct FaceId;
    /// Key for a Shell.
    pub struct ShellId;
    /// Key for a Body.
    pub struct BodyId;
}

/// A topological point.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Position in 3D space.
    pub point: Point3,
}

/// A topological edge: a bounded span of a curve between two Nodes.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Index of the carrier curve in the geometry store.
    pub curve: usize,
    /// Parameter range `(t_lo, t_hi)` of the span.
    pub t_range: (f64, f64),
    /// Endpoint Nodes; equal for a closed Edge.
    pub nodes: [NodeId; 2],
    /// A degenerate Edge has zero 3D extent (e.g. a pole seam) but still
    /// spans parameter space on its Faces.
    pub degenerate: bool,
    /// Geometric tolerance of the Edge.
    pub tolerance: f64,
}

impl Edge {
    /// Whether the Edge closes onto a single Node (and is not degenerate).
    pub fn closed(&self) -> bool {
        !self.degenerate && self.nodes[0] == self.nodes[1]
    }
}

/// One traversal of an Edge within a Loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopUse {
    /// The Edge traversed.
    pub edge: EdgeId,
    /// +1 traverses t_lo → t_hi, -1 the reverse.
    pub sense: i32,
    /// Pcurve index for this use in the owning Face's parameter plane.
    pub pcurve: Option<usize>,
}

/// A closed chain of Edge uses bounding a Face on one side.
#[derive(Debug, Clone)]
pub struct Loop {
    /// Ordered Edge uses.
    pub uses: Vec<LoopUse>,
}

/// A topological face: a trimmed region of a surface.
#[derive(Debug, Clone)]
pub struct Face {
    /// Index of the carrier surface in the geometry store.
    pub surface: usize,
    /// Bounding Loops; the first is the outer Loop.
    pub loops: Vec<LoopId>,
    /// +1 when the Face normal agrees with the surface normal, -1 when
    /// reversed; flips the required parameter-plane orientation.
    pub sense: i32,
    /// Geometric tolerance of the Face.
    pub tolerance: f64,
}

/// A connected set of Faces.
#[derive(Debug, Clone)]
pub struct Shell {
    /// Member Faces.
    pub faces: Vec<FaceId>,
}

/// What a Body encloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Edges only, no Faces.
    Wire,
    /// Open Face set.
    Sheet,
    /// Closed volume.
    Solid,
}

/// The root topological entity handed to the tessellator.
#[derive(Debug, Clone)]
pub struct Body {
    /// Wire, Sheet or Solid.
    pub kind: BodyKind,
    /// Member Shells (empty for a WireBody).
    pub shells: Vec<ShellId>,
    /// Nodes in body-index order (1-based externally).
    pub nodes: Vec<NodeId>,
    /// Edges in body-index order (1-based externally).
    pub edges: Vec<EdgeId>,
    /// Faces in body-index order (1-based externally).
    pub faces: Vec<FaceId>,
}

/// Faces on the two algebraic sides of an Edge, as 1-based body Face
/// indices. An Edge used with negative sense by a Face lists that Face
/// on the `neg` side. Non-manifold Edges carry more than one entry.
#[derive(Debug, Clone, Default)]
pub struct EdgeSides {
    /// Faces using the Edge with sense -1.
    pub neg: Vec<usize>,
    /// Faces using the Edge with sense +1.
    pub pos: Vec<usize>,
}

impl EdgeSides {
    /// Faces for one side: 0 = neg, 1 = pos.
    pub fn side(&self, m: usize) -> &[usize] {
        if m == 0 {
            &self.neg
        } else {
            &self.pos
        }
    }

    /// Position (1-based) of `face` in the side list, 0 if absent.
    pub fn slot_of(&self, m: usize, face: usize) -> usize {
        self.side(m)
            .iter()
            .position(|&f| f == face)
            .map_or(0, |i| i + 1)
    }
}

/// Arena storage for all topological entities.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Node arena.
    pub nodes: SlotMap<NodeId, Node>,
    /// Edge arena.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Loop arena.
    pub loops: SlotMap<LoopId, Loop>,
    /// Face arena.
    pub faces: SlotMap<FaceId, Face>,
    /// Shell arena.
    pub shells: SlotMap<ShellId, Shell>,
    /// Body arena.
    pub bodies: SlotMap<BodyId, Body>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Node.
    pub fn add_node(&mut self, point: Point3) -> NodeId {
        self.nodes.insert(Node { point })
    }

    /// Add an Edge.
    pub fn add_edge(
        &mut self,
        curve: usize,
        t_range: (f64, f64),
        nodes: [NodeId; 2],
    ) -> EdgeId {
        self.edges.insert(Edge {
            curve,
            t_range,
            nodes,
            degenerate: false,
            tolerance: 1e-7,
        })
    }

    /// Add a degenerate Edge (zero 3D extent at a single Node).
    pub fn add_degenerate_edge(
        &mut self,
        curve: usize,
        t_range: (f64, f64),
        node: NodeId,
    ) -> EdgeId {
        self.edges.insert(Edge {
            curve,
            t_range,
            nodes: [node, node],
            degenerate: true,
            tolerance: 1e-7,
        })
    }

    /// Add a Loop from its ordered Edge uses.
    pub fn add_loop(&mut self, uses: Vec<LoopUse>) -> LoopId {
        self.loops.insert(Loop { uses })
    }

    /// Add a Face from its Loops (first is outer).
    pub fn add_face(&mut self, surface: usize, loops: Vec<LoopId>, sense: i32) -> FaceId {
        self.faces.insert(Face {
            surface,
            loops,
            sense,
            tolerance: 1e-7,
        })
    }

    /// Add a Shell.
    pub fn add_shell(&mut self, faces: Vec<FaceId>) -> ShellId {
        self.shells.insert(Shell { faces })
    }

    /// Add a Body; the Node/Edge/Face index lists are gathered from the
    /// Shell structure in first-encounter order.
    pub fn add_body(&mut self, kind: BodyKind, shells: Vec<ShellId>) -> BodyId {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut faces = Vec::new();
        for &sid in &shells {
            let shell_faces = self.shells[sid].faces.clone();
            for fid in shell_faces {
                if !faces.contains(&fid) {
                    faces.push(fid);
                }
                let face_loops = self.faces[fid].loops.clone();
                for lid in face_loops {
                    let uses = self.loops[lid].uses.clone();
                    for lu in uses {
                        if !edges.contains(&lu.edge) {
                            edges.push(lu.edge);
                        }
                        for nid in self.edges[lu.edge].nodes {
                            if !nodes.contains(&nid) {
                                nodes.push(nid);
                            }
                        }
                    }
                }
            }
        }
        self.bodies.insert(Body {
            kind,
            shells,
            nodes,
            edges,
            faces,
        })
    }

    /// Add a WireBody directly from ordered Edges.
    pub fn add_wire_body(&mut self, edges: Vec<EdgeId>) -> BodyId {
        let mut nodes = Vec::new();
        for &eid in &edges {
            for nid in self.edges[eid].nodes {
                if !nodes.contains(&nid) {
                    nodes.push(nid);
                }
            }
        }
        self.bodies.insert(Body {
            kind: BodyKind::Wire,
            shells: Vec::new(),
            nodes,
            edges,
            faces: Vec::new(),
        })
    }

    /// 1-based body index of an Edge, 0 if not in the Body.
    pub fn edge_index(&self, body: BodyId, edge: EdgeId) -> usize {
        self.bodies[body]
            .edges
            .iter()
            .position(|&e| e == edge)
            .map_or(0, |i| i + 1)
    }

    /// 1-based body index of a Face, 0 if not in the Body.
    pub fn face_index(&self, body: BodyId, face: FaceId) -> usize {
        self.bodies[body]
            .faces
            .iter()
            .position(|&f| f == face)
            .map_or(0, |i| i + 1)
    }

    /// 1-based body index of a Node, 0 if not in the Body.
    pub fn node_index(&self, body: BodyId, node: NodeId) -> usize {
        self.bodies[body]
            .nodes
            .iter()
            .position(|&n| n == node)
            .map_or(0, |i| i + 1)
    }

    /// Faces on each side of every Edge of the Body, indexed by the
    /// Edge's body position. Side membership follows Loop-use senses, in
    /// Face-index order.
    pub fn edge_sides(&self, body: BodyId) -> Vec<EdgeSides> {
        let b = &self.bodies[body];
        let mut sides = vec![EdgeSides::default(); b.edges.len()];
        for (fpos, &fid) in b.faces.iter().enumerate() {
            for &lid in &self.faces[fid].loops {
                for lu in &self.loops[lid].uses {
                    let Some(epos) = b.edges.iter().position(|&e| e == lu.edge) else {
                        continue;
                    };
                    let list = if lu.sense < 0 {
                        &mut sides[epos].neg
                    } else {
                        &mut sides[epos].pos
                    };
                    if !list.contains(&(fpos + 1)) {
                        list.push(fpos + 1);
                    }
                }
            }
        }
        sides
    }

    /// Pcurve index for the use of `edge` with `sense` in `face`, if any.
    pub fn pcurve_for(&self, face: FaceId, edge: EdgeId, sense: i32) -> Option<usize> {
        for &lid in &self.faces[face].loops {
            for lu in &self.loops[lid].uses {
                if lu.edge == edge && lu.sense == sense {
                    return lu.pcurve;
                }
            }
        }
        // seam fallback: any use of the edge
        for &lid in &self.faces[face].loops {
            for lu in &self.loops[lid].uses {
                if lu.edge == edge {
                    return lu.pcurve;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_body(topo: &mut Topology) -> (BodyId, FaceId, [EdgeId; 4]) {
        let n: Vec<NodeId> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
        .iter()
        .map(|&p| topo.add_node(p))
        .collect();
        let e0 = topo.add_edge(0, (0.0, 1.0), [n[0], n[1]]);
        let e1 = topo.add_edge(1, (0.0, 1.0), [n[1], n[2]]);
        let e2 = topo.add_edge(2, (0.0, 1.0), [n[2], n[3]]);
        let e3 = topo.add_edge(3, (0.0, 1.0), [n[3], n[0]]);
        let uses = [e0, e1, e2, e3]
            .iter()
            .map(|&e| LoopUse {
                edge: e,
                sense: 1,
                pcurve: None,
            })
            .collect();
        let lp = topo.add_loop(uses);
        let f = topo.add_face(0, vec![lp], 1);
        let sh = topo.add_shell(vec![f]);
        let b = topo.add_body(BodyKind::Sheet, vec![sh]);
        (b, f, [e0, e1, e2, e3])
    }

    #[test]
    fn test_body_index_order() {
        let mut topo = Topology::new();
        let (b, f, edges) = square_body(&mut topo);
        assert_eq!(topo.bodies[b].edges.len(), 4);
        assert_eq!(topo.bodies[b].nodes.len(), 4);
        assert_eq!(topo.face_index(b, f), 1);
        for (i, &e) in edges.iter().enumerate() {
            assert_eq!(topo.edge_index(b, e), i + 1);
        }
    }

    #[test]
    fn test_edge_sides_single_face() {
        let mut topo = Topology::new();
        let (b, _, _) = square_body(&mut topo);
        let sides = topo.edge_sides(b);
        for s in &sides {
            assert_eq!(s.pos, vec![1]);
            assert!(s.neg.is_empty());
            assert_eq!(s.slot_of(1, 1), 1);
            assert_eq!(s.slot_of(0, 1), 0);
        }
    }

    #[test]
    fn test_closed_and_degenerate_edges() {
        let mut topo = Topology::new();
        let n = topo.add_node(Point3::origin());
        let closed = topo.add_edge(0, (0.0, 1.0), [n, n]);
        let degen = topo.add_degenerate_edge(0, (0.0, 1.0), n);
        assert!(topo.edges[closed].closed());
        assert!(!topo.edges[degen].closed());
        assert!(topo.edges[degen].degenerate);
    }

    #[test]
    fn test_wire_body() {
        let mut topo = Topology::new();
        let n0 = topo.add_node(Point3::origin());
        let n1 = topo.add_node(Point3::new(1.0, 0.0, 0.0));
        let e = topo.add_edge(0, (0.0, 1.0), [n0, n1]);
        let b = topo.add_wire_body(vec![e]);
        assert_eq!(topo.bodies[b].kind, BodyKind::Wire);
        assert_eq!(topo.bodies[b].edges.len(), 1);
        assert!(topo.bodies[b].faces.is_empty());
    }
}
