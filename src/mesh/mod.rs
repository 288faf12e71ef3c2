//! The mesh store: two arenas (vertices, tetrahedra) plus the point-location,
//! cavity, and flip primitives built on top of them.
//!
//! Unlike the teacher crate's half-triangle DCEL (`tet_idx * 4 + tri_idx`
//! indexing), tetrahedra here carry four neighbor *tetrahedron* ids directly,
//! one per face, matching spec.md §3's I3/I4/I5 invariants. This is the
//! representation the constraint recoverer and region carver need: a facet
//! marker lives on a face, not on a half-triangle pair.

mod cavity;
mod flips;
mod iter;
mod locate;

pub use iter::{EdgeRing, Star};
pub use locate::{LocateResult, Position};

use crate::error::{Location, MeshError, MeshResult};
use crate::predicates::orient3d;
use crate::utils::types::Vertex3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type VertexId = usize;
pub type TetId = usize;
pub type FacetId = usize;
pub type RegionId = usize;

/// How a vertex came to exist in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexTag {
    /// A tombstoned, reusable slot.
    Unused,
    /// Present in the original input.
    Input,
    /// Inserted by the constraint recoverer to split a segment.
    SteinerSegment,
    /// Inserted by the constraint recoverer to split a subface.
    SteinerFacet,
    /// Inserted by the quality refiner to split a bad tetrahedron.
    SteinerVolume,
}

/// A vertex in the mesh's stable arena.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub coords: Vertex3,
    pub attributes: Vec<f64>,
    pub marker: i32,
    pub tag: VertexTag,
    /// One tetrahedron incident to this vertex, the root of its star; `None`
    /// for a tombstoned vertex.
    pub incident_tet: Option<TetId>,
}

impl Vertex {
    pub fn input(coords: Vertex3) -> Self {
        Self {
            coords,
            attributes: Vec::new(),
            marker: 0,
            tag: VertexTag::Input,
            incident_tet: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct VertexArena {
    slots: Vec<Vertex>,
    free: Vec<VertexId>,
}

impl VertexArena {
    pub fn insert(&mut self, v: Vertex) -> VertexId {
        if let Some(id) = self.free.pop() {
            self.slots[id] = v;
            id
        } else {
            self.slots.push(v);
            self.slots.len() - 1
        }
    }

    pub fn remove(&mut self, id: VertexId) {
        self.slots[id].tag = VertexTag::Unused;
        self.slots[id].incident_tet = None;
        self.free.push(id);
    }

    pub fn get(&self, id: VertexId) -> &Vertex {
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.slots[id]
    }

    pub fn coords(&self, id: VertexId) -> Vertex3 {
        self.slots[id].coords
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.slots.len()).filter(|&id| self.slots[id].tag != VertexTag::Unused)
    }
}

/// A vertex slot within a tetrahedron: either a real vertex, or the single
/// conceptual "vertex at infinity" shared by every ghost tetrahedron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Real(VertexId),
    Ghost,
}

impl Node {
    pub const fn id(self) -> Option<VertexId> {
        match self {
            Node::Real(id) => Some(id),
            Node::Ghost => None,
        }
    }

    pub const fn is_ghost(self) -> bool {
        matches!(self, Node::Ghost)
    }
}

/// For each vertex index within a tetrahedron, the other three in an order
/// such that they are wound counterclockwise as seen from outside the
/// tetrahedron (i.e. looking from the excluded vertex towards the face).
pub(crate) const FACE_NODES: [[usize; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];

#[derive(Debug, Clone)]
pub struct Tetrahedron {
    pub nodes: [Node; 4],
    /// `neighbors[i]` is the tetrahedron sharing the face opposite `nodes[i]`.
    pub neighbors: [TetId; 4],
    pub face_markers: [Option<FacetId>; 4],
    pub region: Option<RegionId>,
    pub volume_bound: Option<f64>,
}

impl Tetrahedron {
    pub const fn is_ghost(&self) -> bool {
        self.nodes[0].is_ghost()
            || self.nodes[1].is_ghost()
            || self.nodes[2].is_ghost()
            || self.nodes[3].is_ghost()
    }

    /// Index of the ghost slot, if any.
    pub fn ghost_index(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.is_ghost())
    }

    pub fn face_nodes(&self, opposite: usize) -> [Node; 3] {
        let idx = FACE_NODES[opposite];
        [self.nodes[idx[0]], self.nodes[idx[1]], self.nodes[idx[2]]]
    }

    /// Index of `node` within this tetrahedron's four slots, if present.
    pub fn index_of(&self, node: Node) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }
}

#[derive(Debug, Default)]
pub struct TetArena {
    slots: Vec<Tetrahedron>,
    alive: Vec<bool>,
    free: Vec<TetId>,
}

impl TetArena {
    pub fn insert(&mut self, t: Tetrahedron) -> TetId {
        if let Some(id) = self.free.pop() {
            self.slots[id] = t;
            self.alive[id] = true;
            id
        } else {
            self.slots.push(t);
            self.alive.push(true);
            self.slots.len() - 1
        }
    }

    pub fn remove(&mut self, id: TetId) {
        self.alive[id] = false;
        self.free.push(id);
    }

    pub fn is_alive(&self, id: TetId) -> bool {
        self.alive[id]
    }

    pub fn get(&self, id: TetId) -> &Tetrahedron {
        debug_assert!(self.alive[id], "access to a deleted tetrahedron {id}");
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: TetId) -> &mut Tetrahedron {
        debug_assert!(self.alive[id], "access to a deleted tetrahedron {id}");
        &mut self.slots[id]
    }

    pub fn capacity_len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = TetId> + '_ {
        (0..self.slots.len()).filter(|&id| self.alive[id])
    }

    pub fn count_alive(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}

/// The mesh store: arenas plus the bookkeeping shared by the
/// point-location, cavity, and flip primitives.
#[derive(Debug)]
pub struct MeshStore {
    pub vertices: VertexArena,
    pub tets: TetArena,
    /// Seed tet for the next `locate`, kept as "the last tet touched".
    pub(crate) last_tet: Option<TetId>,
    pub(crate) rng: ChaCha8Rng,
    next_facet_id: FacetId,
    next_region_id: RegionId,
}

impl MeshStore {
    pub fn new(seed: u64) -> Self {
        Self {
            vertices: VertexArena::default(),
            tets: TetArena::default(),
            last_tet: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_facet_id: 0,
            next_region_id: 0,
        }
    }

    pub fn new_facet_id(&mut self) -> FacetId {
        let id = self.next_facet_id;
        self.next_facet_id += 1;
        id
    }

    pub fn new_region_id(&mut self) -> RegionId {
        let id = self.next_region_id;
        self.next_region_id += 1;
        id
    }

    /// Coordinates of a [`Node`], where [`Node::Ghost`] has no coordinates.
    pub fn node_coords(&self, node: Node) -> Option<Vertex3> {
        node.id().map(|id| self.vertices.coords(id))
    }

    /// Mutually links `a`'s face opposite `ai` with `b`'s face opposite `bi`.
    pub(crate) fn link(&mut self, a: TetId, ai: usize, b: TetId, bi: usize) {
        self.tets.get_mut(a).neighbors[ai] = b;
        self.tets.get_mut(b).neighbors[bi] = a;
    }

    /// Finds the slot index in `tet` whose opposite face holds `from`, i.e.
    /// the neighbor-slot pointing back at `from`.
    pub(crate) fn neighbor_slot_back_to(&self, tet: TetId, from: TetId) -> usize {
        let t = self.tets.get(tet);
        t.neighbors
            .iter()
            .position(|&n| n == from)
            .expect("neighbor link is not mutual")
    }

    /// Orientation test for the face opposite `nodes[i]` of `tet`, used
    /// throughout `locate`/`find_cavity`: positive means `p` is on the
    /// interior side of that face.
    pub(crate) fn orient_against_face(&self, tet: &Tetrahedron, face: usize, p: &Vertex3) -> f64 {
        let [n0, n1, n2] = tet.face_nodes(face);
        match (self.node_coords(n0), self.node_coords(n1), self.node_coords(n2)) {
            (Some(a), Some(b), Some(c)) => orient3d(&a, &b, &c, p),
            // A ghost face has no finite plane; treat as "always interior"
            // so walks pass straight through into the real neighbor.
            _ => 1.0,
        }
    }

    /// Records that `vertex` has at least one incident tetrahedron `tet`.
    pub(crate) fn touch_vertex(&mut self, vertex: VertexId, tet: TetId) {
        self.vertices.get_mut(vertex).incident_tet = Some(tet);
        self.last_tet = Some(tet);
    }

    pub fn invariant_violation(rule: impl Into<String>) -> MeshError {
        MeshError::invariant(rule)
    }

    pub fn input_error(message: impl Into<String>, loc: Location) -> MeshError {
        MeshError::input(message, loc)
    }

    /// Checks spec.md §3's P1/P2 invariants over the whole mesh. Intended for
    /// tests and the `-C` self-check switch, not the hot path.
    pub fn is_sound(&self) -> MeshResult<bool> {
        for tet_id in self.tets.iter_alive() {
            let tet = self.tets.get(tet_id);

            if !tet.is_ghost() {
                let coords: Vec<Vertex3> = tet
                    .nodes
                    .iter()
                    .map(|n| self.node_coords(*n).unwrap())
                    .collect();
                if orient3d(&coords[0], &coords[1], &coords[2], &coords[3]) <= 0.0 {
                    return Ok(false);
                }
            }

            for face in 0..4 {
                let neighbor = tet.neighbors[face];
                if !self.tets.is_alive(neighbor) {
                    return Ok(false);
                }
                let back = self.neighbor_slot_back_to(neighbor, tet_id);
                let mine: std::collections::BTreeSet<_> =
                    tet.face_nodes(face).into_iter().collect();
                let theirs: std::collections::BTreeSet<_> =
                    self.tets.get(neighbor).face_nodes(back).into_iter().collect();
                if mine != theirs {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

pub use cavity::Cavity;
pub use flips::FlipError;
