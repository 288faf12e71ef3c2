//! Bowyer–Watson cavity growth and retriangulation.
//!
//! Grounded on the teacher's `bw_start`/`bw_tets_to_check`/`bw_rem_tet`/
//! `bw_keep_tetra`/`bw_insert_node` (`rita/src/tetds/tet_data_structure.rs`),
//! adapted from half-triangle bookkeeping to the face-adjacency model: a
//! cavity is just a connected set of tet ids plus the ring of faces on its
//! boundary, and filling it deletes the set and fans new tets off each
//! boundary face.

use super::{MeshStore, Node, TetId, Tetrahedron};
use crate::predicates::insphere;
use crate::utils::types::Vertex3;
use std::collections::HashSet;

/// A face on the boundary of a cavity: `outside_tet` survives, and its
/// `outside_face` slot is the face shared with a deleted cavity tet.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFace {
    pub outside_tet: TetId,
    pub outside_face: usize,
    pub nodes: [Node; 3],
}

#[derive(Debug, Default)]
pub struct Cavity {
    pub tets: Vec<TetId>,
    pub boundary: Vec<BoundaryFace>,
}

impl MeshStore {
    /// Whether `tet` should be absorbed into a cavity being grown towards
    /// `p`. For a real tet this is the standard insphere test; for a ghost
    /// tet it is an orientation test against its one real face, since the
    /// "infinite" vertex has no circumsphere.
    fn in_cavity(&self, tet: &Tetrahedron, p: &Vertex3) -> bool {
        match tet.ghost_index() {
            Some(ghost_face) => self.orient_against_face(tet, ghost_face, p) > 0.0,
            None => {
                let coords: Vec<Vertex3> = tet
                    .nodes
                    .iter()
                    .map(|n| self.node_coords(*n).unwrap())
                    .collect();
                insphere(&coords[0], &coords[1], &coords[2], &coords[3], p) > 0.0
            }
        }
    }

    /// Grows the Bowyer–Watson cavity for `p` starting at `seed`, which must
    /// already contain or be adjacent to `p`. A face carrying a facet/segment
    /// marker is never crossed, so constrained recovery can reuse this
    /// routine to retriangulate within one side of a recovered facet.
    pub fn find_cavity(&mut self, seed: TetId, p: &Vertex3) -> Cavity {
        self.find_cavity_seeded(&[seed], p)
    }

    /// Same as `find_cavity`, but the flood starts from every tet in
    /// `seeds` at once instead of a single one. Used when `p` lands exactly
    /// on a face or edge, where every tet already touching `p` must be
    /// absorbed unconditionally (their insphere test against `p` is on the
    /// boundary, 0, and can't be trusted to include them on its own).
    pub fn find_cavity_seeded(&mut self, seeds: &[TetId], p: &Vertex3) -> Cavity {
        let mut in_set: HashSet<TetId> = HashSet::new();
        let mut stack = Vec::new();
        for &seed in seeds {
            if in_set.insert(seed) {
                stack.push(seed);
            }
        }

        while let Some(tet_id) = stack.pop() {
            let tet = self.tets.get(tet_id).clone();
            for face in 0..4 {
                if tet.face_markers[face].is_some() {
                    continue;
                }
                let neighbor = tet.neighbors[face];
                if in_set.contains(&neighbor) {
                    continue;
                }
                let neighbor_tet = self.tets.get(neighbor);
                if self.in_cavity(neighbor_tet, p) {
                    in_set.insert(neighbor);
                    stack.push(neighbor);
                }
            }
        }

        let mut boundary = Vec::new();
        for &tet_id in &in_set {
            let tet = self.tets.get(tet_id);
            for face in 0..4 {
                let neighbor = tet.neighbors[face];
                if in_set.contains(&neighbor) {
                    continue;
                }
                let back = self.neighbor_slot_back_to(neighbor, tet_id);
                boundary.push(BoundaryFace {
                    outside_tet: neighbor,
                    outside_face: back,
                    nodes: self.tets.get(neighbor).face_nodes(back),
                });
            }
        }

        Cavity {
            tets: in_set.into_iter().collect(),
            boundary,
        }
    }

    /// Deletes a cavity and fans new tets from `apex` to each boundary face,
    /// relinking neighbors (including between the new tets themselves along
    /// shared edges through `apex`). Returns the ids of the newly created
    /// tets.
    pub fn fill_cavity(&mut self, cavity: &Cavity, apex: Node) -> Vec<TetId> {
        let apex_coords = self.node_coords(apex);
        let mut new_tets = Vec::with_capacity(cavity.boundary.len());

        for bf in &cavity.boundary {
            let mut face = bf.nodes;
            if let (Some(a), Some(b0), Some(b1), Some(b2)) = (
                apex_coords,
                self.node_coords(face[0]),
                self.node_coords(face[1]),
                self.node_coords(face[2]),
            ) {
                if crate::predicates::orient3d(&b0, &b1, &b2, &a) < 0.0 {
                    face.swap(1, 2);
                }
            }

            let nodes = [apex, face[0], face[1], face[2]];
            let new_tet = Tetrahedron {
                nodes,
                neighbors: [bf.outside_tet, TetId::MAX, TetId::MAX, TetId::MAX],
                face_markers: [bf.outside_tet_face_marker(self), None, None, None],
                region: None,
                volume_bound: None,
            };
            let new_id = self.tets.insert(new_tet);
            self.link(new_id, 0, bf.outside_tet, bf.outside_face);
            new_tets.push(new_id);

            for node in nodes {
                if let Some(vid) = node.id() {
                    self.touch_vertex(vid, new_id);
                }
            }
        }

        for &old in &cavity.tets {
            self.tets.remove(old);
        }

        self.stitch_new_tets(&new_tets);
        new_tets
    }

    /// The new tets around `apex` share edges through `apex` pairwise; this
    /// links each new tet's three apex-adjacent faces to whichever other new
    /// tet shares that edge, by matching shared node pairs.
    fn stitch_new_tets(&mut self, new_tets: &[TetId]) {
        for i in 0..new_tets.len() {
            let ti = new_tets[i];
            for face_i in 1..4 {
                if self.tets.get(ti).neighbors[face_i] != TetId::MAX {
                    continue;
                }
                let face_nodes_i: HashSet<Node> =
                    self.tets.get(ti).face_nodes(face_i).into_iter().collect();
                for &tj in &new_tets[i + 1..] {
                    for face_j in 1..4 {
                        if self.tets.get(tj).neighbors[face_j] != TetId::MAX {
                            continue;
                        }
                        let face_nodes_j: HashSet<Node> =
                            self.tets.get(tj).face_nodes(face_j).into_iter().collect();
                        if face_nodes_i == face_nodes_j {
                            self.link(ti, face_i, tj, face_j);
                        }
                    }
                }
            }
        }
    }
}

impl BoundaryFace {
    fn outside_tet_face_marker(&self, mesh: &MeshStore) -> Option<super::FacetId> {
        mesh.tets.get(self.outside_tet).face_markers[self.outside_face]
    }
}
