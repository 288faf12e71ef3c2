//! Local flips used by constraint recovery: `flip23`/`flip32` swap the
//! diagonal of the bipyramid formed by two (resp. three) tets around a
//! shared face (resp. edge); `flip14`/`flip41` split a tet around an
//! interior point into four (resp. collapse the four tets around an
//! interior-degree-4 vertex back into one).
//!
//! The teacher crate never needs flips (pure Delaunay insertion doesn't
//! require them), so these are authored fresh against the face-adjacency
//! model, reusing the same neighbor-matching-by-node-set technique
//! `cavity.rs`'s `stitch_new_tets` uses.

use super::{MeshStore, Node, TetId, Tetrahedron};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipError {
    NotFlippable,
}

impl fmt::Display for FlipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flip precondition failed, mesh left unchanged")
    }
}

/// An outer face exposed by tets about to be deleted: the new tets must
/// each claim one of these by matching node sets.
struct OuterFace {
    neighbor: TetId,
    neighbor_face: usize,
    nodes: [Node; 3],
}

fn blank_tet(nodes: [Node; 4]) -> Tetrahedron {
    Tetrahedron {
        nodes,
        neighbors: [TetId::MAX; 4],
        face_markers: [None; 4],
        region: None,
        volume_bound: None,
    }
}

impl MeshStore {
    /// Links each of `new_tet`'s `faces` to whichever remaining `OuterFace`
    /// has the same node set.
    fn claim_outer_faces(&mut self, new_tet: TetId, faces: &[usize], outers: &mut Vec<OuterFace>) {
        for &face in faces {
            let wanted: HashSet<Node> =
                self.tets.get(new_tet).face_nodes(face).into_iter().collect();
            if let Some(pos) = outers
                .iter()
                .position(|o| o.nodes.iter().copied().collect::<HashSet<_>>() == wanted)
            {
                let o = outers.remove(pos);
                self.link(new_tet, face, o.neighbor, o.neighbor_face);
            }
        }
    }

    fn touch_all(&mut self, tet: TetId) {
        for node in self.tets.get(tet).nodes {
            if let Some(v) = node.id() {
                self.touch_vertex(v, tet);
            }
        }
    }

    /// 2-to-3 flip: `a` and `b` share the face opposite local index
    /// `face_in_a` of `a`. Replaces both with three tets sharing the edge
    /// between the two tets' apexes. Fails (mesh unchanged) unless the two
    /// apexes and the shared triangle are in strictly convex position.
    pub fn flip23(&mut self, a: TetId, face_in_a: usize) -> Result<[TetId; 3], FlipError> {
        let tet_a = self.tets.get(a).clone();
        let b = tet_a.neighbors[face_in_a];
        let face_in_b = self.neighbor_slot_back_to(b, a);
        let tet_b = self.tets.get(b).clone();

        let apex_a = tet_a.nodes[face_in_a];
        let apex_b = tet_b.nodes[face_in_b];
        let shared = tet_a.face_nodes(face_in_a);

        for (p, q) in [(0, 1), (1, 2), (2, 0)] {
            if let (Some(ac), Some(bc), Some(pc), Some(qc)) = (
                self.node_coords(apex_a),
                self.node_coords(apex_b),
                self.node_coords(shared[p]),
                self.node_coords(shared[q]),
            ) {
                if crate::predicates::orient3d(&pc, &qc, &ac, &bc) <= 0.0 {
                    return Err(FlipError::NotFlippable);
                }
            }
        }

        let shared_set: HashSet<Node> = shared.iter().copied().collect();
        let mut outers = Vec::with_capacity(6);
        for (host, tet) in [(a, &tet_a), (b, &tet_b)] {
            for face in 0..4 {
                let fnodes = tet.face_nodes(face);
                if fnodes.iter().copied().collect::<HashSet<_>>() == shared_set {
                    continue;
                }
                let neighbor = tet.neighbors[face];
                let back = self.neighbor_slot_back_to(neighbor, host);
                outers.push(OuterFace {
                    neighbor,
                    neighbor_face: back,
                    nodes: fnodes,
                });
            }
        }

        let mut new_tets = [0usize; 3];
        for (i, (p, q)) in [(0, 1), (1, 2), (2, 0)].into_iter().enumerate() {
            let nodes = [apex_a, apex_b, shared[p], shared[q]];
            new_tets[i] = self.tets.insert(blank_tet(nodes));
        }
        for i in 0..3 {
            let j = (i + 1) % 3;
            // new_tets[i] and new_tets[j] both contain {apex_a, apex_b,
            // shared[q_i]} (== shared[p_j]): face 2 of tet_i (opposite
            // shared[p_i]) and face 3 of tet_j (opposite shared[q_j]) are
            // that shared triangle, per the FACE_NODES table.
            self.link(new_tets[i], 2, new_tets[j], 3);
        }
        // Faces 0 and 1 (opposite apex_a and apex_b respectively) are the
        // outer faces inherited from the old tet_b and tet_a.
        for &t in &new_tets {
            self.claim_outer_faces(t, &[0, 1], &mut outers);
        }

        self.tets.remove(a);
        self.tets.remove(b);
        for &t in &new_tets {
            self.touch_all(t);
        }
        Ok(new_tets)
    }

    /// 3-to-2 flip, the inverse of [`Self::flip23`]: the three tets sharing
    /// edge `(u, v)` collapse into two tets sharing the triangle formed by
    /// the three apexes opposite that edge.
    pub fn flip32(&mut self, edge: [Node; 2]) -> Result<[TetId; 2], FlipError> {
        let ring: Vec<TetId> = self.enumerate_edge_ring(edge).collect();
        if ring.len() != 3 {
            return Err(FlipError::NotFlippable);
        }
        let [u, v] = edge;

        let mut apexes = Vec::with_capacity(3);
        for &t in &ring {
            let tet = self.tets.get(t);
            let apex_pair: Vec<Node> = tet
                .nodes
                .iter()
                .copied()
                .filter(|n| *n != u && *n != v)
                .collect();
            for a in apex_pair {
                if !apexes.contains(&a) {
                    apexes.push(a);
                }
            }
        }
        if apexes.len() != 3 {
            return Err(FlipError::NotFlippable);
        }

        if let (Some(a0), Some(a1), Some(a2), Some(uc), Some(vc)) = (
            self.node_coords(apexes[0]),
            self.node_coords(apexes[1]),
            self.node_coords(apexes[2]),
            self.node_coords(u),
            self.node_coords(v),
        ) {
            let o_u = crate::predicates::orient3d(&a0, &a1, &a2, &uc);
            let o_v = crate::predicates::orient3d(&a0, &a1, &a2, &vc);
            if o_u == 0.0 || o_v == 0.0 || (o_u > 0.0) == (o_v > 0.0) {
                return Err(FlipError::NotFlippable);
            }
        }

        let mut outers = Vec::with_capacity(6);
        for &t in &ring {
            let tet = self.tets.get(t).clone();
            for face in 0..4 {
                let fnodes = tet.face_nodes(face);
                if !fnodes.contains(&u) && !fnodes.contains(&v) {
                    // this is the face opposite neither u nor v: impossible
                    // for a tet containing both, kept for completeness.
                    continue;
                }
                if fnodes.contains(&u) && fnodes.contains(&v) {
                    // an internal face between two ring tets, skip
                    continue;
                }
                let neighbor = tet.neighbors[face];
                let back = self.neighbor_slot_back_to(neighbor, t);
                outers.push(OuterFace {
                    neighbor,
                    neighbor_face: back,
                    nodes: fnodes,
                });
            }
        }

        let top = self.tets.insert(blank_tet([u, apexes[0], apexes[1], apexes[2]]));
        let bottom = self.tets.insert(blank_tet([v, apexes[0], apexes[1], apexes[2]]));
        self.link(top, 0, bottom, 0);
        self.claim_outer_faces(top, &[1, 2, 3], &mut outers);
        self.claim_outer_faces(bottom, &[1, 2, 3], &mut outers);

        for &t in &ring {
            self.tets.remove(t);
        }
        self.touch_all(top);
        self.touch_all(bottom);
        Ok([top, bottom])
    }

    /// 1-to-4 flip: splits `tet` into four tets sharing the new vertex `v`,
    /// which must lie strictly inside `tet` (on a face or edge instead,
    /// [`Self::flip23`]/a boundary-ring split applies). Fails (mesh
    /// unchanged) unless `v` is on the strictly interior side of all four
    /// of `tet`'s faces.
    pub fn flip14(&mut self, tet: TetId, v: Node) -> Result<[TetId; 4], FlipError> {
        let Some(vc) = self.node_coords(v) else {
            return Err(FlipError::NotFlippable);
        };
        let old = self.tets.get(tet).clone();

        for i in 0..4 {
            let [a, b, c] = old.face_nodes(i);
            if let (Some(ac), Some(bc), Some(cc)) =
                (self.node_coords(a), self.node_coords(b), self.node_coords(c))
            {
                if crate::predicates::orient3d(&ac, &bc, &cc, &vc) <= 0.0 {
                    return Err(FlipError::NotFlippable);
                }
            }
        }

        let mut outers = Vec::with_capacity(4);
        for face in 0..4 {
            let neighbor = old.neighbors[face];
            let back = self.neighbor_slot_back_to(neighbor, tet);
            outers.push(OuterFace {
                neighbor,
                neighbor_face: back,
                nodes: old.face_nodes(face),
            });
        }

        let mut new_tets = [0usize; 4];
        for i in 0..4 {
            let mut nodes = old.nodes;
            nodes[i] = v;
            new_tets[i] = self.tets.insert(blank_tet(nodes));
        }
        // Face `i` of `new_tets[i]` is the face opposite `v`, i.e. the
        // original tet's face `i`; the other three faces are internal,
        // each shared with the `new_tets[j]` that also kept `v` and the
        // two original nodes other than `i` and `j`.
        for i in 0..4 {
            self.claim_outer_faces(new_tets[i], &[i], &mut outers);
        }
        for i in 0..4 {
            for j in (i + 1)..4 {
                self.link(new_tets[i], j, new_tets[j], i);
            }
        }

        self.tets.remove(tet);
        for &t in &new_tets {
            self.touch_all(t);
        }
        Ok(new_tets)
    }

    /// 4-to-1 flip, the inverse of [`Self::flip14`]: collapses the four
    /// tets sharing vertex `v` back into the single tet they split, when
    /// `v`'s link is exactly a tetrahedron (four distinct apex nodes, one
    /// per incident tet). Fails (mesh unchanged) if `v` has any other
    /// number of incident tets, if any of them is a ghost tet (`v` on the
    /// hull has no well-defined 4-to-1 collapse), or if the four apex
    /// nodes are degenerate.
    pub fn flip41(&mut self, v: Node) -> Result<TetId, FlipError> {
        let star: Vec<TetId> = self.enumerate_star(v).collect();
        if star.len() != 4 {
            return Err(FlipError::NotFlippable);
        }

        let mut outers = Vec::with_capacity(4);
        let mut apexes: Vec<Node> = Vec::with_capacity(4);
        for &t in &star {
            let tet = self.tets.get(t).clone();
            if tet.is_ghost() {
                return Err(FlipError::NotFlippable);
            }
            let Some(vi) = tet.index_of(v) else {
                return Err(FlipError::NotFlippable);
            };
            let outer_face = tet.face_nodes(vi);
            for n in outer_face {
                if !apexes.contains(&n) {
                    apexes.push(n);
                }
            }
            let neighbor = tet.neighbors[vi];
            let back = self.neighbor_slot_back_to(neighbor, t);
            outers.push(OuterFace {
                neighbor,
                neighbor_face: back,
                nodes: outer_face,
            });
        }
        if apexes.len() != 4 {
            return Err(FlipError::NotFlippable);
        }

        let mut quad = [apexes[0], apexes[1], apexes[2], apexes[3]];
        if let (Some(a), Some(b), Some(c), Some(d)) = (
            self.node_coords(quad[0]),
            self.node_coords(quad[1]),
            self.node_coords(quad[2]),
            self.node_coords(quad[3]),
        ) {
            if crate::predicates::orient3d(&a, &b, &c, &d) <= 0.0 {
                quad.swap(0, 1);
                let (a, b) = (self.node_coords(quad[0]).unwrap(), self.node_coords(quad[1]).unwrap());
                if crate::predicates::orient3d(&a, &b, &c, &d) <= 0.0 {
                    return Err(FlipError::NotFlippable);
                }
            }
        }

        let merged = self.tets.insert(blank_tet(quad));
        for face in 0..4 {
            self.claim_outer_faces(merged, &[face], &mut outers);
        }

        for &t in &star {
            self.tets.remove(t);
        }
        self.touch_all(merged);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshStore, Vertex, VertexTag};

    fn single_real_tet(mesh: &MeshStore) -> TetId {
        mesh.tets
            .iter_alive()
            .find(|&t| !mesh.tets.get(t).is_ghost())
            .expect("a real tet")
    }

    #[test]
    fn flip14_then_flip41_round_trips_to_a_sound_single_tet() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut mesh = MeshStore::new(1);
        crate::builder::build(&mut mesh, &points).unwrap();
        let before = mesh.tets.count_alive();

        let tet = single_real_tet(&mesh);
        let new_vid = mesh.vertices.insert(Vertex {
            coords: [0.25, 0.25, 0.25],
            attributes: Vec::new(),
            marker: 0,
            tag: VertexTag::SteinerVolume,
            incident_tet: None,
        });

        let split = mesh.flip14(tet, Node::Real(new_vid)).unwrap();
        assert_eq!(mesh.tets.count_alive(), before + 3); // 1 real tet became 4
        assert!(mesh.is_sound().unwrap());
        assert_eq!(split.len(), 4);

        let merged = mesh.flip41(Node::Real(new_vid)).unwrap();
        assert!(!mesh.tets.get(merged).is_ghost());
        assert_eq!(mesh.tets.count_alive(), before);
        assert!(mesh.is_sound().unwrap());
    }

    #[test]
    fn flip14_rejects_a_point_outside_the_tet() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut mesh = MeshStore::new(2);
        crate::builder::build(&mut mesh, &points).unwrap();

        let tet = single_real_tet(&mesh);
        let outside_vid = mesh.vertices.insert(Vertex {
            coords: [5.0, 5.0, 5.0],
            attributes: Vec::new(),
            marker: 0,
            tag: VertexTag::SteinerVolume,
            incident_tet: None,
        });

        assert!(mesh.flip14(tet, Node::Real(outside_vid)).is_err());
    }

    #[test]
    fn flip41_rejects_a_vertex_without_exactly_four_incident_tets() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut mesh = MeshStore::new(3);
        let ids = crate::builder::build(&mut mesh, &points).unwrap();

        // A corner vertex of the single seed tet has only one incident
        // real tet (plus ghosts), not four.
        assert!(mesh.flip41(Node::Real(ids[0])).is_err());
    }
}
