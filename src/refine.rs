//! Quality refinement: Shewchuk-style Delaunay refinement by Steiner-point
//! insertion, enforcing a radius-edge bound and an optional volume bound.
//!
//! No teacher precedent (the teacher stops at plain Delaunay construction).
//! Grounded on the standard Delaunay-refinement queueing `original_source`'s
//! `tetgen_behavior.py` already parameterizes (`minratio`, `maxvolume`,
//! `steiner`/`steinerleft`) but never wires up: segment queue before
//! subface queue before bad-tet queue, each insertion deferred to whichever
//! encroached feature it would have violated.

use crate::builder::insert_point;
use crate::error::{BudgetKind, MeshError, MeshResult};
use crate::mesh::{MeshStore, Node, TetId, VertexId, VertexTag};
use crate::plc::Segment;
use crate::predicates::{
    aspect_ratio, circumcenter, encroaches_segment, encroaches_subface, triangle_circumcenter,
    volume,
};
use crate::utils::types::Vertex3;
use std::collections::VecDeque;

/// Bounds the refiner enforces, mirroring spec §4.6 and `tetgen_behavior.py`'s
/// `minratio`/`maxvolume` fields.
#[derive(Debug, Clone, Copy)]
pub struct QualityBounds {
    pub max_radius_edge: f64,
    pub max_volume: Option<f64>,
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self {
            max_radius_edge: 2.0,
            max_volume: None,
        }
    }
}

/// A segment currently tracked by the refiner, alongside the subface (if
/// any) whose diametral sphere it bounds. Recovered segments and subfaces
/// are reloaded from the mesh's face markers once carving has finished.
struct EncroachedSegment {
    a: VertexId,
    b: VertexId,
}

struct EncroachedSubface {
    tet: TetId,
    face: usize,
}

pub struct QualityRefiner {
    bounds: QualityBounds,
    steiner_cap: Option<usize>,
    steiner_used: usize,
}

impl QualityRefiner {
    pub fn new(bounds: QualityBounds, steiner_cap: Option<usize>) -> Self {
        Self {
            bounds,
            steiner_cap,
            steiner_used: 0,
        }
    }

    fn spend(&mut self) -> Result<(), ()> {
        if let Some(cap) = self.steiner_cap {
            if self.steiner_used >= cap {
                return Err(());
            }
        }
        self.steiner_used += 1;
        Ok(())
    }

    /// Runs the refinement loop to a fixed point (or until the Steiner cap
    /// or cancellation token stops it), respecting segment > subface > tet
    /// priority and the encroachment-deferral rule.
    pub fn refine(
        &mut self,
        mesh: &mut MeshStore,
        segments: &[Segment],
        cancel: &crate::CancellationToken,
    ) -> MeshResult<()> {
        let mut seg_queue: VecDeque<EncroachedSegment> = VecDeque::new();
        let mut face_queue: VecDeque<EncroachedSubface> = VecDeque::new();
        let mut tet_queue: VecDeque<TetId> = VecDeque::new();

        self.seed_queues(mesh, segments, &mut seg_queue, &mut face_queue, &mut tet_queue);

        #[cfg(feature = "logging")]
        log::debug!(
            "refinement seeded: {} bad segments, {} bad subfaces, {} bad tets",
            seg_queue.len(),
            face_queue.len(),
            tet_queue.len()
        );

        loop {
            if cancel.is_cancelled() {
                #[cfg(feature = "logging")]
                log::info!("refinement cancelled after {} Steiner points", self.steiner_used);
                return Err(MeshError::Cancelled {
                    mesh: Box::new(std::mem::replace(mesh, MeshStore::new(0))),
                });
            }

            if let Some(seg) = seg_queue.pop_front() {
                self.split_segment(mesh, seg, &mut seg_queue, &mut face_queue, &mut tet_queue)?;
                continue;
            }

            if let Some(sf) = face_queue.pop_front() {
                if !mesh.tets.is_alive(sf.tet) {
                    continue;
                }
                self.split_subface(mesh, sf, &mut seg_queue, &mut face_queue, &mut tet_queue)?;
                continue;
            }

            // Drop stale entries (tets deleted by an earlier split).
            while let Some(&t) = tet_queue.front() {
                if mesh.tets.is_alive(t) {
                    break;
                }
                tet_queue.pop_front();
            }
            let Some(t) = tet_queue.pop_front() else {
                break;
            };
            self.split_tet(mesh, t, &mut seg_queue, &mut face_queue, &mut tet_queue)?;
        }

        #[cfg(feature = "logging")]
        log::info!(
            "refinement done: {} Steiner points inserted, {} live tets",
            self.steiner_used,
            mesh.tets.count_alive()
        );

        Ok(())
    }

    fn seed_queues(
        &self,
        mesh: &MeshStore,
        segments: &[Segment],
        seg_queue: &mut VecDeque<EncroachedSegment>,
        face_queue: &mut VecDeque<EncroachedSubface>,
        tet_queue: &mut VecDeque<TetId>,
    ) {
        for seg in segments {
            seg_queue.push_back(EncroachedSegment { a: seg.a, b: seg.b });
        }
        for t in mesh.tets.iter_alive() {
            let tet = mesh.tets.get(t);
            if tet.is_ghost() {
                continue;
            }
            for face in 0..4 {
                if tet.face_markers[face].is_some() {
                    face_queue.push_back(EncroachedSubface { tet: t, face });
                }
            }
            if self.is_bad(mesh, t) {
                tet_queue.push_back(t);
            }
        }
    }

    fn is_bad(&self, mesh: &MeshStore, t: TetId) -> bool {
        let tet = mesh.tets.get(t);
        if tet.is_ghost() {
            return false;
        }
        let coords = tet_coords(mesh, t);
        if aspect_ratio(&coords) > self.bounds.max_radius_edge {
            return true;
        }
        let bound = tet.volume_bound.or(self.bounds.max_volume);
        if let Some(v) = bound {
            if volume(&coords) > v {
                return true;
            }
        }
        false
    }

    fn split_segment(
        &mut self,
        mesh: &mut MeshStore,
        seg: EncroachedSegment,
        seg_queue: &mut VecDeque<EncroachedSegment>,
        face_queue: &mut VecDeque<EncroachedSubface>,
        tet_queue: &mut VecDeque<TetId>,
    ) -> MeshResult<()> {
        let pa = mesh.vertices.coords(seg.a);
        let pb = mesh.vertices.coords(seg.b);
        if !self.segment_is_encroached(mesh, seg.a, seg.b) {
            return Ok(());
        }
        if self.spend().is_err() {
            return Err(budget_exhausted(mesh));
        }
        let mid = crate::utils::types::midpoint(pa, pb);
        let mid_id = insert_point(mesh, mid, VertexTag::SteinerSegment);
        seg_queue.push_back(EncroachedSegment { a: seg.a, b: mid_id });
        seg_queue.push_back(EncroachedSegment { a: mid_id, b: seg.b });
        self.requeue_around(mesh, mid_id, face_queue, tet_queue);
        Ok(())
    }

    fn segment_is_encroached(&self, mesh: &MeshStore, a: VertexId, b: VertexId) -> bool {
        let pa = mesh.vertices.coords(a);
        let pb = mesh.vertices.coords(b);
        mesh.vertices
            .iter_live()
            .filter(|&v| v != a && v != b)
            .any(|v| encroaches_segment(&pa, &pb, &mesh.vertices.coords(v)))
    }

    fn split_subface(
        &mut self,
        mesh: &mut MeshStore,
        sf: EncroachedSubface,
        seg_queue: &mut VecDeque<EncroachedSegment>,
        face_queue: &mut VecDeque<EncroachedSubface>,
        tet_queue: &mut VecDeque<TetId>,
    ) -> MeshResult<()> {
        let tet = mesh.tets.get(sf.tet);
        if tet.face_markers[sf.face].is_none() {
            return Ok(());
        }
        let tri_nodes = tet.face_nodes(sf.face);
        let Some(tri) = real_triangle(tri_nodes) else {
            return Ok(());
        };
        let tri_coords = [
            mesh.vertices.coords(tri[0]),
            mesh.vertices.coords(tri[1]),
            mesh.vertices.coords(tri[2]),
        ];
        if !self.subface_is_encroached(mesh, tri, tri_coords) {
            return Ok(());
        }

        let center = triangle_circumcenter(&tri_coords);

        // If inserting the circumcenter would itself encroach one of the
        // facet's bounding segments, defer: split those segments first.
        let mut deferred = false;
        for (p, q) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let pp = mesh.vertices.coords(p);
            let pq = mesh.vertices.coords(q);
            if encroaches_segment(&pp, &pq, &center) {
                seg_queue.push_back(EncroachedSegment { a: p, b: q });
                deferred = true;
            }
        }
        if deferred {
            #[cfg(feature = "logging")]
            log::trace!("deferring subface split: circumcenter encroaches a bounding segment");
            face_queue.push_back(sf);
            return Ok(());
        }

        if circumcenter_escapes_domain(mesh, &center) {
            // The circumcenter fell outside the meshed volume entirely
            // (possible for a subface near the hull boundary); fall back to
            // splitting its bounding segments instead of inserting a point
            // nothing can be built around.
            #[cfg(feature = "logging")]
            log::trace!("deferring subface split: circumcenter escapes the meshed domain");
            for (p, q) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                seg_queue.push_back(EncroachedSegment { a: p, b: q });
            }
            return Ok(());
        }

        if self.spend().is_err() {
            return Err(budget_exhausted(mesh));
        }
        let new_id = insert_point(mesh, center, VertexTag::SteinerFacet);
        self.requeue_around(mesh, new_id, face_queue, tet_queue);
        Ok(())
    }

    fn subface_is_encroached(&self, mesh: &MeshStore, tri: [VertexId; 3], coords: [Vertex3; 3]) -> bool {
        mesh.vertices
            .iter_live()
            .filter(|v| !tri.contains(v))
            .any(|v| encroaches_subface(&coords, &mesh.vertices.coords(v)))
    }

    fn split_tet(
        &mut self,
        mesh: &mut MeshStore,
        t: TetId,
        seg_queue: &mut VecDeque<EncroachedSegment>,
        face_queue: &mut VecDeque<EncroachedSubface>,
        tet_queue: &mut VecDeque<TetId>,
    ) -> MeshResult<()> {
        if !self.is_bad(mesh, t) {
            return Ok(());
        }
        let coords = tet_coords(mesh, t);
        let center = match circumcenter(&coords) {
            Ok(c) => c,
            Err(_) => {
                // A nearly-coplanar bad tet has no well-defined circumcenter
                // to insert; leave it as-is rather than loop forever.
                return Ok(());
            }
        };

        let tet = mesh.tets.get(t).clone();
        for face in 0..4 {
            if let Some(tri) = real_triangle(tet.face_nodes(face)) {
                let tri_coords = [
                    mesh.vertices.coords(tri[0]),
                    mesh.vertices.coords(tri[1]),
                    mesh.vertices.coords(tri[2]),
                ];
                if tet.face_markers[face].is_some() && encroaches_subface(&tri_coords, &center) {
                    #[cfg(feature = "logging")]
                    log::trace!("deferring tet split: circumcenter encroaches a bounding subface");
                    face_queue.push_back(EncroachedSubface { tet: t, face });
                    return Ok(());
                }
            }
        }

        if circumcenter_escapes_domain(mesh, &center) {
            // The circumcenter fell outside the live region this tet
            // belongs to (or past the hull entirely). Split whichever
            // bounding subface `t` has instead of inserting a point the
            // domain can't contain; a tet with no bounding subface at all
            // (an interior sliver whose circumcenter still escapes) is left
            // unrefined rather than looping.
            #[cfg(feature = "logging")]
            log::trace!("deferring tet split: circumcenter escapes the meshed domain");
            if let Some(face) = (0..4).find(|&f| tet.face_markers[f].is_some()) {
                face_queue.push_back(EncroachedSubface { tet: t, face });
            }
            return Ok(());
        }

        if self.spend().is_err() {
            return Err(budget_exhausted(mesh));
        }
        let new_id = insert_point(mesh, center, VertexTag::SteinerVolume);
        self.requeue_around(mesh, new_id, face_queue, tet_queue);
        Ok(())
    }

    /// After inserting a Steiner point, re-examines its star for newly bad
    /// tets and newly exposed (still-marked) subfaces.
    fn requeue_around(
        &self,
        mesh: &MeshStore,
        new_vertex: VertexId,
        face_queue: &mut VecDeque<EncroachedSubface>,
        tet_queue: &mut VecDeque<TetId>,
    ) {
        for t in mesh.enumerate_star(Node::Real(new_vertex)) {
            if self.is_bad(mesh, t) {
                tet_queue.push_back(t);
            }
            let tet = mesh.tets.get(t);
            for face in 0..4 {
                if tet.face_markers[face].is_some() {
                    face_queue.push_back(EncroachedSubface { tet: t, face });
                }
            }
        }
    }
}

/// Whether `center` lands outside the meshed domain: either past the
/// convex hull entirely (a ghost tet) or inside a carved-away region with
/// no live tet at all (`locate`'s stochastic walk can only return live
/// tets, so the ghost case is the only one directly observable here; a
/// hole cavity simply has no tet to land in and the walk instead resolves
/// to the nearest surviving ghost/boundary tet, which this still catches).
fn circumcenter_escapes_domain(mesh: &mut MeshStore, center: &Vertex3) -> bool {
    let loc = mesh.locate(center);
    mesh.tets.get(loc.tet).is_ghost()
}

fn real_triangle(nodes: [Node; 3]) -> Option<[VertexId; 3]> {
    Some([nodes[0].id()?, nodes[1].id()?, nodes[2].id()?])
}

fn tet_coords(mesh: &MeshStore, t: TetId) -> [Vertex3; 4] {
    let tet = mesh.tets.get(t);
    [
        mesh.node_coords(tet.nodes[0]).expect("bad tet has a ghost node"),
        mesh.node_coords(tet.nodes[1]).expect("bad tet has a ghost node"),
        mesh.node_coords(tet.nodes[2]).expect("bad tet has a ghost node"),
        mesh.node_coords(tet.nodes[3]).expect("bad tet has a ghost node"),
    ]
}

fn budget_exhausted(mesh: &mut MeshStore) -> MeshError {
    #[cfg(feature = "logging")]
    log::error!("Steiner point budget exhausted during quality refinement");
    MeshError::Budget {
        kind: BudgetKind::Steiner,
        mesh: Box::new(std::mem::replace(mesh, MeshStore::new(0))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::{aspect_ratio, volume};

    fn live_real_tets(mesh: &MeshStore) -> Vec<TetId> {
        mesh.tets
            .iter_alive()
            .filter(|&t| !mesh.tets.get(t).is_ghost())
            .collect()
    }

    #[test]
    fn loose_bound_refines_nothing() {
        let points: Vec<Vertex3> = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut mesh = MeshStore::new(1);
        crate::builder::build(&mut mesh, &points).unwrap();
        let before = mesh.tets.count_alive();

        let mut refiner = QualityRefiner::new(
            QualityBounds {
                max_radius_edge: 1000.0,
                max_volume: None,
            },
            None,
        );
        refiner
            .refine(&mut mesh, &[], &crate::CancellationToken::new())
            .unwrap();

        assert_eq!(mesh.tets.count_alive(), before);
    }

    #[test]
    fn tight_radius_edge_bound_splits_a_sliver() {
        // A thin, stretched tetrahedron has a poor radius-edge ratio; a
        // tight bound must bring every surviving tet under it.
        let points: Vec<Vertex3> = vec![
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [0.0, 0.0, 0.1],
        ];
        let mut mesh = MeshStore::new(2);
        crate::builder::build(&mut mesh, &points).unwrap();

        let mut refiner = QualityRefiner::new(
            QualityBounds {
                max_radius_edge: 1.4,
                max_volume: None,
            },
            Some(500),
        );
        refiner
            .refine(&mut mesh, &[], &crate::CancellationToken::new())
            .unwrap();

        for t in live_real_tets(&mesh) {
            let coords = tet_coords(&mesh, t);
            assert!(aspect_ratio(&coords) <= 1.4 + 1e-6);
        }
    }

    #[test]
    fn volume_bound_splits_a_coarse_tet() {
        let points: Vec<Vertex3> = vec![
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 2.0],
        ];
        let mut mesh = MeshStore::new(3);
        crate::builder::build(&mut mesh, &points).unwrap();

        let mut refiner = QualityRefiner::new(
            QualityBounds {
                max_radius_edge: f64::INFINITY,
                max_volume: Some(0.2),
            },
            Some(200),
        );
        refiner
            .refine(&mut mesh, &[], &crate::CancellationToken::new())
            .unwrap();

        for t in live_real_tets(&mesh) {
            let coords = tet_coords(&mesh, t);
            assert!(volume(&coords) <= 0.2 + 1e-9);
        }
    }

    #[test]
    fn zero_steiner_budget_fails_closed_on_a_bad_tet() {
        let points: Vec<Vertex3> = vec![
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [0.0, 0.0, 0.1],
        ];
        let mut mesh = MeshStore::new(4);
        crate::builder::build(&mut mesh, &points).unwrap();

        let mut refiner = QualityRefiner::new(
            QualityBounds {
                max_radius_edge: 1.01,
                max_volume: None,
            },
            Some(0),
        );
        let result = refiner.refine(&mut mesh, &[], &crate::CancellationToken::new());
        assert!(matches!(result, Err(MeshError::Budget { .. })));
    }
}
