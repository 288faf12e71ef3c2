//! # tetramesh
//!
//! Constrained Delaunay tetrahedralization with PLC recovery, region/hole
//! carving, and Shewchuk-style quality refinement.
//!
//! Leaves-first module order, mirroring the pipeline: `predicates` → `mesh`
//! → `builder` → `recover` → `carve` → `refine`, with `plc`, `behavior`,
//! `error`, `io`, and `utils` supporting them.

pub mod behavior;
pub mod builder;
pub mod carve;
pub mod error;
pub mod io;
pub mod mesh;
pub mod plc;
pub mod predicates;
pub mod recover;
pub mod refine;
pub mod utils;

pub use behavior::MeshBehavior;
pub use builder::insert_point;
pub use carve::RegionCarver;
pub use error::{BudgetKind, Location, MeshError, MeshResult};
pub use mesh::{MeshStore, TetId, VertexId, VertexTag};
pub use plc::{Facet, HoleSeed, Plc, Polygon, RegionSeed, Segment, Subface};
pub use recover::ConstraintRecoverer;
pub use refine::{QualityBounds, QualityRefiner};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag, checked at the top of each outer-queue
/// iteration of the quality refiner. Cloning shares the same underlying
/// flag, so a caller can hold one clone and flip it from another thread or
/// a signal handler while the engine itself stays single-threaded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of running the full pipeline: the mesh itself, plus the
/// segments and subfaces that survived recovery (callers need these to
/// re-run refinement or to emit `.face`/`.edge` output).
#[derive(Debug)]
pub struct TetMesh {
    pub store: MeshStore,
    pub segments: Vec<Segment>,
    pub subfaces: Vec<Subface>,
    pub unreachable_holes: Vec<usize>,
}

impl TetMesh {
    /// Runs the whole leaves-first pipeline over a bare point set or a full
    /// PLC, according to `behavior`'s switches: Delaunay construction,
    /// then (if `behavior.plc`) segment/facet recovery and region/hole
    /// carving, then (if `behavior.quality` or `behavior.varvolume`)
    /// quality refinement.
    ///
    /// `plc`'s `VertexId`s must refer to `points` by index: vertex `i`
    /// carries coordinates `points[i]`, matching the contract
    /// [`builder::build`] documents for its returned id list (the arena is
    /// empty beforehand, so ids are assigned in input order).
    pub fn build(
        points: &[utils::types::Vertex3],
        plc: Option<&Plc>,
        behavior: &MeshBehavior,
        seed: u64,
        cancel: &CancellationToken,
    ) -> MeshResult<Self> {
        #[cfg(feature = "logging")]
        log::info!(
            "building mesh: {} input points, switches \"{}\"",
            points.len(),
            behavior.to_switches()
        );

        let mut store = MeshStore::new(seed);
        builder::build(&mut store, points)?;

        let mut segments = Vec::new();
        let mut subfaces = Vec::new();
        let mut unreachable_holes = Vec::new();

        if behavior.plc {
            let plc = plc.ok_or_else(|| {
                MeshError::input(
                    "the `p` switch requires facet/segment input",
                    Location::Line(0),
                )
            })?;

            let mut recoverer = ConstraintRecoverer::new(behavior.steiner_cap());
            segments = recoverer.recover_segments(&mut store, plc)?;
            subfaces = recoverer.recover_facets(&mut store, plc)?;

            if !plc.regions.is_empty() || !plc.holes.is_empty() || !behavior.convex {
                let carver = RegionCarver::new(behavior.regionattrib);
                unreachable_holes = carver.carve(&mut store, &plc.regions, &plc.holes);
            }
        }

        if behavior.quality || behavior.varvolume {
            let bounds = QualityBounds {
                max_radius_edge: if behavior.quality {
                    behavior.minratio
                } else {
                    f64::INFINITY
                },
                max_volume: behavior.varvolume.then_some(behavior.maxvolume),
            };
            let mut refiner = QualityRefiner::new(bounds, behavior.steiner_cap());
            refiner.refine(&mut store, &segments, cancel)?;
        }

        #[cfg(feature = "logging")]
        log::info!(
            "mesh build complete: {} live tets, {} unreachable holes",
            store.tets.count_alive(),
            unreachable_holes.len()
        );

        Ok(TetMesh {
            store,
            segments,
            subfaces,
            unreachable_holes,
        })
    }

    /// Re-checks every invariant of [`MeshStore::is_sound`] against the
    /// current mesh; the engine's `-C` self-check switch.
    pub fn is_sound(&self) -> MeshResult<bool> {
        self.store.is_sound()
    }

    /// Total volume of every interior (non-ghost) tetrahedron, used by the
    /// volume-conservation property.
    pub fn total_volume(&self) -> f64 {
        self.store
            .tets
            .iter_alive()
            .filter(|&t| !self.store.tets.get(t).is_ghost())
            .map(|t| {
                let tet = self.store.tets.get(t);
                let coords: Vec<utils::types::Vertex3> = tet
                    .nodes
                    .iter()
                    .map(|n| self.store.node_coords(*n).expect("interior tet has no ghost node"))
                    .collect();
                predicates::volume(&[coords[0], coords[1], coords[2], coords[3]])
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utils::types::Vertex3;

    #[test]
    fn unit_tetrahedron_volume() {
        let points: Vec<Vertex3> = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let behavior = MeshBehavior::default();
        let cancel = CancellationToken::new();
        let mesh = TetMesh::build(&points, None, &behavior, 42, &cancel).unwrap();
        assert!((mesh.total_volume() - 1.0 / 6.0).abs() < 1e-12);
        assert!(mesh.is_sound().unwrap());
    }
}
