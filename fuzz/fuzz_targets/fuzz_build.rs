#![no_main]

use libfuzzer_sys::fuzz_target;
use tetramesh::behavior::MeshBehavior;
use tetramesh::{CancellationToken, TetMesh};

fuzz_target!(|points: Vec<[f64; 3]>| {
    if points.len() < 4 || points.len() > 500 {
        return;
    }
    if points.iter().any(|p| p.iter().any(|c| !c.is_finite())) {
        return;
    }

    let behavior = MeshBehavior::default();
    let cancel = CancellationToken::new();
    if let Ok(mesh) = TetMesh::build(&points, None, &behavior, 7, &cancel) {
        let _ = mesh.is_sound();
    }
});
