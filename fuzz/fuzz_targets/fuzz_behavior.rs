#![no_main]

use libfuzzer_sys::fuzz_target;
use tetramesh::behavior::MeshBehavior;

fuzz_target!(|switches: String| {
    if let Ok(behavior) = MeshBehavior::parse(&switches) {
        let emitted = behavior.to_switches();
        let reparsed = MeshBehavior::parse(&emitted).expect("re-emitted switches must re-parse");
        assert_eq!(behavior, reparsed, "switch round-trip broke for {switches:?}");
    }
});
