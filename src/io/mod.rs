//! Textual format I/O: the five `.node`/`.poly`/`.ele`/`.face`/`.edge`
//! conventions from spec §6, parsed and emitted bit-identically to
//! `original_source`'s established layouts. These are thin serializers,
//! deliberately kept outside the core's dependency graph (the builder,
//! recoverer, carver, and refiner never import this module) — they convert
//! to and from plain record types that a caller assembles into a `Plc` or
//! reads off a [`crate::TetMesh`].
//!
//! Grounded line-by-line on `tetgen_io.py`'s `load_node`/`load_poly`/
//! `save_nodes`/`save_elements`: comment lines start with `#` and are
//! skipped, whitespace-separated tokens, first-index offset controlled by
//! a caller-supplied `first_number` (0 or 1, spec's `z` switch).

pub mod edge;
pub mod ele;
pub mod face;
pub mod node;
pub mod poly;

pub use edge::{EdgeFile, EdgeRecord};
pub use ele::{EleFile, EleRecord};
pub use face::{FaceFile, FaceRecord};
pub use node::{NodeFile, NodeRecord};
pub use poly::PolyFile;

/// Strips comments (`#` to end of line) and blank lines, the shared first
/// pass every loader in `tetgen_io.py` performs before tokenizing.
fn significant_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|line| match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Matches `save_nodes`/`save_elements`'s `%.16g` formatting closely enough
/// to round-trip through `f64::parse` without padding zeroes.
fn format_float(v: f64) -> String {
    format!("{v}")
}
