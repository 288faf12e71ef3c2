//! `.ele`: tetrahedron connectivity plus optional per-tet attributes.
//! Grounded on `tetgen_io.py`'s `save_elements` (this crate only emits;
//! `.ele` is never read back as PLC input, so no `parse` is provided).

use crate::io::format_float;

#[derive(Debug, Clone, PartialEq)]
pub struct EleRecord {
    pub vertices: Vec<usize>,
    pub attributes: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EleFile {
    pub records: Vec<EleRecord>,
    pub num_corners: usize,
    pub first_number: usize,
}

impl EleFile {
    pub fn to_text(&self) -> String {
        let num_attrs = self.records.first().map_or(0, |r| r.attributes.len());
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {}\n",
            self.records.len(),
            self.num_corners,
            num_attrs
        ));
        for (i, rec) in self.records.iter().enumerate() {
            out.push_str(&format!("{}", i + self.first_number));
            for &v in &rec.vertices {
                out.push_str(&format!(" {}", v + self.first_number));
            }
            for a in &rec.attributes {
                out.push_str(&format!(" {}", format_float(*a)));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_based_corners() {
        let file = EleFile {
            records: vec![EleRecord {
                vertices: vec![0, 1, 2, 3],
                attributes: vec![],
            }],
            num_corners: 4,
            first_number: 1,
        };
        let text = file.to_text();
        assert_eq!(text, "1 4 0\n1 1 2 3 4\n");
    }
}
