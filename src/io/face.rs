//! `.face`: recovered boundary/subface triangles plus optional markers.
//! Grounded on spec §6's `.face` layout and `tetgen_io.py`'s `save_elements`
//! emission style (1-based indices, header-driven optional columns).

#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub vertices: [usize; 3],
    pub marker: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceFile {
    pub records: Vec<FaceRecord>,
    pub first_number: usize,
}

impl FaceFile {
    pub fn to_text(&self) -> String {
        let has_markers = self.records.iter().any(|r| r.marker.is_some());
        let mut out = String::new();
        out.push_str(&format!(
            "{} {}\n",
            self.records.len(),
            if has_markers { 1 } else { 0 }
        ));
        for (i, rec) in self.records.iter().enumerate() {
            out.push_str(&format!("{}", i + self.first_number));
            for v in rec.vertices {
                out.push_str(&format!(" {}", v + self.first_number));
            }
            if let Some(m) = rec.marker {
                out.push_str(&format!(" {m}"));
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
    fn emits_markers_when_present() {
        let file = FaceFile {
            records: vec![FaceRecord {
                vertices: [0, 1, 2],
                marker: Some(3),
            }],
            first_number: 1,
        };
        assert_eq!(file.to_text(), "1 1\n1 1 2 3 3\n");
    }
}
