//! `.edge`: recovered constraint segments plus optional markers. Grounded
//! on spec §6's `.edge` layout, mirrored off `.face`'s emission style.

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub vertices: [usize; 2],
    pub marker: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeFile {
    pub records: Vec<EdgeRecord>,
    pub first_number: usize,
}

impl EdgeFile {
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
    fn emits_one_based_segments() {
        let file = EdgeFile {
            records: vec![EdgeRecord {
                vertices: [0, 1],
                marker: None,
            }],
            first_number: 1,
        };
        assert_eq!(file.to_text(), "1 0\n1 1 2\n");
    }
}
