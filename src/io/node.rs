//! `.node`: point coordinates plus optional attributes and boundary
//! markers. Grounded on `tetgen_io.py`'s `load_node`/`save_nodes`.

use crate::error::{Location, MeshError, MeshResult};
use crate::io::{format_float, significant_lines};
use crate::utils::types::Vertex3;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub coords: Vertex3,
    pub attributes: Vec<f64>,
    pub marker: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFile {
    pub records: Vec<NodeRecord>,
    pub num_attributes: usize,
    pub has_markers: bool,
    pub first_number: usize,
}

impl NodeFile {
    pub fn parse(text: &str) -> MeshResult<Self> {
        let lines = significant_lines(text);
        let Some(header_line) = lines.first() else {
            return Ok(Self::default());
        };
        let header: Vec<&str> = header_line.split_whitespace().collect();
        let num_points: usize = parse_field(&header, 0, "point count")?;
        let dim: usize = header.get(1).and_then(|s| s.parse().ok()).unwrap_or(3);
        let num_attributes: usize = header.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        let has_markers = header.get(3).and_then(|s| s.parse::<usize>().ok()).unwrap_or(0) != 0;

        if dim != 3 {
            return Err(MeshError::input(
                format!("only 3-dimensional `.node` files are supported, got dim={dim}"),
                Location::Line(0),
            ));
        }

        let mut records = Vec::with_capacity(num_points);
        let mut first_number = 0;
        for (i, line) in lines.iter().skip(1).take(num_points).enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < dim + 1 {
                return Err(MeshError::input(
                    format!("`.node` row {i} has too few fields"),
                    Location::Line(i + 1),
                ));
            }
            if i == 0 {
                first_number = parts[0].parse().unwrap_or(0);
            }
            let coords: Vertex3 = [
                parse_field(&parts, 1, "x")?,
                parse_field(&parts, 2, "y")?,
                parse_field(&parts, 3, "z")?,
            ];
            let attributes: Vec<f64> = (0..num_attributes)
                .map(|j| parse_field(&parts, dim + 1 + j, "attribute"))
                .collect::<MeshResult<_>>()?;
            let marker = if has_markers {
                Some(parse_field(&parts, dim + 1 + num_attributes, "marker")?)
            } else {
                None
            };
            records.push(NodeRecord {
                coords,
                attributes,
                marker,
            });
        }

        Ok(Self {
            records,
            num_attributes,
            has_markers,
            first_number,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} 3 {} {}\n",
            self.records.len(),
            self.num_attributes,
            if self.has_markers { 1 } else { 0 }
        ));
        for (i, rec) in self.records.iter().enumerate() {
            out.push_str(&format!("{}", i + self.first_number));
            for c in rec.coords {
                out.push_str(&format!(" {}", format_float(c)));
            }
            for a in &rec.attributes {
                out.push_str(&format!(" {}", format_float(*a)));
            }
            if let Some(m) = rec.marker {
                out.push_str(&format!(" {m}"));
            }
            out.push('\n');
        }
        out
    }
}

fn parse_field<T: std::str::FromStr>(parts: &[&str], idx: usize, name: &str) -> MeshResult<T> {
    parts
        .get(idx)
        .ok_or_else(|| MeshError::input(format!("missing `{name}` field"), Location::Line(0)))?
        .parse()
        .map_err(|_| MeshError::input(format!("malformed `{name}` field"), Location::Line(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_points_with_markers() {
        let text = "2 3 0 1\n1 0 0 0 5\n2 1 0 0 7\n";
        let file = NodeFile::parse(text).unwrap();
        assert_eq!(file.records.len(), 2);
        assert_eq!(file.records[0].marker, Some(5));
        assert_eq!(file.first_number, 1);

        let emitted = file.to_text();
        let reparsed = NodeFile::parse(&emitted).unwrap();
        assert_eq!(file, reparsed);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# a comment\n2 3 0 0\n\n1 0 0 0\n2 1 0 0 # trailing comment\n";
        let file = NodeFile::parse(text).unwrap();
        assert_eq!(file.records.len(), 2);
    }
}
