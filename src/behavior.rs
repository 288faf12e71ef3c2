//! Mesh generation switches: the ambient equivalent of `original_source`'s
//! `TetGenBehavior`, holding every numeric/boolean option from spec §6 and
//! a switch-string parser/printer that round-trips (P8).
//!
//! Grounded line-by-line on `tetgen_behavior.py`'s `parse_commandline` /
//! `_convert_tetgen_switches_to_args` (numeric-suffix consumption for
//! `q`/`a`/`S`/`T`, the `o2` special case) and `get_commandline_string`
//! (emission order). Per spec's Open Question, `Y` here takes no numeric
//! suffix — the source's undocumented `Y<n>` variant is dropped.

use crate::error::{Location, MeshError, MeshResult};

/// Cumulative configuration driving the whole pipeline, built by parsing a
/// switch string (e.g. `"pq1.414a0.1A"`) or by setting fields directly.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBehavior {
    pub plc: bool,
    pub refine: bool,
    pub quality: bool,
    pub minratio: f64,
    pub varvolume: bool,
    pub maxvolume: f64,
    pub regionattrib: bool,
    pub conforming: bool,
    pub convex: bool,
    pub facesout: bool,
    pub edgesout: bool,
    pub voroout: bool,
    pub zeroindex: bool,
    pub order2: bool,
    pub nobisect: bool,
    pub steiner: Option<usize>,
    pub epsilon: f64,
    pub quiet: bool,
    pub verbose: bool,
    pub docheck: bool,
}

impl Default for MeshBehavior {
    fn default() -> Self {
        Self {
            plc: false,
            refine: false,
            quality: false,
            minratio: 2.0,
            varvolume: false,
            maxvolume: -1.0,
            regionattrib: false,
            conforming: false,
            convex: false,
            facesout: false,
            edgesout: false,
            voroout: false,
            zeroindex: false,
            order2: false,
            nobisect: false,
            steiner: None,
            epsilon: 1e-8,
            quiet: false,
            verbose: false,
            docheck: false,
        }
    }
}

impl MeshBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// The remaining Steiner-point budget, or `None` for unbounded —
    /// `recover`/`refine` both take this directly as their shared cap.
    pub fn steiner_cap(&self) -> Option<usize> {
        self.steiner
    }

    /// Parses a TetGen-style switch string into a fresh `MeshBehavior`.
    pub fn parse(switches: &str) -> MeshResult<Self> {
        let mut behavior = Self::default();
        let chars: Vec<char> = switches.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            i += 1;
            match c {
                'p' => behavior.plc = true,
                'r' => behavior.refine = true,
                'q' => {
                    behavior.quality = true;
                    if let Some(v) = take_number(&chars, &mut i) {
                        behavior.minratio = v;
                    }
                }
                'a' => {
                    behavior.varvolume = true;
                    if let Some(v) = take_number(&chars, &mut i) {
                        behavior.maxvolume = v;
                    }
                }
                'A' => behavior.regionattrib = true,
                'D' => behavior.conforming = true,
                'c' => behavior.convex = true,
                'f' => behavior.facesout = true,
                'e' => behavior.edgesout = true,
                'v' => behavior.voroout = true,
                'z' => behavior.zeroindex = true,
                'o' => {
                    if chars.get(i) == Some(&'2') {
                        behavior.order2 = true;
                        i += 1;
                    }
                }
                'Y' => behavior.nobisect = true,
                'S' => {
                    let v = take_number(&chars, &mut i).ok_or_else(|| {
                        MeshError::input("`S` switch requires a numeric suffix", Location::Line(0))
                    })?;
                    behavior.steiner = Some(v as usize);
                }
                'T' => {
                    behavior.epsilon = take_number(&chars, &mut i).ok_or_else(|| {
                        MeshError::input("`T` switch requires a numeric suffix", Location::Line(0))
                    })?;
                }
                'Q' => behavior.quiet = true,
                'V' => behavior.verbose = true,
                'C' => behavior.docheck = true,
                other => {
                    return Err(MeshError::input(
                        format!("unrecognized switch `{other}`"),
                        Location::Line(0),
                    ));
                }
            }
        }
        Ok(behavior)
    }

    /// Emits the equivalent switch string, in the same field order
    /// `get_commandline_string` uses — reparsing the result must yield an
    /// equal `MeshBehavior` (P8).
    pub fn to_switches(&self) -> String {
        let mut s = String::new();
        if self.plc {
            s.push('p');
        }
        if self.refine {
            s.push('r');
        }
        if self.quality {
            s.push('q');
            if self.minratio != 2.0 {
                s.push_str(&format_number(self.minratio));
            }
        }
        if self.varvolume {
            s.push('a');
            if self.maxvolume >= 0.0 {
                s.push_str(&format_number(self.maxvolume));
            }
        }
        if self.regionattrib {
            s.push('A');
        }
        if self.conforming {
            s.push('D');
        }
        if self.convex {
            s.push('c');
        }
        if self.facesout {
            s.push('f');
        }
        if self.edgesout {
            s.push('e');
        }
        if self.voroout {
            s.push('v');
        }
        if self.zeroindex {
            s.push('z');
        }
        if self.order2 {
            s.push_str("o2");
        }
        if self.nobisect {
            s.push('Y');
        }
        if let Some(cap) = self.steiner {
            s.push('S');
            s.push_str(&cap.to_string());
        }
        if self.epsilon != 1e-8 {
            s.push('T');
            s.push_str(&format_number(self.epsilon));
        }
        if self.quiet {
            s.push('Q');
        }
        if self.verbose {
            s.push('V');
        }
        if self.docheck {
            s.push('C');
        }
        s
    }
}

/// Consumes a run of digits/`.`/exponent characters starting at `*i`,
/// mirroring `_convert_tetgen_switches_to_args`'s numeric-suffix scan.
fn take_number(chars: &[char], i: &mut usize) -> Option<f64> {
    let start = *i;
    while *i < chars.len() && (chars[*i].is_ascii_digit() || "+-.eE".contains(chars[*i])) {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    let text: String = chars[start..*i].iter().collect();
    text.parse().ok()
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plc_quality_volume() {
        let behavior = MeshBehavior::parse("pq1.414a0.1A").unwrap();
        assert!(behavior.plc);
        assert!(behavior.quality);
        assert!((behavior.minratio - 1.414).abs() < 1e-9);
        assert!(behavior.varvolume);
        assert!((behavior.maxvolume - 0.1).abs() < 1e-9);
        assert!(behavior.regionattrib);

        let reparsed = MeshBehavior::parse(&behavior.to_switches()).unwrap();
        assert_eq!(behavior, reparsed);
    }

    #[test]
    fn default_ratio_omitted_on_emit() {
        let behavior = MeshBehavior::parse("q").unwrap();
        assert_eq!(behavior.minratio, 2.0);
        assert_eq!(behavior.to_switches(), "q");
    }

    #[test]
    fn y_switch_takes_no_numeric_suffix() {
        let behavior = MeshBehavior::parse("pY").unwrap();
        assert!(behavior.nobisect);
        assert_eq!(behavior.to_switches(), "pY");
    }

    #[test]
    fn steiner_cap_and_tolerance_round_trip() {
        let behavior = MeshBehavior::parse("S100T1e-6").unwrap();
        assert_eq!(behavior.steiner, Some(100));
        assert!((behavior.epsilon - 1e-6).abs() < 1e-12);
        let reparsed = MeshBehavior::parse(&behavior.to_switches()).unwrap();
        assert_eq!(behavior, reparsed);
    }

    #[test]
    fn unrecognized_switch_is_input_error() {
        assert!(MeshBehavior::parse("pX").is_err());
    }
}
