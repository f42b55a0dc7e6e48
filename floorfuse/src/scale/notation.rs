//! Drawing scale notation parsing ("1:100", "1/4\" = 1'-0\"", "1\" = 20'")

use crate::units::LengthUnit;
use once_cell::sync::Lazy;
use regex::Regex;

/// Parsed scale notation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleNotation {
    /// Metric ratio 1:n
    Ratio(f64),
    /// Architectural/engineering scale: `drawing_inches` on paper equal `real_feet`
    Imperial { drawing_inches: f64, real_feet: f64 },
}

impl ScaleNotation {
    /// Pixels per real-world unit at the given rendering resolution
    pub fn pixels_per_unit(&self, dpi: f64) -> (f64, LengthUnit) {
        match *self {
            // Paper pixels per meter divided by the reduction ratio
            ScaleNotation::Ratio(n) => (dpi / 0.0254 / n, LengthUnit::Meter),
            ScaleNotation::Imperial {
                drawing_inches,
                real_feet,
            } => (drawing_inches * dpi / real_feet, LengthUnit::Foot),
        }
    }
}

static RATIO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d.])1\s*:\s*(\d+(?:\.\d+)?)\b").expect("static regex"));

static FRACTIONAL_IMPERIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\d+)\s*/\s*(\d+)\s*(?:"|″|in)?\s*=\s*(\d+(?:\.\d+)?)\s*(?:'|′|ft)"#)
        .expect("static regex")
});

static WHOLE_IMPERIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\d+(?:\.\d+)?)\s*(?:"|″|in)\s*=\s*(\d+(?:\.\d+)?)\s*(?:'|′|ft)"#)
        .expect("static regex")
});

/// Find a scale notation in free text
pub fn parse_scale_notation(text: &str) -> Option<ScaleNotation> {
    if let Some(caps) = FRACTIONAL_IMPERIAL.captures(text) {
        let num: f64 = caps[1].parse().ok()?;
        let den: f64 = caps[2].parse().ok()?;
        let real_feet: f64 = caps[3].parse().ok()?;
        if den > 0.0 && real_feet > 0.0 && num > 0.0 {
            return Some(ScaleNotation::Imperial {
                drawing_inches: num / den,
                real_feet,
            });
        }
    }

    if let Some(caps) = WHOLE_IMPERIAL.captures(text) {
        let drawing_inches: f64 = caps[1].parse().ok()?;
        let real_feet: f64 = caps[2].parse().ok()?;
        if drawing_inches > 0.0 && real_feet > 0.0 {
            return Some(ScaleNotation::Imperial {
                drawing_inches,
                real_feet,
            });
        }
    }

    let caps = RATIO.captures(text)?;
    let n: f64 = caps[1].parse().ok()?;
    (n > 0.0).then_some(ScaleNotation::Ratio(n))
}
