//! Length units and dimension text parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear unit of measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Inch,
    Foot,
    Yard,
    Millimeter,
    Centimeter,
    Meter,
}

impl LengthUnit {
    pub fn meters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Inch => 0.0254,
            LengthUnit::Foot => 0.3048,
            LengthUnit::Yard => 0.9144,
            LengthUnit::Millimeter => 0.001,
            LengthUnit::Centimeter => 0.01,
            LengthUnit::Meter => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Inch => "in",
            LengthUnit::Foot => "ft",
            LengthUnit::Yard => "yd",
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
        }
    }

    pub fn is_metric(self) -> bool {
        matches!(
            self,
            LengthUnit::Millimeter | LengthUnit::Centimeter | LengthUnit::Meter
        )
    }

    /// Convert `value` expressed in `self` into `target`
    pub fn convert(self, value: f64, target: LengthUnit) -> f64 {
        value * self.meters_per_unit() / target.meters_per_unit()
    }

    fn from_suffix(suffix: &str) -> Option<LengthUnit> {
        match suffix.trim().to_lowercase().as_str() {
            "'" | "′" | "ft" | "feet" | "foot" => Some(LengthUnit::Foot),
            "\"" | "″" | "in" | "inch" | "inches" => Some(LengthUnit::Inch),
            "yd" | "yard" | "yards" => Some(LengthUnit::Yard),
            "mm" => Some(LengthUnit::Millimeter),
            "cm" => Some(LengthUnit::Centimeter),
            "m" | "meter" | "meters" | "metre" | "metres" => Some(LengthUnit::Meter),
            _ => None,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Measurement system a drawing is assumed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitSystem {
    pub fn base_unit(self) -> LengthUnit {
        match self {
            UnitSystem::Imperial => LengthUnit::Foot,
            UnitSystem::Metric => LengthUnit::Meter,
        }
    }
}

/// A real-world length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn from_meters(meters: f64, unit: LengthUnit) -> Self {
        Self::new(meters / unit.meters_per_unit(), unit)
    }

    pub fn to_meters(&self) -> f64 {
        self.value * self.unit.meters_per_unit()
    }

    pub fn in_unit(&self, unit: LengthUnit) -> f64 {
        self.unit.convert(self.value, unit)
    }
}

static FEET_INCHES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\d+(?:\.\d+)?)\s*(?:'|′|ft|feet)\s*-?\s*(\d+(?:\.\d+)?)\s*(?:"|″|in\b|inches\b)?"#)
        .expect("static regex")
});

static VALUE_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\d+(?:\.\d+)?)\s*('|′|"|″|feet\b|foot\b|ft\b|inches\b|inch\b|in\b|yards?\b|yd\b|mm\b|cm\b|meters?\b|metres?\b|m\b)"#)
        .expect("static regex")
});

static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").expect("static regex"));

static SIZE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[xX×]\s*").expect("static regex"));

/// Parse a dimension annotation such as `12'-6"`, `3.5 m` or `450mm`
///
/// Only the first measurement in the text is used.
pub fn parse_dimension_text(text: &str) -> Option<Length> {
    let lowered = text.to_lowercase();

    if let Some(caps) = FEET_INCHES.captures(&lowered) {
        let feet: f64 = caps[1].parse().ok()?;
        let inches: f64 = caps[2].parse().ok()?;
        if inches < 12.0 {
            return Some(Length::new(feet + inches / 12.0, LengthUnit::Foot));
        }
    }

    let caps = VALUE_WITH_UNIT.captures(&lowered)?;
    let value: f64 = caps[1].parse().ok()?;
    let unit = LengthUnit::from_suffix(&caps[2])?;
    Some(Length::new(value, unit))
}

/// Parse a number with an optional unit suffix; bare numbers take `default_unit`
pub fn parse_length_or_number(text: &str, default_unit: LengthUnit) -> Option<Length> {
    if let Some(caps) = BARE_NUMBER.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        return Some(Length::new(value, default_unit));
    }
    parse_dimension_text(text)
}

/// Parse a room size label such as `12' x 14'` or `3.6 x 4.2 m`
///
/// When only one side carries a unit, the other side borrows it.
pub fn parse_room_size(text: &str, default_unit: LengthUnit) -> Option<(Length, Length)> {
    let parts: Vec<&str> = SIZE_SEPARATOR.splitn(text.trim(), 2).collect();
    if parts.len() != 2 {
        return None;
    }

    let first = parse_dimension_text(parts[0]);
    let second = parse_dimension_text(parts[1]);
    let shared_unit = second
        .map(|l| l.unit)
        .or(first.map(|l| l.unit))
        .unwrap_or(default_unit);

    let a = first.or_else(|| parse_length_or_number(parts[0], shared_unit))?;
    let b = second.or_else(|| parse_length_or_number(parts[1], shared_unit))?;
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_feet_and_inches() {
        let len = parse_dimension_text("12'-6\"").unwrap();
        assert_eq!(len.unit, LengthUnit::Foot);
        assert_relative_eq!(len.value, 12.5);
    }

    #[test]
    fn test_metric_suffixes() {
        let len = parse_dimension_text("3.5 m").unwrap();
        assert_eq!(len.unit, LengthUnit::Meter);
        assert_relative_eq!(len.value, 3.5);

        let len = parse_dimension_text("450mm").unwrap();
        assert_eq!(len.unit, LengthUnit::Millimeter);
        assert_relative_eq!(len.to_meters(), 0.45);
    }

    #[test]
    fn test_plain_feet() {
        let len = parse_dimension_text("10 ft").unwrap();
        assert_eq!(len.unit, LengthUnit::Foot);
        assert_relative_eq!(len.to_meters(), 3.048);
    }

    #[test]
    fn test_unparseable_text() {
        assert!(parse_dimension_text("KITCHEN").is_none());
        assert!(parse_dimension_text("").is_none());
    }

    #[test]
    fn test_room_size_borrows_unit() {
        let (a, b) = parse_room_size("12 x 14'", LengthUnit::Meter).unwrap();
        assert_eq!(a.unit, LengthUnit::Foot);
        assert_relative_eq!(a.value, 12.0);
        assert_relative_eq!(b.value, 14.0);

        let (a, _) = parse_room_size("3 x 4", LengthUnit::Meter).unwrap();
        assert_eq!(a.unit, LengthUnit::Meter);
    }

    #[test]
    fn test_unit_conversion() {
        assert_relative_eq!(LengthUnit::Foot.convert(1.0, LengthUnit::Inch), 12.0, epsilon = 1e-9);
        assert_relative_eq!(LengthUnit::Meter.convert(1.0, LengthUnit::Millimeter), 1000.0, epsilon = 1e-9);
    }
}
