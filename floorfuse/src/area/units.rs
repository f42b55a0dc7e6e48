//! Area units

use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareInch,
    SquareFoot,
    SquareYard,
    Acre,
    SquareMillimeter,
    SquareCentimeter,
    SquareMeter,
    Hectare,
}

impl AreaUnit {
    pub const ALL: [AreaUnit; 8] = [
        AreaUnit::SquareInch,
        AreaUnit::SquareFoot,
        AreaUnit::SquareYard,
        AreaUnit::Acre,
        AreaUnit::SquareMillimeter,
        AreaUnit::SquareCentimeter,
        AreaUnit::SquareMeter,
        AreaUnit::Hectare,
    ];

    /// Square meters in one unit (exact definitions)
    pub fn square_meters_per_unit(self) -> f64 {
        match self {
            AreaUnit::SquareInch => 0.000_645_16,
            AreaUnit::SquareFoot => 0.092_903_04,
            AreaUnit::SquareYard => 0.836_127_36,
            AreaUnit::Acre => 4_046.856_422_4,
            AreaUnit::SquareMillimeter => 1e-6,
            AreaUnit::SquareCentimeter => 1e-4,
            AreaUnit::SquareMeter => 1.0,
            AreaUnit::Hectare => 10_000.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AreaUnit::SquareInch => "in²",
            AreaUnit::SquareFoot => "ft²",
            AreaUnit::SquareYard => "yd²",
            AreaUnit::Acre => "ac",
            AreaUnit::SquareMillimeter => "mm²",
            AreaUnit::SquareCentimeter => "cm²",
            AreaUnit::SquareMeter => "m²",
            AreaUnit::Hectare => "ha",
        }
    }

    /// Square of a length unit
    pub fn for_length(unit: LengthUnit) -> Self {
        match unit {
            LengthUnit::Inch => AreaUnit::SquareInch,
            LengthUnit::Foot => AreaUnit::SquareFoot,
            LengthUnit::Yard => AreaUnit::SquareYard,
            LengthUnit::Millimeter => AreaUnit::SquareMillimeter,
            LengthUnit::Centimeter => AreaUnit::SquareCentimeter,
            LengthUnit::Meter => AreaUnit::SquareMeter,
        }
    }

    pub fn to_square_meters(self, value: f64) -> f64 {
        value * self.square_meters_per_unit()
    }

    pub fn from_square_meters(self, square_meters: f64) -> f64 {
        square_meters / self.square_meters_per_unit()
    }

    /// Convert `value` expressed in `self` into `target`
    pub fn convert(self, value: f64, target: AreaUnit) -> f64 {
        target.from_square_meters(self.to_square_meters(value))
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip_all_pairs() {
        let x = 123.456;
        for a in AreaUnit::ALL {
            for b in AreaUnit::ALL {
                let back = b.convert(a.convert(x, b), a);
                assert_relative_eq!(back, x, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_known_conversions() {
        assert_relative_eq!(AreaUnit::SquareFoot.convert(144.0, AreaUnit::SquareInch), 20_736.0, max_relative = 1e-9);
        assert_relative_eq!(AreaUnit::Acre.convert(1.0, AreaUnit::SquareFoot), 43_560.0, max_relative = 1e-9);
        assert_relative_eq!(AreaUnit::Hectare.convert(1.0, AreaUnit::SquareMeter), 10_000.0);
        assert_eq!(AreaUnit::for_length(LengthUnit::Foot), AreaUnit::SquareFoot);
    }
}
