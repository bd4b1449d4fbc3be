use crate::models::SizeUnit;

/// Canonical unit all length comparisons happen in.
pub const CANONICAL: SizeUnit = SizeUnit::Centimeters;

/// Centimeters per unit, for units in the length set.
pub fn centimeters_per(unit: &SizeUnit) -> Option<f64> {
    match unit {
        SizeUnit::Millimeters => Some(0.1),
        SizeUnit::Centimeters => Some(1.0),
        SizeUnit::Meters => Some(100.0),
        SizeUnit::Inches => Some(2.54),
        SizeUnit::Feet => Some(30.48),
        _ => None,
    }
}

/// Converts `value` to centimeters.
///
/// Units outside the length set (weights, unknown codes) are returned as is.
pub fn normalize(value: f64, unit: &SizeUnit) -> f64 {
    centimeters_per(unit).map_or(value, |factor| value * factor)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(40.0, SizeUnit::Centimeters, 40.0 ; "centimeters are canonical")]
    #[test_case(405.0, SizeUnit::Millimeters, 40.5 ; "millimeters")]
    #[test_case(1.2, SizeUnit::Meters, 120.0 ; "meters")]
    #[test_case(10.0, SizeUnit::Inches, 25.4 ; "inches")]
    #[test_case(2.0, SizeUnit::Feet, 60.96 ; "feet")]
    #[test_case(3.5, SizeUnit::Kilograms, 3.5 ; "weights pass through")]
    #[test_case(7.0, SizeUnit::Other("span".to_string()), 7.0 ; "unknown units pass through")]
    fn normalize_to_centimeters(value: f64, unit: SizeUnit, expected: f64) {
        assert_relative_eq!(normalize(value, &unit), expected, epsilon = 1e-9);
    }

    #[test]
    fn canonical_unit_is_a_length() {
        assert!(CANONICAL.is_length());
        assert_eq!(centimeters_per(&CANONICAL), Some(1.0));
    }
}
