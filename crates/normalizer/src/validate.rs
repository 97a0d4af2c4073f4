//! Plausibility range validators (§4.1). These gate extracted numeric
//! fields before they reach the aggregator — values outside range are
//! treated as extraction failures, not clamped.

use chrono_helpers::current_year;

mod chrono_helpers {
    /// Returns the current year. Kept as its own indirection point so
    /// callers that need a fixed "now" for tests can shadow it without
    /// pulling a full clock dependency into this crate.
    pub fn current_year() -> i32 {
        1970 + (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            / 31_557_600) as i32
    }
}

/// Price range, in 万円 units: 100万円 - 500,000万円 (50億円).
pub fn is_plausible_price(man_en: f64) -> bool {
    (100.0..=500_000.0).contains(&man_en)
}

/// Floor area range, in square metres.
pub fn is_plausible_area(sqm: f64) -> bool {
    (10.0..=1_000.0).contains(&sqm)
}

/// Floor number range; negative values are below-grade floors.
pub fn is_plausible_floor(floor: i32) -> bool {
    (-5..=100).contains(&floor)
}

/// Built-year range: no condominium predates 1900, and nothing is
/// built more than 5 years in the future (pre-sale listings).
pub fn is_plausible_built_year(year: i32) -> bool {
    (1900..=current_year() + 5).contains(&year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_bounds() {
        assert!(is_plausible_price(100.0));
        assert!(is_plausible_price(500_000.0));
        assert!(!is_plausible_price(99.0));
        assert!(!is_plausible_price(500_001.0));
    }

    #[test]
    fn area_bounds() {
        assert!(is_plausible_area(10.0));
        assert!(is_plausible_area(1_000.0));
        assert!(!is_plausible_area(9.9));
        assert!(!is_plausible_area(1_000.1));
    }

    #[test]
    fn floor_bounds() {
        assert!(is_plausible_floor(-5));
        assert!(is_plausible_floor(100));
        assert!(!is_plausible_floor(-6));
        assert!(!is_plausible_floor(101));
    }

    #[test]
    fn built_year_bounds() {
        assert!(is_plausible_built_year(1900));
        assert!(!is_plausible_built_year(1899));
        assert!(!is_plausible_built_year(current_year() + 6));
    }
}
