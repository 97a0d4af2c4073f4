//! Numeric field extraction (§4.1): price, floor area, floor number,
//! total floors, and built year (including Japanese era/wareki
//! conversion). Ported from `extract_price`, `extract_area`,
//! `extract_floor_number`, `extract_total_floors`, and
//! `extract_built_year` in the original scraper's `data_normalizer.py`.

use once_cell::sync::Lazy;
use regex::Regex;
use fancy_regex::Regex as LookaroundRegex;

static OKU_MAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*億\s*(\d+(?:\.\d+)?)?\s*万?").unwrap());
static MAN_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*万").unwrap());
static PLAIN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

static AREA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:m2|m²|㎡|平米|平方メートル)").unwrap());

static BASEMENT_FLOOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"B\s*(\d+)\s*階").unwrap());
static FLOOR: Lazy<LookaroundRegex> = Lazy::new(|| LookaroundRegex::new(r"(\d+)\s*階(?!建)").unwrap());
static TOTAL_FLOORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:地上)?\s*(\d+)\s*階建").unwrap());

static WAREKI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(明治|大正|昭和|平成|令和)\s*(元|\d+)\s*年").unwrap());
static SEIREKI_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})\s*年").unwrap());

/// Extract a price in 万円 (ten-thousand-yen) units, as used throughout
/// listing prices. Handles `X億Y万円` compound forms (`1億2000万円` ->
/// `12000`万円) and plain `X万円` forms. Returns `None` when no numeric
/// price pattern is found.
pub fn extract_price_man_en(raw: &str) -> Option<f64> {
    if let Some(caps) = OKU_MAN.captures(raw) {
        let oku: f64 = caps[1].parse().ok()?;
        let man: f64 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        return Some(oku * 10_000.0 + man);
    }
    if let Some(caps) = MAN_ONLY.captures(raw) {
        return caps[1].parse().ok();
    }
    PLAIN_NUMBER.captures(raw).and_then(|c| c[1].parse().ok())
}

/// Extract a floor area in square metres.
pub fn extract_area_sqm(raw: &str) -> Option<f64> {
    AREA.captures(raw).and_then(|c| c[1].parse().ok())
}

/// Extract the listing's own floor number. Basement floors (`B1階`)
/// are returned as negative numbers. A `N階建` ("N-storey building")
/// suffix is excluded so it is not mistaken for the unit's floor.
pub fn extract_floor_number(raw: &str) -> Option<i32> {
    if let Some(caps) = BASEMENT_FLOOR.captures(raw) {
        let n: i32 = caps[1].parse().ok()?;
        return Some(-n);
    }
    FLOOR.captures(raw).unwrap().and_then(|c| c[1].parse().ok())
}

/// Extract the building's total floor count from a `N階建` /
/// `地上N階建` suffix.
pub fn extract_total_floors(raw: &str) -> Option<i32> {
    TOTAL_FLOORS.captures(raw).and_then(|c| c[1].parse().ok())
}

/// First year of each Japanese era relevant to condominium stock, used
/// to convert `元号N年` into a Western calendar year.
fn era_start_year(era: &str) -> Option<i32> {
    match era {
        "明治" => Some(1868),
        "大正" => Some(1912),
        "昭和" => Some(1926),
        "平成" => Some(1989),
        "令和" => Some(2019),
        _ => None,
    }
}

/// Extract a built year, accepting both Western (`2015年`) and
/// Japanese-era (`平成27年`, `令和元年`) forms.
pub fn extract_built_year(raw: &str) -> Option<i32> {
    if let Some(caps) = WAREKI.captures(raw) {
        let era_year: i32 = if &caps[2] == "元" {
            1
        } else {
            caps[2].parse().ok()?
        };
        let start = era_start_year(&caps[1])?;
        return Some(start + era_year - 1);
    }
    SEIREKI_YEAR.captures(raw).and_then(|c| c[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_man_price() {
        assert_eq!(extract_price_man_en("5980万円"), Some(5980.0));
    }

    #[test]
    fn extracts_oku_man_compound_price() {
        assert_eq!(extract_price_man_en("1億2000万円"), Some(12000.0));
        assert_eq!(extract_price_man_en("1.5億円"), Some(15000.0));
    }

    #[test]
    fn extracts_area() {
        assert_eq!(extract_area_sqm("75.34m²"), Some(75.34));
        assert_eq!(extract_area_sqm("80.5㎡"), Some(80.5));
    }

    #[test]
    fn extracts_floor_and_basement() {
        assert_eq!(extract_floor_number("3階"), Some(3));
        assert_eq!(extract_floor_number("B1階"), Some(-1));
    }

    #[test]
    fn floor_extraction_ignores_building_height_suffix() {
        assert_eq!(extract_floor_number("10階建"), None);
    }

    #[test]
    fn extracts_total_floors() {
        assert_eq!(extract_total_floors("地上15階建"), Some(15));
        assert_eq!(extract_total_floors("15階建"), Some(15));
    }

    #[test]
    fn converts_wareki_years() {
        assert_eq!(extract_built_year("平成27年築"), Some(2015));
        assert_eq!(extract_built_year("令和元年築"), Some(2019));
        assert_eq!(extract_built_year("昭和63年築"), Some(1988));
    }

    #[test]
    fn extracts_seireki_year() {
        assert_eq!(extract_built_year("2015年築"), Some(2015));
    }
}
