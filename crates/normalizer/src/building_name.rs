//! Building name normalisation (§4.1).
//!
//! Produces the display form (`normalised_name`) and the aggressive
//! search/grouping key (`canonical_name`), ported from
//! `building_name_normalizer.py` and `building_normalizer.py` in the
//! original scraper.

use once_cell::sync::Lazy;
use regex::Regex;

/// Roman numeral glyphs mapped to their Latin-letter spelling.
const ROMAN_NUMERALS: &[(char, &str)] = &[
    ('\u{2160}', "I"),
    ('\u{2161}', "II"),
    ('\u{2162}', "III"),
    ('\u{2163}', "IV"),
    ('\u{2164}', "V"),
    ('\u{2165}', "VI"),
    ('\u{2166}', "VII"),
    ('\u{2167}', "VIII"),
    ('\u{2168}', "IX"),
    ('\u{2169}', "X"),
    ('\u{216A}', "XI"),
    ('\u{216B}', "XII"),
];

/// Full-width katakana used often enough in listing names that a
/// half-width -> full-width table is worth keeping (half-width kana
/// only ever appears as scraping noise from Shift-JIS sources).
const HALFWIDTH_KATAKANA: &[(char, char)] = &[
    ('\u{FF66}', '\u{30F2}'), // ｦ -> ヲ
    ('\u{FF67}', '\u{30A1}'), // ｧ -> ァ
    ('\u{FF68}', '\u{30A3}'),
    ('\u{FF69}', '\u{30A5}'),
    ('\u{FF6A}', '\u{30A7}'),
    ('\u{FF6B}', '\u{30A9}'),
    ('\u{FF6C}', '\u{30E3}'),
    ('\u{FF6D}', '\u{30E5}'),
    ('\u{FF6E}', '\u{30E7}'),
    ('\u{FF6F}', '\u{30C3}'),
    ('\u{FF71}', '\u{30A2}'),
    ('\u{FF72}', '\u{30A4}'),
    ('\u{FF73}', '\u{30A6}'),
    ('\u{FF74}', '\u{30A8}'),
    ('\u{FF75}', '\u{30AA}'),
    ('\u{FF76}', '\u{30AB}'),
    ('\u{FF9E}', '\u{3099}'), // voiced sound mark (combining)
];

static SYMBOL_COLLAPSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{30fb}\u{2010}-\u{2015}\u{301c}~\-]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static STATION_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"駅|徒歩|分歩|バス(?:停)?|.線$|線[0-9]").unwrap());
static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>.*?)[\s]*(?P<digits>\d{1,4})(?:号室|号)?$").unwrap());

/// Full-width to half-width for ASCII letters, digits, and common
/// punctuation; full-width space to half-width space.
fn fullwidth_to_halfwidth_ascii(c: char) -> char {
    let code = c as u32;
    if (0xFF01..=0xFF5E).contains(&code) {
        char::from_u32(code - 0xFEE0).unwrap_or(c)
    } else if c == '\u{3000}' {
        ' '
    } else {
        c
    }
}

fn halfwidth_to_fullwidth_kana(c: char) -> char {
    for (half, full) in HALFWIDTH_KATAKANA {
        if *half == c {
            return *full;
        }
    }
    c
}

/// Display-form normalisation: width unification, kana folding, roman
/// numeral folding, unit-glyph unification, uppercasing, whitespace
/// collapse. Idempotent: `normalize_building_name(normalize_building_name(x)) == normalize_building_name(x)`.
pub fn normalize_building_name(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut s: String = raw
        .chars()
        .map(fullwidth_to_halfwidth_ascii)
        .map(halfwidth_to_fullwidth_kana)
        .collect();

    for (full, latin) in ROMAN_NUMERALS {
        s = s.replace(*full, latin);
    }

    s = s.replace('\u{33a1}', "m2"); // ㎡
    s = s.replace("m\u{00b2}", "m2"); // m²

    s = SYMBOL_COLLAPSE.replace_all(&s, " ").to_string();
    s = s.to_uppercase();
    s = WHITESPACE.replace_all(&s, " ").trim().to_string();
    s
}

/// Search/grouping key: the display form with all remaining whitespace
/// and punctuation stripped. Tower suffixes (`A棟`, `EAST`, `東棟`, ...)
/// are intentionally preserved — different suffixes mean different
/// buildings by policy (§4.1).
pub fn canonical_name(raw: &str) -> String {
    let normalised = normalize_building_name(raw);
    normalised
        .chars()
        .filter(|c| !c.is_whitespace() && !is_stray_punctuation(*c))
        .collect()
}

fn is_stray_punctuation(c: char) -> bool {
    matches!(c, '　' | '、' | '。' | '，' | '．' | '(' | ')' | '（' | '）')
}

/// True when `name` looks like a transit description rather than a
/// building name (§4.1, §9 "station-noise name"). Used only to gate
/// the Alias ledger, never to block ingest.
pub fn is_station_noise(name: &str) -> bool {
    !name.is_empty() && STATION_NOISE.is_match(name)
}

/// Split a trailing plausible room number off a building name. Only
/// 3-4 trailing digits (optionally followed by `号`/`号室`) count; 1-2
/// trailing digits are left attached to the name since they are more
/// often a tower/unit-count suffix than a room number.
pub fn extract_room_number(name: &str) -> (String, Option<String>) {
    if name.is_empty() {
        return (String::new(), None);
    }
    if let Some(caps) = TRAILING_DIGITS.captures(name) {
        let digits = &caps["digits"];
        if digits.len() >= 3 {
            let base = caps["name"].trim().to_string();
            if !base.is_empty() {
                return (base, Some(digits.to_string()));
            }
        }
    }
    (name.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_width_and_case() {
        let got = normalize_building_name("ぱーくこーと　ABC１２３");
        assert!(got.contains("ABC123"));
        assert_eq!(got, normalize_building_name(&got), "must be idempotent");
    }

    #[test]
    fn collapses_dash_and_nakaguro_to_space() {
        let got = normalize_building_name("パーク・コート〜南青山");
        assert_eq!(got, "パーク コート 南青山");
    }

    #[test]
    fn unifies_square_meter_glyph() {
        assert_eq!(normalize_building_name("75.3㎡タイプ"), "75.3M2タイプ");
    }

    #[test]
    fn canonical_name_strips_all_whitespace() {
        assert_eq!(canonical_name("パークコート 赤坂"), canonical_name("パークコート赤坂"));
        assert_eq!(canonical_name("パークコート 赤坂"), "パークコート赤坂");
    }

    #[test]
    fn tower_suffix_is_preserved_in_canonical_name() {
        assert_ne!(canonical_name("タワーマンション東棟"), canonical_name("タワーマンション西棟"));
        assert_ne!(canonical_name("PARK TOWER EAST"), canonical_name("PARK TOWER WEST"));
    }

    #[test]
    fn detects_station_noise() {
        assert!(is_station_noise("赤坂駅徒歩5分"));
        assert!(is_station_noise("渋谷駅 バス10分"));
        assert!(!is_station_noise("パークコート赤坂"));
    }

    #[test]
    fn extracts_plausible_room_numbers() {
        assert_eq!(
            extract_room_number("パークハウス101"),
            ("パークハウス".to_string(), Some("101".to_string()))
        );
        assert_eq!(
            extract_room_number("東京タワー 2003号"),
            ("東京タワー".to_string(), Some("2003".to_string()))
        );
    }

    #[test]
    fn does_not_extract_one_or_two_digit_tails() {
        let (name, room) = extract_room_number("グランド棟 12");
        assert_eq!(room, None);
        assert_eq!(name, "グランド棟 12");
    }

    #[test]
    fn idempotence_property() {
        for s in ["パークコート　赤坂　Ⅱ", "the PARK house 東棟101"] {
            let once = normalize_building_name(s);
            let twice = normalize_building_name(&once);
            assert_eq!(once, twice);
        }
    }
}
