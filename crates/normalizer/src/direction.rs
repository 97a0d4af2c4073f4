//! Balcony-direction normalisation (§4.1): 8-point compass, accepting
//! English abbreviations, Japanese kanji forms, and the `〜向き` suffix
//! form. Ported from the `direction_mapping` table in the original
//! scraper's `data_normalizer.py`.

/// Canonical compass points, ordered clockwise from north.
pub const COMPASS_POINTS: &[&str] = &["北", "北東", "東", "南東", "南", "南西", "西", "北西"];

const MAPPING: &[(&str, &str)] = &[
    ("北東", "北東"),
    ("南東", "南東"),
    ("南西", "南西"),
    ("北西", "北西"),
    ("北", "北"),
    ("東", "東"),
    ("南", "南"),
    ("西", "西"),
    ("NE", "北東"),
    ("SE", "南東"),
    ("SW", "南西"),
    ("NW", "北西"),
    ("N", "北"),
    ("E", "東"),
    ("S", "南"),
    ("W", "西"),
];

/// Normalise a raw direction string to one of the eight canonical
/// compass points, or `None` when it cannot be recognised. Accepts a
/// trailing `向き` suffix (e.g. `南向き` -> `南`) and is case-insensitive
/// for the English forms.
pub fn normalize_direction(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed.strip_suffix("向き").unwrap_or(trimmed);
    let upper = stripped.to_uppercase();

    // Longest-key-first so "NE" isn't shadowed by a hypothetical "N" prefix match.
    let mut candidates: Vec<&(&str, &str)> = MAPPING.iter().collect();
    candidates.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));

    for (key, canonical) in candidates {
        if stripped == *key || upper == *key {
            return Some(canonical);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_kanji_forms() {
        assert_eq!(normalize_direction("南東"), Some("南東"));
        assert_eq!(normalize_direction("南東向き"), Some("南東"));
    }

    #[test]
    fn normalises_english_abbreviations() {
        assert_eq!(normalize_direction("se"), Some("南東"));
        assert_eq!(normalize_direction("N"), Some("北"));
        assert_eq!(normalize_direction("ne"), Some("北東"));
    }

    #[test]
    fn rejects_unknown_direction() {
        assert_eq!(normalize_direction("diagonal"), None);
        assert_eq!(normalize_direction(""), None);
    }

    #[test]
    fn idempotence_property() {
        for s in ["南東", "N", "西向き"] {
            let once = normalize_direction(s).unwrap();
            let twice = normalize_direction(once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
