//! Floor-plan layout normalisation and validation (§4.1).
//!
//! Grammar: `[1-9]\d*` + (`R` | `K` | `DK` | `LDK` | `SLDK` | `SDK` | `SK`),
//! with an `S` prefix marking a service room. `ワンルーム` maps to `1R`.
//! Anything outside the grammar, or with a trailing digit tail (a
//! common scraping corruption, e.g. "3LDK2"), is rejected.

use once_cell::sync::Lazy;
use regex::Regex;

const VALID_ROOM_TOKENS: &[&str] = &["R", "K", "DK", "LDK", "SLDK", "SDK", "SK"];

static NUMBER_AND_LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([1-9]\d*)\s*([SLDKR]+)$").unwrap());
static FULL_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9]\d*(?:R|K|DK|LDK|SLDK|SDK|SK)$").unwrap());
static TRAILING_DIGIT_CORRUPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d$").unwrap());

fn fullwidth_alnum_to_halfwidth(s: &str) -> String {
    s.chars()
        .map(|c| {
            let code = c as u32;
            if (0xFF01..=0xFF5E).contains(&code) {
                char::from_u32(code - 0xFEE0).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Reorder a jumbled letter bag (e.g. scraper output "KDL") into the
/// canonical S, L, D, K ordering, then check it against the grammar's
/// whitelist. `R` never mixes with the other letters.
fn canonical_room_token(letters: &str) -> Option<&'static str> {
    let has = |c: char| letters.contains(c);
    let candidate: String = if has('R') {
        if has('L') || has('D') || has('K') || has('S') {
            return None; // R does not combine with service/L/D/K tokens
        }
        "R".to_string()
    } else {
        let mut s = String::new();
        if has('S') {
            s.push('S');
        }
        for letter in ['L', 'D', 'K'] {
            if has(letter) {
                s.push(letter);
            }
        }
        s
    };
    VALID_ROOM_TOKENS.iter().find(|t| **t == candidate).copied()
}

/// Normalise a free-text layout string into the canonical grammar, or
/// `None` when it cannot be made to fit (dropped per §4.1 validators,
/// not coerced).
pub fn normalize_layout(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let upper = fullwidth_alnum_to_halfwidth(raw).to_uppercase();

    if upper.contains("ワンルーム") || upper.contains("1ルーム") {
        return Some("1R".to_string());
    }

    let compact: String = upper.chars().filter(|c| !c.is_whitespace()).collect();

    let caps = NUMBER_AND_LETTERS.captures(&compact)?;
    let token = canonical_room_token(&caps[2])?;
    Some(format!("{}{}", &caps[1], token))
}

/// Validates that a layout string matches the grammar exactly and has
/// no trailing-digit corruption tail (a common scraping artefact).
pub fn validate_layout(layout: &str) -> bool {
    !layout.is_empty()
        && FULL_GRAMMAR.is_match(layout)
        && !TRAILING_DIGIT_CORRUPTION.is_match(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_basic_forms() {
        assert_eq!(normalize_layout("2LDK"), Some("2LDK".to_string()));
        assert_eq!(normalize_layout("３ＬＤＫ"), Some("3LDK".to_string()));
        assert_eq!(normalize_layout("ワンルーム"), Some("1R".to_string()));
        assert_eq!(normalize_layout("1SLDK"), Some("1SLDK".to_string()));
    }

    #[test]
    fn reorders_jumbled_letters() {
        assert_eq!(normalize_layout("2KDL"), Some("2LDK".to_string()));
    }

    #[test]
    fn rejects_r_combined_with_other_letters() {
        assert_eq!(normalize_layout("1SR"), None);
    }

    #[test]
    fn rejects_corrupted_trailing_digit() {
        assert!(!validate_layout("3LDK2"));
    }

    #[test]
    fn rejects_outside_grammar() {
        assert_eq!(normalize_layout("studio apartment"), None);
    }

    #[test]
    fn idempotence_property() {
        for s in ["2LDK", "1SLDK", "ワンルーム"] {
            let once = normalize_layout(s).unwrap();
            let twice = normalize_layout(&once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
