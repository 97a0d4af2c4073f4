//! Address normalisation (§4.1), ported from `address_normalizer.py`.
//!
//! Converts full-width/kanji numerals to half-width Arabic, rewrites
//! `N丁目M番地K号` / `N丁目M-K` / `N-M-K` forms into the canonical
//! `N-M-K`, strips UI noise, and exposes a detail-level classifier
//! used by the Resolver's prefix-chain matching (§4.3).

use once_cell::sync::Lazy;
use regex::Regex;
use fancy_regex::Regex as LookaroundRegex;

/// How far into administrative hierarchy an address string reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailLevel {
    Prefecture = 0,
    WardOrCity = 1,
    Town = 2,
    Chome = 3,
    Banchi = 4,
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static UI_NOISE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(地図を見る|地図|MAP|Map|map|マップ|周辺|詳細|もっと見る|アクセス).*$").unwrap()
});
static PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[（(][^）)]*[）)]").unwrap());

static CHOME_BANCHI_GOU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*丁目\s*(\d+)\s*番地?\s*(\d+)\s*号?").unwrap());
static CHOME_BANCHI: Lazy<LookaroundRegex> =
    Lazy::new(|| LookaroundRegex::new(r"(\d+)\s*丁目\s*(\d+)\s*番地?(?![0-9])").unwrap());
static CHOME_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*丁目\s*(\d+)\s*[-－−]\s*(\d+)").unwrap());
static CHOME_PLAIN: Lazy<LookaroundRegex> =
    Lazy::new(|| LookaroundRegex::new(r"(\d+)\s*丁目\s*(\d+)(?![番号丁])").unwrap());
static CHOME_ONLY: Lazy<LookaroundRegex> =
    Lazy::new(|| LookaroundRegex::new(r"(\d+)\s*丁目(?!\d)").unwrap());
static DASH3: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[-－−]\s*(\d+)\s*[-－−]\s*(\d+)").unwrap());
static DASH2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[-－−]\s*(\d+)").unwrap());

static PREFECTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(東京都|北海道|(?:京都|大阪)府|\S+?県)").unwrap());
static CITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S+?[市])").unwrap());
static WARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S+?[区])").unwrap());
static TOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S+?[町村])").unwrap());
static BLOCK_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:-\d+)*)").unwrap());

const FULLWIDTH_DIGITS: &[(char, char)] = &[
    ('０', '0'),
    ('１', '1'),
    ('２', '2'),
    ('３', '3'),
    ('４', '4'),
    ('５', '5'),
    ('６', '6'),
    ('７', '7'),
    ('８', '8'),
    ('９', '9'),
];

const KANJI_DIGITS: &[(char, char)] = &[
    ('一', '1'),
    ('二', '2'),
    ('三', '3'),
    ('四', '4'),
    ('五', '5'),
    ('六', '6'),
    ('七', '7'),
    ('八', '8'),
    ('九', '9'),
    ('〇', '0'),
    ('○', '0'),
];

fn to_halfwidth_digits(s: &str) -> String {
    let mut out = s.to_string();
    for (full, half) in FULLWIDTH_DIGITS.iter().chain(KANJI_DIGITS.iter()) {
        out = out.replace(*full, &half.to_string());
    }
    out
}

/// Strip map-link / UI chrome from a raw scraped address (§4.1): HTML
/// tags, parenthetical building-name asides, and anything after a
/// detected UI-noise keyword (`地図を見る`, `周辺`, ...).
pub fn strip_ui_noise(address: &str) -> String {
    let mut s = HTML_TAG.replace_all(address, "").to_string();
    s = PAREN.replace_all(&s, "").to_string();
    s = UI_NOISE_SUFFIX.replace(&s, "").to_string();
    s.trim().to_string()
}

/// Rewrite `N丁目M番地K号` / `N丁目M-K` / `N-M-K` forms into the
/// canonical `N-M-K` block representation, after digit folding.
fn normalize_block_numbers(s: &str) -> String {
    let mut out = s.to_string();
    out = CHOME_BANCHI_GOU.replace_all(&out, "$1-$2-$3").to_string();
    out = CHOME_DASH.replace_all(&out, "$1-$2-$3").to_string();
    out = CHOME_BANCHI.replace_all(&out, "$1-$2").to_string();
    out = CHOME_PLAIN.replace_all(&out, "$1-$2").to_string();
    out = CHOME_ONLY.replace_all(&out, "$1").to_string();
    out = DASH3.replace_all(&out, "$1-$2-$3").to_string();
    out = DASH2.replace_all(&out, "$1-$2").to_string();
    out.replace(['－', '−'], "-")
}

/// Full address normalisation (§4.1): numeral folding, UI-noise
/// stripping, block-number canonicalisation. Idempotent.
pub fn normalize_address(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let stripped = strip_ui_noise(raw);
    let digits_folded = to_halfwidth_digits(&stripped);
    let blocks = normalize_block_numbers(&digits_folded);
    blocks.split_whitespace().collect::<Vec<_>>().join("")
}

/// Administrative decomposition of a normalised address, exposed for
/// the Duplicate finder's address scoring and district-prefix
/// partitioning (§4.6).
#[derive(Debug, Clone, Default)]
pub struct Components {
    pub prefecture: String,
    pub city_or_ward: String,
    pub town: String,
    pub area: String,
    pub block: String,
}

impl Components {
    /// `N-M-K` block numbers as integers, for element-wise comparison.
    pub fn block_numbers(&self) -> Vec<i64> {
        self.block.split('-').filter_map(|s| s.parse().ok()).collect()
    }
}

fn extract_components(normalized: &str) -> Components {
    let mut remaining = normalized;
    let mut prefecture = String::new();
    let mut city_or_ward = String::new();
    let mut town = String::new();

    if let Some(m) = PREFECTURE.find(remaining) {
        prefecture = m.as_str().to_string();
        remaining = &remaining[m.end()..];
    }
    if let Some(m) = CITY.find(remaining) {
        city_or_ward.push_str(m.as_str());
        remaining = &remaining[m.end()..];
    }
    if let Some(m) = WARD.find(remaining) {
        city_or_ward.push_str(m.as_str());
        remaining = &remaining[m.end()..];
    }
    if let Some(m) = TOWN.find(remaining) {
        town = m.as_str().to_string();
        remaining = &remaining[m.end()..];
    }

    let (area, block) = match BLOCK_NUMBER.find(remaining) {
        Some(m) => (remaining[..m.start()].to_string(), m.as_str().to_string()),
        None => (remaining.to_string(), String::new()),
    };

    Components {
        prefecture,
        city_or_ward,
        town,
        area,
        block,
    }
}

/// Decompose a normalised address into {prefecture, city/ward, town,
/// block} for the Duplicate finder's address scoring (§4.6).
pub fn decompose(address: &str) -> Components {
    extract_components(&normalize_address(address))
}

/// Town-level slice of a normalised address, used to partition
/// buildings before the Duplicate finder's O(n²) pairwise comparison
/// (§4.6 "district prefix").
pub fn district_prefix(address: &str) -> String {
    let comps = decompose(address);
    format!("{}{}{}", comps.prefecture, comps.city_or_ward, comps.town)
}

/// Detail-level classifier (§4.1): 0=prefecture, 1=ward/city,
/// 2=town, 3=chome, 4=banchi.
pub fn detail_level(address: &str) -> DetailLevel {
    let normalized = normalize_address(address);
    let comps = extract_components(&normalized);

    if !comps.block.is_empty() {
        let dash_count = comps.block.matches('-').count();
        return if dash_count >= 1 {
            DetailLevel::Banchi
        } else {
            DetailLevel::Chome
        };
    }
    if !comps.town.is_empty() || !comps.area.is_empty() {
        return DetailLevel::Town;
    }
    if !comps.city_or_ward.is_empty() {
        return DetailLevel::WardOrCity;
    }
    if !comps.prefecture.is_empty() {
        return DetailLevel::Prefecture;
    }
    DetailLevel::Prefecture
}

/// Two normalised addresses are "prefix-chain partners" when either
/// side is a prefix of the other at the character level — handles
/// address completion over time (§4.3 step 3, scenario S2).
pub fn is_prefix_chain_partner(a: &str, b: &str) -> bool {
    let (na, nb) = (normalize_address(a), normalize_address(b));
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na.starts_with(&nb) || nb.starts_with(&na)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalises_chome_banchi_gou() {
        assert_eq!(
            normalize_address("東京都港区赤坂9丁目1番地1号"),
            "東京都港区赤坂9-1-1"
        );
        assert_eq!(
            normalize_address("東京都港区赤坂９丁目１−１"),
            normalize_address("東京都港区赤坂9丁目1番地1号")
        );
    }

    #[test]
    fn strips_ui_noise_suffix() {
        let got = strip_ui_noise("東京都港区芝浦4-10-1 地図を見る");
        assert_eq!(got, "東京都港区芝浦4-10-1");
    }

    #[test]
    fn idempotence_property() {
        for s in ["東京都港区赤坂9丁目1番地1号", "東京都港区芝浦4-10-1"] {
            let once = normalize_address(s);
            let twice = normalize_address(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn prefix_chain_partner_handles_address_completion() {
        assert!(is_prefix_chain_partner(
            "東京都港区芝浦4",
            "東京都港区芝浦4-10-1"
        ));
        assert!(!is_prefix_chain_partner(
            "東京都港区芝浦4",
            "東京都港区赤坂9-1-1"
        ));
    }

    #[test]
    fn detail_level_scales_with_specificity() {
        assert_eq!(detail_level("東京都"), DetailLevel::Prefecture);
        assert_eq!(detail_level("東京都港区芝浦4-10-1"), DetailLevel::Banchi);
    }
}
