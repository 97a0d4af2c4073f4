//! Duplicate finder (§4.6): presents human-reviewable groups of
//! likely-duplicate buildings (and, separately, properties). Read-only,
//! rule-based, and auditable — no machine-learned similarity models
//! (§1 Non-goals).

use std::collections::{HashMap, HashSet};

use db::models::{Building, BuildingId, BuildingMergeExclusion, MasterProperty};
use serde::Serialize;

/// Weights for the building-similarity composite. The specification
/// requires a "weighted composite" without naming the weights
/// themselves; name and address carry equal, dominant weight since
/// either alone can already identify a building (a perfect name match
/// at a wrong address, or vice versa, is suspicious), with attributes
/// as a lighter-weight corroborating signal (DESIGN.md, open decision).
const NAME_WEIGHT: f64 = 0.4;
const ADDRESS_WEIGHT: f64 = 0.4;
const ATTRIBUTE_WEIGHT: f64 = 0.2;

// --- Name scoring -----------------------------------------------------

/// Katakana/English and abbreviation bridges used to generate
/// alternate spellings of a building name before scoring (§4.6).
const BRIDGE_TERMS: &[(&str, &str)] = &[
    ("パーク", "PARK"),
    ("コート", "COURT"),
    ("タワー", "TOWER"),
    ("ガーデン", "GARDEN"),
    ("ハウス", "HOUSE"),
    ("レジデンス", "RESIDENCE"),
    ("ヒルズ", "HILLS"),
    ("プラザ", "PLAZA"),
    ("クレスト", "CREST"),
    ("フォレスト", "FOREST"),
    ("ステーション", "STATION"),
];

/// Tower/wing suffix spellings that denote the same physical wing
/// across different portals (§4.6; contrast with §4.1's policy that
/// *different* suffixes mean different buildings — this table bridges
/// equivalent spellings of the *same* suffix, not distinct suffixes).
const TOWER_SUFFIX_BRIDGE: &[(&str, &str)] = &[
    ("東棟", "EAST"),
    ("西棟", "WEST"),
    ("南棟", "SOUTH"),
    ("北棟", "NORTH"),
    ("A棟", "TOWER A"),
    ("B棟", "TOWER B"),
];

fn expand_variants(name: &str) -> Vec<String> {
    let mut variants = HashSet::new();
    variants.insert(name.to_string());

    for (kana, latin) in BRIDGE_TERMS.iter().chain(TOWER_SUFFIX_BRIDGE.iter()) {
        if name.contains(kana) {
            variants.insert(name.replace(kana, latin));
        }
        if name.contains(latin) {
            variants.insert(name.replace(latin, kana));
        }
    }

    if name.starts_with("ザ・") {
        variants.insert(format!("THE {}", &name["ザ・".len()..]));
    }
    if let Some(rest) = name.strip_prefix("THE ") {
        variants.insert(format!("ザ・{rest}"));
    }
    if let Some(rest) = name.strip_prefix("THE") {
        variants.insert(format!("ザ・{rest}"));
    }

    variants.into_iter().collect()
}

/// `difflib.SequenceMatcher`-style ratio: `2*M / T` where `M` is the
/// length of the longest common subsequence and `T` the combined
/// length of both strings. A deterministic, rule-based approximation
/// appropriate for an auditable similarity engine (§1 Non-goals).
fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    2.0 * lcs as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn tokenize(name: &str) -> HashSet<String> {
    let ws_tokens: Vec<&str> = name.split_whitespace().collect();
    if ws_tokens.len() > 1 {
        return ws_tokens.into_iter().map(|s| s.to_string()).collect();
    }
    // No whitespace to split on (common for fused canonical names):
    // fall back to character bigrams.
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < 2 {
        return chars.into_iter().map(|c| c.to_string()).collect();
    }
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Maximum over the cartesian product of ratio and token-Jaccard
/// similarity across every expanded variant of each side (§4.6).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let variants_a = expand_variants(a);
    let variants_b = expand_variants(b);
    let mut best = 0.0_f64;
    for va in &variants_a {
        for vb in &variants_b {
            let ratio = sequence_ratio(va, vb);
            let jaccard = token_jaccard(va, vb);
            best = best.max(ratio).max(jaccard);
        }
    }
    best
}

// --- Address scoring ----------------------------------------------------

/// Decomposed address score (§4.6): prefecture/city-ward/town must
/// match for any partial credit; block numbers compared element-wise
/// with graded partial scoring; a chome mismatch on the same town
/// scores 0.3 rather than 0.
pub fn address_similarity(a: &str, b: &str) -> f64 {
    let ca = normalizer::decompose(a);
    let cb = normalizer::decompose(b);

    if ca.prefecture != cb.prefecture || ca.city_or_ward != cb.city_or_ward {
        return 0.0;
    }
    if ca.town != cb.town {
        return 0.0;
    }

    let blocks_a = ca.block_numbers();
    let blocks_b = cb.block_numbers();
    if blocks_a.is_empty() || blocks_b.is_empty() {
        return 0.7; // same town, no block number to compare further
    }

    if blocks_a[0] != blocks_b[0] {
        // Differing chome on the same town (§4.6).
        return 0.3;
    }

    let matched_after_chome = blocks_a
        .iter()
        .skip(1)
        .zip(blocks_b.iter().skip(1))
        .filter(|(x, y)| x == y)
        .count();
    let compared = (blocks_a.len() - 1).max(blocks_b.len() - 1).max(1);
    0.7 + 0.3 * (matched_after_chome as f64 / compared as f64)
}

// --- Attribute scoring ----------------------------------------------------

fn built_year_score(a: &Building, b: &Building) -> f64 {
    match (a.built_year, b.built_year) {
        (Some(ay), Some(by)) => {
            let diff = (ay - by).abs();
            let mut score = match diff {
                0 => 1.0,
                1 => 0.2,
                2 => 0.1,
                _ => 0.0,
            };
            if diff == 0 {
                if let (Some(am), Some(bm)) = (a.built_month, b.built_month) {
                    if am != bm {
                        score = 0.3;
                    }
                }
            }
            score
        }
        _ => 0.0,
    }
}

fn total_floors_score(a: &Building, b: &Building) -> f64 {
    match (a.total_floors, b.total_floors) {
        (Some(af), Some(bf)) => match (af - bf).abs() {
            0 => 1.0,
            1 => 0.5,
            2 => 0.3,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

fn total_units_score(a: &Building, b: &Building) -> f64 {
    match (a.total_units, b.total_units) {
        (Some(au), Some(bu)) => {
            if au == bu {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

pub fn attribute_similarity(a: &Building, b: &Building) -> f64 {
    (built_year_score(a, b) + total_floors_score(a, b) + total_units_score(a, b)) / 3.0
}

// --- Composite + override rules ----------------------------------------

/// Overall building similarity with the §4.6 override rules applied
/// on top of the weighted composite.
pub fn building_similarity(a: &Building, b: &Building) -> f64 {
    let name = name_similarity(&a.canonical_name, &b.canonical_name);
    let addr = address_similarity(&a.normalised_address, &b.normalised_address);
    let attrs = attribute_similarity(a, b);

    let mut score = NAME_WEIGHT * name + ADDRESS_WEIGHT * addr + ATTRIBUTE_WEIGHT * attrs;

    if addr >= 0.95 && attrs >= 0.9 {
        score = score.max(0.92);
    }
    if addr == 0.0 && name >= 0.9 && attrs >= 0.8 {
        score = score.max(0.85);
    }

    score.min(1.0)
}

// --- Transitive grouping -------------------------------------------------

/// A small explicit-array union-find over building ids (§9: "explicit
/// arrays of ids, not pointer graphs").
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// One candidate group of likely-duplicate buildings, with the chosen
/// primary and the average-similarity centroid used to pick it (§9:
/// "each connected component is emitted with its computed centroid
/// primary").
#[derive(Debug, Clone, Serialize)]
pub struct BuildingDuplicateGroup {
    pub primary_id: BuildingId,
    pub member_ids: Vec<BuildingId>,
    pub pairwise_scores: Vec<(BuildingId, BuildingId, f64)>,
}

fn excluded(exclusions: &[BuildingMergeExclusion], a: BuildingId, b: BuildingId) -> bool {
    exclusions.iter().any(|e| e.contains_pair(a, b))
}

/// Partition, score, and transitively group buildings into candidate
/// duplicate clusters (§4.6). `property_counts` supplies the tiebreak
/// for primary selection.
pub fn find_building_duplicates(
    buildings: &[Building],
    exclusions: &[BuildingMergeExclusion],
    property_counts: &HashMap<BuildingId, i64>,
    min_similarity: f64,
) -> Vec<BuildingDuplicateGroup> {
    let mut partitions: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, b) in buildings.iter().enumerate() {
        let prefix = normalizer::district_prefix(&b.normalised_address);
        partitions.entry(prefix).or_default().push(i);
    }

    let mut groups = Vec::new();

    for indices in partitions.values() {
        if indices.len() < 2 {
            continue;
        }

        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        for (x, &i) in indices.iter().enumerate() {
            for &j in &indices[x + 1..] {
                let score = building_similarity(&buildings[i], &buildings[j]);
                if score >= min_similarity && !excluded(exclusions, buildings[i].id, buildings[j].id) {
                    edges.push((i, j, score));
                }
            }
        }
        if edges.is_empty() {
            continue;
        }

        let local_index: HashMap<usize, usize> =
            indices.iter().enumerate().map(|(local, &global)| (global, local)).collect();
        let mut uf = UnionFind::new(indices.len());
        for &(i, j, _) in &edges {
            uf.union(local_index[&i], local_index[&j]);
        }

        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for &global in indices {
            let root = uf.find(local_index[&global]);
            components.entry(root).or_default().push(global);
        }

        for members in components.into_values() {
            if members.len() < 2 {
                continue;
            }
            groups.extend(split_and_build_groups(&members, &edges, local_index.clone(), buildings, property_counts));
        }
    }

    groups
}

/// A connected component may still contain an exclusion-broken edge
/// remnant after exclusions are applied upstream; this greedily splits
/// any component where some member pair is missing an edge, assigning
/// each building to at most one sub-group by walking edges from
/// highest similarity down (§4.6).
fn split_and_build_groups(
    members: &[usize],
    all_edges: &[(usize, usize, f64)],
    local_index: HashMap<usize, usize>,
    buildings: &[Building],
    property_counts: &HashMap<BuildingId, i64>,
) -> Vec<BuildingDuplicateGroup> {
    let member_set: HashSet<usize> = members.iter().copied().collect();
    let mut relevant: Vec<(usize, usize, f64)> = all_edges
        .iter()
        .filter(|(i, j, _)| member_set.contains(i) && member_set.contains(j))
        .cloned()
        .collect();
    relevant.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut assigned: HashMap<usize, usize> = HashMap::new(); // global idx -> sub-group id
    let mut next_group = 0usize;
    let mut sub_edges: HashMap<usize, Vec<(usize, usize, f64)>> = HashMap::new();

    for (i, j, score) in relevant {
        match (assigned.get(&i).copied(), assigned.get(&j).copied()) {
            (None, None) => {
                let gid = next_group;
                next_group += 1;
                assigned.insert(i, gid);
                assigned.insert(j, gid);
                sub_edges.entry(gid).or_default().push((i, j, score));
            }
            (Some(gi), None) => {
                assigned.insert(j, gi);
                sub_edges.entry(gi).or_default().push((i, j, score));
            }
            (None, Some(gj)) => {
                assigned.insert(i, gj);
                sub_edges.entry(gj).or_default().push((i, j, score));
            }
            (Some(gi), Some(gj)) if gi == gj => {
                sub_edges.entry(gi).or_default().push((i, j, score));
            }
            // Both already belong to different sub-groups: each
            // building enters at most one resulting sub-group (§4.6),
            // so this cross-group edge is dropped.
            _ => {}
        }
    }

    let _ = local_index;

    let mut by_group: HashMap<usize, Vec<usize>> = HashMap::new();
    for (&global, &gid) in &assigned {
        by_group.entry(gid).or_default().push(global);
    }

    by_group
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(gid, members)| {
            let edges = sub_edges.remove(&gid).unwrap_or_default();
            build_group(members, edges, buildings, property_counts)
        })
        .collect()
}

fn build_group(
    members: Vec<usize>,
    edges: Vec<(usize, usize, f64)>,
    buildings: &[Building],
    property_counts: &HashMap<BuildingId, i64>,
) -> BuildingDuplicateGroup {
    let mut avg_similarity: HashMap<usize, f64> = HashMap::new();
    for &m in &members {
        let scores: Vec<f64> = edges
            .iter()
            .filter_map(|(i, j, s)| {
                if *i == m {
                    Some(*s)
                } else if *j == m {
                    Some(*s)
                } else {
                    None
                }
            })
            .collect();
        let avg = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        avg_similarity.insert(m, avg);
    }

    let primary = *members
        .iter()
        .max_by(|&&a, &&b| {
            avg_similarity[&a]
                .partial_cmp(&avg_similarity[&b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let pa = property_counts.get(&buildings[a].id).copied().unwrap_or(0);
                    let pb = property_counts.get(&buildings[b].id).copied().unwrap_or(0);
                    pa.cmp(&pb)
                })
        })
        .unwrap();

    BuildingDuplicateGroup {
        primary_id: buildings[primary].id,
        member_ids: members.iter().map(|&i| buildings[i].id).collect(),
        pairwise_scores: edges
            .into_iter()
            .map(|(i, j, s)| (buildings[i].id, buildings[j].id, s))
            .collect(),
    }
}

// --- Property duplicates --------------------------------------------------

const COMPASS: &[&str] = &["北", "北東", "東", "南東", "南", "南西", "西", "北西"];

/// Adjacent or identical compass points are compatible; anything
/// further apart (e.g. 北 vs 南) is not (§4.6 "directional-equivalence
/// table"). Also used by `core::merge`'s move-with-merge decision.
pub(crate) fn directions_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) if a == b => true,
        (Some(a), Some(b)) => {
            let (Some(ia), Some(ib)) = (
                COMPASS.iter().position(|c| *c == a),
                COMPASS.iter().position(|c| *c == b),
            ) else {
                return false;
            };
            let n = COMPASS.len();
            let dist = (ia as i32 - ib as i32).rem_euclid(n as i32);
            dist == 1 || dist == (n as i32 - 1)
        }
    }
}

fn room_numbers_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// One group of structurally-duplicate master-properties within a
/// building (§4.6, glossary "Structural duplicate (property)").
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDuplicateGroup {
    pub member_ids: Vec<db::models::MasterPropertyId>,
}

/// Group a building's master-properties sharing `(floor_number,
/// round(area,1), normalised_layout)` with compatible direction and
/// non-conflicting room numbers (§4.6).
pub fn find_property_duplicates(properties: &[MasterProperty]) -> Vec<PropertyDuplicateGroup> {
    let mut buckets: HashMap<(i32, i64, String), Vec<usize>> = HashMap::new();
    for (i, p) in properties.iter().enumerate() {
        let (Some(floor), Some(area), Some(layout)) = (
            p.floor_number,
            p.area_m2.map(|a| {
                let f: f64 = a.to_string().parse().unwrap_or(0.0);
                (f * 10.0).round() as i64
            }),
            p.layout.clone(),
        ) else {
            continue;
        };
        buckets.entry((floor, area, layout)).or_default().push(i);
    }

    let mut groups = Vec::new();
    for indices in buckets.into_values() {
        if indices.len() < 2 {
            continue;
        }
        let mut uf = UnionFind::new(indices.len());
        for (x, &i) in indices.iter().enumerate() {
            for (y, &j) in indices.iter().enumerate().skip(x + 1) {
                let pi = &properties[i];
                let pj = &properties[j];
                if directions_compatible(pi.direction.as_deref(), pj.direction.as_deref())
                    && room_numbers_compatible(pi.room_number.as_deref(), pj.room_number.as_deref())
                {
                    uf.union(x, y);
                }
            }
        }
        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for (local, &global) in indices.iter().enumerate() {
            let root = uf.find(local);
            components.entry(root).or_default().push(global);
        }
        for members in components.into_values() {
            if members.len() >= 2 {
                groups.push(PropertyDuplicateGroup {
                    member_ids: members.iter().map(|&i| properties[i].id).collect(),
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn building(id: i64, name: &str, address: &str, floors: i32, year: i32, units: i32) -> Building {
        Building {
            id: BuildingId(id),
            canonical_name: name.to_string(),
            normalised_name: name.to_string(),
            address: address.to_string(),
            normalised_address: address.to_string(),
            built_year: Some(year),
            built_month: Some(4),
            total_floors: Some(floors),
            basement_floors: Some(1),
            total_units: Some(units),
            construction_type: Some("RC".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn identical_buildings_score_one() {
        let a = building(1, "パークコート赤坂", "東京都港区赤坂9-1-1", 20, 2015, 120);
        assert!((building_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn katakana_english_bridge_raises_name_similarity() {
        let score = name_similarity("パークコート", "PARKコート");
        assert!(score > 0.5, "expected bridged variants to score highly, got {score}");
    }

    #[test]
    fn chome_mismatch_scores_partial_not_zero() {
        let score = address_similarity("東京都港区芝浦4-10-1", "東京都港区芝浦5-10-1");
        assert!((score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn override_rule_forces_high_score_on_strong_address_and_attribute_match() {
        let a = building(1, "パークコート赤坂", "東京都港区赤坂9-1-1", 20, 2015, 120);
        let b = building(2, "全く違う名前タワー", "東京都港区赤坂9-1-1", 20, 2015, 120);
        assert!(building_similarity(&a, &b) >= 0.92);
    }

    #[test]
    fn exclusion_pair_is_never_grouped() {
        let a = building(1, "パークコート赤坂", "東京都港区赤坂9-1-1", 20, 2015, 120);
        let b = building(2, "パークコート赤坂", "東京都港区赤坂9-1-1", 20, 2015, 120);
        let exclusion = BuildingMergeExclusion {
            id: db::models::MergeExclusionId(1),
            low_building_id: BuildingId(1),
            high_building_id: BuildingId(2),
            reason: "confirmed distinct".into(),
            actor: "ops".into(),
            created_at: Utc::now(),
        };
        let groups = find_building_duplicates(&[a, b], &[exclusion], &HashMap::new(), 0.70);
        assert!(groups.is_empty());
    }

    #[test]
    fn directional_adjacency_is_compatible_but_opposite_is_not() {
        assert!(directions_compatible(Some("南"), Some("南東")));
        assert!(!directions_compatible(Some("北"), Some("南")));
    }
}
