//! Diamond price band resolver
//!
//! Finds the best price-per-carat band for a requested clarity/color/weight.
//! Matching is tiered: detail grades first, then (for stones under 0.30 ct)
//! the composite grade from the clarity-group map. Composite-graded bands
//! never match stones of 0.30 ct and above.

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{ClarityGroups, DiamondPriceEntry};

/// Weight below which composite clarity grading applies
pub const COMPOSITE_GRADE_CUTOFF_CT: f64 = 0.30;

/// Resolve the price per carat for one stone.
///
/// Never defaults to zero: a miss is a hard `diamond_price_missing` error so
/// the operator fixes the chart instead of shipping an underpriced quote.
pub fn resolve_price_per_ct(
    clarity: &str,
    color: &str,
    weight: f64,
    entries: &[DiamondPriceEntry],
    groups: &ClarityGroups,
) -> AppResult<f64> {
    let clarity = normalize(clarity);
    let color = normalize(color);

    let primary = expand_clarity(&clarity);
    let mut token_sets = vec![primary.clone()];

    if weight < COMPOSITE_GRADE_CUTOFF_CT {
        let mut composites: Vec<String> = Vec::new();
        for token in &primary {
            if let Some(composite) = groups.composite_for(token) {
                let composite = composite.to_uppercase();
                if !composites.contains(&composite) {
                    composites.push(composite);
                }
            }
        }
        if !composites.is_empty() {
            token_sets.push(composites);
        }
    }

    for token_set in &token_sets {
        if let Some(price) = best_match(token_set, &color, weight, entries, groups) {
            return Ok(price);
        }
    }

    Err(AppError::new(ErrorCode::DiamondPriceMissing)
        .with_detail("clarity", clarity)
        .with_detail("color", color)
        .with_detail("weight_ct", weight))
}

fn normalize(token: &str) -> String {
    token.trim().to_uppercase()
}

fn is_wildcard(token: &str) -> bool {
    token.is_empty() || token == "ANY" || token == "ALL"
}

/// Expand generic group labels into their detail grades. The generic VVS
/// label also falls back to its composite bucket.
fn expand_clarity(requested: &str) -> Vec<String> {
    let tokens: Vec<&str> = match requested {
        "VVS" => vec!["VVS1", "VVS2", "IF-VVS"],
        "VS" => vec!["VS1", "VS2"],
        "SI" => vec!["SI1", "SI2", "SI3"],
        "I" => vec!["I1", "I2", "I3"],
        other => vec![other],
    };
    tokens.into_iter().map(String::from).collect()
}

/// Fineness rank for tie-breaking: lower is finer.
fn clarity_rank(token: &str) -> i32 {
    match token {
        "FL" => 0,
        "IF" => 1,
        "IF-VVS" => 2,
        "VVS1" => 3,
        "VVS2" => 4,
        "VS1" => 5,
        "VS2" => 6,
        "SI1" => 7,
        "SI2" => 8,
        "SI3" => 9,
        "I1" => 10,
        "I2" => 11,
        "I3" => 12,
        _ => 99,
    }
}

/// Parse a color token into an inclusive letter range. Single letters are
/// degenerate ranges; "D-F" style spans cover multiple grades.
fn parse_color_range(token: &str) -> Option<(char, char)> {
    let token = token.trim();
    if token.len() == 1 {
        let c = token.chars().next()?;
        if c.is_ascii_alphabetic() {
            return Some((c, c));
        }
        return None;
    }
    let (start, end) = token.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.len() == 1 && end.len() == 1 {
        let (s, e) = (start.chars().next()?, end.chars().next()?);
        if s.is_ascii_alphabetic() && e.is_ascii_alphabetic() && s <= e {
            return Some((s, e));
        }
    }
    None
}

/// Whether an entry's color matches the requested color. Either side may be
/// a wildcard or an `A-D` style range; ranges match on overlap.
fn color_matches(requested: &str, entry_color: &str) -> bool {
    let entry_color = normalize(entry_color);
    if is_wildcard(requested) || is_wildcard(&entry_color) {
        return true;
    }
    if requested == entry_color {
        return true;
    }
    match (parse_color_range(requested), parse_color_range(&entry_color)) {
        (Some((req_start, req_end)), Some((ent_start, ent_end))) => {
            req_start <= ent_end && ent_start <= req_end
        }
        _ => false,
    }
}

struct Candidate<'a> {
    entry: &'a DiamondPriceEntry,
    specificity: u8,
    rank: i32,
    distance: f64,
}

/// Best band for one clarity token set, or None when nothing matches at all.
fn best_match(
    token_set: &[String],
    color: &str,
    weight: f64,
    entries: &[DiamondPriceEntry],
    groups: &ClarityGroups,
) -> Option<f64> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    for entry in entries {
        let entry_clarity = normalize(&entry.clarity);

        // Composite grading only applies to small stones
        if weight >= COMPOSITE_GRADE_CUTOFF_CT && groups.is_composite(&entry_clarity) {
            continue;
        }

        let clarity_ok = is_wildcard(&entry_clarity)
            || token_set.iter().any(|t| is_wildcard(t) || *t == entry_clarity);
        if !clarity_ok || !color_matches(color, &entry.color) {
            continue;
        }

        let mut specificity = 0u8;
        if !is_wildcard(&entry_clarity) {
            specificity += 2;
        }
        if !is_wildcard(&normalize(&entry.color)) {
            specificity += 1;
        }

        candidates.push(Candidate {
            entry,
            specificity,
            rank: clarity_rank(&entry_clarity),
            distance: entry.distance_to(weight),
        });
    }

    if candidates.is_empty() {
        return None;
    }

    let containing: Vec<&Candidate<'_>> =
        candidates.iter().filter(|c| c.distance == 0.0).collect();

    let pool: Vec<&Candidate<'_>> = if !containing.is_empty() {
        containing
    } else {
        // No band contains the weight: fall back to the nearest range
        let nearest = candidates
            .iter()
            .map(|c| c.distance)
            .fold(f64::INFINITY, f64::min);
        candidates
            .iter()
            .filter(|c| (c.distance - nearest).abs() < f64::EPSILON)
            .collect()
    };

    pool.into_iter()
        .max_by(|a, b| {
            a.specificity
                .cmp(&b.specificity)
                .then(b.rank.cmp(&a.rank))
                .then(
                    b.entry
                        .range_width()
                        .partial_cmp(&a.entry.range_width())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                // Conservative tie-break: the pricier band wins
                .then(
                    a.entry
                        .price_per_ct
                        .partial_cmp(&b.entry.price_per_ct)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        })
        .map(|c| c.entry.price_per_ct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn band(clarity: &str, color: &str, min: f64, max: Option<f64>, price: f64) -> DiamondPriceEntry {
        DiamondPriceEntry {
            clarity: clarity.to_string(),
            color: color.to_string(),
            weight_min: min,
            weight_max: max,
            price_per_ct: price,
            notes: None,
        }
    }

    fn vvs_groups() -> ClarityGroups {
        let mut map = HashMap::new();
        map.insert("IF".to_string(), "IF-VVS".to_string());
        map.insert("VVS1".to_string(), "IF-VVS".to_string());
        map.insert("VVS2".to_string(), "IF-VVS".to_string());
        ClarityGroups::new(map)
    }

    #[test]
    fn test_exact_match_in_range() {
        let entries = vec![
            band("VS1", "F", 0.3, Some(1.0), 4000.0),
            band("VS1", "F", 1.0, Some(2.0), 6000.0),
        ];
        let price =
            resolve_price_per_ct("VS1", "F", 0.5, &entries, &ClarityGroups::default()).unwrap();
        assert_eq!(price, 4000.0);
    }

    #[test]
    fn test_generic_label_expands() {
        let entries = vec![
            band("VS2", "F", 0.3, Some(1.0), 3500.0),
            band("SI1", "F", 0.3, Some(1.0), 2500.0),
        ];
        let price =
            resolve_price_per_ct("VS", "F", 0.5, &entries, &ClarityGroups::default()).unwrap();
        assert_eq!(price, 3500.0);
    }

    #[test]
    fn test_wildcard_entry_matches_but_loses_to_specific() {
        let entries = vec![
            band("ANY", "", 0.0, None, 1000.0),
            band("VS1", "F", 0.3, Some(1.0), 4000.0),
        ];
        let groups = ClarityGroups::default();
        assert_eq!(
            resolve_price_per_ct("VS1", "F", 0.5, &entries, &groups).unwrap(),
            4000.0
        );
        // Unknown grade still lands on the wildcard band
        assert_eq!(
            resolve_price_per_ct("SI2", "J", 0.5, &entries, &groups).unwrap(),
            1000.0
        );
    }

    #[test]
    fn test_small_stone_accepts_composite_as_secondary() {
        let entries = vec![band("IF-VVS", "D-F", 0.0, Some(0.29), 5000.0)];
        let price = resolve_price_per_ct("VVS1", "E", 0.1, &entries, &vvs_groups()).unwrap();
        assert_eq!(price, 5000.0);
    }

    #[test]
    fn test_small_stone_prefers_exact_detail_grade() {
        let entries = vec![
            band("IF-VVS", "D-F", 0.0, Some(0.29), 5000.0),
            band("VVS1", "E", 0.0, Some(0.29), 5600.0),
        ];
        let price = resolve_price_per_ct("VVS1", "E", 0.1, &entries, &vvs_groups()).unwrap();
        assert_eq!(price, 5600.0);
    }

    #[test]
    fn test_large_stone_never_uses_composite() {
        let entries = vec![band("IF-VVS", "D-F", 0.0, None, 5000.0)];
        let err =
            resolve_price_per_ct("VVS1", "E", 0.30, &entries, &vvs_groups()).unwrap_err();
        assert_eq!(err.code, ErrorCode::DiamondPriceMissing);

        // Just below the cutoff the same chart resolves
        assert!(resolve_price_per_ct("VVS1", "E", 0.299, &entries, &vvs_groups()).is_ok());
    }

    #[test]
    fn test_color_range_overlap() {
        let entries = vec![band("VS1", "D-F", 0.3, Some(1.0), 4200.0)];
        let groups = ClarityGroups::default();
        assert!(resolve_price_per_ct("VS1", "E", 0.5, &entries, &groups).is_ok());
        assert!(resolve_price_per_ct("VS1", "E-G", 0.5, &entries, &groups).is_ok());
        assert!(resolve_price_per_ct("VS1", "H", 0.5, &entries, &groups).is_err());
    }

    #[test]
    fn test_nearest_range_fallback() {
        let entries = vec![
            band("VS1", "F", 0.5, Some(1.0), 4000.0),
            band("VS1", "F", 2.0, Some(3.0), 7000.0),
        ];
        let groups = ClarityGroups::default();
        // 1.3 is 0.3 away from the first band, 0.7 from the second
        assert_eq!(
            resolve_price_per_ct("VS1", "F", 1.3, &entries, &groups).unwrap(),
            4000.0
        );
        assert_eq!(
            resolve_price_per_ct("VS1", "F", 1.8, &entries, &groups).unwrap(),
            7000.0
        );
    }

    #[test]
    fn test_narrower_range_wins_tie() {
        let entries = vec![
            band("VS1", "F", 0.0, Some(5.0), 3000.0),
            band("VS1", "F", 0.4, Some(0.6), 4500.0),
        ];
        let price =
            resolve_price_per_ct("VS1", "F", 0.5, &entries, &ClarityGroups::default()).unwrap();
        assert_eq!(price, 4500.0);
    }

    #[test]
    fn test_price_tie_break_is_conservative() {
        let entries = vec![
            band("VS1", "F", 0.3, Some(1.0), 4000.0),
            band("VS1", "F", 0.3, Some(1.0), 4100.0),
        ];
        let price =
            resolve_price_per_ct("VS1", "F", 0.5, &entries, &ClarityGroups::default()).unwrap();
        assert_eq!(price, 4100.0);
    }

    #[test]
    fn test_finer_grade_wins_tie() {
        // Generic VS request matches both; VS1 outranks VS2
        let entries = vec![
            band("VS2", "F", 0.3, Some(1.0), 3200.0),
            band("VS1", "F", 0.3, Some(1.0), 3600.0),
        ];
        let price =
            resolve_price_per_ct("VS", "F", 0.5, &entries, &ClarityGroups::default()).unwrap();
        assert_eq!(price, 3600.0);
    }

    #[test]
    fn test_miss_is_hard_error() {
        let err = resolve_price_per_ct("VS1", "F", 0.5, &[], &ClarityGroups::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DiamondPriceMissing);
        let details = err.details.unwrap();
        assert_eq!(details.get("clarity").unwrap(), "VS1");
    }
}
