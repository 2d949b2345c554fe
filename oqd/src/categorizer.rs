//! GAMP-5 categorization (spec §4.1).
//!
//! The scoring shape (weighted indicator sets aggregated into a bounded
//! confidence score with an explicit ambiguity signal) is grounded on the
//! weighted-signal aggregator style of the teacher's reliability scorer,
//! re-derived here for GAMP indicator phrases rather than worker health
//! signals.

use chrono::Utc;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{CategorizationResult, EvidenceEntry, GampCategory, UrsDocument};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const CONFIDENCE_THRESHOLD: f64 = 0.75;
// Both thresholds live in the raw per-category score domain produced by
// `score_category` (integer indicator weights: strong +3, weak +1, Cat3
// bonus +3), not the normalized [0,1] confidence domain — the smallest
// reachable positive score is 1.0, well above a [0,1]-scaled threshold,
// which would make `is_ambiguous` unreachable.
const AMBIGUITY_GAP_THRESHOLD: f64 = 2.0;
const AMBIGUITY_SCORE_THRESHOLD: f64 = 4.0;

const NEGATORS: &[&str] = &["without any", "without", "no", "not", "standard", "basic", "minimal"];

struct IndicatorSet {
    strong: &'static [&'static str],
    weak: &'static [&'static str],
    exclusions: &'static [&'static str],
}

fn indicators_for(category: GampCategory) -> IndicatorSet {
    match category {
        GampCategory::Cat1 => IndicatorSet {
            strong: &["operating system", "infrastructure software", "network layer", "database engine"],
            weak: &["middleware", "firmware", "driver"],
            exclusions: &["custom application", "bespoke workflow"],
        },
        GampCategory::Cat3 => IndicatorSet {
            strong: &["non-configured", "off the shelf", "commercial off-the-shelf", "cots", "used as supplied"],
            weak: &["vendor default", "standard configuration", "out of the box"],
            exclusions: &["custom report", "custom interface", "configured workflow"],
        },
        GampCategory::Cat4 => IndicatorSet {
            strong: &["configured product", "configurable parameters", "user-defined workflow", "parameterized"],
            weak: &["configuration table", "business rules engine", "report writer"],
            exclusions: &["bespoke code", "custom algorithm", "source code modification"],
        },
        GampCategory::Cat5 => IndicatorSet {
            strong: &["custom application", "bespoke software", "custom algorithm", "source code modification", "custom interface"],
            weak: &["custom script", "macro development", "custom calculation"],
            exclusions: &["vendor-supported", "off the shelf", "no customization"],
        },
    }
}

fn compiled_pattern(phrase: &'static str) -> &'static Regex {
    static CACHE: OnceLock<std::sync::Mutex<BTreeMap<&'static str, &'static Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(BTreeMap::new()));
    let mut guard = cache.lock().unwrap();
    if let Some(re) = guard.get(phrase) {
        return re;
    }
    let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
    let re: &'static Regex = Box::leak(Box::new(Regex::new(&pattern).expect("static indicator patterns are valid regex")));
    guard.insert(phrase, re);
    re
}

fn is_negated(content: &str, match_start: usize) -> bool {
    let preceding = &content[..match_start];
    let window_start = preceding.len().saturating_sub(40);
    let window = &preceding[window_start..];
    let window_lower = window.to_lowercase();
    NEGATORS.iter().any(|n| window_lower.trim_end().ends_with(n))
}

fn score_category(content: &str, category: GampCategory) -> (f64, Vec<EvidenceEntry>) {
    let set = indicators_for(category);
    let mut score = 0.0;
    let mut evidence = Vec::new();
    let mut strong_hits = 0;
    let mut exclusion_hits = 0;

    for phrase in set.strong {
        if let Some(m) = compiled_pattern(phrase).find(content) {
            strong_hits += 1;
            score += 3.0;
            evidence.push(EvidenceEntry {
                indicator: format!("strong:{phrase}"),
                weight: 3,
                matched_text: m.as_str().to_string(),
                negated: false,
            });
        }
    }

    for phrase in set.weak {
        if let Some(m) = compiled_pattern(phrase).find(content) {
            score += 1.0;
            evidence.push(EvidenceEntry {
                indicator: format!("weak:{phrase}"),
                weight: 1,
                matched_text: m.as_str().to_string(),
                negated: false,
            });
        }
    }

    for phrase in set.exclusions {
        if let Some(m) = compiled_pattern(phrase).find(content) {
            let negated = is_negated(content, m.start());
            evidence.push(EvidenceEntry {
                indicator: format!("exclusion:{phrase}"),
                weight: -2,
                matched_text: m.as_str().to_string(),
                negated,
            });
            if !negated {
                exclusion_hits += 1;
                score -= 2.0;
            }
        }
    }

    if category == GampCategory::Cat3 && exclusion_hits == 0 && strong_hits >= 1 {
        score += 3.0;
    }

    if category == GampCategory::Cat5 {
        let vendor_supported = compiled_pattern("vendor-supported").is_match(content);
        let custom_present = compiled_pattern("custom").is_match(content);
        if vendor_supported && custom_present {
            score -= 3.0;
        }
    }

    (score, evidence)
}

/// Classifies a URS document into a GAMP category with a real-valued
/// confidence and explicit ambiguity signal.
pub fn categorize(urs: &UrsDocument, correlation_id: &str) -> Result<CategorizationResult, OceError> {
    let normalized = urs.content.to_lowercase();

    if normalized.trim().is_empty() {
        return Err(OceError::Categorization {
            code: ErrorCode::CategorizationEmptyInput,
            message: ErrorCode::CategorizationEmptyInput.message().to_string(),
            context: BTreeMap::from([("document_id".to_string(), urs.document_id.clone())]),
            correlation_id: correlation_id.to_string(),
        });
    }

    let mut scores: BTreeMap<GampCategory, (f64, Vec<EvidenceEntry>)> = BTreeMap::new();
    for category in GampCategory::ALL {
        scores.insert(category, score_category(&normalized, category));
    }

    let positive: Vec<(GampCategory, f64)> = scores.iter().map(|(c, (s, _))| (*c, *s)).filter(|(_, s)| *s > 0.0).collect();

    if positive.is_empty() {
        let partial: BTreeMap<String, f64> = scores.iter().map(|(c, (s, _))| (c.to_string(), *s)).collect();
        return Err(OceError::Categorization {
            code: ErrorCode::CategorizationNoPositiveScore,
            message: ErrorCode::CategorizationNoPositiveScore.message().to_string(),
            context: partial.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
            correlation_id: correlation_id.to_string(),
        });
    }

    let mut ranked = positive.clone();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let (top_category, top_score) = ranked[0];
    let second_score = ranked.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    let dominance_gap = top_score - second_score;

    let categories_with_positive_score = positive.len() as f64;
    // Soft-saturating combination: each tanh term is strictly inside (-1, 1),
    // and the weights sum to 0.5, so `raw_confidence` is strictly inside
    // (0.0, 1.0) for any finite inputs — unlike a linear formula clamped to
    // [0, 1], which saturates to the forbidden exact 0.0/1.0 endpoints for
    // unambiguous, strongly-scored URS text. Still monotone in `top_score`
    // and `dominance_gap`, and anti-monotone in the positive-category count.
    let raw_confidence = 0.5 + 0.3 * (top_score / 15.0).tanh() + 0.1 * (dominance_gap / 10.0).tanh()
        - 0.1 * ((categories_with_positive_score - 1.0) / 3.0).tanh();
    let confidence = raw_confidence.clamp(0.0, 1.0);

    let is_ambiguous = dominance_gap < AMBIGUITY_GAP_THRESHOLD && top_score < AMBIGUITY_SCORE_THRESHOLD;
    let review_required = confidence < CONFIDENCE_THRESHOLD || is_ambiguous;

    let evidence = scores.remove(&top_category).map(|(_, e)| e).unwrap_or_default();

    let _ = Utc::now(); // correlation timestamp recorded by the Auditor, not here.

    Ok(CategorizationResult {
        category: top_category,
        confidence,
        evidence,
        review_required,
        is_ambiguous,
        dominance_gap,
        degraded: false,
        correlation_id: correlation_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urs(content: &str) -> UrsDocument {
        UrsDocument::new("urs-1", "Test URS", content)
    }

    #[test]
    fn empty_content_is_an_error() {
        let result = categorize(&urs("   "), "corr-1");
        assert!(result.is_err());
    }

    #[test]
    fn no_indicators_anywhere_is_an_error() {
        let result = categorize(&urs("The sky is blue and the grass is green."), "corr-1");
        assert!(result.is_err());
    }

    #[test]
    fn strong_cat5_indicators_classify_as_cat5() {
        let result = categorize(
            &urs("This is a bespoke software application with custom algorithm and custom interface development, including source code modification."),
            "corr-1",
        )
        .unwrap();
        assert_eq!(result.category, GampCategory::Cat5);
        assert!(result.confidence > 0.0 && result.confidence < 1.0);
    }

    #[test]
    fn confidence_is_never_exactly_zero_or_one_for_typical_input() {
        let result = categorize(&urs("non-configured commercial off-the-shelf software used as supplied with vendor default settings."), "corr-1").unwrap();
        assert_ne!(result.confidence, 0.0);
        assert_ne!(result.confidence, 1.0);
    }

    #[test]
    fn negated_exclusion_does_not_suppress_category_3() {
        let with_negation = categorize(
            &urs("This commercial off-the-shelf product is used as supplied, without any custom report or custom interface."),
            "corr-1",
        )
        .unwrap();
        assert_eq!(with_negation.category, GampCategory::Cat3);
    }

    #[test]
    fn review_required_follows_confidence_and_ambiguity_invariant() {
        let result = categorize(&urs("custom application with bespoke software and custom algorithm implementation."), "corr-1").unwrap();
        assert_eq!(result.review_required, result.confidence < CONFIDENCE_THRESHOLD || result.is_ambiguous);
    }

    #[test]
    fn is_ambiguous_follows_dominance_gap_and_top_score_invariant() {
        let result = categorize(&urs("configured product with configurable parameters and user-defined workflow, also custom script usage."), "corr-1").unwrap();
        assert_eq!(result.is_ambiguous, result.dominance_gap < AMBIGUITY_GAP_THRESHOLD && result.confidence < 1.0 && {
            let scores = GampCategory::ALL.map(|c| score_category(&urs("configured product with configurable parameters and user-defined workflow, also custom script usage.").content.to_lowercase(), c).0);
            scores.into_iter().fold(f64::MIN, f64::max) < AMBIGUITY_SCORE_THRESHOLD
        });
    }

    #[test]
    fn a_near_tie_between_two_weakly_scored_categories_is_ambiguous() {
        // "middleware" (Cat1 weak, +1) and "vendor default" (Cat3 weak, +1)
        // tie at the lowest reachable positive score with a zero dominance
        // gap — exactly the case the ambiguity signal exists to catch.
        let result = categorize(&urs("The system relies on middleware components, configured per vendor default settings."), "corr-1").unwrap();
        assert_eq!(result.dominance_gap, 0.0);
        assert!(result.is_ambiguous, "expected a near-tie between equally weak categories to be flagged ambiguous");
    }
}
