//! Validation rule library
//!
//! Rules are data: a name, a weight, a criticality flag, an evaluation
//! function and a recommendation shown when the rule scores poorly. Each
//! evaluation returns `None` when the rule does not apply to the plan.

use crate::config::ScoringConfig;
use crate::fusion::FusedResult;
use crate::validation::ValidationReport;
use serde::{Deserialize, Serialize};

/// Inputs available to rule evaluation
pub struct RuleContext<'a> {
    pub result: &'a FusedResult,
    pub validation: &'a ValidationReport,
    pub config: &'a ScoringConfig,
}

/// One validation rule
pub struct ValidationRule {
    pub name: &'static str,
    pub weight: f64,
    pub critical: bool,
    pub evaluate: fn(&RuleContext) -> Option<f64>,
    pub recommendation: &'static str,
}

/// Result of evaluating one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub name: String,
    pub weight: f64,
    pub critical: bool,
    /// None when the rule does not apply
    pub score: Option<f64>,
}

pub const RULES: &[ValidationRule] = &[
    ValidationRule {
        name: "dimension_format",
        weight: 0.8,
        critical: false,
        evaluate: dimension_format,
        recommendation: "Re-run OCR on dimension strings; some could not be parsed",
    },
    ValidationRule {
        name: "dimension_range",
        weight: 0.9,
        critical: true,
        evaluate: dimension_range,
        recommendation: "Review dimensions outside the plausible building range",
    },
    ValidationRule {
        name: "room_polygon_closure",
        weight: 1.0,
        critical: true,
        evaluate: room_polygon_closure,
        recommendation: "Re-detect room boundaries; open polygons were excluded",
    },
    ValidationRule {
        name: "wall_connectivity",
        weight: 0.9,
        critical: false,
        evaluate: wall_connectivity,
        recommendation: "Check wall detection for gaps between wall segments",
    },
    ValidationRule {
        name: "opening_placement",
        weight: 0.8,
        critical: false,
        evaluate: opening_placement,
        recommendation: "Verify doors and windows that are not located on a wall",
    },
    ValidationRule {
        name: "layout_coherence",
        weight: 0.6,
        critical: false,
        evaluate: layout_coherence,
        recommendation: "Resolve overlapping or duplicated rooms",
    },
];

/// Evaluate every rule in the library
pub fn evaluate_rules(ctx: &RuleContext) -> Vec<RuleOutcome> {
    RULES
        .iter()
        .map(|rule| RuleOutcome {
            name: rule.name.to_string(),
            weight: rule.weight,
            critical: rule.critical,
            score: (rule.evaluate)(ctx).map(|s| s.clamp(0.0, 1.0)),
        })
        .collect()
}

/// Look up a rule by name
pub fn rule(name: &str) -> Option<&'static ValidationRule> {
    RULES.iter().find(|r| r.name == name)
}

/// Score of a named rule in a set of outcomes
pub fn outcome_score(outcomes: &[RuleOutcome], name: &str) -> Option<f64> {
    outcomes.iter().find(|o| o.name == name).and_then(|o| o.score)
}

/// Weighted mean over applicable rules
pub fn compliance(outcomes: &[RuleOutcome]) -> Option<f64> {
    let (sum, weight) = outcomes
        .iter()
        .filter_map(|o| o.score.map(|s| (s * o.weight, o.weight)))
        .fold((0.0, 0.0), |(s, w), (ds, dw)| (s + ds, w + dw));
    (weight > 0.0).then(|| sum / weight)
}

fn dimension_format(ctx: &RuleContext) -> Option<f64> {
    let dims = &ctx.result.dimensions;
    if dims.is_empty() {
        return None;
    }
    let parsed = dims.iter().filter(|d| d.item.length.is_some()).count();
    Some(parsed as f64 / dims.len() as f64)
}

fn dimension_range(ctx: &RuleContext) -> Option<f64> {
    let lengths: Vec<f64> = ctx
        .result
        .dimensions
        .iter()
        .filter_map(|d| d.item.length.map(|l| l.to_meters()))
        .collect();
    if lengths.is_empty() {
        return None;
    }
    let plausible = lengths
        .iter()
        .filter(|m| (ctx.config.dimension_min_m..=ctx.config.dimension_max_m).contains(*m))
        .count();
    Some(plausible as f64 / lengths.len() as f64)
}

fn room_polygon_closure(ctx: &RuleContext) -> Option<f64> {
    ctx.validation.metrics.closure_rate
}

fn wall_connectivity(ctx: &RuleContext) -> Option<f64> {
    ctx.validation.metrics.wall_connectivity
}

fn opening_placement(ctx: &RuleContext) -> Option<f64> {
    ctx.validation.metrics.opening_placement
}

fn layout_coherence(ctx: &RuleContext) -> Option<f64> {
    ctx.validation.metrics.layout_coherence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, weight: f64, score: Option<f64>) -> RuleOutcome {
        RuleOutcome {
            name: name.to_string(),
            weight,
            critical: false,
            score,
        }
    }

    #[test]
    fn test_compliance_skips_inapplicable_rules() {
        let outcomes = vec![
            outcome("a", 1.0, Some(1.0)),
            outcome("b", 0.5, Some(0.4)),
            outcome("c", 0.8, None),
        ];
        let value = compliance(&outcomes).unwrap();
        assert!((value - (1.0 + 0.2) / 1.5).abs() < 1e-12);
        assert!(compliance(&[outcome("c", 1.0, None)]).is_none());
    }

    #[test]
    fn test_rule_names_are_unique() {
        for (i, a) in RULES.iter().enumerate() {
            for b in &RULES[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
        assert!(rule("room_polygon_closure").unwrap().critical);
    }

    #[test]
    fn test_rule_weights_and_criticality() {
        let expected = [
            ("dimension_format", 0.8, false),
            ("dimension_range", 0.9, true),
            ("room_polygon_closure", 1.0, true),
            ("wall_connectivity", 0.9, false),
            ("opening_placement", 0.8, false),
            ("layout_coherence", 0.6, false),
        ];

        assert_eq!(RULES.len(), expected.len());
        for (name, weight, critical) in expected {
            let rule = rule(name).unwrap();
            assert_eq!(rule.weight, weight, "weight of {}", name);
            assert_eq!(rule.critical, critical, "criticality of {}", name);
        }
    }
}
