//! Confidence scoring
//!
//! Scores a fused floor plan in six categories, combines them with fixed
//! weights into an overall score and maps that score to a reliability level.
//! Rule failures and validation findings become issues and recommendations.

pub mod categories;
pub mod rules;

pub use categories::{CategoryScore, ScoringInput};
pub use rules::{RuleContext, RuleOutcome, ValidationRule, RULES};

use crate::config::ScoringConfig;
use crate::fusion::FusedResult;
use crate::types::DetectorResult;
use crate::validation::{Severity, ValidationIssue, ValidationReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Reliability level derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    High,
    Medium,
    Low,
    Unreliable,
}

/// Scores for each category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub ocr: CategoryScore,
    pub vision: CategoryScore,
    pub object_detection: CategoryScore,
    pub geometry: CategoryScore,
    pub semantics: CategoryScore,
    pub cross_validation: CategoryScore,
}

impl CategoryScores {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &CategoryScore)> {
        [
            ("ocr", &self.ocr),
            ("vision", &self.vision),
            ("object_detection", &self.object_detection),
            ("geometry", &self.geometry),
            ("semantics", &self.semantics),
            ("cross_validation", &self.cross_validation),
        ]
        .into_iter()
    }
}

/// What raised a confidence issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueOrigin {
    Rule,
    Validation,
}

/// One ranked finding in a confidence report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceIssue {
    pub severity: Severity,
    pub origin: IssueOrigin,
    /// Rule name or validation code
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub message: String,
}

impl ConfidenceIssue {
    fn from_rule(outcome: &RuleOutcome, score: f64, severity: Severity) -> Self {
        Self {
            severity,
            origin: IssueOrigin::Rule,
            code: outcome.name.clone(),
            entity_id: None,
            message: format!("rule {} scored {:.0}%", outcome.name, score * 100.0),
        }
    }
}

impl From<&ValidationIssue> for ConfidenceIssue {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            severity: issue.severity,
            origin: IssueOrigin::Validation,
            code: issue.code.clone(),
            entity_id: issue.entity_id.clone(),
            message: issue.message.clone(),
        }
    }
}

/// Scoring output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall_score: f64,
    pub reliability: Reliability,
    pub categories: CategoryScores,
    pub rules: Vec<RuleOutcome>,
    /// Most severe first; rule issues precede validation issues of equal severity
    pub issues: Vec<ConfidenceIssue>,
    pub recommendations: Vec<String>,
}

impl ConfidenceReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn critical_issues(&self) -> impl Iterator<Item = &ConfidenceIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Critical)
    }

    /// Compact JSON summary for logs and CLI output
    pub fn summary_json(&self) -> serde_json::Value {
        let categories: serde_json::Map<String, serde_json::Value> = self
            .categories
            .iter()
            .map(|(name, c)| (name.to_string(), json!((c.score * 1000.0).round() / 1000.0)))
            .collect();
        json!({
            "overall_score": (self.overall_score * 1000.0).round() / 1000.0,
            "reliability": self.reliability,
            "categories": categories,
            "critical_issues": self.count(Severity::Critical),
            "warnings": self.count(Severity::Warning),
            "recommendations": self.recommendations,
        })
    }

    /// One-line human readable summary
    pub fn summary_message(&self) -> String {
        format!(
            "Confidence {:.1}% ({:?}): {} critical issues, {} warnings",
            self.overall_score * 100.0,
            self.reliability,
            self.count(Severity::Critical),
            self.count(Severity::Warning)
        )
    }
}

/// Computes the confidence report for a fused result
pub struct ConfidenceScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> ConfidenceScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    pub fn reliability(&self, score: f64) -> Reliability {
        if score >= self.config.high_threshold {
            Reliability::High
        } else if score >= self.config.medium_threshold {
            Reliability::Medium
        } else if score >= self.config.low_threshold {
            Reliability::Low
        } else {
            Reliability::Unreliable
        }
    }

    /// Score a fused result
    ///
    /// # Arguments
    /// * `result` - Fused result after conflict resolution and validation
    /// * `validation` - Report produced by the geometric validator
    /// * `sources` - Normalized detector results that took part in the run
    pub fn score(
        &self,
        result: &FusedResult,
        validation: &ValidationReport,
        sources: &[DetectorResult],
    ) -> ConfidenceReport {
        let rules = rules::evaluate_rules(&RuleContext {
            result,
            validation,
            config: self.config,
        });

        let input = ScoringInput {
            result,
            validation,
            sources,
            rules: &rules,
            absent_score: self.config.absent_category_score,
        };
        let categories = CategoryScores {
            ocr: categories::ocr(&input),
            vision: categories::vision(&input),
            object_detection: categories::object_detection(&input),
            geometry: categories::geometry(&input),
            semantics: categories::semantics(&input),
            cross_validation: categories::cross_validation(&input),
        };

        let w = &self.config.category_weights;
        let overall_score = (categories.ocr.score * w.ocr
            + categories.vision.score * w.vision
            + categories.object_detection.score * w.object_detection
            + categories.geometry.score * w.geometry
            + categories.semantics.score * w.semantics
            + categories.cross_validation.score * w.cross_validation)
            .clamp(0.0, 1.0);

        let mut issues = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();
        let mut recommend = |text: &str| {
            if !recommendations.iter().any(|r| r == text) {
                recommendations.push(text.to_string());
            }
        };

        for outcome in &rules {
            let Some(score) = outcome.score else { continue };
            let Some(rule) = rules::rule(&outcome.name) else { continue };
            if score < self.config.critical_rule_threshold {
                let severity = if outcome.critical {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                issues.push(ConfidenceIssue::from_rule(outcome, score, severity));
            }
            if score < 1.0 {
                recommend(rule.recommendation);
            }
        }

        issues.extend(validation.issues.iter().map(ConfidenceIssue::from));
        issues.sort_by_key(|i| i.severity);

        for (name, category) in categories.iter() {
            if category.applicable() && category.score < self.config.medium_threshold {
                recommend(category_recommendation(name));
            }
        }

        let reliability = self.reliability(overall_score);
        if reliability == Reliability::Unreliable {
            recommend("Treat this plan as unreliable and request manual review");
        }

        let report = ConfidenceReport {
            overall_score,
            reliability,
            categories,
            rules,
            issues,
            recommendations,
        };
        info!("{}", report.summary_message());
        report
    }
}

fn category_recommendation(category: &str) -> &'static str {
    match category {
        "ocr" => "Improve text recognition: higher resolution input or a stronger OCR source",
        "vision" => "Add or improve a vision source for walls and room outlines",
        "object_detection" => "Add or improve an object detector for doors and windows",
        "geometry" => "Review room geometry and dimension readings",
        "semantics" => "Review room labels and door connectivity",
        _ => "Add more independent sources to improve cross-validation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimensionItem, Point2D};
    use crate::units::{Length, LengthUnit};
    use crate::validation::fixtures::{empty_result, entity};

    fn validation_issue(severity: Severity, code: &str) -> ValidationIssue {
        ValidationIssue::new(severity, code, Some("e1"), format!("{} found", code))
    }

    #[test]
    fn test_issues_ranked_critical_first() {
        // Arrange: a 900 m dimension fails the critical range rule
        let config = ScoringConfig::default();
        let mut result = empty_result();
        let mut dimension = DimensionItem::new("900 m", Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0), 0.9);
        dimension.length = Some(Length::new(900.0, LengthUnit::Meter));
        result.dimensions.push(entity("d1", dimension, 0.9));

        let validation = ValidationReport {
            issues: vec![
                validation_issue(Severity::Warning, "room_disconnected"),
                validation_issue(Severity::Info, "note"),
                validation_issue(Severity::Critical, "room_polygon_open"),
            ],
            ..Default::default()
        };

        // Act
        let report = ConfidenceScorer::new(&config).score(&result, &validation, &[]);

        // Assert
        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["dimension_range", "room_polygon_open", "room_disconnected", "note"]
        );
        assert_eq!(report.issues[0].origin, IssueOrigin::Rule);
        assert_eq!(report.issues[1].origin, IssueOrigin::Validation);
        assert_eq!(report.issues[1].entity_id.as_deref(), Some("e1"));
        assert_eq!(report.count(Severity::Critical), 2);
        assert_eq!(report.summary_json()["critical_issues"], 2);
    }

    #[test]
    fn test_plausible_dimensions_raise_no_rule_issue() {
        let config = ScoringConfig::default();
        let mut result = empty_result();
        let mut dimension = DimensionItem::new("4 m", Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0), 0.9);
        dimension.length = Some(Length::new(4.0, LengthUnit::Meter));
        result.dimensions.push(entity("d1", dimension, 0.9));

        let report = ConfidenceScorer::new(&config).score(&result, &ValidationReport::default(), &[]);

        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_reliability_thresholds() {
        let config = ScoringConfig::default();
        let scorer = ConfidenceScorer::new(&config);
        assert_eq!(scorer.reliability(0.90), Reliability::High);
        assert_eq!(scorer.reliability(0.85), Reliability::High);
        assert_eq!(scorer.reliability(0.75), Reliability::Medium);
        assert_eq!(scorer.reliability(0.55), Reliability::Low);
        assert_eq!(scorer.reliability(0.2), Reliability::Unreliable);
    }
}
