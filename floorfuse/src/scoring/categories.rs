//! Category scores
//!
//! Each category is the mean of its applicable sub-metrics. A category with
//! no applicable sub-metric (for example OCR when no OCR source ran) takes
//! the configured absent score instead of zero.

use super::rules::{compliance, outcome_score, RuleOutcome};
use crate::conflicts::{ConflictKind, ResolutionStatus};
use crate::fusion::FusedResult;
use crate::types::{DetectorResult, Modality};
use crate::validation::ValidationReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score for one category with the sub-metrics behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    /// Sub-metric values; None marks a metric that did not apply
    pub sub_metrics: BTreeMap<String, Option<f64>>,
}

impl CategoryScore {
    fn from_metrics(metrics: Vec<(&str, Option<f64>)>, absent_score: f64) -> Self {
        let applicable: Vec<f64> = metrics.iter().filter_map(|(_, v)| *v).collect();
        let score = if applicable.is_empty() {
            absent_score
        } else {
            applicable.iter().sum::<f64>() / applicable.len() as f64
        };
        Self {
            score: score.clamp(0.0, 1.0),
            sub_metrics: metrics
                .into_iter()
                .map(|(name, v)| (name.to_string(), v))
                .collect(),
        }
    }

    pub fn applicable(&self) -> bool {
        self.sub_metrics.values().any(|v| v.is_some())
    }
}

/// Everything the category functions read
pub struct ScoringInput<'a> {
    pub result: &'a FusedResult,
    pub validation: &'a ValidationReport,
    pub sources: &'a [DetectorResult],
    pub rules: &'a [RuleOutcome],
    pub absent_score: f64,
}

impl<'a> ScoringInput<'a> {
    fn sources_of(&self, modalities: &[Modality]) -> Vec<&DetectorResult> {
        self.sources
            .iter()
            .filter(|s| modalities.contains(&s.modality))
            .collect()
    }

    fn rule(&self, name: &str) -> Option<f64> {
        outcome_score(self.rules, name)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn source_confidence(sources: &[&DetectorResult]) -> Option<f64> {
    mean(sources.iter().map(|s| s.confidence))
}

/// Mean fused confidence of entities these sources contributed to; zero when
/// the sources ran but contributed nothing
fn detection_support(result: &FusedResult, sources: &[&DetectorResult]) -> Option<f64> {
    if sources.is_empty() {
        return None;
    }
    let contributed = |provenance: &Vec<String>| sources.iter().any(|s| provenance.contains(&s.source));
    let confidences = result
        .rooms
        .iter()
        .filter(|e| contributed(&e.provenance))
        .map(|e| e.confidence)
        .chain(result.walls.iter().filter(|e| contributed(&e.provenance)).map(|e| e.confidence))
        .chain(result.doors.iter().filter(|e| contributed(&e.provenance)).map(|e| e.confidence))
        .chain(result.windows.iter().filter(|e| contributed(&e.provenance)).map(|e| e.confidence))
        .chain(
            result
                .dimensions
                .iter()
                .filter(|e| contributed(&e.provenance))
                .map(|e| e.confidence),
        );
    Some(mean(confidences).unwrap_or(0.0))
}

pub fn ocr(input: &ScoringInput) -> CategoryScore {
    let sources = input.sources_of(&[Modality::Ocr, Modality::Hybrid]);

    // Labelled rooms read by text sources that map onto a known type
    let labelled: Vec<bool> = sources
        .iter()
        .flat_map(|s| s.rooms())
        .filter(|r| r.label.is_some())
        .map(|r| r.room_type.is_identified())
        .collect();
    let label_recognition = mean(labelled.iter().map(|ok| if *ok { 1.0 } else { 0.0 }));

    CategoryScore::from_metrics(
        vec![
            ("source_confidence", source_confidence(&sources)),
            ("dimension_format", input.rule("dimension_format")),
            ("label_recognition", label_recognition),
        ],
        input.absent_score,
    )
}

pub fn vision(input: &ScoringInput) -> CategoryScore {
    let sources = input.sources_of(&[Modality::Vision, Modality::Generative, Modality::Hybrid]);
    CategoryScore::from_metrics(
        vec![
            ("source_confidence", source_confidence(&sources)),
            ("detection_support", detection_support(input.result, &sources)),
            ("wall_connectivity", input.rule("wall_connectivity")),
        ],
        input.absent_score,
    )
}

pub fn object_detection(input: &ScoringInput) -> CategoryScore {
    let sources = input.sources_of(&[Modality::ObjectDetection, Modality::Hybrid]);
    CategoryScore::from_metrics(
        vec![
            ("source_confidence", source_confidence(&sources)),
            ("detection_support", detection_support(input.result, &sources)),
            ("opening_placement", input.rule("opening_placement")),
        ],
        input.absent_score,
    )
}

pub fn geometry(input: &ScoringInput) -> CategoryScore {
    let dimension_conflicts = input
        .result
        .metadata
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::Dimension)
        .count();
    let range = input.rule("dimension_range");
    let dimension_consistency = if range.is_none() && dimension_conflicts == 0 {
        None
    } else {
        let denom = input.result.dimensions.len().max(dimension_conflicts).max(1) as f64;
        Some((range.unwrap_or(1.0) * (1.0 - dimension_conflicts as f64 / denom)).clamp(0.0, 1.0))
    };

    let area_accuracy = mean(input.result.rooms.iter().filter_map(|r| r.agreement));

    CategoryScore::from_metrics(
        vec![
            ("room_polygon_closure", input.rule("room_polygon_closure")),
            ("dimension_consistency", dimension_consistency),
            ("area_accuracy", area_accuracy),
        ],
        input.absent_score,
    )
}

pub fn semantics(input: &ScoringInput) -> CategoryScore {
    let type_recognition = mean(input.result.rooms.iter().map(|r| {
        if r.item.room_type.is_identified() {
            r.confidence
        } else {
            0.0
        }
    }));

    CategoryScore::from_metrics(
        vec![
            ("type_recognition", type_recognition),
            ("layout_coherence", input.rule("layout_coherence")),
            ("room_connectivity", input.validation.metrics.room_connectivity),
        ],
        input.absent_score,
    )
}

pub fn cross_validation(input: &ScoringInput) -> CategoryScore {
    let metadata = &input.result.metadata;
    let consensus = (input.result.entity_count() > 0).then_some(metadata.consensus_level);

    let penalty: f64 = metadata
        .conflicts
        .iter()
        .map(|c| match c.status {
            ResolutionStatus::Resolved => 0.25,
            ResolutionStatus::Degraded => 0.5,
            ResolutionStatus::PendingReview => 1.0,
        })
        .sum();
    let conflict_free = 1.0 / (1.0 + penalty);

    CategoryScore::from_metrics(
        vec![
            ("consensus_level", consensus),
            ("conflict_free", Some(conflict_free)),
            ("rule_compliance", compliance(input.rules)),
        ],
        input.absent_score,
    )
}
