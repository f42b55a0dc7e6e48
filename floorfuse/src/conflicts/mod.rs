//! Conflict detection and resolution
//!
//! Three disagreement kinds are detected across sources: room counts, room
//! types at the same location, and dimension readings for the same extent.
//! Each detected conflict is settled by the configured policy and recorded
//! in the fused result's metadata.

pub mod arbiter;
pub mod detector;
pub mod resolver;

pub use arbiter::{ArbitrationDecision, ArbitrationRequest, ArbitrationVerdict, Arbiter, HttpArbiter};
pub use detector::ConflictDetector;
pub use resolver::{apply_resolutions, ConflictResolver};

use crate::types::{Confidence, Point2D, RoomType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cross-source disagreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    RoomCount,
    RoomType,
    Dimension,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictKind::RoomCount => "room_count",
            ConflictKind::RoomType => "room_type",
            ConflictKind::Dimension => "dimension",
        })
    }
}

/// A value one source reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConflictValue {
    Count(usize),
    RoomType(RoomType),
    /// Length in meters
    Length(f64),
}

impl ConflictValue {
    /// Equality with a relative tolerance for lengths
    pub fn same_as(&self, other: &ConflictValue) -> bool {
        match (self, other) {
            (ConflictValue::Length(a), ConflictValue::Length(b)) => {
                let scale = a.abs().max(b.abs()).max(1e-12);
                (a - b).abs() / scale < 1e-9
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for ConflictValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictValue::Count(n) => write!(f, "{}", n),
            ConflictValue::RoomType(t) => write!(f, "{}", t),
            ConflictValue::Length(m) => write!(f, "{:.3} m", m),
        }
    }
}

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    HighestConfidence,
    Consensus,
    ExternalArbitration,
    Manual,
}

/// Outcome state of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Settled by the configured policy
    Resolved,
    /// Arbitration failed; settled by highest confidence instead
    Degraded,
    /// Left for manual review; not applied to the fused result
    PendingReview,
}

/// Disagreement found by the detector, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedConflict {
    pub kind: ConflictKind,
    /// One entry per reporting source, parallel to `values` and `confidences`
    pub sources: Vec<String>,
    pub values: Vec<ConflictValue>,
    pub confidences: Vec<Confidence>,
    pub location: Option<Point2D>,
}

/// A resolved (or pending) conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub conflicting_sources: Vec<String>,
    pub conflicting_values: Vec<ConflictValue>,
    pub source_confidences: Vec<Confidence>,
    pub resolution: ConflictValue,
    pub method: ResolutionMethod,
    pub confidence: Confidence,
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Point2D>,
    /// Resolution is an arbitrated compromise rather than a reported value
    #[serde(default)]
    pub compromise: bool,
}

impl ConflictRecord {
    /// The resolution is one of the reported values unless marked a compromise
    pub fn is_consistent(&self) -> bool {
        self.compromise
            || self
                .conflicting_values
                .iter()
                .any(|v| v.same_as(&self.resolution))
    }

    pub fn is_applied(&self) -> bool {
        self.status != ResolutionStatus::PendingReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_values_compare_with_tolerance() {
        assert!(ConflictValue::Length(3.0).same_as(&ConflictValue::Length(3.0 + 1e-12)));
        assert!(!ConflictValue::Length(3.0).same_as(&ConflictValue::Length(3.1)));
        assert!(!ConflictValue::Count(3).same_as(&ConflictValue::Length(3.0)));
    }

    #[test]
    fn test_values_serialize_untagged() {
        let json = serde_json::to_value(ConflictValue::RoomType(RoomType::Bedroom)).unwrap();
        assert_eq!(json, serde_json::json!("bedroom"));
        let json = serde_json::to_value(ConflictValue::Count(4)).unwrap();
        assert_eq!(json, serde_json::json!(4));
    }
}
