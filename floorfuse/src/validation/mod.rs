//! Geometric validation of the fused floor plan
//!
//! Checks run in a fixed order over the fused result:
//! 1. Room polygons must be closed rings of at least three vertices; open
//!    polygons are excluded from the output
//! 2. Walls are classified (exterior/interior) and checked for isolation
//! 3. Doors and windows must sit on a wall (within its thickness)
//! 4. Overlapping rooms are flagged, as overlap or suspected duplicate
//! 5. Rooms without a door path to another room are flagged disconnected
//!
//! Validation mutates flags and confidences; the metrics it gathers feed the
//! confidence scorer's rule library.

mod openings;
mod rooms;
mod walls;

use crate::config::ValidationConfig;
use crate::fusion::FusedResult;
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(severity: Severity, code: &str, entity_id: Option<&str>, message: String) -> Self {
        Self {
            severity,
            code: code.to_string(),
            entity_id: entity_id.map(str::to_string),
            message,
        }
    }
}

/// Entity removed from the fused result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedEntity {
    pub id: String,
    pub kind: EntityKind,
    pub reason: String,
    pub provenance: Vec<String>,
}

/// Measurements gathered while validating (None when not applicable)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryMetrics {
    pub rooms_checked: usize,
    pub rooms_closed: usize,
    /// Closed rooms over checked rooms
    pub closure_rate: Option<f64>,
    /// Walls with at least one endpoint joined over all walls
    pub wall_connectivity: Option<f64>,
    /// Openings hosted by a wall over all openings
    pub opening_placement: Option<f64>,
    /// Rooms free of overlaps over all rooms
    pub layout_coherence: Option<f64>,
    /// Rooms reachable through a door over all rooms (two or more rooms)
    pub room_connectivity: Option<f64>,
}

/// Validation output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub excluded: Vec<ExcludedEntity>,
    pub metrics: GeometryMetrics,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical(&self) -> bool {
        self.count(Severity::Critical) > 0
    }
}

/// Runs geometric checks over a fused result
pub struct GeometricValidator<'a> {
    config: &'a ValidationConfig,
}

impl<'a> GeometricValidator<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, result: &mut FusedResult) -> ValidationReport {
        let mut report = ValidationReport::default();

        rooms::check_closure(self.config, result, &mut report);
        walls::classify_perimeter(self.config, result);
        walls::check_connectivity(self.config, result, &mut report);
        openings::check_placement(self.config, result, &mut report);
        rooms::check_overlaps(self.config, result, &mut report);
        rooms::check_connectivity(self.config, result, &mut report);

        info!(
            "Validation: {} critical, {} warnings, {} excluded",
            report.count(Severity::Critical),
            report.count(Severity::Warning),
            report.excluded.len()
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::VotingStrategy;
    use crate::fusion::{FusedEntity, FusedResult, FusionMetadata};
    use crate::types::{Point2D, RoomItem, RoomType, WallItem};

    pub fn entity<T>(id: &str, item: T, confidence: f64) -> FusedEntity<T> {
        FusedEntity {
            id: id.to_string(),
            item,
            confidence,
            provenance: vec!["test".to_string()],
            agreement: None,
            flags: vec![],
        }
    }

    pub fn empty_result() -> FusedResult {
        FusedResult {
            rooms: vec![],
            walls: vec![],
            doors: vec![],
            windows: vec![],
            dimensions: vec![],
            metadata: FusionMetadata {
                models_used: vec![],
                fusion_strategy: VotingStrategy::Weighted,
                confidence: 0.0,
                consensus_level: 0.0,
                conflicts: vec![],
                processing_time_ms: 0,
            },
        }
    }

    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64, closed: bool) -> Vec<Point2D> {
        let mut pts = vec![
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ];
        if closed {
            pts.push(Point2D::new(x0, y0));
        }
        pts
    }

    pub fn room(id: &str, polygon: Vec<Point2D>) -> FusedEntity<RoomItem> {
        let mut item = RoomItem::new(polygon, None, 0.9);
        item.room_type = RoomType::Bedroom;
        entity(id, item, 0.9)
    }

    pub fn wall(id: &str, start: (f64, f64), end: (f64, f64), thickness: f64) -> FusedEntity<WallItem> {
        let item = WallItem::new(
            Point2D::new(start.0, start.1),
            Point2D::new(end.0, end.1),
            thickness,
            0.9,
        );
        entity(id, item, 0.9)
    }
}
