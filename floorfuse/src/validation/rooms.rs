//! Room checks: closure, overlap and door connectivity

use super::{ExcludedEntity, Severity, ValidationIssue, ValidationReport};
use crate::config::ValidationConfig;
use crate::fusion::{EntityFlag, FusedResult};
use crate::geometry;
use crate::types::EntityKind;
use tracing::warn;

/// Exclude rooms whose polygon is open or has fewer than three vertices
pub(super) fn check_closure(
    config: &ValidationConfig,
    result: &mut FusedResult,
    report: &mut ValidationReport,
) {
    let tol = config.closure_tolerance_px;
    let checked = result.rooms.len();
    let mut kept = Vec::with_capacity(checked);

    for room in result.rooms.drain(..) {
        let polygon = &room.item.polygon;
        let closed = polygon.len() >= 2
            && polygon[0].distance_to(&polygon[polygon.len() - 1]) <= tol;
        let vertices = geometry::ring_vertices(polygon, tol).len();

        let reason = if !closed {
            Some(format!(
                "room polygon is open (first and last vertex more than {} px apart)",
                tol
            ))
        } else if vertices < 3 {
            Some(format!("room polygon has only {} distinct vertices", vertices))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!("Excluding room {}: {}", room.id, reason);
                report.issues.push(ValidationIssue::new(
                    Severity::Critical,
                    "room_polygon_open",
                    Some(&room.id),
                    reason.clone(),
                ));
                report.excluded.push(ExcludedEntity {
                    id: room.id.clone(),
                    kind: EntityKind::Room,
                    reason,
                    provenance: room.provenance.clone(),
                });
            }
            None => kept.push(room),
        }
    }

    report.metrics.rooms_checked = checked;
    report.metrics.rooms_closed = kept.len();
    report.metrics.closure_rate = (checked > 0).then(|| kept.len() as f64 / checked as f64);
    result.rooms = kept;
}

/// Flag overlapping rooms and suspected duplicates
pub(super) fn check_overlaps(
    config: &ValidationConfig,
    result: &mut FusedResult,
    report: &mut ValidationReport,
) {
    let n = result.rooms.len();
    let boxes: Vec<_> = result.rooms.iter().map(|r| r.item.bbox()).collect();
    let centroids: Vec<_> = result.rooms.iter().map(|r| r.item.centroid()).collect();
    let mut involved = vec![false; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let ratio = boxes[i].overlap_ratio(&boxes[j]);
            if ratio <= 0.0 {
                continue;
            }
            let close = centroids[i].distance_to(&centroids[j]) < config.duplicate_centroid_tolerance_px;
            let (flag, code) = if close {
                (EntityFlag::SuspectedDuplicate, "room_suspected_duplicate")
            } else if ratio > config.overlap_ratio_warning {
                (EntityFlag::Overlapping, "room_overlap")
            } else {
                continue;
            };

            involved[i] = true;
            involved[j] = true;
            result.rooms[i].flag(flag);
            result.rooms[j].flag(flag);
            report.issues.push(ValidationIssue::new(
                Severity::Warning,
                code,
                Some(&result.rooms[j].id),
                format!(
                    "rooms {} and {} overlap ({:.0}% of the smaller)",
                    result.rooms[i].id,
                    result.rooms[j].id,
                    ratio * 100.0
                ),
            ));
        }
    }

    report.metrics.layout_coherence =
        (n > 0).then(|| involved.iter().filter(|x| !**x).count() as f64 / n as f64);
}

/// Flag rooms with no door shared with another room
pub(super) fn check_connectivity(
    config: &ValidationConfig,
    result: &mut FusedResult,
    report: &mut ValidationReport,
) {
    let n = result.rooms.len();
    if n < 2 {
        return;
    }
    let tol = config.door_room_tolerance_px;

    let near_door: Vec<Vec<usize>> = result
        .doors
        .iter()
        .map(|door| {
            (0..n)
                .filter(|&i| {
                    let polygon = &result.rooms[i].item.polygon;
                    geometry::distance_to_boundary(&door.item.position, polygon) <= tol
                        || geometry::point_in_polygon(&door.item.position, polygon)
                })
                .collect()
        })
        .collect();

    let mut connected = vec![false; n];
    for rooms in near_door.iter().filter(|rooms| rooms.len() >= 2) {
        for &i in rooms {
            connected[i] = true;
        }
    }

    for (i, ok) in connected.iter().enumerate() {
        if !ok {
            result.rooms[i].flag(EntityFlag::Disconnected);
            report.issues.push(ValidationIssue::new(
                Severity::Warning,
                "room_disconnected",
                Some(&result.rooms[i].id),
                format!("room {} has no door to another room", result.rooms[i].id),
            ));
        }
    }

    report.metrics.room_connectivity =
        Some(connected.iter().filter(|c| **c).count() as f64 / n as f64);
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{empty_result, entity, rect, room};
    use super::super::GeometricValidator;
    use crate::config::ValidationConfig;
    use crate::fusion::EntityFlag;
    use crate::types::{OpeningItem, Point2D};

    #[test]
    fn test_open_polygon_is_excluded() {
        // Arrange
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.rooms.push(room("closed", rect(0.0, 0.0, 100.0, 100.0, true)));
        result.rooms.push(room("open", rect(200.0, 0.0, 300.0, 100.0, false)));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert
        assert_eq!(result.rooms.len(), 1);
        assert_eq!(result.rooms[0].id, "closed");
        assert_eq!(report.excluded.len(), 1);
        assert_eq!(report.excluded[0].id, "open");
        assert_eq!(report.metrics.closure_rate, Some(0.5));
        assert!(report.has_critical());
    }

    #[test]
    fn test_overlapping_rooms_flagged() {
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.rooms.push(room("a", rect(0.0, 0.0, 100.0, 100.0, true)));
        result.rooms.push(room("b", rect(50.0, 0.0, 150.0, 100.0, true)));
        result.rooms.push(room("c", rect(2.0, 2.0, 102.0, 102.0, true)));

        let report = GeometricValidator::new(&config).validate(&mut result);

        assert!(result.rooms[0].has_flag(EntityFlag::SuspectedDuplicate));
        assert!(result.rooms[2].has_flag(EntityFlag::SuspectedDuplicate));
        assert!(result.rooms[1].has_flag(EntityFlag::Overlapping));
        assert_eq!(report.metrics.layout_coherence, Some(0.0));
    }

    #[test]
    fn test_rooms_connected_by_shared_door() {
        // Arrange: a and b share a door, c stands alone
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.rooms.push(room("a", rect(0.0, 0.0, 100.0, 100.0, true)));
        result.rooms.push(room("b", rect(100.0, 0.0, 200.0, 100.0, true)));
        result.rooms.push(room("c", rect(400.0, 0.0, 500.0, 100.0, true)));
        result.doors.push(entity(
            "d",
            OpeningItem::new(Point2D::new(100.0, 50.0), 30.0, 0.8),
            0.8,
        ));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert
        assert!(!result.rooms[0].has_flag(EntityFlag::Disconnected));
        assert!(!result.rooms[1].has_flag(EntityFlag::Disconnected));
        assert!(result.rooms[2].has_flag(EntityFlag::Disconnected));
        assert!((report.metrics.room_connectivity.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_room_is_never_disconnected() {
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.rooms.push(room("only", rect(0.0, 0.0, 100.0, 100.0, true)));

        let report = GeometricValidator::new(&config).validate(&mut result);

        assert!(!result.rooms[0].has_flag(EntityFlag::Disconnected));
        assert_eq!(report.metrics.room_connectivity, None);
    }
}
