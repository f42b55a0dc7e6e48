//! Door and window placement checks

use super::{Severity, ValidationIssue, ValidationReport};
use crate::config::ValidationConfig;
use crate::fusion::{EntityFlag, FusedEntity, FusedResult};
use crate::types::{OpeningItem, WallItem};

/// Attach each opening to its nearest wall within that wall's thickness;
/// unhosted openings are flagged and their confidence penalized
pub(super) fn check_placement(
    config: &ValidationConfig,
    result: &mut FusedResult,
    report: &mut ValidationReport,
) {
    let total = result.doors.len() + result.windows.len();
    if total == 0 {
        return;
    }

    let walls = &result.walls;
    let mut hosted = 0;
    for (kind, openings) in [("door", &mut result.doors), ("window", &mut result.windows)] {
        for opening in openings.iter_mut() {
            if host_opening(walls, opening) {
                hosted += 1;
            } else {
                opening.flag(EntityFlag::InvalidPlacement);
                opening.confidence *= config.invalid_opening_penalty;
                report.issues.push(ValidationIssue::new(
                    Severity::Warning,
                    "opening_without_wall",
                    Some(&opening.id),
                    format!("{} {} is not on any wall", kind, opening.id),
                ));
            }
        }
    }

    report.metrics.opening_placement = Some(hosted as f64 / total as f64);
}

fn host_opening(walls: &[FusedEntity<WallItem>], opening: &mut FusedEntity<OpeningItem>) -> bool {
    let host = walls
        .iter()
        .map(|w| (w, w.item.distance_to_point(&opening.item.position)))
        .filter(|(w, d)| *d <= w.item.thickness)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match host {
        Some((wall, _)) => {
            opening.item.host_wall = Some(wall.id.clone());
            true
        }
        None => {
            opening.item.host_wall = None;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{empty_result, entity, wall};
    use super::super::GeometricValidator;
    use crate::config::ValidationConfig;
    use crate::fusion::EntityFlag;
    use crate::types::{OpeningItem, Point2D};

    #[test]
    fn test_door_off_wall_is_penalized() {
        // Arrange
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("w1", (0.0, 0.0), (200.0, 0.0), 8.0));
        result.doors.push(entity(
            "on",
            OpeningItem::new(Point2D::new(100.0, 3.0), 30.0, 0.8),
            0.8,
        ));
        result.doors.push(entity(
            "off",
            OpeningItem::new(Point2D::new(100.0, 80.0), 30.0, 0.8),
            0.8,
        ));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert
        assert_eq!(result.doors[0].item.host_wall.as_deref(), Some("w1"));
        assert!(result.doors[1].has_flag(EntityFlag::InvalidPlacement));
        assert!((result.doors[1].confidence - 0.4).abs() < 1e-12);
        assert_eq!(report.metrics.opening_placement, Some(0.5));
    }

    #[test]
    fn test_host_distance_is_bounded_by_wall_thickness() {
        // Arrange: a 2 px wall, one window 2 px away and one 4 px away
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("thin", (0.0, 0.0), (200.0, 0.0), 2.0));
        result.windows.push(entity(
            "inside",
            OpeningItem::new(Point2D::new(50.0, 2.0), 40.0, 0.8),
            0.8,
        ));
        result.windows.push(entity(
            "outside",
            OpeningItem::new(Point2D::new(150.0, 4.0), 40.0, 0.8),
            0.8,
        ));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert
        assert_eq!(result.windows[0].item.host_wall.as_deref(), Some("thin"));
        assert!(result.windows[1].item.host_wall.is_none());
        assert!(result.windows[1].has_flag(EntityFlag::InvalidPlacement));
        assert_eq!(report.metrics.opening_placement, Some(0.5));
    }
}
