//! Wall checks: perimeter classification and endpoint connectivity

use super::{Severity, ValidationIssue, ValidationReport};
use crate::config::ValidationConfig;
use crate::fusion::{EntityFlag, FusedResult};
use crate::geometry::BoundingBox;
use crate::types::{Point2D, WallKind};

/// Classify unknown walls as exterior when they run along the plan outline
///
/// The outline is the bounding box of all wall endpoints and room vertices.
pub(super) fn classify_perimeter(config: &ValidationConfig, result: &mut FusedResult) {
    let points: Vec<Point2D> = result
        .walls
        .iter()
        .flat_map(|w| [w.item.start, w.item.end])
        .chain(result.rooms.iter().flat_map(|r| r.item.polygon.iter().copied()))
        .collect();
    if points.is_empty() {
        return;
    }
    let outline = BoundingBox::from_points(&points);
    let tol = config.perimeter_tolerance_px;

    let on_edge = |p: &Point2D| {
        (p.x - outline.min_x).abs() <= tol
            || (p.x - outline.max_x).abs() <= tol
            || (p.y - outline.min_y).abs() <= tol
            || (p.y - outline.max_y).abs() <= tol
    };
    let same_edge = |a: &Point2D, b: &Point2D| {
        ((a.x - outline.min_x).abs() <= tol && (b.x - outline.min_x).abs() <= tol)
            || ((a.x - outline.max_x).abs() <= tol && (b.x - outline.max_x).abs() <= tol)
            || ((a.y - outline.min_y).abs() <= tol && (b.y - outline.min_y).abs() <= tol)
            || ((a.y - outline.max_y).abs() <= tol && (b.y - outline.max_y).abs() <= tol)
    };

    for wall in result.walls.iter_mut().filter(|w| w.item.wall_kind == WallKind::Unknown) {
        let (s, e) = (wall.item.start, wall.item.end);
        wall.item.wall_kind = if on_edge(&s) && on_edge(&e) && same_edge(&s, &e) {
            WallKind::Exterior
        } else {
            WallKind::Interior
        };
    }
}

/// Flag walls with neither endpoint joined to another wall's endpoint
pub(super) fn check_connectivity(
    config: &ValidationConfig,
    result: &mut FusedResult,
    report: &mut ValidationReport,
) {
    let n = result.walls.len();
    if n == 0 {
        return;
    }
    let tol = config.wall_join_tolerance_px;

    let joined = |p: &Point2D, skip: usize| {
        result.walls.iter().enumerate().any(|(j, other)| {
            j != skip
                && (p.distance_to(&other.item.start) <= tol || p.distance_to(&other.item.end) <= tol)
        })
    };

    let unconnected: Vec<usize> = (0..n)
        .filter(|&i| {
            let w = &result.walls[i].item;
            !(joined(&w.start, i) || joined(&w.end, i))
        })
        .collect();

    for &i in &unconnected {
        result.walls[i].flag(EntityFlag::Unconnected);
        report.issues.push(ValidationIssue::new(
            Severity::Warning,
            "wall_unconnected",
            Some(&result.walls[i].id),
            format!("wall {} does not meet any other wall", result.walls[i].id),
        ));
    }

    report.metrics.wall_connectivity = Some((n - unconnected.len()) as f64 / n as f64);
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{empty_result, wall};
    use super::super::GeometricValidator;
    use crate::config::ValidationConfig;
    use crate::fusion::EntityFlag;
    use crate::types::WallKind;

    #[test]
    fn test_perimeter_walls_are_exterior() {
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("top", (0.0, 0.0), (400.0, 0.0), 8.0));
        result.walls.push(wall("bottom", (0.0, 300.0), (400.0, 300.0), 8.0));
        result.walls.push(wall("middle", (200.0, 0.0), (200.0, 300.0), 8.0));

        GeometricValidator::new(&config).validate(&mut result);

        assert_eq!(result.walls[0].item.wall_kind, WallKind::Exterior);
        assert_eq!(result.walls[1].item.wall_kind, WallKind::Exterior);
        assert_eq!(result.walls[2].item.wall_kind, WallKind::Interior);
    }

    #[test]
    fn test_l_corner_walls_are_connected() {
        // Arrange: two walls meeting at (200, 0), each with one free end
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("a", (0.0, 0.0), (200.0, 0.0), 8.0));
        result.walls.push(wall("b", (200.0, 0.0), (200.0, 150.0), 8.0));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert
        assert_eq!(report.metrics.wall_connectivity, Some(1.0));
        assert!(result.walls.iter().all(|w| !w.has_flag(EntityFlag::Unconnected)));
        assert!(report.issues.iter().all(|i| i.code != "wall_unconnected"));
    }

    #[test]
    fn test_isolated_wall_is_unconnected() {
        // Arrange: an L corner plus a wall far from both
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("a", (0.0, 0.0), (200.0, 0.0), 8.0));
        result.walls.push(wall("b", (210.0, 5.0), (210.0, 150.0), 8.0));
        result.walls.push(wall("lone", (500.0, 400.0), (600.0, 400.0), 8.0));

        // Act
        let report = GeometricValidator::new(&config).validate(&mut result);

        // Assert: (200,0) and (210,5) are within the 20 px join tolerance
        assert!(!result.walls[0].has_flag(EntityFlag::Unconnected));
        assert!(!result.walls[1].has_flag(EntityFlag::Unconnected));
        assert!(result.walls[2].has_flag(EntityFlag::Unconnected));
        assert!((report.metrics.wall_connectivity.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_endpoint_touching_wall_middle_is_not_a_join() {
        // Joins are endpoint to endpoint; a T junction alone does not count
        let config = ValidationConfig::default();
        let mut result = empty_result();
        result.walls.push(wall("long", (0.0, 0.0), (400.0, 0.0), 8.0));
        result.walls.push(wall("stem", (200.0, 0.0), (200.0, 150.0), 8.0));

        let report = GeometricValidator::new(&config).validate(&mut result);

        assert_eq!(report.metrics.wall_connectivity, Some(0.0));
    }
}
