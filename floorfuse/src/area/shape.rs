//! Room shape classification and footprint-based type suggestion

use crate::geometry::{polygon_centroid, ring_vertices, vertex_angle_deg, BoundingBox};
use crate::types::{Point2D, RoomType};
use serde::{Deserialize, Serialize};

/// Rough outline shape of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomShape {
    Rectangular,
    Circular,
    LShaped,
    Irregular,
}

/// Degrees a corner may deviate from 90 and still count as square
const RIGHT_ANGLE_TOLERANCE_DEG: f64 = 10.0;
/// Maximum radius variance / mean² for a circular outline
const CIRCULAR_MAX_SPREAD: f64 = 0.1;

fn all_right_angles(vertices: &[Point2D]) -> bool {
    let n = vertices.len();
    (0..n).all(|i| {
        let angle = vertex_angle_deg(&vertices[(i + n - 1) % n], &vertices[i], &vertices[(i + 1) % n]);
        (angle - 90.0).abs() <= RIGHT_ANGLE_TOLERANCE_DEG
    })
}

/// Classify a room outline
///
/// # Algorithm
/// 1. Four corners all within 10° of 90° → rectangular
/// 2. Eight or more vertices whose centroid distances have variance / mean²
///    below 0.1 → circular
/// 3. Six corners all near 90° → L-shaped
/// 4. Anything else → irregular
pub fn classify_shape(polygon: &[Point2D], closure_tolerance: f64) -> RoomShape {
    let vertices = ring_vertices(polygon, closure_tolerance);
    let n = vertices.len();

    if n == 4 && all_right_angles(vertices) {
        return RoomShape::Rectangular;
    }

    if n >= 8 {
        let center = polygon_centroid(vertices);
        let radii: Vec<f64> = vertices.iter().map(|v| v.distance_to(&center)).collect();
        let mean = radii.iter().sum::<f64>() / n as f64;
        if mean > 0.0 {
            let variance = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
            if variance / (mean * mean) < CIRCULAR_MAX_SPREAD {
                return RoomShape::Circular;
            }
        }
    }

    if n == 6 && all_right_angles(vertices) {
        return RoomShape::LShaped;
    }

    RoomShape::Irregular
}

/// Suggest a room type from footprint alone
///
/// `area_sqft` is the gross area in square feet; the aspect ratio comes from
/// the outline's bounding box.
pub fn suggest_room_type(area_sqft: f64, bbox: &BoundingBox) -> RoomType {
    let aspect = bbox.aspect_ratio();
    if area_sqft < 50.0 {
        RoomType::Closet
    } else if area_sqft < 100.0 {
        if !(0.67..=1.5).contains(&aspect) {
            RoomType::Hallway
        } else {
            RoomType::Bathroom
        }
    } else if area_sqft < 150.0 {
        RoomType::Bedroom
    } else if area_sqft < 250.0 {
        if aspect > 1.3 {
            RoomType::Kitchen
        } else {
            RoomType::Bedroom
        }
    } else {
        RoomType::LivingRoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Point2D> {
        let mut ring: Vec<Point2D> = points.iter().map(|(x, y)| Point2D::new(*x, *y)).collect();
        ring.push(ring[0]);
        ring
    }

    #[test]
    fn test_rectangle() {
        let poly = ring(&[(0.0, 0.0), (200.0, 0.0), (200.0, 100.0), (0.0, 100.0)]);
        assert_eq!(classify_shape(&poly, 5.0), RoomShape::Rectangular);
    }

    #[test]
    fn test_skewed_quad_is_irregular() {
        let poly = ring(&[(0.0, 0.0), (200.0, 0.0), (260.0, 100.0), (0.0, 100.0)]);
        assert_eq!(classify_shape(&poly, 5.0), RoomShape::Irregular);
    }

    #[test]
    fn test_circle() {
        let points: Vec<(f64, f64)> = (0..12)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 12.0;
                (100.0 + 50.0 * a.cos(), 100.0 + 50.0 * a.sin())
            })
            .collect();
        assert_eq!(classify_shape(&ring(&points), 5.0), RoomShape::Circular);
    }

    #[test]
    fn test_l_shape() {
        let poly = ring(&[
            (0.0, 0.0),
            (200.0, 0.0),
            (200.0, 100.0),
            (100.0, 100.0),
            (100.0, 200.0),
            (0.0, 200.0),
        ]);
        assert_eq!(classify_shape(&poly, 5.0), RoomShape::LShaped);
    }

    #[test]
    fn test_suggestions() {
        let square = BoundingBox::from_points(&[Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0)]);
        let long = BoundingBox::from_points(&[Point2D::new(0.0, 0.0), Point2D::new(30.0, 10.0)]);
        assert_eq!(suggest_room_type(30.0, &square), RoomType::Closet);
        assert_eq!(suggest_room_type(80.0, &long), RoomType::Hallway);
        assert_eq!(suggest_room_type(80.0, &square), RoomType::Bathroom);
        assert_eq!(suggest_room_type(120.0, &square), RoomType::Bedroom);
        assert_eq!(suggest_room_type(200.0, &long), RoomType::Kitchen);
        assert_eq!(suggest_room_type(400.0, &square), RoomType::LivingRoom);
    }
}
