//! Planar geometry helpers for polygons and segments in pixel space

use crate::types::Point2D;
use serde::{Deserialize, Serialize};

/// Return the distinct vertices of a ring, dropping a closing vertex that
/// repeats the first one within `tolerance`
pub fn ring_vertices(points: &[Point2D], tolerance: f64) -> &[Point2D] {
    if points.len() >= 2 {
        let first = points[0];
        let last = points[points.len() - 1];
        if first.distance_to(&last) <= tolerance {
            return &points[..points.len() - 1];
        }
    }
    points
}

/// Signed area by the shoelace formula (positive for counter-clockwise)
pub fn signed_area(points: &[Point2D]) -> f64 {
    let ring = ring_vertices(points, 0.0);
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        sum += ring[i].x * ring[j].y - ring[j].x * ring[i].y;
    }
    sum / 2.0
}

/// Absolute polygon area in square pixels
pub fn polygon_area(points: &[Point2D]) -> f64 {
    signed_area(points).abs()
}

/// Perimeter of the ring, including the closing edge
pub fn polygon_perimeter(points: &[Point2D]) -> f64 {
    let ring = ring_vertices(points, 0.0);
    if ring.len() < 2 {
        return 0.0;
    }
    (0..ring.len())
        .map(|i| ring[i].distance_to(&ring[(i + 1) % ring.len()]))
        .sum()
}

/// Area-weighted centroid; degenerate rings fall back to the vertex mean
pub fn polygon_centroid(points: &[Point2D]) -> Point2D {
    let ring = ring_vertices(points, 0.0);
    if ring.is_empty() {
        return Point2D::default();
    }

    let area = signed_area(ring);
    if area.abs() < 1e-9 {
        let n = ring.len() as f64;
        let (sx, sy) = ring
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Point2D::new(sx / n, sy / n);
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        let cross = ring[i].x * ring[j].y - ring[j].x * ring[i].y;
        cx += (ring[i].x + ring[j].x) * cross;
        cy += (ring[i].y + ring[j].y) * cross;
    }
    Point2D::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// Distance from `p` to the segment `a`-`b`
pub fn point_segment_distance(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance_to(&Point2D::new(a.x + t * dx, a.y + t * dy))
}

/// Distance from `p` to the nearest edge of the ring
pub fn distance_to_boundary(p: &Point2D, points: &[Point2D]) -> f64 {
    let ring = ring_vertices(points, 0.0);
    match ring.len() {
        0 => f64::INFINITY,
        1 => p.distance_to(&ring[0]),
        n => (0..n)
            .map(|i| point_segment_distance(p, &ring[i], &ring[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Ray-casting point in polygon test
pub fn point_in_polygon(p: &Point2D, points: &[Point2D]) -> bool {
    let ring = ring_vertices(points, 0.0);
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Interior angle at `cur` in degrees (0-180)
pub fn vertex_angle_deg(prev: &Point2D, cur: &Point2D, next: &Point2D) -> f64 {
    let v1 = (prev.x - cur.x, prev.y - cur.y);
    let v2 = (next.x - cur.x, next.y - cur.y);
    let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if n1 == 0.0 || n2 == 0.0 {
        return 0.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[Point2D]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        points.iter().fold(
            Self {
                min_x: f64::INFINITY,
                min_y: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |b, p| Self {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Width over height; 0 when the box is flat
    pub fn aspect_ratio(&self) -> f64 {
        if self.height() == 0.0 {
            0.0
        } else {
            self.width() / self.height()
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = self.max_x.min(other.max_x) - self.min_x.max(other.min_x);
        let h = self.max_y.min(other.max_y) - self.min_y.max(other.min_y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Intersection area over the smaller box's area
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            0.0
        } else {
            self.intersection_area(other) / smaller
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}
