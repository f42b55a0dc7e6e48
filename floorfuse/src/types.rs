//! Core data model shared by every fusion stage
//!
//! Detector output enters as [`DetectorResult`] records whose payload is a
//! list of tagged [`DetectorPayload`] collections. Each item carries its own
//! geometry, optional label text and item-level confidence.

use crate::geometry::{self, BoundingBox};
use crate::units::Length;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence score (0.0-1.0)
pub type Confidence = f64;

/// A 2D point in image (pixel) coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Kind of extraction method that produced a detector result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Ocr,
    Vision,
    ObjectDetection,
    Generative,
    Hybrid,
}

/// Kind of floor plan entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Room,
    Wall,
    Door,
    Window,
    Dimension,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Room => "room",
            EntityKind::Wall => "wall",
            EntityKind::Door => "door",
            EntityKind::Window => "window",
            EntityKind::Dimension => "dimension",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical room types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Bedroom,
    Bathroom,
    Kitchen,
    LivingRoom,
    DiningRoom,
    Office,
    Garage,
    Laundry,
    Closet,
    Hallway,
    Deck,
    Stairs,
    Storage,
    Utility,
    Mechanical,
    #[default]
    Unidentified,
}

impl RoomType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::Bedroom => "bedroom",
            RoomType::Bathroom => "bathroom",
            RoomType::Kitchen => "kitchen",
            RoomType::LivingRoom => "living_room",
            RoomType::DiningRoom => "dining_room",
            RoomType::Office => "office",
            RoomType::Garage => "garage",
            RoomType::Laundry => "laundry",
            RoomType::Closet => "closet",
            RoomType::Hallway => "hallway",
            RoomType::Deck => "deck",
            RoomType::Stairs => "stairs",
            RoomType::Storage => "storage",
            RoomType::Utility => "utility",
            RoomType::Mechanical => "mechanical",
            RoomType::Unidentified => "unidentified",
        }
    }

    pub fn is_identified(self) -> bool {
        self != RoomType::Unidentified
    }

    /// Whether the room counts towards living area
    pub fn is_living_space(self) -> bool {
        !matches!(
            self,
            RoomType::Garage | RoomType::Storage | RoomType::Utility | RoomType::Mechanical
        )
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected room (closed contour)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomItem {
    /// Boundary ring; closed rings repeat the first vertex at the end
    pub polygon: Vec<Point2D>,
    /// Free-text label as reported by the detector
    #[serde(default)]
    pub label: Option<String>,
    /// Canonical type (assigned by the normalizer)
    #[serde(default)]
    pub room_type: RoomType,
    pub confidence: Confidence,
}

impl RoomItem {
    pub fn new(polygon: Vec<Point2D>, label: Option<&str>, confidence: Confidence) -> Self {
        Self {
            polygon,
            label: label.map(str::to_string),
            room_type: RoomType::Unidentified,
            confidence,
        }
    }

    pub fn centroid(&self) -> Point2D {
        geometry::polygon_centroid(&self.polygon)
    }

    pub fn area_px(&self) -> f64 {
        geometry::polygon_area(&self.polygon)
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(&self.polygon)
    }
}

/// Wall classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WallKind {
    Exterior,
    Interior,
    #[default]
    Unknown,
}

/// Detected wall segment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallItem {
    pub start: Point2D,
    pub end: Point2D,
    /// Wall thickness in pixels
    pub thickness: f64,
    #[serde(default)]
    pub wall_kind: WallKind,
    pub confidence: Confidence,
}

impl WallItem {
    pub fn new(start: Point2D, end: Point2D, thickness: f64, confidence: Confidence) -> Self {
        Self {
            start,
            end,
            thickness,
            wall_kind: WallKind::Unknown,
            confidence,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn midpoint(&self) -> Point2D {
        self.start.midpoint(&self.end)
    }

    /// Distance from a point to this wall's centerline segment
    pub fn distance_to_point(&self, p: &Point2D) -> f64 {
        geometry::point_segment_distance(p, &self.start, &self.end)
    }
}

/// Detected door or window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpeningItem {
    pub position: Point2D,
    /// Opening width in pixels
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub label: Option<String>,
    /// Identifier of the fused wall hosting this opening (set by validation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_wall: Option<String>,
    pub confidence: Confidence,
}

impl OpeningItem {
    pub fn new(position: Point2D, width: f64, confidence: Confidence) -> Self {
        Self {
            position,
            width,
            label: None,
            host_wall: None,
            confidence,
        }
    }
}

/// Dimension annotation: a measured extent plus its text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionItem {
    pub text: String,
    pub start: Point2D,
    pub end: Point2D,
    /// Parsed real-world length (set by the normalizer when the text parses)
    #[serde(default)]
    pub length: Option<Length>,
    pub confidence: Confidence,
}

impl DimensionItem {
    pub fn new(text: &str, start: Point2D, end: Point2D, confidence: Confidence) -> Self {
        Self {
            text: text.to_string(),
            start,
            end,
            length: None,
            confidence,
        }
    }

    pub fn pixel_length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn anchor(&self) -> Point2D {
        self.start.midpoint(&self.end)
    }
}

/// Free text recognized on the drawing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub position: Point2D,
    pub confidence: Confidence,
}

impl TextItem {
    pub fn new(text: &str, position: Point2D, confidence: Confidence) -> Self {
        Self {
            text: text.to_string(),
            position,
            confidence,
        }
    }
}

/// One typed collection of a detector's output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum DetectorPayload {
    Rooms(Vec<RoomItem>),
    Walls(Vec<WallItem>),
    Doors(Vec<OpeningItem>),
    Windows(Vec<OpeningItem>),
    Dimensions(Vec<DimensionItem>),
    Text(Vec<TextItem>),
}

/// One source's structured output for a floor plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorResult {
    /// Source identifier (e.g. "tesseract", "yolo", "gpt-vision")
    pub source: String,
    pub modality: Modality,
    /// Overall confidence for this source (0.0-1.0)
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<DetectorPayload>,
}

impl DetectorResult {
    pub fn new(source: impl Into<String>, modality: Modality, confidence: Confidence) -> Self {
        Self {
            source: source.into(),
            modality,
            confidence,
            timestamp: Utc::now(),
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: DetectorPayload) -> Self {
        self.payload.push(payload);
        self
    }

    pub fn rooms(&self) -> Vec<&RoomItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Rooms(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn walls(&self) -> Vec<&WallItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Walls(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn doors(&self) -> Vec<&OpeningItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Doors(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn windows(&self) -> Vec<&OpeningItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Windows(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn dimensions(&self) -> Vec<&DimensionItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Dimensions(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn texts(&self) -> Vec<&TextItem> {
        self.payload
            .iter()
            .filter_map(|p| match p {
                DetectorPayload::Text(items) => Some(items.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Whether this source reports the given entity kind at all
    ///
    /// A source with an empty room collection reports zero rooms; a source
    /// without a room collection does not report rooms.
    pub fn reports(&self, kind: EntityKind) -> bool {
        self.payload.iter().any(|p| {
            matches!(
                (kind, p),
                (EntityKind::Room, DetectorPayload::Rooms(_))
                    | (EntityKind::Wall, DetectorPayload::Walls(_))
                    | (EntityKind::Door, DetectorPayload::Doors(_))
                    | (EntityKind::Window, DetectorPayload::Windows(_))
                    | (EntityKind::Dimension, DetectorPayload::Dimensions(_))
            )
        })
    }
}
