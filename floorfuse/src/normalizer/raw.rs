//! Loosely-typed detector output as it arrives from collaborators
//!
//! Detectors disagree on field names and point encodings. This module accepts
//! the common variants and converts them into the typed model, returning a
//! schema error for anything it cannot interpret.

use crate::error::{FusionError, Result};
use crate::types::{
    Confidence, DetectorPayload, DetectorResult, DimensionItem, Modality, OpeningItem, Point2D,
    RoomItem, RoomType, TextItem, WallItem, WallKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw detector record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub source: String,
    pub modality: Modality,
    pub confidence: Confidence,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Untyped payload object (`rooms`, `walls`, `doors`, `windows`, `dimensions`, `text`)
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Pair([f64; 2]),
    Object { x: f64, y: f64 },
}

impl From<RawPoint> for Point2D {
    fn from(p: RawPoint) -> Self {
        match p {
            RawPoint::Pair([x, y]) => Point2D::new(x, y),
            RawPoint::Object { x, y } => Point2D::new(x, y),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRoom {
    #[serde(alias = "vertices", alias = "boundary", alias = "points")]
    polygon: Vec<RawPoint>,
    #[serde(default, alias = "type", alias = "room_type")]
    kind: Option<String>,
    #[serde(default, alias = "name")]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawWall {
    start: RawPoint,
    end: RawPoint,
    #[serde(default)]
    thickness: Option<f64>,
    #[serde(default, alias = "type", alias = "wall_type")]
    kind: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawOpening {
    #[serde(alias = "center", alias = "location")]
    position: RawPoint,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default, alias = "type")]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    #[serde(alias = "value")]
    text: String,
    start: RawPoint,
    end: RawPoint,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    text: String,
    #[serde(alias = "center", alias = "location")]
    position: RawPoint,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    #[serde(default)]
    rooms: Option<Vec<RawRoom>>,
    #[serde(default)]
    walls: Option<Vec<RawWall>>,
    #[serde(default)]
    doors: Option<Vec<RawOpening>>,
    #[serde(default)]
    windows: Option<Vec<RawOpening>>,
    #[serde(default)]
    dimensions: Option<Vec<RawDimension>>,
    #[serde(default, alias = "texts", alias = "labels")]
    text: Option<Vec<RawText>>,
}

fn parse_wall_kind(raw: Option<&str>) -> WallKind {
    match raw.map(|s| s.trim().to_lowercase()) {
        Some(s) if s.starts_with("ext") => WallKind::Exterior,
        Some(s) if s.starts_with("int") => WallKind::Interior,
        _ => WallKind::Unknown,
    }
}

impl RawDetection {
    /// Convert into the typed model
    ///
    /// Item confidences default to the source confidence. Room type strings
    /// are kept as labels; the normalizer assigns canonical types.
    pub fn into_detector_result(self) -> Result<DetectorResult> {
        let source = self.source.clone();
        let payload: RawPayload = match self.payload {
            Value::Null => RawPayload::default(),
            value => serde_json::from_value(value)
                .map_err(|e| FusionError::schema(&source, e.to_string()))?,
        };

        let conf = self.confidence;
        let item_conf = |c: Option<f64>| c.unwrap_or(conf);
        let mut collections = Vec::new();

        if let Some(rooms) = payload.rooms {
            collections.push(DetectorPayload::Rooms(
                rooms
                    .into_iter()
                    .map(|r| RoomItem {
                        polygon: r.polygon.into_iter().map(Point2D::from).collect(),
                        label: r.label.or(r.kind),
                        room_type: RoomType::Unidentified,
                        confidence: item_conf(r.confidence),
                    })
                    .collect(),
            ));
        }

        if let Some(walls) = payload.walls {
            collections.push(DetectorPayload::Walls(
                walls
                    .into_iter()
                    .map(|w| WallItem {
                        start: w.start.into(),
                        end: w.end.into(),
                        thickness: w.thickness.unwrap_or(0.0),
                        wall_kind: parse_wall_kind(w.kind.as_deref()),
                        confidence: item_conf(w.confidence),
                    })
                    .collect(),
            ));
        }

        let openings = |items: Vec<RawOpening>| -> Vec<OpeningItem> {
            items
                .into_iter()
                .map(|o| OpeningItem {
                    position: o.position.into(),
                    width: o.width.unwrap_or(0.0),
                    label: o.label,
                    host_wall: None,
                    confidence: item_conf(o.confidence),
                })
                .collect()
        };
        if let Some(doors) = payload.doors {
            collections.push(DetectorPayload::Doors(openings(doors)));
        }
        if let Some(windows) = payload.windows {
            collections.push(DetectorPayload::Windows(openings(windows)));
        }

        if let Some(dimensions) = payload.dimensions {
            collections.push(DetectorPayload::Dimensions(
                dimensions
                    .into_iter()
                    .map(|d| DimensionItem {
                        text: d.text,
                        start: d.start.into(),
                        end: d.end.into(),
                        length: None,
                        confidence: item_conf(d.confidence),
                    })
                    .collect(),
            ));
        }

        if let Some(texts) = payload.text {
            collections.push(DetectorPayload::Text(
                texts
                    .into_iter()
                    .map(|t| TextItem {
                        text: t.text,
                        position: t.position.into(),
                        confidence: item_conf(t.confidence),
                    })
                    .collect(),
            ));
        }

        Ok(DetectorResult {
            source: self.source,
            modality: self.modality,
            confidence: self.confidence,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: collections,
        })
    }
}
