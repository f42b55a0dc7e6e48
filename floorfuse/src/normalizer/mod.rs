//! Result normalization
//!
//! Brings every detector result into a common shape before grouping:
//! - rejects sources whose payload cannot be interpreted (schema errors)
//! - clamps item confidences into [0, 1]
//! - maps room labels onto canonical room types
//! - parses dimension text into real-world lengths
//! - collapses same-source duplicate doors and windows
//!
//! A failing source is dropped and recorded; the rest of the run continues.

pub mod raw;
pub mod vocabulary;

pub use raw::RawDetection;
pub use vocabulary::RoomVocabulary;

use crate::config::NormalizerConfig;
use crate::error::{FusionError, Result};
use crate::geometry;
use crate::types::{DetectorPayload, DetectorResult, OpeningItem, RoomType, TextItem};
use crate::units::parse_dimension_text;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A source excluded from the run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DroppedSource {
    pub source: String,
    pub reason: String,
}

/// Output of normalization
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub results: Vec<DetectorResult>,
    pub dropped: Vec<DroppedSource>,
}

/// Normalizes detector results into the common model
pub struct ResultNormalizer {
    config: NormalizerConfig,
    vocabulary: RoomVocabulary,
}

impl ResultNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let vocabulary = RoomVocabulary::new(config.fuzzy_label_threshold);
        Self { config, vocabulary }
    }

    /// Normalize typed results; sources that fail validation are dropped
    pub fn normalize(&self, results: Vec<DetectorResult>) -> NormalizedInput {
        let mut output = NormalizedInput::default();
        for result in results {
            let source = result.source.clone();
            match self.normalize_one(result) {
                Ok(normalized) => output.results.push(normalized),
                Err(e) => {
                    warn!("Dropping source '{}': {}", source, e);
                    output.dropped.push(DroppedSource {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }
        output
    }

    /// Convert raw records and normalize them
    pub fn normalize_raw(&self, raw: Vec<RawDetection>) -> NormalizedInput {
        let mut typed = Vec::with_capacity(raw.len());
        let mut dropped = Vec::new();
        for record in raw {
            let source = record.source.clone();
            match record.into_detector_result() {
                Ok(result) => typed.push(result),
                Err(e) => {
                    warn!("Dropping source '{}': {}", source, e);
                    dropped.push(DroppedSource {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut output = self.normalize(typed);
        dropped.append(&mut output.dropped);
        output.dropped = dropped;
        output
    }

    fn normalize_one(&self, mut result: DetectorResult) -> Result<DetectorResult> {
        check_source(&result)?;

        let texts: Vec<TextItem> = result.texts().into_iter().cloned().collect();

        for payload in result.payload.iter_mut() {
            match payload {
                DetectorPayload::Rooms(rooms) => {
                    for room in rooms.iter_mut() {
                        if !room.polygon.iter().all(|p| p.is_finite()) {
                            return Err(FusionError::schema(
                                &result.source,
                                "room polygon has non-finite coordinates",
                            ));
                        }
                        room.confidence = clamp_confidence(room.confidence);
                        if !room.room_type.is_identified() {
                            room.room_type = room
                                .label
                                .as_deref()
                                .map(|l| self.vocabulary.classify(l))
                                .unwrap_or_default();
                        }
                        if !room.room_type.is_identified() && self.config.label_from_text {
                            if let Some((text, room_type)) =
                                self.label_from_contained_text(&room.polygon, &texts)
                            {
                                debug!("Room labelled '{}' from contained text", text);
                                room.label.get_or_insert(text);
                                room.room_type = room_type;
                            }
                        }
                    }
                }
                DetectorPayload::Walls(walls) => {
                    for wall in walls.iter_mut() {
                        if !wall.start.is_finite() || !wall.end.is_finite() {
                            return Err(FusionError::schema(
                                &result.source,
                                "wall endpoint has non-finite coordinates",
                            ));
                        }
                        wall.confidence = clamp_confidence(wall.confidence);
                        if !(wall.thickness.is_finite() && wall.thickness > 0.0) {
                            wall.thickness = self.config.default_wall_thickness_px;
                        }
                    }
                }
                DetectorPayload::Doors(openings) | DetectorPayload::Windows(openings) => {
                    for opening in openings.iter_mut() {
                        if !opening.position.is_finite() {
                            return Err(FusionError::schema(
                                &result.source,
                                "opening position has non-finite coordinates",
                            ));
                        }
                        opening.confidence = clamp_confidence(opening.confidence);
                        if !opening.width.is_finite() || opening.width < 0.0 {
                            opening.width = 0.0;
                        }
                    }
                    let before = openings.len();
                    *openings = suppress_duplicate_openings(
                        std::mem::take(openings),
                        self.config.duplicate_opening_px,
                    );
                    if openings.len() < before {
                        debug!(
                            "Source '{}': collapsed {} duplicate openings",
                            result.source,
                            before - openings.len()
                        );
                    }
                }
                DetectorPayload::Dimensions(dimensions) => {
                    for dim in dimensions.iter_mut() {
                        if !dim.start.is_finite() || !dim.end.is_finite() {
                            return Err(FusionError::schema(
                                &result.source,
                                "dimension extent has non-finite coordinates",
                            ));
                        }
                        dim.confidence = clamp_confidence(dim.confidence);
                        if dim.length.is_none() {
                            dim.length = parse_dimension_text(&dim.text);
                        }
                    }
                }
                DetectorPayload::Text(texts) => {
                    for text in texts.iter_mut() {
                        text.confidence = clamp_confidence(text.confidence);
                    }
                }
            }
        }

        Ok(result)
    }

    /// First recognizable room label among texts inside the polygon
    fn label_from_contained_text(
        &self,
        polygon: &[crate::types::Point2D],
        texts: &[TextItem],
    ) -> Option<(String, RoomType)> {
        texts
            .iter()
            .filter(|t| geometry::point_in_polygon(&t.position, polygon))
            .find_map(|t| {
                let room_type = self.vocabulary.classify(&t.text);
                room_type
                    .is_identified()
                    .then(|| (t.text.clone(), room_type))
            })
    }
}

fn check_source(result: &DetectorResult) -> Result<()> {
    if result.source.trim().is_empty() {
        return Err(FusionError::schema("<unnamed>", "source identifier is empty"));
    }
    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(FusionError::schema(
            &result.source,
            format!("source confidence {} outside [0, 1]", result.confidence),
        ));
    }
    Ok(())
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Keep the most confident of any openings closer than `min_distance`
pub fn suppress_duplicate_openings(
    mut openings: Vec<OpeningItem>,
    min_distance: f64,
) -> Vec<OpeningItem> {
    // Stable sort keeps input order among equal confidences
    openings.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<OpeningItem> = Vec::with_capacity(openings.len());
    for opening in openings {
        if kept
            .iter()
            .all(|k| k.position.distance_to(&opening.position) >= min_distance)
        {
            kept.push(opening);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimensionItem, Modality, Point2D, RoomItem, WallItem};
    use crate::units::LengthUnit;

    fn square(size: f64) -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(size, 0.0),
            Point2D::new(size, size),
            Point2D::new(0.0, size),
            Point2D::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_room_labels_are_canonicalized() {
        let normalizer = ResultNormalizer::new(NormalizerConfig::default());
        let result = DetectorResult::new("tesseract", Modality::Ocr, 0.8).with_payload(
            DetectorPayload::Rooms(vec![RoomItem::new(square(100.0), Some("MSTR BDRM"), 1.4)]),
        );

        let output = normalizer.normalize(vec![result]);
        let rooms = output.results[0].rooms();
        assert_eq!(rooms[0].room_type, RoomType::Bedroom);
        assert_eq!(rooms[0].confidence, 1.0);
    }

    #[test]
    fn test_room_labelled_from_contained_text() {
        let normalizer = ResultNormalizer::new(NormalizerConfig::default());
        let result = DetectorResult::new("opencv", Modality::Vision, 0.7)
            .with_payload(DetectorPayload::Rooms(vec![RoomItem::new(square(100.0), None, 0.7)]))
            .with_payload(DetectorPayload::Text(vec![
                TextItem::new("12' x 10'", Point2D::new(50.0, 60.0), 0.9),
                TextItem::new("KITCHEN", Point2D::new(50.0, 40.0), 0.9),
                TextItem::new("BATH", Point2D::new(500.0, 500.0), 0.9),
            ]));

        let output = normalizer.normalize(vec![result]);
        let room = output.results[0].rooms()[0].clone();
        assert_eq!(room.room_type, RoomType::Kitchen);
        assert_eq!(room.label.as_deref(), Some("KITCHEN"));
    }

    #[test]
    fn test_invalid_source_is_dropped_not_fatal() {
        let normalizer = ResultNormalizer::new(NormalizerConfig::default());
        let good = DetectorResult::new("yolo", Modality::ObjectDetection, 0.9);
        let bad = DetectorResult::new("broken", Modality::Vision, f64::NAN);
        let worse = DetectorResult::new("walls", Modality::Vision, 0.5).with_payload(
            DetectorPayload::Walls(vec![WallItem::new(
                Point2D::new(f64::INFINITY, 0.0),
                Point2D::new(0.0, 0.0),
                5.0,
                0.5,
            )]),
        );

        let output = normalizer.normalize(vec![good, bad, worse]);
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.dropped.len(), 2);
        assert_eq!(output.dropped[0].source, "broken");
        assert_eq!(output.dropped[1].source, "walls");
    }

    #[test]
    fn test_missing_wall_thickness_gets_default() {
        let normalizer = ResultNormalizer::new(NormalizerConfig::default());
        let result = DetectorResult::new("opencv", Modality::Vision, 0.7).with_payload(
            DetectorPayload::Walls(vec![WallItem::new(
                Point2D::new(0.0, 0.0),
                Point2D::new(100.0, 0.0),
                0.0,
                0.7,
            )]),
        );
        let output = normalizer.normalize(vec![result]);
        assert_eq!(output.results[0].walls()[0].thickness, 10.0);
    }

    #[test]
    fn test_dimension_text_is_parsed() {
        let normalizer = ResultNormalizer::new(NormalizerConfig::default());
        let result = DetectorResult::new("tesseract", Modality::Ocr, 0.8).with_payload(
            DetectorPayload::Dimensions(vec![DimensionItem::new(
                "12'-0\"",
                Point2D::new(0.0, 0.0),
                Point2D::new(288.0, 0.0),
                0.8,
            )]),
        );
        let output = normalizer.normalize(vec![result]);
        let length = output.results[0].dimensions()[0].length.unwrap();
        assert_eq!(length.unit, LengthUnit::Foot);
        assert_eq!(length.value, 12.0);
    }

    #[test]
    fn test_duplicate_openings_keep_most_confident() {
        let openings = vec![
            OpeningItem::new(Point2D::new(100.0, 100.0), 36.0, 0.6),
            OpeningItem::new(Point2D::new(110.0, 105.0), 36.0, 0.9),
            OpeningItem::new(Point2D::new(300.0, 100.0), 36.0, 0.5),
        ];
        let kept = suppress_duplicate_openings(openings, 30.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].position, Point2D::new(300.0, 100.0));
    }
}
