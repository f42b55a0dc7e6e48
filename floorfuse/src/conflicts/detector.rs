//! Cross-source conflict detection

use super::{ConflictKind, ConflictValue, DetectedConflict};
use crate::config::{ConflictConfig, GroupingConfig};
use crate::fusion::CandidateGrouper;
use crate::types::{DetectorResult, EntityKind, Point2D};
use tracing::{debug, info};

/// Finds disagreements between normalized detector results
pub struct ConflictDetector<'a> {
    config: &'a ConflictConfig,
    grouping: &'a GroupingConfig,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(config: &'a ConflictConfig, grouping: &'a GroupingConfig) -> Self {
        Self { config, grouping }
    }

    /// Detect all conflicts across sources
    ///
    /// # Algorithm
    /// 1. Room counts: sources reporting rooms disagree by more than the threshold
    /// 2. Room types: rooms from different sources at the same location carry
    ///    different identified types
    /// 3. Dimensions: readings for the same extent differ by more than the
    ///    relative tolerance
    pub fn detect(&self, results: &[DetectorResult]) -> Vec<DetectedConflict> {
        let mut conflicts = Vec::new();
        conflicts.extend(self.detect_room_count(results));
        conflicts.extend(self.detect_room_types(results));
        conflicts.extend(self.detect_dimensions(results));

        info!(
            "Conflict detection: {} conflicts across {} sources",
            conflicts.len(),
            results.len()
        );
        conflicts
    }

    fn detect_room_count(&self, results: &[DetectorResult]) -> Option<DetectedConflict> {
        let reporting: Vec<&DetectorResult> = results
            .iter()
            .filter(|r| r.reports(EntityKind::Room))
            .collect();
        let counts: Vec<usize> = reporting.iter().map(|r| r.rooms().len()).collect();

        let max = counts.iter().copied().max()?;
        let min = counts.iter().copied().min()?;
        if max - min <= self.config.room_count_threshold {
            return None;
        }

        debug!("Room count conflict: min={} max={}", min, max);
        Some(DetectedConflict {
            kind: ConflictKind::RoomCount,
            sources: reporting.iter().map(|r| r.source.clone()).collect(),
            values: counts.into_iter().map(ConflictValue::Count).collect(),
            confidences: reporting.iter().map(|r| r.confidence).collect(),
            location: None,
        })
    }

    fn detect_room_types(&self, results: &[DetectorResult]) -> Vec<DetectedConflict> {
        let tol = self.config.room_match_tolerance_px;

        // Identified rooms per source: (source index, centroid, room)
        let rooms: Vec<Vec<_>> = results
            .iter()
            .map(|r| {
                r.rooms()
                    .into_iter()
                    .filter(|room| room.room_type.is_identified())
                    .map(|room| (room.centroid(), room))
                    .collect()
            })
            .collect();

        let mut locations: Vec<Point2D> = Vec::new();
        for i in 0..rooms.len() {
            for j in (i + 1)..rooms.len() {
                for (ca, a) in &rooms[i] {
                    for (cb, b) in &rooms[j] {
                        if a.room_type != b.room_type
                            && ca.distance_to(cb) < tol
                            && locations.iter().all(|l| l.distance_to(ca) >= tol)
                        {
                            locations.push(*ca);
                        }
                    }
                }
            }
        }

        locations
            .into_iter()
            .filter_map(|location| {
                let mut conflict = DetectedConflict {
                    kind: ConflictKind::RoomType,
                    sources: Vec::new(),
                    values: Vec::new(),
                    confidences: Vec::new(),
                    location: Some(location),
                };
                for (source_rooms, result) in rooms.iter().zip(results) {
                    let nearest = source_rooms
                        .iter()
                        .map(|(c, room)| (c.distance_to(&location), room))
                        .filter(|(d, _)| *d < tol)
                        .min_by(|a, b| a.0.total_cmp(&b.0));
                    if let Some((_, room)) = nearest {
                        conflict.sources.push(result.source.clone());
                        conflict.values.push(ConflictValue::RoomType(room.room_type));
                        conflict.confidences.push(room.confidence);
                    }
                }

                let distinct = conflict
                    .values
                    .iter()
                    .any(|v| !v.same_as(&conflict.values[0]));
                if distinct {
                    debug!(
                        "Room type conflict at ({:.0}, {:.0}) between {:?}",
                        location.x, location.y, conflict.sources
                    );
                    Some(conflict)
                } else {
                    None
                }
            })
            .collect()
    }

    fn detect_dimensions(&self, results: &[DetectorResult]) -> Vec<DetectedConflict> {
        let groups = CandidateGrouper::new(self.grouping).group_dimensions(results);

        groups
            .iter()
            .filter_map(|group| {
                let readings: Vec<(String, f64, f64)> = group
                    .best_per_source()
                    .into_iter()
                    .filter_map(|m| {
                        m.item
                            .length
                            .map(|l| (m.source.clone(), l.to_meters(), m.item.confidence))
                    })
                    .collect();
                if readings.len() < 2 {
                    return None;
                }

                let max = readings.iter().map(|r| r.1).fold(f64::NEG_INFINITY, f64::max);
                let min = readings.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
                if max <= 0.0 || (max - min) / max <= self.config.dimension_relative_tolerance {
                    return None;
                }

                debug!("Dimension conflict: {:.3} m vs {:.3} m", min, max);
                Some(DetectedConflict {
                    kind: ConflictKind::Dimension,
                    sources: readings.iter().map(|r| r.0.clone()).collect(),
                    values: readings.iter().map(|r| ConflictValue::Length(r.1)).collect(),
                    confidences: readings.iter().map(|r| r.2).collect(),
                    location: Some(group.anchor()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectorPayload, DimensionItem, Modality, RoomItem, RoomType};
    use crate::units::{Length, LengthUnit};

    fn room_at(cx: f64, cy: f64, room_type: RoomType, confidence: f64) -> RoomItem {
        let mut room = RoomItem::new(
            vec![
                Point2D::new(cx - 30.0, cy - 30.0),
                Point2D::new(cx + 30.0, cy - 30.0),
                Point2D::new(cx + 30.0, cy + 30.0),
                Point2D::new(cx - 30.0, cy + 30.0),
                Point2D::new(cx - 30.0, cy - 30.0),
            ],
            None,
            confidence,
        );
        room.room_type = room_type;
        room
    }

    fn source_with_rooms(name: &str, rooms: Vec<RoomItem>) -> DetectorResult {
        DetectorResult::new(name, Modality::Vision, 0.8).with_payload(DetectorPayload::Rooms(rooms))
    }

    #[test]
    fn test_room_count_conflict_above_threshold() {
        let config = ConflictConfig::default();
        let grouping = GroupingConfig::default();
        let detector = ConflictDetector::new(&config, &grouping);

        let few = source_with_rooms("a", vec![room_at(100.0, 100.0, RoomType::Bedroom, 0.8)]);
        let many = source_with_rooms(
            "b",
            (0..4)
                .map(|i| room_at(100.0 + 200.0 * i as f64, 100.0, RoomType::Bedroom, 0.8))
                .collect(),
        );

        let conflicts = detector.detect(&[few, many]);
        let count = conflicts
            .iter()
            .find(|c| c.kind == ConflictKind::RoomCount)
            .unwrap();
        assert_eq!(count.values, vec![ConflictValue::Count(1), ConflictValue::Count(4)]);
    }

    #[test]
    fn test_room_count_within_threshold() {
        let config = ConflictConfig::default();
        let grouping = GroupingConfig::default();
        let detector = ConflictDetector::new(&config, &grouping);

        let a = source_with_rooms("a", vec![room_at(100.0, 100.0, RoomType::Bedroom, 0.8)]);
        let b = source_with_rooms(
            "b",
            (0..3)
                .map(|i| room_at(100.0 + 200.0 * i as f64, 100.0, RoomType::Bedroom, 0.8))
                .collect(),
        );
        assert!(detector
            .detect(&[a, b])
            .iter()
            .all(|c| c.kind != ConflictKind::RoomCount));
    }

    #[test]
    fn test_room_type_conflict_collects_every_source() {
        let config = ConflictConfig::default();
        let grouping = GroupingConfig::default();
        let detector = ConflictDetector::new(&config, &grouping);

        let results = vec![
            source_with_rooms("a", vec![room_at(100.0, 100.0, RoomType::Bedroom, 0.9)]),
            source_with_rooms("b", vec![room_at(105.0, 98.0, RoomType::Office, 0.6)]),
            source_with_rooms("c", vec![room_at(102.0, 101.0, RoomType::Bedroom, 0.7)]),
        ];

        let conflicts = detector.detect(&results);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::RoomType);
        assert_eq!(conflicts[0].sources, vec!["a", "b", "c"]);
        assert_eq!(conflicts[0].confidences, vec![0.9, 0.6, 0.7]);
    }

    #[test]
    fn test_unidentified_rooms_do_not_conflict() {
        let config = ConflictConfig::default();
        let grouping = GroupingConfig::default();
        let detector = ConflictDetector::new(&config, &grouping);

        let results = vec![
            source_with_rooms("a", vec![room_at(100.0, 100.0, RoomType::Bedroom, 0.9)]),
            source_with_rooms("b", vec![room_at(100.0, 100.0, RoomType::Unidentified, 0.6)]),
        ];
        assert!(detector.detect(&results).is_empty());
    }

    #[test]
    fn test_dimension_conflict() {
        let config = ConflictConfig::default();
        let grouping = GroupingConfig::default();
        let detector = ConflictDetector::new(&config, &grouping);

        let dim = |text: &str, feet: f64, confidence: f64| {
            let mut d = DimensionItem::new(
                text,
                Point2D::new(0.0, 0.0),
                Point2D::new(240.0, 0.0),
                confidence,
            );
            d.length = Some(Length::new(feet, LengthUnit::Foot));
            d
        };
        let results = vec![
            DetectorResult::new("tesseract", Modality::Ocr, 0.8)
                .with_payload(DetectorPayload::Dimensions(vec![dim("10'", 10.0, 0.8)])),
            DetectorResult::new("gpt-vision", Modality::Generative, 0.9)
                .with_payload(DetectorPayload::Dimensions(vec![dim("12'", 12.0, 0.9)])),
        ];

        let conflicts = detector.detect(&results);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Dimension);
        assert_eq!(conflicts[0].location, Some(Point2D::new(120.0, 0.0)));
    }
}
