//! Detector result fixtures
//!
//! The three-room plan places 100 x 100 px rooms centred on (100, 100),
//! (250, 100) and (400, 100) with 50 px gaps between them.

#![allow(dead_code)]

use floorfuse::config::{FusionConfig, VotingStrategy};
use floorfuse::types::{DetectorPayload, DetectorResult, Modality, Point2D, RoomItem};
use std::collections::BTreeMap;

pub const ROOM_CENTERS: [(f64, f64, &str); 3] = [
    (100.0, 100.0, "Bedroom"),
    (250.0, 100.0, "Kitchen"),
    (400.0, 100.0, "Living Room"),
];

/// Closed square ring of side `size` centred on (cx, cy)
pub fn closed_rect(cx: f64, cy: f64, size: f64) -> Vec<Point2D> {
    let h = size / 2.0;
    vec![
        Point2D::new(cx - h, cy - h),
        Point2D::new(cx + h, cy - h),
        Point2D::new(cx + h, cy + h),
        Point2D::new(cx - h, cy + h),
        Point2D::new(cx - h, cy - h),
    ]
}

/// Three sides of a square; the ring never returns to its start
pub fn open_polyline(cx: f64, cy: f64, size: f64) -> Vec<Point2D> {
    let mut points = closed_rect(cx, cy, size);
    points.truncate(4);
    points
}

pub fn room(cx: f64, cy: f64, label: &str, confidence: f64) -> RoomItem {
    RoomItem::new(closed_rect(cx, cy, 100.0), Some(label), confidence)
}

/// Detector result reporting the given rooms
pub fn detector(source: &str, modality: Modality, confidence: f64, rooms: Vec<RoomItem>) -> DetectorResult {
    DetectorResult::new(source, modality, confidence).with_payload(DetectorPayload::Rooms(rooms))
}

/// Rooms of the three-room plan, the first `count` of them
pub fn three_room_plan(count: usize, confidence: f64) -> Vec<RoomItem> {
    ROOM_CENTERS
        .iter()
        .take(count)
        .map(|(x, y, label)| room(*x, *y, label, confidence))
        .collect()
}

/// OCR sees two rooms, the object detector and the vision model all three
pub fn e2e_sources() -> Vec<DetectorResult> {
    vec![
        detector("ocr", Modality::Ocr, 0.82, three_room_plan(2, 0.82)),
        detector("yolo", Modality::ObjectDetection, 0.91, three_room_plan(3, 0.91)),
        detector("gpt-vision", Modality::Generative, 0.88, three_room_plan(3, 0.88)),
    ]
}

pub fn e2e_config() -> FusionConfig {
    let weights: BTreeMap<String, f64> = [("ocr", 0.2), ("yolo", 0.4), ("gpt-vision", 0.4)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    FusionConfig::builder()
        .voting_strategy(VotingStrategy::Weighted)
        .weights(weights)
        .record_timing(false)
        .build()
        .unwrap()
}
