//! Candidate grouping
//!
//! Collects items from all sources that plausibly describe the same physical
//! entity. Each entity kind defines its own co-reference test through
//! [`SpatialItem`]; grouping is greedy in source order, which keeps results
//! deterministic for a given input order.

use crate::config::GroupingConfig;
use crate::types::{
    Confidence, DetectorResult, DimensionItem, EntityKind, OpeningItem, Point2D, RoomItem,
    WallItem,
};

/// Item that can be grouped across sources
pub trait SpatialItem: Clone {
    fn item_confidence(&self) -> Confidence;

    /// Reference point used for ids and conflict locations
    fn anchor(&self) -> Point2D;

    /// Whether `self` and `other` describe the same physical entity
    fn co_referent(&self, other: &Self, config: &GroupingConfig) -> bool;

    /// Distance used to pick the closest group when several match
    fn match_distance(&self, other: &Self) -> f64 {
        self.anchor().distance_to(&other.anchor())
    }

    /// Whether two fused candidates would occupy the same space
    fn overlaps(&self, other: &Self, config: &GroupingConfig) -> bool {
        self.co_referent(other, config)
    }

    /// Agreement (0-1) between a representative and the other members
    fn agreement(&self, _others: &[&Self]) -> Option<f64> {
        None
    }

    /// Fill attributes missing on the representative from other members
    fn merge_attributes(&mut self, _others: &[&Self]) {}
}

fn relative_agreement(reference: f64, values: impl Iterator<Item = f64>) -> Option<f64> {
    if reference <= 0.0 {
        return None;
    }
    let deviations: Vec<f64> = values
        .map(|v| ((v - reference).abs() / reference).min(1.0))
        .collect();
    if deviations.is_empty() {
        return None;
    }
    Some(1.0 - deviations.iter().sum::<f64>() / deviations.len() as f64)
}

fn room_bucket(point: &Point2D, cell: f64) -> (i64, i64) {
    let cell = if cell > 0.0 { cell } else { 1.0 };
    ((point.x / cell).round() as i64, (point.y / cell).round() as i64)
}

impl SpatialItem for RoomItem {
    fn item_confidence(&self) -> Confidence {
        self.confidence
    }

    fn anchor(&self) -> Point2D {
        self.centroid()
    }

    fn co_referent(&self, other: &Self, config: &GroupingConfig) -> bool {
        self.room_type == other.room_type
            && room_bucket(&self.centroid(), config.room_cell_px)
                == room_bucket(&other.centroid(), config.room_cell_px)
    }

    fn overlaps(&self, other: &Self, config: &GroupingConfig) -> bool {
        self.bbox().overlap_ratio(&other.bbox()) > config.room_overlap_ratio
    }

    fn agreement(&self, others: &[&Self]) -> Option<f64> {
        relative_agreement(self.area_px(), others.iter().map(|r| r.area_px()))
    }

    fn merge_attributes(&mut self, others: &[&Self]) {
        if self.label.is_none() {
            self.label = others.iter().find_map(|r| r.label.clone());
        }
    }
}

impl SpatialItem for WallItem {
    fn item_confidence(&self) -> Confidence {
        self.confidence
    }

    fn anchor(&self) -> Point2D {
        self.midpoint()
    }

    fn co_referent(&self, other: &Self, config: &GroupingConfig) -> bool {
        let tol = config.wall_endpoint_tolerance_px;
        let same = self.start.distance_to(&other.start) <= tol && self.end.distance_to(&other.end) <= tol;
        let reversed = self.start.distance_to(&other.end) <= tol && self.end.distance_to(&other.start) <= tol;
        same || reversed
    }

    fn match_distance(&self, other: &Self) -> f64 {
        let same = self.start.distance_to(&other.start) + self.end.distance_to(&other.end);
        let reversed = self.start.distance_to(&other.end) + self.end.distance_to(&other.start);
        same.min(reversed)
    }

    fn agreement(&self, others: &[&Self]) -> Option<f64> {
        relative_agreement(self.length(), others.iter().map(|w| w.length()))
    }

    fn merge_attributes(&mut self, others: &[&Self]) {
        if self.wall_kind == crate::types::WallKind::Unknown {
            if let Some(kind) = others
                .iter()
                .map(|w| w.wall_kind)
                .find(|k| *k != crate::types::WallKind::Unknown)
            {
                self.wall_kind = kind;
            }
        }
    }
}

impl SpatialItem for OpeningItem {
    fn item_confidence(&self) -> Confidence {
        self.confidence
    }

    fn anchor(&self) -> Point2D {
        self.position
    }

    fn co_referent(&self, other: &Self, config: &GroupingConfig) -> bool {
        self.position.distance_to(&other.position) <= config.opening_tolerance_px
    }

    fn agreement(&self, others: &[&Self]) -> Option<f64> {
        relative_agreement(
            self.width,
            others.iter().map(|o| o.width).filter(|w| *w > 0.0),
        )
    }

    fn merge_attributes(&mut self, others: &[&Self]) {
        if self.width <= 0.0 {
            if let Some(width) = others.iter().map(|o| o.width).find(|w| *w > 0.0) {
                self.width = width;
            }
        }
        if self.label.is_none() {
            self.label = others.iter().find_map(|o| o.label.clone());
        }
    }
}

impl SpatialItem for DimensionItem {
    fn item_confidence(&self) -> Confidence {
        self.confidence
    }

    fn anchor(&self) -> Point2D {
        DimensionItem::anchor(self)
    }

    fn co_referent(&self, other: &Self, config: &GroupingConfig) -> bool {
        self.anchor().distance_to(&other.anchor()) <= config.dimension_tolerance_px
    }

    fn agreement(&self, others: &[&Self]) -> Option<f64> {
        let reference = self.length?.to_meters();
        relative_agreement(
            reference,
            others.iter().filter_map(|d| d.length.map(|l| l.to_meters())),
        )
    }

    fn merge_attributes(&mut self, others: &[&Self]) {
        if self.length.is_none() {
            if let Some(other) = others.iter().find(|d| d.length.is_some()) {
                self.length = other.length;
                self.text = other.text.clone();
            }
        }
    }
}

/// One source's item inside a candidate group
#[derive(Debug, Clone)]
pub struct GroupMember<T> {
    pub source: String,
    pub source_index: usize,
    pub source_confidence: Confidence,
    pub item: T,
}

/// Items from one or more sources believed to be the same entity
#[derive(Debug, Clone)]
pub struct CandidateGroup<T> {
    pub kind: EntityKind,
    pub members: Vec<GroupMember<T>>,
}

impl<T: SpatialItem> CandidateGroup<T> {
    /// Distinct sources in first-seen order
    pub fn sources(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.members {
            if !seen.contains(&m.source.as_str()) {
                seen.push(&m.source);
            }
        }
        seen
    }

    pub fn source_count(&self) -> usize {
        self.sources().len()
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.members.iter().any(|m| m.source == source)
    }

    /// Each distinct source's most confident member
    pub fn best_per_source(&self) -> Vec<&GroupMember<T>> {
        self.sources()
            .into_iter()
            .filter_map(|s| {
                self.members
                    .iter()
                    .filter(|m| m.source == s)
                    .fold(None, |best: Option<&GroupMember<T>>, m| match best {
                        Some(b) if b.item.item_confidence() >= m.item.item_confidence() => Some(b),
                        _ => Some(m),
                    })
            })
            .collect()
    }

    /// Mean item confidence over each source's best member
    pub fn mean_confidence(&self) -> f64 {
        let best = self.best_per_source();
        if best.is_empty() {
            return 0.0;
        }
        best.iter().map(|m| m.item.item_confidence()).sum::<f64>() / best.len() as f64
    }

    /// Index of the most confident member; the earliest wins ties
    pub fn representative_index(&self) -> usize {
        let mut best = 0;
        for (i, m) in self.members.iter().enumerate() {
            if m.item.item_confidence() > self.members[best].item.item_confidence() {
                best = i;
            }
        }
        best
    }

    /// Index of the given source's most confident member
    pub fn member_index_for(&self, source: &str) -> Option<usize> {
        let mut found: Option<usize> = None;
        for (i, m) in self.members.iter().enumerate().filter(|(_, m)| m.source == source) {
            match found {
                Some(f) if self.members[f].item.item_confidence() >= m.item.item_confidence() => {}
                _ => found = Some(i),
            }
        }
        found
    }

    pub fn anchor(&self) -> Point2D {
        self.members
            .first()
            .map(|m| m.item.anchor())
            .unwrap_or_default()
    }
}

/// Groups items of each kind across sources
pub struct CandidateGrouper<'a> {
    config: &'a GroupingConfig,
}

impl<'a> CandidateGrouper<'a> {
    pub fn new(config: &'a GroupingConfig) -> Self {
        Self { config }
    }

    pub fn group_rooms(&self, results: &[DetectorResult]) -> Vec<CandidateGroup<RoomItem>> {
        self.group(EntityKind::Room, results, |r| r.rooms())
    }

    pub fn group_walls(&self, results: &[DetectorResult]) -> Vec<CandidateGroup<WallItem>> {
        self.group(EntityKind::Wall, results, |r| r.walls())
    }

    pub fn group_doors(&self, results: &[DetectorResult]) -> Vec<CandidateGroup<OpeningItem>> {
        self.group(EntityKind::Door, results, |r| r.doors())
    }

    pub fn group_windows(&self, results: &[DetectorResult]) -> Vec<CandidateGroup<OpeningItem>> {
        self.group(EntityKind::Window, results, |r| r.windows())
    }

    pub fn group_dimensions(
        &self,
        results: &[DetectorResult],
    ) -> Vec<CandidateGroup<DimensionItem>> {
        self.group(EntityKind::Dimension, results, |r| r.dimensions())
    }

    /// Greedy grouping: each item joins the closest co-referent group, or
    /// starts a new one
    pub fn group<T, F>(
        &self,
        kind: EntityKind,
        results: &[DetectorResult],
        extract: F,
    ) -> Vec<CandidateGroup<T>>
    where
        T: SpatialItem,
        F: Fn(&DetectorResult) -> Vec<&T>,
    {
        let mut groups: Vec<CandidateGroup<T>> = Vec::new();

        for (source_index, result) in results.iter().enumerate() {
            for item in extract(result) {
                let target = groups
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| g.members[0].item.co_referent(item, self.config))
                    .map(|(i, g)| (i, g.members[0].item.match_distance(item)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(i, _)| i);

                let member = GroupMember {
                    source: result.source.clone(),
                    source_index,
                    source_confidence: result.confidence,
                    item: item.clone(),
                };

                match target {
                    Some(i) => groups[i].members.push(member),
                    None => groups.push(CandidateGroup {
                        kind,
                        members: vec![member],
                    }),
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectorPayload, Modality, RoomType};

    fn rect_room(cx: f64, cy: f64, room_type: RoomType, confidence: f64) -> RoomItem {
        let mut room = RoomItem::new(
            vec![
                Point2D::new(cx - 40.0, cy - 40.0),
                Point2D::new(cx + 40.0, cy - 40.0),
                Point2D::new(cx + 40.0, cy + 40.0),
                Point2D::new(cx - 40.0, cy + 40.0),
                Point2D::new(cx - 40.0, cy - 40.0),
            ],
            None,
            confidence,
        );
        room.room_type = room_type;
        room
    }

    #[test]
    fn test_rooms_group_by_bucket_and_type() {
        let a = DetectorResult::new("a", Modality::Vision, 0.9).with_payload(
            DetectorPayload::Rooms(vec![
                rect_room(100.0, 100.0, RoomType::Bedroom, 0.9),
                rect_room(300.0, 100.0, RoomType::Kitchen, 0.9),
            ]),
        );
        let b = DetectorResult::new("b", Modality::Ocr, 0.7).with_payload(
            DetectorPayload::Rooms(vec![
                rect_room(104.0, 97.0, RoomType::Bedroom, 0.7),
                rect_room(302.0, 100.0, RoomType::Office, 0.7),
            ]),
        );

        let config = GroupingConfig::default();
        let groups = CandidateGrouper::new(&config).group_rooms(&[a, b]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].sources(), vec!["a", "b"]);
        assert_eq!(groups[1].sources(), vec!["a"]);
        assert_eq!(groups[2].sources(), vec!["b"]);
    }

    #[test]
    fn test_reversed_walls_are_co_referent() {
        let config = GroupingConfig::default();
        let w1 = WallItem::new(Point2D::new(0.0, 0.0), Point2D::new(200.0, 0.0), 8.0, 0.8);
        let w2 = WallItem::new(Point2D::new(198.0, 3.0), Point2D::new(4.0, -2.0), 8.0, 0.6);
        let w3 = WallItem::new(Point2D::new(0.0, 100.0), Point2D::new(200.0, 100.0), 8.0, 0.6);
        assert!(w1.co_referent(&w2, &config));
        assert!(!w1.co_referent(&w3, &config));
    }

    #[test]
    fn test_representative_prefers_confidence_then_order() {
        let group = CandidateGroup {
            kind: EntityKind::Door,
            members: vec![
                GroupMember {
                    source: "a".into(),
                    source_index: 0,
                    source_confidence: 0.8,
                    item: OpeningItem::new(Point2D::new(0.0, 0.0), 30.0, 0.8),
                },
                GroupMember {
                    source: "b".into(),
                    source_index: 1,
                    source_confidence: 0.9,
                    item: OpeningItem::new(Point2D::new(2.0, 0.0), 30.0, 0.9),
                },
                GroupMember {
                    source: "c".into(),
                    source_index: 2,
                    source_confidence: 0.9,
                    item: OpeningItem::new(Point2D::new(1.0, 0.0), 30.0, 0.9),
                },
            ],
        };
        assert_eq!(group.representative_index(), 1);
        assert!((group.mean_confidence() - (0.8 + 0.9 + 0.9) / 3.0).abs() < 1e-12);
    }
}
