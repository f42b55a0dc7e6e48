//! Entity fusion
//!
//! Normalized detector results are grouped per entity kind, each group is
//! voted on with the configured strategy, and the selected groups become
//! [`FusedEntity`] values carrying a fused confidence and their provenance.

pub mod grouper;
pub mod strategies;

pub use grouper::{CandidateGroup, CandidateGrouper, GroupMember, SpatialItem};
pub use strategies::{Selection, SourceInfo, VotingContext};

use crate::config::{FusionConfig, VotingStrategy};
use crate::conflicts::ConflictRecord;
use crate::types::{
    Confidence, DetectorResult, DimensionItem, EntityKind, OpeningItem, RoomItem, WallItem,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Flags attached to fused entities by later stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFlag {
    /// Opening with no wall within its thickness
    InvalidPlacement,
    /// Wall with a free endpoint
    Unconnected,
    /// Room with no door path to other rooms
    Disconnected,
    /// Room overlapping another with a near-identical centroid
    SuspectedDuplicate,
    /// Room overlapping another
    Overlapping,
    /// Awaiting manual conflict review
    PendingReview,
}

/// Fused entity with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedEntity<T> {
    /// Stable identifier derived from kind, group and location
    pub id: String,
    pub item: T,
    /// Fused confidence (0.0-1.0)
    pub confidence: Confidence,
    /// Contributing sources, sorted
    pub provenance: Vec<String>,
    /// Agreement between contributing sources' geometry (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<EntityFlag>,
}

impl<T> FusedEntity<T> {
    pub fn flag(&mut self, flag: EntityFlag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn has_flag(&self, flag: EntityFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Run-level metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusionMetadata {
    /// Sources that contributed to the run, in input order
    pub models_used: Vec<String>,
    pub fusion_strategy: VotingStrategy,
    /// Mean fused confidence over all entities
    pub confidence: f64,
    /// Mean fraction of reporting sources supporting each entity
    pub consensus_level: f64,
    pub conflicts: Vec<ConflictRecord>,
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Fused floor plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub rooms: Vec<FusedEntity<RoomItem>>,
    pub walls: Vec<FusedEntity<WallItem>>,
    pub doors: Vec<FusedEntity<OpeningItem>>,
    pub windows: Vec<FusedEntity<OpeningItem>>,
    pub dimensions: Vec<FusedEntity<DimensionItem>>,
    pub metadata: FusionMetadata,
}

impl FusedResult {
    pub fn entity_count(&self) -> usize {
        self.rooms.len()
            + self.walls.len()
            + self.doors.len()
            + self.windows.len()
            + self.dimensions.len()
    }

    fn confidences(&self) -> Vec<f64> {
        self.rooms
            .iter()
            .map(|e| e.confidence)
            .chain(self.walls.iter().map(|e| e.confidence))
            .chain(self.doors.iter().map(|e| e.confidence))
            .chain(self.windows.iter().map(|e| e.confidence))
            .chain(self.dimensions.iter().map(|e| e.confidence))
            .collect()
    }

    fn provenances(&self) -> Vec<(EntityKind, usize)> {
        self.rooms
            .iter()
            .map(|e| (EntityKind::Room, e.provenance.len()))
            .chain(self.walls.iter().map(|e| (EntityKind::Wall, e.provenance.len())))
            .chain(self.doors.iter().map(|e| (EntityKind::Door, e.provenance.len())))
            .chain(self.windows.iter().map(|e| (EntityKind::Window, e.provenance.len())))
            .chain(
                self.dimensions
                    .iter()
                    .map(|e| (EntityKind::Dimension, e.provenance.len())),
            )
            .collect()
    }

    /// Recompute the run-level confidence and consensus from the entities
    pub fn refresh_summary(&mut self, sources: &[DetectorResult]) {
        let confidences = self.confidences();
        self.metadata.confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let shares: Vec<f64> = self
            .provenances()
            .into_iter()
            .map(|(kind, supporters)| {
                let reporting = sources.iter().filter(|s| s.reports(kind)).count();
                if reporting == 0 {
                    0.0
                } else {
                    (supporters as f64 / reporting as f64).min(1.0)
                }
            })
            .collect();
        self.metadata.consensus_level = if shares.is_empty() {
            0.0
        } else {
            shares.iter().sum::<f64>() / shares.len() as f64
        };
    }
}

/// Groups and votes every entity kind
pub struct EntityFuser<'a> {
    config: &'a FusionConfig,
}

impl<'a> EntityFuser<'a> {
    pub fn new(config: &'a FusionConfig) -> Self {
        Self { config }
    }

    /// Fuse normalized results into a [`FusedResult`] (conflicts not yet applied)
    pub fn fuse(&self, results: &[DetectorResult]) -> FusedResult {
        let grouper = CandidateGrouper::new(&self.config.grouping);

        let rooms = self.fuse_kind(EntityKind::Room, results, grouper.group_rooms(results));
        let walls = self.fuse_kind(EntityKind::Wall, results, grouper.group_walls(results));
        let doors = self.fuse_kind(EntityKind::Door, results, grouper.group_doors(results));
        let windows = self.fuse_kind(EntityKind::Window, results, grouper.group_windows(results));
        let dimensions = self.fuse_kind(
            EntityKind::Dimension,
            results,
            grouper.group_dimensions(results),
        );

        let mut models_used: Vec<String> = Vec::new();
        for r in results {
            if !models_used.contains(&r.source) {
                models_used.push(r.source.clone());
            }
        }

        let mut fused = FusedResult {
            rooms,
            walls,
            doors,
            windows,
            dimensions,
            metadata: FusionMetadata {
                models_used,
                fusion_strategy: self.config.voting_strategy,
                confidence: 0.0,
                consensus_level: 0.0,
                conflicts: Vec::new(),
                processing_time_ms: 0,
            },
        };
        fused.refresh_summary(results);
        fused
    }

    fn source_infos(&self, kind: EntityKind, results: &[DetectorResult]) -> Vec<SourceInfo> {
        results
            .iter()
            .map(|r| SourceInfo {
                name: r.source.clone(),
                modality: r.modality,
                confidence: r.confidence,
                weight: self.config.weight_for(&r.source),
                reports_kind: r.reports(kind),
            })
            .collect()
    }

    fn fuse_kind<T: SpatialItem>(
        &self,
        kind: EntityKind,
        results: &[DetectorResult],
        groups: Vec<CandidateGroup<T>>,
    ) -> Vec<FusedEntity<T>> {
        let sources = self.source_infos(kind, results);
        let ctx = VotingContext {
            kind,
            config: self.config,
            sources: &sources,
        };

        let vote = strategies::strategy_fn::<T>(self.config.voting_strategy);
        let selections = vote(&groups, &ctx);

        debug!(
            "{} {}: {} candidate groups, {} selected",
            self.config.voting_strategy,
            kind,
            groups.len(),
            selections.len()
        );

        selections
            .into_iter()
            .map(|s| assemble(kind, &groups[s.group], s))
            .collect()
    }
}

/// Deterministic id for a fused entity
pub fn entity_id(kind: EntityKind, group: usize, anchor: &crate::types::Point2D) -> String {
    let name = format!("{}:{}:{:.1}:{:.1}", kind, group, anchor.x, anchor.y);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn assemble<T: SpatialItem>(
    kind: EntityKind,
    group: &CandidateGroup<T>,
    selection: Selection,
) -> FusedEntity<T> {
    let mut item = group.members[selection.representative].item.clone();
    let others: Vec<&T> = group
        .members
        .iter()
        .enumerate()
        .filter(|(i, m)| *i != selection.representative && selection.provenance.contains(&m.source))
        .map(|(_, m)| &m.item)
        .collect();

    let agreement = item.agreement(&others);
    item.merge_attributes(&others);

    FusedEntity {
        id: entity_id(kind, selection.group, &group.anchor()),
        item,
        confidence: selection.confidence,
        provenance: selection.provenance,
        agreement,
        flags: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectorPayload, Modality, Point2D, RoomType};

    fn room(cx: f64, room_type: RoomType, confidence: f64) -> RoomItem {
        let mut r = RoomItem::new(
            vec![
                Point2D::new(cx - 40.0, 60.0),
                Point2D::new(cx + 40.0, 60.0),
                Point2D::new(cx + 40.0, 140.0),
                Point2D::new(cx - 40.0, 140.0),
                Point2D::new(cx - 40.0, 60.0),
            ],
            None,
            confidence,
        );
        r.room_type = room_type;
        r
    }

    #[test]
    fn test_fused_ids_are_deterministic() {
        let results = vec![
            DetectorResult::new("yolo", Modality::ObjectDetection, 0.9).with_payload(
                DetectorPayload::Rooms(vec![room(100.0, RoomType::Bedroom, 0.9)]),
            ),
            DetectorResult::new("gpt-vision", Modality::Generative, 0.85).with_payload(
                DetectorPayload::Rooms(vec![room(102.0, RoomType::Bedroom, 0.85)]),
            ),
        ];
        let config = FusionConfig::default();
        let first = EntityFuser::new(&config).fuse(&results);
        let second = EntityFuser::new(&config).fuse(&results);

        assert_eq!(first.rooms.len(), 1);
        assert_eq!(first.rooms[0].id, second.rooms[0].id);
        assert_eq!(first.rooms[0].provenance, vec!["gpt-vision", "yolo"]);
        assert_eq!(first.metadata.models_used, vec!["yolo", "gpt-vision"]);
        assert!((first.metadata.consensus_level - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_entity_flags_are_unique() {
        let mut entity = FusedEntity {
            id: "x".to_string(),
            item: (),
            confidence: 0.5,
            provenance: vec![],
            agreement: None,
            flags: vec![],
        };
        entity.flag(EntityFlag::Overlapping);
        entity.flag(EntityFlag::Overlapping);
        assert_eq!(entity.flags, vec![EntityFlag::Overlapping]);
    }
}
