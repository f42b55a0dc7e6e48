//! Conflict resolution policies and application to the fused result

use super::arbiter::{ArbitrationDecision, ArbitrationRequest, ArbitrationVerdict, Arbiter};
use super::{
    ConflictKind, ConflictRecord, ConflictValue, DetectedConflict, ResolutionMethod,
    ResolutionStatus,
};
use crate::config::{ConflictConfig, ConflictPolicy};
use crate::error::FusionError;
use crate::fusion::{EntityFlag, FusedResult};
use crate::types::Confidence;
use crate::units::Length;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Value chosen for a conflict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub value: ConflictValue,
    pub confidence: Confidence,
    pub method: ResolutionMethod,
    pub status: ResolutionStatus,
    pub compromise: bool,
}

type ResolutionFn = fn(&DetectedConflict) -> Resolution;

/// Synchronous resolution function for a policy
///
/// External arbitration maps to highest confidence, which is also its
/// fallback when the arbiter is unavailable.
fn resolution_fn(policy: ConflictPolicy) -> ResolutionFn {
    match policy {
        ConflictPolicy::HighestConfidence => resolve_highest_confidence,
        ConflictPolicy::Consensus => resolve_consensus,
        ConflictPolicy::ExternalArbitration => resolve_highest_confidence,
        ConflictPolicy::Manual => resolve_manual,
    }
}

/// Value of the most confident source; the earliest source wins ties
pub fn resolve_highest_confidence(conflict: &DetectedConflict) -> Resolution {
    let mut best = 0;
    for (i, c) in conflict.confidences.iter().enumerate() {
        if *c > conflict.confidences[best] {
            best = i;
        }
    }
    Resolution {
        value: conflict.values[best],
        confidence: conflict.confidences.get(best).copied().unwrap_or(0.0),
        method: ResolutionMethod::HighestConfidence,
        status: ResolutionStatus::Resolved,
        compromise: false,
    }
}

/// Most frequent value; ties go to the value reported first. Confidence is
/// the winning share of reports.
pub fn resolve_consensus(conflict: &DetectedConflict) -> Resolution {
    let mut tallies: Vec<(ConflictValue, usize)> = Vec::new();
    for value in &conflict.values {
        match tallies.iter_mut().find(|(v, _)| v.same_as(value)) {
            Some((_, count)) => *count += 1,
            None => tallies.push((*value, 1)),
        }
    }

    let mut winner = 0;
    for (i, (_, count)) in tallies.iter().enumerate() {
        if *count > tallies[winner].1 {
            winner = i;
        }
    }

    let total = conflict.values.len().max(1);
    Resolution {
        value: tallies[winner].0,
        confidence: tallies[winner].1 as f64 / total as f64,
        method: ResolutionMethod::Consensus,
        status: ResolutionStatus::Resolved,
        compromise: false,
    }
}

/// Leave the conflict for review; the first reported value is a placeholder
pub fn resolve_manual(conflict: &DetectedConflict) -> Resolution {
    Resolution {
        value: conflict.values[0],
        confidence: 0.0,
        method: ResolutionMethod::Manual,
        status: ResolutionStatus::PendingReview,
        compromise: false,
    }
}

/// Settles detected conflicts with the configured policy
pub struct ConflictResolver {
    policy: ConflictPolicy,
    arbiter: Option<Arc<dyn Arbiter>>,
    timeout: Duration,
    memo: HashMap<String, ArbitrationVerdict>,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            arbiter: None,
            timeout: Duration::from_secs(5),
            memo: HashMap::new(),
        }
    }

    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>, timeout: Duration) -> Self {
        self.arbiter = Some(arbiter);
        self.timeout = timeout;
        self
    }

    /// Resolve every conflict in order
    pub async fn resolve_all(&mut self, conflicts: Vec<DetectedConflict>) -> Vec<ConflictRecord> {
        let mut records = Vec::with_capacity(conflicts.len());
        for conflict in conflicts {
            if conflict.values.is_empty() {
                continue;
            }
            let resolution = self.resolve(&conflict).await;
            debug!(
                "{} conflict resolved to {} via {:?} ({:?})",
                conflict.kind, resolution.value, resolution.method, resolution.status
            );
            records.push(ConflictRecord {
                kind: conflict.kind,
                conflicting_sources: conflict.sources,
                conflicting_values: conflict.values,
                source_confidences: conflict.confidences,
                resolution: resolution.value,
                method: resolution.method,
                confidence: resolution.confidence.clamp(0.0, 1.0),
                status: resolution.status,
                location: conflict.location,
                compromise: resolution.compromise,
            });
        }
        records
    }

    async fn resolve(&mut self, conflict: &DetectedConflict) -> Resolution {
        if self.policy != ConflictPolicy::ExternalArbitration {
            return resolution_fn(self.policy)(conflict);
        }

        match self.arbitrate(conflict).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Arbitration unavailable ({}); using highest confidence", e);
                Resolution {
                    status: ResolutionStatus::Degraded,
                    ..resolve_highest_confidence(conflict)
                }
            }
        }
    }

    async fn arbitrate(&mut self, conflict: &DetectedConflict) -> Result<Resolution, FusionError> {
        let request = ArbitrationRequest::from(conflict);
        let signature = request.signature();

        let verdict = match self.memo.get(&signature) {
            Some(verdict) => {
                debug!("Reusing arbitration verdict for {}", signature);
                *verdict
            }
            None => {
                let arbiter = self
                    .arbiter
                    .as_ref()
                    .ok_or_else(|| FusionError::Arbitration("no arbiter configured".to_string()))?;
                let verdict = tokio::time::timeout(self.timeout, arbiter.arbitrate(&request))
                    .await
                    .map_err(|_| FusionError::ArbitrationTimeout(self.timeout))??;
                info!("Arbiter {} decided {} conflict", arbiter.name(), conflict.kind);
                self.memo.insert(signature, verdict);
                verdict
            }
        };

        let (value, compromise) = match verdict.decision {
            ArbitrationDecision::Pick { index } => {
                let value = conflict.values.get(index).copied().ok_or_else(|| {
                    FusionError::Arbitration(format!(
                        "verdict index {} out of range for {} values",
                        index,
                        conflict.values.len()
                    ))
                })?;
                (value, false)
            }
            ArbitrationDecision::Compromise { value } => {
                if std::mem::discriminant(&value) != std::mem::discriminant(&conflict.values[0]) {
                    return Err(FusionError::Arbitration(format!(
                        "compromise value {} does not match the conflict's value kind",
                        value
                    )));
                }
                let reported = conflict.values.iter().any(|v| v.same_as(&value));
                (value, !reported)
            }
        };

        Ok(Resolution {
            value,
            confidence: verdict.confidence,
            method: ResolutionMethod::ExternalArbitration,
            status: ResolutionStatus::Resolved,
            compromise,
        })
    }
}

/// Apply resolved conflicts to the fused result
///
/// Room type resolutions collapse the co-located fused rooms into one room of
/// the resolved type; dimension resolutions overwrite the reading. Pending
/// conflicts only flag the affected rooms.
pub fn apply_resolutions(result: &mut FusedResult, records: &[ConflictRecord], config: &ConflictConfig) {
    let tol = config.room_match_tolerance_px;

    for record in records {
        let Some(location) = record.location else {
            continue;
        };

        match (record.kind, record.resolution) {
            (ConflictKind::RoomType, ConflictValue::RoomType(resolved)) => {
                let nearby: Vec<usize> = result
                    .rooms
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.item.centroid().distance_to(&location) < tol)
                    .map(|(i, _)| i)
                    .collect();
                if nearby.is_empty() {
                    continue;
                }

                if !record.is_applied() {
                    for i in nearby {
                        result.rooms[i].flag(EntityFlag::PendingReview);
                    }
                    continue;
                }

                // Prefer a room already of the resolved type, then the most confident
                let rank = |k: usize| {
                    (
                        result.rooms[k].item.room_type == resolved,
                        result.rooms[k].confidence,
                    )
                };
                let keeper = nearby.iter().copied().fold(nearby[0], |best, i| {
                    let (best_match, best_conf) = rank(best);
                    let (matches, conf) = rank(i);
                    if (matches && !best_match) || (matches == best_match && conf > best_conf) {
                        i
                    } else {
                        best
                    }
                });

                let mut provenance = result.rooms[keeper].provenance.clone();
                for &i in &nearby {
                    provenance.extend(result.rooms[i].provenance.iter().cloned());
                }
                provenance.sort();
                provenance.dedup();

                let room = &mut result.rooms[keeper];
                room.item.room_type = resolved;
                room.provenance = provenance;

                let mut removed = 0;
                let keeper_id = result.rooms[keeper].id.clone();
                result.rooms.retain(|r| {
                    let drop = r.id != keeper_id && r.item.centroid().distance_to(&location) < tol;
                    if drop {
                        removed += 1;
                    }
                    !drop
                });
                if removed > 0 {
                    debug!("Collapsed {} rooms into resolved {} room", removed, resolved);
                }
            }
            (ConflictKind::Dimension, ConflictValue::Length(meters)) if record.is_applied() => {
                for dim in result
                    .dimensions
                    .iter_mut()
                    .filter(|d| d.item.anchor().distance_to(&location) < tol)
                {
                    let unit = dim
                        .item
                        .length
                        .map(|l| l.unit)
                        .unwrap_or(crate::units::LengthUnit::Meter);
                    dim.item.length = Some(Length::from_meters(meters, unit));
                }
            }
            _ => {}
        }
    }
}
