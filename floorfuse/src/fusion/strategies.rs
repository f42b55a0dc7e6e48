//! Voting strategies
//!
//! Each strategy decides which candidate groups become fused entities and
//! with what confidence. Strategies are plain functions selected from
//! [`VotingStrategy`] by an exhaustive match, so adding a variant without a
//! function fails to compile.

use super::grouper::{CandidateGroup, SpatialItem};
use crate::config::{FusionConfig, VotingStrategy};
use crate::types::{EntityKind, Modality};

/// Per-source facts a strategy may consult
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub modality: Modality,
    pub confidence: f64,
    pub weight: f64,
    /// Whether the source reports the entity kind being voted on
    pub reports_kind: bool,
}

/// Inputs shared by all strategies for one entity kind
pub struct VotingContext<'a> {
    pub kind: EntityKind,
    pub config: &'a FusionConfig,
    /// Sources in input order
    pub sources: &'a [SourceInfo],
}

impl<'a> VotingContext<'a> {
    /// Sources reporting this entity kind
    pub fn reporting(&self) -> impl Iterator<Item = &SourceInfo> {
        self.sources.iter().filter(|s| s.reports_kind)
    }

    pub fn reporting_count(&self) -> usize {
        self.reporting().count()
    }

    fn weight_of(&self, source: &str) -> f64 {
        self.sources
            .iter()
            .find(|s| s.name == source)
            .map(|s| s.weight)
            .unwrap_or(self.config.default_source_weight)
    }
}

/// A group chosen for the fused result
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub group: usize,
    /// Member index used as the fused value
    pub representative: usize,
    pub confidence: f64,
    /// Contributing sources, sorted
    pub provenance: Vec<String>,
}

pub type StrategyFn<T> = fn(&[CandidateGroup<T>], &VotingContext) -> Vec<Selection>;

/// Strategy function for a configured strategy
pub fn strategy_fn<T: SpatialItem>(strategy: VotingStrategy) -> StrategyFn<T> {
    match strategy {
        VotingStrategy::Majority => majority_vote::<T>,
        VotingStrategy::Weighted => weighted_vote::<T>,
        VotingStrategy::Confidence => confidence_vote::<T>,
        VotingStrategy::Bayesian => bayesian_vote::<T>,
        VotingStrategy::Consensus => consensus_vote::<T>,
    }
}

fn sorted_sources<T: SpatialItem>(group: &CandidateGroup<T>) -> Vec<String> {
    let mut sources: Vec<String> = group.sources().into_iter().map(str::to_string).collect();
    sources.sort();
    sources
}

fn select<T: SpatialItem>(index: usize, group: &CandidateGroup<T>, confidence: f64) -> Selection {
    Selection {
        group: index,
        representative: group.representative_index(),
        confidence: confidence.clamp(0.0, 1.0),
        provenance: sorted_sources(group),
    }
}

/// Keep a group only if its distinct-source votes reach half the
/// reporting sources; competing groups at the same place keep the one with
/// more votes, then higher mean confidence
pub fn majority_vote<T: SpatialItem>(
    groups: &[CandidateGroup<T>],
    ctx: &VotingContext,
) -> Vec<Selection> {
    let n = ctx.reporting_count();
    let threshold = n.div_ceil(2).max(1);

    let passing: Vec<usize> = (0..groups.len())
        .filter(|&i| groups[i].source_count() >= threshold)
        .collect();

    let beats = |a: usize, b: usize| -> bool {
        let (va, vb) = (groups[a].source_count(), groups[b].source_count());
        if va != vb {
            return va > vb;
        }
        let (ca, cb) = (groups[a].mean_confidence(), groups[b].mean_confidence());
        if ca != cb {
            return ca > cb;
        }
        a < b
    };

    passing
        .iter()
        .copied()
        .filter(|&i| {
            let rep = &groups[i].members[groups[i].representative_index()].item;
            passing.iter().copied().all(|j| {
                if i == j {
                    return true;
                }
                let other = &groups[j].members[groups[j].representative_index()].item;
                !rep.overlaps(other, &ctx.config.grouping) || beats(i, j)
            })
        })
        .map(|i| select(i, &groups[i], groups[i].mean_confidence()))
        .collect()
}

/// Weighted score: sum of confidence times source weight over the total
/// weight of reporting sources; included above 0.5
pub fn weighted_vote<T: SpatialItem>(
    groups: &[CandidateGroup<T>],
    ctx: &VotingContext,
) -> Vec<Selection> {
    let total_weight: f64 = ctx.reporting().map(|s| s.weight).sum();
    let denominator = if total_weight > 0.0 { total_weight } else { 1.0 };

    groups
        .iter()
        .enumerate()
        .filter_map(|(i, g)| {
            let score: f64 = g
                .best_per_source()
                .iter()
                .map(|m| m.item.item_confidence() * ctx.weight_of(&m.source))
                .sum::<f64>()
                / denominator;
            (score > 0.5).then(|| select(i, g, score))
        })
        .collect()
}

/// Highest-confidence source as the base; additional non-overlapping entities
/// from sources above 0.7 confidence
pub fn confidence_vote<T: SpatialItem>(
    groups: &[CandidateGroup<T>],
    ctx: &VotingContext,
) -> Vec<Selection> {
    let mut ranked: Vec<&SourceInfo> = ctx.reporting().collect();
    // Stable: equal confidences keep input order
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let Some(base) = ranked.first() else {
        return Vec::new();
    };
    let eligible: Vec<&str> = ranked
        .iter()
        .enumerate()
        .filter(|(rank, s)| *rank == 0 || s.confidence > 0.7)
        .map(|(_, s)| s.name.as_str())
        .collect();

    let mut chosen: Vec<(usize, usize)> = groups
        .iter()
        .enumerate()
        .filter_map(|(i, g)| g.member_index_for(&base.name).map(|m| (i, m)))
        .collect();

    for source in eligible.iter().skip(1) {
        for (i, g) in groups.iter().enumerate() {
            if chosen.iter().any(|(c, _)| *c == i) {
                continue;
            }
            let Some(m) = g.member_index_for(source) else {
                continue;
            };
            let item = &g.members[m].item;
            let clashes = chosen.iter().any(|(c, cm)| {
                groups[*c].members[*cm]
                    .item
                    .overlaps(item, &ctx.config.grouping)
            });
            if !clashes {
                chosen.push((i, m));
            }
        }
    }

    chosen.sort_by_key(|(i, _)| *i);
    chosen
        .into_iter()
        .map(|(i, m)| {
            let g = &groups[i];
            let mut provenance: Vec<String> = g
                .sources()
                .into_iter()
                .filter(|s| eligible.contains(s))
                .map(str::to_string)
                .collect();
            provenance.sort();
            Selection {
                group: i,
                representative: m,
                confidence: g.members[m].item.item_confidence().clamp(0.0, 1.0),
                provenance,
            }
        })
        .collect()
}

/// Posterior = L*p / (L*p + (1-L)(1-p)) with L the product of each source's
/// confidence and p the prior for the entity kind; included above 0.5
pub fn bayesian_vote<T: SpatialItem>(
    groups: &[CandidateGroup<T>],
    ctx: &VotingContext,
) -> Vec<Selection> {
    let prior = ctx.config.priors.for_kind(ctx.kind);

    groups
        .iter()
        .enumerate()
        .filter_map(|(i, g)| {
            let likelihood: f64 = g
                .best_per_source()
                .iter()
                .map(|m| m.item.item_confidence())
                .product();
            let numerator = likelihood * prior;
            let denominator = numerator + (1.0 - likelihood) * (1.0 - prior);
            let posterior = if denominator > 0.0 {
                numerator / denominator
            } else {
                0.0
            };
            (posterior > 0.5).then(|| select(i, g, posterior))
        })
        .collect()
}

/// Groups supported by at least ceil(N * min_consensus) reporting sources
pub fn consensus_vote<T: SpatialItem>(
    groups: &[CandidateGroup<T>],
    ctx: &VotingContext,
) -> Vec<Selection> {
    let n = ctx.reporting_count();
    let required = ((n as f64 * ctx.config.min_consensus).ceil() as usize).max(1);

    groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.source_count() >= required)
        .map(|(i, g)| select(i, g, g.mean_confidence()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::grouper::GroupMember;
    use crate::types::{OpeningItem, Point2D};

    fn info(name: &str, confidence: f64, weight: f64) -> SourceInfo {
        SourceInfo {
            name: name.to_string(),
            modality: Modality::ObjectDetection,
            confidence,
            weight,
            reports_kind: true,
        }
    }

    fn door_group(x: f64, members: &[(&str, f64)]) -> CandidateGroup<OpeningItem> {
        CandidateGroup {
            kind: EntityKind::Door,
            members: members
                .iter()
                .enumerate()
                .map(|(i, (s, c))| GroupMember {
                    source: s.to_string(),
                    source_index: i,
                    source_confidence: *c,
                    item: OpeningItem::new(Point2D::new(x, 0.0), 30.0, *c),
                })
                .collect(),
        }
    }

    #[test]
    fn test_majority_requires_half_the_sources() {
        let config = FusionConfig::default();
        let sources = vec![info("a", 0.9, 0.3), info("b", 0.8, 0.3), info("c", 0.7, 0.3)];
        let ctx = VotingContext {
            kind: EntityKind::Door,
            config: &config,
            sources: &sources,
        };
        let groups = vec![
            door_group(0.0, &[("a", 0.9), ("b", 0.8)]),
            door_group(500.0, &[("c", 0.7)]),
        ];

        let selected = majority_vote(&groups, &ctx);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].group, 0);
        assert_eq!(selected[0].provenance, vec!["a", "b"]);
    }

    #[test]
    fn test_weighted_threshold() {
        let config = FusionConfig::default();
        let sources = vec![info("a", 0.9, 0.5), info("b", 0.9, 0.5)];
        let ctx = VotingContext {
            kind: EntityKind::Door,
            config: &config,
            sources: &sources,
        };
        let groups = vec![
            door_group(0.0, &[("a", 0.9), ("b", 0.9)]),
            door_group(500.0, &[("a", 0.9)]),
        ];

        let selected = weighted_vote(&groups, &ctx);
        assert_eq!(selected.len(), 1);
        assert!((selected[0].confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_bayesian_posterior() {
        let config = FusionConfig::default();
        let sources = vec![info("a", 0.9, 0.5), info("b", 0.4, 0.5)];
        let ctx = VotingContext {
            kind: EntityKind::Door,
            config: &config,
            sources: &sources,
        };
        let groups = vec![
            door_group(0.0, &[("a", 0.9)]),
            door_group(500.0, &[("a", 0.9), ("b", 0.4)]),
        ];

        let selected = bayesian_vote(&groups, &ctx);
        // 0.9*0.7 / (0.63 + 0.1*0.3) = 0.9545; 0.36*0.7 / (0.252 + 0.64*0.3) = 0.5676
        assert_eq!(selected.len(), 2);
        assert!((selected[0].confidence - 0.63 / 0.66).abs() < 1e-9);
        assert!((selected[1].confidence - 0.252 / 0.444).abs() < 1e-9);
    }

    #[test]
    fn test_consensus_requires_fraction() {
        let config = FusionConfig::default();
        let sources = vec![
            info("a", 0.9, 0.3),
            info("b", 0.8, 0.3),
            info("c", 0.7, 0.3),
        ];
        let ctx = VotingContext {
            kind: EntityKind::Door,
            config: &config,
            sources: &sources,
        };
        // ceil(3 * 0.6) = 2
        let groups = vec![
            door_group(0.0, &[("a", 0.9), ("c", 0.7)]),
            door_group(500.0, &[("b", 0.8)]),
        ];
        let selected = consensus_vote(&groups, &ctx);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].group, 0);
    }

    #[test]
    fn test_confidence_vote_adds_non_overlapping() {
        let config = FusionConfig::default();
        let sources = vec![info("a", 0.9, 0.3), info("b", 0.8, 0.3), info("c", 0.5, 0.3)];
        let ctx = VotingContext {
            kind: EntityKind::Door,
            config: &config,
            sources: &sources,
        };
        let groups = vec![
            door_group(0.0, &[("a", 0.9)]),
            door_group(500.0, &[("b", 0.8)]),
            door_group(1000.0, &[("c", 0.5)]),
        ];
        let selected = confidence_vote(&groups, &ctx);
        let chosen: Vec<usize> = selected.iter().map(|s| s.group).collect();
        assert_eq!(chosen, vec![0, 1]);
    }
}
