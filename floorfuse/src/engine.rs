//! Fusion engine
//!
//! Runs the complete pipeline for one floor plan.
//!
//! # Architecture
//! - **Phase 1**: Normalization (schema checks, label vocabulary, dimension text)
//! - **Phase 2**: Grouping and voting into fused entities
//! - **Phase 3**: Conflict detection, resolution and application
//! - **Phase 4**: Geometric validation
//! - **Phase 5**: Confidence scoring
//!
//! Scale and area measurement run afterwards through [`FusionEngine::measure`].
//!
//! # Error Handling
//! - Only an empty input aborts a run
//! - A source whose payload fails normalization is dropped and reported
//! - Arbitration failures degrade to highest-confidence resolution
//! - Entities failing critical geometry checks are excluded and reported
//!
//! An engine holds only its configuration, so independent runs may share one
//! engine across tasks.

use crate::area::{AreaCalculator, FloorPlanSummary, RoomMeasurement};
use crate::config::{ConflictPolicy, FusionConfig};
use crate::conflicts::{apply_resolutions, Arbiter, ConflictDetector, ConflictResolver, HttpArbiter};
use crate::error::{FusionError, Result};
use crate::fusion::{EntityFuser, FusedResult};
use crate::normalizer::{DroppedSource, NormalizedInput, RawDetection, ResultNormalizer};
use crate::scale::{KnownDimension, ScaleEstimate, ScaleInputs, ScaleResolver};
use crate::scoring::{ConfidenceReport, ConfidenceScorer};
use crate::types::DetectorResult;
use crate::validation::{GeometricValidator, ValidationReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Everything a fusion run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionOutcome {
    pub result: FusedResult,
    pub report: ConfidenceReport,
    pub validation: ValidationReport,
    pub dropped_sources: Vec<DroppedSource>,
    /// Normalized inputs, kept for scale measurement
    #[serde(skip)]
    pub normalized: Vec<DetectorResult>,
}

/// Scale and area results for a fused plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementReport {
    pub scale: ScaleEstimate,
    pub rooms: Vec<RoomMeasurement>,
    pub summary: FloorPlanSummary,
}

/// Extra scale evidence supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct ScaleHints {
    pub grid_lines: Vec<f64>,
    pub known_dimensions: Vec<KnownDimension>,
}

/// Fuses detector results for one floor plan at a time
pub struct FusionEngine {
    config: FusionConfig,
    arbiter: Option<Arc<dyn Arbiter>>,
}

impl FusionEngine {
    /// Create an engine; fails on an invalid configuration
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            arbiter: None,
        })
    }

    /// Use a specific arbiter for external arbitration instead of the
    /// configured HTTP endpoint
    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse typed detector results
    ///
    /// # Arguments
    /// * `results` - Detector results in source order
    ///
    /// # Returns
    /// * `FusionError::EmptyInput` when `results` is empty or every source
    ///   was dropped during normalization
    pub async fn fuse(&self, results: Vec<DetectorResult>) -> Result<FusionOutcome> {
        if results.is_empty() {
            return Err(FusionError::EmptyInput);
        }
        let started = Instant::now();
        let normalized = self.normalizer().normalize(results);
        self.run(normalized, started).await
    }

    /// Fuse raw detector records (JSON payloads)
    pub async fn fuse_raw(&self, raw: Vec<RawDetection>) -> Result<FusionOutcome> {
        if raw.is_empty() {
            return Err(FusionError::EmptyInput);
        }
        let started = Instant::now();
        let normalized = self.normalizer().normalize_raw(raw);
        self.run(normalized, started).await
    }

    fn normalizer(&self) -> ResultNormalizer {
        ResultNormalizer::new(self.config.normalizer.clone())
    }

    fn resolver(&self) -> ConflictResolver {
        let resolver = ConflictResolver::new(self.config.conflict_resolution);
        if self.config.conflict_resolution != ConflictPolicy::ExternalArbitration {
            return resolver;
        }

        let timeout = self.config.arbitration.timeout();
        if let Some(arbiter) = &self.arbiter {
            return resolver.with_arbiter(Arc::clone(arbiter), timeout);
        }
        match self.config.arbitration.endpoint.as_deref() {
            Some(endpoint) => match HttpArbiter::new(endpoint, timeout) {
                Ok(arbiter) => resolver.with_arbiter(Arc::new(arbiter), timeout),
                Err(e) => {
                    warn!("Arbitration client unavailable: {}", e);
                    resolver
                }
            },
            None => {
                warn!("External arbitration selected but no endpoint configured");
                resolver
            }
        }
    }

    async fn run(&self, input: NormalizedInput, started: Instant) -> Result<FusionOutcome> {
        let NormalizedInput { results, dropped } = input;
        if results.is_empty() {
            warn!("All {} sources were dropped during normalization", dropped.len());
            return Err(FusionError::EmptyInput);
        }
        info!(
            "Fusing {} sources ({} dropped) with {} voting",
            results.len(),
            dropped.len(),
            self.config.voting_strategy
        );

        // Phase 2: group and vote
        let mut fused = EntityFuser::new(&self.config).fuse(&results);

        // Phase 3: conflicts
        let detected = ConflictDetector::new(&self.config.conflicts, &self.config.grouping).detect(&results);
        let records = self.resolver().resolve_all(detected).await;
        apply_resolutions(&mut fused, &records, &self.config.conflicts);
        fused.metadata.conflicts = records;

        // Phase 4: validation
        let validation = GeometricValidator::new(&self.config.validation).validate(&mut fused);
        fused.refresh_summary(&results);

        // Phase 5: scoring
        let report = ConfidenceScorer::new(&self.config.scoring).score(&fused, &validation, &results);

        if self.config.record_timing {
            fused.metadata.processing_time_ms = started.elapsed().as_millis() as u64;
        }

        info!(
            "Fused {} rooms, {} walls, {} doors, {} windows, {} dimensions; {} conflicts",
            fused.rooms.len(),
            fused.walls.len(),
            fused.doors.len(),
            fused.windows.len(),
            fused.dimensions.len(),
            fused.metadata.conflicts.len()
        );

        Ok(FusionOutcome {
            result: fused,
            report,
            validation,
            dropped_sources: dropped,
            normalized: results,
        })
    }

    /// Resolve the drawing scale and measure every fused room
    pub fn measure(&self, outcome: &FusionOutcome, hints: ScaleHints) -> MeasurementReport {
        let inputs = ScaleInputs::from_fusion(&outcome.result, &outcome.normalized)
            .with_grid_lines(hints.grid_lines)
            .with_known_dimensions(hints.known_dimensions);
        let scale = ScaleResolver::new(&self.config.scale).resolve(&inputs);

        let calculator = AreaCalculator::new(&self.config.area, &scale, self.config.validation.closure_tolerance_px);
        let rooms = calculator.measure_rooms(&outcome.result);
        let summary = calculator.summarize(&rooms);
        info!(
            "Total area {:.1} {} over {} rooms",
            summary.total_area, summary.unit, summary.room_count
        );

        MeasurementReport {
            scale,
            rooms,
            summary,
        }
    }
}
