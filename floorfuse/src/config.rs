//! Fusion engine configuration
//!
//! Every threshold the pipeline uses lives here. `FusionConfig::default()`
//! carries the stock values; a TOML file may override any subset of them
//! (missing fields keep their defaults).

use crate::error::{FusionError, Result};
use crate::types::EntityKind;
use crate::units::UnitSystem;
use floorfuse_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strategy used to decide which candidate groups become fused entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    Majority,
    #[default]
    Weighted,
    Confidence,
    Bayesian,
    Consensus,
}

impl VotingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            VotingStrategy::Majority => "majority",
            VotingStrategy::Weighted => "weighted",
            VotingStrategy::Confidence => "confidence",
            VotingStrategy::Bayesian => "bayesian",
            VotingStrategy::Consensus => "consensus",
        }
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingStrategy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "majority" => Ok(VotingStrategy::Majority),
            "weighted" => Ok(VotingStrategy::Weighted),
            "confidence" => Ok(VotingStrategy::Confidence),
            "bayesian" => Ok(VotingStrategy::Bayesian),
            "consensus" => Ok(VotingStrategy::Consensus),
            other => Err(FusionError::Config(format!(
                "unknown voting strategy '{}'",
                other
            ))),
        }
    }
}

/// Policy used to settle detected conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    HighestConfidence,
    Consensus,
    ExternalArbitration,
    Manual,
}

impl ConflictPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::HighestConfidence => "highest_confidence",
            ConflictPolicy::Consensus => "consensus",
            ConflictPolicy::ExternalArbitration => "external_arbitration",
            ConflictPolicy::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "highest_confidence" => Ok(ConflictPolicy::HighestConfidence),
            "consensus" => Ok(ConflictPolicy::Consensus),
            "external_arbitration" => Ok(ConflictPolicy::ExternalArbitration),
            "manual" => Ok(ConflictPolicy::Manual),
            other => Err(FusionError::Config(format!(
                "unknown conflict resolution policy '{}'",
                other
            ))),
        }
    }
}

/// Prior probability that a detected entity of each kind is real
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EntityPriors {
    pub room: f64,
    pub wall: f64,
    pub door: f64,
    pub window: f64,
    pub dimension: f64,
}

impl Default for EntityPriors {
    fn default() -> Self {
        Self {
            room: 0.8,
            wall: 0.9,
            door: 0.7,
            window: 0.7,
            dimension: 0.7,
        }
    }
}

impl EntityPriors {
    pub fn for_kind(&self, kind: EntityKind) -> f64 {
        match kind {
            EntityKind::Room => self.room,
            EntityKind::Wall => self.wall,
            EntityKind::Door => self.door,
            EntityKind::Window => self.window,
            EntityKind::Dimension => self.dimension,
        }
    }
}

/// Result normalization settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Thickness assigned to walls reported without one (pixels)
    pub default_wall_thickness_px: f64,
    /// Same-source openings closer than this collapse into one (pixels)
    pub duplicate_opening_px: f64,
    /// Minimum similarity for fuzzy room label matches
    pub fuzzy_label_threshold: f64,
    /// Label unidentified rooms from text found inside their polygon
    pub label_from_text: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_wall_thickness_px: 10.0,
            duplicate_opening_px: 30.0,
            fuzzy_label_threshold: 0.85,
            label_from_text: true,
        }
    }
}

/// Spatial tolerances for candidate grouping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupingConfig {
    /// Cell size for room centroid quantization (pixels)
    pub room_cell_px: f64,
    /// Maximum endpoint distance for co-referent walls (pixels)
    pub wall_endpoint_tolerance_px: f64,
    /// Maximum position distance for co-referent doors and windows (pixels)
    pub opening_tolerance_px: f64,
    /// Maximum anchor distance for co-referent dimensions (pixels)
    pub dimension_tolerance_px: f64,
    /// Bounding box overlap above which two rooms are treated as the same space
    pub room_overlap_ratio: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            room_cell_px: 50.0,
            wall_endpoint_tolerance_px: 20.0,
            opening_tolerance_px: 30.0,
            dimension_tolerance_px: 30.0,
            room_overlap_ratio: 0.5,
        }
    }
}

/// Conflict detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConflictConfig {
    /// Room count spread (max - min) above which counts conflict
    pub room_count_threshold: usize,
    /// Centroid distance under which two sources' rooms describe the same space
    pub room_match_tolerance_px: f64,
    /// Relative difference above which dimension readings conflict
    pub dimension_relative_tolerance: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            room_count_threshold: 2,
            room_match_tolerance_px: 50.0,
            dimension_relative_tolerance: 0.10,
        }
    }
}

/// Geometric validation thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// First/last vertex distance under which a polygon counts as closed (pixels)
    pub closure_tolerance_px: f64,
    /// Endpoint distance under which two walls are joined (pixels)
    pub wall_join_tolerance_px: f64,
    /// Confidence multiplier for openings with no host wall
    pub invalid_opening_penalty: f64,
    /// Door to room boundary distance for connectivity (pixels)
    pub door_room_tolerance_px: f64,
    /// Centroid distance under which overlapping rooms are suspected duplicates
    pub duplicate_centroid_tolerance_px: f64,
    /// Bounding box overlap ratio that triggers an overlap warning
    pub overlap_ratio_warning: f64,
    /// Distance to the plan outline under which a wall is exterior (pixels)
    pub perimeter_tolerance_px: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            closure_tolerance_px: 5.0,
            wall_join_tolerance_px: 20.0,
            invalid_opening_penalty: 0.5,
            door_room_tolerance_px: 25.0,
            duplicate_centroid_tolerance_px: 25.0,
            overlap_ratio_warning: 0.3,
            perimeter_tolerance_px: 25.0,
        }
    }
}

/// Weights for the six scoring categories (sum to 1.0)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryWeights {
    pub ocr: f64,
    pub vision: f64,
    pub object_detection: f64,
    pub geometry: f64,
    pub semantics: f64,
    pub cross_validation: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            ocr: 0.15,
            vision: 0.20,
            object_detection: 0.20,
            geometry: 0.20,
            semantics: 0.15,
            cross_validation: 0.10,
        }
    }
}

impl CategoryWeights {
    pub fn total(&self) -> f64 {
        self.ocr
            + self.vision
            + self.object_detection
            + self.geometry
            + self.semantics
            + self.cross_validation
    }
}

/// Confidence scoring settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score given to a category with no applicable sub-metric
    pub absent_category_score: f64,
    /// Reliability thresholds
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub low_threshold: f64,
    /// Critical rules scoring below this raise a critical issue
    pub critical_rule_threshold: f64,
    /// Plausible dimension range (meters)
    pub dimension_min_m: f64,
    pub dimension_max_m: f64,
    pub category_weights: CategoryWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            absent_category_score: 0.5,
            high_threshold: 0.85,
            medium_threshold: 0.70,
            low_threshold: 0.50,
            critical_rule_threshold: 0.5,
            dimension_min_m: 0.05,
            dimension_max_m: 150.0,
            category_weights: CategoryWeights::default(),
        }
    }
}

/// Scale determination settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScaleConfig {
    pub unit_system: UnitSystem,
    /// Rendering resolution of the analysed image
    pub render_dpi: f64,
    pub ruler_min_ticks: usize,
    /// Maximum coefficient of variation of ruler tick spacing
    pub ruler_max_cv: f64,
    /// Row/column alignment tolerance for ruler ticks (pixels)
    pub ruler_alignment_px: f64,
    /// Real grid module for imperial drawings (feet)
    pub grid_module_ft: f64,
    /// Real grid module for metric drawings (meters)
    pub grid_module_m: f64,
    /// Fraction of grid spacings that must agree with the median
    pub grid_min_regularity: f64,
    /// Relative tolerance for standard opening width matches
    pub standard_match_tolerance: f64,
    /// Relative error allowed for a validation sample
    pub validation_tolerance: f64,
    /// Fraction of samples that must be within tolerance
    pub validation_min_fraction: f64,
    pub max_alternatives: usize,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::Imperial,
            render_dpi: 96.0,
            ruler_min_ticks: 3,
            ruler_max_cv: 0.1,
            ruler_alignment_px: 10.0,
            grid_module_ft: 4.0,
            grid_module_m: 1.0,
            grid_min_regularity: 0.7,
            standard_match_tolerance: 0.10,
            validation_tolerance: 0.15,
            validation_min_fraction: 0.70,
            max_alternatives: 3,
        }
    }
}

/// Area computation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AreaConfig {
    pub wall_thickness_ft: f64,
    pub wall_thickness_m: f64,
    pub ceiling_height_ft: f64,
    pub ceiling_height_m: f64,
    /// Prefer the mean fused wall thickness over the configured default
    pub use_detected_wall_thickness: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            wall_thickness_ft: 0.5,
            wall_thickness_m: 0.15,
            ceiling_height_ft: 8.0,
            ceiling_height_m: 2.44,
            use_detected_wall_thickness: true,
        }
    }
}

/// External arbitration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArbitrationConfig {
    /// HTTP endpoint of the arbitration service
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5000,
        }
    }
}

impl ArbitrationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete fusion engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    pub voting_strategy: VotingStrategy,
    pub conflict_resolution: ConflictPolicy,
    /// Fraction of reporting sources required by the consensus strategy
    pub min_consensus: f64,
    /// Weight for sources missing from `weights`
    pub default_source_weight: f64,
    /// Record processing time in the result metadata
    pub record_timing: bool,
    /// Per-source weights keyed by source identifier
    pub weights: BTreeMap<String, f64>,
    pub priors: EntityPriors,
    pub normalizer: NormalizerConfig,
    pub grouping: GroupingConfig,
    pub conflicts: ConflictConfig,
    pub validation: ValidationConfig,
    pub scoring: ScoringConfig,
    pub scale: ScaleConfig,
    pub area: AreaConfig,
    pub arbitration: ArbitrationConfig,
}

fn default_weights() -> BTreeMap<String, f64> {
    [
        ("gpt-vision", 0.35),
        ("yolo", 0.25),
        ("tesseract", 0.20),
        ("opencv", 0.20),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            voting_strategy: VotingStrategy::default(),
            conflict_resolution: ConflictPolicy::default(),
            min_consensus: 0.6,
            default_source_weight: 0.25,
            record_timing: true,
            weights: default_weights(),
            priors: EntityPriors::default(),
            normalizer: NormalizerConfig::default(),
            grouping: GroupingConfig::default(),
            conflicts: ConflictConfig::default(),
            validation: ValidationConfig::default(),
            scoring: ScoringConfig::default(),
            scale: ScaleConfig::default(),
            area: AreaConfig::default(),
            arbitration: ArbitrationConfig::default(),
        }
    }
}

impl FusionConfig {
    pub fn builder() -> FusionConfigBuilder {
        FusionConfigBuilder::default()
    }

    /// Weight for a source, falling back to `default_source_weight`
    pub fn weight_for(&self, source: &str) -> f64 {
        self.weights
            .get(source)
            .copied()
            .unwrap_or(self.default_source_weight)
    }

    /// Check ranges that would otherwise produce meaningless scores
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_consensus) {
            return Err(FusionError::Config(format!(
                "min_consensus must be within [0, 1], got {}",
                self.min_consensus
            )));
        }
        if self.default_source_weight < 0.0 {
            return Err(FusionError::Config(
                "default_source_weight must not be negative".to_string(),
            ));
        }
        if let Some((source, weight)) = self.weights.iter().find(|(_, w)| **w < 0.0 || !w.is_finite()) {
            return Err(FusionError::Config(format!(
                "weight for '{}' must be a non-negative number, got {}",
                source, weight
            )));
        }
        let total = self.scoring.category_weights.total();
        if (total - 1.0).abs() > 1e-6 {
            return Err(FusionError::Config(format!(
                "category weights must sum to 1.0, got {:.4}",
                total
            )));
        }
        if self.scale.render_dpi <= 0.0 {
            return Err(FusionError::Config("render_dpi must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`FusionConfig`]
#[derive(Debug, Clone, Default)]
pub struct FusionConfigBuilder {
    config: FusionConfig,
}

impl FusionConfigBuilder {
    pub fn voting_strategy(mut self, strategy: VotingStrategy) -> Self {
        self.config.voting_strategy = strategy;
        self
    }

    pub fn conflict_resolution(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict_resolution = policy;
        self
    }

    pub fn min_consensus(mut self, min_consensus: f64) -> Self {
        self.config.min_consensus = min_consensus;
        self
    }

    /// Set one source's weight
    pub fn weight(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.config.weights.insert(source.into(), weight);
        self
    }

    /// Replace the whole weight table
    pub fn weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn record_timing(mut self, record: bool) -> Self {
        self.config.record_timing = record;
        self
    }

    pub fn arbitration_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.arbitration.endpoint = Some(endpoint.into());
        self
    }

    pub fn arbitration_timeout(mut self, timeout: Duration) -> Self {
        self.config.arbitration.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn unit_system(mut self, unit_system: UnitSystem) -> Self {
        self.config.scale.unit_system = unit_system;
        self
    }

    pub fn build(self) -> Result<FusionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk configuration file layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let config = FusionConfig::default();
        assert_eq!(config.weight_for("gpt-vision"), 0.35);
        assert_eq!(config.weight_for("yolo"), 0.25);
        assert_eq!(config.weight_for("tesseract"), 0.20);
        assert_eq!(config.weight_for("opencv"), 0.20);
        assert_eq!(config.weight_for("unknown-detector"), 0.25);
        assert_eq!(config.voting_strategy, VotingStrategy::Weighted);
        assert_eq!(config.conflict_resolution, ConflictPolicy::HighestConfidence);
        assert!(config.record_timing);
    }

    #[test]
    fn test_builder_rejects_bad_consensus() {
        let result = FusionConfig::builder().min_consensus(1.5).build();
        assert!(matches!(result, Err(FusionError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_negative_weight() {
        let result = FusionConfig::builder().weight("yolo", -0.1).build();
        assert!(matches!(result, Err(FusionError::Config(_))));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Bayesian".parse::<VotingStrategy>().unwrap(), VotingStrategy::Bayesian);
        assert_eq!(
            "external-arbitration".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::ExternalArbitration
        );
        assert!("plurality".parse::<VotingStrategy>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [fusion]
            voting_strategy = "majority"

            [fusion.weights]
            tesseract = 0.5
        "#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fusion.voting_strategy, VotingStrategy::Majority);
        assert_eq!(config.fusion.weight_for("tesseract"), 0.5);
        assert_eq!(config.fusion.min_consensus, 0.6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = FileConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: FileConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_written_default_config_loads_back() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floorfuse").join("config.toml");

        // Act
        floorfuse_common::config::write_toml_config(&FileConfig::default(), &path).unwrap();
        let loaded: FileConfig = floorfuse_common::config::load_toml_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, FileConfig::default());
    }
}
