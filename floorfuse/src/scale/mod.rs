//! Scale determination
//!
//! Converts pixel measurements into real-world units. Six methods are tried
//! in priority order; the first that produces an estimate is chosen and up to
//! three lower-priority estimates are kept as alternatives. The chosen scale
//! is then checked against dimension annotations whose text was parsed.

mod methods;
pub mod notation;

pub use notation::{parse_scale_notation, ScaleNotation};

use crate::config::ScaleConfig;
use crate::fusion::FusedResult;
use crate::types::{DetectorResult, TextItem};
use crate::units::{Length, LengthUnit};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How a scale estimate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMethod {
    ScaleText,
    Ruler,
    KnownDimensions,
    Grid,
    StandardDimensions,
    Default,
}

impl ScaleMethod {
    pub fn base_confidence(self) -> f64 {
        match self {
            ScaleMethod::ScaleText => 0.95,
            ScaleMethod::Ruler => 0.85,
            ScaleMethod::KnownDimensions => 0.80,
            ScaleMethod::Grid => 0.60,
            ScaleMethod::StandardDimensions => 0.50,
            ScaleMethod::Default => 0.30,
        }
    }
}

/// Agreement between a scale and annotated dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleValidation {
    pub samples: usize,
    pub within_tolerance: usize,
    pub valid: bool,
}

/// Pixels per real unit with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleEstimate {
    pub method: ScaleMethod,
    pub pixels_per_unit: f64,
    pub unit: LengthUnit,
    pub confidence: f64,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ScaleEstimate>,
    /// None when no parsed dimension was available to check against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ScaleValidation>,
}

impl ScaleEstimate {
    /// Whether validation did not reject this scale
    pub fn is_valid(&self) -> bool {
        self.validation.map_or(true, |v| v.valid)
    }

    /// Convert a pixel length to real units of this scale
    pub fn to_real(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_unit
    }
}

/// A pixel length whose real length is known
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownDimension {
    pub pixel_length: f64,
    pub length: Length,
}

/// Evidence available for scale determination
#[derive(Debug, Clone, Default)]
pub struct ScaleInputs {
    pub texts: Vec<TextItem>,
    /// Positions of regular grid lines along one axis (pixels)
    pub grid_lines: Vec<f64>,
    pub known_dimensions: Vec<KnownDimension>,
    /// Door widths in pixels
    pub door_widths_px: Vec<f64>,
    /// Pixel lengths paired with parsed annotation lengths, for validation
    pub samples: Vec<KnownDimension>,
}

impl ScaleInputs {
    /// Gather evidence from a fusion run
    pub fn from_fusion(result: &FusedResult, sources: &[DetectorResult]) -> Self {
        Self {
            texts: sources
                .iter()
                .flat_map(|s| s.texts())
                .cloned()
                .collect(),
            grid_lines: Vec::new(),
            known_dimensions: Vec::new(),
            door_widths_px: result
                .doors
                .iter()
                .map(|d| d.item.width)
                .filter(|w| *w > 0.0)
                .collect(),
            samples: result
                .dimensions
                .iter()
                .filter_map(|d| {
                    d.item.length.map(|length| KnownDimension {
                        pixel_length: d.item.pixel_length(),
                        length,
                    })
                })
                .collect(),
        }
    }

    pub fn with_grid_lines(mut self, lines: Vec<f64>) -> Self {
        self.grid_lines = lines;
        self
    }

    pub fn with_known_dimensions(mut self, known: Vec<KnownDimension>) -> Self {
        self.known_dimensions = known;
        self
    }
}

/// Chooses a scale from the available evidence
pub struct ScaleResolver<'a> {
    config: &'a ScaleConfig,
}

impl<'a> ScaleResolver<'a> {
    pub fn new(config: &'a ScaleConfig) -> Self {
        Self { config }
    }

    /// All candidate estimates in priority order (the default is always last)
    pub fn candidates(&self, inputs: &ScaleInputs) -> Vec<ScaleEstimate> {
        methods::METHODS
            .iter()
            .filter_map(|(_, method)| method(inputs, self.config))
            .filter(|e| e.pixels_per_unit.is_finite() && e.pixels_per_unit > 0.0)
            .collect()
    }

    /// Choose the highest-priority estimate and validate it
    pub fn resolve(&self, inputs: &ScaleInputs) -> ScaleEstimate {
        let mut candidates = self.candidates(inputs).into_iter();
        // The default method always yields an estimate
        let mut chosen = candidates.next().unwrap_or_else(|| ScaleEstimate {
            method: ScaleMethod::Default,
            pixels_per_unit: 0.25 * self.config.render_dpi,
            unit: LengthUnit::Foot,
            confidence: ScaleMethod::Default.base_confidence(),
            detail: "default".to_string(),
            alternatives: Vec::new(),
            validation: None,
        });

        let mut alternatives: Vec<ScaleEstimate> = candidates
            .take(self.config.max_alternatives)
            .map(|mut alt| {
                alt.validation = self.validate(&alt, &inputs.samples);
                alt
            })
            .collect();
        chosen.validation = self.validate(&chosen, &inputs.samples);

        if !chosen.is_valid() {
            warn!(
                "Scale from {:?} failed validation; {} alternatives suggested",
                chosen.method,
                alternatives.len()
            );
            // Suggest alternatives that pass validation first
            alternatives.sort_by_key(|a| !a.is_valid());
        }

        info!(
            "Scale: {:.3} px/{} via {:?} (confidence {:.2})",
            chosen.pixels_per_unit, chosen.unit, chosen.method, chosen.confidence
        );
        chosen.alternatives = alternatives;
        chosen
    }

    /// Check a scale against annotated dimensions: valid when enough
    /// samples fall within the relative tolerance
    pub fn validate(&self, estimate: &ScaleEstimate, samples: &[KnownDimension]) -> Option<ScaleValidation> {
        let usable: Vec<&KnownDimension> = samples
            .iter()
            .filter(|s| s.pixel_length > 0.0 && s.length.value > 0.0)
            .collect();
        if usable.is_empty() {
            return None;
        }

        let within = usable
            .iter()
            .filter(|s| {
                let expected = s.length.in_unit(estimate.unit);
                let measured = estimate.to_real(s.pixel_length);
                (measured - expected).abs() / expected <= self.config.validation_tolerance
            })
            .count();

        Some(ScaleValidation {
            samples: usable.len(),
            within_tolerance: within,
            valid: within as f64 / usable.len() as f64 >= self.config.validation_min_fraction,
        })
    }
}
