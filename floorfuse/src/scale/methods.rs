//! Scale estimation methods, highest priority first
//!
//! Each method returns a candidate estimate or `None` when its evidence is
//! absent. Base confidences: explicit notation 0.95, ruler 0.85, known
//! dimensions 0.80 (reduced by their disagreement), grid 0.60, standard
//! opening widths 0.40, default 0.30.

use super::notation::parse_scale_notation;
use super::{ScaleEstimate, ScaleInputs, ScaleMethod};
use crate::config::ScaleConfig;
use crate::types::TextItem;
use crate::units::{parse_length_or_number, LengthUnit, UnitSystem};
use tracing::debug;

pub(super) type MethodFn = fn(&ScaleInputs, &ScaleConfig) -> Option<ScaleEstimate>;

/// Every method in priority order
pub(super) const METHODS: &[(ScaleMethod, MethodFn)] = &[
    (ScaleMethod::ScaleText, from_scale_text),
    (ScaleMethod::Ruler, from_ruler),
    (ScaleMethod::KnownDimensions, from_known_dimensions),
    (ScaleMethod::Grid, from_grid),
    (ScaleMethod::StandardDimensions, from_standard_dimensions),
    (ScaleMethod::Default, from_default),
];

/// Common door widths in inches, most common first
const STANDARD_DOOR_WIDTHS_IN: &[f64] = &[36.0, 32.0, 30.0, 34.0, 28.0, 24.0, 42.0, 48.0];

fn estimate(method: ScaleMethod, pixels_per_unit: f64, unit: LengthUnit, confidence: f64, detail: String) -> ScaleEstimate {
    ScaleEstimate {
        method,
        pixels_per_unit,
        unit,
        confidence: confidence.clamp(0.0, 1.0),
        detail,
        alternatives: Vec::new(),
        validation: None,
    }
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return f64::INFINITY;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Explicit scale notation in recognized text
pub fn from_scale_text(inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    inputs.texts.iter().find_map(|t| {
        let notation = parse_scale_notation(&t.text)?;
        let (ppu, unit) = notation.pixels_per_unit(config.render_dpi);
        debug!("Scale notation '{}' gives {:.3} px/{}", t.text, ppu, unit);
        Some(estimate(
            ScaleMethod::ScaleText,
            ppu,
            unit,
            ScaleMethod::ScaleText.base_confidence(),
            format!("scale notation '{}'", t.text.trim()),
        ))
    })
}

/// Ruler: evenly spaced numeric labels on one row or column
pub fn from_ruler(inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    let default_unit = config.unit_system.base_unit();
    let ticks: Vec<(&TextItem, f64, LengthUnit)> = inputs
        .texts
        .iter()
        .filter_map(|t| {
            let length = parse_length_or_number(&t.text, default_unit)?;
            Some((t, length.value, length.unit))
        })
        .collect();

    let mut best: Option<ScaleEstimate> = None;
    let mut best_count = 0;

    for horizontal in [true, false] {
        let mut used = vec![false; ticks.len()];
        for i in 0..ticks.len() {
            if used[i] {
                continue;
            }
            let axis = |t: &TextItem| if horizontal { t.position.y } else { t.position.x };
            let along = |t: &TextItem| if horizontal { t.position.x } else { t.position.y };

            let line: Vec<usize> = (0..ticks.len())
                .filter(|&j| {
                    !used[j]
                        && ticks[j].2 == ticks[i].2
                        && (axis(ticks[j].0) - axis(ticks[i].0)).abs() <= config.ruler_alignment_px
                })
                .collect();
            for &j in &line {
                used[j] = true;
            }
            if line.len() < config.ruler_min_ticks {
                continue;
            }

            let mut ordered: Vec<(f64, f64)> = line.iter().map(|&j| (along(ticks[j].0), ticks[j].1)).collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let increasing = ordered.windows(2).all(|w| w[1].1 > w[0].1 && w[1].0 > w[0].0);
            if !increasing {
                continue;
            }

            let spacings: Vec<f64> = ordered
                .windows(2)
                .map(|w| (w[1].0 - w[0].0) / (w[1].1 - w[0].1))
                .collect();
            let cv = coefficient_of_variation(&spacings);
            if cv > config.ruler_max_cv {
                debug!("Ruler candidate rejected: spacing CV {:.3}", cv);
                continue;
            }

            if line.len() > best_count {
                best_count = line.len();
                let ppu = spacings.iter().sum::<f64>() / spacings.len() as f64;
                best = Some(estimate(
                    ScaleMethod::Ruler,
                    ppu,
                    ticks[i].2,
                    ScaleMethod::Ruler.base_confidence(),
                    format!("{} ruler ticks (spacing CV {:.3})", line.len(), cv),
                ));
            }
        }
    }
    best
}

/// Caller-supplied pixel lengths with known real lengths
pub fn from_known_dimensions(inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    let unit = config.unit_system.base_unit();
    let ratios: Vec<f64> = inputs
        .known_dimensions
        .iter()
        .filter(|k| k.pixel_length > 0.0 && k.length.value > 0.0)
        .map(|k| k.pixel_length / k.length.in_unit(unit))
        .collect();
    if ratios.is_empty() {
        return None;
    }

    let ppu = ratios.iter().sum::<f64>() / ratios.len() as f64;
    let cv = coefficient_of_variation(&ratios);
    let confidence = ScaleMethod::KnownDimensions.base_confidence() * (1.0 - cv.min(0.5));
    Some(estimate(
        ScaleMethod::KnownDimensions,
        ppu,
        unit,
        confidence,
        format!("{} known dimensions (CV {:.3})", ratios.len(), cv),
    ))
}

/// Regular grid line spacing taken as one planning module
pub fn from_grid(inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    let mut lines: Vec<f64> = inputs.grid_lines.iter().copied().filter(|v| v.is_finite()).collect();
    lines.sort_by(|a, b| a.total_cmp(b));
    lines.dedup_by(|a, b| (*a - *b).abs() < 1.0);
    if lines.len() < 3 {
        return None;
    }

    let mut spacings: Vec<f64> = lines.windows(2).map(|w| w[1] - w[0]).collect();
    let spacing = median(&mut spacings);
    if spacing <= 0.0 {
        return None;
    }
    let regular = spacings
        .iter()
        .filter(|s| ((*s - spacing).abs() / spacing) <= 0.1)
        .count() as f64
        / spacings.len() as f64;
    if regular < config.grid_min_regularity {
        return None;
    }

    let (module, unit) = match config.unit_system {
        UnitSystem::Imperial => (config.grid_module_ft, LengthUnit::Foot),
        UnitSystem::Metric => (config.grid_module_m, LengthUnit::Meter),
    };
    Some(estimate(
        ScaleMethod::Grid,
        spacing / module,
        unit,
        ScaleMethod::Grid.base_confidence(),
        format!("grid spacing {:.1} px ({:.0}% regular)", spacing, regular * 100.0),
    ))
}

/// Door widths matched against common standard widths
pub fn from_standard_dimensions(inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    let mut widths: Vec<f64> = inputs.door_widths_px.iter().copied().filter(|w| *w > 0.0).collect();
    if widths.is_empty() {
        return None;
    }
    let typical = median(&mut widths);
    let tol = config.standard_match_tolerance;

    let matches_standard = |inches: f64| {
        (24.0..=48.0).contains(&inches)
            && STANDARD_DOOR_WIDTHS_IN
                .iter()
                .any(|s| (inches - s).abs() / s <= tol)
    };

    // Try each standard width as the typical door; keep the one that explains most doors
    let mut best: Option<(f64, f64)> = None;
    for standard in STANDARD_DOOR_WIDTHS_IN {
        let px_per_inch = typical / standard;
        let score = widths
            .iter()
            .filter(|w| matches_standard(**w / px_per_inch))
            .count() as f64
            / widths.len() as f64;
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((px_per_inch, score));
        }
    }
    let (px_per_inch, score) = best?;

    let unit = config.unit_system.base_unit();
    let ppu = px_per_inch / LengthUnit::Inch.convert(1.0, unit);
    // Standard-size inference is discounted relative to direct measurement
    let confidence = ScaleMethod::StandardDimensions.base_confidence() * 0.8;
    Some(estimate(
        ScaleMethod::StandardDimensions,
        ppu,
        unit,
        confidence,
        format!("{} door widths, {:.0}% match standard sizes", widths.len(), score * 100.0),
    ))
}

/// Conventional default: 1/4" = 1' (imperial) or 1:100 (metric)
pub fn from_default(_inputs: &ScaleInputs, config: &ScaleConfig) -> Option<ScaleEstimate> {
    let (ppu, unit, detail) = match config.unit_system {
        UnitSystem::Imperial => (0.25 * config.render_dpi, LengthUnit::Foot, "default 1/4\" = 1'"),
        UnitSystem::Metric => (config.render_dpi / 0.0254 / 100.0, LengthUnit::Meter, "default 1:100"),
    };
    Some(estimate(
        ScaleMethod::Default,
        ppu,
        unit,
        ScaleMethod::Default.base_confidence(),
        detail.to_string(),
    ))
}
