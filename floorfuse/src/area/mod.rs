//! Area and volume calculation
//!
//! Converts fused room outlines into real-world areas using a resolved
//! scale, derives net area, perimeter, volume and shape for each room and
//! aggregates a floor plan summary.

pub mod shape;
pub mod units;

pub use shape::{classify_shape, suggest_room_type, RoomShape};
pub use units::AreaUnit;

use crate::config::AreaConfig;
use crate::fusion::{FusedEntity, FusedResult};
use crate::geometry::polygon_perimeter;
use crate::scale::ScaleEstimate;
use crate::types::{RoomItem, RoomType};
use crate::units::{parse_room_size, LengthUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How an area was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMethod {
    /// Shoelace area of the outline through the scale
    Polygon,
    /// Size annotation in the room label ("12' x 14'")
    Dimensions,
    /// Bounding box of a degenerate outline
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaResult {
    pub value: f64,
    pub unit: AreaUnit,
    pub method: AreaMethod,
    pub confidence: f64,
}

impl AreaResult {
    pub fn in_unit(&self, unit: AreaUnit) -> f64 {
        self.unit.convert(self.value, unit)
    }
}

/// Measurements for one fused room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMeasurement {
    pub room_id: String,
    pub room_type: RoomType,
    pub gross: AreaResult,
    /// Gross area less the wall band along the perimeter
    pub net_area: f64,
    /// Perimeter in `length_unit`
    pub perimeter: f64,
    /// Net area times ceiling height, in cubic `length_unit`
    pub volume: f64,
    pub length_unit: LengthUnit,
    pub shape: RoomShape,
    /// Footprint-based guess for rooms without a recognised type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_type: Option<RoomType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TypeBreakdown {
    pub count: usize,
    pub total_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStat {
    pub room_id: String,
    pub room_type: RoomType,
    pub area: f64,
}

/// Whole-plan aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPlanSummary {
    pub unit: AreaUnit,
    pub total_area: f64,
    /// Total excluding garage, storage, utility and mechanical rooms
    pub living_area: f64,
    pub room_count: usize,
    pub by_type: BTreeMap<RoomType, TypeBreakdown>,
    pub largest: Option<RoomStat>,
    pub smallest: Option<RoomStat>,
    pub average_area: f64,
    pub total_volume: f64,
}

/// Computes real-world areas for a given scale
pub struct AreaCalculator<'a> {
    config: &'a AreaConfig,
    scale: &'a ScaleEstimate,
    closure_tolerance: f64,
}

impl<'a> AreaCalculator<'a> {
    pub fn new(config: &'a AreaConfig, scale: &'a ScaleEstimate, closure_tolerance: f64) -> Self {
        Self {
            config,
            scale,
            closure_tolerance,
        }
    }

    pub fn area_unit(&self) -> AreaUnit {
        AreaUnit::for_length(self.scale.unit)
    }

    /// Real-world area of a pixel outline
    pub fn polygon_area(&self, area_px: f64) -> f64 {
        area_px / (self.scale.pixels_per_unit * self.scale.pixels_per_unit)
    }

    /// Gross area of a room: outline first, then a size label, then the
    /// bounding box; None when nothing yields a positive area
    pub fn room_area(&self, room: &RoomItem) -> Option<AreaResult> {
        let unit = self.area_unit();

        let outline = self.polygon_area(room.area_px());
        if outline > 0.0 {
            return Some(AreaResult {
                value: outline,
                unit,
                method: AreaMethod::Polygon,
                confidence: self.scale.confidence,
            });
        }

        if let Some((a, b)) = room
            .label
            .as_deref()
            .and_then(|l| parse_room_size(l, self.scale.unit))
        {
            let value = a.in_unit(self.scale.unit) * b.in_unit(self.scale.unit);
            if value > 0.0 {
                return Some(AreaResult {
                    value,
                    unit,
                    method: AreaMethod::Dimensions,
                    confidence: 0.9,
                });
            }
        }

        let bbox = self.polygon_area(room.bbox().area());
        (bbox > 0.0).then_some(AreaResult {
            value: bbox,
            unit,
            method: AreaMethod::Estimated,
            confidence: self.scale.confidence * 0.5,
        })
    }

    /// Wall thickness in the scale's length unit
    pub fn wall_thickness(&self, result: &FusedResult) -> f64 {
        if self.config.use_detected_wall_thickness && !result.walls.is_empty() {
            let mean_px = result.walls.iter().map(|w| w.item.thickness).sum::<f64>()
                / result.walls.len() as f64;
            if mean_px > 0.0 {
                return mean_px / self.scale.pixels_per_unit;
            }
        }
        if self.scale.unit.is_metric() {
            LengthUnit::Meter.convert(self.config.wall_thickness_m, self.scale.unit)
        } else {
            LengthUnit::Foot.convert(self.config.wall_thickness_ft, self.scale.unit)
        }
    }

    pub fn ceiling_height(&self) -> f64 {
        if self.scale.unit.is_metric() {
            LengthUnit::Meter.convert(self.config.ceiling_height_m, self.scale.unit)
        } else {
            LengthUnit::Foot.convert(self.config.ceiling_height_ft, self.scale.unit)
        }
    }

    /// Gross area less perimeter × wall thickness, never negative
    pub fn net_area(&self, gross: f64, perimeter: f64, wall_thickness: f64) -> f64 {
        (gross - perimeter * wall_thickness).max(0.0)
    }

    fn measure(&self, room: &FusedEntity<RoomItem>, wall_thickness: f64) -> Option<RoomMeasurement> {
        let Some(gross) = self.room_area(&room.item) else {
            warn!("Room {} has no measurable area", room.id);
            return None;
        };
        let perimeter = polygon_perimeter(&room.item.polygon) / self.scale.pixels_per_unit;
        let net_area = self.net_area(gross.value, perimeter, wall_thickness);

        let suggested_type = (!room.item.room_type.is_identified()).then(|| {
            suggest_room_type(gross.in_unit(AreaUnit::SquareFoot), &room.item.bbox())
        });

        Some(RoomMeasurement {
            room_id: room.id.clone(),
            room_type: room.item.room_type,
            gross,
            net_area,
            perimeter,
            volume: net_area * self.ceiling_height(),
            length_unit: self.scale.unit,
            shape: classify_shape(&room.item.polygon, self.closure_tolerance),
            suggested_type,
        })
    }

    /// Measure every fused room
    pub fn measure_rooms(&self, result: &FusedResult) -> Vec<RoomMeasurement> {
        let wall_thickness = self.wall_thickness(result);
        debug!(
            "Measuring {} rooms at {:.3} px/{} (wall {:.3} {})",
            result.rooms.len(),
            self.scale.pixels_per_unit,
            self.scale.unit,
            wall_thickness,
            self.scale.unit
        );
        result
            .rooms
            .iter()
            .filter_map(|room| self.measure(room, wall_thickness))
            .collect()
    }

    /// Aggregate room measurements into a floor plan summary
    pub fn summarize(&self, rooms: &[RoomMeasurement]) -> FloorPlanSummary {
        let unit = self.area_unit();
        let total_area: f64 = rooms.iter().map(|r| r.gross.value).sum();
        let living_area: f64 = rooms
            .iter()
            .filter(|r| r.room_type.is_living_space())
            .map(|r| r.gross.value)
            .sum();

        let mut by_type: BTreeMap<RoomType, TypeBreakdown> = BTreeMap::new();
        for room in rooms {
            let entry = by_type.entry(room.room_type).or_default();
            entry.count += 1;
            entry.total_area += room.gross.value;
        }

        let stat = |r: &RoomMeasurement| RoomStat {
            room_id: r.room_id.clone(),
            room_type: r.room_type,
            area: r.gross.value,
        };
        let largest = rooms
            .iter()
            .max_by(|a, b| a.gross.value.total_cmp(&b.gross.value))
            .map(stat);
        let smallest = rooms
            .iter()
            .min_by(|a, b| a.gross.value.total_cmp(&b.gross.value))
            .map(stat);

        FloorPlanSummary {
            unit,
            total_area,
            living_area,
            room_count: rooms.len(),
            by_type,
            largest,
            smallest,
            average_area: if rooms.is_empty() {
                0.0
            } else {
                total_area / rooms.len() as f64
            },
            total_volume: rooms.iter().map(|r| r.volume).sum(),
        }
    }
}
