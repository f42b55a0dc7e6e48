//! # floorfuse
//!
//! Multi-source floor plan fusion: combines room, wall, opening and
//! dimension detections from independent recognisers (OCR, edge detection,
//! object detection, vision-language models) into one floor plan, resolves
//! their disagreements, validates the geometry and scores how far the result
//! can be trusted. Scale resolution and area calculation turn the fused plan
//! into real-world measurements.

pub mod area;
pub mod config;
pub mod conflicts;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod normalizer;
pub mod scale;
pub mod scoring;
pub mod types;
pub mod units;
pub mod validation;

pub use config::{ConflictPolicy, FileConfig, FusionConfig, VotingStrategy};
pub use engine::{FusionEngine, FusionOutcome, MeasurementReport, ScaleHints};
pub use error::{FusionError, Result};
pub use fusion::{FusedEntity, FusedResult};
pub use normalizer::RawDetection;
pub use scoring::{ConfidenceIssue, ConfidenceReport, Reliability};
pub use types::{DetectorPayload, DetectorResult, Modality, Point2D, RoomType};
