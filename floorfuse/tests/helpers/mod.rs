//! Test Helper Utilities
//!
//! Shared fixture builders for floorfuse integration tests

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{
    closed_rect, detector, e2e_config, e2e_sources, open_polyline, room, three_room_plan,
};
