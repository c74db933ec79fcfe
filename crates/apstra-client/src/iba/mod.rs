//! Intent-based analytics
//!
//! Telemetry probes and the dashboard widgets built on their stages, all
//! scoped to a blueprint.

pub mod probes;
pub mod widgets;

pub use probes::*;
pub use widgets::*;

use crate::blueprint::blueprint_path;
use crate::common::ObjectId;

pub(crate) fn iba_path(blueprint_id: &ObjectId, suffix: &str) -> String {
    blueprint_path(blueprint_id, &format!("/iba{}", suffix))
}
