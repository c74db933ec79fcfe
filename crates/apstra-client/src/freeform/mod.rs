//! Freeform blueprint resource management
//!
//! Freeform blueprints allocate ASNs, VNIs, VLANs, integers and IP prefixes
//! from resource groups. Every operation here needs a controller that
//! supports freeform blueprints.

pub mod allocation_groups;
pub mod resource_groups;
pub mod resources;

pub use allocation_groups::*;
pub use resource_groups::*;
pub use resources::*;

use crate::blueprint::blueprint_path;
use crate::common::ObjectId;

pub(crate) fn freeform_path(blueprint_id: &ObjectId, collection: &str, id: Option<&ObjectId>) -> String {
    match id {
        Some(id) => blueprint_path(blueprint_id, &format!("/{}/{}", collection, id)),
        None => blueprint_path(blueprint_id, &format!("/{}", collection)),
    }
}
