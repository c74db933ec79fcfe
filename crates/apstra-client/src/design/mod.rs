//! Design objects
//!
//! Global catalog entries under `/api/design/`: tags, logical devices,
//! rack types, templates and interface maps.

pub mod interface_maps;
pub mod logical_devices;
pub mod rack_types;
pub mod tags;
pub mod templates;

pub use interface_maps::*;
pub use logical_devices::*;
pub use rack_types::*;
pub use tags::*;
pub use templates::*;
