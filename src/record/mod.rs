//! Record model
//!
//! The accumulated vehicle record threaded through a site's discovery tree,
//! plus the nested color swatch and package option types. Forking is a
//! structural clone; branch isolation is guaranteed by ownership, not
//! convention.

mod options;
mod vehicle;

pub use options::{ColorOption, PackageOption};
pub use vehicle::{VehicleRecord, FIELD_ORDER};
