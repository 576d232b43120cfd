//! Pure text tooling over script bodies: inline dependency metadata and entry-point stripping.

pub mod entry_point;
pub mod metadata;

pub use entry_point::{has_likely_entry_point_block, remove_entry_point_block};
