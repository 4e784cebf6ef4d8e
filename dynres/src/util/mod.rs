//! Assortment of utilities used throughout the crate.

pub mod bind_merge;
pub mod buffer;
pub mod error_scope;
pub mod math;
pub mod typedefs;
