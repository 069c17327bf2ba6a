//! HTTP handlers for exposed resources.

pub mod resource;
pub use resource::*;
