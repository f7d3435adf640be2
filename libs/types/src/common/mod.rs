//! Common types shared by every crate in the workspace

pub mod errors;
pub mod geometry;
pub mod identifiers;
pub mod time;
