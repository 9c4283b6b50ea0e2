//! Static inspection of a constraint set, independent of any solving engine.
pub mod diagnose;

pub use diagnose::{diagnose, Violation};
