//! Splits a monolithic mod archive into one archive per declared module.
//!
//! Modules are declared by annotations on compiled units. The crate finds
//! those declarations, assigns every unit to the module owning the longest
//! matching package prefix, checks that cross-module references follow
//! declared dependencies and packages the result. Built archives can then
//! be published to the hosting service.

pub mod config;
pub mod jar;
pub mod ledger;
pub mod publish;
pub mod split;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use config::{ConfigError, Layout, Settings};
pub use split::{split, Artifact, RunContext, SplitOptions};
pub use types::{SplitEvent, Stage, StageProgress};
