//! Modification modules for rewriting archive entries
//!
//! This module contains the per-entry rewrites applied while building
//! output archives: forcing the module profile of declaring units, pruning
//! metadata documents, and optimizing images.

pub mod forcer;
pub mod optimizer;
pub mod pruner;

// Re-export commonly used modification functionality
pub use forcer::force_module_profile;
pub use optimizer::ImageOptimizer;
pub use pruner::{parse_metadata, prune_metadata, render_metadata};
