//! Archive and class-file library for module splitting
//!
//! This module provides the tools for reading annotated units out of an
//! archive, checking their references against the declared module graph
//! and writing the per-module archives. The functionality is organized
//! into several sub-modules:
//!
//! - `analysis`: Module declaration discovery, symbol extraction and reference verification
//! - `core`: Class-file parsing, annotation decoding and descriptor scanning
//! - `modification`: Profile forcing, metadata pruning and image optimization
//! - `io`: Archive reading and writing operations
//! - `types`: Module declarations and the prefix ownership registry
//! - `utils`: Archive path helpers
//!
//! # Example Usage
//!
//! ```no_run
//! use modsplit::jar::{analysis::extract_references, types::ModuleRegistry};
//!
//! # fn run(registry: &ModuleRegistry, bytes: &[u8]) -> anyhow::Result<()> {
//! let references = extract_references(bytes, "com/example/module/a/A.class")?;
//! for symbol in &references.symbols {
//!     if let Some(owner) = registry.owner_of(symbol, false) {
//!         println!("{} -> {}", symbol, owner.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Sub-modules
pub mod analysis;
pub mod core;
pub mod io;
pub mod modification;
pub mod types;
pub mod utils;

// Re-export the most commonly used functionality for convenience
pub use analysis::{extract_references, scan_for_module_declaration, VerificationReport, Violation};
pub use core::{ClassFormatError, UnitError};
pub use io::{write_archive, SourceArchive};
pub use types::{ModuleDeclaration, ModuleRegistry, StabilityTier};
