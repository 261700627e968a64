//! I/O modules for archive reading and writing operations
//!
//! This module contains repeatable reads of the source archive and the
//! writer that copies a selection of its entries into a new archive.

pub mod reader;
pub mod writer;

// Re-export commonly used I/O functionality
pub use reader::{ArchiveEntry, SourceArchive};
pub use writer::{write_archive, ArchiveSummary, MANIFEST_NAME};
