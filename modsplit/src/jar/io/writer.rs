use std::{
    collections::BTreeSet,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::debug;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::jar::io::reader::{ArchiveEntry, SourceArchive};

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
const MANIFEST_BODY: &str = "Manifest-Version: 1.0\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names written, the fresh manifest excluded.
    pub entries: BTreeSet<String>,
}

/// Copies the entries of `source` selected by `include` into a new archive
/// at `out_path`.
///
/// The source manifest is replaced by a minimal one. `patch` may return
/// replacement bytes for an entry; `None` or an empty buffer keeps the
/// original. Every written entry is removed from `unclaimed`.
pub fn write_archive(
    source: &SourceArchive,
    out_path: &Path,
    unclaimed: &mut BTreeSet<String>,
    mut include: impl FnMut(&str) -> bool,
    mut patch: impl FnMut(&ArchiveEntry) -> anyhow::Result<Option<Vec<u8>>>,
) -> anyhow::Result<ArchiveSummary> {
    let file = File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(MANIFEST_BODY.as_bytes())?;

    let mut entries = BTreeSet::new();
    source.for_each_entry(|entry| {
        if entry.name == MANIFEST_NAME || !include(&entry.name) {
            return Ok(());
        }

        let options = match entry.modified {
            Some(modified) => options.last_modified_time(modified),
            None => options,
        };
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), options)?;
        } else {
            let patched = patch(entry).with_context(|| format!("failed to patch {}", entry.name))?;
            let data = match &patched {
                Some(data) if !data.is_empty() => data.as_slice(),
                _ => entry.data.as_slice(),
            };
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(data)?;
        }

        unclaimed.remove(&entry.name);
        entries.insert(entry.name.clone());
        Ok(())
    })?;

    zip.finish()
        .with_context(|| format!("failed to finish {}", out_path.display()))?;
    debug!("wrote {} entries to {}", entries.len(), out_path.display());

    Ok(ArchiveSummary {
        path: out_path.to_path_buf(),
        entries,
    })
}
