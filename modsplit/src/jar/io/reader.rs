use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::Context;

/// One decompressed entry of the source archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub modified: Option<zip::DateTime>,
    pub is_dir: bool,
}

/// The source archive, reopened for every pass over it.
#[derive(Debug, Clone)]
pub struct SourceArchive {
    path: PathBuf,
    entry_names: Vec<String>,
}

impl SourceArchive {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let zip = open_zip(&path)?;
        let entry_names = zip.file_names().map(str::to_string).collect();
        Ok(SourceArchive { path, entry_names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Names of every entry, captured when the archive was opened.
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Streams every entry in archive order through `visit`.
    pub fn for_each_entry(
        &self,
        mut visit: impl FnMut(&ArchiveEntry) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut zip = open_zip(&self.path)?;
        let mut entry = ArchiveEntry {
            name: String::new(),
            data: Vec::new(),
            modified: None,
            is_dir: false,
        };

        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .with_context(|| format!("failed to read entry {i} of {}", self.path.display()))?;
            entry.name.clear();
            entry.name.push_str(file.name());
            entry.modified = file.last_modified();
            entry.is_dir = file.is_dir();
            entry.data.clear();
            file.read_to_end(&mut entry.data)
                .with_context(|| format!("failed to decompress {}", entry.name))?;
            drop(file);

            visit(&entry)?;
        }
        Ok(())
    }
}

fn open_zip(path: &Path) -> anyhow::Result<zip::ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    zip::ZipArchive::new(file).with_context(|| format!("{} is not a valid archive", path.display()))
}
