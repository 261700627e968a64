//! Content fingerprints and the ledger of published artifacts.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::jar::io::reader::SourceArchive;

pub const STATE_FILE: &str = "state.json";

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of a set of entry contents, independent of their order.
pub fn fingerprint_entries<'a>(contents: impl IntoIterator<Item = &'a [u8]>) -> String {
    combine(contents.into_iter().map(sha256_hex).collect())
}

pub fn fingerprint_archive(path: &Path) -> anyhow::Result<String> {
    let archive = SourceArchive::open(path)?;
    let mut digests = Vec::new();
    archive.for_each_entry(|entry| {
        digests.push(sha256_hex(&entry.data));
        Ok(())
    })?;
    Ok(combine(digests))
}

fn combine(mut digests: Vec<String>) -> String {
    digests.sort();
    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprints of everything published so far, kept in `<defs>/state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishLedger {
    /// Fingerprint -> artifact file name.
    #[serde(default)]
    pub uploaded_hashes: BTreeMap<String, String>,
}

impl PublishLedger {
    /// Loads the ledger; a missing file is an empty ledger.
    pub fn load(defs_dir: &Path) -> anyhow::Result<Self> {
        let path = defs_dir.join(STATE_FILE);
        if !path.exists() {
            return Ok(PublishLedger::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid ledger in {}", path.display()))
    }

    pub fn save(&self, defs_dir: &Path) -> anyhow::Result<()> {
        let path = defs_dir.join(STATE_FILE);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn is_published(&self, fingerprint: &str) -> bool {
        self.uploaded_hashes.contains_key(fingerprint)
    }

    pub fn record(&mut self, fingerprint: impl Into<String>, artifact_name: impl Into<String>) {
        self.uploaded_hashes
            .insert(fingerprint.into(), artifact_name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_zip;

    #[test]
    fn fingerprint_ignores_entry_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.jar");
        let second = dir.path().join("second.jar");
        write_zip(&first, &[("a.txt", b"alpha"), ("b/c.txt", b"gamma"), ("d.bin", b"\x00\x01")]);
        write_zip(&second, &[("d.bin", b"\x00\x01"), ("a.txt", b"alpha"), ("b/c.txt", b"gamma")]);

        let fingerprint = fingerprint_archive(&first).unwrap();
        assert_eq!(fingerprint, fingerprint_archive(&first).unwrap());
        assert_eq!(fingerprint, fingerprint_archive(&second).unwrap());
        assert_eq!(
            fingerprint,
            fingerprint_entries([&b"gamma"[..], &b"\x00\x01"[..], &b"alpha"[..]])
        );
    }

    #[test]
    fn fingerprint_tracks_content() {
        assert_ne!(
            fingerprint_entries([&b"alpha"[..]]),
            fingerprint_entries([&b"beta"[..]])
        );
        assert_eq!(fingerprint_entries([]).len(), 64);
    }

    #[test]
    fn ledger_round_trips_through_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = PublishLedger::load(dir.path()).unwrap();
        assert!(ledger.uploaded_hashes.is_empty());

        ledger.record("abc", "Example-A-1.0.jar");
        ledger.save(dir.path()).unwrap();

        let text = fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        assert!(text.contains("uploadedHashes"));
        let loaded = PublishLedger::load(dir.path()).unwrap();
        assert!(loaded.is_published("abc"));
        assert!(!loaded.is_published("def"));
    }
}
