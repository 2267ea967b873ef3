//! Append-only content-hash ledger for duplicate detection.
//!
//! One hex SHA-256 digest per line, in posting order. Entries are never
//! removed; membership is the sole dedup signal.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crossfeed_core::error::Result;

pub struct HashLedger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl HashLedger {
    /// Load the ledger file (created lazily on first record).
    pub fn load(path: &Path) -> Result<Self> {
        let mut seen = HashSet::new();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            seen.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from),
            );
        }
        tracing::info!("Hash ledger loaded: {} known digests", seen.len());
        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }

    /// Append a digest to the file and the in-memory set.
    pub fn record(&mut self, hash: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{hash}")?;
        self.seen.insert(hash.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Hex SHA-256 of a file, streamed in 8 KiB chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crossfeed-test-{name}"))
    }

    #[test]
    fn test_hash_file_known_digest() {
        let path = scratch("hash.txt");
        std::fs::write(&path, b"hello").unwrap();
        let h = hash_file(&path).unwrap();
        assert_eq!(
            h,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_record_and_contains() {
        let path = scratch("ledger-basic.txt");
        std::fs::remove_file(&path).ok();
        let mut ledger = HashLedger::load(&path).unwrap();
        assert!(!ledger.contains("abc123"));

        ledger.record("abc123").unwrap();
        assert!(ledger.contains("abc123"));
        assert_eq!(ledger.len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_ledger_survives_reload() {
        let path = scratch("ledger-reload.txt");
        std::fs::remove_file(&path).ok();
        {
            let mut ledger = HashLedger::load(&path).unwrap();
            ledger.record("deadbeef").unwrap();
            ledger.record("cafebabe").unwrap();
        }
        let reloaded = HashLedger::load(&path).unwrap();
        assert!(reloaded.contains("deadbeef"));
        assert!(reloaded.contains("cafebabe"));
        assert_eq!(reloaded.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fresh_content_not_flagged() {
        let path = scratch("ledger-fresh.txt");
        std::fs::remove_file(&path).ok();
        let data = scratch("fresh.bin");
        std::fs::write(&data, b"never posted before").unwrap();

        let ledger = HashLedger::load(&path).unwrap();
        let h = hash_file(&data).unwrap();
        assert!(!ledger.contains(&h));

        std::fs::remove_file(&data).ok();
        std::fs::remove_file(&path).ok();
    }
}
