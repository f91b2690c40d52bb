use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::record::LedgerRecord;

/// Append-only JSON Lines store, at most one line per record key.
///
/// Every append is flushed and synced before returning, so an interrupted
/// run loses at most the record in flight.
pub struct Ledger<T> {
    path: PathBuf,
    file: File,
    seen: HashSet<String>,
    _record: PhantomData<T>,
}

/// Keys found in an existing ledger file.
#[derive(Debug, Default)]
pub struct LedgerKeys {
    pub keys: HashSet<String>,
    pub unreadable: usize,
    /// File ends mid-line (interrupted write).
    pub torn_tail: bool,
}

impl<T: LedgerRecord> Ledger<T> {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let existing = read_keys(path, T::KEY_FIELD)?;
        if existing.unreadable > 0 {
            warn!(
                "Skipped {} unreadable lines in {}",
                existing.unreadable,
                path.display()
            );
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open ledger: {}", path.display()))?;
        if existing.torn_tail {
            // Terminate the partial line so the next record starts clean.
            file.write_all(b"\n")?;
            file.sync_data()?;
        }

        if !existing.keys.is_empty() {
            info!("{} already holds {} records", path.display(), existing.keys.len());
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            seen: existing.keys,
            _record: PhantomData,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Append one record. Returns `false` without writing if its key is
    /// already present.
    pub fn append(&mut self, record: &T) -> Result<bool> {
        if self.seen.contains(record.key()) {
            return Ok(false);
        }
        let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.seen.insert(record.key().to_string());
        Ok(true)
    }
}

/// Read the key of every parsable line. Corrupt lines are counted and
/// skipped; a missing file is an empty ledger.
pub fn read_keys(path: &Path, key_field: &str) -> Result<LedgerKeys> {
    if !path.exists() {
        return Ok(LedgerKeys::default());
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut out = LedgerKeys {
        torn_tail: !bytes.is_empty() && !bytes.ends_with(b"\n"),
        ..LedgerKeys::default()
    };
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let key = serde_json::from_slice::<Value>(line)
            .ok()
            .and_then(|v| v.get(key_field).and_then(Value::as_str).map(str::to_string));
        match key {
            Some(k) => {
                out.keys.insert(k);
            }
            None => out.unreadable += 1,
        }
    }
    Ok(out)
}
