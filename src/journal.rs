//! Append-only record of completed signals.
//!
//! The journal is observational: entries are never mutated or removed and
//! there is no undo. An optional JSON-lines file mirrors every entry; a
//! failed file write is logged and does not affect the in-memory record or
//! the signal reply.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::uri::Uri;
use crate::xml::Map;

/// One completed invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonically increasing id, starting at 1.
    pub seq: u64,
    /// When the invocation completed.
    pub timestamp: DateTime<Utc>,
    /// Receiver path.
    pub target: Uri,
    /// Signal name.
    pub signal: String,
    /// Id of the requesting peer.
    pub sender: String,
    /// Correlation id of the request.
    pub frame_id: String,
    /// Decoded arguments, as map XML.
    pub args: String,
}

impl JournalEntry {
    /// Decode the recorded arguments.
    pub fn args(&self) -> crate::error::Result<Map> {
        Map::parse(&self.args)
    }
}

/// Selection of journal entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalFilter {
    /// Target path must start with this path.
    pub path_prefix: Option<Uri>,
    /// Exact sender id.
    pub sender: Option<String>,
    /// Exact signal name.
    pub signal: Option<String>,
}

impl JournalFilter {
    /// Filter matching every entry.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder-style target path prefix.
    #[must_use]
    pub fn under(mut self, prefix: Uri) -> Self {
        self.path_prefix = Some(prefix);
        self
    }

    /// Builder-style sender id.
    #[must_use]
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Builder-style signal name.
    #[must_use]
    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Returns `true` if `entry` passes the filter.
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.path_prefix.as_ref().map_or(true, |p| entry.target.starts_with(p))
            && self.sender.as_ref().map_or(true, |s| &entry.sender == s)
            && self.signal.as_ref().map_or(true, |s| &entry.signal == s)
    }
}

/// Append-only signal log.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    last_seq: u64,
    file: Option<PathBuf>,
}

impl Journal {
    /// In-memory journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that also appends each entry as a JSON line to `path`.
    #[must_use]
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self { file: Some(path.into()), ..Self::default() }
    }

    /// Append an entry and return its sequence id.
    pub fn record(
        &mut self,
        target: &Uri,
        signal: &str,
        sender: &str,
        frame_id: &str,
        args: &Map,
    ) -> u64 {
        self.last_seq += 1;
        let entry = JournalEntry {
            seq: self.last_seq,
            timestamp: Utc::now(),
            target: target.clone(),
            signal: signal.to_string(),
            sender: sender.to_string(),
            frame_id: frame_id.to_string(),
            args: args.to_xml_string(),
        };

        if let Some(path) = &self.file {
            if let Err(e) = append_line(path, &entry) {
                log::warn!("Journal write to {} failed: {e:#}", path.display());
            }
        }

        log::trace!("Journal #{}: {} on {}", entry.seq, entry.signal, entry.target);
        self.entries.push(entry);
        self.last_seq
    }

    /// Entries matching `filter`, in append order.
    pub fn query(&self, filter: &JournalFilter) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write all entries to `path` as a pretty JSON array.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn append_line(path: &Path, entry: &JournalEntry) -> Result<()> {
    let line = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{line}")?;
    Ok(())
}
