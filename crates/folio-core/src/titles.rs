//! Timestamp-invalidated memo of each page's first line.
//!
//! An explicitly constructed service owned by the book for its lifetime,
//! with explicit load and flush; nothing here is global. Entries are keyed
//! by page short name and compared against the page's current change stamp
//! with a one-second tolerance to absorb filesystem timestamp jitter.
//!
//! Side-file format: first line is the decimal entry count; each entry is
//! three lines — escaped key, RFC 3339 stamp, escaped title. Stamps are
//! written and parsed with an explicit offset and normalized to UTC.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::codec::{FormatError, ReadError, RecordReader, RecordWriter};

/// Stamp slack, in seconds, below which a cached entry still counts as
/// current.
const STAMP_TOLERANCE_SECS: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
struct TitleEntry {
    stamp: DateTime<Utc>,
    title: String,
}

#[derive(Debug, Default)]
pub struct TitleCache {
    entries: HashMap<String, TitleEntry>,
    dirty: bool,
}

impl TitleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cache from its side file. A missing file yields an empty
    /// cache; a malformed one degrades to empty with a diagnostic, since
    /// the cache is a pure accelerator and every entry can be rebuilt.
    pub fn load(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "title cache unreadable; starting empty");
                }
                return Self::new();
            }
        };
        match parse_entries(BufReader::new(file)) {
            Ok(entries) => Self {
                entries,
                dirty: false,
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "title cache malformed; starting empty");
                Self::new()
            }
        }
    }

    /// Writes the cache back to its side file if anything changed since the
    /// last load or flush. An empty cache never creates the file.
    pub fn flush(&mut self, path: &Path) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.entries.is_empty() && !path.exists() {
            self.dirty = false;
            return Ok(());
        }

        let file = File::create(path)
            .with_context(|| format!("write title cache {}", path.display()))?;
        let mut writer = RecordWriter::new(BufWriter::new(file));
        writer.write_field(&self.entries.len().to_string())?;

        // Stable order keeps the file diff-friendly.
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        for key in keys {
            let entry = &self.entries[key];
            writer.write_field(key)?;
            writer.write_field(&entry.stamp.to_rfc3339_opts(SecondsFormat::Secs, true))?;
            writer.write_field(&entry.title)?;
        }
        writer
            .flush()
            .with_context(|| format!("flush title cache {}", path.display()))?;
        self.dirty = false;
        Ok(())
    }

    /// Cached title for `name`, provided the cached stamp is within
    /// tolerance of `stamp`.
    pub fn lookup(&self, name: &str, stamp: DateTime<Utc>) -> Option<String> {
        let entry = self.entries.get(name)?;
        if (entry.stamp - stamp).num_seconds().abs() <= STAMP_TOLERANCE_SECS {
            Some(entry.title.clone())
        } else {
            None
        }
    }

    /// Inserts or refreshes an entry.
    pub fn update(&mut self, name: &str, stamp: DateTime<Utc>, title: String) {
        let entry = TitleEntry { stamp, title };
        if self.entries.get(name) == Some(&entry) {
            return;
        }
        self.entries.insert(name.to_string(), entry);
        self.dirty = true;
    }

    /// Drops the entry for `name`, if any.
    pub fn forget(&mut self, name: &str) {
        if self.entries.remove(name).is_some() {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entries<R: BufRead>(source: R) -> Result<HashMap<String, TitleEntry>, ReadError> {
    let mut reader = RecordReader::new(source);
    let count_field = match reader.next_field()? {
        Some(field) => field,
        None => return Ok(HashMap::new()),
    };
    let count: usize = count_field
        .parse()
        .map_err(|_| FormatError::BadNumber(count_field.clone()))?;

    let mut entries = HashMap::with_capacity(count.min(256));
    for _ in 0..count {
        let key = require(&mut reader)?;
        let stamp_field = require(&mut reader)?;
        let stamp = DateTime::parse_from_rfc3339(&stamp_field)
            .map_err(|_| FormatError::BadStamp(stamp_field))?
            .with_timezone(&Utc);
        let title = require(&mut reader)?;
        entries.insert(key, TitleEntry { stamp, title });
    }
    Ok(entries)
}

fn require<R: BufRead>(reader: &mut RecordReader<R>) -> Result<String, ReadError> {
    reader
        .next_field()?
        .ok_or(ReadError::Format(FormatError::UnexpectedEof))
}
