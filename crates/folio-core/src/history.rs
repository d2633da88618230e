//! Append-only edit history with a derived current text.
//!
//! A history owns the chronological update list, the text obtained by
//! replaying it from the empty string, and a watermark marking the prefix
//! that has already been persisted. `text == replay(&updates, "")` holds at
//! all times; `saved <= updates.len()`.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};

use crate::codec::{ReadError, RecordReader, RecordWriter};
use crate::cursor::HistoryCursor;
use crate::diff;
use crate::edit::Edit;

#[derive(Debug, Clone, Default)]
pub struct History {
    updates: Vec<Edit>,
    text: String,
    saved: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays every record from `source` into a fresh history. The caller
    /// decides what a failure means; the page layer degrades to an empty
    /// history, so nothing here is lossy on its own.
    pub fn load<R: BufRead>(source: R) -> Result<Self, ReadError> {
        let mut reader = RecordReader::new(source);
        let mut history = Self::new();
        while let Some(edit) = Edit::load(&mut reader)? {
            let (next, _) = edit.apply(&history.text);
            history.text = next;
            history.updates.push(edit);
        }
        history.saved = history.updates.len();
        Ok(history)
    }

    /// Current materialized text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Recorded updates, oldest first.
    pub fn updates(&self) -> &[Edit] {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// True while updates beyond the persisted watermark exist.
    pub fn is_dirty(&self) -> bool {
        self.saved < self.updates.len()
    }

    /// Stamp of the most recent update, if any update carries one.
    pub fn last_stamp(&self) -> Option<DateTime<Utc>> {
        self.updates.iter().rev().find_map(Edit::stamp)
    }

    /// Records `new` as the latest version, stamped with the current time.
    pub fn set_text(&mut self, new: &str) {
        self.set_text_at(new, Utc::now());
    }

    /// Records `new` as the latest version with an explicit stamp. Setting
    /// the current text again is a no-op and does not grow the update list.
    pub fn set_text_at(&mut self, new: &str, stamp: DateTime<Utc>) {
        if new == self.text {
            return;
        }
        let edit = diff::diff_at(&self.text, new, stamp);
        self.text = new.to_string();
        self.updates.push(edit);
    }

    /// Serializes only the updates past the persisted watermark and advances
    /// it. Returns whether anything was written, so callers can avoid
    /// creating files for a no-op flush.
    pub fn save_latest<W: Write>(&mut self, sink: W) -> std::io::Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let mut writer = RecordWriter::new(sink);
        for edit in &self.updates[self.saved..] {
            edit.save(&mut writer)?;
        }
        writer.flush()?;
        self.saved = self.updates.len();
        Ok(true)
    }

    /// Unconditionally serializes the whole update list (used when the log
    /// is rewritten after reconciliation) and resets the watermark.
    pub fn save_all<W: Write>(&mut self, sink: W) -> std::io::Result<()> {
        let mut writer = RecordWriter::new(sink);
        for edit in &self.updates {
            edit.save(&mut writer)?;
        }
        writer.flush()?;
        self.saved = self.updates.len();
        Ok(())
    }

    /// A cursor over the update list, positioned at the latest version.
    /// The borrow ties the cursor's lifetime to the history, so the list
    /// cannot change underneath it.
    pub fn cursor(&self) -> HistoryCursor<'_> {
        HistoryCursor::at_end(&self.updates, self.text.clone())
    }
}
