//! Heuristic text diff producing a reversible edit batch.
//!
//! Three cursors walk the old text, the new text and the evolving result.
//! Common runs are skipped; on divergence the differ looks for a
//! resynchronization point by checking whether an upcoming chunk of one side
//! reoccurs later in the other, longest candidate chunks first. Failing
//! that, text is consumed in fixed steps into a pending "change" which is
//! flushed as a paired delete + insert.
//!
//! The output is never guaranteed to be minimal, only correct:
//! `apply(diff(a, b), a) == b` for all inputs.

use chrono::{DateTime, Utc};

use crate::edit::Edit;

/// Candidate chunk lengths for resynchronization, tried longest first to
/// bias toward fewer, larger edits over many small ones.
const SYNC_CHUNK_LENGTHS: [usize; 3] = [128, 64, 32];

/// Step size of the un-synced change loop (the shortest sync candidate).
const CHANGE_STEP: usize = 32;

/// Computes a batch stamped with the current time. See [`diff_at`].
pub fn diff(old: &str, new: &str) -> Edit {
    diff_at(old, new, Utc::now())
}

/// Computes a batch of inserts and deletes whose application transforms
/// `old` into `new` exactly. Offsets refer to the evolving result text, so
/// the children must be applied in order.
pub fn diff_at(old: &str, new: &str, stamp: DateTime<Utc>) -> Edit {
    Differ::new(old, new).run(stamp)
}

enum SyncPoint {
    /// The old side reoccurs at `new[..end]`: an insertion precedes it.
    InsertBefore(usize),
    /// The new side reoccurs at `old[..end]`: a deletion precedes it.
    DeleteBefore(usize),
}

struct Differ {
    old: Vec<char>,
    new: Vec<char>,
    old_index: usize,
    new_index: usize,
    result_index: usize,
    edits: Vec<Edit>,
}

impl Differ {
    fn new(old: &str, new: &str) -> Self {
        Self {
            old: old.chars().collect(),
            new: new.chars().collect(),
            old_index: 0,
            new_index: 0,
            result_index: 0,
            edits: Vec::new(),
        }
    }

    fn run(mut self, stamp: DateTime<Utc>) -> Edit {
        loop {
            self.skip_common_run();
            let old_done = self.old_index == self.old.len();
            let new_done = self.new_index == self.new.len();
            if old_done && new_done {
                break;
            }
            if old_done {
                let tail: String = self.new[self.new_index..].iter().collect();
                self.edits.push(Edit::insert(self.result_index, tail));
                break;
            }
            if new_done {
                let tail: String = self.old[self.old_index..].iter().collect();
                self.edits.push(Edit::delete(self.result_index, tail));
                break;
            }

            match self.find_sync() {
                Some(SyncPoint::InsertBefore(end)) => {
                    let inserted: String = self.new[self.new_index..end].iter().collect();
                    self.edits.push(Edit::insert(self.result_index, inserted));
                    self.result_index += end - self.new_index;
                    self.new_index = end;
                }
                Some(SyncPoint::DeleteBefore(end)) => {
                    let removed: String = self.old[self.old_index..end].iter().collect();
                    self.edits.push(Edit::delete(self.result_index, removed));
                    self.old_index = end;
                }
                None => self.consume_change(),
            }
        }
        Edit::batch(stamp, self.edits)
    }

    fn skip_common_run(&mut self) {
        while self.old_index < self.old.len()
            && self.new_index < self.new.len()
            && self.old[self.old_index] == self.new[self.new_index]
        {
            self.old_index += 1;
            self.new_index += 1;
            self.result_index += 1;
        }
    }

    /// Looks for the nearest resynchronization point, preferring longer
    /// chunks. Candidate lengths are clamped to the remaining text.
    fn find_sync(&self) -> Option<SyncPoint> {
        for &len in &SYNC_CHUNK_LENGTHS {
            let old_len = len.min(self.old.len() - self.old_index);
            if old_len > 0 {
                let chunk = &self.old[self.old_index..self.old_index + old_len];
                if let Some(pos) = find_chunk(&self.new, self.new_index, chunk)
                    && pos > self.new_index
                {
                    return Some(SyncPoint::InsertBefore(pos));
                }
            }
            let new_len = len.min(self.new.len() - self.new_index);
            if new_len > 0 {
                let chunk = &self.new[self.new_index..self.new_index + new_len];
                if let Some(pos) = find_chunk(&self.old, self.old_index, chunk)
                    && pos > self.old_index
                {
                    return Some(SyncPoint::DeleteBefore(pos));
                }
            }
        }
        None
    }

    /// Consumes un-synced text in fixed steps until a sync point reappears,
    /// the texts realign, or either side runs short; then flushes the
    /// accumulated change as a paired delete + insert at its start offset.
    /// When a side runs short the remaining tails of both sides fold into
    /// the change, which keeps the loop terminating on fully divergent text.
    fn consume_change(&mut self) {
        let start = self.result_index;
        let mut removed = String::new();
        let mut added = String::new();
        let mut added_chars = 0usize;

        loop {
            if self.old.len() - self.old_index < CHANGE_STEP
                || self.new.len() - self.new_index < CHANGE_STEP
            {
                removed.extend(&self.old[self.old_index..]);
                added.extend(&self.new[self.new_index..]);
                added_chars += self.new.len() - self.new_index;
                self.old_index = self.old.len();
                self.new_index = self.new.len();
                break;
            }

            removed.extend(&self.old[self.old_index..self.old_index + CHANGE_STEP]);
            added.extend(&self.new[self.new_index..self.new_index + CHANGE_STEP]);
            added_chars += CHANGE_STEP;
            self.old_index += CHANGE_STEP;
            self.new_index += CHANGE_STEP;

            let realigned = self.old_index < self.old.len()
                && self.new_index < self.new.len()
                && self.old[self.old_index] == self.new[self.new_index];
            if realigned || self.find_sync().is_some() {
                break;
            }
        }

        if !removed.is_empty() {
            self.edits.push(Edit::delete(start, removed));
        }
        if !added.is_empty() {
            self.edits.push(Edit::insert(start, added));
        }
        self.result_index = start + added_chars;
    }
}

/// First occurrence of `needle` in `haystack` at or after `from`.
fn find_chunk(haystack: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if needle.is_empty() || from + needle.len() > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
