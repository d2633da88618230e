//! Bidirectional replay cursor over a history's update list.
//!
//! The cursor borrows the update slice instead of copying it; the borrow
//! checker enforces what the source behavior only documented, namely that
//! the list cannot be truncated while a cursor is alive. State is the pair
//! `(position, text)` with `text == replay(&updates[..position], "")`.

use chrono::{DateTime, Utc};

use crate::edit::Edit;

#[derive(Debug)]
pub struct HistoryCursor<'a> {
    updates: &'a [Edit],
    position: usize,
    text: String,
}

impl<'a> HistoryCursor<'a> {
    /// Cursor positioned at the latest version. `text` must equal the full
    /// replay of `updates`; the history guarantees that for its own text.
    pub(crate) fn at_end(updates: &'a [Edit], text: String) -> Self {
        Self {
            updates,
            position: updates.len(),
            text,
        }
    }

    /// Number of versions behind this cursor, i.e. the update count.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Current position in `[0, len]`; position `n` shows the text after
    /// the first `n` updates.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Text at the current position.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Applies the next update. Returns `false` at the latest version.
    pub fn move_next(&mut self) -> bool {
        if self.position == self.updates.len() {
            return false;
        }
        let (next, _) = self.updates[self.position].apply(&self.text);
        self.text = next;
        self.position += 1;
        true
    }

    /// Reverts the previous update. Returns `false` at the oldest version.
    pub fn move_previous(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        let (prev, _) = self.updates[self.position - 1].revert(&self.text);
        self.text = prev;
        self.position -= 1;
        true
    }

    /// Steps `offset` versions forward (positive) or backward (negative).
    ///
    /// Stops and returns `false` the moment a single step fails, leaving
    /// the partial movement applied. Callers that need all-or-nothing can
    /// record [`position`](Self::position) first and jump back.
    pub fn navigate(&mut self, offset: isize) -> bool {
        if offset >= 0 {
            for _ in 0..offset {
                if !self.move_next() {
                    return false;
                }
            }
        } else {
            for _ in 0..offset.unsigned_abs() {
                if !self.move_previous() {
                    return false;
                }
            }
        }
        true
    }

    /// Jumps to the oldest version (the empty text).
    pub fn move_to_start(&mut self) {
        self.position = 0;
        self.text.clear();
    }

    /// Jumps to the latest version.
    pub fn move_to_end(&mut self) {
        while self.move_next() {}
    }

    /// Stamp of the update applied to reach the current position. At
    /// position 0 this falls back to the first update's stamp if one
    /// exists, otherwise to the current time.
    pub fn stamp(&self) -> DateTime<Utc> {
        let edit = if self.position == 0 {
            self.updates.first()
        } else {
            Some(&self.updates[self.position - 1])
        };
        edit.and_then(Edit::stamp).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample_history() -> History {
        let mut history = History::new();
        history.set_text_at("alpha\n", utc("2024-05-01T07:00:00Z"));
        history.set_text_at("alpha\nbeta\n", utc("2024-05-01T08:00:00Z"));
        history.set_text_at("alpha\ngamma\n", utc("2024-05-01T09:00:00Z"));
        history
    }

    #[test]
    fn test_replay_invariant_forward_and_back() {
        let history = sample_history();
        let mut cursor = history.cursor();

        cursor.move_to_start();
        assert_eq!(cursor.text(), "");
        let mut steps = 0;
        while cursor.move_next() {
            steps += 1;
        }
        assert_eq!(steps, history.len());
        assert_eq!(cursor.text(), history.text());

        while cursor.move_previous() {}
        assert_eq!(cursor.text(), "");
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_cursor_starts_at_latest_version() {
        let history = sample_history();
        let cursor = history.cursor();
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.text(), "alpha\ngamma\n");
    }

    #[test]
    fn test_steps_past_the_ends_fail() {
        let history = sample_history();
        let mut cursor = history.cursor();
        assert!(!cursor.move_next());
        cursor.move_to_start();
        assert!(!cursor.move_previous());
    }

    #[test]
    fn test_navigate_partial_progress_is_kept() {
        let history = sample_history();
        let mut cursor = history.cursor();

        // Only 3 steps back exist; the failed 5-step request still walks
        // all the way to the start.
        assert!(!cursor.navigate(-5));
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.text(), "");

        assert!(cursor.navigate(2));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.text(), "alpha\nbeta\n");
    }

    #[test]
    fn test_navigate_zero_succeeds_in_place() {
        let history = sample_history();
        let mut cursor = history.cursor();
        assert!(cursor.navigate(0));
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_stamp_tracks_position() {
        let history = sample_history();
        let mut cursor = history.cursor();
        assert_eq!(cursor.stamp(), utc("2024-05-01T09:00:00Z"));

        cursor.move_previous();
        assert_eq!(cursor.stamp(), utc("2024-05-01T08:00:00Z"));

        // At position 0 the stamp falls back to the first update's stamp.
        cursor.move_to_start();
        assert_eq!(cursor.stamp(), utc("2024-05-01T07:00:00Z"));
    }

    #[test]
    fn test_stamp_on_empty_history_is_recent() {
        let history = History::new();
        let cursor = history.cursor();
        let before = Utc::now();
        let stamp = cursor.stamp();
        assert!(stamp >= before - chrono::Duration::seconds(5));
    }

    #[test]
    fn test_move_to_end_after_wandering() {
        let history = sample_history();
        let mut cursor = history.cursor();
        cursor.navigate(-2);
        cursor.move_to_end();
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.text(), history.text());
    }
}
