//! Folio core: versioned plain-text page storage.
//!
//! Pages live as pairs of sibling files — a human-editable `.txt` mirror
//! and an append-only `.log` edit history — reconciled on load so external
//! edits to the mirror become part of the recorded history. Everything is
//! single-threaded and synchronous; callers serialize access per page.

pub mod autosave;
pub mod book;
pub mod codec;
pub mod cursor;
pub mod diff;
pub mod edit;
pub mod history;
pub mod page;
pub mod titles;
