//! Page façade over a mirror file and an append-only edit log.
//!
//! Every page is two sibling files sharing a base name: `<name>.txt`, the
//! always-current plain text any editor can touch, and `<name>.log`, the
//! append-only history of every edit. The page holds at most one
//! materialized representation: a cheap read-only Lite view or a Full
//! [`History`]. Full is sticky; once a caller mutates the page or asks for
//! history it never drops back to Lite. Both representations re-validate
//! against file timestamps on access.
//!
//! When the mirror and the log disagree, the mirror wins: the difference is
//! captured as a catch-up edit stamped with the mirror's modification time
//! and the log is rewritten to include it. External edits are thereby
//! folded into the history instead of discarded.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::history::History;
use crate::titles::TitleCache;

/// Extension of the mirror file.
pub const MIRROR_EXTENSION: &str = "txt";
/// Extension of the edit log.
pub const LOG_EXTENSION: &str = "log";

#[derive(Debug)]
enum PageState {
    Unloaded,
    Lite { text: String },
    Full(History),
}

#[derive(Debug)]
pub struct Page {
    dir: PathBuf,
    name: String,
    state: PageState,
    mirror_seen: Option<SystemTime>,
    log_seen: Option<SystemTime>,
}

impl Page {
    /// A handle on the page `<dir>/<name>.{txt,log}`. Nothing is read until
    /// first access.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            state: PageState::Unloaded,
            mirror_seen: None,
            log_seen: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{MIRROR_EXTENSION}", self.name))
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{LOG_EXTENSION}", self.name))
    }

    /// True if either backing file exists on disk.
    pub fn exists(&self) -> bool {
        self.mirror_path().exists() || self.log_path().exists()
    }

    /// Modification time used for ordering pages: the mirror's, falling
    /// back to the log's.
    pub fn modified(&self) -> Option<SystemTime> {
        file_modified(&self.mirror_path()).or_else(|| file_modified(&self.log_path()))
    }

    /// Current text. Uses the cheap Lite view unless the page is already
    /// Full; never creates files.
    pub fn text(&mut self) -> Result<String> {
        self.ensure_read_view()?;
        match &self.state {
            PageState::Full(history) => Ok(history.text().to_string()),
            PageState::Lite { text } => Ok(text.clone()),
            PageState::Unloaded => unreachable!("page loaded by ensure_read_view"),
        }
    }

    /// Records `new` as the latest version. Promotes the page to Full and
    /// reconciles against the files first, so an external mirror edit is
    /// captured as its own history step rather than merged into this one.
    pub fn set_text(&mut self, new: &str) -> Result<()> {
        self.full()?.set_text(new);
        Ok(())
    }

    /// The Full history, materialized and reconciled. The page stays Full
    /// afterwards for the remainder of the process.
    pub fn history(&mut self) -> Result<&mut History> {
        self.full()
    }

    /// Appends unsaved edits to the log, then overwrites the mirror with
    /// the full current text. Returns whether anything was written; a clean
    /// page writes nothing and a never-edited page creates no files.
    pub fn save_latest(&mut self) -> Result<bool> {
        let log_path = self.log_path();
        let mirror_path = self.mirror_path();

        let PageState::Full(history) = &mut self.state else {
            return Ok(false);
        };
        if !history.is_dirty() {
            return Ok(false);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("open log file {}", log_path.display()))?;
        let mut sink = BufWriter::new(file);
        history
            .save_latest(&mut sink)
            .with_context(|| format!("append to log file {}", log_path.display()))?;
        sink.flush()
            .with_context(|| format!("flush log file {}", log_path.display()))?;

        fs::write(&mirror_path, history.text())
            .with_context(|| format!("write mirror file {}", mirror_path.display()))?;

        self.remember_stamps();
        debug!(page = %self.name, "flushed unsaved edits");
        Ok(true)
    }

    /// The page's latest change time: the last recorded edit stamp when the
    /// page is Full, otherwise the mirror (fallback log) modification time,
    /// falling back to the current time for a page with no files yet.
    pub fn change_stamp(&self) -> DateTime<Utc> {
        if let PageState::Full(history) = &self.state
            && let Some(stamp) = history.last_stamp()
        {
            return stamp;
        }
        self.modified().map_or_else(Utc::now, DateTime::<Utc>::from)
    }

    /// First line of the current text, memoized through `titles`.
    pub fn title(&mut self, titles: &mut TitleCache) -> Result<String> {
        let stamp = self.change_stamp();
        if let Some(title) = titles.lookup(&self.name, stamp) {
            return Ok(title);
        }
        let text = self.text()?;
        let title = text.lines().next().unwrap_or_default().to_string();
        titles.update(&self.name, stamp, title.clone());
        Ok(title)
    }

    fn ensure_read_view(&mut self) -> Result<()> {
        // Full is sticky: a Full page revalidates as Full.
        if matches!(self.state, PageState::Full(_)) {
            return self.full().map(|_| ());
        }
        if matches!(self.state, PageState::Lite { .. }) && !self.files_changed() {
            return Ok(());
        }
        self.load_lite()
    }

    fn load_lite(&mut self) -> Result<()> {
        let mirror_path = self.mirror_path();
        let text = match fs::read_to_string(&mirror_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => self.replay_log_text(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read mirror file {}", mirror_path.display()));
            }
        };
        self.state = PageState::Lite { text };
        self.remember_stamps();
        Ok(())
    }

    /// Text from replaying the log alone; any failure degrades to empty.
    fn replay_log_text(&self) -> String {
        match File::open(self.log_path()) {
            Ok(file) => match History::load(BufReader::new(file)) {
                Ok(history) => history.text().to_string(),
                Err(err) => {
                    warn!(page = %self.name, error = %err, "log replay failed; page reads empty");
                    String::new()
                }
            },
            Err(_) => String::new(),
        }
    }

    fn full(&mut self) -> Result<&mut History> {
        let reload = match &self.state {
            // Unsaved in-memory edits stay authoritative over disk changes
            // until the next flush re-establishes the files.
            PageState::Full(history) => !history.is_dirty() && self.files_changed(),
            PageState::Lite { .. } | PageState::Unloaded => true,
        };
        if reload {
            let history = self.load_full()?;
            self.state = PageState::Full(history);
        }
        match &mut self.state {
            PageState::Full(history) => Ok(history),
            PageState::Lite { .. } | PageState::Unloaded => {
                unreachable!("page promoted to Full above")
            }
        }
    }

    /// Replays the whole log and reconciles the mirror against it. A
    /// corrupted or unreadable log degrades to an empty history so the
    /// mirror's text stays available; the degradation is diagnosed, and
    /// the shortened history starts from the reconciling catch-up edit.
    fn load_full(&mut self) -> Result<History> {
        let log_path = self.log_path();
        let mut history = match File::open(&log_path) {
            Ok(file) => match History::load(BufReader::new(file)) {
                Ok(history) => history,
                Err(err) => {
                    warn!(page = %self.name, error = %err, "log replay failed; starting a fresh history");
                    History::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => History::new(),
            Err(err) => {
                warn!(page = %self.name, error = %err, "log unreadable; starting a fresh history");
                History::new()
            }
        };

        let mirror_path = self.mirror_path();
        match fs::read_to_string(&mirror_path) {
            Ok(mirror_text) => {
                if mirror_text != history.text() {
                    let stamp = file_modified(&mirror_path)
                        .map_or_else(Utc::now, DateTime::<Utc>::from);
                    history.set_text_at(&mirror_text, stamp);
                    self.rewrite_log(&mut history)?;
                    debug!(page = %self.name, "mirror differed from log; catch-up edit appended");
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read mirror file {}", mirror_path.display()));
            }
        }

        self.remember_stamps();
        Ok(history)
    }

    /// Rewrites the whole log. Skipped for an empty history so never-edited
    /// pages do not leave empty files behind.
    fn rewrite_log(&self, history: &mut History) -> Result<()> {
        if history.is_empty() {
            return Ok(());
        }
        let log_path = self.log_path();
        let file = File::create(&log_path)
            .with_context(|| format!("rewrite log file {}", log_path.display()))?;
        let mut sink = BufWriter::new(file);
        history
            .save_all(&mut sink)
            .with_context(|| format!("rewrite log file {}", log_path.display()))?;
        sink.flush()
            .with_context(|| format!("flush log file {}", log_path.display()))?;
        Ok(())
    }

    fn files_changed(&self) -> bool {
        file_modified(&self.mirror_path()) != self.mirror_seen
            || file_modified(&self.log_path()) != self.log_seen
    }

    fn remember_stamps(&mut self) {
        self.mirror_seen = file_modified(&self.mirror_path());
        self.log_seen = file_modified(&self.log_path());
    }
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
