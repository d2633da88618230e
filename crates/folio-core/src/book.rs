//! A book: one directory of pages, plus the book-scoped title cache.
//!
//! Discovers `*.txt`/`*.log` base-name pairs, orders pages newest-first by
//! mirror (fallback log) modification time, and opens [`Page`] handles
//! lazily. The title cache is loaded when the book opens and written back
//! by an explicit [`Book::flush`].

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::page::{LOG_EXTENSION, MIRROR_EXTENSION, Page};
use crate::titles::TitleCache;

/// Name of the title-cache side file inside a book directory. The leading
/// dot keeps it out of the page namespace, which only spans `*.txt`/`*.log`
/// stems.
const TITLE_CACHE_FILE: &str = ".folio-titles";

/// One row of a book listing.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub name: String,
    pub title: String,
    /// Formatted modification time, absent for pages with no files yet.
    pub modified: Option<String>,
}

#[derive(Debug)]
pub struct Book {
    dir: PathBuf,
    pages: HashMap<String, Page>,
    titles: TitleCache,
}

impl Book {
    /// Opens the book rooted at `dir` and loads its title cache. The
    /// directory must exist; pages inside it are discovered on demand.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            bail!("book directory {} does not exist", dir.display());
        }
        let titles = TitleCache::load(&dir.join(TITLE_CACHE_FILE));
        Ok(Self {
            dir,
            pages: HashMap::new(),
            titles,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Page names in the book, newest first by file modification time.
    pub fn page_names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("read book directory {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.context("read book directory entry")?;
            let path = entry.path();
            let is_page_file = path
                .extension()
                .is_some_and(|ext| ext == MIRROR_EXTENSION || ext == LOG_EXTENSION);
            if is_page_file && let Some(stem) = path.file_stem() {
                names.insert(stem.to_string_lossy().to_string());
            }
        }

        let mut named: Vec<(String, Option<SystemTime>)> = names
            .into_iter()
            .map(|name| {
                let modified = Page::new(&self.dir, &name).modified();
                (name, modified)
            })
            .collect();
        named.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(named.into_iter().map(|(name, _)| name).collect())
    }

    /// The page handle for `name`, created lazily. Page names are bare file
    /// stems; anything that would escape the book directory is rejected.
    pub fn page(&mut self, name: &str) -> Result<&mut Page> {
        validate_name(name)?;
        Ok(self
            .pages
            .entry(name.to_string())
            .or_insert_with(|| Page::new(&self.dir, name)))
    }

    /// Listing of every page with its memoized title, newest first.
    pub fn list(&mut self) -> Result<Vec<PageInfo>> {
        let mut rows = Vec::new();
        for name in self.page_names()? {
            validate_name(&name)?;
            let page = self
                .pages
                .entry(name.clone())
                .or_insert_with(|| Page::new(&self.dir, &name));
            let title = page.title(&mut self.titles)?;
            let modified = page
                .modified()
                .map(|stamp| format_timestamp(DateTime::<Utc>::from(stamp)));
            rows.push(PageInfo {
                name,
                title,
                modified,
            });
        }
        Ok(rows)
    }

    /// Resolves a page title through the book's cache.
    pub fn title(&mut self, name: &str) -> Result<String> {
        validate_name(name)?;
        let page = self
            .pages
            .entry(name.to_string())
            .or_insert_with(|| Page::new(&self.dir, name));
        page.title(&mut self.titles)
    }

    /// Flushes every open page and the title cache. Returns the number of
    /// pages that actually wrote something.
    pub fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        for page in self.pages.values_mut() {
            if page.save_latest()? {
                written += 1;
            }
        }
        self.titles
            .flush(&self.dir.join(TITLE_CACHE_FILE))
            .context("flush title cache")?;
        Ok(written)
    }
}

/// Formats a stamp for listings (YYYY-MM-DD HH:MM).
pub fn format_timestamp(stamp: DateTime<Utc>) -> String {
    stamp.format("%Y-%m-%d %H:%M").to_string()
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("page name must not be empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("page name '{name}' must be a bare file stem");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_discovers_txt_and_log_stems_once() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("alpha.txt"), "a\n").unwrap();
        fs::write(temp.path().join("alpha.log"), "").unwrap();
        fs::write(temp.path().join("beta.log"), "").unwrap();
        fs::write(temp.path().join("ignored.md"), "x\n").unwrap();

        let book = Book::open(temp.path()).unwrap();
        let mut names = book.page_names().unwrap();
        names.sort();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[test]
    fn test_pages_ordered_newest_first() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("older.txt"), "1\n").unwrap();
        thread::sleep(Duration::from_millis(20));
        fs::write(temp.path().join("newer.txt"), "2\n").unwrap();

        let book = Book::open(temp.path()).unwrap();
        assert_eq!(book.page_names().unwrap(), ["newer", "older"]);
    }

    #[test]
    fn test_list_resolves_titles() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("note.txt"), "First Line\nrest\n").unwrap();

        let mut book = Book::open(temp.path()).unwrap();
        let rows = book.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "note");
        assert_eq!(rows[0].title, "First Line");
        assert!(rows[0].modified.is_some());
    }

    #[test]
    fn test_flush_persists_title_cache() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("note.txt"), "Cached Title\n").unwrap();

        let mut book = Book::open(temp.path()).unwrap();
        book.list().unwrap();
        book.flush().unwrap();
        assert!(temp.path().join(TITLE_CACHE_FILE).exists());

        let reopened = Book::open(temp.path()).unwrap();
        assert_eq!(reopened.titles.len(), 1);
    }

    #[test]
    fn test_title_cache_file_is_not_a_page() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("note.txt"), "T\n").unwrap();

        let mut book = Book::open(temp.path()).unwrap();
        book.list().unwrap();
        book.flush().unwrap();

        let names = book.page_names().unwrap();
        assert_eq!(names, ["note"]);
    }

    #[test]
    fn test_flush_counts_written_pages() {
        let temp = TempDir::new().unwrap();
        let mut book = Book::open(temp.path()).unwrap();
        book.page("draft").unwrap().set_text("hello\n").unwrap();

        assert_eq!(book.flush().unwrap(), 1);
        assert_eq!(book.flush().unwrap(), 0);
    }

    #[test]
    fn test_rejects_escaping_page_names() {
        let temp = TempDir::new().unwrap();
        let mut book = Book::open(temp.path()).unwrap();
        assert!(book.page("../outside").is_err());
        assert!(book.page("").is_err());
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        assert!(Book::open(temp.path().join("absent")).is_err());
    }
}
