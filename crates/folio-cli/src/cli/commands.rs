//! Command handlers.

use std::io::Read;

use anyhow::{Context, Result, bail};
use folio_core::book::Book;
use folio_core::edit::Edit;

pub fn list(book_dir: &str, json: bool) -> Result<()> {
    let mut book = Book::open(book_dir)?;
    let rows = book.list().context("list pages")?;
    book.flush().context("flush title cache")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No pages found.");
        return Ok(());
    }
    for row in rows {
        let modified = row.modified.unwrap_or_else(|| "unknown".to_string());
        println!("{}  {}  {}", row.title, row.name, modified);
    }
    Ok(())
}

pub fn show(book_dir: &str, page: &str) -> Result<()> {
    let mut book = Book::open(book_dir)?;
    let page = book.page(page)?;
    if !page.exists() {
        bail!("page '{}' not found", page.name());
    }
    print!("{}", page.text()?);
    Ok(())
}

pub fn history(book_dir: &str, page_name: &str) -> Result<()> {
    let mut book = Book::open(book_dir)?;
    let page = book.page(page_name)?;
    if !page.exists() {
        bail!("page '{page_name}' not found");
    }

    let history = page.history()?;
    if history.is_empty() {
        println!("Page '{page_name}' has no recorded history.");
        return Ok(());
    }
    for (index, edit) in history.updates().iter().enumerate() {
        let stamp = edit
            .stamp()
            .map_or_else(|| "unstamped".to_string(), |s| s.to_rfc3339());
        println!("{:>4}  {}  {}", index + 1, stamp, describe(edit));
    }
    Ok(())
}

pub fn checkout(book_dir: &str, page_name: &str, back: usize) -> Result<()> {
    let mut book = Book::open(book_dir)?;
    let page = book.page(page_name)?;
    if !page.exists() {
        bail!("page '{page_name}' not found");
    }

    let history = page.history()?;
    let mut cursor = history.cursor();
    if !cursor.navigate(-(back as isize)) {
        bail!(
            "page '{page_name}' has only {} recorded version(s)",
            cursor.len()
        );
    }
    print!("{}", cursor.text());
    Ok(())
}

pub fn write(book_dir: &str, page_name: &str, text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read text from stdin")?;
            buf
        }
    };

    let mut book = Book::open(book_dir)?;
    let page = book.page(page_name)?;
    page.set_text(&text)?;
    let written = page.save_latest()?;
    if written {
        println!("Wrote page '{page_name}' ({} bytes)", text.len());
    } else {
        println!("Page '{page_name}' already up to date");
    }
    Ok(())
}

pub fn flush(book_dir: &str, page_name: &str) -> Result<()> {
    let mut book = Book::open(book_dir)?;
    let page = book.page(page_name)?;
    if page.save_latest()? {
        println!("Flushed page '{page_name}'");
    } else {
        println!("Nothing to flush for page '{page_name}'");
    }
    Ok(())
}

/// One-line summary of an edit for history listings.
fn describe(edit: &Edit) -> String {
    fn tally(edit: &Edit, inserted: &mut usize, deleted: &mut usize) {
        match edit {
            Edit::Insert { text, .. } => *inserted += text.chars().count(),
            Edit::Delete { text, .. } => *deleted += text.chars().count(),
            Edit::Batch { children, .. } => {
                for child in children {
                    tally(child, inserted, deleted);
                }
            }
        }
    }

    let (mut inserted, mut deleted) = (0, 0);
    tally(edit, &mut inserted, &mut deleted);
    format!("+{inserted} -{deleted}")
}
