//! Reversible text edits and their on-disk record form.
//!
//! An [`Edit`] is a closed sum of insert, delete and batch. `apply` and
//! `revert` are pure: they take a text and return the transformed text plus
//! the affected character span in the result. `revert(apply(text)) == text`
//! holds for every variant and any text.
//!
//! ## Record format
//!
//! ```text
//! insert            delete            batch
//! <offset>          <offset>          <rfc3339 stamp>
//! <escaped text>    <escaped text>    <child count>
//!                                     ...child records, recursively...
//! ```
//!
//! Offsets and spans count characters, not bytes, so edits stay total on
//! multi-byte text.

use std::io::{self, BufRead, Write};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::codec::{FormatError, ReadError, RecordReader, RecordWriter};

const TAG_INSERT: &str = "insert";
const TAG_DELETE: &str = "delete";
const TAG_BATCH: &str = "batch";

/// Half-open character range `[from, to)` affected in a result text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Smallest span covering both inputs (min from, max to).
    pub fn union(self, other: Span) -> Span {
        Span {
            from: self.from.min(other.from),
            to: self.to.max(other.to),
        }
    }
}

/// A reversible text transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Insert `text` at character `offset`.
    Insert { offset: usize, text: String },
    /// Delete `text` found at character `offset`.
    Delete { offset: usize, text: String },
    /// An ordered group of edits applied as one logical change.
    Batch {
        stamp: DateTime<Utc>,
        children: Vec<Edit>,
    },
}

impl Edit {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Edit::Insert {
            offset,
            text: text.into(),
        }
    }

    pub fn delete(offset: usize, text: impl Into<String>) -> Self {
        Edit::Delete {
            offset,
            text: text.into(),
        }
    }

    pub fn batch(stamp: DateTime<Utc>, children: Vec<Edit>) -> Self {
        Edit::Batch { stamp, children }
    }

    /// Timestamp of this edit; only batches carry one.
    pub fn stamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Edit::Batch { stamp, .. } => Some(*stamp),
            Edit::Insert { .. } | Edit::Delete { .. } => None,
        }
    }

    /// True if applying this edit leaves any text unchanged.
    pub fn is_noop(&self) -> bool {
        match self {
            Edit::Insert { text, .. } | Edit::Delete { text, .. } => text.is_empty(),
            Edit::Batch { children, .. } => children.iter().all(Edit::is_noop),
        }
    }

    /// Applies this edit to `text`, returning the new text and the affected
    /// span in it. A batch applies its children in order; its span is the
    /// union over the children (an empty batch reports `[0, 0)`).
    pub fn apply(&self, text: &str) -> (String, Span) {
        match self {
            Edit::Insert { offset, text: ins } => {
                let out = splice_in(text, *offset, ins);
                (out, Span::new(*offset, *offset + char_len(ins)))
            }
            Edit::Delete { offset, text: del } => {
                let out = splice_out(text, *offset, del);
                (out, Span::new(*offset, *offset))
            }
            Edit::Batch { children, .. } => {
                let mut current = text.to_string();
                let mut span: Option<Span> = None;
                for child in children {
                    let (next, child_span) = child.apply(&current);
                    current = next;
                    span = Some(span.map_or(child_span, |s| s.union(child_span)));
                }
                (current, span.unwrap_or(Span::new(0, 0)))
            }
        }
    }

    /// Undoes this edit on a text it was previously applied to.
    pub fn revert(&self, text: &str) -> (String, Span) {
        match self {
            Edit::Insert { offset, text: ins } => {
                let out = splice_out(text, *offset, ins);
                (out, Span::new(*offset, *offset))
            }
            Edit::Delete { offset, text: del } => {
                let out = splice_in(text, *offset, del);
                (out, Span::new(*offset, *offset + char_len(del)))
            }
            Edit::Batch { children, .. } => {
                let mut current = text.to_string();
                let mut span: Option<Span> = None;
                for child in children.iter().rev() {
                    let (next, child_span) = child.revert(&current);
                    current = next;
                    span = Some(span.map_or(child_span, |s| s.union(child_span)));
                }
                (current, span.unwrap_or(Span::new(0, 0)))
            }
        }
    }

    /// Serializes this edit as one record (batches recurse).
    pub fn save<W: Write>(&self, writer: &mut RecordWriter<W>) -> io::Result<()> {
        match self {
            Edit::Insert { offset, text } => {
                writer.write_field(TAG_INSERT)?;
                writer.write_field(&offset.to_string())?;
                writer.write_field(text)
            }
            Edit::Delete { offset, text } => {
                writer.write_field(TAG_DELETE)?;
                writer.write_field(&offset.to_string())?;
                writer.write_field(text)
            }
            Edit::Batch { stamp, children } => {
                writer.write_field(TAG_BATCH)?;
                writer.write_field(&stamp.to_rfc3339_opts(SecondsFormat::Secs, true))?;
                writer.write_field(&children.len().to_string())?;
                for child in children {
                    child.save(writer)?;
                }
                Ok(())
            }
        }
    }

    /// Reads the next record, or `None` at end of input (the normal
    /// terminator). An unrecognized tag is a format error.
    pub fn load<R: BufRead>(reader: &mut RecordReader<R>) -> Result<Option<Edit>, ReadError> {
        match reader.next_field()? {
            None => Ok(None),
            Some(tag) => Self::load_tagged(&tag, reader).map(Some),
        }
    }

    fn load_tagged<R: BufRead>(
        tag: &str,
        reader: &mut RecordReader<R>,
    ) -> Result<Edit, ReadError> {
        match tag {
            TAG_INSERT => {
                let offset = parse_offset(&require_field(reader)?)?;
                let text = require_field(reader)?;
                Ok(Edit::Insert { offset, text })
            }
            TAG_DELETE => {
                let offset = parse_offset(&require_field(reader)?)?;
                let text = require_field(reader)?;
                Ok(Edit::Delete { offset, text })
            }
            TAG_BATCH => {
                let stamp = parse_stamp(&require_field(reader)?)?;
                let count = parse_offset(&require_field(reader)?)?;
                // Capacity is clamped so a corrupt count cannot force a
                // giant allocation before the child reads fail.
                let mut children = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let tag = require_field(reader)?;
                    children.push(Self::load_tagged(&tag, reader)?);
                }
                Ok(Edit::Batch { stamp, children })
            }
            other => Err(FormatError::UnknownTag(other.to_string()).into()),
        }
    }
}

fn require_field<R: BufRead>(reader: &mut RecordReader<R>) -> Result<String, ReadError> {
    reader
        .next_field()?
        .ok_or(ReadError::Format(FormatError::UnexpectedEof))
}

fn parse_offset(field: &str) -> Result<usize, ReadError> {
    field
        .parse::<usize>()
        .map_err(|_| FormatError::BadNumber(field.to_string()).into())
}

fn parse_stamp(field: &str) -> Result<DateTime<Utc>, ReadError> {
    DateTime::parse_from_rfc3339(field)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| FormatError::BadStamp(field.to_string()).into())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of character `offset`, clamped to the end of `text`.
fn byte_at(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map_or(text.len(), |(idx, _)| idx)
}

fn splice_in(text: &str, offset: usize, insert: &str) -> String {
    let at = byte_at(text, offset);
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..at]);
    out.push_str(insert);
    out.push_str(&text[at..]);
    out
}

fn splice_out(text: &str, offset: usize, remove: &str) -> String {
    let start = byte_at(text, offset);
    let end = start + byte_at(&text[start..], char_len(remove));
    debug_assert_eq!(&text[start..end], remove, "revert against foreign text");
    let mut out = String::with_capacity(text.len() - (end - start));
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    out
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn stamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn roundtrip(edit: &Edit) -> Edit {
        let mut buf = Vec::new();
        edit.save(&mut RecordWriter::new(&mut buf)).unwrap();
        let mut reader = RecordReader::new(Cursor::new(buf));
        let loaded = Edit::load(&mut reader).unwrap().unwrap();
        assert!(Edit::load(&mut reader).unwrap().is_none());
        loaded
    }

    #[test]
    fn test_insert_apply_revert() {
        let edit = Edit::insert(6, "there ");
        let (applied, span) = edit.apply("hello world");
        assert_eq!(applied, "hello there world");
        assert_eq!(span, Span::new(6, 12));

        let (reverted, span) = edit.revert(&applied);
        assert_eq!(reverted, "hello world");
        assert_eq!(span, Span::new(6, 6));
    }

    #[test]
    fn test_delete_apply_revert() {
        let edit = Edit::delete(2, "c");
        let (applied, span) = edit.apply("abcdef");
        assert_eq!(applied, "abdef");
        assert_eq!(span, Span::new(2, 2));

        let (reverted, span) = edit.revert(&applied);
        assert_eq!(reverted, "abcdef");
        assert_eq!(span, Span::new(2, 3));
    }

    #[test]
    fn test_batch_applies_in_order_and_reverts_in_reverse() {
        let edit = Edit::batch(
            stamp(),
            vec![Edit::delete(0, "old"), Edit::insert(0, "new text")],
        );
        let (applied, span) = edit.apply("old tail");
        assert_eq!(applied, "new text tail");
        assert_eq!(span, Span::new(0, 8));

        let (reverted, _) = edit.revert(&applied);
        assert_eq!(reverted, "old tail");
    }

    #[test]
    fn test_empty_batch_span() {
        let edit = Edit::batch(stamp(), Vec::new());
        let (applied, span) = edit.apply("unchanged");
        assert_eq!(applied, "unchanged");
        assert_eq!(span, Span::new(0, 0));
        assert!(edit.is_noop());
        assert!(!Edit::insert(0, "x").is_noop());
    }

    #[test]
    fn test_char_offsets_on_multibyte_text() {
        let edit = Edit::insert(2, "ßß");
        let (applied, span) = edit.apply("äöü");
        assert_eq!(applied, "äößßü");
        assert_eq!(span, Span::new(2, 4));
        let (reverted, _) = edit.revert(&applied);
        assert_eq!(reverted, "äöü");
    }

    #[test]
    fn test_serialization_roundtrip_preserves_behavior() {
        let edits = [
            Edit::insert(0, "line one\nline two"),
            Edit::delete(3, "with \\ backslash"),
            Edit::batch(
                stamp(),
                vec![
                    Edit::insert(0, "head"),
                    Edit::batch(stamp(), vec![Edit::delete(1, "ea")]),
                ],
            ),
        ];
        for edit in &edits {
            assert_eq!(&roundtrip(edit), edit);
        }
    }

    #[test]
    fn test_load_unknown_tag_is_format_error() {
        let mut reader = RecordReader::new(Cursor::new(b"replace\n0\nx\n".to_vec()));
        let err = Edit::load(&mut reader).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_load_truncated_record_is_format_error() {
        let mut reader = RecordReader::new(Cursor::new(b"insert\n5\n".to_vec()));
        let err = Edit::load(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            ReadError::Format(FormatError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_load_bad_offset_is_format_error() {
        let mut reader = RecordReader::new(Cursor::new(b"insert\nnot-a-number\nx\n".to_vec()));
        let err = Edit::load(&mut reader).unwrap_err();
        assert!(matches!(err, ReadError::Format(FormatError::BadNumber(_))));
    }

    #[test]
    fn test_load_eof_before_tag_is_normal_end() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()));
        assert!(Edit::load(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_batch_stamp_survives_roundtrip_across_offsets() {
        let original = DateTime::parse_from_rfc3339("2024-06-01T14:00:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let edit = Edit::batch(original, vec![Edit::insert(0, "x")]);
        let Edit::Batch { stamp, .. } = roundtrip(&edit) else {
            panic!("expected batch");
        };
        assert_eq!(stamp, original);
    }
}
