//! Line-oriented record codec for the edit log and title cache.
//!
//! Every logical field occupies exactly one physical line. Within a line,
//! `\`, CR and LF are escaped as `\\`, `\r` and `\n`, so no raw line ever
//! contains an embedded line break. Records are just consecutive fields;
//! end-of-input where a field is expected is the normal terminator.

use std::fmt;
use std::io::{self, BufRead, Write};

/// A malformed field or record. Distinct from I/O failures: format errors
/// are recoverable at page-load granularity (the log degrades to an empty
/// history), I/O errors are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A record started with a tag the reader does not recognize.
    UnknownTag(String),
    /// A field contained a lone trailing backslash or an unknown escape pair.
    BadEscape(String),
    /// A field that must be a decimal number was not one.
    BadNumber(String),
    /// A field that must be an RFC 3339 timestamp was not one.
    BadStamp(String),
    /// Input ended in the middle of a record.
    UnexpectedEof,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnknownTag(tag) => write!(f, "unknown record tag '{tag}'"),
            FormatError::BadEscape(field) => write!(f, "malformed escape in field '{field}'"),
            FormatError::BadNumber(field) => write!(f, "expected decimal number, got '{field}'"),
            FormatError::BadStamp(field) => write!(f, "expected RFC 3339 timestamp, got '{field}'"),
            FormatError::UnexpectedEof => write!(f, "unexpected end of input inside a record"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Error produced while reading records: either the underlying reader failed
/// or the data itself is malformed.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Format(FormatError),
}

impl ReadError {
    /// True for errors that describe malformed data rather than a failing
    /// reader. Callers use this to pick between degrading and propagating.
    pub fn is_format(&self) -> bool {
        matches!(self, ReadError::Format(_))
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Io(err) => write!(f, "read failed: {err}"),
            ReadError::Format(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(err) => Some(err),
            ReadError::Format(err) => Some(err),
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        ReadError::Io(err)
    }
}

impl From<FormatError> for ReadError {
    fn from(err: FormatError) -> Self {
        ReadError::Format(err)
    }
}

/// Escapes a value so it fits on a single physical line.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Exact inverse of [`escape`].
pub fn unescape(field: &str) -> Result<String, FormatError> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            _ => return Err(FormatError::BadEscape(field.to_string())),
        }
    }
    Ok(out)
}

/// Writes one escaped field per line to a sequential sink.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes a single field, escaping it onto one LF-terminated line.
    pub fn write_field(&mut self, value: &str) -> io::Result<()> {
        self.inner.write_all(escape(value).as_bytes())?;
        self.inner.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reads escaped fields line by line from a sequential source.
#[derive(Debug)]
pub struct RecordReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns the next unescaped field, or `None` at end of input.
    ///
    /// A stray trailing CR (a file that passed through a Windows editor) is
    /// tolerated; escaped CRs survive because they arrive as `\r` pairs.
    pub fn next_field(&mut self) -> Result<Option<String>, ReadError> {
        let mut line = String::new();
        let read = self.inner.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        Ok(Some(unescape(trimmed)?))
    }
}
