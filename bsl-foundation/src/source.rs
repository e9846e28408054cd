use std::{cmp::Ordering, fmt, ops::Range};

use codespan_reporting::files::{self, Files};

pub const BYTE_ORDER_MARK: char = '\u{feff}';

/// Removes a leading byte order mark, if there is one.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text)
}

/// Byte range in a BOM-stripped source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn to_range(self) -> Range<usize> {
        Range::from(self)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn join(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn get_input<'a>(&self, input: &'a str) -> &'a str {
        &input[self.to_range()]
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.start..value.end
    }
}

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Range::from(*self), f)
    }
}

pub trait Spanned {
    fn span(&self) -> Span;
}

impl Spanned for Span {
    fn span(&self) -> Span {
        *self
    }
}

/// A single named source text, used for rendering diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Creates a source file. A leading byte order mark is removed so that spans produced by the
    /// lexer line up with the stored text.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let mut source = source.into();
        if source.starts_with(BYTE_ORDER_MARK) {
            source.drain(..BYTE_ORDER_MARK.len_utf8());
        }
        Self {
            name: name.into(),
            line_starts: files::line_starts(&source).collect(),
            source,
        }
    }

    fn line_start(&self, line_index: usize) -> Result<usize, files::Error> {
        match line_index.cmp(&self.line_starts.len()) {
            Ordering::Less => Ok(self.line_starts[line_index]),
            Ordering::Equal => Ok(self.source.len()),
            Ordering::Greater => Err(files::Error::LineTooLarge {
                given: line_index,
                max: self.line_starts.len() - 1,
            }),
        }
    }
}

impl<'f> Files<'f> for SourceFile {
    type FileId = ();
    type Name = &'f str;
    type Source = &'f str;

    fn name(&'f self, _: ()) -> Result<Self::Name, files::Error> {
        Ok(&self.name)
    }

    fn source(&'f self, _: ()) -> Result<Self::Source, files::Error> {
        Ok(&self.source)
    }

    fn line_index(&'f self, _: (), byte_index: usize) -> Result<usize, files::Error> {
        Ok(self
            .line_starts
            .binary_search(&byte_index)
            .unwrap_or_else(|next_line| next_line - 1))
    }

    fn line_range(&'f self, _: (), line_index: usize) -> Result<Range<usize>, files::Error> {
        let line_start = self.line_start(line_index)?;
        let next_line_start = self.line_start(line_index + 1)?;
        Ok(line_start..next_line_start)
    }
}
