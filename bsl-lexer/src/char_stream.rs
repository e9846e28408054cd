use std::{io::Read, ops::Range};

use bsl_foundation::{ident::fold_char, source::strip_bom};

/// Handle returned by [`CharStream::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(usize);

/// A seekable stream of characters that the lexers read from.
///
/// Indices count characters, not bytes. `lookahead(1)` is the character that the next call to
/// `consume` would move past; `None` means end of input.
pub trait CharStream {
    fn lookahead(&self, offset: usize) -> Option<char>;

    fn consume(&mut self);

    fn index(&self) -> usize;

    fn size(&self) -> usize;

    fn mark(&mut self) -> Marker;

    fn release(&mut self, marker: Marker);

    fn seek(&mut self, index: usize);

    fn source_name(&self) -> &str;

    /// Returns the text between two character indices, exactly as written in the source.
    fn text(&self, range: Range<usize>) -> String;

    /// Converts a character index to a byte offset into the source text.
    fn byte_offset(&self, index: usize) -> usize;
}

/// The whole source text, decoded into characters up front.
#[derive(Debug, Clone)]
pub struct CodePointBuffer {
    name: String,
    chars: Vec<char>,
    byte_offsets: Vec<usize>,
    position: usize,
    open_markers: usize,
}

impl CodePointBuffer {
    /// Creates a buffer from text, dropping a leading byte order mark.
    pub fn new(name: impl Into<String>, text: &str) -> Self {
        let text = strip_bom(text);
        let mut chars = Vec::with_capacity(text.len());
        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        for (offset, c) in text.char_indices() {
            chars.push(c);
            byte_offsets.push(offset);
        }
        byte_offsets.push(text.len());
        Self {
            name: name.into(),
            chars,
            byte_offsets,
            position: 0,
            open_markers: 0,
        }
    }

    /// Reads UTF-8 text to the end and builds a buffer from it. The reader is dropped before this
    /// function returns.
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> std::io::Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::new(name, &text))
    }

    pub fn open_markers(&self) -> usize {
        self.open_markers
    }
}

impl CharStream for CodePointBuffer {
    fn lookahead(&self, offset: usize) -> Option<char> {
        if offset == 0 {
            return None;
        }
        self.chars.get(self.position + offset - 1).copied()
    }

    fn consume(&mut self) {
        if self.position < self.chars.len() {
            self.position += 1;
        }
    }

    fn index(&self) -> usize {
        self.position
    }

    fn size(&self) -> usize {
        self.chars.len()
    }

    fn mark(&mut self) -> Marker {
        self.open_markers += 1;
        Marker(self.position)
    }

    fn release(&mut self, _marker: Marker) {
        self.open_markers = self.open_markers.saturating_sub(1);
    }

    fn seek(&mut self, index: usize) {
        self.position = index.min(self.chars.len());
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn text(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.chars.len());
        let start = range.start.min(end);
        self.chars[start..end].iter().collect()
    }

    fn byte_offset(&self, index: usize) -> usize {
        let index = index.min(self.chars.len());
        self.byte_offsets[index]
    }
}

/// Wraps a stream so that lookahead sees upper-cased characters, letting single-case keyword
/// tables match text written in any case. Everything else, including [`CharStream::text`], is
/// passed through untouched.
#[derive(Debug, Clone)]
pub struct CaseFoldingStream<S> {
    inner: S,
}

impl<S> CaseFoldingStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl CaseFoldingStream<CodePointBuffer> {
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(CodePointBuffer::new(name, text))
    }
}

impl<S> CharStream for CaseFoldingStream<S>
where
    S: CharStream,
{
    fn lookahead(&self, offset: usize) -> Option<char> {
        self.inner.lookahead(offset).map(fold_char)
    }

    fn consume(&mut self) {
        self.inner.consume()
    }

    fn index(&self) -> usize {
        self.inner.index()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn mark(&mut self) -> Marker {
        self.inner.mark()
    }

    fn release(&mut self, marker: Marker) {
        self.inner.release(marker)
    }

    fn seek(&mut self, index: usize) {
        self.inner.seek(index)
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    fn text(&self, range: Range<usize>) -> String {
        self.inner.text(range)
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.inner.byte_offset(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_never_reaches_the_stream() {
        let stream = CodePointBuffer::new("Модуль.bsl", "\u{feff}Если");
        assert_eq!(stream.size(), 4);
        assert_eq!(stream.lookahead(1), Some('Е'));
        assert_eq!(stream.text(0..4), "Если");
        assert_eq!(stream.byte_offset(0), 0);
    }

    #[test]
    fn lookahead_is_folded_but_text_is_not() {
        let mut stream = CaseFoldingStream::from_text("Модуль.bsl", "еСлИ");
        assert_eq!(stream.lookahead(1), Some('Е'));
        assert_eq!(stream.lookahead(2), Some('С'));
        stream.consume();
        assert_eq!(stream.lookahead(1), Some('С'));
        assert_eq!(stream.text(0..4), "еСлИ");
    }

    #[test]
    fn end_of_input_passes_through() {
        let mut stream = CaseFoldingStream::from_text("", "a");
        assert_eq!(stream.lookahead(2), None);
        stream.consume();
        stream.consume();
        assert_eq!(stream.lookahead(1), None);
        assert_eq!(stream.index(), 1);
    }

    #[test]
    fn navigation_is_delegated() {
        let mut stream = CaseFoldingStream::from_text("Модуль.bsl", "Перем А;");
        let marker = stream.mark();
        stream.seek(6);
        assert_eq!(stream.lookahead(1), Some('А'));
        assert_eq!(stream.byte_offset(6), "Перем ".len());
        stream.release(marker);
        assert_eq!(stream.get_ref().open_markers(), 0);
        assert_eq!(stream.source_name(), "Модуль.bsl");
        stream.seek(100);
        assert_eq!(stream.index(), stream.size());
    }

    #[test]
    fn reading_from_a_reader() {
        let bytes: &[u8] = b"\xEF\xBB\xBFA = 1;";
        let buffer = CodePointBuffer::from_reader("Модуль.bsl", bytes).unwrap();
        assert_eq!(buffer.text(0..6), "A = 1;");

        let invalid: &[u8] = &[0xff, 0xfe, 0x00];
        assert!(CodePointBuffer::from_reader("Модуль.bsl", invalid).is_err());
    }
}
