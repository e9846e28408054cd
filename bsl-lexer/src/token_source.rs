use std::fmt;

use bsl_foundation::{ident::fold_char, source::Span};
use tracing::trace;

use crate::{
    char_stream::{CaseFoldingStream, CharStream, CodePointBuffer},
    line_tracking::{CrAwareLineTracker, LineTracking, TextPosition},
    token::{Channel, Kind, Token},
};

/// A lexical automaton: turns a character stream into tokens.
pub trait TokenSource {
    type Kind: Kind;
    type Mode: Copy + Eq + fmt::Debug;

    /// Replaces the input and resets all lexing state.
    fn set_input(&mut self, input: CaseFoldingStream<CodePointBuffer>);

    fn source_name(&self) -> &str;

    fn mode(&self) -> Self::Mode;

    fn set_mode(&mut self, mode: Self::Mode);

    fn push_mode(&mut self, mode: Self::Mode);

    /// Returns to the previous mode, yielding the mode that was left.
    fn pop_mode(&mut self) -> Self::Mode;

    /// Rewinds to the start of the current input and resets all lexing state.
    fn reset(&mut self);

    /// Produces the next token. After the end of input has been reached, every call returns an
    /// end of file token.
    fn next_token(&mut self) -> Token<Self::Kind>;

    /// Lexes the remaining input. The last token is always the end of file token.
    fn tokenize(&mut self) -> Vec<Token<Self::Kind>> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token();
            let is_end = token.is_end_of_file();
            tokens.push(token);
            if is_end {
                break tokens;
            }
        }
    }
}

/// Current lexical mode plus the modes to return to.
#[derive(Debug, Clone)]
pub struct ModeStack<M> {
    current: M,
    stack: Vec<M>,
    initial: M,
}

impl<M> ModeStack<M>
where
    M: Copy + fmt::Debug,
{
    pub fn new(initial: M) -> Self {
        Self {
            current: initial,
            stack: vec![],
            initial,
        }
    }

    pub fn current(&self) -> M {
        self.current
    }

    pub fn set(&mut self, mode: M) {
        trace!(from = ?self.current, to = ?mode, "switching lexical mode");
        self.current = mode;
    }

    pub fn push(&mut self, mode: M) {
        trace!(from = ?self.current, to = ?mode, "entering lexical mode");
        self.stack.push(self.current);
        self.current = mode;
    }

    /// Returns to the previous mode. Popping with an empty stack returns to the initial mode.
    pub fn pop(&mut self) -> M {
        let previous = self.current;
        self.current = self.stack.pop().unwrap_or(self.initial);
        trace!(from = ?previous, to = ?self.current, "leaving lexical mode");
        previous
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.stack.clear();
    }
}

/// Character-level machinery shared by the lexers: cursor, position tracking, and token assembly.
#[derive(Debug, Clone)]
pub struct Scanner<T = CrAwareLineTracker> {
    input: CaseFoldingStream<CodePointBuffer>,
    tracker: T,
    token_start: usize,
    token_position: TextPosition,
    next_index: usize,
}

impl<T> Scanner<T>
where
    T: LineTracking + Default,
{
    pub fn new(input: CaseFoldingStream<CodePointBuffer>) -> Self {
        Self {
            input,
            tracker: T::default(),
            token_start: 0,
            token_position: TextPosition::default(),
            next_index: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(CaseFoldingStream::from_text("", ""))
    }

    pub fn set_input(&mut self, input: CaseFoldingStream<CodePointBuffer>) {
        self.input = input;
        self.rewind();
    }

    /// Moves back to the start of the input.
    pub fn rewind(&mut self) {
        self.input.seek(0);
        self.tracker.reset();
        self.token_start = 0;
        self.token_position = TextPosition::default();
        self.next_index = 0;
    }

    pub fn source_name(&self) -> &str {
        self.input.source_name()
    }

    /// Upper-cased character `offset` characters ahead; `peek_nth(1)` is the current character.
    pub fn peek_nth(&self, offset: usize) -> Option<char> {
        self.input.lookahead(offset)
    }

    pub fn current_char(&self) -> Option<char> {
        self.input.lookahead(1)
    }

    pub fn is_at_end(&self) -> bool {
        self.current_char().is_none()
    }

    pub fn advance_char(&mut self) {
        self.tracker.consume(&mut self.input);
    }

    pub fn advance_chars(&mut self, count: usize) {
        for _ in 0..count {
            self.advance_char();
        }
    }

    pub fn advance_while(&mut self, mut test: impl FnMut(char) -> bool) {
        while self.current_char().map(&mut test).unwrap_or(false) {
            self.advance_char();
        }
    }

    /// Skips to the end of the current line, leaving the line break in place.
    pub fn advance_to_line_end(&mut self) {
        self.advance_while(|c| !matches!(c, '\r' | '\n'));
    }

    /// Consumes one line break (`\r\n`, `\r`, or `\n`) if there is one.
    pub fn advance_line_break(&mut self) -> bool {
        match self.current_char() {
            Some('\r') => {
                self.advance_char();
                if self.current_char() == Some('\n') {
                    self.advance_char();
                }
                true
            }
            Some('\n') => {
                self.advance_char();
                true
            }
            _ => false,
        }
    }

    /// Marks the current position as the start of the next token.
    pub fn begin_token(&mut self) {
        self.token_start = self.input.index();
        self.token_position = self.tracker.position();
    }

    pub fn token_len(&self) -> usize {
        self.input.index() - self.token_start
    }

    /// Text of the token being lexed, upper-cased for keyword lookup.
    pub fn folded_token_text(&self) -> String {
        self.input
            .text(self.token_start..self.input.index())
            .chars()
            .map(fold_char)
            .collect()
    }

    /// Reads the word starting `offset` characters ahead without consuming it, returning its
    /// upper-cased text and length in characters.
    pub fn peek_word(&self, offset: usize) -> (String, usize) {
        let mut word = String::new();
        let mut length = 0;
        while let Some(c) = self.peek_nth(offset + length) {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            length += 1;
        }
        (word, length)
    }

    /// Builds a token out of everything consumed since [`Scanner::begin_token`].
    pub fn emit<K>(&mut self, kind: K, channel: Channel) -> Token<K>
    where
        K: Kind,
    {
        let end = self.input.index();
        let token = Token {
            kind,
            channel,
            text: self.input.text(self.token_start..end),
            line: self.token_position.line,
            column: self.token_position.column,
            index: self.next_index,
            span: Span {
                start: self.input.byte_offset(self.token_start),
                end: self.input.byte_offset(end),
            },
        };
        self.next_index += 1;
        self.token_start = end;
        token
    }

    /// Emits a token with the kind's own channel.
    pub fn emit_kind<K>(&mut self, kind: K) -> Token<K>
    where
        K: Kind,
    {
        self.emit(kind, kind.channel())
    }
}

pub fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whitespace other than line breaks.
pub fn is_inline_space(c: char) -> bool {
    c != '\r' && c != '\n' && c.is_whitespace()
}
