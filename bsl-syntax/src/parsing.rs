mod recovery;

use bsl_foundation::{
    errors::{Diagnostic, Label, Note, NoteKind},
    source::Span,
};
use bsl_lexer::{Kind, Token, TokenCursor};
use tracing::debug;

pub use recovery::*;

/// How far ahead the parser may look in [`PredictionMode::Optimistic`] before giving up.
pub const OPTIMISTIC_LOOKAHEAD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionMode {
    /// Bounded lookahead, no error recovery: the first error aborts the parse.
    Optimistic,
    /// Unbounded lookahead; errors are reported and recovered from.
    #[default]
    General,
}

/// State a syntax automaton keeps between parses: its prediction mode and what the last parse
/// reported.
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    mode: PredictionMode,
    error_count: usize,
    diagnostics: Vec<Diagnostic>,
}

impl ParserState {
    pub fn mode(&self) -> PredictionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PredictionMode) {
        self.mode = mode;
    }

    /// Forgets errors and diagnostics of the previous parse.
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.diagnostics.clear();
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

pub struct Parser<'a, 't, K> {
    pub tokens: &'a mut TokenCursor<'t, K>,
    state: &'a mut ParserState,
    #[cfg(feature = "parse-traceback")]
    rule_traceback: Vec<&'static str>,
}

impl<'a, 't, K> Parser<'a, 't, K>
where
    K: Kind,
{
    pub fn new(tokens: &'a mut TokenCursor<'t, K>, state: &'a mut ParserState) -> Self {
        Self {
            tokens,
            state,
            #[cfg(feature = "parse-traceback")]
            rule_traceback: Vec::with_capacity(32),
        }
    }

    pub fn mode(&self) -> PredictionMode {
        self.state.mode
    }

    fn rule_traceback(&self) -> Vec<&'static str> {
        #[cfg(feature = "parse-traceback")]
        {
            self.rule_traceback.clone()
        }
        #[cfg(not(feature = "parse-traceback"))]
        {
            vec![]
        }
    }

    pub fn make_error(&self, span: Span) -> ParseError {
        ParseError::new(span, self.rule_traceback())
    }

    pub fn bail<T>(&mut self, error_span: Span, error: Diagnostic) -> Result<T, ParseError> {
        self.emit_diagnostic(error);
        Err(self.make_error(error_span))
    }

    pub fn emit_diagnostic(&mut self, diagnostic: Diagnostic) {
        #[cfg(feature = "parse-traceback")]
        let diagnostic = diagnostic.with_note(Note {
            kind: NoteKind::Debug,
            text: {
                let mut s = String::from("parser traceback (innermost rule last):");
                for rule in &self.rule_traceback {
                    s.push_str("\n    ");
                    s.push_str(rule);
                }
                s
            },
        });
        if diagnostic.is_error() {
            self.state.error_count += 1;
        }
        self.state.diagnostics.push(diagnostic);
    }

    pub fn scope_mut<R>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> R) -> R {
        #[cfg(feature = "parse-traceback")]
        {
            self.rule_traceback.push(name);
            let result = f(self);
            self.rule_traceback.pop();
            result
        }
        #[cfg(not(feature = "parse-traceback"))]
        {
            let _ = name;
            f(self)
        }
    }

    pub fn peek(&self) -> &Token<K> {
        self.tokens.peek()
    }

    pub fn peek_kind(&self) -> K {
        self.tokens.peek().kind
    }

    pub fn at(&self, kind: K) -> bool {
        self.peek_kind() == kind
    }

    /// Peeks `n` tokens ahead. Optimistic prediction refuses to look further than
    /// [`OPTIMISTIC_LOOKAHEAD`] tokens, failing the parse instead.
    pub fn lookahead(&self, n: usize) -> Result<&Token<K>, ParseError> {
        self.lookahead_charged(n, n)
    }

    /// Peeks `n` tokens ahead, counting only `cost` of them against the optimistic bound. Scans
    /// that step over bracketed groups charge the tokens outside the brackets.
    pub fn lookahead_charged(&self, n: usize, cost: usize) -> Result<&Token<K>, ParseError> {
        if self.mode() == PredictionMode::Optimistic && cost >= OPTIMISTIC_LOOKAHEAD {
            debug!(n, cost, "optimistic lookahead exhausted");
            return Err(self.make_error(self.peek().span));
        }
        Ok(self.tokens.peek_nth(n))
    }

    pub fn next(&mut self) -> Token<K> {
        self.tokens.next()
    }

    pub fn eat(&mut self, kind: K) -> Option<Token<K>> {
        self.at(kind).then(|| self.next())
    }

    pub fn expect_with(
        &mut self,
        kind: K,
        error: impl FnOnce(&Token<K>) -> Diagnostic,
    ) -> Result<Token<K>, ParseError> {
        if self.at(kind) {
            Ok(self.next())
        } else {
            let found = self.peek().clone();
            self.bail(found.span, error(&found))
        }
    }

    pub fn expect(&mut self, kind: K) -> Result<Token<K>, ParseError> {
        self.expect_with(kind, |found| {
            Diagnostic::error(format!("{} expected", kind.name()))
                .with_label(Label::primary(
                    found,
                    format!("{} expected here", kind.name()),
                ))
                .with_note(Note {
                    kind: NoteKind::Debug,
                    text: format!("at token {found}"),
                })
        })
    }

    /// Reports the next token as unexpected.
    pub fn unexpected<T>(&mut self, expected: &str) -> Result<T, ParseError> {
        let found = self.peek().clone();
        self.bail(
            found.span,
            Diagnostic::error(format!("unexpected {}", found.kind.name())).with_label(
                Label::primary(&found, format!("{expected} expected here")),
            ),
        )
    }
}

/// The syntax node could not be parsed.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub span: Span,
    pub rule_traceback: Vec<&'static str>,
}

impl ParseError {
    pub fn new(span: Span, rule_traceback: Vec<&'static str>) -> Self {
        Self {
            span,
            rule_traceback,
        }
    }
}

/// A syntactic automaton: parses a token stream from its entry rule.
pub trait SyntaxAutomaton {
    type Kind: Kind;
    type Tree;

    fn set_prediction_mode(&mut self, mode: PredictionMode);

    fn prediction_mode(&self) -> PredictionMode;

    /// Clears the error counter and diagnostics of the previous parse.
    fn reset(&mut self);

    /// Parses the token stream with the automaton's entry rule.
    ///
    /// In [`PredictionMode::General`] this only fails if the grammar cannot recover at all.
    fn parse_root(
        &mut self,
        tokens: &mut TokenCursor<'_, Self::Kind>,
    ) -> Result<Self::Tree, ParseError>;

    fn error_count(&self) -> usize;

    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;

    /// Tree to use when even the general parse fails.
    fn empty_tree(&self) -> Self::Tree;
}

#[cfg(test)]
mod tests {
    use bsl_lexer::{
        bsl::{Lexer, TokenKind},
        TokenSource,
    };

    use super::*;

    #[test]
    fn errors_are_counted() {
        let tokens = Lexer::from_text("", "А Б").tokenize();
        let mut cursor = TokenCursor::on_default_channel(&tokens);
        let mut state = ParserState::default();
        let mut parser = Parser::new(&mut cursor, &mut state);

        assert!(parser.expect(TokenKind::Identifier).is_ok());
        let error = parser.expect(TokenKind::Semicolon).unwrap_err();
        assert_eq!(error.span, Span { start: 3, end: 5 });
        assert!(parser.eat(TokenKind::Identifier).is_some());
        assert!(parser.at(TokenKind::EndOfFile));

        assert_eq!(state.error_count(), 1);
        assert_eq!(state.diagnostics()[0].message, "`;` expected");
    }

    #[test]
    fn optimistic_lookahead_is_bounded() {
        let tokens = Lexer::from_text("", "А").tokenize();
        let mut cursor = TokenCursor::on_default_channel(&tokens);
        let mut state = ParserState::default();
        state.set_mode(PredictionMode::Optimistic);
        let parser = Parser::new(&mut cursor, &mut state);
        assert!(parser.lookahead(OPTIMISTIC_LOOKAHEAD - 1).is_ok());
        assert!(parser.lookahead(OPTIMISTIC_LOOKAHEAD).is_err());
        assert!(parser.lookahead_charged(OPTIMISTIC_LOOKAHEAD * 2, 3).is_ok());
        assert!(parser
            .lookahead_charged(OPTIMISTIC_LOOKAHEAD, OPTIMISTIC_LOOKAHEAD)
            .is_err());
    }

    #[cfg(feature = "parse-traceback")]
    #[test]
    fn traceback_is_attached() {
        let tokens = Lexer::from_text("", "").tokenize();
        let mut cursor = TokenCursor::on_default_channel(&tokens);
        let mut state = ParserState::default();
        let mut parser = Parser::new(&mut cursor, &mut state);
        let error = parser
            .scope_mut("outer", |parser| {
                parser.scope_mut("inner", |parser| parser.expect(TokenKind::Identifier))
            })
            .unwrap_err();
        assert_eq!(error.rule_traceback, ["outer", "inner"]);
        let notes = &state.diagnostics()[0].notes;
        assert!(notes[0].text.starts_with("at token"));
        let traceback = notes.last().unwrap();
        assert_eq!(traceback.kind, NoteKind::Debug);
        assert!(traceback
            .text
            .starts_with("parser traceback (innermost rule last):"));
        assert!(traceback.text.ends_with("outer\n    inner"));
    }
}
