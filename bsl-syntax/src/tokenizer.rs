use std::{
    io::{self, Read},
    sync::{Mutex, PoisonError},
};

use bsl_foundation::{
    cache::CacheCell,
    errors::{Diagnostic, RenderError},
    source::{strip_bom, SourceFile},
};
use bsl_lexer::{
    bsl,
    char_stream::{CaseFoldingStream, CharStream, CodePointBuffer},
    query::QueryLexer,
    Channel, Token, TokenCursor, TokenSource,
};
use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::{module::ModuleParser, query::QueryParser, PredictionMode, SyntaxAutomaton};

/// A syntax automaton could not be constructed.
#[derive(Debug, Error)]
#[error("cannot construct syntax automaton: {message}")]
pub struct AutomatonError {
    pub message: String,
}

impl AutomatonError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("cannot read source: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
    #[error("cannot render diagnostic: {0}")]
    Render(#[from] RenderError),
}

/// Result of parsing a token list.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub tree: T,
    /// Prediction mode of the parse that produced the tree.
    pub mode: PredictionMode,
    pub error_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses the default channel of `tokens`, trying optimistic prediction first and falling back
/// to general prediction if that fails.
pub fn parse_two_phase<P>(parser: &mut P, tokens: &[Token<P::Kind>]) -> Parsed<P::Tree>
where
    P: SyntaxAutomaton,
{
    let mut cursor = TokenCursor::on_default_channel(tokens);

    #[cfg(feature = "optimistic-prediction")]
    {
        parser.reset();
        parser.set_prediction_mode(PredictionMode::Optimistic);
        match parser.parse_root(&mut cursor) {
            Ok(tree) if parser.error_count() == 0 => {
                return Parsed {
                    tree,
                    mode: parser.prediction_mode(),
                    error_count: 0,
                    diagnostics: parser.take_diagnostics(),
                };
            }
            Ok(_) | Err(_) => {
                debug!("optimistic prediction failed, reparsing with general prediction");
            }
        }
        cursor.rewind();
    }

    parser.reset();
    parser.set_prediction_mode(PredictionMode::General);
    let tree = match parser.parse_root(&mut cursor) {
        Ok(tree) => tree,
        Err(error) => {
            warn!(?error, "general prediction could not recover");
            parser.empty_tree()
        }
    };
    Parsed {
        tree,
        mode: parser.prediction_mode(),
        error_count: parser.error_count(),
        diagnostics: parser.take_diagnostics(),
    }
}

/// A source unit: text plus its lazily computed tokens and syntax tree.
///
/// Tokens and the tree are computed on first access and kept until [`Tokenizer::rebuild`]. The
/// lexer and the parser are created once and reused for every rebuild.
pub struct Tokenizer<L, P>
where
    L: TokenSource,
    P: SyntaxAutomaton<Kind = L::Kind>,
{
    name: String,
    text: String,
    lexer: Mutex<L>,
    parser: Mutex<P>,
    tokens: CacheCell<Vec<Token<L::Kind>>>,
    parsed: CacheCell<Parsed<P::Tree>>,
}

impl<L, P> Tokenizer<L, P>
where
    L: TokenSource,
    P: SyntaxAutomaton<Kind = L::Kind>,
{
    pub fn new(
        name: impl Into<String>,
        text: &str,
        lexer: L,
        parser: impl FnOnce() -> Result<P, AutomatonError>,
    ) -> Result<Self, TokenizerError> {
        Ok(Self {
            name: name.into(),
            text: strip_bom(text).to_owned(),
            lexer: Mutex::new(lexer),
            parser: Mutex::new(parser()?),
            tokens: CacheCell::new(),
            parsed: CacheCell::new(),
        })
    }

    /// Reads the whole source from `reader` before anything else happens.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl Read,
        lexer: L,
        parser: impl FnOnce() -> Result<P, AutomatonError>,
    ) -> Result<Self, TokenizerError> {
        let name = name.into();
        let buffer = CodePointBuffer::from_reader(name.as_str(), reader)?;
        let text = buffer.text(0..buffer.size());
        Self::new(name, &text, lexer, parser)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text with any byte order mark removed. Token spans index into this.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All tokens, ending with an end of file token on the hidden channel.
    pub fn tokens(&self) -> &[Token<L::Kind>] {
        self.tokens.get_or_compute(|| {
            let _span = info_span!("lex", file = %self.name).entered();
            let mut lexer = self.lexer.lock().unwrap_or_else(PoisonError::into_inner);
            lexer.set_input(CaseFoldingStream::new(CodePointBuffer::new(
                self.name.as_str(),
                &self.text,
            )));
            let mut tokens = lexer.tokenize();
            if let Some(end) = tokens.last_mut() {
                end.channel = Channel::HIDDEN;
            }
            debug!(count = tokens.len(), "lexed");
            tokens
        })
    }

    pub fn parsed(&self) -> &Parsed<P::Tree> {
        self.parsed.get_or_compute(|| {
            let tokens = self.tokens();
            let _span = info_span!("parse", file = %self.name).entered();
            let mut parser = self.parser.lock().unwrap_or_else(PoisonError::into_inner);
            parse_two_phase(&mut *parser, tokens)
        })
    }

    pub fn ast(&self) -> &P::Tree {
        &self.parsed().tree
    }

    pub fn error_count(&self) -> usize {
        self.parsed().error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.parsed().diagnostics
    }

    /// The source as a file that diagnostics can be rendered against.
    pub fn source_file(&self) -> SourceFile {
        SourceFile::new(self.name.as_str(), self.text.as_str())
    }

    /// Renders the diagnostics of the parse without colors, one after another.
    pub fn render_diagnostics(&self) -> Result<String, TokenizerError> {
        let file = self.source_file();
        let mut rendered = String::new();
        for diagnostic in self.diagnostics() {
            rendered.push_str(&diagnostic.emit_to_string(&file)?);
        }
        Ok(rendered)
    }

    /// Prints the diagnostics of the parse to stderr.
    pub fn emit_diagnostics(&self) -> Result<(), TokenizerError> {
        let file = self.source_file();
        for diagnostic in self.diagnostics() {
            diagnostic.emit_to_stderr(&file)?;
        }
        Ok(())
    }

    /// Replaces the source text, dropping the cached tokens and tree.
    pub fn rebuild(&mut self, text: &str) {
        self.text = strip_bom(text).to_owned();
        self.tokens.clear();
        self.parsed.clear();
    }
}

pub type BslTokenizer = Tokenizer<bsl::Lexer, ModuleParser>;

pub type QueryTokenizer = Tokenizer<QueryLexer, QueryParser>;

impl Tokenizer<bsl::Lexer, ModuleParser> {
    pub fn module(name: impl Into<String>, text: &str) -> Result<Self, TokenizerError> {
        Self::new(name, text, bsl::Lexer::new(), || Ok(ModuleParser::new()))
    }
}

impl Tokenizer<QueryLexer, QueryParser> {
    pub fn query(name: impl Into<String>, text: &str) -> Result<Self, TokenizerError> {
        Self::new(name, text, QueryLexer::new(), || Ok(QueryParser::new()))
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use bsl_lexer::{bsl::TokenKind, query::QueryTokenKind};
    use indoc::indoc;

    use super::*;
    use crate::{module::ModuleRule, query::QueryRule};

    fn code_kinds(tokens: &[Token<TokenKind>]) -> Vec<TokenKind> {
        tokens
            .iter()
            .filter(|token| token.channel == Channel::DEFAULT)
            .map(|token| token.kind)
            .collect()
    }

    const MODULE: &str = indoc! {"
        Процедура Тест()
            Сообщить(\"Привет\");
        КонецПроцедуры
    "};

    #[test]
    fn tokens_and_tree_are_cached() {
        let tokenizer = BslTokenizer::module("Модуль.bsl", MODULE).unwrap();
        let tokens = tokenizer.tokens();
        assert!(ptr::eq(tokens, tokenizer.tokens()));
        let tree = tokenizer.ast();
        assert!(ptr::eq(tree, tokenizer.ast()));
        assert_eq!(tokenizer.error_count(), 0);
        assert_eq!(tree.find_all(ModuleRule::Sub).len(), 1);
    }

    #[test]
    fn end_of_file_is_hidden() {
        let tokenizer = BslTokenizer::module("", "Если Условие() Тогда").unwrap();
        let tokens = tokenizer.tokens();
        assert_eq!(tokens.len(), 8);
        let end = &tokens[7];
        assert_eq!(end.kind, TokenKind::EndOfFile);
        assert_eq!(end.channel, Channel::HIDDEN);

        let empty = BslTokenizer::module("", "").unwrap();
        assert_eq!(empty.tokens().len(), 1);
        assert_eq!(empty.tokens()[0].channel, Channel::HIDDEN);
    }

    #[test]
    fn rebuild_matches_fresh_tokenizer() {
        let mut tokenizer = BslTokenizer::module("", "А = 1;").unwrap();
        assert_eq!(tokenizer.tokens().len(), 7);
        tokenizer.ast();

        tokenizer.rebuild(MODULE);
        let fresh = BslTokenizer::module("", MODULE).unwrap();
        assert_eq!(tokenizer.tokens(), fresh.tokens());
        assert_eq!(tokenizer.ast().text(), fresh.ast().text());
        assert_eq!(tokenizer.error_count(), fresh.error_count());
    }

    #[test]
    fn byte_order_mark_is_dropped() {
        let tokenizer = BslTokenizer::module("", "\u{feff}Перем А;").unwrap();
        assert_eq!(tokenizer.text(), "Перем А;");
        let first = &tokenizer.tokens()[0];
        assert_eq!(first.span.get_input(tokenizer.text()), "Перем");
    }

    #[test]
    fn syntax_errors_do_not_fail() {
        let tokenizer = BslTokenizer::module("", "Процедура А( КонецПроцедуры").unwrap();
        assert!(tokenizer.error_count() > 0);
        assert_eq!(tokenizer.diagnostics().len(), tokenizer.error_count());
        assert_eq!(tokenizer.parsed().mode, PredictionMode::General);
        assert_eq!(tokenizer.ast().text(), "ПроцедураА(КонецПроцедуры");
    }

    #[test]
    fn reading_from_a_reader() {
        let tokenizer = BslTokenizer::from_reader(
            "Модуль.bsl",
            "\u{feff}Перем А;".as_bytes(),
            bsl::Lexer::new(),
            || Ok(ModuleParser::new()),
        )
        .unwrap();
        assert_eq!(code_kinds(tokenizer.tokens()).len(), 3);
        assert_eq!(tokenizer.name(), "Модуль.bsl");
        assert_eq!(tokenizer.text(), "Перем А;");
    }

    #[test]
    fn invalid_utf8_is_an_io_error() {
        let result = BslTokenizer::from_reader("", &[0xff, 0xfe][..], bsl::Lexer::new(), || {
            Ok(ModuleParser::new())
        });
        assert!(matches!(result, Err(TokenizerError::Io(_))));
    }

    #[test]
    fn diagnostics_render_against_the_source() {
        let tokenizer = BslTokenizer::module("Модуль.bsl", "Процедура А( КонецПроцедуры").unwrap();
        let rendered = tokenizer.render_diagnostics().unwrap();
        assert!(rendered.contains("Модуль.bsl:1:"));
        assert!(rendered.contains("identifier expected"));

        let clean = BslTokenizer::module("", MODULE).unwrap();
        assert_eq!(clean.render_diagnostics().unwrap(), "");
        clean.emit_diagnostics().unwrap();
    }

    #[test]
    fn factory_failure_is_fatal() {
        let result = BslTokenizer::new("", "", bsl::Lexer::new(), || {
            Err(AutomatonError::new("no grammar"))
        });
        assert!(matches!(result, Err(TokenizerError::Automaton(_))));
    }

    #[test]
    fn query_tokenizer() {
        let tokenizer =
            QueryTokenizer::query("", "Выбрать Ссылка Из Справочник.Контрагенты").unwrap();
        let tokens = tokenizer.tokens();
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[9].kind, QueryTokenKind::EndOfFile);
        assert_eq!(tokens[9].channel, Channel::HIDDEN);
        assert_eq!(tokenizer.ast().find_all(QueryRule::Query).len(), 1);
    }
}
