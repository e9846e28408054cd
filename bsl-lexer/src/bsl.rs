//! Lexer for BSL modules.

mod keywords;
pub mod symbols;

use crate::{
    char_stream::{CaseFoldingStream, CodePointBuffer},
    token::{Channel, Kind, Token},
    token_source::{is_inline_space, is_word_char, is_word_start, ModeStack, Scanner, TokenSource},
};

use keywords::{ANNOTATIONS, AWAIT, DIRECTIVES, KEYWORDS, PATCH_MARKERS};
pub use symbols::PlatformSymbol;

define_token_kinds! {
    /// Kinds of tokens found in BSL modules.
    pub enum TokenKind {
        WhiteSpace  = "whitespace",
        LineComment = "comment",

        Identifier  = "identifier",
        Number      = "number",
        DateTime    = "date literal",
        String      = "string literal",
        StringStart = "start of a multi-line string",
        StringPart  = "multi-line string continuation",
        StringTail  = "end of a multi-line string",
        True        = "`Истина`",
        False       = "`Ложь`",
        Undefined   = "`Неопределено`",
        Null        = "`Null`",

        Procedure     = "`Процедура`",
        Function      = "`Функция`",
        EndProcedure  = "`КонецПроцедуры`",
        EndFunction   = "`КонецФункции`",
        Export        = "`Экспорт`",
        Val           = "`Знач`",
        Var           = "`Перем`",
        If            = "`Если`",
        Then          = "`Тогда`",
        ElsIf         = "`ИначеЕсли`",
        Else          = "`Иначе`",
        EndIf         = "`КонецЕсли`",
        While         = "`Пока`",
        For           = "`Для`",
        Each          = "`Каждого`",
        In            = "`Из`",
        To            = "`По`",
        Do            = "`Цикл`",
        EndDo         = "`КонецЦикла`",
        Try           = "`Попытка`",
        Except        = "`Исключение`",
        EndTry        = "`КонецПопытки`",
        Return        = "`Возврат`",
        Continue      = "`Продолжить`",
        Break         = "`Прервать`",
        Raise         = "`ВызватьИсключение`",
        Execute       = "`Выполнить`",
        Goto          = "`Перейти`",
        AddHandler    = "`ДобавитьОбработчик`",
        RemoveHandler = "`УдалитьОбработчик`",
        New           = "`Новый`",
        Not           = "`Не`",
        And           = "`И`",
        Or            = "`Или`",
        Async         = "`Асинх`",
        Await         = "`Ждать`",

        Dot            = "`.`",
        LeftBracket    = "`[`",
        RightBracket   = "`]`",
        LeftParen      = "`(`",
        RightParen     = "`)`",
        Colon          = "`:`",
        Semicolon      = "`;`",
        Comma          = "`,`",
        Assign         = "`=`",
        Plus           = "`+`",
        Minus          = "`-`",
        Mul            = "`*`",
        Quotient       = "`/`",
        Modulo         = "`%`",
        Less           = "`<`",
        LessOrEqual    = "`<=`",
        NotEqual       = "`<>`",
        Greater        = "`>`",
        GreaterOrEqual = "`>=`",
        Question       = "`?`",
        Ampersand      = "`&`",
        Tilda          = "`~`",
        Hash           = "`#`",

        AnnotationAtServer                  = "`НаСервере`",
        AnnotationAtClient                  = "`НаКлиенте`",
        AnnotationAtClientAtServer          = "`НаКлиентеНаСервере`",
        AnnotationAtServerNoContext         = "`НаСервереБезКонтекста`",
        AnnotationAtClientAtServerNoContext = "`НаКлиентеНаСервереБезКонтекста`",
        AnnotationBefore                    = "`Перед`",
        AnnotationAfter                     = "`После`",
        AnnotationAround                    = "`Вместо`",
        AnnotationChangeAndValidate         = "`ИзменениеИКонтроль`",
        AnnotationCustom                    = "annotation name",

        PreprocIf          = "`#Если`",
        PreprocElsIf       = "`#ИначеЕсли`",
        PreprocElse        = "`#Иначе`",
        PreprocEndIf       = "`#КонецЕсли`",
        PreprocThen        = "`Тогда`",
        PreprocNot         = "`Не`",
        PreprocAnd         = "`И`",
        PreprocOr          = "`Или`",
        PreprocLeftParen   = "`(`",
        PreprocRightParen  = "`)`",
        PreprocSymbol      = "build symbol",
        PreprocIdentifier  = "identifier",
        PreprocRegion      = "`#Область`",
        PreprocEndRegion   = "`#КонецОбласти`",
        PreprocUse         = "`#Использовать`",
        PreprocUsePath     = "library name",
        PreprocString      = "string literal",
        PreprocExclamation = "`!`",
        PreprocAny         = "directive text",
        PreprocNewline     = "end of directive",

        PreprocInsert    = "`#Вставка`",
        PreprocEndInsert = "`#КонецВставки`",
        PreprocDelete    = "`#Удаление`",
        PreprocEndDelete = "`#КонецУдаления`",
        PreprocDeleteAny = "deleted text",

        Unknown   = "unknown character",
        EndOfFile = "end of file",
    }
}

impl TokenKind {
    pub const fn channel(&self) -> Channel {
        match self {
            TokenKind::WhiteSpace
            | TokenKind::LineComment
            | TokenKind::PreprocNewline
            | TokenKind::PreprocInsert
            | TokenKind::PreprocEndInsert => Channel::HIDDEN,
            TokenKind::PreprocDelete | TokenKind::PreprocEndDelete | TokenKind::PreprocDeleteAny => {
                Channel::DELETED
            }
            _ => Channel::DEFAULT,
        }
    }

    /// Tokens that can only appear within a `#` directive line.
    pub fn is_directive_part(&self) -> bool {
        *self >= TokenKind::PreprocIf && *self <= TokenKind::PreprocNewline
    }

    pub fn is_annotation(&self) -> bool {
        *self >= TokenKind::AnnotationAtServer && *self <= TokenKind::AnnotationCustom
    }

    pub fn closed_by(&self) -> Option<TokenKind> {
        match self {
            TokenKind::LeftParen => Some(TokenKind::RightParen),
            TokenKind::LeftBracket => Some(TokenKind::RightBracket),
            _ => None,
        }
    }
}

impl Kind for TokenKind {
    const END_OF_FILE: Self = TokenKind::EndOfFile;

    fn name(&self) -> &'static str {
        TokenKind::name(self)
    }

    fn channel(&self) -> Channel {
        TokenKind::channel(self)
    }
}

/// Lexical modes of the BSL lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalMode {
    Default,
    /// Right after `.`; the next word is a member name even if it is spelled like a keyword.
    Dot,
    /// Right after `&`.
    Annotation,
    /// Inside a `#` directive line.
    Preprocessor,
    /// After `#Область`, where the next word is the region's name.
    Region,
    /// After `#Использовать`, where the rest of the line names a library.
    Use,
    /// Between the lines of a multi-line string.
    String,
    /// Inside a `#Удаление` patch zone.
    Delete,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    scanner: Scanner,
    modes: ModeStack<LexicalMode>,
    pending_async: bool,
    in_async_method: bool,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::empty(),
            modes: ModeStack::new(LexicalMode::Default),
            pending_async: false,
            in_async_method: false,
        }
    }

    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        let mut lexer = Self::new();
        lexer.set_input(CaseFoldingStream::new(CodePointBuffer::new(name, text)));
        lexer
    }

    fn emit(&mut self, kind: TokenKind) -> Token<TokenKind> {
        self.scanner.emit_kind(kind)
    }

    fn single(&mut self, kind: TokenKind) -> Token<TokenKind> {
        self.scanner.advance_char();
        self.emit(kind)
    }

    fn whitespace(&mut self) -> Token<TokenKind> {
        self.scanner.advance_while(char::is_whitespace);
        self.emit(TokenKind::WhiteSpace)
    }

    fn inline_whitespace(&mut self) -> Token<TokenKind> {
        self.scanner.advance_while(is_inline_space);
        self.emit(TokenKind::WhiteSpace)
    }

    fn line_comment(&mut self) -> Token<TokenKind> {
        self.scanner.advance_to_line_end();
        self.emit(TokenKind::LineComment)
    }

    fn starts_line_comment(&self) -> bool {
        self.scanner.current_char() == Some('/') && self.scanner.peek_nth(2) == Some('/')
    }

    /// Consumes string contents up to and including the closing quote. Returns `false` if the
    /// line or the input ends first.
    fn string_body(&mut self) -> bool {
        loop {
            match self.scanner.current_char() {
                Some('"') => {
                    self.scanner.advance_char();
                    if self.scanner.current_char() == Some('"') {
                        self.scanner.advance_char();
                    } else {
                        return true;
                    }
                }
                None | Some('\r' | '\n') => return false,
                Some(_) => self.scanner.advance_char(),
            }
        }
    }

    fn string(&mut self) -> Token<TokenKind> {
        self.scanner.advance_char();
        if self.string_body() {
            self.emit(TokenKind::String)
        } else {
            self.modes.push(LexicalMode::String);
            self.emit(TokenKind::StringStart)
        }
    }

    fn date(&mut self) -> Token<TokenKind> {
        self.scanner.advance_char();
        self.scanner
            .advance_while(|c| c != '\'' && c != '\r' && c != '\n');
        if self.scanner.current_char() == Some('\'') {
            self.scanner.advance_char();
            self.emit(TokenKind::DateTime)
        } else {
            self.emit(TokenKind::Unknown)
        }
    }

    fn number(&mut self) -> Token<TokenKind> {
        self.scanner.advance_while(|c| c.is_ascii_digit());
        if self.scanner.current_char() == Some('.')
            && self
                .scanner
                .peek_nth(2)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.scanner.advance_char();
            self.scanner.advance_while(|c| c.is_ascii_digit());
        }
        self.emit(TokenKind::Number)
    }

    fn word(&mut self) -> Token<TokenKind> {
        self.scanner.advance_while(is_word_char);
        let text = self.scanner.folded_token_text();
        let kind = match KEYWORDS.get(&text) {
            Some(&kind) => kind,
            None if self.in_async_method && AWAIT.contains_key(&text) => TokenKind::Await,
            None => TokenKind::Identifier,
        };
        match kind {
            TokenKind::Async => self.pending_async = true,
            TokenKind::Procedure | TokenKind::Function => {
                self.in_async_method = self.pending_async;
                self.pending_async = false;
            }
            TokenKind::EndProcedure | TokenKind::EndFunction => self.in_async_method = false,
            _ => (),
        }
        self.emit(kind)
    }

    /// Number of characters from the current position to the first non-space character after
    /// `offset`, plus one.
    fn skip_inline_space_from(&self, mut offset: usize) -> usize {
        while self.scanner.peek_nth(offset).map(is_inline_space).unwrap_or(false) {
            offset += 1;
        }
        offset
    }

    /// Lexes `#`. Patch markers become a single token together with the `#`; anything else starts
    /// a directive line.
    fn hash(&mut self) -> Token<TokenKind> {
        let word_offset = self.skip_inline_space_from(2);
        let (word, length) = self.scanner.peek_word(word_offset);
        if let Some(&kind) = PATCH_MARKERS.get(&word) {
            self.scanner.advance_chars(word_offset - 1 + length);
            if kind == TokenKind::PreprocDelete {
                self.modes.push(LexicalMode::Delete);
            }
            return self.emit(kind);
        }

        self.scanner.advance_char();
        self.modes.push(LexicalMode::Preprocessor);
        self.emit(TokenKind::Hash)
    }

    fn default_mode(&mut self, c: char) -> Token<TokenKind> {
        match c {
            _ if c.is_whitespace() => self.whitespace(),
            '/' if self.starts_line_comment() => self.line_comment(),
            '0'..='9' => self.number(),
            '"' => self.string(),
            '\'' => self.date(),
            '#' => self.hash(),
            '.' => {
                self.modes.push(LexicalMode::Dot);
                self.single(TokenKind::Dot)
            }
            '&' => {
                self.modes.push(LexicalMode::Annotation);
                self.single(TokenKind::Ampersand)
            }
            '<' => {
                self.scanner.advance_char();
                match self.scanner.current_char() {
                    Some('=') => self.single(TokenKind::LessOrEqual),
                    Some('>') => self.single(TokenKind::NotEqual),
                    _ => self.emit(TokenKind::Less),
                }
            }
            '>' => {
                self.scanner.advance_char();
                match self.scanner.current_char() {
                    Some('=') => self.single(TokenKind::GreaterOrEqual),
                    _ => self.emit(TokenKind::Greater),
                }
            }
            '/' => self.single(TokenKind::Quotient),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '=' => self.single(TokenKind::Assign),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Mul),
            '%' => self.single(TokenKind::Modulo),
            '?' => self.single(TokenKind::Question),
            '~' => self.single(TokenKind::Tilda),
            _ if is_word_start(c) => self.word(),
            _ => self.single(TokenKind::Unknown),
        }
    }

    fn dot_mode(&mut self, c: char) -> Token<TokenKind> {
        if is_inline_space(c) {
            return self.inline_whitespace();
        }
        self.modes.pop();
        if is_word_start(c) {
            self.scanner.advance_while(is_word_char);
            self.emit(TokenKind::Identifier)
        } else {
            self.default_mode(c)
        }
    }

    fn annotation_mode(&mut self, c: char) -> Token<TokenKind> {
        self.modes.pop();
        if is_word_start(c) {
            self.scanner.advance_while(is_word_char);
            let text = self.scanner.folded_token_text();
            let kind = ANNOTATIONS
                .get(&text)
                .copied()
                .unwrap_or(TokenKind::AnnotationCustom);
            self.emit(kind)
        } else {
            self.default_mode(c)
        }
    }

    fn directive_end(&mut self) -> Token<TokenKind> {
        self.scanner.advance_line_break();
        self.modes.pop();
        self.emit(TokenKind::PreprocNewline)
    }

    fn preprocessor_mode(&mut self, c: char) -> Token<TokenKind> {
        match c {
            '\r' | '\n' => self.directive_end(),
            _ if is_inline_space(c) => self.inline_whitespace(),
            '/' if self.starts_line_comment() => self.line_comment(),
            '(' => self.single(TokenKind::PreprocLeftParen),
            ')' => self.single(TokenKind::PreprocRightParen),
            '!' => self.single(TokenKind::PreprocExclamation),
            '#' => self.single(TokenKind::Hash),
            '"' => {
                self.scanner.advance_char();
                self.string_body();
                self.emit(TokenKind::PreprocString)
            }
            _ if is_word_start(c) => {
                self.scanner.advance_while(is_word_char);
                let text = self.scanner.folded_token_text();
                let kind = if let Some(&kind) = DIRECTIVES.get(&text) {
                    match kind {
                        TokenKind::PreprocRegion => self.modes.set(LexicalMode::Region),
                        TokenKind::PreprocUse => self.modes.set(LexicalMode::Use),
                        _ => (),
                    }
                    kind
                } else if PlatformSymbol::from_name(&text).is_some() {
                    TokenKind::PreprocSymbol
                } else {
                    TokenKind::PreprocIdentifier
                };
                self.emit(kind)
            }
            _ => {
                self.scanner
                    .advance_while(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '#'));
                if self.scanner.token_len() == 0 {
                    self.scanner.advance_char();
                }
                self.emit(TokenKind::PreprocAny)
            }
        }
    }

    fn region_mode(&mut self, c: char) -> Token<TokenKind> {
        match c {
            '\r' | '\n' => self.directive_end(),
            _ if is_inline_space(c) => self.inline_whitespace(),
            _ if is_word_char(c) => {
                self.scanner.advance_while(is_word_char);
                self.modes.set(LexicalMode::Preprocessor);
                self.emit(TokenKind::PreprocIdentifier)
            }
            _ => self.preprocessor_mode(c),
        }
    }

    fn use_mode(&mut self, c: char) -> Token<TokenKind> {
        match c {
            '\r' | '\n' => self.directive_end(),
            _ if is_inline_space(c) => self.inline_whitespace(),
            '"' => {
                self.scanner.advance_char();
                self.string_body();
                self.emit(TokenKind::PreprocString)
            }
            _ => {
                self.scanner.advance_while(|c| !c.is_whitespace());
                self.emit(TokenKind::PreprocUsePath)
            }
        }
    }

    fn string_mode(&mut self, c: char) -> Token<TokenKind> {
        match c {
            _ if c.is_whitespace() => self.whitespace(),
            '/' if self.starts_line_comment() => self.line_comment(),
            '#' => self.hash(),
            '|' => {
                self.scanner.advance_char();
                if self.string_body() {
                    self.modes.pop();
                    self.emit(TokenKind::StringTail)
                } else {
                    self.emit(TokenKind::StringPart)
                }
            }
            _ => {
                self.modes.pop();
                self.default_mode(c)
            }
        }
    }

    fn delete_mode(&mut self) -> Token<TokenKind> {
        let hash_offset = self.skip_inline_space_from(1);
        if self.scanner.peek_nth(hash_offset) == Some('#') {
            let word_offset = self.skip_inline_space_from(hash_offset + 1);
            let (word, length) = self.scanner.peek_word(word_offset);
            if PATCH_MARKERS.get(&word) == Some(&TokenKind::PreprocEndDelete) {
                self.scanner.advance_chars(word_offset - 1 + length);
                self.modes.pop();
                return self.emit(TokenKind::PreprocEndDelete);
            }
        }
        self.scanner.advance_to_line_end();
        self.scanner.advance_line_break();
        self.emit(TokenKind::PreprocDeleteAny)
    }
}

impl TokenSource for Lexer {
    type Kind = TokenKind;
    type Mode = LexicalMode;

    fn set_input(&mut self, input: CaseFoldingStream<CodePointBuffer>) {
        self.scanner.set_input(input);
        self.reset();
    }

    fn reset(&mut self) {
        self.scanner.rewind();
        self.modes.reset();
        self.pending_async = false;
        self.in_async_method = false;
    }

    fn source_name(&self) -> &str {
        self.scanner.source_name()
    }

    fn mode(&self) -> LexicalMode {
        self.modes.current()
    }

    fn set_mode(&mut self, mode: LexicalMode) {
        self.modes.set(mode)
    }

    fn push_mode(&mut self, mode: LexicalMode) {
        self.modes.push(mode)
    }

    fn pop_mode(&mut self) -> LexicalMode {
        self.modes.pop()
    }

    fn next_token(&mut self) -> Token<TokenKind> {
        self.scanner.begin_token();
        let Some(c) = self.scanner.current_char() else {
            return self.emit(TokenKind::EndOfFile);
        };
        match self.modes.current() {
            LexicalMode::Default => self.default_mode(c),
            LexicalMode::Dot => self.dot_mode(c),
            LexicalMode::Annotation => self.annotation_mode(c),
            LexicalMode::Preprocessor => self.preprocessor_mode(c),
            LexicalMode::Region => self.region_mode(c),
            LexicalMode::Use => self.use_mode(c),
            LexicalMode::String => self.string_mode(c),
            LexicalMode::Delete => self.delete_mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn lex(text: &str) -> Vec<Token<TokenKind>> {
        Lexer::from_text("Модуль.bsl", text).tokenize()
    }

    fn all_kinds(text: &str) -> Vec<TokenKind> {
        lex(text).into_iter().map(|token| token.kind).collect()
    }

    /// Kinds on the default channel, without the end of file token.
    fn code_kinds(text: &str) -> Vec<TokenKind> {
        lex(text)
            .into_iter()
            .filter(|token| token.channel == Channel::DEFAULT && !token.is_end_of_file())
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn keywords_ignore_case() {
        for text in ["Процедура", "ПРОЦЕДУРА", "процедура", "Procedure", "PROCEDURE"] {
            let tokens = lex(text);
            assert_eq!(tokens[0].kind, TokenKind::Procedure);
            assert_eq!(tokens[0].text, text);
        }
    }

    #[test]
    fn line_breaks_are_counted_once() {
        let tokens = lex("\r\n\r\r\n");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::WhiteSpace);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].kind, TokenKind::EndOfFile);
        assert_eq!(tokens[1].line, 4);
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let tokens = lex("\u{feff}Перем А;");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].column, 0);
        assert_eq!(tokens[0].span.start, 0);
        assert_eq!(tokens[0].text, "Перем");
    }

    #[test]
    fn positions() {
        let tokens = lex("Перем А;\n  Б = 1;");
        let b = tokens.iter().find(|token| token.text == "Б").unwrap();
        assert_eq!((b.line, b.column), (2, 2));
        assert_eq!(b.index, 5);
        assert_eq!(b.span.get_input("Перем А;\n  Б = 1;"), "Б");
    }

    #[test]
    fn keywords_after_dot_are_identifiers() {
        assert_eq!(
            code_kinds("Запрос.Выполнить()"),
            [
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::RightParen,
            ]
        );
        assert_eq!(
            code_kinds("А.Если = Истина"),
            [
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::True,
            ]
        );
    }

    #[test]
    fn annotations() {
        assert_eq!(
            code_kinds("&НаКлиенте"),
            [TokenKind::Ampersand, TokenKind::AnnotationAtClient]
        );
        assert_eq!(
            code_kinds("&НаКлиентеНаСервереБезКонтекста"),
            [
                TokenKind::Ampersand,
                TokenKind::AnnotationAtClientAtServerNoContext
            ]
        );
        assert_eq!(
            code_kinds("&Перед(\"Метод\")"),
            [
                TokenKind::Ampersand,
                TokenKind::AnnotationBefore,
                TokenKind::LeftParen,
                TokenKind::String,
                TokenKind::RightParen,
            ]
        );
        assert_eq!(
            code_kinds("&МояАннотация"),
            [TokenKind::Ampersand, TokenKind::AnnotationCustom]
        );
    }

    #[test]
    fn directive_lines() {
        assert_eq!(
            all_kinds("#Если Клиент Тогда\nА"),
            [
                TokenKind::Hash,
                TokenKind::PreprocIf,
                TokenKind::WhiteSpace,
                TokenKind::PreprocSymbol,
                TokenKind::WhiteSpace,
                TokenKind::PreprocThen,
                TokenKind::PreprocNewline,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(
            code_kinds("#ИначеЕсли НЕ (ТонкийКлиент ИЛИ Нечто) Тогда"),
            [
                TokenKind::Hash,
                TokenKind::PreprocElsIf,
                TokenKind::PreprocNot,
                TokenKind::PreprocLeftParen,
                TokenKind::PreprocSymbol,
                TokenKind::PreprocOr,
                TokenKind::PreprocIdentifier,
                TokenKind::PreprocRightParen,
                TokenKind::PreprocThen,
            ]
        );
    }

    #[test]
    fn near_miss_symbol_is_an_identifier() {
        // Cyrillic `О` in `MacОS`.
        assert_eq!(
            code_kinds("#Если MacОS Тогда"),
            [
                TokenKind::Hash,
                TokenKind::PreprocIf,
                TokenKind::PreprocIdentifier,
                TokenKind::PreprocThen,
            ]
        );
    }

    #[test]
    fn region_names_are_never_keywords() {
        for name in ["Если", "МобильныйКлиент", "Тогда", "1Область"] {
            let tokens: Vec<_> = lex(&format!("#Область {name}"))
                .into_iter()
                .filter(|token| token.channel == Channel::DEFAULT)
                .collect();
            assert_eq!(tokens[1].kind, TokenKind::PreprocRegion);
            assert_eq!(tokens[2].kind, TokenKind::PreprocIdentifier);
            assert_eq!(tokens[2].text, name);
        }
    }

    #[test]
    fn use_directive() {
        assert_eq!(
            code_kinds("#Использовать lib-name"),
            [
                TokenKind::Hash,
                TokenKind::PreprocUse,
                TokenKind::PreprocUsePath
            ]
        );
        assert_eq!(
            code_kinds("#Использовать \"./lib\""),
            [TokenKind::Hash, TokenKind::PreprocUse, TokenKind::PreprocString]
        );
    }

    #[test]
    fn shebang() {
        assert_eq!(
            code_kinds("#!/usr/bin/oscript\nА"),
            [
                TokenKind::Hash,
                TokenKind::PreprocExclamation,
                TokenKind::PreprocAny,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn multi_line_strings() {
        let text = indoc! {r#"
            А = "первая
            |вторая // не комментарий
            // комментарий
            |третья""кавычки""";
        "#};
        assert_eq!(
            code_kinds(text),
            [
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::StringStart,
                TokenKind::StringPart,
                TokenKind::StringTail,
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(
            code_kinds(r#"А = "раз ""два"" три";"#),
            [
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::String,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn literals_and_operators() {
        assert_eq!(
            code_kinds("Д = '20240101' + 1.5 * 2 % 3 <> 4 <= 5;"),
            [
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::DateTime,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Mul,
                TokenKind::Number,
                TokenKind::Modulo,
                TokenKind::Number,
                TokenKind::NotEqual,
                TokenKind::Number,
                TokenKind::LessOrEqual,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn comments_are_hidden() {
        let tokens = lex("А = 1; // комментарий\nБ");
        let comment = tokens
            .iter()
            .find(|token| token.kind == TokenKind::LineComment)
            .unwrap();
        assert_eq!(comment.text, "// комментарий");
        assert_eq!(comment.channel, Channel::HIDDEN);
    }

    #[test]
    fn labels() {
        assert_eq!(
            code_kinds("~Метка: Перейти ~Метка;"),
            [
                TokenKind::Tilda,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Goto,
                TokenKind::Tilda,
                TokenKind::Identifier,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn await_is_contextual() {
        let text = indoc! {"
            Асинх Процедура А()
                Ждать Б();
            КонецПроцедуры
            Процедура В()
                Ждать = 1;
            КонецПроцедуры
        "};
        let awaits: Vec<_> = lex(text)
            .into_iter()
            .filter(|token| token.text == "Ждать")
            .map(|token| token.kind)
            .collect();
        assert_eq!(awaits, [TokenKind::Await, TokenKind::Identifier]);
    }

    #[test]
    fn insert_markers_are_hidden() {
        let tokens = lex("#Вставка\nА = 1;\n# КонецВставки");
        assert_eq!(tokens[0].kind, TokenKind::PreprocInsert);
        assert_eq!(tokens[0].channel, Channel::HIDDEN);
        assert_eq!(tokens[0].text, "#Вставка");
        let end = &tokens[tokens.len() - 2];
        assert_eq!(end.kind, TokenKind::PreprocEndInsert);
        assert_eq!(end.text, "# КонецВставки");
        assert_eq!(
            code_kinds("#Вставка\nА = 1;\n#КонецВставки"),
            [
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn deleted_text_is_on_its_own_channel() {
        let text = indoc! {r#"
            #Удаление
            А = "незакрытая строка
            #КонецУдаления
            Б = 2;
        "#};
        let tokens = lex(text);
        let deleted: Vec<_> = tokens
            .iter()
            .filter(|token| token.channel == Channel::DELETED)
            .map(|token| token.kind)
            .collect();
        assert_eq!(
            deleted,
            [
                TokenKind::PreprocDelete,
                TokenKind::PreprocDeleteAny,
                TokenKind::PreprocDeleteAny,
                TokenKind::PreprocEndDelete,
            ]
        );
        assert_eq!(
            code_kinds(text),
            [
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn reset_starts_over() {
        let mut lexer = Lexer::from_text("", "#Если Сервер");
        lexer.next_token();
        assert_eq!(lexer.mode(), LexicalMode::Preprocessor);
        lexer.reset();
        assert_eq!(lexer.mode(), LexicalMode::Default);
        let hash = lexer.next_token();
        assert_eq!((hash.kind, hash.index), (TokenKind::Hash, 0));
    }

    #[test]
    fn end_of_file_repeats() {
        let mut lexer = Lexer::from_text("", "А");
        lexer.next_token();
        assert_eq!(lexer.next_token().kind, TokenKind::EndOfFile);
        assert_eq!(lexer.next_token().kind, TokenKind::EndOfFile);
        assert_eq!(lexer.mode(), LexicalMode::Default);
    }
}
