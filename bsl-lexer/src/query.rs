//! Lexer for the 1C query language, found inside string literals of BSL code.

use std::collections::HashMap;

use bsl_foundation::ident::fold_char;
use once_cell::sync::Lazy;

use crate::{
    char_stream::{CaseFoldingStream, CodePointBuffer},
    token::{Channel, Kind, Token},
    token_source::{is_word_char, is_word_start, ModeStack, Scanner, TokenSource},
};

define_token_kinds! {
    /// Kinds of tokens found in query texts.
    pub enum QueryTokenKind {
        WhiteSpace  = "whitespace",
        LineComment = "comment",

        Number       = "number",
        String       = "string literal",
        Parameter    = "query parameter",
        Identifier   = "identifier",
        MetadataType = "metadata type",

        Select    = "`ВЫБРАТЬ`",
        Allowed   = "`РАЗРЕШЕННЫЕ`",
        Distinct  = "`РАЗЛИЧНЫЕ`",
        Top       = "`ПЕРВЫЕ`",
        As        = "`КАК`",
        From      = "`ИЗ`",
        Where     = "`ГДЕ`",
        And       = "`И`",
        Or        = "`ИЛИ`",
        Not       = "`НЕ`",
        Union     = "`ОБЪЕДИНИТЬ`",
        All       = "`ВСЕ`",
        Into      = "`ПОМЕСТИТЬ`",
        Drop      = "`УНИЧТОЖИТЬ`",
        Group     = "`СГРУППИРОВАТЬ`",
        Order     = "`УПОРЯДОЧИТЬ`",
        By        = "`ПО`",
        Having    = "`ИМЕЮЩИЕ`",
        Totals    = "`ИТОГИ`",
        Left      = "`ЛЕВОЕ`",
        Right     = "`ПРАВОЕ`",
        Full      = "`ПОЛНОЕ`",
        Inner     = "`ВНУТРЕННЕЕ`",
        Outer     = "`ВНЕШНЕЕ`",
        Join      = "`СОЕДИНЕНИЕ`",
        Case      = "`ВЫБОР`",
        When      = "`КОГДА`",
        Then      = "`ТОГДА`",
        Else      = "`ИНАЧЕ`",
        End       = "`КОНЕЦ`",
        In        = "`В`",
        Is        = "`ЕСТЬ`",
        Like      = "`ПОДОБНО`",
        Between   = "`МЕЖДУ`",
        Escape    = "`СПЕЦСИМВОЛ`",
        Null      = "`NULL`",
        True      = "`ИСТИНА`",
        False     = "`ЛОЖЬ`",
        Undefined = "`НЕОПРЕДЕЛЕНО`",
        Value     = "`ЗНАЧЕНИЕ`",
        Asc       = "`ВОЗР`",
        Desc      = "`УБЫВ`",
        For       = "`ДЛЯ`",
        Update    = "`ИЗМЕНЕНИЯ`",
        Index     = "`ИНДЕКСИРОВАТЬ`",

        Dot            = "`.`",
        Comma          = "`,`",
        Semicolon      = "`;`",
        LeftParen      = "`(`",
        RightParen     = "`)`",
        Plus           = "`+`",
        Minus          = "`-`",
        Mul            = "`*`",
        Quotient       = "`/`",
        Assign         = "`=`",
        Less           = "`<`",
        LessOrEqual    = "`<=`",
        NotEqual       = "`<>`",
        Greater        = "`>`",
        GreaterOrEqual = "`>=`",

        Unknown   = "unknown character",
        EndOfFile = "end of file",
    }
}

impl QueryTokenKind {
    pub const fn channel(&self) -> Channel {
        match self {
            QueryTokenKind::WhiteSpace | QueryTokenKind::LineComment => Channel::HIDDEN,
            _ => Channel::DEFAULT,
        }
    }
}

impl Kind for QueryTokenKind {
    const END_OF_FILE: Self = QueryTokenKind::EndOfFile;

    fn name(&self) -> &'static str {
        QueryTokenKind::name(self)
    }

    fn channel(&self) -> Channel {
        QueryTokenKind::channel(self)
    }
}

fn table(entries: &[(&str, &str, QueryTokenKind)]) -> HashMap<String, QueryTokenKind> {
    let mut map = HashMap::with_capacity(entries.len() * 2);
    for &(russian, english, kind) in entries {
        map.insert(russian.chars().map(fold_char).collect(), kind);
        map.insert(english.chars().map(fold_char).collect(), kind);
    }
    map
}

static KEYWORDS: Lazy<HashMap<String, QueryTokenKind>> = Lazy::new(|| {
    use QueryTokenKind::*;
    let mut map = table(&[
        ("Выбрать", "Select", Select),
        ("Разрешенные", "Allowed", Allowed),
        ("Различные", "Distinct", Distinct),
        ("Первые", "Top", Top),
        ("Как", "As", As),
        ("Из", "From", From),
        ("Где", "Where", Where),
        ("И", "And", And),
        ("Или", "Or", Or),
        ("Не", "Not", Not),
        ("Объединить", "Union", Union),
        ("Все", "All", All),
        ("Поместить", "Into", Into),
        ("Уничтожить", "Drop", Drop),
        ("Сгруппировать", "Group", Group),
        ("Упорядочить", "Order", Order),
        ("По", "By", By),
        ("Имеющие", "Having", Having),
        ("Итоги", "Totals", Totals),
        ("Левое", "Left", Left),
        ("Правое", "Right", Right),
        ("Полное", "Full", Full),
        ("Внутреннее", "Inner", Inner),
        ("Внешнее", "Outer", Outer),
        ("Соединение", "Join", Join),
        ("Выбор", "Case", Case),
        ("Когда", "When", When),
        ("Тогда", "Then", Then),
        ("Иначе", "Else", Else),
        ("Конец", "End", End),
        ("В", "In", In),
        ("Есть", "Is", Is),
        ("Подобно", "Like", Like),
        ("Между", "Between", Between),
        ("Спецсимвол", "Escape", Escape),
        ("Null", "Null", Null),
        ("Истина", "True", True),
        ("Ложь", "False", False),
        ("Неопределено", "Undefined", Undefined),
        ("Значение", "Value", Value),
        ("Возр", "Asc", Asc),
        ("Убыв", "Desc", Desc),
        ("Для", "For", For),
        ("Изменения", "Update", Update),
        ("Индексировать", "Index", Index),
    ]);
    // `ON` of a join shares its Russian spelling with `BY`.
    map.insert("ON".to_owned(), By);
    map
});

static METADATA_TYPES: Lazy<HashMap<String, QueryTokenKind>> = Lazy::new(|| {
    use QueryTokenKind::MetadataType;
    table(&[
        ("Справочник", "Catalog", MetadataType),
        ("Документ", "Document", MetadataType),
        ("ЖурналДокументов", "DocumentJournal", MetadataType),
        ("Перечисление", "Enum", MetadataType),
        ("ПланВидовХарактеристик", "ChartOfCharacteristicTypes", MetadataType),
        ("ПланСчетов", "ChartOfAccounts", MetadataType),
        ("ПланВидовРасчета", "ChartOfCalculationTypes", MetadataType),
        ("РегистрСведений", "InformationRegister", MetadataType),
        ("РегистрНакопления", "AccumulationRegister", MetadataType),
        ("РегистрБухгалтерии", "AccountingRegister", MetadataType),
        ("РегистрРасчета", "CalculationRegister", MetadataType),
        ("БизнесПроцесс", "BusinessProcess", MetadataType),
        ("Задача", "Task", MetadataType),
        ("ПланОбмена", "ExchangePlan", MetadataType),
        ("Константа", "Constant", MetadataType),
        ("Последовательность", "Sequence", MetadataType),
        ("ВнешнийИсточникДанных", "ExternalDataSource", MetadataType),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Default,
    /// Right after `.`, where every word is a name.
    Dot,
}

#[derive(Debug, Clone)]
pub struct QueryLexer {
    scanner: Scanner,
    modes: ModeStack<QueryMode>,
}

impl Default for QueryLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryLexer {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::empty(),
            modes: ModeStack::new(QueryMode::Default),
        }
    }

    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        let mut lexer = Self::new();
        lexer.set_input(CaseFoldingStream::new(CodePointBuffer::new(name, text)));
        lexer
    }

    fn single(&mut self, kind: QueryTokenKind) -> Token<QueryTokenKind> {
        self.scanner.advance_char();
        self.scanner.emit_kind(kind)
    }

    fn word(&mut self) -> Token<QueryTokenKind> {
        self.scanner.advance_while(is_word_char);
        if self.modes.current() == QueryMode::Dot {
            self.modes.pop();
            return self.scanner.emit_kind(QueryTokenKind::Identifier);
        }
        let text = self.scanner.folded_token_text();
        let kind = KEYWORDS
            .get(&text)
            .or_else(|| METADATA_TYPES.get(&text))
            .copied()
            .unwrap_or(QueryTokenKind::Identifier);
        self.scanner.emit_kind(kind)
    }

    fn string(&mut self) -> Token<QueryTokenKind> {
        self.scanner.advance_char();
        loop {
            match self.scanner.current_char() {
                Some('"') => {
                    self.scanner.advance_char();
                    if self.scanner.current_char() != Some('"') {
                        break self.scanner.emit_kind(QueryTokenKind::String);
                    }
                    self.scanner.advance_char();
                }
                None => break self.scanner.emit_kind(QueryTokenKind::Unknown),
                Some(_) => self.scanner.advance_char(),
            }
        }
    }
}

impl TokenSource for QueryLexer {
    type Kind = QueryTokenKind;
    type Mode = QueryMode;

    fn set_input(&mut self, input: CaseFoldingStream<CodePointBuffer>) {
        self.scanner.set_input(input);
        self.modes.reset();
    }

    fn reset(&mut self) {
        self.scanner.rewind();
        self.modes.reset();
    }

    fn source_name(&self) -> &str {
        self.scanner.source_name()
    }

    fn mode(&self) -> QueryMode {
        self.modes.current()
    }

    fn set_mode(&mut self, mode: QueryMode) {
        self.modes.set(mode)
    }

    fn push_mode(&mut self, mode: QueryMode) {
        self.modes.push(mode)
    }

    fn pop_mode(&mut self) -> QueryMode {
        self.modes.pop()
    }

    fn next_token(&mut self) -> Token<QueryTokenKind> {
        self.scanner.begin_token();
        let Some(c) = self.scanner.current_char() else {
            return self.scanner.emit_kind(QueryTokenKind::EndOfFile);
        };
        if self.modes.current() == QueryMode::Dot && !is_word_start(c) && !c.is_whitespace() {
            self.modes.pop();
        }
        match c {
            _ if c.is_whitespace() => {
                self.scanner.advance_while(char::is_whitespace);
                self.scanner.emit_kind(QueryTokenKind::WhiteSpace)
            }
            '/' if self.scanner.peek_nth(2) == Some('/') => {
                self.scanner.advance_to_line_end();
                self.scanner.emit_kind(QueryTokenKind::LineComment)
            }
            '0'..='9' => {
                self.scanner.advance_while(|c| c.is_ascii_digit() || c == '.');
                self.scanner.emit_kind(QueryTokenKind::Number)
            }
            '"' => self.string(),
            '&' => {
                self.scanner.advance_char();
                self.scanner.advance_while(is_word_char);
                self.scanner.emit_kind(QueryTokenKind::Parameter)
            }
            '.' => {
                self.modes.push(QueryMode::Dot);
                self.single(QueryTokenKind::Dot)
            }
            '<' => {
                self.scanner.advance_char();
                match self.scanner.current_char() {
                    Some('=') => self.single(QueryTokenKind::LessOrEqual),
                    Some('>') => self.single(QueryTokenKind::NotEqual),
                    _ => self.scanner.emit_kind(QueryTokenKind::Less),
                }
            }
            '>' => {
                self.scanner.advance_char();
                match self.scanner.current_char() {
                    Some('=') => self.single(QueryTokenKind::GreaterOrEqual),
                    _ => self.scanner.emit_kind(QueryTokenKind::Greater),
                }
            }
            ',' => self.single(QueryTokenKind::Comma),
            ';' => self.single(QueryTokenKind::Semicolon),
            '(' => self.single(QueryTokenKind::LeftParen),
            ')' => self.single(QueryTokenKind::RightParen),
            '+' => self.single(QueryTokenKind::Plus),
            '-' => self.single(QueryTokenKind::Minus),
            '*' => self.single(QueryTokenKind::Mul),
            '/' => self.single(QueryTokenKind::Quotient),
            '=' => self.single(QueryTokenKind::Assign),
            _ if is_word_start(c) => self.word(),
            _ => self.single(QueryTokenKind::Unknown),
        }
    }
}
