//! Conditional compilation of BSL modules.

mod condition;
mod symbols;

use std::ops::Range;

use bsl_foundation::{
    errors::{pipe_all_diagnostics_into, Diagnostic, DiagnosticSink, Label},
    source::Span,
};
use bsl_lexer::{bsl::TokenKind, Channel, Token, TokenCursor};
use bsl_syntax::{
    module::{Directive, Expr, ModuleNode, ModuleParser},
    parse_two_phase, BslTokenizer, PredictionMode, SyntaxAutomaton,
};
use tracing::{debug, info_span, trace};

pub use condition::{ConditionError, ConditionStack};
pub use symbols::SymbolTable;

/// An `#Область … #КонецОбласти` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub name: String,
    /// From the `#` of `#Область` through the last token of `#КонецОбласти`.
    pub span: Span,
    /// Positions of those tokens in the input token list.
    pub tokens: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Insert,
    Delete,
}

/// A `#Вставка … #КонецВставки` or `#Удаление … #КонецУдаления` zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchZone {
    pub kind: PatchKind,
    /// From the opening marker through the closing marker.
    pub span: Span,
    pub tokens: Range<usize>,
}

/// Result of preprocessing a module.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Compiled code tokens, followed by a hidden end of file token.
    pub tokens: Vec<Token<TokenKind>>,
    pub tree: ModuleNode,
    /// Prediction mode the compiled tokens were parsed with.
    pub mode: PredictionMode,
    /// Regions in the order they are closed, captured whether or not their code is compiled.
    pub regions: Vec<RegionRecord>,
    pub patches: Vec<PatchZone>,
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
}

/// Preprocessor that sits between the lexer and the parser.
///
/// Directives are parsed with the directive rule of the module grammar, each over its own line of
/// tokens. Code outside selected `#Если` branches and inside `#Удаление` zones is dropped, and the
/// remaining code is parsed as a module.
pub struct Preprocessor<'a> {
    symbols: &'a SymbolTable,
    parser: ModuleParser,
}

struct PendingMarker {
    span: Span,
    index: usize,
}

struct PendingRegion {
    name: String,
    marker: PendingMarker,
}

/// State of one pass over a token list.
#[derive(Default)]
struct Scan {
    conditions: ConditionStack,
    regions: Vec<PendingRegion>,
    insert: Option<PendingMarker>,
    delete: Option<PendingMarker>,
    output: Output,
}

#[derive(Default)]
struct Output {
    tokens: Vec<Token<TokenKind>>,
    regions: Vec<RegionRecord>,
    patches: Vec<PatchZone>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            parser: ModuleParser::new(),
        }
    }

    pub fn preprocess_tokenizer(&mut self, tokenizer: &BslTokenizer) -> Preprocessed {
        let _span = info_span!("preprocess", file = %tokenizer.name()).entered();
        self.preprocess(tokenizer.tokens())
    }

    /// Preprocesses the full token list of a module, hidden tokens included.
    pub fn preprocess(&mut self, tokens: &[Token<TokenKind>]) -> Preprocessed {
        let mut scan = Scan::default();
        let mut index = 0;
        while index < tokens.len() {
            let token = &tokens[index];
            if let Some(marker) = Directive::from_patch_marker(token.kind) {
                self.apply(&mut scan, marker, token.span, index..index + 1);
                index += 1;
                continue;
            }
            match token.kind {
                TokenKind::EndOfFile => break,
                TokenKind::Hash => {
                    let (line, next) = directive_line(tokens, index);
                    self.directive(&mut scan, &line, index..next);
                    index = next;
                    continue;
                }
                _ if token.channel == Channel::DEFAULT && scan.conditions.is_compiled() => {
                    scan.output.tokens.push(token.clone())
                }
                _ => (),
            }
            index += 1;
        }
        self.finish(&mut scan, tokens);

        let mut end = tokens
            .last()
            .filter(|token| token.is_end_of_file())
            .cloned()
            .unwrap_or_else(|| match tokens.last() {
                Some(last) => last.end_of_file_after(),
                None => Token::end_of_file_at_start(),
            });
        end.channel = Channel::HIDDEN;

        let Output {
            mut tokens,
            regions,
            patches,
            mut diagnostics,
        } = scan.output;
        tokens.push(end);

        let parsed = parse_two_phase(&mut self.parser, &tokens);
        pipe_all_diagnostics_into(&mut diagnostics, parsed.diagnostics);
        let error_count = diagnostics.iter().filter(|d| d.is_error()).count();
        debug!(
            compiled = tokens.len(),
            regions = regions.len(),
            patches = patches.len(),
            error_count,
            "preprocessed"
        );

        Preprocessed {
            tokens,
            tree: parsed.tree,
            mode: parsed.mode,
            regions,
            patches,
            diagnostics,
            error_count,
        }
    }

    fn directive(&mut self, scan: &mut Scan, line: &[Token<TokenKind>], tokens: Range<usize>) {
        let span = match (line.first(), line.last()) {
            (Some(first), Some(last)) => first.span.join(&last.span),
            _ => Span::default(),
        };
        let mut cursor = TokenCursor::on_default_channel(line);
        self.parser.reset();
        self.parser.set_prediction_mode(PredictionMode::General);
        let result = self.parser.directive(&mut cursor);
        pipe_all_diagnostics_into(
            &mut scan.output.diagnostics,
            self.parser.take_diagnostics(),
        );
        match result {
            Ok(directive) => self.apply(scan, directive, span, tokens),
            Err(error) => trace!(span = ?error.span, "directive ignored"),
        }
    }

    fn apply(&self, scan: &mut Scan, directive: Directive, span: Span, tokens: Range<usize>) {
        trace!(?directive, ?span, "directive");
        let condition = match directive {
            Directive::If(expr) => {
                let selected = self.evaluate(expr.as_ref());
                scan.conditions.push_if(selected, span);
                Ok(())
            }
            Directive::ElseIf(expr) => {
                let selected = self.evaluate(expr.as_ref());
                scan.conditions.else_if(selected)
            }
            Directive::Else => scan.conditions.else_branch(),
            Directive::EndIf => scan.conditions.end_if(),
            Directive::Region(name) => {
                scan.regions.push(PendingRegion {
                    name,
                    marker: PendingMarker {
                        span,
                        index: tokens.start,
                    },
                });
                Ok(())
            }
            Directive::EndRegion => {
                match scan.regions.pop() {
                    Some(PendingRegion { name, marker }) => {
                        scan.output.regions.push(RegionRecord {
                            name,
                            span: marker.span.join(&span),
                            tokens: marker.index..tokens.end,
                        })
                    }
                    None => scan.output.diagnostics.emit(
                        Diagnostic::error("`#КонецОбласти` without a matching `#Область`")
                            .with_label(Label::primary(&span, "no region to end here")),
                    ),
                }
                Ok(())
            }
            Directive::Insert => {
                open_zone(&mut scan.insert, &mut scan.output, span, tokens.start);
                Ok(())
            }
            Directive::Delete => {
                open_zone(&mut scan.delete, &mut scan.output, span, tokens.start);
                Ok(())
            }
            Directive::EndInsert => {
                close_zone(&mut scan.insert, &mut scan.output, PatchKind::Insert, span, tokens);
                Ok(())
            }
            Directive::EndDelete => {
                close_zone(&mut scan.delete, &mut scan.output, PatchKind::Delete, span, tokens);
                Ok(())
            }
            Directive::Use(_) | Directive::Shebang => Ok(()),
        };
        if let Err(error) = condition {
            scan.output.diagnostics.emit(
                Diagnostic::error(error.to_string())
                    .with_label(Label::primary(&span, "no `#Если` is open here")),
            );
        }
    }

    /// Malformed conditions are never selected.
    fn evaluate(&self, expr: Option<&Expr>) -> bool {
        expr.map(|expr| self.symbols.evaluate(expr)).unwrap_or(false)
    }

    fn finish(&self, scan: &mut Scan, tokens: &[Token<TokenKind>]) {
        let diagnostics = &mut scan.output.diagnostics;
        for opener in scan.conditions.unclosed() {
            diagnostics.emit(
                Diagnostic::error("`#Если` is never closed")
                    .with_label(Label::primary(&opener, "`#КонецЕсли` expected after this")),
            );
        }
        for region in scan.regions.drain(..) {
            diagnostics.emit(
                Diagnostic::error(format!("region `{}` is never closed", region.name))
                    .with_label(Label::primary(
                        &region.marker.span,
                        "`#КонецОбласти` expected after this",
                    )),
            );
        }
        if let Some(insert) = scan.insert.take() {
            diagnostics.emit(
                Diagnostic::error("`#Вставка` is never closed")
                    .with_label(Label::primary(&insert.span, "`#КонецВставки` expected")),
            );
        }
        if let Some(delete) = scan.delete.take() {
            diagnostics.emit(
                Diagnostic::error("`#Удаление` is never closed")
                    .with_label(Label::primary(&delete.span, "`#КонецУдаления` expected")),
            );
            // Everything up to the end of input was deleted.
            let end = tokens.len().saturating_sub(1);
            let span = tokens
                .get(end.saturating_sub(1))
                .map(|last| delete.span.join(&last.span))
                .unwrap_or(delete.span);
            scan.output.patches.push(PatchZone {
                kind: PatchKind::Delete,
                span,
                tokens: delete.index..end,
            });
        }
    }
}

fn open_zone(slot: &mut Option<PendingMarker>, output: &mut Output, span: Span, index: usize) {
    if let Some(open) = slot {
        output.diagnostics.emit(
            Diagnostic::error("patch zones cannot be nested")
                .with_label(Label::primary(&span, "this marker opens a second zone"))
                .with_label(Label::secondary(&open.span, "the open zone starts here")),
        );
        return;
    }
    *slot = Some(PendingMarker { span, index });
}

fn close_zone(
    slot: &mut Option<PendingMarker>,
    output: &mut Output,
    kind: PatchKind,
    span: Span,
    tokens: Range<usize>,
) {
    match slot.take() {
        Some(open) => output.patches.push(PatchZone {
            kind,
            span: open.span.join(&span),
            tokens: open.index..tokens.end,
        }),
        None => output.diagnostics.emit(
            Diagnostic::error("end of a patch zone that was never opened")
                .with_label(Label::primary(&span, "no zone to end here")),
        ),
    }
}

/// Collects the tokens of the directive starting at `start`, skipping hidden ones. The directive
/// ends at the end of its line, at the next `#`, or at the end of input. Returns the tokens and
/// the position right after the directive.
fn directive_line(tokens: &[Token<TokenKind>], start: usize) -> (Vec<Token<TokenKind>>, usize) {
    let mut line = vec![tokens[start].clone()];
    let mut index = start + 1;
    while let Some(token) = tokens.get(index) {
        match token.kind {
            TokenKind::PreprocNewline => {
                index += 1;
                break;
            }
            TokenKind::Hash | TokenKind::EndOfFile => break,
            kind if Directive::from_patch_marker(kind).is_some() => break,
            _ if token.channel == Channel::HIDDEN => (),
            _ => line.push(token.clone()),
        }
        index += 1;
    }
    (line, index)
}

#[cfg(test)]
mod tests {
    use bsl_lexer::{bsl::Lexer, TokenSource};
    use bsl_syntax::module::ModuleRule;
    use indoc::indoc;

    use super::*;

    fn preprocess(text: &str, symbols: &SymbolTable) -> Preprocessed {
        let tokens = Lexer::from_text("", text).tokenize();
        Preprocessor::new(symbols).preprocess(&tokens)
    }

    fn compiled_text(text: &str, symbols: &SymbolTable) -> String {
        preprocess(text, symbols).tree.text().to_owned()
    }

    #[test]
    fn selected_branches_are_compiled() {
        let text = indoc! {"
            #Если Сервер Тогда
            А = 1;
            #КонецЕсли
        "};
        let server: SymbolTable = ["Сервер"].into_iter().collect();
        assert_eq!(compiled_text(text, &server), "А=1;");
        assert_eq!(compiled_text(text, &SymbolTable::new()), "");

        let preprocessed = preprocess(text, &SymbolTable::new());
        assert_eq!(preprocessed.tokens.len(), 1);
        assert_eq!(preprocessed.tokens[0].channel, Channel::HIDDEN);
        assert_eq!(preprocessed.error_count, 0);
    }

    #[test]
    fn nested_conditions() {
        let text = indoc! {"
            #Если Клиент Тогда
            Перем Клиент;
            #КонецЕсли
            #Если Сервер Тогда
            Перем Сервер;
            #ИначеЕсли ВебКлиент Тогда
            Перем ВебКлиент;
            #Иначе
            Перем Прочее;
            #КонецЕсли
            #Если ВебКлиент И НЕ ТолстыйКлиентОбычноеПриложение Тогда
            Перем ВебКлиентИНЕТолстыйКлиент;
            #Если МобильныйКлиент Тогда
            Перем Мобильный;
            #КонецЕсли
            #КонецЕсли
            #Если Клиент ИЛИ Сервер Тогда
            Процедура В()
            #Если Сервер Тогда
                А = 1;
            #КонецЕсли
            КонецПроцедуры
            #КонецЕсли
            Сообщить();
        "};
        let symbols: SymbolTable = ["Клиент", "ВебКлиент"].into_iter().collect();
        let preprocessed = preprocess(text, &symbols);
        assert_eq!(preprocessed.error_count, 0);
        assert_eq!(
            preprocessed.tree.text(),
            "ПеремКлиент;ПеремВебКлиент;ПеремВебКлиентИНЕТолстыйКлиент;\
             ПроцедураВ()КонецПроцедурыСообщить();"
        );
        assert_eq!(preprocessed.tree.find_all(ModuleRule::Sub).len(), 1);
        assert_eq!(preprocessed.tree.find_all(ModuleRule::Directive).len(), 0);
    }

    #[test]
    fn regions_are_captured_in_every_branch() {
        let text = indoc! {"
            #Область Внешняя
            #Если Сервер Тогда
            #Область Серверная
            А = 1;
            #КонецОбласти
            #Иначе
            #Область Клиентская
            Б = 2;
            #КонецОбласти
            #КонецЕсли
            #КонецОбласти
        "};
        let server = preprocess(text, &SymbolTable::new().with_name("Сервер"));
        let client = preprocess(text, &SymbolTable::new().with_name("Клиент"));
        assert_eq!(server.regions, client.regions);
        assert_ne!(server.tree.text(), client.tree.text());

        let names: Vec<_> = server.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Серверная", "Клиентская", "Внешняя"]);

        let outer = &server.regions[2];
        assert!(outer.span.get_input(text).starts_with("#Область Внешняя"));
        assert!(outer.span.get_input(text).ends_with("#КонецОбласти"));
        assert_eq!(server.error_count, 0);
    }

    #[test]
    fn patch_zones() {
        let text = indoc! {r#"
            #Вставка
            А = 1;
            #КонецВставки
            #Удаление
            Б = "незакрытая строка
            #КонецУдаления
            В = 3;
        "#};
        let preprocessed = preprocess(text, &SymbolTable::new());
        assert_eq!(preprocessed.error_count, 0);
        assert_eq!(preprocessed.tree.text(), "А=1;В=3;");

        let kinds: Vec<_> = preprocessed.patches.iter().map(|zone| zone.kind).collect();
        assert_eq!(kinds, [PatchKind::Insert, PatchKind::Delete]);
        let delete = preprocessed.patches[1].span.get_input(text);
        assert!(delete.starts_with("#Удаление"));
        assert!(delete.ends_with("#КонецУдаления"));
    }

    #[test]
    fn patch_zones_inside_conditions() {
        let text = indoc! {"
            #Если Сервер Тогда
            #Вставка
            А = 1;
            #КонецВставки
            #Удаление
            Б = 2;
            #КонецУдаления
            #КонецЕсли
            В = 3;
        "};
        let excluded = preprocess(text, &SymbolTable::new());
        assert_eq!(excluded.error_count, 0);
        assert_eq!(excluded.tree.text(), "В=3;");
        assert_eq!(excluded.patches.len(), 2);

        let included = preprocess(text, &SymbolTable::new().with_name("Сервер"));
        assert_eq!(included.error_count, 0);
        assert_eq!(included.tree.text(), "А=1;В=3;");
        assert_eq!(included.patches.len(), 2);
    }

    #[test]
    fn unknown_symbols() {
        // The `О` in `MacОS` is Cyrillic.
        let text = indoc! {"
            #Если MacОS Тогда
            А = 1;
            #КонецЕсли
            #Если МойФлаг Тогда
            Б = 2;
            #КонецЕсли
        "};
        let platform = SymbolTable::new().with_name("MacOS");
        assert_eq!(compiled_text(text, &platform), "");

        let user = SymbolTable::new().with_name("MacОS").with_name("мойфлаг");
        assert_eq!(compiled_text(text, &user), "А=1;Б=2;");
    }

    #[test]
    fn malformed_conditions_are_false() {
        let text = indoc! {"
            #Если Клиент И Тогда
            А = 1;
            #Иначе
            Б = 2;
            #КонецЕсли
        "};
        let preprocessed = preprocess(text, &SymbolTable::new().with_name("Клиент"));
        assert_eq!(preprocessed.error_count, 1);
        assert_eq!(preprocessed.tree.text(), "Б=2;");
    }

    #[test]
    fn unbalanced_directives() {
        let text = indoc! {"
            #КонецЕсли
            #КонецОбласти
            #Область Открытая
            #Если Клиент Тогда
            А = 1;
        "};
        let preprocessed = preprocess(text, &SymbolTable::new().with_name("Клиент"));
        assert_eq!(preprocessed.error_count, 4);
        assert_eq!(preprocessed.tree.text(), "А=1;");
        assert!(preprocessed.regions.is_empty());
    }

    #[test]
    fn use_and_shebang_are_ignored() {
        let text = indoc! {"
            #!/usr/bin/env oscript
            #Использовать json
            А = 1;
        "};
        let preprocessed = preprocess(text, &SymbolTable::new());
        assert_eq!(preprocessed.error_count, 0);
        assert_eq!(preprocessed.tree.text(), "А=1;");
    }

    #[test]
    fn tokenizer_output() {
        let tokenizer = BslTokenizer::module(
            "Модуль.bsl",
            "\u{feff}#Если Сервер Тогда\nА = 1;\n#Иначе\nБ = 2;\n#КонецЕсли",
        )
        .unwrap();
        let symbols = SymbolTable::new();
        let preprocessed = Preprocessor::new(&symbols).preprocess_tokenizer(&tokenizer);
        assert_eq!(preprocessed.tree.text(), "Б=2;");
        assert_eq!(preprocessed.mode, PredictionMode::Optimistic);
        let first = &preprocessed.tokens[0];
        assert_eq!(first.span.get_input(tokenizer.text()), "Б");
    }
}
