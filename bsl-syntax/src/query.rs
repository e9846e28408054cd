//! Coarse grammar of query texts: a package of queries separated by `;`.

use bsl_foundation::errors::{Diagnostic, Label};
use bsl_lexer::{query::QueryTokenKind, TokenCursor};

use crate::{
    node::Node, ParseError, Parser, ParserState, PredictionMode, RecoveryPoint, SyntaxAutomaton,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryRule {
    QueryPackage,
    Query,
    Subquery,
}

pub type QueryNode = Node<QueryRule, QueryTokenKind>;

#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    state: ParserState,
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_package(
        &mut self,
        tokens: &mut TokenCursor<'_, QueryTokenKind>,
    ) -> Result<QueryNode, ParseError> {
        let mut parser = Parser::new(tokens, &mut self.state);
        query_package(&mut parser)
    }
}

impl SyntaxAutomaton for QueryParser {
    type Kind = QueryTokenKind;
    type Tree = QueryNode;

    fn set_prediction_mode(&mut self, mode: PredictionMode) {
        self.state.set_mode(mode);
    }

    fn prediction_mode(&self) -> PredictionMode {
        self.state.mode()
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn parse_root(
        &mut self,
        tokens: &mut TokenCursor<'_, QueryTokenKind>,
    ) -> Result<QueryNode, ParseError> {
        self.query_package(tokens)
    }

    fn error_count(&self) -> usize {
        self.state.error_count()
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.state.take_diagnostics()
    }

    fn empty_tree(&self) -> QueryNode {
        Node::new(QueryRule::QueryPackage)
    }
}

fn query_sync(kind: QueryTokenKind) -> RecoveryPoint {
    match kind {
        QueryTokenKind::Semicolon => RecoveryPoint::StopAfter,
        _ => RecoveryPoint::Skip,
    }
}

fn query_package(p: &mut Parser<'_, '_, QueryTokenKind>) -> Result<QueryNode, ParseError> {
    p.scope_mut("query_package", |p| {
        let mut node = Node::new(QueryRule::QueryPackage);
        loop {
            match p.peek_kind() {
                QueryTokenKind::Semicolon => node.add_token(p.next()),
                QueryTokenKind::EndOfFile => {
                    node.add_token(p.next());
                    break;
                }
                _ => {
                    let start = p.tokens.position();
                    let result = query(p);
                    if let Some(query) = p.recover(result, start, &mut node, query_sync)? {
                        node.add_child(query);
                    }
                }
            }
        }
        Ok(node)
    })
}

fn query(p: &mut Parser<'_, '_, QueryTokenKind>) -> Result<QueryNode, ParseError> {
    p.scope_mut("query", |p| {
        if !matches!(
            p.peek_kind(),
            QueryTokenKind::Select | QueryTokenKind::Drop
        ) {
            return p.unexpected("`ВЫБРАТЬ` or `УНИЧТОЖИТЬ`");
        }
        let mut node = Node::new(QueryRule::Query);
        query_body(p, &mut node, false)?;
        Ok(node)
    })
}

fn subquery(p: &mut Parser<'_, '_, QueryTokenKind>) -> Result<QueryNode, ParseError> {
    p.scope_mut("subquery", |p| {
        let mut node = Node::new(QueryRule::Subquery);
        node.add_token(p.expect(QueryTokenKind::LeftParen)?);
        query_body(p, &mut node, true)?;
        node.add_token(p.expect(QueryTokenKind::RightParen)?);
        Ok(node)
    })
}

/// Tokens of a query up to its end: the `;` or end of input for a top level query, or the
/// closing parenthesis of a subquery.
fn query_body(
    p: &mut Parser<'_, '_, QueryTokenKind>,
    node: &mut QueryNode,
    nested: bool,
) -> Result<(), ParseError> {
    let mut open = vec![];
    loop {
        let kind = p.peek_kind();
        match kind {
            QueryTokenKind::EndOfFile | QueryTokenKind::Semicolon => {
                if let Some(opener) = open.pop() {
                    let found = p.peek().clone();
                    return p.bail(
                        found.span,
                        Diagnostic::error("`)` expected")
                            .with_label(Label::primary(&found, "the bracket should be closed here"))
                            .with_label(Label::secondary(&opener, "opened here")),
                    );
                }
                if nested {
                    return p.unexpected("`)`");
                }
                return Ok(());
            }
            QueryTokenKind::LeftParen if p.lookahead(1)?.kind == QueryTokenKind::Select => {
                node.add_child(subquery(p)?);
                continue;
            }
            QueryTokenKind::LeftParen => open.push(p.peek().clone()),
            QueryTokenKind::RightParen => {
                if open.pop().is_none() {
                    if nested {
                        return Ok(());
                    }
                    return p.unexpected("`;`");
                }
            }
            _ => (),
        }
        node.add_token(p.next());
    }
}

#[cfg(test)]
mod tests {
    use bsl_lexer::{query::QueryLexer, Token, TokenSource};

    use super::*;
    use crate::parse_two_phase;

    fn lex(text: &str) -> Vec<Token<QueryTokenKind>> {
        QueryLexer::from_text("", text).tokenize()
    }

    #[test]
    fn single_query() {
        let tokens = lex("Выбрать Ссылка Из Справочник.Контрагенты");
        let parsed = parse_two_phase(&mut QueryParser::new(), &tokens);
        assert_eq!(parsed.error_count, 0);
        let queries = parsed.tree.find_all(QueryRule::Query);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].first_token().unwrap().kind, QueryTokenKind::Select);
        assert_eq!(queries[0].last_token().unwrap().kind, QueryTokenKind::Identifier);
        assert_eq!(queries[0].last_token().unwrap().text, "Контрагенты");
    }

    #[test]
    fn package_with_subquery() {
        let tokens = lex(
            "ВЫБРАТЬ Т.Поле ПОМЕСТИТЬ ВТ ИЗ (ВЫБРАТЬ 1 КАК Поле) КАК Т;\n\
             ВЫБРАТЬ * ИЗ ВТ ГДЕ Поле В (&Список);\n\
             УНИЧТОЖИТЬ ВТ;",
        );
        let parsed = parse_two_phase(&mut QueryParser::new(), &tokens);
        assert_eq!(parsed.error_count, 0);
        assert_eq!(parsed.tree.find_all(QueryRule::Query).len(), 3);
        assert_eq!(parsed.tree.find_all(QueryRule::Subquery).len(), 1);
    }

    #[test]
    fn malformed_queries_recover() {
        let tokens = lex("ВЫБРАТЬ (А ИЗ Т; Поле; ВЫБРАТЬ 2");
        let parsed = parse_two_phase(&mut QueryParser::new(), &tokens);
        assert_eq!(parsed.mode, PredictionMode::General);
        assert_eq!(parsed.error_count, 2);
        assert_eq!(parsed.tree.find_all(QueryRule::Query).len(), 1);
        assert_eq!(parsed.tree.text(), "ВЫБРАТЬ(АИЗТ;Поле;ВЫБРАТЬ2");
    }
}
