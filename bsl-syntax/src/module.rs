//! Coarse grammar of BSL modules.
//!
//! The grammar recovers the structure of a module (variables, methods, statements and blocks)
//! but treats expressions as flat token runs.

mod directive;

use bsl_foundation::errors::{Diagnostic, Label};
use bsl_lexer::{bsl::TokenKind, TokenCursor};

use crate::{
    node::Node, ParseError, Parser, ParserState, PredictionMode, RecoveryPoint, SyntaxAutomaton,
};

pub use directive::{Directive, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleRule {
    File,
    Directive,
    Annotation,
    Vars,
    Var,
    Sub,
    Params,
    Param,
    Block,
    Empty,
    Label,
    Assignment,
    Call,
    If,
    ElseIf,
    Else,
    While,
    For,
    ForEach,
    Try,
    Except,
    Return,
    Continue,
    Break,
    Raise,
    Execute,
    Goto,
    AddHandler,
    RemoveHandler,
    Expression,
}

pub type ModuleNode = Node<ModuleRule, TokenKind>;

/// Syntax automaton for BSL modules and directive lines.
#[derive(Debug, Clone, Default)]
pub struct ModuleParser {
    state: ParserState,
}

impl ModuleParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Entry rule for a whole module.
    pub fn file(
        &mut self,
        tokens: &mut TokenCursor<'_, TokenKind>,
    ) -> Result<ModuleNode, ParseError> {
        let mut parser = Parser::new(tokens, &mut self.state);
        file(&mut parser)
    }

    /// Entry rule for a single directive line.
    pub fn directive(
        &mut self,
        tokens: &mut TokenCursor<'_, TokenKind>,
    ) -> Result<Directive, ParseError> {
        let mut parser = Parser::new(tokens, &mut self.state);
        directive::directive(&mut parser)
    }
}

impl SyntaxAutomaton for ModuleParser {
    type Kind = TokenKind;
    type Tree = ModuleNode;

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
        tokens: &mut TokenCursor<'_, TokenKind>,
    ) -> Result<ModuleNode, ParseError> {
        self.file(tokens)
    }

    fn error_count(&self) -> usize {
        self.state.error_count()
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.state.take_diagnostics()
    }

    fn empty_tree(&self) -> ModuleNode {
        Node::new(ModuleRule::File)
    }
}

fn is_block_closer(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::ElsIf
            | TokenKind::Else
            | TokenKind::EndIf
            | TokenKind::EndDo
            | TokenKind::Except
            | TokenKind::EndTry
            | TokenKind::EndProcedure
            | TokenKind::EndFunction
    )
}

fn starts_sub(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Async | TokenKind::Procedure | TokenKind::Function | TokenKind::Ampersand
    )
}

/// Tokens that can never be part of an expression.
fn ends_expression(kind: TokenKind) -> bool {
    is_block_closer(kind)
        || matches!(
            kind,
            TokenKind::Semicolon
                | TokenKind::Then
                | TokenKind::Do
                | TokenKind::To
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Try
                | TokenKind::Return
                | TokenKind::Var
                | TokenKind::Export
                | TokenKind::Async
                | TokenKind::Procedure
                | TokenKind::Function
                | TokenKind::EndOfFile
        )
}

fn ends_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::DateTime
            | TokenKind::String
            | TokenKind::StringTail
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Undefined
            | TokenKind::Null
            | TokenKind::RightParen
            | TokenKind::RightBracket
    )
}

/// Adjacent string literals are concatenated, so strings are left out.
fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::DateTime
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Undefined
            | TokenKind::Null
            | TokenKind::New
    )
}

fn statement_sync(kind: TokenKind) -> RecoveryPoint {
    match kind {
        TokenKind::Semicolon => RecoveryPoint::StopAfter,
        _ if is_block_closer(kind) => RecoveryPoint::StopBefore,
        _ => RecoveryPoint::Skip,
    }
}

fn sub_sync(kind: TokenKind) -> RecoveryPoint {
    match kind {
        TokenKind::EndProcedure | TokenKind::EndFunction => RecoveryPoint::StopAfter,
        _ if starts_sub(kind) => RecoveryPoint::StopBefore,
        _ => RecoveryPoint::Skip,
    }
}

fn file(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("file", |p| {
        let mut node = Node::new(ModuleRule::File);
        loop {
            let kind = p.peek_kind();
            let start = p.tokens.position();
            match kind {
                TokenKind::EndOfFile => {
                    node.add_token(p.next());
                    break;
                }
                TokenKind::Hash => node.add_child(directive_line(p)),
                _ if starts_sub(kind) => {
                    let result = sub(p);
                    if let Some(sub) = p.recover(result, start, &mut node, sub_sync)? {
                        node.add_child(sub);
                    }
                }
                TokenKind::Var => {
                    let result = vars(p);
                    if let Some(vars) = p.recover(result, start, &mut node, statement_sync)? {
                        node.add_child(vars);
                    }
                }
                _ => {
                    let result = if is_block_closer(kind) {
                        p.unexpected("statement")
                    } else {
                        statement(p)
                    };
                    if let Some(statement) = p.recover(result, start, &mut node, statement_sync)? {
                        node.add_child(statement);
                    }
                }
            }
        }
        Ok(node)
    })
}

/// A `#` directive left in the token stream. Directive lines are not validated here.
fn directive_line(p: &mut Parser<'_, '_, TokenKind>) -> ModuleNode {
    let mut node = Node::new(ModuleRule::Directive);
    node.add_token(p.next());
    while p.peek_kind().is_directive_part() {
        node.add_token(p.next());
    }
    node
}

fn annotation(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("annotation", |p| {
        let mut node = Node::new(ModuleRule::Annotation);
        node.add_token(p.expect(TokenKind::Ampersand)?);
        if !p.peek_kind().is_annotation() {
            return p.unexpected("annotation name");
        }
        node.add_token(p.next());
        if p.at(TokenKind::LeftParen) {
            node.add_token(p.next());
            while !p.at(TokenKind::RightParen) {
                node.add_child(expression(p, false)?);
                match p.eat(TokenKind::Comma) {
                    Some(comma) => node.add_token(comma),
                    None => break,
                }
            }
            node.add_token(p.expect(TokenKind::RightParen)?);
        }
        Ok(node)
    })
}

fn annotations(p: &mut Parser<'_, '_, TokenKind>, node: &mut ModuleNode) -> Result<(), ParseError> {
    while p.at(TokenKind::Ampersand) {
        node.add_child(annotation(p)?);
    }
    Ok(())
}

/// `Перем А Экспорт, Б;`
fn vars(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("vars", |p| {
        let mut node = Node::new(ModuleRule::Vars);
        node.add_token(p.expect(TokenKind::Var)?);
        loop {
            let mut var = Node::new(ModuleRule::Var);
            var.add_token(p.expect(TokenKind::Identifier)?);
            if let Some(export) = p.eat(TokenKind::Export) {
                var.add_token(export);
            }
            node.add_child(var);
            match p.eat(TokenKind::Comma) {
                Some(comma) => node.add_token(comma),
                None => break,
            }
        }
        end_of_statement(p, &mut node)?;
        Ok(node)
    })
}

fn sub(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("sub", |p| {
        let mut node = Node::new(ModuleRule::Sub);
        annotations(p, &mut node)?;
        if let Some(async_keyword) = p.eat(TokenKind::Async) {
            node.add_token(async_keyword);
        }
        let closer = match p.peek_kind() {
            TokenKind::Procedure => TokenKind::EndProcedure,
            TokenKind::Function => TokenKind::EndFunction,
            _ => return p.unexpected("`Процедура` or `Функция`"),
        };
        node.add_token(p.next());
        node.add_token(p.expect(TokenKind::Identifier)?);
        node.add_child(params(p)?);
        if let Some(export) = p.eat(TokenKind::Export) {
            node.add_token(export);
        }
        node.add_child(block(p)?);
        let end = p.expect_with(closer, |found| {
            Diagnostic::error(format!("{} expected", closer.name()))
                .with_label(Label::primary(found, "the method should end here"))
        })?;
        node.add_token(end);
        Ok(node)
    })
}

fn params(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("params", |p| {
        let mut node = Node::new(ModuleRule::Params);
        node.add_token(p.expect(TokenKind::LeftParen)?);
        while !p.at(TokenKind::RightParen) {
            let mut param = Node::new(ModuleRule::Param);
            annotations(p, &mut param)?;
            if let Some(val) = p.eat(TokenKind::Val) {
                param.add_token(val);
            }
            param.add_token(p.expect(TokenKind::Identifier)?);
            if let Some(assign) = p.eat(TokenKind::Assign) {
                param.add_token(assign);
                param.add_child(expression(p, false)?);
            }
            node.add_child(param);
            match p.eat(TokenKind::Comma) {
                Some(comma) => node.add_token(comma),
                None => break,
            }
        }
        node.add_token(p.expect(TokenKind::RightParen)?);
        Ok(node)
    })
}

/// Statements up to the next block closer, which is left for the caller.
fn block(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("block", |p| {
        let mut node = Node::new(ModuleRule::Block);
        loop {
            let kind = p.peek_kind();
            if kind == TokenKind::EndOfFile || is_block_closer(kind) {
                break;
            }
            let start = p.tokens.position();
            let result = statement(p);
            if let Some(statement) = p.recover(result, start, &mut node, statement_sync)? {
                node.add_child(statement);
            }
        }
        Ok(node)
    })
}

fn end_of_statement(
    p: &mut Parser<'_, '_, TokenKind>,
    node: &mut ModuleNode,
) -> Result<(), ParseError> {
    let kind = p.peek_kind();
    if kind == TokenKind::Semicolon {
        node.add_token(p.next());
        Ok(())
    } else if kind == TokenKind::EndOfFile || is_block_closer(kind) {
        Ok(())
    } else {
        let found = p.peek().clone();
        p.bail(
            found.span,
            Diagnostic::error("`;` expected")
                .with_label(Label::primary(&found, "the statement should end before this")),
        )
    }
}

fn statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    p.scope_mut("statement", |p| match p.peek_kind() {
        TokenKind::Semicolon => {
            let mut node = Node::new(ModuleRule::Empty);
            node.add_token(p.next());
            Ok(node)
        }
        TokenKind::Hash => Ok(directive_line(p)),
        TokenKind::Tilda => label(p),
        TokenKind::Var => vars(p),
        TokenKind::If => if_statement(p),
        TokenKind::While => while_statement(p),
        TokenKind::For if p.lookahead(1)?.kind == TokenKind::Each => for_each_statement(p),
        TokenKind::For => for_statement(p),
        TokenKind::Try => try_statement(p),
        TokenKind::Return => keyword_statement(p, ModuleRule::Return, true),
        TokenKind::Raise => keyword_statement(p, ModuleRule::Raise, true),
        TokenKind::Continue => keyword_statement(p, ModuleRule::Continue, false),
        TokenKind::Break => keyword_statement(p, ModuleRule::Break, false),
        TokenKind::Execute => execute_statement(p),
        TokenKind::Goto => goto_statement(p),
        TokenKind::AddHandler => handler_statement(p, ModuleRule::AddHandler),
        TokenKind::RemoveHandler => handler_statement(p, ModuleRule::RemoveHandler),
        _ => assignment_or_call(p),
    })
}

/// `~Метка:`
fn label(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::Label);
    node.add_token(p.expect(TokenKind::Tilda)?);
    node.add_token(p.expect(TokenKind::Identifier)?);
    node.add_token(p.expect(TokenKind::Colon)?);
    Ok(node)
}

fn if_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::If);
    node.add_token(p.expect(TokenKind::If)?);
    node.add_child(expression(p, false)?);
    node.add_token(p.expect(TokenKind::Then)?);
    node.add_child(block(p)?);
    while p.at(TokenKind::ElsIf) {
        let mut branch = Node::new(ModuleRule::ElseIf);
        branch.add_token(p.next());
        branch.add_child(expression(p, false)?);
        branch.add_token(p.expect(TokenKind::Then)?);
        branch.add_child(block(p)?);
        node.add_child(branch);
    }
    if p.at(TokenKind::Else) {
        let mut branch = Node::new(ModuleRule::Else);
        branch.add_token(p.next());
        branch.add_child(block(p)?);
        node.add_child(branch);
    }
    node.add_token(p.expect(TokenKind::EndIf)?);
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// The `Цикл … КонецЦикла` part shared by all loops.
fn loop_body(p: &mut Parser<'_, '_, TokenKind>, node: &mut ModuleNode) -> Result<(), ParseError> {
    node.add_token(p.expect(TokenKind::Do)?);
    node.add_child(block(p)?);
    node.add_token(p.expect(TokenKind::EndDo)?);
    end_of_statement(p, node)
}

fn while_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::While);
    node.add_token(p.expect(TokenKind::While)?);
    node.add_child(expression(p, false)?);
    loop_body(p, &mut node)?;
    Ok(node)
}

/// `Для И = 1 По 10 Цикл`
fn for_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::For);
    node.add_token(p.expect(TokenKind::For)?);
    node.add_token(p.expect(TokenKind::Identifier)?);
    node.add_token(p.expect(TokenKind::Assign)?);
    node.add_child(expression(p, false)?);
    node.add_token(p.expect(TokenKind::To)?);
    node.add_child(expression(p, false)?);
    loop_body(p, &mut node)?;
    Ok(node)
}

/// `Для Каждого Элемент Из Коллекция Цикл`
fn for_each_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::ForEach);
    node.add_token(p.expect(TokenKind::For)?);
    node.add_token(p.expect(TokenKind::Each)?);
    node.add_token(p.expect(TokenKind::Identifier)?);
    node.add_token(p.expect(TokenKind::In)?);
    node.add_child(expression(p, false)?);
    loop_body(p, &mut node)?;
    Ok(node)
}

fn try_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::Try);
    node.add_token(p.expect(TokenKind::Try)?);
    node.add_child(block(p)?);
    let mut except = Node::new(ModuleRule::Except);
    except.add_token(p.expect(TokenKind::Except)?);
    except.add_child(block(p)?);
    node.add_child(except);
    node.add_token(p.expect(TokenKind::EndTry)?);
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// `Возврат`, `ВызватьИсключение`, `Продолжить` and `Прервать`, the first two with an optional
/// operand.
fn keyword_statement(
    p: &mut Parser<'_, '_, TokenKind>,
    rule: ModuleRule,
    has_operand: bool,
) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(rule);
    node.add_token(p.next());
    if has_operand && !ends_expression(p.peek_kind()) {
        node.add_child(expression(p, false)?);
    }
    end_of_statement(p, &mut node)?;
    Ok(node)
}

fn execute_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::Execute);
    node.add_token(p.expect(TokenKind::Execute)?);
    node.add_child(expression(p, false)?);
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// `Перейти ~Метка;`
fn goto_statement(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(ModuleRule::Goto);
    node.add_token(p.expect(TokenKind::Goto)?);
    node.add_token(p.expect(TokenKind::Tilda)?);
    node.add_token(p.expect(TokenKind::Identifier)?);
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// `ДобавитьОбработчик Событие, Обработчик;`
fn handler_statement(
    p: &mut Parser<'_, '_, TokenKind>,
    rule: ModuleRule,
) -> Result<ModuleNode, ParseError> {
    let mut node = Node::new(rule);
    node.add_token(p.next());
    node.add_child(expression(p, false)?);
    node.add_token(p.expect(TokenKind::Comma)?);
    node.add_child(expression(p, false)?);
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// Looks ahead for a `=` outside of brackets before the statement ends. Only tokens outside of
/// brackets count against the lookahead bound, so long argument lists stay on the fast path.
fn is_assignment(p: &Parser<'_, '_, TokenKind>) -> Result<bool, ParseError> {
    let mut depth = 0usize;
    let mut n = 0;
    let mut cost = 0;
    loop {
        if depth == 0 {
            cost += 1;
        }
        let kind = p.lookahead_charged(n, cost)?.kind;
        match kind {
            _ if kind.closed_by().is_some() => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket => depth = depth.saturating_sub(1),
            TokenKind::Assign if depth == 0 => return Ok(true),
            _ if ends_expression(kind) => return Ok(false),
            _ => (),
        }
        n += 1;
    }
}

fn assignment_or_call(p: &mut Parser<'_, '_, TokenKind>) -> Result<ModuleNode, ParseError> {
    let mut node = if is_assignment(p)? {
        let mut node = Node::new(ModuleRule::Assignment);
        node.add_child(expression(p, true)?);
        node.add_token(p.expect(TokenKind::Assign)?);
        node.add_child(expression(p, false)?);
        node
    } else {
        let mut node = Node::new(ModuleRule::Call);
        node.add_child(expression(p, false)?);
        node
    };
    end_of_statement(p, &mut node)?;
    Ok(node)
}

/// A flat run of tokens with balanced brackets. Stops before a `,` or closing bracket outside of
/// brackets, before `=` if `stop_at_assign` is set, before an operand directly following another
/// operand, and before any token that cannot be part of an expression.
fn expression(
    p: &mut Parser<'_, '_, TokenKind>,
    stop_at_assign: bool,
) -> Result<ModuleNode, ParseError> {
    p.scope_mut("expression", |p| {
        let mut node = Node::new(ModuleRule::Expression);
        let mut open = vec![];
        let mut previous = None;
        loop {
            let kind = p.peek_kind();
            if ends_expression(kind)
                || (previous.map(ends_operand).unwrap_or(false) && starts_operand(kind))
            {
                break;
            }
            if let Some(closer) = kind.closed_by() {
                open.push((closer, p.peek().clone()));
            } else if matches!(kind, TokenKind::RightParen | TokenKind::RightBracket) {
                match open.last().map(|(closer, opener)| (*closer, opener.clone())) {
                    Some((closer, _)) if closer == kind => {
                        open.pop();
                    }
                    Some((closer, opener)) => {
                        let found = p.peek().clone();
                        return p.bail(
                            found.span,
                            Diagnostic::error(format!("{} expected", closer.name()))
                                .with_label(Label::primary(&found, "mismatched bracket"))
                                .with_label(Label::secondary(&opener, "opened here")),
                        );
                    }
                    None => break,
                }
            } else if open.is_empty()
                && (kind == TokenKind::Comma || (stop_at_assign && kind == TokenKind::Assign))
            {
                break;
            }
            previous = Some(kind);
            node.add_token(p.next());
        }

        if let Some((closer, opener)) = open.pop() {
            let found = p.peek().clone();
            return p.bail(
                found.span,
                Diagnostic::error(format!("{} expected", closer.name()))
                    .with_label(Label::primary(&found, "the bracket should be closed here"))
                    .with_label(Label::secondary(&opener, "opened here")),
            );
        }
        if node.is_empty() {
            return p.unexpected("expression");
        }
        Ok(node)
    })
}
