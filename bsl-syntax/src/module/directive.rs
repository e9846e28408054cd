//! Grammar of a single preprocessor directive line.

use std::fmt;

use bsl_foundation::errors::{Diagnostic, Label};
use bsl_lexer::bsl::{PlatformSymbol, TokenKind};

use crate::{ParseError, Parser};

/// Condition of `#Если` and `#ИначеЕсли`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Symbol(PlatformSymbol),
    /// A name that is not a platform symbol. Whether it holds is up to the caller.
    Unknown(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluates the expression, asking `is_defined` about each leaf.
    pub fn evaluate(&self, is_defined: &impl Fn(&Expr) -> bool) -> bool {
        match self {
            Expr::Symbol(_) | Expr::Unknown(_) => is_defined(self),
            Expr::Not(inner) => !inner.evaluate(is_defined),
            Expr::And(left, right) => left.evaluate(is_defined) && right.evaluate(is_defined),
            Expr::Or(left, right) => left.evaluate(is_defined) || right.evaluate(is_defined),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(symbol) => write!(f, "{symbol}"),
            Expr::Unknown(name) => f.write_str(name),
            Expr::Not(inner) => write!(f, "НЕ {inner}"),
            Expr::And(left, right) => write!(f, "({left} И {right})"),
            Expr::Or(left, right) => write!(f, "({left} ИЛИ {right})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `None` if the condition is malformed.
    If(Option<Expr>),
    ElseIf(Option<Expr>),
    Else,
    EndIf,
    Region(String),
    EndRegion,
    Use(String),
    Insert,
    EndInsert,
    Delete,
    EndDelete,
    Shebang,
}

impl Directive {
    /// The directive a patch marker token stands for.
    pub fn from_patch_marker(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::PreprocInsert => Some(Directive::Insert),
            TokenKind::PreprocEndInsert => Some(Directive::EndInsert),
            TokenKind::PreprocDelete => Some(Directive::Delete),
            TokenKind::PreprocEndDelete => Some(Directive::EndDelete),
            _ => None,
        }
    }
}

pub(super) fn directive(p: &mut Parser<'_, '_, TokenKind>) -> Result<Directive, ParseError> {
    p.scope_mut("directive", |p| {
        let hash = p.expect(TokenKind::Hash)?;
        let keyword = p.next();
        let directive = match keyword.kind {
            TokenKind::PreprocIf => Directive::If(condition(p)),
            TokenKind::PreprocElsIf => Directive::ElseIf(condition(p)),
            TokenKind::PreprocElse => Directive::Else,
            TokenKind::PreprocEndIf => Directive::EndIf,
            TokenKind::PreprocRegion => {
                let name = p.expect_with(TokenKind::PreprocIdentifier, |found| {
                    Diagnostic::error("region name expected")
                        .with_label(Label::primary(found, "name expected here"))
                })?;
                Directive::Region(name.text)
            }
            TokenKind::PreprocEndRegion => Directive::EndRegion,
            TokenKind::PreprocUse => {
                let path = p.next();
                match path.kind {
                    TokenKind::PreprocUsePath => Directive::Use(path.text),
                    TokenKind::PreprocString => Directive::Use(unquote(&path.text)),
                    _ => {
                        return p.bail(
                            path.span,
                            Diagnostic::error("library name expected")
                                .with_label(Label::primary(&path, "name expected here")),
                        )
                    }
                }
            }
            TokenKind::PreprocExclamation => {
                while !p.peek().is_end_of_file() {
                    p.next();
                }
                Directive::Shebang
            }
            _ => {
                return p.bail(
                    keyword.span,
                    Diagnostic::error(format!("unknown preprocessor directive `{}`", keyword.text))
                        .with_label(Label::primary(&keyword, "not a directive"))
                        .with_label(Label::secondary(&hash, "directive starts here")),
                )
            }
        };
        end_of_directive(p);
        Ok(directive)
    })
}

/// Reports and skips anything left on the directive line.
fn end_of_directive(p: &mut Parser<'_, '_, TokenKind>) {
    if p.peek().is_end_of_file() {
        return;
    }
    let found = p.peek().clone();
    p.emit_diagnostic(
        Diagnostic::error(format!("unexpected {} after directive", found.kind.name()))
            .with_label(Label::primary(&found, "the directive should end before this")),
    );
    while !p.peek().is_end_of_file() {
        p.next();
    }
}

fn unquote(text: &str) -> String {
    let inner = text.strip_prefix('"').unwrap_or(text);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    inner.replace("\"\"", "\"")
}

fn condition(p: &mut Parser<'_, '_, TokenKind>) -> Option<Expr> {
    let result: Result<Expr, ParseError> = p.scope_mut("condition", |p| {
        let expr = or_expression(p)?;
        p.expect_with(TokenKind::PreprocThen, |found| {
            Diagnostic::error("`Тогда` expected after the condition")
                .with_label(Label::primary(found, "`Тогда` expected here"))
        })?;
        Ok(expr)
    });
    match result {
        Ok(expr) => Some(expr),
        Err(_) => {
            while !p.peek().is_end_of_file() {
                p.next();
            }
            None
        }
    }
}

fn or_expression(p: &mut Parser<'_, '_, TokenKind>) -> Result<Expr, ParseError> {
    let mut left = and_expression(p)?;
    while p.eat(TokenKind::PreprocOr).is_some() {
        let right = and_expression(p)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn and_expression(p: &mut Parser<'_, '_, TokenKind>) -> Result<Expr, ParseError> {
    let mut left = unary_expression(p)?;
    while p.eat(TokenKind::PreprocAnd).is_some() {
        let right = unary_expression(p)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn unary_expression(p: &mut Parser<'_, '_, TokenKind>) -> Result<Expr, ParseError> {
    if p.eat(TokenKind::PreprocNot).is_some() {
        Ok(Expr::Not(Box::new(unary_expression(p)?)))
    } else {
        atom(p)
    }
}

fn atom(p: &mut Parser<'_, '_, TokenKind>) -> Result<Expr, ParseError> {
    let token = p.next();
    match token.kind {
        TokenKind::PreprocLeftParen => {
            let inner = or_expression(p)?;
            p.expect(TokenKind::PreprocRightParen)?;
            Ok(inner)
        }
        TokenKind::PreprocSymbol => Ok(PlatformSymbol::from_name(&token.text)
            .map(Expr::Symbol)
            .unwrap_or(Expr::Unknown(token.text))),
        TokenKind::PreprocIdentifier => Ok(Expr::Unknown(token.text)),
        _ => p.bail(
            token.span,
            Diagnostic::error(format!(
                "build symbol expected, found {}",
                token.kind.name()
            ))
            .with_label(Label::primary(&token, "symbol expected here")),
        ),
    }
}
