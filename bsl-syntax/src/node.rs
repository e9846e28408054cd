use std::fmt;

use bsl_foundation::{cache::CacheCell, source::Span};
use bsl_lexer::{Kind, Token};

#[derive(Debug, Clone)]
pub enum Child<R, K> {
    Node(Node<R, K>),
    Token(Token<K>),
    /// A token skipped during error recovery.
    Error(Token<K>),
}

/// Concrete syntax tree node.
///
/// The text and the flattened token list are computed on first use and cached. Children can only
/// be changed through the node's own methods, each of which drops the cached views.
#[derive(Clone)]
pub struct Node<R, K> {
    rule: R,
    children: Vec<Child<R, K>>,
    text: CacheCell<String>,
    flattened: CacheCell<Vec<Token<K>>>,
}

impl<R, K> Node<R, K>
where
    R: Copy + PartialEq,
    K: Kind,
{
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            children: vec![],
            text: CacheCell::new(),
            flattened: CacheCell::new(),
        }
    }

    pub fn rule(&self) -> R {
        self.rule
    }

    pub fn children(&self) -> &[Child<R, K>] {
        &self.children
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &Node<R, K>> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            _ => None,
        })
    }

    /// All nodes of the given rule in this subtree, in source order, including this node.
    pub fn find_all(&self, rule: R) -> Vec<&Node<R, K>> {
        let mut found = vec![];
        self.collect_rule(rule, &mut found);
        found
    }

    fn collect_rule<'n>(&'n self, rule: R, found: &mut Vec<&'n Node<R, K>>) {
        if self.rule == rule {
            found.push(self);
        }
        for node in self.child_nodes() {
            node.collect_rule(rule, found);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.children.iter().any(|child| match child {
            Child::Node(node) => node.has_errors(),
            Child::Token(_) => false,
            Child::Error(_) => true,
        })
    }

    fn invalidate(&mut self) {
        self.text.clear();
        self.flattened.clear();
    }

    pub fn add_child(&mut self, node: Node<R, K>) {
        self.children.push(Child::Node(node));
        self.invalidate();
    }

    pub fn add_token(&mut self, token: Token<K>) {
        self.children.push(Child::Token(token));
        self.invalidate();
    }

    pub fn add_error_node(&mut self, token: Token<K>) {
        self.children.push(Child::Error(token));
        self.invalidate();
    }

    pub fn remove_last_child(&mut self) -> Option<Child<R, K>> {
        let removed = self.children.pop();
        self.invalidate();
        removed
    }

    /// Replaces this node's rule and children with copies of another node's.
    pub fn copy_from(&mut self, other: &Node<R, K>) {
        self.rule = other.rule;
        self.children = other.children.clone();
        self.invalidate();
    }

    /// Source text of the node: the text of all its tokens, error tokens included.
    pub fn text(&self) -> &str {
        self.text.get_or_compute(|| {
            self.flattened_tokens()
                .iter()
                .map(|token| token.text.as_str())
                .collect()
        })
    }

    /// Leaf tokens of the subtree in source order, error tokens included.
    pub fn flattened_tokens(&self) -> &[Token<K>] {
        self.flattened.get_or_compute(|| {
            let mut tokens = vec![];
            self.flatten_into(&mut tokens);
            tokens
        })
    }

    fn flatten_into(&self, tokens: &mut Vec<Token<K>>) {
        for child in &self.children {
            match child {
                Child::Node(node) => node.flatten_into(tokens),
                Child::Token(token) | Child::Error(token) => tokens.push(token.clone()),
            }
        }
    }

    pub fn first_token(&self) -> Option<&Token<K>> {
        self.flattened_tokens().first()
    }

    pub fn last_token(&self) -> Option<&Token<K>> {
        self.flattened_tokens().last()
    }

    pub fn span(&self) -> Option<Span> {
        let first = self.first_token()?;
        let last = self.last_token()?;
        Some(first.span.join(&last.span))
    }
}

impl<R, K> fmt::Debug for Node<R, K>
where
    R: fmt::Debug,
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("rule", &self.rule)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bsl_lexer::{
        bsl::{Lexer, TokenKind},
        TokenSource,
    };

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Rule {
        Outer,
        Inner,
    }

    fn tokens(text: &str) -> Vec<Token<TokenKind>> {
        Lexer::from_text("", text).tokenize()
    }

    #[test]
    fn views_follow_mutations() {
        let mut tokens = tokens("А = Б;").into_iter();
        let mut node = Node::new(Rule::Outer);
        assert_eq!(node.text(), "");
        assert!(node.flattened_tokens().is_empty());

        node.add_token(tokens.next().unwrap());
        assert_eq!(node.text(), "А");

        let mut inner = Node::new(Rule::Inner);
        inner.add_token(tokens.next().unwrap());
        inner.add_token(tokens.next().unwrap());
        node.add_child(inner);
        assert_eq!(node.text(), "А =");
        assert_eq!(node.flattened_tokens().len(), 3);

        node.add_error_node(tokens.next().unwrap());
        assert_eq!(node.text(), "А = ");
        assert!(node.has_errors());

        node.remove_last_child();
        assert_eq!(node.text(), "А =");
        assert!(!node.has_errors());

        let mut copy = Node::new(Rule::Inner);
        copy.add_token(tokens.next().unwrap());
        assert_eq!(copy.text(), "Б");
        copy.copy_from(&node);
        assert_eq!(copy.rule(), Rule::Outer);
        assert_eq!(copy.text(), "А =");
    }

    #[test]
    fn end_of_file_has_no_text() {
        let mut node = Node::new(Rule::Outer);
        for token in tokens("А;") {
            node.add_token(token);
        }
        assert_eq!(node.text(), "А;");
        assert!(node.last_token().unwrap().is_end_of_file());
        assert_eq!(node.span(), Some(Span { start: 0, end: 3 }));
    }

    #[test]
    fn find_all_descends() {
        let mut outer = Node::<Rule, TokenKind>::new(Rule::Outer);
        let mut middle = Node::new(Rule::Outer);
        middle.add_child(Node::new(Rule::Inner));
        outer.add_child(Node::new(Rule::Inner));
        outer.add_child(middle);
        assert_eq!(outer.find_all(Rule::Inner).len(), 2);
        assert_eq!(outer.find_all(Rule::Outer).len(), 2);
    }
}
