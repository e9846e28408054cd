use std::{fmt, hash::Hash};

use bitflags::bitflags;
use bsl_foundation::source::{Span, Spanned};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Channel: u8 {
        /// Code seen by the parser.
        const DEFAULT = 0x1;
        /// Whitespace, comments, patch insertion markers, and the end of input marker.
        const HIDDEN  = 0x2;
        /// Text inside `#Удаление` patch zones.
        const DELETED = 0x4;
    }
}

/// Token kind of one of the languages.
pub trait Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    const END_OF_FILE: Self;

    /// Human readable name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Channel the lexer puts tokens of this kind on.
    fn channel(&self) -> Channel;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<K> {
    pub kind: K,
    pub channel: Channel,
    /// Source text, in its original case.
    pub text: String,
    pub line: usize,
    pub column: usize,
    /// Position of the token in the token list.
    pub index: usize,
    pub span: Span,
}

impl<K> Token<K>
where
    K: Kind,
{
    pub fn is_end_of_file(&self) -> bool {
        self.kind == K::END_OF_FILE
    }

    /// An end of input marker placed right after this token.
    pub fn end_of_file_after(&self) -> Self {
        let (mut line, mut column) = (self.line, self.column);
        let mut chars = self.text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' if chars.peek() == Some(&'\n') => (),
                '\r' | '\n' => {
                    line += 1;
                    column = 0;
                }
                _ => column += 1,
            }
        }
        Self {
            kind: K::END_OF_FILE,
            channel: Channel::HIDDEN,
            text: String::new(),
            line,
            column,
            index: self.index + 1,
            span: Span {
                start: self.span.end,
                end: self.span.end,
            },
        }
    }

    pub fn end_of_file_at_start() -> Self {
        Self {
            kind: K::END_OF_FILE,
            channel: Channel::HIDDEN,
            text: String::new(),
            line: 1,
            column: 0,
            index: 0,
            span: Span::default(),
        }
    }
}

impl<K> Spanned for Token<K> {
    fn span(&self) -> Span {
        self.span
    }
}

impl<K> fmt::Display for Token<K>
where
    K: Kind,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} `{}` at {}:{}",
            self.kind.name(),
            self.text,
            self.line,
            self.column
        )
    }
}

/// Defines a token kind enum along with a table of human readable names.
macro_rules! define_token_kinds {
    (
        $(#[$meta:meta])*
        $vis:vis enum $kind:ident {
            $($name:ident = $pretty_name:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $kind {
            $($name),*
        }

        impl $kind {
            pub const ALL: &'static [$kind] = &[$($kind::$name),*];

            pub const fn name(&self) -> &'static str {
                match self {
                    $($kind::$name => $pretty_name),*
                }
            }
        }
    };
}
