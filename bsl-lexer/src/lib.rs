//! Lexical analysis of BSL modules and queries.

#[macro_use]
pub mod token;

pub mod bsl;
pub mod char_stream;
pub mod line_tracking;
pub mod query;
pub mod token_cursor;
pub mod token_source;

pub use token::{Channel, Kind, Token};
pub use token_cursor::TokenCursor;
pub use token_source::{ModeStack, Scanner, TokenSource};
