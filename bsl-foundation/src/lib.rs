//! Foundational types shared by the BSL lexer, parser, and preprocessor.

pub mod cache;
pub mod errors;
pub mod ident;
pub mod source;
