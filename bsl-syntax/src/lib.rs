//! Syntax trees of BSL modules and queries, and the tokenizer that produces them.

mod parsing;

pub mod module;
pub mod node;
pub mod query;
pub mod tokenizer;

pub use parsing::*;
pub use tokenizer::*;
