//! Lexer for the xcc language.
//!
//! Tokenizes source text into the fixed token surface consumed by
//! `xcc_parser`: a longest-match prefix tree resolves keywords and
//! operators, falling back to identifier/number/string/char scanning.

pub mod error;
pub mod position;
pub mod prefix_tree;
pub mod lexer;
pub mod token;

pub use error::{LexError, LexResult};
pub use lexer::Lexer;
pub use position::Position;
pub use prefix_tree::PrefixTree;
pub use token::{Token, TokenKind};
