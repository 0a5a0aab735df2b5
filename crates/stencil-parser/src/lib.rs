//! # Stencil Parser
//!
//! Tokenizer, parser and diagnostics for the Stencil template language.
//!
//! ## Usage
//!
//! ```
//! # use stencil_parser::{parse, Delimiters, ParseError};
//!
//! fn main() -> Result<(), ParseError> {
//!     let program = parse("Hello {{ name | upper }}!", &Delimiters::default())?;
//!     assert_eq!(program.elements.len(), 3);
//!     Ok(())
//! }
//! ```
//!
//! Errors carry [`Diagnostic`]s that render against the template source:
//!
//! ```
//! # use stencil_parser::{parse, Delimiters};
//!
//! let source = "{{ if ready }}go";
//! let err = parse(source, &Delimiters::default()).unwrap_err();
//! assert!(err.render(source).starts_with("error[E101]: Missing \"{{ end }}\""));
//! ```

mod combinator;
pub mod error;
mod grammar;
mod lexer;
mod literal;
#[cfg(test)]
mod parser_tests;

pub use error::{Diagnostic, ErrorCode, ParseError};
pub use grammar::{MAX_NESTING, RESERVED_WORDS, is_reserved, parse, parse_expression};
pub use lexer::{Punctuator, Token, TokenKind, tokenize};
pub use stencil_core::{Delimiters, Span, ast};
