//! Stencil Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Stencil parser,
//! compiler and formatter. It includes:
//!
//! - **Spans**: Byte ranges and line/column lookup ([`span`] module)
//! - **Delimiters**: The configurable tag delimiter pair ([`Delimiters`])
//! - **AST**: The syntax tree produced by the parser ([`ast`] module)
//! - **Values**: Runtime values flowing through templates ([`Value`])

pub mod ast;
pub mod delimiters;
pub mod span;
pub mod value;

pub use delimiters::Delimiters;
pub use span::Span;
pub use value::Value;
