//! Error and diagnostic system for the Stencil parser and compiler.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//! - A plain-text snippet renderer
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which represents
//! a single error or warning message with optional error code, source
//! locations, and help text. Multiple diagnostics are wrapped in
//! [`ParseError`] for returning from tokenizing and parsing. The compiler in
//! the `stencil` crate reports its failures with the same [`Diagnostic`] type.
//!
//! # Example
//!
//! ```
//! # use stencil_parser::error::{Diagnostic, ErrorCode};
//! # use stencil_parser::Span;
//!
//! let source = "{{ name }}";
//! let diag = Diagnostic::error("\"name\" identifier does not exist")
//!     .with_code(ErrorCode::E200)
//!     .with_label(Span::new(3..7), "not defined");
//!
//! assert!(diag.render(source).contains("^^^^"));
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;
mod snippet;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::{ParseError, Result};
pub use severity::Severity;
