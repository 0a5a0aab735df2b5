//! Error types for Stencil operations.
//!
//! This module provides the main error type [`StencilError`] which wraps
//! the error conditions that can occur while parsing, formatting and
//! rendering templates.

use std::io;

use thiserror::Error;

use stencil_parser::{Diagnostic, ParseError};

/// The main error type for Stencil operations.
///
/// # Diagnostic Variants
///
/// The `Parse` and `Compile` variants carry structured diagnostics with
/// source spans, together with the template source they point into, so
/// callers can render a report without keeping the source around.
#[derive(Debug, Error)]
pub enum StencilError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("{err}")]
    Compile { err: Diagnostic, src: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StencilError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }

    /// Create a new `Compile` error with the associated source code.
    pub fn new_compile_error(err: Diagnostic, src: impl Into<String>) -> Self {
        Self::Compile {
            err,
            src: src.into(),
        }
    }

    /// The diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Parse { err, .. } => err.diagnostics(),
            Self::Compile { err, .. } => std::slice::from_ref(err),
            Self::Io(_) | Self::Config(_) => &[],
        }
    }

    /// Render this error as plain text, with source snippets for
    /// diagnostics.
    pub fn render(&self) -> String {
        match self {
            Self::Parse { err, src } => err.render(src),
            Self::Compile { err, src } => err.render(src),
            other => other.to_string(),
        }
    }
}
