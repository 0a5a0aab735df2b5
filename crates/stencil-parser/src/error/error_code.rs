//! Error codes for the Stencil diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Tokenizer and literal errors
//! - `E1xx` - Grammar errors
//! - `E2xx` - Compile (evaluation) errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Tokenizer Errors (E0xx)
    // =========================================================================
    /// Unterminated string literal.
    ///
    /// A string was opened with a quote but never closed before the end of
    /// the line or the end of input.
    E001,

    /// Unexpected character.
    ///
    /// A character inside a tag does not start any token.
    E002,

    /// Invalid escape sequence.
    ///
    /// Valid escapes are: `\n`, `\r`, `\t`, `\b`, `\f`, `\v`, `\\`, `\/`, `\'`,
    /// `\"`, `\0` and `\u{...}`.
    E003,

    /// Invalid unicode escape format.
    ///
    /// Unicode escapes must use the format `\u{XXXX}` with 1-6 hexadecimal
    /// digits.
    E004,

    /// Invalid unicode codepoint.
    ///
    /// The codepoint is out of range or in the surrogate range.
    E005,

    /// Empty unicode escape.
    ///
    /// A unicode escape `\u{}` was found with no hexadecimal digits.
    E006,

    /// Unclosed tag.
    ///
    /// An open delimiter was never matched by a close delimiter.
    E007,

    /// Unopened tag.
    ///
    /// A close delimiter appeared in raw text.
    E008,

    // =========================================================================
    // Grammar Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    E100,

    /// Missing token.
    ///
    /// A required delimiter, keyword or expression is absent, for example
    /// `}}` after an `if` condition or `]` after a computed member key.
    E101,

    /// Invalid numeric literal.
    ///
    /// A radix prefix without digits, or an exponent without digits.
    E102,

    /// Reserved word used as an identifier.
    E103,

    /// Invalid update target.
    ///
    /// `++` and `--` apply only to identifiers and member expressions.
    E104,

    /// Misplaced loop control.
    ///
    /// `break` or `continue` outside of a `for` body.
    E105,

    /// Nesting too deep.
    ///
    /// Blocks, brackets and prefix operators nest past the grammar's limit.
    E106,

    // =========================================================================
    // Compile Errors (E2xx)
    // =========================================================================
    /// Undefined identifier.
    E200,

    /// Undefined helper function.
    E201,

    /// Call target is not a function.
    E202,

    /// Operands have different data types.
    E203,

    /// Operator cannot be applied to the operand types.
    E204,

    /// Invalid property access.
    ///
    /// Prototype-like names such as `__proto__` are never readable.
    E205,

    /// Invalid property key.
    ///
    /// Computed keys must be strings or numbers.
    E206,

    /// Value is not iterable.
    E207,

    /// Helper function failed.
    E208,

    /// Invalid update operand.
    ///
    /// The target of `++`/`--` is undefined, or not a number.
    E209,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Tokenizer errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E005 => "E005",
            ErrorCode::E006 => "E006",
            ErrorCode::E007 => "E007",
            ErrorCode::E008 => "E008",
            // Grammar errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E104 => "E104",
            ErrorCode::E105 => "E105",
            ErrorCode::E106 => "E106",
            // Compile errors
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            ErrorCode::E208 => "E208",
            ErrorCode::E209 => "E209",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            // Tokenizer errors
            ErrorCode::E001 => "unterminated string literal",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "invalid unicode escape",
            ErrorCode::E005 => "invalid unicode codepoint",
            ErrorCode::E006 => "empty unicode escape",
            ErrorCode::E007 => "unclosed tag",
            ErrorCode::E008 => "unopened tag",
            // Grammar errors
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "missing token",
            ErrorCode::E102 => "invalid numeric literal",
            ErrorCode::E103 => "reserved word",
            ErrorCode::E104 => "invalid update target",
            ErrorCode::E105 => "misplaced loop control",
            ErrorCode::E106 => "nesting too deep",
            // Compile errors
            ErrorCode::E200 => "undefined identifier",
            ErrorCode::E201 => "undefined helper",
            ErrorCode::E202 => "not a function",
            ErrorCode::E203 => "data type mismatch",
            ErrorCode::E204 => "invalid operand",
            ErrorCode::E205 => "invalid property access",
            ErrorCode::E206 => "invalid property key",
            ErrorCode::E207 => "not iterable",
            ErrorCode::E208 => "helper failure",
            ErrorCode::E209 => "invalid update operand",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
