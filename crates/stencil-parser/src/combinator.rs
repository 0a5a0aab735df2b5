//! Parsing primitives shared by the tokenizer and the grammar.
//!
//! Everything here runs directly over the template characters through a
//! winnow [`LocatingSlice`], so byte offsets are always available for spans.
//!
//! Failures carry an [`Expected`] context. A winnow `Backtrack` is a soft
//! error that lets an enclosing `alt` try its next branch; a `Cut` is a hard
//! failure that ends parsing. [`cut_with`] upgrades the first into the second
//! once a construct has been recognised beyond doubt (after `if`, after an
//! operator, after an opening bracket).

use winnow::{
    Parser as _,
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{literal, take_while},
};

use stencil_core::Span;

use crate::error::{Diagnostic, ErrorCode};

pub(crate) type Input<'src> = LocatingSlice<&'src str>;
pub(crate) type IResult<O> = ModalResult<O, ContextError<Expected>>;

/// What the parser expected at a failure point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expected {
    pub code: ErrorCode,
    pub message: String,
    pub help: Option<&'static str>,
    pub span: Span,
}

impl Expected {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            help: None,
            span,
        }
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(&self.message)
            .with_code(self.code)
            .with_label(self.span, self.code.description());
        if let Some(help) = self.help {
            diag = diag.with_help(help);
        }
        diag
    }
}

/// Current byte offset.
pub(crate) fn offset(input: &Input<'_>) -> usize {
    input.current_token_start()
}

/// The unconsumed text.
pub(crate) fn rest<'src>(input: &Input<'src>) -> &'src str {
    **input
}

/// Span of the next character, or an empty span at the end of input.
pub(crate) fn next_char_span(input: &Input<'_>) -> Span {
    let start = offset(input);
    let len = rest(input).chars().next().map_or(0, char::len_utf8);
    Span::new(start..start + len)
}

/// Describe the next character for messages: `"x"` or `end of input`.
pub(crate) fn found(input: &Input<'_>) -> String {
    match rest(input).chars().next() {
        Some(c) => format!("\"{c}\""),
        None => "end of input".to_string(),
    }
}

fn context_error(input: &Input<'_>, expected: Expected) -> ContextError<Expected> {
    ContextError::new().add_context(input, &input.checkpoint(), expected)
}

/// A soft error: enclosing alternatives may still be tried.
pub(crate) fn backtrack(input: &Input<'_>, expected: Expected) -> ErrMode<ContextError<Expected>> {
    ErrMode::Backtrack(context_error(input, expected))
}

/// A hard error: parsing stops here.
pub(crate) fn failure(input: &Input<'_>, expected: Expected) -> ErrMode<ContextError<Expected>> {
    ErrMode::Cut(context_error(input, expected))
}

/// The span recorded by the innermost context of `err`.
fn first_span(err: &ContextError<Expected>) -> Option<Span> {
    err.context().next().map(|expected| expected.span)
}

/// Run `parser`; if it backtracks, fail hard with `message` instead.
///
/// The failure points at wherever the inner parser gave up. Hard failures
/// from inside `parser` are propagated unchanged.
pub(crate) fn cut_with<'src, O>(
    input: &mut Input<'src>,
    message: impl Into<String>,
    parser: impl FnOnce(&mut Input<'src>) -> IResult<O>,
) -> IResult<O> {
    match parser(input) {
        Ok(output) => Ok(output),
        Err(ErrMode::Backtrack(err)) => {
            let span = first_span(&err).unwrap_or_else(|| next_char_span(input));
            Err(failure(
                input,
                Expected::new(ErrorCode::E101, message, span),
            ))
        }
        Err(err) => Err(err),
    }
}

/// Run `parser`; if it backtracks, replace its message with `message`.
///
/// Unlike [`cut_with`] the error stays soft.
pub(crate) fn expected<'src, O>(
    input: &mut Input<'src>,
    code: ErrorCode,
    message: impl Into<String>,
    parser: impl FnOnce(&mut Input<'src>) -> IResult<O>,
) -> IResult<O> {
    let start = input.checkpoint();
    match parser(input) {
        Ok(output) => Ok(output),
        Err(ErrMode::Backtrack(err)) => {
            let span = first_span(&err).unwrap_or_else(|| next_char_span(input));
            input.reset(&start);
            Err(backtrack(input, Expected::new(code, message, span)))
        }
        Err(err) => Err(err),
    }
}

/// Run `parser` without consuming input, reporting whether it succeeded.
///
/// Errors of either kind count as "no".
pub(crate) fn lookahead<'src, O>(
    input: &mut Input<'src>,
    parser: impl FnOnce(&mut Input<'src>) -> IResult<O>,
) -> bool {
    let start = input.checkpoint();
    let matched = parser(input).is_ok();
    input.reset(&start);
    matched
}

/// Match exactly the character `c`.
///
/// Fails with `"c" expected ("x" found)`.
pub(crate) fn character(input: &mut Input<'_>, c: char) -> IResult<char> {
    if rest(input).starts_with(c) {
        input.next_token();
        return Ok(c);
    }
    Err(backtrack(
        input,
        Expected::new(
            ErrorCode::E100,
            format!("\"{c}\" expected ({} found)", found(input)),
            next_char_span(input),
        ),
    ))
}

/// Match exactly the text `expected`.
///
/// A partial match reports the character that broke it, chained inside the
/// outer expectation: `"dog" expected ("g" expected but "n" found)`.
pub(crate) fn text<'src>(input: &mut Input<'src>, expected: &str) -> IResult<&'src str> {
    if rest(input).starts_with(expected) {
        return literal(expected).parse_next(input);
    }

    let start = input.checkpoint();
    let mut matched = 0;
    for c in expected.chars() {
        if !rest(input).starts_with(c) {
            break;
        }
        input.next_token();
        matched += 1;
    }

    let message = match expected.chars().nth(matched) {
        Some(c) if matched > 0 => format!(
            "\"{expected}\" expected (\"{c}\" expected but {} found)",
            found(input)
        ),
        _ => format!("\"{expected}\" expected ({} found)", found(input)),
    };
    let span = next_char_span(input);
    input.reset(&start);
    Err(backtrack(
        input,
        Expected::new(ErrorCode::E100, message, span),
    ))
}

/// Skip any whitespace.
pub(crate) fn whitespace<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(0.., char::is_whitespace).parse_next(input)
}

/// Whether `text` starts with the delimiter `tag`. An empty delimiter never
/// matches.
pub(crate) fn starts_with_tag(text: &str, tag: &str) -> bool {
    !tag.is_empty() && text.starts_with(tag)
}

/// Characters that may continue an identifier.
pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Characters that may start an identifier.
pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

/// Match the word `word` followed by a word boundary.
pub(crate) fn keyword<'src>(input: &mut Input<'src>, word: &str) -> IResult<&'src str> {
    let start = input.checkpoint();
    let matched = text(input, word)?;
    if rest(input).starts_with(is_identifier_char) {
        let span = next_char_span(input);
        input.reset(&start);
        return Err(backtrack(
            input,
            Expected::new(ErrorCode::E100, format!("\"{word}\" expected"), span),
        ));
    }
    Ok(matched)
}

/// Apply `parser` until `terminator` matches, without consuming the
/// terminator. Stops at the end of input as well.
///
/// `parser` must consume input on success.
pub(crate) fn many_till<'src, O>(
    input: &mut Input<'src>,
    mut parser: impl FnMut(&mut Input<'src>) -> IResult<O>,
    mut terminator: impl FnMut(&mut Input<'src>) -> bool,
) -> IResult<Vec<O>> {
    let mut items = Vec::new();
    while !input.is_empty() && !terminator(input) {
        items.push(parser(input)?);
    }
    Ok(items)
}

/// Convert a winnow error into a diagnostic.
///
/// Uses the innermost [`Expected`] context, falling back to an unexpected
/// token at the current offset.
pub(crate) fn into_diagnostic(err: ErrMode<ContextError<Expected>>, input: &Input<'_>) -> Diagnostic {
    let context = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    if let Some(expected) = context.context().next() {
        return expected.to_diagnostic();
    }

    Diagnostic::error(format!("Unexpected {}", found(input)))
        .with_code(ErrorCode::E100)
        .with_label(next_char_span(input), ErrorCode::E100.description())
}
