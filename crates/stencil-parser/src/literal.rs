//! Literal and comment parsers shared by the tokenizer and the grammar.

use winnow::{
    Parser as _,
    ascii::multispace1,
    combinator::{alt, cut_err, repeat, terminated},
    error::ErrMode,
    stream::Stream,
    token::{none_of, one_of, take_while},
};

use stencil_core::{
    Span,
    ast::{Comment, Quote},
};

use crate::{
    combinator::{
        Expected, IResult, Input, backtrack, character, failure, found, is_identifier_char,
        is_identifier_start, next_char_span, offset, rest,
    },
    error::ErrorCode,
};

fn hex_digits<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(0..=6, |c: char| c.is_ascii_hexdigit()).parse_next(input)
}

fn decimal_digits<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn word<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(0.., is_identifier_char).parse_next(input)
}

/// Parse a unicode escape after the backslash: `u{XXXX}` with 1-6 hex digits.
///
/// Commits after `u`; `escape_start` is the offset of the backslash.
fn string_escape_unicode(input: &mut Input<'_>, escape_start: usize) -> IResult<char> {
    let span = |input: &Input<'_>| Span::new(escape_start..offset(input));

    character(input, 'u')?;

    if character(input, '{').is_err() {
        return Err(failure(
            input,
            Expected::new(ErrorCode::E004, "invalid unicode escape", span(input))
                .with_help("use format `\\u{XXXX}` with 1-6 hex digits"),
        ));
    }

    let digits = hex_digits(input)?;
    if digits.is_empty() {
        return Err(failure(
            input,
            Expected::new(ErrorCode::E006, "empty unicode escape", span(input))
                .with_help("provide 1-6 hex digits: `\\u{1F602}`"),
        ));
    }

    if character(input, '}').is_err() {
        return Err(failure(
            input,
            Expected::new(ErrorCode::E004, "invalid unicode escape", span(input))
                .with_help("use format `\\u{XXXX}` with 1-6 hex digits"),
        ));
    }

    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| {
            failure(
                input,
                Expected::new(ErrorCode::E005, "invalid unicode codepoint", span(input))
                    .with_help("valid range: `0x0000`-`0xD7FF` or `0xE000`-`0x10FFFF`"),
            )
        })
}

/// Parse a standard escape character after the backslash.
fn string_escape_char(input: &mut Input<'_>) -> IResult<char> {
    one_of(['n', 'r', 't', 'b', 'f', 'v', '\\', '/', '\'', '"', '0'])
        .map(|c| match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            '0' => '\0',
            other => other,
        })
        .parse_next(input)
}

/// Backslash followed by whitespace is a line continuation.
fn string_escape_whitespace(input: &mut Input<'_>) -> IResult<()> {
    multispace1.void().parse_next(input)
}

/// Parse an escape sequence starting with a backslash.
///
/// A line continuation produces no character.
fn string_escape(input: &mut Input<'_>) -> IResult<Option<char>> {
    let escape_start = offset(input);

    character(input, '\\')?;

    match string_escape_unicode(input, escape_start) {
        Ok(ch) => return Ok(Some(ch)),
        Err(ErrMode::Backtrack(_)) => {}
        Err(e) => return Err(e),
    }

    if let Ok(ch) = string_escape_char(input) {
        return Ok(Some(ch));
    }

    if string_escape_whitespace(input).is_ok() {
        return Ok(None);
    }

    Err(failure(
        input,
        Expected::new(
            ErrorCode::E003,
            "invalid escape sequence",
            Span::new(escape_start..offset(input)),
        )
        .with_help(
            "valid escapes: `\\n`, `\\r`, `\\t`, `\\b`, `\\f`, `\\v`, `\\\\`, `\\/`, `\\'`, `\\\"`, `\\0`, `\\u{}`",
        ),
    ))
}

/// Parse a single- or double-quoted string literal.
///
/// Strings may not span raw line breaks; use `\n` or a line continuation.
pub(crate) fn string_literal(input: &mut Input<'_>) -> IResult<(String, Quote)> {
    let start = offset(input);
    let quote = match rest(input).chars().next() {
        Some('"') => Quote::Double,
        Some('\'') => Quote::Single,
        _ => {
            return Err(backtrack(
                input,
                Expected::new(
                    ErrorCode::E100,
                    format!("String expected ({} found)", found(input)),
                    next_char_span(input),
                ),
            ));
        }
    };
    let q = quote.as_char();
    input.next_token();

    let string_char = none_of([q, '\\', '\n', '\r']).map(Some);
    let string_content = repeat(0.., alt((string_escape, string_char))).fold(
        String::new,
        |mut acc, ch: Option<char>| {
            acc.extend(ch);
            acc
        },
    );

    let result: IResult<String> = cut_err(terminated(string_content, q)).parse_next(input);
    match result {
        Ok(value) => Ok((value, quote)),
        Err(ErrMode::Cut(err)) if err.context().next().is_some() => Err(ErrMode::Cut(err)),
        Err(_) => Err(failure(
            input,
            Expected::new(
                ErrorCode::E001,
                "Unterminated string literal",
                Span::new(start..offset(input)),
            )
            .with_help(if q == '"' {
                "add closing `\"`"
            } else {
                "add closing `'`"
            }),
        )),
    }
}

fn radix_literal(
    input: &mut Input<'_>,
    start: usize,
    radix: u32,
    name: &'static str,
) -> IResult<f64> {
    let digits = word(input)?;
    let valid = !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
    if !valid {
        return Err(failure(
            input,
            Expected::new(
                ErrorCode::E102,
                format!("Invalid {name} literal"),
                Span::new(start..offset(input)),
            ),
        ));
    }
    Ok(digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, digit| acc * f64::from(radix) + f64::from(digit)))
}

/// Parse a numeric literal.
///
/// Accepts `0b`/`0o`/`0x` integers and decimals with optional fraction and
/// exponent (`12`, `12.`, `.5`, `1.2e-3`). A lone `.` is not a number and
/// backtracks; a radix prefix without digits or an exponent without digits
/// fails hard.
pub(crate) fn numeric_literal(input: &mut Input<'_>) -> IResult<f64> {
    let start = offset(input);
    let text = rest(input);

    let prefix = text.get(..2).map(str::to_ascii_lowercase);
    let radix = match prefix.as_deref() {
        Some("0b") => Some((2, "binary")),
        Some("0o") => Some((8, "octal")),
        Some("0x") => Some((16, "hexadecimal")),
        _ => None,
    };
    if let Some((radix, name)) = radix {
        input.next_slice(2);
        return radix_literal(input, start, radix, name);
    }

    let starts_number = text.starts_with(|c: char| c.is_ascii_digit())
        || (text.starts_with('.') && text[1..].starts_with(|c: char| c.is_ascii_digit()));
    if !starts_number {
        return Err(backtrack(
            input,
            Expected::new(
                ErrorCode::E100,
                format!("Number expected ({} found)", found(input)),
                next_char_span(input),
            ),
        ));
    }

    decimal_digits(input)?;
    if rest(input).starts_with('.') {
        input.next_token();
        decimal_digits(input)?;
    }

    if rest(input).starts_with(['e', 'E']) {
        input.next_token();
        if rest(input).starts_with(['+', '-']) {
            input.next_token();
        }
        let exponent = decimal_digits(input)?;
        if exponent.is_empty() {
            return Err(failure(
                input,
                Expected::new(
                    ErrorCode::E102,
                    "Invalid exponent part",
                    Span::new(start..offset(input)),
                ),
            ));
        }
    }

    let end = offset(input);
    let literal = &text[..end - start];
    literal.parse::<f64>().map_err(|_| {
        failure(
            input,
            Expected::new(
                ErrorCode::E102,
                format!("Invalid numeric literal \"{literal}\""),
                Span::new(start..end),
            ),
        )
    })
}

/// Parse an identifier-shaped word: `[A-Za-z_$][A-Za-z0-9_$]*`.
///
/// Reserved words are returned like any other word; callers decide.
pub(crate) fn identifier_name<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    if !rest(input).starts_with(is_identifier_start) {
        return Err(backtrack(
            input,
            Expected::new(
                ErrorCode::E100,
                format!("Identifier expected ({} found)", found(input)),
                next_char_span(input),
            ),
        ));
    }
    take_while(1.., is_identifier_char).parse_next(input)
}

/// Parse a `/* ... */` block comment, keeping its inner text verbatim.
pub(crate) fn comment(input: &mut Input<'_>) -> IResult<Comment> {
    let start = offset(input);
    let text = rest(input);
    if !text.starts_with("/*") {
        return Err(backtrack(
            input,
            Expected::new(
                ErrorCode::E100,
                format!("Comment expected ({} found)", found(input)),
                next_char_span(input),
            ),
        ));
    }

    let Some(len) = text[2..].find("*/") else {
        return Err(failure(
            input,
            Expected::new(ErrorCode::E101, "Missing \"*/\"", Span::new(start..start + 2))
                .with_help("close the comment with `*/`"),
        ));
    };

    input.next_slice(len + 4);
    Ok(Comment {
        body: text[2..2 + len].to_string(),
        span: Span::new(start..offset(input)),
    })
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    /// Decimal literals with optional fraction and exponent.
    fn decimal_literal_strategy() -> impl Strategy<Value = String> {
        (0u32..100_000, proptest::option::of(0u32..1000), proptest::option::of(-5i32..5))
            .prop_map(|(integer, fraction, exponent)| {
                let mut literal = integer.to_string();
                if let Some(fraction) = fraction {
                    literal.push_str(&format!(".{fraction}"));
                }
                if let Some(exponent) = exponent {
                    literal.push_str(&format!("e{exponent}"));
                }
                literal
            })
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Decimal literals agree with the standard library float parser.
    fn check_decimal_literals_parse(literal: &str) -> Result<(), TestCaseError> {
        let mut input = Input::new(literal);
        let parsed = numeric_literal(&mut input);
        prop_assert!(parsed.is_ok(), "Failed to parse `{literal}`: {parsed:?}");
        let expected: f64 = literal.parse().unwrap();
        prop_assert!(approx_eq!(f64, parsed.unwrap(), expected));
        prop_assert!(rest(&input).is_empty());
        Ok(())
    }

    /// Hex literals agree with integer parsing.
    fn check_hex_literals_parse(value: u32) -> Result<(), TestCaseError> {
        let literal = format!("0x{value:x}");
        let mut input = Input::new(&literal);
        let parsed = numeric_literal(&mut input);
        prop_assert!(parsed.is_ok(), "Failed to parse `{literal}`: {parsed:?}");
        prop_assert!(approx_eq!(f64, parsed.unwrap(), f64::from(value)));
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn decimal_literals_parse(literal in decimal_literal_strategy()) {
            check_decimal_literals_parse(&literal)?;
        }

        #[test]
        fn hex_literals_parse(value in any::<u32>()) {
            check_hex_literals_parse(value)?;
        }
    }
}
