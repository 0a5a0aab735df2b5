//! Template tokenizer.
//!
//! [`tokenize`] splits a template into raw text runs and tag regions, and
//! lexes the inside of each tag into literal, identifier, punctuator and
//! comment tokens. The grammar reads characters directly and does not need
//! this pass; it backs token dumps and tooling.
//!
//! Tokenizing recovers from errors: every unclosed tag, unopened tag and bad
//! character is reported in one pass.

use std::fmt;

use winnow::{
    Parser as _,
    combinator::alt,
    error::{ContextError, ErrMode},
    stream::{LocatingSlice, Stream},
};

use stencil_core::{
    Delimiters, Span,
    ast::Quote,
    span::{LineIndex, Position},
    value::format_number,
};

use crate::{
    combinator::{
        Expected, IResult, Input, backtrack, found, next_char_span, offset, rest,
        starts_with_tag, whitespace,
    },
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    literal::{comment, identifier_name, numeric_literal, string_literal},
};

/// Operators and punctuation that may appear inside a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuator {
    Declare,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Increment,
    Decrement,
    Dot,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Comma,
    Pipe,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    Bang,
    Tilde,
}

impl Punctuator {
    /// Every punctuator, longest text first so that matching is greedy.
    pub const ALL: [Punctuator; 27] = [
        Punctuator::Declare,
        Punctuator::Equal,
        Punctuator::NotEqual,
        Punctuator::LessEqual,
        Punctuator::GreaterEqual,
        Punctuator::And,
        Punctuator::Or,
        Punctuator::Increment,
        Punctuator::Decrement,
        Punctuator::Dot,
        Punctuator::OpenBracket,
        Punctuator::CloseBracket,
        Punctuator::OpenParen,
        Punctuator::CloseParen,
        Punctuator::Comma,
        Punctuator::Pipe,
        Punctuator::Question,
        Punctuator::Colon,
        Punctuator::Plus,
        Punctuator::Minus,
        Punctuator::Star,
        Punctuator::Slash,
        Punctuator::Percent,
        Punctuator::Less,
        Punctuator::Greater,
        Punctuator::Bang,
        Punctuator::Tilde,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Punctuator::Declare => ":=",
            Punctuator::Equal => "==",
            Punctuator::NotEqual => "!=",
            Punctuator::LessEqual => "<=",
            Punctuator::GreaterEqual => ">=",
            Punctuator::And => "&&",
            Punctuator::Or => "||",
            Punctuator::Increment => "++",
            Punctuator::Decrement => "--",
            Punctuator::Dot => ".",
            Punctuator::OpenBracket => "[",
            Punctuator::CloseBracket => "]",
            Punctuator::OpenParen => "(",
            Punctuator::CloseParen => ")",
            Punctuator::Comma => ",",
            Punctuator::Pipe => "|",
            Punctuator::Question => "?",
            Punctuator::Colon => ":",
            Punctuator::Plus => "+",
            Punctuator::Minus => "-",
            Punctuator::Star => "*",
            Punctuator::Slash => "/",
            Punctuator::Percent => "%",
            Punctuator::Less => "<",
            Punctuator::Greater => ">",
            Punctuator::Bang => "!",
            Punctuator::Tilde => "~",
        }
    }

    /// Token type name used in dumps.
    pub fn name(self) -> &'static str {
        match self {
            Punctuator::Dot => "DOT",
            Punctuator::OpenBracket => "OPEN_BRACKET",
            Punctuator::CloseBracket => "CLOSE_BRACKET",
            Punctuator::OpenParen => "OPEN_PAREN",
            Punctuator::CloseParen => "CLOSE_PAREN",
            Punctuator::Comma => "COMMA",
            Punctuator::Pipe => "PIPE",
            Punctuator::Declare => "DECLARE",
            _ => "OPERATOR",
        }
    }
}

impl fmt::Display for Punctuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Raw text outside of any tag.
    Text(String),
    OpenTag { trim: bool },
    CloseTag { trim: bool },
    /// A block comment; holds the text between `/*` and `*/`.
    Comment(String),
    Null,
    Undefined,
    Boolean(bool),
    String { value: String, quote: Quote },
    Number(f64),
    /// Any other word, including keywords such as `if` and `end`.
    Ident(String),
    Punct(Punctuator),
    Eof,
}

impl TokenKind {
    /// Token type name used in dumps.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Text(_) => "TEXT",
            TokenKind::OpenTag { .. } => "OPEN_TAG",
            TokenKind::CloseTag { .. } => "CLOSE_TAG",
            TokenKind::Comment(_) => "COMMENT",
            TokenKind::Null => "NULL",
            TokenKind::Undefined => "UNDEFINED",
            TokenKind::Boolean(_) => "BOOLEAN",
            TokenKind::String { .. } => "STRING",
            TokenKind::Number(_) => "NUMBER",
            TokenKind::Ident(_) => "IDENT",
            TokenKind::Punct(punct) => punct.name(),
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            TokenKind::Text(text) => write!(f, " {text:?}"),
            TokenKind::OpenTag { trim: true } | TokenKind::CloseTag { trim: true } => {
                f.write_str(" trim")
            }
            TokenKind::Comment(body) => write!(f, " {body:?}"),
            TokenKind::Boolean(value) => write!(f, " {value}"),
            TokenKind::String { value, quote } => {
                let q = quote.as_char();
                write!(f, " {q}{}{q}", value.escape_debug())
            }
            TokenKind::Number(value) => write!(f, " {}", format_number(*value)),
            TokenKind::Ident(name) => write!(f, " {name}"),
            TokenKind::Punct(punct) => write!(f, " {punct}"),
            _ => Ok(()),
        }
    }
}

/// A token with its byte span and 1-based line/column bounds.
///
/// `end` is the position just past the last character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub start: Position,
    pub end: Position,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} {}", self.start, self.end, self.kind)
    }
}

fn punctuator(input: &mut Input<'_>) -> IResult<Punctuator> {
    let text = rest(input);
    match Punctuator::ALL.iter().find(|punct| text.starts_with(punct.as_str())) {
        Some(&punct) => {
            input.next_slice(punct.as_str().len());
            Ok(punct)
        }
        None => Err(backtrack(
            input,
            Expected::new(
                ErrorCode::E002,
                format!("Unexpected character {}", found(input)),
                next_char_span(input),
            ),
        )),
    }
}

fn word_token(input: &mut Input<'_>) -> IResult<TokenKind> {
    let word = identifier_name(input)?;
    Ok(match word {
        "null" => TokenKind::Null,
        "undefined" => TokenKind::Undefined,
        "true" => TokenKind::Boolean(true),
        "false" => TokenKind::Boolean(false),
        name => TokenKind::Ident(name.to_string()),
    })
}

/// Lex one token inside a tag.
fn tag_token(input: &mut Input<'_>) -> IResult<TokenKind> {
    alt((
        comment.map(|comment| TokenKind::Comment(comment.body)),
        string_literal.map(|(value, quote)| TokenKind::String { value, quote }),
        numeric_literal.map(TokenKind::Number),
        word_token,
        punctuator.map(TokenKind::Punct),
    ))
    .parse_next(input)
}

/// Tokenizer state: the tokens so far, collected diagnostics and the span of
/// the open delimiter of the tag being lexed, if any.
struct Lexer<'t> {
    tags: &'t Delimiters,
    tokens: Vec<(TokenKind, Span)>,
    diagnostics: DiagnosticCollector,
    open_tag: Option<Span>,
}

impl<'t> Lexer<'t> {
    fn new(tags: &'t Delimiters) -> Self {
        Self {
            tags,
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
            open_tag: None,
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, input: &Input<'_>) {
        self.tokens.push((kind, Span::new(start..offset(input))));
    }

    fn tokenize(&mut self, mut input: Input<'_>) {
        while !input.is_empty() {
            if self.open_tag.is_some() {
                self.inside_tag(&mut input);
            } else {
                self.outside_tag(&mut input);
            }
        }

        if let Some(open) = self.open_tag.take() {
            self.diagnostics.emit(unclosed_tag(open));
        }
        let end = offset(&input);
        self.tokens.push((TokenKind::Eof, Span::new(end..end)));
    }

    fn open(&mut self, input: &mut Input<'_>) {
        let start = offset(input);
        input.next_slice(self.tags.open().len());
        let trim = rest(input).starts_with('-');
        if trim {
            input.next_token();
        }
        self.push(TokenKind::OpenTag { trim }, start, input);
        self.open_tag = Some(Span::new(start..offset(input)));
    }

    fn outside_tag(&mut self, input: &mut Input<'_>) {
        let start = offset(input);
        let text = rest(input);

        if starts_with_tag(text, self.tags.open()) {
            self.open(input);
            return;
        }

        if starts_with_tag(text, self.tags.close()) {
            input.next_slice(self.tags.close().len());
            let span = Span::new(start..offset(input));
            self.diagnostics.emit(
                Diagnostic::error("Unopened tag")
                    .with_code(ErrorCode::E008)
                    .with_label(span, ErrorCode::E008.description())
                    .with_help("escape the delimiter inside a string, or add the opening delimiter"),
            );
            return;
        }

        let len = [self.tags.open(), self.tags.close()]
            .into_iter()
            .filter(|tag| !tag.is_empty())
            .filter_map(|tag| text.find(tag))
            .min()
            .unwrap_or(text.len());
        input.next_slice(len);
        self.push(TokenKind::Text(text[..len].to_string()), start, input);
    }

    fn at_trimmed_close(&self, text: &str) -> bool {
        text.starts_with('-') && starts_with_tag(&text[1..], self.tags.close())
    }

    fn inside_tag(&mut self, input: &mut Input<'_>) {
        // Whitespace only separates tokens; it cannot fail.
        let _ = whitespace(input);
        if input.is_empty() {
            return;
        }

        let start = offset(input);
        let text = rest(input);

        if starts_with_tag(text, self.tags.open()) {
            if let Some(open) = self.open_tag {
                self.diagnostics.emit(unclosed_tag(open));
            }
            self.open(input);
            return;
        }

        let close = self.tags.close();
        let trim = self.at_trimmed_close(text);
        if trim || starts_with_tag(text, close) {
            input.next_slice(close.len() + usize::from(trim));
            self.push(TokenKind::CloseTag { trim }, start, input);
            self.open_tag = None;
            return;
        }

        // A `-` right before the close delimiter always trims, so `a--}}`
        // is `a`, `-` and a trimmed close.
        if text.starts_with("--") && self.at_trimmed_close(&text[1..]) {
            input.next_token();
            self.push(TokenKind::Punct(Punctuator::Minus), start, input);
            return;
        }

        match tag_token(input) {
            Ok(kind) => self.push(kind, start, input),
            Err(err) => {
                let diagnostic = Self::convert_err_mode(err, input);
                self.diagnostics.emit(diagnostic);

                // Skip the offending character when nothing was consumed.
                if offset(input) == start {
                    input.next_token();
                }
            }
        }
    }

    /// Convert a literal parser failure into a diagnostic, falling back to an
    /// unexpected character at the current position.
    fn convert_err_mode(
        err: ErrMode<ContextError<Expected>>,
        input: &Input<'_>,
    ) -> Diagnostic {
        let context = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        match context.context().next() {
            Some(expected) if expected.code != ErrorCode::E100 => expected.to_diagnostic(),
            _ => Diagnostic::error(format!("Unexpected character {}", found(input)))
                .with_code(ErrorCode::E002)
                .with_label(next_char_span(input), ErrorCode::E002.description()),
        }
    }

    /// Finish lexing and return tokens or collected errors.
    fn finish(self, source: &str) -> Result<Vec<Token>, ParseError> {
        self.diagnostics.finish()?;
        let index = LineIndex::new(source);
        Ok(self
            .tokens
            .into_iter()
            .map(|(kind, span)| Token {
                kind,
                span,
                start: index.position(span.start()),
                end: index.position(span.end()),
            })
            .collect())
    }
}

fn unclosed_tag(open: Span) -> Diagnostic {
    Diagnostic::error("Unclosed tag")
        .with_code(ErrorCode::E007)
        .with_label(open, ErrorCode::E007.description())
        .with_help("add the closing delimiter")
}

/// Tokenize a template, collecting every error in one pass.
///
/// # Returns
///
/// - `Ok(tokens)` - the token stream, always terminated by [`TokenKind::Eof`]
/// - `Err(ParseError)` - one or more errors; contains all diagnostics
pub fn tokenize(source: &str, tags: &Delimiters) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(tags);
    lexer.tokenize(LocatingSlice::new(source));
    lexer.finish(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, &Delimiters::default())
            .unwrap_or_else(|e| panic!("`{source}` failed: {e}"))
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn test_text_and_tag() {
        assert_eq!(
            kinds("Hello {{ name }}!"),
            vec![
                TokenKind::Text("Hello ".to_string()),
                TokenKind::OpenTag { trim: false },
                ident("name"),
                TokenKind::CloseTag { trim: false },
                TokenKind::Text("!".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_plain_text_only() {
        assert_eq!(
            kinds("no tags here"),
            vec![TokenKind::Text("no tags here".to_string()), TokenKind::Eof]
        );
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(
            kinds("{{- a -}}"),
            vec![
                TokenKind::OpenTag { trim: true },
                ident("a"),
                TokenKind::CloseTag { trim: true },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_minus_before_spaced_close_is_operator() {
        assert_eq!(
            kinds("{{ a - b }}"),
            vec![
                TokenKind::OpenTag { trim: false },
                ident("a"),
                TokenKind::Punct(Punctuator::Minus),
                ident("b"),
                TokenKind::CloseTag { trim: false },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_minus_touching_close_trims() {
        assert_eq!(
            kinds("{{ a-}}"),
            vec![
                TokenKind::OpenTag { trim: false },
                ident("a"),
                TokenKind::CloseTag { trim: true },
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("{{ a--}}"),
            vec![
                TokenKind::OpenTag { trim: false },
                ident("a"),
                TokenKind::Punct(Punctuator::Minus),
                TokenKind::CloseTag { trim: true },
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("{{ a-- }}"),
            vec![
                TokenKind::OpenTag { trim: false },
                ident("a"),
                TokenKind::Punct(Punctuator::Decrement),
                TokenKind::CloseTag { trim: false },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_delimiter_inside_string() {
        assert_eq!(
            kinds("{{ \"}}\" }}"),
            vec![
                TokenKind::OpenTag { trim: false },
                TokenKind::String {
                    value: "}}".to_string(),
                    quote: Quote::Double,
                },
                TokenKind::CloseTag { trim: false },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literal_tokens() {
        assert_eq!(
            kinds("{{ null undefined true false 0xff 'x' }}"),
            vec![
                TokenKind::OpenTag { trim: false },
                TokenKind::Null,
                TokenKind::Undefined,
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Number(255.0),
                TokenKind::String {
                    value: "x".to_string(),
                    quote: Quote::Single,
                },
                TokenKind::CloseTag { trim: false },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_identifiers() {
        assert_eq!(kinds("{{ if }}")[1], ident("if"));
        assert_eq!(kinds("{{ nulll }}")[1], ident("nulll"));
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("{{ a:=b<=c&&!d++ }}"),
            vec![
                TokenKind::OpenTag { trim: false },
                ident("a"),
                TokenKind::Punct(Punctuator::Declare),
                ident("b"),
                TokenKind::Punct(Punctuator::LessEqual),
                ident("c"),
                TokenKind::Punct(Punctuator::And),
                TokenKind::Punct(Punctuator::Bang),
                ident("d"),
                TokenKind::Punct(Punctuator::Increment),
                TokenKind::CloseTag { trim: false },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_token() {
        assert_eq!(
            kinds("{{ /* hi */ }}")[1],
            TokenKind::Comment(" hi ".to_string())
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let tokens = tokenize("a <%- x %> b", &Delimiters::new("<%", "%>")).unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Text("a ".to_string()),
                TokenKind::OpenTag { trim: true },
                ident("x"),
                TokenKind::CloseTag { trim: false },
                TokenKind::Text(" b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n{{ b }}", &Delimiters::default()).unwrap();
        let b = &tokens[2];
        assert_eq!(b.kind, ident("b"));
        assert_eq!(b.span, Span::new(5..6));
        assert_eq!(b.start, Position { line: 2, column: 4 });
        assert_eq!(b.end, Position { line: 2, column: 5 });
    }

    #[test]
    fn test_token_display() {
        let tokens = tokenize("{{ \"x\" }}", &Delimiters::default()).unwrap();
        assert_eq!(tokens[0].to_string(), "1:1-1:3 OPEN_TAG");
        assert_eq!(tokens[1].to_string(), "1:4-1:7 STRING \"x\"");
    }

    mod lexer_error_tests {
        use super::*;

        fn errors(source: &str) -> Vec<Diagnostic> {
            tokenize(source, &Delimiters::default())
                .expect_err("should fail")
                .diagnostics()
                .to_vec()
        }

        #[test]
        fn test_unclosed_tag_at_end() {
            let errors = errors("text {{ a");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code(), Some(ErrorCode::E007));
            assert_eq!(errors[0].primary_span(), Some(Span::new(5..7)));
        }

        #[test]
        fn test_unclosed_tag_before_next_open() {
            let errors = errors("{{ a {{ b }}");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code(), Some(ErrorCode::E007));
            assert_eq!(errors[0].primary_span(), Some(Span::new(0..2)));
        }

        #[test]
        fn test_unopened_tag() {
            let errors = errors("a }} b");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code(), Some(ErrorCode::E008));
            assert_eq!(errors[0].primary_span(), Some(Span::new(2..4)));
        }

        #[test]
        fn test_unexpected_character() {
            let errors = errors("{{ # }}");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code(), Some(ErrorCode::E002));
            assert_eq!(errors[0].primary_span(), Some(Span::new(3..4)));
        }

        #[test]
        fn test_invalid_number() {
            let errors = errors("{{ 0x }}");
            assert_eq!(errors[0].code(), Some(ErrorCode::E102));
        }

        #[test]
        fn test_collects_multiple_errors() {
            let errors = errors("}} {{ # @ }}");
            let codes: Vec<_> = errors.iter().filter_map(Diagnostic::code).collect();
            assert_eq!(codes, vec![ErrorCode::E008, ErrorCode::E002, ErrorCode::E002]);
        }
    }
}
