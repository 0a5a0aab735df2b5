//! Statement and expression grammar.
//!
//! The grammar reads template characters directly and builds the
//! [`Program`] AST. Parsing stops at the first error; constructs that have
//! been recognised beyond doubt (an `if` keyword, an operator, an opening
//! bracket) report a hard failure rather than letting an alternative be
//! tried.
//!
//! Expression precedence, loosest first:
//!
//! ```text
//! pipe         a | fn b
//! command      fn a b
//! conditional  a ? b : c
//! logical      ||  then  &&
//! equality     ==  !=
//! relational   <  >  <=  >=
//! additive     +  -
//! multiplicative  *  /  %
//! unary        + - ~ !
//! update       ++a  a--
//! lhs          a.b  a[b]  a(b)
//! primary      literals, identifiers, (a), [a, b]
//! ```

use std::cell::Cell;

use log::trace;
use winnow::{
    Parser as _,
    error::{ContextError, ErrMode},
    stream::Stream,
    token::take_while,
};

use stencil_core::{
    Delimiters, Span,
    ast::{
        BinaryOperator, Comment, Expression, ExpressionKind, ForStatement, Identifier, IfAlternate,
        IfStatement, LogicalOperator, Program, RawTemplate, Statement, Tag, TagKind, TagTemplate,
        TemplateElement, UnaryOperator, UpdateOperator, VariableStatement,
    },
};

use crate::{
    combinator::{
        Expected, IResult, Input, backtrack, character, cut_with, expected, failure, found,
        into_diagnostic, is_identifier_char, is_identifier_start, keyword, lookahead, many_till,
        next_char_span, offset, rest, starts_with_tag, text, whitespace,
    },
    error::{ErrorCode, ParseError},
    literal::{comment, identifier_name, numeric_literal, string_literal},
};

/// Words that can never be used as identifiers.
pub const RESERVED_WORDS: [&str; 10] = [
    "null",
    "undefined",
    "true",
    "false",
    "if",
    "else",
    "for",
    "break",
    "continue",
    "end",
];

/// Whether `word` is one of the [`RESERVED_WORDS`].
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

/// An infix operator at one precedence level.
#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

impl Infix {
    fn build(self, left: Expression, right: Expression) -> ExpressionKind {
        let (left, right) = (Box::new(left), Box::new(right));
        match self {
            Infix::Binary(operator) => ExpressionKind::Binary {
                left,
                operator,
                right,
            },
            Infix::Logical(operator) => ExpressionKind::Logical {
                left,
                operator,
                right,
            },
        }
    }
}

const LOGICAL_OR: &[(&str, Infix)] = &[("||", Infix::Logical(LogicalOperator::Or))];
const LOGICAL_AND: &[(&str, Infix)] = &[("&&", Infix::Logical(LogicalOperator::And))];
const EQUALITY: &[(&str, Infix)] = &[
    ("==", Infix::Binary(BinaryOperator::Equal)),
    ("!=", Infix::Binary(BinaryOperator::NotEqual)),
];
const RELATIONAL: &[(&str, Infix)] = &[
    ("<=", Infix::Binary(BinaryOperator::LessEqual)),
    (">=", Infix::Binary(BinaryOperator::GreaterEqual)),
    ("<", Infix::Binary(BinaryOperator::Less)),
    (">", Infix::Binary(BinaryOperator::Greater)),
];
const ADDITIVE: &[(&str, Infix)] = &[
    ("+", Infix::Binary(BinaryOperator::Add)),
    ("-", Infix::Binary(BinaryOperator::Subtract)),
];
const MULTIPLICATIVE: &[(&str, Infix)] = &[
    ("*", Infix::Binary(BinaryOperator::Multiply)),
    ("/", Infix::Binary(BinaryOperator::Divide)),
    ("%", Infix::Binary(BinaryOperator::Remainder)),
];

fn digits<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

/// Whitespace and block comments.
fn trivia(input: &mut Input<'_>) -> IResult<Vec<Comment>> {
    let mut comments = Vec::new();
    loop {
        whitespace(input)?;
        if !rest(input).starts_with("/*") {
            return Ok(comments);
        }
        comments.push(comment(input)?);
    }
}

/// The identifier-shaped word at the current position, without consuming it.
fn peek_word<'src>(input: &Input<'src>) -> Option<&'src str> {
    let text = rest(input);
    if !text.starts_with(is_identifier_start) {
        return None;
    }
    let len = text.find(|c| !is_identifier_char(c)).unwrap_or(text.len());
    Some(&text[..len])
}

fn reserved_word(word: &str, span: Span) -> Expected {
    Expected::new(
        ErrorCode::E103,
        format!("\"{word}\" is a reserved word"),
        span,
    )
    .with_help("reserved words cannot be used as variable names")
}

/// Deepest allowed nesting of blocks, brackets and prefix operators.
pub const MAX_NESTING: u32 = 32;

/// Parser state shared by every production.
struct Grammar<'t> {
    tags: &'t Delimiters,
    /// Number of enclosing `for` bodies; `break` and `continue` need one.
    loop_depth: Cell<u32>,
    /// Number of enclosing block bodies and unary expressions.
    depth: Cell<u32>,
}

impl<'t> Grammar<'t> {
    fn new(tags: &'t Delimiters) -> Self {
        Self {
            tags,
            loop_depth: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<'src, T>(
        &self,
        input: &mut Input<'src>,
        parse: impl FnOnce(&mut Input<'src>) -> IResult<T>,
    ) -> IResult<T> {
        if self.depth.get() >= MAX_NESTING {
            return Err(failure(
                input,
                Expected::new(
                    ErrorCode::E106,
                    format!("Nesting is deeper than {MAX_NESTING} levels"),
                    next_char_span(input),
                )
                .with_help("split the expression with variables or move blocks into helpers"),
            ));
        }
        self.depth.set(self.depth.get() + 1);
        let result = parse(input);
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn missing_close(&self) -> String {
        format!("Missing \"{}\"", self.tags.close())
    }

    /// Whether `text` starts with a close delimiter, with or without trim.
    fn at_close(&self, text: &str) -> bool {
        let close = self.tags.close();
        starts_with_tag(text, close) || (text.starts_with('-') && starts_with_tag(&text[1..], close))
    }

    // ===================
    // Template structure
    // ===================

    fn template(&self, input: &mut Input<'_>) -> IResult<Vec<TemplateElement>> {
        many_till(input, |i| self.element(i), |_| false)
    }

    fn element(&self, input: &mut Input<'_>) -> IResult<TemplateElement> {
        if starts_with_tag(rest(input), self.tags.open()) {
            self.tag_template(input).map(TemplateElement::Tag)
        } else {
            Ok(TemplateElement::Raw(self.raw(input)))
        }
    }

    /// Text up to the next open delimiter. A close delimiter here is text.
    fn raw(&self, input: &mut Input<'_>) -> RawTemplate {
        let start = offset(input);
        let text = rest(input);
        let open = self.tags.open();
        let len = if open.is_empty() {
            text.len()
        } else {
            text.find(open).unwrap_or(text.len())
        };
        input.next_slice(len);
        RawTemplate {
            value: text[..len].to_string(),
            span: Span::new(start..offset(input)),
        }
    }

    fn open_tag(&self, input: &mut Input<'_>) -> IResult<Tag> {
        let start = offset(input);
        text(input, self.tags.open())?;
        let trim = character(input, '-').is_ok();
        let span = Span::new(start..offset(input));
        let comments = trivia(input)?;
        Ok(Tag {
            kind: TagKind::Open,
            delimiter: self.tags.open().to_string(),
            trim,
            comments,
            span,
        })
    }

    fn close_tag(&self, input: &mut Input<'_>) -> IResult<Tag> {
        let comments = trivia(input)?;
        let start = offset(input);
        let text = rest(input);
        let close = self.tags.close();
        let trim = text.starts_with('-') && starts_with_tag(&text[1..], close);
        if !trim && !starts_with_tag(text, close) {
            return Err(backtrack(
                input,
                Expected::new(
                    ErrorCode::E101,
                    format!("\"{close}\" expected ({} found)", found(input)),
                    next_char_span(input),
                ),
            ));
        }
        input.next_slice(close.len() + usize::from(trim));
        Ok(Tag {
            kind: TagKind::Close,
            delimiter: close.to_string(),
            trim,
            comments,
            span: Span::new(start..offset(input)),
        })
    }

    fn tag_template(&self, input: &mut Input<'_>) -> IResult<TagTemplate> {
        let start = offset(input);
        let open = self.open_tag(input)?;
        let statement = self.statement(input)?;
        let close = cut_with(input, self.missing_close(), |i| self.close_tag(i))?;
        Ok(TagTemplate {
            open,
            statement,
            close,
            span: Span::new(start..offset(input)),
        })
    }

    /// Whether the input is at an open tag whose first word is one of
    /// `keywords`.
    fn at_block_keyword(&self, input: &mut Input<'_>, keywords: &[&str]) -> bool {
        lookahead(input, |i| {
            self.open_tag(i)?;
            match peek_word(i) {
                Some(word) if keywords.contains(&word) => Ok(()),
                _ => Err(backtrack(
                    i,
                    Expected::new(ErrorCode::E100, "block keyword", next_char_span(i)),
                )),
            }
        })
    }

    /// Elements of a block body, up to an `else`/`end` tag named in `stop`
    /// or the end of input.
    fn body(&self, input: &mut Input<'_>, stop: &[&str]) -> IResult<Vec<TemplateElement>> {
        self.nested(input, |input| {
            many_till(input, |i| self.element(i), |i| self.at_block_keyword(i, stop))
        })
    }

    fn missing_end(&self, input: &Input<'_>, span: Span) -> ErrMode<ContextError<Expected>> {
        failure(
            input,
            Expected::new(
                ErrorCode::E101,
                format!("Missing \"{} end {}\"", self.tags.open(), self.tags.close()),
                span,
            )
            .with_help("close the block with an `end` tag"),
        )
    }

    // ===================
    // Statements
    // ===================

    fn statement(&self, input: &mut Input<'_>) -> IResult<Option<Statement>> {
        if self.at_close(rest(input)) {
            return Ok(None);
        }

        if let Some(variable) = self.variable_statement(input)? {
            return Ok(Some(Statement::Variable(variable)));
        }

        let start = offset(input);
        match peek_word(input) {
            Some("if") => self.if_statement(input).map(Statement::If).map(Some),
            Some("for") => self.for_statement(input).map(Statement::For).map(Some),
            Some(word @ ("break" | "continue")) => {
                input.next_slice(word.len());
                let span = Span::new(start..offset(input));
                if self.loop_depth.get() == 0 {
                    return Err(failure(
                        input,
                        Expected::new(
                            ErrorCode::E105,
                            format!("\"{word}\" can only be used inside a \"for\" loop"),
                            span,
                        ),
                    ));
                }
                Ok(Some(if word == "break" {
                    Statement::Break(span)
                } else {
                    Statement::Continue(span)
                }))
            }
            Some(word @ ("else" | "end")) => Err(failure(
                input,
                Expected::new(
                    ErrorCode::E100,
                    format!("Unexpected \"{word}\""),
                    Span::new(start..start + word.len()),
                )
                .with_help("`else` and `end` must close an `if` or `for` block"),
            )),
            _ => self.pipe(input).map(Statement::Expression).map(Some),
        }
    }

    /// `name := value`. Returns `None`, consuming nothing, when the input
    /// does not start with a name followed by `:=`.
    fn variable_statement(&self, input: &mut Input<'_>) -> IResult<Option<VariableStatement>> {
        let checkpoint = input.checkpoint();
        let start = offset(input);
        let Ok(name) = identifier_name(input) else {
            input.reset(&checkpoint);
            return Ok(None);
        };
        let name_span = Span::new(start..offset(input));

        whitespace(input)?;
        if !rest(input).starts_with(":=") {
            input.reset(&checkpoint);
            return Ok(None);
        }
        if is_reserved(name) {
            return Err(failure(input, reserved_word(name, name_span)));
        }
        input.next_slice(2);

        let value = cut_with(input, "Missing expression after \":=\"", |i| self.pipe(i))?;
        Ok(Some(VariableStatement {
            name: Identifier {
                name: name.to_string(),
                span: name_span,
            },
            span: name_span.union(value.span),
            value,
        }))
    }

    fn if_statement(&self, input: &mut Input<'_>) -> IResult<IfStatement> {
        let start = offset(input);
        keyword(input, "if")?;
        let keyword_span = Span::new(start..offset(input));

        let test = cut_with(input, "Missing expression after \"if\"", |i| self.pipe(i))?;
        let if_close = cut_with(input, self.missing_close(), |i| self.close_tag(i))?;
        let consequent = self.body(input, &["else", "end"])?;
        if input.is_empty() {
            return Err(self.missing_end(input, keyword_span));
        }

        let tag = self.open_tag(input)?;
        let alternate = if keyword(input, "end").is_ok() {
            IfAlternate::End { end_open: tag }
        } else {
            keyword(input, "else")?;
            whitespace(input)?;
            if peek_word(input) == Some("if") {
                IfAlternate::ElseIf {
                    else_open: tag,
                    statement: Box::new(self.if_statement(input)?),
                }
            } else {
                let else_close = cut_with(input, self.missing_close(), |i| self.close_tag(i))?;
                let body = self.body(input, &["end"])?;
                if input.is_empty() {
                    return Err(self.missing_end(input, keyword_span));
                }
                let end_open = self.open_tag(input)?;
                keyword(input, "end")?;
                IfAlternate::Else {
                    else_open: tag,
                    else_close,
                    body,
                    end_open,
                }
            }
        };

        Ok(IfStatement {
            test,
            if_close,
            consequent,
            alternate,
            span: Span::new(start..offset(input)),
        })
    }

    fn binding(&self, input: &mut Input<'_>) -> IResult<Identifier> {
        let start = offset(input);
        let name = identifier_name(input)?;
        let span = Span::new(start..offset(input));
        if is_reserved(name) {
            return Err(failure(input, reserved_word(name, span)));
        }
        Ok(Identifier {
            name: name.to_string(),
            span,
        })
    }

    fn for_statement(&self, input: &mut Input<'_>) -> IResult<ForStatement> {
        let start = offset(input);
        keyword(input, "for")?;
        let keyword_span = Span::new(start..offset(input));

        whitespace(input)?;
        let value = cut_with(input, "Missing loop variable after \"for\"", |i| {
            self.binding(i)
        })?;
        whitespace(input)?;
        let index = if character(input, ',').is_ok() {
            whitespace(input)?;
            let index = cut_with(input, "Missing index variable after \",\"", |i| {
                self.binding(i)
            })?;
            whitespace(input)?;
            Some(index)
        } else {
            None
        };

        cut_with(input, "Missing \"in\" after loop variable", |i| {
            keyword(i, "in")
        })?;
        let iterable = cut_with(input, "Missing iterable after \"in\"", |i| self.pipe(i))?;
        let for_close = cut_with(input, self.missing_close(), |i| self.close_tag(i))?;

        self.loop_depth.set(self.loop_depth.get() + 1);
        let body = self.body(input, &["end"]);
        self.loop_depth.set(self.loop_depth.get() - 1);
        let body = body?;

        if input.is_empty() {
            return Err(self.missing_end(input, keyword_span));
        }
        let end_open = self.open_tag(input)?;
        keyword(input, "end")?;

        Ok(ForStatement {
            value,
            index,
            iterable,
            for_close,
            body,
            end_open,
            span: Span::new(start..offset(input)),
        })
    }

    // ===================
    // Expressions
    // ===================

    /// `head (| segment)*`, where each segment becomes a call whose first
    /// argument is the result so far: `a | b "x" | c` is `c(b(a, "x"))`.
    fn pipe(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let mut expr = self.command(input)?;

        loop {
            let text = rest(input);
            if !text.starts_with('|') || text.starts_with("||") || self.at_close(text) {
                return Ok(expr);
            }
            input.next_token();

            let leading = trivia(input)?;
            let mut segment = cut_with(input, "Missing expression after \"|\"", |i| self.lhs(i))?;
            segment.comments.leading = leading;
            segment.comments.trailing = trivia(input)?;
            let extra = self.arguments(input)?;

            let end = extra.last().map_or(segment.span.end(), |arg| arg.span.end());
            let span = Span::new(expr.span.start()..end);
            let plain_call = segment.comments.is_empty()
                && matches!(segment.kind, ExpressionKind::Call { pipe: false, .. });
            let (callee, mut arguments) = match segment.kind {
                ExpressionKind::Call {
                    callee, arguments, ..
                } if plain_call => (callee, arguments),
                kind => (
                    Box::new(Expression {
                        kind,
                        span: segment.span,
                        comments: segment.comments,
                    }),
                    Vec::new(),
                ),
            };

            arguments.insert(0, expr);
            arguments.extend(extra);
            expr = Expression::new(
                ExpressionKind::Call {
                    callee,
                    arguments,
                    pipe: true,
                },
                span,
            );
        }
    }

    /// A bare helper followed by space-separated arguments: `fn a b`.
    fn command(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let head = self.conditional(input)?;
        let callable = matches!(
            head.kind,
            ExpressionKind::Identifier(_)
                | ExpressionKind::Member { .. }
                | ExpressionKind::Call { pipe: false, .. }
        );
        if !callable || !self.at_argument_start(rest(input)) {
            return Ok(head);
        }

        let extra = self.arguments(input)?;
        let end = extra.last().map_or(head.span.end(), |arg| arg.span.end());
        let span = Span::new(head.span.start()..end);
        let plain_call = head.comments.is_empty()
            && matches!(head.kind, ExpressionKind::Call { pipe: false, .. });
        let kind = match head.kind {
            ExpressionKind::Call {
                callee,
                mut arguments,
                ..
            } if plain_call => {
                arguments.extend(extra);
                ExpressionKind::Call {
                    callee,
                    arguments,
                    pipe: false,
                }
            }
            kind => ExpressionKind::Call {
                callee: Box::new(Expression {
                    kind,
                    span: head.span,
                    comments: head.comments,
                }),
                arguments: extra,
                pipe: false,
            },
        };
        Ok(Expression::new(kind, span))
    }

    /// Whether `text` can start a command argument.
    fn at_argument_start(&self, text: &str) -> bool {
        if self.at_close(text) {
            return false;
        }
        let mut chars = text.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        let second = chars.next();
        match first {
            c if is_identifier_start(c) || c.is_ascii_digit() => true,
            '.' => second.is_some_and(|c| c.is_ascii_digit()),
            '"' | '\'' | '(' | '[' | '~' => true,
            '!' => second != Some('='),
            '+' | '-' => true,
            _ => false,
        }
    }

    /// Unary-level arguments separated by whitespace.
    fn arguments(&self, input: &mut Input<'_>) -> IResult<Vec<Expression>> {
        let mut arguments = Vec::new();
        while self.at_argument_start(rest(input)) {
            let checkpoint = input.checkpoint();
            match self.unary(input) {
                Ok(argument) => arguments.push(argument),
                Err(ErrMode::Backtrack(_)) => {
                    input.reset(&checkpoint);
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(arguments)
    }

    fn conditional(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let test = self.logical_or(input)?;
        if !rest(input).starts_with('?') {
            return Ok(test);
        }
        input.next_token();

        let consequent = cut_with(input, "Missing expression after \"?\"", |i| {
            self.conditional(i)
        })?;
        cut_with(input, "Missing \":\" in conditional expression", |i| {
            character(i, ':')
        })?;
        let alternate = cut_with(input, "Missing expression after \":\"", |i| {
            self.conditional(i)
        })?;

        let span = test.span.union(alternate.span);
        Ok(Expression::new(
            ExpressionKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    /// Match one of `operators` at the current position.
    ///
    /// Never matches text that starts a close delimiter, so `-}}` stays a
    /// trimmed close and custom delimiters such as `%>` are not split.
    fn infix_operator(
        &self,
        input: &mut Input<'_>,
        operators: &[(&'static str, Infix)],
    ) -> Option<(&'static str, Infix)> {
        let text = rest(input);
        if self.at_close(text) || text.starts_with("/*") {
            return None;
        }
        let &(symbol, infix) = operators
            .iter()
            .find(|(symbol, _)| text.starts_with(symbol))?;
        input.next_slice(symbol.len());
        Some((symbol, infix))
    }

    /// A left-associative chain of `operand (op operand)*`.
    fn infix<'src>(
        &self,
        input: &mut Input<'src>,
        operators: &[(&'static str, Infix)],
        operand: impl Fn(&Self, &mut Input<'src>) -> IResult<Expression>,
    ) -> IResult<Expression> {
        let mut left = operand(self, input)?;
        while let Some((symbol, infix)) = self.infix_operator(input, operators) {
            let right = cut_with(input, format!("Missing expression after \"{symbol}\""), |i| {
                operand(self, i)
            })?;
            let span = left.span.union(right.span);
            left = Expression::new(infix.build(left, right), span);
        }
        Ok(left)
    }

    fn logical_or(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, LOGICAL_OR, Self::logical_and)
    }

    fn logical_and(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, LOGICAL_AND, Self::equality)
    }

    fn equality(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, EQUALITY, Self::relational)
    }

    fn relational(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, RELATIONAL, Self::additive)
    }

    fn additive(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, ADDITIVE, Self::multiplicative)
    }

    fn multiplicative(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.infix(input, MULTIPLICATIVE, Self::unary)
    }

    /// Every parenthesis, bracket and prefix operator passes through here,
    /// so this is where expression nesting is bounded.
    fn unary(&self, input: &mut Input<'_>) -> IResult<Expression> {
        self.nested(input, |i| self.prefixed(i))
    }

    /// `+ - ~ !` prefixes, with the comments written before the operand.
    fn prefixed(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let leading = trivia(input)?;
        let start = offset(input);
        let text = rest(input);

        let operator = if text.starts_with("++") || text.starts_with("--") {
            None
        } else if text.starts_with('+') {
            Some(UnaryOperator::Plus)
        } else if text.starts_with('-') && !self.at_close(text) {
            Some(UnaryOperator::Minus)
        } else if text.starts_with('~') {
            Some(UnaryOperator::BitNot)
        } else if text.starts_with('!') && !text.starts_with("!=") {
            Some(UnaryOperator::Not)
        } else {
            None
        };

        let mut expr = match operator {
            Some(operator) => {
                input.next_token();
                let argument = cut_with(
                    input,
                    format!("Missing expression after \"{operator}\""),
                    |i| self.unary(i),
                )?;
                let span = Span::new(start..argument.span.end());
                Expression::new(
                    ExpressionKind::Unary {
                        operator,
                        argument: Box::new(argument),
                    },
                    span,
                )
            }
            None => self.update(input)?,
        };

        if !leading.is_empty() {
            let mut comments = leading;
            comments.append(&mut expr.comments.leading);
            expr.comments.leading = comments;
        }
        Ok(expr)
    }

    fn update_operator(&self, text: &str) -> Option<UpdateOperator> {
        if text.starts_with("++") {
            Some(UpdateOperator::Increment)
        } else if text.starts_with("--") && !self.at_close(&text[1..]) {
            Some(UpdateOperator::Decrement)
        } else {
            None
        }
    }

    /// Prefix and postfix `++`/`--`, with the comments written after the
    /// operand.
    fn update(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let start = offset(input);

        let mut expr = if let Some(operator) = self.update_operator(rest(input)) {
            input.next_slice(2);
            let argument = cut_with(
                input,
                format!("Missing expression after \"{operator}\""),
                |i| self.unary(i),
            )?;
            if !argument.is_assignable() {
                return Err(invalid_update_target(input, "prefix", argument.span));
            }
            let span = Span::new(start..argument.span.end());
            Expression::new(
                ExpressionKind::Update {
                    operator,
                    prefix: true,
                    argument: Box::new(argument),
                },
                span,
            )
        } else {
            let argument = self.lhs(input)?;
            match self.update_operator(rest(input)) {
                Some(operator) => {
                    if !argument.is_assignable() {
                        return Err(invalid_update_target(input, "postfix", argument.span));
                    }
                    input.next_slice(2);
                    let span = Span::new(start..offset(input));
                    Expression::new(
                        ExpressionKind::Update {
                            operator,
                            prefix: false,
                            argument: Box::new(argument),
                        },
                        span,
                    )
                }
                None => argument,
            }
        };

        let mut trailing = trivia(input)?;
        expr.comments.trailing.append(&mut trailing);
        Ok(expr)
    }

    /// A primary expression followed by adjacent `.name`, `[key]` and
    /// `(args)` suffixes.
    fn lhs(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let mut expr = self.primary(input)?;

        loop {
            let text = rest(input);
            let start = expr.span.start();

            if text.starts_with('.') {
                input.next_token();
                let property_start = offset(input);
                let property = if let Ok(name) = identifier_name(input) {
                    ExpressionKind::Identifier(name.to_string())
                } else if let Ok(index) = digits(input) {
                    ExpressionKind::Numeric(index.parse::<f64>().unwrap_or(f64::NAN))
                } else {
                    return Err(failure(
                        input,
                        Expected::new(
                            ErrorCode::E101,
                            "Missing member property",
                            next_char_span(input),
                        ),
                    ));
                };
                let property = Expression::new(property, Span::new(property_start..offset(input)));
                expr = Expression::new(
                    ExpressionKind::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: false,
                    },
                    Span::new(start..offset(input)),
                );
            } else if text.starts_with('[') {
                input.next_token();
                let property =
                    cut_with(input, "Missing expression after \"[\"", |i| self.pipe(i))?;
                cut_with(input, "Missing \"]\"", |i| character(i, ']'))?;
                expr = Expression::new(
                    ExpressionKind::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: true,
                    },
                    Span::new(start..offset(input)),
                );
            } else if text.starts_with('(') {
                input.next_token();
                let arguments = self.list(input, ')')?;
                expr = Expression::new(
                    ExpressionKind::Call {
                        callee: Box::new(expr),
                        arguments,
                        pipe: false,
                    },
                    Span::new(start..offset(input)),
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated conditional expressions up to and including `close`.
    /// A trailing comma is allowed.
    fn list(&self, input: &mut Input<'_>, close: char) -> IResult<Vec<Expression>> {
        let missing = format!("Missing \"{close}\"");
        let mut items = Vec::new();
        loop {
            whitespace(input)?;
            if character(input, close).is_ok() {
                return Ok(items);
            }
            items.push(cut_with(input, missing.as_str(), |i| self.conditional(i))?);
            if character(input, ',').is_err() {
                cut_with(input, missing.as_str(), |i| character(i, close))?;
                return Ok(items);
            }
        }
    }

    fn primary(&self, input: &mut Input<'_>) -> IResult<Expression> {
        let start = offset(input);
        let span = |input: &Input<'_>| Span::new(start..offset(input));
        let text = rest(input);

        if text.starts_with('(') {
            input.next_token();
            let inner = cut_with(input, "Missing expression after \"(\"", |i| self.pipe(i))?;
            cut_with(input, "Missing \")\"", |i| character(i, ')'))?;
            return Ok(Expression::new(
                ExpressionKind::Parenthesized(Box::new(inner)),
                span(input),
            ));
        }

        if text.starts_with('[') {
            input.next_token();
            let items = self.list(input, ']')?;
            return Ok(Expression::new(ExpressionKind::Array(items), span(input)));
        }

        if text.starts_with(['"', '\'']) {
            let (value, quote) = string_literal(input)?;
            return Ok(Expression::new(
                ExpressionKind::String { value, quote },
                span(input),
            ));
        }

        if let Some(word) = peek_word(input) {
            let kind = match word {
                "null" => ExpressionKind::Null,
                "undefined" => ExpressionKind::Undefined,
                "true" => ExpressionKind::Boolean(true),
                "false" => ExpressionKind::Boolean(false),
                word if is_reserved(word) => {
                    let word_span = Span::new(start..start + word.len());
                    return Err(backtrack(input, reserved_word(word, word_span)));
                }
                word => ExpressionKind::Identifier(word.to_string()),
            };
            input.next_slice(word.len());
            return Ok(Expression::new(kind, span(input)));
        }

        let message = format!("Expression expected ({} found)", found(input));
        let value = expected(input, ErrorCode::E100, message, numeric_literal)?;
        Ok(Expression::new(ExpressionKind::Numeric(value), span(input)))
    }
}

fn invalid_update_target(
    input: &Input<'_>,
    position: &str,
    span: Span,
) -> ErrMode<ContextError<Expected>> {
    failure(
        input,
        Expected::new(
            ErrorCode::E104,
            format!("Invalid left-hand side expression in {position} operation"),
            span,
        )
        .with_help("`++` and `--` can only update a variable or a member"),
    )
}

/// Parse a template into a [`Program`].
///
/// Stops at the first error.
pub fn parse(source: &str, tags: &Delimiters) -> Result<Program, ParseError> {
    let grammar = Grammar::new(tags);
    let mut input = Input::new(source);

    match grammar.template(&mut input) {
        Ok(elements) => {
            trace!(elements = elements.len(); "Parsed template");
            Ok(Program {
                elements,
                source: source.to_string(),
            })
        }
        Err(err) => {
            let diagnostic = into_diagnostic(err, &input);
            trace!(code:? = diagnostic.code(); "Template parse failed");
            Err(diagnostic.into())
        }
    }
}

/// Parse a standalone expression, as written inside a tag.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    let tags = Delimiters::default();
    let grammar = Grammar::new(&tags);
    let mut input = Input::new(source);

    let result = grammar.pipe(&mut input).and_then(|expr| {
        whitespace(&mut input)?;
        if input.is_empty() {
            Ok(expr)
        } else {
            Err(failure(
                &input,
                Expected::new(
                    ErrorCode::E100,
                    format!("Unexpected {}", found(&input)),
                    next_char_span(&input),
                ),
            ))
        }
    });
    result.map_err(|err| into_diagnostic(err, &input).into())
}
