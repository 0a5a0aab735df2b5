//! Canonical source formatting.
//!
//! [`format`] prints a [`Program`] back to template source with normalized
//! spacing. Raw text is copied unchanged; inside tags there is exactly one
//! space after the open delimiter and before the close delimiter. A tag
//! holding nothing but a multi-line comment is printed hugging its
//! delimiters.
//!
//! Calls print in command form (`name a b`) where the parser reads that form
//! back to the same tree, and in parenthesized form (`name(a, b)`) elsewhere.

use stencil_core::{
    ast::{
        Comment, Expression, ExpressionKind, ForStatement, IfAlternate, IfStatement, Program,
        Statement, Tag, TagTemplate, TemplateElement, UnaryOperator,
    },
    value::format_number,
};
use stencil_parser::is_reserved;

/// Format a parsed template.
///
/// Formatting is idempotent: parsing and formatting the output again yields
/// the same text.
pub fn format(program: &Program) -> String {
    let mut out = String::with_capacity(program.source.len());
    write_elements(&program.elements, &mut out);
    out
}

fn write_elements(elements: &[TemplateElement], out: &mut String) {
    for element in elements {
        match element {
            TemplateElement::Raw(raw) => out.push_str(&raw.value),
            TemplateElement::Tag(tag) => write_tag(tag, out),
        }
    }
}

fn comment(comment: &Comment) -> String {
    if comment.is_multiline() {
        return format!("/*{}*/", comment.body);
    }
    match comment.body.trim() {
        "" => "/* */".to_string(),
        body => format!("/* {body} */"),
    }
}

/// The open delimiter followed by its comments.
fn open_part(tag: &Tag) -> String {
    let mut part = tag.text();
    for c in &tag.comments {
        part.push(' ');
        part.push_str(&comment(c));
    }
    part
}

/// The comments before a close delimiter followed by the delimiter.
fn close_part(tag: &Tag) -> String {
    let mut part = String::new();
    for c in &tag.comments {
        part.push(' ');
        part.push_str(&comment(c));
    }
    part.push(' ');
    part.push_str(&tag.text());
    part
}

fn write_tag(tag: &TagTemplate, out: &mut String) {
    let Some(statement) = &tag.statement else {
        let mut comments = tag.open.comments.iter().chain(&tag.close.comments);
        if let (Some(only), None) = (comments.next(), comments.next()) {
            if only.is_multiline() {
                out.push_str(&tag.open.text());
                out.push_str(&comment(only));
                out.push_str(&tag.close.text());
                return;
            }
        }
        out.push_str(&open_part(&tag.open));
        out.push_str(&close_part(&tag.close));
        return;
    };

    out.push_str(&open_part(&tag.open));
    out.push(' ');
    write_statement(statement, out);
    out.push_str(&close_part(&tag.close));
}

fn write_statement(statement: &Statement, out: &mut String) {
    match statement {
        Statement::Expression(expr) => out.push_str(&top(expr)),
        Statement::Variable(variable) => {
            out.push_str(&variable.name.name);
            out.push_str(" := ");
            out.push_str(&top(&variable.value));
        }
        Statement::If(statement) => write_if(statement, out),
        Statement::For(statement) => write_for(statement, out),
        Statement::Break(_) => out.push_str("break"),
        Statement::Continue(_) => out.push_str("continue"),
    }
}

fn write_if(statement: &IfStatement, out: &mut String) {
    out.push_str("if ");
    out.push_str(&top(&statement.test));
    out.push_str(&close_part(&statement.if_close));
    write_elements(&statement.consequent, out);

    match &statement.alternate {
        IfAlternate::End { end_open } => write_end(end_open, out),
        IfAlternate::Else {
            else_open,
            else_close,
            body,
            end_open,
        } => {
            out.push_str(&open_part(else_open));
            out.push_str(" else");
            out.push_str(&close_part(else_close));
            write_elements(body, out);
            write_end(end_open, out);
        }
        IfAlternate::ElseIf {
            else_open,
            statement,
        } => {
            out.push_str(&open_part(else_open));
            out.push_str(" else ");
            write_if(statement, out);
        }
    }
}

fn write_for(statement: &ForStatement, out: &mut String) {
    out.push_str("for ");
    out.push_str(&statement.value.name);
    if let Some(index) = &statement.index {
        out.push_str(", ");
        out.push_str(&index.name);
    }
    out.push_str(" in ");
    out.push_str(&top(&statement.iterable));
    out.push_str(&close_part(&statement.for_close));
    write_elements(&statement.body, out);
    write_end(&statement.end_open, out);
}

/// `{{ end`; the close delimiter belongs to the enclosing tag.
fn write_end(end_open: &Tag, out: &mut String) {
    out.push_str(&open_part(end_open));
    out.push_str(" end");
}

/// An expression in a position that accepts a full pipe expression.
fn top(expr: &Expression) -> String {
    expression(expr, true)
}

fn nested(expr: &Expression) -> String {
    expression(expr, false)
}

fn expression(expr: &Expression, top: bool) -> String {
    let body = expression_body(expr, top);
    if expr.comments.is_empty() {
        return body;
    }

    let mut parts: Vec<String> = expr.comments.leading.iter().map(comment).collect();
    parts.push(body);
    parts.extend(expr.comments.trailing.iter().map(comment));
    parts.join(" ")
}

fn expression_body(expr: &Expression, in_pipe_position: bool) -> String {
    match &expr.kind {
        ExpressionKind::Null => "null".to_string(),
        ExpressionKind::Undefined => "undefined".to_string(),
        ExpressionKind::Boolean(b) => b.to_string(),
        ExpressionKind::Numeric(n) => numeric_literal(*n),
        ExpressionKind::String { value, quote } => string_literal(value, quote.as_char()),
        ExpressionKind::Identifier(name) => name.clone(),
        ExpressionKind::Array(items) => {
            let items: Vec<String> = items.iter().map(nested).collect();
            format!("[{}]", items.join(", "))
        }
        ExpressionKind::Member {
            object,
            property,
            computed,
        } => format!("{}{}", nested(object), member_property(property, *computed)),
        ExpressionKind::Call {
            callee,
            arguments,
            pipe,
        } => call(callee, arguments, *pipe, in_pipe_position),
        ExpressionKind::Unary { operator, argument } => {
            let argument = nested(argument);
            let clashes = match operator {
                UnaryOperator::Plus => argument.starts_with('+'),
                UnaryOperator::Minus => argument.starts_with('-'),
                UnaryOperator::BitNot | UnaryOperator::Not => false,
            };
            let space = if clashes { " " } else { "" };
            format!("{operator}{space}{argument}")
        }
        ExpressionKind::Update {
            operator,
            prefix,
            argument,
        } => {
            if *prefix {
                format!("{operator}{}", nested(argument))
            } else {
                format!("{}{operator}", nested(argument))
            }
        }
        ExpressionKind::Binary {
            left,
            operator,
            right,
        } => format!("{} {operator} {}", nested(left), nested(right)),
        ExpressionKind::Logical {
            left,
            operator,
            right,
        } => format!("{} {operator} {}", nested(left), nested(right)),
        ExpressionKind::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "{} ? {} : {}",
            nested(test),
            nested(consequent),
            nested(alternate)
        ),
        ExpressionKind::Parenthesized(inner) => format!("({})", top(inner)),
    }
}

/// Infinite literals are written so that they overflow again when parsed.
fn numeric_literal(n: f64) -> String {
    if n.is_infinite() {
        let sign = if n < 0.0 { "-" } else { "" };
        format!("{sign}1e999")
    } else {
        format_number(n)
    }
}

fn is_identifier_shaped(text: &str) -> bool {
    let mut chars = text.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    starts_well && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Whether `n` can be written after a dot.
fn is_dot_index(n: f64) -> bool {
    n >= 0.0 && n.fract() == 0.0 && n < 1e15
}

fn member_property(property: &Expression, computed: bool) -> String {
    match (&property.kind, computed) {
        (ExpressionKind::Identifier(name), false) => format!(".{name}"),
        (ExpressionKind::Numeric(n), _) if is_dot_index(*n) && property.comments.is_empty() => {
            format!(".{}", format_number(*n))
        }
        (ExpressionKind::String { value, .. }, true)
            if is_identifier_shaped(value) && !is_reserved(value) && property.comments.is_empty() =>
        {
            format!(".{value}")
        }
        _ => format!("[{}]", top(property)),
    }
}

/// Arguments that can be written space-separated without changing how they
/// group.
fn is_tight(expr: &Expression) -> bool {
    !matches!(
        expr.kind,
        ExpressionKind::Binary { .. }
            | ExpressionKind::Logical { .. }
            | ExpressionKind::Conditional { .. }
    )
}

/// A leading `+x`, `-x` or `--x` would read as a binary operator after the
/// callee.
fn is_signed(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Unary { operator, .. } => {
            matches!(operator, UnaryOperator::Plus | UnaryOperator::Minus)
        }
        ExpressionKind::Update { prefix, .. } => *prefix,
        _ => false,
    }
}

fn paren_call(callee: &Expression, arguments: &[Expression]) -> String {
    let arguments: Vec<String> = arguments.iter().map(nested).collect();
    format!("{}({})", nested(callee), arguments.join(", "))
}

fn space_separated(arguments: &[Expression]) -> String {
    arguments
        .iter()
        .map(|argument| format!(" {}", nested(argument)))
        .collect()
}

fn call(callee: &Expression, arguments: &[Expression], pipe: bool, top: bool) -> String {
    let simple_callee = matches!(
        callee.kind,
        ExpressionKind::Identifier(_) | ExpressionKind::Member { .. }
    );

    if pipe && top {
        if let Some((first, extra)) = arguments.split_first() {
            let segment = if simple_callee && extra.iter().all(is_tight) {
                format!("{}{}", nested(callee), space_separated(extra))
            } else {
                paren_call(callee, extra)
            };
            return format!("{} | {segment}", expression(first, true));
        }
    }

    let command = top
        && simple_callee
        && arguments.iter().all(is_tight)
        && arguments.first().is_some_and(|first| !is_signed(first));
    if command {
        format!("{}{}", nested(callee), space_separated(arguments))
    } else {
        paren_call(callee, arguments)
    }
}

fn string_literal(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
