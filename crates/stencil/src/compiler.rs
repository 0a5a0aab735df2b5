//! Template compiler and expression evaluator.
//!
//! [`compile`] walks a [`Program`] against a [`Context`] and produces the
//! output text. Whitespace trimming is applied at element boundaries while
//! the output is accumulated: an open trim marker strips the end of what was
//! produced so far, a close trim marker strips the start of whatever comes
//! next.
//!
//! `break` and `continue` travel back up through [`Flow`] alongside the text
//! produced before them. Only `for` loops consume them.

use log::trace;

use stencil_core::{
    Span, Value,
    ast::{
        BinaryOperator, Expression, ExpressionKind, ForStatement, IfAlternate, IfStatement,
        LogicalOperator, Program, Statement, TagTemplate, TemplateElement, UnaryOperator,
        UpdateOperator,
    },
    value::{Object, format_number, to_int32},
};
use stencil_parser::{Diagnostic, ErrorCode};

use crate::context::Context;

/// How a body finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Output accumulator applying trim markers.
struct Output {
    text: String,
    trim_next: bool,
}

impl Output {
    fn new(trim_start: bool) -> Self {
        Self {
            text: String::new(),
            trim_next: trim_start,
        }
    }

    fn push(&mut self, text: &str, trim_before: bool, trim_after: bool) {
        if trim_before {
            let len = self.text.trim_end().len();
            self.text.truncate(len);
        }
        let text = if self.trim_next { text.trim_start() } else { text };
        self.text.push_str(text);
        self.trim_next = trim_after;
    }

    fn finish(mut self, trim_end: bool) -> String {
        if trim_end {
            let len = self.text.trim_end().len();
            self.text.truncate(len);
        }
        self.text
    }
}

fn error(code: ErrorCode, span: Span, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(message)
        .with_code(code)
        .with_label(span, code.description())
}

/// Compile a parsed template to its output text.
///
/// Helpers may change `context` as a side effect; declarations made with
/// `:=` stay in it after compiling.
///
/// # Errors
///
/// Returns an `E2xx` [`Diagnostic`] pointing at the failing node.
pub fn compile(program: &Program, context: &mut Context) -> Result<String, Diagnostic> {
    trace!(elements = program.elements.len(); "Compiling template");
    let (text, _) = compile_body(&program.elements, false, false, context)?;
    Ok(text)
}

/// `trim_start`/`trim_end` come from the delimiters enclosing the body.
fn compile_body(
    elements: &[TemplateElement],
    trim_start: bool,
    trim_end: bool,
    context: &mut Context,
) -> Result<(String, Flow), Diagnostic> {
    let mut output = Output::new(trim_start);

    for element in elements {
        match element {
            TemplateElement::Raw(raw) => output.push(&raw.value, false, false),
            TemplateElement::Tag(tag) => {
                let (text, flow) = compile_tag(tag, context)?;
                output.push(&text, tag.open.trim, tag.close.trim);
                if flow != Flow::Normal {
                    return Ok((output.finish(trim_end), flow));
                }
            }
        }
    }

    Ok((output.finish(trim_end), Flow::Normal))
}

fn compile_tag(tag: &TagTemplate, context: &mut Context) -> Result<(String, Flow), Diagnostic> {
    let Some(statement) = &tag.statement else {
        return Ok((String::new(), Flow::Normal));
    };

    match statement {
        Statement::Expression(expr) => Ok((evaluate(expr, context)?.render(), Flow::Normal)),
        Statement::Variable(variable) => {
            let value = evaluate(&variable.value, context)?;
            trace!(name = variable.name.name.as_str(); "Declaring variable");
            context.declare(variable.name.name.clone(), value);
            Ok((String::new(), Flow::Normal))
        }
        Statement::If(statement) => compile_if(statement, context),
        Statement::For(statement) => compile_for(statement, context),
        Statement::Break(_) => Ok((String::new(), Flow::Break)),
        Statement::Continue(_) => Ok((String::new(), Flow::Continue)),
    }
}

fn compile_if(
    statement: &IfStatement,
    context: &mut Context,
) -> Result<(String, Flow), Diagnostic> {
    if evaluate(&statement.test, context)?.is_truthy() {
        let trim_end = match &statement.alternate {
            IfAlternate::End { end_open } => end_open.trim,
            IfAlternate::Else { else_open, .. } | IfAlternate::ElseIf { else_open, .. } => {
                else_open.trim
            }
        };
        return compile_body(
            &statement.consequent,
            statement.if_close.trim,
            trim_end,
            context,
        );
    }

    match &statement.alternate {
        IfAlternate::End { .. } => Ok((String::new(), Flow::Normal)),
        IfAlternate::Else {
            else_close,
            body,
            end_open,
            ..
        } => compile_body(body, else_close.trim, end_open.trim, context),
        IfAlternate::ElseIf { statement, .. } => compile_if(statement, context),
    }
}

/// Loops consume `break`/`continue`, so the result is always [`Flow::Normal`].
fn compile_for(
    statement: &ForStatement,
    context: &mut Context,
) -> Result<(String, Flow), Diagnostic> {
    let items = match evaluate(&statement.iterable, context)? {
        Value::Array(items) => items,
        other => {
            return Err(error(
                ErrorCode::E207,
                statement.iterable.span,
                format!("\"{}\" is not iterable", other.type_name()),
            ));
        }
    };
    trace!(items = items.len(); "Compiling loop");

    let mut text = String::new();
    for (index, item) in items.into_iter().enumerate() {
        let mut frame = Object::new();
        frame.insert(statement.value.name.clone(), item);
        if let Some(index_name) = &statement.index {
            frame.insert(index_name.name.clone(), Value::from(index));
        }

        context.push_scope(frame);
        let result = compile_body(
            &statement.body,
            statement.for_close.trim,
            statement.end_open.trim,
            context,
        );
        context.pop_scope();

        let (iteration, flow) = result?;
        text.push_str(&iteration);
        if flow == Flow::Break {
            break;
        }
    }

    Ok((text, Flow::Normal))
}

/// Evaluate an expression to a value.
///
/// # Errors
///
/// Returns an `E2xx` [`Diagnostic`] on type errors, unresolved names and
/// helper failures.
pub fn evaluate(expr: &Expression, context: &mut Context) -> Result<Value, Diagnostic> {
    match &expr.kind {
        ExpressionKind::Null => Ok(Value::Null),
        ExpressionKind::Undefined => Ok(Value::Undefined),
        ExpressionKind::Boolean(b) => Ok(Value::Bool(*b)),
        ExpressionKind::Numeric(n) => Ok(Value::Number(*n)),
        ExpressionKind::String { value, .. } => Ok(Value::String(value.clone())),
        ExpressionKind::Identifier(name) => identifier(name, expr.span, context),
        ExpressionKind::Array(items) => items
            .iter()
            .map(|item| evaluate(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ExpressionKind::Member {
            object,
            property,
            computed,
        } => {
            let target = evaluate(object, context)?;
            let key = property_key(property, *computed, context)?;
            read_property(&target, &key, expr.span)
        }
        ExpressionKind::Call {
            callee, arguments, ..
        } => call(callee, arguments, expr.span, context),
        ExpressionKind::Unary { operator, argument } => {
            let value = evaluate(argument, context)?;
            unary(*operator, value, expr.span)
        }
        ExpressionKind::Update {
            operator,
            prefix,
            argument,
        } => update(*operator, *prefix, argument, expr.span, context),
        ExpressionKind::Binary {
            left,
            operator,
            right,
        } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            binary(*operator, left, right, expr.span)
        }
        ExpressionKind::Logical {
            left,
            operator,
            right,
        } => {
            let left = evaluate(left, context)?;
            let short_circuit = match operator {
                LogicalOperator::And => !left.is_truthy(),
                LogicalOperator::Or => left.is_truthy(),
            };
            if short_circuit {
                Ok(left)
            } else {
                evaluate(right, context)
            }
        }
        ExpressionKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, context)?.is_truthy() {
                evaluate(consequent, context)
            } else {
                evaluate(alternate, context)
            }
        }
        ExpressionKind::Parenthesized(inner) => evaluate(inner, context),
    }
}

/// Variables first, then helpers called without arguments.
fn identifier(name: &str, span: Span, context: &mut Context) -> Result<Value, Diagnostic> {
    if let Some(value) = context.get(name) {
        return Ok(value.clone());
    }
    match context.helper(name).cloned() {
        Some(helper) => helper
            .call(context, &[])
            .map_err(|err| error(ErrorCode::E208, span, err.to_string())),
        None => Err(error(
            ErrorCode::E200,
            span,
            format!("\"{name}\" identifier does not exist"),
        )),
    }
}

fn call(
    callee: &Expression,
    arguments: &[Expression],
    span: Span,
    context: &mut Context,
) -> Result<Value, Diagnostic> {
    let helper = match &callee.kind {
        ExpressionKind::Identifier(name) => match context.helper(name) {
            Some(helper) => helper.clone(),
            None => {
                return Err(match context.get(name) {
                    Some(value) => not_a_function(value, callee.span),
                    None => error(
                        ErrorCode::E201,
                        callee.span,
                        format!("\"{name}\" helper function is not defined"),
                    ),
                });
            }
        },
        _ => {
            let value = evaluate(callee, context)?;
            return Err(not_a_function(&value, callee.span));
        }
    };

    let args = arguments
        .iter()
        .map(|argument| evaluate(argument, context))
        .collect::<Result<Vec<_>, _>>()?;

    helper
        .call(context, &args)
        .map_err(|err| error(ErrorCode::E208, span, err.to_string()))
}

fn not_a_function(value: &Value, span: Span) -> Diagnostic {
    error(
        ErrorCode::E202,
        span,
        format!("\"{value}\" is not a function"),
    )
}

/// A resolved member key.
#[derive(Debug, Clone, PartialEq)]
enum PropertyKey {
    Name(String),
    Index(f64),
}

impl PropertyKey {
    fn text(&self) -> String {
        match self {
            PropertyKey::Name(name) => name.clone(),
            PropertyKey::Index(index) => format_number(*index),
        }
    }
}

fn is_forbidden(name: &str) -> bool {
    matches!(name, "__proto__" | "prototype" | "constructor")
        || (name.len() > 4 && name.starts_with("__") && name.ends_with("__"))
}

fn property_key(
    property: &Expression,
    computed: bool,
    context: &mut Context,
) -> Result<PropertyKey, Diagnostic> {
    let key = match (&property.kind, computed) {
        (ExpressionKind::Identifier(name), false) => PropertyKey::Name(name.clone()),
        (ExpressionKind::Numeric(index), false) => PropertyKey::Index(*index),
        _ => match evaluate(property, context)? {
            Value::String(name) => PropertyKey::Name(name),
            Value::Number(index) => PropertyKey::Index(index),
            other => {
                return Err(error(
                    ErrorCode::E206,
                    property.span,
                    format!(
                        "Property key must be string or numeric (got \"{}\")",
                        other.type_name()
                    ),
                ));
            }
        },
    };

    if let PropertyKey::Name(name) = &key {
        if is_forbidden(name) {
            return Err(error(
                ErrorCode::E205,
                property.span,
                format!("Invalid property access: \"{name}\""),
            ));
        }
    }
    Ok(key)
}

fn array_index(index: f64) -> Option<usize> {
    (index >= 0.0 && index.fract() == 0.0).then_some(index as usize)
}

fn cannot_read(type_name: &str, key: &PropertyKey, span: Span) -> Diagnostic {
    error(
        ErrorCode::E205,
        span,
        format!(
            "Cannot read properties of \"{type_name}\" (reading \"{}\")",
            key.text()
        ),
    )
}

/// Missing keys read as an empty string.
fn read_property(target: &Value, key: &PropertyKey, span: Span) -> Result<Value, Diagnostic> {
    let found = match target {
        Value::Object(map) => map.get(&key.text()),
        Value::Array(items) => match key {
            PropertyKey::Index(index) => array_index(*index).and_then(|i| items.get(i)),
            PropertyKey::Name(name) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i)),
        },
        other => return Err(cannot_read(other.type_name(), key, span)),
    };
    Ok(found.cloned().unwrap_or_else(|| Value::from("")))
}

fn child_mut<'v>(target: &'v mut Value, key: &PropertyKey) -> Option<&'v mut Value> {
    match target {
        Value::Object(map) => map.get_mut(&key.text()),
        Value::Array(items) => match key {
            PropertyKey::Index(index) => array_index(*index).and_then(move |i| items.get_mut(i)),
            PropertyKey::Name(name) => name
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
        },
        _ => None,
    }
}

fn unary(operator: UnaryOperator, value: Value, span: Span) -> Result<Value, Diagnostic> {
    match (operator, &value) {
        (UnaryOperator::Not, _) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOperator::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
        (UnaryOperator::Minus, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOperator::BitNot, Value::Number(n)) => Ok(Value::Number(f64::from(!to_int32(*n)))),
        _ => Err(error(
            ErrorCode::E204,
            span,
            format!(
                "Operator \"{operator}\" cannot be applied to \"{}\"",
                value.type_name()
            ),
        )),
    }
}

fn binary(
    operator: BinaryOperator,
    left: Value,
    right: Value,
    span: Span,
) -> Result<Value, Diagnostic> {
    use BinaryOperator as Op;

    match (operator, &left, &right) {
        (Op::Equal, _, _) => Ok(Value::Bool(left == right)),
        (Op::NotEqual, _, _) => Ok(Value::Bool(left != right)),
        (_, Value::Number(a), Value::Number(b)) => {
            let (a, b) = (*a, *b);
            Ok(match operator {
                Op::Add => Value::Number(a + b),
                Op::Subtract => Value::Number(a - b),
                Op::Multiply => Value::Number(a * b),
                Op::Divide => Value::Number(a / b),
                Op::Remainder => Value::Number(a % b),
                Op::Less => Value::Bool(a < b),
                Op::Greater => Value::Bool(a > b),
                Op::LessEqual => Value::Bool(a <= b),
                Op::GreaterEqual => Value::Bool(a >= b),
                Op::Equal => Value::Bool(a == b),
                Op::NotEqual => Value::Bool(a != b),
            })
        }
        (Op::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Op::Less, Value::String(a), Value::String(b)) => Ok(Value::Bool(a < b)),
        (Op::Greater, Value::String(a), Value::String(b)) => Ok(Value::Bool(a > b)),
        (Op::LessEqual, Value::String(a), Value::String(b)) => Ok(Value::Bool(a <= b)),
        (Op::GreaterEqual, Value::String(a), Value::String(b)) => Ok(Value::Bool(a >= b)),
        _ if left.type_name() == right.type_name() => Err(error(
            ErrorCode::E204,
            span,
            format!(
                "Operator \"{operator}\" cannot be applied to \"{}\" and \"{}\"",
                left.type_name(),
                right.type_name()
            ),
        )),
        _ => Err(error(
            ErrorCode::E203,
            span,
            format!(
                "Operator \"{operator}\" requires operands of the same data type (left: \"{}\", right: \"{}\")",
                left.type_name(),
                right.type_name()
            ),
        )),
    }
}

fn unwrap_parens(mut expr: &Expression) -> &Expression {
    while let ExpressionKind::Parenthesized(inner) = &expr.kind {
        expr = inner;
    }
    expr
}

/// `++`/`--` on a variable or member slot.
///
/// The new value is written back when the target is rooted at a variable.
fn update(
    operator: UpdateOperator,
    prefix: bool,
    argument: &Expression,
    span: Span,
    context: &mut Context,
) -> Result<Value, Diagnostic> {
    let target = unwrap_parens(argument);

    // Walk down to the root, collecting member keys outermost-last.
    let mut keys = Vec::new();
    let mut root = target;
    while let ExpressionKind::Member {
        object,
        property,
        computed,
    } = &root.kind
    {
        keys.push(property_key(property, *computed, context)?);
        root = unwrap_parens(object);
    }
    keys.reverse();

    let slot = match &root.kind {
        ExpressionKind::Identifier(name) => match context.get_mut(name) {
            Some(slot) => slot,
            None => {
                return Err(error(
                    ErrorCode::E209,
                    root.span,
                    format!("\"{name}\" is not defined"),
                ));
            }
        },
        _ => {
            // Not rooted at a variable: compute without storing.
            let mut value = evaluate(root, context)?;
            let slot = walk_mut(&mut value, &keys, operator, span)?;
            return apply_update(slot, operator, prefix, span);
        }
    };

    let slot = walk_mut(slot, &keys, operator, span)?;
    apply_update(slot, operator, prefix, span)
}

fn walk_mut<'v>(
    mut slot: &'v mut Value,
    keys: &[PropertyKey],
    operator: UpdateOperator,
    span: Span,
) -> Result<&'v mut Value, Diagnostic> {
    for (i, key) in keys.iter().enumerate() {
        let container = slot.type_name();
        slot = match child_mut(slot, key) {
            Some(child) => child,
            None if matches!(container, "object" | "array") => {
                return Err(match keys.get(i + 1) {
                    Some(next) => cannot_read("undefined", next, span)
                        .with_code(ErrorCode::E209),
                    None => error(
                        ErrorCode::E209,
                        span,
                        format!("Operator \"{operator}\" cannot be applied to \"undefined\""),
                    ),
                });
            }
            None => return Err(cannot_read(container, key, span).with_code(ErrorCode::E209)),
        };
    }
    Ok(slot)
}

fn apply_update(
    slot: &mut Value,
    operator: UpdateOperator,
    prefix: bool,
    span: Span,
) -> Result<Value, Diagnostic> {
    let Value::Number(n) = slot else {
        return Err(error(
            ErrorCode::E209,
            span,
            format!(
                "Operator \"{operator}\" cannot be applied to \"{}\"",
                slot.type_name()
            ),
        ));
    };
    let old = *n;
    *n += match operator {
        UpdateOperator::Increment => 1.0,
        UpdateOperator::Decrement => -1.0,
    };
    Ok(Value::Number(if prefix { *n } else { old }))
}
