//! Unit tests for the template grammar.
//!
//! Expressions are compared through a compact prefix notation so that tests
//! state tree shape without repeating spans.

use stencil_core::{
    Delimiters, Span,
    ast::{
        Expression, ExpressionKind, IfAlternate, Program, Statement, TagTemplate, TemplateElement,
    },
    value::format_number,
};

use crate::{
    error::{Diagnostic, ErrorCode},
    grammar::{parse, parse_expression},
};

/// Render an expression as a prefix s-expression.
fn sexp(expr: &Expression) -> String {
    match &expr.kind {
        ExpressionKind::Null => "null".to_string(),
        ExpressionKind::Undefined => "undefined".to_string(),
        ExpressionKind::Boolean(value) => value.to_string(),
        ExpressionKind::Numeric(value) => format_number(*value),
        ExpressionKind::String { value, .. } => format!("{value:?}"),
        ExpressionKind::Identifier(name) => name.clone(),
        ExpressionKind::Array(items) => {
            let items: Vec<_> = items.iter().map(sexp).collect();
            format!("[{}]", items.join(" "))
        }
        ExpressionKind::Member {
            object,
            property,
            computed,
        } => {
            let op = if *computed { "[]" } else { "." };
            format!("({op} {} {})", sexp(object), sexp(property))
        }
        ExpressionKind::Call {
            callee,
            arguments,
            pipe,
        } => {
            let head = if *pipe { "pipe" } else { "call" };
            let mut parts = vec![head.to_string(), sexp(callee)];
            parts.extend(arguments.iter().map(sexp));
            format!("({})", parts.join(" "))
        }
        ExpressionKind::Unary { operator, argument } => {
            format!("({operator} {})", sexp(argument))
        }
        ExpressionKind::Update {
            operator,
            prefix: true,
            argument,
        } => format!("({operator} {})", sexp(argument)),
        ExpressionKind::Update {
            operator,
            prefix: false,
            argument,
        } => format!("({} {operator})", sexp(argument)),
        ExpressionKind::Binary {
            left,
            operator,
            right,
        } => format!("({operator} {} {})", sexp(left), sexp(right)),
        ExpressionKind::Logical {
            left,
            operator,
            right,
        } => format!("({operator} {} {})", sexp(left), sexp(right)),
        ExpressionKind::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "(? {} {} {})",
            sexp(test),
            sexp(consequent),
            sexp(alternate)
        ),
        ExpressionKind::Parenthesized(inner) => format!("(paren {})", sexp(inner)),
    }
}

fn parse_ok(source: &str) -> Program {
    parse(source, &Delimiters::default()).unwrap_or_else(|err| panic!("`{source}`: {err}"))
}

fn parse_err(source: &str) -> Diagnostic {
    let err = parse(source, &Delimiters::default()).expect_err("parse should fail");
    assert_eq!(err.diagnostics().len(), 1);
    err.diagnostics()[0].clone()
}

fn only_tag(program: &Program) -> &TagTemplate {
    let tags: Vec<_> = program
        .elements
        .iter()
        .filter_map(|element| match element {
            TemplateElement::Tag(tag) => Some(tag),
            TemplateElement::Raw(_) => None,
        })
        .collect();
    assert_eq!(tags.len(), 1, "expected exactly one tag");
    tags[0]
}

/// Parse `{{ source }}` and return the expression statement as a s-expression.
fn expr(source: &str) -> String {
    let program = parse_ok(&format!("{{{{ {source} }}}}"));
    match &only_tag(&program).statement {
        Some(Statement::Expression(expr)) => sexp(expr),
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

// ===================
// Template structure
// ===================

#[test]
fn test_raw_text_only() {
    let program = parse_ok("plain text }} with a stray close");
    assert_eq!(program.elements.len(), 1);
    match &program.elements[0] {
        TemplateElement::Raw(raw) => {
            assert_eq!(raw.value, "plain text }} with a stray close");
            assert_eq!(raw.span, Span::new(0..32));
        }
        other => panic!("expected raw text, got {other:?}"),
    }
}

#[test]
fn test_empty_template() {
    assert!(parse_ok("").elements.is_empty());
}

#[test]
fn test_tag_spans() {
    let program = parse_ok("Hi {{ name }}!");
    assert_eq!(program.elements.len(), 3);
    let tag = only_tag(&program);
    assert_eq!(tag.span, Span::new(3..13));
    assert_eq!(tag.open.span, Span::new(3..5));
    assert_eq!(tag.close.span, Span::new(11..13));
    match &tag.statement {
        Some(Statement::Expression(expr)) => assert_eq!(expr.span, Span::new(6..10)),
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_trim_markers() {
    let program = parse_ok("{{- a -}}");
    let tag = only_tag(&program);
    assert!(tag.open.trim);
    assert!(tag.close.trim);
    assert_eq!(tag.open.text(), "{{-");
    assert_eq!(tag.close.text(), "-}}");
}

#[test]
fn test_minus_touching_close_is_trim() {
    let program = parse_ok("{{ a-}}");
    let tag = only_tag(&program);
    assert!(tag.close.trim);
    assert_eq!(tag.close.text(), "-}}");
    match &tag.statement {
        Some(Statement::Expression(expr)) => assert_eq!(sexp(expr), "a"),
        other => panic!("unexpected statement {other:?}"),
    }

    assert_eq!(expr("a--"), "(a --)");
}

#[test]
fn test_empty_tags() {
    let program = parse_ok("{{}}{{ }}");
    assert_eq!(program.elements.len(), 2);

    let program = parse_ok("{{ /* only a comment */ }}");
    let tag = only_tag(&program);
    assert!(tag.statement.is_none());
    assert_eq!(tag.open.comments.len(), 1);
    assert_eq!(tag.open.comments[0].body, " only a comment ");
}

#[test]
fn test_comments_attach_to_expression() {
    let program = parse_ok("{{ /* a */ x /* b */ }}");
    let tag = only_tag(&program);
    assert_eq!(tag.open.comments.len(), 1);
    match &tag.statement {
        Some(Statement::Expression(expr)) => {
            assert_eq!(expr.span, Span::new(11..12));
            assert_eq!(expr.comments.trailing.len(), 1);
            assert_eq!(expr.comments.trailing[0].body, " b ");
        }
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_custom_delimiters() {
    let program = parse("<% 10 % 3 -%> tail", &Delimiters::new("<%", "%>")).unwrap();
    let tag = only_tag(&program);
    assert!(tag.close.trim);
    match &tag.statement {
        Some(Statement::Expression(expr)) => assert_eq!(sexp(expr), "(% 10 3)"),
        other => panic!("unexpected statement {other:?}"),
    }
}

// ===================
// Expressions
// ===================

#[test]
fn test_literals() {
    assert_eq!(expr("null"), "null");
    assert_eq!(expr("undefined"), "undefined");
    assert_eq!(expr("true"), "true");
    assert_eq!(expr("false"), "false");
    assert_eq!(expr("0xaf12"), "44818");
    assert_eq!(expr(".12"), "0.12");
    assert_eq!(expr("'it'"), "\"it\"");
    assert_eq!(expr("[1, \"x\", [2],]"), "[1 \"x\" [2]]");
    assert_eq!(expr("[]"), "[]");
}

#[test]
fn test_reserved_prefixes_are_identifiers() {
    assert_eq!(expr("iff"), "iff");
    assert_eq!(expr("nulll"), "nulll");
    assert_eq!(expr("end_date"), "end_date");
}

#[test]
fn test_binary_precedence() {
    assert_eq!(expr("a + b * c"), "(+ a (* b c))");
    assert_eq!(expr("a - b - c"), "(- (- a b) c)");
    assert_eq!(expr("a-b"), "(- a b)");
    assert_eq!(expr("a % b / c"), "(/ (% a b) c)");
    assert_eq!(
        expr("a || b && c == d < e"),
        "(|| a (&& b (== c (< d e))))"
    );
    assert_eq!(expr("a <= b != c >= d"), "(!= (<= a b) (>= c d))");
    assert_eq!(expr("(a + b) * c"), "(* (paren (+ a b)) c)");
}

#[test]
fn test_conditional() {
    assert_eq!(expr("a ? b : c ? d : e"), "(? a b (? c d e))");
    assert_eq!(expr("a > 1 ? 'x' : 'y'"), "(? (> a 1) \"x\" \"y\")");
}

#[test]
fn test_unary_and_update() {
    assert_eq!(expr("-a"), "(- a)");
    assert_eq!(expr("!!a"), "(! (! a))");
    assert_eq!(expr("~123"), "(~ 123)");
    assert_eq!(expr("-13 % 5"), "(% (- 13) 5)");
    assert_eq!(expr("a++"), "(a ++)");
    assert_eq!(expr("++a.b"), "(++ (. a b))");
    assert_eq!(expr("--(a)"), "(-- (paren a))");
    assert_eq!(expr("a[0]--"), "(([] a 0) --)");
}

#[test]
fn test_member_access() {
    assert_eq!(expr("a.b.c"), "(. (. a b) c)");
    assert_eq!(expr("arr.100"), "(. arr 100)");
    assert_eq!(expr("a[b]['c']"), "([] ([] a b) \"c\")");
    assert_eq!(expr("a.if"), "(. a if)");
}

#[test]
fn test_calls() {
    assert_eq!(expr("fn()"), "(call fn)");
    assert_eq!(expr("fn(a, b,)"), "(call fn a b)");
    assert_eq!(expr("!a.b[c](d, e)"), "(! (call ([] (. a b) c) d e))");
    assert_eq!(expr("fn()()"), "(call (call fn))");
}

#[test]
fn test_command_calls() {
    assert_eq!(expr("fn a b"), "(call fn a b)");
    assert_eq!(expr("fn(a) b"), "(call fn a b)");
    assert_eq!(expr("fn (a)"), "(call fn (paren a))");
    assert_eq!(expr("fn 'x' -1 !y"), "(call fn \"x\" (- 1) (! y))");
    assert_eq!(expr("a.b c"), "(call (. a b) c)");
}

#[test]
fn test_pipes() {
    assert_eq!(
        expr("a | fn1 | fn2 \"str\""),
        "(pipe fn2 (pipe fn1 a) \"str\")"
    );
    assert_eq!(expr("\"a\" | fn \"b\" -10"), "(pipe fn \"a\" \"b\" (- 10))");
    assert_eq!(expr("a | fn(b) c"), "(pipe fn a b c)");
    assert_eq!(expr("a || b | fn"), "(pipe fn (|| a b))");
    assert_eq!(expr("(a | fn)"), "(paren (pipe fn a))");
}

#[test]
fn test_pipe_span_covers_segments() {
    let program = parse_ok("{{ a | fn b }}");
    match &only_tag(&program).statement {
        Some(Statement::Expression(expr)) => assert_eq!(expr.span, Span::new(3..11)),
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_parse_expression() {
    assert_eq!(sexp(&parse_expression("a + 1").unwrap()), "(+ a 1)");
    assert_eq!(sexp(&parse_expression("  x | up  ").unwrap()), "(pipe up x)");

    let err = parse_expression("a )").unwrap_err();
    assert_eq!(err.diagnostics()[0].message(), "Unexpected \")\"");
}

// ===================
// Statements
// ===================

#[test]
fn test_variable_statement() {
    let program = parse_ok("{{ total := price * 2 }}");
    match &only_tag(&program).statement {
        Some(Statement::Variable(var)) => {
            assert_eq!(var.name.name, "total");
            assert_eq!(var.name.span, Span::new(3..8));
            assert_eq!(sexp(&var.value), "(* price 2)");
            assert_eq!(var.span, Span::new(3..21));
        }
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_if_else_chain() {
    let program = parse_ok("{{ if a }}x{{ else if b }}y{{ else }}z{{ end }}");
    let tag = only_tag(&program);
    assert_eq!(tag.span, Span::new(0..47));
    let Some(Statement::If(statement)) = &tag.statement else {
        panic!("expected if");
    };
    assert_eq!(sexp(&statement.test), "a");
    assert_eq!(statement.consequent.len(), 1);

    let IfAlternate::ElseIf { statement: nested, .. } = &statement.alternate else {
        panic!("expected else if");
    };
    assert_eq!(sexp(&nested.test), "b");
    let IfAlternate::Else { body, end_open, .. } = &nested.alternate else {
        panic!("expected else");
    };
    assert_eq!(body.len(), 1);
    assert_eq!(end_open.span, Span::new(38..40));
    assert_eq!(statement.end_open().span, Span::new(38..40));
}

#[test]
fn test_if_without_else() {
    let program = parse_ok("{{ if a -}} yes {{- end }}");
    let tag = only_tag(&program);
    let Some(Statement::If(statement)) = &tag.statement else {
        panic!("expected if");
    };
    assert!(statement.if_close.trim);
    assert!(statement.end_open().trim);
    assert!(matches!(statement.alternate, IfAlternate::End { .. }));
}

#[test]
fn test_moderate_nesting_parses() {
    let depth = 20;
    assert_eq!(
        expr(&format!("{}1{}", "(".repeat(depth), ")".repeat(depth))),
        format!("{}1{}", "(paren ".repeat(depth), ")".repeat(depth))
    );
    let blocks = format!("{}x{}", "{{ if a }}".repeat(20), "{{ end }}".repeat(20));
    assert_eq!(parse_ok(&blocks).elements.len(), 1);
}

#[test]
fn test_nested_blocks() {
    let program = parse_ok("{{ for v in [1,2] }}{{ if v == 2 }}{{ break }}{{ end }}{{ v }}{{ end }}");
    let Some(Statement::For(statement)) = &only_tag(&program).statement else {
        panic!("expected for");
    };
    assert_eq!(statement.body.len(), 2);
}

#[test]
fn test_for_statement() {
    let program = parse_ok("{{ for v, i in items }}{{ v }}{{ continue }}{{ end }}");
    let Some(Statement::For(statement)) = &only_tag(&program).statement else {
        panic!("expected for");
    };
    assert_eq!(statement.value.name, "v");
    assert_eq!(statement.index.as_ref().map(|i| i.name.as_str()), Some("i"));
    assert_eq!(sexp(&statement.iterable), "items");
    assert_eq!(statement.body.len(), 2);
    assert!(matches!(
        &statement.body[1],
        TemplateElement::Tag(TagTemplate {
            statement: Some(Statement::Continue(_)),
            ..
        })
    ));
}

// ===================
// Errors
// ===================

mod parser_error_tests {
    use super::*;

    fn assert_error(source: &str, code: ErrorCode, message: &str) {
        let diag = parse_err(source);
        assert_eq!(diag.code(), Some(code), "code for `{source}`");
        assert_eq!(diag.message(), message, "message for `{source}`");
    }

    #[test]
    fn test_missing_close() {
        assert_error("{{ a ", ErrorCode::E101, "Missing \"}}\"");
        assert_error("{{ a b c", ErrorCode::E101, "Missing \"}}\"");
        assert_error("{{ if a x", ErrorCode::E101, "Missing \"}}\"");
    }

    #[test]
    fn test_missing_end() {
        assert_error("{{ if a }}x", ErrorCode::E101, "Missing \"{{ end }}\"");
        assert_error(
            "{{ if a }}x{{ else }}y",
            ErrorCode::E101,
            "Missing \"{{ end }}\"",
        );
        assert_error("{{ for v in a }}x", ErrorCode::E101, "Missing \"{{ end }}\"");
    }

    #[test]
    fn test_missing_end_points_at_keyword() {
        let diag = parse_err("ab{{ if a }}x");
        assert_eq!(diag.primary_span(), Some(Span::new(5..7)));
    }

    #[test]
    fn test_if_errors() {
        assert_error("{{ if }}{{ end }}", ErrorCode::E101, "Missing expression after \"if\"");
    }

    #[test]
    fn test_for_errors() {
        assert_error("{{ for }}", ErrorCode::E101, "Missing loop variable after \"for\"");
        assert_error("{{ for v, }}", ErrorCode::E101, "Missing index variable after \",\"");
        assert_error("{{ for v }}", ErrorCode::E101, "Missing \"in\" after loop variable");
        assert_error("{{ for v in }}", ErrorCode::E101, "Missing iterable after \"in\"");
    }

    #[test]
    fn test_expression_errors() {
        assert_error("{{ a. }}", ErrorCode::E101, "Missing member property");
        assert_error("{{ a[1 }}", ErrorCode::E101, "Missing \"]\"");
        assert_error("{{ fn(a }}", ErrorCode::E101, "Missing \")\"");
        assert_error("{{ (a }}", ErrorCode::E101, "Missing \")\"");
        assert_error("{{ [1, 2 }}", ErrorCode::E101, "Missing \"]\"");
        assert_error("{{ a + }}", ErrorCode::E101, "Missing expression after \"+\"");
        assert_error("{{ a ? b }}", ErrorCode::E101, "Missing \":\" in conditional expression");
        assert_error("{{ a | }}", ErrorCode::E101, "Missing expression after \"|\"");
        assert_error("{{ x := }}", ErrorCode::E101, "Missing expression after \":=\"");
    }

    #[test]
    fn test_minus_touching_close_trims() {
        let diag = parse_err("{{ a--}}");
        assert_eq!(diag.code(), Some(ErrorCode::E101));
        assert_eq!(diag.message(), "Missing expression after \"-\"");
    }

    #[test]
    fn test_missing_operand_span() {
        let diag = parse_err("{{ a + }}");
        assert_eq!(diag.primary_span(), Some(Span::new(7..8)));
    }

    #[test]
    fn test_invalid_update_targets() {
        assert_error(
            "{{ 1++ }}",
            ErrorCode::E104,
            "Invalid left-hand side expression in postfix operation",
        );
        assert_error(
            "{{ ++fn() }}",
            ErrorCode::E104,
            "Invalid left-hand side expression in prefix operation",
        );
    }

    #[test]
    fn test_loop_control_outside_loop() {
        assert_error(
            "{{ break }}",
            ErrorCode::E105,
            "\"break\" can only be used inside a \"for\" loop",
        );
        assert_error(
            "{{ for v in a }}{{ end }}{{ continue }}",
            ErrorCode::E105,
            "\"continue\" can only be used inside a \"for\" loop",
        );
    }

    #[test]
    fn test_deep_parentheses_fail_cleanly() {
        let depth = 200;
        let source = format!("{{{{ {}1{} }}}}", "(".repeat(depth), ")".repeat(depth));
        let diag = parse_err(&source);
        assert_eq!(diag.code(), Some(ErrorCode::E106));
        assert_eq!(diag.message(), "Nesting is deeper than 32 levels");
    }

    #[test]
    fn test_deep_prefixes_and_arrays_fail_cleanly() {
        let prefixes = format!("{{{{ {}a }}}}", "!".repeat(100));
        assert_eq!(parse_err(&prefixes).code(), Some(ErrorCode::E106));

        let arrays = format!("{{{{ {}{} }}}}", "[".repeat(100), "]".repeat(100));
        assert_eq!(parse_err(&arrays).code(), Some(ErrorCode::E106));
    }

    #[test]
    fn test_deep_blocks_fail_cleanly() {
        let source = format!("{}x{}", "{{ if a }}".repeat(60), "{{ end }}".repeat(60));
        assert_eq!(parse_err(&source).code(), Some(ErrorCode::E106));
    }

    #[test]
    fn test_stray_block_keywords() {
        assert_error("{{ end }}", ErrorCode::E100, "Unexpected \"end\"");
        assert_error("{{ else }}", ErrorCode::E100, "Unexpected \"else\"");
        assert_error(
            "{{ for v in a }}{{ else }}{{ end }}",
            ErrorCode::E100,
            "Unexpected \"else\"",
        );
    }

    #[test]
    fn test_reserved_words() {
        assert_error("{{ if := 1 }}", ErrorCode::E103, "\"if\" is a reserved word");
        assert_error("{{ true := 1 }}", ErrorCode::E103, "\"true\" is a reserved word");
        assert_error(
            "{{ for end in a }}{{ end }}",
            ErrorCode::E103,
            "\"end\" is a reserved word",
        );
    }

    #[test]
    fn test_literal_errors() {
        assert_error("{{ 0b }}", ErrorCode::E102, "Invalid binary literal");
        assert_error("{{ 123e }}", ErrorCode::E102, "Invalid exponent part");
        assert_error("{{ \"abc }}", ErrorCode::E001, "Unterminated string literal");
        assert_error("{{ /* x }}", ErrorCode::E101, "Missing \"*/\"");
    }

    #[test]
    fn test_rendered_error() {
        let source = "{{ if a }}\nbody";
        let err = parse(source, &Delimiters::default()).unwrap_err();
        let expected = "\
error[E101]: Missing \"{{ end }}\"
  1 | {{ if a }}
    |    ^^ missing token
  2 | body
  = help: close the block with an `end` tag";
        assert_eq!(err.render(source), expected);
    }
}
