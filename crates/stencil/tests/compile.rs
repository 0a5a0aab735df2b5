//! End-to-end compile tests through the public API.

use stencil::{
    Context, ContextOptions, Delimiters, Diagnostic, ErrorCode, Value, compile,
    helpers::HelperRegistry, parse,
};

fn context_with(variables: serde_json::Value) -> Context {
    let variables = match Value::from(variables) {
        Value::Object(map) => map,
        other => panic!("variables must be an object, got {other:?}"),
    };
    Context::create(ContextOptions::default().with_variables(variables))
}

fn render(source: &str, context: &mut Context) -> Result<String, Diagnostic> {
    let program = parse(source, &Delimiters::default()).expect("Failed to parse");
    compile(&program, context)
}

fn render_ok(source: &str) -> String {
    render(source, &mut Context::new()).unwrap_or_else(|err| panic!("{source}: {err}"))
}

#[test]
fn test_readme_template() {
    let source = "\
{{- name := 'user profile' -}}
struct {{ name | pascal }} {
{{- for field, i in fields }}
    {{ field | snake }}: String, // #{{ i + 1 }}
{{- end }}
}
";
    let mut context = context_with(serde_json::json!({
        "fields": ["firstName", "LastName", "email address"],
    }));

    let output = render(source, &mut context).expect("Failed to render");
    assert_eq!(
        output,
        "struct UserProfile {\n    first_name: String, // #1\n    last_name: String, // #2\n    email_address: String, // #3\n}\n"
    );
}

#[test]
fn test_trim_laws() {
    assert_eq!(render_ok(" {{- \"a\" }} "), "a ");
    assert_eq!(render_ok(" {{ \"a\" -}} "), " a");
    assert_eq!(render_ok(" {{- \"a\" -}} "), "a");
}

#[test]
fn test_arithmetic_laws() {
    assert_eq!(render_ok("{{ 2 / 0 }}"), "Infinity");
    assert_eq!(render_ok("{{ 13 % 5 }}"), "3");
    assert_eq!(render_ok("{{ -13 % 5 }}"), "-3");
    assert_eq!(render_ok("{{ ~123 }}"), "-124");
    assert_eq!(render_ok("{{ 0b01 + 0o17 + 0xaf12 }}"), "44834");
    assert_eq!(render_ok("{{ 123.4e+5 }}"), "12340000");
}

#[test]
fn test_update_semantics() {
    let mut context = context_with(serde_json::json!({ "a": 1 }));
    assert_eq!(render("{{ a++ }}{{ a }}", &mut context).unwrap(), "12");

    let mut context = context_with(serde_json::json!({ "a": { "b": 1 } }));
    assert_eq!(render("{{ ++a.b }}{{ a.b }}", &mut context).unwrap(), "22");
}

#[test]
fn test_loop_control() {
    assert_eq!(
        render_ok("{{ for v in [1,2,3] }}{{ if v==2 }}a{{ continue }}{{ end }}{{ v }}{{ end }}"),
        "1a3"
    );
    assert_eq!(
        render_ok("{{ for v in [1,2,3] }}{{ if v==2 }}a{{ break }}{{ end }}{{ v }}{{ end }}"),
        "1a"
    );
}

#[test]
fn test_loop_scoping() {
    assert_eq!(
        render_ok("{{ v:=\"v\" }}{{ i:=\"i\" }}{{ for v,i in [1,2,3] }}{{v}}{{i}}{{ end }}{{v}}{{i}}"),
        "102132vi"
    );
}

#[test]
fn test_nested_loops_with_control() {
    let source = "\
{{- for row in [1, 2, 3] -}}
{{- if row == 2 }}{{ continue }}{{ end -}}
{{- for col in [1, 2, 3] -}}
{{- if col > row }}{{ break }}{{ end -}}
{{ row }}{{ col }} {{- end -}}
;{{ end }}";
    assert_eq!(render_ok(source), "11;313233;");
}

#[test]
fn test_pipe_with_arguments() {
    let mut helpers = HelperRegistry::new();
    helpers.define("fn", |_, args| {
        Ok(Value::from(args.iter().map(Value::render).collect::<String>()))
    });
    let mut context = Context::create(ContextOptions::default().with_helpers(helpers));

    assert_eq!(
        render("{{ \"a\" | fn \"b\" -10 }}", &mut context).unwrap(),
        "ab-10"
    );
}

#[test]
fn test_missing_members_are_empty() {
    let mut context = context_with(serde_json::json!({
        "arr": [1, 2, 3],
        "obj": { "key": "value" },
    }));
    assert_eq!(
        render("[{{ arr.100 }}][{{ obj.nope }}][{{ obj['key'] }}]", &mut context).unwrap(),
        "[][][value]"
    );
}

#[test]
fn test_builtin_helpers_in_templates() {
    assert_eq!(render_ok("{{ 'a,b,c' | split ',' | join '-' }}"), "a-b-c");
    assert_eq!(render_ok("{{ seq(1, 10, 3) | join }}"), "1,4,7,10");
    assert_eq!(render_ok("{{ [1, 2, 1, 3] | uniq | len }}"), "3");
    assert_eq!(render_ok("{{ 'hello world' | replace 'o' '0' }}"), "hell0 w0rld");
    assert_eq!(render_ok("{{ ['a', 'b'] | append 'c' | join '' }}"), "abc");
    assert_eq!(render_ok("{{ 'Hello' | slice 1 -1 }}"), "ell");
    assert_eq!(render_ok("{{ eval('1 + 2') }}"), "3");
    assert_eq!(render_ok("{{ 'name' | constant }}"), "NAME");
}

mod error_tests {
    use super::*;

    fn render_err(source: &str) -> Diagnostic {
        render(source, &mut Context::new()).expect_err("Should fail to compile")
    }

    #[test]
    fn test_error_messages() {
        let cases = [
            ("{{ nope() }}", ErrorCode::E201, "\"nope\" helper function is not defined"),
            ("{{ missing }}", ErrorCode::E200, "\"missing\" identifier does not exist"),
            (
                "{{ null.a }}",
                ErrorCode::E205,
                "Cannot read properties of \"null\" (reading \"a\")",
            ),
            (
                "{{ [1][true] }}",
                ErrorCode::E206,
                "Property key must be string or numeric (got \"boolean\")",
            ),
            (
                "{{ 'a' - 1 }}",
                ErrorCode::E203,
                "Operator \"-\" requires operands of the same data type (left: \"string\", right: \"number\")",
            ),
            (
                "{{ null >= null }}",
                ErrorCode::E204,
                "Operator \">=\" cannot be applied to \"null\" and \"null\"",
            ),
        ];

        for (source, code, message) in cases {
            let diag = render_err(source);
            assert_eq!(diag.code(), Some(code), "{source}");
            assert_eq!(diag.message(), message, "{source}");
        }
    }

    #[test]
    fn test_error_renders_against_source() {
        let source = "line one\n{{ 1 + null }}\nline three";
        let diag = render_err(source);
        let rendered = diag.render(source);

        assert!(rendered.starts_with("error[E203]: Operator \"+\" requires operands"));
        assert!(rendered.contains("2 | {{ 1 + null }}"));
        assert!(rendered.contains("^^^^^^^^"));
    }
}
