//! The helpers every context starts with.

use std::{fmt::Write as _, fs};

use chrono::Local;
use regex::Regex;

use stencil_core::Value;
use stencil_parser::parse_expression;

use super::{HelperError, HelperOptions, HelperRegistry, case};
use crate::{compiler, context::Context};

static UNDEFINED: Value = Value::Undefined;

const NO_AUTO_LOOP: HelperOptions = HelperOptions {
    disable_auto_loop: true,
};

pub(super) fn register(registry: &mut HelperRegistry) {
    let strings: [(&str, fn(&str) -> String); 10] = [
        ("camel", case::to_camel),
        ("snake", case::to_snake),
        ("pascal", case::to_pascal),
        ("kebab", case::to_kebab),
        ("constant", case::to_constant),
        ("upper", str::to_uppercase),
        ("lower", str::to_lowercase),
        ("trim", |s| s.trim().to_string()),
        ("ltrim", |s| s.trim_start().to_string()),
        ("rtrim", |s| s.trim_end().to_string()),
    ];
    for (name, convert) in strings {
        registry.define(name, move |_, args| Ok(Value::from(convert(&text(args, 0)))));
    }

    registry
        .define("replace", replace)
        .define("split", split)
        .define_with("join", join, NO_AUTO_LOOP)
        .define_with("seq", seq, NO_AUTO_LOOP)
        .define_with("append", append, NO_AUTO_LOOP)
        .define_with("uniq", uniq, NO_AUTO_LOOP)
        .define_with("slice", slice, NO_AUTO_LOOP)
        .define_with("contains", contains, NO_AUTO_LOOP)
        .define_with("len", len, NO_AUTO_LOOP)
        .define_with("before", before, NO_AUTO_LOOP)
        .define_with("after", after, NO_AUTO_LOOP)
        .define_with("date", date, NO_AUTO_LOOP)
        .define_with("eval", eval, NO_AUTO_LOOP)
        .define_with("define", define, NO_AUTO_LOOP)
        .define_with("resolve", resolve, NO_AUTO_LOOP)
        .define_with("read", read, NO_AUTO_LOOP)
        .define_with("noop", |_, _| Ok(Value::from("")), NO_AUTO_LOOP);
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&UNDEFINED)
}

/// The argument as output text; missing arguments are empty.
fn text(args: &[Value], index: usize) -> String {
    arg(args, index).render()
}

fn number(helper: &str, args: &[Value], index: usize) -> Result<f64, HelperError> {
    let value = arg(args, index);
    value
        .as_number()
        .ok_or_else(|| HelperError::invalid_argument(helper, index + 1, "a number", value))
}

fn optional_number(
    helper: &str,
    args: &[Value],
    index: usize,
    default: f64,
) -> Result<f64, HelperError> {
    match arg(args, index) {
        Value::Undefined => Ok(default),
        _ => number(helper, args, index),
    }
}

fn pattern(source: &str) -> Result<Regex, HelperError> {
    Regex::new(source).map_err(|err| HelperError::new(format!("Invalid pattern \"{source}\": {err}")))
}

/// Resolve a possibly negative index against `len`, clamped to `0..=len`.
fn relative_index(index: f64, len: usize) -> usize {
    let len_f = len as f64;
    let index = index.trunc();
    let resolved = if index < 0.0 { len_f + index } else { index };
    resolved.clamp(0.0, len_f) as usize
}

fn replace(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let regex = pattern(&text(args, 1))?;
    let replacement = text(args, 2);
    Ok(Value::from(
        regex.replace_all(&text(args, 0), replacement.as_str()).into_owned(),
    ))
}

fn split(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let source = text(args, 0);
    let separator = text(args, 1);
    let parts: Vec<Value> = if separator.is_empty() {
        source.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        source.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

fn join(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let items = match arg(args, 0) {
        Value::Array(items) => items,
        other => return Err(HelperError::invalid_argument("join", 1, "an array", other)),
    };
    let separator = match arg(args, 1) {
        Value::Undefined => ",".to_string(),
        other => other.render(),
    };
    let parts: Vec<String> = items.iter().map(Value::render).collect();
    Ok(Value::from(parts.join(&separator)))
}

fn seq(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let (start, end) = match arg(args, 1) {
        Value::Undefined => (1.0, number("seq", args, 0)?),
        _ => (number("seq", args, 0)?, number("seq", args, 1)?),
    };
    let step = optional_number("seq", args, 2, 1.0)?;
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !end.is_finite() {
        return Err(HelperError::new(
            "\"seq\" needs finite bounds and a non-zero step",
        ));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0.0 && current <= end) || (step < 0.0 && current >= end) {
        items.push(Value::Number(current));
        current += step;
    }
    Ok(Value::Array(items))
}

fn append(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    match arg(args, 0) {
        Value::Array(items) => {
            let mut items = items.clone();
            items.extend_from_slice(args.get(1..).unwrap_or_default());
            Ok(Value::Array(items))
        }
        Value::String(head) => {
            let mut out = head.clone();
            for item in args.iter().skip(1) {
                out.push_str(&item.render());
            }
            Ok(Value::from(out))
        }
        other => Err(HelperError::invalid_argument(
            "append",
            1,
            "an array or a string",
            other,
        )),
    }
}

fn uniq(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let items = match arg(args, 0) {
        Value::Array(items) => items,
        other => return Err(HelperError::invalid_argument("uniq", 1, "an array", other)),
    };
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    Ok(Value::Array(unique))
}

fn slice(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let start = optional_number("slice", args, 1, 0.0)?;
    let end = match arg(args, 2) {
        Value::Undefined => None,
        _ => Some(number("slice", args, 2)?),
    };

    match arg(args, 0) {
        Value::Array(items) => {
            let from = relative_index(start, items.len());
            let to = end.map_or(items.len(), |end| relative_index(end, items.len()));
            Ok(Value::Array(items.get(from..to).unwrap_or_default().to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let from = relative_index(start, chars.len());
            let to = end.map_or(chars.len(), |end| relative_index(end, chars.len()));
            Ok(Value::from(
                chars.get(from..to).unwrap_or_default().iter().collect::<String>(),
            ))
        }
        other => Err(HelperError::invalid_argument(
            "slice",
            1,
            "an array or a string",
            other,
        )),
    }
}

fn contains(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let needle = arg(args, 1);
    match arg(args, 0) {
        Value::Array(items) => Ok(Value::Bool(items.contains(needle))),
        Value::String(s) => Ok(Value::Bool(s.contains(needle.render().as_str()))),
        other => Err(HelperError::invalid_argument(
            "contains",
            1,
            "an array or a string",
            other,
        )),
    }
}

fn len(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    match arg(args, 0) {
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        other => Err(HelperError::invalid_argument(
            "len",
            1,
            "an array, an object or a string",
            other,
        )),
    }
}

/// Index of the line named by a 1-based line number or the first line
/// matching a pattern. Negative line numbers count from the last line.
fn locate_line(helper: &str, lines: &[&str], locator: &Value) -> Result<Option<usize>, HelperError> {
    match locator {
        Value::Number(n) if *n >= 1.0 => Ok(Some(n.trunc() as usize - 1)),
        Value::Number(n) if *n <= -1.0 => {
            let from_end = -n.trunc();
            let len = lines.len() as f64;
            Ok((from_end <= len).then(|| (len - from_end) as usize))
        }
        Value::Number(_) => Ok(None),
        Value::String(source) => {
            let regex = pattern(source)?;
            Ok(lines.iter().position(|line| regex.is_match(line)))
        }
        other => Err(HelperError::invalid_argument(
            helper,
            2,
            "a line number or a pattern",
            other,
        )),
    }
}

/// Lines before the located line. `offset` moves the cut point.
fn before(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let content = text(args, 0);
    let lines: Vec<&str> = content.split('\n').collect();
    let offset = optional_number("before", args, 2, 0.0)?;
    let Some(index) = locate_line("before", &lines, arg(args, 1))? else {
        return Ok(Value::from(""));
    };
    let end = relative_cut(index as f64 + offset, lines.len());
    Ok(Value::from(lines[..end].join("\n")))
}

/// Lines after the located line. `offset` moves the cut point.
fn after(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let content = text(args, 0);
    let lines: Vec<&str> = content.split('\n').collect();
    let offset = optional_number("after", args, 2, 0.0)?;
    let Some(index) = locate_line("after", &lines, arg(args, 1))? else {
        return Ok(Value::from(""));
    };
    let start = relative_cut(index as f64 + 1.0 + offset, lines.len());
    Ok(Value::from(lines[start..].join("\n")))
}

fn relative_cut(position: f64, len: usize) -> usize {
    position.trunc().clamp(0.0, len as f64) as usize
}

fn date(_: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let format = match arg(args, 0) {
        Value::Undefined => "%Y-%m-%d".to_string(),
        other => other.render(),
    };
    let mut out = String::new();
    write!(out, "{}", Local::now().format(&format))
        .map_err(|_| HelperError::new(format!("Invalid date format \"{format}\"")))?;
    Ok(Value::from(out))
}

/// Evaluate a stencil expression against the calling context.
///
/// Only trusted input should reach this helper: the expression can call any
/// registered helper.
fn eval(context: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let source = text(args, 0);
    let expr = parse_expression(&source).map_err(|err| {
        let message = err
            .diagnostics()
            .first()
            .map_or_else(|| err.to_string(), |diag| diag.message().to_string());
        HelperError::new(format!("Invalid expression \"{source}\": {message}"))
    })?;
    compiler::evaluate(&expr, context).map_err(|diag| HelperError::new(diag.message()))
}

fn define(context: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let name = match arg(args, 1) {
        Value::String(name) if !name.is_empty() => name.clone(),
        other => return Err(HelperError::invalid_argument("define", 2, "a name", other)),
    };
    context.declare(name, arg(args, 0).clone());
    Ok(Value::from(""))
}

fn resolve(context: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let path = args
        .iter()
        .fold(context.cwd().to_path_buf(), |path, segment| path.join(segment.render()));
    Ok(Value::from(path.to_string_lossy().into_owned()))
}

fn read(context: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
    let path = context.cwd().join(text(args, 0));
    fs::read_to_string(&path)
        .map(Value::from)
        .map_err(|err| HelperError::new(format!("Failed to read \"{}\": {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, HelperError> {
        let mut context = Context::new();
        call_in(&mut context, name, args)
    }

    fn call_in(context: &mut Context, name: &str, args: Vec<Value>) -> Result<Value, HelperError> {
        let helper = context.helper(name).cloned().unwrap();
        helper.call(context, &args)
    }

    fn ok(name: &str, args: Vec<Value>) -> Value {
        call(name, args).unwrap_or_else(|err| panic!("{name} failed: {err}"))
    }

    fn strings(items: &[&str]) -> Value {
        Value::from(items.to_vec())
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(ok("camel", vec!["hello world".into()]), "helloWorld".into());
        assert_eq!(ok("pascal", vec!["hello world".into()]), "HelloWorld".into());
        assert_eq!(ok("snake", vec!["helloWorld".into()]), "hello_world".into());
        assert_eq!(ok("kebab", vec!["HelloWorld".into()]), "hello-world".into());
        assert_eq!(ok("constant", vec!["hello world".into()]), "HELLO_WORLD".into());
        assert_eq!(ok("upper", vec!["abc".into()]), "ABC".into());
        assert_eq!(ok("lower", vec!["ABC".into()]), "abc".into());
    }

    #[test]
    fn test_case_helpers_auto_loop() {
        assert_eq!(
            ok("upper", vec![strings(&["a", "b"])]),
            strings(&["A", "B"])
        );
    }

    #[test]
    fn test_trim_helpers() {
        assert_eq!(ok("trim", vec!["  x  ".into()]), "x".into());
        assert_eq!(ok("ltrim", vec!["  x  ".into()]), "x  ".into());
        assert_eq!(ok("rtrim", vec!["  x  ".into()]), "  x".into());
    }

    #[test]
    fn test_replace() {
        assert_eq!(
            ok("replace", vec!["a-b-c".into(), "-".into(), "+".into()]),
            "a+b+c".into()
        );
        assert_eq!(
            ok(
                "replace",
                vec!["john smith".into(), r"(\w+) (\w+)".into(), "$2 $1".into()]
            ),
            "smith john".into()
        );
        assert!(call("replace", vec!["a".into(), "(".into(), "".into()]).is_err());
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(ok("split", vec!["a,b".into(), ",".into()]), strings(&["a", "b"]));
        assert_eq!(ok("split", vec!["ab".into(), "".into()]), strings(&["a", "b"]));
        assert_eq!(ok("join", vec![strings(&["a", "b"])]), "a,b".into());
        assert_eq!(ok("join", vec![strings(&["a", "b"]), " / ".into()]), "a / b".into());
        assert!(call("join", vec!["ab".into()]).is_err());
    }

    #[test]
    fn test_seq() {
        assert_eq!(ok("seq", vec![3.into()]), Value::from(vec![1, 2, 3]));
        assert_eq!(ok("seq", vec![2.into(), 4.into()]), Value::from(vec![2, 3, 4]));
        assert_eq!(
            ok("seq", vec![5.into(), 1.into(), Value::from(-2)]),
            Value::from(vec![5, 3, 1])
        );
        assert_eq!(ok("seq", vec![3.into(), 1.into()]), Value::Array(Vec::new()));
        assert!(call("seq", vec![1.into(), 3.into(), 0.into()]).is_err());
        assert!(call("seq", vec!["x".into()]).is_err());
    }

    #[test]
    fn test_append_and_uniq() {
        assert_eq!(
            ok("append", vec![strings(&["a"]), "b".into(), "c".into()]),
            strings(&["a", "b", "c"])
        );
        assert_eq!(ok("append", vec!["a".into(), "b".into()]), "ab".into());
        assert_eq!(
            ok("uniq", vec![strings(&["a", "b", "a", "c", "b"])]),
            strings(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_slice() {
        assert_eq!(ok("slice", vec!["hello".into(), 1.into(), 3.into()]), "el".into());
        assert_eq!(ok("slice", vec!["hello".into(), Value::from(-3)]), "llo".into());
        assert_eq!(
            ok("slice", vec![Value::from(vec![1, 2, 3, 4]), 1.into(), Value::from(-1)]),
            Value::from(vec![2, 3])
        );
        assert_eq!(
            ok("slice", vec![Value::from(vec![1, 2]), 5.into()]),
            Value::Array(Vec::new())
        );
    }

    #[test]
    fn test_contains_and_len() {
        assert_eq!(ok("contains", vec!["hello".into(), "ell".into()]), true.into());
        assert_eq!(ok("contains", vec![strings(&["a", "b"]), "c".into()]), false.into());
        assert_eq!(ok("len", vec!["héllo".into()]), 5.into());
        assert_eq!(ok("len", vec![strings(&["a", "b"])]), 2.into());
        assert!(call("len", vec![3.into()]).is_err());
    }

    #[test]
    fn test_before_and_after() {
        let content = Value::from("one\ntwo\n// marker\nthree\nfour");

        assert_eq!(
            ok("before", vec![content.clone(), "marker".into()]),
            "one\ntwo".into()
        );
        assert_eq!(
            ok("after", vec![content.clone(), "marker".into()]),
            "three\nfour".into()
        );
        assert_eq!(ok("before", vec![content.clone(), 2.into()]), "one".into());
        assert_eq!(
            ok("after", vec![content.clone(), 2.into(), 1.into()]),
            "three\nfour".into()
        );
        assert_eq!(ok("after", vec![content, "missing".into()]), "".into());
    }

    #[test]
    fn test_before_and_after_count_from_end() {
        let content = Value::from("a\nb\nc");

        assert_eq!(ok("before", vec![content.clone(), (-1).into()]), "a\nb".into());
        assert_eq!(ok("after", vec![content.clone(), (-2).into()]), "c".into());
        assert_eq!(ok("after", vec![content.clone(), (-3).into()]), "b\nc".into());
        assert_eq!(ok("before", vec![content.clone(), (-4).into()]), "".into());
        assert_eq!(ok("before", vec![content, 0.into()]), "".into());
    }

    #[test]
    fn test_date_default_format() {
        let today = ok("date", Vec::new()).render();
        assert_eq!(today.len(), 10);
        assert_eq!(today.matches('-').count(), 2);
        assert_eq!(ok("date", vec!["%%".into()]), "%".into());
    }

    #[test]
    fn test_eval_uses_context() {
        let mut context = Context::new();
        context.declare("n", Value::from(20));

        let result = call_in(&mut context, "eval", vec!["n * 2 + 2".into()]).unwrap();
        assert_eq!(result, Value::from(42));

        let err = call_in(&mut context, "eval", vec!["n +".into()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid expression \"n +\": Missing expression after \"+\""
        );
    }

    #[test]
    fn test_define_declares_variable() {
        let mut context = Context::new();
        let result = call_in(&mut context, "define", vec!["x".into(), "name".into()]).unwrap();

        assert_eq!(result, "".into());
        assert_eq!(context.get("name"), Some(&Value::from("x")));
        assert!(call_in(&mut context, "define", vec!["x".into()]).is_err());
    }

    #[test]
    fn test_resolve_and_read() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.txt"), "hello").unwrap();

        let mut context = Context::create(
            crate::context::ContextOptions::default().with_cwd(dir.path()),
        );

        let resolved = call_in(&mut context, "resolve", vec!["a".into(), "b.txt".into()]).unwrap();
        assert_eq!(
            resolved,
            Value::from(dir.path().join("a").join("b.txt").to_string_lossy().into_owned())
        );

        let content = call_in(&mut context, "read", vec!["note.txt".into()]).unwrap();
        assert_eq!(content, "hello".into());

        let err = call_in(&mut context, "read", vec!["missing.txt".into()]).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read"));
    }

    #[test]
    fn test_noop() {
        assert_eq!(ok("noop", vec![1.into(), 2.into()]), "".into());
    }
}
