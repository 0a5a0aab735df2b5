//! CLI logic for the Stencil template tool.
//!
//! [`run`] loads the configuration and dispatches the parsed [`Args`] to the
//! `render`, `fmt` or `tokens` command.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command, FmtArgs, RenderArgs, TokensArgs};

use std::{
    fs,
    io::{self, Write},
};

use log::{debug, info, warn};

use stencil::{StencilError, TemplateEngine};

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// `fmt --check` found a file that is not formatted.
    Unformatted,
}

/// Run the Stencil CLI application, writing command output to stdout.
///
/// # Errors
///
/// Returns `StencilError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Parsing errors
/// - Compile errors
pub fn run(args: &Args) -> Result<Status, StencilError> {
    let stdout = io::stdout();
    run_with_output(args, &mut stdout.lock())
}

/// Run the Stencil CLI application, writing command output to `out`.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_output(args: &Args, out: &mut dyn Write) -> Result<Status, StencilError> {
    let app_config = config::load_config(args.config.as_ref())?;
    let engine = TemplateEngine::new(app_config);

    match &args.command {
        Command::Render(render_args) => render(&engine, render_args, out),
        Command::Fmt(fmt_args) => fmt(&engine, fmt_args, out),
        Command::Tokens(tokens_args) => tokens(&engine, tokens_args, out),
    }
}

fn render(
    engine: &TemplateEngine,
    args: &RenderArgs,
    out: &mut dyn Write,
) -> Result<Status, StencilError> {
    info!(input_path = args.input; "Rendering template");

    let source = fs::read_to_string(&args.input)?;

    let mut variables = match &args.vars {
        Some(path) => config::load_variables(path)?,
        None => Default::default(),
    };
    for (key, raw) in &args.set {
        variables.insert(key.clone(), config::parse_value(raw));
    }
    debug!(variables = variables.len(); "Variables collected");

    let output = engine.render_with(&source, variables)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &output)?;
            info!(output_file = path; "Output written");
        }
        None => out.write_all(output.as_bytes())?,
    }

    Ok(Status::Success)
}

fn fmt(
    engine: &TemplateEngine,
    args: &FmtArgs,
    out: &mut dyn Write,
) -> Result<Status, StencilError> {
    info!(input_path = args.input; "Formatting template");

    let source = fs::read_to_string(&args.input)?;
    let formatted = engine.format_source(&source)?;
    let changed = formatted != source;

    if args.check {
        if changed {
            warn!(input_path = args.input; "Template is not formatted");
            return Ok(Status::Unformatted);
        }
        info!(input_path = args.input; "Template is formatted");
    } else if args.write {
        if changed {
            fs::write(&args.input, &formatted)?;
            info!(output_file = args.input; "Template rewritten");
        } else {
            debug!(input_path = args.input; "Template already formatted");
        }
    } else {
        out.write_all(formatted.as_bytes())?;
    }

    Ok(Status::Success)
}

fn tokens(
    engine: &TemplateEngine,
    args: &TokensArgs,
    out: &mut dyn Write,
) -> Result<Status, StencilError> {
    info!(input_path = args.input; "Tokenizing template");

    let source = fs::read_to_string(&args.input)?;
    let tokens = engine.tokenize(&source)?;

    for token in &tokens {
        writeln!(out, "{token}")?;
    }
    debug!(tokens = tokens.len(); "Tokens written");

    Ok(Status::Success)
}
