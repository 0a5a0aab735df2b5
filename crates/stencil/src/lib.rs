//! Stencil - A small template language for generating text files.
//!
//! Templates mix raw text with `{{ ... }}` tags holding expressions,
//! variable declarations, `if` blocks and `for` loops. This crate ties the
//! parser to the compiler, the formatter and the helper functions templates
//! call.

pub mod config;
pub mod helpers;

mod compiler;
mod context;
mod error;
mod format;

pub use stencil_core::{Delimiters, Value, ast, value::Object};
pub use stencil_parser::{Diagnostic, ErrorCode, ParseError, Token, parse, tokenize};

pub use compiler::{compile, evaluate};
pub use context::{Context, ContextOptions};
pub use error::StencilError;
pub use format::format;

use log::{debug, info, trace};

use config::AppConfig;

/// Parse `source` with the context's delimiters and compile it.
///
/// # Errors
///
/// Returns [`StencilError::Parse`] or [`StencilError::Compile`] carrying the
/// source for rendering.
///
/// # Examples
///
/// ```
/// use stencil::{Context, ContextOptions};
///
/// let mut context = Context::create(ContextOptions::default().with_variable("name", "world"));
/// let output = stencil::render_str("Hello {{ name | upper }}!", &mut context).unwrap();
/// assert_eq!(output, "Hello WORLD!");
/// ```
pub fn render_str(source: &str, context: &mut Context) -> Result<String, StencilError> {
    let program = parse(source, context.tags())
        .map_err(|err| StencilError::new_parse_error(err, source))?;
    compile(&program, context).map_err(|err| StencilError::new_compile_error(err, source))
}

/// Entry point for parsing, rendering and formatting templates.
///
/// The engine holds an [`AppConfig`]; every render starts from a fresh root
/// [`Context`] built from the configured delimiters and variables.
///
/// # Examples
///
/// ```rust
/// use stencil::{TemplateEngine, config::AppConfig};
///
/// let engine = TemplateEngine::new(AppConfig::default());
///
/// let output = engine
///     .render("{{ for n in seq(3) }}{{ n }}{{ end }}")
///     .expect("Failed to render");
/// assert_eq!(output, "123");
///
/// let formatted = engine.format_source("{{x:=1}}").expect("Failed to format");
/// assert_eq!(formatted, "{{ x := 1 }}");
/// ```
#[derive(Debug, Default)]
pub struct TemplateEngine {
    config: AppConfig,
}

impl TemplateEngine {
    /// Create a new engine with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A root context holding the configured delimiters and variables.
    pub fn context(&self) -> Context {
        Context::create(
            ContextOptions::default()
                .with_tags(self.config.template().tags().clone())
                .with_variables(self.config.variables().clone()),
        )
    }

    /// Tokenize source with the configured delimiters.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::Parse` when the tokenizer reports problems.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>, StencilError> {
        debug!("Tokenizing template");
        tokenize(source, self.config.template().tags())
            .map_err(|err| StencilError::new_parse_error(err, source))
    }

    /// Parse source into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::Parse` for syntax errors.
    pub fn parse(&self, source: &str) -> Result<ast::Program, StencilError> {
        info!(bytes = source.len(); "Parsing template");

        let program = parse(source, self.config.template().tags())
            .map_err(|err| StencilError::new_parse_error(err, source))?;

        debug!(elements = program.elements.len(); "Template parsed successfully");
        trace!(program:?; "Parsed template");

        Ok(program)
    }

    /// Render source with the configured variables.
    ///
    /// # Errors
    ///
    /// Returns `StencilError` for syntax errors and compile errors.
    pub fn render(&self, source: &str) -> Result<String, StencilError> {
        self.render_with(source, Object::new())
    }

    /// Render source with extra variables layered over the configured ones.
    ///
    /// # Errors
    ///
    /// Returns `StencilError` for syntax errors and compile errors.
    pub fn render_with(&self, source: &str, variables: Object) -> Result<String, StencilError> {
        let program = self.parse(source)?;

        info!(variables = variables.len(); "Rendering template");
        let mut context = self
            .context()
            .extend(ContextOptions::default().with_variables(variables));
        let output = compile(&program, &mut context)
            .map_err(|err| StencilError::new_compile_error(err, source))?;

        info!(bytes = output.len(); "Template rendered successfully");
        Ok(output)
    }

    /// Parse source and print it in canonical form.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::Parse` for syntax errors.
    pub fn format_source(&self, source: &str) -> Result<String, StencilError> {
        let program = self.parse(source)?;
        let formatted = format(&program);
        debug!(changed = formatted != source; "Template formatted");
        Ok(formatted)
    }
}
