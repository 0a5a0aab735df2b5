//! Helper functions callable from templates.
//!
//! A [`HelperRegistry`] maps names to [`Helper`]s. Registries are plain
//! values: build one, merge it into another, hand it to a
//! [`Context`](crate::Context). [`HelperRegistry::builtin`] holds the helpers
//! every context starts with.
//!
//! # Auto-loop
//!
//! Unless registered with [`HelperOptions::disable_auto_loop`], a helper
//! whose first argument is an array is applied to each element in turn and
//! the results are collected into an array. `{{ names | upper }}` upper-cases
//! every name without `upper` knowing about arrays.
//!
//! # Example
//!
//! ```
//! use stencil::{Context, ContextOptions, Value, helpers::{HelperError, HelperRegistry}};
//!
//! let mut helpers = HelperRegistry::new();
//! helpers.define("shout", |_, args| {
//!     let text = args.first().map(Value::render).unwrap_or_default();
//!     Ok(Value::from(format!("{}!", text.to_uppercase())))
//! });
//!
//! let mut context = Context::create(ContextOptions::default().with_helpers(helpers));
//! let output = stencil::render_str("{{ ['a', 'b'] | shout }}", &mut context).unwrap();
//! assert_eq!(output, "A!,B!");
//! ```

mod builtin;
mod case;

use std::{fmt, io, sync::Arc};

use indexmap::IndexMap;
use thiserror::Error;

use stencil_core::Value;

use crate::context::Context;

pub use case::{split_words, to_camel, to_constant, to_kebab, to_pascal, to_snake};

/// Error raised by a helper. The message is reported to the template author
/// unchanged.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("{0}")]
    Message(String),

    #[error("\"{helper}\" expects {expected} as argument {position} (got \"{found}\")")]
    InvalidArgument {
        helper: String,
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl HelperError {
    /// An error with a free-form message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// An argument of the wrong type. `position` is 1-based.
    pub fn invalid_argument(
        helper: &str,
        position: usize,
        expected: &'static str,
        found: &Value,
    ) -> Self {
        Self::InvalidArgument {
            helper: helper.to_string(),
            position,
            expected,
            found: found.type_name(),
        }
    }
}

/// The function signature of a helper.
///
/// Helpers receive the calling context, which they may read or modify, and
/// their fully evaluated arguments.
pub type HelperFn = dyn Fn(&mut Context, &[Value]) -> Result<Value, HelperError> + Send + Sync;

/// Registration options for a helper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelperOptions {
    /// Pass an array first argument to the helper as-is instead of mapping
    /// the helper over its elements.
    pub disable_auto_loop: bool,
}

/// A registered helper function.
#[derive(Clone)]
pub struct Helper {
    func: Arc<HelperFn>,
    options: HelperOptions,
}

impl Helper {
    pub fn options(&self) -> HelperOptions {
        self.options
    }

    /// Invoke the helper, applying auto-loop when enabled.
    ///
    /// # Errors
    ///
    /// Returns whatever error the helper raises.
    pub fn call(&self, context: &mut Context, args: &[Value]) -> Result<Value, HelperError> {
        match args.split_first() {
            Some((Value::Array(items), rest)) if !self.options.disable_auto_loop => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    let mut item_args = Vec::with_capacity(args.len());
                    item_args.push(item.clone());
                    item_args.extend_from_slice(rest);
                    results.push((self.func)(context, &item_args)?);
                }
                Ok(Value::Array(results))
            }
            _ => (self.func)(context, args),
        }
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A named set of helpers.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: IndexMap<String, Helper>,
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in helper.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register `func` under `name` with default options, replacing any
    /// helper of the same name.
    pub fn define<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut Context, &[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.define_with(name, func, HelperOptions::default())
    }

    /// Register `func` under `name` with explicit options.
    pub fn define_with<F>(
        &mut self,
        name: impl Into<String>,
        func: F,
        options: HelperOptions,
    ) -> &mut Self
    where
        F: Fn(&mut Context, &[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.helpers.insert(
            name.into(),
            Helper {
                func: Arc::new(func),
                options,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Helper names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// Add every helper of `other`, overriding helpers with the same name.
    pub fn merge(&mut self, other: HelperRegistry) {
        self.helpers.extend(other.helpers);
    }
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
