//! Render context: variables, helpers and settings for one compile.
//!
//! Variables live in a stack of scope frames. The root frame holds the
//! variables the host passed in; `for` loops push a frame per iteration for
//! their value and index names. Lookups walk the frames innermost-first.

use std::{
    env,
    path::{Path, PathBuf},
};

use log::debug;

use stencil_core::{Delimiters, Value, value::Object};

use crate::helpers::{Helper, HelperRegistry};

/// Options for [`Context::create`] and [`Context::extend`].
///
/// Unset options fall back to the defaults (or, for `extend`, to the values
/// of the context being extended).
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    cwd: Option<PathBuf>,
    tags: Option<Delimiters>,
    variables: Object,
    helpers: HelperRegistry,
}

impl ContextOptions {
    /// Base directory for helpers that touch the file system.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_tags(mut self, tags: Delimiters) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Object) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Helpers added on top of the built-in set, replacing built-ins with the
    /// same name.
    pub fn with_helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers.merge(helpers);
        self
    }
}

/// Everything a template can see while it is compiled.
#[derive(Debug, Clone)]
pub struct Context {
    cwd: PathBuf,
    tags: Delimiters,
    /// Never empty; index 0 is the root frame.
    scopes: Vec<Object>,
    helpers: HelperRegistry,
}

impl Context {
    /// A context with the built-in helpers, default tags, no variables and the
    /// process working directory.
    pub fn new() -> Self {
        Self::create(ContextOptions::default())
    }

    pub fn create(options: ContextOptions) -> Self {
        let cwd = options
            .cwd
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let mut helpers = HelperRegistry::builtin();
        helpers.merge(options.helpers);

        debug!(
            cwd:? = cwd,
            variables = options.variables.len(),
            helpers = helpers.len();
            "Context created"
        );

        Self {
            cwd,
            tags: options.tags.unwrap_or_default(),
            scopes: vec![options.variables],
            helpers,
        }
    }

    /// A new context derived from this one.
    ///
    /// Variables are flattened into a single root frame and overlaid with the
    /// option variables; helpers are merged; `cwd` and `tags` are replaced
    /// when given. `self` is left untouched.
    pub fn extend(&self, options: ContextOptions) -> Context {
        let mut variables = self.variables();
        variables.extend(options.variables);
        let mut helpers = self.helpers.clone();
        helpers.merge(options.helpers);

        Context {
            cwd: options.cwd.unwrap_or_else(|| self.cwd.clone()),
            tags: options.tags.unwrap_or_else(|| self.tags.clone()),
            scopes: vec![variables],
            helpers,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn tags(&self) -> &Delimiters {
        &self.tags
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    /// Look up a variable, innermost scope first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }

    /// Bind `name` to `value`.
    ///
    /// Writes to the innermost frame that already binds `name`, otherwise to
    /// the root frame. A loop variable can therefore be reassigned inside its
    /// loop without leaking, while new names outlive the loop.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.get_mut(&name) {
            *slot = value;
            return;
        }
        if let Some(root) = self.scopes.first_mut() {
            root.insert(name, value);
        }
    }

    /// All visible variables, inner bindings shadowing outer ones.
    pub fn variables(&self) -> Object {
        let mut flat = Object::new();
        for frame in &self.scopes {
            for (name, value) in frame {
                flat.insert(name.clone(), value.clone());
            }
        }
        flat
    }

    pub(crate) fn push_scope(&mut self, frame: Object) {
        self.scopes.push(frame);
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
