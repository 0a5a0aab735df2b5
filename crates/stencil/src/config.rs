//! Configuration types for Stencil rendering.
//!
//! This module provides configuration structures that control how templates
//! are parsed and which variables every render starts with. All types
//! implement [`serde::Deserialize`] for loading from TOML files.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level application configuration.
//! - [`TemplateConfig`] - Controls the tag [`Delimiters`].
//!
//! # Example
//!
//! ```
//! # use stencil::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.template().tags().open(), "{{");
//! assert!(config.variables().is_empty());
//! ```

use serde::Deserialize;

use stencil_core::{Delimiters, value::Object};

/// Top-level application configuration.
///
/// ```toml
/// [template]
/// tags = ["<%", "%>"]
///
/// [variables]
/// author = "Ada"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Template syntax section.
    #[serde(default)]
    template: TemplateConfig,

    /// Variables available to every render.
    #[serde(default)]
    variables: Object,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] with the given template settings and
    /// default variables.
    pub fn new(template: TemplateConfig, variables: Object) -> Self {
        Self {
            template,
            variables,
        }
    }

    /// Returns the template configuration.
    pub fn template(&self) -> &TemplateConfig {
        &self.template
    }

    /// Returns the default variables.
    pub fn variables(&self) -> &Object {
        &self.variables
    }

    /// Returns the default variables for modification.
    pub fn variables_mut(&mut self) -> &mut Object {
        &mut self.variables
    }

    /// Check that the configuration can be used for rendering.
    ///
    /// # Errors
    ///
    /// Returns a message when a delimiter is empty or both delimiters are
    /// the same text.
    pub fn validate(&self) -> Result<(), String> {
        let tags = self.template.tags();
        if tags.open().is_empty() || tags.close().is_empty() {
            return Err("Tag delimiters must not be empty".to_string());
        }
        if tags.open() == tags.close() {
            return Err(format!(
                "Open and close tag delimiters must differ (both are \"{}\")",
                tags.open()
            ));
        }
        Ok(())
    }
}

/// Template syntax configuration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TemplateConfig {
    /// The open/close tag delimiter pair.
    #[serde(default)]
    tags: Delimiters,
}

impl TemplateConfig {
    /// Creates a new [`TemplateConfig`] with the given delimiters.
    pub fn new(tags: Delimiters) -> Self {
        Self { tags }
    }

    /// Returns the tag delimiters.
    pub fn tags(&self) -> &Delimiters {
        &self.tags
    }
}
