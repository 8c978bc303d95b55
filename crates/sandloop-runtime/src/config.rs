#![forbid(unsafe_code)]

//! Sandbox configuration.
//!
//! [`SandboxConfig`] names the sandbox (used in tracing fields and thread
//! names) and picks the built-in context for each stage. With the `config`
//! feature it can be loaded from TOML or JSON:
//!
//! ```toml
//! # sandloop.toml
//! name = "editor"
//! update_context = "worker"
//! render_context = "immediate"
//! ```
//!
//! ```rust,ignore
//! let config = SandboxConfig::from_toml_file("sandloop.toml")?;
//! ```
//!
//! Contexts passed explicitly to the builder take precedence over the kinds
//! named here.

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use sandloop_core::ContextKind;

/// Name and context selection for one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SandboxConfig {
    /// Label for tracing fields and context thread names.
    pub name: String,
    /// Context that runs the reducer and command tasks.
    pub update_context: ContextKind,
    /// Context that runs the view callback.
    pub render_context: ContextKind,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            name: "sandbox".to_string(),
            update_context: ContextKind::Immediate,
            render_context: ContextKind::Immediate,
        }
    }
}

impl SandboxConfig {
    /// Config with the given name and default contexts.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the update context kind.
    #[must_use]
    pub fn with_update_context(mut self, kind: ContextKind) -> Self {
        self.update_context = kind;
        self
    }

    /// Set the render context kind.
    #[must_use]
    pub fn with_render_context(mut self, kind: ContextKind) -> Self {
        self.render_context = kind;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Check field ranges. An empty list means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name must not be empty".into());
        }
        if self.name.contains('\0') {
            errors.push("name must not contain NUL bytes".into());
        }
        errors
    }

    /// [`validate`](Self::validate) as a `Result`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating a [`SandboxConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
