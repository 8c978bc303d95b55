#![forbid(unsafe_code)]

use std::fmt;

use sandloop_core::ContextError;

use crate::config::ConfigError;

/// Errors raised while starting a sandbox.
#[derive(Debug)]
pub enum SandboxError {
    /// A configured context or subscription thread could not be started.
    Context(ContextError),
    /// The configuration failed validation.
    Config(ConfigError),
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context(e) => write!(f, "context error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for SandboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<ContextError> for SandboxError {
    fn from(e: ContextError) -> Self {
        Self::Context(e)
    }
}

impl From<ConfigError> for SandboxError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        Self::Context(ContextError::Spawn(e))
    }
}
