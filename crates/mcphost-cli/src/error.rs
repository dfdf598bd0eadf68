//! CLI-specific error types and exit code mapping.

use mcphost_core::{ConfigFileError, ErrorCategory, HostError, SettingsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by the tool host.
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The tool ran but reported an error result.
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Exit codes follow sysexits.h where a category fits:
    /// - 1: General error (tool failures)
    /// - 2: Invalid arguments
    /// - 66: Unknown server or tool (`EX_NOINPUT`)
    /// - 69: Server process unavailable (`EX_UNAVAILABLE`)
    /// - 74: IO error
    /// - 76: Protocol error (`EX_PROTOCOL`)
    /// - 78: Configuration error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Host(err) => match err.category() {
                ErrorCategory::Process => 69,
                ErrorCategory::Protocol => 76,
                ErrorCategory::Tool => 1,
                ErrorCategory::Configuration => 78,
                ErrorCategory::NotFound => 66,
            },
            Self::Settings(_) | Self::ConfigFile(_) => 78,
            Self::Arguments(_) => 2,
            Self::ToolFailed { .. } => 1,
            Self::Io(_) => 74,
        }
    }
}

/// Exit code for an error surfaced through `anyhow`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_error_category() {
        assert_eq!(
            CliError::from(HostError::unknown_server("x")).exit_code(),
            66
        );
        assert_eq!(
            CliError::from(HostError::spawn("x", "not found")).exit_code(),
            69
        );
        assert_eq!(
            CliError::from(HostError::Timeout {
                server_id: "x".into(),
                method: "tools/call".into(),
                timeout_ms: 10,
            })
            .exit_code(),
            76
        );
        assert_eq!(CliError::Arguments("bad".into()).exit_code(), 2);
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let err = anyhow::Error::from(CliError::Arguments("bad".into()));
        assert_eq!(exit_code_for(&err), 2);
        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), 1);
    }
}
