use thiserror::Error;

use crate::translate::Location;
use crate::types::ids::EndpointParseError;

/// Main error type for vimbridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("connection to {endpoint} failed after {attempts} attempt(s): {reason}")]
    Connection {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("session error: {0}")]
    Session(String),

    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("endpoint parse error: {0}")]
    EndpointParse(#[from] EndpointParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure to turn an edit intent into a concrete location
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' is ambiguous: {}", format_candidates(.candidates))]
    Ambiguous {
        kind: &'static str,
        name: String,
        candidates: Vec<Location>,
    },

    #[error("a file path is required to locate {kind} '{name}' without a code graph")]
    FileRequired { kind: &'static str, name: String },

    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
}

fn format_candidates(candidates: &[Location]) -> String {
    candidates
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl BridgeError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Provisioning(_) => "provisioning_error",
            BridgeError::Launch(_) => "launch_error",
            BridgeError::Connection { .. } => "connection_error",
            BridgeError::Session(_) => "session_error",
            BridgeError::Command { .. } => "command_error",
            BridgeError::Resolution(ResolutionError::Ambiguous { .. }) => "ambiguous",
            BridgeError::Resolution(_) => "resolution_error",
            BridgeError::InvalidArgs(_) => "invalid_args",
            BridgeError::Config(_) => "invalid_config",
            BridgeError::EndpointParse(_) => "invalid_args",
            BridgeError::Io(_) => "io_error",
            BridgeError::Json(_) => "internal_error",
            BridgeError::TomlParse(_) => "invalid_config",
            BridgeError::TomlSerialize(_) => "internal_error",
            BridgeError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::InvalidArgs(_) | BridgeError::EndpointParse(_) => 2,
            BridgeError::Resolution(_) => 3,
            BridgeError::Command { .. } => 4,
            BridgeError::Session(_) | BridgeError::Connection { .. } => 5,
            BridgeError::Provisioning(_) | BridgeError::Launch(_) => 6,
            BridgeError::Config(_) | BridgeError::TomlParse(_) => 7,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            BridgeError::Provisioning(_) => vec![
                "Install neovim with your package manager and retry",
                "Or set server.editor_path in the config to an existing nvim binary",
            ],
            BridgeError::Launch(msg) => {
                if msg.contains("in use") {
                    vec![
                        "Run 'vimbridge server stop' to stop a previous server",
                        "Or pick another port with --endpoint",
                    ]
                } else {
                    vec!["Run 'vimbridge server status' to inspect the editor server"]
                }
            }
            BridgeError::Connection { .. } => vec![
                "Run 'vimbridge server start' to launch the editor server",
                "Check that --endpoint matches the server's listen address",
            ],
            BridgeError::Session(_) => vec!["Reconnect; a closed or failed session cannot be reused"],
            BridgeError::Resolution(ResolutionError::Ambiguous { .. }) => {
                vec!["Pass the file path to pick one of the candidates"]
            }
            BridgeError::Resolution(ResolutionError::NotFound { .. }) => vec![
                "Run 'vimbridge resolve <name>' to inspect the code graph",
                "Regenerate the code graph if the source changed",
            ],
            BridgeError::Resolution(ResolutionError::FileRequired { .. }) => {
                vec!["Pass the file path, or load a code graph with --graph"]
            }
            BridgeError::Config(_) | BridgeError::TomlParse(_) => {
                vec!["Check config.toml in the state directory"]
            }
            _ => vec![],
        }
    }

    /// Create a Command error for a rejected editor command
    pub fn command(command: impl ToString, message: impl Into<String>) -> Self {
        BridgeError::Command {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error was raised by the editor rather than the transport
    pub fn is_command_rejection(&self) -> bool {
        matches!(self, BridgeError::Command { .. } | BridgeError::Resolution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ambiguous_lists_all_candidates() {
        let err = ResolutionError::Ambiguous {
            kind: "function",
            name: "parse".to_string(),
            candidates: vec![
                Location::new(PathBuf::from("src/a.py"), Some(3)),
                Location::new(PathBuf::from("src/b.py"), Some(10)),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("src/a.py:3"));
        assert!(msg.contains("src/b.py:10"));
    }

    #[test]
    fn test_codes_and_exit_codes() {
        let err = BridgeError::command(":/foo", "E486: Pattern not found: foo");
        assert_eq!(err.error_code(), "command_error");
        assert_eq!(err.exit_code(), 4);
        assert!(err.is_command_rejection());

        let err = BridgeError::Session("closed".to_string());
        assert_eq!(err.exit_code(), 5);
        assert!(!err.is_command_rejection());
    }

    #[test]
    fn test_launch_suggestions_for_busy_port() {
        let err = BridgeError::Launch("port 6666 already in use".to_string());
        assert!(err.suggestions()[0].contains("server stop"));
    }
}
