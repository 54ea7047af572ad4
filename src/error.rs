//! Error handling for url-forge

use thiserror::Error;

/// Main error type for url-forge
#[derive(Error, Debug, Clone)]
pub enum UrlForgeError {
    #[error("Pattern syntax error{}: {message}", position_suffix(.position))]
    PatternSyntax {
        message: String,
        position: Option<usize>,
    },

    #[error("Generation failure: {message}")]
    Generation { message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        url: Option<String>,
    },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },

    #[error("Failed to write log record: {message}")]
    SinkWrite {
        message: String,
        path: Option<String>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    #[error("Archive error for '{url}': {message}")]
    Archive { message: String, url: String },
}

impl UrlForgeError {
    /// Create a pattern syntax error
    pub fn pattern_syntax(message: impl Into<String>, position: Option<usize>) -> Self {
        Self::PatternSyntax {
            message: message.into(),
            position,
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(
        message: impl Into<String>,
        status_code: Option<u16>,
        url: Option<String>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            status_code,
            url,
        }
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(message: impl Into<String>, path: Option<String>) -> Self {
        Self::SinkWrite {
            message: message.into(),
            path,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Io {
            message: message.into(),
            path,
        }
    }

    /// Create an archive error
    pub fn archive(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Whether this error must stop the whole run.
    ///
    /// Per-candidate failures never do; only pre-flight and persistence
    /// problems are fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PatternSyntax { .. }
                | Self::SinkWrite { .. }
                | Self::Config { .. }
                | Self::Io { .. }
        )
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::PatternSyntax { message, position } => {
                format!("❌ Invalid pattern{}: {}\n💡 Check brackets, groups, quantifiers and the --limit value", position_suffix(position), message)
            }
            Self::Generation { message } => {
                format!("⚠️  Could not generate candidate: {}", message)
            }
            Self::Network { message, status_code, .. } => {
                let status = status_code.map_or(String::new(), |c| format!(" ({})", c));
                format!("❌ Network error{}: {}\n💡 Check your internet connection", status, message)
            }
            Self::Unexpected { message } => {
                format!("❌ Unexpected error: {}", message)
            }
            Self::SinkWrite { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("❌ Could not persist results{}: {}\n💡 Check disk space and permissions of the log directory", path_info, message)
            }
            Self::Config { message } => {
                format!("❌ Configuration problem: {}\n💡 Check your flags, environment or .env file", message)
            }
            Self::Io { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("❌ File error{}: {}\n💡 Check file permissions and paths", path_info, message)
            }
            Self::Archive { message, url } => {
                format!("⚠️  Could not archive contents of {}: {}", url, message)
            }
        }
    }
}

fn position_suffix(position: &Option<usize>) -> String {
    position.map_or(String::new(), |p| format!(" at position {}", p))
}

/// Convert from common error types
impl From<reqwest::Error> for UrlForgeError {
    fn from(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let url = err.url().map(|u| u.to_string());

        if err.is_builder() {
            Self::unexpected(err.to_string())
        } else {
            Self::network(err.to_string(), status_code, url)
        }
    }
}

impl From<serde_yaml::Error> for UrlForgeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::unexpected(format!("YAML serialization failed: {}", err))
    }
}

impl From<serde_json::Error> for UrlForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(format!("JSON serialization failed: {}", err))
    }
}

impl From<std::io::Error> for UrlForgeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string(), None)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UrlForgeError>;

/// Helper macros for common error patterns
#[macro_export]
macro_rules! pattern_error {
    ($pos:expr, $msg:expr) => {
        $crate::error::UrlForgeError::pattern_syntax($msg, Some($pos))
    };
    ($pos:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::UrlForgeError::pattern_syntax(format!($fmt, $($arg)*), Some($pos))
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::UrlForgeError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::UrlForgeError::config(format!($fmt, $($arg)*))
    };
}
