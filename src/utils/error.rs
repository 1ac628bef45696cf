use thiserror::Error;

/// Failures reported by a browsing session.
///
/// `Stale` and `NotFound` are expected while reading a live calendar and are
/// absorbed by the extractor and scanner. `Timeout` ends pagination early.
/// `Transport` means the session itself is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("element reference is stale")]
    Stale,

    #[error("no element matches selector '{selector}'")]
    NotFound { selector: String },

    #[error("timed out waiting for '{selector}'")]
    Timeout { selector: String },

    #[error("browser session failure: {message}")]
    Transport { message: String },
}

impl SessionError {
    pub fn transport(message: impl Into<String>) -> Self {
        SessionError::Transport {
            message: message.into(),
        }
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        SessionError::NotFound {
            selector: selector.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Transport { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid date label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },
}

impl NormalizeError {
    pub fn invalid(label: &str, reason: impl Into<String>) -> Self {
        NormalizeError::InvalidLabel {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Browser session error: {0}")]
    SessionError(#[from] SessionError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Scan interrupted after partial results were saved: {message}")]
    PartialScanError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Browser,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScrapeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScrapeError::IoError(_) | ScrapeError::SerializationError(_) => ErrorCategory::Storage,
            ScrapeError::SessionError(_) | ScrapeError::PartialScanError { .. } => {
                ErrorCategory::Browser
            }
            ScrapeError::ConfigError { .. }
            | ScrapeError::MissingConfigError { .. }
            | ScrapeError::InvalidConfigValueError { .. }
            | ScrapeError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScrapeError::PartialScanError { .. } => ErrorSeverity::Medium,
            ScrapeError::SessionError(e) if !e.is_fatal() => ErrorSeverity::Medium,
            ScrapeError::SessionError(_) => ErrorSeverity::Critical,
            ScrapeError::IoError(_) | ScrapeError::SerializationError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command line flags and the TOML configuration file"
            }
            ErrorCategory::Browser => {
                "Make sure chromedriver is running and reachable at the configured WebDriver URL"
            }
            ErrorCategory::Storage => "Check that the output directory exists and is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ScrapeError::SessionError(SessionError::Transport { message }) => {
                format!("Could not talk to the browser: {}", message)
            }
            ScrapeError::PartialScanError { .. } => {
                "The browser session ended early; partial availability was saved".to_string()
            }
            ScrapeError::IoError(e) => format!("Could not write the availability file: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        assert!(SessionError::transport("connection refused").is_fatal());
        assert!(!SessionError::Stale.is_fatal());
        assert!(!SessionError::not_found("div.calendar-day").is_fatal());
    }

    #[test]
    fn test_severity_drives_exit_codes() {
        let lost: ScrapeError = SessionError::transport("gone").into();
        assert_eq!(lost.severity(), ErrorSeverity::Critical);
        assert_eq!(lost.category(), ErrorCategory::Browser);

        let partial = ScrapeError::PartialScanError {
            message: "gone".to_string(),
        };
        assert_eq!(partial.severity(), ErrorSeverity::Medium);

        let config = ScrapeError::MissingConfigError {
            field: "target.url".to_string(),
        };
        assert_eq!(config.category(), ErrorCategory::Configuration);
        assert_eq!(config.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_invalid_label_message_echoes_label() {
        let err = NormalizeError::invalid("31 feb", "day out of range");
        assert_eq!(
            err.to_string(),
            "invalid date label '31 feb': day out of range"
        );
    }
}
