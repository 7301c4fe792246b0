use std::fmt;

/// Structured error type for the server. Every variant is handled where it
/// occurs; none of them abort the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed frame arity or an unparsable field.
    ValidationError { message: String },
    NotFound { what: String },
    AlreadyExists { what: String },
    /// The speech generator exited non-zero, timed out or could not start.
    ExternalTool { message: String },
    IoError { message: String },
    JsonError { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    /// Reason string used in `projectError|<reason>` replies.
    pub fn client_reason(&self) -> String {
        match self {
            AppError::NotFound { .. } => "File not found".to_string(),
            AppError::AlreadyExists { .. } => "File already exists".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError { message } => write!(f, "{message}"),
            AppError::NotFound { what } => write!(f, "{what} not found"),
            AppError::AlreadyExists { what } => write!(f, "{what} already exists"),
            AppError::ExternalTool { message } => write!(f, "Generator failed: {message}"),
            AppError::IoError { message } => write!(f, "I/O error: {message}"),
            AppError::JsonError { message } => write!(f, "JSON error: {message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::JsonError {
            message: e.to_string(),
        }
    }
}

impl From<crate::project::ProjectError> for AppError {
    fn from(e: crate::project::ProjectError) -> Self {
        match e {
            crate::project::ProjectError::Io(io_err) => AppError::IoError {
                message: io_err.to_string(),
            },
            crate::project::ProjectError::Json(json_err) => AppError::JsonError {
                message: json_err.to_string(),
            },
            crate::project::ProjectError::NotFound(what) => AppError::NotFound { what },
            crate::project::ProjectError::AlreadyExists(what) => AppError::AlreadyExists { what },
            crate::project::ProjectError::InvalidName(msg) => {
                AppError::ValidationError { message: msg }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_reasons_match_protocol_strings() {
        let missing = AppError::NotFound {
            what: "Project 'x.json'".into(),
        };
        let dup = AppError::AlreadyExists {
            what: "Project 'x.json'".into(),
        };
        assert_eq!(missing.client_reason(), "File not found");
        assert_eq!(dup.client_reason(), "File already exists");
        assert_eq!(AppError::validation("bad name").client_reason(), "bad name");
    }

    #[test]
    fn project_errors_convert_by_kind() {
        let err: AppError = crate::project::ProjectError::AlreadyExists("x".into()).into();
        assert_eq!(err.client_reason(), "File already exists");
        let io: AppError = std::io::Error::other("disk full").into();
        assert_eq!(io.to_string(), "I/O error: disk full");
    }
}
