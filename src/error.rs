use std::path::PathBuf;

use serde::Deserialize;

pub type Result<T> = std::result::Result<T, Error>;

/// One entry of the upstream `{"errors": [...]}` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Application is not linked to Twitter.")]
    AuthMissing,

    #[error("network error: {0}")]
    NetworkTransport(#[from] reqwest::Error),

    #[error("server rejected the request: {}", summarize(.0))]
    ApiRejected(Vec<ApiError>),

    #[error("malformed JSON in {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Body for the modal warning shown after a failed fetch.
    pub fn warning_text(&self) -> String {
        match self {
            Error::ApiRejected(errors) => errors
                .iter()
                .map(|e| format!("{} (code: {})\n", e.message, e.code))
                .collect(),
            other => format!("{}\n", other),
        }
    }

    /// Whether the failure should pop up a modal in addition to the status line.
    pub fn is_modal(&self) -> bool {
        matches!(self, Error::NetworkTransport(_) | Error::ApiRejected(_))
    }
}

fn summarize(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} (code: {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_text_lists_every_api_error() {
        let err = Error::ApiRejected(vec![
            ApiError {
                message: "Rate limit exceeded".to_string(),
                code: 88,
            },
            ApiError {
                message: "Invalid or expired token".to_string(),
                code: 89,
            },
        ]);
        let text = err.warning_text();
        assert_eq!(
            text,
            "Rate limit exceeded (code: 88)\nInvalid or expired token (code: 89)\n"
        );
        assert!(err.is_modal());
    }

    #[test]
    fn test_auth_missing_is_not_modal() {
        let err = Error::AuthMissing;
        assert!(!err.is_modal());
        assert_eq!(err.to_string(), "Application is not linked to Twitter.");
    }

    #[test]
    fn test_display_api_rejected() {
        let err = Error::ApiRejected(vec![ApiError {
            message: "Rate".to_string(),
            code: 88,
        }]);
        assert_eq!(err.to_string(), "server rejected the request: Rate (code: 88)");
    }
}
