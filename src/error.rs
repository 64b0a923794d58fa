use std::error::Error;
use std::process::ExitCode;

use thiserror::Error;

use crate::cli::ConfigError;
use crate::http::error::HttpError;
use crate::testing::AssertionError;

/// Malformed flags, host mappings, patterns or request.
pub const EXIT_INVALID_INPUT: u8 = 91;
/// Request could not be sent, or the response failed its assertions.
pub const EXIT_REQUEST_FAILED: u8 = 93;
/// Anything else.
pub const EXIT_OTHER: u8 = 103;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot create {method} request: {}", error_chain(.source))]
    Request {
        method: String,
        #[source]
        source: HttpError,
    },

    #[error("Cannot set up HTTP client: {}", error_chain(.0))]
    Client(#[source] HttpError),

    #[error("Failed to send {method} request: {}", error_chain(.source))]
    Send {
        method: String,
        #[source]
        source: HttpError,
    },

    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Request { .. } => EXIT_INVALID_INPUT,
            AppError::Send { .. } | AppError::Assertion(_) => EXIT_REQUEST_FAILED,
            AppError::Client(_) => EXIT_OTHER,
        }
    }
}

impl From<AppError> for ExitCode {
    fn from(err: AppError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

/// `outer: inner: root cause`
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::ConnectTimeout;
    use std::time::Duration;

    #[test]
    fn exit_codes_follow_error_kind() {
        let config = AppError::Config(ConfigError::HostMapping {
            value: "x".into(),
            reason: "bad".into(),
        });
        assert_eq!(config.exit_code(), 91);

        let request = AppError::Request {
            method: "GET".into(),
            source: HttpError::InvalidMethod("G T".into()),
        };
        assert_eq!(request.exit_code(), 91);

        let send = AppError::Send {
            method: "GET".into(),
            source: HttpError::Timeout(Duration::from_secs(20)),
        };
        assert_eq!(send.exit_code(), 93);

        assert_eq!(AppError::Assertion(AssertionError::NoAssertions).exit_code(), 93);
        assert_eq!(
            AppError::Client(HttpError::Tls("no roots".into())).exit_code(),
            103
        );
    }

    #[test]
    fn send_error_message_includes_root_cause() {
        let err = AppError::Send {
            method: "POST".into(),
            source: HttpError::Transport(Box::new(ConnectTimeout(Duration::from_secs(10)))),
        };
        assert_eq!(
            err.to_string(),
            "Failed to send POST request: transport error: connection not established within 10s"
        );
    }

    #[test]
    fn assertion_errors_render_transparently() {
        let err = AppError::from(AssertionError::NoAssertions);
        assert_eq!(err.to_string(), "no assertions defined");
    }
}
