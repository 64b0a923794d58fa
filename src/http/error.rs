use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building or sending the request.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUri { url: String, reason: String },

    #[error("failed to build request")]
    RequestBuild(#[from] http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error")]
    Transport(#[source] BoxError),

    #[error("failed to read response body")]
    Body(#[source] BoxError),

    #[error("TLS setup failed")]
    Tls(#[source] BoxError),
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

/// Connection establishment did not finish within its deadline.
#[derive(Error, Debug)]
#[error("connection not established within {0:?}")]
pub struct ConnectTimeout(pub Duration);

/// The environment selected a proxy this client cannot speak to.
#[derive(Error, Debug)]
#[error("unsupported proxy `{0}`: only http:// proxies are supported")]
pub struct UnsupportedProxy(pub String);
