use bytes::Bytes;
use http::uri::Scheme;
use http::{Method, Request, Uri};
use http_body_util::Full;

use super::error::HttpError;

#[derive(Debug, Clone)]
pub struct RequestInput {
    pub method: String,
    pub url: String,
    /// Sent only when present and non-empty.
    pub body: Option<String>,
}

impl RequestInput {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(&self) -> Result<Request<Full<Bytes>>, HttpError> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| HttpError::InvalidMethod(self.method.clone()))?;
        let uri = parse_url(&self.url)?;

        let body = match self.body.as_deref() {
            Some(body) if !body.is_empty() => Bytes::copy_from_slice(body.as_bytes()),
            _ => Bytes::new(),
        };

        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))?)
    }
}

fn parse_url(url: &str) -> Result<Uri, HttpError> {
    let invalid = |reason: String| HttpError::InvalidUri {
        url: url.to_string(),
        reason,
    };

    let uri: Uri = url.parse().map_err(|e| invalid(format!("{e}")))?;
    match uri.scheme() {
        Some(scheme) if *scheme == Scheme::HTTP || *scheme == Scheme::HTTPS => {}
        Some(scheme) => return Err(invalid(format!("unsupported scheme `{scheme}`"))),
        None => return Err(invalid("missing scheme (http:// or https://)".into())),
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(uri)
}
