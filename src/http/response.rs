use std::fmt::Write;

use bytes::Bytes;
use http::header::LOCATION;
use http::response::Parts;
use http::{HeaderMap, StatusCode, Version};

const PAYLOAD_OMITTED: &str = "<<Payload is omitted>>";

/// A response whose body has been read to completion.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

/// Whether a rendered dump includes the buffered body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Included,
    Omitted,
}

impl CapturedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
            body: body.into(),
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First value of `name`, decoded lossily when it is not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    pub fn location(&self) -> Option<String> {
        self.header(LOCATION.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `404 Not Found`
    pub fn status_text(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {reason}", self.status.as_u16()),
            None => self.status.as_u16().to_string(),
        }
    }

    /// Renders the response the way it came off the wire: status line,
    /// headers, blank line, body.
    pub fn render(&self, payload: Payload) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:?} {}", self.version, self.status_text());
        for (name, value) in &self.headers {
            let _ = writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
        }
        out.push('\n');
        match payload {
            Payload::Included => out.push_str(&self.body_text()),
            Payload::Omitted => out.push_str(PAYLOAD_OMITTED),
        }
        out
    }
}
