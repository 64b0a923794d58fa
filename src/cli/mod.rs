//! # CLI Support
//!
//! Command-line surface for CI usage. Flags are validated once and turned into
//! an immutable [`RunConfig`]; nothing here touches the network.

use std::time::Duration;

use clap::Parser;
use http::HeaderName;
use regex::Regex;
use thiserror::Error;

use crate::http::config::{ProxyMode, TransportConfig};
use crate::http::remap::{HostMap, HostMapping};
use crate::http::request::RequestInput;
use crate::testing::Assertion;

/// Perform HTTP request and assert received HTTP response
#[derive(Debug, Parser)]
#[command(name = "http-assert", version)]
pub struct Cli {
    /// URL to request
    #[arg(value_name = "URL")]
    pub url: String,

    /// Provide a custom address for a specific host and port pair
    #[arg(long = "maphost", value_name = "HOST:PORT:ADDR[:DSTPORT]")]
    pub maphost: Vec<String>,

    /// Request method to use
    #[arg(short = 'X', long = "request", value_name = "METHOD", default_value = "GET")]
    pub request: String,

    /// Request body; nothing is sent when empty
    #[arg(short = 'd', long = "data", value_name = "DATA")]
    pub data: Option<String>,

    /// Assert response status equals the provided value
    #[arg(long, value_name = "CODE")]
    pub assert_status: Option<u16>,

    /// Assert header; `=NAME:VALUE` for exact match, `NAME:REGEX` otherwise,
    /// `NAME` alone for presence
    #[arg(long, value_name = "[=]NAME[:VALUE]")]
    pub assert_header: Vec<String>,

    /// Assert body; `=VALUE` for exact match, a regex otherwise
    #[arg(short = 'B', long, value_name = "[=]VALUE", allow_hyphen_values = true)]
    pub assert_body: Option<String>,

    /// Assert response is successful (2xx); `--assert-ok=false` asserts it is not
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub assert_ok: Option<bool>,

    /// Assert response redirects to the provided URL; `=URL` for exact match,
    /// a regex otherwise
    #[arg(long, value_name = "[=]VALUE")]
    pub assert_redirect: Option<String>,

    /// Maximum time to establish the TCP connection
    #[arg(long, value_name = "DURATION", default_value = "10s", value_parser = humantime::parse_duration)]
    pub connect_timeout: Duration,

    /// Maximum time for the whole request, body included
    #[arg(long, value_name = "DURATION", default_value = "20s", value_parser = humantime::parse_duration)]
    pub max_time: Duration,

    /// Ignore proxy environment variables. Only http:// proxies are supported
    #[arg(long)]
    pub no_proxy: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for --maphost flag: {value:?}: {reason}")]
    HostMapping { value: String, reason: String },

    #[error("Invalid regular expression for {flag}: {source}")]
    Pattern {
        flag: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid header name {name:?} for --assert-header")]
    HeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
}

/// Everything one invocation needs, validated up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub request: RequestInput,
    pub assertions: Vec<Assertion>,
    pub transport: TransportConfig,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let hosts = parse_host_mappings(&self.maphost)?;
        let assertions = self.assertions()?;

        let mut request = RequestInput::new(self.request, self.url);
        if let Some(data) = self.data.filter(|data| !data.is_empty()) {
            request = request.with_body(data);
        }

        let transport = TransportConfig {
            hosts,
            connect_timeout: self.connect_timeout,
            request_timeout: self.max_time,
            proxy: if self.no_proxy {
                ProxyMode::Disabled
            } else {
                ProxyMode::FromEnv
            },
            ..TransportConfig::default()
        };

        Ok(RunConfig {
            request,
            assertions,
            transport,
        })
    }

    /// Assertions in a fixed order: ok, redirect, status, headers, body.
    fn assertions(&self) -> Result<Vec<Assertion>, ConfigError> {
        let mut assertions = Vec::new();

        match self.assert_ok {
            Some(true) => assertions.push(Assertion::StatusOk),
            Some(false) => assertions.push(Assertion::StatusNotOk),
            None => {}
        }

        if let Some(value) = &self.assert_redirect {
            assertions.push(match value.strip_prefix('=') {
                Some(exact) => Assertion::RedirectEqual(exact.to_string()),
                None => Assertion::RedirectMatch(compile("--assert-redirect", value)?),
            });
        }

        if let Some(status) = self.assert_status {
            assertions.push(Assertion::StatusEqual(status));
        }

        for value in &self.assert_header {
            assertions.push(parse_header_assertion(value)?);
        }

        if let Some(value) = &self.assert_body {
            assertions.push(match value.strip_prefix('=') {
                Some(exact) => Assertion::BodyEqual(exact.to_string()),
                None => Assertion::BodyMatch(compile("--assert-body", value)?),
            });
        }

        Ok(assertions)
    }
}

fn parse_host_mappings(values: &[String]) -> Result<HostMap, ConfigError> {
    let rules = values
        .iter()
        .map(|value| {
            value
                .parse::<HostMapping>()
                .map_err(|reason| ConfigError::HostMapping {
                    value: value.clone(),
                    reason,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HostMap::new(rules))
}

/// `[=]NAME[:VALUE]`, both parts trimmed. An empty value only checks presence.
fn parse_header_assertion(value: &str) -> Result<Assertion, ConfigError> {
    let (name, expected) = match value.split_once(':') {
        Some((name, expected)) => (name.trim(), expected.trim()),
        None => (value.trim(), ""),
    };
    let (name, exact) = match name.strip_prefix('=') {
        Some(name) => (name, true),
        None => (name, false),
    };

    let header = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
        ConfigError::HeaderName {
            name: name.to_string(),
            source,
        }
    })?;

    Ok(if expected.is_empty() {
        Assertion::HeaderPresent(header)
    } else if exact {
        Assertion::HeaderEqual(header, expected.to_string())
    } else {
        Assertion::HeaderMatch(header, compile("--assert-header", expected)?)
    })
}

fn compile(flag: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern { flag, source })
}
