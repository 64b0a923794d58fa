//! # Testing & Assertions
//!
//! Predicates over a captured HTTP response. Every configured assertion is
//! evaluated, failures are collected in declaration order and turned into a
//! single [`AssertionReport`].

mod report;

pub use report::AssertionReport;

use std::fmt::{self, Display};

use http::HeaderName;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::http::response::CapturedResponse;

/// Longest body excerpt quoted in a failure message. The report carries the
/// full body anyway.
const BODY_PREVIEW_CHARS: usize = 120;

/// A single check against the response.
#[derive(Debug, Clone)]
pub enum Assertion {
    /// Status is 2xx.
    StatusOk,
    /// Status is not 2xx.
    StatusNotOk,
    StatusEqual(u16),
    RedirectEqual(String),
    RedirectMatch(Regex),
    HeaderPresent(HeaderName),
    HeaderEqual(HeaderName, String),
    HeaderMatch(HeaderName, Regex),
    BodyEqual(String),
    BodyMatch(Regex),
}

/// Outcome of a single assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionResult {
    Pass,
    Fail(String),
}

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("no assertions defined")]
    NoAssertions,
    #[error("{0}")]
    Failed(AssertionReport),
}

impl Assertion {
    pub fn check(&self, response: &CapturedResponse) -> AssertionResult {
        let status = response.status();
        match self {
            Assertion::StatusOk => {
                if status.is_success() {
                    return AssertionResult::Pass;
                }
                fail(format!(
                    "expected a successful (2xx) status, got {}",
                    response.status_text()
                ))
            }
            Assertion::StatusNotOk => {
                if !status.is_success() {
                    return AssertionResult::Pass;
                }
                fail(format!(
                    "expected a non-successful (non-2xx) status, got {}",
                    response.status_text()
                ))
            }
            Assertion::StatusEqual(expected) => {
                if status.as_u16() == *expected {
                    return AssertionResult::Pass;
                }
                fail(format!(
                    "expected status {expected}, got {}",
                    response.status_text()
                ))
            }
            Assertion::RedirectEqual(expected) => match response.location() {
                Some(location) if location == *expected => AssertionResult::Pass,
                Some(location) => fail(format!(
                    "expected redirect to {expected:?}, got {location:?}"
                )),
                None => fail(format!(
                    "expected redirect to {expected:?}, but there is no Location header"
                )),
            },
            Assertion::RedirectMatch(pattern) => match response.location() {
                Some(location) if pattern.is_match(&location) => AssertionResult::Pass,
                Some(location) => fail(format!(
                    "expected redirect matching /{pattern}/, got {location:?}"
                )),
                None => fail(format!(
                    "expected redirect matching /{pattern}/, but there is no Location header"
                )),
            },
            Assertion::HeaderPresent(name) => match response.header(name.as_str()) {
                Some(_) => AssertionResult::Pass,
                None => fail(format!("expected header {:?} to be present", name.as_str())),
            },
            Assertion::HeaderEqual(name, expected) => match response.header(name.as_str()) {
                Some(value) if value == *expected => AssertionResult::Pass,
                Some(value) => fail(format!(
                    "expected header {:?} to equal {expected:?}, got {value:?}",
                    name.as_str()
                )),
                None => fail(format!(
                    "expected header {:?} to equal {expected:?}, but it is missing",
                    name.as_str()
                )),
            },
            Assertion::HeaderMatch(name, pattern) => match response.header(name.as_str()) {
                Some(value) if pattern.is_match(&value) => AssertionResult::Pass,
                Some(value) => fail(format!(
                    "expected header {:?} to match /{pattern}/, got {value:?}",
                    name.as_str()
                )),
                None => fail(format!(
                    "expected header {:?} to match /{pattern}/, but it is missing",
                    name.as_str()
                )),
            },
            Assertion::BodyEqual(expected) => {
                if response.body().as_ref() == expected.as_bytes() {
                    return AssertionResult::Pass;
                }
                fail(format!(
                    "expected body to equal {expected:?}, got {:?}",
                    preview(&response.body_text())
                ))
            }
            Assertion::BodyMatch(pattern) => {
                let body = response.body_text();
                if pattern.is_match(&body) {
                    return AssertionResult::Pass;
                }
                fail(format!(
                    "expected body to match /{pattern}/, got {:?}",
                    preview(&body)
                ))
            }
        }
    }
}

impl Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::StatusOk => write!(f, "status is 2xx"),
            Assertion::StatusNotOk => write!(f, "status is not 2xx"),
            Assertion::StatusEqual(code) => write!(f, "status == {code}"),
            Assertion::RedirectEqual(url) => write!(f, "location == {url:?}"),
            Assertion::RedirectMatch(pattern) => write!(f, "location =~ /{pattern}/"),
            Assertion::HeaderPresent(name) => write!(f, "header {name} present"),
            Assertion::HeaderEqual(name, value) => write!(f, "header {name} == {value:?}"),
            Assertion::HeaderMatch(name, pattern) => write!(f, "header {name} =~ /{pattern}/"),
            Assertion::BodyEqual(value) => write!(f, "body == {value:?}"),
            Assertion::BodyMatch(pattern) => write!(f, "body =~ /{pattern}/"),
        }
    }
}

/// Runs every assertion against `response`. Fails when no assertion is
/// configured or when at least one of them fails.
pub fn run_assertions(
    assertions: &[Assertion],
    response: &CapturedResponse,
) -> Result<(), AssertionError> {
    if assertions.is_empty() {
        return Err(AssertionError::NoAssertions);
    }

    let mut failures = Vec::new();
    for assertion in assertions {
        match assertion.check(response) {
            AssertionResult::Pass => debug!(%assertion, "assertion passed"),
            AssertionResult::Fail(message) => {
                debug!(%assertion, %message, "assertion failed");
                failures.push(message);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AssertionError::Failed(AssertionReport::new(failures, response)))
    }
}

fn fail(message: String) -> AssertionResult {
    AssertionResult::Fail(message)
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
