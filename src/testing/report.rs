use std::fmt::{self, Display};

use crate::http::response::{CapturedResponse, Payload};

/// Failed assertions of one run, plus a dump of the response they ran
/// against.
#[derive(Debug, Clone)]
pub struct AssertionReport {
    failures: Vec<String>,
    dump: String,
}

impl AssertionReport {
    pub fn new(failures: Vec<String>, response: &CapturedResponse) -> Self {
        Self {
            failures,
            dump: response.render(Payload::Included),
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

impl Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.failures.len();
        let noun = if count == 1 { "assertion" } else { "assertions" };
        writeln!(f, "{count} {noun} failed:")?;
        for failure in &self.failures {
            writeln!(f, "- {failure}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.dump)
    }
}
