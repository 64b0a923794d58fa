//! # Runner
//!
//! One invocation: build the request, send it, capture the response and run
//! every assertion against it.

use tracing::{debug, info};

use crate::cli::RunConfig;
use crate::error::AppError;
use crate::http::client::HttpClient;
use crate::http::response::Payload;
use crate::testing::{AssertionError, run_assertions};

pub async fn run(config: &RunConfig) -> Result<(), AppError> {
    let method = &config.request.method;
    let request = config.request.build().map_err(|source| AppError::Request {
        method: method.clone(),
        source,
    })?;

    if config.assertions.is_empty() {
        return Err(AssertionError::NoAssertions.into());
    }

    for rule in config.transport.hosts.rules() {
        debug!(%rule, "host mapping");
    }
    let client = HttpClient::new(&config.transport).map_err(AppError::Client)?;
    let response = client
        .send(request)
        .await
        .map_err(|source| AppError::Send {
            method: method.clone(),
            source,
        })?;
    debug!("received response:\n{}", response.render(Payload::Omitted));

    if let Err(err) = run_assertions(&config.assertions, &response) {
        if let AssertionError::Failed(report) = &err {
            info!(
                failed = report.failures().len(),
                total = config.assertions.len(),
                "assertions failed"
            );
        }
        return Err(err.into());
    }
    info!(count = config.assertions.len(), "all assertions passed");
    Ok(())
}
