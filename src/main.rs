mod cli;
mod error;
mod http;
mod logging;
mod runner;
mod testing;

use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use cli::Cli;
use error::{AppError, EXIT_INVALID_INPUT};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_error(&err),
    };
    logging::init(cli.verbose);

    let result = match cli.into_config() {
        Ok(config) => runner::run(&config).await,
        Err(err) => Err(AppError::from(err)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err.to_string().trim_end());
            err.into()
        }
    }
}

fn parse_error(err: &clap::Error) -> ExitCode {
    match parse_failure(err) {
        Some(message) => {
            eprintln!("{message}");
            ExitCode::from(EXIT_INVALID_INPUT)
        }
        None => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
    }
}

/// Diagnostic for a rejected command line, or `None` when clap only has help
/// or version output to print.
fn parse_failure(err: &clap::Error) -> Option<String> {
    if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        return None;
    }
    let rendered = err.to_string();
    let message = rendered.strip_prefix("error: ").unwrap_or(&rendered);
    Some(format!("Error: {}", message.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> clap::Error {
        let mut argv = vec!["http-assert"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap_err()
    }

    #[test]
    fn help_and_version_are_not_failures() {
        assert_eq!(parse_failure(&parse(&["--help"])), None);
        assert_eq!(parse_failure(&parse(&["--version"])), None);
    }

    #[test]
    fn usage_errors_are_prefixed() {
        let message = parse_failure(&parse(&[])).unwrap();
        assert!(message.starts_with("Error: "), "{message}");
        assert!(!message.starts_with("Error: error:"), "{message}");
        assert!(message.contains("<URL>"), "{message}");

        let message = parse_failure(&parse(&["http://x/", "--assert-status", "abc"])).unwrap();
        assert!(message.contains("--assert-status"), "{message}");
    }
}
