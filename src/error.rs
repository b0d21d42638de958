//! Error taxonomy shared by every harness component.

use crate::runner::{Expectation, InvocationResult};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Banner every aggregated failure message starts with.
pub const FAILURE_BANNER: &str = "Plugin is not well-behaved";

/// Outcome of a scenario phase that did not complete normally.
///
/// `Aborted` is not a failure: it marks the scenario as inapplicable and keeps
/// it out of both the pass and the fail counts.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("aborted: {reason}")]
    Aborted { reason: String },

    #[error("{message}")]
    Assertion { message: String },

    #[error("panicked: {message}")]
    Panicked { message: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Any other error raised by a custom [`TestCase`](crate::TestCase)
    /// implementation.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CaseError {
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// One failed scenario: its display name plus the original cause.
#[derive(Debug)]
pub struct CaseFailure {
    pub display_name: String,
    pub cause: CaseError,
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_name, self.cause)
    }
}

impl std::error::Error for CaseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Every failed scenario of one run, in execution order.
///
/// Only ever built complete, once the whole run has finished.
#[derive(Debug)]
pub struct AggregatedFailure {
    failures: Vec<CaseFailure>,
}

impl AggregatedFailure {
    /// Returns `None` when there is nothing to report.
    pub fn from_failures(failures: Vec<CaseFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    pub fn failures(&self) -> &[CaseFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<CaseFailure> {
        self.failures
    }

    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.display_name.as_str())
    }
}

impl fmt::Display for AggregatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.failures.len();
        let noun = if count == 1 { "failure" } else { "failures" };
        write!(f, "{FAILURE_BANNER} ({count} {noun})")?;
        for failure in &self.failures {
            write!(f, "\n\t{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}

/// Problems detected before any scenario runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing qualified plugin id and/or plugin type")]
    MissingIdentity,

    #[error(transparent)]
    Load(#[from] crate::loader::LoadError),

    #[error("failed to interpolate {field}: {source}")]
    Interpolation {
        field: String,
        source: crate::env::InterpolationError,
    },
}

/// Workspace allocation and cleanup failures.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append to {}: {source}", path.display())]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to clean up workspace {} after {attempts} attempt(s): {source}", path.display())]
    Cleanup {
        path: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },
}

/// Failures while driving the external build tool.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("failed to wait for {command}: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("failed to read plugin metadata {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write classpath init script {}: {source}", path.display())]
    InitScript {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}", describe_unexpected(*expected, args, result))]
    UnexpectedOutcome {
        expected: Expectation,
        args: Vec<String>,
        result: Box<InvocationResult>,
    },
}

fn describe_unexpected(expected: Expectation, args: &[String], result: &InvocationResult) -> String {
    let verb = match expected {
        Expectation::Success => "expected build to succeed",
        Expectation::Failure => "expected build to fail",
    };
    let status = match (result.exit_code, result.signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "unknown status".to_string(),
    };
    let mut message = format!("{verb} [{}] but got {status}", args.join(" "));
    let detail = result.stderr.trim();
    let detail = if detail.is_empty() {
        result.stdout.trim()
    } else {
        detail
    };
    if !detail.is_empty() {
        message.push('\n');
        message.push_str(detail);
    }
    message
}

/// Error surfaced by [`crate::Harness::run`].
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    NotWellBehaved(#[from] AggregatedFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_failure_lists_every_case_in_order() {
        let failure = AggregatedFailure::from_failures(vec![
            CaseFailure {
                display_name: "does not realize task (project)".to_string(),
                cause: CaseError::assertion("configured tasks: [:foo]"),
            },
            CaseFailure {
                display_name: "can execute help task (project)".to_string(),
                cause: CaseError::assertion("boom"),
            },
        ])
        .unwrap();

        let message = failure.to_string();
        assert!(message.starts_with("Plugin is not well-behaved (2 failures)"));
        let realize = message.find("does not realize task (project): configured tasks").unwrap();
        let help = message.find("can execute help task (project): boom").unwrap();
        assert!(realize < help);
    }

    #[test]
    fn empty_failures_do_not_aggregate() {
        assert!(AggregatedFailure::from_failures(Vec::new()).is_none());
    }

    #[test]
    fn case_failure_keeps_its_cause_as_source() {
        use std::error::Error as _;
        let failure = CaseFailure {
            display_name: "x".to_string(),
            cause: CaseError::assertion("inner"),
        };
        assert_eq!(failure.source().unwrap().to_string(), "inner");
    }

    #[test]
    fn unexpected_outcome_prefers_stderr() {
        let err = RunnerError::UnexpectedOutcome {
            expected: Expectation::Success,
            args: vec!["help".to_string()],
            result: Box::new(InvocationResult {
                exit_code: Some(1),
                signal: None,
                stdout: "BUILD FAILED".to_string(),
                stderr: "Plugin with id 'x' not found.".to_string(),
            }),
        };
        let message = err.to_string();
        assert!(message.starts_with("expected build to succeed [help] but got exit code 1"));
        assert!(message.contains("Plugin with id 'x' not found."));
        assert!(!message.contains("BUILD FAILED"));
    }
}
