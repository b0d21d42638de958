//! The unit of scenario execution and its lifecycle.
//!
//! A case moves through `Created -> SetUp -> Executing -> TornDown`, or ends in
//! `Aborted` when setup reports the scenario as inapplicable. Once setup has
//! succeeded, teardown always runs, whatever execute did.

use crate::error::CaseError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::warn;

pub trait TestCase {
    /// Human-readable name used for reporting.
    fn display_name(&self) -> &str;

    fn set_up(&mut self) -> Result<(), CaseError> {
        Ok(())
    }

    fn execute(&mut self) -> Result<(), CaseError>;

    /// Cleanup only; should not assert.
    fn tear_down(&mut self) -> Result<(), CaseError> {
        Ok(())
    }
}

impl<T: TestCase + ?Sized> TestCase for Box<T> {
    fn display_name(&self) -> &str {
        (**self).display_name()
    }

    fn set_up(&mut self) -> Result<(), CaseError> {
        (**self).set_up()
    }

    fn execute(&mut self) -> Result<(), CaseError> {
        (**self).execute()
    }

    fn tear_down(&mut self) -> Result<(), CaseError> {
        (**self).tear_down()
    }
}

/// Final state of one case.
#[derive(Debug)]
pub enum CaseOutcome {
    Passed,
    /// Inapplicable; neither a pass nor a failure.
    Aborted { reason: String },
    Failed(CaseError),
}

impl CaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CaseOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaseOutcome::Passed => "passed",
            CaseOutcome::Aborted { .. } => "aborted",
            CaseOutcome::Failed(_) => "failed",
        }
    }
}

/// Drives one case through its lifecycle.
///
/// Panics raised by any phase are caught and reported as
/// [`CaseError::Panicked`]. A teardown error fails a case whose execute
/// passed; when execute already failed, the teardown error is logged and the
/// execute failure is kept.
pub fn run_case<C: TestCase + ?Sized>(case: &mut C) -> CaseOutcome {
    if let Err(err) = guarded(|| case.set_up()) {
        return match err {
            CaseError::Aborted { reason } => CaseOutcome::Aborted { reason },
            other => CaseOutcome::Failed(other),
        };
    }

    let executed = guarded(|| case.execute());
    let torn_down = guarded(|| case.tear_down());

    match (executed, torn_down) {
        (Ok(()), Ok(())) => CaseOutcome::Passed,
        (Ok(()), Err(teardown)) => CaseOutcome::Failed(teardown),
        (Err(CaseError::Aborted { reason }), teardown) => {
            if let Err(err) = teardown {
                warn!(case = case.display_name(), error = %err, "teardown failed after abort");
            }
            CaseOutcome::Aborted { reason }
        }
        (Err(err), Ok(())) => CaseOutcome::Failed(err),
        (Err(err), Err(teardown)) => {
            warn!(case = case.display_name(), error = %teardown, "teardown failed after failure");
            CaseOutcome::Failed(err)
        }
    }
}

fn guarded<F>(phase: F) -> Result<(), CaseError>
where
    F: FnOnce() -> Result<(), CaseError>,
{
    catch_unwind(AssertUnwindSafe(phase)).unwrap_or_else(|payload| {
        Err(CaseError::Panicked {
            message: panic_payload_to_string(payload.as_ref()),
        })
    })
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
