//! Sequential execution of a scenario list with aggregated failure reporting.

use crate::case::{CaseOutcome, TestCase, run_case};
use crate::error::{AggregatedFailure, CaseFailure};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of one executed case.
#[derive(Debug)]
pub struct CaseReport {
    pub display_name: String,
    pub outcome: CaseOutcome,
    pub duration: Duration,
}

/// Counts per outcome. Aborted cases are neither passed nor failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub aborted: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.aborted + self.failed
    }
}

/// Every case of one run, in execution order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
    pub total_time: Duration,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for case in &self.cases {
            match case.outcome {
                CaseOutcome::Passed => summary.passed += 1,
                CaseOutcome::Aborted { .. } => summary.aborted += 1,
                CaseOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.cases.iter().any(|c| c.outcome.is_failure())
    }

    /// Folds every failure, in order, into one [`AggregatedFailure`].
    pub fn into_result(self) -> Result<RunSummary, AggregatedFailure> {
        let summary = self.summary();
        let failures = self
            .cases
            .into_iter()
            .filter_map(|case| match case.outcome {
                CaseOutcome::Failed(cause) => Some(CaseFailure {
                    display_name: case.display_name,
                    cause,
                }),
                _ => None,
            })
            .collect();
        match AggregatedFailure::from_failures(failures) {
            Some(failure) => Err(failure),
            None => Ok(summary),
        }
    }
}

/// Runs every case to completion, one after another.
///
/// A failing case never stops the run. Teardown of a case finishes before the
/// next case starts.
pub fn execute_all<I, C>(cases: I) -> RunReport
where
    I: IntoIterator<Item = C>,
    C: TestCase,
{
    let run_start = Instant::now();
    let mut reports = Vec::new();

    for mut case in cases {
        let start = Instant::now();
        info!(case = case.display_name(), "running");
        let outcome = run_case(&mut case);
        let duration = start.elapsed();

        match &outcome {
            CaseOutcome::Passed => info!(case = case.display_name(), ?duration, "passed"),
            CaseOutcome::Aborted { reason } => {
                info!(case = case.display_name(), %reason, "aborted")
            }
            CaseOutcome::Failed(err) => {
                info!(case = case.display_name(), error = %err, ?duration, "failed")
            }
        }

        reports.push(CaseReport {
            display_name: case.display_name().to_string(),
            outcome,
            duration,
        });
    }

    RunReport {
        cases: reports,
        total_time: run_start.elapsed(),
    }
}

/// Runs every case and raises one error listing all failures.
pub fn run_all<I, C>(cases: I) -> Result<RunSummary, AggregatedFailure>
where
    I: IntoIterator<Item = C>,
    C: TestCase,
{
    execute_all(cases).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::tests::Recording;
    use crate::error::CaseError;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn all_passing_returns_summary() {
        let log = recorder();
        let cases = vec![Recording::passing("a", &log), Recording::passing("b", &log)];
        let summary = run_all(cases).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                passed: 2,
                aborted: 0,
                failed: 0
            }
        );
    }

    #[test]
    fn failures_do_not_short_circuit() {
        let log = recorder();
        let mut first = Recording::passing("first", &log);
        first.execute = || Err(CaseError::assertion("first broke"));
        let second = Recording::passing("second", &log);
        let mut third = Recording::passing("third", &log);
        third.execute = || panic!("third broke");

        let failure = run_all(vec![first, second, third]).unwrap_err();

        let names: Vec<&str> = failure.display_names().collect();
        assert_eq!(names, vec!["first", "third"]);
        assert!(failure.to_string().starts_with("Plugin is not well-behaved"));
        assert!(log.lock().unwrap().contains(&"second:execute".to_string()));
    }

    #[test]
    fn cases_run_strictly_in_sequence() {
        let log = recorder();
        let cases = vec![Recording::passing("a", &log), Recording::passing("b", &log)];
        execute_all(cases);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:set_up",
                "a:execute",
                "a:tear_down",
                "b:set_up",
                "b:execute",
                "b:tear_down"
            ]
        );
    }

    #[test]
    fn aborted_cases_are_neither_passed_nor_failed() {
        let log = recorder();
        let mut skipped = Recording::passing("skipped", &log);
        skipped.set_up = || Err(CaseError::abort("no id"));
        let report = execute_all(vec![skipped, Recording::passing("ok", &log)]);

        assert_eq!(
            report.summary(),
            RunSummary {
                passed: 1,
                aborted: 1,
                failed: 0
            }
        );
        assert!(!report.has_failures());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn failure_keeps_original_cause() {
        let log = recorder();
        let mut case = Recording::passing("broken", &log);
        case.execute = || Err(CaseError::assertion("configured tasks: [:foo]"));

        let failure = run_all(vec![case]).unwrap_err();
        let entry = &failure.failures()[0];
        assert_eq!(entry.display_name, "broken");
        assert!(matches!(entry.cause, CaseError::Assertion { .. }));
    }

    #[test]
    fn accepts_boxed_trait_objects() {
        let log = recorder();
        let cases: Vec<Box<dyn TestCase>> = vec![Box::new(Recording::passing("boxed", &log))];
        assert_eq!(run_all(cases).unwrap().passed, 1);
    }

    #[test]
    fn empty_run_succeeds() {
        let report = execute_all(Vec::<Recording>::new());
        assert_eq!(report.summary().total(), 0);
        assert!(report.into_result().is_ok());
    }
}
