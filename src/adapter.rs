//! Running scenarios as native `#[test]` functions.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use wellbehaved::{Harness, ProcessRunner};
//! fn plugin_is_well_behaved() {
//!     let harness = Harness::new(Arc::new(ProcessRunner::new("gradle")))
//!         .plugin_id("com.example.demo");
//!     for case in harness.cases().unwrap() {
//!         wellbehaved::adapter::run_as_test(case);
//!     }
//! }
//! ```

use crate::case::{CaseOutcome, TestCase, run_case};
use tracing::info;

/// Runs one case and maps its outcome onto the test harness: returns on pass,
/// logs a skip on abort, panics with the cause on failure.
pub fn run_as_test<C: TestCase>(mut case: C) {
    match run_case(&mut case) {
        CaseOutcome::Passed => {}
        CaseOutcome::Aborted { reason } => {
            info!(case = case.display_name(), %reason, "skipped");
            eprintln!("skipped {}: {reason}", case.display_name());
        }
        CaseOutcome::Failed(err) => panic!("{}: {err}", case.display_name()),
    }
}
