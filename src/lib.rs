//! Conformance harness for build-tool plugins.
//!
//! Given a plugin under test and the targets it may be applied to, the harness
//! expands a matrix of behavioral scenarios, runs each one in its own workspace
//! by driving the external build tool, and reports every failing scenario in a
//! single aggregated error.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wellbehaved::{Harness, ProcessRunner, TargetKind};
//!
//! # fn main() -> Result<(), wellbehaved::HarnessError> {
//! let runner = ProcessRunner::new("gradle");
//! Harness::new(Arc::new(runner))
//!     .plugin_id("com.example.demo")
//!     .plugin_type("com.example.DemoPlugin")
//!     .supported_targets([TargetKind::Project, TargetKind::Settings])
//!     .run()?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod case;
pub mod catalog;
pub mod check;
pub mod engine;
pub mod env;
pub mod error;
pub mod harness;
pub mod loader;
pub mod probe;
pub mod report;
pub mod retry;
pub mod runner;
pub mod schema;
pub mod script;
pub mod unit;
pub mod workspace;

pub use crate::case::{CaseOutcome, TestCase};
pub use crate::check::{Check, Scenario};
pub use crate::engine::{RunReport, RunSummary};
pub use crate::error::{
    AggregatedFailure, CaseError, CaseFailure, ConfigError, HarnessError, RunnerError,
    WorkspaceError,
};
pub use crate::harness::Harness;
pub use crate::runner::{
    ClasspathMode, Expectation, InvocationConfig, InvocationResult, ProcessRunner, RunnerAdapter,
};
pub use crate::unit::{CrossTargetPolicy, TargetKind, TypeHandle, UnitIdentity};
pub use crate::workspace::{Workspace, WorkspaceProvider};
