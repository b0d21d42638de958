//! Caller-facing configuration surface.

use crate::catalog::{self, DeclaredTargets, MatrixEntry};
use crate::check::{DEFAULT_DISALLOWED_MESSAGE, DEFAULT_REALIZED_ALLOW_LIST, Scenario, ScenarioContext};
use crate::engine::{self, RunReport, RunSummary};
use crate::env::{KEEP_FAILED_ENV, env_flag, interpolate_env};
use crate::error::{ConfigError, HarnessError};
use crate::runner::{ClasspathSource, ProcessRunner, RunnerAdapter};
use crate::schema::{HarnessConfig, RunnerConfig};
use crate::unit::{CrossTargetPolicy, TargetKind, TypeHandle, UnitIdentity};
use crate::workspace::{DEFAULT_ROOT, WorkspaceProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Checks one plugin for good citizenship.
///
/// Configure the plugin identity and its supported targets, then either call
/// [`Harness::run`] or hand [`Harness::cases`] to another test framework.
pub struct Harness {
    identity: UnitIdentity,
    runner: Arc<dyn RunnerAdapter>,
    targets: Vec<TargetKind>,
    policy: CrossTargetPolicy,
    workspace_root: PathBuf,
    owner: Option<String>,
    keep_failed: Option<bool>,
    strict_cleanup: bool,
    realized_allow_list: Vec<String>,
    disallowed_message: String,
}

impl Harness {
    pub fn new(runner: Arc<dyn RunnerAdapter>) -> Self {
        Self {
            identity: UnitIdentity::default(),
            runner,
            targets: Vec::new(),
            policy: CrossTargetPolicy::Auto,
            workspace_root: PathBuf::from(DEFAULT_ROOT),
            owner: None,
            keep_failed: None,
            strict_cleanup: false,
            realized_allow_list: DEFAULT_REALIZED_ALLOW_LIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            disallowed_message: DEFAULT_DISALLOWED_MESSAGE.to_string(),
        }
    }

    /// Builds a harness driving a [`ProcessRunner`] from a harness file.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, ConfigError> {
        let runner = runner_from_config(&config.runner)?;
        let mut harness = Self::new(Arc::new(runner))
            .cross_target_policy(config.cross_target)
            .supported_targets(config.targets.iter().copied())
            .strict_cleanup(config.workspace.strict_cleanup)
            .realized_task_allow_list(config.realized_allow_list())
            .disallowed_error_message(config.disallowed_message());

        if let Some(id) = &config.unit.id {
            harness = harness.plugin_id(id.clone());
        }
        if let Some(handle) = &config.unit.plugin_type {
            harness = harness.plugin_type(handle.name());
        }
        if let Some(root) = &config.workspace.root {
            harness = harness.workspace_root(root.clone());
        }
        if let Some(owner) = &config.workspace.owner {
            harness = harness.owner(owner.clone());
        }
        if let Some(keep) = config.workspace.keep_failed {
            harness = harness.keep_failed_workspaces(keep);
        }
        Ok(harness)
    }

    /// Loads a harness file and builds a harness from it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = crate::loader::load_config(path)?;
        Self::from_config(&config)
    }

    /// Replaces the build-tool collaborator.
    pub fn runner(mut self, runner: Arc<dyn RunnerAdapter>) -> Self {
        self.runner = runner;
        self
    }

    pub fn plugin_id(mut self, id: impl Into<String>) -> Self {
        self.identity.set_plugin_id(id);
        self
    }

    pub fn plugin_type(mut self, name: impl Into<String>) -> Self {
        self.identity.set_plugin_type(TypeHandle::new(name));
        self
    }

    pub fn supported_target(mut self, target: TargetKind) -> Self {
        self.targets.push(target);
        self
    }

    pub fn supported_targets(mut self, targets: impl IntoIterator<Item = TargetKind>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn cross_target_policy(mut self, policy: CrossTargetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`CrossTargetPolicy::Require`] or [`CrossTargetPolicy::Skip`].
    pub fn requires_sensible_error_on_unsupported_targets(self, required: bool) -> Self {
        self.cross_target_policy(if required {
            CrossTargetPolicy::Require
        } else {
            CrossTargetPolicy::Skip
        })
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Subdirectory of the workspace root for this suite. Defaults to the
    /// plugin id, or the type name.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Overrides the `WELLBEHAVED_KEEP_FAILED_WORKSPACES` switch.
    pub fn keep_failed_workspaces(mut self, keep: bool) -> Self {
        self.keep_failed = Some(keep);
        self
    }

    pub fn strict_cleanup(mut self, strict: bool) -> Self {
        self.strict_cleanup = strict;
        self
    }

    pub fn realized_task_allow_list<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.realized_allow_list = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn disallowed_error_message(mut self, message: impl Into<String>) -> Self {
        self.disallowed_message = message.into();
        self
    }

    pub fn identity(&self) -> &UnitIdentity {
        &self.identity
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.is_empty() {
            return Err(ConfigError::MissingIdentity);
        }
        Ok(())
    }

    /// The scenario matrix, without creating anything.
    pub fn matrix(&self) -> Result<Vec<MatrixEntry>, ConfigError> {
        self.validate()?;
        Ok(catalog::matrix(&DeclaredTargets::new(&self.targets), self.policy))
    }

    /// The ordered scenarios, ready to run here or in another test framework.
    pub fn cases(&self) -> Result<Vec<Scenario>, ConfigError> {
        self.validate()?;
        let owner = self
            .owner
            .clone()
            .unwrap_or_else(|| self.identity.label().to_string());
        let workspaces = WorkspaceProvider::new(&self.workspace_root, &owner).strict(self.strict_cleanup);

        let mut context = ScenarioContext::new(self.identity.clone(), Arc::clone(&self.runner), workspaces);
        context.keep_failed = self
            .keep_failed
            .or_else(|| env_flag(KEEP_FAILED_ENV))
            .unwrap_or(false);
        context.realized_allow_list = self.realized_allow_list.clone();
        context.disallowed_message = self.disallowed_message.clone();
        debug!(?context, "expanding scenario matrix");

        Ok(catalog::expand(
            &Arc::new(context),
            &DeclaredTargets::new(&self.targets),
            self.policy,
        ))
    }

    /// Runs every scenario and returns the full report.
    pub fn execute(&self) -> Result<RunReport, ConfigError> {
        Ok(engine::execute_all(self.cases()?))
    }

    /// Runs every scenario, raising one error listing all failures.
    pub fn run(&self) -> Result<RunSummary, HarnessError> {
        Ok(engine::run_all(self.cases()?)?)
    }
}

/// Builds a [`ProcessRunner`], interpolating `${VAR}` references.
pub fn runner_from_config(config: &RunnerConfig) -> Result<ProcessRunner, ConfigError> {
    let interpolate = |field: &str, value: &str| {
        interpolate_env(value).map_err(|source| ConfigError::Interpolation {
            field: field.to_string(),
            source,
        })
    };

    let command = interpolate("runner.command", &config.command)?;
    let args = config
        .args
        .iter()
        .map(|arg| interpolate("runner.args", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let classpath = config
        .classpath
        .iter()
        .map(|entry| interpolate("runner.classpath", entry).map(PathBuf::from))
        .collect::<Result<Vec<_>, _>>()?;

    let mut runner = ProcessRunner::new(command)
        .base_args(args)
        .inherit_env(config.inherit_env)
        .timeout(Duration::from_secs(config.timeout_secs()))
        .classpath(ClasspathSource {
            metadata_file: config.metadata_file.clone(),
            entries: classpath,
        });
    for (key, value) in &config.env {
        runner = runner.env(key.clone(), interpolate(&format!("runner.env.{key}"), value)?);
    }
    Ok(runner)
}
