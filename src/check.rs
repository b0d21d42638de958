//! Behavioral checks and the scenario that runs one of them against one target.

use crate::case::TestCase;
use crate::error::CaseError;
use crate::probe;
use crate::runner::{Expectation, InvocationResult, RunnerAdapter};
use crate::script;
use crate::unit::{TargetKind, UnitIdentity};
use crate::workspace::{Workspace, WorkspaceProvider};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Task realized by every build; allowed by default.
pub const DEFAULT_REALIZED_ALLOW_LIST: &[&str] = &[":help"];

/// Failure text that means the plugin did not explain why it cannot be
/// applied to a target.
pub const DEFAULT_DISALLOWED_MESSAGE: &str = "cannot be cast to";

/// One good-citizenship property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    PluginIdHasExpectedType,
    ApplyById,
    ApplyByIdViaDsl,
    ApplyByType,
    ExecuteHelp,
    ExecuteTasks,
    DoesNotRealizeTask,
    DoesNotResolveConfiguration,
    IteratesDomainObjectCollections,
    SensibleErrorOnUnsupportedTarget,
}

impl Check {
    /// Checks run against every supported target, in matrix order.
    pub const SUPPORTED_TARGET: [Check; 9] = [
        Check::PluginIdHasExpectedType,
        Check::ApplyById,
        Check::ApplyByIdViaDsl,
        Check::ApplyByType,
        Check::ExecuteHelp,
        Check::ExecuteTasks,
        Check::DoesNotRealizeTask,
        Check::DoesNotResolveConfiguration,
        Check::IteratesDomainObjectCollections,
    ];

    pub fn category(self) -> &'static str {
        match self {
            Check::PluginIdHasExpectedType => "applied plugin id has expected type",
            Check::ApplyById => "can apply plugin by id",
            Check::ApplyByIdViaDsl => "can apply by id via plugin DSL",
            Check::ApplyByType => "can apply plugin by type",
            Check::ExecuteHelp => "can execute help task",
            Check::ExecuteTasks => "can execute tasks task",
            Check::DoesNotRealizeTask => "does not realize task",
            Check::DoesNotResolveConfiguration => "does not resolve configuration",
            Check::IteratesDomainObjectCollections => "can iterate all domain object collections",
            Check::SensibleErrorOnUnsupportedTarget => {
                "fails with sensible error when applied to unsupported target"
            }
        }
    }

    fn needs_id(self) -> bool {
        matches!(
            self,
            Check::PluginIdHasExpectedType | Check::ApplyById | Check::ApplyByIdViaDsl
        )
    }

    fn needs_type(self) -> bool {
        matches!(self, Check::PluginIdHasExpectedType | Check::ApplyByType)
    }

    /// Whether the check can be expressed against `target` at all.
    ///
    /// Id-based checks are unavailable on the init target, where ids cannot be
    /// resolved.
    pub fn applies_to(self, target: TargetKind) -> bool {
        !self.needs_id() || target.resolves_plugin_ids()
    }

    /// Reason the check cannot run for `identity` on `target`, if any.
    fn unmet_requirement(self, identity: &UnitIdentity, target: TargetKind) -> Option<String> {
        if self.needs_id() && identity.plugin_id().is_none() {
            return Some("no plugin id configured".to_string());
        }
        if self.needs_type() && identity.plugin_type().is_none() {
            return Some("no plugin type configured".to_string());
        }
        if !self.applies_to(target) {
            return Some(format!("plugin ids cannot be resolved on the {target} target"));
        }
        if identity.attach_method(target).is_none() {
            return Some(format!("no way to apply the plugin on the {target} target"));
        }
        None
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Settings shared by every scenario of one run.
pub struct ScenarioContext {
    pub identity: UnitIdentity,
    pub runner: Arc<dyn RunnerAdapter>,
    pub workspaces: WorkspaceProvider,
    /// Keep a failing scenario's workspace on disk.
    pub keep_failed: bool,
    pub realized_allow_list: Vec<String>,
    pub disallowed_message: String,
}

impl ScenarioContext {
    pub fn new(identity: UnitIdentity, runner: Arc<dyn RunnerAdapter>, workspaces: WorkspaceProvider) -> Self {
        Self {
            identity,
            runner,
            workspaces,
            keep_failed: false,
            realized_allow_list: DEFAULT_REALIZED_ALLOW_LIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            disallowed_message: DEFAULT_DISALLOWED_MESSAGE.to_string(),
        }
    }
}

impl fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("identity", &self.identity)
            .field("workspaces", &self.workspaces)
            .field("keep_failed", &self.keep_failed)
            .field("realized_allow_list", &self.realized_allow_list)
            .field("disallowed_message", &self.disallowed_message)
            .finish_non_exhaustive()
    }
}

/// A check bound to a target, owning its workspace while it runs.
#[derive(Debug)]
pub struct Scenario {
    check: Check,
    target: TargetKind,
    display_name: String,
    context: Arc<ScenarioContext>,
    workspace: Option<Workspace>,
}

impl Scenario {
    pub fn new(check: Check, target: TargetKind, context: Arc<ScenarioContext>) -> Self {
        Self {
            check,
            target,
            display_name: format!("{} ({target})", check.category()),
            context,
            workspace: None,
        }
    }

    pub fn check(&self) -> Check {
        self.check
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// The workspace, once setup has acquired it.
    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    fn perform(&mut self) -> Result<(), CaseError> {
        let ctx = Arc::clone(&self.context);
        let identity = &ctx.identity;
        let target = self.target;
        let display_name = &self.display_name;
        let ws = self
            .workspace
            .get_or_insert_with(|| ctx.workspaces.acquire(display_name));

        let missing = || CaseError::abort("plugin identity does not cover this check");
        match self.check {
            Check::PluginIdHasExpectedType => {
                let id = identity.plugin_id().ok_or_else(missing)?;
                let handle = identity.plugin_type().ok_or_else(missing)?;
                let probe = probe::assert_plugin_type(target, id, handle);
                write_environment(ws, target, probe::apply_by_id(id), probe, false)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::ApplyById => {
                let id = identity.plugin_id().ok_or_else(missing)?;
                write_environment(ws, target, probe::apply_by_id(id), Vec::new(), false)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::ApplyByIdViaDsl => {
                let id = identity.plugin_id().ok_or_else(missing)?;
                write_environment(ws, target, probe::plugins_block(id), Vec::new(), false)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::ApplyByType => {
                let handle = identity.plugin_type().ok_or_else(missing)?;
                write_environment(ws, target, probe::apply_by_type(handle), Vec::new(), false)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::ExecuteHelp | Check::ExecuteTasks => {
                let attach = probe::attach(identity, target).ok_or_else(missing)?;
                write_environment(ws, target, attach, Vec::new(), false)?;
                let command = if self.check == Check::ExecuteHelp { "help" } else { "tasks" };
                invoke(&ctx, ws, target, command, Expectation::Success)?;
            }
            Check::DoesNotRealizeTask => {
                let attach = probe::attach(identity, target).ok_or_else(missing)?;
                let probe = probe::realized_tasks_probe(&ctx.realized_allow_list);
                write_environment(ws, target, attach, probe, true)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::DoesNotResolveConfiguration => {
                let attach = probe::attach(identity, target).ok_or_else(missing)?;
                write_environment(ws, target, attach, probe::resolved_configurations_probe(), true)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::IteratesDomainObjectCollections => {
                let attach = probe::attach(identity, target).ok_or_else(missing)?;
                write_environment(ws, target, attach, probe::domain_object_collections_probe(), true)?;
                invoke(&ctx, ws, target, "help", Expectation::Success)?;
            }
            Check::SensibleErrorOnUnsupportedTarget => {
                let attach = probe::attach_imperatively(identity, target).ok_or_else(missing)?;
                write_environment(ws, target, attach, Vec::new(), false)?;
                let result = invoke(&ctx, ws, target, "help", Expectation::Failure)?;
                if result.combined_output().contains(&ctx.disallowed_message) {
                    return Err(CaseError::assertion(format!(
                        "applying the plugin to the unsupported {target} target failed with an \
                         uninformative error containing '{}'",
                        ctx.disallowed_message
                    )));
                }
            }
        }
        Ok(())
    }
}

impl TestCase for Scenario {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn set_up(&mut self) -> Result<(), CaseError> {
        let requirement = match self.check {
            Check::SensibleErrorOnUnsupportedTarget => self
                .context
                .identity
                .attach_method(self.target)
                .is_none()
                .then(|| format!("no way to apply the plugin on the {} target", self.target)),
            check => check.unmet_requirement(&self.context.identity, self.target),
        };
        if let Some(reason) = requirement {
            return Err(CaseError::abort(reason));
        }
        self.workspace = Some(self.context.workspaces.acquire(&self.display_name));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), CaseError> {
        let result = self.perform();
        if let Err(err) = &result
            && !err.is_abort()
            && self.context.keep_failed
            && let Some(ws) = self.workspace.as_mut()
        {
            ws.suppress_cleanup();
            info!(case = %self.display_name, path = %ws.path().display(), "keeping failed workspace");
        }
        result
    }

    fn tear_down(&mut self) -> Result<(), CaseError> {
        match self.workspace.as_mut() {
            Some(ws) => Ok(ws.cleanup()?),
            None => Ok(()),
        }
    }
}

/// Writes the plugin application and probe into the target's script, plus a
/// settings script naming the build.
fn write_environment(
    ws: &mut Workspace,
    target: TargetKind,
    attach: Vec<String>,
    probe: Vec<String>,
    nested: bool,
) -> Result<(), CaseError> {
    let settings = TargetKind::Settings.script_file_name();
    match target {
        TargetKind::Settings => {
            script::append(ws, settings, attach)?;
            script::append(ws, settings, probe::settings_body(nested))?;
            script::append(ws, settings, probe)?;
        }
        TargetKind::Project | TargetKind::Init => {
            script::append(ws, settings, probe::settings_body(nested))?;
            let file = target.script_file_name();
            script::append(ws, file, attach)?;
            script::append(ws, file, probe)?;
        }
    }
    Ok(())
}

fn invoke(
    ctx: &ScenarioContext,
    ws: &mut Workspace,
    target: TargetKind,
    command: &str,
    expectation: Expectation,
) -> Result<InvocationResult, CaseError> {
    let dir = ws.dir()?.to_path_buf();
    let config = ctx.runner.resolve_invocation_context(&dir)?;
    let mut args = config.leading_args();
    args.extend(probe::target_args(target));
    args.push(command.to_string());
    Ok(ctx.runner.invoke(&dir, &args, expectation)?)
}
