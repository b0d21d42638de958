//! In-process stand-in for the build tool.
//!
//! `FakeBuildTool` reads the scripts a scenario wrote into its workspace and
//! simulates what the real tool would do with a configurable fixture plugin.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wellbehaved::{
    Expectation, Harness, InvocationConfig, InvocationResult, RunnerAdapter, RunnerError,
    TargetKind,
};

pub const PLUGIN_ID: &str = "demo.plugin";
pub const PLUGIN_TYPE: &str = "com.example.DemoPlugin";

/// Behavior of the plugin the fake tool knows about.
#[derive(Debug, Clone)]
pub struct FakePlugin {
    pub id: Option<String>,
    pub type_name: String,
    /// Type the id is bound to, when it differs from `type_name`.
    pub id_resolves_to: Option<String>,
    pub supported: Vec<TargetKind>,
    pub unsupported_message: String,
    /// Tasks realized as soon as the plugin is applied.
    pub realizes: Vec<String>,
    /// Tasks realized only in the nested project.
    pub realizes_nested: Vec<String>,
    pub resolves_configuration: bool,
    pub breaks_iteration: bool,
}

impl FakePlugin {
    pub fn well_behaved() -> Self {
        Self {
            id: Some(PLUGIN_ID.to_string()),
            type_name: PLUGIN_TYPE.to_string(),
            id_resolves_to: None,
            supported: vec![TargetKind::Project],
            unsupported_message: format!("{PLUGIN_ID} can only be applied to projects"),
            realizes: Vec::new(),
            realizes_nested: Vec::new(),
            resolves_configuration: false,
            breaks_iteration: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub workspace: PathBuf,
    pub args: Vec<String>,
    pub succeeded: bool,
}

pub struct FakeBuildTool {
    plugin: FakePlugin,
    invocations: Mutex<Vec<Invocation>>,
}

enum Applied {
    Id(String),
    Type(String),
}

impl FakeBuildTool {
    pub fn new(plugin: FakePlugin) -> Arc<Self> {
        Arc::new(Self {
            plugin,
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn simulate(&self, workspace: &Path, args: &[String]) -> Result<(), String> {
        let read = |name: &str| std::fs::read_to_string(workspace.join(name)).unwrap_or_default();
        let settings = read("settings.gradle");
        let uses_init_script = args
            .windows(2)
            .any(|w| w[0] == "--init-script" && w[1] == "init.gradle");

        let (target, script) = if applied_plugin(&settings).is_some() {
            (TargetKind::Settings, settings.clone())
        } else if uses_init_script {
            (TargetKind::Init, read("init.gradle"))
        } else {
            (TargetKind::Project, read("build.gradle"))
        };
        let nested = settings.contains("include 'nested'");

        let Some(applied) = applied_plugin(&script) else {
            return Ok(());
        };
        let resolved_type = match applied {
            Applied::Id(id) => {
                if self.plugin.id.as_deref() != Some(id.as_str()) {
                    return Err(format!("Plugin with id '{id}' not found."));
                }
                self.plugin
                    .id_resolves_to
                    .clone()
                    .unwrap_or_else(|| self.plugin.type_name.clone())
            }
            Applied::Type(name) => {
                if name != self.plugin.type_name {
                    return Err(format!("Could not get unknown property '{name}'"));
                }
                name
            }
        };

        if !self.plugin.supported.contains(&target) {
            return Err(self.plugin.unsupported_message.clone());
        }

        if let Some(expected) = instanceof_assertion(&script)
            && expected != resolved_type
        {
            return Err(format!("Assertion failed: plugin is class {resolved_type}"));
        }

        if let Some(allowed) = realized_allow_list(&script) {
            let mut realized = vec![":help".to_string()];
            realized.extend(self.plugin.realizes.iter().cloned());
            if nested {
                realized.extend(self.plugin.realizes_nested.iter().cloned());
            }
            realized.retain(|task| !allowed.contains(task));
            if !realized.is_empty() {
                return Err(format!(
                    "assert configuredTaskPaths == []\n       |\n       {realized:?}"
                ));
            }
        }

        if script.contains("resolvedConfigurations") && self.plugin.resolves_configuration {
            return Err(
                "assert resolvedConfigurations == []\n       [configuration ':compileClasspath']"
                    .to_string(),
            );
        }

        if script.contains("gradle.projectsEvaluated") && self.plugin.breaks_iteration {
            return Err("Could not create task ':broken'.".to_string());
        }
        Ok(())
    }
}

impl RunnerAdapter for FakeBuildTool {
    fn resolve_invocation_context(&self, _workspace: &Path) -> Result<InvocationConfig, RunnerError> {
        Ok(InvocationConfig::default())
    }

    fn invoke(
        &self,
        workspace: &Path,
        args: &[String],
        expectation: Expectation,
    ) -> Result<InvocationResult, RunnerError> {
        assert!(workspace.is_dir(), "workspace missing: {}", workspace.display());
        let outcome = self.simulate(workspace, args);
        let result = match &outcome {
            Ok(()) => InvocationResult {
                exit_code: Some(0),
                stdout: "BUILD SUCCESSFUL\n".to_string(),
                ..Default::default()
            },
            Err(message) => InvocationResult {
                exit_code: Some(1),
                stdout: "FAILURE: Build failed with an exception.\n".to_string(),
                stderr: message.clone(),
                ..Default::default()
            },
        };
        self.invocations.lock().unwrap().push(Invocation {
            workspace: workspace.to_path_buf(),
            args: args.to_vec(),
            succeeded: outcome.is_ok(),
        });
        result.expect(expectation, args)
    }
}

fn applied_plugin(script: &str) -> Option<Applied> {
    script.lines().find_map(|line| {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("apply plugin: ") {
            return Some(if rest.starts_with('\'') {
                Applied::Id(rest.trim_matches('\'').to_string())
            } else {
                Applied::Type(rest.to_string())
            });
        }
        line.strip_prefix("id '")
            .map(|rest| Applied::Id(rest.trim_end_matches('\'').to_string()))
    })
}

fn instanceof_assertion(script: &str) -> Option<String> {
    script.lines().find_map(|line| {
        let (_, rest) = line.split_once("assert pluginById instanceof ")?;
        rest.split_whitespace().next().map(String::from)
    })
}

fn realized_allow_list(script: &str) -> Option<Vec<String>> {
    script.lines().find_map(|line| {
        let (_, rest) = line.split_once("configuredTaskPaths.removeAll([")?;
        let (list, _) = rest.split_once("])")?;
        Some(
            list.split(',')
                .map(|item| item.trim().trim_matches('\'').to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )
    })
}

/// Harness wired to `tool`, with workspaces under a fresh temporary root.
pub fn harness_for(tool: &Arc<FakeBuildTool>) -> (Harness, TempDir) {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(tool.clone())
        .workspace_root(root.path())
        .owner("fixture")
        .keep_failed_workspaces(false);
    (harness, root)
}
