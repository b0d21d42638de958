//! Schema definitions for harness files.
//!
//! A harness file describes one plugin under test, the targets it supports and
//! how to drive the build tool. Files are written in YAML or TOML and validated
//! against these types.

use crate::check::{DEFAULT_DISALLOWED_MESSAGE, DEFAULT_REALIZED_ALLOW_LIST};
use crate::runner::DEFAULT_TIMEOUT_SECS;
use crate::unit::{CrossTargetPolicy, TargetKind, TypeHandle};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Current harness file version.
pub const SCHEMA_VERSION: u32 = 1;

/// Root document of a harness file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HarnessConfig {
    /// Schema version (must be 1).
    #[serde(default = "default_version")]
    pub version: u32,

    /// The plugin under test. At least one of `id` and `type` is required.
    pub unit: UnitConfig,

    /// Targets the plugin supports. Empty means the project target only.
    #[serde(default)]
    pub targets: Vec<TargetKind>,

    /// Whether to check the failure on unsupported targets (default: auto,
    /// which checks only when `targets` is set).
    #[serde(default)]
    pub cross_target: CrossTargetPolicy,

    /// How to invoke the build tool.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Where scenario workspaces live.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Task paths allowed to be realized (default: `[":help"]`).
    #[serde(default)]
    pub realized_allow_list: Option<Vec<String>>,

    /// Failure text treated as uninformative on unsupported targets
    /// (default: "cannot be cast to").
    #[serde(default)]
    pub disallowed_message: Option<String>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl HarnessConfig {
    pub fn realized_allow_list(&self) -> Vec<String> {
        self.realized_allow_list.clone().unwrap_or_else(|| {
            DEFAULT_REALIZED_ALLOW_LIST
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn disallowed_message(&self) -> &str {
        self.disallowed_message
            .as_deref()
            .unwrap_or(DEFAULT_DISALLOWED_MESSAGE)
    }
}

/// Identity of the plugin under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UnitConfig {
    /// Qualified plugin id, e.g. `com.example.demo`.
    #[serde(default)]
    pub id: Option<String>,

    /// Fully qualified plugin class name.
    #[serde(default, rename = "type")]
    pub plugin_type: Option<TypeHandle>,
}

/// Build tool invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunnerConfig {
    /// Executable to run (default: `gradle`). Supports `${VAR}`.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed before every scenario's own arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set. Values support `${VAR}`.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether to inherit environment from host (default: true).
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,

    /// Timeout per invocation in seconds (default: 300).
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Explicit plugin classpath entries. Used when no metadata file is found.
    #[serde(default)]
    pub classpath: Vec<String>,

    /// Plugin-under-test metadata file; takes precedence over `classpath`
    /// when it exists.
    #[serde(default)]
    pub metadata_file: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
            inherit_env: default_inherit_env(),
            timeout: None,
            classpath: Vec::new(),
            metadata_file: None,
        }
    }
}

impl RunnerConfig {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

fn default_command() -> String {
    "gradle".to_string()
}

fn default_inherit_env() -> bool {
    true
}

/// Workspace placement and lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkspaceConfig {
    /// Root directory for workspaces (default: `target/tmp/test files`).
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Subdirectory naming this suite (default: the plugin id or type).
    #[serde(default)]
    pub owner: Option<String>,

    /// Keep failed scenarios' workspaces. When unset, the
    /// `WELLBEHAVED_KEEP_FAILED_WORKSPACES` environment variable decides.
    #[serde(default)]
    pub keep_failed: Option<bool>,

    /// Fail a scenario whose workspace cannot be removed (default: false).
    #[serde(default)]
    pub strict_cleanup: bool,
}

/// Generate JSON Schema for harness files.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(HarnessConfig)
}
