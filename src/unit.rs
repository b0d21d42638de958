//! The plugin under test and the targets it can be applied to.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle naming the concrete plugin type.
///
/// The harness never inspects the type itself; the handle is rendered into the
/// scripted environment and resolved by the external build tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TypeHandle(String);

impl TypeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a scenario applies the plugin to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMethod {
    ById,
    ByType,
}

/// Identity of the plugin under test.
///
/// At least one of the two halves must be present before a run starts. A
/// scenario needing a half that is absent aborts instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitIdentity {
    plugin_id: Option<String>,
    plugin_type: Option<TypeHandle>,
}

impl UnitIdentity {
    pub fn new(plugin_id: Option<String>, plugin_type: Option<TypeHandle>) -> Self {
        Self {
            plugin_id,
            plugin_type,
        }
    }

    pub fn plugin_id(&self) -> Option<&str> {
        self.plugin_id.as_deref()
    }

    pub fn plugin_type(&self) -> Option<&TypeHandle> {
        self.plugin_type.as_ref()
    }

    pub fn set_plugin_id(&mut self, id: impl Into<String>) {
        self.plugin_id = Some(id.into());
    }

    pub fn set_plugin_type(&mut self, handle: TypeHandle) {
        self.plugin_type = Some(handle);
    }

    pub fn is_empty(&self) -> bool {
        self.plugin_id.is_none() && self.plugin_type.is_none()
    }

    /// Picks the way to apply the plugin to `target`: by id when the target can
    /// resolve ids and one is known, otherwise by type.
    pub fn attach_method(&self, target: TargetKind) -> Option<AttachMethod> {
        if self.plugin_id.is_some() && target.resolves_plugin_ids() {
            Some(AttachMethod::ById)
        } else if self.plugin_type.is_some() {
            Some(AttachMethod::ByType)
        } else {
            None
        }
    }

    /// Short name used to namespace workspaces.
    pub fn label(&self) -> &str {
        self.plugin_id()
            .or_else(|| self.plugin_type().map(TypeHandle::name))
            .unwrap_or("unnamed-plugin")
    }
}

/// Context a plugin can be applied to.
///
/// Declaration order is the natural enumeration order used for cross-target
/// scenarios.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Project,
    Settings,
    Init,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Project, TargetKind::Settings, TargetKind::Init];

    /// Target assumed when a plugin declares none.
    pub const BASELINE: TargetKind = TargetKind::Project;

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Project => "project",
            TargetKind::Settings => "settings",
            TargetKind::Init => "init",
        }
    }

    /// Script the plugin is applied from for this target.
    pub fn script_file_name(self) -> &'static str {
        match self {
            TargetKind::Project => "build.gradle",
            TargetKind::Settings => "settings.gradle",
            TargetKind::Init => "init.gradle",
        }
    }

    /// Init scripts run before plugin ids can be resolved, so id-based
    /// application is structurally unavailable there.
    pub fn resolves_plugin_ids(self) -> bool {
        !matches!(self, TargetKind::Init)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether to check that the plugin fails sensibly on targets it does not
/// support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CrossTargetPolicy {
    /// Require when targets were declared explicitly, skip otherwise.
    #[default]
    Auto,
    Require,
    Skip,
}

impl CrossTargetPolicy {
    pub fn requires_checks(self, targets_declared: bool) -> bool {
        match self {
            CrossTargetPolicy::Auto => targets_declared,
            CrossTargetPolicy::Require => true,
            CrossTargetPolicy::Skip => false,
        }
    }
}
