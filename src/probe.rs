//! Scripted-environment content for each behavioral check.
//!
//! Every function returns the literal lines to append to a script; nothing here
//! touches the filesystem. The dialect is the Groovy build-script DSL.

use crate::unit::{AttachMethod, TargetKind, TypeHandle, UnitIdentity};

/// Name of the nested project included so probes also cover nested scopes.
pub const NESTED_PROJECT: &str = "nested";

/// Root project name written to every settings script.
pub const ROOT_PROJECT_NAME: &str = "well-behaved";

/// Quotes `value` as a single-quoted Groovy string.
pub fn groovy_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

pub fn apply_by_id(id: &str) -> Vec<String> {
    vec![format!("apply plugin: {}", groovy_string(id))]
}

pub fn apply_by_type(handle: &TypeHandle) -> Vec<String> {
    vec![format!("apply plugin: {}", handle.name())]
}

/// Declarative `plugins {}` block. Must be the first statement of its script.
pub fn plugins_block(id: &str) -> Vec<String> {
    vec![
        "plugins {".to_string(),
        format!("    id {}", groovy_string(id)),
        "}".to_string(),
    ]
}

/// Applies the plugin the preferred way for `target`, using the declarative
/// block when applying by id.
pub fn attach(identity: &UnitIdentity, target: TargetKind) -> Option<Vec<String>> {
    match identity.attach_method(target)? {
        AttachMethod::ById => identity.plugin_id().map(plugins_block),
        AttachMethod::ByType => identity.plugin_type().map(apply_by_type),
    }
}

/// Applies the plugin imperatively, by id when possible. Used where the
/// declarative block is not allowed.
pub fn attach_imperatively(identity: &UnitIdentity, target: TargetKind) -> Option<Vec<String>> {
    match identity.attach_method(target)? {
        AttachMethod::ById => identity.plugin_id().map(apply_by_id),
        AttachMethod::ByType => identity.plugin_type().map(apply_by_type),
    }
}

fn plugin_container(target: TargetKind) -> &'static str {
    match target {
        TargetKind::Project => "project.plugins",
        TargetKind::Settings => "settings.plugins",
        TargetKind::Init => "gradle.plugins",
    }
}

/// Asserts the plugin registered under `id` is an instance of `handle`.
pub fn assert_plugin_type(target: TargetKind, id: &str, handle: &TypeHandle) -> Vec<String> {
    let container = plugin_container(target);
    let id = groovy_string(id);
    vec![
        format!("def pluginById = {container}.findPlugin({id})"),
        format!(
            "assert pluginById instanceof {} : \"plugin {} is ${{pluginById?.getClass()}}\"",
            handle.name(),
            id.trim_matches('\'')
        ),
    ]
}

/// Settings lines shared by every scenario: root name, plus a nested project
/// when `nested` is set.
pub fn settings_body(nested: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "rootProject.name = {}",
        groovy_string(ROOT_PROJECT_NAME)
    )];
    if nested {
        lines.push(format!("include {}", groovy_string(NESTED_PROJECT)));
    }
    lines
}

/// Fails the build if any task outside `allow_list` was realized anywhere in
/// the project tree.
pub fn realized_tasks_probe(allow_list: &[String]) -> Vec<String> {
    let allowed = allow_list
        .iter()
        .map(|path| groovy_string(path))
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        String::new(),
        "def configuredTasks = []".to_string(),
        "gradle.allprojects {".to_string(),
        "    tasks.configureEach {".to_string(),
        "        configuredTasks << it".to_string(),
        "    }".to_string(),
        "}".to_string(),
        String::new(),
        "gradle.buildFinished {".to_string(),
        "    def configuredTaskPaths = configuredTasks*.path".to_string(),
        format!("    configuredTaskPaths.removeAll([{allowed}])"),
        "    assert configuredTaskPaths == []".to_string(),
        "}".to_string(),
    ]
}

/// Fails the build if any configuration anywhere in the project tree was
/// resolved.
pub fn resolved_configurations_probe() -> Vec<String> {
    vec![
        String::new(),
        "def resolvedConfigurations = []".to_string(),
        "gradle.allprojects { project ->".to_string(),
        "    project.configurations.configureEach { configuration ->".to_string(),
        "        configuration.incoming.beforeResolve {".to_string(),
        "            resolvedConfigurations << configuration.toString()".to_string(),
        "        }".to_string(),
        "    }".to_string(),
        "}".to_string(),
        String::new(),
        "gradle.buildFinished {".to_string(),
        "    assert resolvedConfigurations == []".to_string(),
        "}".to_string(),
    ]
}

/// Realizes every element of every domain object collection once all projects
/// are evaluated.
pub fn domain_object_collections_probe() -> Vec<String> {
    vec![
        String::new(),
        "gradle.projectsEvaluated {".to_string(),
        "    gradle.allprojects { project ->".to_string(),
        "        project.tasks.toList()".to_string(),
        "        project.configurations.toList()".to_string(),
        "        project.extensions.extensionsSchema.elements.each { schema ->".to_string(),
        "            def extension = project.extensions.findByName(schema.name)".to_string(),
        "            if (extension instanceof org.gradle.api.DomainObjectCollection) {".to_string(),
        "                extension.toList()".to_string(),
        "            }".to_string(),
        "        }".to_string(),
        "    }".to_string(),
        "}".to_string(),
    ]
}

/// Extra tool arguments needed for the target's script to be picked up.
pub fn target_args(target: TargetKind) -> Vec<String> {
    match target {
        TargetKind::Init => vec![
            "--init-script".to_string(),
            TargetKind::Init.script_file_name().to_string(),
        ],
        TargetKind::Project | TargetKind::Settings => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: Option<&str>, ty: Option<&str>) -> UnitIdentity {
        UnitIdentity::new(id.map(String::from), ty.map(TypeHandle::new))
    }

    #[test]
    fn quotes_groovy_strings() {
        assert_eq!(groovy_string("demo.plugin"), "'demo.plugin'");
        assert_eq!(groovy_string("it's"), r"'it\'s'");
        assert_eq!(groovy_string(r"C:\lib"), r"'C:\\lib'");
    }

    #[test]
    fn attach_uses_plugins_block_for_ids() {
        let lines = attach(&identity(Some("demo.plugin"), None), TargetKind::Project).unwrap();
        assert_eq!(lines, vec!["plugins {", "    id 'demo.plugin'", "}"]);
    }

    #[test]
    fn attach_falls_back_to_type_for_init() {
        let lines = attach(
            &identity(Some("demo.plugin"), Some("com.example.DemoPlugin")),
            TargetKind::Init,
        )
        .unwrap();
        assert_eq!(lines, vec!["apply plugin: com.example.DemoPlugin"]);
        assert!(attach(&identity(Some("demo.plugin"), None), TargetKind::Init).is_none());
    }

    #[test]
    fn realized_probe_excludes_allow_list() {
        let lines = realized_tasks_probe(&[":help".to_string(), ":nested:help".to_string()]);
        assert!(lines.contains(&"    configuredTaskPaths.removeAll([':help', ':nested:help'])".to_string()));
        assert!(lines.contains(&"gradle.allprojects {".to_string()));
    }

    #[test]
    fn settings_body_includes_nested_project_on_request() {
        assert_eq!(settings_body(false), vec!["rootProject.name = 'well-behaved'"]);
        assert_eq!(
            settings_body(true),
            vec!["rootProject.name = 'well-behaved'", "include 'nested'"]
        );
    }

    #[test]
    fn type_assertion_targets_the_right_container() {
        let handle = TypeHandle::new("com.example.DemoPlugin");
        let lines = assert_plugin_type(TargetKind::Settings, "demo.plugin", &handle);
        assert_eq!(lines[0], "def pluginById = settings.plugins.findPlugin('demo.plugin')");
        assert!(lines[1].starts_with("assert pluginById instanceof com.example.DemoPlugin"));
    }

    #[test]
    fn only_init_target_needs_extra_args() {
        assert_eq!(target_args(TargetKind::Init), vec!["--init-script", "init.gradle"]);
        assert!(target_args(TargetKind::Project).is_empty());
        assert!(target_args(TargetKind::Settings).is_empty());
    }
}
