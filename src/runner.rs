//! Driving the external build tool.
//!
//! [`RunnerAdapter`] is the seam between scenarios and the build tool: the
//! harness only ever asks it to resolve how the plugin under test reaches the
//! tool's classpath and to run the tool in a workspace. [`ProcessRunner`] is
//! the stock implementation, spawning a real process.

use crate::error::RunnerError;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout per invocation in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Metadata file written by plugin builds packaged for self-discovery.
pub const METADATA_FILE_NAME: &str = "plugin-under-test-metadata.properties";

/// Environment variable holding an explicit plugin classpath.
pub const CLASSPATH_ENV: &str = "WELLBEHAVED_PLUGIN_CLASSPATH";

/// Name of the generated init script injecting the classpath.
pub const CLASSPATH_INIT_SCRIPT: &str = "wellbehaved-classpath.init.gradle";

const METADATA_CLASSPATH_KEY: &str = "implementation-classpath";

/// Whether an invocation is required to succeed or to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Success,
    Failure,
}

/// Captured result of one build-tool invocation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InvocationResult {
    /// Exit code if the process exited normally.
    pub exit_code: Option<i32>,
    /// Signal number if the process was terminated by a signal (Unix only).
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn meets(&self, expectation: Expectation) -> bool {
        match expectation {
            Expectation::Success => self.succeeded(),
            Expectation::Failure => !self.succeeded(),
        }
    }

    /// Stdout followed by stderr, for message matching.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Checks the result against `expectation`.
    pub fn expect(self, expectation: Expectation, args: &[String]) -> Result<Self, RunnerError> {
        if self.meets(expectation) {
            Ok(self)
        } else {
            Err(RunnerError::UnexpectedOutcome {
                expected: expectation,
                args: args.to_vec(),
                result: Box::new(self),
            })
        }
    }
}

/// Where the plugin classpath came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClasspathMode {
    /// The build tool already knows how to find the plugin.
    #[default]
    Ambient,
    /// Read from a plugin-under-test metadata file.
    Metadata { file: PathBuf, entries: Vec<PathBuf> },
    /// Supplied directly by configuration or environment.
    Explicit { entries: Vec<PathBuf> },
}

impl ClasspathMode {
    pub fn entries(&self) -> &[PathBuf] {
        match self {
            ClasspathMode::Ambient => &[],
            ClasspathMode::Metadata { entries, .. } | ClasspathMode::Explicit { entries } => entries,
        }
    }
}

/// How an invocation is prepared before the scenario's own arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationConfig {
    pub classpath: ClasspathMode,
    /// Init script injecting the classpath, passed ahead of scenario scripts.
    /// Relative to the workspace, which is the tool's working directory.
    pub init_script: Option<PathBuf>,
}

impl InvocationConfig {
    /// Arguments to place before the scenario's arguments.
    pub fn leading_args(&self) -> Vec<String> {
        match &self.init_script {
            Some(script) => vec!["--init-script".to_string(), script.display().to_string()],
            None => Vec::new(),
        }
    }
}

/// Collaborator running the external build tool.
pub trait RunnerAdapter: Send + Sync {
    /// Resolves how the plugin under test reaches the tool in `workspace`.
    fn resolve_invocation_context(&self, workspace: &Path) -> Result<InvocationConfig, RunnerError>;

    /// Runs the tool in `workspace` with `args`. Returns
    /// [`RunnerError::UnexpectedOutcome`] when the result does not meet
    /// `expectation`.
    fn invoke(
        &self,
        workspace: &Path,
        args: &[String],
        expectation: Expectation,
    ) -> Result<InvocationResult, RunnerError>;
}

/// Source of the plugin classpath for [`ProcessRunner`].
#[derive(Debug, Clone, Default)]
pub struct ClasspathSource {
    /// Metadata file to read; used when it exists.
    pub metadata_file: Option<PathBuf>,
    /// Explicit entries; used when no metadata file is found.
    pub entries: Vec<PathBuf>,
}

impl ClasspathSource {
    /// Picks metadata mode when the metadata file exists, otherwise explicit
    /// entries, falling back to [`CLASSPATH_ENV`].
    pub fn resolve(&self) -> Result<ClasspathMode, RunnerError> {
        if let Some(file) = &self.metadata_file
            && file.is_file()
        {
            let contents = std::fs::read_to_string(file).map_err(|source| RunnerError::Metadata {
                path: file.clone(),
                source,
            })?;
            return Ok(ClasspathMode::Metadata {
                file: file.clone(),
                entries: parse_metadata_classpath(&contents),
            });
        }

        if !self.entries.is_empty() {
            return Ok(ClasspathMode::Explicit {
                entries: self.entries.clone(),
            });
        }

        match std::env::var_os(CLASSPATH_ENV) {
            Some(value) if !value.is_empty() => Ok(ClasspathMode::Explicit {
                entries: std::env::split_paths(&value).collect(),
            }),
            _ => Ok(ClasspathMode::Ambient),
        }
    }
}

/// Extracts the classpath from a plugin-under-test metadata file.
pub fn parse_metadata_classpath(contents: &str) -> Vec<PathBuf> {
    let Some(value) = contents.lines().find_map(|line| {
        let line = line.trim_start();
        if line.starts_with('#') || line.starts_with('!') {
            return None;
        }
        let (key, value) = line.split_once(['=', ':'])?;
        (key.trim() == METADATA_CLASSPATH_KEY).then(|| unescape_property(value.trim()))
    }) else {
        return Vec::new();
    };

    std::env::split_paths(&value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

fn unescape_property(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders the init script adding `entries` to every script classpath.
pub fn classpath_init_script(entries: &[PathBuf]) -> Vec<String> {
    let files = entries
        .iter()
        .map(|p| crate::probe::groovy_string(&p.display().to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        "initscript {".to_string(),
        "    dependencies {".to_string(),
        format!("        classpath files({files})"),
        "    }".to_string(),
        "}".to_string(),
        "beforeSettings { settings ->".to_string(),
        "    settings.buildscript.dependencies {".to_string(),
        format!("        classpath files({files})"),
        "    }".to_string(),
        "}".to_string(),
    ]
}

/// Runs a real build-tool executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: String,
    base_args: Vec<String>,
    env: HashMap<String, String>,
    inherit_env: bool,
    timeout: Duration,
    classpath: ClasspathSource,
}

impl ProcessRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            base_args: Vec::new(),
            env: HashMap::new(),
            inherit_env: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            classpath: ClasspathSource::default(),
        }
    }

    /// Arguments passed before everything else on every invocation.
    pub fn base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn classpath(mut self, classpath: ClasspathSource) -> Self {
        self.classpath = classpath;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl RunnerAdapter for ProcessRunner {
    fn resolve_invocation_context(&self, workspace: &Path) -> Result<InvocationConfig, RunnerError> {
        let classpath = self.classpath.resolve()?;
        if classpath.entries().is_empty() {
            return Ok(InvocationConfig {
                classpath,
                init_script: None,
            });
        }

        let script = workspace.join(CLASSPATH_INIT_SCRIPT);
        let mut content = classpath_init_script(classpath.entries()).join("\n");
        content.push('\n');
        std::fs::write(&script, content).map_err(|source| RunnerError::InitScript {
            path: script.clone(),
            source,
        })?;
        Ok(InvocationConfig {
            classpath,
            init_script: Some(PathBuf::from(CLASSPATH_INIT_SCRIPT)),
        })
    }

    fn invoke(
        &self,
        workspace: &Path,
        args: &[String],
        expectation: Expectation,
    ) -> Result<InvocationResult, RunnerError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.base_args);
        cmd.args(args);
        cmd.current_dir(workspace);

        if !self.inherit_env {
            cmd.env_clear();
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(command = %self.command, ?args, cwd = %workspace.display(), "spawning build tool");
        let result = run_with_timeout(cmd, &self.command, self.timeout)?;
        result.expect(expectation, args)
    }
}

fn run_with_timeout(
    mut cmd: Command,
    command: &str,
    timeout: Duration,
) -> Result<InvocationResult, RunnerError> {
    let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
        command: command.to_string(),
        source,
    })?;

    // Drain both pipes concurrently so a chatty tool cannot block on a full pipe.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RunnerError::Timeout {
                        command: command.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(source) => {
                return Err(RunnerError::Wait {
                    command: command.to_string(),
                    source,
                });
            }
        }
    };

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Ok(InvocationResult {
        exit_code: status.code(),
        signal,
        stdout: stdout.map(join_output).unwrap_or_default(),
        stderr: stderr.map(join_output).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_metadata_classpath_with_escapes() {
        let contents = "# generated\nimplementation-classpath=/a/b.jar:/c/classes\n";
        let entries = parse_metadata_classpath(contents);
        #[cfg(unix)]
        assert_eq!(
            entries,
            vec![PathBuf::from("/a/b.jar"), PathBuf::from("/c/classes")]
        );
        #[cfg(not(unix))]
        assert!(!entries.is_empty());
    }

    #[test]
    fn metadata_without_classpath_key_is_empty() {
        assert!(parse_metadata_classpath("other=value\n").is_empty());
    }

    #[test]
    fn unescapes_property_values() {
        assert_eq!(unescape_property(r"C\:\\tools\\lib.jar"), r"C:\tools\lib.jar");
    }

    #[test]
    fn metadata_file_wins_over_explicit_entries() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(METADATA_FILE_NAME);
        std::fs::write(&file, "implementation-classpath=/plugin.jar\n").unwrap();

        let source = ClasspathSource {
            metadata_file: Some(file.clone()),
            entries: vec![PathBuf::from("/explicit.jar")],
        };
        match source.resolve().unwrap() {
            ClasspathMode::Metadata { file: f, entries } => {
                assert_eq!(f, file);
                assert_eq!(entries, vec![PathBuf::from("/plugin.jar")]);
            }
            other => panic!("expected metadata mode, got {other:?}"),
        }
    }

    #[test]
    fn missing_metadata_falls_back_to_explicit() {
        let source = ClasspathSource {
            metadata_file: Some(PathBuf::from("/does/not/exist.properties")),
            entries: vec![PathBuf::from("/explicit.jar")],
        };
        assert_eq!(
            source.resolve().unwrap(),
            ClasspathMode::Explicit {
                entries: vec![PathBuf::from("/explicit.jar")]
            }
        );
    }

    #[test]
    fn explicit_classpath_writes_init_script() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new("gradle").classpath(ClasspathSource {
            metadata_file: None,
            entries: vec![PathBuf::from("/plugin.jar")],
        });

        let config = runner.resolve_invocation_context(dir.path()).unwrap();
        assert_eq!(
            config.leading_args(),
            vec!["--init-script".to_string(), CLASSPATH_INIT_SCRIPT.to_string()]
        );
        let content = std::fs::read_to_string(dir.path().join(CLASSPATH_INIT_SCRIPT)).unwrap();
        assert!(content.contains("classpath files('/plugin.jar')"));
    }

    #[test]
    fn ambient_mode_has_no_leading_args() {
        assert!(InvocationConfig::default().leading_args().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_of_successful_invocation() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new("sh");
        let result = runner
            .invoke(
                dir.path(),
                &args(&["-c", "echo out; echo err >&2"]),
                Expectation::Success,
            )
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_workspace_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = ProcessRunner::new("cat")
            .invoke(dir.path(), &args(&["marker.txt"]), Expectation::Success)
            .unwrap();
        assert_eq!(result.stdout, "here");
    }

    #[cfg(unix)]
    #[test]
    fn failure_expected_but_succeeded_is_unexpected_outcome() {
        let dir = tempdir().unwrap();
        let err = ProcessRunner::new("true")
            .invoke(dir.path(), &[], Expectation::Failure)
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::UnexpectedOutcome {
                expected: Expectation::Failure,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn failure_expected_and_failed_returns_output() {
        let dir = tempdir().unwrap();
        let result = ProcessRunner::new("sh")
            .invoke(
                dir.path(),
                &args(&["-c", "echo 'cannot apply' >&2; exit 3"]),
                Expectation::Failure,
            )
            .unwrap();
        assert_eq!(result.exit_code, Some(3));
        assert!(result.combined_output().contains("cannot apply"));
    }

    #[cfg(unix)]
    #[test]
    fn base_args_and_env_are_applied() {
        let dir = tempdir().unwrap();
        let result = ProcessRunner::new("sh")
            .base_args(["-c"])
            .env("WELLBEHAVED_TEST_VALUE", "present")
            .invoke(
                dir.path(),
                &args(&["echo $WELLBEHAVED_TEST_VALUE"]),
                Expectation::Success,
            )
            .unwrap();
        assert_eq!(result.stdout, "present\n");
    }

    #[cfg(unix)]
    #[test]
    fn times_out_long_running_process() {
        let dir = tempdir().unwrap();
        let err = ProcessRunner::new("sleep")
            .timeout(Duration::from_millis(100))
            .invoke(dir.path(), &args(&["5"]), Expectation::Success)
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
    }

    #[test]
    fn missing_executable_is_spawn_error() {
        let dir = tempdir().unwrap();
        let err = ProcessRunner::new("wellbehaved-no-such-tool")
            .invoke(dir.path(), &[], Expectation::Success)
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
