use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wellbehaved::report::{self, OutputFormat};
use wellbehaved::{Harness, TestCase, engine, loader, schema, workspace};

#[derive(Parser)]
#[command(name = "wellbehaved")]
#[command(about = "A conformance harness that checks build-tool plugins for good citizenship")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario for a plugin
    Run {
        /// Path to the harness file
        config: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
        /// Filter scenarios by name pattern (substring match)
        #[arg(short, long)]
        filter: Option<String>,
        /// Keep workspaces of failed scenarios on disk
        #[arg(long)]
        keep_failed: bool,
        /// Show verbose output (debug logging)
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the scenario matrix without running it
    List {
        /// Path to the harness file
        config: PathBuf,
    },
    /// Validate a harness file without running it
    Validate {
        /// Path to the harness file
        config: PathBuf,
    },
    /// Scaffold a new harness file
    Init {
        /// Output path for the new harness file
        #[arg(default_value = loader::DEFAULT_CONFIG_FILENAME)]
        path: PathBuf,
    },
    /// Output the harness file schema
    Schema,
}

/// Log filter environment variable.
const LOG_ENV: &str = "WELLBEHAVED_LOG";

fn main() {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Command::Run { verbose: true, .. });
    init_logging(verbose);

    match cli.command {
        Command::Run {
            config,
            output,
            filter,
            keep_failed,
            verbose: _,
        } => {
            let mut harness = load_harness(&config);
            if keep_failed {
                harness = harness.keep_failed_workspaces(true);
            }

            let cases = match harness.cases() {
                Ok(cases) => cases,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            let cases: Vec<_> = match filter.as_deref() {
                Some(pattern) => cases
                    .into_iter()
                    .filter(|c| c.display_name().contains(pattern))
                    .collect(),
                None => cases,
            };
            if cases.is_empty() {
                eprintln!("No scenarios match the filter");
                std::process::exit(1);
            }

            let run = engine::execute_all(cases);
            let removed = workspace::run_safety_cleanup();
            if removed > 0 {
                tracing::warn!(removed, "removed workspaces left behind by the run");
            }

            let suite = harness.identity().label().to_string();
            print!("{}", report::render(&run, &suite, output));
            if output == OutputFormat::Json {
                println!();
            }

            if run.has_failures() {
                std::process::exit(1);
            }
        }
        Command::List { config } => {
            let harness = load_harness(&config);
            match harness.matrix() {
                Ok(entries) => {
                    for entry in entries {
                        println!("{}", entry.display_name());
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Validate { config } => {
            let harness = load_harness(&config);
            match harness.matrix() {
                Ok(entries) => {
                    println!("✓ {} ({} scenarios)", config.display(), entries.len());
                }
                Err(e) => {
                    eprintln!("✗ {}: {e}", config.display());
                    std::process::exit(1);
                }
            }
        }
        Command::Init { path } => {
            let template = r#"version: 1

unit:
  id: com.example.demo
  # type: com.example.DemoPlugin

# Targets the plugin supports: project, settings, init.
targets: [project]

# cross_target: auto

runner:
  command: gradle
  args: ["--stacktrace"]
  # metadata_file: build/pluginUnderTestMetadata/plugin-under-test-metadata.properties
  # classpath: ["build/libs/demo.jar"]
  # timeout: 300

# workspace:
#   root: target/tmp/test files
#   keep_failed: false
#   strict_cleanup: false

# realized_allow_list: [":help"]
"#;
            if path.exists() {
                eprintln!("Error: file already exists: {}", path.display());
                std::process::exit(1);
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
                && let Err(e) = fs::create_dir_all(parent)
            {
                eprintln!("Error creating directory: {e}");
                std::process::exit(1);
            }
            if let Err(e) = fs::write(&path, template) {
                eprintln!("Error writing file: {e}");
                std::process::exit(1);
            }
            println!("Created: {}", path.display());
        }
        Command::Schema => {
            let schema = schema::generate_schema();
            match serde_json::to_string_pretty(&schema) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing schema: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_harness(path: &Path) -> Harness {
    match Harness::from_file(path) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("Error loading {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}
