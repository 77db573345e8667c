//! The Stencil template checker CLI.
//!
//! Provides the `stencilc` command with the following subcommand:
//!
//! - `stencilc check <path>...` - Infer context types for a set of templates
//!
//! Options:
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//! - `--types` - Print every template's inferred context type
//! - `--max-passes` - Override the fixpoint pass budget
//! - `--config` - Read settings from this file instead of `stencil.toml`
//!
//! Logging goes to stderr and is filtered by `STENCIL_LOG` (default `warn`).

mod config;
mod discovery;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use stencil_common::LineIndex;
use stencil_typeck::diagnostics::{render_diagnostic_with, render_parse_error, RenderOptions};
use stencil_typeck::Analysis;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "stencilc", version, about = "Context type checker for Go-style templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer and check the context types of template files
    Check {
        /// Template files or directories to search for templates
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,

        /// Print the inferred context type of every template
        #[arg(long)]
        types: bool,

        /// Upper bound on fixpoint passes (overrides the config file)
        #[arg(long = "max-passes")]
        max_passes: Option<usize>,

        /// Path to a config file (defaults to stencil.toml in the first directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Output settings for one `check` run.
struct CheckOptions {
    json: bool,
    color: bool,
    types: bool,
}

/// One template file read from disk.
struct LoadedFile {
    path: PathBuf,
    source: String,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            paths,
            json,
            no_color,
            types,
            max_passes,
            config,
        } => {
            let options = CheckOptions {
                json,
                color: !no_color && !json,
                types,
            };
            match check(&paths, config.as_deref(), max_passes, &options) {
                Ok(true) => process::exit(1),
                Ok(false) => {}
                Err(e) => {
                    if json {
                        let msg = serde_json::json!({
                            "code": "C0001",
                            "severity": "error",
                            "message": e,
                        });
                        eprintln!("{}", msg);
                    } else {
                        eprintln!("error: {}", e);
                    }
                    process::exit(1);
                }
            }
        }
    }
}

/// Install the stderr subscriber, filtered by `STENCIL_LOG`.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("STENCIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Run the check pipeline: discover -> parse -> analyse -> report.
///
/// Returns whether any error was reported.
fn check(
    paths: &[PathBuf],
    config_path: Option<&Path>,
    max_passes: Option<usize>,
    options: &CheckOptions,
) -> Result<bool, String> {
    let first_dir = paths.iter().find(|p| p.is_dir()).map(PathBuf::as_path);
    let mut config = Config::load(config_path, first_dir)?;
    if let Some(max_passes) = max_passes {
        config.analysis.max_passes = max_passes;
    }

    let loaded = load_files(paths, &config.files.extensions)?;
    if loaded.is_empty() {
        return Err("No template files found".to_string());
    }
    tracing::debug!(files = loaded.len(), "loaded templates");

    let mut has_errors = false;
    let mut files = BTreeMap::new();
    for (id, file) in &loaded {
        let parse = stencil_syntax::parse(&file.source);
        for error in &parse.errors {
            has_errors = true;
            if options.json {
                let index = LineIndex::new(&file.source);
                let json = serde_json::json!({
                    "file": id,
                    "code": stencil_typeck::diagnostics::PARSE_ERROR_CODE,
                    "kind": "ParseError",
                    "severity": "error",
                    "message": error.message,
                    "start": index.position(error.span.start),
                    "end": index.position(error.span.end),
                });
                eprintln!("{}", json);
            } else {
                let render = RenderOptions {
                    color: options.color,
                };
                eprint!("{}", render_parse_error(error, &file.source, render));
            }
        }
        files.insert(id.clone(), parse.file);
    }

    let analysis = stencil_typeck::analyze(&files, &config.analysis);
    has_errors |= report_diagnostics(&analysis, &loaded, options);
    if options.types {
        print_types(&analysis, options.json);
    }
    Ok(has_errors)
}

/// Read every template under `paths`, keyed by file id.
///
/// Directories contribute files relative to themselves; a file given directly
/// is keyed by its own name.
fn load_files(
    paths: &[PathBuf],
    extensions: &[String],
) -> Result<BTreeMap<String, LoadedFile>, String> {
    let mut loaded = BTreeMap::new();
    for root in paths {
        if !root.exists() {
            return Err(format!("Path '{}' does not exist", root.display()));
        }
        let entries: Vec<(String, PathBuf)> = if root.is_dir() {
            discovery::discover_templates(root, extensions)?
                .into_iter()
                .map(|relative| (discovery::file_id(&relative), root.join(relative)))
                .collect()
        } else {
            let name = root.file_name().map(Path::new).unwrap_or(root.as_path());
            vec![(discovery::file_id(name), root.clone())]
        };

        for (id, path) in entries {
            let source = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            if let Some(previous) = loaded.insert(id.clone(), LoadedFile { path: path.clone(), source })
            {
                return Err(format!(
                    "'{}' and '{}' both map to file id '{}'",
                    previous.path.display(),
                    path.display(),
                    id
                ));
            }
        }
    }
    Ok(loaded)
}

/// Report analysis diagnostics. Returns true if any is an error.
fn report_diagnostics(
    analysis: &Analysis,
    loaded: &BTreeMap<String, LoadedFile>,
    options: &CheckOptions,
) -> bool {
    let render = RenderOptions {
        color: options.color,
    };
    for file in &analysis.files {
        let Some(source) = loaded.get(&file.file).map(|f| f.source.as_str()) else {
            continue;
        };
        let index = LineIndex::new(source);
        for diagnostic in &file.diagnostics {
            if options.json {
                eprintln!("{}", diagnostic.to_json(&index));
            } else {
                eprintln!("{}:", file.file);
                eprint!("{}", render_diagnostic_with(diagnostic, source, render));
            }
        }
    }
    analysis.has_errors()
}

fn print_types(analysis: &Analysis, json: bool) {
    for template in analysis.files.iter().flat_map(|f| f.templates.iter()) {
        if json {
            let line = serde_json::json!({
                "template": template.name,
                "file": template.file,
                "type": template.ty.to_string(),
                "declared": template.declared,
                "callers": template.callers,
            });
            println!("{}", line);
        } else {
            println!("{}: {}", template.name, template.ty);
        }
    }
}
