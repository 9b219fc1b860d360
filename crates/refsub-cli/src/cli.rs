//! refsub CLI - Resolve `${...}` references in configuration files
//!
//! Usage:
//!   refsub resolve base.yaml local.yaml --format json
//!   refsub get config.yaml database.url
//!   refsub check config.yaml

use clap::{Parser, Subcommand};
use colored::Colorize;
use refsub_core::{Config, EnvProvider, LayeredEnv, MapEnv, NoEnv, ProcessEnv, Replacer, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// refsub - Resolve ${...} references against the document and the environment
#[derive(Parser)]
#[command(name = "refsub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log resolution details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge configuration files, resolve references and print the result
    Resolve {
        /// Configuration file(s), later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Don't fall back to process environment variables
        #[arg(long)]
        no_env: bool,

        /// Define an environment variable for resolution (KEY=VALUE, repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Get a single resolved value
    Get {
        /// Configuration file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to the value (e.g., database.url)
        path: String,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,

        /// Don't fall back to process environment variables
        #[arg(long)]
        no_env: bool,

        /// Define an environment variable for resolution (KEY=VALUE, repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Parse files and report references that would stay unresolved
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Don't fall back to process environment variables
        #[arg(long)]
        no_env: bool,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    // A logger may already be installed when embedded
    let _ = env_logger::Builder::new().filter_level(level).try_init();

    match cli.command {
        Commands::Resolve {
            files,
            format,
            output,
            no_env,
            set,
        } => cmd_resolve(files, &format, output, no_env, &set),

        Commands::Get {
            files,
            path,
            format,
            default,
            no_env,
            set,
        } => cmd_get(files, &path, &format, default, no_env, &set),

        Commands::Check { files, no_env } => cmd_check(files, no_env),
    }
}

fn load_config(files: &[PathBuf]) -> Result<Config, String> {
    if files.is_empty() {
        return Err("No configuration files specified".to_string());
    }

    Config::load_merged(files).map_err(|e| format!("Failed to load configuration: {}", e))
}

fn parse_overrides(set: &[String]) -> Result<MapEnv, String> {
    set.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(format!("Invalid --set '{}': expected KEY=VALUE", pair)),
        })
        .collect()
}

fn build_replacer(no_env: bool, set: &[String]) -> Result<Replacer, String> {
    let overrides = parse_overrides(set)?;
    let env: Arc<dyn EnvProvider> = if no_env {
        Arc::new(LayeredEnv::new(overrides, NoEnv))
    } else {
        Arc::new(LayeredEnv::new(overrides, ProcessEnv))
    };
    Ok(Replacer::new().with_shared_env(env))
}

fn resolve_files(files: &[PathBuf], no_env: bool, set: &[String]) -> Result<Config, String> {
    let replacer = build_replacer(no_env, set)?;
    let mut config = load_config(files)?;
    config
        .resolve(&replacer)
        .map_err(|e| format!("Failed to resolve configuration: {}", e))?;
    Ok(config)
}

fn render_value(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => match value {
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_yaml::to_string(value).map_err(|e| e.to_string())
            }
            scalar => Ok(format!("{}\n", scalar)),
        },
    }
}

fn cmd_resolve(
    files: Vec<PathBuf>,
    format: &str,
    output: Option<PathBuf>,
    no_env: bool,
    set: &[String],
) -> ExitCode {
    let config = match resolve_files(&files, no_env, set) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = match format {
        "json" => config.to_json().map(|s| s + "\n"),
        _ => config.to_yaml(),
    };

    match result {
        Ok(content) => {
            if let Some(output_path) = output {
                if let Err(e) = std::fs::write(&output_path, &content) {
                    eprintln!("{}: {}", "Error writing file".red(), e);
                    return ExitCode::from(2);
                }
                eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
            } else {
                print!("{}", content);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(
    files: Vec<PathBuf>,
    path: &str,
    format: &str,
    default: Option<String>,
    no_env: bool,
    set: &[String],
) -> ExitCode {
    let config = match resolve_files(&files, no_env, set) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    match config.get(path) {
        Ok(value) => match render_value(value, format) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        },
        Err(_) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: Path '{}' not found", "Error".red(), path);
                ExitCode::from(1)
            }
        }
    }
}

fn cmd_check(files: Vec<PathBuf>, no_env: bool) -> ExitCode {
    let replacer = match build_replacer(no_env, &[]) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    let mut all_valid = true;

    for file in files {
        let mut config = match Config::load(&file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
                continue;
            }
        };

        if let Err(e) = config.resolve(&replacer) {
            eprintln!("{} {}: {}", "✗".red(), file.display(), e);
            all_valid = false;
            continue;
        }

        let unresolved = config.unresolved(&replacer);
        if unresolved.is_empty() {
            println!("{} {}: all references resolve", "✓".green(), file.display());
        } else {
            all_valid = false;
            eprintln!(
                "{} {}: {} unresolved reference(s)",
                "✗".red(),
                file.display(),
                unresolved.len()
            );
            for item in unresolved {
                eprintln!("    {}: {}", item.path, item.token.yellow());
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
