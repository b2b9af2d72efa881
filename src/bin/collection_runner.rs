//! Command-line entry point.
//!
//! Exit codes: 0 when everything passed, 1 when requests, lint errors or
//! doctor steps failed, 2 when the run could not start at all.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use collection_runner::collection::{load_collection, Collection};
use collection_runner::config::{
    get_config, load_config_file, resolve_config_path, update_config, RunnerConfig,
};
use collection_runner::doctor::{self, DoctorStep, TokioProcessRunner};
use collection_runner::environment::{
    find_environment_file, load_environment_file, select_environment, Environments,
};
use collection_runner::executor::{CancellationToken, HttpExecutor};
use collection_runner::export::{export_collection, CurlOptions};
use collection_runner::lint::{has_errors, lint_collection};
use collection_runner::runner::{prepare_request, CollectionRunner, RunOptions};
use collection_runner::variables::VariableContext;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "collection-runner", version, about)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); also shows
    /// responses of failed requests
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (default: ./collection-runner.json when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send every request and check the responses
    Run(RunArgs),
    /// Check a collection without sending anything
    Lint {
        collection: PathBuf,
        #[command(flatten)]
        vars: VarArgs,
    },
    /// Print folders and requests
    List { collection: PathBuf },
    /// Print requests as cURL commands
    Export {
        collection: PathBuf,
        #[command(flatten)]
        vars: VarArgs,
        /// Keep {{variables}} and auth unresolved
        #[arg(long)]
        raw: bool,
        /// One line per command
        #[arg(long)]
        compact: bool,
        /// Add -k to every command
        #[arg(long)]
        insecure: bool,
    },
    /// Run the backend's own diagnostic commands
    Doctor(DoctorArgs),
}

#[derive(Debug, Args)]
struct VarArgs {
    /// Environment file
    #[arg(long, value_name = "FILE")]
    env: Option<PathBuf>,

    /// Environment to activate from the file
    #[arg(long, value_name = "NAME")]
    env_name: Option<String>,

    /// Override a variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,
}

#[derive(Debug, Args)]
struct RunArgs {
    collection: PathBuf,

    #[command(flatten)]
    vars: VarArgs,

    /// Only requests in this folder (e.g. "Inventory/Batches")
    #[arg(long)]
    folder: Option<String>,

    /// Only requests whose "Folder / Name" contains this text
    #[arg(long)]
    grep: Option<String>,

    /// Stop at the first request that does not pass
    #[arg(long)]
    bail: bool,

    /// Pause between requests
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Per-request timeout
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DoctorArgs {
    /// Python interpreter
    #[arg(long)]
    python: Option<String>,

    /// Path to manage.py
    #[arg(long)]
    manage: Option<String>,

    /// Working directory for every step
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Replace the plan with custom steps (repeatable), e.g. --step "lint=ruff check ."
    #[arg(long = "step", value_name = "NAME=COMMAND", value_parser = DoctorStep::parse_cli)]
    steps: Vec<DoctorStep>,

    /// Kill a step after this many seconds
    #[arg(long, value_name = "N")]
    timeout_secs: Option<u64>,
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", arg)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Returns whether the command succeeded.
async fn dispatch(cli: Cli) -> Result<bool> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config_path = resolve_config_path(cli.config.as_deref(), &cwd);
    if cli.config.is_some() && !config_path.exists() {
        bail!("config file {} does not exist", config_path.display());
    }
    let config = load_config_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let verbose = cli.verbose > 0;
    match cli.command {
        Command::Run(args) => run(args, &config, verbose).await,
        Command::Lint { collection, vars } => lint(&collection, &vars, &config),
        Command::List { collection } => list(&collection),
        Command::Export {
            collection,
            vars,
            raw,
            compact,
            insecure,
        } => export(&collection, &vars, &config, raw, CurlOptions { compact, insecure }),
        Command::Doctor(args) => run_doctor(args, &config, verbose).await,
    }
}

fn open_collection(path: &Path) -> Result<Collection> {
    load_collection(path).with_context(|| format!("loading collection {}", path.display()))
}

/// `--env`, then the configured file, then a file next to the collection.
fn load_environments(
    args: &VarArgs,
    config: &RunnerConfig,
    collection_path: &Path,
) -> Result<Environments> {
    let explicit = args
        .env
        .clone()
        .or_else(|| config.environment_file.as_ref().map(PathBuf::from));
    let path = match explicit {
        Some(path) => Some(path),
        None => find_environment_file(collection_path.parent().unwrap_or(Path::new("."))),
    };

    let mut environments = match path {
        Some(path) => load_environment_file(&path)
            .with_context(|| format!("loading environment {}", path.display()))?,
        None => Environments::new(),
    };
    if let Some(name) = &args.env_name {
        select_environment(&mut environments, name)?;
    }
    if let Some(active) = &environments.active {
        info!("using environment '{}'", active);
    }
    Ok(environments)
}

fn overrides(args: &VarArgs) -> HashMap<String, String> {
    args.vars.iter().cloned().collect()
}

async fn run(args: RunArgs, config: &RunnerConfig, verbose: bool) -> Result<bool> {
    update_config(|c| {
        if let Some(timeout) = args.timeout_ms {
            c.timeout = timeout;
        }
        if args.insecure {
            c.validate_ssl = false;
        }
        if let Some(delay) = args.delay_ms {
            c.delay_ms = delay;
        }
        if args.bail {
            c.bail = true;
        }
    });
    let effective = get_config();

    let collection = open_collection(&args.collection)?;
    let environments = load_environments(&args.vars, config, &args.collection)?;
    let executor = HttpExecutor::from_global_config().context("building HTTP client")?;

    let runner = CollectionRunner::new(
        collection,
        environments,
        executor,
        RunOptions {
            folder: args.folder.clone(),
            name_filter: args.grep.clone(),
            bail: effective.bail,
            delay: effective.delay(),
            overrides: overrides(&args.vars),
        },
    );
    if runner.selected_requests().is_empty() {
        bail!("no requests match the given --folder/--grep filters");
    }

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("interrupted, finishing the current request");
        handle.cancel();
    });

    let report = runner.run(&cancel).await;
    print!("{}", report.render_text(verbose));

    if let Some(path) = &args.report {
        let json = report.to_json_pretty().context("serializing report")?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    Ok(report.is_success() && !cancel.is_cancelled())
}

fn lint(path: &Path, vars: &VarArgs, config: &RunnerConfig) -> Result<bool> {
    let collection = open_collection(path)?;
    let environments = load_environments(vars, config, path)?;
    let diagnostics = lint_collection(&collection, &environments, &overrides(vars));

    for diagnostic in &diagnostics {
        println!("{}", diagnostic);
    }
    println!(
        "{}: {} request(s), {} diagnostic(s)",
        collection.name(),
        collection.requests().len(),
        diagnostics.len()
    );
    Ok(!has_errors(&diagnostics))
}

fn list(path: &Path) -> Result<bool> {
    let collection = open_collection(path)?;
    println!("{}", collection.name());

    let folders = collection.folders();
    if !folders.is_empty() {
        println!("\nFolders:");
        for folder in &folders {
            println!("  {}", folder.join(" / "));
        }
    }

    println!("\nRequests:");
    for request in collection.requests() {
        let auth = if request.auth.is_none() {
            String::new()
        } else {
            format!("  [{}]", request.auth.scheme_name())
        };
        println!(
            "  {:>3}  {:<7} {}{}",
            request.id,
            request.method.as_str(),
            request.display_path(),
            auth
        );
    }
    Ok(true)
}

fn export(
    path: &Path,
    vars: &VarArgs,
    config: &RunnerConfig,
    raw: bool,
    options: CurlOptions,
) -> Result<bool> {
    let collection = open_collection(path)?;
    let mut requests = collection.requests();

    if !raw {
        let environments = load_environments(vars, config, path)?;
        let context =
            VariableContext::from_sources(&environments, collection.variables(), overrides(vars));
        for request in &mut requests {
            match prepare_request(request, &context) {
                Ok(prepared) => *request = prepared,
                // Captured values only exist during a run
                Err(e) => warn!("{}: exporting unresolved ({})", request.display_path(), e),
            }
        }
    }

    print!("{}", export_collection(&requests, &options));
    Ok(true)
}

async fn run_doctor(args: DoctorArgs, config: &RunnerConfig, verbose: bool) -> Result<bool> {
    let python = args.python.as_deref().unwrap_or(&config.doctor.python);
    let manage = args.manage.as_deref().unwrap_or(&config.doctor.manage);

    let steps = if !args.steps.is_empty() {
        args.steps
    } else if let Some(steps) = &config.doctor.steps {
        steps.clone()
    } else {
        doctor::default_plan(python, manage)
    };
    let steps = doctor::with_defaults(steps, args.cwd.as_deref(), args.timeout_secs);

    let runner = TokioProcessRunner::new(config.doctor.output_cap_bytes);
    let report = doctor::run_plan(&steps, &runner).await;
    print!("{}", report.render_text(verbose));
    Ok(report.is_success())
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("cannot install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
