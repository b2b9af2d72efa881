//! Backend diagnostics.
//!
//! Runs a fixed list of framework checks (Django's `check`, migration status
//! and so on) one after another and reports which ones failed. Steps never
//! run in parallel and are never retried; a step that fails does not stop
//! the ones after it.

pub mod process;

pub use process::{CommandSpec, DoctorError, ProcessRunner, StepOutput, TokioProcessRunner};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One command of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStep {
    pub name: String,
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// A failure is reported but does not fail the plan
    #[serde(default)]
    pub allow_failure: bool,
}

impl DoctorStep {
    pub fn new<I, S>(name: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            timeout_secs: None,
            allow_failure: false,
        }
    }

    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    /// Parses a `name=command line` argument as given to `--step`.
    ///
    /// The command line is split on whitespace; single and double quotes
    /// group words.
    ///
    /// # Examples
    ///
    /// ```
    /// use collection_runner::doctor::DoctorStep;
    ///
    /// let step = DoctorStep::parse_cli("lint=ruff check 'my app'").unwrap();
    /// assert_eq!(step.name, "lint");
    /// assert_eq!(step.argv, vec!["ruff", "check", "my app"]);
    /// ```
    pub fn parse_cli(arg: &str) -> Result<Self, String> {
        let (name, command) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=COMMAND, got '{}'", arg))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("step name is empty in '{}'", arg));
        }
        let argv = split_command_line(command)?;
        if argv.is_empty() {
            return Err(format!("step '{}' has an empty command", name));
        }
        Ok(DoctorStep::new(name, argv))
    }

    /// The command as a single display string.
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{}'", arg)
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command_spec(&self) -> CommandSpec {
        CommandSpec {
            argv: self.argv.clone(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(format!("unterminated quote in '{}'", line));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// The standard Django diagnostic sequence.
pub fn default_plan(python: &str, manage: &str) -> Vec<DoctorStep> {
    let manage_cmd = |args: &[&str]| {
        let mut argv = vec![python.to_string(), manage.to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    };

    vec![
        DoctorStep::new("check", manage_cmd(&["check"])),
        DoctorStep::new("showmigrations", manage_cmd(&["showmigrations"])),
        DoctorStep::new(
            "makemigrations-check",
            manage_cmd(&["makemigrations", "--check", "--dry-run"]),
        ),
        DoctorStep::new("migrate-plan", manage_cmd(&["migrate", "--plan"])),
        DoctorStep::new("check-deploy", manage_cmd(&["check", "--deploy"])).allow_failure(),
    ]
}

/// Applies a working directory and default timeout to steps that lack them.
pub fn with_defaults(
    mut steps: Vec<DoctorStep>,
    cwd: Option<&Path>,
    timeout_secs: Option<u64>,
) -> Vec<DoctorStep> {
    for step in &mut steps {
        if step.cwd.is_none() {
            step.cwd = cwd.map(Path::to_path_buf);
        }
        if step.timeout_secs.is_none() {
            step.timeout_secs = timeout_secs;
        }
    }
    steps
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed { exit_code: Option<i32> },
    TimedOut,
    SpawnError(String),
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub command: String,
    pub status: StepStatus,
    pub allow_failure: bool,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }

    /// Failed in a way that fails the plan.
    pub fn is_blocking_failure(&self) -> bool {
        !self.passed() && !self.allow_failure
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub steps: Vec<StepResult>,
}

impl DoctorReport {
    pub fn is_success(&self) -> bool {
        !self.steps.iter().any(StepResult::is_blocking_failure)
    }

    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.passed()).count()
    }

    /// One line per step, with output of failed steps when `verbose`
    /// or when the failure blocks the plan.
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let mark = match (&step.status, step.allow_failure) {
                (StepStatus::Passed, _) => "PASS",
                (_, true) => "WARN",
                _ => "FAIL",
            };
            let detail = match &step.status {
                StepStatus::Passed => String::new(),
                StepStatus::Failed {
                    exit_code: Some(code),
                } => format!(" (exit {})", code),
                StepStatus::Failed { exit_code: None } => " (killed by signal)".to_string(),
                StepStatus::TimedOut => " (timed out)".to_string(),
                StepStatus::SpawnError(e) => format!(" ({})", e),
            };
            let _ = writeln!(
                out,
                "{} {:<22} {:>7}ms  {}{}",
                mark,
                step.name,
                step.duration.as_millis(),
                step.command,
                detail
            );
            if !step.passed() && (verbose || !step.allow_failure) {
                for line in step.stderr.lines().chain(step.stdout.lines()).take(40) {
                    let _ = writeln!(out, "    {}", line);
                }
            }
        }
        let _ = writeln!(
            out,
            "\n{} steps, {} failed: {}",
            self.steps.len(),
            self.failed_count(),
            if self.is_success() { "OK" } else { "FAILED" }
        );
        out
    }
}

/// Runs every step in order and collects the results.
pub async fn run_plan<R: ProcessRunner>(steps: &[DoctorStep], runner: &R) -> DoctorReport {
    let mut report = DoctorReport::default();

    for step in steps {
        let command = step.command_line();
        info!("doctor: running {} ({})", step.name, command);

        let result = match runner.run(&step.to_command_spec()).await {
            Ok(output) => {
                let status = if output.timed_out {
                    StepStatus::TimedOut
                } else if output.succeeded() {
                    StepStatus::Passed
                } else {
                    StepStatus::Failed {
                        exit_code: output.exit_code,
                    }
                };
                StepResult {
                    name: step.name.clone(),
                    command,
                    status,
                    allow_failure: step.allow_failure,
                    duration: Duration::from_millis(output.wall_ms),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Err(e) => {
                warn!("doctor: {} could not run: {}", step.name, e);
                StepResult {
                    name: step.name.clone(),
                    command,
                    status: StepStatus::SpawnError(e.to_string()),
                    allow_failure: step.allow_failure,
                    duration: Duration::ZERO,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        };

        debug!("doctor: {} -> {:?}", result.name, result.status);
        report.steps.push(result);
    }

    report
}
