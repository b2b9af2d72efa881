//! System variable resolution.
//!
//! Implements the `$`-prefixed dynamic variables usable inside `{{...}}`:
//! `$guid`, `$randomUUID`, `$timestamp`, `$isoTimestamp`, `$datetime`,
//! `$randomInt`, `$processEnv` and `$dotenv`.

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use log::warn;
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Errors that can occur during variable resolution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VarError {
    /// Variable is not defined in any source
    #[error("undefined variable: {0}")]
    Undefined(String),
    /// Variable syntax is invalid
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),
    /// Offset parsing failed
    #[error("invalid offset: {0}")]
    InvalidOffset(String),
    /// Process environment variable not found (for non-optional lookups)
    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
    /// .env file reading failed
    #[error("dotenv error: {0}")]
    Dotenv(String),
    /// Circular reference detected during substitution
    #[error("circular reference: {0}")]
    CircularReference(String),
    /// A value could not be extracted from a response
    #[error("capture failed: {0}")]
    Capture(String),
}

/// Default exclusive upper bound for `{{$randomInt}}` without arguments.
const DEFAULT_RANDOM_INT_MAX: i64 = 1000;

/// Cache for .env file contents to avoid repeated file reads
static DOTENV_CACHE: Lazy<Mutex<Option<HashMap<String, String>>>> =
    Lazy::new(|| Mutex::new(None));

/// Resolves a system variable by name (without the `$`) and its arguments.
///
/// # Examples
///
/// ```
/// use collection_runner::variables::system::resolve_system_variable;
///
/// assert_eq!(resolve_system_variable("guid", &[]).unwrap().len(), 36);
/// resolve_system_variable("timestamp", &["-1", "d"]).unwrap();
/// resolve_system_variable("datetime", &["iso8601"]).unwrap();
///
/// let n: i64 = resolve_system_variable("randomInt", &["1", "10"]).unwrap().parse().unwrap();
/// assert!((1..10).contains(&n));
/// ```
pub fn resolve_system_variable(name: &str, args: &[&str]) -> Result<String, VarError> {
    match name {
        "guid" | "randomUUID" => Ok(Uuid::new_v4().to_string()),
        "timestamp" => resolve_timestamp(args),
        "isoTimestamp" => Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        "datetime" => resolve_datetime(args),
        "randomInt" => resolve_random_int(args),
        "processEnv" => resolve_process_env(args),
        "dotenv" => resolve_dotenv(args),
        _ => Err(VarError::Undefined(format!("${}", name))),
    }
}

/// Whether `name` (without `$`) is a system variable this module knows.
pub fn is_system_variable(name: &str) -> bool {
    matches!(
        name,
        "guid"
            | "randomUUID"
            | "timestamp"
            | "isoTimestamp"
            | "datetime"
            | "randomInt"
            | "processEnv"
            | "dotenv"
    )
}

/// `{{$timestamp}}` or `{{$timestamp -1 d}}`: unix seconds, optionally offset.
fn resolve_timestamp(args: &[&str]) -> Result<String, VarError> {
    let now = Utc::now();
    if args.is_empty() {
        return Ok(now.timestamp().to_string());
    }
    Ok(parse_offset(now, args)?.timestamp().to_string())
}

/// `{{$datetime rfc1123|iso8601 [offset unit]}}`
fn resolve_datetime(args: &[&str]) -> Result<String, VarError> {
    let Some(format) = args.first() else {
        return Err(VarError::InvalidSyntax(
            "datetime requires format argument (rfc1123 or iso8601)".to_string(),
        ));
    };

    let now = Utc::now();
    let datetime = if args.len() > 1 {
        parse_offset(now, &args[1..])?
    } else {
        now
    };

    match *format {
        "rfc1123" => Ok(datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
        "iso8601" => Ok(datetime.to_rfc3339_opts(SecondsFormat::Millis, true)),
        other => Err(VarError::InvalidSyntax(format!(
            "unknown datetime format '{}', use 'rfc1123' or 'iso8601'",
            other
        ))),
    }
}

/// Applies an offset of the form `[sign]number unit`.
///
/// Units: `y` years, `M` months, `w` weeks, `d` days, `h` hours,
/// `m` minutes, `s` seconds, `ms` milliseconds.
fn parse_offset(base: DateTime<Utc>, args: &[&str]) -> Result<DateTime<Utc>, VarError> {
    if args.len() < 2 {
        return Err(VarError::InvalidOffset(
            "offset requires number and unit (e.g. '-1 d' or '+2 h')".to_string(),
        ));
    }

    let number: i64 = args[0]
        .parse()
        .map_err(|_| VarError::InvalidOffset(format!("invalid number: {}", args[0])))?;

    let shifted = match args[1] {
        "y" => shift_months(base, number.saturating_mul(12)),
        "M" => shift_months(base, number),
        "w" => Duration::try_weeks(number).and_then(|d| base.checked_add_signed(d)),
        "d" => Duration::try_days(number).and_then(|d| base.checked_add_signed(d)),
        "h" => Duration::try_hours(number).and_then(|d| base.checked_add_signed(d)),
        "m" => Duration::try_minutes(number).and_then(|d| base.checked_add_signed(d)),
        "s" => Duration::try_seconds(number).and_then(|d| base.checked_add_signed(d)),
        "ms" => Duration::try_milliseconds(number).and_then(|d| base.checked_add_signed(d)),
        unit => {
            return Err(VarError::InvalidOffset(format!(
                "invalid unit '{}', use y, M, w, d, h, m, s or ms",
                unit
            )))
        }
    };

    shifted.ok_or_else(|| VarError::InvalidOffset(format!("offset out of range: {}", number)))
}

fn shift_months(base: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        base.checked_add_months(Months::new(magnitude))
    } else {
        base.checked_sub_months(Months::new(magnitude))
    }
}

/// `{{$randomInt}}` (0..1000) or `{{$randomInt min max}}` (max exclusive).
fn resolve_random_int(args: &[&str]) -> Result<String, VarError> {
    let (min, max) = match args {
        [] => (0, DEFAULT_RANDOM_INT_MAX),
        [min, max, ..] => {
            let min: i64 = min
                .parse()
                .map_err(|_| VarError::InvalidSyntax(format!("invalid min value: {}", min)))?;
            let max: i64 = max
                .parse()
                .map_err(|_| VarError::InvalidSyntax(format!("invalid max value: {}", max)))?;
            (min, max)
        }
        [_] => {
            return Err(VarError::InvalidSyntax(
                "randomInt takes no arguments or both min and max".to_string(),
            ))
        }
    };

    if min >= max {
        return Err(VarError::InvalidSyntax(format!(
            "min ({}) must be less than max ({})",
            min, max
        )));
    }

    Ok(rand::thread_rng().gen_range(min..max).to_string())
}

/// `{{$processEnv NAME}}` errors when unset; `{{$processEnv %NAME}}` yields "".
fn resolve_process_env(args: &[&str]) -> Result<String, VarError> {
    let Some(var_name) = args.first() else {
        return Err(VarError::InvalidSyntax(
            "processEnv requires variable name".to_string(),
        ));
    };

    let (is_optional, clean_name) = match var_name.strip_prefix('%') {
        Some(rest) => (true, rest),
        None => (false, *var_name),
    };

    match env::var(clean_name) {
        Ok(value) => Ok(value),
        Err(_) if is_optional => Ok(String::new()),
        Err(_) => Err(VarError::EnvVarNotFound(clean_name.to_string())),
    }
}

/// `{{$dotenv NAME}}` reads from the nearest `.env` file.
///
/// The file is parsed once and cached until [`clear_dotenv_cache`] is called.
pub fn resolve_dotenv(args: &[&str]) -> Result<String, VarError> {
    let Some(var_name) = args.first() else {
        return Err(VarError::InvalidSyntax(
            "dotenv requires variable name".to_string(),
        ));
    };

    let mut cache = DOTENV_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if cache.is_none() {
        *cache = Some(load_dotenv_file()?);
    }

    cache
        .as_ref()
        .and_then(|vars| vars.get(*var_name).cloned())
        .ok_or_else(|| VarError::EnvVarNotFound(var_name.to_string()))
}

/// Clears the .env cache.
pub fn clear_dotenv_cache() {
    let mut cache = DOTENV_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    *cache = None;
}

fn load_dotenv_file() -> Result<HashMap<String, String>, VarError> {
    let env_path = find_dotenv_file()?;
    let content = fs::read_to_string(&env_path)
        .map_err(|e| VarError::Dotenv(format!("failed to read {}: {}", env_path.display(), e)))?;
    Ok(parse_dotenv(&content))
}

/// Parses `KEY=value` lines; blank lines and `#` comments are skipped and
/// surrounding single or double quotes are removed from values.
pub(crate) fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!("ignoring invalid .env line {}: {}", line_num + 1, line);
            continue;
        };

        let value = value.trim();
        let value = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            &value[1..value.len() - 1]
        } else {
            value
        };

        vars.insert(key.trim().to_string(), value.to_string());
    }

    vars
}

fn find_dotenv_file() -> Result<PathBuf, VarError> {
    let current_dir = env::current_dir()
        .map_err(|e| VarError::Dotenv(format!("failed to get current directory: {}", e)))?;

    current_dir
        .ancestors()
        .take(4)
        .map(|dir| dir.join(".env"))
        .find(|path| path.is_file())
        .ok_or_else(|| VarError::Dotenv(".env file not found".to_string()))
}
