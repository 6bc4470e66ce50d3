//! Checker configuration
//!
//! Options can be built in code, deserialized with serde, or parsed from a
//! directive file in the style of TLC `.cfg` files:
//!
//! ```text
//! \* comments run to end of line
//! THREADS 4
//! MAX_ERRORS 10
//! SYMMETRY_REDUCTION TRUE
//! DEADLOCK_DETECTION FALSE
//! OVERFLOW_CHECKS ON
//! COUNTEREXAMPLE_TRACE full
//! ```
//!
//! A directive keyword may also stand alone on its line with the value on the
//! following line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How counterexample paths are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    /// Print only the offending state
    Off,
    /// Print the first state in full, then only changed fields
    #[default]
    Diff,
    /// Print every field of every state on the path
    Full,
}

impl FromStr for TraceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(TraceMode::Off),
            "diff" => Ok(TraceMode::Diff),
            "full" => Ok(TraceMode::Full),
            other => Err(format!(
                "unknown trace mode {:?} (expected off, diff or full)",
                other
            )),
        }
    }
}

impl fmt::Display for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceMode::Off => "off",
            TraceMode::Diff => "diff",
            TraceMode::Full => "full",
        })
    }
}

/// Options for one checking run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Canonicalise states before deduplication
    pub symmetry_reduction: bool,
    /// Report states with no enabled rule
    pub deadlock_detection: bool,
    /// Fault on 64-bit overflow instead of wrapping
    pub overflow_checks: bool,
    /// Stop after this many reported faults
    pub max_errors: usize,
    /// Worker threads; 0 means one per available CPU
    pub threads: usize,
    pub counterexample_trace: TraceMode,
    /// Frontier size at which secondary workers are started
    pub warmup_threshold: usize,
    /// Print a progress line each time this many states have been discovered
    pub progress_interval: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            symmetry_reduction: false,
            deadlock_detection: true,
            overflow_checks: true,
            max_errors: 1,
            threads: 1,
            counterexample_trace: TraceMode::Diff,
            warmup_threshold: 20,
            progress_interval: 10_000,
        }
    }
}

/// Configuration error, with the 1-based line it was found on (0 when the
/// error is not tied to a line)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl ConfigError {
    fn at(line: usize, message: impl Into<String>) -> Self {
        ConfigError {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

/// Directive keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    SymmetryReduction,
    DeadlockDetection,
    OverflowChecks,
    MaxErrors,
    Threads,
    CounterexampleTrace,
    WarmupThreshold,
    ProgressInterval,
}

impl Directive {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "SYMMETRY_REDUCTION" => Directive::SymmetryReduction,
            "DEADLOCK_DETECTION" | "CHECK_DEADLOCK" => Directive::DeadlockDetection,
            "OVERFLOW_CHECKS" => Directive::OverflowChecks,
            "MAX_ERRORS" => Directive::MaxErrors,
            "THREADS" | "WORKERS" => Directive::Threads,
            "COUNTEREXAMPLE_TRACE" => Directive::CounterexampleTrace,
            "WARMUP_THRESHOLD" => Directive::WarmupThreshold,
            "PROGRESS_INTERVAL" => Directive::ProgressInterval,
            _ => return None,
        })
    }

    fn keyword(self) -> &'static str {
        match self {
            Directive::SymmetryReduction => "SYMMETRY_REDUCTION",
            Directive::DeadlockDetection => "DEADLOCK_DETECTION",
            Directive::OverflowChecks => "OVERFLOW_CHECKS",
            Directive::MaxErrors => "MAX_ERRORS",
            Directive::Threads => "THREADS",
            Directive::CounterexampleTrace => "COUNTEREXAMPLE_TRACE",
            Directive::WarmupThreshold => "WARMUP_THRESHOLD",
            Directive::ProgressInterval => "PROGRESS_INTERVAL",
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_uppercase().as_str() {
        "TRUE" | "ON" | "YES" => Some(true),
        "FALSE" | "OFF" | "NO" => Some(false),
        _ => None,
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse directive text, starting from the defaults.
    ///
    /// All errors are collected rather than stopping at the first one.
    pub fn parse(input: &str) -> Result<CheckerConfig, Vec<ConfigError>> {
        let mut config = CheckerConfig::default();
        let mut errors = Vec::new();
        // Directive waiting for its value on a later line
        let mut pending: Option<(Directive, usize)> = None;

        for (idx, raw_line) in input.lines().enumerate() {
            let line_num = idx + 1;

            let line = match raw_line.find("\\*") {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let mut words = line.split_whitespace();
            let first = words.next().unwrap_or_default();

            let (directive, value, value_line) = match Directive::from_keyword(first) {
                Some(d) => {
                    if let Some((p, l)) = pending.take() {
                        errors.push(ConfigError::at(
                            l,
                            format!("{} requires a value", p.keyword()),
                        ));
                    }
                    match words.next() {
                        Some(v) => (d, v, line_num),
                        None => {
                            pending = Some((d, line_num));
                            continue;
                        }
                    }
                }
                None => match pending.take() {
                    Some((d, _)) => (d, first, line_num),
                    None => {
                        errors.push(ConfigError::at(
                            line_num,
                            format!("unknown directive {:?}", first),
                        ));
                        continue;
                    }
                },
            };

            if let Some(extra) = words.next() {
                errors.push(ConfigError::at(
                    value_line,
                    format!("unexpected {:?} after {} value", extra, directive.keyword()),
                ));
                continue;
            }

            if let Err(message) = config.apply(directive, value) {
                errors.push(ConfigError::at(value_line, message));
            }
        }

        if let Some((p, l)) = pending {
            errors.push(ConfigError::at(l, format!("{} requires a value", p.keyword())));
        }

        if let Err(e) = config.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    fn apply(&mut self, directive: Directive, value: &str) -> Result<(), String> {
        let flag = || {
            parse_bool(value).ok_or_else(|| {
                format!(
                    "{} expects TRUE or FALSE, found {:?}",
                    directive.keyword(),
                    value
                )
            })
        };
        let count = || {
            value.parse::<usize>().map_err(|_| {
                format!(
                    "{} expects a non-negative integer, found {:?}",
                    directive.keyword(),
                    value
                )
            })
        };
        match directive {
            Directive::SymmetryReduction => self.symmetry_reduction = flag()?,
            Directive::DeadlockDetection => self.deadlock_detection = flag()?,
            Directive::OverflowChecks => self.overflow_checks = flag()?,
            Directive::MaxErrors => self.max_errors = count()?,
            Directive::Threads => self.threads = count()?,
            Directive::CounterexampleTrace => self.counterexample_trace = value.parse()?,
            Directive::WarmupThreshold => self.warmup_threshold = count()?,
            Directive::ProgressInterval => self.progress_interval = count()?,
        }
        Ok(())
    }

    /// Reject option combinations no run can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_errors == 0 {
            return Err(ConfigError::at(0, "max_errors must be at least 1"));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::at(0, "progress_interval must be at least 1"));
        }
        Ok(())
    }

    /// Number of worker threads the run will use.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }
}
