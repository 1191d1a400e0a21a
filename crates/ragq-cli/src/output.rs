//! Shared output layer for pretty/text/JSON parity across CLI commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `RAGQ_FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use ragq_core::{ErrorCode, RetrievalError};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, visual framing).
    Pretty,
    /// Tab-separated plain text for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from CLI flags, environment, and TTY defaults.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let env_val = std::env::var("RAGQ_FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref(), is_tty)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Failure report printed on stderr.
///
/// Text modes print `error[CODE]: message`, then one `caused by:` line per
/// source in the chain, then the hint. JSON wraps the struct as `{"error": ..}`.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// `E####` from the [`ErrorCode`] table.
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// The failure came from the embedding service or vector store.
    pub upstream: bool,
}

impl CliError {
    /// Settings could not be loaded or parsed.
    pub fn settings(err: &anyhow::Error) -> Self {
        let code = ErrorCode::ConfigParseError;
        let mut causes = Vec::new();
        for cause in err.chain().skip(1) {
            push_cause(&mut causes, &err.to_string(), cause.to_string());
        }
        Self {
            code: code.code(),
            message: err.to_string(),
            causes,
            hint: code.hint().map(str::to_string),
            upstream: false,
        }
    }
}

impl From<&RetrievalError> for CliError {
    fn from(err: &RetrievalError) -> Self {
        let message = err.to_string();
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            push_cause(&mut causes, &message, cause.to_string());
            source = cause.source();
        }
        Self {
            code: err.error_code().code(),
            message,
            causes,
            hint: Some(err.suggestion()),
            upstream: err.is_upstream(),
        }
    }
}

// thiserror messages often embed their source already; skip repeats.
fn push_cause(causes: &mut Vec<String>, message: &str, cause: String) {
    if !message.contains(&cause) && !causes.contains(&cause) {
        causes.push(cause);
    }
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        serde_json::to_writer_pretty(&mut *out, &serde_json::json!({ "error": error }))?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "error[{}]: {}", error.code, error.message)?;
    for cause in &error.causes {
        writeln!(out, "  caused by: {cause}")?;
    }
    if let Some(hint) = &error.hint {
        writeln!(out, "  hint: {hint}")?;
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)
}
