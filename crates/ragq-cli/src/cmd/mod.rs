//! Subcommand handlers. Each exposes `XArgs` and `run_x`.

pub mod chunks;
pub mod completions;
pub mod config;
pub mod context;
pub mod health;

use std::path::Path;
use std::time::Duration;

use ragq_core::config::{Settings, resolve_settings};
use ragq_core::model::WhereFilter;
use ragq_core::{Deadline, RetrievalError};

use crate::output::{CliError, OutputMode, render_error};

/// Resolve settings, rendering a structured error on failure.
pub fn load_settings(
    output: OutputMode,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<Settings> {
    match resolve_settings(project_root, config_path) {
        Ok(settings) => Ok(settings),
        Err(err) => {
            render_error(output, &CliError::settings(&err))?;
            Err(err)
        }
    }
}

/// Render `err` and hand it back for the process exit status.
pub fn report<T>(output: OutputMode, err: RetrievalError) -> anyhow::Result<T> {
    render_error(output, &CliError::from(&err))?;
    Err(err.into())
}

/// Parse repeated `--where field=value` flags.
pub fn parse_filter(output: OutputMode, pairs: &[String]) -> anyhow::Result<Option<WhereFilter>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    match WhereFilter::from_pairs(pairs.iter().map(String::as_str)) {
        Ok(filter) => Ok(Some(filter)),
        Err(err) => report(output, err),
    }
}

/// Deadline from `--timeout-secs`; unbounded when absent.
pub fn deadline_from(timeout_secs: Option<u64>) -> Deadline {
    timeout_secs.map_or_else(Deadline::none, |secs| {
        Deadline::after(Duration::from_secs(secs))
    })
}
