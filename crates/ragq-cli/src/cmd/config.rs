//! `ragq config`: effective settings with secrets redacted.

use std::path::Path;

use clap::Args;

use super::load_settings;
use crate::output::{OutputMode, render_mode};

/// Arguments for `ragq config`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {}

/// Execute `ragq config`.
pub fn run_config(
    _args: &ConfigArgs,
    output: OutputMode,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let shown = load_settings(output, project_root, config_path)?.redacted();
    let rendered = toml::to_string_pretty(&shown)?;

    render_mode(
        output,
        &shown,
        |_, w| write!(w, "{rendered}"),
        |_, w| write!(w, "{rendered}"),
    )
}
