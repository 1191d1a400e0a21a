//! `ragq health`: service identity and configuration readiness.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ragq_core::config::Settings;
use serde::Serialize;

use super::load_settings;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `ragq health`.
#[derive(Args, Debug, Default)]
pub struct HealthArgs {}

#[derive(Debug, Serialize)]
struct HealthOutput {
    status: &'static str,
    service: String,
    version: String,
    vector_store_database: Option<String>,
    vector_store_collection: String,
    embedding_model: String,
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

impl HealthOutput {
    fn from_settings(settings: &Settings) -> Self {
        let problem = settings.require_credentials().err().map(|e| e.to_string());
        let version = if settings.service.version.is_empty() {
            env!("CARGO_PKG_VERSION").to_string()
        } else {
            settings.service.version.clone()
        };

        Self {
            status: if problem.is_none() { "ok" } else { "degraded" },
            service: settings.service.name.clone(),
            version,
            vector_store_database: settings.vector_store.database.clone(),
            vector_store_collection: settings.vector_store.collection.clone(),
            embedding_model: settings.embedding.model.clone(),
            configured: problem.is_none(),
            problem,
        }
    }
}

/// Execute `ragq health`. Makes no network calls.
pub fn run_health(
    _args: &HealthArgs,
    output: OutputMode,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let settings = load_settings(output, project_root, config_path)?;
    let payload = HealthOutput::from_settings(&settings);

    render_mode(
        output,
        &payload,
        |h, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                h.status, h.service, h.version, h.vector_store_collection
            )
        },
        render_health_pretty,
    )
}

fn render_health_pretty(h: &HealthOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Service health")?;
    let status = if h.configured { "✓ ok" } else { "⚠ degraded" };
    pretty_kv(w, "status", status)?;
    pretty_kv(w, "service", &h.service)?;
    pretty_kv(w, "version", &h.version)?;
    pretty_kv(
        w,
        "database",
        h.vector_store_database.as_deref().unwrap_or("(unset)"),
    )?;
    pretty_kv(w, "collection", &h.vector_store_collection)?;
    pretty_kv(w, "embedding", &h.embedding_model)?;
    if let Some(ref problem) = h.problem {
        pretty_kv(w, "problem", problem)?;
    }
    Ok(())
}
