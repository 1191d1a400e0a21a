//! `ragq context`: documents and assembled prompt context.

use std::path::Path;

use clap::Args;
use ragq_core::model::Document;
use ragq_search::RetrievalContext;
use serde::Serialize;

use super::{deadline_from, load_settings, parse_filter, report};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Natural-language question.
    pub query: String,

    /// Equality filter on chunk metadata, `field=value`. Repeatable.
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Abort dense recall after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ContextOutput {
    query: String,
    documents: Vec<Document>,
    context: String,
}

/// Execute `ragq context <query>`.
pub fn run_context(
    args: &ContextArgs,
    output: OutputMode,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let filter = parse_filter(output, &args.filters)?;
    let settings = load_settings(output, project_root, config_path)?;

    let ctx = match RetrievalContext::new(settings) {
        Ok(ctx) => ctx,
        Err(err) => return report(output, err),
    };

    let deadline = deadline_from(args.timeout_secs);
    let documents = match ctx.relevant_documents(&args.query, filter.as_ref(), &deadline) {
        Ok(docs) => docs,
        Err(err) => return report(output, err),
    };
    let context = ctx.format_context(&documents);

    let payload = ContextOutput {
        query: args.query.clone(),
        documents,
        context,
    };

    render_mode(
        output,
        &payload,
        |p, w| writeln!(w, "{}", p.context),
        |p, w| {
            pretty_section(w, &format!("Context for \"{}\"", p.query))?;
            pretty_kv(w, "documents", p.documents.len().to_string())?;
            writeln!(w)?;
            writeln!(w, "{}", p.context)
        },
    )
}
