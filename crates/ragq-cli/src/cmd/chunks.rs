//! `ragq chunks`: ranked chunks with per-signal scores.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ragq_core::model::{RankedChunk, RetrievalRequest};
use ragq_search::RetrievalContext;
use serde::Serialize;

use super::{deadline_from, load_settings, parse_filter, report};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ChunksArgs {
    /// Natural-language question.
    pub query: String,

    /// Number of chunks to return (default: twice `retrieval_k`).
    #[arg(short = 'n', long = "k")]
    pub k: Option<usize>,

    /// Equality filter on chunk metadata, `field=value`. Repeatable; all must match.
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Dense candidates to recall before reranking.
    #[arg(long)]
    pub candidates: Option<usize>,

    /// Dense weight in [0, 1]; lexical weight is `1 - alpha`.
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Abort dense recall after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChunksOutput {
    query: String,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    count: usize,
    chunks: Vec<RankedChunk>,
}

/// Execute `ragq chunks <query>`.
pub fn run_chunks(
    args: &ChunksArgs,
    output: OutputMode,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let filter = parse_filter(output, &args.filters)?;
    let settings = load_settings(output, project_root, config_path)?;
    let k = args.k.unwrap_or_else(|| settings.retrieval.overfetch_k());

    let ctx = match RetrievalContext::new(settings) {
        Ok(ctx) => ctx,
        Err(err) => return report(output, err),
    };

    let mut request = RetrievalRequest::new(args.query.clone(), k).with_filter(filter);
    if let Some(n) = args.candidates {
        request = request.with_dense_candidates(n);
    }
    if let Some(alpha) = args.alpha {
        request = request.with_alpha(alpha);
    }

    let deadline = deadline_from(args.timeout_secs);
    let chunks = match ctx.hybrid().and_then(|h| h.retrieve(&request, &deadline)) {
        Ok(chunks) => chunks,
        Err(err) => return report(output, err),
    };

    let payload = ChunksOutput {
        query: args.query.clone(),
        filter: request.filter.as_ref().map(ToString::to_string),
        count: chunks.len(),
        chunks,
    };

    render_mode(output, &payload, render_chunks_text, render_chunks_pretty)
}

fn render_chunks_text(payload: &ChunksOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "rank\tchunk_id\thybrid\tdense\tbm25\tsource")?;
    for chunk in &payload.chunks {
        writeln!(
            w,
            "{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{}",
            chunk.rank,
            chunk.candidate.chunk_id,
            chunk.scores.hybrid,
            chunk.scores.dense_norm,
            chunk.scores.bm25_norm,
            chunk.source()
        )?;
    }
    Ok(())
}

fn render_chunks_pretty(payload: &ChunksOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Chunks for \"{}\"", payload.query))?;
    if let Some(ref filter) = payload.filter {
        pretty_kv(w, "where", filter)?;
    }
    if payload.chunks.is_empty() {
        writeln!(w, "(no matching chunks)")?;
        return Ok(());
    }

    for chunk in &payload.chunks {
        let id = if chunk.candidate.chunk_id.is_empty() {
            "(no id)"
        } else {
            chunk.candidate.chunk_id.as_str()
        };
        writeln!(w, "#{:<3} {id}  {}", chunk.rank, chunk.source())?;
        writeln!(
            w,
            "     hybrid {:.4}  dense {:.4} (raw {:.4}, distance {:.4})  bm25 {:.4} (raw {:.4})",
            chunk.scores.hybrid,
            chunk.scores.dense_norm,
            chunk.scores.dense_raw,
            chunk.candidate.distance,
            chunk.scores.bm25_norm,
            chunk.scores.bm25_raw
        )?;
        writeln!(w, "     {}", chunk.preview().replace('\n', " "))?;
    }
    pretty_rule(w)?;
    writeln!(w, "{} chunk(s)", payload.count)
}
