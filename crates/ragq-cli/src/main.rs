#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ragq: hybrid dense + BM25 retrieval for question answering",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ./ragq.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Retrieval",
        about = "Show ranked chunks with scores",
        long_about = "Run hybrid retrieval and print ranked chunks with dense, BM25, and fused scores.",
        after_help = "EXAMPLES:\n    # Top chunks for a question\n    ragq chunks \"what is the visa status policy\"\n\n    # Restrict to one tenant, lexical-heavy fusion\n    ragq chunks \"parental leave\" --where tenant_id=acme --alpha 0.3\n\n    # Machine-readable output\n    ragq chunks \"expense reports\" -n 5 --json"
    )]
    Chunks(cmd::chunks::ChunksArgs),

    #[command(
        next_help_heading = "Retrieval",
        about = "Assemble prompt context",
        long_about = "Retrieve documents through the cached retriever and join them into prompt context.",
        after_help = "EXAMPLES:\n    # Prompt context for a question\n    ragq context \"remote work stipend\"\n\n    # With a filter\n    ragq context \"remote work stipend\" --where tenant_id=acme"
    )]
    Context(cmd::context::ContextArgs),

    #[command(
        next_help_heading = "Service",
        about = "Report service status",
        long_about = "Report service identity and whether configuration is complete. Makes no network calls.",
        after_help = "EXAMPLES:\n    ragq health\n    ragq health --json"
    )]
    Health(cmd::health::HealthArgs),

    #[command(
        next_help_heading = "Service",
        about = "Show effective settings",
        long_about = "Show settings after file and environment resolution, with secrets redacted.",
        after_help = "EXAMPLES:\n    ragq config\n    ragq config --config ./staging.toml --json"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Service",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ragq completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RAGQ_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ragq=debug,info"
        } else {
            "ragq=info,warn"
        })
    });

    let format = env::var("RAGQ_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let dotenv_path = dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "loaded .env");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chunks(ref args) => {
            cmd::chunks::run_chunks(args, output, &project_root, config_path)
        }
        Commands::Context(ref args) => {
            cmd::context::run_context(args, output, &project_root, config_path)
        }
        Commands::Health(ref args) => {
            cmd::health::run_health(args, output, &project_root, config_path)
        }
        Commands::Config(ref args) => {
            cmd::config::run_config(args, output, &project_root, config_path)
        }
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["ragq", "health", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Health(_)));
    }

    #[test]
    fn where_flag_repeats() {
        let cli = Cli::parse_from([
            "ragq",
            "chunks",
            "visa",
            "--where",
            "tenant_id=acme",
            "--where",
            "year=2024",
            "-n",
            "3",
        ]);
        let Commands::Chunks(args) = cli.command else {
            panic!("expected chunks");
        };
        assert_eq!(args.filters, vec!["tenant_id=acme", "year=2024"]);
        assert_eq!(args.k, Some(3));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["ragq", "config", "--config", "alt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }
}
