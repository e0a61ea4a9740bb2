//! `toolindex` — declare an index from the command line and query it.
//!
//! Every subcommand takes the same `sources` list: local folder paths or
//! `owner/name[:rev]` remote ids, the same syntax [`toolindex_core::IndexBuilder::with_source`]
//! accepts. There is no native-tool registration from the CLI — that's a
//! library-only affordance (see `#[toolindex_macros::tool]`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use toolindex_core::{Dialect, IndexBuilder, IndexConfig};

#[derive(Parser)]
#[command(name = "toolindex")]
#[command(about = "Resolve, introspect, and call tools from a declared index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Where cloned/installed source environments are cached.
    #[arg(long, global = true, env = "TOOLINDEX_CACHE_ROOT")]
    cache_root: Option<std::path::PathBuf>,

    /// Re-clone and reinstall every remote source instead of reusing the cache.
    #[arg(long, global = true)]
    reset_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tool id available in the declared index.
    List {
        /// Local folder paths or `owner/name[:rev]` remote ids.
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Call one tool by exact name or unique dotted suffix.
    Call {
        #[arg(required = true)]
        sources: Vec<String>,
        /// Tool name or unique dotted suffix.
        #[arg(long)]
        tool: String,
        /// JSON-encoded arguments object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Render a tool's schema in one dialect.
    Schema {
        #[arg(required = true)]
        sources: Vec<String>,
        #[arg(long)]
        tool: String,
        #[arg(long, value_enum, default_value_t = DialectArg::Anthropic)]
        dialect: DialectArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    OpenaiChatCompletions,
    OpenaiResponses,
    Anthropic,
    GoogleGemini,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::OpenaiChatCompletions => Dialect::OpenAiChatCompletions,
            DialectArg::OpenaiResponses => Dialect::OpenAiResponses,
            DialectArg::Anthropic => Dialect::Anthropic,
            DialectArg::GoogleGemini => Dialect::GoogleGemini,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    let mut config = IndexConfig::default().with_reset_cache(cli.reset_cache);
    if let Some(root) = cli.cache_root {
        config = config.with_cache_root(root);
    }

    match cli.command {
        Commands::List { sources } => list(config, sources),
        Commands::Call { sources, tool, args } => call(config, sources, &tool, &args).await,
        Commands::Schema { sources, tool, dialect } => schema(config, sources, &tool, dialect),
    }
}

fn build_index(config: IndexConfig, sources: Vec<String>) -> Result<toolindex_core::Index> {
    let mut builder = IndexBuilder::new(config);
    for source in sources {
        builder = builder.with_source(source);
    }
    builder.build().context("failed to build tool index")
}

fn list(config: IndexConfig, sources: Vec<String>) -> Result<()> {
    let index = build_index(config, sources)?;
    for name in index.names() {
        println!("{name}");
    }
    Ok(())
}

async fn call(config: IndexConfig, sources: Vec<String>, tool: &str, args: &str) -> Result<()> {
    let index = build_index(config, sources)?;
    let args: serde_json::Value =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    let result = index
        .execute(tool, args)
        .await
        .with_context(|| format!("call to \"{tool}\" failed"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn schema(config: IndexConfig, sources: Vec<String>, tool: &str, dialect: DialectArg) -> Result<()> {
    let index = build_index(config, sources)?;
    let rendered = index
        .schema(tool, dialect.into())
        .with_context(|| format!("could not render schema for \"{tool}\""))?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
