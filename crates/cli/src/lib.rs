use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use review_code_chunker::ChunkerConfig;
use review_indexer::{ChunkingEngine, EngineConfig, JsonLinesSink, RunOptions};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod report;

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "review-chunk")]
#[command(about = "Framework-aware source chunking for embedding and review", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a project and emit one JSON record per line
    Chunk(ChunkArgs),

    /// List registered patterns in dispatch order
    Patterns(ConfigArgs),

    /// Show which pattern claims a path
    Route(RouteArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Budget preset, applied over the config file's [chunker] table
    #[arg(long, value_enum)]
    preset: Option<Preset>,
}

#[derive(Args)]
struct ChunkArgs {
    /// Project root
    root: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Records per batch handed to the output
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Write records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop starting new files after this many seconds
    #[arg(long)]
    max_seconds: Option<u64>,
}

#[derive(Args)]
struct RouteArgs {
    /// Root-relative path, `/`-separated
    path: String,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Embeddings,
    Review,
}

impl Preset {
    fn chunker_config(self) -> ChunkerConfig {
        match self {
            Self::Default => ChunkerConfig::default(),
            Self::Embeddings => ChunkerConfig::for_embeddings(),
            Self::Review => ChunkerConfig::for_review(),
        }
    }
}

impl ConfigArgs {
    fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(preset) = self.preset {
            config.chunker = preset.chunker_config();
        }
        Ok(config)
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Chunk(args) => run_chunk(args).await,
        Commands::Patterns(args) => {
            let engine = ChunkingEngine::new(args.load()?)?;
            print_stdout(&report::render_patterns(engine.registry()))
        }
        Commands::Route(args) => {
            let engine = ChunkingEngine::new(args.config.load()?)?;
            let path = args.path.replace('\\', "/");
            let route = engine.registry().route(&path);
            let body = report::render_route(&path, route.as_ref());
            print_stdout(&serde_json::to_string_pretty(&body)?)
        }
    }
}

async fn run_chunk(args: ChunkArgs) -> Result<()> {
    let mut config = args.config.load()?;
    if let Some(batch_size) = args.batch_size {
        config.run.batch_size = batch_size;
    }
    if let Some(pause_ms) = args.pause_ms {
        config.run.batch_pause_ms = pause_ms;
    }
    let engine = ChunkingEngine::new(config).context("Invalid engine configuration")?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted; finishing the current file group");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }
    let mut options = RunOptions::default().with_cancel(cancel);
    if let Some(seconds) = args.max_seconds {
        options = options.with_max_duration(Duration::from_secs(seconds));
    }

    let writer: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };
    let mut sink = JsonLinesSink::new(writer);

    let stats = engine
        .run(&args.root, &mut sink, options)
        .await
        .with_context(|| format!("Chunking {} failed", args.root.display()))?;

    eprintln!("{}", report::render_summary(&stats));
    Ok(())
}
