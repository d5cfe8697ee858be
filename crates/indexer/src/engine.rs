use crate::config::{EngineConfig, RunConfig};
use crate::error::{IndexerError, Result};
use crate::parsers::SourceFile;
use crate::registry::{Dispatcher, PatternRegistry, Route};
use crate::scanner::FileScanner;
use crate::sink::ChunkSink;
use crate::stats::RunStats;
use review_code_chunker::{Chunk, ChunkRecord, ChunkWarning, Chunker, WarningKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Immutable state shared by every task of a run
pub struct EngineContext {
    pub chunker: Chunker,
    pub registry: PatternRegistry,
    pub run: RunConfig,
}

impl EngineContext {
    /// Chunk one claimed file. A parser error degrades to a whole-file chunk.
    pub fn chunk_file(
        &self,
        route: &Route,
        rel_path: &str,
        content: &str,
    ) -> (Vec<Chunk>, Vec<ChunkWarning>) {
        let source = SourceFile { rel_path, content };
        let file_chunks = match route.parser.parse(&self.chunker, &source) {
            Ok(file_chunks) => file_chunks,
            Err(e) => self.chunker.whole_file(rel_path, content, &e.to_string()),
        };

        let chunks = route.origin(rel_path).assemble(file_chunks.drafts);
        log::debug!(
            "{rel_path}: {} chunks via {} ({})",
            chunks.len(),
            route.set_name,
            route.pattern.label
        );
        (chunks, file_chunks.warnings)
    }
}

/// Stop conditions checked between file groups
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: Option<Arc<AtomicBool>>,
    pub max_duration: Option<Duration>,
}

impl RunOptions {
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[must_use]
    pub const fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }
}

#[derive(Clone)]
struct FileJob {
    path: PathBuf,
    rel_path: String,
    route: Route,
}

struct FileOutput {
    chunks: Vec<Chunk>,
    warnings: Vec<ChunkWarning>,
}

/// Scans a project, routes files through the registry and streams chunk
/// records to a sink
pub struct ChunkingEngine {
    ctx: Arc<EngineContext>,
}

impl ChunkingEngine {
    /// Validate the config and compile the registry; nothing is read yet
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = config.build_registry()?;
        let chunker = Chunker::new(config.chunker)?;
        Ok(Self::from_context(EngineContext {
            chunker,
            registry,
            run: config.run,
        }))
    }

    pub fn from_context(ctx: EngineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.ctx.registry
    }

    /// Chunk every claimed file under `root` and hand the records to `sink`.
    ///
    /// Files are processed in groups of `run.concurrency` tasks; results keep
    /// scan order. Cancellation leaves earlier groups delivered and reports
    /// `cancelled`. Only a sink failure aborts the run.
    pub async fn run(
        &self,
        root: impl AsRef<Path>,
        sink: &mut dyn ChunkSink,
        options: RunOptions,
    ) -> Result<RunStats> {
        let start = Instant::now();
        let deadline = options.max_duration.map(|d| start + d);
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut stats = RunStats::new();
        if self.ctx.registry.is_empty() {
            log::warn!("Pattern registry is empty; no file will be claimed");
        }

        let scan_root = root.to_path_buf();
        let scan_options = self.ctx.run.scan_options();
        let files = tokio::task::spawn_blocking(move || {
            FileScanner::new(scan_root).with_options(scan_options).scan()
        })
        .await
        .map_err(std::io::Error::other)?;
        stats.files_scanned = files.len();

        let mut dispatcher = Dispatcher::new(&self.ctx.registry);
        let jobs: Vec<FileJob> = files
            .into_iter()
            .filter_map(|path| {
                let rel_path = normalize_path(root, &path);
                let route = dispatcher.dispatch(&rel_path)?;
                Some(FileJob {
                    path,
                    rel_path,
                    route,
                })
            })
            .collect();
        stats.files_claimed = jobs.len();
        log::info!(
            "Claimed {} of {} files under {}",
            stats.files_claimed,
            stats.files_scanned,
            root.display()
        );

        let batch_size = self.ctx.run.batch_size.max(1);
        let mut pending: Vec<ChunkRecord> = Vec::new();

        for group in jobs.chunks(self.ctx.run.concurrency.max(1)) {
            if should_stop(&options, deadline) {
                log::warn!(
                    "Run stopped after {} of {} files",
                    stats.files_chunked + stats.files_failed,
                    stats.files_claimed
                );
                stats.cancelled = true;
                break;
            }

            let mut tasks = Vec::with_capacity(group.len());
            for job in group {
                let ctx = Arc::clone(&self.ctx);
                let job = job.clone();
                tasks.push(tokio::spawn(process_file(ctx, job)));
            }

            for (task, job) in tasks.into_iter().zip(group) {
                match task.await {
                    Ok(Ok(output)) => {
                        stats.add_file(&output.chunks);
                        stats.add_warnings(output.warnings);
                        pending.extend(output.chunks.iter().map(Chunk::to_record));
                    }
                    Ok(Err(e)) => {
                        log::warn!("Skipping {}: {e}", job.rel_path);
                        stats.add_failure(ChunkWarning::new(
                            &job.rel_path,
                            WarningKind::Io,
                            e.to_string(),
                        ));
                    }
                    Err(e) => {
                        log::warn!("Task for {} panicked: {e}", job.rel_path);
                        stats.add_failure(ChunkWarning::new(
                            &job.rel_path,
                            WarningKind::Fallback,
                            format!("Task panicked: {e}"),
                        ));
                    }
                }
            }

            while pending.len() >= batch_size {
                let batch: Vec<ChunkRecord> = pending.drain(..batch_size).collect();
                self.flush(sink, batch, &mut stats).await?;
            }
        }

        if !pending.is_empty() {
            self.flush(sink, pending, &mut stats).await?;
        }

        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!("{stats}");
        Ok(stats)
    }

    async fn flush(
        &self,
        sink: &mut dyn ChunkSink,
        batch: Vec<ChunkRecord>,
        stats: &mut RunStats,
    ) -> Result<()> {
        let pause = self.ctx.run.batch_pause_ms;
        if pause > 0 && stats.batches > 0 {
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
        let len = batch.len();
        sink.upsert(batch).await.map_err(IndexerError::Sink)?;
        stats.batches += 1;
        log::debug!("Flushed batch {} ({len} records)", stats.batches);
        Ok(())
    }
}

/// Read on the runtime, chunk on the blocking pool. A panic while chunking is
/// re-raised so the caller sees it as a panicked task.
async fn process_file(ctx: Arc<EngineContext>, job: FileJob) -> std::io::Result<FileOutput> {
    let content = tokio::fs::read_to_string(&job.path).await?;
    let chunked = tokio::task::spawn_blocking(move || {
        ctx.chunk_file(&job.route, &job.rel_path, &content)
    })
    .await;
    match chunked {
        Ok((chunks, warnings)) => Ok(FileOutput { chunks, warnings }),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(std::io::Error::other(e)),
    }
}

fn should_stop(options: &RunOptions, deadline: Option<Instant>) -> bool {
    if options
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
    {
        return true;
    }
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Root-relative path with `/` separators
pub fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}
