//! # Review Indexer
//!
//! Project-level chunking runs: scan, route, chunk, deliver.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> FileScanner (.gitignore aware, extension list, noise dirs)
//!     │      └─> candidate files, sorted
//!     │
//!     ├──> Dispatcher (PatternRegistry, first match claims the file)
//!     │      └─> Route: parser + type label + rendered metadata
//!     │
//!     ├──> FileParser (module / component / knowledge) in task groups
//!     │      └─> Chunk[] per file, ids assigned
//!     │
//!     └──> ChunkSink (batches of `batch_size`, optional pause)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use review_indexer::{ChunkingEngine, EngineConfig, MemorySink, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ChunkingEngine::new(EngineConfig::default())?;
//!     let mut sink = MemorySink::new();
//!     let stats = engine
//!         .run("/path/to/project", &mut sink, RunOptions::default())
//!         .await?;
//!
//!     println!("{} chunks from {} files", stats.chunks, stats.files_chunked);
//!     Ok(())
//! }
//! ```

mod builtin;
mod config;
mod engine;
mod error;
mod parsers;
mod registry;
mod scanner;
mod sink;
mod stats;

pub use builtin::{builtin_names, builtin_pattern_sets};
pub use config::{EngineConfig, RunConfig};
pub use engine::{normalize_path, ChunkingEngine, EngineContext, RunOptions};
pub use error::{IndexerError, Result};
pub use parsers::{parser_for, ComponentParser, FileParser, KnowledgeParser, ModuleParser, SourceFile};
pub use registry::{
    render_metadata, sveltekit_route, Dispatcher, ParserKind, PatternConfig, PatternRegistry,
    PatternSet, RegistryEntry, Route,
};
pub use scanner::{FileScanner, ScanOptions};
pub use sink::{ChunkSink, JsonLinesSink, MemorySink};
pub use stats::{RunStats, MAX_RECORDED_WARNINGS};
