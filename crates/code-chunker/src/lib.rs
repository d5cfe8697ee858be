//! # Review Code Chunker
//!
//! Framework-aware chunking of TypeScript/JavaScript modules, Svelte
//! components and markdown knowledge documents for embedding and review.
//!
//! ## Philosophy
//!
//! Chunks follow syntactic boundaries and stay within a token budget:
//! - Module constructs (functions, classes, interfaces, exports) come from the syntax tree
//! - Adjacent small constructs are batched; an oversized construct is never merged
//! - Component markup is split recursively, children first, until it fits
//! - A unit that cannot be parsed degrades to one whole-file chunk with a warning
//!
//! ## Architecture
//!
//! ```text
//! Source File
//!     │
//!     ├──> module (.ts/.js) ──> Tree-sitter → constructs ──> Batcher
//!     │
//!     ├──> component (.svelte)
//!     │    ├─> fits component budget → one chunk
//!     │    └─> scripts → constructs → Batcher
//!     │        style   → one chunk
//!     │        markup  → TemplateSplitter (recursive, size-bounded)
//!     │
//!     └──> knowledge (.md) ──> # / ## sections ──> paragraph batches
//!
//! every stage ──> ChunkDraft[] ──> ChunkOrigin::assemble ──> Chunk[]
//! ```
//!
//! Sizes are estimated as characters / 4 ([`estimate_tokens`]) everywhere.
//!
//! ## Example
//!
//! ```rust
//! use review_code_chunker::{Chunker, ChunkerConfig, Granularity};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//! let chunks = chunker
//!     .chunk_str("src/lib/math.ts", "export const add = (a: number, b: number) => a + b;\n")
//!     .unwrap();
//!
//! assert_eq!(chunks.drafts.len(), 1);
//! assert_eq!(chunks.drafts[0].granularity, Granularity::Function);
//! ```

mod ast_analyzer;
mod batcher;
mod chunker;
mod component;
mod config;
mod error;
pub mod heuristics;
mod knowledge;
mod language;
mod lines;
pub mod template;
mod types;

pub use ast_analyzer::{opaque_construct, AstAnalyzer};
pub use batcher::{construct_drafts, Batch, BatchItem, Batcher};
pub use chunker::{is_knowledge_path, Chunker, ChunkingStats};
pub use component::{component_name, ComponentChunker};
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use knowledge::KnowledgeSplitter;
pub use language::{is_component_path, Dialect};
pub use lines::LineIndex;
pub use types::{
    chunk_id, estimate_tokens, estimate_tokens_from_chars, Chunk, ChunkDraft, ChunkOrigin,
    ChunkRecord, ChunkWarning, Construct, ConstructKind, FileChunks, Granularity, Modifiers,
    WarningKind,
};
