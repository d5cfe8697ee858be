use crate::ast_analyzer::{opaque_construct, AstAnalyzer};
use crate::batcher::construct_drafts;
use crate::component::ComponentChunker;
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::knowledge::KnowledgeSplitter;
use crate::language::{is_component_path, Dialect};
use crate::lines::LineIndex;
use crate::types::{
    estimate_tokens, ChunkDraft, ChunkWarning, FileChunks, Granularity, WarningKind,
};
use std::path::Path;

/// Main chunker interface: one entry point per file family
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker; budgets are validated here, before any file is read
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    /// Chunk a file, choosing the stage from its extension
    pub fn chunk_str(&self, file_path: &str, content: &str) -> Result<FileChunks> {
        if is_component_path(file_path) {
            return self.chunk_component(file_path, content);
        }
        if is_knowledge_path(file_path) {
            return Ok(self.chunk_knowledge(file_path, content));
        }
        let dialect = Dialect::from_path(file_path)
            .ok_or_else(|| ChunkerError::unsupported_language(file_path))?;
        self.chunk_module(file_path, content, dialect)
    }

    /// TypeScript/JavaScript module: constructs, then batches
    pub fn chunk_module(&self, file_path: &str, content: &str, dialect: Dialect) -> Result<FileChunks> {
        if content.trim().is_empty() {
            return Ok(FileChunks::default());
        }

        let mut analyzer = AstAnalyzer::new(&self.config, dialect)?;
        let constructs = match analyzer.extract(content) {
            Ok(constructs) => constructs,
            Err(e) if e.is_syntax() => {
                log::warn!("{file_path}: {e}; keeping the file as one chunk");
                let opaque = opaque_construct(content, 0);
                let draft = self
                    .whole_file_draft(content, self.config.construct_max_tokens)
                    .with_meta("kind", opaque.kind.as_str())
                    .with_meta("name", opaque.name)
                    .with_meta("dialect", dialect.as_str());
                return Ok(FileChunks::new(
                    vec![draft],
                    vec![ChunkWarning::new(file_path, WarningKind::Unparseable, e.to_string())],
                ));
            }
            Err(e) => return Err(e),
        };

        if constructs.is_empty() {
            log::debug!("{file_path}: no constructs, emitting whole file");
            let draft = self
                .whole_file_draft(content, self.config.construct_max_tokens)
                .with_meta("dialect", dialect.as_str());
            return Ok(FileChunks::new(vec![draft], Vec::new()));
        }

        let mut warnings = Vec::new();
        let drafts = construct_drafts(
            constructs,
            self.config.construct_max_tokens,
            file_path,
            &mut warnings,
        )
        .into_iter()
        .map(|draft| draft.with_meta("dialect", dialect.as_str()))
        .collect();

        Ok(FileChunks::new(drafts, warnings))
    }

    /// Svelte component: whole, or staged into scripts, style and template
    pub fn chunk_component(&self, file_path: &str, content: &str) -> Result<FileChunks> {
        if content.trim().is_empty() {
            return Ok(FileChunks::default());
        }
        ComponentChunker::new(&self.config).chunk(file_path, content)
    }

    /// Markdown knowledge document
    pub fn chunk_knowledge(&self, file_path: &str, content: &str) -> FileChunks {
        KnowledgeSplitter::new(self.config.knowledge_max_tokens).split(file_path, content)
    }

    /// One whole-file chunk, used when a stage fails for a file
    pub fn whole_file(&self, file_path: &str, content: &str, reason: &str) -> FileChunks {
        log::warn!("{file_path}: {reason}; keeping the file as one chunk");
        let draft = self
            .whole_file_draft(content, self.config.component_max_tokens)
            .with_meta("fallbackReason", reason);
        FileChunks::new(
            vec![draft],
            vec![ChunkWarning::new(file_path, WarningKind::Fallback, reason)],
        )
    }

    fn whole_file_draft(&self, content: &str, budget: usize) -> ChunkDraft {
        let lines = LineIndex::new(content);
        ChunkDraft::new(Granularity::File, 1, lines.line_count().max(1), content)
            .oversized(estimate_tokens(content) > budget)
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(drafts: &[ChunkDraft]) -> ChunkingStats {
        let tokens: Vec<usize> = drafts.iter().map(ChunkDraft::estimated_tokens).collect();
        let total_tokens: usize = tokens.iter().sum();
        ChunkingStats {
            total_chunks: drafts.len(),
            total_lines: drafts
                .iter()
                .map(|d| d.end_line.saturating_sub(d.start_line) + 1)
                .sum(),
            total_tokens,
            avg_tokens_per_chunk: if drafts.is_empty() {
                0
            } else {
                total_tokens / drafts.len()
            },
            min_tokens: tokens.iter().copied().min().unwrap_or(0),
            max_tokens: tokens.iter().copied().max().unwrap_or(0),
            oversized: drafts.iter().filter(|d| d.oversized).count(),
        }
    }
}

/// Markdown and MDX documents
pub fn is_knowledge_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "md" | "markdown" | "mdx"))
}

/// Statistics about chunking results
#[derive(Debug, Clone)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub oversized: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Lines: {} | Tokens: {} | Avg: {} | Range: {}-{} | Oversized: {}",
            self.total_chunks,
            self.total_lines,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.oversized
        )
    }
}
