use review_code_chunker::{Chunk, ChunkWarning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Warnings kept verbatim; later ones are only counted by kind
pub const MAX_RECORDED_WARNINGS: usize = 1000;

/// Statistics about one chunking run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Files the scanner returned
    pub files_scanned: usize,

    /// Files a pattern claimed
    pub files_claimed: usize,

    /// Claimed files that were read and chunked
    pub files_chunked: usize,

    /// Claimed files skipped after an I/O failure
    pub files_failed: usize,

    pub chunks: usize,

    pub oversized_chunks: usize,

    /// Sink calls made
    pub batches: usize,

    pub by_granularity: BTreeMap<String, usize>,

    pub by_type: BTreeMap<String, usize>,

    /// First `MAX_RECORDED_WARNINGS` warnings in arrival order
    pub warnings: Vec<ChunkWarning>,

    /// Every warning, recorded or not, counted by kind
    pub warnings_by_kind: BTreeMap<String, usize>,

    /// Stopped early by the cancel flag or the deadline
    pub cancelled: bool,

    pub time_ms: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one file's chunks
    pub fn add_file(&mut self, chunks: &[Chunk]) {
        self.files_chunked += 1;
        self.chunks += chunks.len();
        for chunk in chunks {
            if chunk.oversized {
                self.oversized_chunks += 1;
            }
            *self
                .by_granularity
                .entry(chunk.granularity.as_str().to_string())
                .or_insert(0) += 1;
            *self.by_type.entry(chunk.semantic_type.clone()).or_insert(0) += 1;
        }
    }

    pub fn add_failure(&mut self, warning: ChunkWarning) {
        self.files_failed += 1;
        self.add_warning(warning);
    }

    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = ChunkWarning>) {
        for warning in warnings {
            self.add_warning(warning);
        }
    }

    pub fn add_warning(&mut self, warning: ChunkWarning) {
        *self
            .warnings_by_kind
            .entry(warning.kind.as_str().to_string())
            .or_insert(0) += 1;
        if self.warnings.len() < MAX_RECORDED_WARNINGS {
            self.warnings.push(warning);
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings_by_kind.values().sum()
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Files: {} scanned, {} claimed, {} chunked, {} failed | Chunks: {} ({} oversized) in {} batches | Warnings: {} | {} ms",
            self.files_scanned,
            self.files_claimed,
            self.files_chunked,
            self.files_failed,
            self.chunks,
            self.oversized_chunks,
            self.batches,
            self.warning_count(),
            self.time_ms
        )?;
        if self.cancelled {
            write!(f, " | cancelled")?;
        }
        Ok(())
    }
}
