use anyhow::Context;
use async_trait::async_trait;
use review_code_chunker::ChunkRecord;
use std::io::Write;

/// Storage collaborator receiving chunk records in bounded batches.
///
/// An error aborts the run; records already accepted stay accepted.
#[async_trait]
pub trait ChunkSink: Send {
    async fn upsert(&mut self, batch: Vec<ChunkRecord>) -> anyhow::Result<()>;
}

/// Keeps every batch in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<ChunkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.batches.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChunkSink for MemorySink {
    async fn upsert(&mut self, batch: Vec<ChunkRecord>) -> anyhow::Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}

/// Writes one JSON object per record and line.
///
/// Each batch is serialized up front and handed to the blocking pool as a
/// single write and flush.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    writer: Option<W>,
    written: usize,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// `None` once a write task panicked and took the writer with it
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send + 'static> ChunkSink for JsonLinesSink<W> {
    async fn upsert(&mut self, batch: Vec<ChunkRecord>) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        for record in &batch {
            serde_json::to_writer(&mut buf, record)
                .with_context(|| format!("Failed to serialize chunk {}", record.id))?;
            buf.push(b'\n');
        }

        let mut writer = self
            .writer
            .take()
            .context("Chunk output is unavailable after an earlier failure")?;
        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&buf).and_then(|()| writer.flush());
            (writer, result)
        })
        .await
        .context("Chunk output task failed")?;
        self.writer = Some(writer);

        result.context("Failed to write chunk output")?;
        self.written += batch.len();
        Ok(())
    }
}
