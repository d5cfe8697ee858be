use async_trait::async_trait;
use pretty_assertions::assert_eq;
use review_code_chunker::{ChunkRecord, WarningKind};
use review_indexer::{
    ChunkSink, ChunkingEngine, EngineConfig, IndexerError, JsonLinesSink, MemorySink, RunConfig,
    RunOptions,
};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

const PAGE: &str = r#"<script>
  let count = 0;
</script>

<button on:click={() => count++}>{count}</button>
"#;

const SERVER_LOAD: &str = r#"export const load = async () => {
  return { posts: [] };
};
"#;

const UTILS: &str = r#"export function slugify(s: string) {
  return s.toLowerCase();
}
"#;

const README: &str = r#"## Setup

Run the installer.

## Usage

Start the dev server.

## Deploy

Push to main.
"#;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "src/routes/+page.svelte", PAGE.as_bytes());
    write(root, "src/routes/blog/+page.server.ts", SERVER_LOAD.as_bytes());
    write(root, "src/lib/utils.ts", UTILS.as_bytes());
    write(root, "README.md", README.as_bytes());
    write(root, "src/app.d.ts", b"declare global {}\nexport {};\n");
    write(root, "node_modules/pkg/index.js", b"module.exports = 1;\n");
    write(root, "src/lib/bad.ts", &[0xff, 0xfe, 0x00, 0x41]);
    temp
}

fn engine(batch_size: usize) -> ChunkingEngine {
    let config = EngineConfig {
        run: RunConfig {
            batch_size,
            ..Default::default()
        },
        ..Default::default()
    };
    ChunkingEngine::new(config).unwrap()
}

fn file_path(record: &ChunkRecord) -> &str {
    record.metadata["filePath"].as_str().unwrap()
}

#[tokio::test]
async fn chunks_a_project_in_bounded_batches() {
    let temp = project();
    let mut sink = MemorySink::new();
    let stats = engine(2)
        .run(temp.path(), &mut sink, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.files_scanned, 6);
    assert_eq!(stats.files_claimed, 5);
    assert_eq!(stats.files_chunked, 4);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.chunks, 6);
    assert_eq!(stats.batches, 3);
    assert!(!stats.cancelled);
    assert_eq!(stats.by_granularity["section"], 3);
    assert_eq!(stats.by_granularity["function"], 2);
    assert_eq!(stats.by_granularity["component"], 1);

    assert_eq!(stats.warnings.len(), 1);
    assert_eq!(stats.warnings[0].kind, WarningKind::Io);
    assert_eq!(stats.warnings[0].file_path, "src/lib/bad.ts");

    assert_eq!(sink.len(), 6);
    assert!(sink.batches.iter().all(|batch| batch.len() <= 2));

    let paths: Vec<&str> = sink.records().map(file_path).collect();
    assert_eq!(
        paths,
        vec![
            "README.md",
            "README.md",
            "README.md",
            "src/lib/utils.ts",
            "src/routes/+page.svelte",
            "src/routes/blog/+page.server.ts",
        ]
    );

    let ids: HashSet<&str> = sink.records().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 6);
}

#[tokio::test]
async fn records_carry_route_semantics() {
    let temp = project();
    let mut sink = MemorySink::new();
    engine(50)
        .run(temp.path(), &mut sink, RunOptions::default())
        .await
        .unwrap();

    let page = sink
        .records()
        .find(|r| file_path(r) == "src/routes/+page.svelte")
        .unwrap();
    assert_eq!(page.metadata["type"], Value::from("sveltekit-page"));
    assert_eq!(page.metadata["granularity"], Value::from("component"));
    assert_eq!(page.metadata["framework"], Value::from("sveltekit"));
    assert_eq!(page.metadata["route"], Value::from("/"));
    assert_eq!(page.content, PAGE);

    let load = sink
        .records()
        .find(|r| file_path(r) == "src/routes/blog/+page.server.ts")
        .unwrap();
    assert_eq!(load.metadata["type"], Value::from("sveltekit-server-load"));
    assert_eq!(load.metadata["route"], Value::from("/blog"));
    assert_eq!(load.metadata["name"], Value::from("load"));

    let sections: Vec<&ChunkRecord> = sink
        .records()
        .filter(|r| file_path(r) == "README.md")
        .collect();
    assert!(sections[0].content.starts_with("## Setup"));
    assert!(sections[1].content.starts_with("## Usage"));
    assert!(sections[2].content.starts_with("## Deploy"));
    assert_eq!(sections[0].metadata["type"], Value::from("readme"));
}

#[tokio::test]
async fn identical_input_gives_identical_ids() {
    let temp = project();
    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    let engine = engine(50);
    engine
        .run(temp.path(), &mut first, RunOptions::default())
        .await
        .unwrap();
    engine
        .run(temp.path(), &mut second, RunOptions::default())
        .await
        .unwrap();

    let first: Vec<_> = first.records().map(|r| r.id.clone()).collect();
    let second: Vec<_> = second.records().map(|r| r.id.clone()).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_registry_completes_with_zero_chunks() {
    let temp = project();
    let config = EngineConfig {
        use_builtin_patterns: false,
        ..Default::default()
    };
    let mut sink = MemorySink::new();
    let stats = ChunkingEngine::new(config)
        .unwrap()
        .run(temp.path(), &mut sink, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.files_scanned, 6);
    assert_eq!(stats.files_claimed, 0);
    assert_eq!(stats.chunks, 0);
    assert_eq!(stats.batches, 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn cancelled_run_delivers_nothing_new() {
    let temp = project();
    let flag = Arc::new(AtomicBool::new(true));
    let mut sink = MemorySink::new();
    let stats = engine(50)
        .run(
            temp.path(),
            &mut sink,
            RunOptions::default().with_cancel(flag),
        )
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.files_claimed, 5);
    assert_eq!(stats.files_chunked, 0);
    assert!(sink.is_empty());
}

struct FailingSink;

#[async_trait]
impl ChunkSink for FailingSink {
    async fn upsert(&mut self, _batch: Vec<ChunkRecord>) -> anyhow::Result<()> {
        anyhow::bail!("store unavailable")
    }
}

#[tokio::test]
async fn sink_failure_aborts_the_run() {
    let temp = project();
    let err = engine(2)
        .run(temp.path(), &mut FailingSink, RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::Sink(_)));
    assert!(err.to_string().contains("store unavailable"));
}

#[tokio::test]
async fn json_lines_sink_receives_every_record() {
    let temp = project();
    let mut sink = JsonLinesSink::new(Vec::new());
    let stats = engine(4)
        .run(temp.path(), &mut sink, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(sink.written(), stats.chunks);
    let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    for line in output.lines() {
        let record: ChunkRecord = serde_json::from_str(line).unwrap();
        assert!(!record.content.is_empty());
    }
}

#[tokio::test]
async fn missing_root_is_rejected() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("nope");
    let err = engine(2)
        .run(&missing, &mut MemorySink::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::InvalidPath(_)));
}
