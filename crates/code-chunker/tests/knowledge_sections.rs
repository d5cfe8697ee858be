use review_code_chunker::{Chunker, ChunkerConfig, Granularity};
use serde_json::Value;

fn chunker(budget: usize) -> Chunker {
    Chunker::new(ChunkerConfig {
        knowledge_max_tokens: budget,
        ..ChunkerConfig::default()
    })
    .expect("valid config")
}

#[test]
fn three_sections_under_budget_give_three_chunks() {
    let doc = "## Setup\n\nRun `npm install`.\n\n## Usage\n\nRun `npm run dev`.\n\n## Deploy\n\nPush to main.\n";
    let chunks = chunker(1000).chunk_knowledge("docs/guide.md", doc);

    assert_eq!(chunks.drafts.len(), 3);
    let headers = ["## Setup", "## Usage", "## Deploy"];
    for (draft, header) in chunks.drafts.iter().zip(headers) {
        assert!(draft.content.starts_with(header), "{}", draft.content);
        assert_eq!(draft.granularity, Granularity::Section);
        assert_eq!(draft.metadata["level"], Value::from(2));
    }
    assert_eq!(chunks.drafts[1].start_line, 5);
    assert_eq!(chunks.drafts[1].end_line, 7);
}

#[test]
fn oversized_section_is_batched_by_paragraph() {
    let paragraph = "Svelte compiles components ahead of time. ".repeat(10);
    let doc = format!(
        "# Overview\n\nShort intro.\n\n# Internals\n\n{paragraph}\n\n{paragraph}\n\n{paragraph}\n"
    );
    let chunks = chunker(150).chunk_knowledge("docs/internals.md", &doc);

    assert_eq!(chunks.drafts[0].granularity, Granularity::Section);
    let parts: Vec<_> = chunks
        .drafts
        .iter()
        .filter(|d| d.granularity == Granularity::Paragraphs)
        .collect();
    assert!(parts.len() >= 2);
    assert!(parts[0].content.starts_with("# Internals"));
    assert!(parts
        .iter()
        .all(|d| d.metadata["heading"] == Value::from("Internals")));
    assert!(chunks
        .drafts
        .iter()
        .all(|d| d.oversized || d.estimated_tokens() <= 150));
}

#[test]
fn fenced_headers_are_not_boundaries() {
    let doc = "# Shell\n\n```bash\n# install\nnpm i\n```\n\n# Next\n\nDone.\n";
    let chunks = chunker(1000).chunk_knowledge("docs/shell.md", doc);
    assert_eq!(chunks.drafts.len(), 2);
    assert!(chunks.drafts[0].content.contains("# install"));
}
