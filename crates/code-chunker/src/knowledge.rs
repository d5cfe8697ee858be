//! Markdown knowledge documents: header sections, then paragraph batches.

use crate::batcher::{BatchItem, Batcher};
use crate::lines::LineIndex;
use crate::types::{
    estimate_tokens, ChunkDraft, ChunkWarning, FileChunks, Granularity, WarningKind,
};

/// A `#`/`##` section, blank edges excluded
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    heading: Option<String>,
    level: Option<usize>,
    /// 0-based rows, inclusive
    start_row: usize,
    end_row: usize,
}

/// Blank-line separated block inside a section
#[derive(Debug, Clone, Copy)]
struct Paragraph {
    start_row: usize,
    end_row: usize,
    start: usize,
    end: usize,
    chars: usize,
    /// Characters between the previous paragraph and this one
    gap: usize,
}

impl BatchItem for Paragraph {
    fn char_len(&self) -> usize {
        self.chars
    }

    fn joint_len(&self) -> usize {
        self.gap
    }
}

pub struct KnowledgeSplitter {
    budget: usize,
}

impl KnowledgeSplitter {
    pub const fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn split(&self, file_path: &str, content: &str) -> FileChunks {
        let lines = LineIndex::new(content);
        let rows: Vec<&str> = (0..lines.line_count())
            .map(|row| lines.slice_rows(content, row, row))
            .collect();
        let sections = find_sections(&rows);

        let mut drafts = Vec::new();
        let mut warnings = Vec::new();

        if let [only] = sections.as_slice() {
            drafts.extend(self.paragraphs(file_path, content, &lines, &rows, only, &mut warnings));
        } else {
            for section in &sections {
                let text = lines.slice_rows(content, section.start_row, section.end_row);
                if estimate_tokens(text) <= self.budget {
                    drafts.push(section_meta(
                        ChunkDraft::new(
                            Granularity::Section,
                            section.start_row + 1,
                            section.end_row + 1,
                            text,
                        ),
                        section,
                    ));
                } else {
                    log::debug!(
                        "{file_path}: section {:?} over {} tokens, batching paragraphs",
                        section.heading,
                        self.budget
                    );
                    drafts.extend(self.paragraphs(
                        file_path,
                        content,
                        &lines,
                        &rows,
                        section,
                        &mut warnings,
                    ));
                }
            }
        }

        log::debug!(
            "{file_path}: {} sections, {} knowledge chunks",
            sections.len(),
            drafts.len()
        );
        FileChunks::new(drafts, warnings)
    }

    fn paragraphs(
        &self,
        file_path: &str,
        content: &str,
        lines: &LineIndex,
        rows: &[&str],
        section: &Section,
        warnings: &mut Vec<ChunkWarning>,
    ) -> Vec<ChunkDraft> {
        let paragraphs = find_paragraphs(content, lines, rows, section);

        Batcher::new(self.budget)
            .batch(paragraphs)
            .into_iter()
            .enumerate()
            .filter_map(|(part, batch)| {
                let first = batch.items.first()?;
                let last = batch.items.last()?;
                let text = &content[first.start..last.end];
                let draft = section_meta(
                    ChunkDraft::new(
                        Granularity::Paragraphs,
                        first.start_row + 1,
                        last.end_row + 1,
                        text,
                    ),
                    section,
                )
                .with_meta("part", part)
                .with_meta("paragraphs", batch.items.len())
                .oversized(batch.oversized);

                if batch.oversized {
                    log::warn!(
                        "{file_path}:{}-{}: paragraph exceeds {} tokens, kept whole",
                        draft.start_line,
                        draft.end_line,
                        self.budget
                    );
                    warnings.push(ChunkWarning::new(
                        file_path,
                        WarningKind::OversizedChunk,
                        format!(
                            "paragraph at lines {}-{} exceeds {} tokens",
                            draft.start_line, draft.end_line, self.budget
                        ),
                    ));
                }
                Some(draft)
            })
            .collect()
    }
}

fn section_meta(draft: ChunkDraft, section: &Section) -> ChunkDraft {
    match (&section.heading, section.level) {
        (Some(heading), Some(level)) => draft
            .with_meta("heading", heading.clone())
            .with_meta("level", level),
        _ => draft,
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// `# Title` or `## Title`; deeper headers stay inside their section
fn header(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if !(1..=2).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some((hashes, rest.trim()))
    } else {
        None
    }
}

fn find_sections(rows: &[&str]) -> Vec<Section> {
    let mut starts: Vec<(usize, Option<(usize, String)>)> = vec![(0, None)];
    let mut in_fence = false;

    for (row, line) in rows.iter().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((level, title)) = header(line) {
            starts.push((row, Some((level, title.to_string()))));
        }
    }

    let mut sections = Vec::new();
    for (idx, (start, head)) in starts.iter().enumerate() {
        let end = starts
            .get(idx + 1)
            .map_or(rows.len(), |(next, _)| *next);
        let Some((first, last)) = trim_blank_rows(rows, *start, end) else {
            continue;
        };
        sections.push(Section {
            heading: head.as_ref().map(|(_, title)| title.clone()),
            level: head.as_ref().map(|(level, _)| *level),
            start_row: first,
            end_row: last,
        });
    }
    sections
}

/// First and last non-blank rows of `start..end`
fn trim_blank_rows(rows: &[&str], start: usize, end: usize) -> Option<(usize, usize)> {
    let first = (start..end).find(|&row| !rows[row].trim().is_empty())?;
    let last = (first..end).rev().find(|&row| !rows[row].trim().is_empty())?;
    Some((first, last))
}

fn find_paragraphs(
    content: &str,
    lines: &LineIndex,
    rows: &[&str],
    section: &Section,
) -> Vec<Paragraph> {
    let mut blocks: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut in_fence = false;

    for row in section.start_row..=section.end_row {
        let line = rows[row];
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if line.trim().is_empty() && !in_fence {
            if let Some(start) = current.take() {
                blocks.push((start, row - 1));
            }
        } else if current.is_none() {
            current = Some(row);
        }
    }
    if let Some(start) = current {
        blocks.push((start, section.end_row));
    }

    let mut paragraphs: Vec<Paragraph> = Vec::with_capacity(blocks.len());
    for (start_row, end_row) in blocks {
        let span = lines.row_span(content, start_row, end_row);
        let (start, end) = (span.start, span.end);
        let gap = paragraphs
            .last()
            .map_or(0, |prev| content[prev.end..start].chars().count());
        paragraphs.push(Paragraph {
            start_row,
            end_row,
            start,
            end,
            chars: content[start..end].chars().count(),
            gap,
        });
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn headers_inside_fences_do_not_split() {
        let rows = vec!["# Intro", "```sh", "# not a header", "```", "## Next", "text"];
        let sections = find_sections(&rows);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].end_row, 3);
        assert_eq!(sections[1].heading.as_deref(), Some("Next"));
        assert_eq!(sections[1].level, Some(2));
    }

    #[test]
    fn deep_headers_stay_in_section() {
        assert_eq!(header("# A"), Some((1, "A")));
        assert_eq!(header("## B "), Some((2, "B")));
        assert_eq!(header("### C"), None);
        assert_eq!(header("#hashtag"), None);
    }

    #[test]
    fn preamble_becomes_its_own_section() {
        let doc = "Some intro.\n\n# First\nbody\n\n# Second\nmore\n";
        let chunks = KnowledgeSplitter::new(1000).split("README.md", doc);
        let contents: Vec<_> = chunks.drafts.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["Some intro.", "# First\nbody", "# Second\nmore"]);
        assert!(!chunks.drafts[0].metadata.contains_key("heading"));
        assert_eq!(chunks.drafts[2].metadata["heading"], Value::from("Second"));
        assert_eq!(chunks.drafts[2].start_line, 6);
    }

    #[test]
    fn single_section_is_batched_by_paragraph() {
        let para = "word ".repeat(100);
        let doc = format!("# Guide\n\n{para}\n\n{para}\n\n{para}\n");
        let chunks = KnowledgeSplitter::new(200).split("guide.md", &doc);
        assert!(chunks.drafts.len() > 1);
        assert!(chunks
            .drafts
            .iter()
            .all(|d| d.granularity == Granularity::Paragraphs && d.estimated_tokens() <= 200));
        assert!(chunks.drafts[0].content.starts_with("# Guide"));
        assert!(chunks.warnings.is_empty());
    }

    #[test]
    fn irreducible_paragraph_is_flagged() {
        let doc = format!("# A\nshort\n\n# B\n{}\n", "x".repeat(5000));
        let chunks = KnowledgeSplitter::new(100).split("big.md", &doc);
        let last = chunks.drafts.last().unwrap();
        assert!(last.oversized);
        assert_eq!(chunks.warnings.len(), 1);
        assert_eq!(chunks.warnings[0].kind, WarningKind::OversizedChunk);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunks = KnowledgeSplitter::new(100).split("empty.md", "\n\n  \n");
        assert!(chunks.drafts.is_empty());
    }
}
