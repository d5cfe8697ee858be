//! Greedy size-bounded batching of adjacent items.
//!
//! Items are appended to the running batch while the batch would stay within
//! budget once joined; otherwise the batch is flushed and a new one started.
//! An item that alone exceeds the budget is always flushed on its own. An item
//! whose lines are already held by a buffered item rides along at no cost.

use crate::types::{
    estimate_tokens_from_chars, ChunkDraft, ChunkWarning, Construct, Granularity, WarningKind,
};
use serde_json::Value;

/// Something the batcher can measure
pub trait BatchItem {
    /// Size in characters
    fn char_len(&self) -> usize;

    /// Characters inserted between this item and the previous one when joined
    fn joint_len(&self) -> usize {
        1
    }

    /// 1-based inclusive lines, when the item maps onto source lines
    fn line_range(&self) -> Option<(usize, usize)> {
        None
    }
}

impl BatchItem for Construct {
    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn line_range(&self) -> Option<(usize, usize)> {
        Some((self.start_line, self.end_line))
    }
}

fn contains(outer: (usize, usize), inner: (usize, usize)) -> bool {
    outer.0 <= inner.0 && inner.1 <= outer.1
}

fn is_covered<T: BatchItem>(held: &[T], item: &T) -> bool {
    item.line_range().is_some_and(|range| {
        held.iter()
            .any(|h| h.line_range().is_some_and(|outer| contains(outer, range)))
    })
}

/// A run of adjacent items in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    /// Characters of the joined batch
    pub chars: usize,
    /// Single item that alone exceeds the budget
    pub oversized: bool,
}

impl<T> Batch<T> {
    pub const fn estimated_tokens(&self) -> usize {
        estimate_tokens_from_chars(self.chars)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    budget: usize,
}

impl Batcher {
    /// `budget` is in estimated tokens
    pub const fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn batch<T: BatchItem>(&self, items: impl IntoIterator<Item = T>) -> Vec<Batch<T>> {
        let mut batches = Vec::new();
        let mut current: Vec<T> = Vec::new();
        let mut chars = 0;

        for item in items {
            if is_covered(&current, &item) {
                current.push(item);
                continue;
            }
            let len = item.char_len();

            if estimate_tokens_from_chars(len) > self.budget {
                if !current.is_empty() {
                    batches.push(Batch {
                        items: std::mem::take(&mut current),
                        chars,
                        oversized: false,
                    });
                }
                chars = 0;
                batches.push(Batch {
                    items: vec![item],
                    chars: len,
                    oversized: true,
                });
                continue;
            }

            if current.is_empty() {
                chars = len;
                current.push(item);
                continue;
            }

            let joined = chars + item.joint_len() + len;
            if estimate_tokens_from_chars(joined) <= self.budget {
                chars = joined;
                current.push(item);
            } else {
                batches.push(Batch {
                    items: std::mem::take(&mut current),
                    chars,
                    oversized: false,
                });
                chars = len;
                current.push(item);
            }
        }

        if !current.is_empty() {
            batches.push(Batch {
                items: current,
                chars,
                oversized: false,
            });
        }

        batches
    }
}

/// Batch constructs at `budget` and turn each batch into a chunk draft.
///
/// A batch of one keeps the construct's own granularity; larger batches are
/// newline-joined into a `batch` chunk.
pub fn construct_drafts(
    constructs: Vec<Construct>,
    budget: usize,
    file_path: &str,
    warnings: &mut Vec<ChunkWarning>,
) -> Vec<ChunkDraft> {
    Batcher::new(budget)
        .batch(constructs)
        .into_iter()
        .filter_map(|batch| {
            let oversized = batch.oversized;
            let draft = batch_to_draft(batch.items)?.oversized(oversized);
            if oversized {
                log::warn!(
                    "{file_path}:{}-{}: construct exceeds {budget} tokens ({} estimated), kept whole",
                    draft.start_line,
                    draft.end_line,
                    draft.estimated_tokens()
                );
                warnings.push(ChunkWarning::new(
                    file_path,
                    WarningKind::OversizedChunk,
                    format!(
                        "construct at lines {}-{} exceeds {budget} tokens",
                        draft.start_line, draft.end_line
                    ),
                ));
            }
            Some(draft)
        })
        .collect()
}

fn batch_to_draft(items: Vec<Construct>) -> Option<ChunkDraft> {
    // Items nested in an earlier item of the batch (class methods, sibling
    // declarators of one statement) add metadata but no content.
    let primary: Vec<&Construct> = items
        .iter()
        .enumerate()
        .filter(|&(idx, construct)| !is_covered(&items[..idx], construct))
        .map(|(_, construct)| construct)
        .collect();
    let first = primary.first()?;
    let last = primary.last()?;
    let (start_line, end_line) = (first.start_line, last.end_line);

    let mut imports: Vec<String> = Vec::new();
    for construct in &items {
        for import in &construct.context_imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
    }
    let names: Vec<String> = items.iter().map(|c| c.name.clone()).collect();
    let summaries: Vec<Value> = items.iter().map(Construct::summary).collect();

    let mut draft = if let [single] = primary.as_slice() {
        let mut draft = ChunkDraft::new(
            single.kind.granularity(),
            start_line,
            end_line,
            single.content.clone(),
        )
        .with_meta("name", single.name.clone())
        .with_meta("kind", single.kind.as_str())
        .with_meta(
            "modifiers",
            serde_json::to_value(&single.modifiers).unwrap_or(Value::Null),
        );
        if let Some(parent) = &single.parent {
            draft = draft.with_meta("parent", parent.clone());
        }
        if items.len() > 1 {
            draft = draft.with_meta("names", names);
        }
        draft
    } else {
        let content = primary
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        ChunkDraft::new(Granularity::Batch, start_line, end_line, content)
            .with_meta("names", names)
    };

    draft = draft.with_meta("constructs", summaries);
    if !imports.is_empty() {
        draft = draft.with_meta("contextImports", imports);
    }
    Some(draft)
}
