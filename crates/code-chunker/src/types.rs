use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Estimate tokens from content: character count / 4.
///
/// This is the only size function in the crate; constructs, template nodes and
/// knowledge sections are all measured with it.
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    estimate_tokens_from_chars(content.chars().count())
}

/// Same estimate for an already known character count
#[must_use]
pub const fn estimate_tokens_from_chars(chars: usize) -> usize {
    chars / 4
}

/// Kind of top-level declaration extracted from a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Function,
    Class,
    Interface,
    Variable,
    Export,
    /// Whole file kept as-is because the grammar rejected it
    Opaque,
}

impl ConstructKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Variable => "variable",
            Self::Export => "export",
            Self::Opaque => "opaque",
        }
    }

    /// Granularity of a chunk holding exactly one construct of this kind
    #[must_use]
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Function => Granularity::Function,
            Self::Class => Granularity::Class,
            Self::Interface => Granularity::Interface,
            Self::Variable => Granularity::Variable,
            Self::Export => Granularity::Export,
            Self::Opaque => Granularity::File,
        }
    }
}

/// Declaration modifiers recorded on a construct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    #[serde(rename = "async")]
    pub is_async: bool,
    #[serde(rename = "generator")]
    pub is_generator: bool,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_arrow_function: bool,
    pub is_const: bool,
    pub exported: bool,
    pub is_default_export: bool,
    /// `interface`, `type` or `enum` for interface-like constructs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_kind: Option<String>,
}

/// A syntactic declaration extracted from one module pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Construct {
    pub kind: ConstructKind,

    /// Declared name, `Class.method` for methods, "anonymous" when unnamed
    pub name: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Exact source text of lines `start_line..=end_line`
    pub content: String,

    pub modifiers: Modifiers,

    /// Enclosing class for methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// File imports this construct refers to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_imports: Vec<String>,
}

impl Construct {
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Short description stored in chunk metadata
    #[must_use]
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "name": self.name,
            "startLine": self.start_line,
            "endLine": self.end_line,
            "modifiers": self.modifiers,
        })
    }
}

/// Structural level a chunk represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    File,
    Component,
    Function,
    Class,
    Interface,
    Variable,
    Export,
    /// Several adjacent constructs merged by the batcher
    Batch,
    Script,
    Style,
    Template,
    Section,
    Paragraphs,
}

impl Granularity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Component => "component",
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Variable => "variable",
            Self::Export => "export",
            Self::Batch => "batch",
            Self::Script => "script",
            Self::Style => "style",
            Self::Template => "template",
            Self::Section => "section",
            Self::Paragraphs => "paragraphs",
        }
    }
}

/// A chunk before it is bound to a file route and given an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDraft {
    pub granularity: Granularity,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub metadata: Map<String, Value>,
    /// Over budget and irreducible
    pub oversized: bool,
}

impl ChunkDraft {
    #[must_use]
    pub fn new(
        granularity: Granularity,
        start_line: usize,
        end_line: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            granularity,
            start_line,
            end_line,
            content: content.into(),
            metadata: Map::new(),
            oversized: false,
        }
    }

    /// Builder: set one metadata key
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Builder: mark as oversized
    #[must_use]
    pub const fn oversized(mut self, oversized: bool) -> Self {
        self.oversized = oversized;
        self
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// A size-bounded unit of source content plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique within a run
    pub id: String,
    pub file_path: String,
    /// Type label of the pattern that claimed the file
    pub semantic_type: String,
    pub granularity: Granularity,
    pub framework: String,
    pub start_line: usize,
    pub end_line: usize,
    pub metadata: Map<String, Value>,
    pub content: String,
    pub oversized: bool,
}

impl Chunk {
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Flatten into the `{id, metadata, content}` shape a vector store upserts
    #[must_use]
    pub fn to_record(&self) -> ChunkRecord {
        let mut metadata = self.metadata.clone();
        metadata.insert("type".into(), Value::from(self.semantic_type.clone()));
        metadata.insert("granularity".into(), Value::from(self.granularity.as_str()));
        metadata.insert("framework".into(), Value::from(self.framework.clone()));
        metadata.insert("filePath".into(), Value::from(self.file_path.clone()));
        metadata.insert("startLine".into(), Value::from(self.start_line));
        metadata.insert("endLine".into(), Value::from(self.end_line));
        metadata.insert("estimatedTokens".into(), Value::from(self.estimated_tokens()));
        if self.oversized {
            metadata.insert("oversized".into(), Value::Bool(true));
        }

        ChunkRecord {
            id: self.id.clone(),
            metadata,
            content: self.content.clone(),
        }
    }
}

/// Storage-facing view of a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub content: String,
}

/// Category of a non-fatal problem met while chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Chunk kept although it exceeds its budget
    OversizedChunk,
    /// Grammar rejected the source; a whole-file chunk was emitted instead
    Unparseable,
    /// A processing step failed and the unit degraded to a coarser chunk
    Fallback,
    /// File could not be read
    Io,
}

impl WarningKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OversizedChunk => "oversized_chunk",
            Self::Unparseable => "unparseable",
            Self::Fallback => "fallback",
            Self::Io => "io",
        }
    }
}

/// Non-fatal warning surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkWarning {
    pub file_path: String,
    pub kind: WarningKind,
    pub message: String,
}

impl ChunkWarning {
    pub fn new(file_path: impl Into<String>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Output of chunking one file, before ids are assigned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileChunks {
    pub drafts: Vec<ChunkDraft>,
    pub warnings: Vec<ChunkWarning>,
}

impl FileChunks {
    #[must_use]
    pub const fn new(drafts: Vec<ChunkDraft>, warnings: Vec<ChunkWarning>) -> Self {
        Self { drafts, warnings }
    }
}

/// Route information bound to every chunk of one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOrigin {
    pub file_path: String,
    pub semantic_type: String,
    pub framework: String,
    /// Rendered pattern metadata, merged under each draft's own metadata
    pub metadata: Map<String, Value>,
}

impl ChunkOrigin {
    /// Bind drafts to this origin, keeping their order and assigning ids
    #[must_use]
    pub fn assemble(&self, drafts: Vec<ChunkDraft>) -> Vec<Chunk> {
        drafts
            .into_iter()
            .enumerate()
            .map(|(ordinal, draft)| {
                let mut metadata = self.metadata.clone();
                metadata.extend(draft.metadata);
                Chunk {
                    id: chunk_id(&self.file_path, ordinal, &draft.content),
                    file_path: self.file_path.clone(),
                    semantic_type: self.semantic_type.clone(),
                    granularity: draft.granularity,
                    framework: self.framework.clone(),
                    start_line: draft.start_line,
                    end_line: draft.end_line,
                    metadata,
                    content: draft.content,
                    oversized: draft.oversized,
                }
            })
            .collect()
    }
}

/// Deterministic chunk id: SHA-256 over path, ordinal and content, 32 hex chars
#[must_use]
pub fn chunk_id(file_path: &str, ordinal: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}
