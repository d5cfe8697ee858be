use serde::{Deserialize, Serialize};

/// Configuration for chunking behavior.
///
/// Every budget is expressed in estimated tokens (characters / 4), the same
/// unit [`crate::estimate_tokens`] produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Budget for batches of adjacent script constructs
    pub construct_max_tokens: usize,

    /// A component whose whole text fits this budget is emitted as one chunk
    pub component_max_tokens: usize,

    /// Budget for template chunks produced by the recursive splitter
    pub template_max_tokens: usize,

    /// Budget for knowledge (markdown) sections and paragraph batches
    pub knowledge_max_tokens: usize,

    /// Text-only template nodes below this size are dropped
    pub min_text_tokens: usize,

    /// Emit non-function variable declarators as `variable` constructs
    pub include_non_function_variables: bool,

    /// Attach the file imports a construct refers to as `contextImports`
    pub include_imports: bool,

    /// Maximum number of imports to attach per construct
    pub max_imports_per_chunk: usize,

    /// Run the best-effort regex pass over component scripts
    pub heuristics: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            construct_max_tokens: 375,
            component_max_tokens: 1500,
            template_max_tokens: 250,
            knowledge_max_tokens: 1000,
            min_text_tokens: 10,
            include_non_function_variables: false,
            include_imports: true,
            max_imports_per_chunk: 5,
            heuristics: true,
        }
    }
}

impl ChunkerConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            construct_max_tokens: 250,
            component_max_tokens: 750,
            template_max_tokens: 250,
            knowledge_max_tokens: 500,
            ..Default::default()
        }
    }

    /// Create config optimized for review prompts (larger, comprehensive chunks)
    pub fn for_review() -> Self {
        Self {
            construct_max_tokens: 375,
            component_max_tokens: 1500,
            template_max_tokens: 1500,
            knowledge_max_tokens: 1000,
            include_non_function_variables: true,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("construct_max_tokens", self.construct_max_tokens),
            ("component_max_tokens", self.component_max_tokens),
            ("template_max_tokens", self.template_max_tokens),
            ("knowledge_max_tokens", self.knowledge_max_tokens),
        ] {
            if value == 0 {
                return Err(format!("{name} must be > 0"));
            }
        }

        if self.min_text_tokens >= self.template_max_tokens {
            return Err(format!(
                "min_text_tokens ({}) must be below template_max_tokens ({})",
                self.min_text_tokens, self.template_max_tokens
            ));
        }

        if self.template_max_tokens > self.component_max_tokens {
            return Err(format!(
                "template_max_tokens ({}) cannot exceed component_max_tokens ({})",
                self.template_max_tokens, self.component_max_tokens
            ));
        }

        Ok(())
    }
}
