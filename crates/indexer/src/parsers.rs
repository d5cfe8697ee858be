use crate::registry::ParserKind;
use review_code_chunker::{Chunker, ChunkerError, Dialect, FileChunks};
use std::sync::Arc;

/// A claimed file handed to its parser
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    /// Root-relative, `/`-separated
    pub rel_path: &'a str,
    pub content: &'a str,
}

/// Chunking stage bound to a pattern set
pub trait FileParser: Send + Sync {
    fn kind(&self) -> ParserKind;

    fn parse(
        &self,
        chunker: &Chunker,
        file: &SourceFile<'_>,
    ) -> review_code_chunker::Result<FileChunks>;
}

/// TypeScript/JavaScript modules, dialect taken from the extension
pub struct ModuleParser;

impl FileParser for ModuleParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Module
    }

    fn parse(
        &self,
        chunker: &Chunker,
        file: &SourceFile<'_>,
    ) -> review_code_chunker::Result<FileChunks> {
        let dialect = Dialect::from_path(file.rel_path)
            .ok_or_else(|| ChunkerError::unsupported_language(file.rel_path))?;
        chunker.chunk_module(file.rel_path, file.content, dialect)
    }
}

pub struct ComponentParser;

impl FileParser for ComponentParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Component
    }

    fn parse(
        &self,
        chunker: &Chunker,
        file: &SourceFile<'_>,
    ) -> review_code_chunker::Result<FileChunks> {
        chunker.chunk_component(file.rel_path, file.content)
    }
}

pub struct KnowledgeParser;

impl FileParser for KnowledgeParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Knowledge
    }

    fn parse(
        &self,
        chunker: &Chunker,
        file: &SourceFile<'_>,
    ) -> review_code_chunker::Result<FileChunks> {
        Ok(chunker.chunk_knowledge(file.rel_path, file.content))
    }
}

/// Stock parser for a parser kind
pub fn parser_for(kind: ParserKind) -> Arc<dyn FileParser> {
    match kind {
        ParserKind::Module => Arc::new(ModuleParser),
        ParserKind::Component => Arc::new(ComponentParser),
        ParserKind::Knowledge => Arc::new(KnowledgeParser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_code_chunker::{ChunkerConfig, Granularity};

    fn chunker() -> Chunker {
        Chunker::new(ChunkerConfig::default()).unwrap()
    }

    #[test]
    fn module_parser_rejects_non_script_paths() {
        let file = SourceFile {
            rel_path: "src/App.svelte",
            content: "<h1>hi</h1>",
        };
        let err = ModuleParser.parse(&chunker(), &file).unwrap_err();
        assert!(matches!(err, ChunkerError::UnsupportedLanguage(_)));
    }

    #[test]
    fn parsers_dispatch_to_their_stage() {
        let chunker = chunker();
        let module = SourceFile {
            rel_path: "src/lib/a.ts",
            content: "export function a() { return 1; }\n",
        };
        let drafts = parser_for(ParserKind::Module)
            .parse(&chunker, &module)
            .unwrap()
            .drafts;
        assert_eq!(drafts[0].granularity, Granularity::Function);

        let doc = SourceFile {
            rel_path: "docs/guide.txt",
            content: "# Guide\n\nSome text.\n",
        };
        let drafts = parser_for(ParserKind::Knowledge)
            .parse(&chunker, &doc)
            .unwrap()
            .drafts;
        assert_eq!(drafts[0].granularity, Granularity::Paragraphs);

        let component = SourceFile {
            rel_path: "src/routes/+page.svelte",
            content: "<h1>Hello</h1>\n",
        };
        let parser = parser_for(ParserKind::Component);
        assert_eq!(parser.kind(), ParserKind::Component);
        let drafts = parser.parse(&chunker, &component).unwrap().drafts;
        assert_eq!(drafts[0].granularity, Granularity::Component);
    }
}
