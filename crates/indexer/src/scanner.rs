use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Scan knobs, usually derived from the run configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,
    pub max_file_size_bytes: u64,
    /// Honour `.gitignore`, global excludes and `.git/info/exclude`
    pub respect_gitignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect(),
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            respect_gitignore: true,
        }
    }
}

/// Scanner for finding chunkable files in a project
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options: ScanOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Scan the root, returning files in sorted path order
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let gitignore = self.options.respect_gitignore;
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // hidden files stay out
            .git_ignore(gitignore)
            .git_global(gitignore)
            .git_exclude(gitignore)
            .require_git(false);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.has_supported_extension(path) {
                        continue;
                    }

                    if Self::is_noise_file(path) {
                        log::debug!("Skipping noisy artifact {}", path.display());
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size_bytes
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} candidate files", files.len());
        files
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.options.extensions.iter().any(|candidate| candidate == &ext)
            })
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_noise_file(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let lowered = name.to_lowercase();
        NOISE_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix))
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".husky",
    ".yarn",
    ".npm",
    ".pnpm-store",
    // caches / builds
    ".cache",
    "node_modules",
    ".svelte-kit",
    ".vercel",
    ".netlify",
    ".output",
    ".vite",
    ".turbo",
    ".next",
    ".nuxt",
    "build",
    "dist",
    "coverage",
    "storybook-static",
    "playwright-report",
    "test-results",
    "static",
    "public",
    "tmp",
    // vendored
    "vendor",
    "third_party",
    "third-party",
];

/// Generated bundles that share a supported extension
const NOISE_SUFFIXES: &[&str] = &[".min.js", ".bundle.js", ".chunk.js", ".map.js"];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "svelte", "md", "mdx", "markdown",
];

#[cfg(test)]
mod tests {
    use super::{FileScanner, ScanOptions};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[std::path::PathBuf], root: &std::path::Path) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn scans_supported_files_in_sorted_order() {
        let temp = tempdir().unwrap();
        let routes = temp.path().join("src").join("routes");
        fs::create_dir_all(&routes).unwrap();
        fs::write(routes.join("+page.svelte"), b"<h1>hi</h1>").unwrap();
        fs::write(temp.path().join("src").join("app.ts"), b"export {}").unwrap();
        fs::write(temp.path().join("README.md"), b"# App").unwrap();
        fs::write(temp.path().join("main.rs"), b"fn main() {}").unwrap();
        fs::write(temp.path().join("app.min.js"), b"var a=1").unwrap();

        let files = FileScanner::new(temp.path()).scan();

        assert_eq!(
            names(&files, temp.path()),
            vec!["README.md", "src/app.ts", "src/routes/+page.svelte"]
        );
    }

    #[test]
    fn skips_ignored_directories() {
        let temp = tempdir().unwrap();
        for dir in ["node_modules/pkg", ".svelte-kit/generated", "build"] {
            let path = temp.path().join(dir);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join("index.js"), b"export {}").unwrap();
        }
        fs::write(temp.path().join("index.js"), b"export {}").unwrap();

        let files = FileScanner::new(temp.path()).scan();
        assert_eq!(names(&files, temp.path()), vec!["index.js"]);
    }

    #[test]
    fn honours_gitignore_and_size_limit() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("generated")).unwrap();
        fs::write(temp.path().join("generated").join("api.ts"), b"export {}").unwrap();
        fs::write(temp.path().join(".gitignore"), b"/generated").unwrap();
        fs::write(temp.path().join("big.ts"), vec![b'x'; 2048]).unwrap();
        fs::write(temp.path().join("small.ts"), b"export {}").unwrap();

        let options = ScanOptions {
            max_file_size_bytes: 1024,
            ..Default::default()
        };
        let files = FileScanner::new(temp.path()).with_options(options).scan();
        assert_eq!(names(&files, temp.path()), vec!["small.ts"]);

        let options = ScanOptions {
            respect_gitignore: false,
            ..Default::default()
        };
        let files = FileScanner::new(temp.path()).with_options(options).scan();
        assert!(files.iter().any(|p| p.ends_with("generated/api.ts")));
    }

    #[test]
    fn extension_list_is_configurable() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.ts"), b"export {}").unwrap();
        fs::write(temp.path().join("b.md"), b"# B").unwrap();

        let options = ScanOptions {
            extensions: vec!["md".to_string()],
            ..Default::default()
        };
        let files = FileScanner::new(temp.path()).with_options(options).scan();
        assert_eq!(names(&files, temp.path()), vec!["b.md"]);
    }
}
