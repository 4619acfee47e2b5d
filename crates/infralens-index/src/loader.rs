//! Walks a cloned repository and yields one [`Document`] per eligible file.

use std::path::{Path, PathBuf};

use ignore::{DirEntry, Walk, WalkBuilder};

/// Directory names never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "target",
    "dist",
    "build",
    "vendor",
    ".terraform",
    ".idea",
    ".vscode",
];

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "ts", "js", "tsx", "md", "java", "go", "rs", "c", "cpp", "tf", "yml", "yaml",
];

/// Project overview files. Always loaded, and targeted by broad questions.
pub const OVERVIEW_FILENAMES: &[&str] = &[
    "README.md",
    "README.rst",
    "README.txt",
    "readme.md",
    "package.json",
    "setup.py",
    "pyproject.toml",
    "Cargo.toml",
];

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// One ingested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub relative_path: String,
    pub filename: String,
    /// Trimmed, never empty.
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    config: LoaderConfig,
}

impl DocumentLoader {
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Lazily walk `root`. Unreadable and oversized files are skipped with a
    /// warning; files that decode to whitespace only are skipped silently.
    #[must_use]
    pub fn load(&self, root: &Path) -> Documents {
        let walk = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| !is_excluded_dir(entry))
            .build();
        Documents {
            walk,
            root: root.to_path_buf(),
            config: self.config.clone(),
        }
    }

    #[must_use]
    pub fn is_eligible(&self, path: &Path) -> bool {
        is_eligible(&self.config, path)
    }
}

fn is_eligible(config: &LoaderConfig, path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if is_overview_file(name) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|e| e == ext))
}

/// Finite, non-restartable sequence of documents in traversal order.
pub struct Documents {
    walk: Walk,
    root: PathBuf,
    config: LoaderConfig,
}

impl std::fmt::Debug for Documents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Documents")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Iterator for Documents {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("failed to read directory entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if !is_eligible(&self.config, path) {
                continue;
            }
            if let Some(doc) = self.read_document(path) {
                return Some(doc);
            }
        }
    }
}

impl Documents {
    fn read_document(&self, path: &Path) -> Option<Document> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.config.max_file_size => {
                tracing::warn!(
                    path = %path.display(),
                    size = meta.len(),
                    "skipping oversized file"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "skipping unreadable file: {e}");
                return None;
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), "skipping unreadable file: {e}");
                return None;
            }
        };

        let text = decode_lossy(&bytes);
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let relative_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(path = %relative_path, chars = content.len(), "loaded document");
        Some(Document {
            path: path.to_path_buf(),
            relative_path,
            filename,
            content: content.to_owned(),
        })
    }
}

#[must_use]
pub fn is_overview_file(filename: &str) -> bool {
    OVERVIEW_FILENAMES.contains(&filename)
}

/// Decode UTF-8, dropping invalid byte sequences instead of replacing them.
#[must_use]
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_some_and(|ft| ft.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}
