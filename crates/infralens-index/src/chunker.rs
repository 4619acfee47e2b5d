//! Size-bounded overlapping chunking with per-file-type boundary preferences.
//!
//! Splitting runs in two phases. The trimmed document is first cut into
//! atomic pieces of at most `chunk_size - chunk_overlap` code points, trying
//! structural boundaries before blank lines, lines and spaces, and finally a
//! hard cut. Pieces are then packed greedily into chunks of at most
//! `chunk_size` code points, each chunk after the first starting exactly
//! `chunk_overlap` code points before its predecessor's end.

use std::path::Path;

use tree_sitter::Parser;

use crate::languages::{Lang, detect_language};
use crate::loader::Document;

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const GENERIC_SEPARATORS: &[&str] = &["\n\n", "\n", " "];

const TERRAFORM_SEPARATORS: &[&str] = &[
    "\nresource ",
    "\nmodule ",
    "\nvariable ",
    "\noutput ",
    "\ndata ",
    "\nlocals ",
    "\nprovider ",
];

const YAML_SEPARATORS: &[&str] = &["\n---"];

/// One chunk of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub filename: String,
    /// Repository-relative path of the source document.
    pub source: String,
    /// Position within the document, starting at 0.
    pub index: usize,
    /// Leading code points repeated from the previous chunk.
    pub overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Size and overlap as used: size at least 1, overlap below size.
    #[must_use]
    pub fn effective(self) -> (usize, usize) {
        let size = self.chunk_size.max(1);
        (size, self.chunk_overlap.min(size - 1))
    }
}

/// Boundary preference, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    Code(Lang),
    Terraform,
    Yaml,
    Plain,
}

impl ChunkStrategy {
    fn structural_separators(self) -> &'static [&'static str] {
        match self {
            Self::Code(lang) => lang.keyword_separators(),
            Self::Terraform => TERRAFORM_SEPARATORS,
            Self::Yaml => YAML_SEPARATORS,
            Self::Plain => &[],
        }
    }
}

#[must_use]
pub fn strategy_for(path: &Path) -> ChunkStrategy {
    if let Some(lang) = detect_language(path) {
        return ChunkStrategy::Code(lang);
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("tf" | "tfvars" | "hcl") => ChunkStrategy::Terraform,
        Some("yml" | "yaml") => ChunkStrategy::Yaml,
        _ => ChunkStrategy::Plain,
    }
}

enum Level<'a> {
    /// Byte offsets into the whole document.
    Offsets(&'a [usize]),
    /// Split before every occurrence of any separator.
    Separators(&'a [&'a str]),
}

impl Level<'_> {
    fn split_points(&self, text: &str, base: usize) -> Vec<usize> {
        let mut points: Vec<usize> = match self {
            Self::Offsets(offsets) => offsets
                .iter()
                .filter(|&&o| o > base && o < base + text.len())
                .map(|&o| o - base)
                .collect(),
            Self::Separators(seps) => seps
                .iter()
                .flat_map(|sep| text.match_indices(sep).map(|(i, _)| i))
                .filter(|&i| i > 0)
                .collect(),
        };
        points.sort_unstable();
        points.dedup();
        points
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split a document into chunks. Empty content yields no chunks.
    #[must_use]
    pub fn split(&self, doc: &Document) -> Vec<Chunk> {
        let strategy = strategy_for(&doc.path);
        self.split_text(doc.content.trim(), strategy)
            .into_iter()
            .enumerate()
            .map(|(index, (content, overlap))| Chunk {
                content,
                filename: doc.filename.clone(),
                source: doc.relative_path.clone(),
                index,
                overlap,
            })
            .collect()
    }

    /// Chunk contents paired with their overlap, in order.
    #[must_use]
    pub fn split_text(&self, text: &str, strategy: ChunkStrategy) -> Vec<(String, usize)> {
        if text.is_empty() {
            return Vec::new();
        }
        let (size, overlap) = self.config.effective();

        let offsets = match strategy {
            ChunkStrategy::Code(lang) => entity_offsets(lang, text),
            _ => Vec::new(),
        };
        let mut levels = Vec::with_capacity(2 + GENERIC_SEPARATORS.len());
        if !offsets.is_empty() {
            levels.push(Level::Offsets(&offsets));
        }
        let structural = strategy.structural_separators();
        if !structural.is_empty() {
            levels.push(Level::Separators(structural));
        }
        for sep in GENERIC_SEPARATORS {
            levels.push(Level::Separators(std::slice::from_ref(sep)));
        }

        let mut pieces = Vec::new();
        cut(text, 0, &levels, size - overlap, &mut pieces);
        pack(text, &pieces, size, overlap)
    }
}

/// Inverse of splitting: drop each chunk's overlap and concatenate.
#[must_use]
pub fn reconstruct(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .flat_map(|c| c.content.chars().skip(c.overlap))
        .collect()
}

fn cut<'t>(text: &'t str, base: usize, levels: &[Level<'_>], max: usize, out: &mut Vec<&'t str>) {
    if text.chars().count() <= max {
        out.push(text);
        return;
    }
    let Some((level, rest)) = levels.split_first() else {
        hard_split(text, max, out);
        return;
    };

    let points = level.split_points(text, base);
    if points.is_empty() {
        cut(text, base, rest, max, out);
        return;
    }

    let mut prev = 0;
    for end in points.into_iter().chain(std::iter::once(text.len())) {
        cut(&text[prev..end], base + prev, rest, max, out);
        prev = end;
    }
}

fn hard_split<'t>(text: &'t str, max: usize, out: &mut Vec<&'t str>) {
    let mut start = 0;
    for (n, (i, _)) in text.char_indices().enumerate() {
        if n > 0 && n % max == 0 {
            out.push(&text[start..i]);
            start = i;
        }
    }
    out.push(&text[start..]);
}

fn pack(text: &str, pieces: &[&str], size: usize, overlap: usize) -> Vec<(String, usize)> {
    let byte_at: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut spans = Vec::new();
    let (mut start, mut end) = (0usize, 0usize);
    for piece in pieces {
        let len = piece.chars().count();
        if end > start && end - start + len > size {
            spans.push((start, end));
            start = end - overlap;
        }
        end += len;
    }
    if end > start {
        spans.push((start, end));
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(i, (s, e))| {
            let shared = if i == 0 { 0 } else { overlap };
            (text[byte_at[s]..byte_at[e]].to_owned(), shared)
        })
        .collect()
}

/// Line-start byte offsets of top-level entities, with their leading
/// comments and attributes. Empty when no grammar is available.
fn entity_offsets(lang: Lang, source: &str) -> Vec<usize> {
    let Some(grammar) = lang.grammar() else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::debug!(lang = %lang, "set_language failed: {e}");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };

    let root = tree.root_node();
    let kinds = lang.entity_node_kinds();
    let leading = lang.leading_node_kinds();
    let mut offsets = Vec::new();
    let mut lead_start: Option<usize> = None;

    let child_count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        let kind = child.kind();
        if leading.contains(&kind) {
            lead_start.get_or_insert(child.start_byte());
            continue;
        }
        if kinds.contains(&kind) {
            let start = lead_start.unwrap_or_else(|| child.start_byte());
            offsets.push(source[..start].rfind('\n').map_or(0, |nl| nl + 1));
        }
        lead_start = None;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::*;

    fn doc(name: &str, content: &str) -> Document {
        Document {
            path: PathBuf::from("/scratch/repo").join(name),
            relative_path: name.to_owned(),
            filename: Path::new(name)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            content: content.to_owned(),
        }
    }

    fn small(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    fn assert_chunk_invariants(chunks: &[Chunk], size: usize, overlap: usize) {
        for (i, c) in chunks.iter().enumerate() {
            let len = c.content.chars().count();
            assert!(len <= size, "chunk {i} has {len} > {size}");
            assert_eq!(c.index, i);
            if i == 0 {
                assert_eq!(c.overlap, 0);
            } else {
                assert_eq!(c.overlap, overlap);
                assert!(c.overlap < len);
                let prev: Vec<char> = chunks[i - 1].content.chars().collect();
                let tail: String = prev[prev.len() - overlap..].iter().collect();
                let head: String = c.content.chars().take(overlap).collect();
                assert_eq!(tail, head, "overlap mismatch at chunk {i}");
            }
        }
    }

    #[test]
    fn strategy_by_extension() {
        assert_eq!(
            strategy_for(Path::new("src/lib.rs")),
            ChunkStrategy::Code(Lang::Rust)
        );
        assert_eq!(
            strategy_for(Path::new("Main.java")),
            ChunkStrategy::Code(Lang::Java)
        );
        assert_eq!(strategy_for(Path::new("infra/main.tf")), ChunkStrategy::Terraform);
        assert_eq!(strategy_for(Path::new(".github/ci.yml")), ChunkStrategy::Yaml);
        assert_eq!(strategy_for(Path::new("k8s/deploy.yaml")), ChunkStrategy::Yaml);
        assert_eq!(strategy_for(Path::new("README.md")), ChunkStrategy::Plain);
        assert_eq!(strategy_for(Path::new("package.json")), ChunkStrategy::Plain);
    }

    #[test]
    fn default_config_values() {
        let c = ChunkerConfig::default();
        assert_eq!((c.chunk_size, c.chunk_overlap), (2000, 200));
        assert_eq!(c.effective(), (2000, 200));
    }

    #[test]
    fn overlap_clamped_below_size() {
        let c = ChunkerConfig {
            chunk_size: 10,
            chunk_overlap: 50,
        };
        assert_eq!(c.effective(), (10, 9));
        let zero = ChunkerConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        };
        assert_eq!(zero.effective(), (1, 0));
    }

    #[test]
    fn short_document_is_single_chunk() {
        let chunks = Chunker::default().split(&doc("README.md", "# Demo\n\nA small project."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "# Demo\n\nA small project.");
        assert_eq!(chunks[0].filename, "README.md");
        assert_eq!(chunks[0].source, "README.md");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(Chunker::default().split(&doc("a.md", "   \n ")).is_empty());
    }

    #[test]
    fn long_plain_text_respects_size_and_overlap() {
        let text = "lorem ipsum dolor sit amet ".repeat(400);
        let d = doc("notes.md", text.trim());
        let chunks = Chunker::default().split(&d);
        assert!(chunks.len() > 1);
        assert_chunk_invariants(&chunks, 2000, 200);
        assert_eq!(reconstruct(&chunks), text.trim());
    }

    #[test]
    fn terraform_prefers_resource_boundaries() {
        let block = |n: usize| {
            format!(
                "resource \"aws_instance\" \"web{n}\" {{\n  ami           = \"ami-123\"\n  instance_type = \"t3.micro\"\n}}\n"
            )
        };
        let text: String = (0..6).map(block).collect::<Vec<_>>().join("\n");
        let chunker = small(160, 0);
        let chunks = chunker.split(&doc("main.tf", text.trim()));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(
                c.content.trim_start().starts_with("resource "),
                "chunk does not start at a resource: {:?}",
                c.content
            );
        }
        assert_eq!(reconstruct(&chunks), text.trim());
    }

    #[test]
    fn yaml_prefers_document_separators() {
        let docs: Vec<String> = (0..4)
            .map(|i| format!("---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg-{i}\n"))
            .collect();
        let text = docs.concat();
        let chunks = small(80, 0).split(&doc("k8s.yaml", text.trim()));
        assert!(chunks.len() > 1);
        for c in &chunks[1..] {
            assert!(c.content.starts_with("\n---"), "got {:?}", c.content);
        }
        assert_eq!(reconstruct(&chunks), text.trim());
    }

    #[test]
    fn python_keyword_boundaries() {
        let text = "import os\n\ndef alpha():\n    return 1\n\ndef beta():\n    return 2\n\nclass Gamma:\n    pass";
        let chunks = small(40, 0).split(&doc("app.py", text));
        assert!(chunks.len() > 1);
        assert!(chunks.iter().any(|c| c.content.contains("def alpha")));
        assert!(
            chunks
                .iter()
                .all(|c| !(c.content.contains("def alpha") && c.content.contains("class Gamma")))
        );
        assert_eq!(reconstruct(&chunks), text);
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn rust_entities_keep_doc_comments() {
        let text = "use std::io;\n\n/// Adds.\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\n/// Subtracts.\n#[inline]\nfn sub(a: i32, b: i32) -> i32 {\n    a - b\n}";
        let offsets = entity_offsets(Lang::Rust, text);
        assert_eq!(offsets.len(), 2);
        assert!(text[offsets[0]..].starts_with("/// Adds."));
        assert!(text[offsets[1]..].starts_with("/// Subtracts."));

        let chunks = small(60, 0).split(&doc("src/math.rs", text));
        assert!(chunks.iter().any(|c| c.content.starts_with("/// Subtracts.")));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn unbroken_text_falls_back_to_hard_split() {
        let text = "x".repeat(25);
        let chunks = small(10, 3).split(&doc("blob.md", &text));
        assert_chunk_invariants(&chunks, 10, 3);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn multibyte_content_counts_code_points() {
        let text = "é".repeat(30);
        let chunks = small(10, 2).split(&doc("accents.md", &text));
        assert_chunk_invariants(&chunks, 10, 2);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn chunks_carry_source_metadata() {
        let text = "word ".repeat(100);
        let chunks = small(50, 5).split(&doc("docs/guide.md", text.trim()));
        assert!(chunks.iter().all(|c| c.filename == "guide.md"));
        assert!(chunks.iter().all(|c| c.source == "docs/guide.md"));
    }

    fn content_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                Just("fn main() {}".to_owned()),
                Just("\ndef f():".to_owned()),
                Just("\nresource \"x\" \"y\" {".to_owned()),
                Just("\n---".to_owned()),
                Just("\n\n".to_owned()),
                Just("\n".to_owned()),
                Just(" ".to_owned()),
                "[a-zA-Z0-9é日]{1,30}",
            ],
            0..60,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn split_reconstructs_trimmed_content(
            text in content_strategy(),
            size in 1usize..80,
            overlap in 0usize..40,
            ext in prop_oneof![Just("rs"), Just("py"), Just("tf"), Just("yml"), Just("md"), Just("java")],
        ) {
            let content = text.trim();
            let chunker = small(size, overlap);
            let (eff_size, eff_overlap) = chunker.config().effective();
            let chunks = chunker.split(&doc(&format!("file.{ext}"), content));

            prop_assert_eq!(reconstruct(&chunks), content);
            for (i, c) in chunks.iter().enumerate() {
                let len = c.content.chars().count();
                prop_assert!(len <= eff_size);
                prop_assert!(len > 0);
                prop_assert_eq!(c.overlap, if i == 0 { 0 } else { eff_overlap });
                prop_assert!(c.overlap < len);
            }
        }
    }
}
