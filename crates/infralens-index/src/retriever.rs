//! Query-intent routing: overview questions go to README/manifest chunks
//! first, everything else to a literal hybrid search.

use infralens_llm::LlmProvider;
use infralens_memory::{FieldCondition, FieldValue, VectorFilter};

use crate::error::Result;
use crate::loader::OVERVIEW_FILENAMES;
use crate::manager::{CollectionHandle, RetrievedChunk};

/// Substrings marking a project-level question.
pub const BROAD_KEYWORDS: &[&str] = &[
    "about",
    "purpose",
    "overview",
    "what is",
    "description",
    "project",
    "repository",
    "repo",
    "summary",
];

/// Query used instead of the user's words on the overview path.
pub const OVERVIEW_QUERY: &str = "README project description overview purpose";

pub const MAX_OVERVIEW_RESULTS: usize = 5;

pub const DEFAULT_CONTEXT_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Restricted to overview files, falling back to `Literal`.
    Overview,
    Literal,
}

#[must_use]
pub fn is_broad_question(query: &str) -> bool {
    let lower = query.to_lowercase();
    BROAD_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[must_use]
pub fn classify_query(query: &str) -> RetrievalStrategy {
    if is_broad_question(query) {
        RetrievalStrategy::Overview
    } else {
        RetrievalStrategy::Literal
    }
}

fn overview_filter() -> VectorFilter {
    VectorFilter {
        must: vec![FieldCondition {
            field: "filename".into(),
            value: FieldValue::AnyText(OVERVIEW_FILENAMES.iter().map(|&f| f.to_owned()).collect()),
        }],
        must_not: vec![],
    }
}

/// Retrieve at most `k` chunks, most relevant first. The store's ordering
/// is kept as is.
///
/// # Errors
///
/// Returns an error if the literal search fails. Overview search failures
/// are logged and fall back to the literal search.
pub async fn retrieve<P: LlmProvider>(
    handle: &CollectionHandle<'_, P>,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if k == 0 {
        return Ok(Vec::new());
    }

    if classify_query(query) == RetrievalStrategy::Overview {
        let limit = k.min(MAX_OVERVIEW_RESULTS);
        match handle
            .search(OVERVIEW_QUERY, limit, Some(overview_filter()))
            .await
        {
            Ok(hits) if !hits.is_empty() => {
                tracing::debug!(
                    collection = handle.name(),
                    hits = hits.len(),
                    "overview retrieval"
                );
                return Ok(hits);
            }
            Ok(_) => {
                tracing::debug!(
                    collection = handle.name(),
                    "no overview chunks, using literal query"
                );
            }
            Err(e) => {
                tracing::warn!(
                    collection = handle.name(),
                    "overview search failed, using literal query: {e}"
                );
            }
        }
    }

    let hits = handle.search(query, k, None).await?;
    tracing::debug!(collection = handle.name(), hits = hits.len(), "literal retrieval");
    Ok(hits)
}

/// Render chunks for a prompt: `File: {filename}` then at most `max_chars`
/// code points of content, blocks separated by `---`.
#[must_use]
pub fn format_context(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    chunks
        .iter()
        .map(|c| {
            let excerpt: String = c.content.chars().take(max_chars).collect();
            format!("File: {}\n{}", c.filename, excerpt.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
