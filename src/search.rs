//! Capability search over the merged catalog
//!
//! Free-text intent maps to ranked API candidates through a normalized
//! token index with domain-synonym expansion. Scoring is token-overlap
//! ratio between the expanded query and entry token sets; ties break on
//! shorter description (more specific wins). An embedding layer, when a
//! query vector is supplied, contributes a secondary ranking signal and
//! degrades away silently otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::embedding::EmbeddingIndex;
use crate::error::Result;
use crate::schema::{Category, MultiStringValue, OperationKind};

/// Fixed result cap for search queries
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Description excerpt length in results
const EXCERPT_LEN: usize = 150;

/// Weights for keyword/embedding rank fusion
const KEYWORD_WEIGHT: f64 = 0.7;
const EMBEDDING_WEIGHT: f64 = 0.3;

/// Immutable many-to-many domain synonym table
///
/// Loaded once at index-build time and versioned alongside the catalog it
/// augments; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymTable {
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let entries: &[(&str, &[&str])] = &[
            ("add", &["set", "create", "insert", "append"]),
            ("set", &["add", "update", "modify", "assign"]),
            ("get", &["fetch", "retrieve", "find", "read"]),
            ("delete", &["remove", "clear", "erase"]),
            ("remove", &["delete", "clear"]),
            ("create", &["add", "new", "make"]),
            ("update", &["set", "modify", "change"]),
            ("find", &["search", "get", "lookup", "query"]),
            ("list", &["all", "iterate", "enumerate"]),
            ("gloss", &["translation", "meaning"]),
            ("definition", &["meaning", "description"]),
            ("sense", &["meaning", "definition"]),
            ("entry", &["headword", "lexeme", "word"]),
        ];
        let synonyms = entries
            .iter()
            .map(|(term, expansions)| {
                (
                    term.to_string(),
                    expansions.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { synonyms }
    }
}

impl SynonymTable {
    /// Load a table from a JSON file (`{"synonyms": {"term": [...]}}`)
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Expand a token set: every token plus all of its synonyms
    pub fn expand(&self, tokens: &BTreeSet<String>) -> BTreeSet<String> {
        let mut expanded = tokens.clone();
        for token in tokens {
            if let Some(expansions) = self.synonyms.get(token) {
                expanded.extend(expansions.iter().cloned());
            }
        }
        expanded
    }
}

/// What a search entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Entity,
    Method,
}

/// One indexed entity or method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    /// `Entity` or `Entity.method`
    pub id: String,

    /// Declaring entity
    pub entity: String,

    pub kind: EntryKind,
    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,

    pub description: String,

    /// Normalized tokens, synonym-expanded at build time
    pub tokens: BTreeSet<String>,
}

/// A ranked search result with enough metadata to judge relevance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub entity: String,
    pub kind: EntryKind,
    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,

    pub score: f64,
    pub description: String,
}

/// The built search index; immutable after construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchIndex {
    pub entries: Vec<SearchEntry>,
    pub synonyms: SynonymTable,
}

impl SearchIndex {
    /// Build the index from the catalog: one entry per entity plus one per
    /// method, tokenized and synonym-expanded
    pub fn build(catalog: &Catalog, synonyms: SynonymTable) -> Self {
        let mut entries = Vec::new();

        for entity in catalog.entities.values() {
            let entity_desc = MultiStringValue::from_raw(Some(&entity.description));
            entries.push(SearchEntry {
                id: entity.id.clone(),
                entity: entity.id.clone(),
                kind: EntryKind::Entity,
                category: entity.category,
                operation: None,
                description: entity_desc.as_text().to_string(),
                tokens: synonyms.expand(&index_tokens(&entity.id, entity_desc.as_text())),
            });

            for method in &entity.methods {
                let desc = MultiStringValue::from_raw(Some(&method.description));
                entries.push(SearchEntry {
                    id: format!("{}.{}", entity.id, method.name),
                    entity: entity.id.clone(),
                    kind: EntryKind::Method,
                    category: entity.category,
                    operation: Some(method.operation),
                    description: desc.as_text().to_string(),
                    tokens: synonyms.expand(&index_tokens(&method.name, desc.as_text())),
                });
            }
        }

        info!(entries = entries.len(), "search index build complete");
        Self { entries, synonyms }
    }

    /// Keyword-only search (no embedding signal)
    pub fn search(&self, query: &str, category: Option<Category>) -> Vec<SearchResult> {
        self.search_with_vector(query, None, None, category)
    }

    /// Search with an optional embedding signal.
    ///
    /// `query_vector` comes from the external embedding service at the
    /// interface boundary; when it (or the embedding index) is absent,
    /// scoring degrades to keyword-only.
    pub fn search_with_vector(
        &self,
        query: &str,
        embeddings: Option<&EmbeddingIndex>,
        query_vector: Option<&[f32]>,
        category: Option<Category>,
    ) -> Vec<SearchResult> {
        let query_tokens = self.synonyms.expand(&tokenize(query));
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<(SearchResult, usize)> = Vec::new();
        for entry in &self.entries {
            if let Some(filter) = category {
                if entry.category != filter {
                    continue;
                }
            }

            let overlap = query_tokens.intersection(&entry.tokens).count();
            if overlap == 0 {
                continue;
            }
            let keyword_score = overlap as f64 / query_tokens.len() as f64;

            let score = match (embeddings, query_vector) {
                (Some(index), Some(vector)) => match index.similarity(&entry.id, vector) {
                    Some(cosine) => {
                        KEYWORD_WEIGHT * keyword_score
                            + EMBEDDING_WEIGHT * f64::from(cosine.max(0.0))
                    }
                    None => keyword_score,
                },
                _ => keyword_score,
            };

            results.push((
                SearchResult {
                    id: entry.id.clone(),
                    entity: entry.entity.clone(),
                    kind: entry.kind,
                    category: entry.category,
                    operation: entry.operation,
                    score,
                    description: excerpt(&entry.description),
                },
                entry.description.len(),
            ));
        }

        results.sort_by(|(a, a_len), (b, b_len)| {
            OrderedFloat(b.score)
                .cmp(&OrderedFloat(a.score))
                .then_with(|| a_len.cmp(b_len))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(MAX_SEARCH_RESULTS);
        results.into_iter().map(|(r, _)| r).collect()
    }
}

/// Tokenize an identifier and description into a normalized token set
fn index_tokens(name: &str, description: &str) -> BTreeSet<String> {
    let mut tokens = tokenize(name);
    tokens.extend(tokenize(description));
    tokens
}

/// Lowercased alphanumeric tokens with camel-case splitting
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        for word in split_camel(raw) {
            if word.len() > 1 {
                tokens.insert(word.to_lowercase());
            }
        }
    }
    tokens
}

/// Split `CamelCase`/`mixedCase` identifiers at case transitions
fn split_camel(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in word.chars() {
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Char-boundary-safe excerpt of a description
fn excerpt(text: &str) -> String {
    if text.len() <= EXCERPT_LEN {
        return text.to_string();
    }
    let mut end = EXCERPT_LEN;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CatalogRecord, Method};

    fn search_catalog() -> Catalog {
        let wrapper = vec![
            CatalogRecord {
                id: "LexSenseOperations".into(),
                description: "Operations on senses".into(),
                methods: vec![Method {
                    name: "GetGloss".into(),
                    description: "Return the gloss text of a sense".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            CatalogRecord {
                id: "ScrBookOperations".into(),
                description: "Scripture book operations".into(),
                methods: vec![Method {
                    name: "CountChapters".into(),
                    description: "Number of chapters in a book".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        ];
        Catalog::build(wrapper, vec![]).unwrap()
    }

    #[test]
    fn test_tokenize_splits_camel_case() {
        let tokens = tokenize("GetGlossText");
        assert!(tokens.contains("get"));
        assert!(tokens.contains("gloss"));
        assert!(tokens.contains("text"));
    }

    #[test]
    fn test_keyword_search_ranks_overlap() {
        let index = SearchIndex::build(&search_catalog(), SynonymTable::default());
        let results = index.search("get gloss", None);
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "LexSenseOperations.GetGloss");
        assert_eq!(results[0].entity, "LexSenseOperations");
        assert_eq!(results[0].kind, EntryKind::Method);
    }

    #[test]
    fn test_synonym_expansion_matches_indirectly() {
        let index = SearchIndex::build(&search_catalog(), SynonymTable::default());

        // "translation" never appears literally; "gloss" expands to it
        // at build time, so the query term meets the entry's tokens
        let results = index.search("translation", None);
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "LexSenseOperations.GetGloss");

        // Entries with zero overlap stay out entirely
        assert!(results.iter().all(|r| !r.id.starts_with("ScrBook")));
    }

    #[test]
    fn test_category_filter() {
        let index = SearchIndex::build(&search_catalog(), SynonymTable::default());
        let results = index.search("book", Some(Category::Lexicon));
        assert!(results.is_empty());
        let results = index.search("book", Some(Category::Scripture));
        assert!(!results.is_empty());
    }

    #[test]
    fn test_tie_breaks_on_shorter_description() {
        let wrapper = vec![CatalogRecord {
            id: "Ops".into(),
            methods: vec![
                Method {
                    name: "FindEntryVerbose".into(),
                    description: "Find an entry using a much longer and less specific \
                                  description of the lookup behavior"
                        .into(),
                    ..Default::default()
                },
                Method {
                    name: "FindEntryTerse".into(),
                    description: "Find an entry".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }];
        let catalog = Catalog::build(wrapper, vec![]).unwrap();
        let index = SearchIndex::build(&catalog, SynonymTable::default());
        let results = index.search("find entry", None);
        assert!(results.len() >= 2);
        assert_eq!(results[0].id, "Ops.FindEntryTerse");
    }

    #[test]
    fn test_sentinel_description_indexes_as_empty() {
        let wrapper = vec![CatalogRecord {
            id: "Ops".into(),
            description: "***".into(),
            ..Default::default()
        }];
        let catalog = Catalog::build(wrapper, vec![]).unwrap();
        let index = SearchIndex::build(&catalog, SynonymTable::default());
        assert!(index.entries[0].description.is_empty());
    }

    #[test]
    fn test_result_cap() {
        let wrapper = vec![CatalogRecord {
            id: "Ops".into(),
            methods: (0..20)
                .map(|i| Method {
                    name: format!("GetEntry{}", i),
                    description: "Get an entry".into(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }];
        let catalog = Catalog::build(wrapper, vec![]).unwrap();
        let index = SearchIndex::build(&catalog, SynonymTable::default());
        let results = index.search("get entry", None);
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = SearchIndex::build(&search_catalog(), SynonymTable::default());
        assert!(index.search("", None).is_empty());
        assert!(index.search("   ", None).is_empty());
    }
}
