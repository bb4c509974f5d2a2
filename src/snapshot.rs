//! Immutable index snapshots and the registry that serves them
//!
//! A refresh runs the whole pipeline (catalog, mappings, graph, casting,
//! search) and materializes one [`ApiIndex`]. Snapshots are immutable once
//! built; the registry swaps its `current` pointer atomically on a
//! successful refresh, so readers see the old snapshot in full or the new
//! one in full, never a mix. A failed refresh leaves the previous snapshot
//! live. All file I/O happens here, during the build phase only.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::casting::CastingIndex;
use crate::catalog::Catalog;
use crate::embedding::EmbeddingIndex;
use crate::error::{LexMapError, Result};
use crate::graph::{PathResult, RelationGraph};
use crate::mapping::{build_mappings, validate_mappings, CoverageReport, Mapping};
use crate::schema::{CatalogRecord, Category, Entity, SCHEMA_VERSION};
use crate::search::{SearchIndex, SearchResult, SynonymTable};

/// Versioned snapshot artifact: `api_index_v{X.Y.Z}.json`
static SNAPSHOT_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^api_index_v(\d+\.\d+\.\d+)\.json$").unwrap());

/// Everything the pipeline produces for one catalog version.
///
/// Immutable after [`ApiIndex::build`]; queries are lock-free reads and may
/// run concurrently from any number of readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIndex {
    /// Catalog version this snapshot was built from
    pub version: String,

    pub schema_version: String,

    /// RFC 3339 build timestamp
    pub generated_at: String,

    pub catalog: Catalog,

    /// Mappings keyed by `Entity.method`
    pub mappings: BTreeMap<String, Mapping>,

    pub coverage: CoverageReport,

    pub graph: RelationGraph,

    pub casting: CastingIndex,

    pub search: SearchIndex,

    /// Optional similarity layer; lives in a binary sidecar, not the JSON
    #[serde(skip)]
    pub embeddings: Option<EmbeddingIndex>,
}

impl ApiIndex {
    /// Run the full pipeline over the two extraction passes.
    ///
    /// Each stage is a pure function of its inputs and fully materializes
    /// before the next begins. Malformed catalog input fails the whole
    /// refresh; everything downstream degrades per-item instead.
    pub fn build(
        version: &str,
        wrapper: Vec<CatalogRecord>,
        model: Vec<CatalogRecord>,
        synonyms: SynonymTable,
        embeddings: Option<EmbeddingIndex>,
    ) -> Result<Self> {
        info!(version, "refresh started");

        let catalog = Catalog::build(wrapper, model)?;
        let mappings = build_mappings(&catalog);
        let coverage = validate_mappings(&mappings, &catalog);
        let graph = RelationGraph::build(&catalog);
        let casting = CastingIndex::build(&catalog);
        let search = SearchIndex::build(&catalog, synonyms);

        info!(
            version,
            entities = catalog.entities.len(),
            mappings = mappings.len(),
            coverage = coverage.fraction(),
            "refresh complete"
        );

        Ok(Self {
            version: version.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            catalog,
            mappings,
            coverage,
            graph,
            casting,
            search,
            embeddings,
        })
    }

    /// Look up an entity; unknown identifiers are a query error
    pub fn entity(&self, id: &str) -> Result<&Entity> {
        self.catalog
            .entity(id)
            .ok_or_else(|| LexMapError::UnknownEntity {
                name: id.to_string(),
            })
    }

    /// Mapping record for `Entity.method`, when the classifier produced one
    pub fn mapping(&self, source_method: &str) -> Option<&Mapping> {
        self.mappings.get(source_method)
    }

    /// Shortest relationship path between two entities
    pub fn find_path(&self, source: &str, target: &str) -> Result<Option<PathResult>> {
        self.graph.find_path(&self.catalog, &self.casting, source, target)
    }

    /// Keyword search, with the embedding layer folded in when a query
    /// vector is supplied and the sidecar was loaded
    pub fn search(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        category: Option<Category>,
    ) -> Vec<SearchResult> {
        self.search
            .search_with_vector(query, self.embeddings.as_ref(), query_vector, category)
    }

    /// Write the snapshot artifacts into `dir` and return the JSON path.
    ///
    /// The JSON artifact is named by version; the embedding layer, when
    /// present, saves to a binary sidecar next to it.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("api_index_v{}.json", self.version));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;

        if let Some(embeddings) = &self.embeddings {
            embeddings.save(&dir.join(format!("embeddings_v{}.bin", self.version)))?;
        }

        info!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Load a snapshot artifact, picking up its embedding sidecar when one
    /// sits next to it
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut index: Self = serde_json::from_str(&raw)?;

        if index.schema_version != SCHEMA_VERSION {
            return Err(LexMapError::IndexArtifact {
                path: path.display().to_string(),
                message: format!(
                    "schema version {} is not {}",
                    index.schema_version, SCHEMA_VERSION
                ),
            });
        }

        if let Some(dir) = path.parent() {
            let sidecar = dir.join(format!("embeddings_v{}.bin", index.version));
            if sidecar.exists() {
                index.embeddings = EmbeddingIndex::load(&sidecar);
            }
        }

        Ok(index)
    }
}

/// Registry of coexisting snapshots, keyed by version string.
///
/// `current` is swapped atomically under the write lock on publish; queries
/// clone the `Arc` out and read without any further locking.
#[derive(Default)]
pub struct SnapshotRegistry {
    snapshots: RwLock<BTreeMap<String, Arc<ApiIndex>>>,
    current: RwLock<Option<Arc<ApiIndex>>>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built snapshot and make it current
    pub fn publish(&self, index: ApiIndex) -> Arc<ApiIndex> {
        let index = Arc::new(index);
        self.snapshots
            .write()
            .insert(index.version.clone(), Arc::clone(&index));
        *self.current.write() = Some(Arc::clone(&index));
        info!(version = %index.version, "snapshot published");
        index
    }

    /// Run a refresh and publish on success. On failure the error
    /// propagates and the previously published snapshot stays current.
    pub fn refresh(
        &self,
        version: &str,
        wrapper: Vec<CatalogRecord>,
        model: Vec<CatalogRecord>,
        synonyms: SynonymTable,
        embeddings: Option<EmbeddingIndex>,
    ) -> Result<Arc<ApiIndex>> {
        let index = ApiIndex::build(version, wrapper, model, synonyms, embeddings)?;
        Ok(self.publish(index))
    }

    /// The currently served snapshot, if any refresh has succeeded
    pub fn current(&self) -> Option<Arc<ApiIndex>> {
        self.current.read().clone()
    }

    /// The current snapshot, or [`LexMapError::NoSnapshot`]
    pub fn require_current(&self) -> Result<Arc<ApiIndex>> {
        self.current().ok_or(LexMapError::NoSnapshot)
    }

    /// A specific version, when still registered
    pub fn get(&self, version: &str) -> Option<Arc<ApiIndex>> {
        self.snapshots.read().get(version).cloned()
    }

    /// Registered versions in ascending order
    pub fn versions(&self) -> Vec<String> {
        self.snapshots.read().keys().cloned().collect()
    }

    /// Discover snapshot artifacts in a directory by filename pattern and
    /// load them all; the highest version becomes current.
    ///
    /// Unreadable or incompatible artifacts are skipped with a warning so
    /// one stale file cannot take the whole registry down.
    pub fn discover(dir: &Path) -> Result<Self> {
        let registry = Self::new();
        if !dir.exists() {
            return Ok(registry);
        }

        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(caps) = SNAPSHOT_FILE.captures(name) {
                found.push((caps[1].to_string(), entry.path()));
            }
        }
        found.sort_by_key(|(version, _)| version_key(version));

        for (_, path) in found {
            match ApiIndex::load(&path) {
                Ok(index) => {
                    registry.publish(index);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping snapshot artifact");
                }
            }
        }
        Ok(registry)
    }
}

/// Numeric sort key for `X.Y.Z` version strings
fn version_key(version: &str) -> (u64, u64, u64) {
    let mut parts = version.split('.').map(|p| p.parse().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Method, Property, RelationKind};
    use tempfile::tempdir;

    fn fixture_records() -> (Vec<CatalogRecord>, Vec<CatalogRecord>) {
        let wrapper = vec![CatalogRecord {
            id: "LexEntryOperations".into(),
            description: "Operations on dictionary entries".into(),
            methods: vec![Method {
                name: "GetSenses".into(),
                source: Some(
                    "def GetSenses(self, entry):\n    return entry.SensesOS\n".into(),
                ),
                ..Default::default()
            }],
            ..Default::default()
        }];
        let model = vec![
            CatalogRecord {
                id: "ILexEntry".into(),
                properties: vec![Property {
                    name: "SensesOS".into(),
                    relationship: Some(RelationKind::OwningSequence),
                    target_entity: Some("ILexSense".into()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            CatalogRecord {
                id: "ILexSense".into(),
                ..Default::default()
            },
        ];
        (wrapper, model)
    }

    fn fixture_index(version: &str) -> ApiIndex {
        let (wrapper, model) = fixture_records();
        ApiIndex::build(version, wrapper, model, SynonymTable::default(), None).unwrap()
    }

    #[test]
    fn test_build_runs_all_stages() {
        let index = fixture_index("1.0.0");
        assert_eq!(index.schema_version, SCHEMA_VERSION);
        assert_eq!(index.catalog.entities.len(), 3);
        assert!(index.mappings.contains_key("LexEntryOperations.GetSenses"));
        assert_eq!(index.coverage.total_refs, 1);
        assert!(index.graph.edge_count() >= 2);
        assert!(!index.search.entries.is_empty());
    }

    #[test]
    fn test_queries_against_snapshot() {
        let index = fixture_index("1.0.0");

        assert!(index.entity("ILexEntry").is_ok());
        assert!(matches!(
            index.entity("IMissing"),
            Err(LexMapError::UnknownEntity { .. })
        ));

        let path = index.find_path("ILexEntry", "ILexSense").unwrap().unwrap();
        assert_eq!(path.steps.len(), 1);

        let results = index.search("get senses", None, None);
        assert!(!results.is_empty());
    }

    #[test]
    fn test_publish_swaps_current() {
        let registry = SnapshotRegistry::new();
        assert!(registry.current().is_none());
        assert!(matches!(
            registry.require_current(),
            Err(LexMapError::NoSnapshot)
        ));

        registry.publish(fixture_index("1.0.0"));
        assert_eq!(registry.current().unwrap().version, "1.0.0");

        registry.publish(fixture_index("1.1.0"));
        assert_eq!(registry.current().unwrap().version, "1.1.0");

        // Older snapshot still addressable by version
        assert!(registry.get("1.0.0").is_some());
        assert_eq!(registry.versions(), vec!["1.0.0", "1.1.0"]);
    }

    #[test]
    fn test_failed_refresh_leaves_current_live() {
        let registry = SnapshotRegistry::new();
        let (wrapper, model) = fixture_records();
        registry
            .refresh("1.0.0", wrapper, model, SynonymTable::default(), None)
            .unwrap();

        let malformed = vec![CatalogRecord::default()];
        let err = registry
            .refresh("1.1.0", malformed, vec![], SynonymTable::default(), None)
            .unwrap_err();
        assert!(matches!(err, LexMapError::CatalogMalformed { .. }));

        let current = registry.current().unwrap();
        assert_eq!(current.version, "1.0.0");
        assert!(registry.get("1.1.0").is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let index = fixture_index("2.3.1");
        let path = index.save(dir.path()).unwrap();
        assert!(path.ends_with("api_index_v2.3.1.json"));

        let loaded = ApiIndex::load(&path).unwrap();
        assert_eq!(loaded.version, "2.3.1");
        assert_eq!(loaded.catalog.entities.len(), index.catalog.entities.len());
        assert_eq!(loaded.coverage, index.coverage);
    }

    #[test]
    fn test_discover_picks_highest_version() {
        let dir = tempdir().unwrap();
        fixture_index("1.2.0").save(dir.path()).unwrap();
        fixture_index("1.10.0").save(dir.path()).unwrap();
        fixture_index("1.9.0").save(dir.path()).unwrap();

        // Unrelated and malformed files are ignored
        fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        fs::write(dir.path().join("api_index_v9.9.9.json"), "{").unwrap();

        let registry = SnapshotRegistry::discover(dir.path()).unwrap();
        // Numeric version ordering: 1.10.0 > 1.9.0
        assert_eq!(registry.current().unwrap().version, "1.10.0");
        assert_eq!(registry.versions().len(), 3);
    }

    #[test]
    fn test_discover_empty_dir() {
        let dir = tempdir().unwrap();
        let registry = SnapshotRegistry::discover(dir.path()).unwrap();
        assert!(registry.current().is_none());

        let registry = SnapshotRegistry::discover(&dir.path().join("missing")).unwrap();
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_rebuild_is_pure_function_of_input() {
        let (wrapper, model) = fixture_records();
        let a = ApiIndex::build(
            "1.0.0",
            wrapper.clone(),
            model.clone(),
            SynonymTable::default(),
            None,
        )
        .unwrap();
        let b = ApiIndex::build("1.0.0", wrapper, model, SynonymTable::default(), None).unwrap();

        assert_eq!(a.graph.edges, b.graph.edges);
        assert_eq!(a.graph.edge_count(), b.graph.edge_count());
        assert_eq!(
            serde_json::to_string(&a.mappings).unwrap(),
            serde_json::to_string(&b.mappings).unwrap()
        );
    }
}
