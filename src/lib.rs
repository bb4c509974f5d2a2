//! LexMap: queryable knowledge base over a cross-layer API surface
//!
//! This library indexes a high-level scripting wrapper API together with
//! the compiled object model it delegates to, and answers three kinds of
//! questions about the combined surface:
//!
//! - **What exists?** Entity/method lookup over a merged catalog built
//!   from two extraction passes (wrapper source, model reflection data).
//! - **What does a wrapper method actually do?** A static call-mapping
//!   classifier walks each wrapper method body and records which
//!   model-layer operations it invokes, how parameters flow into them,
//!   and which transformations sit in between.
//! - **How do I get from one object type to another?** A relationship
//!   graph built from ownership/reference property metadata, with BFS
//!   pathfinding and synthesized traversal code for any discovered path.
//!
//! Free-text capability search runs over a synonym-expanded token index
//! with an optional embedding layer as a secondary ranking signal.
//!
//! # Example
//!
//! ```ignore
//! use lexmap_engine::{ApiIndex, SynonymTable};
//!
//! let index = ApiIndex::build("1.0.0", wrapper, model, SynonymTable::default(), None)?;
//!
//! let results = index.search("add a gloss to a sense", None, None);
//! let path = index.find_path("ILexEntry", "ILexExampleSentence")?;
//! ```
//!
//! A built [`ApiIndex`] is immutable; the [`SnapshotRegistry`] keeps
//! versioned snapshots side by side and swaps its current pointer
//! atomically on refresh.

pub mod ast;
pub mod casting;
pub mod catalog;
pub mod cli;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod mapping;
pub mod parsing;
pub mod schema;
pub mod search;
pub mod snapshot;

// Re-export commonly used types
pub use casting::{CastingIndex, PolymorphicInfo, PropertyCastInfo};
pub use catalog::{categorize, Catalog};
pub use cli::{Cli, OutputFormat};
pub use embedding::EmbeddingIndex;
pub use error::{LexMapError, Result};
pub use graph::{
    Edge, EdgeKind, PathResult, PathStep, RelationGraph, MAX_PATH_HOPS,
};
pub use mapping::{
    build_mappings, classify_method, validate_mappings, Classification, CoverageReport, Mapping,
    TargetCall, TargetKind, TransformKind, Transformation,
};
pub use schema::{
    variable_name, CatalogRecord, Category, Entity, Method, MultiStringValue, OperationKind,
    Origin, Param, Property, RelationKind, SCHEMA_VERSION,
};
pub use search::{
    tokenize, EntryKind, SearchEntry, SearchIndex, SearchResult, SynonymTable,
    MAX_SEARCH_RESULTS,
};
pub use snapshot::{ApiIndex, SnapshotRegistry};
