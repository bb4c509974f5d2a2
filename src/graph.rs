//! Relationship graph over object-model entities
//!
//! Edges come from property relationship metadata: every owning property
//! contributes an `owns` edge plus its `owned_by` inverse, every reference
//! property a single `references` edge. Pathfinding is breadth-first with
//! a fixed hop cap; ties between equal-length paths break on insertion
//! order, so rebuilding from identical input reproduces identical paths.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::casting::CastingIndex;
use crate::catalog::Catalog;
use crate::error::{LexMapError, Result};
use crate::schema::{variable_name, RelationKind};

/// Maximum hops for a path query
pub const MAX_PATH_HOPS: usize = 5;

/// Curated high-value entity pairs, precomputed at build time.
/// Covers the dominant navigation workflows of the object model.
const COMMON_PAIRS: &[(&str, &str)] = &[
    // Lexicon
    ("ILexEntry", "ILexSense"),
    ("ILexEntry", "ILexExampleSentence"),
    ("ILexEntry", "IMoForm"),
    ("ILexSense", "ILexExampleSentence"),
    ("ILexSense", "ICmSemanticDomain"),
    ("ILexDb", "ILexEntry"),
    ("ILexEntry", "ILexEtymology"),
    ("ILexEntry", "ILexPronunciation"),
    ("ILexSense", "ICmPicture"),
    // Text and interlinear
    ("IText", "IStText"),
    ("IStText", "IStTxtPara"),
    ("IStTxtPara", "ISegment"),
    ("IText", "ISegment"),
    // Wordform analysis
    ("IWfiWordform", "IWfiAnalysis"),
    ("IWfiAnalysis", "IWfiGloss"),
    ("IWfiAnalysis", "IWfiMorphBundle"),
    ("IWfiMorphBundle", "ILexSense"),
    ("IWfiWordform", "IWfiGloss"),
    // Reversal and lists
    ("IReversalIndex", "IReversalIndexEntry"),
    ("IReversalIndexEntry", "ILexSense"),
    ("ICmPossibilityList", "ICmPossibility"),
];

/// Edge direction/ownership kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Owns,
    OwnedBy,
    References,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owns => "owns",
            Self::OwnedBy => "owned_by",
            Self::References => "references",
        }
    }
}

/// One directed relationship edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,

    /// Originating property name
    pub via: String,

    /// Relationship kind of the originating property
    pub relation: RelationKind,

    /// Synthesized access expression, attached to the forward direction only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_pattern: Option<String>,
}

/// One step of a discovered path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub from: String,
    pub to: String,
    pub via: String,
    pub kind: EdgeKind,
    pub access_pattern: String,
}

/// A resolved path query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub source: String,
    pub target: String,
    pub steps: Vec<PathStep>,

    /// Ready-to-adapt traversal snippet for the whole path
    pub code_pattern: String,

    /// Cast warnings: a step's static type is a strict ancestor of the
    /// interfaces actually defining the next step's property
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cast_warnings: Vec<String>,
}

/// Directed relationship graph with precomputed common paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationGraph {
    /// Adjacency lists in insertion order, keyed by entity identifier
    pub edges: BTreeMap<String, Vec<Edge>>,

    /// Precomputed paths keyed by "Source -> Target"
    pub common_paths: BTreeMap<String, Vec<PathStep>>,
}

impl RelationGraph {
    /// Build the graph from catalog property metadata
    pub fn build(catalog: &Catalog) -> Self {
        let mut graph = Self::default();

        for entity in catalog.entities.values() {
            for property in &entity.properties {
                let Some(relation) = property.relationship else {
                    continue;
                };
                let Some(target) = property.target_entity.as_deref() else {
                    continue;
                };

                let access = synthesize_access(&entity.id, target, &property.name, relation);
                if relation.is_owning() {
                    graph.push_edge(Edge {
                        source: entity.id.clone(),
                        target: target.to_string(),
                        kind: EdgeKind::Owns,
                        via: property.name.clone(),
                        relation,
                        access_pattern: Some(access),
                    });
                    graph.push_edge(Edge {
                        source: target.to_string(),
                        target: entity.id.clone(),
                        kind: EdgeKind::OwnedBy,
                        via: property.name.clone(),
                        relation,
                        access_pattern: None,
                    });
                } else {
                    graph.push_edge(Edge {
                        source: entity.id.clone(),
                        target: target.to_string(),
                        kind: EdgeKind::References,
                        via: property.name.clone(),
                        relation,
                        access_pattern: Some(access),
                    });
                }
            }
        }

        graph.common_paths = graph.precompute_common_paths();
        info!(
            nodes = graph.edges.len(),
            edges = graph.edge_count(),
            precomputed = graph.common_paths.len(),
            "relationship graph build complete"
        );
        graph
    }

    fn push_edge(&mut self, edge: Edge) {
        self.edges.entry(edge.source.clone()).or_default().push(edge);
    }

    /// Total directed edge count, inverses included
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Outgoing edges of one entity, in insertion order
    pub fn edges_of(&self, entity: &str) -> &[Edge] {
        self.edges.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find the shortest path between two entities.
    ///
    /// Returns `Ok(None)` when no path exists within [`MAX_PATH_HOPS`]
    /// (a normal outcome, not an error). Unknown identifiers are an error.
    /// Traversal follows `owns` and `references` edges; `owned_by` inverses
    /// carry no synthesizable access expression and are navigation-only
    /// metadata. The precomputed table is consulted first; cache misses run
    /// the same BFS.
    pub fn find_path(
        &self,
        catalog: &Catalog,
        casting: &CastingIndex,
        source: &str,
        target: &str,
    ) -> Result<Option<PathResult>> {
        if catalog.entity(source).is_none() {
            return Err(LexMapError::UnknownEntity {
                name: source.to_string(),
            });
        }
        if catalog.entity(target).is_none() {
            return Err(LexMapError::UnknownEntity {
                name: target.to_string(),
            });
        }

        let key = path_key(source, target);
        let steps = match self.common_paths.get(&key) {
            Some(steps) => Some(steps.clone()),
            None => self.bfs(source, target),
        };

        Ok(steps.map(|steps| {
            let cast_warnings = casting.warnings_for(&steps);
            PathResult {
                source: source.to_string(),
                target: target.to_string(),
                code_pattern: synthesize_code_pattern(source, &steps),
                steps,
                cast_warnings,
            }
        }))
    }

    /// Breadth-first search; a fresh visited set per query keeps the graph
    /// immutable and queries independently restartable
    fn bfs(&self, source: &str, target: &str) -> Option<Vec<PathStep>> {
        if source == target {
            return Some(Vec::new());
        }

        let mut queue: VecDeque<(&str, Vec<PathStep>)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        queue.push_back((source, Vec::new()));
        visited.insert(source);

        while let Some((current, path)) = queue.pop_front() {
            if path.len() >= MAX_PATH_HOPS {
                continue;
            }

            for edge in self.edges_of(current) {
                if edge.kind == EdgeKind::OwnedBy {
                    continue;
                }

                let step = PathStep {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    via: edge.via.clone(),
                    kind: edge.kind,
                    access_pattern: edge
                        .access_pattern
                        .clone()
                        .unwrap_or_else(|| synthesize_access(
                            &edge.source,
                            &edge.target,
                            &edge.via,
                            edge.relation,
                        )),
                };

                if edge.target == target {
                    let mut found = path.clone();
                    found.push(step);
                    return Some(found);
                }

                if visited.insert(edge.target.as_str()) {
                    let mut next = path.clone();
                    next.push(step);
                    queue.push_back((edge.target.as_str(), next));
                }
            }
        }

        None
    }

    fn precompute_common_paths(&self) -> BTreeMap<String, Vec<PathStep>> {
        let mut paths = BTreeMap::new();
        for (source, target) in COMMON_PAIRS {
            if let Some(steps) = self.bfs(source, target) {
                if !steps.is_empty() {
                    paths.insert(path_key(source, target), steps);
                }
            }
        }
        paths
    }
}

fn path_key(source: &str, target: &str) -> String {
    format!("{} -> {}", source, target)
}

/// Synthesize the access expression for one relationship edge.
///
/// Ordered and unordered kinds iterate; atomic kinds access directly.
fn synthesize_access(source: &str, target: &str, via: &str, relation: RelationKind) -> String {
    let owner_var = variable_name(source);
    if relation.is_collection() {
        format!("for {} in {}.{}:", variable_name(target), owner_var, via)
    } else {
        format!("{}.{}", owner_var, via)
    }
}

/// Synthesize a full traversal snippet for a discovered path
fn synthesize_code_pattern(source: &str, steps: &[PathStep]) -> String {
    if steps.is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    let mut indent = String::new();
    let mut current_var = variable_name(source);

    for step in steps {
        let next_var = variable_name(&step.to);
        let is_collection = step.access_pattern.starts_with("for ");
        if is_collection {
            lines.push(format!(
                "{}for {} in {}.{}:",
                indent, next_var, current_var, step.via
            ));
            indent.push_str("    ");
        } else {
            lines.push(format!("{}{} = {}.{}", indent, next_var, current_var, step.via));
        }
        current_var = next_var;
    }

    lines.push(format!("{}# work with {}", indent, current_var));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casting::CastingIndex;
    use crate::schema::{CatalogRecord, Property};

    fn prop(name: &str, relation: RelationKind, target: &str) -> Property {
        Property {
            name: name.into(),
            relationship: Some(relation),
            target_entity: Some(target.into()),
            ..Default::default()
        }
    }

    fn lexicon_catalog() -> Catalog {
        let model = vec![
            CatalogRecord {
                id: "ILexEntry".into(),
                properties: vec![
                    prop("SensesOS", RelationKind::OwningSequence, "ILexSense"),
                    prop("MorphoSyntaxRA", RelationKind::ReferenceAtomic, "IMoForm"),
                ],
                ..Default::default()
            },
            CatalogRecord {
                id: "ILexSense".into(),
                properties: vec![prop(
                    "ExamplesOS",
                    RelationKind::OwningSequence,
                    "ILexExampleSentence",
                )],
                ..Default::default()
            },
            CatalogRecord {
                id: "ILexExampleSentence".into(),
                ..Default::default()
            },
            CatalogRecord {
                id: "IMoForm".into(),
                ..Default::default()
            },
            CatalogRecord {
                id: "IIsolated".into(),
                ..Default::default()
            },
        ];
        Catalog::build(vec![], model).unwrap()
    }

    fn build(catalog: &Catalog) -> (RelationGraph, CastingIndex) {
        (RelationGraph::build(catalog), CastingIndex::build(catalog))
    }

    #[test]
    fn test_owns_edges_have_inverses() {
        let catalog = lexicon_catalog();
        let (graph, _) = build(&catalog);

        for edges in graph.edges.values() {
            for edge in edges {
                if edge.kind == EdgeKind::Owns {
                    let inverse = graph
                        .edges_of(&edge.target)
                        .iter()
                        .find(|e| {
                            e.kind == EdgeKind::OwnedBy
                                && e.target == edge.source
                                && e.via == edge.via
                        });
                    assert!(
                        inverse.is_some(),
                        "owns edge {}->{} via {} lacks inverse",
                        edge.source,
                        edge.target,
                        edge.via
                    );
                }
            }
        }
    }

    #[test]
    fn test_reference_edge_has_no_inverse() {
        let catalog = lexicon_catalog();
        let (graph, _) = build(&catalog);
        assert!(graph
            .edges_of("IMoForm")
            .iter()
            .all(|e| e.kind != EdgeKind::OwnedBy));
    }

    #[test]
    fn test_two_hop_path_with_iteration_patterns() {
        let catalog = lexicon_catalog();
        let (graph, casting) = build(&catalog);

        let result = graph
            .find_path(&catalog, &casting, "ILexEntry", "ILexExampleSentence")
            .unwrap()
            .expect("path should exist");

        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].via, "SensesOS");
        assert_eq!(result.steps[1].via, "ExamplesOS");
        assert_eq!(
            result.steps[0].access_pattern,
            "for lexsense in lexentry.SensesOS:"
        );
        assert_eq!(
            result.steps[1].access_pattern,
            "for lexexamplesentence in lexsense.ExamplesOS:"
        );
        assert!(result.code_pattern.contains("for lexsense in lexentry.SensesOS:"));
        assert!(result
            .code_pattern
            .ends_with("# work with lexexamplesentence"));
    }

    #[test]
    fn test_self_path_is_zero_length() {
        let catalog = lexicon_catalog();
        let (graph, casting) = build(&catalog);
        let result = graph
            .find_path(&catalog, &casting, "ILexEntry", "ILexEntry")
            .unwrap()
            .expect("self path");
        assert!(result.steps.is_empty());
        assert!(result.code_pattern.is_empty());
    }

    #[test]
    fn test_no_path_is_not_an_error() {
        let catalog = lexicon_catalog();
        let (graph, casting) = build(&catalog);
        let result = graph
            .find_path(&catalog, &casting, "ILexEntry", "IIsolated")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        let catalog = lexicon_catalog();
        let (graph, casting) = build(&catalog);
        let err = graph
            .find_path(&catalog, &casting, "ILexEntry", "INoSuch")
            .unwrap_err();
        assert!(matches!(err, LexMapError::UnknownEntity { .. }));
    }

    #[test]
    fn test_reference_atomic_access_is_direct() {
        let catalog = lexicon_catalog();
        let (graph, casting) = build(&catalog);
        let result = graph
            .find_path(&catalog, &casting, "ILexEntry", "IMoForm")
            .unwrap()
            .expect("reference path");
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].kind, EdgeKind::References);
        assert_eq!(result.steps[0].access_pattern, "lexentry.MorphoSyntaxRA");
    }

    #[test]
    fn test_parallel_edges_retained() {
        let model = vec![
            CatalogRecord {
                id: "ILexEntry".into(),
                properties: vec![
                    prop("SensesOS", RelationKind::OwningSequence, "ILexSense"),
                    prop("HiddenSensesOS", RelationKind::OwningSequence, "ILexSense"),
                ],
                ..Default::default()
            },
            CatalogRecord {
                id: "ILexSense".into(),
                ..Default::default()
            },
        ];
        let catalog = Catalog::build(vec![], model).unwrap();
        let (graph, casting) = build(&catalog);

        let owns: Vec<&Edge> = graph
            .edges_of("ILexEntry")
            .iter()
            .filter(|e| e.kind == EdgeKind::Owns)
            .collect();
        assert_eq!(owns.len(), 2);

        // Insertion order decides the tie: first-declared property wins
        let result = graph
            .find_path(&catalog, &casting, "ILexEntry", "ILexSense")
            .unwrap()
            .unwrap();
        assert_eq!(result.steps[0].via, "SensesOS");
    }

    #[test]
    fn test_precomputed_common_paths() {
        let catalog = lexicon_catalog();
        let (graph, _) = build(&catalog);
        let steps = graph
            .common_paths
            .get("ILexEntry -> ILexExampleSentence")
            .expect("precomputed path");
        assert_eq!(steps.len(), 2);
        // Pairs absent from the catalog are simply not in the table
        assert!(!graph.common_paths.contains_key("IText -> ISegment"));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let catalog = lexicon_catalog();
        let a = RelationGraph::build(&catalog);
        let b = RelationGraph::build(&catalog);
        assert_eq!(a.edge_count(), b.edge_count());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
