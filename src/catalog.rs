//! Entity catalog: merge of the wrapper and model extraction passes
//!
//! The catalog is the leaf data of the pipeline. Records from both origin
//! layers are normalized, categorized, and merged by identifier into one
//! immutable record set; every later stage resolves names against it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LexMapError, Result};
use crate::schema::{CatalogRecord, Category, Entity, OperationKind, Origin};

/// The merged entity catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Entities keyed by identifier (deterministic iteration order)
    pub entities: BTreeMap<String, Entity>,
}

impl Catalog {
    /// Build the catalog from the two extraction passes.
    ///
    /// Wrapper records load first; a model record with the same identifier
    /// merges into the existing entity (union of methods and properties,
    /// first nonempty description wins, origin of the first pass kept).
    /// A record with an empty identifier is malformed input and fails the
    /// whole refresh cycle.
    pub fn build(wrapper: Vec<CatalogRecord>, model: Vec<CatalogRecord>) -> Result<Self> {
        let mut catalog = Self::default();
        catalog.ingest(wrapper, Origin::Wrapper)?;
        catalog.ingest(model, Origin::Model)?;

        info!(
            entities = catalog.entities.len(),
            "catalog build complete"
        );
        Ok(catalog)
    }

    fn ingest(&mut self, records: Vec<CatalogRecord>, origin: Origin) -> Result<()> {
        for record in records {
            if record.id.trim().is_empty() {
                return Err(LexMapError::CatalogMalformed {
                    message: format!("{} record with empty identifier", origin.as_str()),
                });
            }
            for prop in &record.properties {
                if prop.relationship.is_some()
                    && prop.target_entity.as_deref().unwrap_or("").is_empty()
                {
                    return Err(LexMapError::CatalogMalformed {
                        message: format!(
                            "property {}.{} declares a relationship without a target entity",
                            record.id, prop.name
                        ),
                    });
                }
            }

            let category = record
                .category
                .as_deref()
                .and_then(Category::parse)
                .unwrap_or_else(|| categorize(&record.id, &record.namespace));

            let mut methods = record.methods;
            for method in &mut methods {
                method.operation = OperationKind::classify(&method.name);
            }

            match self.entities.get_mut(&record.id) {
                Some(existing) => {
                    debug!(id = %record.id, "merging record across layers");
                    if existing.description.is_empty() {
                        existing.description = record.description;
                    }
                    if existing.namespace.is_empty() {
                        existing.namespace = record.namespace;
                    }
                    let known: BTreeSet<String> =
                        existing.methods.iter().map(|m| m.name.clone()).collect();
                    existing
                        .methods
                        .extend(methods.into_iter().filter(|m| !known.contains(&m.name)));
                    let known: BTreeSet<String> =
                        existing.properties.iter().map(|p| p.name.clone()).collect();
                    existing.properties.extend(
                        record
                            .properties
                            .into_iter()
                            .filter(|p| !known.contains(&p.name)),
                    );
                    if existing.parents.is_empty() {
                        existing.parents = record.parents;
                    }
                }
                None => {
                    self.entities.insert(
                        record.id.clone(),
                        Entity {
                            id: record.id,
                            origin,
                            namespace: record.namespace,
                            category,
                            description: record.description,
                            methods,
                            properties: record.properties,
                            parents: record.parents,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Look up an entity by identifier
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Entities belonging to one origin layer
    pub fn entities_of(&self, origin: Origin) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.origin == origin)
    }

    /// Model-layer entities declaring a property with the given name,
    /// in identifier order
    pub fn property_owners(&self, property: &str) -> Vec<&Entity> {
        self.entities_of(Origin::Model)
            .filter(|e| e.property(property).is_some())
            .collect()
    }

    /// Model-layer entities declaring a method with the given name,
    /// in identifier order
    pub fn method_owners(&self, method: &str) -> Vec<&Entity> {
        self.entities_of(Origin::Model)
            .filter(|e| e.method(method).is_some())
            .collect()
    }

    /// All distinct categories present, with entity counts
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for entity in self.entities.values() {
            *counts.entry(entity.category).or_insert(0) += 1;
        }
        counts
    }
}

/// Namespace-prefix categorization rules, checked before name patterns
const NAMESPACE_RULES: &[(&str, Category)] = &[
    ("Core.Text", Category::Texts),
    ("Core.WritingSystems", Category::WritingSystem),
    ("Core.SpellChecking", Category::System),
    ("Core.Scripture", Category::Scripture),
    ("Core.Phonology", Category::Grammar),
    ("DomainServices.DataMigration", Category::System),
    ("DomainServices.BackupRestore", Category::System),
    ("Infrastructure", Category::System),
    ("Utils", Category::System),
    ("Tools", Category::System),
];

/// Name-prefix rules: entity identifiers follow the object model's module
/// prefixes, with or without the interface `I`
const PREFIX_RULES: &[(&str, Category)] = &[
    ("Mo", Category::Grammar),
    ("Ph", Category::Grammar),
    ("Fs", Category::Grammar),
    ("Wfi", Category::Wordform),
    ("Ds", Category::Discourse),
    ("Rn", Category::Notebook),
    ("Scr", Category::Scripture),
    ("St", Category::Texts),
    ("Text", Category::Texts),
    ("Lex", Category::Lexicon),
    ("Reversal", Category::Reversal),
];

/// Assign the semantic category for an entity
///
/// Order: namespace rules, name prefixes, semantic name substrings,
/// compiler-generated detection, factory/repository suffixes, `general`.
pub fn categorize(id: &str, namespace: &str) -> Category {
    for (pattern, category) in NAMESPACE_RULES {
        if namespace.contains(pattern) {
            return *category;
        }
    }

    let bare = id.strip_prefix('I').unwrap_or(id);
    for (prefix, category) in PREFIX_RULES {
        if bare.starts_with(prefix) {
            return *category;
        }
    }

    let lower = id.to_lowercase();
    if ["sense", "entry", "lexeme", "headword"]
        .iter()
        .any(|s| lower.contains(s))
    {
        return Category::Lexicon;
    }
    if ["paragraph", "footnote", "interlin", "baseline"]
        .iter()
        .any(|s| lower.contains(s))
    {
        return Category::Texts;
    }
    if ["wordform", "concordance"].iter().any(|s| lower.contains(s)) {
        return Category::Wordform;
    }

    if id.contains("<>c__") || id.starts_with("Class_") {
        return Category::Internal;
    }

    if id.contains("Factory") {
        return Category::Factory;
    }
    if id.contains("Repository") {
        return Category::Repository;
    }

    Category::General
}
