//! Core data model for the merged API catalog
//!
//! The catalog describes two layers of one API surface: the scripting
//! wrapper layer that callers program against (`Origin::Wrapper`) and the
//! compiled object model it delegates to (`Origin::Model`). Records from
//! both extraction passes are normalized into the types here and merged by
//! entity identifier.

use serde::{Deserialize, Serialize};

/// Current schema version for output stability
/// 1.0 - Initial unified catalog schema
/// 1.1 - Added parents (interface hierarchy) and method operation kinds
pub const SCHEMA_VERSION: &str = "1.1";

/// Sentinel string the source object model stores for "empty" multi-lingual
/// fields instead of a true null or empty string.
pub const EMPTY_SENTINEL: &str = "***";

/// Which extraction pass a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// High-level scripting wrapper layer
    Wrapper,
    /// Compiled object-model layer
    Model,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrapper => "wrapper",
            Self::Model => "model",
        }
    }
}

/// Semantic category taxonomy, assigned by namespace and name-pattern rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lexicon,
    Grammar,
    Texts,
    Wordform,
    Discourse,
    Notebook,
    Scripture,
    Reversal,
    WritingSystem,
    Factory,
    Repository,
    System,
    Internal,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexicon => "lexicon",
            Self::Grammar => "grammar",
            Self::Texts => "texts",
            Self::Wordform => "wordform",
            Self::Discourse => "discourse",
            Self::Notebook => "notebook",
            Self::Scripture => "scripture",
            Self::Reversal => "reversal",
            Self::WritingSystem => "writing_system",
            Self::Factory => "factory",
            Self::Repository => "repository",
            Self::System => "system",
            Self::Internal => "internal",
            Self::General => "general",
        }
    }

    /// Parse a category name as it appears in catalog input records
    pub fn parse(s: &str) -> Option<Self> {
        let cat = match s {
            "lexicon" => Self::Lexicon,
            "grammar" => Self::Grammar,
            "texts" => Self::Texts,
            "wordform" => Self::Wordform,
            "discourse" => Self::Discourse,
            "notebook" => Self::Notebook,
            "scripture" => Self::Scripture,
            "reversal" => Self::Reversal,
            "writing_system" => Self::WritingSystem,
            "factory" => Self::Factory,
            "repository" => Self::Repository,
            "system" => Self::System,
            "internal" => Self::Internal,
            "general" => Self::General,
            _ => return None,
        };
        Some(cat)
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::General
    }
}

/// Operation kind classified from a method name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    Iterate,
    Reorder,
    Merge,
    #[default]
    General,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Iterate => "iterate",
            Self::Reorder => "reorder",
            Self::Merge => "merge",
            Self::General => "general",
        }
    }

    /// Classify an operation from a method name
    pub fn classify(method_name: &str) -> Self {
        let name = method_name.to_lowercase();
        if ["create", "add", "new"].iter().any(|p| name.contains(p)) {
            return Self::Create;
        }
        if ["delete", "remove"].iter().any(|p| name.contains(p)) {
            return Self::Delete;
        }
        if ["set", "update", "modify", "change"]
            .iter()
            .any(|p| name.contains(p))
        {
            return Self::Update;
        }
        if ["get", "find", "lookup", "search"]
            .iter()
            .any(|p| name.contains(p))
        {
            return Self::Read;
        }
        if ["iterate", "enumerate"].iter().any(|p| name.contains(p)) {
            return Self::Iterate;
        }
        if ["move", "reorder"].iter().any(|p| name.contains(p)) {
            return Self::Reorder;
        }
        if name.contains("merge") {
            return Self::Merge;
        }
        Self::General
    }
}

/// Relationship kind declared by an object-model property
///
/// The two-letter codes mirror the property-name suffixes used throughout
/// the object model (`SensesOS`, `AnalysesOC`, `MorphRA`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Owning, single target (OA suffix)
    OwningAtomic,
    /// Owning, ordered collection (OS suffix)
    OwningSequence,
    /// Owning, unordered collection (OC suffix)
    OwningCollection,
    /// Non-owning, single target (RA suffix)
    ReferenceAtomic,
    /// Non-owning, ordered collection (RS suffix)
    ReferenceSequence,
    /// Non-owning, unordered collection (RC suffix)
    ReferenceCollection,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwningAtomic => "owning_atomic",
            Self::OwningSequence => "owning_sequence",
            Self::OwningCollection => "owning_collection",
            Self::ReferenceAtomic => "reference_atomic",
            Self::ReferenceSequence => "reference_sequence",
            Self::ReferenceCollection => "reference_collection",
        }
    }

    /// Target lifetime is bound to the holder
    pub fn is_owning(&self) -> bool {
        matches!(
            self,
            Self::OwningAtomic | Self::OwningSequence | Self::OwningCollection
        )
    }

    /// Ordered or unordered multi-valued kinds iterate; atomic kinds access directly
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::OwningAtomic | Self::ReferenceAtomic)
    }

    /// Infer the relationship kind from a conventional property-name suffix
    pub fn from_suffix(property_name: &str) -> Option<Self> {
        let kind = match property_name {
            n if n.ends_with("OA") => Self::OwningAtomic,
            n if n.ends_with("OS") => Self::OwningSequence,
            n if n.ends_with("OC") => Self::OwningCollection,
            n if n.ends_with("RA") => Self::ReferenceAtomic,
            n if n.ends_with("RS") => Self::ReferenceSequence,
            n if n.ends_with("RC") => Self::ReferenceCollection,
            _ => return None,
        };
        Some(kind)
    }
}

/// Tri-state value of a multi-lingual string field
///
/// The source object model stores [`EMPTY_SENTINEL`] instead of a true
/// empty value. Consumers in this crate treat the sentinel as empty, but
/// the distinction is preserved for round-tripping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "text")]
pub enum MultiStringValue {
    Absent,
    EmptySentinel,
    Populated(String),
}

impl MultiStringValue {
    /// Classify a raw field value from the object model
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Absent,
            Some(s) if s == EMPTY_SENTINEL || s.is_empty() => {
                if s == EMPTY_SENTINEL {
                    Self::EmptySentinel
                } else {
                    Self::Absent
                }
            }
            Some(s) => Self::Populated(s.to_string()),
        }
    }

    /// Effective text, with the sentinel collapsed to empty
    pub fn as_text(&self) -> &str {
        match self {
            Self::Populated(s) => s,
            _ => "",
        }
    }

    /// True for both `Absent` and `EmptySentinel`
    pub fn is_empty(&self) -> bool {
        !matches!(self, Self::Populated(_))
    }
}

/// A method parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,

    /// Declared default literal, verbatim (e.g. `None`, `""`, `0`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A method on an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Operation kind classified from the name
    #[serde(default = "default_operation")]
    pub operation: OperationKind,

    /// Wrapper-layer method body source, when the extraction pass captured it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_operation() -> OperationKind {
    OperationKind::General
}

/// A property on an entity
///
/// Properties with a relationship kind link object types; plain data
/// properties have `relationship: None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub declared_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationKind>,

    /// Identifier of the entity this property points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
}

/// A merged catalog entity: one object type with its methods and properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub origin: Origin,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    pub category: Category,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<Method>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,

    /// Interfaces this entity extends (model layer only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl Entity {
    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Raw catalog input record, one per entity per extraction pass (§6 schema)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,

    #[serde(default)]
    pub namespace: String,

    /// Pre-assigned category name; recomputed when absent or unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub methods: Vec<Method>,

    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(default)]
    pub parents: Vec<String>,
}

/// Derive the conventional variable name for an entity identifier
///
/// `ILexEntry` becomes `lexentry`: the interface `I` prefix is stripped
/// and the remainder lowercased. Used by access-pattern synthesis.
pub fn variable_name(entity_id: &str) -> String {
    let stripped = match entity_id.strip_prefix('I') {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_uppercase()) => rest,
        _ => entity_id,
    };
    stripped.to_lowercase()
}
