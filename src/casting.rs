//! Capability-requirement (casting) index
//!
//! The object model hands back base-typed objects from polymorphic
//! properties; derived interfaces declare members the base lacks. Instead
//! of runtime type-tag inspection, each property carries the minimal set
//! of interfaces it is actually defined on, and path queries surface a
//! warning whenever a traversal's static type is a strict ancestor of that
//! set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::graph::PathStep;

/// Casting requirements for one property name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyCastInfo {
    /// Interfaces that define the property
    pub defined_on: Vec<String>,

    /// Base interfaces that do NOT define it; an object statically typed
    /// as one of these must be cast before the property is accessible
    pub requires_cast_from: Vec<String>,
}

/// Derived interfaces of a base type and the members unique to them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolymorphicInfo {
    pub derived: Vec<String>,

    /// Properties declared on derived interfaces but not on the base
    pub unique_properties: BTreeMap<String, Vec<String>>,
}

/// Index of cast requirements derived from the interface hierarchy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CastingIndex {
    /// Property name -> cast requirements
    pub properties: BTreeMap<String, PropertyCastInfo>,

    /// Base entity -> polymorphic descendants with unique properties
    pub polymorphic: BTreeMap<String, PolymorphicInfo>,
}

impl CastingIndex {
    /// Build the index from entity `parents` declarations
    pub fn build(catalog: &Catalog) -> Self {
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut own_properties: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut property_definers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for entity in catalog.entities.values() {
            for parent in &entity.parents {
                children.entry(parent.as_str()).or_default().push(&entity.id);
            }
            let props: BTreeSet<&str> =
                entity.properties.iter().map(|p| p.name.as_str()).collect();
            for prop in props.iter().copied() {
                property_definers
                    .entry(prop)
                    .or_default()
                    .insert(entity.id.as_str());
            }
            own_properties.insert(entity.id.as_str(), props);
        }

        let mut index = Self::default();

        for (prop, definers) in &property_definers {
            let mut requires_cast_from = BTreeSet::new();
            for definer in definers {
                let Some(entity) = catalog.entity(definer) else {
                    continue;
                };
                for parent in &entity.parents {
                    if !definers.contains(parent.as_str()) {
                        requires_cast_from.insert(parent.clone());
                    }
                }
            }
            if !requires_cast_from.is_empty() {
                index.properties.insert(
                    prop.to_string(),
                    PropertyCastInfo {
                        defined_on: definers.iter().map(|s| s.to_string()).collect(),
                        requires_cast_from: requires_cast_from.into_iter().collect(),
                    },
                );
            }
        }

        for (base, derived) in &children {
            let base_props = own_properties.get(base).cloned().unwrap_or_default();
            let mut unique_properties = BTreeMap::new();
            for child in derived {
                let child_props = own_properties.get(child).cloned().unwrap_or_default();
                let unique: Vec<String> = child_props
                    .difference(&base_props)
                    .map(|s| s.to_string())
                    .collect();
                if !unique.is_empty() {
                    unique_properties.insert(child.to_string(), unique);
                }
            }
            if !unique_properties.is_empty() {
                index.polymorphic.insert(
                    base.to_string(),
                    PolymorphicInfo {
                        derived: derived.iter().map(|s| s.to_string()).collect(),
                        unique_properties,
                    },
                );
            }
        }

        info!(
            properties = index.properties.len(),
            polymorphic_bases = index.polymorphic.len(),
            "casting index build complete"
        );
        index
    }

    /// Cast requirements for a property, if any exist
    pub fn property_info(&self, property: &str) -> Option<&PropertyCastInfo> {
        self.properties.get(property)
    }

    /// Warnings for a traversal: a step whose static result type is a base
    /// with derived-only properties gets flagged, since follow-up access
    /// may need a cast
    pub fn warnings_for(&self, steps: &[PathStep]) -> Vec<String> {
        let mut warnings = Vec::new();
        for step in steps {
            if let Some(info) = self.polymorphic.get(&step.to) {
                let derived: Vec<&str> = info
                    .unique_properties
                    .keys()
                    .map(String::as_str)
                    .collect();
                warnings.push(format!(
                    "{} via {} is statically typed as {}; derived interfaces ({}) declare additional properties and require a cast",
                    step.from,
                    step.via,
                    step.to,
                    derived.join(", ")
                ));
            }
        }
        warnings
    }
}
