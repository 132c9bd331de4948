//! Cascade configuration: which relationships each record type manages.
//!
//! A type that is not declared, or that declares an empty `manage` list, does
//! not cascade. Declarations are validated when loaded so that misspelled
//! relationship names and cyclic type graphs fail fast instead of silently
//! resolving to nothing or recursing forever.

use crate::{ConfigError, Relationship, RecordType, RelationshipKind, StrataResult};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Per-type declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    /// Relationship names to cascade through, in order.
    #[serde(default)]
    pub manage: Vec<String>,
    /// Every relationship the type has, managed or not.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl TypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relationship without managing it.
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Declare a relationship and append it to the managed list.
    pub fn manages(mut self, relationship: Relationship) -> Self {
        self.manage.push(relationship.name.clone());
        self.relationships.push(relationship);
        self
    }

    pub fn find(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// Cascade declarations for every known record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeConfig {
    #[serde(default)]
    pub types: BTreeMap<RecordType, TypeConfig>,
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, record_type: impl Into<RecordType>, config: TypeConfig) -> Self {
        self.types.insert(record_type.into(), config);
        self
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> StrataResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(contents: &str) -> StrataResult<Self> {
        let config: CascadeConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn type_config(&self, record_type: &RecordType) -> Option<&TypeConfig> {
        self.types.get(record_type)
    }

    /// Managed relationships of a type, in `manage` order.
    ///
    /// Names without a declaration are skipped; `validate` rejects them.
    pub fn managed_relationships(&self, record_type: &RecordType) -> Vec<&Relationship> {
        match self.types.get(record_type) {
            Some(config) => config
                .manage
                .iter()
                .filter_map(|name| config.find(name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether records of this type propagate lifecycle operations.
    pub fn cascades(&self, record_type: &RecordType) -> bool {
        !self.managed_relationships(record_type).is_empty()
    }

    /// Whether the type is the child end of any managed relationship.
    pub fn is_managed_child(&self, record_type: &RecordType) -> bool {
        self.types.keys().any(|parent| {
            self.managed_relationships(parent)
                .iter()
                .any(|r| &r.child_type == record_type)
        })
    }

    /// Validate the declarations.
    ///
    /// Rejects:
    /// - blank relationship names and foreign keys
    /// - relationship names declared twice on one type
    /// - managed names with no declaration, or listed twice
    /// - managed relationships pointing at undeclared types
    /// - cycles between types through managed relationships (self-loops included)
    pub fn validate(&self) -> StrataResult<()> {
        for (record_type, config) in &self.types {
            let mut declared = HashSet::new();
            for relationship in &config.relationships {
                if relationship.name.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("types.{}.relationships.name", record_type),
                        reason: "must not be empty".to_string(),
                    }
                    .into());
                }
                if let RelationshipKind::Plural { foreign_key } = &relationship.kind {
                    if foreign_key.trim().is_empty() {
                        return Err(ConfigError::InvalidValue {
                            field: format!(
                                "types.{}.relationships.{}.foreign_key",
                                record_type, relationship.name
                            ),
                            reason: "must not be empty".to_string(),
                        }
                        .into());
                    }
                }
                if !declared.insert(relationship.name.as_str()) {
                    return Err(ConfigError::DuplicateRelationship {
                        record_type: record_type.clone(),
                        relationship: relationship.name.clone(),
                    }
                    .into());
                }
            }

            let mut managed = HashSet::new();
            for name in &config.manage {
                let relationship =
                    config
                        .find(name)
                        .ok_or_else(|| ConfigError::UnknownRelationship {
                            record_type: record_type.clone(),
                            relationship: name.clone(),
                        })?;
                if !managed.insert(name.as_str()) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("types.{}.manage", record_type),
                        reason: format!("{} is listed more than once", name),
                    }
                    .into());
                }
                if !self.types.contains_key(&relationship.child_type) {
                    return Err(ConfigError::UnknownRecordType {
                        record_type: relationship.child_type.clone(),
                        referenced_by: format!("{}.{}", record_type, name),
                    }
                    .into());
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> StrataResult<()> {
        let mut graph: DiGraph<RecordType, ()> = DiGraph::new();
        let mut nodes: HashMap<&RecordType, NodeIndex> = HashMap::new();
        for record_type in self.types.keys() {
            nodes.insert(record_type, graph.add_node(record_type.clone()));
        }

        for record_type in self.types.keys() {
            let from = nodes[record_type];
            for relationship in self.managed_relationships(record_type) {
                if let Some(&to) = nodes.get(&relationship.child_type) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| graph.contains_edge(node, node));
            if cyclic {
                let mut cycle: Vec<RecordType> =
                    component.iter().map(|&node| graph[node].clone()).collect();
                cycle.sort();
                return Err(ConfigError::CyclicRelationships { cycle }.into());
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
