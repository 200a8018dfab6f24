//! Per-project lookup of node-type and rule-type codes.

use crate::graph::error::ValidationError;
use crate::model::graph::{NodeType, ProjectId, RuleType};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::RepoResult;
use std::collections::HashMap;

/// Read-only code -> catalog entry mapping for one project.
///
/// Lookups are the single place where a wire code becomes an internal id;
/// a missing code is reported as a [`ValidationError`] right away.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    node_types: Vec<NodeType>,
    rule_types: Vec<RuleType>,
    node_index: HashMap<String, usize>,
    rule_index: HashMap<String, usize>,
}

impl TypeCatalog {
    /// Builds a catalog from entries in project-declared order.
    pub fn new(node_types: Vec<NodeType>, rule_types: Vec<RuleType>) -> Self {
        let node_index = node_types
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.code.clone(), index))
            .collect();
        let rule_index = rule_types
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.code.clone(), index))
            .collect();
        Self {
            node_types,
            rule_types,
            node_index,
            rule_index,
        }
    }

    pub fn load<R: ProjectRepository>(repo: &R, project_id: ProjectId) -> RepoResult<Self> {
        Ok(Self::new(
            repo.list_node_types(project_id)?,
            repo.list_rule_types(project_id)?,
        ))
    }

    pub fn node_type(&self, code: &str) -> Result<&NodeType, ValidationError> {
        self.node_index
            .get(code)
            .map(|index| &self.node_types[*index])
            .ok_or_else(|| ValidationError::UnknownNodeType(code.to_string()))
    }

    pub fn rule_type(&self, code: &str) -> Result<&RuleType, ValidationError> {
        self.rule_index
            .get(code)
            .map(|index| &self.rule_types[*index])
            .ok_or_else(|| ValidationError::UnknownRuleType(code.to_string()))
    }

    /// Node type used when raw text gives no `<code>` prefix.
    pub fn first_node_type(&self) -> Result<&NodeType, ValidationError> {
        self.node_types
            .first()
            .ok_or(ValidationError::EmptyNodeTypeCatalog)
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    pub fn rule_types(&self) -> &[RuleType] {
        &self.rule_types
    }
}
