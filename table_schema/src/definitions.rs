//! Table definitions and the read-only registry

use crate::association::{Association, AssociationKind};
use crate::column::ColumnDefinition;
use crate::errors::SchemaError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct TableDefinition {
    pub(crate) name: String,
    pub(crate) underscore_name: String,
    pub(crate) collection_name: String,
    pub(crate) id: ColumnDefinition,
    pub(crate) own_attributes: Vec<ColumnDefinition>,
    pub(crate) attributes: Vec<ColumnDefinition>,
    pub(crate) super_table: Option<String>,
    pub(crate) own_children: Vec<String>,
    pub(crate) descendants: Vec<String>,
    pub(crate) is_abstract: bool,
    pub(crate) single_table_inheritance: bool,
    pub(crate) associations: Vec<Association>,
}

impl TableDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn underscore_name(&self) -> &str {
        &self.underscore_name
    }

    /// Physical table name
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn id(&self) -> &ColumnDefinition {
        &self.id
    }

    /// Id column, then inherited attributes, then own attributes
    pub fn attributes(&self) -> &[ColumnDefinition] {
        &self.attributes
    }

    pub fn own_attributes(&self) -> &[ColumnDefinition] {
        &self.own_attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&ColumnDefinition> {
        self.attributes.iter().find(|c| c.name == name)
    }

    pub fn super_table(&self) -> Option<&str> {
        self.super_table.as_deref()
    }

    pub fn own_children(&self) -> &[String] {
        &self.own_children
    }

    /// Every table below this one, depth first
    pub fn descendants(&self) -> &[String] {
        &self.descendants
    }

    pub fn has_children(&self) -> bool {
        !self.own_children.is_empty()
    }

    pub fn is_inherited(&self) -> bool {
        self.super_table.is_some() || self.has_children()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_single_table_inheritance(&self) -> bool {
        self.single_table_inheritance
    }

    /// Children exist and they live in their own tables
    pub fn is_class_table_inheritance(&self) -> bool {
        self.has_children() && !self.single_table_inheritance
    }

    /// Inherited associations first
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn associations_by_kinds<'a>(
        &'a self,
        kinds: &'a [AssociationKind],
    ) -> impl Iterator<Item = &'a Association> + 'a {
        self.associations.iter().filter(move |a| kinds.contains(&a.kind))
    }
}

#[derive(Debug, Default)]
pub struct TableDefinitions {
    pub(crate) tables: HashMap<String, Arc<TableDefinition>>,
    pub(crate) by_collection: HashMap<String, String>,
}

impl TableDefinitions {
    pub fn find_by_underscore_name(&self, name: &str) -> Option<&Arc<TableDefinition>> {
        self.tables.get(name)
    }

    /// The topmost table stored in the given physical table
    pub fn find_by_collection_name(&self, collection: &str) -> Option<&Arc<TableDefinition>> {
        self.by_collection
            .get(collection)
            .and_then(|name| self.tables.get(name))
    }

    pub fn get(&self, name: &str) -> Result<&Arc<TableDefinition>, SchemaError> {
        self.find_by_underscore_name(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// `child` is `parent` or one of its descendants
    pub fn is_subclass_of(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }
        self.tables
            .get(parent)
            .map(|p| p.descendants.iter().any(|d| d == child))
            .unwrap_or(false)
    }

    pub fn own_children_of(&self, table: &TableDefinition) -> Vec<&Arc<TableDefinition>> {
        table
            .own_children
            .iter()
            .filter_map(|name| self.tables.get(name))
            .collect()
    }

    pub fn descendants_of(&self, table: &TableDefinition) -> Vec<&Arc<TableDefinition>> {
        table
            .descendants
            .iter()
            .filter_map(|name| self.tables.get(name))
            .collect()
    }

    /// The single association of `table` towards `target`.
    ///
    /// An empty `foreign_key` accepts any key. A target that is a subclass of
    /// the declared target also matches.
    pub fn association<'a>(
        &self,
        table: &'a TableDefinition,
        target: &str,
        foreign_key: &str,
        kinds: &[AssociationKind],
    ) -> Result<&'a Association, SchemaError> {
        let candidates: Vec<&Association> = table
            .associations
            .iter()
            .filter(|a| kinds.contains(&a.kind))
            .filter(|a| self.is_subclass_of(target, &a.target))
            .filter(|a| foreign_key.is_empty() || a.foreign_key == foreign_key)
            .collect();

        match candidates.as_slice() {
            [only] => Ok(only),
            [] => Err(SchemaError::AssociationNotFound {
                table: table.underscore_name.clone(),
                target: target.to_string(),
            }),
            many => Err(SchemaError::AmbiguousAssociation {
                table: table.underscore_name.clone(),
                target: target.to_string(),
                count: many.len(),
            }),
        }
    }
}
