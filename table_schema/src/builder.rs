//! Registry construction
//!
//! Tables are declared independently and resolved together in
//! [`TableDefinitionsBuilder::build`]: super tables are linked, attribute and
//! association lists are flattened down the hierarchy and every identifier is
//! validated.

use crate::association::Association;
use crate::column::ColumnDefinition;
use crate::definitions::{TableDefinition, TableDefinitions};
use crate::errors::SchemaError;
use crate::validation::validate_identifier;
use std::collections::HashMap;
use std::sync::Arc;
use type_mapping::ColumnType;

#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    underscore_name: String,
    collection_name: Option<String>,
    super_table: Option<String>,
    id: ColumnDefinition,
    attributes: Vec<ColumnDefinition>,
    associations: Vec<Association>,
    is_abstract: bool,
    single_table_inheritance: bool,
}

impl TableBuilder {
    /// `NetworkDevice` gets the underscore name `network_device` and the
    /// collection `network_devices` unless overridden.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            underscore_name: to_underscore(name),
            collection_name: None,
            super_table: None,
            id: ColumnDefinition::new("id", ColumnType::ObjectId).serial(),
            attributes: Vec::new(),
            associations: Vec::new(),
            is_abstract: false,
            single_table_inheritance: false,
        }
    }

    pub fn underscore_name(mut self, name: &str) -> Self {
        self.underscore_name = name.to_string();
        self
    }

    pub fn collection(mut self, name: &str) -> Self {
        self.collection_name = Some(name.to_string());
        self
    }

    /// Inherit from the table with the given underscore name
    pub fn extends(mut self, super_table: &str) -> Self {
        self.super_table = Some(super_table.to_string());
        self
    }

    pub fn id(mut self, id: ColumnDefinition) -> Self {
        self.id = id;
        self
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.attributes.push(column);
        self
    }

    /// `created_at` and `updated_at`
    pub fn timestamps(self) -> Self {
        self.column(ColumnDefinition::new("created_at", ColumnType::DateTime))
            .column(ColumnDefinition::new("updated_at", ColumnType::DateTime))
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn abstract_table(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Subclasses share this table, discriminated by `type`
    pub fn single_table_inheritance(mut self) -> Self {
        self.single_table_inheritance = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct TableDefinitionsBuilder {
    tables: Vec<TableBuilder>,
}

impl TableDefinitionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableBuilder) -> Self {
        self.tables.push(table);
        self
    }

    pub fn build(self) -> Result<TableDefinitions, SchemaError> {
        let mut index: HashMap<String, TableBuilder> = HashMap::new();
        let mut order = Vec::with_capacity(self.tables.len());
        for table in self.tables {
            validate_identifier(&table.underscore_name)?;
            validate_identifier(&table.id.name)?;
            for column in &table.attributes {
                validate_identifier(&column.name)?;
            }
            if index.contains_key(&table.underscore_name) {
                return Err(SchemaError::DuplicateTable(table.underscore_name));
            }
            order.push(table.underscore_name.clone());
            index.insert(table.underscore_name.clone(), table);
        }

        // ancestors, root first
        let mut chains: HashMap<String, Vec<String>> = HashMap::new();
        for name in &order {
            let mut chain = Vec::new();
            let mut current = index[name].super_table.clone();
            while let Some(parent) = current {
                if chain.len() > index.len() || &parent == name {
                    return Err(SchemaError::InheritanceCycle(name.clone()));
                }
                let parent_table = index.get(&parent).ok_or_else(|| SchemaError::UnknownParent {
                    table: name.clone(),
                    parent: parent.clone(),
                })?;
                current = parent_table.super_table.clone();
                chain.push(parent);
            }
            chain.reverse();
            chains.insert(name.clone(), chain);
        }

        // the topmost table declaring single table inheritance owns the discriminator
        let mut sti_roots: HashMap<String, String> = HashMap::new();
        for name in &order {
            let root = chains[name]
                .iter()
                .chain(std::iter::once(name))
                .find(|n| index[n.as_str()].single_table_inheritance);
            if let Some(root) = root {
                sti_roots.insert(name.clone(), root.clone());
            }
        }
        for root in sti_roots.values() {
            if let Some(table) = index.get_mut(root) {
                if !table.attributes.iter().any(|c| c.name == "type") {
                    table.attributes.push(ColumnDefinition::new("type", ColumnType::String));
                }
            }
        }

        let mut own_children: HashMap<String, Vec<String>> = HashMap::new();
        for name in &order {
            if let Some(parent) = &index[name].super_table {
                own_children.entry(parent.clone()).or_default().push(name.clone());
            }
        }

        let mut tables = HashMap::new();
        let mut by_collection = HashMap::new();
        for name in &order {
            let table = &index[name];
            let ancestors: Vec<&TableBuilder> = chains[name].iter().map(|n| &index[n]).collect();
            let sti_root = sti_roots.get(name);

            let mut attributes = vec![table.id.clone()];
            for column in ancestors
                .iter()
                .flat_map(|a| a.attributes.iter())
                .chain(table.attributes.iter())
            {
                match attributes.iter_mut().find(|c| c.name == column.name) {
                    Some(existing) => *existing = column.clone(),
                    None => attributes.push(column.clone()),
                }
            }

            let mut associations: Vec<Association> = ancestors
                .iter()
                .flat_map(|a| a.associations.iter().cloned())
                .collect();
            associations.extend(table.associations.iter().cloned());
            for association in &associations {
                if !index.contains_key(&association.target) {
                    return Err(SchemaError::UnknownAssociationTarget {
                        table: name.clone(),
                        target: association.target.clone(),
                    });
                }
                validate_identifier(&association.foreign_key)?;
                if let Some(through) = &association.through {
                    validate_identifier(through)?;
                }
            }

            let collection_name = match (&table.collection_name, sti_root) {
                (Some(collection), _) => collection.clone(),
                (None, Some(root)) if root != name => {
                    let root = &index[root];
                    root.collection_name
                        .clone()
                        .unwrap_or_else(|| format!("{}s", root.underscore_name))
                }
                (None, _) => format!("{}s", table.underscore_name),
            };
            validate_identifier(&collection_name)?;
            by_collection.entry(collection_name.clone()).or_insert_with(|| name.clone());

            let mut descendants = Vec::new();
            collect_descendants(name, &own_children, &mut descendants);

            tables.insert(
                name.clone(),
                Arc::new(TableDefinition {
                    name: table.name.clone(),
                    underscore_name: name.clone(),
                    collection_name,
                    id: table.id.clone(),
                    own_attributes: table.attributes.clone(),
                    attributes,
                    super_table: table.super_table.clone(),
                    own_children: own_children.get(name).cloned().unwrap_or_default(),
                    descendants,
                    is_abstract: table.is_abstract,
                    single_table_inheritance: sti_root.is_some(),
                    associations,
                }),
            );
        }

        // a subclass registered before its STI root must not own the shared collection
        for (collection, owner) in by_collection.iter_mut() {
            while let Some(parent) = tables
                .get(owner.as_str())
                .and_then(|t| t.super_table.clone())
                .filter(|p| tables.get(p).map(|t| t.collection_name == *collection).unwrap_or(false))
            {
                *owner = parent;
            }
        }

        Ok(TableDefinitions {
            tables,
            by_collection,
        })
    }
}

fn collect_descendants(name: &str, own_children: &HashMap<String, Vec<String>>, out: &mut Vec<String>) {
    if let Some(children) = own_children.get(name) {
        for child in children {
            out.push(child.clone());
            collect_descendants(child, own_children, out);
        }
    }
}

/// `NetworkDevice` -> `network_device`
pub fn to_underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
