//! Connection-bound session
//!
//! A [`Session`] owns one [`Executor`] and runs every entity operation for
//! it: association includes, parent/children traversal, nested inserts and
//! cascading deletes. Tables are addressed by their underscore names.

use crate::criteria::{OperatorRegistry, QueryParams, Statement};
use crate::driver::{id_of, Attributes, Driver, InheritanceDriver, RecordVersion};
use crate::errors::DataStoreError;
use crate::executor::Executor;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use table_schema::association::OWNING_KINDS;
use table_schema::{Association, AssociationKind, TableDefinition, TableDefinitions};
use type_mapping::{Dialect, SqlValue};

/// What `save` did with the attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    Created,
    Updated,
}

pub struct Session {
    executor: Box<dyn Executor>,
    driver: InheritanceDriver,
    tables: Arc<TableDefinitions>,
}

impl Session {
    pub fn new(executor: Box<dyn Executor>, tables: Arc<TableDefinitions>, postgres_inherit: bool) -> Self {
        Self::with_registry(
            executor,
            tables,
            Arc::new(OperatorRegistry::standard()),
            postgres_inherit,
        )
    }

    pub fn with_registry(
        executor: Box<dyn Executor>,
        tables: Arc<TableDefinitions>,
        registry: Arc<OperatorRegistry>,
        postgres_inherit: bool,
    ) -> Self {
        let driver = InheritanceDriver::new(
            tables.clone(),
            registry,
            executor.dialect(),
            postgres_inherit,
        );
        Self {
            executor,
            driver,
            tables,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    pub fn tables(&self) -> &Arc<TableDefinitions> {
        &self.tables
    }

    pub async fn close(self) -> Result<(), DataStoreError> {
        self.executor.close().await
    }

    fn table(&self, name: &str) -> Result<Arc<TableDefinition>, DataStoreError> {
        Ok(self.tables.get(name)?.clone())
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn count(&mut self, table: &str, params: &QueryParams) -> Result<i64, DataStoreError> {
        let table = self.table(table)?;
        self.driver.count(self.executor.as_mut(), &table, params).await
    }

    pub async fn snapshot(
        &mut self,
        table: &str,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        let table = self.table(table)?;
        self.driver.snapshot(self.executor.as_mut(), &table, params).await
    }

    /// `includes` is empty, `*` or a comma list of target tables
    pub async fn find_by_id(
        &mut self,
        table: &str,
        id: i64,
        includes: &str,
    ) -> Result<Attributes, DataStoreError> {
        let table = self.table(table)?;
        let mut entity = self.driver.find_by_id(self.executor.as_mut(), &table, id).await?;
        if !includes.is_empty() {
            self.load_includes(&table, &mut entity, includes).await?;
        }
        Ok(entity)
    }

    pub async fn find(
        &mut self,
        table: &str,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let table = self.table(table)?;
        let includes = params.single("includes")?.unwrap_or_default().to_string();
        let mut results = self.driver.find(self.executor.as_mut(), &table, params).await?;
        if !includes.is_empty() {
            for entity in results.iter_mut() {
                self.load_includes(&table, entity, &includes).await?;
            }
        }
        Ok(results)
    }

    async fn load_includes(
        &mut self,
        table: &Arc<TableDefinition>,
        entity: &mut Attributes,
        includes: &str,
    ) -> Result<(), DataStoreError> {
        let parent_id = entity
            .get(&table.id().name)
            .and_then(id_of)
            .ok_or_else(|| {
                DataStoreError::InternalServerError("parent id is nil while load children.".to_string())
            })?;

        let mut wanted: Vec<(String, Association)> = Vec::new();
        if includes.trim() == "*" {
            for association in table.associations_by_kinds(OWNING_KINDS) {
                wanted.push((association.target.clone(), association.clone()));
            }
        } else {
            for name in includes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if self.tables.find_by_underscore_name(name).is_none() {
                    return Err(DataStoreError::Validation(format!(
                        "table '{}' is not found in the includes.",
                        name
                    )));
                }
                let before = wanted.len();
                for association in table.associations_by_kinds(OWNING_KINDS) {
                    if self.tables.is_subclass_of(name, &association.target) {
                        wanted.push((name.to_string(), association.clone()));
                    }
                }
                if wanted.len() == before {
                    return Err(DataStoreError::Association(format!(
                        "association that to '{}' is not found in the includes.",
                        name
                    )));
                }
            }
        }

        for (name, association) in wanted {
            let target = self.table(&name)?;
            let mut results = self.find_by_parent(table, parent_id, &association, &target).await?;
            let key = format!("${}", name);
            match association.kind {
                AssociationKind::HasOne => {
                    if results.is_empty() {
                        entity.remove(&key);
                    } else {
                        entity.insert(key, Value::Object(results.swap_remove(0)));
                    }
                }
                _ => {
                    entity.insert(
                        key,
                        Value::Array(results.into_iter().map(Value::Object).collect()),
                    );
                }
            }
        }
        Ok(())
    }

    async fn find_by_parent(
        &mut self,
        parent: &TableDefinition,
        parent_id: i64,
        association: &Association,
        target: &Arc<TableDefinition>,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let params = parent_params(parent, parent_id, association);
        self.driver.find(self.executor.as_mut(), target, &params).await
    }

    /// Rows of `target` owned by the given parent row
    pub async fn children(
        &mut self,
        parent: &str,
        parent_id: i64,
        target: &str,
        foreign_key: &str,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let parent_table = self.table(parent)?;
        let target_table = self.table(target)?;
        let association = self
            .tables
            .association(&parent_table, target, foreign_key, OWNING_KINDS)?
            .clone();
        self.find_by_parent(&parent_table, parent_id, &association, &target_table)
            .await
    }

    /// The `target` row the given child row belongs to
    pub async fn parent(
        &mut self,
        child: &str,
        child_id: i64,
        target: &str,
        foreign_key: &str,
    ) -> Result<Attributes, DataStoreError> {
        let child_table = self.table(child)?;
        let target_table = self.table(target)?;

        let belongs_to = self
            .tables
            .association(&child_table, target, foreign_key, &[AssociationKind::BelongsTo])
            .ok()
            .cloned();
        if let Some(association) = belongs_to {
            let record = self
                .driver
                .find_by_id(self.executor.as_mut(), &child_table, child_id)
                .await?;
            let id = reference(&record, &association.foreign_key)?;
            return self
                .driver
                .find_by_id(self.executor.as_mut(), &target_table, id)
                .await;
        }

        let association = self
            .tables
            .association(&target_table, child, foreign_key, OWNING_KINDS)?
            .clone();
        self.parent_by(&child_table, child_id, &association, &target_table)
            .await
    }

    async fn parent_by(
        &mut self,
        child: &Arc<TableDefinition>,
        child_id: i64,
        association: &Association,
        target: &Arc<TableDefinition>,
    ) -> Result<Attributes, DataStoreError> {
        let record = self.driver.find_by_id(self.executor.as_mut(), child, child_id).await?;
        if !association.polymorphic {
            let id = reference(&record, &association.foreign_key)?;
            return self.driver.find_by_id(self.executor.as_mut(), target, id).await;
        }

        let parent_type = match record.get("parent_type") {
            Some(Value::String(name)) => name.clone(),
            Some(Value::Null) | None => {
                return Err(DataStoreError::NotFound(
                    "'parent_type' is nil in the result".to_string(),
                ))
            }
            Some(_) => {
                return Err(DataStoreError::InternalServerError(
                    "'parent_type' is not a string in the result".to_string(),
                ))
            }
        };
        let parent = self
            .tables
            .find_by_underscore_name(&parent_type)
            .cloned()
            .ok_or_else(|| DataStoreError::NotFound(format!("table '{}' is not exists.", parent_type)))?;
        if !self.tables.is_subclass_of(&parent_type, target.underscore_name()) {
            return Err(DataStoreError::Association(format!(
                "table '{}' is not a subclass of table '{}'.",
                parent_type,
                target.underscore_name()
            )));
        }
        let parent_id = reference(&record, "parent_id")?;
        self.driver.find_by_id(self.executor.as_mut(), &parent, parent_id).await
    }

    // ========================================
    // Writes
    // ========================================

    /// Insert the entity and every nested `$target` child
    pub async fn insert(&mut self, table: &str, attributes: Attributes) -> Result<i64, DataStoreError> {
        let table = self.table(table)?;
        self.insert_table(table, attributes).await
    }

    /// Insert a `target` row owned by the given parent row
    pub async fn insert_by_parent(
        &mut self,
        parent: &str,
        parent_id: i64,
        target: &str,
        foreign_key: &str,
        attributes: Attributes,
    ) -> Result<i64, DataStoreError> {
        let parent_table = self.table(parent)?;
        let target_table = self.table(target)?;
        let association = self
            .tables
            .association(&parent_table, target, foreign_key, OWNING_KINDS)?
            .clone();

        // the parent row must exist and its concrete table decides parent_type
        let record = self
            .driver
            .find_by_id(self.executor.as_mut(), &parent_table, parent_id)
            .await?;
        let concrete_parent = match record.get("type") {
            Some(Value::String(name)) => self
                .tables
                .find_by_underscore_name(name)
                .cloned()
                .unwrap_or(parent_table),
            _ => parent_table,
        };
        self.create_child(&target_table, &concrete_parent, parent_id, &association, attributes)
            .await
    }

    fn insert_table(
        &mut self,
        table: Arc<TableDefinition>,
        attributes: Attributes,
    ) -> BoxFuture<'_, Result<i64, DataStoreError>> {
        async move {
            let concrete = self.driver.simple().type_from(&table, &attributes)?;
            let id = self
                .driver
                .insert(self.executor.as_mut(), &concrete, &attributes)
                .await?;
            crate::debug_log!("[INSERT] {} id: {}", concrete.underscore_name(), id);
            self.create_children(&concrete, id, attributes).await?;
            Ok(id)
        }
        .boxed()
    }

    async fn create_children(
        &mut self,
        parent: &Arc<TableDefinition>,
        parent_id: i64,
        attributes: Attributes,
    ) -> Result<(), DataStoreError> {
        for (key, value) in attributes {
            let Some(name) = key.strip_prefix('$') else {
                continue;
            };
            let target = self
                .tables
                .find_by_underscore_name(name)
                .cloned()
                .ok_or_else(|| {
                    DataStoreError::Validation(format!(
                        "table '{}' with '{}' is not found",
                        name, key
                    ))
                })?;
            let association = self
                .tables
                .association(parent, name, "", OWNING_KINDS)?
                .clone();

            for child in child_objects(&key, association.kind, value)? {
                self.create_child(&target, parent, parent_id, &association, child)
                    .await
                    .map_err(|e| e.with_context(&format!("save attributes to '{}' failed", target.name())))?;
            }
        }
        Ok(())
    }

    async fn create_child(
        &mut self,
        target: &Arc<TableDefinition>,
        parent: &TableDefinition,
        parent_id: i64,
        association: &Association,
        mut attributes: Attributes,
    ) -> Result<i64, DataStoreError> {
        let concrete = self.driver.simple().type_from(target, &attributes)?;
        if association.polymorphic {
            attributes.insert(
                "parent_type".to_string(),
                Value::String(parent.underscore_name().to_string()),
            );
            attributes.insert("parent_id".to_string(), Value::from(parent_id));
        } else {
            attributes.insert(association.foreign_key.clone(), Value::from(parent_id));
        }
        self.insert_table(concrete, attributes).await
    }

    /// Find by `params`; insert when nothing matches, update the single match
    pub async fn save(
        &mut self,
        table: &str,
        params: &QueryParams,
        mut attributes: Attributes,
    ) -> Result<(SaveAction, i64), DataStoreError> {
        let table = self.table(table)?;
        let found = self.driver.find(self.executor.as_mut(), &table, params).await?;
        match found.as_slice() {
            [] => {
                let id = self.insert_table(table, attributes).await?;
                Ok((SaveAction::Created, id))
            }
            [existing] => {
                let id = existing
                    .get(&table.id().name)
                    .and_then(id_of)
                    .ok_or_else(|| {
                        DataStoreError::InternalServerError("id is missing in the result".to_string())
                    })?;
                if attributes.get("type").is_some() && attributes.get("type") == existing.get("type") {
                    attributes.remove("type");
                }
                self.driver
                    .update_by_id(self.executor.as_mut(), &table, id, &attributes)
                    .await?;
                Ok((SaveAction::Updated, id))
            }
            many => Err(DataStoreError::Conflict(format!(
                "results that match condition is not equals 1, actual is {}",
                many.len()
            ))),
        }
    }

    pub async fn update(
        &mut self,
        table: &str,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError> {
        let table = self.table(table)?;
        self.driver
            .update(self.executor.as_mut(), &table, params, attributes)
            .await
    }

    pub async fn update_by_id(
        &mut self,
        table: &str,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError> {
        let table = self.table(table)?;
        self.driver
            .update_by_id(self.executor.as_mut(), &table, id, attributes)
            .await
    }

    // ========================================
    // Cascading deletes
    // ========================================

    /// Delete the matched rows after their owned children.
    ///
    /// When any child deletion fails the matched rows are kept and every
    /// collected failure is returned as one `Cascade` error.
    pub async fn delete(&mut self, table: &str, params: &QueryParams) -> Result<u64, DataStoreError> {
        let table = self.table(table)?;
        self.delete_table(table, params.clone()).await
    }

    pub async fn delete_by_id(&mut self, table: &str, id: i64) -> Result<(), DataStoreError> {
        let table = self.table(table)?;
        let params = QueryParams::new().with(format!("@{}", table.id().name), id.to_string());
        let failures = self.cascade(&table, &params).await?;
        if !failures.is_empty() {
            return Err(DataStoreError::Cascade(failures));
        }
        self.driver.delete_by_id(self.executor.as_mut(), &table, id).await
    }

    fn delete_table(
        &mut self,
        table: Arc<TableDefinition>,
        params: QueryParams,
    ) -> BoxFuture<'_, Result<u64, DataStoreError>> {
        async move {
            let failures = self.cascade(&table, &params).await?;
            if !failures.is_empty() {
                return Err(DataStoreError::Cascade(failures));
            }
            self.driver.delete(self.executor.as_mut(), &table, &params).await
        }
        .boxed()
    }

    /// Delete the children of every matched row, collecting failures
    async fn cascade(
        &mut self,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<DataStoreError>, DataStoreError> {
        let mut matched: Vec<(Arc<TableDefinition>, i64)> = Vec::new();
        self.driver
            .for_each(
                self.executor.as_mut(),
                table,
                params,
                &mut |concrete: &Arc<TableDefinition>, id: i64| {
                    matched.push((concrete.clone(), id));
                    Ok(())
                },
            )
            .await?;

        let mut failures = Vec::new();
        for (concrete, id) in matched {
            for association in concrete.associations() {
                let result = match association.kind {
                    AssociationKind::HasOne | AssociationKind::HasMany => {
                        self.delete_owned(&concrete, id, association).await
                    }
                    AssociationKind::HasAndBelongsToMany => {
                        self.delete_links(id, association).await
                    }
                    AssociationKind::BelongsTo => Ok(()),
                };
                match result {
                    Ok(()) => {}
                    Err(DataStoreError::Cascade(nested)) => failures.extend(nested),
                    Err(e) => failures.push(e),
                }
            }
        }
        Ok(failures)
    }

    async fn delete_owned(
        &mut self,
        parent: &TableDefinition,
        parent_id: i64,
        association: &Association,
    ) -> Result<(), DataStoreError> {
        let target = self.table(&association.target)?;
        let params = parent_params(parent, parent_id, association);
        let _deleted = self.delete_table(target, params).await?;
        crate::trace_log!(
            "[CASCADE] {} {} -> {}: {} row(s)",
            parent.underscore_name(),
            parent_id,
            association.target,
            _deleted
        );
        Ok(())
    }

    async fn delete_links(&mut self, id: i64, association: &Association) -> Result<(), DataStoreError> {
        let Some(through) = &association.through else {
            return Err(DataStoreError::Association(format!(
                "join table of the association to '{}' is missing",
                association.target
            )));
        };
        let stmt = Statement::new(
            format!(
                "DELETE FROM {} WHERE {} = {}",
                through,
                association.foreign_key,
                self.executor.dialect().placeholder(1)
            ),
            vec![SqlValue::Integer(id)],
        );
        crate::debug_log!("[CASCADE] SQL: {}", stmt.sql);
        self.executor.execute(&stmt).await?;
        Ok(())
    }
}

/// Criteria selecting the rows owned by one parent row
fn parent_params(parent: &TableDefinition, parent_id: i64, association: &Association) -> QueryParams {
    if association.polymorphic {
        QueryParams::new()
            .with("@parent_type", parent.underscore_name())
            .with("@parent_id", parent_id.to_string())
    } else {
        QueryParams::new().with(format!("@{}", association.foreign_key), parent_id.to_string())
    }
}

fn reference(record: &Attributes, column: &str) -> Result<i64, DataStoreError> {
    record
        .get(column)
        .and_then(id_of)
        .ok_or_else(|| DataStoreError::NotFound(format!("'{}' is not exists in the result.", column)))
}

/// Child attribute maps carried by one `$target` value.
///
/// Has-many accepts an array of objects, a map of objects keyed by any name,
/// or a single object. Has-one accepts a single object.
fn child_objects(key: &str, kind: AssociationKind, value: Value) -> Result<Vec<Attributes>, DataStoreError> {
    let not_objects = |actual: &Value| {
        DataStoreError::Validation(format!(
            "value of '{}' is not an object or an array of objects, actual is '{}'",
            key, actual
        ))
    };

    match (kind, value) {
        (AssociationKind::HasOne, Value::Object(map)) => Ok(vec![map]),
        (AssociationKind::HasMany, Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(not_objects(&other)),
            })
            .collect(),
        (AssociationKind::HasMany, Value::Object(map)) => {
            let keyed = !map.is_empty()
                && map.iter().all(|(k, v)| v.is_object() && !k.starts_with('$'));
            if keyed {
                Ok(map
                    .into_iter()
                    .filter_map(|(_, v)| match v {
                        Value::Object(child) => Some(child),
                        _ => None,
                    })
                    .collect())
            } else {
                Ok(vec![map])
            }
        }
        (_, other) => Err(not_objects(&other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use table_schema::{TableBuilder, TableDefinitionsBuilder};

    fn tables() -> TableDefinitions {
        TableDefinitionsBuilder::new()
            .table(
                TableBuilder::new("Device")
                    .association(Association::has_many("interface", "device_id"))
                    .association(Association::has_many_polymorphic("trigger")),
            )
            .table(TableBuilder::new("Interface"))
            .table(TableBuilder::new("Trigger"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_parent_params() {
        let tables = tables();
        let device = tables.get("device").unwrap();
        let interfaces = &device.associations()[0];
        let triggers = &device.associations()[1];

        assert_eq!(
            parent_params(device, 3, interfaces),
            QueryParams::new().with("@device_id", "3")
        );
        assert_eq!(
            parent_params(device, 3, triggers),
            QueryParams::new().with("@parent_type", "device").with("@parent_id", "3")
        );
    }

    #[test]
    fn test_child_objects_shapes() {
        let many = AssociationKind::HasMany;
        let list = child_objects("$port", many, json!([{"n": 1}, {"n": 2}])).unwrap();
        assert_eq!(list.len(), 2);

        let keyed = child_objects("$port", many, json!({"a": {"n": 1}, "b": {"n": 2}})).unwrap();
        assert_eq!(keyed.len(), 2);

        let single = child_objects("$port", many, json!({"n": 1})).unwrap();
        assert_eq!(single, vec![json!({"n": 1}).as_object().cloned().unwrap()]);

        let nested = child_objects("$port", many, json!({"$vlan": {"n": 1}})).unwrap();
        assert_eq!(nested.len(), 1);
        assert!(nested[0].contains_key("$vlan"));

        let one = child_objects("$port", AssociationKind::HasOne, json!({"n": 1})).unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_child_objects_rejects_scalars() {
        assert!(matches!(
            child_objects("$port", AssociationKind::HasMany, json!([1])),
            Err(DataStoreError::Validation(_))
        ));
        assert!(matches!(
            child_objects("$port", AssociationKind::HasOne, json!([{"n": 1}])),
            Err(DataStoreError::Validation(_))
        ));
        assert!(matches!(
            child_objects("$port", AssociationKind::HasMany, json!("x")),
            Err(DataStoreError::Validation(_))
        ));
    }

    #[test]
    fn test_reference() {
        let record = json!({"device_id": "4", "name": "x"}).as_object().cloned().unwrap();
        assert_eq!(reference(&record, "device_id").unwrap(), 4);
        assert!(reference(&record, "parent_id").unwrap_err().is_not_found());
    }
}
