//! Shared fixtures for the sqlite integration tests

#![allow(dead_code)]

use relstore::dispatcher::{Server, SessionWorker};
use relstore::sqlx::{self, Connection};
use relstore::sqlx::sqlite::SqliteConnection;
use relstore::store_object::executor::SqliteExecutor;
use relstore::store_object::{Attributes, Session};
use relstore::table_schema::{
    Association, ColumnDefinition, TableBuilder, TableDefinitions, TableDefinitionsBuilder,
};
use relstore::type_mapping::{ColumnType, Dialect};
use serde_json::Value;
use std::sync::Arc;

pub fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().expect("attributes must be an object")
}

/// One worker over a fresh in-memory database prepared by `ddl`
pub async fn server(tables: TableDefinitions, ddl: &[&str]) -> Server {
    let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    for statement in ddl {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    let tables = Arc::new(tables);
    let session = Session::new(
        Box::new(SqliteExecutor::from_connection(conn)),
        tables.clone(),
        false,
    );
    Server::from_workers(vec![Box::new(SessionWorker::new(session))], tables, Dialect::Sqlite)
}

// ========================================
// Inventory: devices owning interfaces, triggers and site links
// ========================================

pub fn inventory_tables() -> TableDefinitions {
    TableDefinitionsBuilder::new()
        .table(
            TableBuilder::new("NetworkDevice")
                .column(ColumnDefinition::new("name", ColumnType::String).required())
                .column(ColumnDefinition::new("device_type", ColumnType::Integer))
                .timestamps()
                .association(Association::has_many("interface", "device_id"))
                .association(Association::has_many_polymorphic("metric_trigger"))
                .association(Association::has_and_belongs_to_many("site", "device_sites", "device_id")),
        )
        .table(
            TableBuilder::new("Interface")
                .column(ColumnDefinition::new("device_id", ColumnType::Integer))
                .column(ColumnDefinition::new("if_index", ColumnType::Integer))
                .column(ColumnDefinition::new("status", ColumnType::String))
                .timestamps()
                .association(Association::belongs_to("network_device", "device_id")),
        )
        .table(
            TableBuilder::new("MetricTrigger")
                .column(ColumnDefinition::new("name", ColumnType::String))
                .column(ColumnDefinition::new("parent_type", ColumnType::String))
                .column(ColumnDefinition::new("parent_id", ColumnType::Integer))
                .timestamps(),
        )
        .table(TableBuilder::new("Site").column(ColumnDefinition::new("name", ColumnType::String)))
        .table(
            TableBuilder::new("DeviceSite")
                .column(ColumnDefinition::new("device_id", ColumnType::Integer))
                .column(ColumnDefinition::new("site_id", ColumnType::Integer)),
        )
        .build()
        .unwrap()
}

pub const INVENTORY_DDL: &[&str] = &[
    "CREATE TABLE network_devices (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, device_type INTEGER, created_at TEXT, updated_at TEXT)",
    "CREATE TABLE interfaces (id INTEGER PRIMARY KEY AUTOINCREMENT, device_id INTEGER, if_index INTEGER, status TEXT, created_at TEXT, updated_at TEXT)",
    "CREATE TABLE metric_triggers (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, parent_type TEXT, parent_id INTEGER, created_at TEXT, updated_at TEXT)",
    "CREATE TABLE sites (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
    "CREATE TABLE device_sites (id INTEGER PRIMARY KEY AUTOINCREMENT, device_id INTEGER, site_id INTEGER)",
];

pub async fn inventory() -> Server {
    server(inventory_tables(), INVENTORY_DDL).await
}

// ========================================
// Single table hierarchy: every device kind lives in `devices`
// ========================================

pub fn single_table_tables() -> TableDefinitions {
    TableDefinitionsBuilder::new()
        .table(
            TableBuilder::new("Device")
                .single_table_inheritance()
                .column(ColumnDefinition::new("name", ColumnType::String))
                .timestamps(),
        )
        .table(
            TableBuilder::new("Switch")
                .extends("device")
                .column(ColumnDefinition::new("port_count", ColumnType::Integer)),
        )
        .table(TableBuilder::new("CoreSwitch").extends("switch"))
        .table(TableBuilder::new("Router").extends("device"))
        .build()
        .unwrap()
}

pub const SINGLE_TABLE_DDL: &[&str] = &[
    "CREATE TABLE devices (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, type TEXT, port_count INTEGER, created_at TEXT, updated_at TEXT)",
];

// ========================================
// Class table hierarchy: one physical table per shape
// ========================================

pub fn class_table_tables() -> TableDefinitions {
    TableDefinitionsBuilder::new()
        .table(TableBuilder::new("Shape").column(ColumnDefinition::new("name", ColumnType::String)))
        .table(
            TableBuilder::new("Circle")
                .extends("shape")
                .column(ColumnDefinition::new("radius", ColumnType::Integer)),
        )
        .table(
            TableBuilder::new("Square")
                .extends("shape")
                .column(ColumnDefinition::new("side", ColumnType::Integer)),
        )
        .build()
        .unwrap()
}

/// Id ranges are disjoint so an id names exactly one shape
pub const CLASS_TABLE_DDL: &[&str] = &[
    "CREATE TABLE shapes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
    "CREATE TABLE circles (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, radius INTEGER)",
    "CREATE TABLE squares (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, side INTEGER)",
    "INSERT INTO sqlite_sequence (name, seq) VALUES ('circles', 1000), ('squares', 2000)",
];
