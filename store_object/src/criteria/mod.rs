//! Criteria compiler
//!
//! This module turns declarative query parameters (`@column=[operator]value`,
//! `group_by`, `having`, `order`, `limit`, `offset`) into a parameterized SQL
//! fragment for one table.

pub mod builder;
pub mod operators;
pub mod params;

#[cfg(test)]
mod tests;

pub use builder::{CriteriaBuilder, Statement};
pub use operators::{Comparison, Operator, OperatorRegistry};
pub use params::{split, QueryParams};
