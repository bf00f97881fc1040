//! Operator registry
//!
//! Built once and shared; a column with an override table only accepts the
//! operators listed there.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compare(Comparison),
    In,
    NotIn,
    Between,
    Is,
    Like,
    Exists,
    /// Membership in the named table's class hierarchy
    EqualsClass,
    /// Union of several class hierarchies
    InClass,
}

#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    defaults: HashMap<&'static str, Operator>,
    per_column: HashMap<&'static str, HashMap<&'static str, Operator>>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self {
            defaults: HashMap::new(),
            per_column: HashMap::new(),
        }
    }

    /// Comparison aliases, list/range/null tests and the class overrides for
    /// the `type` and `parent_type` discriminator columns.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for (names, comparison) in [
            (["eq", "="], Comparison::Eq),
            (["ne", "!="], Comparison::Ne),
            (["gt", ">"], Comparison::Gt),
            (["gte", ">="], Comparison::Gte),
            (["lt", "<"], Comparison::Lt),
            (["lte", "<="], Comparison::Lte),
        ] {
            for name in names {
                registry = registry.with_operator(name, Operator::Compare(comparison));
            }
        }

        registry
            .with_operator("in", Operator::In)
            .with_operator("nin", Operator::NotIn)
            .with_operator("between", Operator::Between)
            .with_operator("is", Operator::Is)
            .with_operator("like", Operator::Like)
            .with_operator("exists", Operator::Exists)
            .with_column_operator("type", "eq", Operator::EqualsClass)
            .with_column_operator("type", "in", Operator::InClass)
            .with_column_operator("parent_type", "eq", Operator::EqualsClass)
            .with_column_operator("parent_type", "in", Operator::InClass)
    }

    pub fn with_operator(mut self, name: &'static str, operator: Operator) -> Self {
        self.defaults.insert(name, operator);
        self
    }

    pub fn with_column_operator(
        mut self,
        column: &'static str,
        name: &'static str,
        operator: Operator,
    ) -> Self {
        self.per_column.entry(column).or_default().insert(name, operator);
        self
    }

    pub fn lookup(&self, column: &str, name: &str) -> Option<Operator> {
        self.per_column
            .get(column)
            .unwrap_or(&self.defaults)
            .get(name)
            .copied()
    }
}
