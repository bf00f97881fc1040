//! Query parameters
//!
//! Parameters keep their insertion order so the compiled SQL and its
//! argument list are deterministic.

use crate::errors::DataStoreError;

/// Keys that configure the statement instead of adding a predicate
pub const RESERVED_KEYS: &[&str] = &["group_by", "having", "order", "limit", "offset", "includes"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a single-valued key; specifying it twice is an error
    pub fn single(&self, key: &str) -> Result<Option<&str>, DataStoreError> {
        let mut values = self.entries.iter().filter(|(k, _)| k == key);
        let first = values.next();
        if values.next().is_some() {
            return Err(DataStoreError::Validation(format!(
                "'{}' is specified more than once",
                key
            )));
        }
        Ok(first.map(|(_, v)| v.as_str()))
    }

    /// Copy without the given key
    pub fn without(&self, key: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k != key)
                .cloned()
                .collect(),
        }
    }

    /// `(column, expression)` pairs for every `@column` key.
    ///
    /// An index suffix such as `@name[1]` is dropped so one column can carry
    /// several predicates.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| {
            k.strip_prefix('@')
                .map(|column| (strip_index_suffix(column), v.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn strip_index_suffix(column: &str) -> &str {
    if let Some(body) = column.strip_suffix(']') {
        if let Some(open) = body.rfind('[') {
            let index = &body[open + 1..];
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                return &column[..open];
            }
        }
    }
    column
}

/// Split `[op]value` into `(op, value)`; anything else is an equality
pub fn split(exp: &str) -> (&str, &str) {
    if !exp.starts_with('[') {
        return ("eq", exp);
    }
    match exp[1..].find(']') {
        Some(idx) => (&exp[1..idx + 1], &exp[idx + 2..]),
        None => ("eq", exp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("[eq]12"), ("eq", "12"));
        assert_eq!(split("plain"), ("eq", "plain"));
        assert_eq!(split("[eq]"), ("eq", ""));
        assert_eq!(split("[]12"), ("", "12"));
        assert_eq!(split("[12"), ("eq", "[12"));
        assert_eq!(split("]12"), ("eq", "]12"));
        assert_eq!(split(""), ("eq", ""));
    }

    #[test]
    fn test_predicates_strip_prefix_and_index() {
        let params = QueryParams::new()
            .with("@id[0]", "[gte]1")
            .with("@id[1]", "[lte]5")
            .with("limit", "3")
            .with("@tags[x]", "a");
        let predicates: Vec<_> = params.predicates().collect();
        assert_eq!(
            predicates,
            vec![("id", "[gte]1"), ("id", "[lte]5"), ("tags[x]", "a")]
        );
    }

    #[test]
    fn test_single_rejects_duplicates() {
        let params = QueryParams::new().with("limit", "1").with("limit", "2");
        assert!(matches!(params.single("limit"), Err(DataStoreError::Validation(_))));
        assert_eq!(params.single("offset").unwrap(), None);
        assert_eq!(params.without("limit").len(), 0);
    }
}
