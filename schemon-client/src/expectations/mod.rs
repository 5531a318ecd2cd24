//! Column expectations for micro-batch validation.
//!
//! An [`Expectations`] map attaches one rule name to each column. Rule names
//! are resolved against a [`RuleRegistry`] when a batch is routed.
//!
//! ```rust
//! use schemon_client::expectations::Expectations;
//!
//! let expectations: Expectations = serde_json::from_str(
//!     r#"{"order_id": "not_null", "quantity": "positive"}"#,
//! ).unwrap();
//!
//! let columns: Vec<&str> = expectations.iter().map(|(column, _)| column).collect();
//! assert_eq!(columns, vec!["order_id", "quantity"]);
//! ```

mod rule;

pub use rule::{BuiltinRule, ResolvedRule, RuleRegistry, COLUMN_PLACEHOLDER};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered mapping of column name to rule name.
///
/// Iteration follows insertion order. Inserting a column that is already
/// present replaces its rule and keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    entries: Vec<(String, String)>,
}

impl Expectations {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an expectation, consuming and returning the mapping.
    pub fn expect(mut self, column: impl Into<String>, rule: impl Into<String>) -> Self {
        self.insert(column, rule);
        self
    }

    /// Sets the rule for `column`, returning the rule it replaced.
    pub fn insert(&mut self, column: impl Into<String>, rule: impl Into<String>) -> Option<String> {
        let column = column.into();
        let rule = rule.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == column) {
            Some((_, existing_rule)) => Some(std::mem::replace(existing_rule, rule)),
            None => {
                self.entries.push((column, rule));
                None
            }
        }
    }

    /// Returns the rule for `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == column)
            .map(|(_, rule)| rule.as_str())
    }

    /// Iterates `(column, rule)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(column, rule)| (column.as_str(), rule.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C, R> FromIterator<(C, R)> for Expectations
where
    C: Into<String>,
    R: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (C, R)>>(iter: I) -> Self {
        let mut expectations = Expectations::new();
        for (column, rule) in iter {
            expectations.insert(column, rule);
        }
        expectations
    }
}

impl Serialize for Expectations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, rule) in &self.entries {
            map.serialize_entry(column, rule)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Expectations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExpectationsVisitor;

        impl<'de> Visitor<'de> for ExpectationsVisitor {
            type Value = Expectations;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of column name to rule name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut expectations = Expectations::new();
                while let Some((column, rule)) = access.next_entry::<String, String>()? {
                    expectations.insert(column, rule);
                }
                Ok(expectations)
            }
        }

        deserializer.deserialize_map(ExpectationsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_and_last_write_wins() {
        let mut expectations = Expectations::new()
            .expect("b", "not_null")
            .expect("a", "positive");

        assert_eq!(expectations.insert("b", "not_empty"), Some("not_null".to_string()));

        let pairs: Vec<(&str, &str)> = expectations.iter().collect();
        assert_eq!(pairs, vec![("b", "not_empty"), ("a", "positive")]);
        assert_eq!(expectations.len(), 2);
        assert_eq!(expectations.get("a"), Some("positive"));
        assert_eq!(expectations.get("c"), None);
    }

    #[test]
    fn test_json_keeps_document_order() {
        let expectations: Expectations =
            serde_json::from_str(r#"{"zeta": "not_null", "alpha": "positive", "zeta": "is_null"}"#)
                .unwrap();

        let pairs: Vec<(&str, &str)> = expectations.iter().collect();
        assert_eq!(pairs, vec![("zeta", "is_null"), ("alpha", "positive")]);

        let json = serde_json::to_string(&expectations).unwrap();
        assert_eq!(json, r#"{"zeta":"is_null","alpha":"positive"}"#);
    }

    #[test]
    fn test_json_rejects_non_map() {
        assert!(serde_json::from_str::<Expectations>(r#"["not_null"]"#).is_err());
    }

    #[test]
    fn test_empty() {
        assert!(Expectations::new().is_empty());
        let collected: Expectations = Vec::<(String, String)>::new().into_iter().collect();
        assert!(collected.is_empty());
    }
}
