//! Router configuration.
//!
//! A [`RouterConfig`] names where one streaming query's rows go and which
//! expectations they must meet. It can come from JSON, a file, or the
//! notebook widgets of a job run.
//!
//! ```rust
//! use schemon_client::config::RouterConfig;
//!
//! let config = RouterConfig::from_json_str(r#"{
//!     "target_table": "orders",
//!     "bad_row_path": "/mnt/quarantine",
//!     "expectations": {"order_id": "not_null"}
//! }"#).unwrap();
//!
//! assert_eq!(config.violation_column, "violation_message");
//! ```

use crate::error::{ErrorContext, Result, SchemonError};
use crate::expectations::Expectations;
use crate::router::DEFAULT_VIOLATION_COLUMN;
use crate::runtime::{get_all_widgets, get_widget_value, WidgetStore};
use crate::security::SqlSecurity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-query routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Table that receives valid rows
    pub target_table: String,
    /// Base path for violating rows; the table name is appended
    pub bad_row_path: String,
    /// Column expectations; `None` disables validation
    #[serde(default)]
    pub expectations: Option<Expectations>,
    /// Name of the violation tag column
    #[serde(default = "default_violation_column")]
    pub violation_column: String,
    /// Stage label passed to the logger
    #[serde(default)]
    pub stage: Option<String>,
    /// Entity label passed to the logger
    #[serde(default)]
    pub entity_name: Option<String>,
}

fn default_violation_column() -> String {
    DEFAULT_VIOLATION_COLUMN.to_string()
}

impl RouterConfig {
    /// Creates a config with no expectations and default labels.
    pub fn new(target_table: impl Into<String>, bad_row_path: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            bad_row_path: bad_row_path.into(),
            expectations: None,
            violation_column: default_violation_column(),
            stage: None,
            entity_name: None,
        }
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = Some(expectations);
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read router config {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    /// Builds a config from notebook widgets.
    ///
    /// `target_table` and `bad_row_path` are required. `expectations` holds
    /// a JSON object and is optional, as are `violation_column`, `stage`
    /// and `entity_name`.
    pub fn from_widgets(store: &dyn WidgetStore) -> Result<Self> {
        let target_table = get_widget_value(store, "target_table", None)?;
        let bad_row_path = get_widget_value(store, "bad_row_path", None)?;

        let widgets = get_all_widgets(store)?;
        let optional = |name: &str| {
            widgets
                .get(name)
                .filter(|value| !value.trim().is_empty())
                .cloned()
        };

        let expectations = optional("expectations")
            .map(|json| {
                serde_json::from_str::<Expectations>(&json).map_err(|e| {
                    SchemonError::Configuration(format!("Invalid expectations widget: {e}"))
                })
            })
            .transpose()?;

        let config = Self {
            target_table,
            bad_row_path,
            expectations,
            violation_column: optional("violation_column").unwrap_or_else(default_violation_column),
            stage: optional("stage"),
            entity_name: optional("entity_name"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks identifiers and paths.
    pub fn validate(&self) -> Result<()> {
        SqlSecurity::validate_identifier(&self.target_table)?;
        SqlSecurity::validate_simple_name(&self.violation_column)?;
        if self.bad_row_path.trim().is_empty() {
            return Err(SchemonError::Configuration(
                "bad_row_path cannot be empty".to_string(),
            ));
        }
        if let Some(expectations) = &self.expectations {
            for (column, _) in expectations.iter() {
                SqlSecurity::validate_column(column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::InMemoryWidgetStore;

    #[test]
    fn test_from_json_defaults() {
        let config = RouterConfig::from_json_str(
            r#"{"target_table": "bronze.orders", "bad_row_path": "/mnt/bad"}"#,
        )
        .unwrap();
        assert_eq!(config, RouterConfig::new("bronze.orders", "/mnt/bad"));
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(RouterConfig::from_json_str(r#"{"target_table": "orders"}"#).is_err());
        assert!(RouterConfig::from_json_str(
            r#"{"target_table": "orders; drop", "bad_row_path": "/bad"}"#
        )
        .is_err());
        assert!(RouterConfig::from_json_str(
            r#"{"target_table": "orders", "bad_row_path": "/bad", "expectations": {"": "not_null"}}"#
        )
        .is_err());
        assert!(RouterConfig::from_json_str(
            r#"{"target_table": "orders", "bad_row_path": "/bad", "violation_column": "dq errors"}"#
        )
        .is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");
        std::fs::write(
            &path,
            r#"{"target_table": "orders", "bad_row_path": "/bad", "stage": "bronze"}"#,
        )
        .unwrap();

        let config = RouterConfig::from_file(&path).unwrap();
        assert_eq!(config.stage.as_deref(), Some("bronze"));

        let err = RouterConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read router config"));
    }

    #[test]
    fn test_from_widgets() {
        let widgets: InMemoryWidgetStore = [
            ("target_table", "orders"),
            ("bad_row_path", "/mnt/bad"),
            ("expectations", r#"{"id": "not_null", "qty": "positive"}"#),
            ("entity_name", "orders"),
            ("stage", ""),
        ]
        .into_iter()
        .collect();

        let config = RouterConfig::from_widgets(&widgets).unwrap();
        assert_eq!(config.target_table, "orders");
        assert_eq!(config.entity_name.as_deref(), Some("orders"));
        assert_eq!(config.stage, None);
        let expectations = config.expectations.unwrap();
        assert_eq!(expectations.get("qty"), Some("positive"));
    }

    #[test]
    fn test_from_widgets_requires_target() {
        let widgets: InMemoryWidgetStore = [("bad_row_path", "/mnt/bad")].into_iter().collect();
        let err = RouterConfig::from_widgets(&widgets).unwrap_err();
        assert!(matches!(err, SchemonError::WidgetNotFound { ref name } if name == "target_table"));
    }

    #[test]
    fn test_from_widgets_bad_expectations_json() {
        let widgets: InMemoryWidgetStore = [
            ("target_table", "orders"),
            ("bad_row_path", "/mnt/bad"),
            ("expectations", "not json"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            RouterConfig::from_widgets(&widgets),
            Err(SchemonError::Configuration(_))
        ));
    }
}
