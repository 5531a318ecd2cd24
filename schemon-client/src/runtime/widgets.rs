//! Notebook widget (job parameter) store capability.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// A store of the currently set notebook parameters.
pub trait WidgetStore: Send + Sync {
    /// Returns every parameter that is currently set.
    fn get_all(&self) -> Result<HashMap<String, String>>;
}

/// Widgets held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryWidgetStore {
    widgets: RwLock<HashMap<String, String>>,
}

impl InMemoryWidgetStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a widget value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.widgets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), value.into());
    }

    /// Removes a widget, returning its previous value.
    pub fn remove(&self, name: &str) -> Option<String> {
        self.widgets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
    }
}

impl<K, V> FromIterator<(K, V)> for InMemoryWidgetStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let widgets = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self {
            widgets: RwLock::new(widgets),
        }
    }
}

impl WidgetStore for InMemoryWidgetStore {
    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .widgets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

/// Exposes environment variables with a given prefix as widgets.
///
/// `SCHEMON_WIDGET_TARGET_TABLE=orders` becomes the widget
/// `target_table = orders`.
#[derive(Debug, Clone)]
pub struct EnvWidgetStore {
    prefix: String,
}

impl Default for EnvWidgetStore {
    fn default() -> Self {
        Self {
            prefix: "SCHEMON_WIDGET_".to_string(),
        }
    }
}

impl EnvWidgetStore {
    /// Creates a store using the default `SCHEMON_WIDGET_` prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with a custom variable prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl WidgetStore for EnvWidgetStore {
    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(std::env::vars()
            .filter_map(|(name, value)| {
                name.strip_prefix(&self.prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_lowercase(), value))
            })
            .collect())
    }
}
