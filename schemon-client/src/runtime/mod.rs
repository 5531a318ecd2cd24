//! Accessors for the platform runtime: secrets, notebook widgets and files.
//!
//! Each accessor takes the capability it reads from as an explicit argument,
//! so a notebook job passes the platform-backed store and a test passes an
//! in-memory one.
//!
//! ```rust
//! use schemon_client::runtime::{get_widget_value, InMemoryWidgetStore};
//!
//! let widgets: InMemoryWidgetStore = [("env", "prod")].into_iter().collect();
//! assert_eq!(get_widget_value(&widgets, "env", None).unwrap(), "prod");
//! assert!(get_widget_value(&widgets, "region", Some("eu-west-1")).is_err());
//! ```

mod fs;
mod secrets;
mod widgets;

pub use fs::{FileInfo, FileSystem, LocalFileSystem};
#[cfg(feature = "cloud-storage")]
pub use fs::ObjectStoreFileSystem;
pub use secrets::{EnvSecretStore, InMemorySecretStore, SecretStore};
pub use widgets::{EnvWidgetStore, InMemoryWidgetStore, WidgetStore};

use crate::error::{Result, SchemonError};
use crate::security::SecureString;
use std::collections::HashMap;
use tracing::debug;

/// Looks up `key` in `scope`.
pub fn get_secret_value(store: &dyn SecretStore, scope: &str, key: &str) -> Result<SecureString> {
    debug!(secret.scope = %scope, secret.key = %key, "Fetching secret");
    store.get(scope, key)
}

/// Lists the direct children of `directory`.
pub async fn list_files(fs: &dyn FileSystem, directory: &str) -> Result<Vec<FileInfo>> {
    fs.list(directory).await
}

/// Returns every widget currently set.
pub fn get_all_widgets(store: &dyn WidgetStore) -> Result<HashMap<String, String>> {
    store.get_all()
}

/// Returns the value of widget `name`.
///
/// A missing widget is an error even when `default` is given: `default` is
/// never returned. Callers that want a fallback should match on
/// [`SchemonError::WidgetNotFound`].
pub fn get_widget_value(
    store: &dyn WidgetStore,
    name: &str,
    default: Option<&str>,
) -> Result<String> {
    let widgets = store.get_all()?;
    match widgets.get(name) {
        Some(value) => Ok(value.clone()),
        None => {
            debug!(widget = %name, default = ?default, "Widget not set");
            Err(SchemonError::WidgetNotFound {
                name: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_widget_value_present() {
        let widgets: InMemoryWidgetStore = [("target_table", "orders")].into_iter().collect();
        assert_eq!(
            get_widget_value(&widgets, "target_table", Some("ignored")).unwrap(),
            "orders"
        );
    }

    #[test]
    fn test_get_widget_value_missing_ignores_default() {
        let widgets = InMemoryWidgetStore::new();

        for default in [None, Some(""), Some("fallback")] {
            let err = get_widget_value(&widgets, "x", default).unwrap_err();
            assert!(matches!(err, SchemonError::WidgetNotFound { ref name } if name == "x"));
            assert_eq!(err.to_string(), "Widget 'x' not found in the notebook");
        }
    }

    #[test]
    fn test_get_all_widgets() {
        let widgets: InMemoryWidgetStore = [("a", "1"), ("b", "2")].into_iter().collect();
        let all = get_all_widgets(&widgets).unwrap();
        assert_eq!(all.get("a").map(String::as_str), Some("1"));
        assert_eq!(all.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_get_secret_value() {
        let store = InMemorySecretStore::new().with_secret("kv", "token", "abc");
        assert_eq!(get_secret_value(&store, "kv", "token").unwrap().expose(), "abc");
        assert!(get_secret_value(&store, "kv", "nope").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_files_delegates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0.parquet"), b"PAR1").unwrap();

        let files = list_files(&LocalFileSystem, dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "part-0.parquet");
    }
}
