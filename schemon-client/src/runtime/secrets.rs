//! Secret store capability.

use crate::error::{Result, SchemonError};
use crate::security::SecureString;
use std::collections::HashMap;
use std::sync::RwLock;

/// A scoped key-value store of secrets.
pub trait SecretStore: Send + Sync {
    /// Returns the secret stored under `key` in `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemonError::SecretNotFound`] when the store has no such key.
    fn get(&self, scope: &str, key: &str) -> Result<SecureString>;
}

/// Secrets held in process memory, keyed by `(scope, key)`.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<(String, String), SecureString>>,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret, consuming and returning the store.
    pub fn with_secret(
        self,
        scope: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<SecureString>,
    ) -> Self {
        self.put(scope, key, value);
        self
    }

    /// Inserts or replaces a secret.
    pub fn put(
        &self,
        scope: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<SecureString>,
    ) {
        let mut secrets = self
            .secrets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        secrets.insert((scope.into(), key.into()), value.into());
    }
}

impl SecretStore for InMemorySecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<SecureString> {
        let secrets = self
            .secrets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        secrets
            .get(&(scope.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| SchemonError::SecretNotFound {
                scope: scope.to_string(),
                key: key.to_string(),
            })
    }
}

/// Reads secrets from environment variables named
/// `<PREFIX><SCOPE>_<KEY>`, e.g. `SCHEMON_SECRET_PROD_DB_PASSWORD` for scope
/// `prod` and key `db-password`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self {
            prefix: "SCHEMON_SECRET_".to_string(),
        }
    }
}

impl EnvSecretStore {
    /// Creates a store using the default `SCHEMON_SECRET_` prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with a custom variable prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the environment variable consulted for `(scope, key)`.
    pub fn variable_name(&self, scope: &str, key: &str) -> String {
        format!(
            "{}{}_{}",
            self.prefix,
            normalize_segment(scope),
            normalize_segment(key)
        )
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<SecureString> {
        std::env::var(self.variable_name(scope, key))
            .map(SecureString::from)
            .map_err(|_| SchemonError::SecretNotFound {
                scope: scope.to_string(),
                key: key.to_string(),
            })
    }
}

fn normalize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_lookup() {
        let store = InMemorySecretStore::new().with_secret("prod", "db-password", "s3cr3t");

        let value = store.get("prod", "db-password").unwrap();
        assert_eq!(value.expose(), "s3cr3t");

        let err = store.get("prod", "api-key").unwrap_err();
        assert!(matches!(err, SchemonError::SecretNotFound { .. }));
        // same key in another scope is a different secret
        assert!(store.get("dev", "db-password").is_err());
    }

    #[test]
    fn test_in_memory_put_replaces() {
        let store = InMemorySecretStore::new();
        store.put("prod", "token", "old");
        store.put("prod", "token", "new");
        assert_eq!(store.get("prod", "token").unwrap().expose(), "new");
    }

    #[test]
    fn test_env_variable_name() {
        let store = EnvSecretStore::new();
        assert_eq!(
            store.variable_name("prod", "db-password"),
            "SCHEMON_SECRET_PROD_DB_PASSWORD"
        );
        let store = EnvSecretStore::with_prefix("APP_");
        assert_eq!(store.variable_name("kv.main", "token"), "APP_KV_MAIN_TOKEN");
    }

    #[test]
    fn test_env_lookup() {
        let store = EnvSecretStore::with_prefix("SCHEMON_TEST_SECRETS_ENV_");
        std::env::set_var("SCHEMON_TEST_SECRETS_ENV_PROD_TOKEN", "abc");

        assert_eq!(store.get("prod", "token").unwrap().expose(), "abc");
        assert!(store.get("prod", "missing").unwrap_err().is_not_found());

        std::env::remove_var("SCHEMON_TEST_SECRETS_ENV_PROD_TOKEN");
    }
}
