//! Input hardening for generated SQL and secret handling.
//!
//! The router assembles a SQL projection from column names, rule names and
//! custom rule templates. Everything that ends up in that statement passes
//! through [`SqlSecurity`] first. Secret values travel as [`SecureString`].

use crate::error::{Result, SchemonError};
use once_cell::sync::Lazy;
use regex::Regex;
use zeroize::{Zeroize, ZeroizeOnDrop};

const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_EXPRESSION_LENGTH: usize = 5000;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// SQL identifier, literal and expression checks.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a table identifier, optionally schema-qualified (`sales.orders`).
    ///
    /// # Examples
    /// ```rust
    /// use schemon_client::security::SqlSecurity;
    ///
    /// assert!(SqlSecurity::validate_identifier("sales.orders").is_ok());
    /// assert!(SqlSecurity::validate_identifier("orders; DROP TABLE x").is_err());
    /// ```
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        Self::check_basic(identifier, "SQL identifier")?;

        static QUALIFIED_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !QUALIFIED_REGEX.is_match(identifier) {
            return Err(SchemonError::SecurityError(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }
        Ok(())
    }

    /// Validates a dataframe column name.
    ///
    /// Any name is allowed as long as it is non-empty, reasonably short and
    /// free of null bytes; [`escape_column`](Self::escape_column) makes it
    /// safe to embed.
    pub fn validate_column(column: &str) -> Result<()> {
        Self::check_basic(column, "Column name")
    }

    /// Validates a name the crate itself introduces into SQL or output
    /// schemas: rule names and the violation tag column.
    pub fn validate_simple_name(name: &str) -> Result<()> {
        Self::check_basic(name, "Name")?;

        static NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !NAME_REGEX.is_match(name) {
            return Err(SchemonError::SecurityError(format!(
                "Invalid name: '{name}'. Names must start with a letter or underscore and contain only letters, numbers, and underscores"
            )));
        }
        Ok(())
    }

    /// Validates a column name and returns it as a double-quoted SQL
    /// identifier. Embedded double quotes are doubled.
    ///
    /// Quoting keeps the original case, so `"userId"` refers to `userId`
    /// rather than the folded `userid`.
    pub fn escape_column(column: &str) -> Result<String> {
        Self::validate_column(column)?;
        Ok(format!("\"{}\"", column.replace('"', "\"\"")))
    }

    /// Renders a string as a single-quoted SQL literal.
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Validates a custom SQL boolean expression.
    ///
    /// Used for registered rule templates; rejects statement separators,
    /// comments, DDL/DML keywords and subqueries.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.trim().is_empty() {
            return Err(SchemonError::SecurityError(
                "SQL expression cannot be empty".to_string(),
            ));
        }

        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(SchemonError::SecurityError(format!(
                "SQL expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }

        if expression.contains('\0') {
            return Err(SchemonError::SecurityError(
                "SQL expression cannot contain null bytes".to_string(),
            ));
        }

        Self::check_dangerous_sql_patterns(expression)
    }

    fn check_basic(value: &str, what: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(SchemonError::SecurityError(format!(
                "{what} cannot be empty or whitespace-only"
            )));
        }
        if value.len() > MAX_IDENTIFIER_LENGTH {
            return Err(SchemonError::SecurityError(format!(
                "{what} too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }
        if value.contains('\0') {
            return Err(SchemonError::SecurityError(format!(
                "{what} cannot contain null bytes"
            )));
        }
        Ok(())
    }

    fn check_dangerous_sql_patterns(expression: &str) -> Result<()> {
        // Keywords inside string literals are data, not statements.
        static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"'(?:[^']|'')*'").expect("Hard-coded regex pattern should be valid")
        });
        let expression_lower = STRING_LITERAL
            .replace_all(&expression.to_lowercase(), "''")
            .into_owned();

        for marker in ["--", "/*", "*/"] {
            if expression_lower.contains(marker) {
                return Err(SchemonError::SecurityError(format!(
                    "SQL expression contains dangerous keyword: '{marker}'"
                )));
            }
        }

        static DANGEROUS_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(concat!(
                r"\b(",
                // DDL
                "drop|create|alter|truncate",
                // DML
                "|insert|update|delete",
                // procedures and transactions
                "|exec|execute|declare|commit|rollback",
                // catalog access
                "|information_schema",
                r")\b"
            ))
            .expect("Hard-coded regex pattern should be valid")
        });

        if let Some(keyword) = DANGEROUS_KEYWORDS.find(&expression_lower) {
            return Err(SchemonError::SecurityError(format!(
                "SQL expression contains dangerous keyword: '{}'",
                keyword.as_str()
            )));
        }

        static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
            [
                r";\s*\w+",            // statement after a semicolon
                r"union\s+select",     // union-based injection
                r"'\s*or\s+'",         // tautology injection
                r"\(\s*select\s+.*\)", // subqueries
            ]
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
        });

        for regex in SUSPICIOUS_PATTERNS.iter() {
            if regex.is_match(&expression_lower) {
                return Err(SchemonError::SecurityError(format!(
                    "SQL expression contains suspicious pattern matching: {}",
                    regex.as_str()
                )));
            }
        }

        Ok(())
    }
}
