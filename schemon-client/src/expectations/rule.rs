//! Rule resolution.
//!
//! A rule name maps to a SQL boolean predicate over one column. The
//! predicate is true when the value satisfies the rule.

use crate::error::{Result, SchemonError};
use crate::security::SqlSecurity;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder replaced by the quoted column in custom rule templates.
pub const COLUMN_PLACEHOLDER: &str = "{column}";

/// Rules available without registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRule {
    /// Value is not null
    NotNull,
    /// Value is null
    IsNull,
    /// Value is not null and not blank once rendered as text
    NotEmpty,
    /// Value is greater than zero
    Positive,
    /// Value is zero or greater
    NonNegative,
}

impl BuiltinRule {
    /// All built-in rules.
    pub const ALL: [BuiltinRule; 5] = [
        BuiltinRule::NotNull,
        BuiltinRule::IsNull,
        BuiltinRule::NotEmpty,
        BuiltinRule::Positive,
        BuiltinRule::NonNegative,
    ];

    /// The name used in expectation maps.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinRule::NotNull => "not_null",
            BuiltinRule::IsNull => "is_null",
            BuiltinRule::NotEmpty => "not_empty",
            BuiltinRule::Positive => "positive",
            BuiltinRule::NonNegative => "non_negative",
        }
    }

    /// Renders the predicate for an already quoted column.
    ///
    /// Comparison rules yield NULL on a null value, which counts as passing.
    pub fn predicate(&self, quoted_column: &str) -> String {
        match self {
            BuiltinRule::NotNull => format!("{quoted_column} IS NOT NULL"),
            BuiltinRule::IsNull => format!("{quoted_column} IS NULL"),
            BuiltinRule::NotEmpty => format!(
                "{quoted_column} IS NOT NULL AND length(trim(CAST({quoted_column} AS VARCHAR))) > 0"
            ),
            BuiltinRule::Positive => format!("{quoted_column} > 0"),
            BuiltinRule::NonNegative => format!("{quoted_column} >= 0"),
        }
    }
}

impl fmt::Display for BuiltinRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinRule {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BuiltinRule::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or(())
    }
}

/// A rule name resolved against a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRule {
    /// One of the built-in rules
    Builtin(BuiltinRule),
    /// A registered SQL template
    Custom {
        /// Registered name
        name: String,
        /// Template containing [`COLUMN_PLACEHOLDER`]
        template: String,
    },
}

impl ResolvedRule {
    /// The rule name as written in the expectation map.
    pub fn name(&self) -> &str {
        match self {
            ResolvedRule::Builtin(rule) => rule.name(),
            ResolvedRule::Custom { name, .. } => name,
        }
    }

    /// Renders the predicate for `column`, quoting it first.
    pub fn predicate(&self, column: &str) -> Result<String> {
        let quoted = SqlSecurity::escape_column(column)?;
        Ok(match self {
            ResolvedRule::Builtin(rule) => rule.predicate(&quoted),
            ResolvedRule::Custom { template, .. } => template.replace(COLUMN_PLACEHOLDER, &quoted),
        })
    }
}

/// Resolves rule names to predicates.
///
/// Custom rules shadow built-ins of the same name.
///
/// # Examples
///
/// ```rust
/// use schemon_client::expectations::RuleRegistry;
///
/// let registry = RuleRegistry::new()
///     .with_rule("valid_age", "{column} BETWEEN 0 AND 150")
///     .unwrap();
///
/// let rule = registry.resolve("valid_age", "age").unwrap();
/// assert_eq!(rule.predicate("age").unwrap(), "\"age\" BETWEEN 0 AND 150");
/// assert!(registry.resolve("is_prime", "age").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    custom: HashMap<String, String>,
}

impl RuleRegistry {
    /// Creates a registry holding only the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom rule, consuming and returning the registry.
    pub fn with_rule(mut self, name: impl Into<String>, template: impl Into<String>) -> Result<Self> {
        self.register(name, template)?;
        Ok(self)
    }

    /// Registers a custom rule.
    ///
    /// # Errors
    ///
    /// Fails when the name is not a plain identifier, when the template does
    /// not mention [`COLUMN_PLACEHOLDER`], or when the template fails
    /// [`SqlSecurity::validate_sql_expression`].
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) -> Result<()> {
        let name = name.into();
        let template = template.into();

        SqlSecurity::validate_simple_name(&name)?;
        if !template.contains(COLUMN_PLACEHOLDER) {
            return Err(SchemonError::Configuration(format!(
                "Rule '{name}' template must reference {COLUMN_PLACEHOLDER}"
            )));
        }
        SqlSecurity::validate_sql_expression(&template)?;

        self.custom.insert(name, template);
        Ok(())
    }

    /// Resolves `rule` for use on `column`.
    pub fn resolve(&self, rule: &str, column: &str) -> Result<ResolvedRule> {
        if let Some(template) = self.custom.get(rule) {
            return Ok(ResolvedRule::Custom {
                name: rule.to_string(),
                template: template.clone(),
            });
        }
        rule.parse::<BuiltinRule>()
            .map(ResolvedRule::Builtin)
            .map_err(|()| SchemonError::UnknownRule {
                rule: rule.to_string(),
                column: column.to_string(),
            })
    }

    /// True when `rule` resolves.
    pub fn contains(&self, rule: &str) -> bool {
        self.custom.contains_key(rule) || rule.parse::<BuiltinRule>().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_round_trip() {
        for rule in BuiltinRule::ALL {
            assert_eq!(rule.name().parse::<BuiltinRule>(), Ok(rule));
        }
        assert!("NOT_NULL".parse::<BuiltinRule>().is_err());
    }

    #[test]
    fn test_builtin_predicates() {
        let registry = RuleRegistry::new();
        let predicate = |rule: &str| registry.resolve(rule, "age").unwrap().predicate("age").unwrap();

        assert_eq!(predicate("not_null"), "\"age\" IS NOT NULL");
        assert_eq!(predicate("is_null"), "\"age\" IS NULL");
        assert_eq!(predicate("positive"), "\"age\" > 0");
        assert_eq!(predicate("non_negative"), "\"age\" >= 0");
        assert!(predicate("not_empty").starts_with("\"age\" IS NOT NULL AND"));
    }

    #[test]
    fn test_unknown_rule() {
        let err = RuleRegistry::new().resolve("is_prime", "id").unwrap_err();
        assert!(matches!(
            err,
            SchemonError::UnknownRule { ref rule, ref column } if rule == "is_prime" && column == "id"
        ));
    }

    #[test]
    fn test_custom_rule_shadows_builtin() {
        let registry = RuleRegistry::new()
            .with_rule("positive", "{column} > 10")
            .unwrap();
        let rule = registry.resolve("positive", "qty").unwrap();
        assert_eq!(rule.predicate("qty").unwrap(), "\"qty\" > 10");
        assert!(registry.contains("positive"));
        assert!(registry.contains("not_null"));
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_register_rejects_bad_templates() {
        let mut registry = RuleRegistry::new();
        assert!(registry.register("no_placeholder", "1 = 1").is_err());
        assert!(registry.register("evil", "{column} > 0; DROP TABLE t").is_err());
        assert!(registry.register("bad name", "{column} > 0").is_err());
        assert!(registry.register("ok", "{column} <> 'x'").is_ok());
    }

    #[test]
    fn test_predicate_quotes_unusual_columns() {
        let registry = RuleRegistry::new()
            .with_rule("in_range", "{column} BETWEEN 0 AND 9")
            .unwrap();
        let rule = registry.resolve("not_null", "order id").unwrap();
        assert_eq!(rule.predicate("order id").unwrap(), "\"order id\" IS NOT NULL");
        let rule = registry.resolve("in_range", "say \"hi\"").unwrap();
        assert_eq!(
            rule.predicate("say \"hi\"").unwrap(),
            "\"say \"\"hi\"\"\" BETWEEN 0 AND 9"
        );
        assert!(rule.predicate("").is_err());
    }
}
