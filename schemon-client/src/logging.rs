//! Logging for the schemon client.
//!
//! Two concerns live here:
//!
//! - [`EventLogger`], the capability the router and the lifecycle listener
//!   report through. A structured [`TracingLogger`] is the normal choice;
//!   [`ConsoleLogger`] prints bare lines when no structured logger exists.
//! - [`LogConfig`] and [`setup`], which control the crate's own `tracing`
//!   diagnostics and install a subscriber.

use tracing::Level;

/// A sink for human-readable pipeline messages.
///
/// `stage` and `entity_name` label where the message comes from, e.g. the
/// `bronze` stage of the `orders` entity.
pub trait EventLogger: Send + Sync {
    /// Records an informational message.
    fn info(&self, message: &str, stage: Option<&str>, entity_name: Option<&str>);
}

/// Emits messages as `tracing` events with `stage` and `entity_name` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn info(&self, message: &str, stage: Option<&str>, entity_name: Option<&str>) {
        tracing::info!(
            stage = stage.unwrap_or_default(),
            entity_name = entity_name.unwrap_or_default(),
            "{message}"
        );
    }
}

/// Prints messages to stdout without any labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger;

impl EventLogger for ConsoleLogger {
    fn info(&self, message: &str, _stage: Option<&str>, _entity_name: Option<&str>) {
        println!("{message}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl EventLogger for NoopLogger {
    fn info(&self, _message: &str, _stage: Option<&str>, _entity_name: Option<&str>) {}
}

/// Controls the crate's internal diagnostics.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for schemon components
    pub base_level: Level,
    /// Whether to log generated rule SQL
    pub log_rule_details: bool,
    /// Whether to log sink writes
    pub log_data_operations: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_rule_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// True when events at `level` pass `base_level`.
    pub fn includes(&self, level: Level) -> bool {
        level <= self.base_level
    }

    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_rule_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_rule_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }
}

/// Debug logging of routing internals, gated on `base_level`.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.includes(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug logging of rule evaluation, gated on `log_rule_details`.
#[macro_export]
macro_rules! log_rule {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_rule_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Info logging of sink writes, gated on `log_data_operations`.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global `tracing` subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for schemon components specifically
        pub schemon_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                schemon_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output at warn level, schemon at info.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                schemon_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Plain output, everything at debug.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                schemon_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for schemon components.
        pub fn with_schemon_level(mut self, level: Level) -> Self {
            self.schemon_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},schemon_client={}",
                    self.level.as_str().to_lowercase(),
                    self.schemon_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` wins over the config filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use schemon_client::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
