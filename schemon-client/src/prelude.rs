//! Prelude for commonly used types and traits in schemon-client.

pub use crate::config::RouterConfig;
pub use crate::error::{ErrorContext, Result, SchemonError};
pub use crate::logging::{ConsoleLogger, EventLogger, LogConfig, NoopLogger, TracingLogger};
pub use crate::router::{BatchReport, BatchRouter, ForeachBatch};
pub use crate::security::SecureString;
