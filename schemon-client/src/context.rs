//! DataFusion session setup for micro-batch routing.
//!
//! [`SchemonContext`] wraps a [`SessionContext`] configured with a bounded
//! fair-spill memory pool. Router temp views and the default table sink both
//! live in this session.

use crate::error::Result;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use std::sync::Arc;
use tracing::instrument;

/// Configuration for creating a [`SchemonContext`].
#[derive(Debug, Clone)]
pub struct SchemonContextConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
}

impl Default for SchemonContextConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}

/// A managed DataFusion session.
///
/// # Examples
///
/// ```rust
/// use schemon_client::context::SchemonContext;
///
/// let ctx = SchemonContext::new().unwrap();
/// let session = ctx.session().clone();
/// # let _ = session;
/// ```
#[derive(Clone)]
pub struct SchemonContext {
    session: SessionContext,
    config: SchemonContextConfig,
}

impl std::fmt::Debug for SchemonContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemonContext")
            .field("session_id", &self.session.session_id())
            .field("config", &self.config)
            .finish()
    }
}

impl SchemonContext {
    /// Creates a context with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(SchemonContextConfig::default())
    }

    /// Creates a context with custom configuration.
    #[instrument(skip(config), fields(batch_size = config.batch_size, target_partitions = config.target_partitions))]
    pub fn with_config(config: SchemonContextConfig) -> Result<Self> {
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions);

        let memory_pool = Arc::new(FairSpillPool::new(config.max_memory)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .build()
            .map(Arc::new)?;

        Ok(Self {
            session: SessionContext::new_with_config_rt(session_config, runtime_env),
            config,
        })
    }

    /// The underlying DataFusion session.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The configuration used to create this context.
    pub fn config(&self) -> &SchemonContextConfig {
        &self.config
    }
}

impl From<SchemonContext> for SessionContext {
    fn from(ctx: SchemonContext) -> Self {
        ctx.session
    }
}
