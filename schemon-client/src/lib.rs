//! # schemon-client
//!
//! Runtime helpers for streaming data pipelines built on DataFusion.
//!
//! ## Overview
//!
//! The crate covers the glue a streaming ingestion job needs around its
//! dataframe engine:
//!
//! - **Runtime accessors** ([`runtime`]): secrets, notebook widgets (job
//!   parameters) and directory listings, each read through an explicit
//!   capability trait so jobs and tests can supply different backends.
//! - **Micro-batch routing** ([`router`], [`expectations`]): tags every row
//!   of a micro-batch against column expectations, appends valid rows to the
//!   target table and quarantines violating rows under a separate path.
//! - **Lifecycle logging** ([`listener`]): one log line per streaming query
//!   start, progress, idle and termination event.
//!
//! ## Quick Start
//!
//! ```rust
//! use schemon_client::prelude::*;
//! use schemon_client::expectations::Expectations;
//! use schemon_client::router::{BatchRouter, MemorySink};
//! use arrow::array::Int64Array;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use datafusion::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let ctx = SessionContext::new();
//! let quarantine = Arc::new(MemorySink::new());
//! let router = BatchRouter::builder(ctx.clone())
//!     .quarantine_sink(quarantine.clone())
//!     .logger(Arc::new(TracingLogger))
//!     .build()?;
//!
//! let schema = Arc::new(Schema::new(vec![Field::new("age", DataType::Int64, true)]));
//! let batch = RecordBatch::try_new(
//!     schema,
//!     vec![Arc::new(Int64Array::from(vec![Some(5), None, Some(7)]))],
//! )?;
//!
//! let expectations = Expectations::new().expect("age", "not_null");
//! let report = router
//!     .process(ctx.read_batch(batch)?, 0, "people", "/mnt/quarantine", Some(&expectations))
//!     .await?;
//!
//! assert_eq!(report.valid, 2);
//! assert_eq!(quarantine.row_count("/mnt/quarantine/people").await, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`runtime`**: secret, widget and filesystem capabilities and accessors
//! - **`expectations`**: expectation maps and the rule registry
//! - **`router`**: batch routing and the table / quarantine sinks
//! - **`listener`**: streaming lifecycle listener
//! - **`config`**: serde router configuration
//! - **`context`**: DataFusion session setup
//! - **`logging`**: the `EventLogger` capability and subscriber setup
//! - **`security`**: SQL input checks and `SecureString`
//! - **`error`**: `SchemonError` and `Result`

pub mod config;
pub mod context;
pub mod error;
pub mod expectations;
pub mod listener;
pub mod logging;
pub mod prelude;
pub mod router;
pub mod runtime;
pub mod security;
