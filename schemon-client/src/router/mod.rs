//! Expectation-based micro-batch routing.
//!
//! [`BatchRouter`] is the body of a `foreachBatch`-style callback. For every
//! micro-batch it:
//!
//! 1. tags each row with a violation message built from the failed
//!    expectations (one SQL projection over the batch),
//! 2. splits the batch into valid rows (no message) and violating rows,
//! 3. appends valid rows, without the tag column, to the target table,
//! 4. appends violating rows, with the tag column, under
//!    `{bad_row_path}/{target_table}`,
//! 5. reports the counts through the [`EventLogger`].
//!
//! Nothing is retried here. A failed rule lookup, query or write is returned
//! to the caller, whose scheduler decides whether to replay the batch.
//!
//! # Examples
//!
//! ```rust,no_run
//! use schemon_client::expectations::Expectations;
//! use schemon_client::router::{BatchRouter, MemorySink};
//! use datafusion::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(batch: DataFrame) -> schemon_client::error::Result<()> {
//! let ctx = SessionContext::new();
//! let quarantine = Arc::new(MemorySink::new());
//! let router = BatchRouter::builder(ctx)
//!     .quarantine_sink(quarantine.clone())
//!     .build()?;
//!
//! let expectations = Expectations::new().expect("age", "not_null");
//! let report = router
//!     .process(batch, 42, "people", "/mnt/quarantine", Some(&expectations))
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

mod sink;

pub use sink::{MemorySink, ParquetPathSink, PathSink, SessionTableSink, TableSink};

use crate::config::RouterConfig;
use crate::error::{Result, SchemonError};
use crate::expectations::{Expectations, RuleRegistry};
use crate::logging::{truncate_field, ConsoleLogger, EventLogger, LogConfig};
use crate::security::SqlSecurity;
use crate::{log_data_op, log_rule, perf_debug};
use datafusion::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::instrument;

/// Default name of the per-row violation tag column.
pub const DEFAULT_VIOLATION_COLUMN: &str = "violation_message";

static VIEW_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The result of splitting one micro-batch.
pub struct RoutedBatch {
    /// Rows that passed every expectation, with the batch's original schema
    pub valid: DataFrame,
    /// Rows that failed at least one expectation, including the tag column.
    /// `None` when no expectations were supplied.
    pub violating: Option<DataFrame>,
    /// Rows in the incoming batch
    pub total: usize,
    /// Rows in `valid`
    pub valid_count: usize,
    /// Rows in `violating`
    pub violating_count: usize,
}

impl std::fmt::Debug for RoutedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedBatch")
            .field("total", &self.total)
            .field("valid_count", &self.valid_count)
            .field("violating_count", &self.violating_count)
            .finish()
    }
}

/// Counts and destinations for one processed micro-batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub epoch_id: i64,
    pub target_table: String,
    pub quarantine_path: String,
    pub total: usize,
    pub valid: usize,
    pub violating: usize,
    /// Whether expectations were applied to the batch
    pub validated: bool,
}

impl BatchReport {
    /// The log message for this batch. Counts of valid and violating rows
    /// appear only when the batch was validated.
    ///
    /// The violating line always names the joined
    /// `{bad_row_path}/{target_table}` location, even for a batch with zero
    /// violations, rather than the bare `bad_row_path`. Log consumers keyed
    /// on the base path alone will not match it.
    pub fn summary(&self) -> String {
        let mut message = format!(
            "Batch {} | {} records processed.",
            self.epoch_id, self.total
        );
        if self.validated {
            message.push_str(&format!(
                "\nBatch {} | {} valid records written to {}.",
                self.epoch_id, self.valid, self.target_table
            ));
            message.push_str(&format!(
                "\nBatch {} | {} violating records redirected to {}.",
                self.epoch_id, self.violating, self.quarantine_path
            ));
        }
        message
    }
}

/// Joins the quarantine base path and the target table.
pub fn quarantine_path(bad_row_path: &str, target_table: &str) -> Result<String> {
    if bad_row_path.trim().is_empty() {
        return Err(SchemonError::Configuration(
            "bad_row_path cannot be empty".to_string(),
        ));
    }
    Ok(format!(
        "{}/{target_table}",
        bad_row_path.trim_end_matches('/')
    ))
}

/// Validates micro-batches against expectations and routes their rows.
pub struct BatchRouter {
    ctx: SessionContext,
    table_sink: Arc<dyn TableSink>,
    quarantine_sink: Arc<dyn PathSink>,
    registry: RuleRegistry,
    logger: Arc<dyn EventLogger>,
    log_config: LogConfig,
    violation_column: String,
    stage: Option<String>,
    entity_name: Option<String>,
}

impl BatchRouter {
    /// Starts building a router over `ctx`.
    ///
    /// Defaults: valid rows go to a [`SessionTableSink`] on the same session,
    /// violating rows to a [`ParquetPathSink`], messages to a
    /// [`ConsoleLogger`].
    pub fn builder(ctx: SessionContext) -> BatchRouterBuilder {
        BatchRouterBuilder::new(ctx)
    }

    /// Name of the violation tag column.
    pub fn violation_column(&self) -> &str {
        &self.violation_column
    }

    /// Binds one query's target table, quarantine path and expectations.
    pub fn for_target(
        self: &Arc<Self>,
        target_table: impl Into<String>,
        bad_row_path: impl Into<String>,
        expectations: Option<Expectations>,
    ) -> ForeachBatch {
        ForeachBatch::new(Arc::clone(self), target_table, bad_row_path, expectations)
    }

    /// Tags and splits `batch` without writing anything.
    ///
    /// Without expectations (or with an empty map) every row is valid and
    /// `violating` is `None`. Otherwise `valid_count + violating_count ==
    /// total` and the two frames are disjoint.
    pub async fn route(
        &self,
        batch: DataFrame,
        expectations: Option<&Expectations>,
    ) -> Result<RoutedBatch> {
        let expectations = match expectations {
            Some(expectations) if !expectations.is_empty() => expectations,
            _ => {
                let total = batch.clone().count().await?;
                return Ok(RoutedBatch {
                    valid: batch,
                    violating: None,
                    total,
                    valid_count: total,
                    violating_count: 0,
                });
            }
        };

        let checks = self.violation_checks(expectations)?;
        let checked = self.tag_violations(batch, &checks).await?;

        let tag = ident(self.violation_column.as_str());
        let valid = checked
            .clone()
            .filter(tag.clone().is_null().or(tag.clone().eq(lit(""))))?
            .drop_columns(&[self.violation_column.as_str()])?;
        let violating = checked
            .clone()
            .filter(tag.clone().is_not_null().and(tag.not_eq(lit(""))))?;

        let total = checked.count().await?;
        let valid_count = valid.clone().count().await?;
        let violating_count = violating.clone().count().await?;
        perf_debug!(self.log_config, total, valid_count, violating_count, "Routed batch");

        Ok(RoutedBatch {
            valid,
            violating: Some(violating),
            total,
            valid_count,
            violating_count,
        })
    }

    /// Routes `batch` and writes both row sets.
    ///
    /// Each sink is only called when it has at least one row to append.
    #[instrument(skip(self, batch, expectations), fields(epoch_id = epoch_id, target_table = %target_table))]
    pub async fn process(
        &self,
        batch: DataFrame,
        epoch_id: i64,
        target_table: &str,
        bad_row_path: &str,
        expectations: Option<&Expectations>,
    ) -> Result<BatchReport> {
        SqlSecurity::validate_identifier(target_table)?;
        let quarantine_path = quarantine_path(bad_row_path, target_table)?;

        let routed = self.route(batch, expectations).await?;

        if routed.valid_count > 0 {
            log_data_op!(
                self.log_config,
                epoch_id,
                table = %target_table,
                rows = routed.valid_count,
                "Appending valid rows"
            );
            self.table_sink
                .append_table(target_table, routed.valid)
                .await?;
        }

        if let Some(violating) = routed.violating.filter(|_| routed.violating_count > 0) {
            log_data_op!(
                self.log_config,
                epoch_id,
                path = %quarantine_path,
                rows = routed.violating_count,
                "Appending violating rows"
            );
            self.quarantine_sink
                .append_path(&quarantine_path, violating)
                .await?;
        }

        let report = BatchReport {
            epoch_id,
            target_table: target_table.to_string(),
            quarantine_path,
            total: routed.total,
            valid: routed.valid_count,
            violating: routed.violating_count,
            validated: expectations.is_some_and(|e| !e.is_empty()),
        };

        self.logger.info(
            &report.summary(),
            self.stage.as_deref(),
            self.entity_name.as_deref(),
        );
        Ok(report)
    }

    /// One `CASE` expression per expectation, yielding the failure message
    /// or NULL. Every rule is resolved before any SQL runs.
    fn violation_checks(&self, expectations: &Expectations) -> Result<Vec<String>> {
        expectations
            .iter()
            .map(|(column, rule)| {
                let predicate = self.registry.resolve(rule, column)?.predicate(column)?;
                let message = format!("Column {column} failed '{rule}'");
                Ok(format!(
                    "CASE WHEN NOT ({predicate}) THEN {} END",
                    SqlSecurity::quote_literal(&message)
                ))
            })
            .collect()
    }

    /// Appends the violation tag column and materializes the result.
    ///
    /// An existing column with the tag's name is replaced.
    async fn tag_violations(&self, batch: DataFrame, checks: &[String]) -> Result<DataFrame> {
        let batch = if batch
            .schema()
            .has_column_with_unqualified_name(&self.violation_column)
        {
            batch.drop_columns(&[self.violation_column.as_str()])?
        } else {
            batch
        };

        let view = format!(
            "__schemon_batch_{}",
            VIEW_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let sql = format!(
            "SELECT *, concat_ws(', ', {}) AS {} FROM \"{view}\"",
            checks.join(", "),
            SqlSecurity::escape_column(&self.violation_column)?
        );
        log_rule!(
            self.log_config,
            sql = %truncate_field(&sql, self.log_config.max_field_length),
            "Generated violation projection"
        );

        self.ctx.register_table(view.as_str(), batch.into_view())?;
        let checked = match self.ctx.sql(&sql).await {
            Ok(df) => df.cache().await,
            Err(e) => Err(e),
        };
        self.ctx.deregister_table(view.as_str())?;
        Ok(checked?)
    }
}

/// Builder for [`BatchRouter`].
pub struct BatchRouterBuilder {
    ctx: SessionContext,
    table_sink: Option<Arc<dyn TableSink>>,
    quarantine_sink: Option<Arc<dyn PathSink>>,
    registry: RuleRegistry,
    logger: Arc<dyn EventLogger>,
    log_config: LogConfig,
    violation_column: String,
    stage: Option<String>,
    entity_name: Option<String>,
}

impl BatchRouterBuilder {
    fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            table_sink: None,
            quarantine_sink: None,
            registry: RuleRegistry::new(),
            logger: Arc::new(ConsoleLogger),
            log_config: LogConfig::default(),
            violation_column: DEFAULT_VIOLATION_COLUMN.to_string(),
            stage: None,
            entity_name: None,
        }
    }

    /// Sink for valid rows.
    pub fn table_sink(mut self, sink: Arc<dyn TableSink>) -> Self {
        self.table_sink = Some(sink);
        self
    }

    /// Sink for violating rows.
    pub fn quarantine_sink(mut self, sink: Arc<dyn PathSink>) -> Self {
        self.quarantine_sink = Some(sink);
        self
    }

    /// Rules available to expectations.
    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Receiver of per-batch summaries.
    pub fn logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn violation_column(mut self, column: impl Into<String>) -> Self {
        self.violation_column = column.into();
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = Some(entity_name.into());
        self
    }

    /// Applies the router-level settings of a [`RouterConfig`]: violation
    /// column, stage and entity name.
    pub fn config(mut self, config: &RouterConfig) -> Self {
        self.violation_column = config.violation_column.clone();
        self.stage = config.stage.clone();
        self.entity_name = config.entity_name.clone();
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// Fails when the violation column is not a valid column name.
    pub fn build(self) -> Result<BatchRouter> {
        SqlSecurity::validate_simple_name(&self.violation_column)?;

        let table_sink = self
            .table_sink
            .unwrap_or_else(|| Arc::new(SessionTableSink::new(self.ctx.clone())));
        let quarantine_sink = self
            .quarantine_sink
            .unwrap_or_else(|| Arc::new(ParquetPathSink::new()));

        Ok(BatchRouter {
            ctx: self.ctx,
            table_sink,
            quarantine_sink,
            registry: self.registry,
            logger: self.logger,
            log_config: self.log_config,
            violation_column: self.violation_column,
            stage: self.stage,
            entity_name: self.entity_name,
        })
    }
}

/// A router bound to one query's target table, quarantine path and
/// expectations: the callback handed to the micro-batch scheduler.
#[derive(Clone)]
pub struct ForeachBatch {
    router: Arc<BatchRouter>,
    target_table: String,
    bad_row_path: String,
    expectations: Option<Expectations>,
}

impl ForeachBatch {
    pub fn new(
        router: Arc<BatchRouter>,
        target_table: impl Into<String>,
        bad_row_path: impl Into<String>,
        expectations: Option<Expectations>,
    ) -> Self {
        Self {
            router,
            target_table: target_table.into(),
            bad_row_path: bad_row_path.into(),
            expectations,
        }
    }

    /// Binds the target arguments of a validated [`RouterConfig`].
    pub fn from_config(router: Arc<BatchRouter>, config: &RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            router,
            config.target_table.clone(),
            config.bad_row_path.clone(),
            config.expectations.clone(),
        ))
    }

    /// Processes one micro-batch.
    pub async fn call(&self, batch: DataFrame, epoch_id: i64) -> Result<BatchReport> {
        self.router
            .process(
                batch,
                epoch_id,
                &self.target_table,
                &self.bad_row_path,
                self.expectations.as_ref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoopLogger;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    fn ages_frame(ctx: &SessionContext, ages: Vec<Option<i64>>) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![Field::new("age", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(ages))]).unwrap();
        ctx.read_batch(batch).unwrap()
    }

    fn string_column(batches: &[RecordBatch], name: &str) -> Vec<Option<String>> {
        batches
            .iter()
            .flat_map(|batch| {
                let column = batch.column_by_name(name).unwrap();
                let column = arrow::compute::cast(column, &DataType::Utf8).unwrap();
                let strings = column.as_any().downcast_ref::<StringArray>().unwrap().clone();
                (0..strings.len())
                    .map(|i| (!strings.is_null(i)).then(|| strings.value(i).to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn router(ctx: &SessionContext, sink: &Arc<MemorySink>) -> BatchRouter {
        BatchRouter::builder(ctx.clone())
            .table_sink(sink.clone())
            .quarantine_sink(sink.clone())
            .logger(Arc::new(NoopLogger))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_route_without_expectations_keeps_everything() {
        let ctx = SessionContext::new();
        let sink = Arc::new(MemorySink::new());
        let router = router(&ctx, &sink);

        let routed = router
            .route(ages_frame(&ctx, vec![Some(1), None]), None)
            .await
            .unwrap();
        assert_eq!(routed.total, 2);
        assert_eq!(routed.valid_count, 2);
        assert!(routed.violating.is_none());

        let routed = router
            .route(ages_frame(&ctx, vec![None]), Some(&Expectations::new()))
            .await
            .unwrap();
        assert_eq!(routed.valid_count, 1);
        assert!(routed.violating.is_none());
    }

    #[tokio::test]
    async fn test_route_tags_null_ages() {
        let ctx = SessionContext::new();
        let sink = Arc::new(MemorySink::new());
        let router = router(&ctx, &sink);
        let expectations = Expectations::new().expect("age", "not_null");

        let routed = router
            .route(
                ages_frame(&ctx, vec![Some(5), None, Some(7)]),
                Some(&expectations),
            )
            .await
            .unwrap();

        assert_eq!(routed.total, 3);
        assert_eq!(routed.valid_count, 2);
        assert_eq!(routed.violating_count, 1);

        let valid = routed.valid.collect().await.unwrap();
        assert!(valid.iter().all(|b| b.schema().fields().len() == 1));

        let violating = routed.violating.unwrap().collect().await.unwrap();
        assert_eq!(
            string_column(&violating, DEFAULT_VIOLATION_COLUMN),
            vec![Some("Column age failed 'not_null'".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unknown_rule_fails_before_routing() {
        let ctx = SessionContext::new();
        let sink = Arc::new(MemorySink::new());
        let router = router(&ctx, &sink);
        let expectations = Expectations::new().expect("age", "is_prime");

        let err = router
            .process(
                ages_frame(&ctx, vec![Some(1)]),
                0,
                "people",
                "/quarantine",
                Some(&expectations),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchemonError::UnknownRule { .. }));
        assert!(sink.targets().await.is_empty());
    }

    #[tokio::test]
    async fn test_temporary_views_are_deregistered() {
        let ctx = SessionContext::new();
        let sink = Arc::new(MemorySink::new());
        let router = router(&ctx, &sink);
        let expectations = Expectations::new().expect("age", "positive");

        router
            .route(ages_frame(&ctx, vec![Some(-1)]), Some(&expectations))
            .await
            .unwrap();

        let schema = ctx.catalog("datafusion").unwrap().schema("public").unwrap();
        assert!(schema
            .table_names()
            .iter()
            .all(|name| !name.starts_with("__schemon_batch_")));
    }

    #[test]
    fn test_quarantine_path() {
        assert_eq!(quarantine_path("/mnt/bad", "orders").unwrap(), "/mnt/bad/orders");
        assert_eq!(quarantine_path("/mnt/bad/", "orders").unwrap(), "/mnt/bad/orders");
        assert_eq!(
            quarantine_path("s3://bucket/bad", "sales.orders").unwrap(),
            "s3://bucket/bad/sales.orders"
        );
        assert!(quarantine_path("  ", "orders").is_err());
    }

    #[test]
    fn test_summary_lines() {
        let mut report = BatchReport {
            epoch_id: 7,
            target_table: "orders".to_string(),
            quarantine_path: "/bad/orders".to_string(),
            total: 10,
            valid: 8,
            violating: 2,
            validated: true,
        };
        assert_eq!(
            report.summary(),
            "Batch 7 | 10 records processed.\n\
             Batch 7 | 8 valid records written to orders.\n\
             Batch 7 | 2 violating records redirected to /bad/orders."
        );

        report.validated = false;
        assert_eq!(report.summary(), "Batch 7 | 10 records processed.");
    }

    #[tokio::test]
    async fn test_clean_batch_reports_joined_quarantine_path() {
        let ctx = SessionContext::new();
        let sink = Arc::new(MemorySink::new());
        let router = router(&ctx, &sink);
        let expectations = Expectations::new().expect("age", "not_null");

        let report = router
            .process(
                ages_frame(&ctx, vec![Some(1), Some(2)]),
                3,
                "people",
                "/mnt/bad/",
                Some(&expectations),
            )
            .await
            .unwrap();

        assert_eq!(report.violating, 0);
        assert!(report
            .summary()
            .ends_with("Batch 3 | 0 violating records redirected to /mnt/bad/people."));
        assert!(sink.batches("/mnt/bad/people").await.is_empty());
    }

    #[test]
    fn test_builder_rejects_bad_violation_column() {
        let result = BatchRouter::builder(SessionContext::new())
            .violation_column("bad column")
            .build();
        assert!(result.is_err());
    }
}
