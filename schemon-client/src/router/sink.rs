//! Destinations for routed rows.
//!
//! Valid rows go to a [`TableSink`] under the target table name. Violating
//! rows go to a [`PathSink`] under `{bad_row_path}/{target_table}`. Both
//! writes are appends.

use crate::error::{Result, SchemonError};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::catalog::{CatalogProvider, MemoryCatalogProvider, MemorySchemaProvider};
use datafusion::common::TableReference;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use datafusion::datasource::MemTable;
use datafusion::logical_expr::dml::InsertOp;
use datafusion::prelude::SessionContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

/// Appends rows to a named table.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Appends `rows` to `table`.
    async fn append_table(&self, table: &str, rows: DataFrame) -> Result<()>;
}

/// Appends rows under a storage path.
#[async_trait]
pub trait PathSink: Send + Sync {
    /// Appends `rows` under `path`.
    async fn append_path(&self, path: &str, rows: DataFrame) -> Result<()>;
}

/// Appends to tables registered in a DataFusion session.
///
/// A table that does not exist yet is created as an in-memory table with the
/// schema of the first batch written to it, together with any schema or
/// catalog a qualified name (`bronze.orders`, `lake.bronze.orders`) refers
/// to. Any provider that supports
/// `INSERT INTO` (a listing table over Parquet, for instance) can be
/// registered up front instead.
pub struct SessionTableSink {
    ctx: SessionContext,
    create_lock: Mutex<()>,
}

impl SessionTableSink {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            create_lock: Mutex::new(()),
        }
    }

    async fn ensure_table(&self, table: &str, rows: &DataFrame) -> Result<()> {
        let _guard = self.create_lock.lock().await;
        let reference = TableReference::from(table);
        self.ensure_schema(&reference)?;
        if self.ctx.table_exist(reference.clone())? {
            return Ok(());
        }

        debug!(table = %reference, "Creating in-memory target table");
        let schema = Arc::clone(rows.schema().inner());
        let provider = MemTable::try_new(schema, vec![Vec::new()])?;
        self.ctx.register_table(reference, Arc::new(provider))?;
        Ok(())
    }

    /// Creates the catalog and schema a qualified reference points into,
    /// when they do not exist yet.
    fn ensure_schema(&self, reference: &TableReference) -> Result<()> {
        let Some(schema_name) = reference.schema() else {
            return Ok(());
        };
        let defaults = self.ctx.state().config_options().catalog.clone();
        let catalog_name = reference
            .catalog()
            .unwrap_or(defaults.default_catalog.as_str());

        let catalog = match self.ctx.catalog(catalog_name) {
            Some(catalog) => catalog,
            None => {
                debug!(catalog = %catalog_name, "Creating in-memory catalog");
                let catalog: Arc<dyn CatalogProvider> = Arc::new(MemoryCatalogProvider::new());
                self.ctx.register_catalog(catalog_name, Arc::clone(&catalog));
                catalog
            }
        };

        if catalog.schema(schema_name).is_none() {
            debug!(catalog = %catalog_name, schema = %schema_name, "Creating in-memory schema");
            catalog.register_schema(schema_name, Arc::new(MemorySchemaProvider::new()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TableSink for SessionTableSink {
    #[instrument(skip(self, rows))]
    async fn append_table(&self, table: &str, rows: DataFrame) -> Result<()> {
        self.ensure_table(table, &rows).await?;

        let options = DataFrameWriteOptions::new().with_insert_operation(InsertOp::Append);
        rows.write_table(table, options)
            .await
            .map_err(|e| SchemonError::sink_with_source(table, "table append failed", Box::new(e)))?;
        Ok(())
    }
}

/// Appends Parquet part files into a directory.
///
/// Each call adds new uniquely named files, so repeated batches accumulate
/// rather than overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetPathSink;

impl ParquetPathSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PathSink for ParquetPathSink {
    #[instrument(skip(self, rows))]
    async fn append_path(&self, path: &str, rows: DataFrame) -> Result<()> {
        if path.trim().is_empty() {
            return Err(SchemonError::sink(path, "quarantine path cannot be empty"));
        }

        // A trailing slash makes DataFusion treat the target as a directory
        // even when the last segment looks like a file extension.
        let directory = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };

        rows.write_parquet(&directory, DataFrameWriteOptions::new(), None)
            .await
            .map_err(|e| SchemonError::sink_with_source(path, "parquet append failed", Box::new(e)))?;
        Ok(())
    }
}

/// Keeps appended batches in memory, keyed by table name or path.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Arc<RwLock<HashMap<String, Vec<RecordBatch>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    async fn append(&self, target: &str, rows: DataFrame) -> Result<()> {
        let batches = rows.collect().await?;
        self.writes
            .write()
            .await
            .entry(target.to_string())
            .or_default()
            .extend(batches);
        Ok(())
    }

    /// Batches written to `target`, in write order.
    pub async fn batches(&self, target: &str) -> Vec<RecordBatch> {
        self.writes
            .read()
            .await
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    /// Total rows written to `target`.
    pub async fn row_count(&self, target: &str) -> usize {
        self.writes
            .read()
            .await
            .get(target)
            .map(|batches| batches.iter().map(RecordBatch::num_rows).sum())
            .unwrap_or(0)
    }

    /// Every target written to, sorted.
    pub async fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.writes.read().await.keys().cloned().collect();
        targets.sort();
        targets
    }
}

#[async_trait]
impl TableSink for MemorySink {
    async fn append_table(&self, table: &str, rows: DataFrame) -> Result<()> {
        self.append(table, rows).await
    }
}

#[async_trait]
impl PathSink for MemorySink {
    async fn append_path(&self, path: &str, rows: DataFrame) -> Result<()> {
        self.append(path, rows).await
    }
}
