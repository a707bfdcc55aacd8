//! In-process warehouse with the same job semantics as the managed service.
//!
//! Tables and objects live in memory. Query, export and load follow the
//! contracts of [`Warehouse`]: queries materialize with the requested write
//! disposition, exports write one whole object, and loads validate every
//! record before touching the destination so a load that exceeds its
//! malformed-row tolerance leaves the table exactly as it was.

mod codec;
mod store;

pub use store::MemoryObjectStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::core::{
    Column, ExtractJob, FieldType, JobStats, LoadJob, QueryJob, TableInfo, TableRef, TableSchema,
    Warehouse, WriteDisposition,
};
use crate::error::{Result, TransferError};

/// One table row. `None` is NULL.
pub type Row = Vec<Option<String>>;

/// Name the warehouse gives an unaliased literal column.
pub const TAG_COLUMN: &str = "f0_";

#[derive(Debug, Clone, Default)]
struct MemTable {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// Warehouse keeping tables in memory and exporting to a [`MemoryObjectStore`].
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<TableRef, MemTable>>,
    store: Arc<MemoryObjectStore>,
    job_seq: AtomicU64,
}

impl MemoryWarehouse {
    /// Create a warehouse exporting into `store`.
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            store,
            job_seq: AtomicU64::new(0),
        }
    }

    /// The object store exports are written to.
    pub fn store(&self) -> &Arc<MemoryObjectStore> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TableRef, MemTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_job_id(&self, kind: &str) -> String {
        let seq = self.job_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("memory_{}_{}", kind, seq)
    }

    /// Create or replace a table.
    pub fn create_table(&self, table: &TableRef, schema: TableSchema, rows: Vec<Row>) {
        self.lock().insert(table.clone(), MemTable { schema, rows });
    }

    /// Whether a table exists.
    pub fn table_exists(&self, table: &TableRef) -> bool {
        self.lock().contains_key(table)
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &TableRef) -> Option<Vec<Row>> {
        self.lock().get(table).map(|t| t.rows.clone())
    }

    /// Row count of a table.
    pub fn row_count(&self, table: &TableRef) -> Option<usize> {
        self.lock().get(table).map(|t| t.rows.len())
    }

    /// Schema of a table.
    pub fn schema(&self, table: &TableRef) -> Option<TableSchema> {
        self.lock().get(table).map(|t| t.schema.clone())
    }

    /// All table references, sorted.
    pub fn table_refs(&self) -> Vec<TableRef> {
        let mut refs: Vec<_> = self.lock().keys().cloned().collect();
        refs.sort_by_key(|t| t.to_string());
        refs
    }
}

fn not_found(table: &TableRef) -> TransferError {
    TransferError::reference(format!("Not found: Table {}", table))
}

/// Write `rows` into `target` according to `disposition`.
fn apply_write(
    job_id: &str,
    target: Option<&mut MemTable>,
    schema: &TableSchema,
    rows: Vec<Row>,
    disposition: WriteDisposition,
) -> Result<Option<MemTable>> {
    match (target, disposition) {
        (None, _) | (Some(_), WriteDisposition::Truncate) => Ok(Some(MemTable {
            schema: schema.clone(),
            rows,
        })),
        (Some(existing), WriteDisposition::Empty) if !existing.rows.is_empty() => Err(
            TransferError::job(job_id, "duplicate", "Destination table is not empty"),
        ),
        (Some(existing), WriteDisposition::Append | WriteDisposition::Empty) => {
            if existing.schema.column_names() != schema.column_names() {
                return Err(TransferError::job(
                    job_id,
                    "invalid",
                    "Appended rows do not match the destination schema",
                ));
            }
            existing.rows.extend(rows);
            Ok(None)
        }
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn run_query(&self, job: &QueryJob) -> Result<JobStats> {
        let job_id = self.next_job_id("query");
        debug!("{}: {}", job_id, job.select.to_sql());

        let mut tables = self.lock();
        let source = tables
            .get(&job.select.source)
            .ok_or_else(|| not_found(&job.select.source))?;

        let mut fields = vec![Column::new(TAG_COLUMN, FieldType::String)];
        fields.extend(source.schema.fields.iter().cloned());
        let schema = TableSchema::new(fields);

        let rows: Vec<Row> = source
            .rows
            .iter()
            .map(|row| {
                let mut out = Vec::with_capacity(row.len() + 1);
                out.push(Some(job.select.tag.clone()));
                out.extend(row.iter().cloned());
                out
            })
            .collect();
        let count = rows.len() as u64;

        if let Some(table) = apply_write(
            &job_id,
            tables.get_mut(&job.destination),
            &schema,
            rows,
            job.write_disposition,
        )? {
            tables.insert(job.destination.clone(), table);
        }

        Ok(JobStats {
            job_id,
            rows: Some(count),
            bytes: None,
            bad_records: 0,
        })
    }

    async fn extract(&self, job: &ExtractJob) -> Result<JobStats> {
        let job_id = self.next_job_id("extract");

        let (data, count) = {
            let tables = self.lock();
            let source = tables.get(&job.source).ok_or_else(|| not_found(&job.source))?;
            let data = codec::encode(
                &source.schema,
                &source.rows,
                job.field_delimiter as u8,
                job.print_header,
            )?;
            (data, source.rows.len() as u64)
        };

        let bytes = data.len() as u64;
        self.store.put_object(&job.destination_uri, data)?;
        debug!("{}: wrote {} rows to {}", job_id, count, job.destination_uri);

        Ok(JobStats {
            job_id,
            rows: Some(count),
            bytes: Some(bytes),
            bad_records: 0,
        })
    }

    async fn load(&self, job: &LoadJob) -> Result<JobStats> {
        let job_id = self.next_job_id("load");

        let data = self.store.get_object(&job.source_uri).ok_or_else(|| {
            TransferError::reference(format!("Not found: URI {}", job.source_uri))
        })?;
        let bytes = data.len() as u64;

        let mut tables = self.lock();
        let destination = tables
            .get_mut(&job.destination)
            .ok_or_else(|| not_found(&job.destination))?;
        let schema = destination.schema.clone();

        let decoded = codec::decode(
            &data,
            &schema,
            job.field_delimiter as u8,
            job.skip_leading_rows,
        );
        if decoded.bad_records > job.max_bad_records {
            return Err(TransferError::DataQuality {
                bad_records: decoded.bad_records,
                max_bad_records: job.max_bad_records,
                message: decoded.first_error.unwrap_or_default(),
            });
        }

        let count = decoded.rows.len() as u64;
        if let Some(table) = apply_write(
            &job_id,
            Some(destination),
            &schema,
            decoded.rows,
            job.write_disposition,
        )? {
            tables.insert(job.destination.clone(), table);
        }
        debug!(
            "{}: loaded {} rows into {} ({} rejected)",
            job_id, count, job.destination, decoded.bad_records
        );

        Ok(JobStats {
            job_id,
            rows: Some(count),
            bytes: Some(bytes),
            bad_records: decoded.bad_records,
        })
    }

    async fn table_info(&self, table: &TableRef) -> Result<TableInfo> {
        let tables = self.lock();
        let t = tables.get(table).ok_or_else(|| not_found(table))?;
        Ok(TableInfo {
            num_rows: t.rows.len() as u64,
            schema: t.schema.clone(),
        })
    }

    async fn delete_table(&self, table: &TableRef) -> Result<()> {
        self.lock().remove(table);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
