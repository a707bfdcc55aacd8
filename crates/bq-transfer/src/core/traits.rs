//! Service boundaries of the pipeline.
//!
//! - [`Warehouse`]: executes query, export and load jobs and manages tables
//! - [`ObjectStore`]: manages the exported objects
//!
//! The pipeline only sequences calls across these traits. Implementations
//! own the real work, including the atomicity of bulk loads: a load that
//! exceeds its malformed-row tolerance must leave the destination unchanged.

use async_trait::async_trait;

use crate::error::Result;

use super::identifier::{ObjectUri, TableRef};
use super::job::{ExtractJob, JobStats, LoadJob, QueryJob};
use super::schema::TableInfo;

/// Managed warehouse executing jobs on behalf of the pipeline.
///
/// Every method blocks the caller until the remote job completes. Errors
/// are propagated unchanged; implementations never retry.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run a query and materialize its result set into `job.destination`.
    async fn run_query(&self, job: &QueryJob) -> Result<JobStats>;

    /// Export a table to a single delimited-text object, replacing any
    /// object already at the URI.
    ///
    /// A present but empty table produces a header-only object. A missing
    /// table is a reference error.
    async fn extract(&self, job: &ExtractJob) -> Result<JobStats>;

    /// Bulk-load a delimited-text object into a table.
    ///
    /// Either all accepted rows land or none do.
    async fn load(&self, job: &LoadJob) -> Result<JobStats>;

    /// Fetch row count and schema of a table.
    async fn table_info(&self, table: &TableRef) -> Result<TableInfo>;

    /// Delete a table. Deleting a missing table succeeds.
    async fn delete_table(&self, table: &TableRef) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Object store holding exported files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists.
    async fn object_exists(&self, uri: &ObjectUri) -> Result<bool>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete_object(&self, uri: &ObjectUri) -> Result<()>;

    /// Whether a bucket exists and is accessible.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
