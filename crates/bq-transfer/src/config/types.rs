//! Configuration type definitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ObjectUri, TableRef, WriteDisposition};
use crate::error::Result;

/// Root configuration structure.
///
/// Loaded once per run and passed by reference to every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workflow identifier, used in logs and job ids.
    #[serde(default = "default_dag_id")]
    pub dag_id: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owner tag.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Earliest time a run may start. Defaults to one day before load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,

    /// Trigger schedule. Runs are started on demand: `none` or `manual`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Service connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Table read by the query step.
    pub source: TableConfig,

    /// Query step settings.
    #[serde(default)]
    pub query: QueryConfig,

    /// Table materializing the query result.
    #[serde(default)]
    pub temporary: TemporaryConfig,

    /// Export step settings.
    pub export: ExportConfig,

    /// Table receiving the loaded rows.
    pub destination: TableConfig,

    /// Load step settings.
    #[serde(default)]
    pub load: LoadConfig,

    /// Run-level policy.
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Source table coordinates.
    pub fn source_table(&self) -> Result<TableRef> {
        self.source.to_table_ref()
    }

    /// Destination table coordinates.
    pub fn destination_table(&self) -> Result<TableRef> {
        self.destination.to_table_ref()
    }

    /// Base temporary table. Project and dataset default to the source's.
    pub fn temporary_table(&self) -> Result<TableRef> {
        TableRef::new(
            self.temporary
                .project
                .clone()
                .unwrap_or_else(|| self.source.project.clone()),
            self.temporary
                .dataset
                .clone()
                .unwrap_or_else(|| self.source.dataset.clone()),
            self.temporary.table.clone(),
        )
    }

    /// Base export object.
    pub fn export_uri(&self) -> Result<ObjectUri> {
        ObjectUri::new(self.export.bucket.clone(), self.export.file_name.clone())
    }

    /// Effective start date.
    pub fn effective_start_date(&self) -> DateTime<Utc> {
        self.start_date
            .unwrap_or_else(|| Utc::now() - chrono::Duration::days(1))
    }
}

/// Connection to the warehouse and object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection identifier (informational, shown in logs).
    #[serde(default = "default_connection_id")]
    pub id: String,

    /// Environment variable holding the OAuth access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// BigQuery API base URL.
    #[serde(default = "default_bigquery_url")]
    pub bigquery_url: String,

    /// Cloud Storage API base URL.
    #[serde(default = "default_storage_url")]
    pub storage_url: String,

    /// Job location (e.g. "EU"). Unset lets the service decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Delay between job status polls in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds (default: 60).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            id: default_connection_id(),
            access_token_env: default_access_token_env(),
            bigquery_url: default_bigquery_url(),
            storage_url: default_storage_url(),
            location: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Table coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Project id.
    pub project: String,

    /// Dataset id.
    pub dataset: String,

    /// Table id.
    pub table: String,
}

impl TableConfig {
    /// Validated table reference.
    pub fn to_table_ref(&self) -> Result<TableRef> {
        TableRef::new(
            self.project.clone(),
            self.dataset.clone(),
            self.table.clone(),
        )
    }
}

/// Query step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Literal value of the leading tag column (default: "GB").
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Legacy SQL dialect (default: false). Only standard SQL is supported.
    #[serde(default)]
    pub use_legacy_sql: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            use_legacy_sql: false,
        }
    }
}

/// Temporary table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryConfig {
    /// Project id (default: source project).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Dataset id (default: source dataset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    /// Table id (default: "temporary_table").
    #[serde(default = "default_temporary_table")]
    pub table: String,
}

impl Default for TemporaryConfig {
    fn default() -> Self {
        Self {
            project: None,
            dataset: None,
            table: default_temporary_table(),
        }
    }
}

/// Export step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Destination bucket.
    pub bucket: String,

    /// Object name within the bucket.
    pub file_name: String,

    /// Field delimiter (default: ',').
    #[serde(default = "default_delimiter")]
    pub field_delimiter: char,

    /// Write a header row (default: true).
    #[serde(default = "default_true")]
    pub print_header: bool,
}

/// Load step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Leading rows skipped by the load (default: 1, the header).
    #[serde(default = "default_skip_leading_rows")]
    pub skip_leading_rows: u64,

    /// Malformed rows tolerated before the load fails (default: 1).
    #[serde(default = "default_max_bad_records")]
    pub max_bad_records: u64,

    /// Write disposition (default: append).
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_leading_rows: default_skip_leading_rows(),
            max_bad_records: default_max_bad_records(),
            write_disposition: WriteDisposition::Append,
        }
    }
}

/// Run-level policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Whole-run retries after a failed attempt (default: 1).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before a retry in seconds (default: 300).
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Budget for the whole run, retries included, in seconds (default: 1200).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Suffix the temporary table and export object with the run id
    /// (default: true). When false, all runs share the fixed names.
    #[serde(default = "default_true")]
    pub unique_resources: bool,

    /// Delete the temporary table and export object after a successful
    /// load (default: true).
    #[serde(default = "default_true")]
    pub cleanup: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
            unique_resources: true,
            cleanup: true,
        }
    }
}

impl RunConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

// Default value functions for serde
fn default_dag_id() -> String {
    "bq_transfer_dataset".to_string()
}

fn default_owner() -> String {
    "airflow".to_string()
}

fn default_connection_id() -> String {
    "GCP_CONNECTION_ID".to_string()
}

fn default_access_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".to_string()
}

fn default_bigquery_url() -> String {
    "https://bigquery.googleapis.com".to_string()
}

fn default_storage_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_tag() -> String {
    "GB".to_string()
}

fn default_temporary_table() -> String {
    "temporary_table".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_skip_leading_rows() -> u64 {
    1
}

fn default_max_bad_records() -> u64 {
    1
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    1200
}

fn default_true() -> bool {
    true
}
