//! Service driver implementations.
//!
//! This module provides implementations of the core service traits:
//!
//! - [`bigquery`]: BigQuery REST driver ([`Warehouse`])
//! - [`gcs`]: Cloud Storage JSON API driver ([`ObjectStore`])
//! - [`memory`]: in-process warehouse and object store with the same job
//!   semantics, used for dry runs and tests
//!
//! # Architecture
//!
//! Drivers are handed to the orchestrator as `Arc<dyn Trait>` so a run can
//! mix backends, e.g. the memory warehouse in tests.

pub mod bigquery;
pub mod gcs;
mod http;
pub mod memory;

pub use bigquery::{BigQueryClient, BigQuerySettings};
pub use gcs::GcsObjectStore;
pub use http::AccessToken;
pub use memory::{MemoryObjectStore, MemoryWarehouse};

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::core::{ObjectStore, Warehouse};
use crate::error::Result;

/// Build the BigQuery and Cloud Storage clients for a configuration.
///
/// # Errors
///
/// Returns an authorization error if the access token variable is unset.
pub fn connect(config: &Config) -> Result<(Arc<dyn Warehouse>, Arc<dyn ObjectStore>)> {
    let conn = &config.connection;
    let token = AccessToken::from_env(&conn.access_token_env)?;

    let warehouse = BigQueryClient::new(
        token.clone(),
        BigQuerySettings {
            base_url: conn.bigquery_url.clone(),
            location: conn.location.clone(),
            poll_interval: conn.poll_interval(),
            request_timeout: conn.request_timeout(),
            job_prefix: config.dag_id.clone(),
        },
    )?;
    let store = GcsObjectStore::new(token, conn.storage_url.clone(), conn.request_timeout())?;

    info!(
        "Connection {}: warehouse {}, object store {}",
        conn.id, conn.bigquery_url, conn.storage_url
    );
    Ok((Arc::new(warehouse), Arc::new(store)))
}
