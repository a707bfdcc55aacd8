//! Resolution of a configuration into the concrete jobs of one run.

use serde::Serialize;

use crate::config::Config;
use crate::core::{
    ExtractJob, LoadJob, ObjectUri, QueryJob, TableRef, TaggedSelect, WriteDisposition,
};
use crate::error::{Result, TransferError};

use super::step::Step;

/// Every resource name and job request of one run, resolved up front.
///
/// Steps never read the configuration directly; they receive the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    /// Run identifier.
    pub run_id: String,

    /// Table read by the query.
    pub source: TableRef,

    /// Table the query result is materialized into.
    pub temporary_table: TableRef,

    /// Object the temporary table is exported to.
    pub export_uri: ObjectUri,

    /// Table receiving the loaded rows.
    pub destination: TableRef,

    /// Query step request.
    pub query: QueryJob,

    /// Export step request.
    pub extract: ExtractJob,

    /// Load step request.
    pub load: LoadJob,

    /// Whether the cleanup step deletes the intermediate resources.
    pub cleanup: bool,
}

/// Generate a fresh run id.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Suffix derived from a run id: lowercase alphanumerics only.
pub fn run_suffix(run_id: &str) -> Result<String> {
    let suffix: String = run_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if suffix.is_empty() {
        return Err(TransferError::Config(format!(
            "Run id {:?} must contain at least one letter or digit",
            run_id
        )));
    }
    Ok(suffix)
}

impl RunPlan {
    /// Build the plan for `run_id`.
    ///
    /// With `run.unique_resources` the temporary table and export object are
    /// suffixed with the run id so overlapping runs never share them;
    /// otherwise every run reuses the fixed names.
    pub fn from_config(config: &Config, run_id: &str) -> Result<Self> {
        let source = config.source_table()?;
        let destination = config.destination_table()?;
        let base_table = config.temporary_table()?;
        let base_uri = config.export_uri()?;

        let (temporary_table, export_uri) = if config.run.unique_resources {
            let suffix = run_suffix(run_id)?;
            (
                base_table.with_table_suffix(&suffix)?,
                base_uri.with_suffix(&suffix)?,
            )
        } else {
            (base_table, base_uri)
        };

        let query = QueryJob {
            select: TaggedSelect {
                tag: config.query.tag.clone(),
                source: source.clone(),
            },
            destination: temporary_table.clone(),
            write_disposition: WriteDisposition::Truncate,
            use_legacy_sql: config.query.use_legacy_sql,
        };

        let extract = ExtractJob {
            source: temporary_table.clone(),
            destination_uri: export_uri.clone(),
            field_delimiter: config.export.field_delimiter,
            print_header: config.export.print_header,
        };

        let load = LoadJob {
            source_uri: export_uri.clone(),
            destination: destination.clone(),
            skip_leading_rows: config.load.skip_leading_rows,
            max_bad_records: config.load.max_bad_records,
            write_disposition: config.load.write_disposition,
            field_delimiter: config.export.field_delimiter,
        };

        Ok(Self {
            run_id: run_id.to_string(),
            source,
            temporary_table,
            export_uri,
            destination,
            query,
            extract,
            load,
            cleanup: config.run.cleanup,
        })
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &'static [Step] {
        &Step::ALL
    }
}
