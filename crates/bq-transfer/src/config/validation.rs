//! Configuration validation.

use super::Config;
use crate::error::{Result, TransferError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.dag_id.trim().is_empty() {
        return Err(TransferError::Config("dag_id is required".into()));
    }

    if let Some(ref schedule) = config.schedule {
        if !matches!(schedule.trim().to_ascii_lowercase().as_str(), "none" | "manual") {
            return Err(TransferError::Config(format!(
                "schedule {:?} is not supported; runs are triggered manually (none or manual)",
                schedule
            )));
        }
    }

    // Resource names
    let source = config.source_table()?;
    let destination = config.destination_table()?;
    let temporary = config.temporary_table()?;
    config.export_uri()?;

    if source == destination {
        return Err(TransferError::Config(
            "source and destination cannot be the same table".into(),
        ));
    }
    if temporary == source || temporary == destination {
        return Err(TransferError::Config(format!(
            "temporary table {} must differ from source and destination",
            temporary
        )));
    }

    // Query
    if config.query.use_legacy_sql {
        return Err(TransferError::Config(
            "query.use_legacy_sql is not supported".into(),
        ));
    }
    if config.query.tag.contains(['\n', '\r']) {
        return Err(TransferError::Config(
            "query.tag must not contain line breaks".into(),
        ));
    }

    // Export / load agreement
    let delimiter = config.export.field_delimiter;
    if !delimiter.is_ascii() || matches!(delimiter, '"' | '\n' | '\r') {
        return Err(TransferError::Config(format!(
            "export.field_delimiter {:?} must be a single ASCII character other than a quote or line break",
            delimiter
        )));
    }
    let header_rows = u64::from(config.export.print_header);
    if config.load.skip_leading_rows != header_rows {
        return Err(TransferError::Config(format!(
            "load.skip_leading_rows is {} but the export writes {} header row(s)",
            config.load.skip_leading_rows, header_rows
        )));
    }

    // Connection
    if config.connection.access_token_env.trim().is_empty() {
        return Err(TransferError::Config(
            "connection.access_token_env is required".into(),
        ));
    }
    if config.connection.poll_interval_ms == 0 {
        return Err(TransferError::Config(
            "connection.poll_interval_ms must be at least 1".into(),
        ));
    }
    if config.connection.request_timeout_secs == 0 {
        return Err(TransferError::Config(
            "connection.request_timeout_secs must be at least 1".into(),
        ));
    }

    // Run policy
    if config.run.timeout_secs == 0 {
        return Err(TransferError::Config(
            "run.timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}
