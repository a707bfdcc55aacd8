//! Job requests sent to the warehouse and the statistics it reports back.
//!
//! Each request type encapsulates everything one remote call needs, so a
//! plan can build all three up front and the steps only hand them over.

use serde::{Deserialize, Serialize};

use super::identifier::{ObjectUri, TableRef};

/// How a job treats rows already present in its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Replace all prior contents.
    Truncate,

    /// Add to existing contents.
    #[default]
    Append,

    /// Fail unless the destination is empty.
    Empty,
}

impl WriteDisposition {
    /// Wire name used by the warehouse API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::Empty => "WRITE_EMPTY",
        }
    }
}

/// `SELECT '<tag>', a.* FROM <source> a`: every source row prefixed with a
/// literal tag column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSelect {
    /// Literal value of the leading column.
    pub tag: String,

    /// Table read by the query.
    pub source: TableRef,
}

impl TaggedSelect {
    /// Render as standard SQL.
    pub fn to_sql(&self) -> String {
        let tag = self.tag.replace('\\', "\\\\").replace('\'', "\\'");
        format!("SELECT '{}', a.* FROM {} a", tag, self.source.quoted())
    }
}

/// Query whose result set is materialized into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryJob {
    /// The query.
    pub select: TaggedSelect,

    /// Table receiving the result set.
    pub destination: TableRef,

    /// Overwrite or append.
    pub write_disposition: WriteDisposition,

    /// Legacy SQL dialect flag (always false for standard SQL).
    pub use_legacy_sql: bool,
}

/// Delimited-text export of one table to one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractJob {
    /// Table to export.
    pub source: TableRef,

    /// Object receiving the export.
    pub destination_uri: ObjectUri,

    /// Field delimiter.
    pub field_delimiter: char,

    /// Write a header row with the column names.
    pub print_header: bool,
}

/// Bulk import of one delimited-text object into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadJob {
    /// Object to import.
    pub source_uri: ObjectUri,

    /// Table receiving the rows.
    pub destination: TableRef,

    /// Leading rows to skip (the header).
    pub skip_leading_rows: u64,

    /// Malformed rows tolerated before the whole load fails.
    pub max_bad_records: u64,

    /// Overwrite or append.
    pub write_disposition: WriteDisposition,

    /// Field delimiter.
    pub field_delimiter: char,
}

/// Statistics of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Job identifier assigned by the warehouse.
    pub job_id: String,

    /// Rows produced, exported or loaded, when reported.
    pub rows: Option<u64>,

    /// Bytes processed or written, when reported.
    pub bytes: Option<u64>,

    /// Rows rejected by a load that stayed within its tolerance.
    #[serde(default)]
    pub bad_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_select_sql() {
        let select = TaggedSelect {
            tag: "GB".into(),
            source: TableRef::new("practical-case-436315-t2", "surv_source_dataset", "surv_emp_gb")
                .unwrap(),
        };
        assert_eq!(
            select.to_sql(),
            "SELECT 'GB', a.* FROM `practical-case-436315-t2.surv_source_dataset.surv_emp_gb` a"
        );
    }

    #[test]
    fn test_tagged_select_escapes_tag() {
        let select = TaggedSelect {
            tag: "O'Brien".into(),
            source: TableRef::new("my-project", "ds", "t").unwrap(),
        };
        assert!(select.to_sql().starts_with("SELECT 'O\\'Brien', a.*"));
    }

    #[test]
    fn test_write_disposition_api_names() {
        assert_eq!(WriteDisposition::Truncate.as_api_str(), "WRITE_TRUNCATE");
        assert_eq!(WriteDisposition::Append.as_api_str(), "WRITE_APPEND");
        assert_eq!(WriteDisposition::Empty.as_api_str(), "WRITE_EMPTY");
    }
}
