//! Validated identifiers for warehouse tables and object-store objects.
//!
//! Table coordinates end up inside generated SQL and REST paths, and object
//! names inside `gs://` URIs. Identifiers cannot be bound as query
//! parameters, so every name is checked against the service's naming rules
//! before it is used anywhere.
//!
//! # Rules
//!
//! - Project: 6-30 lowercase letters, digits or hyphens, starting with a
//!   letter, optionally prefixed by a `domain:` qualifier.
//! - Dataset: letters, digits and underscores, at most 1024 bytes.
//! - Table: letters, digits, underscores and hyphens, at most 1024 bytes.
//! - Bucket: 3-63 lowercase letters, digits, `-`, `_` or `.`, starting and
//!   ending with a letter or digit.
//! - Object: non-empty, at most 1024 bytes, no NUL, CR or LF.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

const MAX_NAME_LENGTH: usize = 1024;
const OBJECT_URI_SCHEME: &str = "gs://";

fn invalid(kind: &str, name: &str, why: &str) -> TransferError {
    TransferError::Config(format!("Invalid {} name {:?}: {}", kind, name, why))
}

fn check_common(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(kind, name, "must not be empty"));
    }
    if name.contains('\0') {
        return Err(invalid(kind, name, "contains a null byte"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(invalid(
            kind,
            name,
            &format!("exceeds {} bytes", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// Validate a project id.
pub fn validate_project(name: &str) -> Result<()> {
    check_common("project", name)?;

    let id = match name.rsplit_once(':') {
        Some((domain, id)) => {
            if domain.is_empty()
                || !domain
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            {
                return Err(invalid("project", name, "malformed domain prefix"));
            }
            id
        }
        None => name,
    };

    if !(6..=30).contains(&id.len()) {
        return Err(invalid("project", name, "must be 6-30 characters"));
    }
    if !id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("project", name, "must start with a lowercase letter"));
    }
    if id.ends_with('-') {
        return Err(invalid("project", name, "must not end with a hyphen"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "project",
            name,
            "only lowercase letters, digits and hyphens are allowed",
        ));
    }
    Ok(())
}

/// Validate a dataset id.
pub fn validate_dataset(name: &str) -> Result<()> {
    check_common("dataset", name)?;
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(
            "dataset",
            name,
            "only letters, digits and underscores are allowed",
        ));
    }
    Ok(())
}

/// Validate a table id.
pub fn validate_table(name: &str) -> Result<()> {
    check_common("table", name)?;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            "table",
            name,
            "only letters, digits, underscores and hyphens are allowed",
        ));
    }
    Ok(())
}

/// Validate a bucket name.
pub fn validate_bucket(name: &str) -> Result<()> {
    check_common("bucket", name)?;
    if !(3..=63).contains(&name.len()) {
        return Err(invalid("bucket", name, "must be 3-63 characters"));
    }
    let edge_ok = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(edge_ok) || !name.ends_with(edge_ok) {
        return Err(invalid(
            "bucket",
            name,
            "must start and end with a lowercase letter or digit",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            "bucket",
            name,
            "only lowercase letters, digits, '-', '_' and '.' are allowed",
        ));
    }
    Ok(())
}

/// Validate an object name.
pub fn validate_object(name: &str) -> Result<()> {
    check_common("object", name)?;
    if name.contains('\r') || name.contains('\n') {
        return Err(invalid("object", name, "contains a line break"));
    }
    Ok(())
}

/// Fully qualified table coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Project id.
    pub project: String,

    /// Dataset id.
    pub dataset: String,

    /// Table id.
    pub table: String,
}

impl TableRef {
    /// Create a validated table reference.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let table_ref = Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        };
        table_ref.validate()?;
        Ok(table_ref)
    }

    /// Check every component against the naming rules.
    pub fn validate(&self) -> Result<()> {
        validate_project(&self.project)?;
        validate_dataset(&self.dataset)?;
        validate_table(&self.table)
    }

    /// Standard-SQL reference: `` `project.dataset.table` ``.
    pub fn quoted(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }

    /// Same dataset, table name extended with `_suffix`.
    pub fn with_table_suffix(&self, suffix: &str) -> Result<Self> {
        Self::new(
            self.project.clone(),
            self.dataset.clone(),
            format!("{}_{}", self.table, suffix),
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Location of a single object: `gs://bucket/object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUri {
    /// Bucket name.
    pub bucket: String,

    /// Object name within the bucket.
    pub object: String,
}

impl ObjectUri {
    /// Create a validated object URI.
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Result<Self> {
        let uri = Self {
            bucket: bucket.into(),
            object: object.into(),
        };
        validate_bucket(&uri.bucket)?;
        validate_object(&uri.object)?;
        Ok(uri)
    }

    /// Parse a `gs://bucket/object` string.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix(OBJECT_URI_SCHEME).ok_or_else(|| {
            TransferError::Config(format!(
                "Object URI {:?} must start with {}",
                uri, OBJECT_URI_SCHEME
            ))
        })?;
        let (bucket, object) = rest.split_once('/').ok_or_else(|| {
            TransferError::Config(format!("Object URI {:?} has no object name", uri))
        })?;
        Self::new(bucket, object)
    }

    /// Object name with `_suffix` inserted before the extension.
    ///
    /// `data.csv` becomes `data_<suffix>.csv`; names without an extension
    /// get the suffix appended.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        let (dir, file) = match self.object.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, self.object.as_str()),
        };
        let file = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
            _ => format!("{}_{}", file, suffix),
        };
        let object = match dir {
            Some(dir) => format!("{}/{}", dir, file),
            None => file,
        };
        Self::new(self.bucket.clone(), object)
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", OBJECT_URI_SCHEME, self.bucket, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_rules() {
        assert!(validate_project("practical-case-436315-t2").is_ok());
        assert!(validate_project("example.com:my-project").is_ok());
        assert!(validate_project("short").is_err());
        assert!(validate_project("1starts-with-digit").is_err());
        assert!(validate_project("ends-with-hyphen-").is_err());
        assert!(validate_project("Upper-Case-Project").is_err());
        assert!(validate_project(":my-project").is_err());
    }

    #[test]
    fn test_dataset_and_table_rules() {
        assert!(validate_dataset("surv_source_dataset").is_ok());
        assert!(validate_dataset("bad-dataset").is_err());
        assert!(validate_dataset("").is_err());
        assert!(validate_table("surv_emp_gb").is_ok());
        assert!(validate_table("events-2024").is_ok());
        assert!(validate_table("bad`table").is_err());
        assert!(validate_table("bad table").is_err());
        assert!(validate_table("nul\0byte").is_err());
        assert!(validate_table(&"t".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_bucket_rules() {
        assert!(validate_bucket("surv_data_migration").is_ok());
        assert!(validate_bucket("my.bucket-1").is_ok());
        assert!(validate_bucket("ab").is_err());
        assert!(validate_bucket("_leading").is_err());
        assert!(validate_bucket("Upper").is_err());
    }

    #[test]
    fn test_table_ref_display_and_quote() {
        let t = TableRef::new("my-project", "sales", "orders").unwrap();
        assert_eq!(t.to_string(), "my-project.sales.orders");
        assert_eq!(t.quoted(), "`my-project.sales.orders`");
    }

    #[test]
    fn test_table_suffix() {
        let t = TableRef::new("my-project", "sales", "temporary_table").unwrap();
        let s = t.with_table_suffix("abc123").unwrap();
        assert_eq!(s.table, "temporary_table_abc123");
        assert_eq!(s.dataset, "sales");
    }

    #[test]
    fn test_object_uri_parse_and_display() {
        let uri = ObjectUri::parse("gs://surv_data_migration/exports/emp.csv").unwrap();
        assert_eq!(uri.bucket, "surv_data_migration");
        assert_eq!(uri.object, "exports/emp.csv");
        assert_eq!(uri.to_string(), "gs://surv_data_migration/exports/emp.csv");

        assert!(ObjectUri::parse("s3://bucket/file.csv").is_err());
        assert!(ObjectUri::parse("gs://bucket-only").is_err());
        assert!(ObjectUri::parse("gs://bucket/").is_err());
    }

    #[test]
    fn test_object_uri_suffix() {
        let uri = ObjectUri::new(
            "surv_data_migration",
            "practical-case-436315-t2_surv_source_dataset.surv_emp_gb.csv",
        )
        .unwrap();
        assert_eq!(
            uri.with_suffix("r1").unwrap().object,
            "practical-case-436315-t2_surv_source_dataset.surv_emp_gb_r1.csv"
        );

        let nested = ObjectUri::new("bucket1", "dir.v2/export").unwrap();
        assert_eq!(nested.with_suffix("r1").unwrap().object, "dir.v2/export_r1");

        let hidden = ObjectUri::new("bucket1", ".csv").unwrap();
        assert_eq!(hidden.with_suffix("r1").unwrap().object, ".csv_r1");
    }
}
