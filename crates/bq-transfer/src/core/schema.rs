//! Table schema metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Column type as reported by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    #[serde(alias = "INT64")]
    Integer,
    #[serde(alias = "FLOAT64")]
    Float,
    #[serde(alias = "BIGNUMERIC")]
    Numeric,
    #[serde(alias = "BOOL")]
    Boolean,
    Date,
    Timestamp,
    /// Any type without a CSV representation checked here (RECORD, BYTES, ...).
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Check whether a non-empty CSV cell is a valid value of this type.
    pub fn accepts(&self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            FieldType::String | FieldType::Other => true,
            FieldType::Integer => cell.parse::<i64>().is_ok(),
            FieldType::Float => cell.parse::<f64>().is_ok(),
            FieldType::Numeric => is_decimal(cell),
            FieldType::Boolean => matches!(
                cell.to_ascii_lowercase().as_str(),
                "true" | "false" | "1" | "0"
            ),
            FieldType::Date => NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok(),
            FieldType::Timestamp => parse_timestamp(cell),
        }
    }
}

fn is_decimal(cell: &str) -> bool {
    let digits = cell.strip_prefix(['-', '+']).unwrap_or(cell);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit())
}

/// Timestamps are accepted in RFC 3339 or the `YYYY-MM-DD HH:MM:SS[.f][ UTC]`
/// form the warehouse writes in CSV exports.
fn parse_timestamp(cell: &str) -> bool {
    if DateTime::parse_from_rfc3339(cell).is_ok() {
        return true;
    }
    let naive = cell.strip_suffix(" UTC").unwrap_or(cell);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

/// Column nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Column type.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Nullability.
    #[serde(default)]
    pub mode: FieldMode,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
        }
    }

    /// Create a required column.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            mode: FieldMode::Required,
            ..Self::new(name, field_type)
        }
    }

    /// Check one CSV cell against this column. Empty cells are NULL.
    pub fn accepts(&self, cell: &str) -> bool {
        if cell.is_empty() {
            return self.mode != FieldMode::Required;
        }
        self.field_type.accepts(cell)
    }
}

/// Ordered column list of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<Column>,
}

impl TableSchema {
    /// Create a schema from columns.
    pub fn new(fields: Vec<Column>) -> Self {
        Self { fields }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reason a record does not fit this schema, or `None` if it fits.
    pub fn reject_reason(&self, record: &[&str]) -> Option<String> {
        if record.len() != self.fields.len() {
            return Some(format!(
                "expected {} fields, found {}",
                self.fields.len(),
                record.len()
            ));
        }
        self.fields
            .iter()
            .zip(record)
            .find(|(col, cell)| !col.accepts(cell))
            .map(|(col, cell)| {
                format!(
                    "value {:?} is not a valid {:?} for column {}",
                    cell, col.field_type, col.name
                )
            })
    }
}

/// Table metadata returned by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Number of rows.
    pub num_rows: u64,

    /// Columns.
    pub schema: TableSchema,
}
