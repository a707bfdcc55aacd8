//! Delimited-text encoding for exports and loads.

use crate::core::TableSchema;
use crate::error::{Result, TransferError};

use super::Row;

/// Encode rows as delimited text with standard quoting.
///
/// NULL cells are written as empty fields.
pub fn encode(schema: &TableSchema, rows: &[Row], delimiter: u8, header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    if header {
        writer.write_record(schema.column_names())?;
    }
    for row in rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }

    writer
        .into_inner()
        .map_err(|e| TransferError::Io(e.into_error()))
}

/// Outcome of decoding a load input against a destination schema.
#[derive(Debug, Default)]
pub struct Decoded {
    /// Accepted rows, in input order.
    pub rows: Vec<Row>,

    /// Number of rejected records.
    pub bad_records: u64,

    /// Reason the first record was rejected.
    pub first_error: Option<String>,
}

/// Decode delimited text, skipping `skip_leading_rows` records and checking
/// every remaining record against `schema`.
///
/// Records that cannot be parsed, have the wrong field count, or hold a
/// value the column type rejects are counted as bad, never returned.
pub fn decode(data: &[u8], schema: &TableSchema, delimiter: u8, skip_leading_rows: u64) -> Decoded {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let mut decoded = Decoded::default();
    let reject = |decoded: &mut Decoded, line: u64, reason: String| {
        decoded.bad_records += 1;
        if decoded.first_error.is_none() {
            decoded.first_error = Some(format!("record {}: {}", line, reason));
        }
    };

    for (index, record) in reader.records().enumerate() {
        let index = index as u64;
        if index < skip_leading_rows {
            continue;
        }
        let line = index + 1;
        match record {
            Ok(record) => {
                let cells: Vec<&str> = record.iter().collect();
                match schema.reject_reason(&cells) {
                    Some(reason) => reject(&mut decoded, line, reason),
                    None => decoded.rows.push(
                        cells
                            .into_iter()
                            .map(|c| (!c.is_empty()).then(|| c.to_string()))
                            .collect(),
                    ),
                }
            }
            Err(e) => reject(&mut decoded, line, e.to_string()),
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, FieldType};

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("f0_", FieldType::String),
            Column::required("id", FieldType::Integer),
            Column::new("name", FieldType::String),
        ])
    }

    fn row(cells: &[Option<&str>]) -> Row {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_encode_header_and_quoting() {
        let rows = vec![
            row(&[Some("GB"), Some("1"), Some("Smith, J")]),
            row(&[Some("GB"), Some("2"), None]),
        ];
        let out = encode(&schema(), &rows, b',', true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "f0_,id,name\nGB,1,\"Smith, J\"\nGB,2,\n"
        );
    }

    #[test]
    fn test_encode_empty_table_is_header_only() {
        let out = encode(&schema(), &[], b',', true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "f0_,id,name\n");
    }

    #[test]
    fn test_decode_skips_header() {
        let data = b"f0_,id,name\nGB,1,A\nGB,2,\n";
        let decoded = decode(data, &schema(), b',', 1);
        assert_eq!(decoded.bad_records, 0);
        assert_eq!(
            decoded.rows,
            vec![
                row(&[Some("GB"), Some("1"), Some("A")]),
                row(&[Some("GB"), Some("2"), None]),
            ]
        );
    }

    #[test]
    fn test_decode_counts_bad_records() {
        let data = b"f0_,id,name\nGB,x,A\nGB,2\nGB,3,C\n,,\n";
        let decoded = decode(data, &schema(), b',', 1);
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.bad_records, 3);
        assert!(decoded.first_error.unwrap().starts_with("record 2:"));
    }

    #[test]
    fn test_decode_other_delimiter() {
        let data = b"GB|7|Z\n";
        let decoded = decode(data, &schema(), b'|', 0);
        assert_eq!(decoded.rows, vec![row(&[Some("GB"), Some("7"), Some("Z")])]);
    }
}
