//! BigQuery REST wire types (jobs and tables resources).

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{TableRef, TableSchema};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiTableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl From<&TableRef> for ApiTableReference {
    fn from(t: &TableRef) -> Self {
        Self {
            project_id: t.project.clone(),
            dataset_id: t.dataset.clone(),
            table_id: t.table.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Body of `jobs.insert`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInsert {
    pub job_reference: JobReference,
    pub configuration: JobConfiguration,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadConfiguration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfiguration {
    pub query: String,
    pub use_legacy_sql: bool,
    pub destination_table: ApiTableReference,
    pub write_disposition: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfiguration {
    pub source_table: ApiTableReference,
    pub destination_uris: Vec<String>,
    pub destination_format: &'static str,
    pub field_delimiter: String,
    pub print_header: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadConfiguration {
    pub destination_table: ApiTableReference,
    pub source_uris: Vec<String>,
    pub source_format: &'static str,
    pub field_delimiter: String,
    pub max_bad_records: u64,
    pub skip_leading_rows: u64,
    pub write_disposition: &'static str,
}

/// Job resource returned by `jobs.insert` and `jobs.get`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_reference: JobReference,
    pub status: JobStatus,
    #[serde(default)]
    pub statistics: JobStatistics,
}

impl Job {
    pub fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: String,
    #[serde(default)]
    pub error_result: Option<ErrorProto>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(default)]
    pub query: Option<QueryStatistics>,
    #[serde(default)]
    pub extract: Option<ExtractStatistics>,
    #[serde(default)]
    pub load: Option<LoadStatistics>,
}

// int64 values arrive as JSON strings.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatistics {
    #[serde(default, deserialize_with = "int64")]
    pub total_bytes_processed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractStatistics {
    #[serde(default, deserialize_with = "int64")]
    pub input_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    #[serde(default, deserialize_with = "int64")]
    pub output_rows: Option<u64>,
    #[serde(default, deserialize_with = "int64")]
    pub output_bytes: Option<u64>,
    #[serde(default, deserialize_with = "int64")]
    pub bad_records: Option<u64>,
}

/// Table resource returned by `tables.get`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default, deserialize_with = "int64")]
    pub num_rows: Option<u64>,
    #[serde(default)]
    pub schema: TableSchema,
}

fn int64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_configuration_shape() {
        let body = JobInsert {
            job_reference: JobReference {
                project_id: "my-project".into(),
                job_id: "job_1".into(),
                location: None,
            },
            configuration: JobConfiguration {
                load: Some(LoadConfiguration {
                    destination_table: ApiTableReference {
                        project_id: "my-project".into(),
                        dataset_id: "ds".into(),
                        table_id: "t".into(),
                    },
                    source_uris: vec!["gs://b/f.csv".into()],
                    source_format: "CSV",
                    field_delimiter: ",".into(),
                    max_bad_records: 1,
                    skip_leading_rows: 1,
                    write_disposition: "WRITE_APPEND",
                }),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["jobReference"]["jobId"], "job_1");
        assert!(json["jobReference"].get("location").is_none());
        let load = &json["configuration"]["load"];
        assert_eq!(load["destinationTable"]["tableId"], "t");
        assert_eq!(load["sourceUris"][0], "gs://b/f.csv");
        assert_eq!(load["maxBadRecords"], 1);
        assert_eq!(load["skipLeadingRows"], 1);
        assert_eq!(load["writeDisposition"], "WRITE_APPEND");
        assert!(json["configuration"].get("query").is_none());
    }

    #[test]
    fn test_job_parses_string_int64() {
        let job: Job = serde_json::from_str(
            r#"{
                "jobReference": {"projectId": "p", "jobId": "j", "location": "EU"},
                "status": {"state": "DONE"},
                "statistics": {"load": {"outputRows": "2", "badRecords": "1"}}
            }"#,
        )
        .unwrap();
        assert!(job.is_done());
        let load = job.statistics.load.unwrap();
        assert_eq!(load.output_rows, Some(2));
        assert_eq!(load.bad_records, Some(1));
        assert_eq!(load.output_bytes, None);
    }

    #[test]
    fn test_table_parses_schema() {
        let table: Table = serde_json::from_str(
            r#"{"numRows": "5", "schema": {"fields": [{"name": "id", "type": "INTEGER", "mode": "REQUIRED"}]}}"#,
        )
        .unwrap();
        assert_eq!(table.num_rows, Some(5));
        assert_eq!(table.schema.column_names(), vec!["id"]);
    }
}
