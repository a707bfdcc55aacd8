//! BigQuery REST driver.
//!
//! Jobs are submitted with `jobs.insert` and polled with `jobs.get` until
//! the service reports `DONE`. A finished job carrying an `errorResult` is
//! mapped onto the error taxonomy:
//!
//! | reason | error |
//! |---|---|
//! | `accessDenied`, `forbidden`, `billingNotEnabled` | [`TransferError::Authorization`] |
//! | `notFound`, `invalidQuery`, `duplicate` | [`TransferError::Reference`] |
//! | `invalid` on a load job that rejected rows | [`TransferError::DataQuality`] |
//! | anything else | [`TransferError::Job`] |
//!
//! The driver never retries; failures propagate to the run.

mod api;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::core::{
    ExtractJob, JobStats, LoadJob, QueryJob, TableInfo, TableRef, Warehouse,
};
use crate::error::{Result, TransferError};

use super::http::{build_client, check_status, endpoint, transport_error, AccessToken};
use api::{
    ApiTableReference, ExtractConfiguration, Job, JobConfiguration, JobInsert, JobReference,
    LoadConfiguration, QueryConfiguration,
};

/// Default BigQuery API root.
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com";

/// Settings for [`BigQueryClient`].
#[derive(Debug, Clone)]
pub struct BigQuerySettings {
    /// API root, e.g. `https://bigquery.googleapis.com`.
    pub base_url: String,

    /// Job location, if pinned.
    pub location: Option<String>,

    /// Delay between `jobs.get` polls.
    pub poll_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,

    /// Prefix for generated job ids.
    pub job_prefix: String,
}

impl Default for BigQuerySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            location: None,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
            job_prefix: "bq_transfer".to_string(),
        }
    }
}

/// Kind of job, used for ids and error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Query,
    Extract,
    Load,
}

impl JobKind {
    fn as_str(&self) -> &'static str {
        match self {
            JobKind::Query => "query",
            JobKind::Extract => "extract",
            JobKind::Load => "load",
        }
    }
}

/// Warehouse backed by the BigQuery REST API.
#[derive(Debug)]
pub struct BigQueryClient {
    http: Client,
    token: AccessToken,
    settings: BigQuerySettings,
}

impl BigQueryClient {
    /// Create a client.
    pub fn new(token: AccessToken, settings: BigQuerySettings) -> Result<Self> {
        Ok(Self {
            http: build_client(settings.request_timeout)?,
            token,
            settings,
        })
    }

    fn job_id(&self, kind: JobKind) -> String {
        let prefix: String = self
            .settings
            .job_prefix
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!(
            "{}_{}_{}",
            prefix,
            kind.as_str(),
            uuid::Uuid::new_v4().simple()
        )
    }

    fn jobs_url(&self, project: &str) -> Result<Url> {
        endpoint(
            &self.settings.base_url,
            &["bigquery", "v2", "projects", project, "jobs"],
        )
    }

    fn job_url(&self, project: &str, job_id: &str, location: Option<&str>) -> Result<Url> {
        let mut url = endpoint(
            &self.settings.base_url,
            &["bigquery", "v2", "projects", project, "jobs", job_id],
        )?;
        if let Some(location) = location {
            url.query_pairs_mut().append_pair("location", location);
        }
        Ok(url)
    }

    fn table_url(&self, table: &TableRef) -> Result<Url> {
        endpoint(
            &self.settings.base_url,
            &[
                "bigquery",
                "v2",
                "projects",
                &table.project,
                "datasets",
                &table.dataset,
                "tables",
                &table.table,
            ],
        )
    }

    /// Submit a job and wait until it is done.
    async fn run_job(
        &self,
        kind: JobKind,
        project: &str,
        configuration: JobConfiguration,
    ) -> Result<Job> {
        let job_id = self.job_id(kind);
        let body = JobInsert {
            job_reference: JobReference {
                project_id: project.to_string(),
                job_id: job_id.clone(),
                location: self.settings.location.clone(),
            },
            configuration,
        };

        debug!("{}: submitting {} job", job_id, kind.as_str());
        let response = self
            .http
            .post(self.jobs_url(project)?)
            .header(reqwest::header::AUTHORIZATION, self.token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("jobs.insert", e))?;
        let mut job: Job = check_status("jobs.insert", response).await?.json().await?;

        while !job.is_done() {
            debug!("{}: state {}", job_id, job.status.state);
            tokio::time::sleep(self.settings.poll_interval).await;

            let location = job
                .job_reference
                .location
                .clone()
                .or_else(|| self.settings.location.clone());
            let url = self.job_url(project, &job.job_reference.job_id, location.as_deref())?;
            let response = self
                .http
                .get(url)
                .header(reqwest::header::AUTHORIZATION, self.token.bearer())
                .send()
                .await
                .map_err(|e| transport_error("jobs.get", e))?;
            job = check_status("jobs.get", response).await?.json().await?;
        }

        match job.status.error_result.clone() {
            Some(error) => Err(classify_job_error(kind, &job, error)),
            None => Ok(job),
        }
    }
}

fn classify_job_error(kind: JobKind, job: &Job, error: api::ErrorProto) -> TransferError {
    let job_id = job.job_reference.job_id.clone();
    match error.reason.as_str() {
        "accessDenied" | "forbidden" | "billingNotEnabled" => {
            TransferError::Authorization(format!("{}: {}", job_id, error.message))
        }
        "notFound" | "invalidQuery" | "duplicate" => {
            TransferError::reference(format!("{}: {}", job_id, error.message))
        }
        "invalid" if kind == JobKind::Load => {
            let reported = job
                .statistics
                .load
                .as_ref()
                .and_then(|l| l.bad_records)
                .unwrap_or(0);
            let listed = job
                .status
                .errors
                .iter()
                .filter(|e| e.message != error.message)
                .count() as u64;
            let bad_records = reported.max(listed);
            // Schema mismatches and bad URIs are also `invalid` but reject no rows.
            if bad_records == 0 {
                return TransferError::job(job_id, error.reason, error.message);
            }
            TransferError::DataQuality {
                bad_records,
                max_bad_records: 0,
                message: error.message,
            }
        }
        _ => TransferError::job(job_id, error.reason, error.message),
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn run_query(&self, job: &QueryJob) -> Result<JobStats> {
        let configuration = JobConfiguration {
            query: Some(QueryConfiguration {
                query: job.select.to_sql(),
                use_legacy_sql: job.use_legacy_sql,
                destination_table: ApiTableReference::from(&job.destination),
                write_disposition: job.write_disposition.as_api_str(),
            }),
            ..Default::default()
        };
        let done = self
            .run_job(JobKind::Query, &job.destination.project, configuration)
            .await?;

        // The job resource carries no row count for a materialized SELECT.
        let rows = match self.table_info(&job.destination).await {
            Ok(info) => Some(info.num_rows),
            Err(e) => {
                debug!("row count of {} unavailable: {}", job.destination, e);
                None
            }
        };

        Ok(JobStats {
            job_id: done.job_reference.job_id,
            rows,
            bytes: done
                .statistics
                .query
                .and_then(|q| q.total_bytes_processed),
            bad_records: 0,
        })
    }

    async fn extract(&self, job: &ExtractJob) -> Result<JobStats> {
        let configuration = JobConfiguration {
            extract: Some(ExtractConfiguration {
                source_table: ApiTableReference::from(&job.source),
                destination_uris: vec![job.destination_uri.to_string()],
                destination_format: "CSV",
                field_delimiter: job.field_delimiter.to_string(),
                print_header: job.print_header,
            }),
            ..Default::default()
        };
        let done = self
            .run_job(JobKind::Extract, &job.source.project, configuration)
            .await?;

        Ok(JobStats {
            job_id: done.job_reference.job_id,
            rows: None,
            bytes: done.statistics.extract.and_then(|e| e.input_bytes),
            bad_records: 0,
        })
    }

    async fn load(&self, job: &LoadJob) -> Result<JobStats> {
        let configuration = JobConfiguration {
            load: Some(LoadConfiguration {
                destination_table: ApiTableReference::from(&job.destination),
                source_uris: vec![job.source_uri.to_string()],
                source_format: "CSV",
                field_delimiter: job.field_delimiter.to_string(),
                max_bad_records: job.max_bad_records,
                skip_leading_rows: job.skip_leading_rows,
                write_disposition: job.write_disposition.as_api_str(),
            }),
            ..Default::default()
        };
        let done = self
            .run_job(JobKind::Load, &job.destination.project, configuration)
            .await
            .map_err(|e| match e {
                TransferError::DataQuality {
                    bad_records,
                    message,
                    ..
                } => TransferError::DataQuality {
                    bad_records: bad_records.max(job.max_bad_records.saturating_add(1)),
                    max_bad_records: job.max_bad_records,
                    message,
                },
                other => other,
            })?;

        let stats = done.statistics.load.unwrap_or_default();
        Ok(JobStats {
            job_id: done.job_reference.job_id,
            rows: stats.output_rows,
            bytes: stats.output_bytes,
            bad_records: stats.bad_records.unwrap_or(0),
        })
    }

    async fn table_info(&self, table: &TableRef) -> Result<TableInfo> {
        let response = self
            .http
            .get(self.table_url(table)?)
            .header(reqwest::header::AUTHORIZATION, self.token.bearer())
            .send()
            .await
            .map_err(|e| transport_error("tables.get", e))?;
        let resource: api::Table = check_status(&format!("tables.get {}", table), response)
            .await?
            .json()
            .await?;
        Ok(TableInfo {
            num_rows: resource.num_rows.unwrap_or(0),
            schema: resource.schema,
        })
    }

    async fn delete_table(&self, table: &TableRef) -> Result<()> {
        let response = self
            .http
            .delete(self.table_url(table)?)
            .header(reqwest::header::AUTHORIZATION, self.token.bearer())
            .send()
            .await
            .map_err(|e| transport_error("tables.delete", e))?;
        match check_status(&format!("tables.delete {}", table), response).await {
            Ok(_) | Err(TransferError::Reference(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "bigquery"
    }
}
