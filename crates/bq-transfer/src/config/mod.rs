//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded in run state.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WriteDisposition;

    const MINIMAL: &str = r#"
source:
  project: practical-case-436315-t2
  dataset: surv_source_dataset
  table: surv_emp_gb
export:
  bucket: surv_data_migration
  file_name: practical-case-436315-t2_surv_source_dataset.surv_emp_gb.csv
destination:
  project: practical-case-436315-t2
  dataset: surv_target_dataset
  table: surv_emp_all
"#;

    #[test]
    fn test_defaults_match_workflow() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.dag_id, "bq_transfer_dataset");
        assert_eq!(config.owner, "airflow");
        assert_eq!(config.schedule, None);
        assert_eq!(config.query.tag, "GB");
        assert_eq!(config.temporary.table, "temporary_table");
        assert_eq!(
            config.temporary_table().unwrap().to_string(),
            "practical-case-436315-t2.surv_source_dataset.temporary_table"
        );
        assert_eq!(config.export.field_delimiter, ',');
        assert!(config.export.print_header);
        assert_eq!(config.load.skip_leading_rows, 1);
        assert_eq!(config.load.max_bad_records, 1);
        assert_eq!(config.load.write_disposition, WriteDisposition::Append);
        assert_eq!(config.run.retries, 1);
        assert_eq!(config.run.retry_delay_secs, 300);
        assert_eq!(config.run.timeout_secs, 1200);
        assert!(config.run.unique_resources);
        assert!(config.run.cleanup);
    }

    #[test]
    fn test_start_date_defaults_to_yesterday() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let start = config.effective_start_date();
        let age = chrono::Utc::now() - start;
        assert!(age >= chrono::Duration::hours(23));
        assert!(age <= chrono::Duration::hours(25));
    }

    #[test]
    fn test_unsupported_schedule_is_error() {
        let yaml = format!("schedule: \"@hourly\"\n{}", MINIMAL);
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(crate::error::TransferError::Config(_))
        ));
        let yaml = format!("schedule: manual\n{}", MINIMAL);
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn test_missing_section_is_error() {
        let yaml = "source:\n  project: my-project\n  dataset: d\n  table: t\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Config::from_yaml(MINIMAL).unwrap();
        let b = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(a.hash(), b.hash());

        let mut c = b.clone();
        c.query.tag = "FR".into();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), MINIMAL).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.table, "surv_emp_gb");
    }
}
