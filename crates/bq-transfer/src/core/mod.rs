//! Core types shared by drivers and the pipeline.
//!
//! - [`identifier`]: validated table and object names
//! - [`schema`]: column and table metadata
//! - [`job`]: job requests and statistics
//! - [`traits`]: the [`Warehouse`] and [`ObjectStore`] service boundaries

pub mod identifier;
pub mod job;
pub mod schema;
pub mod traits;

pub use identifier::{ObjectUri, TableRef};
pub use job::{ExtractJob, JobStats, LoadJob, QueryJob, TaggedSelect, WriteDisposition};
pub use schema::{Column, FieldMode, FieldType, TableInfo, TableSchema};
pub use traits::{ObjectStore, Warehouse};
