//! 수집기 작업 모듈.

pub mod export;
pub mod ingest;
pub mod status;

pub use export::export_joined;
pub use ingest::{current_marks, reconcile_staging, run_once};
pub use status::{dataset_status, DatasetStatus};
