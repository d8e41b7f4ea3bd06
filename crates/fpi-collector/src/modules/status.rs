//! 정규 저장소 상태 조회 모듈.

use crate::{CollectorConfig, Result};
use chrono::NaiveDate;
use fpi_core::HighWaterMarks;
use fpi_data::{DatasetReader, Fetcher};
use serde::Serialize;

/// 저장소 상태
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub price_store: String,
    pub flow_store: String,
    pub price_records: usize,
    pub flow_records: usize,
    pub sectors: usize,
    pub high_water_marks: HighWaterMarks,
    /// 다음 실행의 신선도 기준일
    pub cutoff: Option<NaiveDate>,
    pub staged_files: usize,
}

impl DatasetStatus {
    /// 상태 로그 출력
    pub fn log(&self) {
        tracing::info!(
            price_store = %self.price_store,
            price_records = self.price_records,
            price_hwm = ?self.high_water_marks.price,
            flow_store = %self.flow_store,
            flow_records = self.flow_records,
            flow_hwm = ?self.high_water_marks.flow,
            sectors = self.sectors,
            cutoff = ?self.cutoff,
            staged_files = self.staged_files,
            "저장소 상태"
        );
    }
}

/// 두 정규 저장소와 스테이징 영역 상태를 조회합니다. 아무것도 쓰지 않습니다.
pub async fn dataset_status(config: &CollectorConfig) -> Result<DatasetStatus> {
    let reader = DatasetReader::new(&config.storage.price_store, &config.storage.flow_store);
    let snapshot = reader.snapshot()?;
    let marks = snapshot.high_water_marks();

    let fetcher = Fetcher::new(config.http_client()?, &config.storage.staging_dir);
    let staged_files = fetcher.staged_files().await?.len();

    Ok(DatasetStatus {
        price_store: config.storage.price_store.display().to_string(),
        flow_store: config.storage.flow_store.display().to_string(),
        price_records: snapshot.prices.len(),
        flow_records: snapshot.flows.len(),
        sectors: snapshot.sectors().len(),
        high_water_marks: marks,
        cutoff: marks.cutoff(),
        staged_files,
    })
}
