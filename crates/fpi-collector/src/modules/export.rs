//! 조인 뷰 CSV 내보내기 모듈.
//!
//! 표시 계층이 읽는 `date, sector, open, high, low, close, net_change` 파일을 만듭니다.
//! 가격이 없는 키는 가격 칸을 비우고, 자금 흐름이 없는 키는 `net_change`를 0으로
//! 씁니다. 정규 저장소는 수정하지 않습니다.

use crate::{CollectorConfig, Result};
use fpi_data::{DatasetReader, JoinedRow};
use std::path::Path;

const EXPORT_HEADER: &[&str] = &["date", "sector", "open", "high", "low", "close", "net_change"];

/// 조인 뷰를 `output`에 씁니다. 기록한 행 수를 반환합니다.
pub fn export_joined(config: &CollectorConfig, output: &Path) -> Result<usize> {
    let reader = DatasetReader::new(&config.storage.price_store, &config.storage.flow_store);
    let rows = reader.snapshot()?.join();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(output)?;
    wtr.write_record(EXPORT_HEADER)?;
    for row in &rows {
        wtr.write_record(export_fields(row))?;
    }
    wtr.flush()?;

    tracing::info!(output = %output.display(), rows = rows.len(), "조인 뷰 내보내기 완료");
    Ok(rows.len())
}

fn export_fields(row: &JoinedRow) -> Vec<String> {
    let mut fields = vec![row.date.format("%Y-%m-%d").to_string(), row.sector.clone()];
    match &row.price {
        Some(bar) => fields.extend([bar.open, bar.high, bar.low, bar.close].map(|v| v.to_string())),
        None => fields.extend(std::iter::repeat(String::new()).take(4)),
    }
    fields.push(row.display_net_change().to_string());
    fields
}
