//! 표시 계층용 읽기 API.
//!
//! 마지막으로 완료된 병합 시점의 두 정규 저장소 전체를 돌려줍니다. 필터링과 렌더링은
//! 표시 계층의 몫이며, 이 모듈은 저장소를 수정하지 않습니다.

use crate::storage::csv_store::CsvStore;
use chrono::NaiveDate;
use fpi_core::{
    FlowRecord, HighWaterMarks, IngestError, NaturalKey, NetFlow, PriceBar, PriceRecord,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// 두 정규 저장소 읽기 전용 접근.
#[derive(Debug)]
pub struct DatasetReader {
    price: CsvStore<PriceBar>,
    flow: CsvStore<NetFlow>,
}

impl DatasetReader {
    pub fn new(price_path: impl Into<PathBuf>, flow_path: impl Into<PathBuf>) -> Self {
        Self {
            price: CsvStore::open(price_path),
            flow: CsvStore::open(flow_path),
        }
    }

    /// 두 시계열 전체를 읽습니다. 날짜를 해석할 수 없는 행은 포함하지 않습니다.
    pub fn snapshot(&self) -> Result<DatasetSnapshot, IngestError> {
        Ok(DatasetSnapshot {
            prices: self.price.load_records()?,
            flows: self.flow.load_records()?,
        })
    }
}

/// 정규 데이터셋 스냅샷 (자연 키 순).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSnapshot {
    pub prices: Vec<PriceRecord>,
    pub flows: Vec<FlowRecord>,
}

impl DatasetSnapshot {
    pub fn high_water_marks(&self) -> HighWaterMarks {
        HighWaterMarks {
            price: self.prices.iter().map(|r| r.date).max(),
            flow: self.flows.iter().map(|r| r.date).max(),
        }
    }

    /// 두 시계열에 등장하는 모든 섹터
    pub fn sectors(&self) -> BTreeSet<String> {
        self.prices
            .iter()
            .map(|r| r.sector.clone())
            .chain(self.flows.iter().map(|r| r.sector.clone()))
            .collect()
    }

    pub fn join(&self) -> Vec<JoinedRow> {
        join(&self.prices, &self.flows)
    }
}

/// 가격과 자금 흐름을 자연 키로 합친 행.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub date: NaiveDate,
    pub sector: String,
    pub price: Option<PriceBar>,
    pub net_change: Option<Decimal>,
}

impl JoinedRow {
    /// 표시용 순매수 변동. 값이 없으면 0이며 저장소에는 아무것도 쓰지 않습니다.
    pub fn display_net_change(&self) -> Decimal {
        self.net_change.unwrap_or(Decimal::ZERO)
    }
}

/// 자연 키 기준 완전 외부 조인 (자연 키 순).
pub fn join(prices: &[PriceRecord], flows: &[FlowRecord]) -> Vec<JoinedRow> {
    let mut rows: BTreeMap<NaturalKey, JoinedRow> = BTreeMap::new();

    for record in prices {
        rows.entry(record.key())
            .or_insert_with(|| JoinedRow {
                date: record.date,
                sector: record.sector.clone(),
                price: None,
                net_change: None,
            })
            .price = Some(record.values.clone());
    }

    for record in flows {
        rows.entry(record.key())
            .or_insert_with(|| JoinedRow {
                date: record.date,
                sector: record.sector.clone(),
                price: None,
                net_change: None,
            })
            .net_change = Some(record.values.net_change);
    }

    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpi_core::Record;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_outer_join() {
        let prices = vec![
            Record::new(d(1, 15), "Banks", PriceBar::new(dec!(1), dec!(2), dec!(1), dec!(2))),
            Record::new(d(1, 31), "Banks", PriceBar::new(dec!(2), dec!(3), dec!(2), dec!(3))),
        ];
        let flows = vec![
            Record::new(d(1, 15), "Banks", NetFlow { net_change: dec!(-7) }),
            Record::new(d(1, 15), "IT", NetFlow { net_change: dec!(4) }),
        ];

        let rows = join(&prices, &flows);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sector, "Banks");
        assert_eq!(rows[0].net_change, Some(dec!(-7)));
        assert!(rows[0].price.is_some());
        assert_eq!(rows[1].sector, "IT");
        assert!(rows[1].price.is_none());
        assert_eq!(rows[2].date, d(1, 31));
        assert_eq!(rows[2].net_change, None);
        assert_eq!(rows[2].display_net_change(), Decimal::ZERO);
    }

    #[test]
    fn test_reader_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let price_path = dir.path().join("prices.csv");
        let flow_path = dir.path().join("flows.csv");
        std::fs::write(&flow_path, "Date,sector ,Net FPI Change\n15-Jan-24,Banks,3\n").unwrap();

        let reader = DatasetReader::new(&price_path, &flow_path);
        let snapshot = reader.snapshot().unwrap();

        assert!(snapshot.prices.is_empty());
        assert_eq!(snapshot.flows.len(), 1);
        assert_eq!(snapshot.sectors().into_iter().collect::<Vec<_>>(), vec!["Banks"]);
        assert_eq!(
            snapshot.high_water_marks(),
            HighWaterMarks {
                price: None,
                flow: Some(d(1, 15)),
            }
        );

        // 읽기만으로는 파일이 생성되거나 바뀌지 않음
        assert!(!price_path.exists());
        assert_eq!(
            std::fs::read_to_string(&flow_path).unwrap(),
            "Date,sector ,Net FPI Change\n15-Jan-24,Banks,3\n"
        );
    }
}
