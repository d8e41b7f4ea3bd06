//! 정규 레코드.
//!
//! 가격 시계열과 자금 흐름 시계열은 같은 모양 `(date, sector, values)`을 공유하고
//! 값 부분만 다릅니다. 값 타입은 [`SeriesValues`]로 저장소 컬럼 규칙을 정의합니다.

use super::parse::{format_date, parse_decimal};
use super::series::{NaturalKey, SeriesKind};
use crate::error::IngestError;
use crate::vocabulary::{Column, ColumnMap};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// 시계열 값 타입.
pub trait SeriesValues: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// 시계열 종류
    const KIND: SeriesKind;

    /// `date`, `sector` 뒤에 오는 고정 컬럼 이름
    fn value_columns() -> &'static [&'static str];

    /// 고정 컬럼 값 (value_columns 순서)
    fn to_fields(&self) -> Vec<String>;

    /// 고정 컬럼 외의 통과(passthrough) 컬럼
    fn passthrough(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    /// 해석된 행에서 값을 읽습니다.
    fn from_row(map: &ColumnMap, fields: &[&str], origin: &str) -> Result<Self, IngestError>;
}

/// 섹터 지수 OHLC 값.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// 원천 파일의 추가 컬럼 (원본 헤더 → 값)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl PriceBar {
    pub fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open,
            high,
            low,
            close,
            extras: BTreeMap::new(),
        }
    }
}

const PRICE_KNOWN: &[Column] = &[
    Column::Date,
    Column::Sector,
    Column::Open,
    Column::High,
    Column::Low,
    Column::Close,
];

impl SeriesValues for PriceBar {
    const KIND: SeriesKind = SeriesKind::Price;

    fn value_columns() -> &'static [&'static str] {
        &["open", "high", "low", "close"]
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.open.to_string(),
            self.high.to_string(),
            self.low.to_string(),
            self.close.to_string(),
        ]
    }

    fn passthrough(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.extras)
    }

    fn from_row(map: &ColumnMap, fields: &[&str], origin: &str) -> Result<Self, IngestError> {
        let extras = map
            .passthrough(fields, PRICE_KNOWN)
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();

        Ok(Self {
            open: required_decimal(map, Column::Open, fields, origin)?,
            high: required_decimal(map, Column::High, fields, origin)?,
            low: required_decimal(map, Column::Low, fields, origin)?,
            close: required_decimal(map, Column::Close, fields, origin)?,
            extras,
        })
    }
}

/// FPI 순매수 변동 값 (부호 있음, 원천 단위 그대로).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetFlow {
    pub net_change: Decimal,
}

impl SeriesValues for NetFlow {
    const KIND: SeriesKind = SeriesKind::Flow;

    fn value_columns() -> &'static [&'static str] {
        &["net_change"]
    }

    fn to_fields(&self) -> Vec<String> {
        vec![self.net_change.to_string()]
    }

    fn from_row(map: &ColumnMap, fields: &[&str], origin: &str) -> Result<Self, IngestError> {
        Ok(Self {
            net_change: required_decimal(map, Column::NetChange, fields, origin)?,
        })
    }
}

fn required_decimal(
    map: &ColumnMap,
    column: Column,
    fields: &[&str],
    origin: &str,
) -> Result<Decimal, IngestError> {
    let raw = map.field(column, fields).unwrap_or_default();
    parse_decimal(raw).ok_or_else(|| IngestError::InvalidValue {
        column: column.canonical_name().to_string(),
        value: raw.to_string(),
        origin: origin.to_string(),
    })
}

/// 정규 레코드 (날짜 해석 완료).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record<V> {
    pub date: NaiveDate,
    pub sector: String,
    #[serde(flatten)]
    pub values: V,
}

pub type PriceRecord = Record<PriceBar>;
pub type FlowRecord = Record<NetFlow>;

impl<V> Record<V> {
    pub fn new(date: NaiveDate, sector: impl Into<String>, values: V) -> Self {
        Self {
            date,
            sector: sector.into(),
            values,
        }
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.date, self.sector.clone())
    }
}

/// 날짜가 아직 해석되지 않은 레코드.
///
/// 저장소 읽기와 스키마 분류기가 만들고, 날짜 정규화는 병합 단계에서 수행합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord<V> {
    /// 원천의 날짜 문자열
    pub date: String,
    pub sector: String,
    pub values: V,
    /// 진단용 출처 (파일 이름, 행 번호)
    pub origin: String,
}

impl<V: SeriesValues> RawRecord<V> {
    /// 해석된 행에서 레코드를 읽습니다. 날짜는 문자열 그대로 둡니다.
    pub fn from_row(map: &ColumnMap, fields: &[&str], origin: &str) -> Result<Self, IngestError> {
        let sector = map.field(Column::Sector, fields).unwrap_or_default();
        if sector.is_empty() {
            return Err(IngestError::InvalidValue {
                column: Column::Sector.canonical_name().to_string(),
                value: String::new(),
                origin: origin.to_string(),
            });
        }

        Ok(Self {
            date: map.field(Column::Date, fields).unwrap_or_default().to_string(),
            sector: sector.to_string(),
            values: V::from_row(map, fields, origin)?,
            origin: origin.to_string(),
        })
    }
}

impl<V> From<Record<V>> for RawRecord<V> {
    fn from(record: Record<V>) -> Self {
        Self {
            date: format_date(record.date),
            sector: record.sector,
            values: record.values,
            origin: "canonical".to_string(),
        }
    }
}
