//! 시계열 식별자, 자연 키, 하이워터마크.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 정규 시계열 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// 섹터 지수 OHLC
    Price,
    /// FPI 순매수 변동
    Flow,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Flow => "flow",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스테이징 파일 분류 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Price,
    Flow,
    Unknown,
}

impl SchemaKind {
    /// 대응하는 시계열 (Unknown이면 None)
    pub fn series(&self) -> Option<SeriesKind> {
        match self {
            Self::Price => Some(SeriesKind::Price),
            Self::Flow => Some(SeriesKind::Flow),
            Self::Unknown => None,
        }
    }
}

/// 관측값 하나를 식별하는 자연 키 `(date, sector)`.
///
/// 정렬 순서는 날짜 우선, 같은 날짜는 섹터 이름순입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub date: NaiveDate,
    pub sector: String,
}

impl NaturalKey {
    pub fn new(date: NaiveDate, sector: impl Into<String>) -> Self {
        Self {
            date,
            sector: sector.into(),
        }
    }
}

/// 각 정규 저장소에 현재 존재하는 최대 날짜.
///
/// 저장되지 않는 파생값입니다. 매 실행마다 저장소를 스캔해 다시 계산합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HighWaterMarks {
    pub price: Option<NaiveDate>,
    pub flow: Option<NaiveDate>,
}

impl HighWaterMarks {
    pub fn get(&self, kind: SeriesKind) -> Option<NaiveDate> {
        match kind {
            SeriesKind::Price => self.price,
            SeriesKind::Flow => self.flow,
        }
    }

    /// 신선도 판단 기준일: 두 마크 중 이른 날짜.
    ///
    /// 한쪽 저장소라도 비어 있으면 어떤 URL도 오래됐다고 증명할 수 없으므로 `None`.
    pub fn cutoff(&self) -> Option<NaiveDate> {
        match (self.price, self.flow) {
            (Some(price), Some(flow)) => Some(price.min(flow)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cutoff_uses_earlier_mark() {
        let marks = HighWaterMarks {
            price: Some(d(2024, 6, 15)),
            flow: Some(d(2024, 6, 1)),
        };
        assert_eq!(marks.cutoff(), Some(d(2024, 6, 1)));
    }

    #[test]
    fn test_cutoff_requires_both_marks() {
        let marks = HighWaterMarks {
            price: Some(d(2024, 6, 15)),
            flow: None,
        };
        assert_eq!(marks.cutoff(), None);
        assert_eq!(HighWaterMarks::default().cutoff(), None);
    }

    #[test]
    fn test_natural_key_orders_by_date_then_sector() {
        let mut keys = vec![
            NaturalKey::new(d(2024, 1, 2), "Auto"),
            NaturalKey::new(d(2024, 1, 1), "Oil"),
            NaturalKey::new(d(2024, 1, 1), "Banks"),
        ];
        keys.sort();
        assert_eq!(keys[0], NaturalKey::new(d(2024, 1, 1), "Banks"));
        assert_eq!(keys[2].date, d(2024, 1, 2));
    }
}
