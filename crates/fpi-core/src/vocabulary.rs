//! 컬럼 어휘.
//!
//! 원천 파일마다 헤더 표기가 다릅니다 (`Date`, `sector `, `Net FPI Change` 등).
//! 모든 헤더는 [`normalize_header`]로 한 번 정규화한 뒤 아래 별칭 표로만
//! 정규 컬럼에 대응시킵니다. 스키마 분류와 저장소 읽기가 같은 표를 사용합니다.

/// 정규 컬럼.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Date,
    Sector,
    Open,
    High,
    Low,
    Close,
    NetChange,
}

impl Column {
    /// 저장소에 기록되는 컬럼 이름
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Sector => "sector",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::NetChange => "net_change",
        }
    }
}

/// 정규 컬럼별 허용 별칭 (정규화된 형태).
const COLUMN_ALIASES: &[(Column, &[&str])] = &[
    (Column::Date, &["date", "as on date", "reporting date"]),
    (Column::Sector, &["sector", "category", "sector name"]),
    (Column::Open, &["open"]),
    (Column::High, &["high"]),
    (Column::Low, &["low"]),
    (Column::Close, &["close"]),
    (
        Column::NetChange,
        &["net change", "net fpi change", "net", "fpi", "net investment"],
    ),
];

/// 가격(OHLC) 리포트를 나타내는 헤더.
pub const PRICE_INDICATORS: &[&str] = &["open", "high"];

/// 자금 흐름 리포트를 나타내는 헤더.
pub const FLOW_INDICATORS: &[&str] = &["net change", "net fpi change", "net", "fpi", "net investment"];

/// 헤더 정규화.
///
/// BOM 제거, 앞뒤 공백 제거, 소문자화, `_`/`-`를 공백으로 치환, 연속 공백 축약.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 정규화된 헤더를 정규 컬럼으로 변환
pub fn resolve_column(normalized: &str) -> Option<Column> {
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&normalized))
        .map(|(column, _)| *column)
}

/// 헤더 한 칸.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderSlot {
    /// 원본 헤더 (앞뒤 공백, BOM 제거)
    header: String,
    normalized: String,
    column: Option<Column>,
}

/// 파일 헤더를 정규 컬럼 위치로 해석한 결과.
///
/// 같은 정규 컬럼에 대응하는 헤더가 여러 개면 가장 앞의 것만 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMap {
    slots: Vec<HeaderSlot>,
}

impl ColumnMap {
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: Vec<HeaderSlot> = Vec::new();
        for raw in headers {
            let header = raw.as_ref().trim_start_matches('\u{feff}').trim().to_string();
            let normalized = normalize_header(&header);
            let column = resolve_column(&normalized)
                .filter(|c| !slots.iter().any(|slot| slot.column == Some(*c)));
            slots.push(HeaderSlot {
                header,
                normalized,
                column,
            });
        }
        Self { slots }
    }

    /// 컬럼의 필드 위치
    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.slots.iter().position(|slot| slot.column == Some(column))
    }

    pub fn has(&self, column: Column) -> bool {
        self.index_of(column).is_some()
    }

    /// 행에서 컬럼 값을 꺼냅니다 (앞뒤 공백 제거).
    pub fn field<'a>(&self, column: Column, fields: &[&'a str]) -> Option<&'a str> {
        self.index_of(column)
            .and_then(|idx| fields.get(idx))
            .map(|value| value.trim())
    }

    /// 정규화된 헤더 목록
    pub fn normalized_headers(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.normalized.clone()).collect()
    }

    /// 정규화된 헤더 중 하나라도 `vocabulary`에 포함되는지 확인
    pub fn contains_any(&self, vocabulary: &[&str]) -> bool {
        self.slots
            .iter()
            .any(|slot| vocabulary.contains(&slot.normalized.as_str()))
    }

    /// `known`에 속하지 않는 컬럼의 (원본 헤더, 값) 쌍. 빈 헤더와 빈 값은 제외합니다.
    pub fn passthrough<'a>(
        &'a self,
        fields: &'a [&'a str],
        known: &'a [Column],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.column.map_or(true, |c| !known.contains(&c)))
            .filter(|(_, slot)| !slot.header.is_empty())
            .filter_map(move |(idx, slot)| {
                let value = fields.get(idx)?.trim();
                (!value.is_empty()).then_some((slot.header.as_str(), value))
            })
    }
}
