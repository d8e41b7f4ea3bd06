//! 스테이징 파일 스키마 분류 및 레코드 추출.
//!
//! 분류는 헤더 집합만 봅니다. 가격 지표 컬럼(`open`, `high`)이 있으면 가격 리포트,
//! 없고 자금 흐름 지표 컬럼(`net`, `fpi` 등)이 있으면 자금 흐름 리포트,
//! 둘 다 없으면 `Unknown`입니다. `Unknown` 파일은 `AmbiguousSchema`로 보고되고
//! 병합에서 제외됩니다.

use fpi_core::vocabulary::{FLOW_INDICATORS, PRICE_INDICATORS};
use fpi_core::{
    Column, ColumnMap, IngestError, NetFlow, PriceBar, RawRecord, SchemaKind, SeriesValues,
    StagedFile,
};

/// 엑셀 통합 문서 확장자 (읽기 미지원)
const WORKBOOK_EXTENSIONS: &[&str] = &["xls", "xlsx"];

/// OLE2(xls), ZIP(xlsx) 시그니처
const WORKBOOK_SIGNATURES: &[&[u8]] = &[&[0xD0, 0xCF, 0x11, 0xE0], b"PK\x03\x04"];

/// 헤더가 해석된 표.
#[derive(Debug, Clone)]
pub struct Table {
    /// 원천 파일 이름
    pub file: String,
    pub columns: ColumnMap,
    /// (원천 줄 번호, 필드) - 완전히 빈 행은 제외
    pub rows: Vec<(u64, Vec<String>)>,
}

impl Table {
    /// 스테이징 파일을 CSV 표로 읽습니다.
    ///
    /// 엑셀 통합 문서, UTF-8이 아닌 내용, 헤더가 없는 파일은 `UnparsableFile`입니다.
    pub fn parse(file: &StagedFile) -> Result<Self, IngestError> {
        let unparsable = |reason: String| IngestError::unparsable(file.filename.clone(), reason);

        let is_workbook = file
            .extension()
            .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.as_str()))
            || WORKBOOK_SIGNATURES
                .iter()
                .any(|sig| file.content.starts_with(sig));
        if is_workbook {
            return Err(unparsable("spreadsheet workbooks are not supported".to_string()));
        }

        let text = std::str::from_utf8(&file.content)
            .map_err(|e| unparsable(format!("not UTF-8 text: {}", e)))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| unparsable(e.to_string()))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(unparsable("no header row".to_string()));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| unparsable(e.to_string()))?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            rows.push((line, record.iter().map(str::to_string).collect()));
        }

        Ok(Self {
            file: file.filename.clone(),
            columns: ColumnMap::from_headers(headers.iter()),
            rows,
        })
    }

    pub fn schema(&self) -> SchemaKind {
        classify_headers(&self.columns)
    }
}

/// 헤더로 스키마를 판정합니다. 가격 지표가 자금 흐름 지표보다 우선합니다.
pub fn classify_headers(columns: &ColumnMap) -> SchemaKind {
    if columns.contains_any(PRICE_INDICATORS) {
        SchemaKind::Price
    } else if columns.contains_any(FLOW_INDICATORS) {
        SchemaKind::Flow
    } else {
        SchemaKind::Unknown
    }
}

/// 스테이징 파일 분류
pub fn classify(file: &StagedFile) -> Result<SchemaKind, IngestError> {
    Table::parse(file).map(|table| table.schema())
}

/// 표에서 읽은 레코드와 행 단위 오류.
#[derive(Debug, Clone)]
pub struct Extraction<V> {
    pub records: Vec<RawRecord<V>>,
    pub issues: Vec<IngestError>,
}

impl<V> Default for Extraction<V> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// 표의 모든 행을 `V` 시계열 레코드로 읽습니다.
///
/// 값을 해석할 수 없는 행은 `InvalidValue`로 기록하고 건너뜁니다.
/// 날짜는 문자열 그대로 두고 병합 단계에서 해석합니다.
pub fn extract<V: SeriesValues>(table: &Table) -> Extraction<V> {
    let mut extraction = Extraction::default();

    for (line, row) in &table.rows {
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        let origin = format!("{}:{}", table.file, line);

        match RawRecord::<V>::from_row(&table.columns, &fields, &origin) {
            Ok(record) => extraction.records.push(record),
            Err(e) => extraction.issues.push(e),
        }
    }

    extraction
}

pub fn extract_price(table: &Table) -> Extraction<PriceBar> {
    extract(table)
}

pub fn extract_flow(table: &Table) -> Extraction<NetFlow> {
    extract(table)
}

/// 분류 후 추출 결과.
#[derive(Debug, Clone)]
pub enum Classified {
    Price(Extraction<PriceBar>),
    Flow(Extraction<NetFlow>),
}

impl Classified {
    pub fn schema(&self) -> SchemaKind {
        match self {
            Self::Price(_) => SchemaKind::Price,
            Self::Flow(_) => SchemaKind::Flow,
        }
    }
}

/// 파일을 분류하고 해당 시계열 레코드를 추출합니다.
///
/// `Unknown` 스키마는 `AmbiguousSchema`, 날짜/섹터 컬럼이 없는 파일은
/// `UnparsableFile`입니다.
pub fn classify_and_extract(file: &StagedFile) -> Result<Classified, IngestError> {
    let table = Table::parse(file)?;

    let schema = table.schema();
    if schema == SchemaKind::Unknown {
        return Err(IngestError::AmbiguousSchema {
            file: table.file.clone(),
            headers: table.columns.normalized_headers(),
        });
    }

    for column in [Column::Date, Column::Sector] {
        if !table.columns.has(column) {
            return Err(IngestError::unparsable(
                table.file.clone(),
                format!("missing required column '{}'", column.canonical_name()),
            ));
        }
    }

    let classified = match schema {
        SchemaKind::Price => Classified::Price(extract_price(&table)),
        _ => Classified::Flow(extract_flow(&table)),
    };

    tracing::debug!(file = %table.file, schema = ?schema, rows = table.rows.len(), "스키마 분류 완료");
    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn staged(name: &str, content: &str) -> StagedFile {
        StagedFile::new(name, None, content.as_bytes().to_vec())
    }

    #[test]
    fn test_classification_by_columns() {
        let price = staged("p.csv", "date,sector,open,high,low,close\n");
        let flow = staged("f.csv", "date,sector,net_change\n");
        let other = staged("o.csv", "date,sector,volume\n");

        assert_eq!(classify(&price).unwrap(), SchemaKind::Price);
        assert_eq!(classify(&flow).unwrap(), SchemaKind::Flow);
        assert_eq!(classify(&other).unwrap(), SchemaKind::Unknown);
    }

    #[test]
    fn test_classification_normalizes_headers() {
        let legacy = staged("f.csv", " Date ,sector ,Net FPI Change\n15-Jan-24,Banks,1\n");
        assert_eq!(classify(&legacy).unwrap(), SchemaKind::Flow);

        let upper = staged("p.csv", "DATE,SECTOR,OPEN,HIGH,LOW,CLOSE\n");
        assert_eq!(classify(&upper).unwrap(), SchemaKind::Price);
    }

    #[test]
    fn test_price_takes_precedence() {
        let both = staged("b.csv", "date,sector,open,high,low,close,net\n");
        assert_eq!(classify(&both).unwrap(), SchemaKind::Price);
    }

    #[test]
    fn test_workbooks_and_binary_are_unparsable() {
        let xlsx = staged("Report.xlsx", "date,sector,open\n");
        assert!(matches!(classify(&xlsx), Err(IngestError::UnparsableFile { .. })));

        let zipped = StagedFile::new("Download_id_1.aspx", None, b"PK\x03\x04rest".to_vec());
        assert!(matches!(classify(&zipped), Err(IngestError::UnparsableFile { .. })));

        let latin1 = StagedFile::new("f.csv", None, vec![b'd', 0xE9, b'\n']);
        assert!(matches!(classify(&latin1), Err(IngestError::UnparsableFile { .. })));

        let empty = staged("e.csv", "");
        assert!(matches!(classify(&empty), Err(IngestError::UnparsableFile { .. })));
    }

    #[test]
    fn test_unknown_is_ambiguous_schema() {
        let other = staged("o.csv", "Date,Sector,Volume\n2024-01-01,Banks,10\n");

        let err = classify_and_extract(&other).unwrap_err();
        assert_eq!(
            err,
            IngestError::AmbiguousSchema {
                file: "o.csv".into(),
                headers: vec!["date".into(), "sector".into(), "volume".into()],
            }
        );
    }

    #[test]
    fn test_extract_flow_rows() {
        let file = staged(
            "f.csv",
            "Date,Sector,Net FPI Change\n15-Jan-24,Banks,\"1,200.5\"\n\n15-Jan-24,IT,n/a\n,,\n31-Jan-24,Oil,-3\n",
        );

        let Classified::Flow(extraction) = classify_and_extract(&file).unwrap() else {
            panic!("expected flow");
        };

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].values.net_change, dec!(1200.5));
        assert_eq!(extraction.records[1].sector, "Oil");
        assert_eq!(extraction.records[1].date, "31-Jan-24");
        assert_eq!(extraction.issues.len(), 1);
        assert!(matches!(
            &extraction.issues[0],
            IngestError::InvalidValue { column, origin, .. } if column == "net_change" && origin.starts_with("f.csv:")
        ));
    }

    #[test]
    fn test_missing_key_column_is_unparsable() {
        let file = staged("p.csv", "sector,open,high,low,close\nBanks,1,2,0.5,1.5\n");
        assert!(matches!(
            classify_and_extract(&file),
            Err(IngestError::UnparsableFile { ref reason, .. }) if reason.contains("date")
        ));
    }
}
