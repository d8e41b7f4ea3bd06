//! CSV 정규 저장소.
//!
//! 시계열 하나당 헤더가 있는 CSV 파일 하나입니다.
//! - 가격: `date, sector, open, high, low, close` + 통과 컬럼
//! - 자금 흐름: `date, sector, net_change`
//!
//! 날짜는 항상 `YYYY-MM-DD`로 기록합니다. 읽을 때는 컬럼 어휘로 헤더를 해석하므로
//! `Date, sector , Net FPI Change` 같은 기존 파일도 그대로 읽힙니다.
//!
//! 쓰기는 같은 디렉토리의 임시 파일에 기록한 뒤 이름을 바꿉니다.

use chrono::NaiveDate;
use fpi_core::vocabulary::{normalize_header, resolve_column};
use fpi_core::{
    format_date, parse_date, Column, ColumnMap, IngestError, RawRecord, Record, SeriesValues,
};
use std::collections::BTreeSet;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// 저장소에서 읽은 내용.
#[derive(Debug, Clone)]
pub struct StoreSnapshot<V> {
    /// 날짜 해석 전 레코드 (파일 순서)
    pub records: Vec<RawRecord<V>>,
    /// 값을 해석할 수 없어 제외한 행
    pub issues: Vec<IngestError>,
}

impl<V> StoreSnapshot<V> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 시계열 `V`의 CSV 저장소.
#[derive(Debug)]
pub struct CsvStore<V> {
    path: PathBuf,
    _series: PhantomData<fn() -> V>,
}

impl<V: SeriesValues> CsvStore<V> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _series: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// 저장소 전체를 읽습니다.
    ///
    /// 파일이 없거나 비어 있으면 빈 저장소입니다. 필수 컬럼이 없거나 파일을 읽을 수
    /// 없으면 `StoreUnavailable`입니다.
    pub fn load(&self) -> Result<StoreSnapshot<V>, IngestError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreSnapshot::empty())
            }
            Err(e) => return Err(self.unavailable(e)),
        };

        let text = std::str::from_utf8(&content).map_err(|e| self.unavailable(e))?;
        if text.trim().is_empty() {
            return Ok(StoreSnapshot::empty());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(|e| self.unavailable(e))?.clone();
        let columns = ColumnMap::from_headers(headers.iter());
        if let Some(missing) = required_columns::<V>().find(|c| !columns.has(*c)) {
            return Err(self.unavailable(format!(
                "missing column '{}'",
                missing.canonical_name()
            )));
        }

        let file = self.display_name();
        let mut snapshot = StoreSnapshot::empty();
        for result in reader.records() {
            let row = result.map_err(|e| self.unavailable(e))?;
            if row.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let fields: Vec<&str> = row.iter().collect();
            let origin = format!("{}:{}", file, line);
            match RawRecord::<V>::from_row(&columns, &fields, &origin) {
                Ok(record) => snapshot.records.push(record),
                Err(e) => snapshot.issues.push(e),
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            series = %V::KIND,
            records = snapshot.records.len(),
            "저장소 로드"
        );
        Ok(snapshot)
    }

    /// 날짜가 해석되는 레코드만 (날짜, 섹터) 순으로 반환합니다.
    pub fn load_records(&self) -> Result<Vec<Record<V>>, IngestError> {
        let mut records: Vec<Record<V>> = self
            .load()?
            .records
            .into_iter()
            .filter_map(|raw| {
                let date = parse_date(&raw.date)?;
                Some(Record::new(date, raw.sector, raw.values))
            })
            .collect();

        records.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(records)
    }

    /// 저장소의 최대 날짜. 호출할 때마다 파일을 다시 읽습니다.
    pub fn high_water_mark(&self) -> Result<Option<NaiveDate>, IngestError> {
        Ok(self
            .load()?
            .records
            .iter()
            .filter_map(|raw| parse_date(&raw.date))
            .max())
    }

    /// 저장소 전체를 `records`로 교체합니다.
    pub fn save(&mut self, records: &[Record<V>]) -> Result<(), IngestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }

        let tmp_path = self
            .path
            .with_file_name(format!(".{}.tmp", self.display_name()));

        if let Err(e) = write_csv(&tmp_path, records) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.unavailable(e));
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.unavailable(format!("atomic rename failed: {}", e))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            series = %V::KIND,
            records = records.len(),
            "저장소 기록"
        );
        Ok(())
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> IngestError {
        IngestError::store(self.path.display(), reason)
    }
}

/// `date`, `sector`와 시계열 고정 컬럼
fn required_columns<V: SeriesValues>() -> impl Iterator<Item = Column> {
    [Column::Date, Column::Sector].into_iter().chain(
        V::value_columns()
            .iter()
            .filter_map(|name| resolve_column(&normalize_header(name))),
    )
}

fn write_csv<V: SeriesValues>(path: &Path, records: &[Record<V>]) -> Result<(), csv::Error> {
    let extras: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.values.passthrough())
        .flat_map(|extras| extras.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["date", "sector"];
    header.extend(V::value_columns());
    header.extend(extras.iter().copied());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![format_date(record.date), record.sector.clone()];
        row.extend(record.values.to_fields());
        if !extras.is_empty() {
            let passthrough = record.values.passthrough();
            row.extend(extras.iter().map(|name| {
                passthrough
                    .and_then(|map| map.get(*name))
                    .cloned()
                    .unwrap_or_default()
            }));
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
