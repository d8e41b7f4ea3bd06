//! 실행 요약 구조체.

use fpi_core::{ErrorKind, IngestError, SeriesKind};
use fpi_data::MergeOutcome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// 새 데이터 없음
pub const EXIT_NO_NEW_DATA: u8 = 0;
/// 치명적 에러 (목록 페이지 접근 불가, 저장소 사용 불가, 설정 오류)
pub const EXIT_FATAL: u8 = 1;
/// 새 레코드 수집 완료
pub const EXIT_INGESTED: u8 = 3;

/// 요약에 보관하는 진단 메시지 최대 개수
const MAX_DIAGNOSTICS: usize = 200;

/// 시계열별 병합 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    /// 새 키
    pub inserted: usize,
    /// 값이 바뀐 기존 키
    pub replaced: usize,
    /// 값이 같은 기존 키
    pub unchanged: usize,
    /// 병합 후 저장소 레코드 수
    pub total: usize,
}

impl SeriesSummary {
    pub fn changed(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// 실행 결과 (종료 코드 결정용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 새로 들어오거나 바뀐 레코드 없음
    NoNewData,
    /// N개 레코드 수집
    Ingested(usize),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoNewData => EXIT_NO_NEW_DATA,
            Self::Ingested(_) => EXIT_INGESTED,
        }
    }
}

/// 1회 실행 요약
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// 목록 페이지에서 찾은 리포트 링크 수
    pub listed: usize,
    /// 하이워터마크 이하라 건너뛴 링크 수
    pub stale_skipped: usize,
    /// 이미 스테이징되어 있던 링크 수
    pub already_staged: usize,
    /// 새로 내려받은 파일 수
    pub downloaded: usize,
    /// 병합 대상 스테이징 파일 수
    pub staged_files: usize,
    /// 스키마별 파일 수
    pub price_files: usize,
    pub flow_files: usize,
    pub unknown_files: usize,
    pub unparsable_files: usize,
    /// 시계열별 병합 통계
    pub price: SeriesSummary,
    pub flow: SeriesSummary,
    /// 에러 종류별 개수
    pub errors: BTreeMap<ErrorKind, usize>,
    /// 진단 메시지 (최대 200개)
    pub diagnostics: Vec<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunSummary {
    /// 새 요약 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 복구된 에러를 집계합니다.
    pub fn record_error(&mut self, error: &IngestError) {
        tracing::warn!(kind = %error.kind(), error = %error, "복구된 에러");
        *self.errors.entry(error.kind()).or_default() += 1;
        if self.diagnostics.len() < MAX_DIAGNOSTICS {
            self.diagnostics.push(error.to_string());
        }
    }

    /// 병합 결과를 반영합니다.
    pub fn record_merge<V>(&mut self, kind: SeriesKind, outcome: &MergeOutcome<V>) {
        let series = SeriesSummary {
            inserted: outcome.inserted,
            replaced: outcome.replaced,
            unchanged: outcome.unchanged,
            total: outcome.records.len(),
        };
        match kind {
            SeriesKind::Price => self.price = series,
            SeriesKind::Flow => self.flow = series,
        }
        for issue in &outcome.issues {
            self.record_error(issue);
        }
    }

    /// 전체 에러 수
    pub fn error_count(&self) -> usize {
        self.errors.values().sum()
    }

    /// 새로 들어오거나 바뀐 레코드 수
    pub fn new_records(&self) -> usize {
        self.price.changed() + self.flow.changed()
    }

    pub fn outcome(&self) -> RunOutcome {
        match self.new_records() {
            0 => RunOutcome::NoNewData,
            n => RunOutcome::Ingested(n),
        }
    }

    /// 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        let errors = self
            .errors
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect::<Vec<_>>()
            .join(",");

        tracing::info!(
            operation = operation,
            listed = self.listed,
            stale_skipped = self.stale_skipped,
            already_staged = self.already_staged,
            downloaded = self.downloaded,
            staged_files = self.staged_files,
            price_files = self.price_files,
            flow_files = self.flow_files,
            unknown_files = self.unknown_files,
            unparsable_files = self.unparsable_files,
            price_inserted = self.price.inserted,
            price_replaced = self.price.replaced,
            flow_inserted = self.flow.inserted,
            flow_replaced = self.flow.replaced,
            errors = %errors,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "실행 완료"
        );
    }

    /// JSON 요약
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_and_exit_code() {
        let mut summary = RunSummary::new();
        assert_eq!(summary.outcome(), RunOutcome::NoNewData);
        assert_eq!(summary.outcome().exit_code(), EXIT_NO_NEW_DATA);

        summary.flow.inserted = 2;
        summary.price.replaced = 1;
        summary.price.unchanged = 10;
        assert_eq!(summary.outcome(), RunOutcome::Ingested(3));
        assert_eq!(summary.outcome().exit_code(), EXIT_INGESTED);
    }

    #[test]
    fn test_errors_do_not_change_outcome() {
        let mut summary = RunSummary::new();
        summary.record_error(&IngestError::DownloadFailed {
            url: "https://example.com/a.csv".into(),
            cause: "HTTP 500".into(),
        });
        summary.record_error(&IngestError::AmbiguousSchema {
            file: "o.csv".into(),
            headers: vec!["volume".into()],
        });
        summary.record_error(&IngestError::DownloadFailed {
            url: "https://example.com/b.csv".into(),
            cause: "timeout".into(),
        });

        assert_eq!(summary.error_count(), 3);
        assert_eq!(summary.errors.get(&ErrorKind::DownloadFailed), Some(&2));
        assert_eq!(summary.diagnostics.len(), 3);
        assert_eq!(summary.outcome(), RunOutcome::NoNewData);
    }

    #[test]
    fn test_json_uses_error_kind_names() {
        let mut summary = RunSummary::new();
        summary.record_error(&IngestError::InvalidDate {
            value: "??".into(),
            origin: "f.csv:3".into(),
        });

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["errors"]["invalid_date"], 1);
        assert!(json.get("elapsed").is_none());
    }
}
