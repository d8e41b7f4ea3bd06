//! 수집 파이프라인의 에러 타입.
//!
//! `SourceUnavailable`과 `StoreUnavailable`만 실행 전체를 중단시킵니다.
//! 나머지는 해당 파일/레코드만 제외하고 실행 요약에 집계됩니다.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 수집 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// 목록 페이지 접근 불가 (네트워크 오류, 2xx 외 상태, 해석 불가 마크업)
    #[error("listing endpoint unavailable ({url}): {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// 개별 리포트 다운로드 실패
    #[error("download failed for {url}: {cause}")]
    DownloadFailed { url: String, cause: String },

    /// 표 형식으로 읽을 수 없는 스테이징 파일
    #[error("unparsable file {file}: {reason}")]
    UnparsableFile { file: String, reason: String },

    /// 가격/자금 흐름 어느 쪽으로도 분류되지 않는 파일
    #[error("ambiguous schema in {file}: columns [{}]", .headers.join(", "))]
    AmbiguousSchema { file: String, headers: Vec<String> },

    /// 날짜 필드 파싱 실패
    #[error("invalid date '{value}' in {origin}")]
    InvalidDate { value: String, origin: String },

    /// 가격/자금 흐름/섹터 필드 파싱 실패
    #[error("invalid {column} value '{value}' in {origin}")]
    InvalidValue {
        column: String,
        value: String,
        origin: String,
    },

    /// 정규 저장소 읽기/쓰기 실패
    #[error("dataset store unavailable ({path}): {reason}")]
    StoreUnavailable { path: String, reason: String },
}

/// 에러 종류 (실행 요약의 집계 키).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    DownloadFailed,
    UnparsableFile,
    AmbiguousSchema,
    InvalidDate,
    InvalidValue,
    StoreUnavailable,
}

impl ErrorKind {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::DownloadFailed => "download_failed",
            Self::UnparsableFile => "unparsable_file",
            Self::AmbiguousSchema => "ambiguous_schema",
            Self::InvalidDate => "invalid_date",
            Self::InvalidValue => "invalid_value",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngestError {
    /// 에러 종류를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Self::UnparsableFile { .. } => ErrorKind::UnparsableFile,
            Self::AmbiguousSchema { .. } => ErrorKind::AmbiguousSchema,
            Self::InvalidDate { .. } => ErrorKind::InvalidDate,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
        }
    }

    /// 실행 전체를 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SourceUnavailable | ErrorKind::StoreUnavailable
        )
    }

    pub fn store(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::StoreUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unparsable(file: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::UnparsableFile {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}
