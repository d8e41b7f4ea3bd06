//! 스테이징 파일.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Fetcher가 내려받아 스테이징 영역에 둔 파일. 생성 이후 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub filename: String,
    pub path: PathBuf,
    /// 파일 이름에 포함된 날짜 (있는 경우)
    pub discovered_date: Option<NaiveDate>,
    pub content: Vec<u8>,
}

impl StagedFile {
    pub fn new(path: impl Into<PathBuf>, discovered_date: Option<NaiveDate>, content: Vec<u8>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            filename,
            path,
            discovered_date,
            content,
        }
    }

    /// 소문자 확장자
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// 경로의 소문자 확장자
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_file_name_and_extension() {
        let file = StagedFile::new("FPI_Reports/Sector_15-Jan-24.CSV", None, b"a,b\n".to_vec());

        assert_eq!(file.filename, "Sector_15-Jan-24.CSV");
        assert_eq!(file.extension().as_deref(), Some("csv"));
    }
}
