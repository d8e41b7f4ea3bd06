//! 리포트 다운로드 및 스테이징.
//!
//! 각 URL은 스테이징 디렉토리의 고유한 파일 하나로 저장됩니다. 대상 파일이 이미
//! 있으면 네트워크 요청 없이 건너뛰므로 반복 실행해도 안전합니다.
//!
//! 다운로드는 `<name>.part`에 먼저 쓰고 완료 후 이름을 바꿉니다. 중단된 다운로드가
//! 스테이징된 파일로 취급되는 일은 없습니다.

use crate::freshness::{embedded_date, extract_date_token};
use fpi_core::{IngestError, StagedFile};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 기본 동시 다운로드 수
pub const DEFAULT_CONCURRENCY: usize = 4;

const PARTIAL_SUFFIX: &str = ".part";
const FALLBACK_STEM: &str = "report";
/// 충돌 구분용 URL 해시 길이 (hex 문자 수)
const URL_TAG_LEN: usize = 8;

/// 단일 URL 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 새로 내려받음
    Downloaded(StagedFile),
    /// 이미 스테이징되어 있어 건너뜀 (네트워크 요청 없음)
    AlreadyStaged(PathBuf),
}

/// 스테이징 영역 다운로더.
pub struct Fetcher {
    client: Client,
    staging_dir: PathBuf,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(client: Client, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            staging_dir: staging_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// 동시 다운로드 수 설정 (최소 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// URL 하나를 스테이징합니다.
    ///
    /// 실패는 `DownloadFailed`로 반환되며 다른 URL 처리에는 영향이 없습니다.
    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome, IngestError> {
        self.fetch_as(url, staged_filename(url)).await
    }

    async fn fetch_as(&self, url: &Url, filename: String) -> Result<FetchOutcome, IngestError> {
        let target = self.staging_dir.join(&filename);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::debug!(url = %url, file = %filename, "이미 스테이징됨, 다운로드 건너뜀");
            return Ok(FetchOutcome::AlreadyStaged(target));
        }

        let failed = |cause: String| IngestError::DownloadFailed {
            url: url.to_string(),
            cause,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| failed(format!("staging directory: {}", e)))?;

        let partial = self
            .staging_dir
            .join(format!("{}{}", filename, PARTIAL_SUFFIX));
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| failed(format!("write {}: {}", partial.display(), e)))?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(failed(format!("rename {}: {}", partial.display(), e)));
        }

        tracing::info!(url = %url, file = %filename, bytes = bytes.len(), "리포트 다운로드 완료");

        let discovered = embedded_date(url).or_else(|| extract_date_token(&filename));
        Ok(FetchOutcome::Downloaded(StagedFile::new(
            target,
            discovered,
            bytes.to_vec(),
        )))
    }

    /// 여러 URL을 제한된 동시성으로 스테이징합니다.
    ///
    /// 같은 스테이징 이름으로 모이는 URL은 [`batch_filenames`]로 구분합니다.
    /// 결과는 URL 순서로 정렬되어 반환됩니다.
    pub async fn fetch_all(&self, urls: &[Url]) -> Vec<(Url, Result<FetchOutcome, IngestError>)> {
        let names = batch_filenames(urls);
        let mut results: Vec<_> = stream::iter(urls.iter().cloned().zip(names))
            .map(|(url, filename)| async move {
                let outcome = self.fetch_as(&url, filename).await;
                if let Err(e) = &outcome {
                    tracing::warn!(url = %url, error = %e, "리포트 다운로드 실패");
                }
                (url, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// 스테이징 영역의 파일 목록 (스테이징된 순서, 같은 시각이면 이름순).
    ///
    /// 순서는 파일 수정 시각 기준입니다. 숨김 파일과 `.part` 파일은 제외합니다.
    /// 디렉토리가 없으면 빈 목록입니다.
    pub async fn staged_files(&self) -> Result<Vec<PathBuf>, IngestError> {
        let mut entries = match tokio::fs::read_dir(&self.staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IngestError::store(self.staging_dir.display(), e)),
        };

        let mut files: Vec<(Option<SystemTime>, PathBuf)> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IngestError::store(self.staging_dir.display(), e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && !name.starts_with('.') && !name.ends_with(PARTIAL_SUFFIX) {
                let modified = entry.metadata().await.ok().and_then(|m| m.modified().ok());
                files.push((modified, entry.path()));
            }
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// 스테이징된 파일을 읽습니다.
    pub async fn load(&self, path: &Path) -> Result<StagedFile, IngestError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::unparsable(path.display().to_string(), e))?;

        let discovered = path
            .file_name()
            .and_then(|name| extract_date_token(&name.to_string_lossy()));

        Ok(StagedFile::new(path, discovered, content))
    }
}

/// URL에 대응하는 스테이징 파일 이름.
///
/// 마지막 경로 조각에 쿼리 문자열을 덧붙여 `Download.aspx?id=1`과
/// `Download.aspx?id=2`가 서로 다른 파일이 되도록 합니다. 영숫자와 `.`, `_`, `-`
/// 외의 문자는 `_`로 바꿉니다.
pub fn staged_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| segment.replace("%20", " "))
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string());

    let (stem, extension) = match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (segment.clone(), None),
    };

    let stem = match url.query().filter(|q| !q.is_empty()) {
        Some(query) => format!("{}_{}", stem, query.replace("%20", " ")),
        None => stem,
    };

    let name = match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    };

    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 배치 전체의 스테이징 파일 이름.
///
/// 서로 다른 URL이 같은 이름(`/2023/flows.csv`, `/2024/flows.csv`)으로 모이면 처음
/// 나온 URL만 그 이름을 쓰고, 나머지는 전체 URL의 SHA-256 앞 8자리를 붙입니다.
pub fn batch_filenames(urls: &[Url]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(urls.len());
    urls.iter()
        .map(|url| {
            let name = staged_filename(url);
            if taken.insert(name.clone()) {
                return name;
            }
            let tagged = tagged_filename(&name, url);
            tracing::debug!(url = %url, file = %tagged, "스테이징 이름 충돌, URL 해시로 구분");
            taken.insert(tagged.clone());
            tagged
        })
        .collect()
}

fn tagged_filename(name: &str, url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let tag = &digest[..URL_TAG_LEN];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, tag, ext),
        _ => format!("{}_{}", name, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_staged_filename() {
        assert_eq!(
            staged_filename(&url("https://example.com/files/Sector_15-Jan-24.csv")),
            "Sector_15-Jan-24.csv"
        );
        assert_eq!(
            staged_filename(&url("https://example.com/Download.aspx?id=1&type=csv")),
            "Download_id_1_type_csv.aspx"
        );
        assert_eq!(
            staged_filename(&url("https://example.com/FPI%2015%20Jan%202024.xlsx")),
            "FPI_15_Jan_2024.xlsx"
        );
        assert_eq!(staged_filename(&url("https://example.com/")), "report");
    }

    #[test]
    fn test_distinct_queries_do_not_collide() {
        let a = staged_filename(&url("https://example.com/Download.aspx?id=1"));
        let b = staged_filename(&url("https://example.com/Download.aspx?id=2"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_fetch_writes_staged_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files/Flows_15-Jan-24.csv")
            .with_status(200)
            .with_body("date,sector,net_change\n2024-01-15,Banks,10\n")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Client::new(), dir.path().join("staging"));
        let target = url(&format!("{}/files/Flows_15-Jan-24.csv", server.url()));

        let outcome = fetcher.fetch(&target).await.unwrap();

        mock.assert_async().await;
        let FetchOutcome::Downloaded(file) = outcome else {
            panic!("expected a download");
        };
        assert_eq!(file.filename, "Flows_15-Jan-24.csv");
        assert_eq!(file.discovered_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert!(file.path.exists());
        assert!(!dir.path().join("staging/Flows_15-Jan-24.csv.part").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.csv")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Client::new(), dir.path());
        let target = url(&format!("{}/missing.csv", server.url()));

        let err = fetcher.fetch(&target).await.unwrap_err();

        assert!(matches!(err, IngestError::DownloadFailed { ref cause, .. } if cause.contains("404")));
        assert!(!err.is_fatal());
        assert!(fetcher.staged_files().await.unwrap().is_empty());
    }

    fn stage_at(path: &Path, secs: u64) {
        std::fs::write(path, "x").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000 + secs);
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[tokio::test]
    async fn test_staged_files_skips_partial_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        stage_at(&dir.path().join("b.csv"), 0);
        stage_at(&dir.path().join("a.csv"), 0);
        std::fs::write(dir.path().join("c.csv.part"), "x").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let fetcher = Fetcher::new(Client::new(), dir.path());
        let files = fetcher.staged_files().await.unwrap();

        assert_eq!(files, vec![dir.path().join("a.csv"), dir.path().join("b.csv")]);
    }

    #[tokio::test]
    async fn test_staged_files_in_staging_order() {
        let dir = tempfile::tempdir().unwrap();
        stage_at(&dir.path().join("FPI_31-Jan-24.csv"), 10);
        stage_at(&dir.path().join("Download_id_2.aspx"), 20);
        stage_at(&dir.path().join("FPI_15-Jan-24.csv"), 30);

        let fetcher = Fetcher::new(Client::new(), dir.path());
        let files = fetcher.staged_files().await.unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("FPI_31-Jan-24.csv"),
                dir.path().join("Download_id_2.aspx"),
                dir.path().join("FPI_15-Jan-24.csv"),
            ]
        );
    }

    #[test]
    fn test_batch_filenames_separate_same_segment() {
        let urls = [
            url("https://example.com/2023/flows.csv"),
            url("https://example.com/2024/flows.csv"),
            url("https://example.com/2024/prices.csv"),
        ];

        let names = batch_filenames(&urls);

        assert_eq!(names[0], "flows.csv");
        assert!(names[1].starts_with("flows_") && names[1].ends_with(".csv"));
        assert_eq!(names[1].len(), "flows_.csv".len() + URL_TAG_LEN);
        assert_eq!(names[2], "prices.csv");
        assert_eq!(batch_filenames(&urls), names);
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_colliding_reports() {
        let mut server = mockito::Server::new_async().await;
        let older = server
            .mock("GET", "/2023/flows.csv")
            .with_status(200)
            .with_body("date,sector,net_change\n2023-01-15,Banks,1\n")
            .expect(1)
            .create_async()
            .await;
        let newer = server
            .mock("GET", "/2024/flows.csv")
            .with_status(200)
            .with_body("date,sector,net_change\n2024-01-15,Banks,2\n")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Client::new(), dir.path());
        let urls = vec![
            url(&format!("{}/2023/flows.csv", server.url())),
            url(&format!("{}/2024/flows.csv", server.url())),
        ];

        let results = fetcher.fetch_all(&urls).await;
        let paths: Vec<PathBuf> = results
            .iter()
            .map(|(_, outcome)| match outcome {
                Ok(FetchOutcome::Downloaded(file)) => file.path.clone(),
                other => panic!("expected a download, got {:?}", other),
            })
            .collect();

        assert_ne!(paths[0], paths[1]);
        assert_eq!(fetcher.staged_files().await.unwrap().len(), 2);
        let bodies: HashSet<String> = paths
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(bodies.len(), 2);

        // 같은 배치를 다시 받으면 두 파일 모두 이미 스테이징된 상태
        let again = fetcher.fetch_all(&urls).await;
        assert!(again
            .iter()
            .all(|(_, o)| matches!(o, Ok(FetchOutcome::AlreadyStaged(_)))));
        older.assert_async().await;
        newer.assert_async().await;
    }

    #[tokio::test]
    async fn test_staged_files_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Client::new(), dir.path().join("absent"));

        assert!(fetcher.staged_files().await.unwrap().is_empty());
    }
}
