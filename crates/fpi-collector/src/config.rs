//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use fpi_data::{fetcher::DEFAULT_CONCURRENCY, Url, DEFAULT_LISTING_URL};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 원천 설정
    pub source: SourceConfig,
    /// 저장 경로 설정
    pub storage: StorageConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 원천(목록 페이지, 다운로드) 설정
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// 리포트 목록 페이지
    pub listing_url: Url,
    /// 요청당 타임아웃 (초)
    pub http_timeout_secs: u64,
    /// User-Agent 헤더
    pub user_agent: String,
    /// 동시 다운로드 수
    pub fetch_concurrency: usize,
}

/// 저장 경로 설정
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// 스테이징 디렉토리
    pub staging_dir: PathBuf,
    /// 가격 정규 저장소
    pub price_store: PathBuf,
    /// 자금 흐름 정규 저장소
    pub flow_store: PathBuf,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정을 만듭니다. 값이 없거나 해석할 수 없으면 기본값을 씁니다.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_url = lookup("FPI_LISTING_URL").unwrap_or_else(|| DEFAULT_LISTING_URL.to_string());
        let listing_url = Url::parse(&raw_url).map_err(|e| {
            CollectorError::Config(format!("FPI_LISTING_URL '{}' is not a valid URL: {}", raw_url, e))
        })?;

        let fetch_concurrency = env_var_parse(&lookup, "FPI_FETCH_CONCURRENCY", DEFAULT_CONCURRENCY);
        if fetch_concurrency == 0 {
            return Err(CollectorError::Config(
                "FPI_FETCH_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            source: SourceConfig {
                listing_url,
                http_timeout_secs: env_var_parse(&lookup, "FPI_HTTP_TIMEOUT_SECS", 15),
                user_agent: lookup("FPI_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                fetch_concurrency,
            },
            storage: StorageConfig {
                staging_dir: env_var_path(&lookup, "FPI_STAGING_DIR", "FPI_Reports"),
                price_store: env_var_path(&lookup, "FPI_PRICE_STORE", "Fortnightly_Sector_Indices.csv"),
                flow_store: env_var_path(&lookup, "FPI_FLOW_STORE", "Updated_FPI_Data_Formatted.csv"),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse(&lookup, "DAEMON_INTERVAL_MINUTES", 1440),
            },
        })
    }

    /// 타임아웃과 User-Agent가 적용된 HTTP 클라이언트
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.source.timeout())
            .user_agent(self.source.user_agent.clone())
            .build()?)
    }
}

impl SourceConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환 (최소 1분)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 경로 읽기 (빈 값이면 기본값 사용)
fn env_var_path(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CollectorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CollectorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.source.listing_url.as_str(), DEFAULT_LISTING_URL);
        assert_eq!(config.source.timeout(), Duration::from_secs(15));
        assert_eq!(config.source.fetch_concurrency, 4);
        assert_eq!(config.storage.staging_dir, PathBuf::from("FPI_Reports"));
        assert_eq!(
            config.storage.flow_store,
            PathBuf::from("Updated_FPI_Data_Formatted.csv")
        );
        assert_eq!(config.daemon.interval(), Duration::from_secs(1440 * 60));
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let config = config_from(&[
            ("FPI_STAGING_DIR", "/tmp/staging"),
            ("FPI_HTTP_TIMEOUT_SECS", "30"),
            ("DAEMON_INTERVAL_MINUTES", "not-a-number"),
        ])
        .unwrap();

        assert_eq!(config.storage.staging_dir, PathBuf::from("/tmp/staging"));
        assert_eq!(config.source.http_timeout_secs, 30);
        assert_eq!(config.daemon.interval_minutes, 1440);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            config_from(&[("FPI_LISTING_URL", "not a url")]),
            Err(CollectorError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("FPI_FETCH_CONCURRENCY", "0")]),
            Err(CollectorError::Config(_))
        ));
    }
}
