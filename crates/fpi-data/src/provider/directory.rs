//! NSDL 리포트 목록 페이지 클라이언트.
//!
//! 목록 페이지의 `<a href>` 중 리포트로 보이는 링크만 추려 절대 URL 집합으로
//! 돌려줍니다. 마크업 구조에는 의존하지 않습니다.
//!
//! ## 리포트 링크 판단
//! - href에 `download` 또는 `report`가 포함됨 (대소문자 무시)
//! - 또는 경로가 `.csv`, `.xls`, `.xlsx`로 끝남

use fpi_core::IngestError;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// 기본 목록 페이지
pub const DEFAULT_LISTING_URL: &str =
    "https://www.fpi.nsdl.co.in/web/Reports/FPI_Fortnightly_Selection.aspx";

const PATH_KEYWORDS: &[&str] = &["download", "report"];
const DATA_EXTENSIONS: &[&str] = &[".csv", ".xls", ".xlsx"];
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:"];

/// 리포트 목록 클라이언트
pub struct ReportDirectory {
    client: Client,
    listing_url: Url,
}

impl ReportDirectory {
    pub fn new(client: Client, listing_url: Url) -> Self {
        Self {
            client,
            listing_url,
        }
    }

    /// 목록 페이지를 읽어 리포트 후보 URL 집합을 반환합니다.
    ///
    /// 네트워크 오류, 2xx 외 상태, HTML이 아닌 응답은 모두 `SourceUnavailable`입니다.
    pub async fn list_reports(&self) -> Result<BTreeSet<Url>, IngestError> {
        tracing::info!(url = %self.listing_url, "리포트 목록 조회 시작");

        let response = self
            .client
            .get(self.listing_url.clone())
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| self.unavailable(e))?;
        let links = extract_report_links(&body, &self.listing_url).map_err(|e| self.unavailable(e))?;

        tracing::info!(count = links.len(), "리포트 후보 링크 탐색 완료");
        Ok(links)
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> IngestError {
        IngestError::SourceUnavailable {
            url: self.listing_url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// HTML 문서에서 리포트 링크를 추출합니다.
///
/// 상대 경로는 `base` 기준으로 해석하고, fragment는 제거해 중복을 합칩니다.
pub fn extract_report_links(html: &str, base: &Url) -> Result<BTreeSet<Url>, String> {
    if !html.contains('<') {
        return Err("response is not an HTML document".to_string());
    }

    let selector =
        Selector::parse("a[href]").map_err(|e| format!("invalid link selector: {:?}", e))?;
    let document = Html::parse_document(html);

    let links = document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_report_href(href))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect();

    Ok(links)
}

/// href가 다운로드 가능한 리포트를 가리키는지 판단
pub fn is_report_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    if lower.is_empty()
        || lower.starts_with('#')
        || IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
    {
        return false;
    }

    let path = lower.split(['?', '#']).next().unwrap_or_default();

    PATH_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        || DATA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
