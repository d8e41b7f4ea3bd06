//! 파일 이름 날짜 기반 신선도 필터.
//!
//! 리포트 URL에 `15-Jan-24`, `31 May 2024` 같은 날짜 토큰이 있으면 하이워터마크와
//! 비교해 이미 수집한 기간의 파일을 건너뜁니다. 어느 시계열의 파일인지 아직 모르므로
//! 두 마크 중 이른 날짜를 기준으로 삼습니다. 날짜를 찾지 못한 URL은 항상 포함합니다.
//!
//! 이 필터는 대역폭 절약용입니다. 잘못 포함된 파일은 병합 단계의 중복 제거가
//! 정리합니다.

use chrono::NaiveDate;
use fpi_core::HighWaterMarks;
use regex::Regex;
use reqwest::Url;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// `일-월-연` 토큰. 구분자는 `-`, `_`, 공백이고 연도는 2자리 또는 4자리입니다.
/// 연도 뒤 경계는 [`extract_date_token`]에서 확인합니다.
fn date_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[^0-9])([0-9]{1,2})[-_ ]([a-z]{3,9})[-_ ]([0-9]{4}|[0-9]{2})")
            .expect("date token pattern is valid")
    })
}

/// 문자열에서 첫 번째로 해석 가능한 날짜 토큰을 찾습니다.
pub fn extract_date_token(text: &str) -> Option<NaiveDate> {
    date_token_pattern().captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        if text[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let day = caps.get(1)?.as_str();
        let month: String = caps.get(2)?.as_str().chars().take(3).collect();
        let year = caps.get(3)?.as_str();

        let token = format!("{}-{}-{}", day, month, year);
        let format = if year.len() == 4 { "%d-%b-%Y" } else { "%d-%b-%y" };
        NaiveDate::parse_from_str(&token, format).ok()
    })
}

/// URL에 포함된 날짜.
///
/// 마지막 경로 조각을 먼저 보고, 없으면 쿼리 문자열을 봅니다.
pub fn embedded_date(url: &Url) -> Option<NaiveDate> {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| segment.replace("%20", " "))
        .unwrap_or_default();

    extract_date_token(&segment).or_else(|| {
        url.query()
            .map(|query| query.replace("%20", " ").replace('+', " "))
            .and_then(|query| extract_date_token(&query))
    })
}

/// 내려받을 URL을 고릅니다.
///
/// 날짜가 기준일보다 엄격히 늦은 URL과 날짜가 없는 URL을 입력 순서대로 반환합니다.
/// 기준일이 없으면(한쪽 저장소가 비어 있으면) 모든 URL을 반환합니다.
pub fn select_new(urls: &BTreeSet<Url>, marks: &HighWaterMarks) -> Vec<Url> {
    let Some(cutoff) = marks.cutoff() else {
        tracing::debug!(count = urls.len(), "하이워터마크 없음, 전체 URL 선택");
        return urls.iter().cloned().collect();
    };

    urls.iter()
        .filter(|url| match embedded_date(url) {
            Some(date) if date <= cutoff => {
                tracing::debug!(url = %url, date = %date, cutoff = %cutoff, "이미 수집한 기간, 건너뜀");
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}
