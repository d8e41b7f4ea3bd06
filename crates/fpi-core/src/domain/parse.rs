//! 날짜/숫자 필드 파싱.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 저장소 날짜 직렬화 형식
pub const STORE_DATE_FORMAT: &str = "%Y-%m-%d";

/// 허용하는 날짜 형식. 두 자리 연도 형식을 네 자리 형식보다 먼저 시도합니다
/// (`%Y`는 "24"도 0024년으로 받아들이기 때문).
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %b %y",
    "%d %b %Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
];

/// 시각이 붙은 값에서 날짜 부분에만 적용하는 형식
const TIMESTAMP_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const MIN_YEAR: i32 = 1900;

/// 날짜 문자열 파싱.
///
/// 월 약어는 대소문자를 구분하지 않습니다. `2024-01-05 00:00:00`,
/// `2024-01-05T00:00:00` 같은 타임스탬프는 날짜 부분만 사용합니다.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    parse_with(value, DATE_FORMATS).or_else(|| {
        let (head, _) = value.split_once(['T', ' '])?;
        parse_with(head, TIMESTAMP_DATE_FORMATS)
    })
}

/// 형식 목록을 순서대로 시도합니다. `MIN_YEAR` 이전 연도로 읽히면 다음 형식으로 넘어갑니다.
fn parse_with(value: &str, formats: &[&str]) -> Option<NaiveDate> {
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .filter(|date| date.year() >= MIN_YEAR)
    })
}

/// 저장소 형식(`YYYY-MM-DD`)으로 날짜 직렬화
pub fn format_date(date: NaiveDate) -> String {
    date.format(STORE_DATE_FORMAT).to_string()
}

/// 숫자 필드 파싱.
///
/// 천 단위 구분자, 통화 기호(₹, $), 회계식 음수 `(12.5)`를 처리합니다.
/// 빈 값, `-`, `NA`, `nan`은 값 없음으로 간주합니다.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$') && !c.is_whitespace())
        .collect();

    if matches!(
        cleaned.to_lowercase().as_str(),
        "" | "-" | "na" | "n/a" | "nan" | "null"
    ) {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;

    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("15-Jan-24"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("15-JAN-2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("15 Jan 2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("15/01/2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date(" 2024/01/15 "), Some(d(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_timestamps() {
        assert_eq!(parse_date("2024-01-15 00:00:00"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T09:30:00"), Some(d(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("31-Feb-2024"), None);
        assert_eq!(parse_date("0024-01-01"), None);
        assert_eq!(parse_date("15-01-1899"), None);
    }

    #[test]
    fn test_early_year_falls_through_to_next_format() {
        // `%Y`는 "01"을 0001년으로 읽음
        assert_eq!(
            parse_with("01-02-03", &["%Y-%m-%d", "%d-%m-%y"]),
            Some(d(2003, 2, 1))
        );
        assert_eq!(parse_with("01-02-03", &["%Y-%m-%d"]), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(d(2024, 3, 5)), "2024-03-05");
        assert_eq!(parse_date(&format_date(d(2024, 3, 5))), Some(d(2024, 3, 5)));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal("-12.5"), Some(dec!(-12.5)));
        assert_eq!(parse_decimal("(12.5)"), Some(dec!(-12.5)));
        assert_eq!(parse_decimal("₹ 100"), Some(dec!(100)));
        assert_eq!(parse_decimal("1e3"), Some(dec!(1000)));
    }

    #[test]
    fn test_parse_decimal_missing_values() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal(" - "), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("abc"), None);
    }
}
