//! # FPI Core
//!
//! 섹터 지수(OHLC)와 FPI 자금 흐름 데이터셋의 핵심 도메인 타입을 제공합니다.
//!
//! 이 크레이트는 수집 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 정규 레코드 (가격 / 자금 흐름) 및 자연 키
//! - 스테이징 파일과 하이워터마크
//! - 컬럼 어휘 (헤더 정규화 규칙)
//! - 에러 분류 체계
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod vocabulary;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use vocabulary::{normalize_header, Column, ColumnMap};
