//! FPI 리포트 수집기.
//!
//! 이 crate는 스케줄러나 운영자가 실행하는 수집 바이너리를 제공합니다:
//! - 1회 실행: 목록 조회 → 신선도 필터 → 다운로드 → 분류 → 병합
//! - 스테이징 영역만 다시 병합 (네트워크 없음)
//! - 저장소 상태 조회, 조인 뷰 내보내기
//! - 데몬 모드

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::{RunOutcome, RunSummary};
