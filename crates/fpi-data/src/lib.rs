//! 리포트 수집 및 정규 데이터셋 관리.
//!
//! 이 crate는 수집 파이프라인의 구성 요소를 제공합니다:
//! - 리포트 목록 페이지 탐색 (`provider::directory`)
//! - 파일 이름 날짜 기반 신선도 필터 (`freshness`)
//! - 스테이징 영역 다운로드 (`fetcher`)
//! - 컬럼 기반 스키마 분류 (`classifier`)
//! - 자연 키 중복 제거 병합 (`reconciler`)
//! - CSV 정규 저장소 (`storage`)
//! - 표시 계층용 읽기 API (`view`)

pub mod classifier;
pub mod fetcher;
pub mod freshness;
pub mod provider;
pub mod reconciler;
pub mod storage;
pub mod view;

pub use classifier::{classify, classify_and_extract, classify_headers, Classified, Extraction, Table};
pub use fetcher::{FetchOutcome, Fetcher};
pub use freshness::{embedded_date, select_new};
pub use provider::directory::{ReportDirectory, DEFAULT_LISTING_URL};
pub use reconciler::{BatchReplace, MergeOutcome, MergePolicy, Reconciler};
pub use storage::csv_store::{CsvStore, StoreSnapshot};
pub use view::{DatasetReader, DatasetSnapshot, JoinedRow};

pub use reqwest::Url;
