//! 정규 데이터셋 저장소.

pub mod csv_store;
