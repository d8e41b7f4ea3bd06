//! 섹터 데이터셋 도메인 모델.

mod parse;
mod record;
mod series;
mod staged;

pub use parse::*;
pub use record::*;
pub use series::*;
pub use staged::*;
