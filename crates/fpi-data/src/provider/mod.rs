//! 원격 리포트 소스.

pub mod directory;
