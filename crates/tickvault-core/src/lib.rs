//! # Tickvault Core
//!
//! 시계열/뉴스 아카이브의 공통 타입을 제공합니다:
//! - 시계열(OHLCV) 및 뉴스 레코드
//! - 샘플링 간격, 심볼, 출처 태그
//! - 레코드 검증 에러
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
