//! tickvault 수집기.
//!
//! 생산자 파일을 정규화해 레코드 저장소에 병합하는 얇은 오케스트레이션 계층입니다:
//! - 시계열 가져오기 (Binance kline, historicals 객체)
//! - RSS 뉴스 가져오기 (이미 캐시된 항목은 건너뜀)
//! - 일별 완전성 점검
//! - 미처리 뉴스 조회와 감성 라벨 반영

pub mod config;
pub mod error;
pub mod modules;
pub mod normalize;
pub mod pool;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use pool::{run_tasks, TaskOutcome, TaskSummary};
pub use stats::CollectionStats;
