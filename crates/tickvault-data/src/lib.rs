//! 샤드 단위 레코드 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - 레코드에서 샤드 키 결정 및 배치 그룹화
//! - 샤드별 락 맵을 통한 동시 병합 직렬화
//! - 키 기준 멱등 병합과 원자적 파일 기록
//! - 감성 재분류를 위한 뉴스 upsert
//! - 일별 버킷 격자 기반 누락 감지

pub mod completeness;
pub mod error;
pub mod guard;
pub mod merge;
pub mod news;
pub mod shard;
pub mod storage;
pub mod store;

pub use error::{Result, StoreError};

pub use completeness::{CompletenessAuditor, CompletenessReport};
pub use guard::ShardLocks;
pub use merge::{merge, ConflictPolicy, MergeOutcome, ShardRecord};
pub use news::{NewsCache, UpsertOutcome};
pub use shard::{decode_records, group_candles, group_news, Grouped, Rejected, ShardKey, ShardKind};
pub use storage::{ShardFiles, ShardRead};
pub use store::{BatchReport, RecordStore, ShardReport};
