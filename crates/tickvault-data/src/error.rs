//! 저장소 오류 타입.

use std::path::PathBuf;
use thiserror::Error;
use tickvault_core::RecordError;

/// 샤드 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 잘못된 레코드 (해당 레코드만 건너뜀)
    #[error("잘못된 레코드: {0}")]
    Malformed(RecordError),

    /// 샤드 파일 내용을 해석할 수 없음
    #[error("손상된 샤드 {path}: {reason}")]
    CorruptShard { path: PathBuf, reason: String },

    /// 존재하지만 읽을 수 없는 샤드 (권한, 디스크 오류 등)
    #[error("샤드 읽기 실패 {path}: {source}")]
    ShardUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 지원하지 않는 간격
    #[error("지원하지 않는 간격: {0}")]
    UnsupportedInterval(String),

    /// 샤드 기록 실패 (이전 상태는 보존됨)
    #[error("샤드 기록 실패 {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 샤드 락 대기 시간 초과
    #[error("샤드 락 대기 시간 초과 ({waited_ms}ms): {shard}")]
    LockTimeout { shard: String, waited_ms: u64 },

    /// 레코드를 찾을 수 없음
    #[error("레코드를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 직렬화 오류
    #[error("직렬화 오류: {0}")]
    Serialization(String),
}

impl StoreError {
    /// 같은 입력으로 재시도하면 성공할 수 있는 오류인지 확인합니다.
    ///
    /// 병합은 키 기준으로 멱등이므로 재시도가 중복을 만들지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::LockTimeout { .. }
                | StoreError::Persist { .. }
                | StoreError::ShardUnreadable { .. }
        )
    }
}

impl From<RecordError> for StoreError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::UnsupportedInterval { value } => StoreError::UnsupportedInterval(value),
            other => StoreError::Malformed(other),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = StoreError::LockTimeout {
            shard: "binance/BTCUSDT/x.json".to_string(),
            waited_ms: 100,
        };
        assert!(timeout.is_retryable());

        let persist = StoreError::Persist {
            path: PathBuf::from("x.json"),
            source: std::io::Error::other("disk full"),
        };
        assert!(persist.is_retryable());

        assert!(!StoreError::UnsupportedInterval("7minute".to_string()).is_retryable());
        assert!(!StoreError::NotFound("x".to_string()).is_retryable());
    }

    #[test]
    fn test_unsupported_interval_is_not_malformed() {
        let err: StoreError = RecordError::UnsupportedInterval {
            value: "week".to_string(),
        }
        .into();
        assert!(matches!(err, StoreError::UnsupportedInterval(v) if v == "week"));

        let err: StoreError = RecordError::EmptySymbol.into();
        assert!(matches!(err, StoreError::Malformed(_)));
    }
}
