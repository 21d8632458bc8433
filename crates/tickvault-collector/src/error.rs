//! 에러 타입 정의.

use std::path::PathBuf;
use thiserror::Error;
use tickvault_core::RecordError;
use tickvault_data::StoreError;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    /// 인자 검증 에러 (심볼, 간격, 날짜 등)
    #[error("잘못된 인자: {0}")]
    Record(#[from] RecordError),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 입력 파일 I/O 에러
    #[error("입력 파일 에러 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 입력 파일 형식 에러
    #[error("입력 형식 에러 ({path}): {reason}")]
    Input { path: PathBuf, reason: String },
}

impl CollectorError {
    pub fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
