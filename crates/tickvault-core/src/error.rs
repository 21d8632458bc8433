//! 레코드 검증 에러 타입.
//!
//! 개별 레코드 단위의 문제(`MalformedRecord`)를 표현합니다. 이 에러는 배치를 중단시키지 않으며
//! 호출자는 해당 레코드만 건너뛰고 사유를 기록합니다.

use thiserror::Error;

/// 레코드 검증 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// 심볼이 비어 있음
    #[error("심볼이 비어 있습니다")]
    EmptySymbol,

    /// 허용되지 않는 심볼
    #[error("잘못된 심볼 '{value}': {reason}")]
    InvalidSymbol { value: String, reason: &'static str },

    /// 허용되지 않는 출처 태그
    #[error("잘못된 출처 태그 '{value}' (a-z, 0-9, _, - 만 허용)")]
    InvalidSource { value: String },

    /// 지원하지 않는 간격
    #[error("지원하지 않는 간격 '{value}'")]
    UnsupportedInterval { value: String },

    /// 필수 필드 누락
    #[error("필수 필드 누락: {field}")]
    MissingField { field: &'static str },

    /// 타임스탬프 파싱 실패
    #[error("타임스탬프 파싱 실패 '{value}'")]
    InvalidTimestamp { value: String },

    /// 날짜 파싱 실패
    #[error("날짜 파싱 실패 '{value}'")]
    InvalidDate { value: String },

    /// 숫자 필드 오류
    #[error("필드 '{field}' 값 오류: {reason}")]
    InvalidNumber { field: &'static str, reason: String },

    /// 레코드 구조 해석 실패
    #[error("레코드 해석 실패: {reason}")]
    Undecodable { reason: String },

    /// 고가 < 저가
    #[error("고가가 저가보다 낮습니다")]
    InvalidPriceRange,

    /// 음수 거래량
    #[error("거래량은 음수일 수 없습니다")]
    NegativeVolume,

    /// 레코드가 대상 샤드와 맞지 않음
    #[error("샤드 불일치 ({field}): 기대값 {expected}, 실제값 {actual}")]
    ShardMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },
}

/// 레코드 검증 Result 타입.
pub type RecordResult<T> = Result<T, RecordError>;
