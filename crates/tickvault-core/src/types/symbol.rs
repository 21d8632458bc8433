//! 엔티티 심볼 및 데이터 출처 태그 정의.
//!
//! 두 값 모두 샤드 경로의 한 구성 요소가 되므로 경로 구분자나 `..`를 허용하지 않습니다.
//! - `Symbol` - 대문자로 정규화된 엔티티 심볼 (예: BTCUSD, DOGE)
//! - `SourceTag` - 소문자 데이터 출처 태그 (예: robinhood, binance, google_news)

use crate::error::RecordError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 심볼 최대 길이.
pub const MAX_SYMBOL_LEN: usize = 32;

/// 대문자로 정규화된 엔티티 심볼.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// 심볼을 정규화하고 검증합니다.
    ///
    /// 앞뒤 공백을 제거하고 대문자로 변환합니다. 허용 문자는 `A-Z 0-9 . _ -`입니다.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(RecordError::EmptySymbol);
        }
        if normalized.len() > MAX_SYMBOL_LEN {
            return Err(RecordError::InvalidSymbol {
                value: normalized,
                reason: "too long",
            });
        }
        if normalized.chars().all(|c| c == '.') {
            return Err(RecordError::InvalidSymbol {
                value: normalized,
                reason: "dots only",
            });
        }
        if let Some(ch) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(RecordError::InvalidSymbol {
                value: normalized.clone(),
                reason: if ch == '/' || ch == '\\' {
                    "path separator"
                } else {
                    "invalid character"
                },
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 레코드를 생산한 외부 출처 태그.
///
/// 출처별 하위 디렉토리로 분리되어 서로 다른 출처의 키가 충돌하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceTag(String);

impl SourceTag {
    /// 출처 태그를 정규화하고 검증합니다. 허용 문자는 `a-z 0-9 _ -`입니다.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RecordError::InvalidSource { value: normalized });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceTag {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
