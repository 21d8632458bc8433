//! 시계열(OHLCV) 레코드.
//!
//! 샤드 파일의 JSON 형식을 그대로 따릅니다:
//! `{begins_at, open_price, high_price, low_price, close_price, volume, symbol, interval, ...}`
//!
//! 생산자마다 가격을 숫자 또는 문자열로 보내므로 `Decimal`은 두 형식을 모두 받아들이고
//! 문자열로 기록합니다. 알 수 없는 추가 필드는 `extra`에 보존되어 재기록 시 손실되지 않습니다.

use crate::error::RecordError;
use crate::types::{Interval, Symbol};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 시계열 레코드의 기본 키: (심볼, 간격, 버킷 시각).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandleKey {
    pub symbol: Symbol,
    pub interval: Interval,
    pub begins_at: DateTime<Utc>,
}

/// OHLCV 시계열 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// 버킷 시작 시각 (UTC)
    #[serde(with = "begins_at_format")]
    pub begins_at: DateTime<Utc>,
    /// 시가
    pub open_price: Decimal,
    /// 고가
    pub high_price: Decimal,
    /// 저가
    pub low_price: Decimal,
    /// 종가
    pub close_price: Decimal,
    /// 거래량 (기준 자산 단위)
    pub volume: Decimal,
    /// 엔티티 심볼
    pub symbol: Symbol,
    /// 샘플링 간격
    pub interval: Interval,
    /// 거래대금 (호가 자산 단위)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_volume: Option<Decimal>,
    /// 체결 건수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_trades: Option<u64>,
    /// 생산자가 보낸 기타 필드
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimeSeriesRecord {
    /// 새 레코드를 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        begins_at: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            begins_at,
            open_price: open,
            high_price: high,
            low_price: low,
            close_price: close,
            volume,
            symbol,
            interval,
            quote_volume: None,
            num_trades: None,
            extra: Map::new(),
        }
    }

    /// 거래대금을 설정합니다.
    pub fn with_quote_volume(mut self, quote_volume: Decimal) -> Self {
        self.quote_volume = Some(quote_volume);
        self
    }

    /// 체결 건수를 설정합니다.
    pub fn with_num_trades(mut self, num_trades: u64) -> Self {
        self.num_trades = Some(num_trades);
        self
    }

    /// 기본 키.
    pub fn key(&self) -> CandleKey {
        CandleKey {
            symbol: self.symbol.clone(),
            interval: self.interval,
            begins_at: self.begins_at,
        }
    }

    /// 레코드가 속한 UTC 달력 날짜.
    pub fn day(&self) -> NaiveDate {
        self.begins_at.date_naive()
    }

    /// 버킷 시각을 분 경계로 절사하고 값 범위를 검증합니다.
    pub fn normalized(mut self) -> Result<Self, RecordError> {
        self.begins_at = truncate_to_minute(self.begins_at);

        if self.high_price < self.low_price {
            return Err(RecordError::InvalidPriceRange);
        }
        if self.volume.is_sign_negative() && !self.volume.is_zero() {
            return Err(RecordError::NegativeVolume);
        }
        if let Some(qv) = self.quote_volume {
            if qv.is_sign_negative() && !qv.is_zero() {
                return Err(RecordError::InvalidNumber {
                    field: "quote_volume",
                    reason: "음수".to_string(),
                });
            }
        }
        Ok(self)
    }
}

/// 초 이하 단위를 버리고 분 경계로 절사합니다.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(ts)
}

/// 생산자가 보낸 타임스탬프 문자열을 UTC 시각으로 파싱합니다.
///
/// RFC 3339(`Z` 또는 오프셋 포함)를 우선 시도하고, 오프셋이 없는 형식은 UTC로 간주합니다.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    let value = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(RecordError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// `begins_at` 직렬화: `YYYY-MM-DDTHH:MM:SSZ`.
pub mod begins_at_format {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> TimeSeriesRecord {
        TimeSeriesRecord::new(
            Symbol::parse("BTCUSD").unwrap(),
            Interval::FiveMinutes,
            Utc.with_ymd_and_hms(2025, 5, 31, 0, 5, 0).unwrap(),
            dec!(100),
            dec!(102),
            dec!(99),
            dec!(101),
            dec!(12.5),
        )
    }

    #[test]
    fn test_serializes_reference_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["begins_at"], "2025-05-31T00:05:00Z");
        assert_eq!(json["open_price"], "100");
        assert_eq!(json["symbol"], "BTCUSD");
        assert_eq!(json["interval"], "5minute");
        assert!(json.get("quote_volume").is_none());
    }

    #[test]
    fn test_accepts_numeric_and_string_prices_and_keeps_extras() {
        let raw = r#"{
            "begins_at": "2025-05-31T00:05:00Z",
            "open_price": "100.5",
            "high_price": 102,
            "low_price": 99.25,
            "close_price": "101",
            "volume": "0.000000",
            "symbol": "btcusd",
            "interval": "5minute",
            "session": "reg",
            "interpolated": false
        }"#;
        let record: TimeSeriesRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.open_price, dec!(100.5));
        assert_eq!(record.high_price, dec!(102));
        assert_eq!(record.symbol.as_str(), "BTCUSD");
        assert_eq!(record.extra["session"], "reg");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["interpolated"], false);
    }

    #[test]
    fn test_normalized_truncates_to_minute() {
        let mut record = sample();
        record.begins_at = Utc.with_ymd_and_hms(2025, 5, 31, 0, 5, 42).unwrap();
        let record = record.normalized().unwrap();
        assert_eq!(record.begins_at, Utc.with_ymd_and_hms(2025, 5, 31, 0, 5, 0).unwrap());
    }

    #[test]
    fn test_normalized_rejects_inverted_range() {
        let mut record = sample();
        record.high_price = dec!(90);
        assert_eq!(record.normalized().unwrap_err(), RecordError::InvalidPriceRange);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-05-31T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-05-31T14:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-05-31T12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-05-31 12:00").unwrap(), expected);
        assert!(parse_timestamp("31/05/2025").is_err());
    }
}
