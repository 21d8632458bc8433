//! 샘플링 간격 정의.
//!
//! 샤드 파일명(`..._day_{tag}.json`)과 레코드의 `interval` 필드에 같은 태그를 사용합니다.
//! 모든 간격은 하루(86400초)를 나누어 떨어지므로 일별 버킷 격자가 항상 정의됩니다.

use crate::error::RecordError;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 하루의 초 수.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// 캔들 샘플링 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    /// 1분
    OneMinute,
    /// 5분
    FiveMinutes,
    /// 10분
    TenMinutes,
    /// 15분
    FifteenMinutes,
    /// 30분
    ThirtyMinutes,
    /// 1시간
    Hour,
    /// 1일
    Day,
}

impl Interval {
    pub const ALL: [Self; 7] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::TenMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::Hour,
        Self::Day,
    ];

    /// 간격의 초 단위 값을 반환합니다.
    pub const fn as_secs(self) -> u32 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 5 * 60,
            Self::TenMinutes => 10 * 60,
            Self::FifteenMinutes => 15 * 60,
            Self::ThirtyMinutes => 30 * 60,
            Self::Hour => 60 * 60,
            Self::Day => SECONDS_PER_DAY,
        }
    }

    /// 간격을 `chrono::Duration`으로 반환합니다.
    pub fn duration(self) -> Duration {
        Duration::seconds(i64::from(self.as_secs()))
    }

    /// 샤드 파일명과 JSON에 쓰이는 표준 태그.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::OneMinute => "minute",
            Self::FiveMinutes => "5minute",
            Self::TenMinutes => "10minute",
            Self::FifteenMinutes => "15minute",
            Self::ThirtyMinutes => "30minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// 하루에 기대되는 버킷 수.
    pub const fn buckets_per_day(self) -> u32 {
        SECONDS_PER_DAY / self.as_secs()
    }

    /// 주어진 날짜의 기대 버킷 시각을 오름차순으로 생성합니다 (끝은 미포함).
    pub fn day_grid(self, day: NaiveDate) -> Vec<DateTime<Utc>> {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let step = self.duration();
        (0..self.buckets_per_day())
            .map(|i| start + step * i as i32)
            .collect()
    }

    /// 시각이 이 간격의 격자 위에 있는지 확인합니다.
    pub fn is_aligned(self, ts: DateTime<Utc>) -> bool {
        ts.nanosecond() == 0 && ts.num_seconds_from_midnight() % self.as_secs() == 0
    }

    /// 태그 또는 별칭에서 파싱합니다.
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minute" | "1minute" | "1m" => Some(Self::OneMinute),
            "5minute" | "5m" => Some(Self::FiveMinutes),
            "10minute" | "10m" => Some(Self::TenMinutes),
            "15minute" | "15m" => Some(Self::FifteenMinutes),
            "30minute" | "30m" => Some(Self::ThirtyMinutes),
            "hour" | "60minute" | "1h" => Some(Self::Hour),
            "day" | "1d" => Some(Self::Day),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Interval {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| RecordError::UnsupportedInterval {
            value: s.to_string(),
        })
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_seconds() {
        assert_eq!(Interval::FiveMinutes.as_secs(), 300);
        assert_eq!(Interval::TenMinutes.as_secs(), 600);
        assert_eq!(Interval::Day.as_secs(), 86_400);
    }

    #[test]
    fn test_every_interval_divides_a_day() {
        for interval in Interval::ALL {
            assert_eq!(SECONDS_PER_DAY % interval.as_secs(), 0, "{interval}");
        }
        assert_eq!(Interval::FiveMinutes.buckets_per_day(), 288);
        assert_eq!(Interval::TenMinutes.buckets_per_day(), 144);
    }

    #[test]
    fn test_parse_tags_and_aliases() {
        assert_eq!("5minute".parse::<Interval>().unwrap(), Interval::FiveMinutes);
        assert_eq!("5m".parse::<Interval>().unwrap(), Interval::FiveMinutes);
        assert_eq!(" HOUR ".parse::<Interval>().unwrap(), Interval::Hour);
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Day);
    }

    #[test]
    fn test_unknown_interval_is_rejected() {
        let err = "week".parse::<Interval>().unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedInterval { .. }));
    }

    #[test]
    fn test_day_grid() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 31).unwrap();
        let grid = Interval::FiveMinutes.day_grid(day);
        assert_eq!(grid.len(), 288);
        assert_eq!(grid[0], Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap());
        assert_eq!(grid[287], Utc.with_ymd_and_hms(2025, 5, 31, 23, 55, 0).unwrap());
    }

    #[test]
    fn test_alignment() {
        let on_grid = Utc.with_ymd_and_hms(2025, 5, 31, 10, 15, 0).unwrap();
        let off_grid = Utc.with_ymd_and_hms(2025, 5, 31, 10, 17, 0).unwrap();
        assert!(Interval::FiveMinutes.is_aligned(on_grid));
        assert!(!Interval::FiveMinutes.is_aligned(off_grid));
        assert!(!Interval::TenMinutes.is_aligned(on_grid));
    }

    #[test]
    fn test_serde_uses_tag() {
        let json = serde_json::to_string(&Interval::TenMinutes).unwrap();
        assert_eq!(json, "\"10minute\"");
        let back: Interval = serde_json::from_str("\"10m\"").unwrap();
        assert_eq!(back, Interval::TenMinutes);
    }
}
