//! 뉴스 레코드와 감성 라벨.
//!
//! 뉴스 샤드는 `(published_date, title)` 복합 키로 중복을 판별합니다.
//! 같은 날 같은 제목은 같은 기사로 간주합니다.

use crate::error::RecordError;
use crate::types::Symbol;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 감성 분류 라벨.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// 분류기 응답 텍스트에서 라벨을 추출합니다.
    ///
    /// 응답에 `positive`가 있으면 긍정, 없고 `negative`가 있으면 부정, 그 외는 중립입니다.
    pub fn from_classifier_output(text: &str) -> Self {
        let lowered = text.to_ascii_lowercase();
        if lowered.contains("positive") {
            Self::Positive
        } else if lowered.contains("negative") {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            _ => Err(RecordError::InvalidNumber {
                field: "sentiment",
                reason: format!("알 수 없는 라벨 '{}'", s),
            }),
        }
    }
}

/// 뉴스 레코드의 기본 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewsKey {
    pub published_date: NaiveDate,
    pub title: String,
}

impl NewsKey {
    pub fn new(published_date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            published_date,
            title: title.into().trim().to_string(),
        }
    }
}

/// 뉴스 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    /// 관련 자산
    #[serde(alias = "symbol")]
    pub asset: Symbol,
    /// 제목 (같은 날짜 안에서 자연 키)
    pub title: String,
    /// 원문 링크
    #[serde(default)]
    pub link: String,
    /// 언론사
    #[serde(default)]
    pub source: String,
    /// 요약
    #[serde(default)]
    pub summary: String,
    /// 게시일
    #[serde(deserialize_with = "deserialize_published_date")]
    pub published_date: NaiveDate,
    /// 게시 시각 (`HH:MM`)
    #[serde(default, with = "published_time_format")]
    pub published_time: Option<NaiveTime>,
    /// 추출된 본문
    #[serde(default)]
    pub full_text: String,
    /// 감성 라벨
    #[serde(default)]
    pub sentiment: Sentiment,
    /// 감성 분류 완료 여부
    #[serde(default)]
    pub processed: bool,
}

impl NewsRecord {
    /// 미처리 상태의 새 뉴스 레코드를 생성합니다.
    pub fn new(asset: Symbol, published_date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            asset,
            title: title.into(),
            link: String::new(),
            source: String::new(),
            summary: String::new(),
            published_date,
            published_time: None,
            full_text: String::new(),
            sentiment: Sentiment::Neutral,
            processed: false,
        }
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.published_time = Some(time);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = full_text.into();
        self
    }

    /// 감성 라벨을 지정하고 처리 완료로 표시합니다.
    pub fn classified(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self.processed = true;
        self
    }

    pub fn key(&self) -> NewsKey {
        NewsKey::new(self.published_date, self.title.as_str())
    }

    /// 제목 공백을 정리하고 빈 제목을 거부합니다.
    pub fn normalized(mut self) -> Result<Self, RecordError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(RecordError::MissingField { field: "title" });
        }
        if title.len() != self.title.len() {
            self.title = title.to_string();
        }
        Ok(self)
    }
}

/// `YYYY-MM-DD` 또는 `YYYY-MM-DDT...` 형식의 게시일을 파싱합니다.
pub fn parse_published_date(raw: &str) -> Result<NaiveDate, RecordError> {
    let value = raw.trim();
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| RecordError::InvalidDate {
        value: value.to_string(),
    })
}

/// RSS `pubDate` (`Fri, 09 May 2025 07:00:00 GMT`)를 UTC 기준 (날짜, 시각)으로 변환합니다.
pub fn parse_rss_pub_date(raw: &str) -> Result<(NaiveDate, NaiveTime), RecordError> {
    let parsed = DateTime::parse_from_rfc2822(raw.trim()).map_err(|_| RecordError::InvalidTimestamp {
        value: raw.trim().to_string(),
    })?;
    let utc = parsed.naive_utc();
    let time = NaiveTime::from_hms_opt(
        chrono::Timelike::hour(&utc),
        chrono::Timelike::minute(&utc),
        0,
    )
    .unwrap_or(NaiveTime::MIN);
    Ok((utc.date(), time))
}

fn deserialize_published_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_published_date(&raw).map_err(serde::de::Error::custom)
}

/// `published_time` 직렬화: `HH:MM` 또는 null.
mod published_time_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => NaiveTime::parse_from_str(value, FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 9).unwrap()
    }

    #[test]
    fn test_classifier_output_order() {
        assert_eq!(Sentiment::from_classifier_output("Positive."), Sentiment::Positive);
        assert_eq!(Sentiment::from_classifier_output("NEGATIVE"), Sentiment::Negative);
        assert_eq!(Sentiment::from_classifier_output("hard to say"), Sentiment::Neutral);
        // 둘 다 포함되면 긍정이 우선
        assert_eq!(
            Sentiment::from_classifier_output("not negative, rather positive"),
            Sentiment::Positive
        );
    }

    #[test]
    fn test_reference_shape_roundtrips() {
        let raw = r#"{
            "symbol": "DOGE",
            "title": "Dogecoin rallies",
            "link": "https://example.com/a",
            "source": "Example",
            "summary": "short...",
            "published_date": "2025-05-09",
            "published_time": "07:00",
            "full_text": "body",
            "sentiment": "positive"
        }"#;
        let record: NewsRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.asset.as_str(), "DOGE");
        assert_eq!(record.published_date, day());
        assert_eq!(record.published_time, NaiveTime::from_hms_opt(7, 0, 0));
        assert!(!record.processed);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["asset"], "DOGE");
        assert_eq!(json["published_date"], "2025-05-09");
        assert_eq!(json["published_time"], "07:00");
        assert_eq!(json["sentiment"], "positive");
    }

    #[test]
    fn test_published_date_tolerates_time_suffix() {
        assert_eq!(parse_published_date("2025-05-09T07:00:00Z").unwrap(), day());
        assert!(parse_published_date("May 9").is_err());
    }

    #[test]
    fn test_parse_rss_pub_date() {
        let (date, time) = parse_rss_pub_date("Fri, 09 May 2025 07:00:00 GMT").unwrap();
        assert_eq!(date, day());
        assert_eq!(time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert!(parse_rss_pub_date("yesterday").is_err());
    }

    #[test]
    fn test_normalized_trims_and_rejects_empty_title() {
        let asset = Symbol::parse("DOGE").unwrap();
        let record = NewsRecord::new(asset.clone(), day(), "  Title  ").normalized().unwrap();
        assert_eq!(record.title, "Title");
        assert!(NewsRecord::new(asset, day(), "   ").normalized().is_err());
    }

    #[test]
    fn test_key_ignores_surrounding_whitespace() {
        assert_eq!(NewsKey::new(day(), " a "), NewsKey::new(day(), "a"));
    }
}
