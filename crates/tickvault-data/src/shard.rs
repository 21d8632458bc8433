//! 샤드 키 결정과 배치 그룹화.
//!
//! 샤드 하나는 (출처, 엔티티, UTC 날짜, 간격 또는 뉴스) 조합에 대응하는 파일 하나입니다.
//!
//! ```text
//! {root}/{source}/{ENTITY}/{ENTITY}_{YYYY-MM-DD}_day_{interval}.json
//! {root}/{source}/{ENTITY}/{ENTITY}_{YYYY-MM-DD}_news.json
//! ```
//!
//! 출처별 하위 디렉토리는 서로 다른 출처의 같은 키가 섞이지 않도록 하는 키의 일부입니다.

use crate::merge::ShardRecord;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tickvault_core::{Interval, NewsRecord, RecordError, SourceTag, Symbol, TimeSeriesRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 샤드에 담기는 레코드 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShardKind {
    /// 시계열 (간격별)
    Candles(Interval),
    /// 뉴스
    News,
}

impl ShardKind {
    /// 담기는 레코드 종류 이름.
    pub fn name(&self) -> &'static str {
        match self {
            ShardKind::Candles(_) => "candle",
            ShardKind::News => "news",
        }
    }
}

/// 샤드 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey {
    pub source: SourceTag,
    pub entity: Symbol,
    pub day: NaiveDate,
    pub kind: ShardKind,
}

impl ShardKey {
    pub fn candles(source: SourceTag, entity: Symbol, day: NaiveDate, interval: Interval) -> Self {
        Self {
            source,
            entity,
            day,
            kind: ShardKind::Candles(interval),
        }
    }

    pub fn news(source: SourceTag, entity: Symbol, day: NaiveDate) -> Self {
        Self {
            source,
            entity,
            day,
            kind: ShardKind::News,
        }
    }

    /// 시계열 샤드의 간격. 뉴스 샤드면 `None`.
    pub fn interval(&self) -> Option<Interval> {
        match self.kind {
            ShardKind::Candles(interval) => Some(interval),
            ShardKind::News => None,
        }
    }

    pub fn file_name(&self) -> String {
        let day = self.day.format(DATE_FORMAT);
        match self.kind {
            ShardKind::Candles(interval) => format!("{}_{}_day_{}.json", self.entity, day, interval.tag()),
            ShardKind::News => format!("{}_{}_news.json", self.entity, day),
        }
    }

    /// 데이터 루트 기준 상대 경로.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.source.as_str())
            .join(self.entity.as_str())
            .join(self.file_name())
    }

    /// 디렉토리 항목 이름에서 샤드 키를 복원합니다. 샤드 파일이 아니면 `None`.
    pub fn from_file_name(source: &SourceTag, entity: &Symbol, file_name: &str) -> Option<Self> {
        let rest = file_name
            .strip_prefix(entity.as_str())?
            .strip_prefix('_')?
            .strip_suffix(".json")?;
        let day = NaiveDate::parse_from_str(rest.get(..10)?, DATE_FORMAT).ok()?;
        let tail = rest.get(10..)?;

        let kind = if tail == "_news" {
            ShardKind::News
        } else {
            ShardKind::Candles(Interval::from_tag(tail.strip_prefix("_day_")?)?)
        };
        // 별칭으로 된 파일명은 정규 파일명과 다르므로 샤드로 보지 않음
        let key = Self {
            source: source.clone(),
            entity: entity.clone(),
            day,
            kind,
        };
        (key.file_name() == file_name).then_some(key)
    }

    /// 시계열 레코드가 이 샤드에 속하는지 검증합니다.
    pub fn check_candle(&self, record: &TimeSeriesRecord) -> Result<(), RecordError> {
        let Some(interval) = self.interval() else {
            return Err(RecordError::ShardMismatch {
                field: "kind",
                expected: "news".to_string(),
                actual: "candle".to_string(),
            });
        };
        if record.interval != interval {
            return Err(mismatch("interval", interval, record.interval));
        }
        if record.symbol != self.entity {
            return Err(mismatch("symbol", &self.entity, &record.symbol));
        }
        if record.day() != self.day {
            return Err(mismatch("day", self.day, record.day()));
        }
        Ok(())
    }

    /// 뉴스 레코드가 이 샤드에 속하는지 검증합니다.
    pub fn check_news(&self, record: &NewsRecord) -> Result<(), RecordError> {
        if self.kind != ShardKind::News {
            return Err(RecordError::ShardMismatch {
                field: "kind",
                expected: "candle".to_string(),
                actual: "news".to_string(),
            });
        }
        if record.asset != self.entity {
            return Err(mismatch("asset", &self.entity, &record.asset));
        }
        if record.published_date != self.day {
            return Err(mismatch("published_date", self.day, record.published_date));
        }
        Ok(())
    }
}

fn mismatch(field: &'static str, expected: impl fmt::Display, actual: impl fmt::Display) -> RecordError {
    RecordError::ShardMismatch {
        field,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.entity, self.file_name())
    }
}

/// 그룹화 또는 디코딩 단계에서 거부된 레코드.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// 입력 배치 내 위치
    pub position: usize,
    pub reason: RecordError,
}

/// 샤드별로 묶인 배치.
#[derive(Debug)]
pub struct Grouped<T> {
    pub shards: BTreeMap<ShardKey, Vec<T>>,
    pub rejected: Vec<Rejected>,
}

impl<T> Default for Grouped<T> {
    fn default() -> Self {
        Self {
            shards: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Grouped<T> {
    pub fn accepted(&self) -> usize {
        self.shards.values().map(Vec::len).sum()
    }
}

/// 시계열 배치를 정규화하고 샤드별로 묶습니다.
///
/// 레코드의 간격이 `interval`과 다르거나 값 검증에 실패하면 거부 목록으로 보내고 나머지는 계속 처리합니다.
pub fn group_candles(
    source: &SourceTag,
    interval: Interval,
    records: Vec<TimeSeriesRecord>,
) -> Grouped<TimeSeriesRecord> {
    let mut grouped = Grouped::default();
    for (position, record) in records.into_iter().enumerate() {
        let resolved = record.normalized().and_then(|record| {
            if record.interval != interval {
                return Err(mismatch("interval", interval, record.interval));
            }
            let key = ShardKey::candles(source.clone(), record.symbol.clone(), record.day(), interval);
            Ok((key, record))
        });
        match resolved {
            Ok((key, record)) => grouped.shards.entry(key).or_default().push(record),
            Err(reason) => grouped.rejected.push(Rejected { position, reason }),
        }
    }
    grouped
}

/// 뉴스 배치를 정규화하고 샤드별로 묶습니다.
pub fn group_news(source: &SourceTag, records: Vec<NewsRecord>) -> Grouped<NewsRecord> {
    let mut grouped = Grouped::default();
    for (position, record) in records.into_iter().enumerate() {
        match record.normalized() {
            Ok(record) => {
                let key = ShardKey::news(source.clone(), record.asset.clone(), record.published_date);
                grouped.shards.entry(key).or_default().push(record);
            }
            Err(reason) => grouped.rejected.push(Rejected { position, reason }),
        }
    }
    grouped
}

/// 생산자가 보낸 JSON 객체 배열을 레코드로 디코딩합니다.
///
/// 필수 필드가 없거나 타임스탬프를 해석할 수 없는 항목은 거부 목록으로 보냅니다.
pub fn decode_records<T: ShardRecord>(values: Vec<Value>) -> (Vec<T>, Vec<Rejected>) {
    let mut records = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (position, value) in values.into_iter().enumerate() {
        match decode_one::<T>(value) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.push(Rejected { position, reason }),
        }
    }
    (records, rejected)
}

fn decode_one<T: ShardRecord>(value: Value) -> Result<T, RecordError> {
    let Value::Object(raw) = value else {
        return Err(RecordError::Undecodable {
            reason: format!("{} 레코드는 JSON 객체여야 합니다", T::KIND),
        });
    };
    T::check_raw(&raw)?;
    serde_json::from_value(Value::Object(raw)).map_err(|e| RecordError::Undecodable { reason: e.to_string() })
}
