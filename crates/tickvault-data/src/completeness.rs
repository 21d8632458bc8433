//! 일별 시계열 완전성 점검.
//!
//! 하루를 간격 단위 버킷으로 나눈 격자와 저장된 `begins_at`을 비교합니다. 비교는 문자열
//! 라벨이 아니라 정렬된 UTC 시각으로 하며, 격자에 맞지 않는 시각은 어떤 버킷도 채우지 않고
//! `off_grid`로 따로 보고합니다.

use crate::error::{Result, StoreError};
use crate::shard::ShardKey;
use crate::storage::ShardRead;
use crate::store::RecordStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use tickvault_core::{Interval, SourceTag, Symbol, TimeSeriesRecord};
use tracing::{info, instrument, warn};

/// 진단 로그에 나열할 누락 버킷 수.
const MISSING_PREVIEW: usize = 5;

/// 하루치 샤드의 완전성 보고서.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    pub day: NaiveDate,
    pub interval: Interval,
    /// 기대 버킷 수
    pub expected: usize,
    /// 채워진 버킷 수
    pub present: usize,
    /// 누락 버킷 (오름차순)
    pub missing: Vec<DateTime<Utc>>,
    /// 격자에 맞지 않는 시각 (오름차순)
    pub off_grid: Vec<DateTime<Utc>>,
    /// 다른 날짜의 시각 (오름차순)
    pub out_of_day: Vec<DateTime<Utc>>,
    /// 같은 버킷에 두 번 이상 나타난 추가 레코드 수
    pub duplicates: usize,
    /// 샤드 파일이 없었는지 여부
    pub absent: bool,
    /// 샤드 파일이 손상되었는지 여부
    pub corrupt: bool,
}

impl CompletenessReport {
    /// 레코드 목록에서 보고서를 계산합니다.
    pub fn from_records(day: NaiveDate, interval: Interval, records: &[TimeSeriesRecord]) -> Self {
        let grid = interval.day_grid(day);
        let mut seen: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
        let mut off_grid = Vec::new();
        let mut out_of_day = Vec::new();

        for record in records {
            let ts = record.begins_at;
            if ts.date_naive() != day {
                out_of_day.push(ts);
            } else if !interval.is_aligned(ts) {
                off_grid.push(ts);
            } else {
                *seen.entry(ts).or_default() += 1;
            }
        }
        off_grid.sort();
        out_of_day.sort();

        let missing: Vec<_> = grid.iter().filter(|ts| !seen.contains_key(ts)).copied().collect();
        let duplicates = seen.values().map(|count| count - 1).sum();

        Self {
            day,
            interval,
            expected: grid.len(),
            present: seen.len(),
            missing,
            off_grid,
            out_of_day,
            duplicates,
            absent: false,
            corrupt: false,
        }
    }

    fn unavailable(day: NaiveDate, interval: Interval, absent: bool, corrupt: bool) -> Self {
        let grid = interval.day_grid(day);
        Self {
            day,
            interval,
            expected: grid.len(),
            present: 0,
            missing: grid,
            off_grid: Vec::new(),
            out_of_day: Vec::new(),
            duplicates: 0,
            absent,
            corrupt,
        }
    }

    /// 모든 버킷이 채워졌는지 여부. 없거나 비었거나 손상된 샤드는 항상 불완전합니다.
    pub fn is_complete(&self) -> bool {
        !self.absent && !self.corrupt && self.present > 0 && self.missing.is_empty()
    }

    /// 보고서를 로그로 남깁니다.
    pub fn log_summary(&self, shard: &ShardKey) {
        if self.is_complete() {
            info!(shard = %shard, expected = self.expected, "모든 버킷 수집 완료");
            return;
        }
        let preview: Vec<String> = self
            .missing
            .iter()
            .take(MISSING_PREVIEW)
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .collect();
        warn!(
            shard = %shard,
            expected = self.expected,
            present = self.present,
            missing = self.missing.len(),
            off_grid = self.off_grid.len(),
            out_of_day = self.out_of_day.len(),
            absent = self.absent,
            corrupt = self.corrupt,
            first_missing = ?preview,
            "데이터 누락 감지"
        );
    }
}

/// 저장된 샤드를 대상으로 완전성을 점검합니다.
#[derive(Debug, Clone)]
pub struct CompletenessAuditor {
    store: RecordStore,
}

impl CompletenessAuditor {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// 하루치 샤드를 점검합니다.
    #[instrument(skip_all, fields(source = %source, entity = %entity, day = %day, interval = %interval))]
    pub async fn audit(
        &self,
        source: &SourceTag,
        entity: &Symbol,
        day: NaiveDate,
        interval: Interval,
    ) -> Result<CompletenessReport> {
        let key = ShardKey::candles(source.clone(), entity.clone(), day, interval);
        let report = match self.store.read_shard::<TimeSeriesRecord>(&key).await? {
            ShardRead::Absent => CompletenessReport::unavailable(day, interval, true, false),
            ShardRead::Loaded(records) => CompletenessReport::from_records(day, interval, &records),
            ShardRead::Corrupt { reason } => {
                warn!(shard = %key, reason = %reason, "손상된 샤드는 불완전으로 보고");
                CompletenessReport::unavailable(day, interval, false, true)
            }
        };
        report.log_summary(&key);
        Ok(report)
    }

    /// 간격 태그 문자열로 점검합니다. 지원하지 않는 태그는 `UnsupportedInterval` 오류입니다.
    pub async fn audit_tagged(
        &self,
        source: &SourceTag,
        entity: &Symbol,
        day: NaiveDate,
        interval: &str,
    ) -> Result<CompletenessReport> {
        let interval = Interval::from_str(interval).map_err(StoreError::from)?;
        self.audit(source, entity, day, interval).await
    }

    pub async fn is_complete(
        &self,
        source: &SourceTag,
        entity: &Symbol,
        day: NaiveDate,
        interval: Interval,
    ) -> Result<bool> {
        Ok(self.audit(source, entity, day, interval).await?.is_complete())
    }

    /// `first`부터 `last`까지(포함) 날짜별로 점검합니다. `first > last`면 빈 목록입니다.
    pub async fn audit_range(
        &self,
        source: &SourceTag,
        entity: &Symbol,
        first: NaiveDate,
        last: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<CompletenessReport>> {
        let mut reports = Vec::new();
        for day in first.iter_days().take_while(|day| *day <= last) {
            reports.push(self.audit(source, entity, day, interval).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()
    }

    fn record(ts: DateTime<Utc>) -> TimeSeriesRecord {
        TimeSeriesRecord::new(
            Symbol::parse("BTCUSD").unwrap(),
            Interval::TenMinutes,
            ts,
            dec!(1),
            dec!(1),
            dec!(1),
            dec!(1),
            dec!(0),
        )
    }

    fn full_day() -> Vec<TimeSeriesRecord> {
        Interval::TenMinutes.day_grid(day()).into_iter().map(record).collect()
    }

    #[test]
    fn test_full_day_is_complete() {
        let report = CompletenessReport::from_records(day(), Interval::TenMinutes, &full_day());
        assert_eq!(report.expected, 144);
        assert_eq!(report.present, 144);
        assert!(report.is_complete());
    }

    #[test]
    fn test_off_grid_record_does_not_fill_bucket() {
        let mut records = full_day();
        // 00:10 버킷을 00:13으로 바꿈
        records[1].begins_at += Duration::minutes(3);

        let report = CompletenessReport::from_records(day(), Interval::TenMinutes, &records);
        assert!(!report.is_complete());
        assert_eq!(report.missing, vec![Utc.with_ymd_and_hms(2025, 5, 31, 0, 10, 0).unwrap()]);
        assert_eq!(report.off_grid, vec![Utc.with_ymd_and_hms(2025, 5, 31, 0, 13, 0).unwrap()]);
    }

    #[test]
    fn test_duplicates_and_foreign_days_are_reported() {
        let mut records = full_day();
        records.push(record(Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap()));
        records.push(record(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()));

        let report = CompletenessReport::from_records(day(), Interval::TenMinutes, &records);
        assert!(report.is_complete());
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.out_of_day.len(), 1);
    }

    #[test]
    fn test_empty_record_list_is_incomplete() {
        let report = CompletenessReport::from_records(day(), Interval::Day, &[]);
        assert_eq!(report.expected, 1);
        assert!(!report.is_complete());
    }
}
