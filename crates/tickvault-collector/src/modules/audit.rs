//! 완전성 점검 명령.

use crate::error::Result;
use chrono::NaiveDate;
use tickvault_core::{Interval, SourceTag, Symbol};
use tickvault_data::{CompletenessAuditor, CompletenessReport};
use tracing::info;

/// 기간 점검 요약.
#[derive(Debug, Clone)]
pub struct AuditSummary {
    pub reports: Vec<CompletenessReport>,
}

impl AuditSummary {
    pub fn days(&self) -> usize {
        self.reports.len()
    }

    /// 불완전한 날짜 목록.
    pub fn incomplete_days(&self) -> Vec<NaiveDate> {
        self.reports
            .iter()
            .filter(|r| !r.is_complete())
            .map(|r| r.day)
            .collect()
    }

    /// 전체 누락 버킷 수.
    pub fn missing_buckets(&self) -> usize {
        self.reports.iter().map(|r| r.missing.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.reports.iter().all(CompletenessReport::is_complete)
    }
}

/// `first`부터 `last`까지 날짜별 완전성을 점검합니다.
pub async fn audit_days(
    auditor: &CompletenessAuditor,
    source: &SourceTag,
    entity: &Symbol,
    interval: Interval,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<AuditSummary> {
    let reports = auditor
        .audit_range(source, entity, first, last, interval)
        .await?;
    let summary = AuditSummary { reports };

    info!(
        source = %source,
        entity = %entity,
        interval = %interval,
        days = summary.days(),
        incomplete = summary.incomplete_days().len(),
        missing = summary.missing_buckets(),
        "완전성 점검 완료"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tickvault_core::TimeSeriesRecord;
    use tickvault_data::RecordStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_audit_days_flags_incomplete_days() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path());
        let source = SourceTag::parse("binance").unwrap();
        let symbol = Symbol::parse("ETHUSDT").unwrap();

        // 30일은 전부, 31일은 첫 버킷만
        let mut records: Vec<_> = Interval::Hour
            .day_grid(day(30))
            .into_iter()
            .map(|ts| {
                TimeSeriesRecord::new(symbol.clone(), Interval::Hour, ts, dec!(1), dec!(1), dec!(1), dec!(1), dec!(0))
            })
            .collect();
        let first_of_31 = Interval::Hour.day_grid(day(31))[0];
        records.push(TimeSeriesRecord::new(
            symbol.clone(),
            Interval::Hour,
            first_of_31,
            dec!(1),
            dec!(1),
            dec!(1),
            dec!(1),
            dec!(0),
        ));
        assert!(store.ingest_candles(&source, Interval::Hour, records).await.is_success());

        let auditor = CompletenessAuditor::new(store);
        let summary = audit_days(&auditor, &source, &symbol, Interval::Hour, day(29), day(31))
            .await
            .unwrap();

        assert_eq!(summary.days(), 3);
        assert_eq!(summary.incomplete_days(), vec![day(29), day(31)]);
        assert_eq!(summary.missing_buckets(), 24 + 23);
        assert!(!summary.is_complete());
    }
}
