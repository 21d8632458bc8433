//! 뉴스 캐시.
//!
//! 시계열 저장소와 같은 샤드 파일을 쓰지만, 같은 (날짜, 제목) 키가 있으면 건너뛰지 않고
//! 제자리에서 교체합니다. 먼저 미처리 상태로 저장한 뒤 감성 분류 결과로 갱신하는
//! 2단계 흐름을 지원합니다.

use crate::error::{Result, StoreError};
use crate::merge::ConflictPolicy;
use crate::shard::ShardKey;
use crate::store::{BatchReport, RecordStore};
use crate::storage::ShardRead;
use chrono::NaiveDate;
use tickvault_core::{NewsKey, NewsRecord, Sentiment, SourceTag, Symbol};
use tracing::{debug, info, instrument, warn};

/// 단건 upsert 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 새 키로 추가됨
    Inserted,
    /// 기존 레코드를 교체함
    Updated,
    /// 같은 내용이 이미 있음
    Unchanged,
}

/// 뉴스 캐시.
#[derive(Debug, Clone)]
pub struct NewsCache {
    store: RecordStore,
}

impl NewsCache {
    /// 저장소와 락 맵을 공유하는 뉴스 캐시를 생성합니다.
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// 레코드 하나를 upsert합니다.
    #[instrument(skip_all, fields(shard = %key))]
    pub async fn upsert(&self, key: &ShardKey, record: NewsRecord) -> Result<UpsertOutcome> {
        let outcome = self
            .store
            .merge_news(key, vec![record], ConflictPolicy::Replace)
            .await?;
        if outcome.rejected > 0 {
            return Err(StoreError::Malformed(tickvault_core::RecordError::ShardMismatch {
                field: "shard",
                expected: key.to_string(),
                actual: "다른 샤드의 레코드".to_string(),
            }));
        }
        Ok(if outcome.added > 0 {
            UpsertOutcome::Inserted
        } else if outcome.updated > 0 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        })
    }

    /// 여러 레코드를 샤드별로 묶어 upsert합니다.
    pub async fn upsert_batch(&self, source: &SourceTag, records: Vec<NewsRecord>) -> BatchReport {
        self.store
            .ingest_news_with(source, records, ConflictPolicy::Replace)
            .await
    }

    /// (날짜, 제목) 레코드가 이미 저장되어 있는지 확인합니다.
    ///
    /// 손상된 샤드는 없는 것으로 봅니다. 생산자는 이 결과로 비싼 보강 작업을 건너뜁니다.
    pub async fn contains(&self, key: &ShardKey, date: NaiveDate, title: &str) -> Result<bool> {
        let wanted = NewsKey::new(date, title);
        match self.store.read_shard::<NewsRecord>(key).await? {
            ShardRead::Loaded(records) => Ok(records.iter().any(|r| r.key() == wanted)),
            ShardRead::Absent => Ok(false),
            ShardRead::Corrupt { reason } => {
                debug!(shard = %key, reason = %reason, "손상된 뉴스 샤드, 없음으로 간주");
                Ok(false)
            }
        }
    }

    /// 자산의 모든 뉴스 샤드에서 감성 분류가 끝나지 않은 레코드를 모읍니다.
    ///
    /// (날짜, 시각, 제목) 순으로 정렬합니다. 손상된 샤드는 경고 후 건너뜁니다.
    pub async fn pending(&self, source: &SourceTag, asset: &Symbol) -> Result<Vec<NewsRecord>> {
        let mut pending = Vec::new();
        for key in self.store.list_shards(source, asset).await? {
            if key.interval().is_some() {
                continue;
            }
            match self.store.read_shard::<NewsRecord>(&key).await? {
                ShardRead::Loaded(records) => {
                    pending.extend(records.into_iter().filter(|r| !r.processed));
                }
                ShardRead::Absent => {}
                ShardRead::Corrupt { reason } => {
                    warn!(shard = %key, reason = %reason, "손상된 뉴스 샤드 건너뜀");
                }
            }
        }
        pending.sort_by(|a, b| {
            (a.published_date, a.published_time, &a.title).cmp(&(b.published_date, b.published_time, &b.title))
        });
        Ok(pending)
    }

    /// 레코드의 감성 라벨을 설정하고 처리 완료로 표시합니다.
    ///
    /// 레코드가 없으면 새로 만들지 않고 `NotFound`를 반환합니다.
    #[instrument(skip_all, fields(shard = %key, sentiment = %sentiment))]
    pub async fn classify(
        &self,
        key: &ShardKey,
        date: NaiveDate,
        title: &str,
        sentiment: Sentiment,
    ) -> Result<NewsRecord> {
        let wanted = NewsKey::new(date, title);
        let (updated, _) = self
            .store
            .modify_shard(key, |mut records: Vec<NewsRecord>| {
                let Some(record) = records.iter_mut().find(|r| r.key() == wanted) else {
                    return Err(StoreError::NotFound(format!("{} / {}", key, wanted.title)));
                };
                let changed = record.sentiment != sentiment || !record.processed;
                record.sentiment = sentiment;
                record.processed = true;
                let updated = record.clone();
                Ok((records, changed, updated))
            })
            .await
            .inspect_err(|e| {
                if matches!(e, StoreError::NotFound(_)) {
                    warn!(shard = %key, title = %title, "갱신할 뉴스 레코드 없음");
                }
            })?;

        info!(shard = %key, title = %updated.title, "감성 분류 반영");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn source() -> SourceTag {
        SourceTag::parse("google_news_rss").unwrap()
    }

    fn asset() -> Symbol {
        Symbol::parse("DOGE").unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn item(d: u32, hour: u32, title: &str) -> NewsRecord {
        NewsRecord::new(asset(), day(d), title)
            .with_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
            .with_link("https://example.com")
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let key = ShardKey::news(source(), asset(), day(9));

        assert_eq!(cache.upsert(&key, item(9, 7, "a")).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(cache.upsert(&key, item(9, 7, "a")).await.unwrap(), UpsertOutcome::Unchanged);

        let classified = item(9, 7, "a").classified(Sentiment::Positive);
        assert_eq!(cache.upsert(&key, classified).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(cache.store().load_news(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_into_wrong_shard_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let key = ShardKey::news(source(), asset(), day(9));
        let err = cache.upsert(&key, item(10, 7, "a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_contains() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let key = ShardKey::news(source(), asset(), day(9));

        assert!(!cache.contains(&key, day(9), "a").await.unwrap());
        cache.upsert(&key, item(9, 7, "a")).await.unwrap();
        assert!(cache.contains(&key, day(9), " a ").await.unwrap());
        assert!(!cache.contains(&key, day(9), "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_spans_shards_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let report = cache
            .upsert_batch(
                &source(),
                vec![
                    item(10, 1, "late"),
                    item(9, 8, "b"),
                    item(9, 8, "a"),
                    item(9, 6, "done").classified(Sentiment::Negative),
                ],
            )
            .await;
        assert!(report.is_success());
        assert_eq!(report.shards.len(), 2);

        let titles: Vec<_> = cache
            .pending(&source(), &asset())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "late"]);
    }

    #[tokio::test]
    async fn test_classify_marks_processed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let key = ShardKey::news(source(), asset(), day(9));
        cache.upsert(&key, item(9, 7, "a")).await.unwrap();
        cache.upsert(&key, item(9, 8, "b")).await.unwrap();

        let updated = cache.classify(&key, day(9), "b", Sentiment::Negative).await.unwrap();
        assert!(updated.processed);

        let stored = cache.store().load_news(&key).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].sentiment, Sentiment::Negative);
        assert_eq!(stored[0].sentiment, Sentiment::Neutral);
        assert!(!stored[0].processed);
    }

    #[tokio::test]
    async fn test_classify_missing_record_does_not_insert() {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let key = ShardKey::news(source(), asset(), day(9));

        let err = cache.classify(&key, day(9), "ghost", Sentiment::Positive).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!cache.store().shard_path(&key).exists());
    }
}
