//! 뉴스 후처리 명령.
//!
//! 미처리 뉴스를 꺼내고, 외부 분류기가 낸 감성 라벨을 캐시에 반영합니다.

use crate::error::Result;
use crate::pool::{run_tasks, TaskOutcome};
use crate::stats::CollectionStats;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Instant;
use tickvault_core::{NewsRecord, Sentiment, SourceTag, Symbol};
use tickvault_data::{NewsCache, ShardKey};
use tracing::{info, warn};

/// 분류 결과 한 건.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyEntry {
    pub published_date: NaiveDate,
    pub title: String,
    /// 분류기 원문 출력 (`positive`, `Negative.` 등)
    pub label: String,
}

/// 감성 분류가 끝나지 않은 뉴스를 반환합니다.
pub async fn pending_news(cache: &NewsCache, source: &SourceTag, asset: &Symbol) -> Result<Vec<NewsRecord>> {
    let pending = cache.pending(source, asset).await?;
    info!(source = %source, asset = %asset, pending = pending.len(), "미처리 뉴스 조회");
    Ok(pending)
}

/// 뉴스 한 건에 감성 라벨을 반영합니다.
pub async fn classify_news(
    cache: &NewsCache,
    source: &SourceTag,
    asset: &Symbol,
    date: NaiveDate,
    title: &str,
    sentiment: Sentiment,
) -> Result<NewsRecord> {
    let key = ShardKey::news(source.clone(), asset.clone(), date);
    Ok(cache.classify(&key, date, title, sentiment).await?)
}

/// 분류 결과 목록을 반영합니다. 없는 레코드는 `errors`로 집계되고 새로 만들지 않습니다.
pub async fn classify_batch(
    cache: &NewsCache,
    source: &SourceTag,
    asset: &Symbol,
    entries: Vec<ClassifyEntry>,
    workers: usize,
) -> CollectionStats {
    let start = Instant::now();
    let mut stats = CollectionStats {
        total: entries.len(),
        ..Default::default()
    };

    let (outcomes, _) = run_tasks(entries, workers, |entry| {
        let cache = cache.clone();
        let source = source.clone();
        let asset = asset.clone();
        async move {
            let sentiment = Sentiment::from_classifier_output(&entry.label);
            classify_news(&cache, &source, &asset, entry.published_date, &entry.title, sentiment).await
        }
    })
    .await;

    for outcome in outcomes {
        match outcome {
            TaskOutcome::Succeeded { .. } => {
                stats.success += 1;
                stats.updated += 1;
            }
            TaskOutcome::Failed { index, reason } => {
                stats.errors += 1;
                warn!(index, reason = %reason, "감성 분류 반영 실패");
            }
        }
    }
    stats.elapsed = start.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickvault_data::RecordStore;

    fn source() -> SourceTag {
        SourceTag::parse("google_news_rss").unwrap()
    }

    fn asset() -> Symbol {
        Symbol::parse("DOGE").unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 9).unwrap()
    }

    async fn seeded() -> (tempfile::TempDir, NewsCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = NewsCache::new(RecordStore::open(dir.path()));
        let records = ["a", "b", "c"]
            .iter()
            .map(|title| NewsRecord::new(asset(), day(), *title))
            .collect();
        assert!(cache.store().ingest_news(&source(), records).await.is_success());
        (dir, cache)
    }

    #[tokio::test]
    async fn test_classify_batch_drains_pending() {
        let (_dir, cache) = seeded().await;
        let entries = vec![
            ClassifyEntry {
                published_date: day(),
                title: "a".to_string(),
                label: "Positive.".to_string(),
            },
            ClassifyEntry {
                published_date: day(),
                title: "b".to_string(),
                label: "negative".to_string(),
            },
            ClassifyEntry {
                published_date: day(),
                title: "ghost".to_string(),
                label: "neutral".to_string(),
            },
        ];

        let stats = classify_batch(&cache, &source(), &asset(), entries, 3).await;
        assert_eq!((stats.total, stats.success, stats.errors), (3, 2, 1));

        let pending = pending_news(&cache, &source(), &asset()).await.unwrap();
        let titles: Vec<_> = pending.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["c"]);

        let stored = cache
            .store()
            .load_news(&ShardKey::news(source(), asset(), day()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].sentiment, Sentiment::Positive);
        assert_eq!(stored[1].sentiment, Sentiment::Negative);
    }
}
