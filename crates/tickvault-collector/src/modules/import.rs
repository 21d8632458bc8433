//! 생산자 파일 가져오기.
//!
//! 입력 파일을 정규화한 뒤 저장소에 병합합니다. 파일 단위 작업은 작업 풀에서 동시에 실행되며,
//! 같은 샤드에 닿는 작업은 저장소의 샤드 락이 직렬화합니다.

use crate::error::Result;
use crate::modules::input::{items_of, read_json};
use crate::normalize::{binance_klines, historicals, rss_items, Normalized};
use crate::pool::{run_tasks, TaskOutcome};
use crate::stats::CollectionStats;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tickvault_core::{shard_span, Interval, NewsRecord, SourceTag, Symbol, TimeSeriesRecord};
use tickvault_data::{NewsCache, RecordStore, ShardKey, StoreError};
use tracing::{debug, info, instrument, warn, Instrument};

/// 시계열 파일을 감싸는 객체에서 항목 배열을 찾을 필드 이름.
const CANDLE_ARRAY_FIELDS: &[&str] = &["data_points", "klines", "results", "data"];
/// RSS 파일을 감싸는 객체에서 항목 배열을 찾을 필드 이름.
const NEWS_ARRAY_FIELDS: &[&str] = &["items", "entries", "news"];

/// 시계열 입력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CandleFormat {
    /// Binance kline 배열
    Binance,
    /// `begins_at`/`*_price` 객체
    Historicals,
}

/// 시계열 가져오기 요청.
#[derive(Debug, Clone)]
pub struct CandleImport {
    pub source: SourceTag,
    pub symbol: Symbol,
    pub interval: Interval,
    pub format: CandleFormat,
    pub files: Vec<PathBuf>,
}

/// 뉴스 가져오기 요청.
#[derive(Debug, Clone)]
pub struct NewsImport {
    pub source: SourceTag,
    pub asset: Symbol,
    pub files: Vec<PathBuf>,
}

/// 시계열 파일들을 가져옵니다. 실패한 파일은 통계의 `errors`로 집계됩니다.
#[instrument(skip_all, fields(source = %request.source, symbol = %request.symbol, interval = %request.interval))]
pub async fn import_candles(store: &RecordStore, request: CandleImport, workers: usize) -> CollectionStats {
    let start = Instant::now();
    let CandleImport {
        source,
        symbol,
        interval,
        format,
        files,
    } = request;

    let (outcomes, summary) = run_tasks(files.clone(), workers, |path| {
        let store = store.clone();
        let source = source.clone();
        let symbol = symbol.clone();
        let span = shard_span!("candle_file", source, symbol);
        async move { import_candle_file(&store, &source, &symbol, interval, format, &path).await }
            .instrument(span)
    })
    .await;

    let mut stats = CollectionStats::new();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Succeeded { value, .. } => stats.merge(&value),
            TaskOutcome::Failed { index, reason } => {
                stats.errors += 1;
                warn!(file = %files[index].display(), reason = %reason, "파일 가져오기 실패");
            }
        }
    }
    stats.elapsed = start.elapsed();

    info!(
        files = summary.total,
        failed_files = summary.failed,
        added = stats.added,
        "시계열 가져오기 완료"
    );
    stats
}

async fn import_candle_file(
    store: &RecordStore,
    source: &SourceTag,
    symbol: &Symbol,
    interval: Interval,
    format: CandleFormat,
    path: &Path,
) -> Result<CollectionStats> {
    let items = items_of(read_json(path).await?, CANDLE_ARRAY_FIELDS, path)?;
    let normalized = match format {
        CandleFormat::Binance => binance_klines(symbol, interval, &items),
        CandleFormat::Historicals => historicals(symbol, interval, &items),
    };
    let mut stats = stats_for(items.len(), &normalized, path);

    let report = store
        .ingest_candles(source, interval, normalized.records)
        .await;
    stats.success = stats.success.saturating_sub(report.rejected_count());
    stats.absorb(&report);
    Ok(stats)
}

/// RSS 항목 파일들을 가져옵니다.
///
/// 이미 캐시된 (날짜, 제목)은 보강 단계 전에 걸러내 `skipped`로 집계합니다. 기존 레코드는
/// 덮어쓰지 않습니다.
#[instrument(skip_all, fields(source = %request.source, asset = %request.asset))]
pub async fn import_news(cache: &NewsCache, request: NewsImport, workers: usize) -> CollectionStats {
    let start = Instant::now();
    let NewsImport { source, asset, files } = request;
    let mut stats = CollectionStats::new();

    let mut candidates: Vec<NewsRecord> = Vec::new();
    for path in &files {
        match load_news_file(&asset, path).await {
            Ok(normalized) => {
                stats.total += normalized.records.len() + normalized.skipped.len();
                stats.skipped += normalized.skipped.len();
                candidates.extend(normalized.records);
            }
            Err(e) => {
                stats.errors += 1;
                warn!(file = %path.display(), error = %e, "파일 가져오기 실패");
            }
        }
    }

    let (outcomes, _) = run_tasks(candidates, workers, |record| {
        let cache = cache.clone();
        let source = source.clone();
        async move {
            let key = ShardKey::news(source, record.asset.clone(), record.published_date);
            let cached = cache
                .contains(&key, record.published_date, &record.title)
                .await?;
            Ok::<_, StoreError>((!cached).then_some(record))
        }
    })
    .await;

    let mut fresh = Vec::new();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Succeeded { value: Some(record), .. } => fresh.push(record),
            TaskOutcome::Succeeded { value: None, .. } => stats.skipped += 1,
            TaskOutcome::Failed { reason, .. } => {
                stats.errors += 1;
                warn!(reason = %reason, "캐시 조회 실패");
            }
        }
    }
    debug!(fresh = fresh.len(), "새 뉴스 항목");

    stats.success = fresh.len();
    let report = cache.store().ingest_news(&source, fresh).await;
    stats.success = stats.success.saturating_sub(report.rejected_count());
    stats.absorb(&report);
    stats.elapsed = start.elapsed();
    stats
}

async fn load_news_file(asset: &Symbol, path: &Path) -> Result<Normalized<NewsRecord>> {
    let items = items_of(read_json(path).await?, NEWS_ARRAY_FIELDS, path)?;
    let normalized = rss_items(asset, &items);
    for skipped in &normalized.skipped {
        debug!(file = %path.display(), position = skipped.position, reason = %skipped.reason, "항목 건너뜀");
    }
    Ok(normalized)
}

fn stats_for(total: usize, normalized: &Normalized<TimeSeriesRecord>, path: &Path) -> CollectionStats {
    for skipped in &normalized.skipped {
        debug!(file = %path.display(), position = skipped.position, reason = %skipped.reason, "항목 건너뜀");
    }
    CollectionStats {
        total,
        success: normalized.records.len(),
        skipped: normalized.skipped.len(),
        ..Default::default()
    }
}
