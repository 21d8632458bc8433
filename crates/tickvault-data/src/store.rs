//! 샤드 레코드 저장소.
//!
//! # 병합 흐름
//!
//! ```text
//! 후보 배치
//!     │
//!     ▼
//! ┌──────────────────┐
//! │ 1. 샤드별 그룹화  │ ← 정규화/검증 실패는 거부 목록으로
//! └────────┬─────────┘
//!          │ (샤드마다 독립)
//! ┌────────▼─────────┐
//! │ 2. 샤드 락 획득   │ ← 같은 샤드만 직렬화
//! └────────┬─────────┘
//! ┌────────▼─────────┐
//! │ 3. 기존 샤드 읽기 │ ← 없음: 빈 집합, 손상: 격리 후 빈 집합
//! └────────┬─────────┘
//! ┌────────▼─────────┐
//! │ 4. 키 기준 병합   │
//! └────────┬─────────┘
//!          │ 변화 있음?
//! ┌────────▼─────────┐
//! │ 5. 원자적 기록    │ ← 임시 파일 + rename
//! └──────────────────┘
//! ```

use crate::error::{Result, StoreError};
use crate::guard::ShardLocks;
use crate::merge::{merge, ConflictPolicy, MergeOutcome, ShardRecord};
use crate::shard::{group_candles, group_news, Grouped, Rejected, ShardKey};
use crate::storage::{ShardFiles, ShardRead};
use futures::future::join_all;
use std::path::Path;
use tickvault_core::{Interval, NewsRecord, RecordError, SourceTag, StoreConfig, Symbol, TimeSeriesRecord};
use tracing::{debug, info, instrument, warn};

/// 샤드 하나의 병합 결과.
#[derive(Debug)]
pub struct ShardReport {
    pub key: ShardKey,
    pub result: Result<MergeOutcome>,
}

/// 배치 수집 결과.
///
/// 샤드 하나가 실패해도 다른 샤드는 계속 처리되며, 실패는 해당 샤드의 `result`에 남습니다.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub shards: Vec<ShardReport>,
    /// 그룹화 단계에서 거부된 레코드
    pub rejected: Vec<Rejected>,
}

impl BatchReport {
    /// 새로 추가된 레코드 수 합계.
    pub fn added(&self) -> usize {
        self.outcomes().map(|o| o.added).sum()
    }

    /// 교체된 레코드 수 합계.
    pub fn updated(&self) -> usize {
        self.outcomes().map(|o| o.updated).sum()
    }

    /// 변화 없이 건너뛴 후보 수 합계.
    pub fn unchanged(&self) -> usize {
        self.outcomes().map(|o| o.unchanged).sum()
    }

    /// 거부된 레코드 수 (그룹화 + 샤드 검증).
    pub fn rejected_count(&self) -> usize {
        self.rejected.len() + self.outcomes().map(|o| o.rejected).sum::<usize>()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ShardKey, &StoreError)> {
        self.shards
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (&s.key, e)))
    }

    /// 모든 샤드가 기록에 성공했는지 여부.
    pub fn is_success(&self) -> bool {
        self.shards.iter().all(|s| s.result.is_ok())
    }

    fn outcomes(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.shards.iter().filter_map(|s| s.result.as_ref().ok())
    }
}

/// 샤드 레코드 저장소.
///
/// 복제본은 같은 락 맵을 공유하므로 여러 태스크에 나눠 줄 수 있습니다.
#[derive(Debug, Clone)]
pub struct RecordStore {
    files: ShardFiles,
    locks: ShardLocks,
    quarantine_corrupt: bool,
}

impl RecordStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            files: ShardFiles::from_config(config),
            locks: ShardLocks::new(config.lock_timeout()),
            quarantine_corrupt: config.quarantine_corrupt,
        }
    }

    /// 기본 설정으로 `root` 아래에 저장소를 엽니다.
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self::new(&StoreConfig::new(root.as_ref()))
    }

    pub fn root(&self) -> &Path {
        self.files.root()
    }

    pub fn locks(&self) -> &ShardLocks {
        &self.locks
    }

    pub fn shard_path(&self, key: &ShardKey) -> std::path::PathBuf {
        self.files.path(key)
    }

    /// 시계열 후보를 샤드에 병합합니다. 기존 키는 덮어쓰지 않습니다.
    ///
    /// 샤드와 맞지 않거나 검증에 실패한 후보는 건너뛰고 `rejected`로 집계합니다.
    #[instrument(skip_all, fields(shard = %key, candidates = candidates.len()))]
    pub async fn merge_records(
        &self,
        key: &ShardKey,
        candidates: Vec<TimeSeriesRecord>,
    ) -> Result<MergeOutcome> {
        check_kind::<TimeSeriesRecord>(key)?;

        let mut accepted = Vec::with_capacity(candidates.len());
        let mut rejected = 0;
        for candidate in candidates {
            match candidate.normalized().and_then(|c| key.check_candle(&c).map(|_| c)) {
                Ok(record) => accepted.push(record),
                Err(reason) => {
                    warn!(shard = %key, reason = %reason, "레코드 건너뜀");
                    rejected += 1;
                }
            }
        }

        let mut outcome = self.merge_shard(key, accepted, ConflictPolicy::KeepExisting).await?;
        outcome.rejected = rejected;
        Ok(outcome)
    }

    /// 뉴스 후보를 샤드에 병합합니다.
    #[instrument(skip_all, fields(shard = %key, candidates = candidates.len()))]
    pub async fn merge_news(
        &self,
        key: &ShardKey,
        candidates: Vec<NewsRecord>,
        policy: ConflictPolicy,
    ) -> Result<MergeOutcome> {
        check_kind::<NewsRecord>(key)?;

        let mut accepted = Vec::with_capacity(candidates.len());
        let mut rejected = 0;
        for candidate in candidates {
            match candidate.normalized().and_then(|c| key.check_news(&c).map(|_| c)) {
                Ok(record) => accepted.push(record),
                Err(reason) => {
                    warn!(shard = %key, reason = %reason, "뉴스 레코드 건너뜀");
                    rejected += 1;
                }
            }
        }

        let mut outcome = self.merge_shard(key, accepted, policy).await?;
        outcome.rejected = rejected;
        Ok(outcome)
    }

    /// 시계열 배치를 샤드별로 나눠 병합합니다.
    #[instrument(skip_all, fields(source = %source, interval = %interval, records = records.len()))]
    pub async fn ingest_candles(
        &self,
        source: &SourceTag,
        interval: Interval,
        records: Vec<TimeSeriesRecord>,
    ) -> BatchReport {
        let grouped = group_candles(source, interval, records);
        self.ingest_grouped(grouped, |store, key, batch| async move {
            let result = store.merge_records(&key, batch).await;
            ShardReport { key, result }
        })
        .await
    }

    /// 뉴스 배치를 샤드별로 나눠 병합합니다. 이미 있는 (날짜, 제목)은 건너뜁니다.
    #[instrument(skip_all, fields(source = %source, records = records.len()))]
    pub async fn ingest_news(&self, source: &SourceTag, records: Vec<NewsRecord>) -> BatchReport {
        self.ingest_news_with(source, records, ConflictPolicy::KeepExisting).await
    }

    pub(crate) async fn ingest_news_with(
        &self,
        source: &SourceTag,
        records: Vec<NewsRecord>,
        policy: ConflictPolicy,
    ) -> BatchReport {
        let grouped = group_news(source, records);
        self.ingest_grouped(grouped, move |store, key, batch| async move {
            let result = store.merge_news(&key, batch, policy).await;
            ShardReport { key, result }
        })
        .await
    }

    async fn ingest_grouped<T, F, Fut>(&self, grouped: Grouped<T>, merge_one: F) -> BatchReport
    where
        F: Fn(RecordStore, ShardKey, Vec<T>) -> Fut,
        Fut: std::future::Future<Output = ShardReport>,
    {
        for rejected in &grouped.rejected {
            warn!(position = rejected.position, reason = %rejected.reason, "레코드 건너뜀");
        }

        // 서로 다른 샤드는 동시에 병합
        let shards = join_all(
            grouped
                .shards
                .into_iter()
                .map(|(key, batch)| merge_one(self.clone(), key, batch)),
        )
        .await;

        let report = BatchReport {
            shards,
            rejected: grouped.rejected,
        };
        for (key, error) in report.failed() {
            warn!(shard = %key, error = %error, "샤드 병합 실패");
        }
        info!(
            shards = report.shards.len(),
            added = report.added(),
            updated = report.updated(),
            unchanged = report.unchanged(),
            rejected = report.rejected_count(),
            "배치 병합 완료"
        );
        report
    }

    /// 시계열 샤드를 읽습니다. 없으면 빈 목록, 손상되었으면 `CorruptShard`.
    pub async fn load_candles(&self, key: &ShardKey) -> Result<Vec<TimeSeriesRecord>> {
        self.load(key).await
    }

    /// 뉴스 샤드를 읽습니다. 없으면 빈 목록, 손상되었으면 `CorruptShard`.
    pub async fn load_news(&self, key: &ShardKey) -> Result<Vec<NewsRecord>> {
        self.load(key).await
    }

    /// 출처/엔티티 아래의 샤드 목록.
    pub async fn list_shards(&self, source: &SourceTag, entity: &Symbol) -> Result<Vec<ShardKey>> {
        self.files.list(source, entity).await
    }

    pub(crate) async fn read_shard<T: ShardRecord>(&self, key: &ShardKey) -> Result<ShardRead<T>> {
        self.files.read(key).await
    }

    async fn load<T: ShardRecord>(&self, key: &ShardKey) -> Result<Vec<T>> {
        match self.files.read(key).await? {
            ShardRead::Absent => Ok(Vec::new()),
            ShardRead::Loaded(records) => Ok(records),
            ShardRead::Corrupt { reason } => Err(StoreError::CorruptShard {
                path: self.files.path(key),
                reason,
            }),
        }
    }

    /// 락을 잡은 상태에서 샤드를 읽고 병합해 기록합니다.
    async fn merge_shard<T: ShardRecord>(
        &self,
        key: &ShardKey,
        candidates: Vec<T>,
        policy: ConflictPolicy,
    ) -> Result<MergeOutcome> {
        self.modify_shard(key, |existing: Vec<T>| {
            let (merged, outcome) = merge(existing, candidates, policy);
            Ok((merged, outcome.changed(), outcome))
        })
        .await
        .map(|(outcome, rebuilt)| {
            if outcome.changed() || rebuilt {
                info!(
                    shard = %key,
                    added = outcome.added,
                    updated = outcome.updated,
                    total = outcome.total,
                    "샤드 병합 완료"
                );
            } else {
                debug!(shard = %key, unchanged = outcome.unchanged, "변경 없음, 기록 생략");
            }
            outcome
        })
    }

    /// 샤드 단위 읽기-수정-기록.
    ///
    /// `apply`는 기존 레코드를 받아 (새 레코드, 변경 여부, 결과)를 돌려줍니다. 변경이 없고
    /// 샤드가 정상이면 기록하지 않습니다. 손상된 샤드는 빈 집합으로 시작해 항상 다시 기록합니다.
    /// 반환값의 두 번째 항목은 손상된 샤드를 재구성했는지 여부입니다.
    ///
    /// 오류로 끝나면 샤드 파일은 호출 전 그대로 남습니다.
    pub(crate) async fn modify_shard<T, R, F>(&self, key: &ShardKey, apply: F) -> Result<(R, bool)>
    where
        T: ShardRecord,
        F: FnOnce(Vec<T>) -> Result<(Vec<T>, bool, R)>,
    {
        check_kind::<T>(key)?;
        let _guard = self.locks.acquire(key).await?;

        let (existing, corrupt) = match self.files.read::<T>(key).await? {
            ShardRead::Absent => (Vec::new(), false),
            ShardRead::Loaded(records) => (records, false),
            ShardRead::Corrupt { reason } => {
                warn!(shard = %key, reason = %reason, "손상된 샤드, 빈 샤드로 재구성");
                (Vec::new(), true)
            }
        };

        let (records, changed, result) = apply(existing)?;
        if changed || corrupt {
            // 격리 사본은 덮어쓰기 직전에 만듦
            if corrupt && self.quarantine_corrupt {
                self.files.quarantine(key).await;
            }
            self.files.write(key, &records).await?;
        }
        Ok((result, corrupt))
    }
}

/// 레코드 종류와 샤드 종류가 맞지 않으면 파일에 닿기 전에 거부합니다.
fn check_kind<T: ShardRecord>(key: &ShardKey) -> Result<()> {
    if T::fits(key.kind) {
        return Ok(());
    }
    Err(StoreError::Malformed(RecordError::ShardMismatch {
        field: "kind",
        expected: key.kind.name().to_string(),
        actual: T::KIND.to_string(),
    }))
}
