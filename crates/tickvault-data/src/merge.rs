//! 키 기준 병합 커널.
//!
//! I/O 없이 (기존 레코드, 후보 레코드, 충돌 정책)만으로 병합 결과를 계산합니다.
//! 같은 입력을 다시 병합하면 아무것도 바뀌지 않으므로 재시도가 안전합니다.

use crate::shard::ShardKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tickvault_core::{
    parse_published_date, parse_timestamp, CandleKey, NewsKey, NewsRecord, RecordError, TimeSeriesRecord,
};

/// 기본 키를 가진 샤드 레코드.
pub trait ShardRecord: Serialize + DeserializeOwned + PartialEq + Send + Sync + 'static {
    type Key: Ord + Clone + Send;

    /// 저장 시 키 순서로 정렬하는지 여부.
    const SORTED: bool;

    /// 로그와 오류에 쓰는 레코드 종류 이름.
    const KIND: &'static str;

    fn shard_key(&self) -> Self::Key;

    /// 이 레코드를 담을 수 있는 샤드 종류인지 여부.
    fn fits(kind: ShardKind) -> bool;

    /// 디코딩 전에 원시 JSON 객체의 키 필드를 검사합니다.
    fn check_raw(raw: &Map<String, Value>) -> Result<(), RecordError>;
}

impl ShardRecord for TimeSeriesRecord {
    type Key = CandleKey;
    const SORTED: bool = true;
    const KIND: &'static str = "candle";

    fn shard_key(&self) -> CandleKey {
        self.key()
    }

    fn fits(kind: ShardKind) -> bool {
        matches!(kind, ShardKind::Candles(_))
    }

    fn check_raw(raw: &Map<String, Value>) -> Result<(), RecordError> {
        parse_timestamp(required_str(raw, &["begins_at"], "begins_at")?)?;
        required_str(raw, &["symbol"], "symbol")?;
        required_str(raw, &["interval"], "interval")?;
        Ok(())
    }
}

impl ShardRecord for NewsRecord {
    type Key = NewsKey;
    const SORTED: bool = false;
    const KIND: &'static str = "news";

    fn shard_key(&self) -> NewsKey {
        self.key()
    }

    fn fits(kind: ShardKind) -> bool {
        kind == ShardKind::News
    }

    fn check_raw(raw: &Map<String, Value>) -> Result<(), RecordError> {
        parse_published_date(required_str(raw, &["published_date"], "published_date")?)?;
        required_str(raw, &["asset", "symbol"], "asset")?;
        required_str(raw, &["title"], "title")?;
        Ok(())
    }
}

/// `names` 중 처음 나오는 문자열 필드를 찾습니다. 없거나 null이면 `MissingField`.
fn required_str<'a>(
    raw: &'a Map<String, Value>,
    names: &[&str],
    field: &'static str,
) -> Result<&'a str, RecordError> {
    match names.iter().find_map(|name| raw.get(*name)) {
        None | Some(Value::Null) => Err(RecordError::MissingField { field }),
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(RecordError::Undecodable {
            reason: format!("{field} 필드가 문자열이 아님: {other}"),
        }),
    }
}

/// 키 충돌 시 처리 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// 기존 레코드 유지 (배치 내 중복은 먼저 온 것이 이김)
    KeepExisting,
    /// 제자리 교체 (배치 내 중복은 나중 것이 이김)
    Replace,
}

/// 병합 결과 집계.
///
/// `added + updated + unchanged`는 병합에 들어간 후보 수와 같습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// 새로 추가된 키 수
    pub added: usize,
    /// 내용이 교체된 기존 키 수
    pub updated: usize,
    /// 변화를 일으키지 않은 후보 수
    pub unchanged: usize,
    /// 검증에서 거부된 후보 수
    pub rejected: usize,
    /// 기존 샤드에서 중복 키로 제거된 레코드 수
    pub collapsed: usize,
    /// 병합 후 레코드 수
    pub total: usize,
}

impl MergeOutcome {
    /// 샤드 내용이 바뀌었는지 여부.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0 || self.collapsed > 0
    }
}

/// 기존 레코드에 후보를 병합합니다.
///
/// 기존 레코드의 순서는 유지되고 새 키는 뒤에 붙습니다. `T::SORTED`이면 마지막에 키 순으로
/// 안정 정렬합니다. 기존 샤드에 중복 키가 있으면 첫 번째만 남깁니다.
pub fn merge<T: ShardRecord>(
    existing: Vec<T>,
    candidates: Vec<T>,
    policy: ConflictPolicy,
) -> (Vec<T>, MergeOutcome) {
    let mut outcome = MergeOutcome::default();
    let mut index: BTreeMap<T::Key, usize> = BTreeMap::new();
    let mut merged: Vec<T> = Vec::with_capacity(existing.len() + candidates.len());

    for record in existing {
        let key = record.shard_key();
        if index.contains_key(&key) {
            outcome.collapsed += 1;
            continue;
        }
        index.insert(key, merged.len());
        merged.push(record);
    }

    // 배치 내 중복을 정책대로 먼저 정리
    let mut batch: Vec<T> = Vec::with_capacity(candidates.len());
    let mut batch_index: BTreeMap<T::Key, usize> = BTreeMap::new();
    for candidate in candidates {
        let key = candidate.shard_key();
        match batch_index.get(&key) {
            None => {
                batch_index.insert(key, batch.len());
                batch.push(candidate);
            }
            Some(&position) => {
                outcome.unchanged += 1;
                if policy == ConflictPolicy::Replace {
                    batch[position] = candidate;
                }
            }
        }
    }

    for candidate in batch {
        let key = candidate.shard_key();
        match index.get(&key) {
            None => {
                index.insert(key, merged.len());
                merged.push(candidate);
                outcome.added += 1;
            }
            Some(&position) => {
                if policy == ConflictPolicy::KeepExisting || merged[position] == candidate {
                    outcome.unchanged += 1;
                } else {
                    merged[position] = candidate;
                    outcome.updated += 1;
                }
            }
        }
    }

    if T::SORTED {
        merged.sort_by_key(|record| record.shard_key());
    }
    outcome.total = merged.len();
    (merged, outcome)
}
