//! 샤드별 동시성 제어.
//!
//! 같은 샤드에 대한 읽기-병합-기록 구간은 직렬화하고, 서로 다른 샤드는 독립적으로 진행합니다.
//! 락은 `.await`를 가로질러 보유되므로 `tokio::sync` 프리미티브를 사용합니다.

use crate::error::{Result, StoreError};
use crate::shard::ShardKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

/// 샤드 키별 락 맵.
type ShardLockMap = Arc<RwLock<HashMap<ShardKey, Arc<Mutex<()>>>>>;

/// 샤드 락 보관소. 복제본은 같은 락 맵을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct ShardLocks {
    locks: ShardLockMap,
    /// 락 대기 한도 (없으면 무제한 대기)
    timeout: Option<Duration>,
}

impl ShardLocks {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// 샤드의 배타 락을 획득합니다.
    ///
    /// 반환된 가드가 drop되면 어떤 경로로 빠져나가든 락이 해제됩니다.
    pub async fn acquire(&self, key: &ShardKey) -> Result<OwnedMutexGuard<()>> {
        let lock = self.get_or_create_lock(key).await;
        match self.timeout {
            None => Ok(lock.lock_owned().await),
            Some(limit) => match tokio::time::timeout(limit, lock.lock_owned()).await {
                Ok(guard) => Ok(guard),
                Err(_) => {
                    warn!(shard = %key, waited_ms = limit.as_millis() as u64, "샤드 락 대기 시간 초과");
                    Err(StoreError::LockTimeout {
                        shard: key.to_string(),
                        waited_ms: limit.as_millis() as u64,
                    })
                }
            },
        }
    }

    /// 아무도 보유하거나 대기하지 않는 락 항목을 정리하고 제거된 수를 반환합니다.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before - locks.len();
        if removed > 0 {
            debug!(removed, remaining = locks.len(), "유휴 샤드 락 정리");
        }
        removed
    }

    /// 현재 추적 중인 락 수.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }

    /// 키에 해당하는 락을 가져오거나 생성합니다.
    async fn get_or_create_lock(&self, key: &ShardKey) -> Arc<Mutex<()>> {
        let locks = self.locks.read().await;
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }
        drop(locks);

        let mut locks = self.locks.write().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tickvault_core::{Interval, SourceTag, Symbol};

    fn key(entity: &str) -> ShardKey {
        ShardKey::candles(
            SourceTag::parse("binance").unwrap(),
            Symbol::parse(entity).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            Interval::FiveMinutes,
        )
    }

    #[tokio::test]
    async fn test_same_key_times_out_while_held() {
        let locks = ShardLocks::new(Some(Duration::from_millis(20)));
        let _held = locks.acquire(&key("BTCUSDT")).await.unwrap();

        let err = locks.acquire(&key("BTCUSDT")).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = ShardLocks::new(Some(Duration::from_millis(20)));
        let _btc = locks.acquire(&key("BTCUSDT")).await.unwrap();
        assert!(locks.acquire(&key("ETHUSDT")).await.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let locks = ShardLocks::new(Some(Duration::from_millis(20)));
        {
            let _guard = locks.acquire(&key("BTCUSDT")).await.unwrap();
        }
        assert!(locks.acquire(&key("BTCUSDT")).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = ShardLocks::default();
        let held = locks.acquire(&key("BTCUSDT")).await.unwrap();
        drop(locks.acquire(&key("ETHUSDT")).await.unwrap());

        assert_eq!(locks.prune().await, 1);
        assert_eq!(locks.len().await, 1);

        drop(held);
        assert_eq!(locks.prune().await, 1);
        assert!(locks.is_empty().await);
    }
}
