//! 샤드 파일 입출력.
//!
//! 기록은 같은 디렉토리의 임시 파일에 쓴 뒤 `sync_all`하고 최종 이름으로 rename합니다.
//! 따라서 읽는 쪽은 이전 내용 전체 또는 새 내용 전체만 보게 됩니다.

use crate::error::{Result, StoreError};
use crate::shard::ShardKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tickvault_core::{SourceTag, StoreConfig, Symbol};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// 손상된 샤드를 옮겨 둘 때 붙이는 확장자.
pub const QUARANTINE_SUFFIX: &str = "quarantined";

/// 샤드 읽기 결과.
#[derive(Debug)]
pub enum ShardRead<T> {
    /// 파일 없음
    Absent,
    /// 정상적으로 해석됨
    Loaded(Vec<T>),
    /// 파일은 있지만 레코드 배열로 해석할 수 없음
    Corrupt { reason: String },
}

/// 데이터 루트 아래 샤드 파일을 다룹니다.
#[derive(Debug, Clone)]
pub struct ShardFiles {
    root: PathBuf,
    pretty: bool,
}

impl ShardFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: true,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            root: config.data_root.clone(),
            pretty: config.pretty_json,
        }
    }

    /// 들여쓰기 JSON 출력 여부를 설정합니다.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &ShardKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// 샤드를 읽습니다.
    ///
    /// 파일이 없으면 `Absent`, 내용이 깨졌으면 `Corrupt`입니다. 그 밖의 I/O 오류는
    /// 빈 샤드로 취급하지 않고 `ShardUnreadable`로 반환합니다.
    pub async fn read<T: DeserializeOwned>(&self, key: &ShardKey) -> Result<ShardRead<T>> {
        let path = self.path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ShardRead::Absent),
            Err(source) => return Err(StoreError::ShardUnreadable { path, source }),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ShardRead::Corrupt {
                reason: "빈 파일".to_string(),
            });
        }

        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(records) => Ok(ShardRead::Loaded(records)),
            Err(e) => Ok(ShardRead::Corrupt { reason: e.to_string() }),
        }
    }

    /// 레코드 전체를 원자적으로 기록합니다.
    ///
    /// 실패하면 임시 파일을 지우고 기존 파일은 그대로 둡니다.
    pub async fn write<T: Serialize>(&self, key: &ShardKey, records: &[T]) -> Result<()> {
        let path = self.path(key);
        let bytes = self.encode(records)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Persist {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = temp_path(&path);
        if let Err(source) = write_and_sync(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Persist { path, source });
        }

        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Persist { path, source });
        }

        debug!(shard = %key, bytes = bytes.len(), records = records.len(), "샤드 기록 완료");
        Ok(())
    }

    /// 손상된 샤드를 `{file}.{uuid}.quarantined`로 복사해 둡니다.
    ///
    /// 원본은 이어지는 원자적 기록이 교체하므로 기록이 실패해도 제자리에 남습니다. 복사에
    /// 실패해도 병합은 계속되므로 경고만 남기고 `None`을 반환합니다.
    pub async fn quarantine(&self, key: &ShardKey) -> Option<PathBuf> {
        let path = self.path(key);
        let target = quarantine_path(&path);
        match tokio::fs::copy(&path, &target).await {
            Ok(_) => {
                warn!(shard = %key, quarantined = %target.display(), "손상된 샤드 격리");
                Some(target)
            }
            Err(e) => {
                warn!(shard = %key, error = %e, "손상된 샤드 격리 실패");
                None
            }
        }
    }

    /// 출처/엔티티 디렉토리의 샤드 목록을 정렬해 반환합니다.
    ///
    /// 임시 파일, 격리 파일 등 샤드 이름 규칙에 맞지 않는 항목은 건너뜁니다.
    pub async fn list(&self, source: &SourceTag, entity: &Symbol) -> Result<Vec<ShardKey>> {
        let dir = self.root.join(source.as_str()).join(entity.as_str());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::ShardUnreadable { path: dir, source }),
        };

        let mut keys = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(StoreError::ShardUnreadable { path: dir, source }),
            };
            let name = entry.file_name();
            if let Some(key) = name
                .to_str()
                .and_then(|name| ShardKey::from_file_name(source, entity, name))
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn encode<T: Serialize>(&self, records: &[T]) -> Result<Vec<u8>> {
        if !self.pretty {
            return Ok(serde_json::to_vec(records)?);
        }
        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        records.serialize(&mut serializer)?;
        Ok(bytes)
    }
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".tmp-{}", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.{}", Uuid::new_v4().simple(), QUARANTINE_SUFFIX));
    path.with_file_name(name)
}
