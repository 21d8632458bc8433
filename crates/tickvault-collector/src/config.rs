//! 환경변수 기반 설정 모듈.
//!
//! 설정 파일(`AppConfig`)을 먼저 읽고 `TICKVAULT_*` 환경변수로 덮어씁니다.

use crate::error::{CollectorError, Result};
use std::path::{Path, PathBuf};
use tickvault_core::{AppConfig, LoggingConfig, StoreConfig};

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 저장소 설정
    pub store: StoreConfig,
    /// 보강 작업 동시 실행 수
    pub workers: usize,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from_app(AppConfig::default())
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::default()
            .with_overrides(|key| std::env::var(key).ok())
            .validated()
    }

    /// 설정 파일을 읽은 뒤 환경변수를 적용합니다. 경로가 없으면 `config/default`를 찾습니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let app = match path {
            Some(path) => AppConfig::load(path),
            None => AppConfig::load_default(),
        }
        .map_err(|e| CollectorError::Config(e.to_string()))?;

        Self::from_app(app)
            .with_overrides(|key| std::env::var(key).ok())
            .validated()
    }

    pub fn from_app(app: AppConfig) -> Self {
        Self {
            store: app.store,
            workers: app.collector.workers,
            logging: app.logging,
        }
    }

    /// 조회 함수가 돌려주는 값으로 설정을 덮어씁니다. 파싱할 수 없는 값은 무시합니다.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("TICKVAULT_DATA_ROOT").filter(|v| !v.trim().is_empty()) {
            self.store.data_root = PathBuf::from(root.trim());
        }
        self.workers = var_parse(lookup("TICKVAULT_WORKERS"), self.workers);
        if let Some(ms) = lookup("TICKVAULT_LOCK_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.store.lock_timeout_ms = Some(ms);
        }
        self.store.quarantine_corrupt =
            var_bool(lookup("TICKVAULT_QUARANTINE_CORRUPT"), self.store.quarantine_corrupt);
        self.store.pretty_json = var_bool(lookup("TICKVAULT_PRETTY_JSON"), self.store.pretty_json);
        if let Some(level) = lookup("TICKVAULT_LOG_LEVEL") {
            self.logging.level = level;
        }
        self
    }

    fn validated(self) -> Result<Self> {
        if self.workers == 0 {
            return Err(CollectorError::Config(
                "workers는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(self)
    }
}

/// 값을 파싱 (실패 시 기본값 사용)
fn var_parse<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// bool 값 파싱
fn var_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.store.data_root, PathBuf::from("data/cache"));
        assert!(config.store.quarantine_corrupt);
    }

    #[test]
    fn test_overrides_apply() {
        let config = CollectorConfig::default().with_overrides(lookup(&[
            ("TICKVAULT_DATA_ROOT", "/tmp/vault"),
            ("TICKVAULT_WORKERS", "12"),
            ("TICKVAULT_LOCK_TIMEOUT_MS", "250"),
            ("TICKVAULT_QUARANTINE_CORRUPT", "0"),
            ("TICKVAULT_PRETTY_JSON", "false"),
        ]));
        assert_eq!(config.store.data_root, PathBuf::from("/tmp/vault"));
        assert_eq!(config.workers, 12);
        assert_eq!(config.store.lock_timeout_ms, Some(250));
        assert!(!config.store.quarantine_corrupt);
        assert!(!config.store.pretty_json);
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = CollectorConfig::default().with_overrides(lookup(&[
            ("TICKVAULT_WORKERS", "many"),
            ("TICKVAULT_PRETTY_JSON", "yes please"),
        ]));
        assert_eq!(config.workers, 5);
        assert!(config.store.pretty_json);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = CollectorConfig::default().with_overrides(lookup(&[("TICKVAULT_WORKERS", "0")]));
        assert!(matches!(config.validated(), Err(CollectorError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.toml");
        std::fs::write(
            &path,
            "[store]\ndata_root = \"vault\"\n\n[collector]\nworkers = 3\n",
        )
        .unwrap();

        let app = AppConfig::load(&path).unwrap();
        let config = CollectorConfig::from_app(app);
        assert_eq!(config.store.data_root, PathBuf::from("vault"));
        assert_eq!(config.workers, 3);
    }
}
