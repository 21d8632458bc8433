//! 설정 관리.
//!
//! TOML 파일과 `TICKVAULT__` 접두사 환경 변수(구분자 `__`)에서 설정을 읽습니다.
//! 예: `TICKVAULT__STORE__DATA_ROOT=/var/lib/tickvault`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// 수집기 설정
    #[serde(default)]
    pub collector: CollectorSection,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 샤드 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// 샤드 파일 루트 디렉토리
    pub data_root: PathBuf,
    /// 샤드 락 대기 한도 (밀리초, 없으면 무제한 대기)
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    /// 손상된 샤드를 `.quarantined` 사본으로 남길지 여부
    #[serde(default = "default_true")]
    pub quarantine_corrupt: bool,
    /// 들여쓰기 4칸 JSON으로 기록할지 여부
    #[serde(default = "default_true")]
    pub pretty_json: bool,
}

impl StoreConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Default::default()
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/cache"),
            lock_timeout_ms: None,
            quarantine_corrupt: true,
            pretty_json: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// 수집기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorSection {
    /// 보강 작업 동시 실행 수
    pub workers: usize,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self { workers: 5 }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다. 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            // 기본값으로 시작
            .set_default("store.data_root", "data/cache")?
            .set_default("collector.workers", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")
    }

    fn env_source() -> config::Environment {
        config::Environment::with_prefix("TICKVAULT")
            .separator("__")
            .try_parsing(true)
    }
}
