//! tickvault 수집기 CLI.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tickvault_collector::modules::{self, CandleFormat, CandleImport, ClassifyEntry, NewsImport};
use tickvault_collector::CollectorConfig;
use tickvault_core::{init_logging, Interval, LogConfig, LogFormat, Sentiment, SourceTag, Symbol};
use tickvault_data::{CompletenessAuditor, NewsCache, RecordStore};

#[derive(Parser)]
#[command(name = "tickvault-collector")]
#[command(about = "tickvault 시계열/뉴스 샤드 수집기", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 시계열 파일 가져오기
    ImportCandles {
        #[arg(long)]
        source: SourceTag,
        #[arg(long)]
        symbol: Symbol,
        /// 간격 태그 (minute, 5minute, hour, day 또는 1m, 5m, 1h, 1d)
        #[arg(long)]
        interval: Interval,
        #[arg(long, value_enum, default_value = "binance")]
        format: CandleFormat,
        /// 입력 JSON 파일
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// RSS 항목 파일 가져오기
    ImportNews {
        #[arg(long, default_value = "google_news_rss")]
        source: SourceTag,
        #[arg(long)]
        asset: Symbol,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// 날짜 범위의 완전성 점검
    Audit {
        #[arg(long)]
        source: SourceTag,
        #[arg(long)]
        symbol: Symbol,
        #[arg(long)]
        interval: Interval,
        /// 시작일 (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// 종료일 (포함, 기본: 시작일)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// 불완전한 날이 있으면 종료 코드 2
        #[arg(long)]
        strict: bool,
    },

    /// 감성 분류 전 뉴스 출력 (JSON 한 줄씩)
    PendingNews {
        #[arg(long, default_value = "google_news_rss")]
        source: SourceTag,
        #[arg(long)]
        asset: Symbol,
    },

    /// 뉴스 한 건에 감성 라벨 반영
    Classify {
        #[arg(long, default_value = "google_news_rss")]
        source: SourceTag,
        #[arg(long)]
        asset: Symbol,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        title: String,
        /// positive, negative, neutral
        #[arg(long)]
        sentiment: Sentiment,
    },

    /// 분류 결과 파일 반영 (`[{published_date, title, label}]`)
    ClassifyBatch {
        #[arg(long, default_value = "google_news_rss")]
        source: SourceTag,
        #[arg(long)]
        asset: Symbol,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 설정 로드
    let config = CollectorConfig::load(cli.config.as_deref())?;

    // 로깅 초기화
    let mut log_config = LogConfig::from_section(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    let format = cli.log_format.or_else(|| std::env::var("LOG_FORMAT").ok());
    if let Some(format) = format {
        log_config.format = format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    tracing::info!("tickvault 수집기 시작");
    tracing::debug!(data_root = %config.store.data_root.display(), workers = config.workers, "설정 로드 완료");

    let store = RecordStore::new(&config.store);
    let workers = config.workers;

    // 명령 실행
    let code = match cli.command {
        Commands::ImportCandles {
            source,
            symbol,
            interval,
            format,
            files,
        } => {
            let request = CandleImport {
                source,
                symbol,
                interval,
                format,
                files,
            };
            let stats = modules::import_candles(&store, request, workers).await;
            stats.log_summary("시계열 가져오기");
            exit_code(stats.errors == 0)
        }
        Commands::ImportNews { source, asset, files } => {
            let cache = NewsCache::new(store.clone());
            let request = NewsImport { source, asset, files };
            let stats = modules::import_news(&cache, request, workers).await;
            stats.log_summary("뉴스 가져오기");
            exit_code(stats.errors == 0)
        }
        Commands::Audit {
            source,
            symbol,
            interval,
            from,
            to,
            strict,
        } => {
            let auditor = CompletenessAuditor::new(store.clone());
            let to = to.unwrap_or(from);
            let summary = modules::audit_days(&auditor, &source, &symbol, interval, from, to).await?;
            for report in &summary.reports {
                println!(
                    "{} {}/{} missing={} off_grid={}{}",
                    report.day,
                    report.present,
                    report.expected,
                    report.missing.len(),
                    report.off_grid.len(),
                    if report.corrupt { " corrupt" } else { "" }
                );
            }
            if strict && !summary.is_complete() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Commands::PendingNews { source, asset } => {
            let cache = NewsCache::new(store.clone());
            for record in modules::pending_news(&cache, &source, &asset).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            ExitCode::SUCCESS
        }
        Commands::Classify {
            source,
            asset,
            date,
            title,
            sentiment,
        } => {
            let cache = NewsCache::new(store.clone());
            let record = modules::classify_news(&cache, &source, &asset, date, &title, sentiment).await?;
            println!("{}", serde_json::to_string(&record)?);
            ExitCode::SUCCESS
        }
        Commands::ClassifyBatch { source, asset, file } => {
            let cache = NewsCache::new(store.clone());
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("분류 결과 파일을 읽을 수 없습니다: {}", file.display()))?;
            let entries: Vec<ClassifyEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("분류 결과 파일 형식 오류: {}", file.display()))?;
            let stats = modules::classify_batch(&cache, &source, &asset, entries, workers).await;
            stats.log_summary("감성 분류 반영");
            exit_code(stats.errors == 0)
        }
    };

    let pruned = store.locks().prune().await;
    tracing::debug!(pruned, "샤드 락 정리");
    tracing::info!("tickvault 수집기 종료");

    Ok(code)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
