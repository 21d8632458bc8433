//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tickvault_data::BatchReport;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 입력 항목 수
    pub total: usize,
    /// 저장소에 전달된 레코드 수
    pub success: usize,
    /// 실패한 샤드 또는 작업 수
    pub errors: usize,
    /// 건너뛴 항목 수 (정규화 실패, 검증 거부, 이미 캐시됨)
    pub skipped: usize,
    /// 새로 추가된 레코드 수
    pub added: usize,
    /// 교체된 레코드 수
    pub updated: usize,
    /// 이미 저장되어 있던 레코드 수
    pub unchanged: usize,
    /// 기록된 샤드 수
    pub shards: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 배치 결과를 누적합니다.
    pub fn absorb(&mut self, report: &BatchReport) {
        self.added += report.added();
        self.updated += report.updated();
        self.unchanged += report.unchanged();
        self.skipped += report.rejected_count();
        self.errors += report.failed().count();
        self.shards += report.shards.len();
    }

    /// 다른 통계를 합칩니다.
    pub fn merge(&mut self, other: &CollectionStats) {
        self.total += other.total;
        self.success += other.success;
        self.errors += other.errors;
        self.skipped += other.skipped;
        self.added += other.added;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.shards += other.shards;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            added = self.added,
            updated = self.updated,
            unchanged = self.unchanged,
            shards = self.shards,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
