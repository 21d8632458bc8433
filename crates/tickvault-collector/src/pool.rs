//! 동시 실행 수를 제한한 작업 풀.
//!
//! 작업마다 별도의 tokio 태스크에서 실행하므로 한 작업의 패닉이 다른 작업을 멈추지 않습니다.
//! 배치의 성공/실패는 로그가 아니라 반환값으로 전달됩니다.

use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// 작업 하나의 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Succeeded { index: usize, value: T },
    Failed { index: usize, reason: String },
}

impl<T> TaskOutcome<T> {
    /// 입력 목록에서의 위치.
    pub fn index(&self) -> usize {
        match self {
            Self::Succeeded { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Failed { .. } => None,
        }
    }
}

/// 작업 풀 실행 요약.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TaskSummary {
    pub fn from_outcomes<T>(outcomes: &[TaskOutcome<T>]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// 최대 `workers`개씩 동시에 작업을 실행합니다.
///
/// 결과는 입력 순서로 정렬되어 반환됩니다. `workers`가 0이면 1로 취급합니다.
pub async fn run_tasks<I, F, Fut, T, E>(
    items: Vec<I>,
    workers: usize,
    task: F,
) -> (Vec<TaskOutcome<T>>, TaskSummary)
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let parallelism = workers.max(1);
    debug!(tasks = items.len(), parallelism, "작업 풀 시작");

    // 병렬 실행 (parallelism 제한 적용: buffer_unordered 사용)
    let mut outcomes: Vec<TaskOutcome<T>> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let handle = tokio::spawn(task(item));
            async move {
                match handle.await {
                    Ok(Ok(value)) => TaskOutcome::Succeeded { index, value },
                    Ok(Err(e)) => TaskOutcome::Failed {
                        index,
                        reason: e.to_string(),
                    },
                    Err(join_error) => {
                        warn!(index, error = %join_error, "작업 태스크 비정상 종료");
                        TaskOutcome::Failed {
                            index,
                            reason: format!("작업 비정상 종료: {join_error}"),
                        }
                    }
                }
            }
        })
        .buffer_unordered(parallelism)
        .collect()
        .await;

    outcomes.sort_by_key(TaskOutcome::index);
    let summary = TaskSummary::from_outcomes(&outcomes);
    debug!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "작업 풀 완료"
    );
    (outcomes, summary)
}
