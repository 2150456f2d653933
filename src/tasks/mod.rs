use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};
use tracing::error;
use uuid::Uuid;

use crate::{
    agent::{ReviewPipeline, ReviewRequest, ReviewResult},
    error::ReviewError,
};

/// Lifecycle of one review task. Transitions are strictly forward:
/// Pending -> Running -> Done | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

/// One submitted review request and everything known about it.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub state: TaskState,
    pub request: ReviewRequest,
    pub result: Option<ReviewResult>,
    pub error: Option<ReviewError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

type TaskTable = Arc<RwLock<HashMap<Uuid, Task>>>;

/// Owns the task table. One spawned worker per submission, bounded by a
/// process-wide semaphore; all table access goes through this type.
#[derive(Clone)]
pub struct TaskManager {
    pipeline: Arc<dyn ReviewPipeline>,
    table: TaskTable,
    permits: Arc<Semaphore>,
}

impl TaskManager {
    pub fn new(pipeline: Arc<dyn ReviewPipeline>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            table: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Validate, register the task as Pending, and schedule its worker.
    /// Returns immediately; the pipeline runs in the background.
    pub async fn submit(&self, request: ReviewRequest) -> Result<Uuid, ReviewError> {
        request.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let task = Task {
            id,
            state: TaskState::Pending,
            request: request.clone(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.table.write().await.insert(id, task);
        self.spawn_worker(id, request);
        Ok(id)
    }

    pub async fn status(&self, id: Uuid) -> Result<TaskState, ReviewError> {
        let guard = self.table.read().await;
        guard
            .get(&id)
            .map(|task| task.state)
            .ok_or(ReviewError::TaskNotFound)
    }

    /// Full task view for the status endpoint.
    pub async fn snapshot(&self, id: Uuid) -> Result<Task, ReviewError> {
        let guard = self.table.read().await;
        guard.get(&id).cloned().ok_or(ReviewError::TaskNotFound)
    }

    /// The finished artifact of a Done task. A Failed task replays its
    /// captured stage error; anything unfinished is `NotReady`.
    pub async fn result(&self, id: Uuid) -> Result<ReviewResult, ReviewError> {
        let guard = self.table.read().await;
        let task = guard.get(&id).ok_or(ReviewError::TaskNotFound)?;
        match task.state {
            TaskState::Done => task.result.clone().ok_or(ReviewError::NotReady),
            TaskState::Failed => Err(task
                .error
                .clone()
                .unwrap_or_else(|| ReviewError::upstream("task failed without a captured error"))),
            TaskState::Pending | TaskState::Running => Err(ReviewError::NotReady),
        }
    }

    /// Drop terminal tasks older than the cutoff. Pending/Running entries
    /// are never pruned, so terminal states stay observable until
    /// retention expires.
    pub async fn prune_terminal(&self, cutoff: DateTime<Utc>) -> usize {
        let mut guard = self.table.write().await;
        let before = guard.len();
        guard.retain(|_, task| !(task.state.is_terminal() && task.updated_at < cutoff));
        before - guard.len()
    }

    fn spawn_worker(&self, id: Uuid, request: ReviewRequest) {
        let pipeline = self.pipeline.clone();
        let table = self.table.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    mark_failed(&table, id, ReviewError::upstream("worker pool closed")).await;
                    return;
                }
            };

            if !mark_running(&table, id).await {
                return;
            }

            let outcome = pipeline.run(&request).await;
            drop(permit);

            match outcome {
                Ok(result) => mark_done(&table, id, result).await,
                Err(err) => {
                    error!(task_id = %id, %err, "review task failed");
                    mark_failed(&table, id, err).await;
                }
            }
        });
    }
}

async fn mark_running(table: &TaskTable, id: Uuid) -> bool {
    let mut guard = table.write().await;
    match guard.get_mut(&id) {
        Some(task) if task.state == TaskState::Pending => {
            task.state = TaskState::Running;
            task.updated_at = Utc::now();
            true
        }
        _ => false,
    }
}

async fn mark_done(table: &TaskTable, id: Uuid, result: ReviewResult) {
    let mut guard = table.write().await;
    if let Some(task) = guard.get_mut(&id) {
        if task.state == TaskState::Running {
            task.state = TaskState::Done;
            task.result = Some(result);
            task.updated_at = Utc::now();
        }
    }
}

async fn mark_failed(table: &TaskTable, id: Uuid, err: ReviewError) {
    let mut guard = table.write().await;
    if let Some(task) = guard.get_mut(&id) {
        if !task.state.is_terminal() {
            task.state = TaskState::Failed;
            task.error = Some(err);
            task.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::sentiment::Polarity;

    fn request_for(title: &str) -> ReviewRequest {
        ReviewRequest {
            title: title.to_string(),
            year: None,
            target_audience: Default::default(),
            review_style: Default::default(),
            max_length: 1000,
            include_spoilers: false,
        }
    }

    fn result_for(title: &str) -> ReviewResult {
        let text = format!("review of {title}");
        ReviewResult {
            word_count: text.split_whitespace().count(),
            text,
            composite_score: 7.0,
            polarity: Polarity::Mixed,
            themes: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Completes immediately, echoing the request title into the text.
    struct EchoPipeline;

    #[async_trait]
    impl ReviewPipeline for EchoPipeline {
        async fn run(&self, request: &ReviewRequest) -> Result<ReviewResult, ReviewError> {
            Ok(result_for(&request.title))
        }
    }

    /// Blocks until the gate hands out a permit, then completes.
    struct GatedPipeline {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ReviewPipeline for GatedPipeline {
        async fn run(&self, request: &ReviewRequest) -> Result<ReviewResult, ReviewError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| ReviewError::upstream("gate closed"))?;
            // consume the permit: each added permit releases exactly one run
            permit.forget();
            Ok(result_for(&request.title))
        }
    }

    struct FailingPipeline {
        err: ReviewError,
    }

    #[async_trait]
    impl ReviewPipeline for FailingPipeline {
        async fn run(&self, _request: &ReviewRequest) -> Result<ReviewResult, ReviewError> {
            Err(self.err.clone())
        }
    }

    async fn wait_for(manager: &TaskManager, id: Uuid, state: TaskState) {
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(5);
        loop {
            if manager.status(id).await.unwrap() == state {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("task {id} never reached {state:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn submit_returns_unique_ids_and_queued_tasks_stay_pending() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = TaskManager::new(Arc::new(GatedPipeline { gate: gate.clone() }), 1);

        let first = manager.submit(request_for("First")).await.unwrap();
        wait_for(&manager, first, TaskState::Running).await;

        // the single worker permit is held, so a second submission must
        // sit in Pending
        let second = manager.submit(request_for("Second")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.status(second).await.unwrap(), TaskState::Pending);

        gate.add_permits(2);
        wait_for(&manager, first, TaskState::Done).await;
        wait_for(&manager, second, TaskState::Done).await;
    }

    #[tokio::test]
    async fn submit_rejects_invalid_requests_without_registering() {
        let manager = TaskManager::new(Arc::new(EchoPipeline), 1);
        let err = manager.submit(request_for("   ")).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn unknown_ids_yield_task_not_found_for_status_and_result() {
        let manager = TaskManager::new(Arc::new(EchoPipeline), 1);
        let id = Uuid::new_v4();
        assert_eq!(
            manager.status(id).await.unwrap_err().kind(),
            "task_not_found"
        );
        assert_eq!(
            manager.result(id).await.unwrap_err().kind(),
            "task_not_found"
        );
    }

    #[tokio::test]
    async fn result_before_completion_is_not_ready() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = TaskManager::new(Arc::new(GatedPipeline { gate: gate.clone() }), 1);

        let id = manager.submit(request_for("Slow Movie")).await.unwrap();
        assert_eq!(manager.result(id).await.unwrap_err().kind(), "not_ready");

        wait_for(&manager, id, TaskState::Running).await;
        assert_eq!(manager.result(id).await.unwrap_err().kind(), "not_ready");

        gate.add_permits(1);
        wait_for(&manager, id, TaskState::Done).await;
        assert!(manager.result(id).await.is_ok());
    }

    #[tokio::test]
    async fn failed_tasks_capture_and_replay_the_stage_error() {
        let manager = TaskManager::new(
            Arc::new(FailingPipeline {
                err: ReviewError::NotFound("Ghost Film".into()),
            }),
            1,
        );

        let id = manager.submit(request_for("Ghost Film")).await.unwrap();
        wait_for(&manager, id, TaskState::Failed).await;

        let err = manager.result(id).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("Ghost Film"));

        // terminal state is monotonic
        for _ in 0..3 {
            assert_eq!(manager.status(id).await.unwrap(), TaskState::Failed);
        }
    }

    #[tokio::test]
    async fn done_results_are_idempotent() {
        let manager = TaskManager::new(Arc::new(EchoPipeline), 2);
        let id = manager.submit(request_for("Stable Movie")).await.unwrap();
        wait_for(&manager, id, TaskState::Done).await;

        let first = manager.result(id).await.unwrap();
        let second = manager.result(id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_tasks_do_not_interfere() {
        let manager = TaskManager::new(Arc::new(EchoPipeline), 4);
        let titles = ["Alpha", "Beta", "Gamma", "Delta", "Epsilon"];

        let mut ids = Vec::new();
        for title in titles {
            ids.push((title, manager.submit(request_for(title)).await.unwrap()));
        }

        for (title, id) in ids {
            wait_for(&manager, id, TaskState::Done).await;
            let result = manager.result(id).await.unwrap();
            assert_eq!(result.text, format!("review of {title}"));
        }
    }

    #[tokio::test]
    async fn prune_removes_only_aged_terminal_tasks() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = TaskManager::new(Arc::new(GatedPipeline { gate: gate.clone() }), 2);

        let done_id = manager.submit(request_for("Finished")).await.unwrap();
        gate.add_permits(1);
        wait_for(&manager, done_id, TaskState::Done).await;

        let running_id = manager.submit(request_for("In Flight")).await.unwrap();
        wait_for(&manager, running_id, TaskState::Running).await;

        // a cutoff in the future ages out every terminal entry but must
        // leave in-flight work alone
        let removed = manager
            .prune_terminal(Utc::now() + ChronoDuration::hours(1))
            .await;
        assert_eq!(removed, 1);
        assert_eq!(
            manager.status(done_id).await.unwrap_err().kind(),
            "task_not_found"
        );
        assert_eq!(
            manager.status(running_id).await.unwrap(),
            TaskState::Running
        );

        gate.add_permits(1);
        wait_for(&manager, running_id, TaskState::Done).await;
    }
}
