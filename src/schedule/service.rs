//! Scheduler service
//!
//! This module provides the service that fires scheduled tasks once their
//! due time has passed.

use super::{DelayedAction, ScheduleResult, ScheduledTask, TaskStore};
use crate::SCHEDULER_TARGET;
use crate::client::UserId;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{error, info, warn};

/// Request type for the scheduler task
#[derive(Debug, Clone)]
pub enum SchedulerRequest {
    /// Fire every task that is currently due
    CheckAll,
    /// Fire a specific task if it is due
    CheckTask { task_id: String },
    /// Shut down the scheduler task
    Shutdown,
}

/// Executor for due actions, implemented by the moderation pipeline
///
/// A failed execution is logged by the scheduler and the task is consumed
/// either way; it is never retried.
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute a due action
    async fn execute(&self, action: &DelayedAction) -> ScheduleResult<()>;
}

/// Service for one-shot delayed actions
#[derive(Clone)]
pub struct Scheduler {
    /// Store for task records
    pub store: TaskStore,
    /// Sender for scheduler requests
    tx: Sender<SchedulerRequest>,
    /// Receiver handed to the background task on spawn
    rx: Arc<Mutex<Option<Receiver<SchedulerRequest>>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a new scheduler
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<SchedulerRequest>(100);

        Self {
            store: TaskStore::new(),
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Schedule a one-shot action `delay` from now, returning the task ID
    pub fn schedule_once(&self, delay: Duration, action: DelayedAction) -> String {
        let task = ScheduledTask::new(delay, action);
        let id = task.id.clone();

        info!(
            target: SCHEDULER_TARGET,
            task_id = %id,
            kind = %task.action.kind(),
            due_at = %task.due_at,
            "Scheduled delayed action"
        );

        self.store.add(task);
        id
    }

    /// Cancel a pending task by ID
    ///
    /// # Errors
    /// Returns an error if the task does not exist or has already fired
    pub fn cancel(&self, task_id: &str) -> ScheduleResult<ScheduledTask> {
        self.store.cancel_task(task_id)
    }

    /// Cancel all pending tasks targeting a user
    pub fn cancel_all_for_user(&self, user_id: UserId) -> Vec<ScheduledTask> {
        self.store.cancel_all_for_user(user_id)
    }

    /// Fire every task that is currently due, in no particular order
    pub async fn run_due(&self, executor: &dyn ActionExecutor) {
        for task_id in self.store.due_for_execution() {
            self.fire(executor, &task_id).await;
        }
    }

    /// Fire a single task through the executor and consume its record
    async fn fire(&self, executor: &dyn ActionExecutor, task_id: &str) {
        let task = match self.store.fire_task(task_id) {
            Ok(task) => task,
            Err(e) => {
                // Lost the race against another firing or a cancellation
                warn!(
                    target: SCHEDULER_TARGET,
                    task_id = %task_id,
                    error = %e,
                    "Skipping task"
                );
                return;
            }
        };

        if let Err(e) = executor.execute(&task.action).await {
            error!(
                target: SCHEDULER_TARGET,
                task_id = %task_id,
                kind = %task.action.kind(),
                error = %e,
                "Delayed action failed"
            );
        }

        // Consumed whether it succeeded or not
        self.store.remove(task_id);
    }

    /// Spawn the background task that fires due actions
    ///
    /// The task is driven by a periodic tick plus explicit requests sent
    /// through the scheduler channel. Spawning twice is a no-op.
    pub fn spawn(&self, executor: Arc<dyn ActionExecutor>, tick_interval: Duration) {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        let Some(rx) = rx else {
            warn!(target: SCHEDULER_TARGET, "Scheduler task already running");
            return;
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run(executor, rx, tick_interval).await;
        });
    }

    /// Ask the background task to fire everything currently due
    pub async fn notify_check_all(&self) {
        if let Err(e) = self.tx.send(SchedulerRequest::CheckAll).await {
            error!(target: SCHEDULER_TARGET, error = %e, "Failed to send check-all request");
        }
    }

    /// Shut down the background task
    pub async fn shutdown(&self) {
        if let Err(e) = self.tx.send(SchedulerRequest::Shutdown).await {
            error!(target: SCHEDULER_TARGET, error = %e, "Failed to send shutdown request");
        }
    }

    /// The main scheduler loop
    async fn run(
        self,
        executor: Arc<dyn ActionExecutor>,
        mut rx: Receiver<SchedulerRequest>,
        tick_interval: Duration,
    ) {
        info!(
            target: SCHEDULER_TARGET,
            tick_ms = tick_interval.as_millis() as u64,
            "Scheduler task started"
        );

        let mut interval = tokio::time::interval(tick_interval);

        loop {
            tokio::select! {
                Some(request) = rx.recv() => {
                    match request {
                        SchedulerRequest::CheckAll => {
                            self.run_due(executor.as_ref()).await;
                        }
                        SchedulerRequest::CheckTask { task_id } => {
                            if self.store.get(&task_id).is_some_and(|t| t.is_due()) {
                                self.fire(executor.as_ref(), &task_id).await;
                            }
                        }
                        SchedulerRequest::Shutdown => {
                            info!(target: SCHEDULER_TARGET, "Received shutdown request");
                            break;
                        }
                    }
                }

                _ = interval.tick() => {
                    self.run_due(executor.as_ref()).await;
                }
            }
        }

        info!(target: SCHEDULER_TARGET, "Scheduler task shut down");
    }
}
