//! Scheduled task records and state management
//!
//! This module defines the task record structure and the state machine that
//! guarantees each delayed action fires at most once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{DelayedAction, ScheduleError, ScheduleResult};
use crate::SCHEDULER_TARGET;

/// Lifecycle states of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for its due time
    #[default]
    Pending,
    /// Handed to the executor
    Fired,
    /// Cancelled before firing
    Cancelled,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Fired => write!(f, "Fired"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Record of a one-shot delayed action, owned by the scheduler from creation
/// until it fires or is cancelled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique ID of this task
    pub id: String,
    /// The action to execute
    pub action: DelayedAction,
    /// When the action becomes due
    pub due_at: DateTime<Utc>,
    /// Current state of the task
    pub state: TaskState,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the action was handed to the executor (if it has been)
    pub fired_at: Option<DateTime<Utc>>,
}

impl ScheduledTask {
    /// Create a new task due `delay` from now
    pub fn new(delay: std::time::Duration, action: DelayedAction) -> Self {
        let now = Utc::now();
        let delay = Duration::from_std(delay).unwrap_or(Duration::MAX);

        Self {
            id: Uuid::new_v4().to_string(),
            action,
            due_at: now + delay,
            state: TaskState::Pending,
            created_at: now,
            fired_at: None,
        }
    }

    /// Check if this task is due for execution
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.state == TaskState::Pending && self.due_at <= Utc::now()
    }

    /// Transition to Fired
    ///
    /// # Errors
    /// Returns an error if the task is not in the Pending state
    pub fn fire(&mut self) -> ScheduleResult<()> {
        if self.state != TaskState::Pending {
            return Err(ScheduleError::InvalidStateTransition);
        }

        self.state = TaskState::Fired;
        self.fired_at = Some(Utc::now());

        info!(
            target: SCHEDULER_TARGET,
            task_id = %self.id,
            kind = %self.action.kind(),
            "Delayed action fired"
        );

        Ok(())
    }

    /// Cancel this task, transitioning to Cancelled
    ///
    /// # Errors
    /// Returns an error if the task is not in the Pending state
    pub fn cancel(&mut self) -> ScheduleResult<()> {
        if self.state != TaskState::Pending {
            return Err(ScheduleError::InvalidStateTransition);
        }

        self.state = TaskState::Cancelled;

        info!(
            target: SCHEDULER_TARGET,
            task_id = %self.id,
            kind = %self.action.kind(),
            "Delayed action cancelled"
        );

        Ok(())
    }
}
