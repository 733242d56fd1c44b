//! Scheduled task store
//!
//! This module provides a centralized store for scheduled task records.

use super::{ScheduleError, ScheduleResult, ScheduledTask, TaskState};
use crate::client::UserId;
use dashmap::DashMap;
use std::sync::Arc;

/// Store for scheduled task records
#[derive(Clone, Default)]
pub struct TaskStore {
    /// Single map containing all tasks
    records: Arc<DashMap<String, ScheduledTask>>,
}

impl TaskStore {
    /// Create a new task store
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    /// Add a new task record
    pub fn add(&self, task: ScheduledTask) {
        let id = task.id.clone();
        self.records.insert(id, task);
    }

    /// Get a task record by ID
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ScheduledTask> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a task record by ID
    pub fn remove(&self, id: &str) -> Option<ScheduledTask> {
        self.records.remove(id).map(|(_, task)| task)
    }

    /// Get all task records
    #[must_use]
    pub fn get_all(&self) -> Vec<ScheduledTask> {
        self.records.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of records currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get pending tasks that are due for execution
    #[must_use]
    pub fn due_for_execution(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|entry| {
                let task = entry.value();
                if task.is_due() {
                    Some(task.id.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Fire a task by ID, transitioning it to Fired
    ///
    /// # Errors
    /// Returns an error if the task does not exist or is not Pending
    pub fn fire_task(&self, id: &str) -> ScheduleResult<ScheduledTask> {
        if let Some(mut task) = self.records.get_mut(id) {
            task.fire()?;
            Ok(task.clone())
        } else {
            Err(ScheduleError::NotFound(id.to_string()))
        }
    }

    /// Cancel a task by ID and remove it from the store
    ///
    /// # Errors
    /// Returns an error if the task does not exist or is not Pending
    pub fn cancel_task(&self, id: &str) -> ScheduleResult<ScheduledTask> {
        {
            let Some(mut task) = self.records.get_mut(id) else {
                return Err(ScheduleError::NotFound(id.to_string()));
            };
            task.cancel()?;
        }

        self.remove(id).ok_or_else(|| ScheduleError::NotFound(id.to_string()))
    }

    /// Cancel all pending tasks targeting a user
    pub fn cancel_all_for_user(&self, user_id: UserId) -> Vec<ScheduledTask> {
        let ids: Vec<String> = self
            .records
            .iter()
            .filter_map(|entry| {
                let task = entry.value();
                if task.action.user_id() == Some(user_id) && task.state == TaskState::Pending {
                    Some(task.id.clone())
                } else {
                    None
                }
            })
            .collect();

        let mut cancelled = Vec::new();
        for id in ids {
            if let Ok(task) = self.cancel_task(&id) {
                cancelled.push(task);
            }
        }

        cancelled
    }
}
