use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInstance {
    pub task_type: String,
    pub params: Value,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub task_type: String,
    pub params: Value,
    pub state: Value,
    pub scope: Vec<String>,
    pub run_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("task manager error: {0}")]
    Manager(String),
}

/// Handle to the background task scheduler.
pub trait TaskManager: Send + Sync {
    fn schedule(&self, task: TaskInstance) -> Result<ScheduledTask, TaskError>;
    fn remove(&self, id: &str) -> Result<(), TaskError>;
    fn get(&self, id: &str) -> Result<ScheduledTask, TaskError>;
}

#[derive(Clone, Default)]
pub struct InMemoryTaskManager {
    tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>,
}

impl InMemoryTaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn list(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().values().cloned().collect()
    }
}

impl TaskManager for InMemoryTaskManager {
    fn schedule(&self, task: TaskInstance) -> Result<ScheduledTask, TaskError> {
        let scheduled = ScheduledTask {
            id: Uuid::new_v4().to_string(),
            task_type: task.task_type,
            params: task.params,
            state: task.state,
            scope: task.scope,
            run_at: task.run_at.unwrap_or_else(Utc::now),
        };
        self.tasks
            .lock()
            .insert(scheduled.id.clone(), scheduled.clone());
        Ok(scheduled)
    }

    fn remove(&self, id: &str) -> Result<(), TaskError> {
        self.tasks
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    fn get(&self, id: &str) -> Result<ScheduledTask, TaskError> {
        self.tasks
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }
}
