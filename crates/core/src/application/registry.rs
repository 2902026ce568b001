// Task Registry - single source of truth for task state
//
// Every mutation takes the write lock, applies the state machine in
// `domain::task` and publishes a `TaskEvent` before releasing the lock, so
// readers and subscribers never observe a partial update.

use crate::application::constants::TASK_EVENT_CHANNEL_CAPACITY;
use crate::domain::{DomainError, Task, TaskId, TaskType};
use crate::port::{IdProvider, TimeProvider};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// Change signal for observers (create / update / remove)
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Created(Task),
    Updated(Task),
    Removed(TaskId),
}

#[derive(Default)]
struct Inner {
    /// Insertion order for rendering
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
}

/// In-memory task registry, injected wherever tasks are read or written
pub struct TaskRegistry {
    inner: RwLock<Inner>,
    events: broadcast::Sender<TaskEvent>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TaskRegistry {
    pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        let (events, _) = broadcast::channel(TASK_EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
            id_provider,
            time_provider,
        }
    }

    // A panic while holding the lock cannot leave a task half-written: every
    // mutation is a single call into `Task`.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: TaskEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Allocate a new pending task
    pub fn create_task(&self, task_type: TaskType, description: impl Into<String>) -> TaskId {
        let id = self.id_provider.generate_id();
        let task = Task::new(
            id.clone(),
            self.time_provider.now_millis(),
            task_type,
            description,
        );

        let mut inner = self.write();
        inner.order.push(id.clone());
        inner.tasks.insert(id.clone(), task.clone());
        self.publish(TaskEvent::Created(task));

        debug!(task_id = %id, task_type = %task_type, "Task created");
        id
    }

    /// Apply `f` to a task; publish an update when it reports a change
    fn mutate<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Task, i64) -> bool,
    {
        let now = self.time_provider.now_millis();
        let mut inner = self.write();
        let Some(task) = inner.tasks.get_mut(id) else {
            return false;
        };
        if !f(task, now) {
            return false;
        }
        let snapshot = task.clone();
        self.publish(TaskEvent::Updated(snapshot));
        true
    }

    /// Pending -> InProgress (worker began). No-op otherwise.
    pub fn start(&self, id: &str) -> bool {
        self.mutate(id, |task, now| task.start(now))
    }

    /// Monotonic, clamped progress update. No-op for unknown or terminal tasks.
    pub fn update_progress(&self, id: &str, percent: f64) -> bool {
        self.mutate(id, |task, now| task.update_progress(percent, now))
    }

    /// Idempotent; returns true only for the call that made the transition
    pub fn complete(&self, id: &str) -> bool {
        let changed = self.mutate(id, |task, now| task.complete(now));
        if changed {
            debug!(task_id = %id, "Task completed");
        }
        changed
    }

    /// Idempotent; returns true only for the call that made the transition
    pub fn fail(&self, id: &str) -> bool {
        self.mutate(id, |task, now| task.fail(now, None))
    }

    pub fn fail_with_reason(&self, id: &str, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.mutate(id, |task, now| task.fail(now, Some(reason)))
    }

    /// Discard a terminal task
    ///
    /// # Errors
    /// - DomainError::TaskNotFound for unknown ids
    /// - DomainError::TaskStillRunning for pending / in-progress tasks
    pub fn remove(&self, id: &str) -> Result<Task, DomainError> {
        let mut inner = self.write();
        match inner.tasks.get(id) {
            None => return Err(DomainError::TaskNotFound(id.to_string())),
            Some(task) if !task.is_terminal() => {
                return Err(DomainError::TaskStillRunning(id.to_string()))
            }
            Some(_) => {}
        }

        inner.order.retain(|existing| existing != id);
        let removed = inner
            .tasks
            .remove(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
        self.publish(TaskEvent::Removed(removed.id.clone()));
        Ok(removed)
    }

    /// Discard every terminal task, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let mut inner = self.write();
        let finished: Vec<TaskId> = inner
            .order
            .iter()
            .filter(|id| inner.tasks.get(*id).is_some_and(Task::is_terminal))
            .cloned()
            .collect();

        for id in &finished {
            inner.tasks.remove(id);
            self.publish(TaskEvent::Removed(id.clone()));
        }
        inner.order.retain(|id| !finished.contains(id));
        finished.len()
    }

    /// Snapshot of all tasks in insertion order
    pub fn list(&self) -> Vec<Task> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.read().tasks.get(id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }
}
