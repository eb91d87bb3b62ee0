//! Staged tasks: multi-step gameplay work resumed on later ticks.
//!
//! A task is an explicit state machine. Each call to [`StagedTask::step`]
//! runs one stage and says when to run the next. If the task has an owner
//! entity, the registry checks that the owner is still alive before every
//! stage and drops the task otherwise; a destroyed owner is the only form of
//! cancellation.

use crate::entity::Entity;
use crate::registry::Registry;

/// What a task wants after running one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskStep {
    /// Run the next stage after this many seconds of simulation time.
    Wait(f64),
    /// The task is finished.
    Done,
}

/// Multi-step work driven by the simulation tick.
pub trait StagedTask {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Entity whose lifetime bounds the task.
    fn owner(&self) -> Option<Entity> {
        None
    }

    /// Run one stage.
    fn step(&mut self, registry: &mut Registry) -> TaskStep;
}

pub(crate) struct ScheduledTask {
    pub(crate) task: Box<dyn StagedTask>,
    pub(crate) resume_at: f64,
}

/// Pending tasks ordered by submission.
#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: Vec<ScheduledTask>,
}

impl TaskQueue {
    pub(crate) fn push(&mut self, task: Box<dyn StagedTask>, resume_at: f64) {
        self.tasks.push(ScheduledTask { task, resume_at });
    }

    /// Remove and return every task due at `now`, oldest first.
    pub(crate) fn take_due(&mut self, now: f64) -> Vec<ScheduledTask> {
        let (due, pending) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.resume_at <= now);
        self.tasks = pending;
        due
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
    }
}
