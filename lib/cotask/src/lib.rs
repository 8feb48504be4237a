//! A cooperative, single-threaded, priority-time task scheduler.
//!
//! Tasks are ordered by a min-heap keyed on their next-run timestamp.
//! A task may instead wait on a named event ("flag"); such tasks live in
//! a per-flag waitlist rather than the heap until the event fires, at
//! which point they're marked triggered and pushed onto the heap for the
//! next loop iteration to pick up.
//!
//! This crate has no opinion on what `M` (a task's parameter payload) is:
//! pick a unit type, a tuple, or an enum, the way a `Multitimer<E>`
//! instance picks its own timer-enum type. Every job registered with one
//! `Scheduler` takes the same `M`.
//!
//! No thread safety, no preemption: jobs run to completion on whatever
//! thread calls [`Scheduler::start`].

#![no_std]

extern crate alloc;

mod heap;
mod job;
mod scheduler;
mod task;

pub use job::{Job, JobFault};
pub use scheduler::{ScheduleError, Scheduler, SchedulerConfig};
pub use task::TaskStatus;

/// Identifies a task registered with a [`Scheduler`]. Valid ids are
/// `1..=1_000_000`; `TaskId(0)` is never stored, and is reserved at call
/// sites to mean "the currently-executing task."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    /// Sentinel accepted by every scheduler method that takes a `task_id`:
    /// resolves to the id of the task currently executing.
    pub const CURRENT: TaskId = TaskId(0);

    /// The raw numeric id, for display/logging purposes.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
