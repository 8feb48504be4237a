use alloc::collections::{BTreeMap, BinaryHeap};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::min;
use core::fmt;

use hostio::{ticks_diff, Clock, Runtime, Sink, Sleep};
use unwrap_lite::UnwrapLite;

use crate::heap::HeapEntry;
use crate::job::Job;
use crate::task::{Task, TaskStatus};
use crate::TaskId;

/// Failure at scheduler construction or task-id allocation time. Unlike an
/// ordinary `do`/`at`/`repeat`/`on` admission failure (logged and reported
/// as `Ok(None)`), both of these indicate the caller asked for something
/// the scheduler structurally cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    InvalidMaxTasks,
    NoFreeTaskId,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InvalidMaxTasks => f.write_str("max_tasks must be a positive integer"),
            ScheduleError::NoFreeTaskId => f.write_str("no free task identifier available"),
        }
    }
}

/// Tunables for a [`Scheduler`], beyond the task capacity every scheduler
/// already needs.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_tasks: u32,
    pub cleanup_interval_ms: u32,
    pub heap_compact_interval_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks: 256,
            cleanup_interval_ms: 10_000,
            heap_compact_interval_ms: 60_000,
        }
    }
}

/// A cooperative scheduler over jobs taking a shared parameter type `M`.
///
/// Task state lives in `tasks`, keyed by the raw numeric id. `heap` and
/// `flags` only ever reference a task by [`TaskId`]; a popped or triggered
/// entry whose task has since been cancelled or reassigned is discarded
/// rather than trusted.
pub struct Scheduler<M, R: Runtime> {
    rt: R,
    tasks: BTreeMap<u32, Task<M>>,
    heap: BinaryHeap<HeapEntry>,
    flags: BTreeMap<String, Vec<TaskId>>,
    task_counter: u32,
    seq_counter: u64,
    running: bool,
    current_tid: Option<TaskId>,
    config: SchedulerConfig,
    last_cleanup: u32,
    last_heap_compact: u32,
}

impl<M: Clone, R: Runtime> Scheduler<M, R> {
    pub fn new(config: SchedulerConfig, rt: R) -> Result<Self, ScheduleError> {
        if config.max_tasks < 1 {
            return Err(ScheduleError::InvalidMaxTasks);
        }
        let now = rt.now_ms();
        Ok(Self {
            rt,
            tasks: BTreeMap::new(),
            heap: BinaryHeap::new(),
            flags: BTreeMap::new(),
            task_counter: 0,
            seq_counter: 0,
            running: false,
            current_tid: None,
            config,
            last_cleanup: now,
            last_heap_compact: now,
        })
    }

    /// Resolves `task_id`, treating [`TaskId::CURRENT`] as "whichever task
    /// is running right now." Returns `None` if `task_id` is `CURRENT` and
    /// no task is currently executing.
    fn resolve(&self, task_id: TaskId) -> Option<TaskId> {
        if task_id == TaskId::CURRENT {
            self.current_tid
        } else {
            Some(task_id)
        }
    }

    fn generate_task_id(&mut self) -> Result<u32, ScheduleError> {
        let mut attempts = 100;
        while attempts > 0 {
            self.task_counter = (self.task_counter % 1_000_000) + 1;
            if !self.tasks.contains_key(&self.task_counter) {
                return Ok(self.task_counter);
            }
            attempts -= 1;
        }
        Err(ScheduleError::NoFreeTaskId)
    }

    /// Drops cancelled tasks and prunes cancelled entries out of flag
    /// waitlists, at most once per [`SchedulerConfig::cleanup_interval_ms`].
    fn cleanup_lazy(&mut self) {
        let now = self.rt.now_ms();
        if ticks_diff(now, self.last_cleanup) < self.config.cleanup_interval_ms as i32 {
            return;
        }
        self.last_cleanup = now;

        let tasks = &self.tasks;
        for ids in self.flags.values_mut() {
            ids.retain(|id| tasks.get(&id.0).map(|t| !t.cancelled).unwrap_or(false));
        }
        self.flags.retain(|_, ids| !ids.is_empty());
        self.tasks.retain(|_, t| !t.cancelled);
    }

    /// Rebuilds the heap with cancelled entries dropped, at most once per
    /// [`SchedulerConfig::heap_compact_interval_ms`]. A stale heap is
    /// otherwise harmless; this just bounds how large it can grow.
    fn compact_heap(&mut self) {
        let now = self.rt.now_ms();
        if ticks_diff(now, self.last_heap_compact) < self.config.heap_compact_interval_ms as i32 {
            return;
        }
        self.last_heap_compact = now;

        let tasks = &self.tasks;
        let alive: BinaryHeap<HeapEntry> = self
            .heap
            .drain()
            .filter(|e| tasks.get(&e.task_id.0).map(|t| !t.cancelled).unwrap_or(false))
            .collect();
        self.heap = alive;
    }

    /// A snapshot of `task_id`'s fields, or `None` if it doesn't name a
    /// live task.
    pub fn status(&self, task_id: TaskId) -> Option<TaskStatus<M>> {
        let resolved = self.resolve(task_id)?;
        self.tasks.get(&resolved.0).map(Task::status)
    }

    /// Replaces `task_id`'s stored parameters. Returns `false` if
    /// `task_id` doesn't name a live task.
    pub fn send(&mut self, task_id: TaskId, pkg: M) -> bool {
        match self.resolve(task_id).and_then(|id| self.tasks.get_mut(&id.0)) {
            Some(task) => {
                task.params = pkg;
                true
            }
            None => false,
        }
    }

    /// Wakes every non-cancelled, not-already-triggered task waiting on
    /// `flag`, sets its parameters to `pkg`, and pushes it onto the heap
    /// for immediate execution. Returns how many tasks were woken.
    ///
    /// A woken task with `repeat == 0` leaves the waitlist for good; one
    /// with `repeat > 0` stays registered so it can be triggered again
    /// once it finishes running (see [`Scheduler::await_event`]).
    pub fn trigger_event(&mut self, flag: &str, pkg: M) -> u32 {
        let ids = match self.flags.get(flag) {
            Some(v) => v.clone(),
            None => return 0,
        };
        let now = self.rt.now_ms();
        let mut triggered = 0u32;
        let mut kept = Vec::new();

        for id in ids {
            let mut fire = false;
            let mut still_waiting = false;
            match self.tasks.get_mut(&id.0) {
                Some(task) if task.cancelled => {}
                Some(task) if task.event_triggered => {
                    still_waiting = true;
                }
                Some(task) => {
                    task.event_triggered = true;
                    task.params = pkg.clone();
                    task.next_run = now;
                    fire = true;
                    if task.repeat == 0 {
                        task.flag = None;
                    } else {
                        still_waiting = true;
                    }
                }
                None => {}
            }
            if fire {
                self.seq_counter += 1;
                self.heap.push(HeapEntry {
                    next_run: now,
                    seq: self.seq_counter,
                    task_id: id,
                });
                triggered += 1;
            }
            if still_waiting {
                kept.push(id);
            }
        }

        if kept.is_empty() {
            self.flags.remove(flag);
        } else {
            self.flags.insert(String::from(flag), kept);
        }
        triggered
    }

    /// Moves `task_id` onto `flag`'s waitlist. Forces `repeat = 1`: a task
    /// that awaits an event is, by construction, meant to survive being
    /// triggered rather than being reaped from the registry afterward. The
    /// one spurious heap reschedule this causes the first time it's woken
    /// is self-correcting — the main loop discards a popped entry whose
    /// task is flagged and not yet triggered.
    pub fn await_event(&mut self, task_id: TaskId, flag: &str) -> bool {
        let Some(resolved) = self.resolve(task_id) else {
            return false;
        };
        match self.tasks.get_mut(&resolved.0) {
            Some(task) => {
                task.flag = Some(String::from(flag));
                task.event_triggered = false;
                task.repeat = 1;
                self.flags
                    .entry(String::from(flag))
                    .or_insert_with(Vec::new)
                    .push(resolved);
                true
            }
            None => false,
        }
    }

    pub fn set_repeat(&mut self, task_id: TaskId, repeat_interval: u32) -> bool {
        match self.resolve(task_id).and_then(|id| self.tasks.get_mut(&id.0)) {
            Some(task) => {
                task.repeat = repeat_interval;
                true
            }
            None => false,
        }
    }

    pub fn current_task_id(&self) -> Option<TaskId> {
        self.current_tid
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.heap.len()
    }

    #[allow(clippy::too_many_arguments)]
    fn schedule_task(
        &mut self,
        job: Job<M>,
        params: M,
        delay: u32,
        repeat: u32,
        wait_for: Option<&str>,
        task_id: TaskId,
    ) -> Result<Option<TaskId>, ScheduleError> {
        if self.tasks.len() as u32 >= self.config.max_tasks {
            hostio::diag!(self.rt, "maximum task limit reached");
            return Ok(None);
        }

        let requested = task_id.get() != 0 && !self.tasks.contains_key(&task_id.get());
        let id = if requested {
            task_id.get()
        } else {
            self.generate_task_id()?
        };

        let now = self.rt.now_ms();
        let tid = TaskId(id);
        let task = Task {
            id: tid,
            job,
            params,
            delay,
            repeat,
            flag: wait_for.map(String::from),
            next_run: now.wrapping_add(delay),
            cancelled: false,
            event_triggered: false,
        };
        self.tasks.insert(id, task);

        if let Some(flag) = wait_for {
            self.flags.entry(String::from(flag)).or_insert_with(Vec::new).push(tid);
        } else {
            self.seq_counter += 1;
            self.heap.push(HeapEntry {
                next_run: now.wrapping_add(delay),
                seq: self.seq_counter,
                task_id: tid,
            });
        }
        Ok(Some(tid))
    }

    /// Schedules `job` to run on the next loop iteration.
    pub fn do_now(&mut self, job: Job<M>, params: M, task_id: TaskId) -> Result<Option<TaskId>, ScheduleError> {
        self.schedule_task(job, params, 0, 0, None, task_id)
    }

    /// Schedules `job` to run `at_ms` from now, once.
    pub fn at(&mut self, job: Job<M>, params: M, at_ms: u32, task_id: TaskId) -> Result<Option<TaskId>, ScheduleError> {
        self.schedule_task(job, params, at_ms, 0, None, task_id)
    }

    /// Schedules `job` to first run `at_ms` from now, then every `every_ms`
    /// thereafter. Rejects a non-positive `every_ms`.
    pub fn repeat(
        &mut self,
        job: Job<M>,
        params: M,
        at_ms: u32,
        every_ms: u32,
        task_id: TaskId,
    ) -> Result<Option<TaskId>, ScheduleError> {
        if every_ms == 0 {
            hostio::diag!(self.rt, "repeat interval must be positive");
            return Ok(None);
        }
        self.schedule_task(job, params, at_ms, every_ms, None, task_id)
    }

    /// Schedules `job` to run when `when` is next triggered (after an
    /// initial `at_ms` delay is satisfied, if given). If `repeat` is true
    /// the task re-arms itself after each run, the way [`Scheduler::await_event`]
    /// does for a task waiting on itself.
    pub fn on(
        &mut self,
        job: Job<M>,
        params: M,
        when: &str,
        at_ms: u32,
        repeat: bool,
        task_id: TaskId,
    ) -> Result<Option<TaskId>, ScheduleError> {
        let repeat_val = u32::from(repeat);
        self.schedule_task(job, params, at_ms, repeat_val, Some(when), task_id)
    }

    /// Marks `task_id` cancelled and removes it from any flag waitlist.
    /// `TaskId::CURRENT` resolves to the running task, consistently with
    /// every other method here — a deliberate generalization of the
    /// original's behavior, which special-cased `cancel` to not accept it.
    pub fn cancel(&mut self, task_id: TaskId) -> bool {
        let Some(resolved) = self.resolve(task_id) else {
            return false;
        };
        let flag = match self.tasks.get_mut(&resolved.0) {
            Some(task) => {
                task.cancelled = true;
                task.flag.clone()
            }
            None => return false,
        };
        if let Some(flag_name) = flag {
            if let Some(list) = self.flags.get_mut(&flag_name) {
                list.retain(|&id| id != resolved);
                if list.is_empty() {
                    self.flags.remove(&flag_name);
                }
            }
        }
        true
    }

    pub fn abort_current_task(&mut self) -> bool {
        match self.current_tid {
            Some(tid) => self.cancel(tid),
            None => false,
        }
    }

    /// Stops [`Scheduler::start`] after its current iteration and clears
    /// every task, heap entry, and waitlist.
    pub fn stop(&mut self) {
        self.running = false;
        self.heap.clear();
        self.tasks.clear();
        self.flags.clear();
    }

    /// Runs the scheduler loop until [`Scheduler::stop`] is called, until a
    /// task cancels itself as the last task standing, or forever.
    pub fn start(&mut self) {
        self.running = true;
        while self.running {
            self.tick();
        }
        self.running = false;
    }

    /// One iteration of the main loop: lazily cleans up cancelled tasks,
    /// lazily compacts the heap, peeks the earliest-due entry, discards it
    /// if stale (cancelled, or flagged-but-not-yet-triggered), sleeps if
    /// it isn't due yet, otherwise pops and runs it, then reschedules it
    /// if it repeats or drops it from the registry. Split out of
    /// [`Scheduler::start`] so a single pass can be driven directly in
    /// tests without relying on `Sleep` to make progress.
    fn tick(&mut self) {
        self.cleanup_lazy();
        self.compact_heap();

        let entry = match self.heap.peek() {
            Some(e) => *e,
            None => {
                self.rt.sleep_ms(100);
                return;
            }
        };

        let stale = match self.tasks.get(&entry.task_id.0) {
            None => true,
            Some(task) => task.cancelled || (task.flag.is_some() && !task.event_triggered),
        };
        if stale {
            self.heap.pop();
            return;
        }

        let now = self.rt.now_ms();
        let wait_time = ticks_diff(entry.next_run, now);
        if wait_time > 0 {
            self.rt.sleep_ms(min(wait_time as u32, 100));
            return;
        }

        self.heap.pop();
        self.current_tid = Some(entry.task_id);

        let result = {
            let task = self.tasks.get_mut(&entry.task_id.0).unwrap_lite();
            let params = task.params.clone();
            task.job.call(params)
        };
        if let Err(fault) = result {
            hostio::diag!(self.rt, "task {} execution error: {}", entry.task_id, fault);
        }

        let (repeat, cancelled, flag) = {
            let task = self.tasks.get(&entry.task_id.0).unwrap_lite();
            (task.repeat, task.cancelled, task.flag.clone())
        };

        if repeat > 0 && !cancelled {
            let next_run = now.wrapping_add(repeat);
            if let Some(task) = self.tasks.get_mut(&entry.task_id.0) {
                task.next_run = next_run;
            }
            self.seq_counter += 1;
            self.heap.push(HeapEntry {
                next_run,
                seq: self.seq_counter,
                task_id: entry.task_id,
            });
        } else {
            self.tasks.remove(&entry.task_id.0);
            if self.tasks.is_empty() {
                self.running = false;
            }
        }

        if let Some(flag_name) = flag {
            if let Some(task) = self.tasks.get_mut(&entry.task_id.0) {
                task.event_triggered = false;
            }
            if repeat == 0 || cancelled {
                if let Some(list) = self.flags.get_mut(&flag_name) {
                    list.retain(|&id| id != entry.task_id);
                    if list.is_empty() {
                        self.flags.remove(&flag_name);
                    }
                }
                if let Some(task) = self.tasks.get_mut(&entry.task_id.0) {
                    task.flag = None;
                }
            }
        }

        self.current_tid = None;
    }
}
