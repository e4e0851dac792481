/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler core.
//!
//! [`Kernel`] owns every task, queue and timer and decides, after each event,
//! which task holds the CPU.  Policy is preemptive fixed priority on one CPU:
//!
//! * the highest-priority Ready task always runs;
//! * a task that becomes Ready at a higher priority than the Running one takes
//!   the CPU immediately, and the preempted task rejoins the *back* of its
//!   level;
//! * equal priority never preempts, Ready tasks of one level run FIFO in the
//!   order they became Ready;
//! * the idle task runs only when the Ready Set is empty.
//!
//! # Tick processing
//!
//! ```text
//! tick()
//!   1. charge the elapsed tick to the Running task (or to idle)
//!   2. now += 1
//!   3. wake every delay entry with wake_tick <= now     (FIFO on ties)
//!   4. fire every timer with next_fire <= now           (posts may wake tasks)
//!   5. reschedule: dispatch / step bodies until the CPU owner is busy or idle
//!   6. check internal invariants
//! ```
//!
//! # Queue wake-ups
//!
//! A successful send wakes the oldest waiting receiver (and vice versa).  The
//! woken task does not receive the item directly: on dispatch it retries its
//! operation, because a higher-priority task may have taken the item first.
//! A failed retry before the deadline re-parks the task at the *front* of the
//! waiter list with its original deadline, so it does not lose its turn.
//!
//! # Split borrows
//!
//! Timers post into queues while the timer service is iterated, so all
//! queue / task / delay state lives in [`Core`] and the [`TimerService`] sits
//! next to it.  `Core` implements [`MessagePoster`] for the callbacks.

pub mod error;
pub mod trace;

pub use error::{CreationReason, KernelError};
pub use trace::{TraceEvent, TraceRecord};

use std::convert::Infallible;

use tracing::{debug, error, info, trace as trace_log, warn};

use crate::analysis;
use crate::console::ConsoleSink;
use crate::delay::DelayManager;
use crate::queue::{BoundedQueue, Direction, Message, QueueError, QueueId, Wait};
use crate::ready::ReadySet;
use crate::task::{
    Action, Pending, Resume, TaskBody, TaskContext, TaskControlBlock, TaskId, TaskSpec, TaskState,
    TaskStats, IDLE_TASK,
};
use crate::tick::{KernelEvent, Tick, TickSource};
use crate::timer::{
    MessagePoster, SoftwareTimer, TimerContext, TimerId, TimerService, TimerSpec,
};

use trace::TraceBuffer;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Static limits, fixed when the kernel is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Application tasks (the idle task is not counted).
    pub max_tasks: usize,
    pub max_queues: usize,
    pub max_timers: usize,
    /// Trace ring size; 0 disables tracing.
    pub trace_capacity: usize,
    /// Zero-time body steps allowed in one scheduling pass, summed over every
    /// task stepped in that pass.  A body that never blocks or works (or a
    /// group of tasks handing messages back and forth without consuming
    /// time) trips this instead of hanging the host.
    pub max_steps_per_tick: usize,
    /// Verify internal consistency after every tick.
    pub check_invariants: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_tasks: 16,
            max_queues: 8,
            max_timers: 8,
            trace_capacity: 1024,
            max_steps_per_tick: 1024,
            check_invariants: true,
        }
    }
}

/// Kernel-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub context_switches: u64,
    pub preemptions: u64,
    pub deadline_overruns: u64,
    pub queue_timeouts: u64,
    pub timer_fires: u64,
    pub timer_drops: u64,
}

// ── Core ──────────────────────────────────────────────────────────────────────

struct Core {
    now: Tick,
    /// Arena; index 0 is the idle task.
    tasks: Vec<TaskControlBlock>,
    ready: ReadySet,
    delays: DelayManager,
    queues: Vec<BoundedQueue>,
    trace: TraceBuffer,
    stats: KernelStats,
}

impl Core {
    fn new(trace_capacity: usize) -> Self {
        Self {
            now: 0,
            tasks: vec![TaskControlBlock::idle()],
            ready: ReadySet::new(),
            delays: DelayManager::new(),
            queues: Vec::new(),
            trace: TraceBuffer::new(trace_capacity),
            stats: KernelStats::default(),
        }
    }

    fn violation(&self, detail: impl Into<String>) -> KernelError {
        KernelError::InvariantViolation {
            tick: self.now,
            detail: detail.into(),
        }
    }

    fn make_ready(&mut self, task: TaskId) {
        let tcb = &mut self.tasks[task.0];
        tcb.state = TaskState::Ready;
        tcb.next_wake = None;
        let priority = tcb.priority();
        self.ready.push_back(task, priority);
    }

    /// Step 3 of tick processing.
    fn wake_due(&mut self) {
        for task in self.delays.due(self.now) {
            match self.tasks[task.0].state {
                TaskState::BlockedOnDelay => {
                    self.tasks[task.0].resume = Some(Resume::Delayed);
                }
                TaskState::BlockedOnQueue(queue) => {
                    // Deadline reached.  The retry on dispatch makes one last
                    // attempt and reports the timeout if that fails too.
                    if let Some(q) = self.queues.get_mut(queue.0) {
                        q.unpark(task);
                    }
                }
                state => {
                    warn!(task = %task, ?state, "delay entry for a task that is not blocked");
                    continue;
                }
            }
            self.trace.record(self.now, TraceEvent::Woken { task });
            self.make_ready(task);
        }
    }

    fn wake_oldest(&mut self, queue: QueueId, direction: Direction) {
        let Some(task) = self
            .queues
            .get_mut(queue.0)
            .and_then(|q| q.unpark_oldest(direction))
        else {
            return;
        };
        self.delays.cancel(task);
        debug!(task = %task, queue = %queue, ?direction, "queue waiter woken");
        self.make_ready(task);
    }

    fn try_send(&mut self, task: TaskId, queue: QueueId, message: Message) -> Result<(), QueueError> {
        let q = self
            .queues
            .get_mut(queue.0)
            .ok_or(QueueError::UnknownQueue(queue))?;
        q.try_push(message)?;
        self.trace.record(
            self.now,
            TraceEvent::Sent {
                task,
                queue,
                message,
            },
        );
        self.wake_oldest(queue, Direction::Receive);
        Ok(())
    }

    fn try_receive(&mut self, task: TaskId, queue: QueueId) -> Result<Message, QueueError> {
        let q = self
            .queues
            .get_mut(queue.0)
            .ok_or(QueueError::UnknownQueue(queue))?;
        let message = q.try_pop()?;
        self.trace.record(
            self.now,
            TraceEvent::Received {
                task,
                queue,
                message,
            },
        );
        self.wake_oldest(queue, Direction::Send);
        Ok(message)
    }

    /// `Some(resume)` if the task keeps running, `None` if it now sleeps.
    fn delay_until(&mut self, task: TaskId, wake_tick: Tick) -> Result<Option<Resume>, KernelError> {
        if wake_tick > self.now {
            self.delays.insert(task, wake_tick).map_err(|e| {
                self.violation(format!("{} already delayed until {}", e.task, e.wake_tick))
            })?;
            let tcb = &mut self.tasks[task.0];
            tcb.state = TaskState::BlockedOnDelay;
            tcb.next_wake = Some(wake_tick);
            self.trace.record(
                self.now,
                TraceEvent::Delayed {
                    task,
                    until: wake_tick,
                },
            );
            return Ok(None);
        }

        if wake_tick < self.now {
            self.tasks[task.0].stats.deadline_overruns += 1;
            self.stats.deadline_overruns += 1;
            self.trace.record(
                self.now,
                TraceEvent::DeadlineOverrun {
                    task,
                    deadline: wake_tick,
                },
            );
            warn!(
                task = %self.tasks[task.0].name(),
                deadline = wake_tick,
                now = self.now,
                "activation deadline already passed"
            );
        }
        Ok(Some(Resume::Delayed))
    }

    /// Try `pending`; on Full/Empty either park the task (deadline not yet
    /// reached) or report a timeout.  `retry` marks a woken task re-checking
    /// its operation, which re-parks at the front of the waiter list.
    fn attempt(
        &mut self,
        task: TaskId,
        pending: Pending,
        retry: bool,
    ) -> Result<Option<Resume>, KernelError> {
        let outcome = match pending {
            Pending::Send { queue, message, .. } => self
                .try_send(task, queue, message)
                .map(|()| Resume::Sent(Ok(()))),
            Pending::Receive { queue, .. } => self
                .try_receive(task, queue)
                .map(|m| Resume::Received(Ok(m))),
        };

        match outcome {
            Ok(resume) => Ok(Some(resume)),
            Err(QueueError::Full | QueueError::Empty)
                if pending.deadline().map_or(true, |d| self.now < d) =>
            {
                self.park(task, pending, retry)?;
                Ok(None)
            }
            Err(QueueError::Full | QueueError::Empty) => {
                self.time_out(task, pending);
                Ok(Some(pending.failed(QueueError::Timeout)))
            }
            Err(e) => Ok(Some(pending.failed(e))),
        }
    }

    fn park(&mut self, task: TaskId, pending: Pending, at_front: bool) -> Result<(), KernelError> {
        let queue = pending.queue();
        let q = self
            .queues
            .get_mut(queue.0)
            .ok_or(KernelError::UnknownQueue(queue))?;
        q.park(pending.direction(), task, at_front);

        if let Some(deadline) = pending.deadline() {
            self.delays.insert(task, deadline).map_err(|e| {
                self.violation(format!("{} already delayed until {}", e.task, e.wake_tick))
            })?;
        }

        let tcb = &mut self.tasks[task.0];
        tcb.state = TaskState::BlockedOnQueue(queue);
        tcb.pending = Some(pending);
        tcb.next_wake = pending.deadline();
        self.trace
            .record(self.now, TraceEvent::BlockedOnQueue { task, queue });
        Ok(())
    }

    fn time_out(&mut self, task: TaskId, pending: Pending) {
        let queue = pending.queue();
        if let Some(q) = self.queues.get_mut(queue.0) {
            q.record_timeout(pending.direction());
        }
        self.tasks[task.0].stats.queue_timeouts += 1;
        self.stats.queue_timeouts += 1;
        self.trace
            .record(self.now, TraceEvent::QueueTimeout { task, queue });
        warn!(
            task = %self.tasks[task.0].name(),
            queue = %queue,
            direction = ?pending.direction(),
            "queue operation timed out"
        );
    }
}

impl MessagePoster for Core {
    fn post(&mut self, queue: QueueId, message: Message) -> Result<(), QueueError> {
        let q = self
            .queues
            .get_mut(queue.0)
            .ok_or(QueueError::UnknownQueue(queue))?;
        q.try_push(message)?;
        self.wake_oldest(queue, Direction::Receive);
        Ok(())
    }
}

// ── Kernel ────────────────────────────────────────────────────────────────────

pub struct Kernel {
    config: KernelConfig,
    core: Core,
    timers: TimerService,
    console: Box<dyn ConsoleSink>,
    current: TaskId,
    started: bool,
}

impl Kernel {
    /// Empty kernel: only the idle task exists and it owns the CPU.
    pub fn new(config: KernelConfig, console: impl ConsoleSink + 'static) -> Self {
        Self {
            config,
            core: Core::new(config.trace_capacity),
            timers: TimerService::new(),
            console: Box::new(console),
            current: IDLE_TASK,
            started: false,
        }
    }

    // ── Creation (before start) ───────────────────────────────────────────────

    /// Register a task.  It becomes Ready and is first stepped with
    /// [`Resume::Start`] when the scheduler starts.
    pub fn create_task(
        &mut self,
        spec: TaskSpec,
        body: impl TaskBody + 'static,
    ) -> Result<TaskId, KernelError> {
        if self.started {
            return Err(KernelError::creation(&spec.name, CreationReason::SchedulerStarted));
        }
        let limit = self.config.max_tasks;
        if self.core.tasks.len() - 1 >= limit {
            return Err(KernelError::creation(
                &spec.name,
                CreationReason::TaskLimitReached { limit },
            ));
        }

        let id = TaskId(self.core.tasks.len());
        debug!(task = %spec.name, id = %id, priority = spec.priority, "task created");
        let priority = spec.priority;
        self.core
            .tasks
            .push(TaskControlBlock::new(spec, Box::new(body)));
        self.core.ready.push_back(id, priority);
        Ok(id)
    }

    pub fn create_queue(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
    ) -> Result<QueueId, KernelError> {
        let name = name.into();
        if self.started {
            return Err(KernelError::creation(&name, CreationReason::SchedulerStarted));
        }
        if capacity == 0 {
            return Err(KernelError::creation(&name, CreationReason::ZeroCapacity));
        }
        let limit = self.config.max_queues;
        if self.core.queues.len() >= limit {
            return Err(KernelError::creation(
                &name,
                CreationReason::QueueLimitReached { limit },
            ));
        }

        let id = QueueId(self.core.queues.len());
        debug!(queue = %name, id = %id, capacity = capacity, "queue created");
        self.core.queues.push(BoundedQueue::new(name, capacity));
        Ok(id)
    }

    /// Register a timer.  It is active from creation: first expiry one period
    /// after tick 0.
    pub fn create_timer(
        &mut self,
        spec: TimerSpec,
        callback: impl FnMut(&mut TimerContext<'_>) + Send + 'static,
    ) -> Result<TimerId, KernelError> {
        if self.started {
            return Err(KernelError::creation(&spec.name, CreationReason::SchedulerStarted));
        }
        if spec.period == 0 {
            return Err(KernelError::creation(&spec.name, CreationReason::ZeroPeriod));
        }
        let limit = self.config.max_timers;
        if self.timers.len() >= limit {
            return Err(KernelError::creation(
                &spec.name,
                CreationReason::TimerLimitReached { limit },
            ));
        }

        debug!(
            timer = %spec.name,
            period = spec.period,
            auto_reload = spec.auto_reload,
            "timer created"
        );
        let timer = SoftwareTimer::new(spec, Box::new(callback), self.core.now);
        Ok(self.timers.add(timer))
    }

    // ── Running ───────────────────────────────────────────────────────────────

    /// Fix the object set and run the first dispatch at tick 0.  Idempotent;
    /// `tick` and `run_*` call it implicitly.
    pub fn start(&mut self) -> Result<(), KernelError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.log_analysis();
        info!(
            tasks = self.core.tasks.len() - 1,
            queues = self.core.queues.len(),
            timers = self.timers.len(),
            "scheduler started"
        );
        self.reschedule()?;
        self.verify()
    }

    /// Process one tick period.
    pub fn tick(&mut self) -> Result<(), KernelError> {
        self.start()?;
        self.charge_tick();
        self.core.now += 1;
        self.core.stats.ticks += 1;

        self.core.wake_due();

        let now = self.core.now;
        for firing in self.timers.fire_due(now, &mut self.core) {
            self.core.stats.timer_fires += 1;
            self.core.stats.timer_drops += firing.dropped;
            self.core.trace.record(
                now,
                TraceEvent::TimerFired {
                    timer: firing.timer,
                    dropped: firing.dropped,
                },
            );
        }

        self.reschedule()?;
        self.verify()
    }

    /// Process `ticks` ticks back to back.
    pub fn run_for(&mut self, ticks: Tick) -> Result<(), KernelError> {
        self.start()?;
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Drive the kernel from `source` until something fatal happens.
    ///
    /// Events naming an unknown task or timer are logged and skipped.  A
    /// closed source is fatal: time must not stop.
    pub fn run_forever<S>(&mut self, source: &mut S) -> Result<Infallible, KernelError>
    where
        S: TickSource + ?Sized,
    {
        self.start()?;
        loop {
            let Some(event) = source.next_event() else {
                return Err(KernelError::TickSourceLost);
            };
            match self.handle_event(event) {
                Ok(()) => {}
                Err(
                    e @ (KernelError::UnknownTask(_)
                    | KernelError::UnknownTimer(_)
                    | KernelError::IdleNotSuspendable),
                ) => warn!(error = %e, ?event, "external event ignored"),
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply one external event.
    pub fn handle_event(&mut self, event: KernelEvent) -> Result<(), KernelError> {
        match event {
            KernelEvent::Tick => self.tick(),
            KernelEvent::ResetTimer(timer) => self.reset_timer(timer),
            KernelEvent::Suspend(task) => self.suspend_task(task),
            KernelEvent::Resume(task) => self.resume_task(task),
        }
    }

    // ── Task control ──────────────────────────────────────────────────────────

    /// Take `task` out of scheduling.  A blocked task leaves its delay entry
    /// and waiter list; on resume a delayed task continues as if its delay
    /// had elapsed, a queue waiter retries its operation.
    pub fn suspend_task(&mut self, task: TaskId) -> Result<(), KernelError> {
        if task == IDLE_TASK {
            return Err(KernelError::IdleNotSuspendable);
        }
        let tcb = self
            .core
            .tasks
            .get(task.0)
            .ok_or(KernelError::UnknownTask(task))?;
        let priority = tcb.priority();

        match tcb.state {
            TaskState::Suspended => return Ok(()),
            TaskState::Ready => {
                self.core.ready.remove(task, priority);
            }
            TaskState::Running => {}
            TaskState::BlockedOnDelay => {
                self.core.delays.cancel(task);
                self.core.tasks[task.0].resume = Some(Resume::Delayed);
            }
            TaskState::BlockedOnQueue(queue) => {
                self.core.delays.cancel(task);
                if let Some(q) = self.core.queues.get_mut(queue.0) {
                    q.unpark(task);
                }
            }
        }

        let tcb = &mut self.core.tasks[task.0];
        tcb.state = TaskState::Suspended;
        tcb.next_wake = None;
        info!(task = %tcb.name(), tick = self.core.now, "task suspended");
        self.core
            .trace
            .record(self.core.now, TraceEvent::Suspended { task });
        self.after_external_change()
    }

    /// Return a suspended task to the Ready Set.  No effect otherwise.
    pub fn resume_task(&mut self, task: TaskId) -> Result<(), KernelError> {
        let tcb = self
            .core
            .tasks
            .get(task.0)
            .ok_or(KernelError::UnknownTask(task))?;
        if tcb.state != TaskState::Suspended {
            return Ok(());
        }
        info!(task = %tcb.name(), tick = self.core.now, "task resumed");
        self.core.make_ready(task);
        self.core
            .trace
            .record(self.core.now, TraceEvent::Resumed { task });
        self.after_external_change()
    }

    // ── Timer control ─────────────────────────────────────────────────────────

    /// Restart the period of `timer` from the current tick.
    pub fn reset_timer(&mut self, timer: TimerId) -> Result<(), KernelError> {
        let now = self.core.now;
        let t = self
            .timers
            .get_mut(timer)
            .ok_or(KernelError::UnknownTimer(timer))?;
        t.reset(now);
        debug!(timer = %t.name(), next_fire = ?t.next_fire(), "timer reset");
        Ok(())
    }

    pub fn start_timer(&mut self, timer: TimerId) -> Result<(), KernelError> {
        let now = self.core.now;
        self.timers
            .get_mut(timer)
            .ok_or(KernelError::UnknownTimer(timer))?
            .start(now);
        Ok(())
    }

    pub fn stop_timer(&mut self, timer: TimerId) -> Result<(), KernelError> {
        self.timers
            .get_mut(timer)
            .ok_or(KernelError::UnknownTimer(timer))?
            .stop();
        Ok(())
    }

    /// New period, counted from the current tick.
    pub fn change_timer_period(&mut self, timer: TimerId, period: Tick) -> Result<(), KernelError> {
        let now = self.core.now;
        let t = self
            .timers
            .get_mut(timer)
            .ok_or(KernelError::UnknownTimer(timer))?;
        if period == 0 {
            return Err(KernelError::creation(t.name(), CreationReason::ZeroPeriod));
        }
        t.change_period(period, now);
        Ok(())
    }

    // ── Queue access from outside a task ──────────────────────────────────────

    /// Non-blocking send from outside any task (an interrupt-style producer).
    /// A woken receiver runs before this returns if it outranks the current
    /// task.
    pub fn post(&mut self, queue: QueueId, message: Message) -> Result<(), KernelError> {
        MessagePoster::post(&mut self.core, queue, message)?;
        self.after_external_change()
    }

    // ── Observation ───────────────────────────────────────────────────────────

    pub fn now(&self) -> Tick {
        self.core.now
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Task currently owning the CPU.
    pub fn current(&self) -> TaskId {
        self.current
    }

    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.core.tasks.get(task.0).map(|t| t.state)
    }

    pub fn task_stats(&self, task: TaskId) -> Option<TaskStats> {
        self.core.tasks.get(task.0).map(|t| t.stats)
    }

    pub fn task_name(&self, task: TaskId) -> Option<&str> {
        self.core.tasks.get(task.0).map(|t| t.name())
    }

    /// Absolute tick the task is sleeping until, if any.
    pub fn task_wake_tick(&self, task: TaskId) -> Option<Tick> {
        self.core.tasks.get(task.0).and_then(|t| t.next_wake)
    }

    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.core
            .tasks
            .iter()
            .position(|t| t.name() == name)
            .map(TaskId)
    }

    /// Application tasks, creation order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (1..self.core.tasks.len()).map(TaskId)
    }

    /// Static parameters of every application task.
    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.core.tasks[1..].iter().map(|t| t.spec.clone()).collect()
    }

    pub fn queue(&self, queue: QueueId) -> Option<&BoundedQueue> {
        self.core.queues.get(queue.0)
    }

    pub fn timer(&self, timer: TimerId) -> Option<&SoftwareTimer> {
        self.timers.get(timer)
    }

    pub fn stats(&self) -> KernelStats {
        self.core.stats
    }

    /// Most recent trace records, oldest first.
    pub fn trace(&self) -> impl Iterator<Item = &TraceRecord> + '_ {
        self.core.trace.records()
    }

    pub fn clear_trace(&mut self) {
        self.core.trace.clear();
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn after_external_change(&mut self) -> Result<(), KernelError> {
        if !self.started {
            return Ok(());
        }
        self.reschedule()?;
        self.verify()
    }

    fn log_analysis(&self) {
        let specs = self.task_specs();
        let bound = analysis::liu_layland_bound(
            specs.iter().filter(|s| s.period.is_some_and(|p| p > 0)).count(),
        );
        match analysis::check_liu_layland(&specs) {
            Some(u) => warn!(
                utilisation = %format!("{:.3}", u),
                bound = %format!("{:.3}", bound),
                "task set exceeds the Liu & Layland bound; deadlines are not guaranteed"
            ),
            None => info!(
                utilisation = %format!("{:.3}", analysis::utilisation(&specs)),
                bound = %format!("{:.3}", bound),
                "task set within the Liu & Layland bound"
            ),
        }
        match analysis::hyperperiod(&specs) {
            Ok(h) => info!(hyperperiod = h, "hyperperiod (ticks)"),
            Err(e) => debug!(error = %e, "no hyperperiod"),
        }
    }

    /// Charge the tick that just elapsed to whoever held the CPU.
    fn charge_tick(&mut self) {
        let tcb = &mut self.core.tasks[self.current.0];
        tcb.stats.cpu_ticks += 1;
        if self.current == IDLE_TASK {
            self.core.stats.idle_ticks += 1;
            return;
        }
        if tcb.work_remaining > 0 {
            tcb.work_remaining -= 1;
            if tcb.work_remaining == 0 {
                tcb.resume = Some(Resume::WorkDone);
            }
        }
    }

    /// Dispatch and step until the CPU owner is busy with `Work` or is idle.
    fn reschedule(&mut self) -> Result<(), KernelError> {
        let mut steps = 0;
        loop {
            self.select();
            let current = self.current;
            if current == IDLE_TASK || self.core.tasks[current.0].work_remaining > 0 {
                return Ok(());
            }
            steps += 1;
            if steps > self.config.max_steps_per_tick {
                return Err(self.core.violation(format!(
                    "{} body steps in one scheduling pass without time passing (last stepped: {})",
                    self.config.max_steps_per_tick,
                    self.core.tasks[current.0].name()
                )));
            }
            self.step_current()?;
        }
    }

    /// Make the highest-priority runnable task the current one.
    fn select(&mut self) {
        let current = self.current;
        let running = self.core.tasks[current.0].state == TaskState::Running;

        let Some(top) = self.core.ready.highest_priority() else {
            if !running {
                self.switch_to(IDLE_TASK);
            }
            return;
        };

        let busy = running && current != IDLE_TASK;
        if busy && top <= self.core.tasks[current.0].priority() {
            return;
        }
        let Some(next) = self.core.ready.pop_highest() else {
            return;
        };

        if busy {
            let tcb = &mut self.core.tasks[current.0];
            tcb.state = TaskState::Ready;
            tcb.stats.preemptions += 1;
            let priority = tcb.priority();
            self.core.ready.push_back(current, priority);
            self.core.stats.preemptions += 1;
            self.core.trace.record(
                self.core.now,
                TraceEvent::Preempted {
                    task: current,
                    by: next,
                },
            );
        }
        self.switch_to(next);
    }

    fn switch_to(&mut self, next: TaskId) {
        let prev = self.current;
        if prev != next && prev == IDLE_TASK {
            self.core.tasks[IDLE_TASK.0].state = TaskState::Ready;
        }

        let tcb = &mut self.core.tasks[next.0];
        tcb.state = TaskState::Running;
        if prev == next {
            return;
        }
        tcb.stats.dispatches += 1;
        debug!(task = %tcb.name(), tick = self.core.now, "dispatch");
        self.current = next;
        self.core.stats.context_switches += 1;
        self.core
            .trace
            .record(self.core.now, TraceEvent::Dispatched { task: next });
    }

    /// Run one step of the current task's body.
    fn step_current(&mut self) -> Result<(), KernelError> {
        let id = self.current;

        // A task woken from a waiter list re-checks its operation first.
        if let Some(pending) = self.core.tasks[id.0].pending.take() {
            match self.core.attempt(id, pending, true)? {
                Some(resume) => self.core.tasks[id.0].resume = Some(resume),
                None => return Ok(()),
            }
        }

        let Some(resume) = self.core.tasks[id.0].resume.take() else {
            return Err(self.core.violation(format!("{id} dispatched with nothing to resume")));
        };
        let Some(mut body) = self.core.tasks[id.0].body.take() else {
            return Err(self.core.violation(format!("{id} has no body")));
        };

        let action = {
            let tcb = &self.core.tasks[id.0];
            let mut cx = TaskContext {
                id,
                name: tcb.name(),
                now: self.core.now,
                console: self.console.as_mut(),
            };
            body.step(&mut cx, resume)
        };

        let tcb = &mut self.core.tasks[id.0];
        tcb.body = Some(body);
        tcb.stats.steps += 1;
        trace_log!(task = %tcb.name(), ?resume, ?action, "step");

        if let Some(resume) = self.apply(id, action)? {
            self.core.tasks[id.0].resume = Some(resume);
        }
        Ok(())
    }

    /// Carry out `action`; `Some` when the task can be stepped again at once.
    fn apply(&mut self, id: TaskId, action: Action) -> Result<Option<Resume>, KernelError> {
        let now = self.core.now;
        match action {
            Action::Work(0) => Ok(Some(Resume::WorkDone)),
            Action::Work(n) => {
                self.core.tasks[id.0].work_remaining = n;
                Ok(None)
            }
            Action::DelayUntil(t) => self.core.delay_until(id, t),
            Action::DelayFor(n) => self.core.delay_until(id, now.saturating_add(n)),
            Action::Send {
                queue,
                message,
                timeout,
            } => match timeout.wait_from(now) {
                Wait::NoWait => Ok(Some(Resume::Sent(self.core.try_send(id, queue, message)))),
                Wait::Until(deadline) => self.core.attempt(
                    id,
                    Pending::Send {
                        queue,
                        message,
                        deadline,
                    },
                    false,
                ),
            },
            Action::Receive { queue, timeout } => match timeout.wait_from(now) {
                Wait::NoWait => Ok(Some(Resume::Received(self.core.try_receive(id, queue)))),
                Wait::Until(deadline) => {
                    self.core
                        .attempt(id, Pending::Receive { queue, deadline }, false)
                }
            },
        }
    }

    /// Cross-check task states against the Ready Set, delays and waiter lists.
    fn verify(&self) -> Result<(), KernelError> {
        if !self.config.check_invariants {
            return Ok(());
        }
        let core = &self.core;
        let fail = |detail: String| -> Result<(), KernelError> { Err(core.violation(detail)) };

        let mut running = 0;
        let mut ready_members = 0;
        for (i, tcb) in core.tasks.iter().enumerate() {
            let id = TaskId(i);
            let delayed = core.delays.contains(id);
            let waiting = core.queues.iter().any(|q| q.is_waiting(id));

            match tcb.state {
                TaskState::Running => {
                    running += 1;
                    if id != self.current {
                        return fail(format!("{id} Running but {} is current", self.current));
                    }
                }
                TaskState::Ready if id != IDLE_TASK => {
                    ready_members += 1;
                    if !core.ready.contains(id) {
                        return fail(format!("{id} Ready but not in the Ready Set"));
                    }
                }
                TaskState::BlockedOnDelay if !delayed || waiting => {
                    return fail(format!("{id} BlockedOnDelay without a sole delay entry"));
                }
                TaskState::BlockedOnQueue(queue) => {
                    let parked = core.queues.get(queue.0).is_some_and(|q| q.is_waiting(id));
                    let bounded = tcb.pending.and_then(|p| p.deadline()).is_some();
                    if !parked || delayed != bounded {
                        return fail(format!("{id} BlockedOnQueue({queue}) inconsistently parked"));
                    }
                }
                TaskState::Ready | TaskState::Running | TaskState::Suspended
                    if delayed || waiting =>
                {
                    return fail(format!("{id} {:?} but still blocked somewhere", tcb.state));
                }
                _ => {}
            }
        }

        if running != 1 {
            return fail(format!("{running} tasks Running"));
        }
        if ready_members != core.ready.len() {
            return fail(format!(
                "{} Ready tasks but Ready Set holds {}",
                ready_members,
                core.ready.len()
            ));
        }
        if let Some(top) = core.ready.highest_priority() {
            if self.current == IDLE_TASK || top > core.tasks[self.current.0].priority() {
                return fail(format!("priority {top} Ready while {} runs", self.current));
            }
        }
        for q in &core.queues {
            if q.len() > q.capacity() {
                return fail(format!("queue '{}' over capacity", q.name()));
            }
        }
        Ok(())
    }
}

/// Terminal state after a fatal error: log once, then park forever.
pub fn halt(err: &KernelError) -> ! {
    error!(error = %err, "fatal scheduler error; halting");
    loop {
        std::thread::park();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
