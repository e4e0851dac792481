/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task model: arena records, the body state machine and its vocabulary.
//!
//! A task body never blocks a host thread.  It is resumed with the outcome of
//! its previous request and answers with the next one:
//!
//! ```text
//!              Resume::Start
//!                   │
//!                   ▼
//!   ┌──────────► step() ──► Action::Work(n)        ── CPU for n ticks ──┐
//!   │                 ├───► Action::DelayUntil(t)   ── BlockedOnDelay ───┤
//!   │                 ├───► Action::Send{..}        ── BlockedOnQueue ───┤
//!   │                 └───► Action::Receive{..}     ── BlockedOnQueue ───┤
//!   │                                                                    │
//!   └──────── Resume::{WorkDone, Delayed, Sent(..), Received(..)} ◄──────┘
//! ```
//!
//! The pending resume value plus the remaining work is the task's saved
//! execution context; preemption only ever happens between steps.

use std::fmt;

use crate::console::ConsoleSink;
use crate::queue::{Direction, Message, QueueError, QueueId, Timeout};
use crate::tick::Tick;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Stable index of a task in the kernel's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Position in the arena (0 is the idle task).
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// The always-present idle task.
pub const IDLE_TASK: TaskId = TaskId(0);

/// Scheduling priority.  Higher value = more urgent.  Fixed at creation.
pub type Priority = u32;

/// Priority of the idle task; nothing ranks below it.
pub const IDLE_PRIORITY: Priority = 0;

// ── State machine ─────────────────────────────────────────────────────────────

/// Execution state of a task.
///
/// Exactly one task is `Running` at any time (the idle task when nothing else
/// is runnable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to run, waiting in the Ready Set.
    Ready,
    /// Owns the CPU.
    Running,
    /// Sleeping until an absolute tick.
    BlockedOnDelay,
    /// Waiting for space (send) or data (receive) on a queue.
    BlockedOnQueue(QueueId),
    /// Removed from scheduling until explicitly resumed.
    Suspended,
}

/// Request returned by [`TaskBody::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Occupy the CPU for `n` ticks (preemptible).  `Work(0)` resumes at once.
    Work(Tick),
    /// Sleep until the absolute tick `t`.  A tick in the past does not block.
    DelayUntil(Tick),
    /// Sleep for `n` ticks from now.
    DelayFor(Tick),
    /// Append `message` to `queue`, waiting up to `timeout` for space.
    Send {
        queue: QueueId,
        message: Message,
        timeout: Timeout,
    },
    /// Take the oldest message from `queue`, waiting up to `timeout`.
    Receive { queue: QueueId, timeout: Timeout },
}

/// Outcome of the previous [`Action`], delivered on the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// First dispatch after creation.
    Start,
    /// A `Work` request has consumed all its ticks.
    WorkDone,
    /// A delay elapsed (or its deadline had already passed).
    Delayed,
    /// Result of a `Send`.
    Sent(Result<(), QueueError>),
    /// Result of a `Receive`.
    Received(Result<Message, QueueError>),
}

/// Application logic of a task.
///
/// Bodies loop forever: every `step` does bounded work and returns the next
/// blocking request.
pub trait TaskBody: Send {
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action;
}

impl<F> TaskBody for F
where
    F: FnMut(&mut TaskContext<'_>, Resume) -> Action + Send,
{
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action {
        self(cx, resume)
    }
}

/// What a task body may observe while it is stepped.
pub struct TaskContext<'a> {
    pub(crate) id: TaskId,
    pub(crate) name: &'a str,
    pub(crate) now: Tick,
    pub(crate) console: &'a mut dyn ConsoleSink,
}

impl<'a> TaskContext<'a> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Current tick.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Write one status line to the console side channel.
    pub fn emit(&mut self, line: impl AsRef<str>) {
        self.console.emit(self.now, self.name, line.as_ref());
    }
}

// ── Creation parameters ───────────────────────────────────────────────────────

/// Static task parameters.
///
/// `period` and `wcet` feed schedulability analysis only; dispatch is driven
/// purely by `priority` and the body's own requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub priority: Priority,
    /// Nominal activation period in ticks (`None` for event-driven tasks).
    pub period: Option<Tick>,
    /// Worst-case execution time in ticks.
    pub wcet: Tick,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            priority,
            period: None,
            wcet: 0,
        }
    }

    pub fn periodic(mut self, period: Tick, wcet: Tick) -> Self {
        self.period = Some(period);
        self.wcet = wcet;
        self
    }
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Per-task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Number of times the body was stepped.
    pub steps: u64,
    /// Number of times the task was switched onto the CPU.
    pub dispatches: u64,
    /// Number of times a higher-priority task took the CPU away.
    pub preemptions: u64,
    /// Ticks spent Running.
    pub cpu_ticks: u64,
    /// `DelayUntil` requests whose deadline had already passed.
    pub deadline_overruns: u64,
    /// Queue operations that ended in `QueueError::Timeout`.
    pub queue_timeouts: u64,
}

// ── Control block ─────────────────────────────────────────────────────────────

/// A queue operation the task is blocked on.  Re-attempted when the task is
/// next dispatched; the wake-up itself proves nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    Send {
        queue: QueueId,
        message: Message,
        deadline: Option<Tick>,
    },
    Receive {
        queue: QueueId,
        deadline: Option<Tick>,
    },
}

impl Pending {
    pub(crate) fn queue(&self) -> QueueId {
        match self {
            Pending::Send { queue, .. } | Pending::Receive { queue, .. } => *queue,
        }
    }

    pub(crate) fn deadline(&self) -> Option<Tick> {
        match self {
            Pending::Send { deadline, .. } | Pending::Receive { deadline, .. } => *deadline,
        }
    }

    pub(crate) fn direction(&self) -> Direction {
        match self {
            Pending::Send { .. } => Direction::Send,
            Pending::Receive { .. } => Direction::Receive,
        }
    }

    /// Resume value reporting `error` for this operation.
    pub(crate) fn failed(&self, error: QueueError) -> Resume {
        match self {
            Pending::Send { .. } => Resume::Sent(Err(error)),
            Pending::Receive { .. } => Resume::Received(Err(error)),
        }
    }
}

pub(crate) struct TaskControlBlock {
    pub(crate) spec: TaskSpec,
    pub(crate) state: TaskState,
    /// `None` only for the idle task.
    pub(crate) body: Option<Box<dyn TaskBody>>,
    /// Value delivered on the next step.
    pub(crate) resume: Option<Resume>,
    pub(crate) pending: Option<Pending>,
    pub(crate) work_remaining: Tick,
    /// Absolute tick of the current delay, if sleeping.
    pub(crate) next_wake: Option<Tick>,
    pub(crate) stats: TaskStats,
}

impl TaskControlBlock {
    pub(crate) fn idle() -> Self {
        Self {
            spec: TaskSpec::new("IDLE", IDLE_PRIORITY),
            state: TaskState::Running,
            body: None,
            resume: None,
            pending: None,
            work_remaining: 0,
            next_wake: None,
            stats: TaskStats::default(),
        }
    }

    pub(crate) fn new(spec: TaskSpec, body: Box<dyn TaskBody>) -> Self {
        Self {
            spec,
            state: TaskState::Ready,
            body: Some(body),
            resume: Some(Resume::Start),
            pending: None,
            work_remaining: 0,
            next_wake: None,
            stats: TaskStats::default(),
        }
    }

    pub(crate) fn priority(&self) -> Priority {
        self.spec.priority
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
