/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Error taxonomy of the scheduler core.
//!
//! * [`CreationReason`]: why a task, queue or timer could not be created.
//!   Creation failures are fatal at system start; the binary halts on them.
//! * [`KernelError`]: everything a kernel entry point can return.
//!
//! Queue-level failures ([`QueueError`]) are *not* kernel errors when they
//! happen inside a task: they are handed back to the task as
//! [`Resume::Sent`](crate::task::Resume::Sent) /
//! [`Resume::Received`](crate::task::Resume::Received) values.

use thiserror::Error;

use crate::queue::{QueueError, QueueId};
use crate::task::TaskId;
use crate::timer::TimerId;

// ── Creation ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationReason {
    /// `KernelConfig::max_tasks` reached.
    TaskLimitReached { limit: usize },
    /// `KernelConfig::max_queues` reached.
    QueueLimitReached { limit: usize },
    /// `KernelConfig::max_timers` reached.
    TimerLimitReached { limit: usize },
    /// A queue needs at least one slot.
    ZeroCapacity,
    /// A timer period of zero ticks would fire forever within one tick.
    ZeroPeriod,
    /// Objects are created before `start`; the arena is fixed afterwards.
    SchedulerStarted,
}

impl std::fmt::Display for CreationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreationReason::TaskLimitReached { limit } => {
                write!(f, "task limit of {} reached", limit)
            }
            CreationReason::QueueLimitReached { limit } => {
                write!(f, "queue limit of {} reached", limit)
            }
            CreationReason::TimerLimitReached { limit } => {
                write!(f, "timer limit of {} reached", limit)
            }
            CreationReason::ZeroCapacity => write!(f, "queue capacity must be at least 1"),
            CreationReason::ZeroPeriod => write!(f, "timer period must be at least 1 tick"),
            CreationReason::SchedulerStarted => {
                write!(f, "scheduler already started; objects are created before start")
            }
        }
    }
}

// ── Kernel ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum KernelError {
    /// A task, queue or timer could not be created.
    #[error("cannot create '{name}': {reason}")]
    Creation {
        name: String,
        reason: CreationReason,
    },

    /// Direct queue access from outside a task failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("unknown queue {0}")]
    UnknownQueue(QueueId),

    #[error("unknown timer {0}")]
    UnknownTimer(TimerId),

    /// The idle task is always runnable and cannot be suspended.
    #[error("the idle task cannot be suspended")]
    IdleNotSuspendable,

    /// Internal bookkeeping disagrees with itself.  Always a kernel bug or a
    /// misbehaving body (e.g. one that never blocks); the system halts.
    #[error("scheduler invariant violated at tick {tick}: {detail}")]
    InvariantViolation { tick: u64, detail: String },

    /// The tick source stopped delivering events.
    #[error("tick source closed; the scheduler cannot continue")]
    TickSourceLost,
}

impl KernelError {
    pub(crate) fn creation(name: &str, reason: CreationReason) -> Self {
        KernelError::Creation {
            name: name.to_string(),
            reason,
        }
    }
}
