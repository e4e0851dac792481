/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! ipsa-core – fixed-priority, tick-driven real-time core
//!
//! Module layout (leaves first):
//!
//! ```text
//! lib.rs
//! ├── tick       – tick counter, external events, TickSource trait
//! ├── task       – task arena records, TaskBody state machine, actions
//! ├── ready      – Ready Set (priority levels, FIFO within a level)
//! ├── delay      – Delay Manager (absolute wake-tick ordering)
//! ├── queue      – fixed-capacity FIFO of u32 messages with waiter lists
//! ├── timer      – software timer service (auto-reload / one-shot)
//! ├── console    – side-channel sink for per-activation status lines
//! ├── analysis   – Liu & Layland bound, hyperperiod
//! └── kernel/    – scheduler core, error taxonomy, trace ring
//! ```
//!
//! Control flow on every tick:
//!
//! ```text
//! TickSource ──► Kernel::tick()
//!                  ├─► charge elapsed tick to the Running task
//!                  ├─► DelayManager::due()   → tasks become Ready (FIFO)
//!                  ├─► TimerService::fire_due() → non-blocking posts
//!                  └─► reschedule()          → highest-priority Ready runs
//! ```
//!
//! All mutable state is owned by [`Kernel`]; task code only ever sees a
//! [`TaskContext`] and expresses blocking as an [`Action`] value, so no lock
//! is exposed to task code and no intermediate queue/timer state is
//! observable.

pub mod analysis;
pub mod console;
pub mod delay;
pub mod kernel;
pub mod queue;
pub mod ready;
pub mod task;
pub mod tick;
pub mod timer;

pub use console::{ConsoleLine, ConsoleLog, ConsoleSink, TracingConsole};
pub use kernel::{
    halt, CreationReason, Kernel, KernelConfig, KernelError, KernelStats, TraceEvent, TraceRecord,
};
pub use queue::{Message, QueueError, QueueId, Timeout};
pub use task::{Action, Priority, Resume, TaskBody, TaskContext, TaskId, TaskSpec, TaskState};
pub use tick::{KernelEvent, Tick, TickSource};
pub use timer::{TimerContext, TimerId, TimerSpec};
