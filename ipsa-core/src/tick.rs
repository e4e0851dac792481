/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Tick counter and the external-event boundary.
//!
//! The core never reads a clock.  An external collaborator (a hardware tick
//! interrupt, a `tokio` interval, or a scripted iterator in tests) feeds
//! [`KernelEvent`]s through a [`TickSource`].

use crate::task::TaskId;
use crate::timer::TimerId;

/// Monotonic scheduler tick.  Tick 0 is the instant the scheduler starts.
pub type Tick = u64;

/// Everything the outside world may deliver to a running kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEvent {
    /// One tick period elapsed.
    Tick,
    /// Asynchronous stimulus (e.g. a key press) restarting a timer's period.
    ResetTimer(TimerId),
    /// Take a task out of scheduling until resumed.
    Suspend(TaskId),
    /// Return a suspended task to the Ready Set.
    Resume(TaskId),
}

/// Supplier of kernel events.
///
/// `next_event` blocks until the next event is available.  Returning `None`
/// means the source is gone; [`Kernel::run_forever`] treats that as fatal
/// because ticks must never stop.
///
/// [`Kernel::run_forever`]: crate::kernel::Kernel::run_forever
pub trait TickSource {
    fn next_event(&mut self) -> Option<KernelEvent>;
}

/// Any iterator of events is a tick source; scripted runs use this.
impl<I> TickSource for I
where
    I: Iterator<Item = KernelEvent>,
{
    fn next_event(&mut self) -> Option<KernelEvent> {
        self.next()
    }
}
