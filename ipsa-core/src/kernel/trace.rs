/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Bounded scheduling trace.
//!
//! A ring of the most recent [`TraceRecord`]s.  Tests use it to check
//! dispatch order and wake ticks without parsing log output; the binary can
//! dump it on exit.  Capacity 0 disables recording entirely.

use std::collections::VecDeque;

use crate::queue::{Message, QueueId};
use crate::task::TaskId;
use crate::tick::Tick;
use crate::timer::TimerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// The task was switched onto the CPU.
    Dispatched { task: TaskId },
    /// The running task lost the CPU to a higher priority.
    Preempted { task: TaskId, by: TaskId },
    /// The task went to sleep until `until`.
    Delayed { task: TaskId, until: Tick },
    /// `DelayUntil` named a tick that had already passed.
    DeadlineOverrun { task: TaskId, deadline: Tick },
    /// A delay expired.
    Woken { task: TaskId },
    /// The task parked on a queue.
    BlockedOnQueue { task: TaskId, queue: QueueId },
    /// A queue operation completed inside a task.
    Sent { task: TaskId, queue: QueueId, message: Message },
    Received { task: TaskId, queue: QueueId, message: Message },
    /// A bounded queue wait expired.
    QueueTimeout { task: TaskId, queue: QueueId },
    /// A timer expired; `dropped` posts hit a full queue.
    TimerFired { timer: TimerId, dropped: u64 },
    Suspended { task: TaskId },
    Resumed { task: TaskId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub tick: Tick,
    pub event: TraceEvent,
}

#[derive(Debug)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    capacity: usize,
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, tick: Tick, event: TraceEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(TraceRecord { tick, event });
    }

    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> + '_ {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn woken(i: usize) -> TraceEvent {
        TraceEvent::Woken { task: TaskId(i) }
    }

    #[test]
    fn keeps_only_most_recent_records() {
        let mut trace = TraceBuffer::new(2);
        trace.record(1, woken(1));
        trace.record(2, woken(2));
        trace.record(3, woken(3));

        let ticks: Vec<_> = trace.records().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![2, 3]);
    }

    #[test]
    fn zero_capacity_disables_recording() {
        let mut trace = TraceBuffer::new(0);
        trace.record(1, woken(1));
        assert!(trace.is_empty());
    }
}
