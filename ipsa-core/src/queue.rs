/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Bounded Queue: fixed-capacity FIFO of fixed-size messages.
//!
//! The queue itself only stores items and the two waiter lists; it never
//! touches task state.  The kernel combines these primitives into blocking
//! `send` / `receive`:
//!
//! | Event | Queue primitive | Kernel follow-up |
//! |---|---|---|
//! | send with space | [`try_push`](BoundedQueue::try_push) | wake oldest receiver |
//! | send when full | [`park`](BoundedQueue::park) sender | delay entry if bounded |
//! | receive with data | [`try_pop`](BoundedQueue::try_pop) | wake oldest sender |
//! | receive when empty | [`park`](BoundedQueue::park) receiver | delay entry if bounded |
//! | timeout / suspend | [`unpark`](BoundedQueue::unpark) | task Ready / Suspended |
//!
//! Invariant: `0 ≤ len ≤ capacity`, and a task is in at most one waiter list.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use crate::task::TaskId;
use crate::tick::Tick;

/// Opaque 32-bit payload.
pub type Message = u32;

/// Stable index of a queue in the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub(crate) usize);

impl QueueId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// How long a queue operation may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Fail immediately instead of blocking.
    #[default]
    NoWait,
    /// Block for at most `n` ticks (`Ticks(0)` behaves like `NoWait`).
    Ticks(Tick),
    /// Block until the operation can complete.
    Forever,
}

/// When a blocked operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    NoWait,
    /// Absolute deadline; `None` = forever.
    Until(Option<Tick>),
}

impl Timeout {
    pub(crate) fn wait_from(self, now: Tick) -> Wait {
        match self {
            Timeout::NoWait | Timeout::Ticks(0) => Wait::NoWait,
            Timeout::Ticks(n) => Wait::Until(Some(now.saturating_add(n))),
            Timeout::Forever => Wait::Until(None),
        }
    }
}

/// Failure of a queue operation.  All variants are recoverable; the task
/// decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Non-blocking send found no free slot.
    #[error("queue is full")]
    Full,

    /// Non-blocking receive found no message.
    #[error("queue is empty")]
    Empty,

    /// A bounded wait expired without progress.
    #[error("timed out waiting on queue")]
    Timeout,

    /// The id does not name a queue of this kernel.
    #[error("unknown queue {0}")]
    UnknownQueue(QueueId),
}

/// Which waiter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// Running counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub sent: u64,
    pub received: u64,
    /// Largest number of items held at once.
    pub high_water: usize,
    pub send_timeouts: u64,
    pub receive_timeouts: u64,
}

#[derive(Debug)]
pub struct BoundedQueue {
    name: String,
    capacity: usize,
    items: VecDeque<Message>,
    waiting_senders: VecDeque<TaskId>,
    waiting_receivers: VecDeque<TaskId>,
    stats: QueueStats,
}

impl BoundedQueue {
    /// `capacity` must be non-zero; the kernel rejects zero at creation.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            items: VecDeque::with_capacity(capacity),
            waiting_senders: VecDeque::new(),
            waiting_receivers: VecDeque::new(),
            stats: QueueStats::default(),
        }
    }

    // ── Items ─────────────────────────────────────────────────────────────────

    /// Append `message` if a slot is free.
    pub fn try_push(&mut self, message: Message) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }
        self.items.push_back(message);
        self.stats.sent += 1;
        self.stats.high_water = self.stats.high_water.max(self.items.len());
        Ok(())
    }

    /// Remove the oldest message.
    pub fn try_pop(&mut self) -> Result<Message, QueueError> {
        let message = self.items.pop_front().ok_or(QueueError::Empty)?;
        self.stats.received += 1;
        Ok(message)
    }

    // ── Waiters ───────────────────────────────────────────────────────────────

    /// Add `task` to a waiter list.  A task that lost a wake-up race goes back
    /// to the front so it keeps its turn.
    pub fn park(&mut self, direction: Direction, task: TaskId, at_front: bool) {
        let list = self.waiters_mut(direction);
        if at_front {
            list.push_front(task);
        } else {
            list.push_back(task);
        }
    }

    /// Remove the oldest waiter of `direction`.
    pub fn unpark_oldest(&mut self, direction: Direction) -> Option<TaskId> {
        self.waiters_mut(direction).pop_front()
    }

    /// Remove `task` from whichever list holds it.
    pub fn unpark(&mut self, task: TaskId) -> bool {
        for list in [&mut self.waiting_senders, &mut self.waiting_receivers] {
            if let Some(pos) = list.iter().position(|t| *t == task) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn waiters(&self, direction: Direction) -> impl Iterator<Item = TaskId> + '_ {
        match direction {
            Direction::Send => self.waiting_senders.iter().copied(),
            Direction::Receive => self.waiting_receivers.iter().copied(),
        }
    }

    pub fn is_waiting(&self, task: TaskId) -> bool {
        self.waiting_senders.contains(&task) || self.waiting_receivers.contains(&task)
    }

    fn waiters_mut(&mut self, direction: Direction) -> &mut VecDeque<TaskId> {
        match direction {
            Direction::Send => &mut self.waiting_senders,
            Direction::Receive => &mut self.waiting_receivers,
        }
    }

    pub(crate) fn record_timeout(&mut self, direction: Direction) {
        match direction {
            Direction::Send => self.stats.send_timeouts += 1,
            Direction::Receive => self.stats.receive_timeouts += 1,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> TaskId {
        TaskId(i)
    }

    #[test]
    fn delivers_in_send_order() {
        let mut q = BoundedQueue::new("q", 2);
        q.try_push(100).unwrap();
        q.try_push(200).unwrap();
        assert_eq!(q.try_pop(), Ok(100));
        q.try_push(300).unwrap();
        assert_eq!(q.try_pop(), Ok(200));
        assert_eq!(q.try_pop(), Ok(300));
        assert_eq!(q.try_pop(), Err(QueueError::Empty));
    }

    #[test]
    fn rejects_push_beyond_capacity() {
        let mut q = BoundedQueue::new("q", 2);
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();
        assert!(q.is_full());
        assert_eq!(q.try_push(3), Err(QueueError::Full));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn stats_track_traffic_and_high_water() {
        let mut q = BoundedQueue::new("q", 4);
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();
        q.try_pop().unwrap();
        q.try_push(3).unwrap();
        let s = q.stats();
        assert_eq!(s.sent, 3);
        assert_eq!(s.received, 1);
        assert_eq!(s.high_water, 2);
    }

    #[test]
    fn waiters_are_fifo_unless_requeued_at_front() {
        let mut q = BoundedQueue::new("q", 1);
        q.park(Direction::Receive, t(1), false);
        q.park(Direction::Receive, t(2), false);
        q.park(Direction::Receive, t(3), true);

        let order: Vec<_> = q.waiters(Direction::Receive).collect();
        assert_eq!(order, vec![t(3), t(1), t(2)]);
        assert_eq!(q.unpark_oldest(Direction::Receive), Some(t(3)));
        assert_eq!(q.unpark_oldest(Direction::Send), None);
    }

    #[test]
    fn unpark_removes_task_from_its_list() {
        let mut q = BoundedQueue::new("q", 1);
        q.park(Direction::Send, t(4), false);
        q.park(Direction::Receive, t(5), false);

        assert!(q.unpark(t(4)));
        assert!(!q.unpark(t(4)));
        assert!(!q.is_waiting(t(4)));
        assert!(q.is_waiting(t(5)));
    }

    #[test]
    fn zero_tick_timeout_does_not_wait() {
        assert_eq!(Timeout::Ticks(0).wait_from(10), Wait::NoWait);
        assert_eq!(Timeout::NoWait.wait_from(10), Wait::NoWait);
        assert_eq!(Timeout::Ticks(5).wait_from(10), Wait::Until(Some(15)));
        assert_eq!(Timeout::Forever.wait_from(10), Wait::Until(None));
    }
}
