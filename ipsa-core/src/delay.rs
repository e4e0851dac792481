/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Delay Manager: tasks sleeping until an absolute tick.
//!
//! Entries are keyed by `(wake_tick, sequence)`, so simultaneous wake-ups come
//! out in the order they were inserted.  A task owns at most one entry; the
//! side index makes `cancel` O(log n) when a queue wake-up beats a timeout.

use std::collections::{BTreeMap, HashMap};

use crate::task::TaskId;
use crate::tick::Tick;

#[derive(Debug, Default)]
pub struct DelayManager {
    entries: BTreeMap<(Tick, u64), TaskId>,
    index: HashMap<TaskId, (Tick, u64)>,
    seq: u64,
}

/// A task already owns a delay entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyDelayed {
    pub task: TaskId,
    pub wake_tick: Tick,
}

impl DelayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to wake at `wake_tick`.
    pub fn insert(&mut self, task: TaskId, wake_tick: Tick) -> Result<(), AlreadyDelayed> {
        if let Some(&(existing, _)) = self.index.get(&task) {
            return Err(AlreadyDelayed {
                task,
                wake_tick: existing,
            });
        }
        let key = (wake_tick, self.seq);
        self.seq += 1;
        self.entries.insert(key, task);
        self.index.insert(task, key);
        Ok(())
    }

    /// Remove the entry of `task`, returning its wake tick.
    pub fn cancel(&mut self, task: TaskId) -> Option<Tick> {
        let key = self.index.remove(&task)?;
        self.entries.remove(&key);
        Some(key.0)
    }

    /// Remove and return every task with `wake_tick <= now`, earliest first,
    /// insertion order among equal ticks.
    pub fn due(&mut self, now: Tick) -> Vec<TaskId> {
        let mut woken = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let task = entry.remove();
            self.index.remove(&task);
            woken.push(task);
        }
        woken
    }

    /// Earliest pending wake tick.
    pub fn next_wake(&self) -> Option<Tick> {
        self.entries.keys().next().map(|(tick, _)| *tick)
    }

    pub fn wake_tick_of(&self, task: TaskId) -> Option<Tick> {
        self.index.get(&task).map(|(tick, _)| *tick)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.index.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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
    fn due_returns_only_expired_entries_in_tick_order() {
        let mut delays = DelayManager::new();
        delays.insert(t(1), 30).unwrap();
        delays.insert(t(2), 10).unwrap();
        delays.insert(t(3), 20).unwrap();

        assert!(delays.due(9).is_empty());
        assert_eq!(delays.due(20), vec![t(2), t(3)]);
        assert_eq!(delays.next_wake(), Some(30));
        assert_eq!(delays.len(), 1);
    }

    #[test]
    fn simultaneous_wakeups_are_fifo() {
        let mut delays = DelayManager::new();
        delays.insert(t(5), 50).unwrap();
        delays.insert(t(2), 50).unwrap();
        delays.insert(t(9), 50).unwrap();
        assert_eq!(delays.due(50), vec![t(5), t(2), t(9)]);
        assert!(delays.is_empty());
    }

    #[test]
    fn a_task_owns_at_most_one_entry() {
        let mut delays = DelayManager::new();
        delays.insert(t(1), 10).unwrap();
        let err = delays.insert(t(1), 20).unwrap_err();
        assert_eq!(
            err,
            AlreadyDelayed {
                task: t(1),
                wake_tick: 10
            }
        );
        assert_eq!(delays.wake_tick_of(t(1)), Some(10));
    }

    #[test]
    fn cancel_removes_entry_and_allows_reinsertion() {
        let mut delays = DelayManager::new();
        delays.insert(t(1), 10).unwrap();
        assert_eq!(delays.cancel(t(1)), Some(10));
        assert_eq!(delays.cancel(t(1)), None);
        assert!(!delays.contains(t(1)));
        assert!(delays.due(100).is_empty());

        delays.insert(t(1), 15).unwrap();
        assert_eq!(delays.due(15), vec![t(1)]);
    }
}
