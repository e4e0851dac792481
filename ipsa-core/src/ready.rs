/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ready Set: tasks eligible to run, partitioned by priority.
//!
//! Each level is a FIFO, so equal-priority tasks run in the order they became
//! Ready.  `BTreeMap` keeps levels sorted; the highest level is the last key.
//! The Running task is not a member.

use std::collections::{BTreeMap, VecDeque};

use crate::task::{Priority, TaskId};

#[derive(Debug, Default)]
pub struct ReadySet {
    levels: BTreeMap<Priority, VecDeque<TaskId>>,
    len: usize,
}

impl ReadySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` behind every other task of its level.
    pub fn push_back(&mut self, task: TaskId, priority: Priority) {
        self.levels.entry(priority).or_default().push_back(task);
        self.len += 1;
    }

    /// Highest priority that has at least one Ready task.
    pub fn highest_priority(&self) -> Option<Priority> {
        self.levels.keys().next_back().copied()
    }

    /// Remove and return the oldest task of the highest level.
    pub fn pop_highest(&mut self) -> Option<TaskId> {
        let mut entry = self.levels.last_entry()?;
        let task = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }
        if task.is_some() {
            self.len -= 1;
        }
        task
    }

    /// Remove `task` from its level.  Returns `false` if it was not present.
    pub fn remove(&mut self, task: TaskId, priority: Priority) -> bool {
        let Some(level) = self.levels.get_mut(&priority) else {
            return false;
        };
        let Some(pos) = level.iter().position(|t| *t == task) else {
            return false;
        };
        level.remove(pos);
        if level.is_empty() {
            self.levels.remove(&priority);
        }
        self.len -= 1;
        true
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.levels.values().any(|level| level.contains(&task))
    }

    /// All members, highest priority first, FIFO within a level.
    pub fn iter(&self) -> impl Iterator<Item = (Priority, TaskId)> + '_ {
        self.levels
            .iter()
            .rev()
            .flat_map(|(p, level)| level.iter().map(move |t| (*p, *t)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
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
    fn pops_highest_priority_first() {
        let mut ready = ReadySet::new();
        ready.push_back(t(1), 1);
        ready.push_back(t(2), 5);
        ready.push_back(t(3), 3);

        assert_eq!(ready.highest_priority(), Some(5));
        assert_eq!(ready.pop_highest(), Some(t(2)));
        assert_eq!(ready.pop_highest(), Some(t(3)));
        assert_eq!(ready.pop_highest(), Some(t(1)));
        assert_eq!(ready.pop_highest(), None);
        assert!(ready.is_empty());
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut ready = ReadySet::new();
        ready.push_back(t(4), 2);
        ready.push_back(t(7), 2);
        ready.push_back(t(5), 2);

        assert_eq!(ready.pop_highest(), Some(t(4)));
        assert_eq!(ready.pop_highest(), Some(t(7)));
        assert_eq!(ready.pop_highest(), Some(t(5)));
    }

    #[test]
    fn remove_drops_member_and_empty_level() {
        let mut ready = ReadySet::new();
        ready.push_back(t(1), 4);
        ready.push_back(t(2), 1);

        assert!(ready.remove(t(1), 4));
        assert!(!ready.remove(t(1), 4), "second removal finds nothing");
        assert_eq!(ready.highest_priority(), Some(1));
        assert_eq!(ready.len(), 1);
        assert!(!ready.contains(t(1)));
        assert!(ready.contains(t(2)));
    }

    #[test]
    fn iter_walks_highest_level_first() {
        let mut ready = ReadySet::new();
        ready.push_back(t(1), 1);
        ready.push_back(t(2), 3);
        ready.push_back(t(3), 3);
        let order: Vec<_> = ready.iter().collect();
        assert_eq!(order, vec![(3, t(2)), (3, t(3)), (1, t(1))]);
    }
}
