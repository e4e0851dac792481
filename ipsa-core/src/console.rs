/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Console side channel.
//!
//! Tasks print one status line per activation.  The lines are not part of
//! scheduling correctness, so the sink is a trait object owned by the kernel:
//! the binary prints to stdout, tests collect into a [`ConsoleLog`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::tick::Tick;

/// Destination for task status lines.
pub trait ConsoleSink: Send {
    fn emit(&mut self, tick: Tick, task: &str, line: &str);
}

/// One line written by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub tick: Tick,
    pub task: String,
    pub text: String,
}

/// Shared in-memory console.  Clones share the same buffer, so a test can
/// hand one clone to the kernel and inspect another.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    lines: Arc<Mutex<Vec<ConsoleLine>>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.guard().clone()
    }

    /// Text of every line written by `task`, in order.
    pub fn texts_of(&self, task: &str) -> Vec<String> {
        self.guard()
            .iter()
            .filter(|l| l.task == task)
            .map(|l| l.text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    // A panicking test thread must not hide the lines it already wrote.
    fn guard(&self) -> MutexGuard<'_, Vec<ConsoleLine>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConsoleSink for ConsoleLog {
    fn emit(&mut self, tick: Tick, task: &str, line: &str) {
        self.guard().push(ConsoleLine {
            tick,
            task: task.to_string(),
            text: line.to_string(),
        });
    }
}

/// Routes task output into `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn emit(&mut self, tick: Tick, task: &str, line: &str) {
        info!(tick = tick, task = %task, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_buffer() {
        let log = ConsoleLog::new();
        let mut writer = log.clone();
        writer.emit(3, "TX1", "Working 1");
        writer.emit(5, "TX2", "other");

        assert_eq!(log.len(), 2);
        assert_eq!(log.texts_of("TX1"), vec!["Working 1".to_string()]);
        assert_eq!(log.lines()[1].tick, 5);
    }

    #[test]
    fn new_log_is_empty() {
        assert!(ConsoleLog::new().is_empty());
    }
}
