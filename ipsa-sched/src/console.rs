/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Terminal sink for task status lines.

use std::io::{self, Write};

use tracing::debug;

use ipsa_core::{ConsoleSink, Tick};

/// Prints every task line on stdout, optionally prefixed with the tick and
/// task name.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole {
    annotate: bool,
}

impl StdoutConsole {
    pub fn new(annotate: bool) -> Self {
        Self { annotate }
    }

    fn format(&self, tick: Tick, task: &str, line: &str) -> String {
        if self.annotate {
            format!("[{tick:>8}] {task:<12} {line}")
        } else {
            line.to_string()
        }
    }
}

impl ConsoleSink for StdoutConsole {
    fn emit(&mut self, tick: Tick, task: &str, line: &str) {
        let text = self.format(tick, task, line);
        if let Err(e) = writeln!(io::stdout().lock(), "{text}") {
            // Console output is best effort; scheduling must go on.
            debug!(error = %e, "console write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_is_the_line_itself() {
        assert_eq!(StdoutConsole::new(false).format(7, "TX1", "Working 1"), "Working 1");
    }

    #[test]
    fn annotated_output_carries_tick_and_task() {
        assert_eq!(
            StdoutConsole::new(true).format(166, "TX1", "Working 1"),
            "[     166] TX1          Working 1"
        );
    }
}
