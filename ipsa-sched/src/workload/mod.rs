/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task bodies of the IPSA workload.
//!
//! Every periodic task runs the same loop and differs only in its [`Job`]:
//!
//! ```text
//!   Start ──► run job, emit line ──► Work(cost)? ──► sleep until next release
//!               ▲                                            │
//!               └────────────────── Delayed ◄────────────────┘
//! ```
//!
//! [`Pacing::Absolute`] computes each release from the previous one, so the
//! k-th release is exactly `first + k·period` however long the job took.
//! [`Pacing::Relative`] sleeps `period` after the job finishes and drifts by
//! the job's cost every cycle.

pub mod jobs;
pub mod messaging;

pub use jobs::{Multiply, Search, Temperature, Working};
pub use messaging::{QueueReceiver, QueueSender};

use serde::Deserialize;

use ipsa_core::{Action, Resume, TaskBody, TaskContext, Tick};

/// Payload of one activation.  Returns the console line to print.
pub trait Job: Send {
    fn run(&mut self) -> String;
}

/// How the next release of a periodic task is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// `delay_until(previous_release + period)`.
    #[default]
    Absolute,
    /// `delay_for(period)` after the activation completes.
    Relative,
}

/// Release bookkeeping shared by the periodic bodies.  Tasks exist before
/// the scheduler starts, so the first release is tick 0.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Release {
    period: Tick,
    pacing: Pacing,
    last: Tick,
}

impl Release {
    pub(crate) fn new(period: Tick, pacing: Pacing) -> Self {
        Self {
            period,
            pacing,
            last: 0,
        }
    }

    pub(crate) fn sleep(&mut self) -> Action {
        match self.pacing {
            Pacing::Absolute => {
                self.last += self.period;
                Action::DelayUntil(self.last)
            }
            Pacing::Relative => Action::DelayFor(self.period),
        }
    }
}

// ── Periodic ──────────────────────────────────────────────────────────────────

/// Runs `job` once per period, first at the tick the scheduler starts.
pub struct PeriodicTask<J> {
    job: J,
    release: Release,
    /// Simulated execution time per activation, in ticks.
    cost: Tick,
}

impl<J: Job> PeriodicTask<J> {
    pub fn new(job: J, period: Tick) -> Self {
        Self {
            job,
            release: Release::new(period, Pacing::Absolute),
            cost: 0,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.release.pacing = pacing;
        self
    }

    pub fn with_cost(mut self, cost: Tick) -> Self {
        self.cost = cost;
        self
    }

    fn activate(&mut self, cx: &mut TaskContext<'_>) -> Action {
        let line = self.job.run();
        cx.emit(line);
        if self.cost > 0 {
            Action::Work(self.cost)
        } else {
            self.release.sleep()
        }
    }
}

impl<J: Job> TaskBody for PeriodicTask<J> {
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action {
        match resume {
            Resume::Start | Resume::Delayed => self.activate(cx),
            Resume::WorkDone | Resume::Sent(_) | Resume::Received(_) => self.release.sleep(),
        }
    }
}

// ── Aperiodic ─────────────────────────────────────────────────────────────────

/// Waits first, then reports that its (simulated) work finished.
pub struct AperiodicTask {
    release: Release,
    message: String,
}

impl AperiodicTask {
    pub fn new(delay: Tick, message: impl Into<String>) -> Self {
        Self {
            release: Release::new(delay, Pacing::Absolute),
            message: message.into(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.release.pacing = pacing;
        self
    }
}

impl TaskBody for AperiodicTask {
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action {
        if resume == Resume::Delayed {
            cx.emit(&self.message);
        }
        self.release.sleep()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
