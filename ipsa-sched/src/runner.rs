/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Drives a [`System`] either in real time or headless.
//!
//! Real time:
//!
//! ```text
//!   tokio interval ──► KernelEvent::Tick ───────┐
//!                                               ├──► mpsc ──► run_forever (blocking thread)
//!   stdin line    ──► KernelEvent::ResetTimer ──┘
//! ```
//!
//! The interval uses [`MissedTickBehavior::Burst`]: a late tick is delivered
//! as soon as possible rather than skipped, so the kernel never loses time.
//! Headless runs call [`Kernel::run_for`] back to back with no clock at all.

use std::convert::Infallible;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use ipsa_core::{Kernel, KernelError, KernelEvent, Tick, TimerId};

use crate::system::System;

/// Events buffered between the producers and the kernel thread.
const EVENT_BACKLOG: usize = 1024;

// ── Event source ──────────────────────────────────────────────────────────────

/// Blocking adapter from the async channel to the kernel's tick source.
pub struct ChannelSource {
    rx: mpsc::Receiver<KernelEvent>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<KernelEvent>) -> Self {
        Self { rx }
    }
}

impl Iterator for ChannelSource {
    type Item = KernelEvent;

    /// Must not be called from inside the runtime; use a blocking thread.
    fn next(&mut self) -> Option<KernelEvent> {
        self.rx.blocking_recv()
    }
}

// ── Producers ─────────────────────────────────────────────────────────────────

/// One `Tick` per `period`, starting one period from now.
pub fn spawn_ticker(period: Duration, tx: mpsc::Sender<KernelEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        // The first tick completes immediately.
        interval.tick().await;

        info!("Ticker started. Tick period: {:?}", period);
        loop {
            interval.tick().await;
            if tx.send(KernelEvent::Tick).await.is_err() {
                debug!("kernel gone, ticker stopping");
                return;
            }
        }
    })
}

/// Every line read from stdin resets each timer in `timers`.
pub fn spawn_reset_on_input(timers: Vec<TimerId>, tx: mpsc::Sender<KernelEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(_)) => {
                    for &timer in &timers {
                        if tx.send(KernelEvent::ResetTimer(timer)).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, timer reset input disabled");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed, timer reset input disabled");
                    return;
                }
            }
        }
    })
}

// ── Runs ──────────────────────────────────────────────────────────────────────

/// Run until the kernel reports a fatal error.  The error comes back inside
/// the `anyhow` chain as a [`KernelError`].
pub async fn run_realtime(system: System, tick_period: Duration) -> Result<Infallible> {
    let (tx, rx) = mpsc::channel(EVENT_BACKLOG);

    let ticker = spawn_ticker(tick_period, tx.clone());
    let input = if system.reset_timers.is_empty() {
        None
    } else {
        info!("Press Enter to reset timer(s) {:?}", system.reset_timers);
        Some(spawn_reset_on_input(system.reset_timers.clone(), tx))
    };

    let mut kernel = system.kernel;
    let outcome = tokio::task::spawn_blocking(move || {
        let mut source = ChannelSource::new(rx);
        kernel.run_forever(&mut source)
    })
    .await
    .context("scheduler thread panicked")?;

    ticker.abort();
    if let Some(input) = input {
        input.abort();
    }

    match outcome {
        Ok(never) => match never {},
        Err(e) => Err(e.into()),
    }
}

/// Run `ticks` ticks as fast as possible.
pub fn run_headless(kernel: &mut Kernel, ticks: Tick) -> Result<(), KernelError> {
    info!(ticks = ticks, "Headless run");
    kernel.run_for(ticks)
}

/// Per-task and kernel-wide counters, one log line each.
pub fn log_summary(kernel: &Kernel) {
    let stats = kernel.stats();
    info!(
        ticks = stats.ticks,
        idle_ticks = stats.idle_ticks,
        context_switches = stats.context_switches,
        preemptions = stats.preemptions,
        deadline_overruns = stats.deadline_overruns,
        queue_timeouts = stats.queue_timeouts,
        timer_fires = stats.timer_fires,
        timer_drops = stats.timer_drops,
        "Run summary"
    );
    for id in kernel.task_ids() {
        let (Some(name), Some(s)) = (kernel.task_name(id), kernel.task_stats(id)) else {
            continue;
        };
        info!(
            "  [{name}]  dispatches={d}  preemptions={p}  cpu_ticks={c}  overruns={o}  timeouts={t}",
            name = name,
            d = s.dispatches,
            p = s.preemptions,
            c = s.cpu_ticks,
            o = s.deadline_overruns,
            t = s.queue_timeouts,
        );
    }
}

/// Log every retained trace record.
pub fn log_trace(kernel: &Kernel) {
    for record in kernel.trace() {
        info!("  trace @{:>8}: {:?}", record.tick, record.event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ipsa_core::{Action, ConsoleLog, KernelConfig, Resume, TaskContext, TaskSpec};

    fn spinning_system() -> System {
        let mut kernel = Kernel::new(KernelConfig::default(), ConsoleLog::new());
        kernel
            .create_task(
                TaskSpec::new("spin", 1),
                |_: &mut TaskContext<'_>, _: Resume| Action::Work(0),
            )
            .unwrap();
        System {
            kernel,
            reset_timers: Vec::new(),
            hyperperiod: None,
        }
    }

    #[test]
    fn closed_channel_is_a_lost_tick_source() {
        let (tx, rx) = mpsc::channel(8);
        for _ in 0..5 {
            tx.try_send(KernelEvent::Tick).unwrap();
        }
        drop(tx);

        let mut kernel = Kernel::new(KernelConfig::default(), ConsoleLog::new());
        let err = kernel.run_forever(&mut ChannelSource::new(rx)).unwrap_err();

        assert!(matches!(err, KernelError::TickSourceLost));
        assert_eq!(kernel.now(), 5);
    }

    #[tokio::test]
    async fn ticker_delivers_ticks() {
        let (tx, mut rx) = mpsc::channel(8);
        let ticker = spawn_ticker(Duration::from_millis(1), tx);
        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(KernelEvent::Tick));
        }
        ticker.abort();
    }

    #[tokio::test]
    async fn fatal_kernel_error_ends_realtime_run() {
        let err = run_realtime(spinning_system(), Duration::from_millis(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<KernelError>(),
            Some(KernelError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn headless_run_advances_exactly() {
        let mut kernel = Kernel::new(KernelConfig::default(), ConsoleLog::new());
        run_headless(&mut kernel, 42).unwrap();
        assert_eq!(kernel.now(), 42);
        log_summary(&kernel);
        log_trace(&kernel);
    }
}
