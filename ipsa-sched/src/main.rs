/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use ipsa_core::{halt, KernelError, Tick};
use ipsa_sched::config::{default_workload, WorkloadConfig};
use ipsa_sched::console::StdoutConsole;
use ipsa_sched::runner;
use ipsa_sched::system;

// ── CLI argument definition ───────────────────────────────────────────────────

/// IPSA fixed-priority scheduler demo.
///
/// Example:
///   ipsa-sched --workload ipsa-sched/workloads/ipsa.yaml
///   ipsa-sched --ticks 10000 --annotate
#[derive(Debug, Parser)]
#[command(
    name = "ipsa-sched",
    about = "IPSA fixed-priority real-time scheduler demo",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML workload file (built-in default when omitted).
    #[arg(short = 'w', long = "workload")]
    workload: Option<PathBuf>,

    /// Run this many ticks as fast as possible, print a summary and exit.
    #[arg(short = 'n', long = "ticks", conflicts_with = "hyperperiod")]
    ticks: Option<Tick>,

    /// Headless run over one hyperperiod of the task set.
    #[arg(long = "hyperperiod", default_value_t = false)]
    hyperperiod: bool,

    /// Override the workload's tick period in milliseconds.
    #[arg(short = 't', long = "tick-ms")]
    tick_ms: Option<u64>,

    /// Trace ring capacity; records are printed after a headless run.
    #[arg(long = "trace")]
    trace: Option<usize>,

    /// Prefix task output with the tick and task name.
    #[arg(short = 'a', long = "annotate", default_value_t = false)]
    annotate: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        workload    = ?cli.workload,
        ticks       = ?cli.ticks,
        hyperperiod = cli.hyperperiod,
        tick_ms     = ?cli.tick_ms,
        trace       = ?cli.trace,
        "Configuration"
    );

    // ── Load workload ─────────────────────────────────────────────────────────
    let mut config = match &cli.workload {
        Some(path) => match WorkloadConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load workload: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No workload file provided, using the built-in IPSA workload");
            default_workload()
        }
    };
    if let Some(ms) = cli.tick_ms {
        config.tick_period_ms = ms;
    }
    if let Some(capacity) = cli.trace {
        config.limits.trace_capacity = capacity;
    }

    // ── Assemble ──────────────────────────────────────────────────────────────
    let mut system = match system::build(&config, StdoutConsole::new(cli.annotate)) {
        Ok(system) => system,
        Err(e) => fail(e),
    };

    // ── Run ───────────────────────────────────────────────────────────────────
    let headless_ticks = match (cli.ticks, cli.hyperperiod) {
        (Some(n), _) => Some(n),
        (None, true) => match system.hyperperiod {
            Some(h) => Some(h),
            None => {
                error!("Task set has no hyperperiod; use --ticks instead");
                process::exit(1);
            }
        },
        (None, false) => None,
    };

    match headless_ticks {
        Some(ticks) => {
            if let Err(e) = runner::run_headless(&mut system.kernel, ticks) {
                halt(&e);
            }
            runner::log_summary(&system.kernel);
            if cli.trace.is_some_and(|c| c > 0) {
                runner::log_trace(&system.kernel);
            }
        }
        None => {
            let tick = Duration::from_millis(config.tick_period_ms);
            match runner::run_realtime(system, tick).await {
                Ok(never) => match never {},
                Err(e) => fail(e),
            }
        }
    }
}

/// Kernel errors are terminal and halt; anything else exits.
fn fail(e: anyhow::Error) -> ! {
    match e.downcast_ref::<KernelError>() {
        Some(kernel_error) => {
            error!("{:#}", e);
            halt(kernel_error)
        }
        None => {
            error!("{:#}", e);
            process::exit(1)
        }
    }
}
