/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Builds a ready-to-start kernel from a [`WorkloadConfig`].
//!
//! Creation order is queues, then timers (their callbacks capture queue ids),
//! then tasks.  Any kernel creation failure is returned as a
//! [`KernelError`] inside the `anyhow` chain so the caller can tell it apart
//! from configuration mistakes.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use ipsa_core::analysis;
use ipsa_core::{
    ConsoleSink, Kernel, QueueId, Tick, TimerContext, TimerId, TimerSpec, TaskSpec,
};

use crate::config::{JobConfig, TaskConfig, WorkloadConfig};
use crate::workload::{
    AperiodicTask, Job, Multiply, PeriodicTask, QueueReceiver, QueueSender, Search, Temperature,
    Working,
};

/// An assembled kernel plus what the runner needs to drive it.
pub struct System {
    pub kernel: Kernel,
    /// Timers restarted by keyboard input.
    pub reset_timers: Vec<TimerId>,
    /// LCM of all task periods, when it fits in a tick counter.
    pub hyperperiod: Option<Tick>,
}

pub fn build(config: &WorkloadConfig, console: impl ConsoleSink + 'static) -> Result<System> {
    config.validate()?;
    let mut kernel = Kernel::new(config.kernel_config(), console);

    let mut queues: HashMap<&str, QueueId> = HashMap::new();
    for q in &config.queues {
        let id = kernel
            .create_queue(q.name.as_str(), q.capacity)
            .with_context(|| format!("creating queue '{}'", q.name))?;
        queues.insert(q.name.as_str(), id);
    }
    let queue_id = |name: &str| -> Result<QueueId> {
        queues
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown queue '{}'", name))
    };

    let mut reset_timers = Vec::new();
    for t in &config.timers {
        let spec = if t.auto_reload {
            TimerSpec::auto_reload(t.name.as_str(), config.to_ticks(t.period_ms))
        } else {
            TimerSpec::one_shot(t.name.as_str(), config.to_ticks(t.period_ms))
        };
        let post = match &t.post {
            Some(p) => Some((queue_id(&p.queue)?, p.message)),
            None => None,
        };
        let id = kernel
            .create_timer(spec, move |cx: &mut TimerContext<'_>| match post {
                // A full queue is counted and logged by the context.
                Some((queue, message)) => {
                    let _ = cx.post(queue, message);
                }
                None => debug!(timer = %cx.name(), tick = cx.now(), "timer expired"),
            })
            .with_context(|| format!("creating timer '{}'", t.name))?;
        if t.reset_on_input {
            reset_timers.push(id);
        }
    }

    for task in &config.tasks {
        create_task(&mut kernel, config, task, &queue_id)
            .with_context(|| format!("creating task '{}'", task.name))?;
    }

    let hyperperiod = analysis::hyperperiod(&kernel.task_specs()).ok();
    info!(
        tasks = config.tasks.len(),
        queues = config.queues.len(),
        timers = config.timers.len(),
        hyperperiod = ?hyperperiod,
        "workload assembled"
    );

    Ok(System {
        kernel,
        reset_timers,
        hyperperiod,
    })
}

fn create_task(
    kernel: &mut Kernel,
    config: &WorkloadConfig,
    task: &TaskConfig,
    queue_id: &dyn Fn(&str) -> Result<QueueId>,
) -> Result<()> {
    let period = task.period_ms.map(|ms| config.to_ticks(ms));
    let spec = match period {
        Some(p) => TaskSpec::new(task.name.as_str(), task.priority).periodic(p, task.cost_ticks),
        None => TaskSpec::new(task.name.as_str(), task.priority),
    };
    let period = period.unwrap_or_default();

    match &task.job {
        JobConfig::Working { label } => {
            kernel.create_task(spec, periodic_body(Working::new(label.as_str()), period, task))?
        }
        JobConfig::Temperature { fahrenheit } => {
            kernel.create_task(spec, periodic_body(Temperature::new(*fahrenheit), period, task))?
        }
        JobConfig::Multiply { lhs, rhs } => {
            kernel.create_task(spec, periodic_body(Multiply::new(*lhs, *rhs), period, task))?
        }
        JobConfig::Search { len, key } => {
            kernel.create_task(spec, periodic_body(Search::new(*len, *key), period, task))?
        }
        JobConfig::Aperiodic { message } => kernel.create_task(
            spec,
            AperiodicTask::new(period, message.as_str()).with_pacing(task.pacing),
        )?,
        JobConfig::QueueSender {
            queue,
            message,
            timeout_ms,
        } => kernel.create_task(
            spec,
            QueueSender::new(queue_id(queue)?, *message, period)
                .with_timeout(config.send_timeout(*timeout_ms)),
        )?,
        JobConfig::QueueReceiver {
            queue,
            sender_message,
            timer_message,
        } => kernel.create_task(
            spec,
            QueueReceiver::new(queue_id(queue)?, *sender_message, *timer_message),
        )?,
    };
    Ok(())
}

fn periodic_body<J: Job + 'static>(job: J, period: Tick, task: &TaskConfig) -> PeriodicTask<J> {
    PeriodicTask::new(job, period)
        .with_pacing(task.pacing)
        .with_cost(task.cost_ticks)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
