/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Workload configuration loading and validation.
//!
//! The expected YAML structure is:
//! ```yaml
//! tick_period_ms: 1
//! limits:
//!   max_tasks: 16
//!   trace_capacity: 1024
//! queues:
//!   - name: main
//!     capacity: 2
//! timers:
//!   - name: QueueSendTimer
//!     period_ms: 2000
//!     post: { queue: main, message: 200 }
//!     reset_on_input: true
//! tasks:
//!   - name: TX1
//!     priority: 1
//!     period_ms: 166
//!     job: { kind: working, label: "Working 1" }
//! ```
//!
//! Every duration is given in milliseconds and converted to ticks by integer
//! division by `tick_period_ms`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use ipsa_core::{KernelConfig, Message, Priority, Tick, Timeout};

use crate::workload::Pacing;

// ── Data structures ───────────────────────────────────────────────────────────

/// A complete workload: kernel limits plus every queue, timer and task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkloadConfig {
    /// Length of one tick in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub timers: Vec<TimerConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

fn default_tick_period_ms() -> u64 {
    1
}

/// Static kernel limits.  Missing values fall back to [`KernelConfig`]
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_tasks: usize,
    pub max_queues: usize,
    pub max_timers: usize,
    pub trace_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        let k = KernelConfig::default();
        Self {
            max_tasks: k.max_tasks,
            max_queues: k.max_queues,
            max_timers: k.max_timers,
            trace_capacity: k.trace_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimerConfig {
    pub name: String,
    pub period_ms: u64,
    #[serde(default = "default_auto_reload")]
    pub auto_reload: bool,
    /// Message posted on every expiry.
    #[serde(default)]
    pub post: Option<PostConfig>,
    /// Restart the period whenever a line arrives on stdin.
    #[serde(default)]
    pub reset_on_input: bool,
}

fn default_auto_reload() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostConfig {
    pub queue: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    /// Higher is more urgent; 0 belongs to the idle task.
    pub priority: Priority,
    /// Release period (delay for aperiodic tasks).  Not used by receivers.
    #[serde(default)]
    pub period_ms: Option<u64>,
    /// Simulated execution time per activation.
    #[serde(default)]
    pub cost_ticks: Tick,
    #[serde(default)]
    pub pacing: Pacing,
    pub job: JobConfig,
}

/// What a task does on each activation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobConfig {
    Working {
        label: String,
    },
    Temperature {
        fahrenheit: f32,
    },
    Multiply {
        lhs: u64,
        rhs: u64,
    },
    Search {
        len: i32,
        key: i32,
    },
    Aperiodic {
        #[serde(default = "default_aperiodic_message")]
        message: String,
    },
    QueueSender {
        queue: String,
        message: Message,
        /// Wait for space up to this long; absent or 0 means fail at once.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    QueueReceiver {
        queue: String,
        sender_message: Message,
        timer_message: Message,
    },
}

fn default_aperiodic_message() -> String {
    String::from("Aperiodic task 1 finished")
}

impl JobConfig {
    /// Queue this job refers to, if any.
    pub fn queue(&self) -> Option<&str> {
        match self {
            JobConfig::QueueSender { queue, .. } | JobConfig::QueueReceiver { queue, .. } => {
                Some(queue)
            }
            _ => None,
        }
    }

    /// Whether the job runs on a release period.
    pub fn needs_period(&self) -> bool {
        !matches!(self, JobConfig::QueueReceiver { .. })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl WorkloadConfig {
    /// Parses and validates the workload at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is invalid, or
    /// the workload fails [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading workload configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open workload file: {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid workload file: {}", path.display()))?;

        info!(
            "Loaded {} task(s), {} queue(s), {} timer(s)",
            config.tasks.len(),
            config.queues.len(),
            config.timers.len()
        );
        for task in &config.tasks {
            debug!(
                "  Task: {} | priority: {} | period: {:?}ms | job: {:?}",
                task.name, task.priority, task.period_ms, task.job
            );
        }
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything the kernel cannot check for us.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.tick_period_ms > 0, "tick_period_ms must be positive");
        ensure!(!self.tasks.is_empty(), "workload defines no tasks");

        let mut queue_names = HashSet::new();
        for q in &self.queues {
            ensure!(q.capacity > 0, "queue '{}' has zero capacity", q.name);
            ensure!(queue_names.insert(q.name.as_str()), "duplicate queue '{}'", q.name);
        }
        let known_queue = |name: &str, owner: &str| -> Result<()> {
            ensure!(
                queue_names.contains(name),
                "{} refers to unknown queue '{}'",
                owner,
                name
            );
            Ok(())
        };

        let mut timer_names = HashSet::new();
        for t in &self.timers {
            ensure!(timer_names.insert(t.name.as_str()), "duplicate timer '{}'", t.name);
            ensure!(
                self.to_ticks(t.period_ms) > 0,
                "timer '{}' period of {}ms is shorter than one tick",
                t.name,
                t.period_ms
            );
            if let Some(post) = &t.post {
                known_queue(&post.queue, &format!("timer '{}'", t.name))?;
            }
        }

        let mut task_names = HashSet::new();
        let mut priorities = HashSet::new();
        for task in &self.tasks {
            ensure!(task_names.insert(task.name.as_str()), "duplicate task '{}'", task.name);
            ensure!(
                task.priority > 0,
                "task '{}': priority 0 is reserved for the idle task",
                task.name
            );
            if !priorities.insert(task.priority) {
                bail!("task '{}' shares priority {} with another task", task.name, task.priority);
            }
            match task.period_ms {
                Some(ms) => {
                    ensure!(
                        self.to_ticks(ms) > 0,
                        "task '{}' period of {}ms is shorter than one tick",
                        task.name,
                        ms
                    );
                }
                None if task.job.needs_period() => {
                    bail!("task '{}' needs period_ms", task.name)
                }
                None => {}
            }
            if let Some(queue) = task.job.queue() {
                known_queue(queue, &format!("task '{}'", task.name))?;
            }
        }
        Ok(())
    }

    /// Milliseconds to ticks, rounding down.
    pub fn to_ticks(&self, ms: u64) -> Tick {
        ms / self.tick_period_ms
    }

    /// Send timeout of a queue sender in ticks.
    pub fn send_timeout(&self, timeout_ms: Option<u64>) -> Timeout {
        match timeout_ms.map(|ms| self.to_ticks(ms)) {
            None | Some(0) => Timeout::NoWait,
            Some(n) => Timeout::Ticks(n),
        }
    }

    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig {
            max_tasks: self.limits.max_tasks,
            max_queues: self.limits.max_queues,
            max_timers: self.limits.max_timers,
            trace_capacity: self.limits.trace_capacity,
            ..KernelConfig::default()
        }
    }
}

/// The built-in demo: four periodic transmitters, one aperiodic task, and a
/// sender/receiver pair fed by a 2 s timer.  Identical to
/// `workloads/ipsa.yaml`.
///
/// Aperiodic is the most urgent task.  The queue pair sits above the
/// transmitters, with the receiver above the sender so every message is
/// printed as soon as it is posted.
pub fn default_workload() -> WorkloadConfig {
    let periodic = |name: &str, priority, period_ms, job| TaskConfig {
        name: name.to_string(),
        priority,
        period_ms: Some(period_ms),
        cost_ticks: 0,
        pacing: Pacing::Absolute,
        job,
    };

    WorkloadConfig {
        tick_period_ms: 1,
        limits: Limits::default(),
        queues: vec![QueueConfig {
            name: "main".to_string(),
            capacity: 2,
        }],
        timers: vec![TimerConfig {
            name: "QueueSendTimer".to_string(),
            period_ms: 2000,
            auto_reload: true,
            post: Some(PostConfig {
                queue: "main".to_string(),
                message: 200,
            }),
            reset_on_input: true,
        }],
        tasks: vec![
            periodic(
                "TX1",
                1,
                166,
                JobConfig::Working {
                    label: "Working 1".to_string(),
                },
            ),
            periodic("TX2", 2, 170, JobConfig::Temperature { fahrenheit: 100.0 }),
            periodic(
                "TX3",
                3,
                186,
                JobConfig::Multiply {
                    lhs: 9_876_543_210,
                    rhs: 1_234_567_890,
                },
            ),
            periodic("TX4", 4, 166, JobConfig::Search { len: 50, key: 25 }),
            periodic(
                "Aperiodic",
                7,
                50,
                JobConfig::Aperiodic {
                    message: default_aperiodic_message(),
                },
            ),
            periodic(
                "QueueSend",
                5,
                200,
                JobConfig::QueueSender {
                    queue: "main".to_string(),
                    message: 100,
                    timeout_ms: None,
                },
            ),
            TaskConfig {
                name: "QueueReceive".to_string(),
                priority: 6,
                period_ms: None,
                cost_ticks: 0,
                pacing: Pacing::Absolute,
                job: JobConfig::QueueReceiver {
                    queue: "main".to_string(),
                    sender_message: 100,
                    timer_message: 200,
                },
            },
        ],
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn err_text(yaml: &str) -> String {
        format!("{:#}", WorkloadConfig::from_yaml_str(yaml).unwrap_err())
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn shipped_workload_matches_builtin_default() {
        let shipped = include_str!("../../workloads/ipsa.yaml");
        let f = yaml_tempfile(shipped);
        let cfg = WorkloadConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg, default_workload());
    }

    #[test]
    fn minimal_workload_uses_defaults() {
        let yaml = r#"
tasks:
  - name: T
    priority: 1
    period_ms: 10
    job: { kind: working, label: hi }
"#;
        let cfg = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.tick_period_ms, 1);
        assert_eq!(cfg.limits, Limits::default());
        assert_eq!(cfg.tasks[0].pacing, Pacing::Absolute);
        assert_eq!(cfg.tasks[0].cost_ticks, 0);
        assert_eq!(cfg.kernel_config(), KernelConfig::default());
    }

    #[test]
    fn partial_limits_keep_other_defaults() {
        let yaml = r#"
limits:
  max_tasks: 3
  trace_capacity: 0
tasks:
  - name: T
    priority: 1
    period_ms: 10
    pacing: relative
    job: { kind: aperiodic }
"#;
        let cfg = WorkloadConfig::from_yaml_str(yaml).unwrap();
        let k = cfg.kernel_config();
        assert_eq!(k.max_tasks, 3);
        assert_eq!(k.trace_capacity, 0);
        assert_eq!(k.max_queues, KernelConfig::default().max_queues);
        assert_eq!(cfg.tasks[0].pacing, Pacing::Relative);
        assert_eq!(
            cfg.tasks[0].job,
            JobConfig::Aperiodic {
                message: "Aperiodic task 1 finished".to_string()
            }
        );
    }

    #[test]
    fn missing_file_returns_error() {
        assert!(WorkloadConfig::load_from_file(Path::new("/nonexistent/ipsa.yaml")).is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(WorkloadConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn unknown_job_kind_is_rejected() {
        let yaml = r#"
tasks:
  - name: T
    priority: 1
    period_ms: 10
    job: { kind: dance }
"#;
        assert!(WorkloadConfig::from_yaml_str(yaml).is_err());
    }

    // ── Tick conversion ───────────────────────────────────────────────────────

    #[test]
    fn milliseconds_round_down_to_ticks() {
        let mut cfg = default_workload();
        cfg.tick_period_ms = 10;
        assert_eq!(cfg.to_ticks(166), 16);
        assert_eq!(cfg.to_ticks(9), 0);
        assert_eq!(cfg.send_timeout(None), Timeout::NoWait);
        assert_eq!(cfg.send_timeout(Some(5)), Timeout::NoWait);
        assert_eq!(cfg.send_timeout(Some(50)), Timeout::Ticks(5));
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn default_workload_is_valid() {
        default_workload().validate().unwrap();
    }

    #[test]
    fn period_shorter_than_a_tick_is_rejected() {
        let yaml = r#"
tick_period_ms: 10
tasks:
  - name: T
    priority: 1
    period_ms: 5
    job: { kind: working, label: hi }
"#;
        assert!(err_text(yaml).contains("shorter than one tick"));
    }

    #[test]
    fn aperiodic_is_the_most_urgent_default_task() {
        let cfg = default_workload();
        let top = cfg.tasks.iter().max_by_key(|t| t.priority).unwrap();
        assert_eq!(top.name, "Aperiodic");
        let priority_of = |name: &str| {
            cfg.tasks.iter().find(|t| t.name == name).unwrap().priority
        };
        assert!(priority_of("QueueReceive") > priority_of("QueueSend"));
        assert!(priority_of("QueueSend") > priority_of("TX4"));
    }

    #[test]
    fn duplicate_priority_is_rejected() {
        let mut cfg = default_workload();
        cfg.tasks[1].priority = cfg.tasks[0].priority;
        let err = format!("{:#}", cfg.validate().unwrap_err());
        assert!(err.contains("shares priority 1"), "{err}");
    }

    #[test]
    fn duplicate_task_name_is_rejected() {
        let mut cfg = default_workload();
        cfg.tasks[1].name = "TX1".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn idle_priority_is_rejected() {
        let mut cfg = default_workload();
        cfg.tasks[0].priority = 0;
        let err = format!("{:#}", cfg.validate().unwrap_err());
        assert!(err.contains("reserved for the idle task"), "{err}");
    }

    #[test]
    fn unknown_queue_reference_is_rejected() {
        let mut cfg = default_workload();
        cfg.queues[0].name = "other".to_string();
        let err = format!("{:#}", cfg.validate().unwrap_err());
        assert!(err.contains("unknown queue 'main'"), "{err}");
    }

    #[test]
    fn zero_capacity_queue_is_rejected() {
        let mut cfg = default_workload();
        cfg.queues[0].capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn periodic_job_without_period_is_rejected() {
        let mut cfg = default_workload();
        cfg.tasks[0].period_ms = None;
        let err = format!("{:#}", cfg.validate().unwrap_err());
        assert!(err.contains("needs period_ms"), "{err}");
    }

    #[test]
    fn empty_workload_is_rejected() {
        assert!(err_text("tasks: []\n").contains("no tasks"));
    }
}
