/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! ipsa-sched – the IPSA workload running on ipsa-core
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/     – YAML workload file, validation, built-in default
//! ├── workload/   – periodic / aperiodic task bodies and their jobs,
//! │                 queue sender / receiver
//! ├── system      – kernel assembly from a WorkloadConfig
//! ├── runner      – real-time (tokio) and headless drivers, run summary
//! └── console     – stdout sink for task status lines
//! ```

pub mod config;
pub mod console;
pub mod runner;
pub mod system;
pub mod workload;
