/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Offline schedulability helpers for a task set.
//!
//! Nothing here affects dispatch.  The kernel logs the result once at start so
//! an overloaded configuration is visible before the first deadline is missed.
//!
//! **Liu & Layland (1973)**: `n` independent periodic tasks with rate-monotonic
//! priorities are guaranteed schedulable on one CPU when
//!
//! $$U = \sum_{i=1}^{n} \frac{C_i}{T_i} \leq n \left(2^{1/n} - 1\right)$$
//!
//! Above the bound (but below 1.0) the set may still be schedulable; only
//! response-time analysis can tell.
//!
//! The **hyperperiod** (LCM of all periods) is the length after which the
//! release pattern of a periodic set repeats.

use thiserror::Error;

use crate::task::TaskSpec;
use crate::tick::Tick;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HyperperiodError {
    #[error("no periodic task in the set")]
    NoPeriodicTasks,

    #[error("LCM overflow computing lcm({a}, {b})")]
    Overflow { a: Tick, b: Tick },
}

/// Highest total utilisation at which `n` rate-monotonic tasks are always
/// schedulable.  Starts at 1.0 for one task and falls towards `ln 2`; no
/// tasks gives no budget.
pub fn liu_layland_bound(n: usize) -> f64 {
    match n {
        0 => 0.0,
        n => {
            let n = n as f64;
            n * (n.recip().exp2() - 1.0)
        }
    }
}

/// Periodic members of `tasks` as `(period, wcet)`; zero periods are skipped.
fn periodic(tasks: &[TaskSpec]) -> impl Iterator<Item = (Tick, Tick)> + '_ {
    tasks
        .iter()
        .filter_map(|t| t.period.filter(|p| *p > 0).map(|p| (p, t.wcet)))
}

/// Total utilisation `Σ wcet / period` over the periodic tasks.
pub fn utilisation(tasks: &[TaskSpec]) -> f64 {
    periodic(tasks).map(|(p, c)| c as f64 / p as f64).sum()
}

/// `None` when the set is provably schedulable, otherwise
/// `Some(total_utilisation)` for the caller to warn about.
pub fn check_liu_layland(tasks: &[TaskSpec]) -> Option<f64> {
    let n = periodic(tasks).count();
    if n == 0 {
        return None;
    }
    let total = utilisation(tasks);
    (total > liu_layland_bound(n)).then_some(total)
}

/// Greatest common divisor of two tick counts; `gcd(x, 0) == x`.
pub fn gcd(mut a: Tick, mut b: Tick) -> Tick {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Smallest tick count both `a` and `b` divide, or `Overflow` when it does
/// not fit in a [`Tick`].  A zero period yields zero.
pub fn lcm(a: Tick, b: Tick) -> Result<Tick, HyperperiodError> {
    match (a, b) {
        (0, _) | (_, 0) => Ok(0),
        _ => b
            .checked_mul(a / gcd(a, b))
            .ok_or(HyperperiodError::Overflow { a, b }),
    }
}

/// LCM of every non-zero period in the set.
pub fn hyperperiod(tasks: &[TaskSpec]) -> Result<Tick, HyperperiodError> {
    let mut periods = periodic(tasks).map(|(p, _)| p);
    let first = periods.next().ok_or(HyperperiodError::NoPeriodicTasks)?;
    periods.try_fold(first, lcm)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn task(period: Tick, wcet: Tick) -> TaskSpec {
        TaskSpec::new("t", 1).periodic(period, wcet)
    }

    // ── Liu & Layland ─────────────────────────────────────────────────────────

    #[test]
    fn bound_values() {
        assert_eq!(liu_layland_bound(0), 0.0);
        assert!((liu_layland_bound(1) - 1.0).abs() < 1e-10);
        assert!((liu_layland_bound(2) - 0.8284).abs() < 1e-3);
        assert!((liu_layland_bound(1000) - 2.0_f64.ln()).abs() < 1e-3);
    }

    #[test]
    fn classic_three_task_set_is_feasible() {
        // U = 0.30 + 0.25 + 0.16 = 0.71 < bound(3) ≈ 0.780
        let set = [task(10, 3), task(20, 5), task(50, 8)];
        assert_eq!(check_liu_layland(&set), None);
    }

    #[test]
    fn overloaded_set_reports_utilisation() {
        let set = [task(100, 35), task(100, 35), task(100, 35)];
        let u = check_liu_layland(&set).expect("set is overloaded");
        assert!((u - 1.05).abs() < 1e-9, "got {u}");
    }

    #[test]
    fn event_driven_tasks_are_ignored() {
        let set = [TaskSpec::new("rx", 9), task(10, 5)];
        assert_eq!(check_liu_layland(&set), None);
        assert!((utilisation(&set) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn full_single_task_is_at_the_bound() {
        assert_eq!(check_liu_layland(&[task(1000, 1000)]), None);
    }

    // ── Hyperperiod ───────────────────────────────────────────────────────────

    #[test]
    fn gcd_and_lcm_basics() {
        assert_eq!(gcd(12, 8), 4);
        assert_eq!(gcd(0, 5), 5);
        assert_eq!(lcm(4, 6), Ok(12));
        assert_eq!(lcm(0, 6), Ok(0));
    }

    #[test]
    fn lcm_is_symmetric_and_reduces_by_the_gcd() {
        assert_eq!(gcd(18, 12), gcd(12, 18));
        assert_eq!(gcd(17, 5), 1);
        assert_eq!(lcm(166, 170), lcm(170, 166));
        assert_eq!(lcm(166, 170), Ok(14_110));
        assert_eq!(lcm(50, 200), Ok(200));
        assert_eq!(lcm(7, 0), Ok(0));
    }

    #[test]
    fn lcm_overflow_is_an_error() {
        let a = u64::MAX / 2 + 1;
        let b = u64::MAX / 2 + 3;
        assert!(matches!(lcm(a, b), Err(HyperperiodError::Overflow { .. })));
    }

    #[test]
    fn hyperperiod_of_default_transmitters() {
        // 166 = 2·83, 170 = 2·5·17, 186 = 2·3·31
        let set = [task(166, 1), task(170, 1), task(186, 1), task(166, 1)];
        assert_eq!(hyperperiod(&set), Ok(2 * 83 * 5 * 17 * 3 * 31));
    }

    #[test]
    fn hyperperiod_needs_a_periodic_task() {
        assert_eq!(
            hyperperiod(&[TaskSpec::new("rx", 1)]),
            Err(HyperperiodError::NoPeriodicTasks)
        );
    }
}
