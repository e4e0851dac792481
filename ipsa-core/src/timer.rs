/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Software Timer Service.
//!
//! Timers are not tasks.  They are evaluated inside tick processing, after
//! delayed tasks are woken and before dispatch, so a firing never waits behind
//! task-level scheduling.  Callbacks get a [`TimerContext`] whose only effect
//! is a non-blocking [`post`](TimerContext::post): a full queue drops the
//! message, logs it and bumps the timer's drop counter.
//!
//! Auto-reload timers reschedule from the previous *scheduled* fire tick
//! (`next_fire += period`), never from "now", so they do not drift.

use std::fmt;

use tracing::{trace, warn};

use crate::queue::{Message, QueueError, QueueId};
use crate::tick::Tick;

/// Stable index of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) usize);

impl TimerId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Non-blocking enqueue into a kernel queue, as seen from a timer callback.
pub trait MessagePoster {
    fn post(&mut self, queue: QueueId, message: Message) -> Result<(), QueueError>;
}

/// Expiry callback.  Must be short; it runs inside tick processing.
pub type TimerCallback = Box<dyn FnMut(&mut TimerContext<'_>) + Send>;

/// Creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSpec {
    pub name: String,
    pub period: Tick,
    pub auto_reload: bool,
}

impl TimerSpec {
    pub fn auto_reload(name: impl Into<String>, period: Tick) -> Self {
        Self {
            name: name.into(),
            period,
            auto_reload: true,
        }
    }

    pub fn one_shot(name: impl Into<String>, period: Tick) -> Self {
        Self {
            name: name.into(),
            period,
            auto_reload: false,
        }
    }
}

/// Handed to a callback while its timer fires.
pub struct TimerContext<'a> {
    timer: TimerId,
    name: &'a str,
    now: Tick,
    poster: &'a mut dyn MessagePoster,
    dropped: u64,
}

impl<'a> TimerContext<'a> {
    pub fn timer(&self) -> TimerId {
        self.timer
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Enqueue without blocking.  On a full queue the message is dropped and
    /// counted; the error is returned for information only.
    pub fn post(&mut self, queue: QueueId, message: Message) -> Result<(), QueueError> {
        let result = self.poster.post(queue, message);
        if let Err(QueueError::Full) = result {
            self.dropped += 1;
            warn!(
                timer = %self.name,
                queue = %queue,
                message = message,
                tick = self.now,
                "queue full – timer message dropped"
            );
        }
        result
    }
}

pub struct SoftwareTimer {
    spec: TimerSpec,
    /// `None` while dormant (stopped, or a one-shot that already fired).
    next_fire: Option<Tick>,
    callback: TimerCallback,
    fires: u64,
    dropped: u64,
}

impl SoftwareTimer {
    /// Timers start active: first expiry one period after creation.
    pub fn new(spec: TimerSpec, callback: TimerCallback, now: Tick) -> Self {
        let next_fire = Some(now.saturating_add(spec.period));
        Self {
            spec,
            next_fire,
            callback,
            fires: 0,
            dropped: 0,
        }
    }

    /// Restart the period from `now`.
    pub fn reset(&mut self, now: Tick) {
        self.next_fire = Some(now.saturating_add(self.spec.period));
    }

    /// Activate a dormant timer; an active one keeps its schedule.
    pub fn start(&mut self, now: Tick) {
        if self.next_fire.is_none() {
            self.reset(now);
        }
    }

    pub fn stop(&mut self) {
        self.next_fire = None;
    }

    /// Replace the period (must be non-zero) and restart from `now`.
    pub fn change_period(&mut self, period: Tick, now: Tick) {
        self.spec.period = period;
        self.reset(now);
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn period(&self) -> Tick {
        self.spec.period
    }

    pub fn is_auto_reload(&self) -> bool {
        self.spec.auto_reload
    }

    pub fn next_fire(&self) -> Option<Tick> {
        self.next_fire
    }

    pub fn is_active(&self) -> bool {
        self.next_fire.is_some()
    }

    /// Number of expiries so far.
    pub fn fires(&self) -> u64 {
        self.fires
    }

    /// Messages dropped because the target queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// One expiry processed by [`TimerService::fire_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFiring {
    pub timer: TimerId,
    /// The scheduled expiry tick (equals "now" unless catching up).
    pub scheduled: Tick,
    pub dropped: u64,
}

#[derive(Default)]
pub struct TimerService {
    timers: Vec<SoftwareTimer>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, timer: SoftwareTimer) -> TimerId {
        self.timers.push(timer);
        TimerId(self.timers.len() - 1)
    }

    pub fn get(&self, id: TimerId) -> Option<&SoftwareTimer> {
        self.timers.get(id.0)
    }

    pub fn get_mut(&mut self, id: TimerId) -> Option<&mut SoftwareTimer> {
        self.timers.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Total expiries and drops across all timers.
    pub fn totals(&self) -> (u64, u64) {
        self.timers
            .iter()
            .fold((0, 0), |(f, d), t| (f + t.fires, d + t.dropped))
    }

    /// Fire every timer whose `next_fire <= now`, earliest scheduled tick
    /// first (ties by id).  Auto-reload timers are rescheduled before their
    /// callback runs, so a callback may safely reset or inspect them.
    pub fn fire_due(&mut self, now: Tick, poster: &mut dyn MessagePoster) -> Vec<TimerFiring> {
        let mut fired = Vec::new();

        while let Some(idx) = self.next_due(now) {
            let timer = &mut self.timers[idx];
            let scheduled = timer.next_fire.unwrap_or(now);
            timer.next_fire = if timer.spec.auto_reload {
                Some(scheduled.saturating_add(timer.spec.period))
            } else {
                None
            };
            timer.fires += 1;

            let mut cx = TimerContext {
                timer: TimerId(idx),
                name: &timer.spec.name,
                now,
                poster: &mut *poster,
                dropped: 0,
            };
            (timer.callback)(&mut cx);
            let dropped = cx.dropped;
            timer.dropped += dropped;

            trace!(
                timer = %timer.spec.name,
                scheduled = scheduled,
                next = ?timer.next_fire,
                "timer fired"
            );
            fired.push(TimerFiring {
                timer: TimerId(idx),
                scheduled,
                dropped,
            });
        }

        fired
    }

    fn next_due(&self, now: Tick) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.next_fire.filter(|&f| f <= now).map(|f| (f, i)))
            .min()
            .map(|(_, i)| i)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Poster backed by a plain vector with a fixed capacity.
    struct VecPoster {
        items: Vec<(QueueId, Message)>,
        capacity: usize,
    }

    impl MessagePoster for VecPoster {
        fn post(&mut self, queue: QueueId, message: Message) -> Result<(), QueueError> {
            if self.items.len() >= self.capacity {
                return Err(QueueError::Full);
            }
            self.items.push((queue, message));
            Ok(())
        }
    }

    fn poster(capacity: usize) -> VecPoster {
        VecPoster {
            items: Vec::new(),
            capacity,
        }
    }

    fn posting_timer(spec: TimerSpec, message: Message) -> SoftwareTimer {
        SoftwareTimer::new(
            spec,
            Box::new(move |cx: &mut TimerContext<'_>| {
                let _ = cx.post(QueueId(0), message);
            }),
            0,
        )
    }

    fn run(service: &mut TimerService, poster: &mut VecPoster, ticks: Tick) -> Vec<Tick> {
        let mut fire_ticks = Vec::new();
        for now in 1..=ticks {
            for _ in service.fire_due(now, poster) {
                fire_ticks.push(now);
            }
        }
        fire_ticks
    }

    #[test]
    fn auto_reload_fires_every_period() {
        let mut service = TimerService::new();
        service.add(posting_timer(TimerSpec::auto_reload("t", 10), 200));
        let mut p = poster(usize::MAX);

        assert_eq!(run(&mut service, &mut p, 35), vec![10, 20, 30]);
        assert_eq!(p.items.len(), 3);
    }

    #[test]
    fn one_shot_fires_once_and_goes_dormant() {
        let mut service = TimerService::new();
        let id = service.add(posting_timer(TimerSpec::one_shot("once", 5), 1));
        let mut p = poster(usize::MAX);

        assert_eq!(run(&mut service, &mut p, 20), vec![5]);
        assert!(!service.get(id).unwrap().is_active());
    }

    #[test]
    fn reset_restarts_period_from_now() {
        let mut service = TimerService::new();
        let id = service.add(posting_timer(TimerSpec::auto_reload("t", 10), 1));
        let mut p = poster(usize::MAX);

        assert!(service.fire_due(7, &mut p).is_empty());
        service.get_mut(id).unwrap().reset(7);
        assert_eq!(service.get(id).unwrap().next_fire(), Some(17));
        assert!(service.fire_due(10, &mut p).is_empty(), "old deadline is gone");
        assert_eq!(service.fire_due(17, &mut p).len(), 1);
        assert_eq!(service.get(id).unwrap().next_fire(), Some(27));
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let mut service = TimerService::new();
        let id = service.add(posting_timer(TimerSpec::auto_reload("t", 1), 9));
        let mut p = poster(2);

        run(&mut service, &mut p, 5);
        let timer = service.get(id).unwrap();
        assert_eq!(timer.fires(), 5);
        assert_eq!(timer.dropped(), 3);
        assert_eq!(service.totals(), (5, 3));
    }

    #[test]
    fn late_processing_catches_up_from_scheduled_tick() {
        let mut service = TimerService::new();
        service.add(posting_timer(TimerSpec::auto_reload("t", 10), 1));
        let mut p = poster(usize::MAX);

        let fired = service.fire_due(25, &mut p);
        let scheduled: Vec<_> = fired.iter().map(|f| f.scheduled).collect();
        assert_eq!(scheduled, vec![10, 20]);
    }

    #[test]
    fn stop_and_start_toggle_activity() {
        let mut service = TimerService::new();
        let id = service.add(posting_timer(TimerSpec::auto_reload("t", 10), 1));
        let timer = service.get_mut(id).unwrap();
        timer.stop();
        assert!(!timer.is_active());
        timer.start(4);
        assert_eq!(timer.next_fire(), Some(14));
        timer.start(6);
        assert_eq!(timer.next_fire(), Some(14), "start keeps an active schedule");
        timer.change_period(3, 6);
        assert_eq!(timer.next_fire(), Some(9));
        assert_eq!(timer.period(), 3);
    }

    #[test]
    fn equal_fire_ticks_run_in_id_order() {
        let mut service = TimerService::new();
        let a = service.add(posting_timer(TimerSpec::auto_reload("a", 5), 1));
        let b = service.add(posting_timer(TimerSpec::auto_reload("b", 5), 2));
        let mut p = poster(usize::MAX);

        let order: Vec<_> = service.fire_due(5, &mut p).iter().map(|f| f.timer).collect();
        assert_eq!(order, vec![a, b]);
        assert_eq!(p.items, vec![(QueueId(0), 1), (QueueId(0), 2)]);
    }
}
