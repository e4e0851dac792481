/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Producer/consumer pair around the shared queue.
//!
//! The sender enqueues its tag once per period; a timer posts a second tag.
//! The receiver blocks on the queue and names the origin of every message.

use tracing::warn;

use ipsa_core::{Action, Message, QueueId, Resume, TaskBody, TaskContext, Tick, Timeout};

use super::{Pacing, Release};

// ── Sender ────────────────────────────────────────────────────────────────────

pub struct QueueSender {
    queue: QueueId,
    message: Message,
    timeout: Timeout,
    release: Release,
}

impl QueueSender {
    /// Sends `message` every `period` ticks, starting one period after start.
    pub fn new(queue: QueueId, message: Message, period: Tick) -> Self {
        Self {
            queue,
            message,
            timeout: Timeout::NoWait,
            release: Release::new(period, Pacing::Absolute),
        }
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TaskBody for QueueSender {
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action {
        match resume {
            Resume::Delayed => {
                return Action::Send {
                    queue: self.queue,
                    message: self.message,
                    timeout: self.timeout,
                }
            }
            Resume::Sent(Ok(())) => cx.emit(format!("queued {}", self.message)),
            Resume::Sent(Err(e)) => {
                warn!(task = %cx.name(), message = self.message, error = %e, "send failed");
                cx.emit(format!("send of {} failed: {}", self.message, e));
            }
            _ => {}
        }
        self.release.sleep()
    }
}

// ── Receiver ──────────────────────────────────────────────────────────────────

pub struct QueueReceiver {
    queue: QueueId,
    sender_message: Message,
    timer_message: Message,
}

impl QueueReceiver {
    pub fn new(queue: QueueId, sender_message: Message, timer_message: Message) -> Self {
        Self {
            queue,
            sender_message,
            timer_message,
        }
    }

    fn describe(&self, message: Message) -> String {
        if message == self.sender_message {
            format!("{message} from sender")
        } else if message == self.timer_message {
            format!("{message} from timer")
        } else {
            format!("unexpected message {message}")
        }
    }
}

impl TaskBody for QueueReceiver {
    fn step(&mut self, cx: &mut TaskContext<'_>, resume: Resume) -> Action {
        match resume {
            Resume::Received(Ok(message)) => cx.emit(self.describe(message)),
            Resume::Received(Err(e)) => {
                warn!(task = %cx.name(), error = %e, "receive failed");
                cx.emit(format!("receive failed: {e}"));
            }
            _ => {}
        }
        Action::Receive {
            queue: self.queue,
            timeout: Timeout::Forever,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipsa_core::{ConsoleLog, Kernel, KernelConfig, TaskSpec};

    fn pair(capacity: usize, sender_prio: u32, receiver_prio: u32) -> (Kernel, ConsoleLog, QueueId) {
        let log = ConsoleLog::new();
        let mut k = Kernel::new(KernelConfig::default(), log.clone());
        let q = k.create_queue("main", capacity).unwrap();
        k.create_task(TaskSpec::new("SND", sender_prio), QueueSender::new(q, 100, 20))
            .unwrap();
        k.create_task(TaskSpec::new("RCV", receiver_prio), QueueReceiver::new(q, 100, 200))
            .unwrap();
        (k, log, q)
    }

    #[test]
    fn receiver_names_origin_of_each_message() {
        let (mut k, log, q) = pair(2, 1, 2);
        k.run_for(40).unwrap();
        k.post(q, 200).unwrap();
        k.post(q, 7).unwrap();

        assert_eq!(
            log.texts_of("RCV"),
            vec!["100 from sender", "100 from sender", "200 from timer", "unexpected message 7"]
        );
        assert_eq!(log.texts_of("SND"), vec!["queued 100", "queued 100"]);
    }

    #[test]
    fn sender_reports_full_queue_without_blocking() {
        // Nobody drains the queue: the second send finds it full.
        let log = ConsoleLog::new();
        let mut k = Kernel::new(KernelConfig::default(), log.clone());
        let q = k.create_queue("main", 1).unwrap();
        k.create_task(TaskSpec::new("SND", 2), QueueSender::new(q, 100, 5))
            .unwrap();

        k.run_for(10).unwrap();

        assert_eq!(
            log.texts_of("SND"),
            vec!["queued 100", "send of 100 failed: queue is full"]
        );
        assert_eq!(k.queue(q).unwrap().len(), 1);
    }

    #[test]
    fn bounded_send_timeout_is_reported() {
        let log = ConsoleLog::new();
        let mut k = Kernel::new(KernelConfig::default(), log.clone());
        let q = k.create_queue("main", 1).unwrap();
        k.create_task(
            TaskSpec::new("SND", 2),
            QueueSender::new(q, 100, 10).with_timeout(Timeout::Ticks(3)),
        )
        .unwrap();

        k.run_for(25).unwrap();

        let lines: Vec<_> = log
            .lines()
            .into_iter()
            .map(|l| format!("{}:{}", l.tick, l.text))
            .collect();
        assert_eq!(
            lines,
            ["10:queued 100", "23:send of 100 failed: timed out waiting on queue"]
        );
    }
}
