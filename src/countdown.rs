// src/countdown.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Time left before the deadline, split into display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// Days are whole-day truncation; the smaller units wrap at their parent.
    pub fn from_seconds(total: i64) -> Self {
        Self {
            days: total / SECS_PER_DAY,
            hours: (total / SECS_PER_HOUR) % 24,
            minutes: (total / SECS_PER_MINUTE) % 60,
            seconds: total % 60,
        }
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}d {:02}h {:02}m {:02}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VotingWindow {
    Open { countdown: Countdown },
    Ended,
}

impl VotingWindow {
    pub fn at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = deadline - now;
        if remaining > chrono::Duration::zero() {
            // Under a second left still counts as open, shown as all zeros.
            VotingWindow::Open {
                countdown: Countdown::from_seconds(remaining.num_seconds()),
            }
        } else {
            VotingWindow::Ended
        }
    }

    pub fn now(deadline: DateTime<Utc>) -> Self {
        Self::at(deadline, Utc::now())
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, VotingWindow::Ended)
    }

    pub fn countdown(&self) -> Option<Countdown> {
        match self {
            VotingWindow::Open { countdown } => Some(*countdown),
            VotingWindow::Ended => None,
        }
    }
}

/// Recomputes the voting window once a second. The task stops when the
/// ticker is dropped.
pub struct CountdownTicker {
    rx: watch::Receiver<VotingWindow>,
    handle: JoinHandle<()>,
}

impl CountdownTicker {
    pub fn start(deadline: DateTime<Utc>) -> Self {
        let (tx, rx) = watch::channel(VotingWindow::now(deadline));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let window = VotingWindow::now(deadline);
                if tx.send(window).is_err() {
                    break;
                }
                if window.is_ended() {
                    tracing::info!("Voting window closed at {}", deadline);
                    break;
                }
            }
        });

        Self { rx, handle }
    }

    pub fn window(&self) -> VotingWindow {
        *self.rx.borrow()
    }

    pub fn receiver(&self) -> watch::Receiver<VotingWindow> {
        self.rx.clone()
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
