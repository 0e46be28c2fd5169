// src/session/timer.rs

/// Wall-clock budget per question for timed sessions, in seconds.
pub const SECONDS_PER_QUESTION: u32 = 100;

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u32),
    Expired,
}

/// Persisted countdown for timed sessions.
///
/// The countdown holds no clock of its own: the caller supplies ticks,
/// which keeps expiry deterministic under test and lets the remaining
/// value be persisted and restored across a reload instead of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    /// Fresh countdown for a session of `question_count` questions.
    pub fn new(question_count: u32) -> Self {
        Self {
            remaining: question_count * SECONDS_PER_QUESTION,
        }
    }

    /// Re-attaches to a persisted remaining value.
    pub fn resume(remaining: u32) -> Self {
        Self { remaining }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Counts down one second. Ticking an expired countdown stays expired.
    pub fn tick(&mut self) -> Tick {
        if self.remaining == 0 {
            return Tick::Expired;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }
}
