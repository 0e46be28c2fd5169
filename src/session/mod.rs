// src/session/mod.rs

pub mod machine;
pub mod timer;

pub use machine::{
    AnswerOutcome, PracticeSession, SessionError, SessionSummary, SessionView, TimerStatus,
};
pub use timer::{Countdown, SECONDS_PER_QUESTION, Tick};
