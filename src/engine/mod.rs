// src/engine/mod.rs

//! Exam attempt engine: countdown, scoring and the attempt lifecycle.

pub mod attempt;
pub mod scorer;
pub mod session;
pub mod timer;

pub use attempt::Attempt;
pub use scorer::score;
pub use session::AttemptSession;
pub use timer::Countdown;
