// src/engine/session.rs

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, time::Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    engine::{attempt::Attempt, timer::Countdown},
    error::AppError,
    models::{
        attempt::{AttemptSnapshot, SubmitReason},
        exam::{Exam, OptionId, QuestionId},
        result::{ExamResult, PublishStatus, ResultView},
    },
    services::{
        ExamClient,
        result_publisher::{Delivery, PublishJob},
    },
};

/// A running attempt wired to its countdown.
///
/// User calls and countdown callbacks both go through the same lock, so at most
/// one transition happens at a time. Whichever submit takes the lock first wins;
/// the other observes `InvalidState`. Every result is handed to `results` once;
/// its delivery state is tracked here and can be retried with `republish`.
#[derive(Debug)]
pub struct AttemptSession {
    attempt: Mutex<Attempt>,
    countdown: Mutex<Countdown>,
    results: UnboundedSender<PublishJob>,
    delivery: Arc<Delivery>,
    sealed_at: OnceLock<Instant>,
}

impl AttemptSession {
    /// Creates the attempt and starts its countdown. Requires a Tokio runtime.
    pub fn start(
        exam: Arc<Exam>,
        student_id: i64,
        results: UnboundedSender<PublishJob>,
    ) -> Arc<Self> {
        let duration = exam.duration_secs();
        let attempt = Attempt::new(Uuid::new_v4(), exam, student_id);
        info!(
            "Attempt {} started: exam {}, student {}, {}s",
            attempt.id(),
            attempt.exam().id(),
            student_id,
            duration
        );

        let session = Arc::new(Self {
            attempt: Mutex::new(attempt),
            countdown: Mutex::new(Countdown::new()),
            results,
            delivery: Arc::default(),
            sealed_at: OnceLock::new(),
        });

        let on_tick = {
            let weak = Arc::downgrade(&session);
            move |remaining| {
                if let Some(session) = weak.upgrade() {
                    session.lock_attempt().record_tick(remaining);
                }
            }
        };
        let on_expire = {
            let weak: Weak<Self> = Arc::downgrade(&session);
            move || {
                if let Some(session) = weak.upgrade() {
                    match session.finish(SubmitReason::TimeExpired) {
                        Ok(result) => info!(
                            "Attempt {} auto-submitted on timeout: {}%",
                            result.attempt_id, result.score.percentage
                        ),
                        Err(e) => debug!("Timeout auto-submit skipped: {}", e),
                    }
                }
            }
        };
        session.lock_countdown().start(duration, on_tick, on_expire);

        session
    }

    pub fn id(&self) -> Uuid {
        self.lock_attempt().id()
    }

    pub fn select_answer(&self, question_id: QuestionId, option_id: OptionId) -> Result<(), AppError> {
        self.lock_attempt().select_answer(question_id, option_id)
    }

    pub fn answer_text(&self, question_id: QuestionId, text: String) -> Result<(), AppError> {
        self.lock_attempt().answer_text(question_id, text)
    }

    pub fn go_to_question(&self, index: i64) -> Result<usize, AppError> {
        self.lock_attempt().go_to_question(index)
    }

    pub fn next(&self) -> Result<usize, AppError> {
        self.lock_attempt().next()
    }

    pub fn previous(&self) -> Result<usize, AppError> {
        self.lock_attempt().previous()
    }

    /// Explicit submission by the test-taker.
    pub fn submit(&self) -> Result<ExamResult, AppError> {
        self.finish(SubmitReason::Manual)
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        let mut snapshot = self.lock_attempt().snapshot();
        if snapshot.result.is_some() {
            snapshot.publish = Some(self.delivery.status());
        }
        snapshot
    }

    pub fn result(&self) -> Option<ExamResult> {
        self.lock_attempt().result().cloned()
    }

    /// The result with its delivery state, once submitted.
    pub fn result_view(&self) -> Option<ResultView> {
        self.result().map(|result| ResultView {
            result,
            publish: self.delivery.status(),
        })
    }

    pub fn publish_status(&self) -> Option<PublishStatus> {
        self.result().map(|_| self.delivery.status())
    }

    /// Pushes the result again, typically after a failed delivery.
    /// A result that is already published is not posted twice.
    pub async fn republish(&self, client: &ExamClient) -> Result<ResultView, AppError> {
        let result = self.result().ok_or_else(|| {
            AppError::InvalidState(format!("Attempt {} is still in progress", self.id()))
        })?;
        self.delivery.publish(client, &result).await?;
        info!("Result {} republished", result.id);
        Ok(ResultView {
            result,
            publish: self.delivery.status(),
        })
    }

    /// Whether the attempt was submitted at least `retention` before `now`.
    pub fn is_expired(&self, retention: Duration, now: Instant) -> bool {
        self.sealed_at
            .get()
            .is_some_and(|sealed| now.saturating_duration_since(*sealed) >= retention)
    }

    /// Shared path for manual and timeout submission.
    fn finish(&self, reason: SubmitReason) -> Result<ExamResult, AppError> {
        let result = self.lock_attempt().submit(reason)?;
        self.lock_countdown().stop();
        let _ = self.sealed_at.set(Instant::now());

        info!(
            "Attempt {} submitted ({:?}): {}% ({}/{} correct), passed: {}",
            result.attempt_id,
            reason,
            result.score.percentage,
            result.score.correct_count,
            result.score.scorable_count,
            result.score.passed
        );

        let job = PublishJob {
            result: result.clone(),
            delivery: self.delivery.clone(),
        };
        if self.results.send(job).is_err() {
            warn!(
                "Result publisher is closed; result {} was not pushed",
                result.id
            );
            self.delivery.fail("result publisher is closed");
        }
        Ok(result)
    }

    fn lock_attempt(&self) -> MutexGuard<'_, Attempt> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_countdown(&self) -> MutexGuard<'_, Countdown> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::models::{attempt::AttemptStatus, exam::fixtures::three_choice_exam};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_auto_submits_captured_answers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);

        session.select_answer(1, 1).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(session.snapshot().remaining_seconds, 2);

        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, AttemptStatus::Submitted);
        assert_eq!(snapshot.remaining_seconds, 0);

        let pushed = rx.try_recv().unwrap().result;
        assert_eq!(pushed.reason, SubmitReason::TimeExpired);
        assert_eq!(pushed.score.correct_count, 1);
        assert_eq!(pushed.score.percentage, 33);
        assert!(rx.try_recv().is_err());

        assert!(matches!(session.submit(), Err(AppError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_submit_stops_countdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);

        for q in 1..=3 {
            session.select_answer(q, q).unwrap();
        }
        let result = session.submit().unwrap();
        assert_eq!(result.score.percentage, 100);
        assert!(result.score.passed);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(session.snapshot().remaining_seconds, 3);
        assert_eq!(rx.try_recv().unwrap().result, result);
        assert!(rx.try_recv().is_err());
        assert_eq!(session.result(), Some(result));
        assert_eq!(session.publish_status(), Some(PublishStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_state_in_snapshot() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);
        assert_eq!(session.snapshot().publish, None);
        assert_eq!(session.publish_status(), None);

        // No worker left to deliver the result.
        drop(rx);
        session.submit().unwrap();

        let snapshot = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(snapshot["publish"]["status"], "failed");
        let view = serde_json::to_value(session.result_view().unwrap()).unwrap();
        assert_eq!(view["publish"]["status"], "failed");
        assert_eq!(view["percentage"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_counts_from_submission() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);
        let retention = Duration::from_secs(60);

        tokio::time::sleep(Duration::from_secs(120)).await;
        // Auto-submitted after 3s, so sealed ~117s ago.
        assert!(session.is_expired(retention, Instant::now()));

        let (tx, _rx) = mpsc::unbounded_channel();
        let fresh = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);
        assert!(!fresh.is_expired(retention, Instant::now()));
        fresh.submit().unwrap();
        assert!(!fresh.is_expired(retention, Instant::now()));
        tokio::time::sleep(retention).await;
        assert!(fresh.is_expired(retention, Instant::now()));
    }

    #[tokio::test]
    async fn test_concurrent_submits_score_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = AttemptSession::start(Arc::new(three_choice_exam()), 7, tx);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::task::spawn_blocking(move || session.submit())
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(matches!(e, AppError::InvalidState(_))),
            }
        }

        assert_eq!(successes, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
