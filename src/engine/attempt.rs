// src/engine/attempt.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::scorer,
    error::AppError,
    models::{
        attempt::{Answer, AttemptSnapshot, AttemptStatus, SubmitReason},
        exam::{Exam, OptionId, PublicQuestion, Question, QuestionId},
        result::ExamResult,
    },
};

/// One test-taker's run through an exam.
///
/// Pure state machine: no I/O and no clock of its own. Remaining time is fed in
/// by the session's countdown. `in-progress -> submitted` happens exactly once;
/// every mutator fails with `InvalidState` afterwards.
#[derive(Debug)]
pub struct Attempt {
    id: Uuid,
    exam: Arc<Exam>,
    student_id: i64,
    answers: BTreeMap<QuestionId, Answer>,
    current_index: usize,
    remaining_secs: u64,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    result: Option<ExamResult>,
}

impl Attempt {
    pub fn new(id: Uuid, exam: Arc<Exam>, student_id: i64) -> Self {
        let remaining_secs = exam.duration_secs();
        Self {
            id,
            exam,
            student_id,
            answers: BTreeMap::new(),
            current_index: 0,
            remaining_secs,
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, Answer> {
        &self.answers
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    /// Records the selected option for a choice question. Last write wins.
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        option_id: OptionId,
    ) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        let question = self.question(question_id)?;

        if !question.is_scorable() {
            return Err(AppError::BadRequest(format!(
                "Question {} expects a text answer",
                question_id
            )));
        }
        if question.option(option_id).is_none() {
            return Err(AppError::NotFound(format!(
                "Option {} does not belong to question {}",
                option_id, question_id
            )));
        }

        self.answers
            .insert(question_id, Answer::Choice { option_id });
        Ok(())
    }

    /// Records a free-text answer for a short-answer question. Last write wins.
    pub fn answer_text(&mut self, question_id: QuestionId, text: String) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        let question = self.question(question_id)?;

        if question.is_scorable() {
            return Err(AppError::BadRequest(format!(
                "Question {} expects an option",
                question_id
            )));
        }

        self.answers.insert(question_id, Answer::Text { text });
        Ok(())
    }

    /// Moves the cursor. Out-of-range indexes are rejected and leave it unchanged.
    /// Answering the current question first is not required.
    pub fn go_to_question(&mut self, index: i64) -> Result<usize, AppError> {
        self.ensure_in_progress()?;

        let count = self.exam.question_count();
        let target = usize::try_from(index)
            .ok()
            .filter(|i| *i < count)
            .ok_or_else(|| {
                AppError::OutOfRange(format!(
                    "Question index {} outside [0, {})",
                    index, count
                ))
            })?;

        self.current_index = target;
        Ok(target)
    }

    pub fn next(&mut self) -> Result<usize, AppError> {
        let target = self.current_index as i64 + 1;
        self.go_to_question(target)
    }

    pub fn previous(&mut self) -> Result<usize, AppError> {
        let target = self.current_index as i64 - 1;
        self.go_to_question(target)
    }

    /// Applies a countdown tick. Ignored once submitted; never increases the clock.
    pub fn record_tick(&mut self, remaining_secs: u64) {
        if self.status == AttemptStatus::InProgress {
            self.remaining_secs = self.remaining_secs.min(remaining_secs);
        }
    }

    /// Scores the captured answers and seals the attempt.
    /// A second call fails with `InvalidState` and leaves the first result untouched.
    pub fn submit(&mut self, reason: SubmitReason) -> Result<ExamResult, AppError> {
        self.ensure_in_progress()?;

        let score = scorer::score(&self.exam, &self.answers);
        let result = ExamResult {
            id: Uuid::new_v4(),
            attempt_id: self.id,
            exam_id: self.exam.id(),
            student_id: self.student_id,
            score,
            reason,
            started_at: self.started_at,
            submitted_at: Utc::now(),
            answers: self.answers.clone(),
        };

        if reason == SubmitReason::TimeExpired {
            self.remaining_secs = 0;
        }
        self.status = AttemptStatus::Submitted;
        self.result = Some(result.clone());
        Ok(result)
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            id: self.id,
            exam_id: self.exam.id(),
            exam_title: self.exam.title().to_string(),
            student_id: self.student_id,
            status: self.status,
            current_index: self.current_index,
            question_count: self.exam.question_count(),
            remaining_seconds: self.remaining_secs,
            current_question: self
                .exam
                .question_at(self.current_index)
                .map(PublicQuestion::from),
            answers: self.answers.clone(),
            result: self.result.clone(),
            publish: None,
        }
    }

    fn ensure_in_progress(&self) -> Result<(), AppError> {
        match self.status {
            AttemptStatus::InProgress => Ok(()),
            AttemptStatus::Submitted => Err(AppError::InvalidState(format!(
                "Attempt {} is already submitted",
                self.id
            ))),
        }
    }

    fn question(&self, question_id: QuestionId) -> Result<&Question, AppError> {
        self.exam.question(question_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Question {} is not part of exam {}",
                question_id,
                self.exam.id()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::fixtures::{mixed_exam, three_choice_exam};

    fn attempt(exam: Exam) -> Attempt {
        Attempt::new(Uuid::new_v4(), Arc::new(exam), 42)
    }

    #[test]
    fn test_initial_state() {
        let attempt = attempt(three_choice_exam());
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
        assert_eq!(attempt.current_index(), 0);
        assert_eq!(attempt.remaining_secs(), 3);
        assert!(attempt.answers().is_empty());
        assert!(attempt.result().is_none());
    }

    #[test]
    fn test_select_answer_last_write_wins() {
        let mut attempt = attempt(three_choice_exam());
        attempt.select_answer(1, 2).unwrap();
        attempt.select_answer(1, 1).unwrap();
        attempt.select_answer(1, 1).unwrap();

        assert_eq!(attempt.answers().get(&1), Some(&Answer::Choice { option_id: 1 }));
    }

    #[test]
    fn test_select_answer_unknown_ids() {
        let mut attempt = attempt(three_choice_exam());

        let err = attempt.select_answer(99, 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = attempt.select_answer(1, 99).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(attempt.answers().is_empty());
    }

    #[test]
    fn test_text_answers_only_for_short_answer() {
        let mut attempt = attempt(mixed_exam());

        attempt.answer_text(12, "3NF".into()).unwrap();
        assert!(matches!(
            attempt.answer_text(10, "B".into()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            attempt.select_answer(12, 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_navigation_bounds() {
        let mut attempt = attempt(three_choice_exam());

        assert_eq!(attempt.next().unwrap(), 1);
        assert_eq!(attempt.go_to_question(2).unwrap(), 2);

        assert!(matches!(attempt.go_to_question(-1), Err(AppError::OutOfRange(_))));
        assert!(matches!(attempt.go_to_question(3), Err(AppError::OutOfRange(_))));
        assert!(matches!(attempt.next(), Err(AppError::OutOfRange(_))));
        assert_eq!(attempt.current_index(), 2);

        attempt.go_to_question(0).unwrap();
        assert!(matches!(attempt.previous(), Err(AppError::OutOfRange(_))));
        assert_eq!(attempt.current_index(), 0);
    }

    #[test]
    fn test_advancing_without_answer_is_allowed() {
        let mut attempt = attempt(three_choice_exam());
        attempt.next().unwrap();
        attempt.next().unwrap();
        assert_eq!(attempt.current_index(), 2);
        assert!(attempt.answers().is_empty());
    }

    #[test]
    fn test_submit_twice() {
        let mut attempt = attempt(three_choice_exam());
        attempt.select_answer(1, 1).unwrap();
        attempt.select_answer(2, 2).unwrap();

        let first = attempt.submit(SubmitReason::Manual).unwrap();
        assert_eq!(first.score.percentage, 67);
        assert!(!first.score.passed);
        assert_eq!(attempt.status(), AttemptStatus::Submitted);

        let err = attempt.submit(SubmitReason::TimeExpired).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(attempt.result(), Some(&first));
        assert_eq!(attempt.status(), AttemptStatus::Submitted);
    }

    #[test]
    fn test_submitted_attempt_is_immutable() {
        let mut attempt = attempt(three_choice_exam());
        attempt.submit(SubmitReason::Manual).unwrap();

        assert!(matches!(attempt.select_answer(1, 1), Err(AppError::InvalidState(_))));
        assert!(matches!(attempt.go_to_question(1), Err(AppError::InvalidState(_))));
        assert!(matches!(attempt.next(), Err(AppError::InvalidState(_))));

        attempt.record_tick(1);
        assert_eq!(attempt.remaining_secs(), 3);
        assert!(attempt.answers().is_empty());
    }

    #[test]
    fn test_ticks_never_increase_remaining() {
        let mut attempt = attempt(three_choice_exam());
        attempt.record_tick(2);
        attempt.record_tick(5);
        assert_eq!(attempt.remaining_secs(), 2);
    }

    #[test]
    fn test_snapshot_hides_answer_key() {
        let mut attempt = attempt(mixed_exam());
        attempt.select_answer(10, 4).unwrap();

        let snapshot = serde_json::to_value(attempt.snapshot()).unwrap();
        assert_eq!(snapshot["status"], "in-progress");
        assert_eq!(snapshot["questionCount"], 3);
        assert_eq!(snapshot["currentQuestion"]["id"], 10);
        assert!(snapshot["currentQuestion"]["options"][0].get("isCorrect").is_none());
        assert_eq!(snapshot["answers"]["10"]["optionId"], 4);
    }
}
