// src/engine/scorer.rs

use std::collections::BTreeMap;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    models::{
        attempt::Answer,
        exam::{Exam, QuestionId},
        result::Score,
    },
};

/// Grades captured answers against the exam's answer key.
///
/// * Only single-choice and true-false questions count towards the percentage.
/// * Short-answer questions get no automatic credit and are reported as pending review.
/// * Unanswered questions count as incorrect.
/// * With no scorable question the percentage is 0.
pub fn score(exam: &Exam, answers: &BTreeMap<QuestionId, Answer>) -> Score {
    let mut correct_count = 0;
    let mut scorable_count = 0;
    let mut pending_manual_review = 0;
    let mut points_awarded = 0;
    let mut points_possible = 0;

    for question in exam.questions() {
        points_possible += question.points();

        if !question.is_scorable() {
            pending_manual_review += 1;
            continue;
        }
        scorable_count += 1;

        let selected = answers.get(&question.id()).and_then(Answer::option_id);
        let correct = question.correct_option().map(|o| o.id);
        if selected.is_some() && selected == correct {
            correct_count += 1;
            points_awarded += question.points();
        }
    }

    let percentage = percentage(correct_count, scorable_count);

    Score {
        percentage,
        passed: percentage >= PASSING_SCORE_PERCENTAGE,
        correct_count,
        scorable_count,
        pending_manual_review,
        points_awarded,
        points_possible,
    }
}

/// round(correct / total * 100), half up, in integer arithmetic.
fn percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (correct * 200 + total) / (total * 2);
    rounded.min(100) as u8
}
