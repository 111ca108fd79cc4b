// src/models/attempt.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    exam::{OptionId, PublicQuestion, QuestionId},
    result::{ExamResult, PublishStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

/// A captured answer. Choice questions store the option id,
/// short-answer questions store free text for manual grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Answer {
    Choice { option_id: OptionId },
    Text { text: String },
}

impl Answer {
    pub fn option_id(&self) -> Option<OptionId> {
        match self {
            Answer::Choice { option_id } => Some(*option_id),
            Answer::Text { .. } => None,
        }
    }
}

/// Why an attempt left the `in-progress` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitReason {
    Manual,
    TimeExpired,
}

/// Read-only view of an attempt for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub id: Uuid,
    pub exam_id: i64,
    pub exam_title: String,
    pub student_id: i64,
    pub status: AttemptStatus,
    pub current_index: usize,
    pub question_count: usize,
    pub remaining_seconds: u64,
    /// Question under the cursor, without the answer key.
    pub current_question: Option<PublicQuestion>,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub result: Option<ExamResult>,
    /// Delivery of the result upstream. Absent until submitted.
    pub publish: Option<PublishStatus>,
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    #[validate(range(min = 1))]
    pub exam_id: i64,
    #[validate(range(min = 1))]
    pub student_id: i64,
}

/// DTO for recording an answer. Exactly one of `option_id` / `text` is expected.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub option_id: Option<OptionId>,
    #[validate(length(max = 5000))]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    /// Signed so that negative indexes reach the range check instead of failing to parse.
    pub index: i64,
}
