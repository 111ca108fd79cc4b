// src/models/result.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    attempt::{Answer, SubmitReason},
    exam::QuestionId,
};

/// Outcome of automatic grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// 0-100, rounded half up.
    pub percentage: u8,
    pub passed: bool,
    pub correct_count: usize,
    pub scorable_count: usize,
    /// Short-answer questions left for an instructor to grade.
    pub pending_manual_review: usize,
    pub points_awarded: u32,
    pub points_possible: u32,
}

/// Result of a submitted attempt. Derived, never stored by this service;
/// it is pushed to the results endpoint of the exams API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub exam_id: i64,
    pub student_id: i64,
    #[serde(flatten)]
    pub score: Score,
    pub reason: SubmitReason,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub answers: BTreeMap<QuestionId, Answer>,
}

/// Delivery of a result to the exams API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PublishStatus {
    /// Queued or being pushed.
    #[default]
    Pending,
    Published,
    /// The push failed after retries; it can be retried through the API.
    Failed { error: String },
}

/// A result as returned to the UI, with its delivery state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub result: ExamResult,
    pub publish: PublishStatus,
}
