// src/models/exam.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::{DEFAULT_EXAM_DURATION_SECS, MAX_EXAM_DURATION_MINUTES, MAX_OPTIONS, MIN_OPTIONS},
    error::AppError,
};

pub type QuestionId = i64;
pub type OptionId = i64;

/// Question kind as sent by the exams API.
/// Accepts both the canonical names and the upstream's Spanish constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuestionKind {
    #[default]
    #[serde(rename = "single-choice", alias = "SELECCION_MULTIPLE")]
    SingleChoice,
    #[serde(rename = "true-false", alias = "VERDADERO_FALSO")]
    TrueFalse,
    #[serde(rename = "short-answer", alias = "RESPUESTA_CORTA")]
    ShortAnswer,
}

/// One selectable answer of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

/// Kind-specific part of a question. Shape invariants hold by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionBody {
    SingleChoice { options: Vec<AnswerOption> },
    TrueFalse { options: [AnswerOption; 2] },
    /// Graded manually; carries no options.
    ShortAnswer,
}

/// A validated question. Only built from a [`QuestionPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    points: u32,
    body: QuestionBody,
}

impl Question {
    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn body(&self) -> &QuestionBody {
        &self.body
    }

    pub fn kind(&self) -> QuestionKind {
        match self.body {
            QuestionBody::SingleChoice { .. } => QuestionKind::SingleChoice,
            QuestionBody::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionBody::ShortAnswer => QuestionKind::ShortAnswer,
        }
    }

    pub fn options(&self) -> &[AnswerOption] {
        match &self.body {
            QuestionBody::SingleChoice { options } => options,
            QuestionBody::TrueFalse { options } => options,
            QuestionBody::ShortAnswer => &[],
        }
    }

    pub fn option(&self, option_id: OptionId) -> Option<&AnswerOption> {
        self.options().iter().find(|o| o.id == option_id)
    }

    /// The single option flagged correct. `None` for short-answer questions.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options().iter().find(|o| o.is_correct)
    }

    /// Whether the question can be graded automatically.
    pub fn is_scorable(&self) -> bool {
        !matches!(self.body, QuestionBody::ShortAnswer)
    }
}

/// A validated exam: ordered questions plus the session duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    id: i64,
    title: String,
    description: String,
    duration_secs: u64,
    questions: Vec<Question>,
}

impl Exam {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// Exam as returned by `GET /api/examenes/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExamPayload {
    pub id: i64,

    #[serde(alias = "titulo")]
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default, alias = "descripcion")]
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[serde(default, alias = "duration")]
    pub duration_seconds: Option<u64>,

    #[serde(default, alias = "duracionMinutos")]
    pub duration_minutes: Option<u64>,

    /// Absent when the questions must be fetched from the dedicated endpoint.
    #[serde(default, alias = "preguntas")]
    #[validate(nested)]
    pub questions: Option<Vec<QuestionPayload>>,
}

/// Question as returned by the exams API.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub id: QuestionId,

    #[serde(alias = "text", alias = "textoPregunta")]
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,

    #[serde(default, alias = "type", alias = "tipoPregunta")]
    pub kind: QuestionKind,

    #[serde(default = "default_points", alias = "puntaje")]
    #[validate(range(min = 1))]
    pub points: u32,

    #[serde(default, alias = "opciones")]
    #[validate(nested)]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    pub id: OptionId,

    #[serde(alias = "textoOpcion")]
    #[validate(length(min = 1, max = 500))]
    pub text: String,

    #[serde(default, alias = "esCorrecta")]
    pub is_correct: bool,
}

fn default_points() -> u32 {
    1
}

impl ExamPayload {
    /// Attaches questions loaded separately from `/preguntas`.
    pub fn with_questions(mut self, questions: Vec<QuestionPayload>) -> Self {
        self.questions = Some(questions);
        self
    }

    fn resolve_duration(&self) -> Result<u64, AppError> {
        let secs = match (self.duration_seconds, self.duration_minutes) {
            (Some(secs), _) => secs,
            (None, Some(minutes)) => minutes.saturating_mul(60),
            (None, None) => DEFAULT_EXAM_DURATION_SECS,
        };

        if secs == 0 {
            return Err(AppError::BadRequest(format!(
                "Exam {} has a zero duration",
                self.id
            )));
        }
        if secs > MAX_EXAM_DURATION_MINUTES * 60 {
            return Err(AppError::BadRequest(format!(
                "Exam {} lasts longer than {} minutes",
                self.id, MAX_EXAM_DURATION_MINUTES
            )));
        }
        Ok(secs)
    }
}

impl TryFrom<ExamPayload> for Exam {
    type Error = AppError;

    fn try_from(payload: ExamPayload) -> Result<Self, Self::Error> {
        payload.validate()?;
        let duration_secs = payload.resolve_duration()?;

        let raw_questions = payload.questions.unwrap_or_default();
        if raw_questions.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Exam {} has no questions",
                payload.id
            )));
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(raw_questions.len());
        for raw in raw_questions {
            if !seen.insert(raw.id) {
                return Err(AppError::BadRequest(format!(
                    "Exam {} repeats question id {}",
                    payload.id, raw.id
                )));
            }
            questions.push(Question::try_from(raw)?);
        }

        Ok(Exam {
            id: payload.id,
            title: payload.title,
            description: payload.description.unwrap_or_default(),
            duration_secs,
            questions,
        })
    }
}

impl TryFrom<QuestionPayload> for Question {
    type Error = AppError;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        payload.validate()?;
        let id = payload.id;
        let invalid = |reason: String| AppError::BadRequest(format!("Question {}: {}", id, reason));

        let mut seen = HashSet::new();
        if let Some(dup) = payload.options.iter().find(|o| !seen.insert(o.id)) {
            return Err(invalid(format!("repeated option id {}", dup.id)));
        }

        let correct = payload.options.iter().filter(|o| o.is_correct).count();
        let options: Vec<AnswerOption> = payload
            .options
            .into_iter()
            .map(|o| AnswerOption {
                id: o.id,
                text: o.text,
                is_correct: o.is_correct,
            })
            .collect();

        let body = match payload.kind {
            QuestionKind::ShortAnswer => {
                if !options.is_empty() {
                    return Err(invalid("short-answer questions take no options".into()));
                }
                QuestionBody::ShortAnswer
            }
            QuestionKind::SingleChoice => {
                if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
                    return Err(invalid(format!(
                        "expected {}-{} options, got {}",
                        MIN_OPTIONS,
                        MAX_OPTIONS,
                        options.len()
                    )));
                }
                if correct != 1 {
                    return Err(invalid(format!(
                        "expected exactly one correct option, got {}",
                        correct
                    )));
                }
                QuestionBody::SingleChoice { options }
            }
            QuestionKind::TrueFalse => {
                if correct != 1 {
                    return Err(invalid(format!(
                        "expected exactly one correct option, got {}",
                        correct
                    )));
                }
                let options: [AnswerOption; 2] = options.try_into().map_err(|o: Vec<_>| {
                    invalid(format!("true-false needs 2 options, got {}", o.len()))
                })?;
                QuestionBody::TrueFalse { options }
            }
        };

        Ok(Question {
            id,
            prompt: payload.prompt,
            points: payload.points,
            body,
        })
    }
}

/// DTO for sending a question to the test-taker (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: u32,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: OptionId,
    pub text: String,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            kind: q.kind(),
            prompt: q.prompt.clone(),
            points: q.points,
            options: q
                .options()
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}
