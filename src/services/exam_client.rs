// src/services/exam_client.rs

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::Config,
    error::AppError,
    gateway::{FetchGateway, ReqwestTransport, RetryPolicy},
    models::{
        exam::{Exam, ExamPayload, QuestionPayload},
        result::ExamResult,
    },
};

/// Typed access to the exams API, always through the retrying gateway.
pub struct ExamClient {
    gateway: FetchGateway,
    results_path: String,
}

impl ExamClient {
    pub fn new(gateway: FetchGateway, results_path: impl Into<String>) -> Self {
        Self {
            gateway,
            results_path: results_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        let gateway = FetchGateway::new(
            config.upstream_base_url.clone(),
            Arc::new(transport),
            RetryPolicy::from_config(config),
        );
        Ok(Self::new(gateway, config.results_path.clone()))
    }

    /// Loads and validates an exam.
    /// Questions come embedded or, failing that, from `/api/examenes/{id}/preguntas`.
    pub async fn fetch_exam(&self, exam_id: i64) -> Result<Exam, AppError> {
        let mut payload: ExamPayload = self
            .gateway
            .get_json(&format!("/api/examenes/{}", exam_id))
            .await?;

        if payload.questions.as_ref().is_none_or(Vec::is_empty) {
            debug!("Exam {} has no embedded questions, fetching them", exam_id);
            let questions: Vec<QuestionPayload> = self
                .gateway
                .get_json(&format!("/api/examenes/{}/preguntas", exam_id))
                .await?;
            payload = payload.with_questions(questions);
        }

        let exam = Exam::try_from(payload)?;
        info!(
            "Loaded exam {} ({} questions, {}s)",
            exam.id(),
            exam.question_count(),
            exam.duration_secs()
        );
        Ok(exam)
    }

    /// Pushes a result to the results endpoint.
    pub async fn submit_result(&self, result: &ExamResult) -> Result<(), AppError> {
        self.gateway.post_json(&self.results_path, result).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::gateway::fetch::testing::{ScriptedTransport, gateway};

    fn exam_body(with_questions: bool) -> String {
        let mut body = json!({ "id": 5, "titulo": "Base de Datos", "duracionMinutos": 30 });
        if with_questions {
            body["preguntas"] = json!([{
                "id": 1,
                "textoPregunta": "¿Qué significa SQL?",
                "tipoPregunta": "SELECCION_MULTIPLE",
                "opciones": [
                    { "id": 1, "textoOpcion": "Structured Query Language", "esCorrecta": true },
                    { "id": 2, "textoOpcion": "Simple Query Language" }
                ]
            }]);
        }
        body.to_string()
    }

    #[tokio::test]
    async fn test_fetch_exam_with_embedded_questions() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(200, &exam_body(true))]);
        let client = ExamClient::new(gateway(transport.clone()), "/resultados");

        let exam = client.fetch_exam(5).await.unwrap();
        assert_eq!(exam.question_count(), 1);
        assert_eq!(exam.duration_secs(), 1800);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_exam_falls_back_to_questions_endpoint() {
        let questions = json!([{ "id": 3, "text": "Explain joins", "kind": "short-answer" }]);
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(200, &exam_body(false)),
            ScriptedTransport::status(200, &questions.to_string()),
        ]);
        let client = ExamClient::new(gateway(transport.clone()), "/resultados");

        let exam = client.fetch_exam(5).await.unwrap();
        assert_eq!(exam.question(3).unwrap().prompt(), "Explain joins");

        let urls = transport.urls();
        assert_eq!(urls[1].path(), "/api/examenes/5/preguntas");
    }

    #[tokio::test]
    async fn test_fetch_exam_without_questions_is_rejected() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(200, &exam_body(false)),
            ScriptedTransport::status(200, "[]"),
        ]);
        let client = ExamClient::new(gateway(transport.clone()), "/resultados");

        let err = client.fetch_exam(5).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("no questions")));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_exam_404_is_surfaced() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(404, "not found")]);
        let client = ExamClient::new(gateway(transport.clone()), "/resultados");

        let err = client.fetch_exam(5).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 404, .. }));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_result_posts_to_results_path() {
        use crate::engine::Attempt;
        use crate::models::{attempt::SubmitReason, exam::fixtures::three_choice_exam};

        let mut attempt = Attempt::new(uuid::Uuid::new_v4(), Arc::new(three_choice_exam()), 1);
        let result = attempt.submit(SubmitReason::Manual).unwrap();

        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(201, "")]);
        let client = ExamClient::new(gateway(transport.clone()), "/resultados");
        client.submit_result(&result).await.unwrap();

        let calls = transport.calls.lock().unwrap();
        let (request, _) = &calls[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.path(), "/resultados");
        assert_eq!(request.body.as_ref().unwrap()["percentage"], 0);
        assert_eq!(request.body.as_ref().unwrap()["reason"], "manual");
    }
}
