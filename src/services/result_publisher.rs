// src/services/result_publisher.rs

use std::sync::{Arc, Mutex, PoisonError};

use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};
use tracing::{error, info};

use crate::{
    error::AppError,
    models::result::{ExamResult, PublishStatus},
    services::exam_client::ExamClient,
};

/// Delivery state of one result. Shared by the attempt, the worker and the
/// re-publish route; pushes are serialized so a result is posted at most once
/// successfully.
#[derive(Debug, Default)]
pub struct Delivery {
    status: Mutex<PublishStatus>,
    in_flight: tokio::sync::Mutex<()>,
}

impl Delivery {
    pub fn status(&self) -> PublishStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.set(PublishStatus::Failed {
            error: error.into(),
        });
    }

    fn set(&self, status: PublishStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Pushes `result` unless it is already published. Failures are recorded
    /// and returned to the caller.
    pub async fn publish(&self, client: &ExamClient, result: &ExamResult) -> Result<(), AppError> {
        let _guard = self.in_flight.lock().await;
        if self.status() == PublishStatus::Published {
            return Ok(());
        }

        self.set(PublishStatus::Pending);
        match client.submit_result(result).await {
            Ok(()) => {
                self.set(PublishStatus::Published);
                Ok(())
            }
            Err(e) => {
                self.set(PublishStatus::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// A submitted result waiting to be pushed.
#[derive(Debug)]
pub struct PublishJob {
    pub result: ExamResult,
    pub delivery: Arc<Delivery>,
}

/// Spawns the worker that pushes submitted results upstream, one at a time.
///
/// A failed push leaves the delivery `failed`; the attempt stays readable and
/// the push can be retried from the API. The worker exits once every sender
/// is dropped.
pub fn spawn(client: Arc<ExamClient>) -> (UnboundedSender<PublishJob>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PublishJob>();

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let result = &job.result;
            match job.delivery.publish(&client, result).await {
                Ok(()) => info!(
                    "Result {} for attempt {} pushed ({}%)",
                    result.id, result.attempt_id, result.score.percentage
                ),
                Err(e) => error!(
                    "Failed to push result {} for attempt {}: {}",
                    result.id, result.attempt_id, e
                ),
            }
        }
        info!("Result publisher stopped");
    });

    (tx, handle)
}
