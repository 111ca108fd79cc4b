use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use tokio::{
    sync::{RwLock, mpsc::UnboundedSender},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    config::{Config, EVICTION_SWEEP_INTERVAL},
    engine::AttemptSession,
    error::AppError,
    models::{exam::Exam, result::PublishStatus},
    services::{
        ExamClient,
        result_publisher::{self, PublishJob},
    },
};

/// In-memory attempts, keyed by attempt id. Attempts are independent of each
/// other; the lock only guards the map itself. Submitted attempts are kept for
/// `retention` and then evicted by the sweeper.
#[derive(Clone)]
pub struct AttemptRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<AttemptSession>>>>,
    results: UnboundedSender<PublishJob>,
    retention: Duration,
}

impl AttemptRegistry {
    pub fn new(results: UnboundedSender<PublishJob>, retention: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            results,
            retention,
        }
    }

    pub async fn start(&self, exam: Arc<Exam>, student_id: i64) -> Arc<AttemptSession> {
        let session = AttemptSession::start(exam, student_id, self.results.clone());
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<AttemptSession>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", id)))
    }

    /// Drops attempts submitted more than `retention` ago. Returns how many went.
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, session| {
            if !session.is_expired(self.retention, now) {
                return true;
            }
            if let Some(PublishStatus::Failed { error }) = session.publish_status() {
                tracing::warn!("Evicting attempt {} whose result was never published: {}", id, error);
            }
            false
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!("Evicted {} expired attempts, {} remain", evicted, sessions.len());
        }
        evicted
    }

    /// Spawns the periodic eviction task. Requires a Tokio runtime.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                registry.evict_expired().await;
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ExamClient>,
    pub attempts: AttemptRegistry,
    pub config: Config,
}

impl AppState {
    /// Builds the state and spawns the result publisher and the eviction
    /// sweeper. Requires a Tokio runtime.
    pub fn new(config: Config, client: Arc<ExamClient>) -> Self {
        let (results, _publisher) = result_publisher::spawn(client.clone());
        let attempts = AttemptRegistry::new(results, config.attempt_retention);
        let sweep_every = EVICTION_SWEEP_INTERVAL
            .min(config.attempt_retention)
            .max(Duration::from_secs(1));
        attempts.spawn_sweeper(sweep_every);
        Self {
            client,
            attempts,
            config,
        }
    }
}

impl FromRef<AppState> for Arc<ExamClient> {
    fn from_ref(state: &AppState) -> Self {
        state.client.clone()
    }
}

impl FromRef<AppState> for AttemptRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
