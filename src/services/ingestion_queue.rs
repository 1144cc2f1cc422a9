use std::sync::Arc;

use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;

use super::ingestion::{Attempt, IngestionPipeline};
use crate::{
    error::{AppError, AppResult},
    models::{Article, ArticleId},
};

/// Submission point for creation-time ingestion attempts
///
/// Callers hand an article over and return immediately. A single supervisor
/// task runs each attempt on its own task and reaps it, so a panicking
/// attempt is logged instead of vanishing with the detached task.
#[derive(Clone)]
pub struct IngestionQueue {
    submit_tx: mpsc::UnboundedSender<Article>,
}

impl IngestionQueue {
    /// Spawns the supervisor and returns the queue plus the supervisor's
    /// handle. Cancelling `shutdown` stops intake; the supervisor then
    /// waits for in-flight attempts before the handle resolves.
    pub fn start(
        pipeline: Arc<IngestionPipeline>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();

        let supervisor = tokio::spawn(async move {
            Self::supervise(pipeline, submit_rx, shutdown).await;
        });

        (Self { submit_tx }, supervisor)
    }

    /// Queues the initial fetch for a freshly created article
    pub fn submit(&self, article: Article) -> AppResult<()> {
        let article_id = article.id;
        self.submit_tx.send(article).map_err(|_| {
            tracing::error!(article_id, "Ingestion queue is closed, dropping initial fetch");
            AppError::Internal("Ingestion queue is not running".to_string())
        })?;

        tracing::debug!(article_id, "Queued initial metadata fetch");
        Ok(())
    }

    async fn supervise(
        pipeline: Arc<IngestionPipeline>,
        mut submit_rx: mpsc::UnboundedReceiver<Article>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Ingestion supervisor started");
        let mut in_flight: JoinSet<ArticleId> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                submitted = submit_rx.recv() => {
                    let Some(article) = submitted else { break };
                    let pipeline = Arc::clone(&pipeline);
                    in_flight.spawn(async move {
                        let article_id = article.id;
                        Self::run_initial_attempt(&pipeline, article).await;
                        article_id
                    });
                }
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    Self::reap(finished);
                }
            }
        }

        submit_rx.close();
        tracing::info!(
            in_flight = in_flight.len(),
            "Ingestion supervisor stopping, waiting for in-flight fetches"
        );

        while let Some(finished) = in_flight.join_next().await {
            Self::reap(finished);
        }

        tracing::info!("Ingestion supervisor shutdown complete");
    }

    async fn run_initial_attempt(pipeline: &IngestionPipeline, article: Article) {
        let article_id = article.id;
        match pipeline.ingest(article, Attempt::Initial).await {
            Ok(stored) => tracing::info!(
                article_id,
                status = %stored.status,
                "Finished initial metadata fetch"
            ),
            Err(AppError::InvalidState(reason)) => tracing::warn!(
                article_id,
                reason = %reason,
                "Article changed before initial fetch was recorded"
            ),
            Err(e) => tracing::error!(
                article_id,
                error = %e,
                "Failed to record initial metadata fetch"
            ),
        }
    }

    fn reap(finished: Result<ArticleId, JoinError>) {
        match finished {
            Ok(_) => {}
            Err(e) if e.is_panic() => {
                // Article stays pending; only stale-pending recovery picks it up
                tracing::error!(error = %e, "Initial metadata fetch panicked");
            }
            Err(e) => tracing::warn!(error = %e, "Initial metadata fetch was cancelled"),
        }
    }
}
