use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::ingestion::{Attempt, IngestionPipeline};
use crate::{
    db::ArticleRepository,
    error::{AppError, AppResult},
    models::{Article, ArticleStatus},
};

/// Retry worker settings
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub tick_interval: Duration,
    /// Articles with `retry_count` at or above this are never selected again
    pub max_retries: i32,
    /// Also retry `Pending` articles untouched for this long. `None` leaves
    /// pending articles alone.
    pub stale_pending_after: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            max_retries: 3,
            stale_pending_after: None,
        }
    }
}

/// Outcome counts for one worker pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Another attempt changed the article first; nothing was written
    pub skipped: usize,
    pub errored: usize,
}

/// Periodically re-attempts metadata fetches for failed articles
///
/// Articles are processed one at a time; a pass takes as long as the sum of
/// its fetches.
pub struct RetryWorker {
    repo: Arc<dyn ArticleRepository>,
    pipeline: Arc<IngestionPipeline>,
    config: RetryConfig,
}

impl RetryWorker {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        pipeline: Arc<IngestionPipeline>,
        config: RetryConfig,
    ) -> Self {
        Self {
            repo,
            pipeline,
            config,
        }
    }

    /// Spawns the worker loop. The first pass runs immediately.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            tick_secs = self.config.tick_interval.as_secs(),
            max_retries = self.config.max_retries,
            stale_pending_after_secs = self.config.stale_pending_after.map(|d| d.as_secs()),
            "Retry worker started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_pass(&shutdown).await {
                        Ok(summary) if summary.attempted > 0 => {
                            tracing::info!(
                                attempted = summary.attempted,
                                completed = summary.completed,
                                failed = summary.failed,
                                skipped = summary.skipped,
                                errored = summary.errored,
                                "Retry pass finished"
                            );
                        }
                        Ok(_) => tracing::debug!("Retry pass found nothing to retry"),
                        Err(e) => tracing::error!(error = %e, "Retry pass could not load articles"),
                    }
                }
            }
        }

        tracing::info!("Retry worker shutdown complete");
    }

    /// Runs one pass over every retryable article, sequentially
    ///
    /// Only the initial selection can fail the pass. Per-article persistence
    /// failures are logged and counted, and the pass moves on. Cancellation
    /// is checked between articles.
    pub async fn run_pass(&self, shutdown: &CancellationToken) -> AppResult<PassSummary> {
        let candidates = self.select_candidates().await?;
        let mut summary = PassSummary::default();

        if !candidates.is_empty() {
            tracing::info!(count = candidates.len(), "Found articles to retry");
        }

        for article in candidates {
            if shutdown.is_cancelled() {
                tracing::info!("Shutdown requested, ending retry pass early");
                break;
            }

            let article_id = article.id;
            tracing::debug!(
                article_id,
                url = %article.url,
                attempt = article.retry_count + 1,
                "Retrying metadata fetch"
            );

            summary.attempted += 1;
            match self.pipeline.ingest(article, Attempt::Retry).await {
                Ok(stored) if stored.status == ArticleStatus::Completed => summary.completed += 1,
                Ok(stored) => {
                    summary.failed += 1;
                    if stored.retry_count >= self.config.max_retries {
                        tracing::warn!(
                            article_id,
                            retry_count = stored.retry_count,
                            "Article exhausted its retries and stays failed"
                        );
                    }
                }
                Err(AppError::InvalidState(reason)) => {
                    summary.skipped += 1;
                    tracing::warn!(article_id, reason = %reason, "Article changed during retry, skipped");
                }
                Err(e) => {
                    summary.errored += 1;
                    tracing::error!(article_id, error = %e, "Failed to update article after retry");
                }
            }
        }

        Ok(summary)
    }

    async fn select_candidates(&self) -> AppResult<Vec<Article>> {
        let mut candidates = self
            .repo
            .list_retryable_articles(self.config.max_retries)
            .await?;

        if let Some(stale_after) = self.config.stale_pending_after {
            let stale_after = chrono::Duration::from_std(stale_after)
                .map_err(|e| AppError::Internal(format!("Invalid stale pending age: {}", e)))?;
            let stale = self
                .repo
                .list_stale_pending_articles(Utc::now() - stale_after, self.config.max_retries)
                .await?;

            if !stale.is_empty() {
                tracing::warn!(count = stale.len(), "Recovering stale pending articles");
            }
            candidates.extend(stale);
        }

        Ok(candidates)
    }
}
