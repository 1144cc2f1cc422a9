use std::sync::Arc;

use crate::{
    db::ArticleRepository,
    error::{AppError, AppResult},
    models::{Article, ArticleMetadata, ArticleStatus},
    services::metadata::{FetchError, MetadataFetcher},
};

/// Where an ingestion attempt originates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The fetch fired when the article is saved; does not count as a retry
    Initial,
    /// A re-attempt issued by the retry worker
    Retry,
}

/// Applies one fetch outcome to an article in memory
///
/// Retry attempts bump `retry_count` whatever the outcome. A successful fetch
/// overwrites all metadata fields and completes the article; a failed one
/// leaves it `Failed`. Attempts against a `Completed` article, and initial
/// attempts against anything but `Pending`, are rejected without touching it.
pub fn apply_fetch_outcome(
    article: &mut Article,
    attempt: Attempt,
    outcome: Result<ArticleMetadata, FetchError>,
) -> AppResult<()> {
    let next = match outcome {
        Ok(_) => ArticleStatus::Completed,
        Err(_) => ArticleStatus::Failed,
    };

    if !article.status.can_transition_to(next) {
        return Err(AppError::InvalidState(format!(
            "Article {} cannot move from {} to {}",
            article.id, article.status, next
        )));
    }

    if attempt == Attempt::Initial && article.status != ArticleStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "Initial ingestion of article {} requires a pending article, found {}",
            article.id, article.status
        )));
    }

    if attempt == Attempt::Retry {
        article.retry_count += 1;
    }

    if let Ok(metadata) = outcome {
        article.apply_metadata(metadata);
    }
    article.status = next;

    Ok(())
}

/// Runs fetch attempts and persists their outcome
pub struct IngestionPipeline {
    repo: Arc<dyn ArticleRepository>,
    fetcher: Arc<dyn MetadataFetcher>,
}

impl IngestionPipeline {
    pub fn new(repo: Arc<dyn ArticleRepository>, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self { repo, fetcher }
    }

    /// Fetches metadata for `article`, applies the outcome and writes the
    /// record back. Returns the stored article.
    ///
    /// A failed fetch is not an error here: it is recorded on the article.
    /// Errors are persistence failures or invalid-state attempts, including
    /// the stored row having moved on from the status `article` was read
    /// with.
    pub async fn ingest(&self, mut article: Article, attempt: Attempt) -> AppResult<Article> {
        if article.status == ArticleStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Article {} is already completed",
                article.id
            )));
        }

        let read_status = article.status;
        let outcome = self.fetcher.fetch(&article.url).await;

        match &outcome {
            Ok(_) => tracing::info!(
                article_id = article.id,
                attempt = ?attempt,
                "Metadata fetch succeeded"
            ),
            Err(e) => tracing::warn!(
                article_id = article.id,
                attempt = ?attempt,
                error = %e,
                "Metadata fetch failed"
            ),
        }

        apply_fetch_outcome(&mut article, attempt, outcome)?;

        let stored = self.repo.update_article(&article, read_status).await?;

        tracing::debug!(
            article_id = stored.id,
            status = %stored.status,
            retry_count = stored.retry_count,
            "Article ingestion state saved"
        );

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockArticleRepository;
    use crate::services::metadata::MockMetadataFetcher;
    use chrono::Utc;

    fn article(status: ArticleStatus, retry_count: i32) -> Article {
        let now = Utc::now();
        Article {
            id: 42,
            user_id: 1,
            url: "https://example.com/post".to_string(),
            title: "Previous".to_string(),
            description: "Previous description".to_string(),
            image_url: String::new(),
            status,
            retry_count,
            created_at: now,
            updated_at: now,
        }
    }

    fn scraped() -> ArticleMetadata {
        ArticleMetadata {
            title: "Fresh".to_string(),
            description: String::new(),
            image_url: "https://example.com/img.png".to_string(),
        }
    }

    fn timeout() -> FetchError {
        FetchError::Timeout {
            url: "https://example.com/post".to_string(),
        }
    }

    #[test]
    fn test_initial_success_completes_without_counting() {
        let mut a = article(ArticleStatus::Pending, 0);
        apply_fetch_outcome(&mut a, Attempt::Initial, Ok(scraped())).unwrap();

        assert_eq!(a.status, ArticleStatus::Completed);
        assert_eq!(a.retry_count, 0);
        assert_eq!(a.title, "Fresh");
        // Empty scraped values overwrite previous ones
        assert_eq!(a.description, "");
    }

    #[test]
    fn test_initial_failure_marks_failed_without_counting() {
        let mut a = article(ArticleStatus::Pending, 0);
        apply_fetch_outcome(&mut a, Attempt::Initial, Err(timeout())).unwrap();

        assert_eq!(a.status, ArticleStatus::Failed);
        assert_eq!(a.retry_count, 0);
        assert_eq!(a.title, "Previous");
    }

    #[test]
    fn test_retry_counts_every_attempt() {
        let mut a = article(ArticleStatus::Failed, 1);
        apply_fetch_outcome(&mut a, Attempt::Retry, Err(timeout())).unwrap();
        assert_eq!(a.status, ArticleStatus::Failed);
        assert_eq!(a.retry_count, 2);

        apply_fetch_outcome(&mut a, Attempt::Retry, Ok(scraped())).unwrap();
        assert_eq!(a.status, ArticleStatus::Completed);
        assert_eq!(a.retry_count, 3);
    }

    #[test]
    fn test_completed_article_is_never_touched() {
        let mut a = article(ArticleStatus::Completed, 1);
        let before = a.clone();

        for attempt in [Attempt::Initial, Attempt::Retry] {
            assert!(apply_fetch_outcome(&mut a, attempt, Ok(scraped())).is_err());
            assert!(apply_fetch_outcome(&mut a, attempt, Err(timeout())).is_err());
        }

        assert_eq!(a, before);
    }

    #[test]
    fn test_initial_attempt_requires_pending() {
        let mut a = article(ArticleStatus::Failed, 0);
        let result = apply_fetch_outcome(&mut a, Attempt::Initial, Ok(scraped()));

        assert!(matches!(result, Err(AppError::InvalidState(_))));
        assert_eq!(a.status, ArticleStatus::Failed);
    }

    #[tokio::test]
    async fn test_ingest_persists_outcome() {
        let mut fetcher = MockMetadataFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url == "https://example.com/post")
            .times(1)
            .returning(|_| Ok(scraped()));

        let mut repo = MockArticleRepository::new();
        repo.expect_update_article()
            .withf(|a, expected| {
                a.status == ArticleStatus::Completed
                    && a.retry_count == 1
                    && *expected == ArticleStatus::Failed
            })
            .times(1)
            .returning(|a, _| Ok(a.clone()));

        let pipeline = IngestionPipeline::new(Arc::new(repo), Arc::new(fetcher));
        let stored = pipeline
            .ingest(article(ArticleStatus::Failed, 0), Attempt::Retry)
            .await
            .unwrap();

        assert_eq!(stored.title, "Fresh");
    }

    #[tokio::test]
    async fn test_ingest_skips_fetch_for_completed_article() {
        let mut fetcher = MockMetadataFetcher::new();
        fetcher.expect_fetch().never();
        let mut repo = MockArticleRepository::new();
        repo.expect_update_article().never();

        let pipeline = IngestionPipeline::new(Arc::new(repo), Arc::new(fetcher));
        let result = pipeline
            .ingest(article(ArticleStatus::Completed, 0), Attempt::Retry)
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_ingest_surfaces_persistence_failure() {
        let mut fetcher = MockMetadataFetcher::new();
        fetcher.expect_fetch().returning(|_| Err(timeout()));
        let mut repo = MockArticleRepository::new();
        repo.expect_update_article()
            .returning(|_, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let pipeline = IngestionPipeline::new(Arc::new(repo), Arc::new(fetcher));
        let result = pipeline
            .ingest(article(ArticleStatus::Pending, 0), Attempt::Initial)
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
