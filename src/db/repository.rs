use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{Article, ArticleId, ArticleStatus, NewArticle, NewRating, Rating, UserId},
};

/// Data-access boundary for articles and ratings
///
/// Every call is a single attempt against the store; callers decide what to
/// do with failures. Implementations return `AppError::NotFound` for missing
/// or foreign-owned records and `AppError::Conflict` for a duplicate
/// (user, url) article.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Inserts a new article in the `Pending` state with no metadata
    async fn create_article(&self, article: NewArticle) -> AppResult<Article>;

    async fn get_article(&self, article_id: ArticleId) -> AppResult<Article>;

    /// Fetches an article only if it belongs to `user_id`
    async fn get_article_for_user(
        &self,
        article_id: ArticleId,
        user_id: UserId,
    ) -> AppResult<Article>;

    /// Overwrites the mutable fields (metadata, status, retry count) and
    /// bumps `updated_at`, but only while the stored status still equals
    /// `expected_status`. Otherwise nothing is written and
    /// `AppError::InvalidState` is returned.
    async fn update_article(
        &self,
        article: &Article,
        expected_status: ArticleStatus,
    ) -> AppResult<Article>;

    /// Deletes an owned article together with its ratings
    async fn delete_article(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()>;

    /// Newest first; `page` starts at 1
    async fn list_articles_by_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<Article>>;

    /// Order of the result is unspecified
    async fn list_articles_by_ids(&self, article_ids: &[ArticleId]) -> AppResult<Vec<Article>>;

    /// `Failed` articles with `retry_count < max_retries`, by ascending id
    async fn list_retryable_articles(&self, max_retries: i32) -> AppResult<Vec<Article>>;

    /// `Pending` articles last touched before `updated_before` with
    /// `retry_count < max_retries`, by ascending id
    async fn list_stale_pending_articles(
        &self,
        updated_before: DateTime<Utc>,
        max_retries: i32,
    ) -> AppResult<Vec<Article>>;

    async fn list_article_ids_by_user(&self, user_id: UserId) -> AppResult<Vec<ArticleId>>;

    /// Inserts a rating or replaces the score of the existing one
    async fn upsert_rating(&self, rating: NewRating) -> AppResult<Rating>;

    async fn get_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<Rating>;

    async fn delete_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()>;

    /// Ids of articles `user_id` rated at or above `min_score`
    async fn list_favorite_article_ids(
        &self,
        user_id: UserId,
        min_score: i32,
    ) -> AppResult<Vec<ArticleId>>;

    /// Distinct users other than `user_id` who rated any of `article_ids`
    /// at or above `min_score`
    async fn list_peer_user_ids(
        &self,
        user_id: UserId,
        article_ids: &[ArticleId],
        min_score: i32,
    ) -> AppResult<Vec<UserId>>;

    /// Every rating at or above `min_score` made by any of `user_ids`
    async fn list_ratings_by_users(
        &self,
        user_ids: &[UserId],
        min_score: i32,
    ) -> AppResult<Vec<Rating>>;
}
