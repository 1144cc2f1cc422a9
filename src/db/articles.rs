use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::repository::ArticleRepository;
use crate::{
    error::{AppError, AppResult},
    models::{Article, ArticleId, ArticleStatus, NewArticle, NewRating, Rating, UserId},
};

const ARTICLE_COLUMNS: &str = "id, user_id, url, title, description, image_url, status, \
                               retry_count, created_at, updated_at";
const RATING_COLUMNS: &str = "id, user_id, article_id, score, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: i64,
    user_id: i64,
    url: String,
    title: String,
    description: String,
    image_url: String,
    status: String,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = AppError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        Ok(Article {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            status: row.status.parse()?,
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RatingRow {
    id: i64,
    user_id: i64,
    article_id: i64,
    score: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            id: row.id,
            user_id: row.user_id,
            article_id: row.article_id,
            score: row.score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn into_articles(rows: Vec<ArticleRow>) -> AppResult<Vec<Article>> {
    rows.into_iter().map(Article::try_from).collect()
}

/// PostgreSQL-backed implementation of the data-access boundary
#[derive(Clone)]
pub struct PgArticleRepository {
    pool: PgPool,
}

impl PgArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn create_article(&self, article: NewArticle) -> AppResult<Article> {
        let query = format!(
            "INSERT INTO articles (user_id, url, status) VALUES ($1, $2, 'pending') \
             RETURNING {ARTICLE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(article.user_id)
            .bind(&article.url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict("Article from this URL already exists for this user".to_string())
                }
                other => AppError::Database(other),
            })?;

        row.try_into()
    }

    async fn get_article(&self, article_id: ArticleId) -> AppResult<Article> {
        let query = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");

        sqlx::query_as::<_, ArticleRow>(&query)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", article_id)))?
            .try_into()
    }

    async fn get_article_for_user(
        &self,
        article_id: ArticleId,
        user_id: UserId,
    ) -> AppResult<Article> {
        let query =
            format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND user_id = $2");

        sqlx::query_as::<_, ArticleRow>(&query)
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", article_id)))?
            .try_into()
    }

    async fn update_article(
        &self,
        article: &Article,
        expected_status: ArticleStatus,
    ) -> AppResult<Article> {
        let query = format!(
            "UPDATE articles \
             SET title = $2, description = $3, image_url = $4, status = $5, \
                 retry_count = $6, updated_at = NOW() \
             WHERE id = $1 AND status = $7 AND status <> 'completed' \
             RETURNING {ARTICLE_COLUMNS}"
        );

        let updated = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(article.id)
            .bind(&article.title)
            .bind(&article.description)
            .bind(&article.image_url)
            .bind(article.status.as_str())
            .bind(article.retry_count)
            .bind(expected_status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = updated {
            return row.try_into();
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM articles WHERE id = $1")
                .bind(article.id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            Some(status) => Err(AppError::InvalidState(format!(
                "Article {} is {}, expected {}",
                article.id, status, expected_status
            ))),
            None => Err(AppError::NotFound(format!(
                "Article {} not found",
                article.id
            ))),
        }
    }

    async fn delete_article(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Article {} not found",
                article_id
            )));
        }

        Ok(())
    }

    async fn list_articles_by_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<Article>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let query = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(user_id)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        into_articles(rows)
    }

    async fn list_articles_by_ids(&self, article_ids: &[ArticleId]) -> AppResult<Vec<Article>> {
        if article_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ANY($1)");

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(article_ids)
            .fetch_all(&self.pool)
            .await?;

        into_articles(rows)
    }

    async fn list_retryable_articles(&self, max_retries: i32) -> AppResult<Vec<Article>> {
        let query = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE status = 'failed' AND retry_count < $1 ORDER BY id"
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(max_retries)
            .fetch_all(&self.pool)
            .await?;

        into_articles(rows)
    }

    async fn list_stale_pending_articles(
        &self,
        updated_before: DateTime<Utc>,
        max_retries: i32,
    ) -> AppResult<Vec<Article>> {
        let query = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE status = 'pending' AND updated_at < $1 AND retry_count < $2 ORDER BY id"
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(updated_before)
            .bind(max_retries)
            .fetch_all(&self.pool)
            .await?;

        into_articles(rows)
    }

    async fn list_article_ids_by_user(&self, user_id: UserId) -> AppResult<Vec<ArticleId>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM articles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn upsert_rating(&self, rating: NewRating) -> AppResult<Rating> {
        let query = format!(
            "INSERT INTO ratings (user_id, article_id, score) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, article_id) \
             DO UPDATE SET score = EXCLUDED.score, updated_at = NOW() \
             RETURNING {RATING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, RatingRow>(&query)
            .bind(rating.user_id)
            .bind(rating.article_id)
            .bind(rating.score)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::NotFound(format!("Article {} not found", rating.article_id))
                }
                other => AppError::Database(other),
            })?;

        Ok(row.into())
    }

    async fn get_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<Rating> {
        let query = format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE article_id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, RatingRow>(&query)
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Rating::from)
            .ok_or_else(|| AppError::NotFound("No rating found for this article".to_string()))
    }

    async fn delete_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ratings WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Rating not found".to_string()));
        }

        Ok(())
    }

    async fn list_favorite_article_ids(
        &self,
        user_id: UserId,
        min_score: i32,
    ) -> AppResult<Vec<ArticleId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT article_id FROM ratings WHERE user_id = $1 AND score >= $2",
        )
        .bind(user_id)
        .bind(min_score)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_peer_user_ids(
        &self,
        user_id: UserId,
        article_ids: &[ArticleId],
        min_score: i32,
    ) -> AppResult<Vec<UserId>> {
        if article_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT user_id FROM ratings \
             WHERE user_id <> $1 AND article_id = ANY($2) AND score >= $3",
        )
        .bind(user_id)
        .bind(article_ids)
        .bind(min_score)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_ratings_by_users(
        &self,
        user_ids: &[UserId],
        min_score: i32,
    ) -> AppResult<Vec<Rating>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE user_id = ANY($1) AND score >= $2"
        );

        let rows = sqlx::query_as::<_, RatingRow>(&query)
            .bind(user_ids)
            .bind(min_score)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Rating::from).collect())
    }
}
