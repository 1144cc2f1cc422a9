use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::repository::ArticleRepository;
use crate::{
    error::{AppError, AppResult},
    models::{Article, ArticleId, ArticleStatus, NewArticle, NewRating, Rating, UserId},
};

/// Process-local implementation of the data-access boundary
///
/// Mirrors the PostgreSQL semantics (unique keys, cascading deletes, upsert)
/// so it can stand in for the database in development and tests.
#[derive(Default)]
pub struct InMemoryArticleRepository {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    articles: BTreeMap<ArticleId, Article>,
    ratings: BTreeMap<(UserId, ArticleId), Rating>,
    next_article_id: i64,
    next_rating_id: i64,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdates an article's `updated_at`
    pub async fn set_updated_at(&self, article_id: ArticleId, updated_at: DateTime<Utc>) {
        if let Some(article) = self.inner.write().await.articles.get_mut(&article_id) {
            article.updated_at = updated_at;
        }
    }
}

fn article_not_found(article_id: ArticleId) -> AppError {
    AppError::NotFound(format!("Article {} not found", article_id))
}

#[async_trait::async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn create_article(&self, article: NewArticle) -> AppResult<Article> {
        let mut inner = self.inner.write().await;

        let duplicate = inner
            .articles
            .values()
            .any(|a| a.user_id == article.user_id && a.url == article.url);
        if duplicate {
            return Err(AppError::Conflict(
                "Article from this URL already exists for this user".to_string(),
            ));
        }

        inner.next_article_id += 1;
        let now = Utc::now();
        let created = Article {
            id: inner.next_article_id,
            user_id: article.user_id,
            url: article.url,
            title: String::new(),
            description: String::new(),
            image_url: String::new(),
            status: ArticleStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };
        inner.articles.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_article(&self, article_id: ArticleId) -> AppResult<Article> {
        self.inner
            .read()
            .await
            .articles
            .get(&article_id)
            .cloned()
            .ok_or_else(|| article_not_found(article_id))
    }

    async fn get_article_for_user(
        &self,
        article_id: ArticleId,
        user_id: UserId,
    ) -> AppResult<Article> {
        self.inner
            .read()
            .await
            .articles
            .get(&article_id)
            .filter(|a| a.user_id == user_id)
            .cloned()
            .ok_or_else(|| article_not_found(article_id))
    }

    async fn update_article(
        &self,
        article: &Article,
        expected_status: ArticleStatus,
    ) -> AppResult<Article> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .articles
            .get_mut(&article.id)
            .ok_or_else(|| article_not_found(article.id))?;

        if stored.status != expected_status || stored.status == ArticleStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Article {} is {}, expected {}",
                article.id, stored.status, expected_status
            )));
        }

        stored.title = article.title.clone();
        stored.description = article.description.clone();
        stored.image_url = article.image_url.clone();
        stored.status = article.status;
        stored.retry_count = article.retry_count;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete_article(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .articles
            .get(&article_id)
            .is_some_and(|a| a.user_id == user_id);
        if !owned {
            return Err(article_not_found(article_id));
        }

        inner.articles.remove(&article_id);
        inner.ratings.retain(|(_, rated), _| *rated != article_id);

        Ok(())
    }

    async fn list_articles_by_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut articles: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();

        articles.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = page.saturating_sub(1) as usize * limit as usize;
        Ok(articles
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn list_articles_by_ids(&self, article_ids: &[ArticleId]) -> AppResult<Vec<Article>> {
        let inner = self.inner.read().await;
        let wanted: BTreeSet<ArticleId> = article_ids.iter().copied().collect();

        Ok(wanted
            .into_iter()
            .filter_map(|id| inner.articles.get(&id).cloned())
            .collect())
    }

    async fn list_retryable_articles(&self, max_retries: i32) -> AppResult<Vec<Article>> {
        let inner = self.inner.read().await;

        Ok(inner
            .articles
            .values()
            .filter(|a| a.status == ArticleStatus::Failed && a.retry_count < max_retries)
            .cloned()
            .collect())
    }

    async fn list_stale_pending_articles(
        &self,
        updated_before: DateTime<Utc>,
        max_retries: i32,
    ) -> AppResult<Vec<Article>> {
        let inner = self.inner.read().await;

        Ok(inner
            .articles
            .values()
            .filter(|a| {
                a.status == ArticleStatus::Pending
                    && a.updated_at < updated_before
                    && a.retry_count < max_retries
            })
            .cloned()
            .collect())
    }

    async fn list_article_ids_by_user(&self, user_id: UserId) -> AppResult<Vec<ArticleId>> {
        let inner = self.inner.read().await;

        Ok(inner
            .articles
            .values()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.id)
            .collect())
    }

    async fn upsert_rating(&self, rating: NewRating) -> AppResult<Rating> {
        let mut inner = self.inner.write().await;

        if !inner.articles.contains_key(&rating.article_id) {
            return Err(article_not_found(rating.article_id));
        }

        let now = Utc::now();
        let key = (rating.user_id, rating.article_id);

        if let Some(existing) = inner.ratings.get_mut(&key) {
            existing.score = rating.score;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        inner.next_rating_id += 1;
        let created = Rating {
            id: inner.next_rating_id,
            user_id: rating.user_id,
            article_id: rating.article_id,
            score: rating.score,
            created_at: now,
            updated_at: now,
        };
        inner.ratings.insert(key, created.clone());

        Ok(created)
    }

    async fn get_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<Rating> {
        self.inner
            .read()
            .await
            .ratings
            .get(&(user_id, article_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound("No rating found for this article".to_string()))
    }

    async fn delete_rating(&self, article_id: ArticleId, user_id: UserId) -> AppResult<()> {
        self.inner
            .write()
            .await
            .ratings
            .remove(&(user_id, article_id))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Rating not found".to_string()))
    }

    async fn list_favorite_article_ids(
        &self,
        user_id: UserId,
        min_score: i32,
    ) -> AppResult<Vec<ArticleId>> {
        let inner = self.inner.read().await;

        Ok(inner
            .ratings
            .values()
            .filter(|r| r.user_id == user_id && r.score >= min_score)
            .map(|r| r.article_id)
            .collect())
    }

    async fn list_peer_user_ids(
        &self,
        user_id: UserId,
        article_ids: &[ArticleId],
        min_score: i32,
    ) -> AppResult<Vec<UserId>> {
        let inner = self.inner.read().await;
        let wanted: HashSet<ArticleId> = article_ids.iter().copied().collect();

        let peers: BTreeSet<UserId> = inner
            .ratings
            .values()
            .filter(|r| {
                r.user_id != user_id && r.score >= min_score && wanted.contains(&r.article_id)
            })
            .map(|r| r.user_id)
            .collect();

        Ok(peers.into_iter().collect())
    }

    async fn list_ratings_by_users(
        &self,
        user_ids: &[UserId],
        min_score: i32,
    ) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        let wanted: HashSet<UserId> = user_ids.iter().copied().collect();

        Ok(inner
            .ratings
            .values()
            .filter(|r| wanted.contains(&r.user_id) && r.score >= min_score)
            .cloned()
            .collect())
    }
}
