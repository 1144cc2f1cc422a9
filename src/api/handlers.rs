use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{rating, Article, ArticleId, NewArticle, NewRating, Rating},
};

use super::{extract::CallerId, AppState};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RateArticleRequest {
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: i32,
}

/// Accepts absolute http(s) URLs only
fn validate_url(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| AppError::InvalidInput(format!("Invalid URL: {}", e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(raw.to_string()),
        _ => Err(AppError::InvalidInput(
            "URL must be an absolute http or https URL".to_string(),
        )),
    }
}

fn validate_page(query: &PageQuery) -> AppResult<(u32, u32)> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page < 1 {
        return Err(AppError::InvalidInput("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    Ok((page, limit))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Saves an article and queues its first metadata fetch
///
/// Responds before the fetch runs; the article comes back `pending`.
pub async fn create_article(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateArticleRequest>,
) -> AppResult<(StatusCode, Json<Article>)> {
    let url = validate_url(&request.url)?;

    let article = state
        .repo
        .create_article(NewArticle { user_id, url })
        .await?;

    tracing::info!(article_id = article.id, user_id, url = %article.url, "Article saved");

    state.ingestion.submit(article.clone())?;

    Ok((StatusCode::ACCEPTED, Json(article)))
}

/// Lists the caller's articles, newest first
pub async fn list_articles(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<Article>>> {
    let (page, limit) = validate_page(&query)?;
    let articles = state
        .repo
        .list_articles_by_user(user_id, page, limit)
        .await?;
    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(article_id): Path<ArticleId>,
) -> AppResult<Json<Article>> {
    let article = state.repo.get_article_for_user(article_id, user_id).await?;
    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(article_id): Path<ArticleId>,
) -> AppResult<StatusCode> {
    state.repo.delete_article(article_id, user_id).await?;
    tracing::info!(article_id, user_id, "Article deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Rates any existing article; rating again replaces the score
pub async fn rate_article(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(article_id): Path<ArticleId>,
    Json(request): Json<RateArticleRequest>,
) -> AppResult<Json<Rating>> {
    if !rating::is_valid_score(request.score) {
        return Err(AppError::InvalidInput(format!(
            "score must be between {} and {}",
            rating::MIN_SCORE,
            rating::MAX_SCORE
        )));
    }

    let stored = state
        .repo
        .upsert_rating(NewRating {
            user_id,
            article_id,
            score: request.score,
        })
        .await?;

    tracing::debug!(article_id, user_id, score = stored.score, "Article rated");

    Ok(Json(stored))
}

pub async fn get_rating(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(article_id): Path<ArticleId>,
) -> AppResult<Json<ScoreResponse>> {
    let rating = state.repo.get_rating(article_id, user_id).await?;
    Ok(Json(ScoreResponse {
        score: rating.score,
    }))
}

pub async fn delete_rating(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(article_id): Path<ArticleId>,
) -> AppResult<StatusCode> {
    state.repo.delete_rating(article_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Articles favored by users with similar taste, best first
pub async fn get_recommendations(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> AppResult<Json<Vec<Article>>> {
    let articles = state.recommender.recommend(user_id).await?;
    Ok(Json(articles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url(" https://example.com/a ").unwrap(),
            "https://example.com/a"
        );
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("mailto:someone@example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_validate_page_defaults_and_bounds() {
        assert_eq!(validate_page(&PageQuery::default()).unwrap(), (1, 10));
        assert_eq!(
            validate_page(&PageQuery {
                page: Some(3),
                limit: Some(100),
            })
            .unwrap(),
            (3, 100)
        );
        assert!(validate_page(&PageQuery {
            page: Some(0),
            limit: None,
        })
        .is_err());
        assert!(validate_page(&PageQuery {
            page: None,
            limit: Some(101),
        })
        .is_err());
        assert!(validate_page(&PageQuery {
            page: None,
            limit: Some(0),
        })
        .is_err());
    }
}
