use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    db::ArticleRepository,
    error::AppResult,
    models::{Article, ArticleId, Rating, UserId},
};

/// Recommendation tuning
#[derive(Debug, Clone, Copy)]
pub struct RecommendationConfig {
    /// Lowest score that counts as a favorite
    pub min_score: i32,
    /// Maximum number of articles returned
    pub limit: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            min_score: 4,
            limit: 10,
        }
    }
}

/// A candidate article and the number of peers who favorited it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedCandidate {
    pub article_id: ArticleId,
    pub peer_count: usize,
}

/// Generates personalized article recommendations
///
/// Collaborative filtering by co-occurrence: users who favorited any of the
/// target user's favorites are peers, and every article those peers
/// favorited scores one point per peer. Read-only.
pub struct Recommender {
    repo: Arc<dyn ArticleRepository>,
    config: RecommendationConfig,
}

impl Recommender {
    pub fn new(repo: Arc<dyn ArticleRepository>, config: RecommendationConfig) -> Self {
        Self { repo, config }
    }

    /// Returns up to `limit` articles, best first
    ///
    /// Any read failure aborts the computation; partial results are never
    /// returned.
    pub async fn recommend(&self, user_id: UserId) -> AppResult<Vec<Article>> {
        let min_score = self.config.min_score;

        let favorites = self
            .repo
            .list_favorite_article_ids(user_id, min_score)
            .await?;
        if favorites.is_empty() {
            tracing::debug!(user_id, "No favorites, nothing to recommend");
            return Ok(Vec::new());
        }

        let peers = self
            .repo
            .list_peer_user_ids(user_id, &favorites, min_score)
            .await?;
        if peers.is_empty() {
            tracing::debug!(user_id, "No peers found, nothing to recommend");
            return Ok(Vec::new());
        }

        let peer_ratings = self.repo.list_ratings_by_users(&peers, min_score).await?;
        let saved: HashSet<ArticleId> = self
            .repo
            .list_article_ids_by_user(user_id)
            .await?
            .into_iter()
            .collect();

        let ranked = rank_candidates(&peer_ratings, &saved, min_score, self.config.limit);

        tracing::debug!(
            user_id,
            favorites = favorites.len(),
            peers = peers.len(),
            candidates = ranked.len(),
            "Ranked recommendation candidates"
        );

        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ArticleId> = ranked.iter().map(|c| c.article_id).collect();
        let mut by_id: HashMap<ArticleId, Article> = self
            .repo
            .list_articles_by_ids(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        // The store returns articles in arbitrary order; restore the ranking
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

/// Counts peer favorites per article, skipping articles the user already
/// saved, and keeps the top `limit`
///
/// Higher counts come first; equal counts are ordered by ascending article
/// id.
pub fn rank_candidates(
    peer_ratings: &[Rating],
    saved: &HashSet<ArticleId>,
    min_score: i32,
    limit: usize,
) -> Vec<RankedCandidate> {
    let mut counts: HashMap<ArticleId, usize> = HashMap::new();
    for rating in peer_ratings {
        if rating.score >= min_score && !saved.contains(&rating.article_id) {
            *counts.entry(rating.article_id).or_default() += 1;
        }
    }

    let mut ranked: Vec<RankedCandidate> = counts
        .into_iter()
        .map(|(article_id, peer_count)| RankedCandidate {
            article_id,
            peer_count,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.peer_count
            .cmp(&a.peer_count)
            .then_with(|| a.article_id.cmp(&b.article_id))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryArticleRepository, MockArticleRepository};
    use crate::error::AppError;
    use crate::models::{NewArticle, NewRating};
    use chrono::Utc;

    fn rating(user_id: UserId, article_id: ArticleId, score: i32) -> Rating {
        let now = Utc::now();
        Rating {
            id: 0,
            user_id,
            article_id,
            score,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates `count` articles owned by `owner`, returning their ids
    async fn save_articles(
        repo: &InMemoryArticleRepository,
        owner: UserId,
        count: usize,
    ) -> Vec<ArticleId> {
        let mut ids = Vec::new();
        for i in 0..count {
            let article = repo
                .create_article(NewArticle {
                    user_id: owner,
                    url: format!("https://example.com/{}/{}", owner, i),
                })
                .await
                .unwrap();
            ids.push(article.id);
        }
        ids
    }

    async fn rate(repo: &InMemoryArticleRepository, user_id: UserId, article_id: ArticleId, score: i32) {
        repo.upsert_rating(NewRating {
            user_id,
            article_id,
            score,
        })
        .await
        .unwrap();
    }

    fn recommender(repo: Arc<dyn ArticleRepository>) -> Recommender {
        Recommender::new(repo, RecommendationConfig::default())
    }

    #[test]
    fn test_rank_orders_by_count_then_id() {
        let ratings = vec![
            rating(2, 30, 5),
            rating(3, 30, 4),
            rating(2, 20, 5),
            rating(3, 10, 5),
            rating(4, 30, 5),
            rating(4, 20, 4),
        ];

        let ranked = rank_candidates(&ratings, &HashSet::new(), 4, 10);

        assert_eq!(
            ranked,
            vec![
                RankedCandidate { article_id: 30, peer_count: 3 },
                RankedCandidate { article_id: 20, peer_count: 2 },
                RankedCandidate { article_id: 10, peer_count: 1 },
            ]
        );
    }

    #[test]
    fn test_rank_skips_saved_and_low_scores() {
        let ratings = vec![rating(2, 1, 5), rating(2, 2, 3), rating(3, 3, 5)];
        let saved: HashSet<ArticleId> = [1].into_iter().collect();

        let ranked = rank_candidates(&ratings, &saved, 4, 10);

        assert_eq!(ranked, vec![RankedCandidate { article_id: 3, peer_count: 1 }]);
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let ratings: Vec<Rating> = (1..=20).map(|id| rating(2, id, 5)).collect();

        let ranked = rank_candidates(&ratings, &HashSet::new(), 4, 10);

        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].article_id, 1);
        assert_eq!(ranked[9].article_id, 10);
    }

    #[tokio::test]
    async fn test_recommends_article_liked_by_peers() {
        let repo = Arc::new(InMemoryArticleRepository::new());
        // User 1 (A) saves articles 1 and 2, user 9 saves article 3
        let a_articles = save_articles(&repo, 1, 2).await;
        let other = save_articles(&repo, 9, 1).await;
        let (a1, a2, a3) = (a_articles[0], a_articles[1], other[0]);

        rate(&repo, 1, a1, 5).await;
        rate(&repo, 1, a2, 5).await;
        for peer in [2, 3] {
            rate(&repo, peer, a1, 5).await;
            rate(&repo, peer, a2, 5).await;
            rate(&repo, peer, a3, 5).await;
        }

        let recommended = recommender(repo).recommend(1).await.unwrap();

        assert_eq!(
            recommended.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![a3]
        );
    }

    #[tokio::test]
    async fn test_cold_start_returns_empty() {
        let repo = Arc::new(InMemoryArticleRepository::new());
        let ids = save_articles(&repo, 9, 3).await;
        rate(&repo, 1, ids[0], 3).await;
        for id in &ids {
            rate(&repo, 2, *id, 5).await;
        }

        assert!(recommender(repo).recommend(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_peers_returns_empty() {
        let repo = Arc::new(InMemoryArticleRepository::new());
        let ids = save_articles(&repo, 9, 2).await;
        rate(&repo, 1, ids[0], 5).await;
        // Another user likes something else entirely
        rate(&repo, 2, ids[1], 5).await;

        assert!(recommender(repo).recommend(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_order_follows_ranking() {
        let repo = Arc::new(InMemoryArticleRepository::new());
        let ids = save_articles(&repo, 9, 4).await;
        let (shared, low, high, mid) = (ids[0], ids[1], ids[2], ids[3]);

        rate(&repo, 1, shared, 5).await;
        for peer in [2, 3, 4] {
            rate(&repo, peer, shared, 4).await;
        }
        // high: 3 peers, mid: 2 peers, low: 1 peer
        for peer in [2, 3, 4] {
            rate(&repo, peer, high, 5).await;
        }
        for peer in [2, 3] {
            rate(&repo, peer, mid, 5).await;
        }
        rate(&repo, 4, low, 4).await;

        let recommended = recommender(repo).recommend(1).await.unwrap();
        let ids: Vec<ArticleId> = recommended.iter().map(|a| a.id).collect();

        // `shared` is favorited by peers too but user 1 did not save it
        assert_eq!(ids, vec![shared, high, mid, low]);
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let mut repo = MockArticleRepository::new();
        repo.expect_list_favorite_article_ids()
            .returning(|_, _| Ok(vec![1]));
        repo.expect_list_peer_user_ids()
            .returning(|_, _, _| Ok(vec![2]));
        repo.expect_list_ratings_by_users()
            .returning(|_, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));
        repo.expect_list_articles_by_ids().never();

        let result = recommender(Arc::new(repo)).recommend(1).await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_resolution_reorders_store_output() {
        let mut repo = MockArticleRepository::new();
        repo.expect_list_favorite_article_ids()
            .returning(|_, _| Ok(vec![1]));
        repo.expect_list_peer_user_ids()
            .returning(|_, _, _| Ok(vec![2, 3]));
        repo.expect_list_ratings_by_users().returning(|_, _| {
            Ok(vec![
                rating(2, 1, 5),
                rating(3, 1, 5),
                rating(2, 7, 5),
                rating(3, 7, 5),
                rating(2, 5, 4),
            ])
        });
        repo.expect_list_article_ids_by_user()
            .returning(|_| Ok(vec![1]));
        repo.expect_list_articles_by_ids()
            .withf(|ids| ids.to_vec() == vec![7, 5])
            .returning(|ids| {
                // Hand the articles back in reverse to mimic an unordered store
                let now = Utc::now();
                Ok(ids
                    .iter()
                    .rev()
                    .map(|id| Article {
                        id: *id,
                        user_id: 9,
                        url: format!("https://example.com/{}", id),
                        title: String::new(),
                        description: String::new(),
                        image_url: String::new(),
                        status: crate::models::ArticleStatus::Completed,
                        retry_count: 0,
                        created_at: now,
                        updated_at: now,
                    })
                    .collect())
            });

        let recommended = recommender(Arc::new(repo)).recommend(1).await.unwrap();

        assert_eq!(
            recommended.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![7, 5]
        );
    }
}
