use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ArticleId, UserId};

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

/// A user's score for an article, unique per (user, article)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rating {
    pub id: i64,
    pub user_id: UserId,
    pub article_id: ArticleId,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert-or-replace payload for a rating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRating {
    pub user_id: UserId,
    pub article_id: ArticleId,
    pub score: i32,
}

/// Returns true when `score` lies in the accepted 1..=5 range
pub fn is_valid_score(score: i32) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}
