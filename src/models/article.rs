use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::{ArticleId, UserId};
use crate::error::AppError;

/// Metadata ingestion state of an article
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Saved, waiting for the first fetch to finish
    Pending,
    /// Metadata fetched successfully (terminal)
    Completed,
    /// Last fetch attempt failed
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Completed => "completed",
            ArticleStatus::Failed => "failed",
        }
    }

    /// Whether a fetch outcome may move an article from `self` to `next`.
    ///
    /// `Completed` is terminal, and nothing ever moves back to `Pending`.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        matches!(
            (self, next),
            (ArticleStatus::Pending, ArticleStatus::Completed)
                | (ArticleStatus::Pending, ArticleStatus::Failed)
                | (ArticleStatus::Failed, ArticleStatus::Completed)
                | (ArticleStatus::Failed, ArticleStatus::Failed)
        )
    }
}

impl Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ArticleStatus::Pending),
            "completed" => Ok(ArticleStatus::Completed),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(AppError::Internal(format!(
                "Unknown article status '{}'",
                other
            ))),
        }
    }
}

/// Descriptive metadata scraped from an article's page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleMetadata {
    pub title: String,
    pub description: String,
    pub image_url: String,
}

/// A link saved by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub user_id: UserId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub status: ArticleStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Overwrites the scraped fields, including with empty values
    pub fn apply_metadata(&mut self, metadata: ArticleMetadata) {
        self.title = metadata.title;
        self.description = metadata.description;
        self.image_url = metadata.image_url;
    }
}

/// Fields required to save a new article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub user_id: UserId,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ArticleStatus; 3] = [
        ArticleStatus::Pending,
        ArticleStatus::Completed,
        ArticleStatus::Failed,
    ];

    #[test]
    fn test_completed_is_terminal() {
        for next in ALL {
            assert!(!ArticleStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_nothing_returns_to_pending() {
        for from in ALL {
            assert!(!from.can_transition_to(ArticleStatus::Pending));
        }
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(ArticleStatus::Pending.can_transition_to(ArticleStatus::Completed));
        assert!(ArticleStatus::Pending.can_transition_to(ArticleStatus::Failed));
        assert!(ArticleStatus::Failed.can_transition_to(ArticleStatus::Completed));
        assert!(ArticleStatus::Failed.can_transition_to(ArticleStatus::Failed));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<ArticleStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ArticleStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_apply_metadata_overwrites_with_empty_values() {
        let now = Utc::now();
        let mut article = Article {
            id: 1,
            user_id: 7,
            url: "https://example.com".to_string(),
            title: "Old title".to_string(),
            description: "Old description".to_string(),
            image_url: "https://example.com/old.png".to_string(),
            status: ArticleStatus::Failed,
            retry_count: 1,
            created_at: now,
            updated_at: now,
        };

        article.apply_metadata(ArticleMetadata {
            title: "New title".to_string(),
            ..Default::default()
        });

        assert_eq!(article.title, "New title");
        assert_eq!(article.description, "");
        assert_eq!(article.image_url, "");
    }
}
