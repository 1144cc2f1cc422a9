pub mod article;
pub mod rating;

pub use article::{Article, ArticleMetadata, ArticleStatus, NewArticle};
pub use rating::{NewRating, Rating};

/// Store-assigned article identifier
pub type ArticleId = i64;

/// Opaque identifier of an authenticated user
pub type UserId = i64;
