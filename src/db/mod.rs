pub mod articles;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use articles::PgArticleRepository;
pub use memory::InMemoryArticleRepository;
pub use postgres::{create_pool, run_migrations};
pub use repository::ArticleRepository;

#[cfg(test)]
pub use repository::MockArticleRepository;
