use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    db::ArticleRepository,
    services::{
        metadata::MetadataFetcher, recommendations::RecommendationConfig, IngestionPipeline,
        IngestionQueue, Recommender,
    },
};

/// Shared application state
///
/// Built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ArticleRepository>,
    pub pipeline: Arc<IngestionPipeline>,
    pub ingestion: IngestionQueue,
    pub recommender: Arc<Recommender>,
}

impl AppState {
    /// Wires the core components together and starts the ingestion
    /// supervisor. The returned handle resolves once `shutdown` is cancelled
    /// and in-flight fetches have finished.
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        fetcher: Arc<dyn MetadataFetcher>,
        recommendation: RecommendationConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let pipeline = Arc::new(IngestionPipeline::new(repo.clone(), fetcher));
        let (ingestion, supervisor) = IngestionQueue::start(pipeline.clone(), shutdown);
        let recommender = Arc::new(Recommender::new(repo.clone(), recommendation));

        let state = Self {
            repo,
            pipeline,
            ingestion,
            recommender,
        };

        (state, supervisor)
    }
}
