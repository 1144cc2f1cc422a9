pub mod ingestion;
pub mod ingestion_queue;
pub mod metadata;
pub mod recommendations;
pub mod retry_worker;

pub use ingestion::{Attempt, IngestionPipeline};
pub use ingestion_queue::IngestionQueue;
pub use metadata::{HttpMetadataFetcher, MetadataFetcher};
pub use recommendations::Recommender;
pub use retry_worker::RetryWorker;
