use std::time::Duration;

use tokio::{task::JoinHandle, time::Instant};

/// Waits for background tasks to stop, sharing one `grace` deadline between
/// all of them. Tasks still running at the deadline are aborted.
pub async fn drain_tasks(tasks: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) {
    let deadline = Instant::now() + grace;

    for (name, mut task) in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task failed"),
            Err(_) => {
                tracing::warn!(
                    task = name,
                    grace_secs = grace.as_secs(),
                    "Background task did not stop in time, aborting"
                );
                task.abort();
            }
        }
    }
}
