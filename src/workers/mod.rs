use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::modules::bot::service::BotService;
use crate::state::AppState;

pub mod downloader;

/// Spawn the download worker pool on the shared job queue.
pub fn start_download_workers(state: AppState, cancel: CancellationToken) -> TaskTracker {
    info!(
        workers = state.queue.workers(),
        capacity = state.queue.capacity(),
        "🎥 Starting download workers"
    );
    let queue = state.queue.clone();
    queue.start(cancel, move |cancel, job| {
        BotService::process_job(state.clone(), cancel, job)
    })
}
