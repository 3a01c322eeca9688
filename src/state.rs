use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::cache::token_store::TokenStore;
use crate::infrastructure::messenger::Messenger;
use crate::infrastructure::queue::job_queue::JobQueue;
use crate::modules::bot::model::{Job, Payload};
use crate::workers::downloader::Downloader;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenStore<Payload>,
    pub queue: JobQueue<Job>,
    pub downloader: Arc<dyn Downloader>,
    pub messenger: Arc<dyn Messenger>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        downloader: Arc<dyn Downloader>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let queue = JobQueue::new(config.queue_capacity, config.concurrency);
        Self {
            config: Arc::new(config),
            tokens: TokenStore::new(),
            queue,
            downloader,
            messenger,
        }
    }
}
