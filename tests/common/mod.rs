#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use tubedrop::config::settings::AppConfig;
use tubedrop::infrastructure::messenger::{Messenger, MessengerError, OutboundMessage};
use tubedrop::modules::bot::model::Variant;
use tubedrop::state::AppState;
use tubedrop::workers::downloader::{ConversionResult, Downloader, RunnerError};

/// Longest a test waits for an outbound message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Config with defaults, pointed at `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        download_dir: dir.to_path_buf(),
        ..AppConfig::default()
    }
}

/// Captures everything the service tries to send. With `fail_files` set,
/// file sends are recorded and then reported as failed.
pub struct RecordingMessenger {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    fail_files: bool,
}

impl RecordingMessenger {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        Self::build(false)
    }

    pub fn failing_files() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        Self::build(true)
    }

    fn build(fail_files: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fail_files }), rx)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessengerError> {
        let is_file = matches!(message, OutboundMessage::File { .. });
        let _ = self.tx.send(message);
        if self.fail_files && is_file {
            return Err(MessengerError::HttpStatus(502));
        }
        Ok(())
    }
}

/// Stands in for yt-dlp: plays back scripted failures, then writes a file of
/// `size` bytes into `dir`.
pub struct FakeDownloader {
    dir: PathBuf,
    size: usize,
    failures: Mutex<VecDeque<RunnerError>>,
    calls: AtomicUsize,
}

impl FakeDownloader {
    pub fn new(dir: &Path, size: usize) -> Arc<Self> {
        Self::failing_first(dir, size, Vec::new())
    }

    pub fn failing_first(dir: &Path, size: usize, failures: Vec<RunnerError>) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            size,
            failures: Mutex::new(failures.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        _url: &str,
        variant: Variant,
        _cancel: &CancellationToken,
    ) -> Result<ConversionResult, RunnerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let extension = if variant.is_audio() { "mp3" } else { "mp4" };
        let path = self.dir.join(format!("clip{n}_{}.{extension}", variant.code()));
        std::fs::write(&path, vec![0u8; self.size])?;
        Ok(ConversionResult {
            path,
            size: self.size as u64,
            extension: extension.to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub messages: mpsc::UnboundedReceiver<OutboundMessage>,
    pub cancel: CancellationToken,
}

impl TestApp {
    /// Build the router and state. Workers only run if `start_workers`.
    pub fn new(config: AppConfig, downloader: Arc<dyn Downloader>, start_workers: bool) -> Self {
        Self::with_messenger(config, downloader, start_workers, RecordingMessenger::new())
    }

    pub fn with_messenger(
        config: AppConfig,
        downloader: Arc<dyn Downloader>,
        start_workers: bool,
        (messenger, messages): (Arc<RecordingMessenger>, mpsc::UnboundedReceiver<OutboundMessage>),
    ) -> Self {
        let state = AppState::new(config, downloader, messenger);
        let cancel = CancellationToken::new();
        if start_workers {
            tubedrop::workers::start_download_workers(state.clone(), cancel.clone());
        }
        Self {
            router: tubedrop::app::create_app(state.clone()),
            state,
            messages,
            cancel,
        }
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a chat message and return the issued token.
    pub async fn send_link(&mut self, chat_id: i64, text: &str) -> String {
        let response = self
            .post(
                "/api/v1/bot/messages",
                serde_json::json!({ "chat_id": chat_id, "message_id": 1, "text": text }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["outcome"], "choices_sent");
        // drain the menu
        self.next_message().await;
        json["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn press(&self, chat_id: i64, data: &str) -> Response {
        self.post(
            "/api/v1/bot/callbacks",
            serde_json::json!({ "chat_id": chat_id, "message_id": 2, "data": data }),
        )
        .await
    }

    pub async fn next_message(&mut self) -> OutboundMessage {
        tokio::time::timeout(RECV_TIMEOUT, self.messages.recv())
            .await
            .expect("timed out waiting for outbound message")
            .expect("messenger channel closed")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn text_of(message: &OutboundMessage) -> Option<&str> {
    match message {
        OutboundMessage::Text { text, .. } => Some(text),
        _ => None,
    }
}
