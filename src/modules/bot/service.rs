use std::time::Duration;

use anyhow::Result;
use mime_guess::mime;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use url::Url;

use super::dto::{DispatchResponse, IncomingCallback, IncomingMessage, Outcome};
use super::model::{Job, Payload, Variant};
use crate::common::files;
use crate::infrastructure::messenger::{Choice, FileKind, OutboundMessage};
use crate::infrastructure::queue::job_queue::QueueError;
use crate::state::AppState;
use crate::workers::downloader::{ConversionResult, RunnerError};

pub const MSG_START: &str =
    "Hi! Send me a YouTube link, then pick a variant (360p / 720p / 1080p / 1440p / MP3).";
pub const MSG_NOT_A_LINK: &str = "That doesn't look like a YouTube link. Send something like https://youtu.be/... or https://youtube.com/watch?v=...";
pub const MSG_CHOOSE: &str = "Choose a download variant:";
pub const MSG_BUTTON_INVALID: &str = "This button is invalid or has expired. Please send the link again.";
pub const MSG_QUEUE_BUSY: &str =
    "The download queue is full right now. Please press the button again in a minute.";
pub const MSG_SEND_FAILED: &str = "Could not send the file.";
pub const CAPTION_DONE: &str = "Done";

/// Delay before re-queueing a failed job, multiplied by its attempt number.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

const YOUTUBE_HOSTS: [&str; 3] = ["youtube.com", "www.youtube.com", "m.youtube.com"];
const MIN_VIDEO_ID_LEN: usize = 6;

/// Sentence punctuation stripped from the end of a candidate link.
const TRAILING_PUNCTUATION: [char; 7] = [',', '.', ';', ':', '!', '?', ')'];

/// First word of `text` that is a supported video link.
pub fn extract_source_url(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|word| {
        let word = word.trim_end_matches(TRAILING_PUNCTUATION);
        let url = Url::parse(word).ok()?;
        is_supported_source(&url).then(|| word.to_string())
    })
}

fn is_video_id(id: &str) -> bool {
    id.len() >= MIN_VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_supported_source(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return false;
    };
    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    if host == "youtu.be" {
        return segments.next().is_some_and(is_video_id);
    }
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return false;
    }
    match segments.next() {
        Some("watch") => url
            .query_pairs()
            .any(|(k, v)| k == "v" && is_video_id(&v)),
        Some("shorts") => segments.next().is_some_and(is_video_id),
        _ => false,
    }
}

/// Split `t=<token>;v=<code>` into its parts. Order does not matter, unknown
/// keys are ignored and empty values count as missing.
pub fn parse_callback_data(data: &str) -> (Option<&str>, Option<&str>) {
    let mut token = None;
    let mut variant = None;
    for part in data.split(';') {
        if let Some(t) = part.strip_prefix("t=") {
            token = Some(t.trim());
        } else if let Some(v) = part.strip_prefix("v=") {
            variant = Some(v.trim());
        }
    }
    (
        token.filter(|t| !t.is_empty()),
        variant.filter(|v| !v.is_empty()),
    )
}

/// Buttons offered for one token: two rows of video, one of audio.
pub fn variant_menu(token: &str) -> Vec<Vec<Choice>> {
    let choice = |v: Variant| Choice {
        label: v.label().to_string(),
        data: format!("t={token};v={}", v.code()),
    };
    vec![
        vec![choice(Variant::Video360), choice(Variant::Video720)],
        vec![choice(Variant::Video1080), choice(Variant::Video1440)],
        vec![choice(Variant::AudioMp3)],
    ]
}

/// Delivery method for a finished file, chosen by its extension.
pub fn file_kind(extension: &str) -> FileKind {
    let is_audio = mime_guess::from_ext(extension)
        .first()
        .is_some_and(|m| m.type_() == mime::AUDIO);
    if is_audio {
        FileKind::Audio
    } else if extension == "mp4" {
        FileKind::Video
    } else {
        FileKind::Document
    }
}

pub struct BotService;

impl BotService {
    async fn reply(state: &AppState, chat_id: i64, text: impl Into<String>, reply_to: Option<i64>) {
        if let Err(e) = state
            .messenger
            .send(OutboundMessage::text(chat_id, text, reply_to))
            .await
        {
            error!(chat_id, error = %e, "Failed to send message");
        }
    }

    fn help_text(state: &AppState) -> String {
        format!(
            "Send a YouTube video or Shorts link. After you pick a variant the file is downloaded and sent back. Size limit is about {} MB.",
            state.config.max_file_mb
        )
    }

    pub async fn handle_message(state: AppState, req: IncomingMessage) -> Result<DispatchResponse> {
        let text = req.text.trim();
        let reply_to = Some(req.message_id);

        if text.is_empty() {
            return Ok(Outcome::Ignored.into());
        }
        if text.starts_with("/start") {
            Self::reply(&state, req.chat_id, MSG_START, None).await;
            return Ok(Outcome::Greeted.into());
        }
        if text.starts_with("/help") {
            Self::reply(&state, req.chat_id, Self::help_text(&state), None).await;
            return Ok(Outcome::Help.into());
        }

        let Some(url) = extract_source_url(text) else {
            Self::reply(&state, req.chat_id, MSG_NOT_A_LINK, reply_to).await;
            return Ok(Outcome::NotALink.into());
        };

        let token = state.tokens.issue(Payload { url }, state.config.token_ttl());
        let menu = OutboundMessage::Choices {
            chat_id: req.chat_id,
            text: MSG_CHOOSE.to_string(),
            reply_to,
            rows: variant_menu(&token),
        };
        if let Err(e) = state.messenger.send(menu).await {
            error!(chat_id = req.chat_id, error = %e, "Failed to send variant menu");
        }

        Ok(DispatchResponse {
            outcome: Outcome::ChoicesSent,
            token: Some(token),
            job_id: None,
        })
    }

    pub async fn handle_callback(state: AppState, req: IncomingCallback) -> Result<DispatchResponse> {
        let reply_to = Some(req.message_id);

        let resolved = match parse_callback_data(&req.data) {
            (Some(token), Some(code)) => code.parse::<Variant>().ok().and_then(|variant| {
                state
                    .tokens
                    .take(token)
                    .map(|(payload, remaining)| (token, variant, payload, remaining))
            }),
            _ => None,
        };
        let Some((token, variant, payload, remaining)) = resolved else {
            Self::reply(&state, req.chat_id, MSG_BUTTON_INVALID, reply_to).await;
            return Ok(Outcome::InvalidButton.into());
        };

        let job = Job::new(req.chat_id, payload.url.clone(), variant);
        let job_id = job.id;
        match state
            .queue
            .enqueue_timeout(job, state.config.enqueue_timeout())
            .await
        {
            Ok(()) => {
                info!(%job_id, chat_id = req.chat_id, variant = variant.code(), "Job queued");
                Self::reply(&state, req.chat_id, format!("Queued: {variant}"), reply_to).await;
                Ok(DispatchResponse {
                    outcome: Outcome::Queued,
                    token: None,
                    job_id: Some(job_id),
                })
            }
            Err(QueueError::Full) => {
                // keep the button usable for the rest of its lifetime
                state.tokens.put(token, payload, remaining);
                warn!(chat_id = req.chat_id, queued = state.queue.len(), "Job queue full");
                Self::reply(&state, req.chat_id, MSG_QUEUE_BUSY, reply_to).await;
                Ok(Outcome::QueueBusy.into())
            }
            Err(QueueError::Closed) => {
                state.tokens.put(token, payload, remaining);
                Err(QueueError::Closed.into())
            }
        }
    }

    /// Worker entry point: download one job and deliver the result.
    pub async fn process_job(state: AppState, cancel: CancellationToken, job: Job) {
        let span = info_span!(
            "job",
            job_id = %job.id,
            chat_id = job.chat_id,
            variant = job.variant.code(),
            attempt = job.attempts + 1,
        );
        Self::run_job(state, cancel, job).instrument(span).await
    }

    async fn run_job(state: AppState, cancel: CancellationToken, job: Job) {
        info!(url = %job.url, "Processing job");

        let result = state.downloader.download(&job.url, job.variant, &cancel).await;
        match result {
            Ok(result) => Self::deliver(&state, &job, result).await,
            Err(RunnerError::Cancelled) => {
                info!("Job abandoned on shutdown");
            }
            Err(err) if err.is_transient() && job.attempts + 1 < state.config.max_job_attempts => {
                warn!(error = %err, "Transient failure, job will be retried");
                Self::schedule_retry(state, cancel, job.next_attempt(), err.to_string());
            }
            Err(err) => {
                warn!(error = %err, "Job failed");
                Self::reply(&state, job.chat_id, format!("Download failed: {err}"), None).await;
            }
        }
    }

    /// Re-queue `job` after a backoff. If that fails the user gets `cause`,
    /// the error that triggered the retry.
    fn schedule_retry(state: AppState, cancel: CancellationToken, job: Job, cause: String) {
        let delay = RETRY_BACKOFF * job.attempts;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let chat_id = job.chat_id;
            let job_id = job.id;
            if let Err(e) = state
                .queue
                .enqueue_timeout(job, state.config.enqueue_timeout())
                .await
            {
                warn!(%job_id, error = %e, cause = %cause, "Could not re-queue job");
                Self::reply(&state, chat_id, format!("Download failed: {cause}"), None).await;
            }
        });
    }

    async fn deliver(state: &AppState, job: &Job, result: ConversionResult) {
        if files::too_large(result.size, state.config.max_file_mb) {
            info!(size = result.size, "Result over size limit");
            let text = format!(
                "The file is too large to send ({}, limit {} MB). Try 360p or Audio MP3.",
                files::human_size(result.size),
                state.config.max_file_mb
            );
            Self::reply(state, job.chat_id, text, None).await;
            if let Err(e) = files::remove_if_exists(&result.path) {
                warn!(path = %result.path.display(), error = %e, "Could not remove oversized file");
            }
            return;
        }

        let kind = file_kind(&result.extension);
        let message = OutboundMessage::File {
            chat_id: job.chat_id,
            kind,
            path: result.path.clone(),
            caption: CAPTION_DONE.to_string(),
        };
        match state.messenger.send(message).await {
            Ok(()) => info!(?kind, size = result.size, "Result delivered"),
            Err(e) => {
                error!(?kind, error = %e, "Failed to send result");
                Self::reply(state, job.chat_id, MSG_SEND_FAILED, None).await;
            }
        }
    }
}
