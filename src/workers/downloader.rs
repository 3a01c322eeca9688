use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::settings::AppConfig;
use crate::infrastructure::process::{ExecError, Invocation, ProcessExecutor, ProcessOutput};
use crate::modules::bot::model::Variant;

/// `<id>_<title up to 80 chars>.<ext>`, unique per source.
const OUTPUT_TEMPLATE: &str = "%(id)s_%(title).80s.%(ext)s";

/// Longest diagnostic ever shown to a user.
pub const MAX_DIAGNOSTIC_LEN: usize = 400;

/// Stripped from the child environment on the no-proxy retry.
pub const PROXY_ENV_VARS: [&str; 8] = [
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
    "no_proxy",
];

/// Lowercase fragments that point at DNS, routing, TCP or TLS trouble.
const NETWORK_FAILURE_MARKERS: [&str; 16] = [
    "name or service not known",
    "temporary failure in name resolution",
    "nodename nor servname",
    "getaddrinfo failed",
    "could not resolve host",
    "failed to resolve",
    "no address associated with hostname",
    "network is unreachable",
    "no route to host",
    "connection refused",
    "connection reset",
    "connection timed out",
    "timed out",
    "tls handshake",
    "handshake failure",
    "ssl: ",
];

/// Exit code yt-dlp uses for invalid options.
const USAGE_ERROR_EXIT: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase, without the leading dot. Empty if the file has none.
    pub extension: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("yt-dlp failed ({}): {}", exit_label(.status), truncate_diagnostic(.stderr, MAX_DIAGNOSTIC_LEN))]
    Process { status: Option<i32>, stderr: String },
    #[error("yt-dlp timed out after {0:?}")]
    TimedOut(Duration),
    #[error("download cancelled")]
    Cancelled,
    #[error("could not start yt-dlp: {0}")]
    Spawn(String),
    #[error("could not determine output file")]
    OutputNotFound,
    #[error("output file unreadable: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Worth another run later: network trouble or a timeout.
    pub fn is_transient(&self) -> bool {
        match self {
            RunnerError::TimedOut(_) => true,
            RunnerError::Process { status, stderr } => {
                *status != Some(USAGE_ERROR_EXIT) && looks_like_network_failure(stderr)
            }
            _ => false,
        }
    }
}

impl From<ExecError> for RunnerError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::TimedOut(after) => RunnerError::TimedOut(after),
            ExecError::Cancelled => RunnerError::Cancelled,
            spawn @ ExecError::Spawn { .. } => RunnerError::Spawn(spawn.to_string()),
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "killed by signal".to_string(),
    }
}

/// Cut `text` to at most `max` bytes without splitting a character.
pub fn truncate_diagnostic(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Best-effort guess from human-readable error text. yt-dlp offers no
/// machine-readable failure codes beyond the usage exit, so this is the
/// last resort after the structured checks in [`should_retry_without_proxy`].
pub fn looks_like_network_failure(text: &str) -> bool {
    let text = text.to_lowercase();
    NETWORK_FAILURE_MARKERS.iter().any(|m| text.contains(m))
        || (text.contains("proxy") && text.contains("failed"))
}

/// Decide whether a failed first run gets one more run with the proxy off.
pub fn should_retry_without_proxy(err: &RunnerError, proxy_configured: bool) -> bool {
    match err {
        RunnerError::Process {
            status: Some(USAGE_ERROR_EXIT),
            ..
        } => false,
        RunnerError::Process { stderr, .. } => proxy_configured || looks_like_network_failure(stderr),
        RunnerError::TimedOut(_) => proxy_configured,
        RunnerError::Cancelled
        | RunnerError::Spawn(_)
        | RunnerError::OutputNotFound
        | RunnerError::Io(_) => false,
    }
}

/// yt-dlp format arguments for `variant`.
pub fn format_selector_args(variant: Variant) -> Vec<String> {
    match variant.max_height() {
        Some(h) => vec![
            "-f".to_string(),
            format!("bv*[height<={h}]+ba/b[height<={h}]"),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
        ],
        None => vec![
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
        ],
    }
}

/// The file the tool produced. The last non-empty stdout line wins when it
/// names an existing file; otherwise the first line that does once joined
/// with `dir`.
pub fn resolve_output_path(dir: &Path, stdout: &str) -> Option<PathBuf> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());

    let printed = lines.clone().last().map(|line| {
        let path = Path::new(line);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            dir.join(path)
        }
    });
    if let Some(path) = printed.filter(|p| p.is_file()) {
        return Some(path);
    }

    lines.find_map(|line| {
        let path = dir.join(line);
        path.is_file().then_some(path)
    })
}

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        variant: Variant,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, RunnerError>;
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub program: String,
    pub download_dir: PathBuf,
    pub ffmpeg_path: Option<String>,
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl From<&AppConfig> for RunnerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            program: config
                .ytdlp_path
                .clone()
                .unwrap_or_else(|| "yt-dlp".to_string()),
            download_dir: config.download_dir.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            proxy: config.http_proxy.clone(),
            timeout: config.cmd_timeout(),
        }
    }
}

/// Runs yt-dlp once per job, with a single no-proxy fallback.
pub struct YtDlpRunner {
    config: RunnerConfig,
    executor: Arc<dyn ProcessExecutor>,
}

impl YtDlpRunner {
    pub fn new(config: RunnerConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { config, executor }
    }

    pub fn build_args(&self, url: &str, variant: Variant, use_proxy: bool) -> Vec<String> {
        let mut args: Vec<String> = ["-q", "--no-warnings", "--no-progress", "--no-playlist"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend([
            "-o".to_string(),
            OUTPUT_TEMPLATE.to_string(),
            "-P".to_string(),
            self.config.download_dir.to_string_lossy().into_owned(),
        ]);
        if let Some(ffmpeg) = &self.config.ffmpeg_path {
            args.extend(["--ffmpeg-location".to_string(), ffmpeg.clone()]);
        }
        if use_proxy {
            if let Some(proxy) = &self.config.proxy {
                args.extend(["--proxy".to_string(), proxy.clone()]);
            }
        }
        args.extend(format_selector_args(variant));
        args.extend([
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--".to_string(),
            url.to_string(),
        ]);
        args
    }

    async fn run_once(
        &self,
        url: &str,
        variant: Variant,
        use_proxy: bool,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, RunnerError> {
        let invocation = Invocation {
            program: self.config.program.clone(),
            args: self.build_args(url, variant, use_proxy),
            current_dir: self.config.download_dir.clone(),
            env_remove: if use_proxy {
                Vec::new()
            } else {
                PROXY_ENV_VARS.iter().map(|k| k.to_string()).collect()
            },
            timeout: self.config.timeout,
        };

        let output = self.executor.execute(&invocation, cancel).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(RunnerError::Process {
                status: output.status,
                stderr: output.stderr,
            })
        }
    }
}

#[async_trait]
impl Downloader for YtDlpRunner {
    async fn download(
        &self,
        url: &str,
        variant: Variant,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, RunnerError> {
        let output = match self.run_once(url, variant, true, cancel).await {
            Ok(output) => output,
            Err(err) if cancel.is_cancelled() => {
                warn!(url, error = %err, "Download interrupted by shutdown");
                return Err(RunnerError::Cancelled);
            }
            Err(err) if should_retry_without_proxy(&err, self.config.proxy.is_some()) => {
                warn!(url, error = %err, "Download failed, retrying without proxy");
                self.run_once(url, variant, false, cancel).await?
            }
            Err(err) => return Err(err),
        };

        let path = resolve_output_path(&self.config.download_dir, &output.stdout)
            .ok_or(RunnerError::OutputNotFound)?;
        let path = std::path::absolute(&path)?;
        let size = tokio::fs::metadata(&path).await?.len();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        info!(url, path = %path.display(), size, "Download finished");
        Ok(ConversionResult {
            path,
            size,
            extension,
        })
    }
}
