use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DownloadDir,
    YtDlpPath,
    FfmpegPath,
    HttpProxy,
    Concurrency,
    QueueCapacity,
    MaxFileMb,
    CleanupTtlHours,
    CmdTimeoutSec,
    TokenTtlSec,
    TokenSweepSec,
    EnqueueTimeoutSec,
    MaxJobAttempts,
    MessengerUrl,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DownloadDir => "DOWNLOAD_DIR",
            EnvKey::YtDlpPath => "YTDLP_PATH",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::HttpProxy => "HTTP_PROXY",
            EnvKey::Concurrency => "CONCURRENCY",
            EnvKey::QueueCapacity => "QUEUE_CAPACITY",
            EnvKey::MaxFileMb => "MAX_FILE_MB",
            EnvKey::CleanupTtlHours => "CLEANUP_TTL_HOURS",
            EnvKey::CmdTimeoutSec => "CMD_TIMEOUT_SEC",
            EnvKey::TokenTtlSec => "TOKEN_TTL_SEC",
            EnvKey::TokenSweepSec => "TOKEN_SWEEP_SEC",
            EnvKey::EnqueueTimeoutSec => "ENQUEUE_TIMEOUT_SEC",
            EnvKey::MaxJobAttempts => "MAX_JOB_ATTEMPTS",
            EnvKey::MessengerUrl => "MESSENGER_URL",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

/// Trimmed value, `None` when unset or blank.
pub fn get_opt(key: EnvKey) -> Option<String> {
    get(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
