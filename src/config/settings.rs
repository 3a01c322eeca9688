use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub download_dir: PathBuf,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub http_proxy: Option<String>,
    /// Worker count; 0 means "use the queue default".
    pub concurrency: usize,
    /// Queue capacity; 0 means "use the queue default".
    pub queue_capacity: usize,
    pub max_file_mb: u64,
    /// 0 disables the download-dir cleanup.
    pub cleanup_ttl_hours: u64,
    pub cmd_timeout_sec: u64,
    pub token_ttl_sec: u64,
    pub token_sweep_sec: u64,
    pub enqueue_timeout_sec: u64,
    pub max_job_attempts: u32,
    pub messenger_url: Option<String>,
}

/// Upper bound for every configured duration: one year.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn capped_secs(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_DURATION)
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let download_dir = PathBuf::from(env::get_or(EnvKey::DownloadDir, "./downloads"));
        std::fs::create_dir_all(&download_dir)
            .with_context(|| format!("create download dir {}", download_dir.display()))?;
        let download_dir = std::path::absolute(&download_dir).unwrap_or(download_dir);

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            download_dir,
            ytdlp_path: env::get_opt(EnvKey::YtDlpPath),
            ffmpeg_path: env::get_opt(EnvKey::FfmpegPath),
            http_proxy: env::get_opt(EnvKey::HttpProxy),
            // negative values parse as errors and land on the default
            concurrency: env::get_parsed(EnvKey::Concurrency, 2),
            queue_capacity: env::get_parsed(EnvKey::QueueCapacity, 100),
            max_file_mb: env::get_parsed(EnvKey::MaxFileMb, 45),
            cleanup_ttl_hours: env::get_parsed(EnvKey::CleanupTtlHours, 12),
            cmd_timeout_sec: env::get_parsed(EnvKey::CmdTimeoutSec, 600),
            token_ttl_sec: env::get_parsed(EnvKey::TokenTtlSec, 15 * 60),
            token_sweep_sec: env::get_parsed(EnvKey::TokenSweepSec, 5 * 60),
            enqueue_timeout_sec: env::get_parsed(EnvKey::EnqueueTimeoutSec, 5),
            max_job_attempts: env::get_parsed(EnvKey::MaxJobAttempts, 2),
            messenger_url: env::get_opt(EnvKey::MessengerUrl),
        })
    }

    pub fn cmd_timeout(&self) -> Duration {
        capped_secs(self.cmd_timeout_sec.max(1))
    }

    pub fn token_ttl(&self) -> Duration {
        capped_secs(self.token_ttl_sec.max(1))
    }

    pub fn token_sweep_interval(&self) -> Duration {
        capped_secs(self.token_sweep_sec.max(1))
    }

    pub fn enqueue_timeout(&self) -> Duration {
        capped_secs(self.enqueue_timeout_sec)
    }

    pub fn cleanup_ttl(&self) -> Option<Duration> {
        (self.cleanup_ttl_hours > 0)
            .then(|| capped_secs(self.cleanup_ttl_hours.saturating_mul(3600)))
    }
}

impl Default for AppConfig {
    /// Defaults without touching the environment or the filesystem.
    fn default() -> Self {
        Self {
            server_port: 3000,
            download_dir: PathBuf::from("./downloads"),
            ytdlp_path: None,
            ffmpeg_path: None,
            http_proxy: None,
            concurrency: 2,
            queue_capacity: 100,
            max_file_mb: 45,
            cleanup_ttl_hours: 12,
            cmd_timeout_sec: 600,
            token_ttl_sec: 15 * 60,
            token_sweep_sec: 5 * 60,
            enqueue_timeout_sec: 5,
            max_job_attempts: 2,
            messenger_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_follow_configured_seconds() {
        let config = AppConfig::default();
        assert_eq!(config.token_ttl(), Duration::from_secs(900));
        assert_eq!(config.token_sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.cmd_timeout(), Duration::from_secs(600));
        assert_eq!(config.cleanup_ttl(), Some(Duration::from_secs(12 * 3600)));
    }

    #[test]
    fn zero_cleanup_ttl_disables_cleanup() {
        let config = AppConfig {
            cleanup_ttl_hours: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.cleanup_ttl(), None);
    }

    #[test]
    fn huge_values_are_capped() {
        let config = AppConfig {
            cleanup_ttl_hours: u64::MAX,
            token_ttl_sec: u64::MAX,
            token_sweep_sec: u64::MAX,
            cmd_timeout_sec: u64::MAX,
            enqueue_timeout_sec: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(config.cleanup_ttl(), Some(MAX_DURATION));
        assert_eq!(config.token_ttl(), MAX_DURATION);
        assert_eq!(config.token_sweep_interval(), MAX_DURATION);
        assert_eq!(config.cmd_timeout(), MAX_DURATION);
        assert_eq!(config.enqueue_timeout(), MAX_DURATION);
    }

    #[test]
    fn zero_ttls_are_raised_to_one_second() {
        let config = AppConfig {
            token_ttl_sec: 0,
            cmd_timeout_sec: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.token_ttl(), Duration::from_secs(1));
        assert_eq!(config.cmd_timeout(), Duration::from_secs(1));
    }
}
