use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MB: u64 = 1024 * 1024;

/// How often the download directory is checked for stale files.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub fn too_large(size_bytes: u64, max_mb: u64) -> bool {
    size_bytes > max_mb.saturating_mul(MB)
}

pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

/// Delete regular files in `dir` last modified more than `older_than` ago.
/// Returns how many were removed; per-file failures are logged and skipped.
pub fn cleanup_once(dir: &Path, older_than: Duration) -> io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(older_than)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        if modified >= cutoff {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Cleanup could not remove file"),
        }
    }
    Ok(removed)
}

/// Run [`cleanup_once`] every [`CLEANUP_INTERVAL`] until cancelled.
pub fn start_cleanup(dir: PathBuf, ttl: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let sweep_dir = dir.clone();
                    match tokio::task::spawn_blocking(move || cleanup_once(&sweep_dir, ttl)).await {
                        Ok(Ok(0)) => {}
                        Ok(Ok(removed)) => info!(removed, dir = %dir.display(), "🧹 Removed stale downloads"),
                        Ok(Err(e)) => warn!(dir = %dir.display(), error = %e, "Download cleanup failed"),
                        Err(e) => warn!(error = %e, "Download cleanup task panicked"),
                    }
                }
            }
        }
    })
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn size_limit_is_in_mebibytes() {
        assert!(!too_large(45 * MB, 45));
        assert!(too_large(45 * MB + 1, 45));
        assert!(too_large(1, 0));
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(50 * MB), "50.00 MB");
        assert_eq!(human_size(3 * 1024 * MB), "3.00 GB");
    }

    #[test]
    fn cleanup_removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.mp4");
        let fresh = dir.path().join("fresh.mp4");
        File::create(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(48 * 3600))
            .unwrap();
        File::create(&fresh).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let removed = cleanup_once(dir.path(), Duration::from_secs(12 * 3600)).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn cleanup_of_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cleanup_once(&dir.path().join("absent"), Duration::ZERO).is_err());
    }

    #[test]
    fn remove_if_exists_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        remove_if_exists(&path).unwrap();
        File::create(&path).unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
