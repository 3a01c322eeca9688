use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Alphabet for generated tokens: lowercase letters and digits.
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Default token length, 36^12 possible values.
pub const TOKEN_LEN: usize = 12;

/// Expiry used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

struct Entry<P> {
    payload: P,
    expires_at: Instant,
}

/// In-memory token -> payload map with per-entry expiry.
///
/// Every operation takes the same lock and none of them performs I/O while
/// holding it. Expiry is checked on read, so an entry that outlives its TTL
/// because the sweeper has not run yet is still never returned.
///
/// Uses tokio's clock, so paused test time drives expiry.
#[derive(Clone)]
pub struct TokenStore<P> {
    entries: Arc<Mutex<HashMap<String, Entry<P>>>>,
}

impl<P: Clone> TokenStore<P> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<P>>> {
        // the map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or overwrite `token`, expiring `ttl` from now.
    pub fn put(&self, token: &str, payload: P, ttl: Duration) {
        let expires_at = expiry_after(ttl);
        self.lock()
            .insert(token.to_string(), Entry { payload, expires_at });
    }

    /// Live payload for `token`. A stale entry is removed and reported as absent.
    pub fn get(&self, token: &str) -> Option<P> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(token) {
            Some(entry) if now < entry.expires_at => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Like [`get`](Self::get) but also removes a live entry, so a token
    /// resolves at most once.
    pub fn take(&self, token: &str) -> Option<(P, Duration)> {
        let mut entries = self.lock();
        let entry = entries.remove(token)?;
        let now = Instant::now();
        if now < entry.expires_at {
            Some((entry.payload, entry.expires_at - now))
        } else {
            None
        }
    }

    pub fn delete(&self, token: &str) {
        self.lock().remove(token);
    }

    /// Generate a fresh token not currently held, store `payload` under it
    /// and return it. Generation and insertion happen under one lock.
    pub fn issue(&self, payload: P, ttl: Duration) -> String {
        let mut entries = self.lock();
        let token = loop {
            let candidate = generate_token(TOKEN_LEN);
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };
        let expires_at = expiry_after(ttl);
        entries.insert(token.clone(), Entry { payload, expires_at });
        token
    }

    /// Remove every entry whose expiry has passed. Returns how many went.
    pub fn sweep(&self) -> usize {
        let mut entries = self.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: Clone + Send + 'static> TokenStore<P> {
    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    pub fn start_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "Swept expired tokens");
                        }
                    }
                }
            }
        })
    }
}

impl<P: Clone> Default for TokenStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniformly random string of `len` chars over `[a-z0-9]`.
///
/// Draws from the thread-local CSPRNG, seeded once per thread by the OS.
pub fn generate_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn put_then_get_returns_payload() {
        let store = TokenStore::new();
        store.put("abc", "https://youtu.be/dQw4w9WgXcQ".to_string(), TTL);

        assert_eq!(
            store.get("abc").as_deref(),
            Some("https://youtu.be/dQw4w9WgXcQ")
        );
        // get does not consume
        assert!(store.get("abc").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_never_resurrected() {
        let store = TokenStore::new();
        store.put("abc", 1u32, TTL);

        tokio::time::advance(TTL).await;

        assert_eq!(store.get("abc"), None);
        assert_eq!(store.len(), 0, "stale entry removed on read");
        assert_eq!(store.get("abc"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_does_not_panic() {
        let store = TokenStore::new();
        store.put("abc", 1u32, Duration::MAX);
        let token = store.issue(2u32, Duration::MAX);

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;

        assert_eq!(store.get("abc"), Some(1));
        assert_eq!(store.get(&token), Some(2));
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_resets_expiry() {
        let store = TokenStore::new();
        store.put("abc", 1u32, TTL);
        tokio::time::advance(Duration::from_secs(50)).await;
        store.put("abc", 2u32, TTL);
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(store.get("abc"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn take_consumes_live_token_once() {
        let store = TokenStore::new();
        store.put("abc", 7u32, TTL);
        tokio::time::advance(Duration::from_secs(20)).await;

        let (payload, remaining) = store.take("abc").expect("live token");
        assert_eq!(payload, 7);
        assert_eq!(remaining, Duration::from_secs(40));
        assert_eq!(store.take("abc"), None);
        assert_eq!(store.get("abc"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn take_of_expired_token_fails_and_removes_it() {
        let store = TokenStore::new();
        store.put("abc", 7u32, TTL);
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert_eq!(store.take("abc"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_is_noop_for_missing_token() {
        let store = TokenStore::new();
        store.put("abc", 1u32, TTL);
        store.delete("missing");
        store.delete("abc");

        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let store = TokenStore::new();
        store.put("short", 1u32, Duration::from_secs(10));
        store.put("long", 2u32, Duration::from_secs(100));

        assert_eq!(store.sweep(), 0);
        tokio::time::advance(Duration::from_secs(10)).await;

        for _ in 0..5 {
            store.sweep();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_on_interval_and_stops_on_cancel() {
        let store = TokenStore::new();
        store.put("short", 1u32, Duration::from_secs(5));
        store.put("long", 2u32, Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let handle = store.start_sweeper(Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.len(), 1);

        cancel.cancel();
        handle.await.expect("sweeper exits cleanly");
    }

    #[tokio::test]
    async fn issue_returns_distinct_well_formed_tokens() {
        let store = TokenStore::new();
        let a = store.issue("a".to_string(), TTL);
        let b = store.issue("b".to_string(), TTL);

        assert_ne!(a, b);
        for token in [&a, &b] {
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(
                token
                    .bytes()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
        assert_eq!(store.get(&a).as_deref(), Some("a"));
        assert_eq!(store.get(&b).as_deref(), Some("b"));
    }

    #[test]
    fn generate_token_respects_length() {
        assert_eq!(generate_token(0), "");
        assert_eq!(generate_token(32).len(), 32);
    }
}
