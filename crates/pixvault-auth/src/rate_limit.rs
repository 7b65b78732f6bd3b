//! Sliding-window throttle for failed logins.
//!
//! Each key owns an independently locked window of failure timestamps. The
//! shared map is only locked long enough to find or create a window, so
//! attempts for different users never wait on each other, while
//! prune-and-append for one key is atomic.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::AuthError;

/// What a throttle window is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThrottleKey {
    Username(String),
    /// Client address, for throttling before the account is known.
    Origin(IpAddr),
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleKey::Username(name) => write!(f, "user:{}", name),
            ThrottleKey::Origin(addr) => write!(f, "addr:{}", addr),
        }
    }
}

/// Gate consulted around credential verification.
///
/// Implementations may keep windows anywhere (memory, a shared cache) as long
/// as `register_failure` is atomic per key.
pub trait LoginThrottle: Send + Sync {
    /// Fail with [`AuthError::RateLimited`] if the key is at its limit. Records nothing.
    fn check(&self, key: &ThrottleKey) -> Result<(), AuthError>;

    /// Record a failed attempt, or fail with [`AuthError::RateLimited`] if already at the limit.
    fn register_failure(&self, key: &ThrottleKey) -> Result<(), AuthError>;
}

/// Failure timestamps for one key, oldest first.
#[derive(Debug, Default)]
struct AttemptWindow {
    attempts: VecDeque<Instant>,
}

impl AttemptWindow {
    /// Drop attempts that are `window` or more in the past.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.attempts.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest attempt leaves the window.
    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        self.attempts
            .front()
            .map(|&oldest| (oldest + window).saturating_duration_since(now))
            .unwrap_or_default()
    }
}

type SharedWindow = Arc<Mutex<AttemptWindow>>;

/// In-memory [`LoginThrottle`]. Windows are lost on restart.
///
/// Idle windows are swept when a new key is inserted, at most once per window
/// length, so the map only holds keys that failed within the last two windows.
pub struct LoginRateLimiter {
    windows: RwLock<HashMap<String, SharedWindow>>,
    last_sweep: Mutex<Instant>,
    max_attempts: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl LoginRateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(clock.now()),
            max_attempts: config.max_attempts,
            window: config.window(),
            clock,
        }
    }

    /// Failures currently counted against `key`.
    pub fn attempts(&self, key: &ThrottleKey) -> usize {
        let Some(window) = self.existing(&key.to_string()) else {
            return 0;
        };
        let mut window = window.lock();
        window.prune(self.clock.now(), self.window);
        window.attempts.len()
    }

    /// Number of keys with a live window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.read().len()
    }

    /// Forget windows that are empty and not in use by a concurrent call.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        *self.last_sweep.lock() = now;
        self.purge_locked(&mut self.windows.write(), now)
    }

    fn purge_locked(&self, windows: &mut HashMap<String, SharedWindow>, now: Instant) -> usize {
        let before = windows.len();
        windows.retain(|_, window| {
            // Holding the map write lock means no new references can appear.
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let mut window = window.lock();
            window.prune(now, self.window);
            !window.attempts.is_empty()
        });
        let purged = before - windows.len();
        if purged > 0 {
            debug!(purged, remaining = windows.len(), "purged idle login windows");
        }
        purged
    }

    fn existing(&self, key: &str) -> Option<SharedWindow> {
        self.windows.read().get(key).cloned()
    }

    fn window_for(&self, key: &str) -> SharedWindow {
        if let Some(window) = self.existing(key) {
            return window;
        }
        let now = self.clock.now();
        let mut windows = self.windows.write();
        if let Some(window) = windows.get(key) {
            return window.clone();
        }
        if self.sweep_due(now) {
            self.purge_locked(&mut windows, now);
        }
        windows.entry(key.to_string()).or_default().clone()
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let mut last = self.last_sweep.lock();
        if now.saturating_duration_since(*last) >= self.window {
            *last = now;
            true
        } else {
            false
        }
    }

    fn limited(&self, key: &ThrottleKey, window: &AttemptWindow, now: Instant) -> AuthError {
        let retry_after = window.retry_after(now, self.window);
        warn!(
            key = %key,
            attempts = window.attempts.len(),
            retry_after_secs = retry_after.as_secs(),
            "login attempts rate limited"
        );
        AuthError::RateLimited { retry_after }
    }
}

impl LoginThrottle for LoginRateLimiter {
    fn check(&self, key: &ThrottleKey) -> Result<(), AuthError> {
        let Some(window) = self.existing(&key.to_string()) else {
            return Ok(());
        };
        let mut window = window.lock();
        let now = self.clock.now();
        window.prune(now, self.window);
        if window.attempts.len() >= self.max_attempts {
            return Err(self.limited(key, &window, now));
        }
        Ok(())
    }

    fn register_failure(&self, key: &ThrottleKey) -> Result<(), AuthError> {
        let window = self.window_for(&key.to_string());
        let mut window = window.lock();
        let now = self.clock.now();
        window.prune(now, self.window);
        if window.attempts.len() >= self.max_attempts {
            return Err(self.limited(key, &window, now));
        }
        window.attempts.push_back(now);
        debug!(key = %key, attempts = window.attempts.len(), "recorded failed login");
        Ok(())
    }
}

impl<T: LoginThrottle + ?Sized> LoginThrottle for Arc<T> {
    fn check(&self, key: &ThrottleKey) -> Result<(), AuthError> {
        (**self).check(key)
    }

    fn register_failure(&self, key: &ThrottleKey) -> Result<(), AuthError> {
        (**self).register_failure(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(clock: Arc<ManualClock>) -> LoginRateLimiter {
        LoginRateLimiter::new(&RateLimitConfig::default(), clock)
    }

    fn user(name: &str) -> ThrottleKey {
        ThrottleKey::Username(name.to_string())
    }

    fn is_limited(result: Result<(), AuthError>) -> bool {
        matches!(result, Err(AuthError::RateLimited { .. }))
    }

    #[test]
    fn keys_render_with_kind_prefix() {
        assert_eq!(user("alice").to_string(), "user:alice");
        let addr: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(ThrottleKey::Origin(addr).to_string(), "addr:10.0.0.7");
    }

    #[test]
    fn sixth_check_after_five_failures_is_limited() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        for _ in 0..5 {
            limiter.check(&user("u1")).unwrap();
            limiter.register_failure(&user("u1")).unwrap();
            clock.advance(Duration::from_secs(1));
        }
        assert!(is_limited(limiter.check(&user("u1"))));
        assert!(is_limited(limiter.register_failure(&user("u1"))));
        assert_eq!(limiter.attempts(&user("u1")), 5);
    }

    #[test]
    fn window_reopens_once_first_failure_ages_out() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        limiter.register_failure(&user("u1")).unwrap();
        clock.advance(Duration::from_secs(10));
        for _ in 0..4 {
            limiter.register_failure(&user("u1")).unwrap();
        }
        assert!(is_limited(limiter.check(&user("u1"))));

        // 59s after the first failure: still blocked.
        clock.advance(Duration::from_secs(49));
        assert!(is_limited(limiter.check(&user("u1"))));

        // 60s after the first failure it drops out of the window.
        clock.advance(Duration::from_secs(1));
        limiter.check(&user("u1")).unwrap();
        assert_eq!(limiter.attempts(&user("u1")), 4);
    }

    #[test]
    fn retry_after_counts_down_to_oldest_expiry() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        for _ in 0..5 {
            limiter.register_failure(&user("u1")).unwrap();
        }
        clock.advance(Duration::from_secs(20));
        match limiter.check(&user("u1")) {
            Err(AuthError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(40))
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn keys_are_isolated() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock);
        for _ in 0..5 {
            limiter.register_failure(&user("u2")).unwrap();
        }
        assert!(is_limited(limiter.check(&user("u2"))));
        limiter.check(&user("u1")).unwrap();
        assert_eq!(limiter.attempts(&user("u1")), 0);
    }

    #[test]
    fn check_does_not_record_or_allocate() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock);
        for _ in 0..20 {
            limiter.check(&user("u1")).unwrap();
        }
        assert_eq!(limiter.attempts(&user("u1")), 0);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn username_and_origin_windows_are_separate() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock);
        let origin = ThrottleKey::Origin("192.0.2.1".parse().unwrap());
        for _ in 0..5 {
            limiter.register_failure(&origin).unwrap();
        }
        assert!(is_limited(limiter.check(&origin)));
        limiter.check(&user("192.0.2.1")).unwrap();
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        limiter.register_failure(&user("old")).unwrap();
        clock.advance(Duration::from_secs(30));
        limiter.register_failure(&user("recent")).unwrap();
        clock.advance(Duration::from_secs(30));

        assert_eq!(limiter.purge_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.attempts(&user("recent")), 1);
    }

    #[test]
    fn new_keys_sweep_idle_windows_without_explicit_purge() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        for i in 0..1000 {
            limiter.register_failure(&user(&format!("spray{i}"))).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), 1000);

        clock.advance(Duration::from_secs(3600));
        for i in 0..1000 {
            limiter.check(&user(&format!("spray{i}"))).unwrap();
        }
        limiter.register_failure(&user("late")).unwrap();

        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.attempts(&user("late")), 1);
    }

    #[test]
    fn sweep_keeps_windows_with_live_attempts() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        limiter.register_failure(&user("old")).unwrap();
        clock.advance(Duration::from_secs(30));
        limiter.register_failure(&user("recent")).unwrap();
        clock.advance(Duration::from_secs(30));

        limiter.register_failure(&user("new")).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.attempts(&user("recent")), 1);
        assert_eq!(limiter.attempts(&user("old")), 0);
    }

    #[test]
    fn concurrent_failures_are_never_lost() {
        let clock = Arc::new(ManualClock::new());
        let limiter = LoginRateLimiter::new(
            &RateLimitConfig {
                max_attempts: 10_000,
                window_secs: 60,
            },
            clock,
        );
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..250 {
                        limiter.register_failure(&user("shared")).unwrap();
                    }
                });
            }
        });
        assert_eq!(limiter.attempts(&user("shared")), 2_000);
    }

    #[test]
    fn concurrent_failures_cannot_overshoot_the_limit() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock);
        let accepted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    if limiter.register_failure(&user("racer")).is_ok() {
                        accepted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(accepted.into_inner(), 5);
        assert_eq!(limiter.attempts(&user("racer")), 5);
    }
}
