use chrono::Duration;

const DEFAULT_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_MIN_RESEND_INTERVAL_SECONDS: i64 = 30;
const DEFAULT_MAX_RESENDS_PER_WINDOW: u32 = 5;
const DEFAULT_RESEND_WINDOW_SECONDS: i64 = 60 * 60;
const DEFAULT_DELIVERY_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_STORE_RETRY_BASE_MILLIS: u64 = 20;
const DEFAULT_STORE_RETRY_MAX_MILLIS: u64 = 500;

const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 10;
const MAX_TTL_SECONDS: i64 = 24 * 60 * 60;
const MAX_MIN_RESEND_INTERVAL_SECONDS: i64 = 24 * 60 * 60;
const MAX_RESEND_WINDOW_SECONDS: i64 = 30 * 24 * 60 * 60;
const MAX_DELIVERY_TIMEOUT_SECONDS: u64 = 5 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtpConfig {
    ttl_seconds: i64,
    code_length: usize,
    max_attempts: u32,
    min_resend_interval_seconds: i64,
    max_resends_per_window: u32,
    resend_window_seconds: i64,
    delivery_timeout: std::time::Duration,
    store_retry_attempts: u32,
    store_retry_base: std::time::Duration,
    store_retry_max: std::time::Duration,
}

impl OtpConfig {
    /// Defaults: 6-digit codes valid for 5 minutes, 5 attempts, 30s between
    /// issuances, at most 5 issuances per hour, 10s delivery timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            code_length: DEFAULT_CODE_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_resend_interval_seconds: DEFAULT_MIN_RESEND_INTERVAL_SECONDS,
            max_resends_per_window: DEFAULT_MAX_RESENDS_PER_WINDOW,
            resend_window_seconds: DEFAULT_RESEND_WINDOW_SECONDS,
            delivery_timeout: std::time::Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECONDS),
            store_retry_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
            store_retry_base: std::time::Duration::from_millis(DEFAULT_STORE_RETRY_BASE_MILLIS),
            store_retry_max: std::time::Duration::from_millis(DEFAULT_STORE_RETRY_MAX_MILLIS),
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_min_resend_interval_seconds(mut self, seconds: i64) -> Self {
        self.min_resend_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_resends_per_window(mut self, count: u32) -> Self {
        self.max_resends_per_window = count;
        self
    }

    #[must_use]
    pub fn with_resend_window_seconds(mut self, seconds: i64) -> Self {
        self.resend_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_delivery_timeout_seconds(mut self, seconds: u64) -> Self {
        self.delivery_timeout = std::time::Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_store_retry_attempts(mut self, attempts: u32) -> Self {
        self.store_retry_attempts = attempts;
        self
    }

    /// Clamp values into ranges the protocol can honor.
    #[must_use]
    pub fn normalize(self) -> Self {
        let ttl_seconds = self.ttl_seconds.clamp(1, MAX_TTL_SECONDS);
        let code_length = self.code_length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH);
        let max_attempts = self.max_attempts.max(1);
        let min_resend_interval_seconds = self
            .min_resend_interval_seconds
            .clamp(0, MAX_MIN_RESEND_INTERVAL_SECONDS);
        let max_resends_per_window = self.max_resends_per_window.max(1);
        let resend_window_seconds = self.resend_window_seconds.clamp(1, MAX_RESEND_WINDOW_SECONDS);
        let delivery_timeout = self.delivery_timeout.clamp(
            std::time::Duration::from_secs(1),
            std::time::Duration::from_secs(MAX_DELIVERY_TIMEOUT_SECONDS),
        );
        let store_retry_attempts = self.store_retry_attempts.max(1);
        let store_retry_max = self.store_retry_max.max(self.store_retry_base);
        Self {
            ttl_seconds,
            code_length,
            max_attempts,
            min_resend_interval_seconds,
            max_resends_per_window,
            resend_window_seconds,
            delivery_timeout,
            store_retry_attempts,
            store_retry_base: self.store_retry_base,
            store_retry_max,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_seconds)
    }

    #[must_use]
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn min_resend_interval(&self) -> Duration {
        Duration::seconds(self.min_resend_interval_seconds)
    }

    #[must_use]
    pub fn max_resends_per_window(&self) -> u32 {
        self.max_resends_per_window
    }

    #[must_use]
    pub fn resend_window(&self) -> Duration {
        Duration::seconds(self.resend_window_seconds)
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> std::time::Duration {
        self.delivery_timeout
    }

    #[must_use]
    pub fn store_retry_attempts(&self) -> u32 {
        self.store_retry_attempts
    }

    #[must_use]
    pub fn store_retry_base(&self) -> std::time::Duration {
        self.store_retry_base
    }

    #[must_use]
    pub fn store_retry_max(&self) -> std::time::Duration {
        self.store_retry_max
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}
