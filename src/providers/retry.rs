use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_ATTEMPTS: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff for rate-limited requests. Only rate limits are
/// retried; every other failure goes straight back to the caller.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    provider: &'static str,
    attempt: usize,
    delay: Duration,
    base: Duration,
}

impl Backoff {
    pub(crate) fn with_base_delay(provider: &'static str, base: Duration) -> Self {
        Self {
            provider,
            attempt: 1,
            delay: base,
            base,
        }
    }

    /// Sleeps before the next attempt. Returns false once the attempts are
    /// used up, without sleeping.
    pub(crate) async fn wait(&mut self, retry_after: Option<Duration>) -> bool {
        if self.attempt >= RATE_LIMIT_MAX_ATTEMPTS {
            return false;
        }
        let wait = match retry_after {
            Some(retry_after) if retry_after > self.delay => retry_after.min(RATE_LIMIT_MAX_DELAY),
            _ => self.delay,
        };
        warn!(
            "{} rate limited; retrying in {:.1}s (attempt {}/{})",
            self.provider,
            wait.as_secs_f32(),
            self.attempt + 1,
            RATE_LIMIT_MAX_ATTEMPTS
        );
        sleep(wait).await;
        self.attempt += 1;
        self.delay = next_delay(self.delay, self.base);
        true
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || matches!(status.as_u16(), 503 | 529) {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

fn next_delay(current: Duration, base: Duration) -> Duration {
    current.saturating_mul(2).max(base).min(RATE_LIMIT_MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let mut delay = RATE_LIMIT_BASE_DELAY;
        let mut seen = Vec::new();
        for _ in 0..7 {
            delay = next_delay(delay, RATE_LIMIT_BASE_DELAY);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, [4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn detects_rate_limits() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"rate_limit_exceeded"}}"#
        ));
        assert!(!is_rate_limited(StatusCode::UNAUTHORIZED, "invalid api key"));
    }

    #[test]
    fn reads_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static(" 3 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));
        headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut backoff = Backoff::with_base_delay("Test", Duration::from_millis(1));
        let mut retries = 0;
        while backoff.wait(None).await {
            retries += 1;
        }
        assert_eq!(retries, RATE_LIMIT_MAX_ATTEMPTS - 1);
    }
}
