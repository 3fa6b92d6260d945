use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::CrmError;

/// Retry schedule for CRM calls: `max_retries` extra attempts after the first one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget with no waiting.
    pub fn immediate() -> Self {
        Self { base_delay: Duration::ZERO, rate_limit_delay: Duration::ZERO, ..Self::default() }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, error: &CrmError, attempt: u32) -> Duration {
        if error.is_rate_limited() {
            self.rate_limit_delay
        } else {
            self.base_delay.saturating_mul(attempt)
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CrmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CrmError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts() => {
                    let delay = self.delay_for(&error, attempt);
                    warn!(
                        event_name = "heyreach.request.retry",
                        operation,
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "heyreach call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if error.is_rate_limited() => {
                    return Err(CrmError::RateLimited { attempts: attempt });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::RetryPolicy;
    use crate::CrmError;

    fn status_error(status: u16) -> CrmError {
        CrmError::Http { status, body: format!("status {status}") }
    }

    struct Script {
        responses: Mutex<VecDeque<u16>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl Script {
        fn new(statuses: &[u16]) -> Self {
            Self {
                responses: Mutex::new(statuses.iter().copied().collect()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        async fn call(&self) -> Result<&'static str, CrmError> {
            self.attempts.lock().expect("attempt log").push(Instant::now());
            let status = self.responses.lock().expect("script").pop_front().unwrap_or(200);
            if status == 200 {
                Ok("ok")
            } else {
                Err(status_error(status))
            }
        }

        fn attempt_times(&self) -> Vec<Instant> {
            self.attempts.lock().expect("attempt log").clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_a_minute_before_the_fourth_attempt() {
        let script = Script::new(&[500, 500, 429, 200]);
        let started = Instant::now();

        let result = RetryPolicy::default().run("list_conversations", || script.call()).await;

        assert_eq!(result.expect("fourth attempt succeeds"), "ok");
        let times = script.attempt_times();
        assert_eq!(times.len(), 4);
        assert_eq!(times[1] - times[0], Duration::from_secs(2));
        assert_eq!(times[2] - times[1], Duration::from_secs(4));
        assert_eq!(times[3] - times[2], Duration::from_secs(60));
        assert!(started.elapsed() >= Duration::from_secs(66));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_surface_without_retrying() {
        let script = Script::new(&[404]);

        let result = RetryPolicy::default().run("get_chatroom", || script.call()).await;

        assert!(matches!(result, Err(CrmError::Http { status: 404, .. })));
        assert_eq!(script.attempt_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let script = Script::new(&[503, 503, 503, 503, 200]);

        let result = RetryPolicy::default().run("send_message", || script.call()).await;

        assert!(matches!(result, Err(CrmError::Http { status: 503, .. })));
        assert_eq!(script.attempt_times().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_becomes_rate_limited_error() {
        let script = Script::new(&[429, 429, 429, 429]);

        let result = RetryPolicy::immediate().run("overall_stats", || script.call()).await;

        assert!(matches!(result, Err(CrmError::RateLimited { attempts: 4 })));
    }
}
