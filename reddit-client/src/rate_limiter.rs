use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100, // Reddit allows 100 requests per minute for OAuth2
            time_window: Duration::from_secs(60),
            burst_allowance: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Set when Reddit reports the budget for the current period is spent.
    blocked_until: Option<Instant>,
}

/// Token bucket kept in step with the `X-Ratelimit-*` headers Reddit returns.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            capacity,
            refill_rate,
        }
    }

    /// Waits until a request may be sent.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.refill(&mut state, now);

                match state.blocked_until {
                    Some(until) if until > now => Some(until - now),
                    _ => {
                        state.blocked_until = None;
                        if state.tokens >= 1.0 {
                            state.tokens -= 1.0;
                            None
                        } else {
                            let missing = 1.0 - state.tokens;
                            Some(Duration::from_secs_f64(missing / self.refill_rate))
                        }
                    }
                }
            };

            match wait {
                None => return,
                Some(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }
    }

    /// Applies `X-Ratelimit-Remaining` / `X-Ratelimit-Reset` from a response.
    pub async fn update_from_headers(&self, remaining: Option<f64>, reset_secs: Option<u64>) {
        let (Some(remaining), Some(reset_secs)) = (remaining, reset_secs) else {
            return;
        };

        let mut state = self.state.lock().await;
        if remaining < 1.0 {
            tracing::warn!(
                "Reddit request budget exhausted, pausing for {} seconds",
                reset_secs
            );
            state.tokens = 0.0;
            state.blocked_until = Some(Instant::now() + Duration::from_secs(reset_secs));
        } else if remaining < state.tokens {
            state.tokens = remaining;
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        self.refill(&mut state, now);

        RateLimitStatus {
            available_tokens: state.tokens as u32,
            max_tokens: self.capacity as u32,
            blocked_for: state
                .blocked_until
                .filter(|until| *until > now)
                .map(|until| until - now),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub blocked_for: Option<Duration>,
}
