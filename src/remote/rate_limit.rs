//! Shared token-bucket rate limiter for outgoing remote calls (spec §4.5:
//! "Rate-limiting honored across concurrent tasks via a shared token
//! bucket"), grounded on the per-IP `RateLimiter` pattern used for inbound
//! request throttling elsewhere in the corpus — same refill arithmetic,
//! applied here to a single shared bucket rather than one per key.

use std::time::Instant;
use tokio::sync::Mutex;

pub struct RateLimiter {
    state: Mutex<BucketState>,
    rps: f64,
    burst: f64,
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

impl RateLimiter {
    pub fn new(rps: f64, burst: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_update: Instant::now(),
            }),
            rps,
            burst,
        }
    }

    /// Block until a token is available, then consume it. Never denies —
    /// the engine has no "reject the request" path for its own outbound
    /// calls, only "wait".
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_update).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rps).min(self.burst);
                state.last_update = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(std::time::Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.rps,
                    ))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
