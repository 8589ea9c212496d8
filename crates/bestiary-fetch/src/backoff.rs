//! Delays between download attempts.

use std::cmp;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::FetchError;

/// Exponential backoff with proportional jitter, capped.
///
/// The delay before retry `k` (counting from zero) is `base * 2^k` plus a random
/// share of it below `ratio`, never more than `max`. With `ratio <= 1` the lowest
/// possible delay of a retry is the highest one of the retry before, so delays never
/// decrease.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, ratio: f64) -> Self {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        Self { base, max, ratio }
    }

    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exp = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor));
        let exp = match exp {
            Some(exp) if exp < self.max => exp,
            _ => return self.max,
        };
        let jitter = exp.mul_f64(self.ratio * rng.gen::<f64>());
        cmp::min(exp.saturating_add(jitter), self.max)
    }
}

/// Runs `op` until it succeeds, fails permanently or `attempts` runs were made.
///
/// Returns the last outcome along with the number of runs. No delay follows the last
/// run.
pub(crate) async fn retry<T, F, Fut, R>(
    attempts: u32,
    backoff: &Backoff,
    rng: &mut R,
    mut op: F,
) -> (Result<T, FetchError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    R: Rng + ?Sized,
{
    let attempts = cmp::max(1, attempts);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = backoff.delay(attempt - 1, rng);
                log::debug!("Attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}
