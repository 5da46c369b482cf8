// [libs/infra/jobs/src/backoff.rs]
use chrono::Duration;
use rand::Rng;

const BASE_SECONDS: i64 = 2;
const FACTOR: i64 = 2;
const MAX_SECONDS: i64 = 3600;

/// Exponential backoff (base 2s, factor 2) with jitter, capped at one hour.
/// `attempt` is the number of attempts already made (1 after the first
/// failure), so `attempt == 1` yields roughly the base delay.
pub fn compute_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let unjittered = BASE_SECONDS.saturating_mul(FACTOR.saturating_pow(exponent)).min(MAX_SECONDS);
    let jitter = rand::thread_rng().gen_range(0..=unjittered / 4 + 1);
    Duration::seconds(unjittered + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_near_base_delay() {
        let delay = compute_backoff(1);
        assert!(delay.num_seconds() >= BASE_SECONDS && delay.num_seconds() <= BASE_SECONDS + 1);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let third = compute_backoff(3).num_seconds();
        let fourth = compute_backoff(4).num_seconds();
        // third is ~8s+jitter, fourth is ~16s+jitter; even with jitter the
        // floors are far enough apart that fourth must exceed third's base.
        assert!(fourth >= 16);
        assert!(third >= 8 && third < 16);
    }

    #[test]
    fn backoff_is_capped() {
        let delay = compute_backoff(30);
        assert!(delay.num_seconds() <= MAX_SECONDS + MAX_SECONDS / 4 + 1);
    }
}
