use std::time::Duration;

/// Delay applied before retrying a failed page fetch.
///
/// Doubles per attempt from the configured base, capped at 10 seconds so an
/// exhausted retry chain cannot stall the run for long.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(6);
    Duration::from_millis(base_ms.saturating_mul(factor).min(10_000))
}
