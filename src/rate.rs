//! Adaptive request pacing.
//!
//! The [`RateController`] keeps one delay per site and adjusts it from the
//! status codes it observes: a 429 backs off sharply while few successful
//! delays are known, a 200 probes toward a smaller delay. Every outbound
//! request goes through [`RateController::wait_then_request`].

use crate::error::TransportError;
use crate::transport::{FetchedPage, Transport};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Lower bound for the pacing delay, in seconds.
pub const MIN_DELAY: f64 = 0.0;

/// Longest pause between two requests, in seconds.
pub const MAX_DELAY: f64 = 3600.0;

/// At or below this delay a success no longer shrinks the delay.
const SUCCESS_FLOOR: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct RateController {
    delay: f64,
    /// Delays that previously produced a non-throttled response. Never empty.
    history: Vec<f64>,
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RateController {
    /// Start pacing at `initial_delay` seconds with history seeded by `1`.
    pub fn new(initial_delay: f64) -> Self {
        let delay = if initial_delay.is_finite() {
            initial_delay.max(MIN_DELAY)
        } else {
            1.0
        };
        Self {
            delay,
            history: vec![1.0],
        }
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Feed an observed status code back and return the new delay.
    pub fn observe(&mut self, status: u16) -> f64 {
        let samples = self.history.len() as f64;

        match status {
            429 => {
                let backoff = self.mean().max(self.delay) + 0.1 / (samples * 0.1);
                warn!(old = self.delay, new = backoff, "Backing off after 429");
                self.delay = backoff;
            }
            200 if self.delay <= SUCCESS_FLOOR => {}
            200 => {
                self.history.push(self.delay);
                let samples = self.history.len() as f64;
                let probed = round3(self.mean() - 0.2 / (samples * 0.2));
                self.delay = probed.max(MIN_DELAY);
                debug!(delay = self.delay, samples = self.history.len(), "Probing smaller delay");
            }
            _ => {}
        }

        self.delay
    }

    /// Sleep for the current delay, issue the request, and feed its status
    /// back into the controller.
    ///
    /// # Errors
    ///
    /// Propagates client-level [`TransportError`]s; HTTP error statuses are
    /// returned as pages.
    #[instrument(level = "debug", skip(self, transport), fields(delay = self.delay))]
    pub async fn wait_then_request<T: Transport>(
        &mut self,
        url: &str,
        transport: &T,
    ) -> Result<FetchedPage, TransportError> {
        let max = Duration::from_secs_f64(MAX_DELAY);
        let pause = match Duration::try_from_secs_f64(self.delay) {
            Ok(pause) if pause <= max => pause,
            Ok(_) => {
                warn!(delay = self.delay, "Delay above maximum; capping");
                max
            }
            Err(e) => {
                warn!(delay = self.delay, error = %e, "Unusable delay; pausing for the maximum");
                max
            }
        };
        sleep(pause).await;
        let page = transport.fetch(url).await?;
        self.observe(page.status);
        Ok(page)
    }

    fn mean(&self) -> f64 {
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_cold_start_backoff() {
        let mut rate = RateController::new(1.0);
        // mean([1]) + 0.1 / (1 * 0.1)
        assert!((rate.observe(429) - 2.0).abs() < 1e-9);
        assert_eq!(rate.history(), &[1.0]);
    }

    #[test]
    fn test_backoff_is_gentler_with_more_history() {
        let mut rate = RateController::new(0.5);
        rate.history = vec![0.5, 0.5, 0.5, 0.5];
        // mean 0.5 + 1/4
        assert!((rate.observe(429) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_429_always_increases_delay() {
        let mut rate = RateController::new(1.0);
        let mut previous = rate.delay();
        for _ in 0..5 {
            let next = rate.observe(429);
            assert!(next > previous, "{next} should exceed {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_success_probes_downward() {
        let mut rate = RateController::new(1.0);
        // history [1, 1] -> mean 1 - 0.2 / (2 * 0.2)
        assert_eq!(rate.observe(200), 0.5);
        assert_eq!(rate.history(), &[1.0, 1.0]);
    }

    #[test]
    fn test_success_settles_after_first_probe() {
        // Pushing the delay before averaging makes (S - 1) / n a fixed point.
        let mut rate = RateController::new(1.0);
        assert_eq!(rate.observe(200), 0.5);
        for _ in 0..5 {
            assert_eq!(rate.observe(200), 0.5);
        }
        assert_eq!(rate.history().len(), 7);
    }

    #[test]
    fn test_backoff_then_success_settles_lower() {
        let mut rate = RateController::new(1.0);
        assert!((rate.observe(429) - 2.0).abs() < 1e-9);
        // history [1, 2] -> mean 1.5 - 0.5
        assert_eq!(rate.observe(200), 1.0);
        assert_eq!(rate.observe(200), 1.0);
    }

    #[test]
    fn test_repeated_success_never_increases_or_goes_negative() {
        let mut rate = RateController::new(3.0);
        let mut previous = rate.delay();
        for _ in 0..200 {
            let next = rate.observe(200);
            assert!(next <= previous);
            assert!(next >= MIN_DELAY);
            previous = next;
        }
    }

    #[test]
    fn test_success_formula_is_clamped_at_floor() {
        let mut rate = RateController::new(0.2);
        rate.history = vec![0.2; 3];
        // mean 0.2 - 1/4 would be negative
        assert_eq!(rate.observe(200), MIN_DELAY);
    }

    #[test]
    fn test_success_near_floor_is_ignored() {
        let mut rate = RateController::new(0.1);
        assert_eq!(rate.observe(200), 0.1);
        assert_eq!(rate.history(), &[1.0]);
    }

    #[test]
    fn test_other_status_leaves_delay() {
        let mut rate = RateController::new(0.7);
        assert_eq!(rate.observe(404), 0.7);
        assert_eq!(rate.observe(500), 0.7);
        assert_eq!(rate.history(), &[1.0]);
    }

    #[test]
    fn test_negative_initial_delay_is_clamped() {
        assert_eq!(RateController::new(-3.0).delay(), MIN_DELAY);
    }

    struct Recorder {
        status: u16,
        calls: RefCell<Vec<String>>,
    }

    impl Transport for Recorder {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError> {
            self.calls.borrow_mut().push(url.to_string());
            Ok(FetchedPage::new(url, self.status, "ok"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_then_request_sleeps_then_observes() {
        let transport = Recorder {
            status: 429,
            calls: RefCell::new(Vec::new()),
        };
        let mut rate = RateController::new(1.0);
        let started = tokio::time::Instant::now();
        let page = rate
            .wait_then_request("https://example.com/blogi", &transport)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(page.status, 429);
        assert_eq!(transport.calls.borrow().as_slice(), ["https://example.com/blogi"]);
        assert!((rate.delay() - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_is_capped() {
        let transport = Recorder {
            status: 200,
            calls: RefCell::new(Vec::new()),
        };
        let mut rate = RateController::new(1e20);
        let started = tokio::time::Instant::now();
        let page = rate
            .wait_then_request("https://example.com/blogi", &transport)
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs_f64(MAX_DELAY));
        assert!(elapsed < Duration::from_secs_f64(MAX_DELAY + 1.0));
    }
}
