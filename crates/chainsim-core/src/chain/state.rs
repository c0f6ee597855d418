//! Mutable per-chain state shared by the clock, request handlers and the
//! control surface.
//!
//! Scalar knobs are atomics. The height triple (latest, safe, finalized) is
//! kept behind one lock so readers never observe a height whose safe and
//! finalized values belong to another tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::fault::{CustomResponse, ErrorConfig};

/// Blocks behind latest considered safe.
pub const SAFE_OFFSET: u64 = 32;
/// Blocks behind latest considered finalized.
pub const FINALIZED_OFFSET: u64 = 64;

/// Latest, safe and finalized heights of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heights {
    pub latest: u64,
    pub safe: u64,
    pub finalized: u64,
}

impl Heights {
    /// Heights derived from `latest` with the fixed safe/finalized lag.
    pub fn at(latest: u64) -> Self {
        Self {
            latest,
            safe: latest.saturating_sub(SAFE_OFFSET),
            finalized: latest.saturating_sub(FINALIZED_OFFSET),
        }
    }
}

/// State common to every chain family.
#[derive(Debug)]
pub struct ChainState {
    heights: RwLock<Heights>,
    paused: AtomicBool,
    interrupted: AtomicBool,
    interval_ms: AtomicU64,
    latency_ms: AtomicU64,
    response_timeout_ms: AtomicU64,
    /// `f64` bits of the legacy error probability.
    error_probability: AtomicU64,
    error_configs: RwLock<Vec<ErrorConfig>>,
    custom_response: RwLock<Option<CustomResponse>>,
}

impl ChainState {
    pub fn new(initial_height: u64, interval: Duration) -> Self {
        Self {
            heights: RwLock::new(Heights::at(initial_height)),
            paused: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            interval_ms: AtomicU64::new(interval.as_millis() as u64),
            latency_ms: AtomicU64::new(0),
            response_timeout_ms: AtomicU64::new(0),
            error_probability: AtomicU64::new(0f64.to_bits()),
            error_configs: RwLock::new(Vec::new()),
            custom_response: RwLock::new(None),
        }
    }

    // ── Heights ─────────────────────────────────────────────────────────────

    pub fn heights(&self) -> Heights {
        *self.heights.read().unwrap()
    }

    pub fn height(&self) -> u64 {
        self.heights().latest
    }

    /// One clock tick. Returns the new height, or `None` when interrupted,
    /// paused or already at `u64::MAX`. Interruption is checked first and
    /// always wins.
    pub fn advance(&self) -> Option<u64> {
        if self.is_interrupted() || self.is_paused() {
            return None;
        }
        let mut heights = self.heights.write().unwrap();
        let next = heights.latest.checked_add(1)?;
        *heights = Heights::at(next);
        Some(next)
    }

    /// Overwrite the height, recomputing safe/finalized.
    pub fn set_height(&self, height: u64) -> u64 {
        *self.heights.write().unwrap() = Heights::at(height);
        height
    }

    /// Roll the height back by `depth`. Safe and finalized follow the same
    /// lag formula as a normal tick. `None` (and no change) when the chain
    /// is shorter than `depth`.
    pub fn reorg(&self, depth: u64) -> Option<u64> {
        let mut heights = self.heights.write().unwrap();
        if heights.latest < depth {
            return None;
        }
        *heights = Heights::at(heights.latest - depth);
        Some(heights.latest)
    }

    // ── Flags ───────────────────────────────────────────────────────────────

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    pub fn set_interrupted(&self, interrupted: bool) {
        self.interrupted.store(interrupted, Ordering::Release);
    }

    // ── Timing ──────────────────────────────────────────────────────────────

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.load(Ordering::Relaxed))
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// The configured response timeout, `None` when cleared.
    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn set_response_timeout(&self, timeout: Option<Duration>) {
        let ms = timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
        self.response_timeout_ms.store(ms, Ordering::Relaxed);
    }

    // ── Fault configuration ─────────────────────────────────────────────────

    pub fn error_probability(&self) -> f64 {
        f64::from_bits(self.error_probability.load(Ordering::Relaxed))
    }

    pub fn set_error_probability(&self, probability: f64) {
        self.error_probability
            .store(probability.to_bits(), Ordering::Relaxed);
    }

    pub fn error_configs(&self) -> Vec<ErrorConfig> {
        self.error_configs.read().unwrap().clone()
    }

    pub fn push_error_config(&self, config: ErrorConfig) -> usize {
        let mut configs = self.error_configs.write().unwrap();
        configs.push(config);
        configs.len()
    }

    /// Remove the entry at `index`; `Err(len)` when out of range.
    pub fn remove_error_config(&self, index: usize) -> Result<ErrorConfig, usize> {
        let mut configs = self.error_configs.write().unwrap();
        if index >= configs.len() {
            return Err(configs.len());
        }
        Ok(configs.remove(index))
    }

    pub fn replace_error_configs(&self, configs: Vec<ErrorConfig>) {
        *self.error_configs.write().unwrap() = configs;
    }

    pub fn clear_error_configs(&self) -> usize {
        let mut configs = self.error_configs.write().unwrap();
        let removed = configs.len();
        configs.clear();
        removed
    }

    pub fn custom_response(&self) -> Option<CustomResponse> {
        self.custom_response.read().unwrap().clone()
    }

    pub fn set_custom_response(&self, response: Option<CustomResponse>) {
        *self.custom_response.write().unwrap() = response;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(height: u64) -> ChainState {
        ChainState::new(height, Duration::from_secs(1))
    }

    #[test]
    fn heights_follow_fixed_lag() {
        assert_eq!(Heights::at(10), Heights { latest: 10, safe: 0, finalized: 0 });
        assert_eq!(Heights::at(40), Heights { latest: 40, safe: 8, finalized: 0 });
        assert_eq!(Heights::at(100), Heights { latest: 100, safe: 68, finalized: 36 });
    }

    #[test]
    fn advance_increments_and_recomputes() {
        let s = state(1);
        for _ in 0..99 {
            s.advance().unwrap();
        }
        assert_eq!(s.heights(), Heights::at(100));
    }

    #[test]
    fn paused_and_interrupted_skip_ticks() {
        let s = state(5);
        s.set_paused(true);
        assert_eq!(s.advance(), None);
        s.set_paused(false);
        s.set_interrupted(true);
        assert_eq!(s.advance(), None);
        // interruption wins even after resume
        s.set_paused(false);
        assert_eq!(s.advance(), None);
        s.set_interrupted(false);
        assert_eq!(s.advance(), Some(6));
    }

    #[test]
    fn advance_stops_at_max_height() {
        let s = state(1);
        s.set_height(u64::MAX);
        assert_eq!(s.advance(), None);
        assert_eq!(s.heights(), Heights::at(u64::MAX));
        assert_eq!(s.reorg(1), Some(u64::MAX - 1));
        assert_eq!(s.advance(), Some(u64::MAX));
    }

    #[test]
    fn reorg_rolls_back_or_is_noop() {
        let s = state(100);
        assert_eq!(s.reorg(10), Some(90));
        assert_eq!(s.heights(), Heights::at(90));
        assert_eq!(s.reorg(150), None);
        assert_eq!(s.height(), 90);
    }

    #[test]
    fn timeout_zero_means_cleared() {
        let s = state(1);
        assert_eq!(s.response_timeout(), None);
        s.set_response_timeout(Some(Duration::from_secs(3)));
        assert_eq!(s.response_timeout(), Some(Duration::from_secs(3)));
        s.set_response_timeout(None);
        assert_eq!(s.response_timeout(), None);
    }

    #[test]
    fn error_config_list_editing() {
        let s = state(1);
        s.push_error_config(ErrorConfig::new(-1, "a", 0.1));
        s.push_error_config(ErrorConfig::new(-2, "b", 0.1));
        assert_eq!(s.remove_error_config(5), Err(2));
        assert_eq!(s.remove_error_config(0).unwrap().message, "a");
        assert_eq!(s.clear_error_configs(), 1);
        assert!(s.error_configs().is_empty());
    }

    #[test]
    fn legacy_probability_round_trips_through_bits() {
        let s = state(1);
        s.set_error_probability(0.25);
        assert_eq!(s.error_probability(), 0.25);
    }
}
