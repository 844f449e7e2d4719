//! Conversion of cumulative counters into per-second rates.
//!
//! A tracker keeps the previous snapshot for every key it has seen and
//! replaces that state wholesale on each update. It is a plain value:
//! whoever owns it threads it through their collection calls.

use std::collections::HashMap;

use serde::Serialize;

use super::{DiskIoCounters, NetworkMetrics};

/// Default ceiling for default-interface byte rates (400 Mbit/s)
pub const DEFAULT_MAX_RATE: f64 = 50_000_000.0;

/// Guard applied to every derived rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimit {
    /// Negative rates become zero
    NonNegative,
    /// Rates outside `[0, max]` become zero; they are counter resets or
    /// glitches, not traffic
    Ceiling(f64),
}

impl RateLimit {
    pub fn apply(self, rate: f64) -> f64 {
        match self {
            Self::NonNegative if rate < 0.0 => 0.0,
            Self::NonNegative => rate,
            Self::Ceiling(max) if (0.0..=max).contains(&rate) => rate,
            Self::Ceiling(_) => 0.0,
        }
    }
}

/// A set of cumulative counters that can be differentiated
pub trait Counters: Clone {
    type Rates: Default + Clone;

    /// Rates between `previous` and `self` over `elapsed` seconds (> 0)
    fn rates(&self, previous: &Self, elapsed: f64, limit: RateLimit) -> Self::Rates;
}

fn per_second(current: u64, previous: u64, elapsed: f64) -> f64 {
    (current as f64 - previous as f64) / elapsed
}

/// Per-interface rates in bytes and packets per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetworkRates {
    pub sent_bytes: f64,
    pub recv_bytes: f64,
    pub sent_packets: f64,
    pub recv_packets: f64,
}

impl Counters for NetworkMetrics {
    type Rates = NetworkRates;

    /// The limit covers byte rates; packet rates only get the sign guard.
    fn rates(&self, previous: &Self, elapsed: f64, limit: RateLimit) -> NetworkRates {
        let sign = RateLimit::NonNegative;
        NetworkRates {
            sent_bytes: limit.apply(per_second(self.tx_bytes, previous.tx_bytes, elapsed)),
            recv_bytes: limit.apply(per_second(self.rx_bytes, previous.rx_bytes, elapsed)),
            sent_packets: sign.apply(per_second(self.tx_packets, previous.tx_packets, elapsed)),
            recv_packets: sign.apply(per_second(self.rx_packets, previous.rx_packets, elapsed)),
        }
    }
}

/// Disk throughput and operations per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiskRates {
    pub read_bytes: f64,
    pub write_bytes: f64,
    pub read_ops: f64,
    pub write_ops: f64,
}

impl Counters for DiskIoCounters {
    type Rates = DiskRates;

    fn rates(&self, previous: &Self, elapsed: f64, limit: RateLimit) -> DiskRates {
        DiskRates {
            read_bytes: limit.apply(per_second(self.read_bytes, previous.read_bytes, elapsed)),
            write_bytes: limit.apply(per_second(self.write_bytes, previous.write_bytes, elapsed)),
            read_ops: limit.apply(per_second(self.read_count, previous.read_count, elapsed)),
            write_ops: limit.apply(per_second(self.write_count, previous.write_count, elapsed)),
        }
    }
}

#[derive(Debug, Clone)]
struct Baseline<C> {
    counters: C,
    timestamp: f64,
}

/// Previous-snapshot state for one family of counters
#[derive(Debug, Clone)]
pub struct RateTracker<C: Counters> {
    limit: RateLimit,
    state: HashMap<String, Baseline<C>>,
}

pub type NetworkRateTracker = RateTracker<NetworkMetrics>;
pub type DiskRateTracker = RateTracker<DiskIoCounters>;

impl<C: Counters> RateTracker<C> {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            state: HashMap::new(),
        }
    }

    /// Tracker with only the sign and zero-elapsed guards
    pub fn unbounded() -> Self {
        Self::new(RateLimit::NonNegative)
    }

    /// Tracker whose rates collapse to zero outside `[0, max]`
    pub fn with_ceiling(max: f64) -> Self {
        Self::new(RateLimit::Ceiling(max))
    }

    /// Compute rates for every key in `counters` and make them the new
    /// baseline.
    ///
    /// Keys seen for the first time, and any update where no time has
    /// passed since the baseline, yield zero rates. Keys absent from
    /// `counters` are forgotten.
    pub fn update(&mut self, now: f64, counters: HashMap<String, C>) -> HashMap<String, C::Rates> {
        let rates = counters
            .iter()
            .map(|(key, current)| {
                let rate = match self.state.get(key) {
                    Some(prev) if now - prev.timestamp > 0.0 => {
                        current.rates(&prev.counters, now - prev.timestamp, self.limit)
                    }
                    _ => C::Rates::default(),
                };
                (key.clone(), rate)
            })
            .collect();

        self.state = counters
            .into_iter()
            .map(|(key, counters)| (key, Baseline { counters, timestamp: now }))
            .collect();

        rates
    }

    /// Single-key form of [`update`](Self::update)
    pub fn update_one(&mut self, now: f64, key: &str, counters: C) -> C::Rates {
        self.update(now, HashMap::from([(key.to_string(), counters)]))
            .remove(key)
            .unwrap_or_default()
    }

    pub fn is_tracking(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(bytes: u64) -> NetworkMetrics {
        NetworkMetrics::new(0, bytes, 0, 0)
    }

    #[test]
    fn first_update_is_a_zero_baseline() {
        let mut tracker = NetworkRateTracker::with_ceiling(DEFAULT_MAX_RATE);
        let rates = tracker.update_one(0.0, "eth0", NetworkMetrics::new(10, 20, 30, 40));
        assert_eq!(rates, NetworkRates::default());
        assert!(tracker.is_tracking("eth0"));
    }

    #[test]
    fn rate_is_delta_over_elapsed() {
        let mut tracker = NetworkRateTracker::with_ceiling(DEFAULT_MAX_RATE);
        tracker.update_one(0.0, "eth0", sent(1000));
        let rates = tracker.update_one(5.0, "eth0", sent(1500));
        assert_eq!(rates.sent_bytes, 100.0);
        assert_eq!(rates.recv_bytes, 0.0);
    }

    #[test]
    fn packet_rates_follow_the_same_formula() {
        let mut tracker = NetworkRateTracker::unbounded();
        tracker.update_one(10.0, "eth0", NetworkMetrics::new(0, 0, 100, 50));
        let rates = tracker.update_one(12.0, "eth0", NetworkMetrics::new(0, 0, 300, 58));
        assert_eq!(rates.recv_packets, 100.0);
        assert_eq!(rates.sent_packets, 4.0);
    }

    #[test]
    fn ceiling_collapses_spikes_and_resets_to_zero() {
        let mut tracker = NetworkRateTracker::with_ceiling(1000.0);
        tracker.update_one(0.0, "eth0", sent(0));
        assert_eq!(tracker.update_one(1.0, "eth0", sent(1001)).sent_bytes, 0.0);
        assert_eq!(tracker.update_one(2.0, "eth0", sent(2001)).sent_bytes, 1000.0);
        // counter reset
        assert_eq!(tracker.update_one(3.0, "eth0", sent(5)).sent_bytes, 0.0);
        assert_eq!(tracker.update_one(4.0, "eth0", sent(505)).sent_bytes, 500.0);
    }

    #[test]
    fn unbounded_tracker_only_guards_sign() {
        let mut tracker = NetworkRateTracker::unbounded();
        tracker.update_one(0.0, "eth0", sent(0));
        let huge = tracker.update_one(1.0, "eth0", sent(10_000_000_000));
        assert_eq!(huge.sent_bytes, 10_000_000_000.0);
        let reset = tracker.update_one(2.0, "eth0", sent(10));
        assert_eq!(reset.sent_bytes, 0.0);
    }

    #[test]
    fn non_positive_elapsed_yields_zero_but_advances_state() {
        let mut tracker = NetworkRateTracker::unbounded();
        tracker.update_one(10.0, "eth0", sent(100));
        assert_eq!(tracker.update_one(10.0, "eth0", sent(900)).sent_bytes, 0.0);
        assert_eq!(tracker.update_one(8.0, "eth0", sent(1000)).sent_bytes, 0.0);
        // baseline is now (8.0, 1000), not the original (10.0, 100)
        assert_eq!(tracker.update_one(10.0, "eth0", sent(1100)).sent_bytes, 50.0);
    }

    #[test]
    fn state_is_replaced_wholesale() {
        let mut tracker = NetworkRateTracker::unbounded();
        let both = HashMap::from([("eth0".to_string(), sent(0)), ("wlan0".to_string(), sent(0))]);
        tracker.update(0.0, both);

        let rates = tracker.update(1.0, HashMap::from([("eth0".to_string(), sent(10))]));
        assert_eq!(rates["eth0"].sent_bytes, 10.0);
        assert!(!tracker.is_tracking("wlan0"));

        // wlan0 comes back: treated as a fresh baseline
        let rates = tracker.update(2.0, HashMap::from([("wlan0".to_string(), sent(500))]));
        assert_eq!(rates["wlan0"].sent_bytes, 0.0);
    }

    #[test]
    fn new_keys_start_at_zero_while_known_keys_report() {
        let mut tracker = NetworkRateTracker::unbounded();
        tracker.update(0.0, HashMap::from([("eth0".to_string(), sent(0))]));
        let rates = tracker.update(
            2.0,
            HashMap::from([("eth0".to_string(), sent(40)), ("tun0".to_string(), sent(999))]),
        );
        assert_eq!(rates["eth0"].sent_bytes, 20.0);
        assert_eq!(rates["tun0"], NetworkRates::default());
    }

    #[test]
    fn disk_rates() {
        let mut tracker = DiskRateTracker::unbounded();
        tracker.update_one(0.0, "disk", DiskIoCounters::new(0, 0, 0, 0));
        let rates = tracker.update_one(4.0, "disk", DiskIoCounters::new(4096, 8192, 8, 2));
        assert_eq!(
            rates,
            DiskRates {
                read_bytes: 1024.0,
                write_bytes: 2048.0,
                read_ops: 2.0,
                write_ops: 0.5,
            }
        );
    }

    #[test]
    fn rate_limit_bounds() {
        assert_eq!(RateLimit::Ceiling(10.0).apply(10.0), 10.0);
        assert_eq!(RateLimit::Ceiling(10.0).apply(0.0), 0.0);
        assert_eq!(RateLimit::Ceiling(10.0).apply(-0.5), 0.0);
        assert_eq!(RateLimit::NonNegative.apply(-3.0), 0.0);
        assert_eq!(RateLimit::NonNegative.apply(f64::MAX), f64::MAX);
    }
}
