//! Range queries over the sample log.
//!
//! Short ranges return stored samples as-is; longer ones are downsampled
//! into fixed-width buckets so every range renders a similar number of
//! points.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::sample::{Extra, BYTES_PER_GB};
use crate::domain::{round_to, unix_now, ConnectionCounts, Sample};
use crate::ports::{MetricStore, StoreError};

#[derive(Debug, Error)]
#[error("Unknown range key: {0}")]
pub struct UnknownRange(String);

/// Named query window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangeKey {
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "2d")]
    TwoDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
}

/// Raw samples or fixed-width buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Raw,
    /// Bucket width in seconds
    Bucket(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    pub window_seconds: u64,
    pub resolution: Resolution,
}

impl RangeKey {
    pub const ALL: [RangeKey; 8] = [
        Self::OneHour,
        Self::TwoHours,
        Self::SixHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::TwoDays,
        Self::OneWeek,
        Self::OneMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::TwoDays => "2d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1m",
        }
    }

    pub fn policy(self) -> RangePolicy {
        let (window_seconds, resolution) = match self {
            Self::OneHour => (3_600, Resolution::Raw),
            Self::TwoHours => (7_200, Resolution::Raw),
            Self::SixHours => (21_600, Resolution::Bucket(30)),
            Self::TwelveHours => (43_200, Resolution::Bucket(60)),
            Self::OneDay => (86_400, Resolution::Bucket(120)),
            Self::TwoDays => (172_800, Resolution::Bucket(300)),
            Self::OneWeek => (604_800, Resolution::Bucket(900)),
            Self::OneMonth => (2_592_000, Resolution::Bucket(3_600)),
        };
        RangePolicy {
            window_seconds,
            resolution,
        }
    }

    /// Parse a caller-supplied key; missing or unknown keys mean `1h`
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(|key| key.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for RangeKey {
    type Err = UnknownRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownRange(s.to_string()))
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of a range response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub t: f64,
    pub cpu: f64,
    pub ram: f64,
    pub ram_used: f64,
    pub ram_total: f64,
    pub disk: f64,
    pub disk_used: f64,
    pub disk_total: f64,
    /// Bytes per second
    pub net_sent: f64,
    pub net_recv: f64,
    pub conns: ConnectionCounts,
    pub extra: Extra,
}

impl From<&Sample> for MetricPoint {
    fn from(sample: &Sample) -> Self {
        Self {
            t: sample.timestamp,
            cpu: sample.cpu_percent,
            ram: sample.ram_percent,
            ram_used: sample.ram_used_gb,
            ram_total: sample.ram_total_gb,
            disk: sample.disk_percent,
            disk_used: sample.disk_used_gb,
            disk_total: sample.disk_total_gb,
            net_sent: sample.net_sent_rate,
            net_recv: sample.net_recv_rate,
            conns: sample.connections.clone(),
            extra: sample.extra.clone(),
        }
    }
}

/// Data transferred over the range, in GB
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeTotals {
    pub sent_gb: f64,
    pub recv_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    pub range: RangeKey,
    pub data: Vec<MetricPoint>,
    pub totals: RangeTotals,
}

/// Downsample `samples` (ascending) into `bucket`-second groups.
///
/// Gauges, used space and rates are averaged; capacities take the
/// maximum. `conns` and `extra` come from the newest sample in the
/// bucket, and among equal timestamps the one stored last.
pub fn aggregate(samples: &[Sample], bucket: u64) -> Vec<MetricPoint> {
    let width = bucket.max(1) as f64;

    let mut groups: BTreeMap<i64, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        let key = (sample.timestamp / width).floor() as i64;
        groups.entry(key).or_default().push(sample);
    }

    groups
        .into_iter()
        .filter_map(|(key, members)| bucket_point(key as f64 * width, &members))
        .collect()
}

fn bucket_point(t: f64, members: &[&Sample]) -> Option<MetricPoint> {
    // max_by keeps the last of several equal maxima
    let latest = members
        .iter()
        .copied()
        .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))?;

    let count = members.len() as f64;
    let mean = |field: fn(&Sample) -> f64| members.iter().map(|s| field(s)).sum::<f64>() / count;
    let max = |field: fn(&Sample) -> f64| {
        members
            .iter()
            .map(|s| field(s))
            .fold(f64::NEG_INFINITY, f64::max)
    };

    Some(MetricPoint {
        t,
        cpu: round_to(mean(|s| s.cpu_percent), 1),
        ram: round_to(mean(|s| s.ram_percent), 1),
        ram_used: round_to(mean(|s| s.ram_used_gb), 2),
        ram_total: max(|s| s.ram_total_gb),
        disk: round_to(mean(|s| s.disk_percent), 1),
        disk_used: round_to(mean(|s| s.disk_used_gb), 2),
        disk_total: max(|s| s.disk_total_gb),
        net_sent: mean(|s| s.net_sent_rate).round(),
        net_recv: mean(|s| s.net_recv_rate).round(),
        conns: latest.connections.clone(),
        extra: latest.extra.clone(),
    })
}

/// Rate × interval summed over the points, in GB
fn totals(points: &[MetricPoint], interval: f64) -> RangeTotals {
    let sent: f64 = points.iter().map(|p| p.net_sent).sum();
    let recv: f64 = points.iter().map(|p| p.net_recv).sum();

    RangeTotals {
        sent_gb: round_to(sent * interval / BYTES_PER_GB, 2),
        recv_gb: round_to(recv * interval / BYTES_PER_GB, 2),
    }
}

/// Answers range queries against the sample log
pub struct QueryEngine {
    store: Arc<dyn MetricStore>,
    /// Spacing of raw samples, used to turn raw rates into totals
    sample_interval: Duration,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn MetricStore>, sample_interval: Duration) -> Self {
        Self {
            store,
            sample_interval,
        }
    }

    pub async fn query(&self, key: RangeKey) -> Result<RangeReport, StoreError> {
        self.query_at(key, unix_now()).await
    }

    pub async fn query_at(&self, key: RangeKey, now: f64) -> Result<RangeReport, StoreError> {
        let policy = key.policy();
        let samples = self
            .store
            .query_range(now - policy.window_seconds as f64)
            .await?;

        let (data, interval) = match policy.resolution {
            Resolution::Raw => (
                samples.iter().map(MetricPoint::from).collect::<Vec<_>>(),
                self.sample_interval.as_secs_f64(),
            ),
            Resolution::Bucket(width) => (aggregate(&samples, width), width as f64),
        };
        let totals = totals(&data, interval);

        Ok(RangeReport {
            range: key,
            data,
            totals,
        })
    }
}
