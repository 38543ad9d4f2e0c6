//! Load balancer statistics
//!
//! Owns `data/loadbalancer.json`: the round-robin counter and per-remote
//! throughput history. Same whole-document discipline as the datamap.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use unic_core::document::JsonDocument;
use unic_core::layout::VaultLayout;
use unic_core::remote::Remote;

/// Transfer direction of a throughput sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Rolling throughput samples of one remote (bytes per second)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteInfo {
    #[serde(default)]
    pub up_throughput_history: Vec<f64>,
    #[serde(default)]
    pub avg_up_throughput: f64,
    #[serde(default)]
    pub down_throughput_history: Vec<f64>,
    #[serde(default)]
    pub avg_down_throughput: f64,
}

impl RemoteInfo {
    pub fn record(&mut self, direction: Direction, value: f64) {
        let (history, avg) = match direction {
            Direction::Up => (&mut self.up_throughput_history, &mut self.avg_up_throughput),
            Direction::Down => (
                &mut self.down_throughput_history,
                &mut self.avg_down_throughput,
            ),
        };
        history.push(value);
        *avg = history.iter().sum::<f64>() / history.len() as f64;
    }

    pub fn average(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Up => self.avg_up_throughput,
            Direction::Down => self.avg_down_throughput,
        }
    }
}

/// Persisted balancer state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerInfo {
    #[serde(default)]
    pub round_robin_counter: u64,
    /// Keyed by `Remote::key()`
    #[serde(default)]
    pub remote_infos: BTreeMap<String, RemoteInfo>,
}

/// Store for [`LoadBalancerInfo`]
pub struct StatsStore {
    doc: JsonDocument<LoadBalancerInfo>,
}

impl StatsStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    pub fn open(layout: &VaultLayout) -> Self {
        Self::new(layout.load_balancer_path())
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    pub fn load(&self) -> Result<LoadBalancerInfo> {
        Ok(self.doc.load()?)
    }

    /// Current counter value; the counter is then incremented and persisted
    pub fn next_round_robin(&self) -> Result<u64> {
        self.doc.update(|info| -> Result<u64> {
            let current = info.round_robin_counter;
            info.round_robin_counter = current.wrapping_add(1);
            Ok(current)
        })
    }

    /// Append a throughput sample and recompute the average
    pub fn record_sample(&self, remote: &Remote, direction: Direction, value: f64) -> Result<()> {
        self.doc.update(|info| -> Result<()> {
            info.remote_infos
                .entry(remote.key())
                .or_default()
                .record(direction, value);
            Ok(())
        })?;
        debug!(remote = %remote, ?direction, value, "Throughput sample recorded");
        Ok(())
    }

    /// Key of the remote with the highest non-zero average, if any
    pub fn best_key(&self, direction: Direction) -> Result<Option<String>> {
        let info = self.load()?;
        let mut best: Option<(&String, f64)> = None;
        for (key, remote) in &info.remote_infos {
            let avg = remote.average(direction);
            if avg == 0.0 {
                continue;
            }
            if best.map(|(_, v)| avg > v).unwrap_or(true) {
                best = Some((key, avg));
            }
        }
        Ok(best.map(|(k, _)| k.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_robin_counter_persists() {
        let tmp = TempDir::new().unwrap();
        let layout = VaultLayout::new(tmp.path());
        let store = StatsStore::open(&layout);
        assert_eq!(store.next_round_robin().unwrap(), 0);
        assert_eq!(store.next_round_robin().unwrap(), 1);

        let reopened = StatsStore::open(&layout);
        assert_eq!(reopened.next_round_robin().unwrap(), 2);
        assert_eq!(reopened.load().unwrap().round_robin_counter, 3);
    }

    #[test]
    fn test_record_sample_averages() {
        let tmp = TempDir::new().unwrap();
        let store = StatsStore::new(tmp.path().join("lb.json"));
        let remote = Remote::new("a", "drive");

        store.record_sample(&remote, Direction::Up, 10.0).unwrap();
        store.record_sample(&remote, Direction::Up, 20.0).unwrap();
        store.record_sample(&remote, Direction::Down, 5.0).unwrap();

        let info = store.load().unwrap();
        let entry = &info.remote_infos["a|drive"];
        assert_eq!(entry.up_throughput_history, vec![10.0, 20.0]);
        assert_eq!(entry.avg_up_throughput, 15.0);
        assert_eq!(entry.avg_down_throughput, 5.0);
    }

    #[test]
    fn test_best_key_skips_zero() {
        let tmp = TempDir::new().unwrap();
        let store = StatsStore::new(tmp.path().join("lb.json"));
        assert!(store.best_key(Direction::Up).unwrap().is_none());

        store
            .record_sample(&Remote::new("slow", "s3"), Direction::Up, 1.0)
            .unwrap();
        store
            .record_sample(&Remote::new("fast", "s3"), Direction::Up, 9.0)
            .unwrap();
        store
            .record_sample(&Remote::new("idle", "s3"), Direction::Up, 0.0)
            .unwrap();

        assert_eq!(store.best_key(Direction::Up).unwrap().as_deref(), Some("fast|s3"));
        assert!(store.best_key(Direction::Down).unwrap().is_none());
    }
}
