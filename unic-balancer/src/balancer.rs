//! Remote selection
//!
//! [`LoadBalancer::select_remote`] picks the remote that receives the next
//! shard, using the configured [`Strategy`].

use crate::config::Strategy;
use crate::probe::probe_free_space;
use crate::stats::{Direction, StatsStore};
use crate::{BalancerError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use unic_core::remote::{Remote, RemoteStore};

/// Remote selection over a [`RemoteStore`]
pub struct LoadBalancer {
    strategy: Strategy,
    stats: StatsStore,
    store: Arc<dyn RemoteStore>,
    /// ResourceBased winner, kept for the rest of the process
    best_remote: Mutex<Option<Remote>>,
}

impl LoadBalancer {
    pub fn new(strategy: Strategy, stats: StatsStore, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            strategy,
            stats,
            store,
            best_remote: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    /// Pick the remote for the next shard with the configured strategy
    pub async fn select_remote(&self, candidates: &[Remote]) -> Result<Remote> {
        self.select_remote_with(self.strategy, candidates).await
    }

    /// Pick the remote for the next shard with an explicit strategy
    #[instrument(skip(self, candidates), fields(strategy = %strategy))]
    pub async fn select_remote_with(
        &self,
        strategy: Strategy,
        candidates: &[Remote],
    ) -> Result<Remote> {
        if candidates.is_empty() {
            return Err(BalancerError::NoRemotes);
        }
        let remote = match strategy {
            Strategy::RoundRobin => self.round_robin(candidates)?,
            Strategy::ResourceBased => self.resource_based(candidates).await?,
            Strategy::UploadOptima => self.optima(candidates, Direction::Up)?,
            Strategy::DownloadOptima => self.optima(candidates, Direction::Down)?,
        };
        debug!(remote = %remote, "Remote selected");
        Ok(remote)
    }

    /// Record a throughput sample for a remote
    pub fn record_sample(&self, remote: &Remote, direction: Direction, value: f64) -> Result<()> {
        self.stats.record_sample(remote, direction, value)
    }

    fn round_robin(&self, candidates: &[Remote]) -> Result<Remote> {
        let counter = self.stats.next_round_robin()?;
        let index = (counter % candidates.len() as u64) as usize;
        Ok(candidates[index].clone())
    }

    async fn resource_based(&self, candidates: &[Remote]) -> Result<Remote> {
        let cached = self.best_remote.lock().clone();
        if let Some(best) = cached {
            return Ok(best);
        }

        let result = probe_free_space(Arc::clone(&self.store), candidates).await;
        match result.best {
            Some((remote, free)) => {
                info!(remote = %remote, free, "Resource-based remote chosen");
                *self.best_remote.lock() = Some(remote.clone());
                Ok(remote)
            }
            None => Err(BalancerError::AllRemotesUnavailable(
                result
                    .failures
                    .iter()
                    .map(|(r, e)| format!("{}: {}", r, e))
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    }

    fn optima(&self, candidates: &[Remote], direction: Direction) -> Result<Remote> {
        let Some(key) = self.stats.best_key(direction)? else {
            debug!("No throughput recorded, falling back to round robin");
            return self.round_robin(candidates);
        };
        match Remote::from_key(&key) {
            Ok(remote) if candidates.contains(&remote) => Ok(remote),
            Ok(remote) => {
                debug!(remote = %remote, "Best remote not a candidate, falling back to round robin");
                self.round_robin(candidates)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Unparseable remote key, falling back to round robin");
                self.round_robin(candidates)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::config::Strategy;
    use tempfile::TempDir;
    use unic_storage::{FailOp, MemoryRemoteStore};

    fn abc() -> Vec<Remote> {
        vec![
            Remote::new("A", "mem"),
            Remote::new("B", "mem"),
            Remote::new("C", "mem"),
        ]
    }

    fn balancer(
        tmp: &TempDir,
        strategy: Strategy,
        store: Arc<MemoryRemoteStore>,
    ) -> LoadBalancer {
        LoadBalancer::new(strategy, StatsStore::new(tmp.path().join("lb.json")), store)
    }

    #[tokio::test]
    async fn test_round_robin_cycles_and_persists() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));

        let lb = balancer(&tmp, Strategy::RoundRobin, store.clone());
        let mut picked = Vec::new();
        for _ in 0..4 {
            picked.push(lb.select_remote(&remotes).await.unwrap().name);
        }
        assert_eq!(picked, vec!["A", "B", "C", "A"]);

        let reopened = balancer(&tmp, Strategy::RoundRobin, store);
        assert_eq!(reopened.select_remote(&remotes).await.unwrap().name, "B");
    }

    #[tokio::test]
    async fn test_resource_based_picks_most_free() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));
        store.set_free_space(&remotes[0], 100);
        store.set_free_space(&remotes[1], 500);
        store.fail(&remotes[2], FailOp::FreeSpace);

        let lb = balancer(&tmp, Strategy::ResourceBased, store);
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[1]);
    }

    #[tokio::test]
    async fn test_resource_based_all_fail() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));
        for r in &remotes {
            store.fail(r, FailOp::FreeSpace);
        }

        let lb = balancer(&tmp, Strategy::ResourceBased, store);
        assert!(matches!(
            lb.select_remote(&remotes).await,
            Err(BalancerError::AllRemotesUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_resource_based_winner_is_cached() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));
        store.set_free_space(&remotes[0], 900);
        store.set_free_space(&remotes[1], 10);
        store.set_free_space(&remotes[2], 10);

        let lb = balancer(&tmp, Strategy::ResourceBased, store.clone());
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[0]);

        // Conditions change, the cached choice does not
        store.set_free_space(&remotes[0], 0);
        store.set_free_space(&remotes[2], 10_000);
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[0]);
    }

    #[tokio::test]
    async fn test_optima_uses_recorded_throughput() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));

        let up = balancer(&tmp, Strategy::UploadOptima, store.clone());
        up.record_sample(&remotes[0], Direction::Up, 10.0).unwrap();
        up.record_sample(&remotes[2], Direction::Up, 30.0).unwrap();
        up.record_sample(&remotes[1], Direction::Down, 50.0).unwrap();
        assert_eq!(up.select_remote(&remotes).await.unwrap(), remotes[2]);

        let down = balancer(&tmp, Strategy::DownloadOptima, store);
        assert_eq!(down.select_remote(&remotes).await.unwrap(), remotes[1]);
    }

    #[tokio::test]
    async fn test_optima_falls_back_to_round_robin() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));

        let lb = balancer(&tmp, Strategy::DownloadOptima, store);
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[0]);
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[1]);

        // Unparseable key wins on throughput
        std::fs::write(
            tmp.path().join("lb.json"),
            r#"{"round_robin_counter": 2, "remote_infos": {"garbage": {"avg_down_throughput": 99.0}}}"#,
        )
        .unwrap();
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[2]);
    }

    #[tokio::test]
    async fn test_explicit_strategy_overrides_default() {
        let tmp = TempDir::new().unwrap();
        let remotes = abc();
        let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));
        store.set_free_space(&remotes[2], u64::MAX);
        store.set_free_space(&remotes[0], 1);
        store.set_free_space(&remotes[1], 1);

        let lb = balancer(&tmp, Strategy::RoundRobin, store);
        assert_eq!(
            lb.select_remote_with(Strategy::ResourceBased, &remotes)
                .await
                .unwrap(),
            remotes[2]
        );
        assert_eq!(lb.select_remote(&remotes).await.unwrap(), remotes[0]);
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryRemoteStore::new([]));
        let lb = balancer(&tmp, Strategy::RoundRobin, store);
        assert!(matches!(
            lb.select_remote(&[]).await,
            Err(BalancerError::NoRemotes)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_round_robin_follows_counter(n in 1usize..6, start in 0u64..1_000, picks in 1usize..12) {
            let tmp = TempDir::new().unwrap();
            let remotes: Vec<Remote> = (0..n).map(|i| Remote::new(format!("r{}", i), "mem")).collect();
            let path = tmp.path().join("lb.json");
            std::fs::write(&path, format!(r#"{{"round_robin_counter": {}}}"#, start)).unwrap();
            let stats = StatsStore::new(path);
            let lb = LoadBalancer::new(
                Strategy::RoundRobin,
                stats,
                Arc::new(MemoryRemoteStore::new(remotes.clone())),
            );

            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            for i in 0..picks {
                let picked = rt.block_on(lb.select_remote(&remotes)).unwrap();
                let expected = ((start + i as u64) % n as u64) as usize;
                prop_assert_eq!(&picked, &remotes[expected]);
            }
            prop_assert_eq!(lb.stats().load().unwrap().round_robin_counter, start + picks as u64);
        }
    }
}
