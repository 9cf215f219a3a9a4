//! Per-container stats recording
//!
//! A monitor attaches to one container's stats feed, derives CPU and memory
//! percentages per sample, and keeps a trailing window of samples on the
//! container.

use crate::tasks::{CancelHandle, CancelToken, cancel_pair};
use crate::types::{Container, RecordedStats};
use chrono::Utc;
use dock_rs::RuntimeApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Insert `sample` in time order, then drop samples older than
/// `max_duration` before the newest one
pub fn append_within_window(
    samples: &mut Vec<RecordedStats>,
    sample: RecordedStats,
    max_duration: Duration,
) {
    let at = samples.partition_point(|s| s.recorded_at <= sample.recorded_at);
    samples.insert(at, sample);

    let Some(newest) = samples.last().map(|s| s.recorded_at) else {
        return;
    };
    let Ok(window) = chrono::Duration::from_std(max_duration) else {
        return;
    };
    if let Some(cutoff) = newest.checked_sub_signed(window) {
        samples.retain(|s| s.recorded_at >= cutoff);
    }
}

/// Starts and stops stats monitors
pub struct StatsRecorder {
    runtime: Arc<dyn RuntimeApi>,
    max_duration: Duration,
    shutdown: CancelHandle,
}

impl StatsRecorder {
    pub fn new(runtime: Arc<dyn RuntimeApi>, max_duration: Duration) -> Self {
        let (shutdown, _) = cancel_pair();
        Self {
            runtime,
            max_duration,
            shutdown,
        }
    }

    /// Stream stats for `container` until the feed ends or `cancel` fires
    ///
    /// Starting a second monitor for a container that is already being
    /// monitored records every sample twice; check
    /// [`Container::is_monitoring`] first.
    pub async fn monitor(&self, container: Arc<Container>, cancel: CancelToken) {
        monitor_stats(
            self.runtime.clone(),
            container,
            self.max_duration,
            cancel,
        )
        .await;
    }

    /// Spawn a monitor unless one is already running for `container`
    pub fn ensure_monitoring(&self, container: &Arc<Container>) -> Option<JoinHandle<()>> {
        if container.is_monitoring() {
            return None;
        }
        // Set before spawning so a second call right after is a no-op
        container.set_monitoring(true);
        Some(tokio::spawn(monitor_stats(
            self.runtime.clone(),
            container.clone(),
            self.max_duration,
            self.shutdown.token(),
        )))
    }

    /// Stop every monitor spawned by [`ensure_monitoring`](Self::ensure_monitoring)
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn monitor_stats(
    runtime: Arc<dyn RuntimeApi>,
    container: Arc<Container>,
    max_duration: Duration,
    cancel: CancelToken,
) {
    container.set_monitoring(true);
    let id = container.id().to_string();

    let mut feed = match runtime.stats_stream(&id).await {
        Ok(feed) => feed,
        Err(e) => {
            tracing::error!(container_id = %id, "Failed to open stats stream: {}", e);
            container.set_monitoring(false);
            return;
        }
    };

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = feed.recv() => item,
        };
        match item {
            Some(Ok(stats)) => {
                container.append_stats(RecordedStats::new(stats, Utc::now()), max_duration);
            }
            Some(Err(e)) => {
                tracing::warn!(container_id = %id, "Stats stream error: {}", e);
                break;
            }
            None => break,
        }
    }

    tracing::debug!(container_id = %id, "Stats monitor stopped");
    container.set_monitoring(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::summary;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use dock_rs::{ContainerDetails, ContainerStats, ContainerSummary, DockError};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(secs: i64) -> RecordedStats {
        RecordedStats::new(ContainerStats::default(), at(secs))
    }

    fn times(samples: &[RecordedStats]) -> Vec<DateTime<Utc>> {
        samples.iter().map(|s| s.recorded_at).collect()
    }

    #[test]
    fn test_window_drops_old_samples() {
        let mut samples = Vec::new();
        for t in [0, 10, 20, 30, 45] {
            append_within_window(&mut samples, sample(t), Duration::from_secs(20));
        }
        assert_eq!(times(&samples), vec![at(30), at(45)]);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let mut samples = Vec::new();
        for t in [0, 5, 10] {
            append_within_window(&mut samples, sample(t), Duration::from_secs(5));
        }
        assert_eq!(times(&samples), vec![at(5), at(10)]);
    }

    #[test]
    fn test_zero_window_keeps_newest_instant() {
        let mut samples = Vec::new();
        for t in [0, 1, 1] {
            append_within_window(&mut samples, sample(t), Duration::ZERO);
        }
        assert_eq!(times(&samples), vec![at(1), at(1)]);
    }

    #[test]
    fn test_out_of_order_sample_keeps_sorted() {
        let mut samples = Vec::new();
        for t in [10, 30, 20] {
            append_within_window(&mut samples, sample(t), Duration::from_secs(60));
        }
        assert_eq!(times(&samples), vec![at(10), at(20), at(30)]);
    }

    #[test]
    fn test_huge_window_keeps_everything() {
        let mut samples = Vec::new();
        for t in [0, 1_000_000] {
            append_within_window(&mut samples, sample(t), Duration::MAX);
        }
        assert_eq!(samples.len(), 2);
    }

    /// Runtime whose stats feed replays queued samples
    struct FeedRuntime {
        feed: Mutex<Option<mpsc::UnboundedReceiver<dock_rs::Result<ContainerStats>>>>,
    }

    type Feed = mpsc::UnboundedSender<dock_rs::Result<ContainerStats>>;

    impl FeedRuntime {
        fn new(items: Vec<dock_rs::Result<ContainerStats>>, keep_open: bool) -> (Self, Option<Feed>) {
            let (tx, rx) = mpsc::unbounded_channel();
            for item in items {
                tx.send(item).unwrap();
            }
            let runtime = Self {
                feed: Mutex::new(Some(rx)),
            };
            (runtime, keep_open.then_some(tx))
        }
    }

    #[async_trait]
    impl RuntimeApi for FeedRuntime {
        async fn list_containers(&self) -> dock_rs::Result<Vec<ContainerSummary>> {
            Ok(Vec::new())
        }

        async fn inspect_container(&self, _id: &str) -> dock_rs::Result<ContainerDetails> {
            Ok(ContainerDetails::default())
        }

        async fn stats_stream(
            &self,
            id: &str,
        ) -> dock_rs::Result<mpsc::UnboundedReceiver<dock_rs::Result<ContainerStats>>> {
            self.feed
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| DockError::Connection(format!("no feed for {id}")))
        }
    }

    fn busy_stats() -> ContainerStats {
        let mut stats = ContainerStats::default();
        stats.cpu_stats.cpu_usage.total_usage = 200;
        stats.cpu_stats.system_cpu_usage = 1000;
        stats.cpu_stats.online_cpus = 2;
        stats.memory_stats.usage = 50;
        stats.memory_stats.limit = 200;
        stats
    }

    #[tokio::test]
    async fn test_monitor_records_until_feed_closes() {
        let (runtime, _) = FeedRuntime::new(vec![Ok(busy_stats()), Ok(busy_stats())], false);
        let recorder = StatsRecorder::new(Arc::new(runtime), Duration::from_secs(300));
        let container = Arc::new(Container::new(summary("c1", "shop", "web", "running")));
        let (_handle, token) = cancel_pair();

        recorder.monitor(container.clone(), token).await;

        let stats = container.stats();
        assert_eq!(stats.len(), 2);
        assert!((stats[0].derived.cpu_percentage - 40.0).abs() < 1e-9);
        assert!((stats[0].derived.memory_percentage - 25.0).abs() < 1e-9);
        assert!(!container.is_monitoring());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_stream_error() {
        let (runtime, _tx) = FeedRuntime::new(
            vec![
                Ok(busy_stats()),
                Err(DockError::Connection("reset".to_string())),
                Ok(busy_stats()),
            ],
            true,
        );
        let recorder = StatsRecorder::new(Arc::new(runtime), Duration::from_secs(300));
        let container = Arc::new(Container::new(summary("c1", "shop", "web", "running")));
        let (_handle, token) = cancel_pair();

        recorder.monitor(container.clone(), token).await;

        assert_eq!(container.stats().len(), 1);
        assert!(!container.is_monitoring());
    }

    #[tokio::test]
    async fn test_monitor_open_failure_clears_flag() {
        let (runtime, _) = FeedRuntime::new(Vec::new(), false);
        runtime.feed.lock().unwrap().take();
        let recorder = StatsRecorder::new(Arc::new(runtime), Duration::from_secs(300));
        let container = Arc::new(Container::new(summary("c1", "shop", "web", "running")));
        let (_handle, token) = cancel_pair();

        recorder.monitor(container.clone(), token).await;
        assert!(!container.is_monitoring());
    }

    #[tokio::test]
    async fn test_ensure_monitoring_once_and_shutdown() {
        let (runtime, _tx) = FeedRuntime::new(vec![Ok(busy_stats())], true);
        let recorder = StatsRecorder::new(Arc::new(runtime), Duration::from_secs(300));
        let container = Arc::new(Container::new(summary("c1", "shop", "web", "running")));

        let handle = recorder.ensure_monitoring(&container).unwrap();
        assert!(container.is_monitoring());
        assert!(recorder.ensure_monitoring(&container).is_none());

        for _ in 0..100 {
            if !container.stats().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(container.stats().len(), 1);

        recorder.shutdown();
        handle.await.unwrap();
        assert!(!container.is_monitoring());
    }
}
