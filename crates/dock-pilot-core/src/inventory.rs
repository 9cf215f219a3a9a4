//! Container inventory reconciliation
//!
//! Each refresh lists every container and merges the listing into the
//! previous set: a container whose ID is still reported keeps its
//! `Arc<Container>`, a new ID gets a new one, and an ID no longer reported
//! is dropped. Details are then fetched with bounded parallelism.

use crate::types::Container;
use dock_rs::{ContainerDetails, ContainerSummary, Result, RuntimeApi};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Merge a fresh listing into the previous container set
///
/// Listing order is kept. Reused containers get their listing-derived
/// fields recomputed.
pub fn merge_containers(
    previous: &[Arc<Container>],
    listing: Vec<ContainerSummary>,
) -> Vec<Arc<Container>> {
    let by_id: HashMap<&str, &Arc<Container>> = previous.iter().map(|c| (c.id(), c)).collect();

    listing
        .into_iter()
        .map(|summary| match by_id.get(summary.id.as_str()) {
            Some(existing) => {
                existing.apply_listing(summary);
                Arc::clone(existing)
            }
            None => Arc::new(Container::new(summary)),
        })
        .collect()
}

/// Polls the runtime and owns the two inventory locks
pub struct Inventory {
    runtime: Arc<dyn RuntimeApi>,
    /// Guards container listing, merging and detail publication
    container_lock: Mutex<()>,
    /// Guards service derivation and assignment
    service_lock: Mutex<()>,
    inspect_concurrency: usize,
}

impl Inventory {
    pub fn new(runtime: Arc<dyn RuntimeApi>, inspect_concurrency: usize) -> Self {
        Self {
            runtime,
            container_lock: Mutex::new(()),
            service_lock: Mutex::new(()),
            inspect_concurrency: inspect_concurrency.max(1),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn RuntimeApi> {
        &self.runtime
    }

    /// Hold the service scope
    pub async fn lock_services(&self) -> MutexGuard<'_, ()> {
        self.service_lock.lock().await
    }

    /// List, merge with `previous`, and refresh details of every container
    pub async fn refresh(&self, previous: &[Arc<Container>]) -> Result<Vec<Arc<Container>>> {
        let containers = {
            let _guard = self.container_lock.lock().await;
            let listing = self.runtime.list_containers().await?;
            merge_containers(previous, listing)
        };
        tracing::debug!("Listed {} containers", containers.len());

        self.refresh_details(&containers).await;
        Ok(containers)
    }

    /// Re-inspect `containers` and attach the results
    ///
    /// A failed inspection leaves that container's previous details in
    /// place.
    pub async fn refresh_details(&self, containers: &[Arc<Container>]) {
        let results = self.inspect_all(containers).await;

        let _guard = self.container_lock.lock().await;
        for (container, result) in results {
            match result {
                Ok(details) => container.set_details(details),
                Err(e) => {
                    tracing::warn!(container_id = %container.id(), "Inspect failed: {}", e);
                }
            }
        }
    }

    async fn inspect_all(
        &self,
        containers: &[Arc<Container>],
    ) -> Vec<(Arc<Container>, Result<ContainerDetails>)> {
        let requests = containers.iter().cloned().map(|container| {
            let runtime = self.runtime.clone();
            async move {
                let result = runtime.inspect_container(container.id()).await;
                (container, result)
            }
        });

        futures::stream::iter(requests)
            .buffer_unordered(self.inspect_concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use dock_rs::{ContainerDetails, ContainerStats, ContainerSummary, DockError, Result, RuntimeApi};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Runtime serving a scripted listing
    #[derive(Default)]
    pub struct FakeRuntime {
        pub listing: Mutex<Vec<ContainerSummary>>,
        pub failing_inspect: Mutex<HashSet<String>>,
        pub fail_list: Mutex<bool>,
        pub inspect_calls: AtomicUsize,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl FakeRuntime {
        pub fn with_listing(listing: Vec<ContainerSummary>) -> Self {
            let runtime = Self::default();
            runtime.set_listing(listing);
            runtime
        }

        pub fn set_listing(&self, listing: Vec<ContainerSummary>) {
            *self.listing.lock().unwrap() = listing;
        }

        pub fn fail_inspect(&self, id: &str) {
            self.failing_inspect.lock().unwrap().insert(id.to_string());
        }
    }

    #[async_trait]
    impl RuntimeApi for FakeRuntime {
        async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
            if *self.fail_list.lock().unwrap() {
                return Err(DockError::Connection("connection refused".to_string()));
            }
            Ok(self.listing.lock().unwrap().clone())
        }

        async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
            self.inspect_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing_inspect.lock().unwrap().contains(id) {
                return Err(DockError::Connection(format!("inspect {id} failed")));
            }
            let generation = self.inspect_calls.load(Ordering::SeqCst);
            Ok(ContainerDetails::from_value(serde_json::json!({
                "Id": id,
                "Generation": generation,
                "State": {"Status": "running", "ExitCode": 0}
            })))
        }

        async fn stats_stream(
            &self,
            _id: &str,
        ) -> Result<mpsc::UnboundedReceiver<Result<ContainerStats>>> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(rx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeRuntime;
    use super::*;
    use crate::types::test_support::summary;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_merge_reuses_by_id() {
        let first = merge_containers(
            &[],
            vec![
                summary("a", "shop", "web", "running"),
                summary("b", "shop", "db", "running"),
            ],
        );
        let second = merge_containers(
            &first,
            vec![
                summary("b", "shop", "db", "exited"),
                summary("c", "shop", "cache", "running"),
            ],
        );

        assert_eq!(second.len(), 2);
        assert!(Arc::ptr_eq(&first[1], &second[0]));
        assert_eq!(second[0].state(), "exited");
        assert_eq!(second[1].id(), "c");
        assert!(!second.iter().any(|c| c.id() == "a"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_identity_across_passes() {
        let runtime = Arc::new(FakeRuntime::with_listing(vec![
            summary("a", "shop", "web", "running"),
            summary("b", "shop", "db", "running"),
        ]));
        let inventory = Inventory::new(runtime.clone(), 4);

        let first = inventory.refresh(&[]).await.unwrap();
        let second = inventory.refresh(&first).await.unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(Arc::ptr_eq(&first[1], &second[1]));

        runtime.set_listing(vec![summary("b", "shop", "db", "running")]);
        let third = inventory.refresh(&second).await.unwrap();
        assert_eq!(third.len(), 1);
        assert!(Arc::ptr_eq(&second[1], &third[0]));
    }

    #[tokio::test]
    async fn test_refresh_attaches_details() {
        let runtime = Arc::new(FakeRuntime::with_listing(vec![summary(
            "a", "shop", "web", "running",
        )]));
        let inventory = Inventory::new(runtime, 4);

        let containers = inventory.refresh(&[]).await.unwrap();
        let details = containers[0].details().unwrap();
        assert_eq!(details.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_failed_inspect_keeps_previous_details() {
        let runtime = Arc::new(FakeRuntime::with_listing(vec![
            summary("a", "shop", "web", "running"),
            summary("b", "shop", "db", "running"),
        ]));
        let inventory = Inventory::new(runtime.clone(), 4);

        let first = inventory.refresh(&[]).await.unwrap();
        let before_a = first[0].details().unwrap();
        let before_b = first[1].details().unwrap();

        runtime.fail_inspect("a");
        let second = inventory.refresh(&first).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].details().unwrap(), before_a);
        assert_ne!(second[1].details().unwrap(), before_b);
    }

    #[tokio::test]
    async fn test_inspect_fan_out_is_bounded() {
        let listing = (0..12)
            .map(|i| summary(&format!("c{i}"), "shop", "web", "running"))
            .collect();
        let runtime = Arc::new(FakeRuntime::with_listing(listing));
        let inventory = Inventory::new(runtime.clone(), 3);

        let containers = inventory.refresh(&[]).await.unwrap();
        assert_eq!(containers.len(), 12);
        assert_eq!(runtime.inspect_calls.load(Ordering::SeqCst), 12);
        assert!(runtime.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_list_failure_is_returned() {
        let runtime = Arc::new(FakeRuntime::default());
        *runtime.fail_list.lock().unwrap() = true;
        let inventory = Inventory::new(runtime, 4);
        assert!(inventory.refresh(&[]).await.is_err());
    }
}
