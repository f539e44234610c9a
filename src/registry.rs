//! Listener registry
//!
//! Maps each device id to the task currently listening on it. The monitor
//! inserts and retires entries; a listener removes its own entry when its loop
//! ends. Every access goes through one mutex, never held across an await.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::devices::DeviceId;

/// Handle to one spawned listener task
pub struct ListenerHandle {
    generation: u64,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// True while the listener task has not finished
    pub fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal the listener to stop and wait for its task to exit
    pub async fn stop(self) {
        // The listener may already be gone
        let _ = self.stop.send(());

        if let Err(e) = self.task.await {
            warn!("Listener task ended abnormally: {}", e);
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<DeviceId, ListenerHandle>,
    next_generation: u64,
    closed: bool,
}

/// Synchronized device id → listener map
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a listener for `id` unless a live one is registered
    ///
    /// `make` receives the entry's generation and stop receiver and returns the
    /// listener future. A dead entry is replaced. Returns whether a new listener
    /// was spawned; a closed registry never spawns.
    pub fn start_with<F, Fut>(&self, id: &str, make: F) -> bool
    where
        F: FnOnce(u64, oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock();

        if inner.closed {
            debug!("Registry closed, not starting listener for {}", id);
            return false;
        }

        if let Some(existing) = inner.entries.get(id) {
            if existing.is_live() {
                debug!("Listener already live for {}", id);
                return false;
            }
            debug!("Replacing dead listener entry for {}", id);
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (stop, stop_rx) = oneshot::channel();

        // Spawned under the lock so the task's self-removal cannot run first
        let task = tokio::spawn(make(generation, stop_rx));

        inner.entries.insert(
            id.to_string(),
            ListenerHandle {
                generation,
                stop,
                task,
            },
        );
        true
    }

    /// Remove the entry for `id` if it still belongs to `generation`
    ///
    /// Called by a listener on exit; a newer listener's entry is left alone.
    pub fn remove_if_current(&self, id: &str, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(id) {
            Some(entry) if entry.generation == generation => {
                inner.entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the entry for `id`
    pub fn take(&self, id: &str) -> Option<ListenerHandle> {
        self.inner.lock().entries.remove(id)
    }

    /// Remove `id`, stop its listener and wait for it to exit
    pub async fn retire(&self, id: &str) -> bool {
        // Lock released before awaiting
        let handle = self.take(id);
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    /// Stop every listener and wait for all of them
    pub async fn retire_all(&self) {
        let handles: Vec<(DeviceId, ListenerHandle)> =
            self.inner.lock().entries.drain().collect();

        for (id, handle) in handles {
            debug!("Retiring listener for {}", id);
            handle.stop().await;
        }
    }

    /// Refuse new listeners, then signal every registered one without waiting
    pub fn close(&self) {
        let handles: Vec<ListenerHandle> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.entries.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.stop.send(());
        }
    }

    /// True if `id` has a live listener
    pub fn is_live(&self, id: &str) -> bool {
        self.inner
            .lock()
            .entries
            .get(id)
            .map(ListenerHandle::is_live)
            .unwrap_or(false)
    }

    /// Ids with a live listener, sorted
    pub fn live_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .inner
            .lock()
            .entries
            .iter()
            .filter(|(_, handle)| handle.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of entries, live or not
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Listener stand-in that runs until stopped
    async fn park(stop: oneshot::Receiver<()>, exits: Arc<AtomicUsize>) {
        let _ = stop.await;
        exits.fetch_add(1, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_while_live() {
        let registry = ListenerRegistry::new();
        let exits = Arc::new(AtomicUsize::new(0));

        let e1 = exits.clone();
        assert!(registry.start_with("dev", move |_, stop| park(stop, e1)));
        let e2 = exits.clone();
        assert!(!registry.start_with("dev", move |_, stop| park(stop, e2)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.live_ids(), vec!["dev".to_string()]);

        registry.retire_all().await;
        assert_eq!(exits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dead_entry_is_replaced() {
        let registry = ListenerRegistry::new();

        // Finishes immediately without removing itself
        registry.start_with("dev", |_, _stop| async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!registry.is_live("dev"));
        assert_eq!(registry.len(), 1);

        let exits = Arc::new(AtomicUsize::new(0));
        let e = exits.clone();
        assert!(registry.start_with("dev", move |_, stop| park(stop, e)));
        assert!(registry.is_live("dev"));

        assert!(registry.retire("dev").await);
        assert_eq!(exits.load(Ordering::SeqCst), 1);
        assert!(!registry.retire("dev").await);
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_evict() {
        let registry = ListenerRegistry::new();
        let exits = Arc::new(AtomicUsize::new(0));

        let e = exits.clone();
        registry.start_with("dev", move |_, stop| park(stop, e));
        let handle = registry.take("dev").unwrap();
        let old_generation = handle.generation();
        handle.stop().await;

        let e = exits.clone();
        registry.start_with("dev", move |_, stop| park(stop, e));

        assert!(!registry.remove_if_current("dev", old_generation));
        assert!(registry.is_live("dev"));

        registry.retire_all().await;
        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_stops_and_refuses_listeners() {
        let registry = ListenerRegistry::new();
        let exits = Arc::new(AtomicUsize::new(0));

        for id in ["a", "b"] {
            let e = exits.clone();
            registry.start_with(id, move |_, stop| park(stop, e));
        }
        registry.close();
        assert!(registry.is_empty());

        let e = exits.clone();
        assert!(!registry.start_with("c", move |_, stop| park(stop, e)));
        assert!(registry.is_empty());

        for _ in 0..100 {
            if exits.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_self_removal() {
        let registry = Arc::new(ListenerRegistry::new());

        let reg = registry.clone();
        registry.start_with("dev", move |generation, _stop| async move {
            reg.remove_if_current("dev", generation);
        });

        for _ in 0..100 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(registry.is_empty());
    }
}
