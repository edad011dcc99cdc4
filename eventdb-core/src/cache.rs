//! In-memory per-application event histories that short-circuit read queries.
//!
//! Completed applications are evicted once their completion marker is older
//! than the configured retention window.

use crate::types::{ChangeDetail, EventRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CacheState {
    /// Events per application, in persistence order.
    events: HashMap<String, Vec<EventRecord>>,
    /// Applications whose cached list is complete and authoritative.
    full_history: HashSet<String>,
    /// When a completion event was observed, per application.
    completed_at: HashMap<String, Instant>,
}

/// Application event cache. All operations serialize on one mutex; the sweep
/// holds the lock for the duration of a single pass.
#[derive(Default)]
pub struct EventCache {
    state: Mutex<CacheState>,
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event to an application's history.
    pub fn add_event(&self, app_id: &str, event: EventRecord) {
        let mut state = self.lock();
        Self::append(&mut state, app_id, event);
    }

    /// Append a list of events to an application's history.
    pub fn add_events(&self, app_id: &str, events: Vec<EventRecord>) {
        let mut state = self.lock();
        for event in events {
            Self::append(&mut state, app_id, event);
        }
    }

    /// Mark that the cache holds the complete history for `app_id`.
    pub fn set_full_history(&self, app_id: &str) {
        self.lock().full_history.insert(app_id.to_owned());
    }

    /// The cached history for `app_id`, or `None` when the cache is not
    /// authoritative and the store must be consulted.
    pub fn events_for(&self, app_id: &str) -> Option<Vec<EventRecord>> {
        let state = self.lock();
        if !state.full_history.contains(app_id) {
            return None;
        }
        Some(state.events.get(app_id).cloned().unwrap_or_default())
    }

    /// Drop all cached state. Called when a scheduler restart is detected.
    pub fn clear(&self) {
        tracing::info!("clearing the event cache");
        let mut state = self.lock();
        state.events.clear();
        state.full_history.clear();
        state.completed_at.clear();
    }

    /// Remove applications whose completion marker is older than `window`.
    /// Returns the number of applications evicted.
    pub fn evict_expired(&self, window: Duration) -> usize {
        let mut state = self.lock();
        let expired: Vec<String> = state
            .completed_at
            .iter()
            .filter(|(_, completed)| completed.elapsed() >= window)
            .map(|(app_id, _)| app_id.clone())
            .collect();
        for app_id in &expired {
            tracing::debug!(app_id = %app_id, "removing application from the event cache");
            state.events.remove(app_id);
            state.full_history.remove(app_id);
            state.completed_at.remove(app_id);
        }
        expired.len()
    }

    /// Periodic eviction loop. Exits when `cancel` fires.
    pub async fn run_sweep(
        self: std::sync::Arc<Self>,
        period: Duration,
        window: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(period) => {
                    let removed = self.evict_expired(window);
                    if removed > 0 {
                        tracing::info!(removed, "event cache: removed expired applications");
                    }
                }
            }
        }
    }

    fn append(state: &mut CacheState, app_id: &str, event: EventRecord) {
        if event.change_detail == ChangeDetail::AppCompleted {
            tracing::info!(app_id = %app_id, "application completed");
            state.completed_at.insert(app_id.to_owned(), Instant::now());
        }
        state.events.entry(app_id.to_owned()).or_default().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // a poisoned lock means a panic while holding it; propagate
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeType, EventType};
    use std::sync::Arc;

    fn app_event(app_id: &str, detail: ChangeDetail) -> EventRecord {
        EventRecord {
            event_type: EventType::App,
            object_id: app_id.to_owned(),
            reference_id: String::new(),
            message: String::new(),
            timestamp_nano: 0,
            change_type: ChangeType::Add,
            change_detail: detail,
            resource: None,
        }
    }

    #[test]
    fn events_hidden_until_full_history() {
        let cache = EventCache::new();
        cache.add_event("app-1", app_event("app-1", ChangeDetail::DetailsNone));
        assert!(cache.events_for("app-1").is_none());

        cache.set_full_history("app-1");
        let events = cache.events_for("app-1").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn full_history_without_events_yields_empty_list() {
        let cache = EventCache::new();
        cache.set_full_history("app-1");
        assert_eq!(cache.events_for("app-1"), Some(Vec::new()));
    }

    #[test]
    fn add_events_preserves_order() {
        let cache = EventCache::new();
        let mut first = app_event("app-1", ChangeDetail::DetailsNone);
        first.message = "first".into();
        let mut second = app_event("app-1", ChangeDetail::AppRunning);
        second.message = "second".into();
        cache.add_events("app-1", vec![first, second]);
        cache.set_full_history("app-1");

        let events = cache.events_for("app-1").unwrap();
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].message, "second");
    }

    #[test]
    fn completed_apps_evicted_after_window() {
        let cache = EventCache::new();
        cache.add_event("done", app_event("done", ChangeDetail::AppCompleted));
        cache.set_full_history("done");
        cache.add_event("running", app_event("running", ChangeDetail::AppRunning));
        cache.set_full_history("running");

        let removed = cache.evict_expired(Duration::ZERO);
        assert_eq!(removed, 1);
        assert!(cache.events_for("done").is_none());
        assert!(cache.events_for("running").is_some());
    }

    #[test]
    fn unexpired_completion_survives_sweep() {
        let cache = EventCache::new();
        cache.add_event("done", app_event("done", ChangeDetail::AppCompleted));
        cache.set_full_history("done");

        let removed = cache.evict_expired(Duration::from_secs(3600));
        assert_eq!(removed, 0);
        assert!(cache.events_for("done").is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = EventCache::new();
        cache.add_event("app-1", app_event("app-1", ChangeDetail::AppCompleted));
        cache.set_full_history("app-1");
        cache.clear();

        assert!(cache.events_for("app-1").is_none());
        assert_eq!(cache.evict_expired(Duration::ZERO), 0);
    }

    #[tokio::test]
    async fn sweep_loop_exits_on_cancellation() {
        let cache = Arc::new(EventCache::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(cache.clone().run_sweep(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            cancel.clone(),
        ));
        cancel.cancel();
        handle.await.unwrap();
    }
}
