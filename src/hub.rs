//! ==============================================================================
//! hub.rs - the coordinating owner of all pipeline state
//! ==============================================================================
//!
//! purpose:
//!     owns the history store, the sensor registry and the broadcaster behind
//!     one lock. every mutation goes through here, so the pipeline runs on a
//!     single logical timeline:
//!
//!         ingest:  validate -> append -> upsert -> publish   (one critical section)
//!         attach:  register -> initial snapshot              (same lock)
//!         detach:  remove                                    (same lock)
//!
//!     an observer therefore sees its snapshot followed by exactly the
//!     updates published after it, with no gaps and no duplicates.
//!
//! relationships:
//!     - uses: ingest.rs, history.rs, registry.rs, broadcast.rs
//!     - read by: query.rs, health.rs
//!     - used by: http.rs, main.rs
//!
//! ==============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::broadcast::{Broadcaster, ChannelObserver, Observer, ObserverId};
use crate::config::{HubConfig, SensorCatalog};
use crate::domain::{RawReading, Reading, StreamEvent};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::ingest::Normalizer;
use crate::registry::SensorRegistry;

/// state behind the hub lock
pub(crate) struct Core {
    normalizer: Normalizer,
    pub(crate) history: HistoryStore,
    pub(crate) registry: SensorRegistry,
    pub(crate) broadcaster: Broadcaster,
}

struct Settings {
    catalog: SensorCatalog,
    observer_buffer: usize,
    show_sensor_data: bool,
    started: Instant,
}

/// cheap, cloneable handle to the pipeline
#[derive(Clone)]
pub struct Hub {
    core: Arc<Mutex<Core>>,
    settings: Arc<Settings>,
}

impl Hub {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            core: Arc::new(Mutex::new(Core {
                normalizer: Normalizer::new(),
                history: HistoryStore::new(config.storage.max_stored),
                registry: SensorRegistry::new(),
                broadcaster: Broadcaster::new(),
            })),
            settings: Arc::new(Settings {
                catalog: config.catalog(),
                observer_buffer: config.streaming.observer_buffer,
                show_sensor_data: config.logging.show_sensor_data,
                started: Instant::now(),
            }),
        }
    }

    /// run one reading through the whole pipeline
    ///
    /// a validation failure returns before anything is touched.
    pub fn ingest(&self, raw: &RawReading) -> Result<Reading> {
        let mut core = self.core.lock();

        let reading = match core.normalizer.normalize(raw) {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!("[INGEST] rejected reading: {}", e);
                return Err(e);
            }
        };

        if self.settings.show_sensor_data {
            tracing::info!(
                "[INGEST] {}: {:.1}°C, {:.1}% humidity",
                reading.sensor_id,
                reading.temperature,
                reading.humidity
            );
        } else {
            tracing::debug!("[INGEST] {} -> id {}", reading.sensor_id, reading.id);
        }

        if let Some(evicted) = core.history.append(reading.clone()) {
            tracing::trace!("[INGEST] history full, evicted {}", evicted.id);
        }

        let metadata = self.settings.catalog.metadata_for(&reading.sensor_id);
        core.registry.upsert(&reading.sensor_id, &reading, metadata);

        let report = core.broadcaster.publish(&reading);
        tracing::debug!("[STREAM] update {} delivered to {} observer(s)", reading.id, report.delivered);

        Ok(reading)
    }

    /// register an arbitrary observer; it receives the snapshot before returning
    pub fn attach(&self, observer: Box<dyn Observer>) -> Result<ObserverId> {
        let mut core = self.core.lock();
        let snapshot = core.registry.list();
        core.broadcaster.attach(observer, snapshot)
    }

    /// attach a channel-backed observer that detaches itself when dropped
    pub fn subscribe(&self) -> Result<Subscription> {
        let (observer, receiver) = ChannelObserver::channel(self.settings.observer_buffer);
        let id = self.attach(Box::new(observer))?;
        Ok(Subscription { id, receiver, _guard: DetachGuard { hub: self.clone(), id } })
    }

    /// idempotent
    pub fn detach(&self, id: ObserverId) {
        self.core.lock().broadcaster.detach(id);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.settings.started.elapsed().as_secs()
    }

    /// read-only access for the query and health views
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Core) -> R) -> R {
        let core = self.core.lock();
        f(&*core)
    }
}

struct DetachGuard {
    hub: Hub,
    id: ObserverId,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}

/// the receiving end of a channel observer
///
/// yields the `initial` event, then one `update` per published reading.
/// dropping it (e.g. when an sse client disconnects) detaches the observer.
pub struct Subscription {
    id: ObserverId,
    receiver: mpsc::Receiver<StreamEvent>,
    _guard: DetachGuard,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    #[cfg(test)]
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::testing::RecordingObserver;
    use crate::error::HubError;
    use serde_json::json;

    fn hub_with_capacity(max_stored: usize) -> Hub {
        let mut config = HubConfig::default();
        config.storage.max_stored = max_stored;
        config.logging.show_sensor_data = false;
        Hub::new(&config)
    }

    fn raw(sensor_id: &str, temperature: f64) -> RawReading {
        serde_json::from_value(json!({"sensorId": sensor_id, "temperature": temperature, "humidity": 50}))
            .unwrap()
    }

    #[test]
    fn test_ingest_updates_history_and_registry() {
        let hub = hub_with_capacity(10);
        hub.ingest(&raw("S1", 10.0)).unwrap();
        let last = hub.ingest(&raw("S1", 11.0)).unwrap();

        hub.read(|core| {
            assert_eq!(core.history.len(), 2);
            let state = core.registry.get("S1").unwrap();
            assert_eq!(state.reading, last);
            assert_eq!(state.metadata.name, "Sensor S1");
            assert_eq!(core.registry.len(), 1);
        });
    }

    #[test]
    fn test_rejected_reading_leaves_state_untouched() {
        let hub = hub_with_capacity(10);
        let observer = RecordingObserver::default();
        hub.attach(Box::new(observer.clone())).unwrap();

        let bad: RawReading = serde_json::from_value(json!({"sensorId": "S1", "temperature": "hot"})).unwrap();
        assert!(matches!(hub.ingest(&bad), Err(HubError::Validation { .. })));

        hub.read(|core| {
            assert!(core.history.is_empty());
            assert!(core.registry.is_empty());
        });
        assert_eq!(observer.kinds(), vec!["initial"]);
    }

    #[test]
    fn test_snapshot_reflects_state_at_attach() {
        let hub = hub_with_capacity(10);
        hub.ingest(&raw("S1", 1.0)).unwrap();
        hub.ingest(&raw("S2", 2.0)).unwrap();

        let observer = RecordingObserver::default();
        hub.attach(Box::new(observer.clone())).unwrap();
        let after = hub.ingest(&raw("S3", 3.0)).unwrap();

        let events = observer.events.lock().clone();
        assert_eq!(events.len(), 2);
        match &events[0] {
            StreamEvent::Initial(states) => {
                let ids: Vec<&str> = states.iter().map(|s| s.reading.sensor_id.as_str()).collect();
                assert_eq!(ids, vec!["S1", "S2"]);
            }
            other => panic!("expected initial, got {other:?}"),
        }
        assert_eq!(events[1], StreamEvent::Update(after));
    }

    #[test]
    fn test_two_observers_one_detaches() {
        let hub = hub_with_capacity(10);
        let first = RecordingObserver::default();
        let second = RecordingObserver::default();
        let first_id = hub.attach(Box::new(first.clone())).unwrap();
        hub.attach(Box::new(second.clone())).unwrap();

        hub.ingest(&raw("S1", 1.0)).unwrap();
        hub.detach(first_id);
        hub.ingest(&raw("S1", 2.0)).unwrap();

        assert_eq!(first.updates().len(), 1);
        assert_eq!(second.updates().len(), 2);
    }

    #[test]
    fn test_broken_observer_does_not_fail_ingest() {
        let hub = hub_with_capacity(10);
        let broken = RecordingObserver::default();
        let healthy = RecordingObserver::default();
        hub.attach(Box::new(broken.clone())).unwrap();
        hub.attach(Box::new(healthy.clone())).unwrap();
        broken.break_transport();

        let reading = hub.ingest(&raw("S1", 1.0)).unwrap();

        assert_eq!(healthy.updates(), vec![reading]);
        hub.read(|core| assert_eq!(core.broadcaster.len(), 1));
    }

    #[test]
    fn test_history_is_bounded_through_hub() {
        let hub = hub_with_capacity(3);
        let ids: Vec<String> = (0..4).map(|n| hub.ingest(&raw("S1", n as f64)).unwrap().id).collect();

        hub.read(|core| {
            let kept: Vec<String> = core.history.iter().map(|r| r.id.clone()).collect();
            assert_eq!(kept, ids[1..].to_vec());
        });
    }

    #[tokio::test]
    async fn test_subscription_receives_initial_then_updates() {
        let hub = hub_with_capacity(10);
        hub.ingest(&raw("S1", 1.0)).unwrap();

        let mut sub = hub.subscribe().unwrap();
        let published = hub.ingest(&raw("S1", 2.0)).unwrap();

        assert!(matches!(sub.recv().await, Some(StreamEvent::Initial(states)) if states.len() == 1));
        assert_eq!(sub.recv().await, Some(StreamEvent::Update(published)));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_detaches() {
        let hub = hub_with_capacity(10);
        let sub = hub.subscribe().unwrap();
        let id = sub.id();
        hub.read(|core| assert!(core.broadcaster.contains(id)));

        drop(sub);
        hub.read(|core| assert!(!core.broadcaster.contains(id)));

        // publishing afterwards is harmless
        hub.ingest(&raw("S1", 1.0)).unwrap();
        hub.read(|core| assert!(core.broadcaster.is_empty()));
    }

    #[tokio::test]
    async fn test_concurrent_ingest_keeps_single_order() {
        let hub = hub_with_capacity(1000);
        let mut a = hub.subscribe().unwrap();
        let mut b = hub.subscribe().unwrap();

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let hub = hub.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                for n in 0..10 {
                    hub.ingest(&raw(&format!("W{worker}"), n as f64)).unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let drain = |sub: &mut Subscription| {
            let mut ids = Vec::new();
            while let Some(event) = sub.try_recv() {
                if let StreamEvent::Update(r) = event {
                    ids.push(r.id);
                }
            }
            ids
        };
        let seen_a = drain(&mut a);
        let seen_b = drain(&mut b);

        assert_eq!(seen_a.len(), 40);
        assert_eq!(seen_a, seen_b);

        let history: Vec<String> = hub.read(|core| core.history.iter().map(|r| r.id.clone()).collect());
        assert_eq!(seen_a, history);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_observer_attached_mid_ingest_sees_snapshot_then_every_later_update() {
        let mut config = HubConfig::default();
        config.storage.max_stored = 10_000;
        config.streaming.observer_buffer = 10_000;
        config.logging.show_sensor_data = false;
        let hub = Hub::new(&config);

        let mut writers = Vec::new();
        for worker in 0..4 {
            let hub = hub.clone();
            writers.push(tokio::task::spawn_blocking(move || {
                for n in 0..500 {
                    hub.ingest(&raw(&format!("W{worker}-{}", n % 7), n as f64)).unwrap();
                }
            }));
        }

        let mut subs = Vec::new();
        for _ in 0..50 {
            subs.push(hub.subscribe().unwrap());
            tokio::task::yield_now().await;
        }
        for w in writers {
            w.await.unwrap();
        }

        let history: Vec<String> = hub.read(|core| core.history.iter().map(|r| r.id.clone()).collect());
        assert_eq!(history.len(), 2000);

        for sub in &mut subs {
            let newest_in_snapshot = match sub.try_recv() {
                Some(StreamEvent::Initial(states)) => states
                    .iter()
                    .map(|s| s.reading.id.parse::<u64>().unwrap())
                    .max(),
                other => panic!("observer {} did not start with initial: {other:?}", sub.id()),
            };

            let mut updates = Vec::new();
            while let Some(event) = sub.try_recv() {
                match event {
                    StreamEvent::Update(r) => updates.push(r.id),
                    StreamEvent::Initial(_) => panic!("second initial for observer {}", sub.id()),
                }
            }

            // the newest reading overall is always the latest for its sensor,
            // so it is in the snapshot and marks where the updates resume
            let resume_at = match newest_in_snapshot {
                Some(id) => {
                    let id = id.to_string();
                    history.iter().position(|h| *h == id).unwrap() + 1
                }
                None => 0,
            };
            assert_eq!(updates, history[resume_at..].to_vec(), "observer {}", sub.id());
        }
    }
}
