//! ==============================================================================
//! broadcast.rs - stream broadcaster
//! ==============================================================================
//!
//! purpose:
//!     keeps the set of attached observers and pushes every new reading to
//!     each of them.
//!
//! fault isolation:
//!     each delivery is attempted on its own. an observer whose send fails
//!     (transport gone, or its buffer is full because it stalled) is removed
//!     after the pass; the other observers and the publisher never see the
//!     failure. nothing is retried: a dropped observer re-attaches and gets
//!     a fresh snapshot.
//!
//! concurrency:
//!     the broadcaster itself is plain data. hub.rs owns it behind the same
//!     lock as the history and registry, so attach (snapshot included),
//!     publish and detach are totally ordered with ingestion.
//!
//! relationships:
//!     - owned by: hub.rs
//!     - ChannelObserver feeds: http.rs (sse stream)
//!
//! ==============================================================================

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;

use crate::domain::{Reading, SensorState, StreamEvent};
use crate::error::{HubError, Result};

pub type ObserverId = u64;

/// why a single delivery failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// the consumer side is gone
    Closed,
    /// the consumer stopped draining its buffer
    Full,
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendFailure::Closed => f.write_str("transport closed"),
            SendFailure::Full => f.write_str("buffer full, observer stalled"),
        }
    }
}

/// something that can receive stream events
///
/// `send` must not block: it runs while the hub lock is held.
pub trait Observer: Send {
    fn send(&self, event: &StreamEvent) -> std::result::Result<(), SendFailure>;
}

/// observer backed by a bounded tokio channel
pub struct ChannelObserver {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelObserver {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn send(&self, event: &StreamEvent) -> std::result::Result<(), SendFailure> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
        })
    }
}

/// result of one publish pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub detached: Vec<ObserverId>,
}

#[derive(Default)]
pub struct Broadcaster {
    observers: BTreeMap<ObserverId, Box<dyn Observer>>,
    next_id: ObserverId,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// register `observer` and hand it the `initial` snapshot
    ///
    /// an observer that can't take its snapshot is never registered.
    pub fn attach(&mut self, observer: Box<dyn Observer>, snapshot: Vec<SensorState>) -> Result<ObserverId> {
        self.next_id += 1;
        let id = self.next_id;

        observer
            .send(&StreamEvent::Initial(snapshot))
            .map_err(|reason| HubError::ObserverWrite { id, reason: reason.to_string() })?;

        self.observers.insert(id, observer);
        tracing::info!("[STREAM] observer {} attached ({} active)", id, self.observers.len());
        Ok(id)
    }

    /// deliver `reading` to every attached observer, dropping the ones that fail
    pub fn publish(&mut self, reading: &Reading) -> PublishReport {
        let event = StreamEvent::Update(reading.clone());
        let mut report = PublishReport::default();

        for (&id, observer) in &self.observers {
            match observer.send(&event) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    let err = HubError::ObserverWrite { id, reason: reason.to_string() };
                    tracing::warn!("[STREAM] {}", err);
                    report.detached.push(id);
                }
            }
        }

        for id in &report.detached {
            self.observers.remove(id);
        }
        if !report.detached.is_empty() {
            tracing::info!(
                "[STREAM] dropped {} failed observer(s) ({} active)",
                report.detached.len(),
                self.observers.len()
            );
        }
        report
    }

    /// remove an observer; unknown or already-detached ids are a no-op
    pub fn detach(&mut self, id: ObserverId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            tracing::info!("[STREAM] observer {} detached ({} active)", id, self.observers.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }
}
