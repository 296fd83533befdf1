//! Per-session turn coordination.
//!
//! The voice platform speaks each turn twice (partial then final transcript),
//! so every incoming turn first cancels whatever the session already has
//! running: an in-flight gateway fetch is aborted, an armed debounce is
//! superseded. Only the survivor of the debounce reaches the gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// The wait ran out undisturbed; this turn proceeds.
    Settled,
    /// A newer turn armed over this one; close without touching the gateway.
    Superseded,
}

struct InFlight {
    turn: u64,
    cancel: oneshot::Sender<()>,
}

struct Pending {
    epoch: u64,
    supersede: oneshot::Sender<()>,
}

#[derive(Default)]
struct SessionSlot {
    in_flight: Option<InFlight>,
    pending: Option<Pending>,
}

impl SessionSlot {
    fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_none()
    }
}

/// Process-wide map of live session slots. Operations on one session are
/// serialized by the map lock; sessions never wait on each other beyond it.
/// Idle slots are dropped eagerly so the map tracks only active calls.
#[derive(Default)]
pub struct SessionCoordinator {
    slots: Mutex<HashMap<String, SessionSlot>>,
    serial: AtomicU64,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the session's running gateway fetch, if any.
    pub async fn abort_in_flight(&self, session: &str) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(session) {
            if let Some(in_flight) = slot.in_flight.take() {
                debug!(session, turn = in_flight.turn, "aborting in-flight turn");
                let _ = in_flight.cancel.send(());
            }
            if slot.is_idle() {
                slots.remove(session);
            }
        }
    }

    /// Arm a fresh debounce, superseding (and waking early) any previous one.
    pub async fn arm_pending(&self, session: &str, wait: Duration) -> DebounceOutcome {
        let epoch = self.serial.fetch_add(1, Ordering::Relaxed);
        let (supersede_tx, superseded) = oneshot::channel();

        {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(session.to_string()).or_default();
            if let Some(previous) = slot.pending.take() {
                debug!(session, epoch = previous.epoch, "superseding pending debounce");
                let _ = previous.supersede.send(());
            }
            slot.pending = Some(Pending {
                epoch,
                supersede: supersede_tx,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let mut slots = self.slots.lock().await;
                let Some(slot) = slots.get_mut(session) else {
                    return DebounceOutcome::Superseded;
                };
                // A newer arm may have landed between the sleep expiring and
                // the lock being taken; the epoch decides.
                if slot.pending.as_ref().map(|p| p.epoch) == Some(epoch) {
                    slot.pending = None;
                    if slot.is_idle() {
                        slots.remove(session);
                    }
                    DebounceOutcome::Settled
                } else {
                    DebounceOutcome::Superseded
                }
            }
            _ = superseded => DebounceOutcome::Superseded,
        }
    }

    /// Register this turn as the session's in-flight fetch. The returned
    /// receiver fires when a newer turn aborts it.
    pub async fn register_in_flight(&self, session: &str) -> (u64, oneshot::Receiver<()>) {
        let turn = self.serial.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancelled) = oneshot::channel();

        let mut slots = self.slots.lock().await;
        let slot = slots.entry(session.to_string()).or_default();
        if let Some(previous) = slot.in_flight.take() {
            // Should already have been aborted by the pipeline; be safe.
            let _ = previous.cancel.send(());
        }
        slot.in_flight = Some(InFlight {
            turn,
            cancel: cancel_tx,
        });
        (turn, cancelled)
    }

    /// Clear the in-flight registration, but only if it still belongs to
    /// `turn`. A finished old turn must not evict its successor's handle.
    pub async fn clear_in_flight(&self, session: &str, turn: u64) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(session) {
            if slot.in_flight.as_ref().map(|f| f.turn) == Some(turn) {
                slot.in_flight = None;
            }
            if slot.is_idle() {
                slots.remove(session);
            }
        }
    }
}
