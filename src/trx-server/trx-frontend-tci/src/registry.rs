// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-capacity table of client slots.
//!
//! A slot moves Free -> Connecting (reserved by the listener before
//! `accept`) -> Open (after a successful upgrade) and back to Free through
//! [`ClientRegistry::release`]. Every allocation bumps the slot generation;
//! the resulting [`Lease`] is what callers hold, so a late release from a
//! finished connection cannot tear down a newer client on the same index.
//!
//! Release is the only teardown path and may race freely between the
//! connection worker, the event loop and server shutdown: the per-slot
//! mutex makes exactly one caller win.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::event_loop::EventLoopHandle;

pub const DEFAULT_MAX_CLIENTS: usize = 3;
pub const MAX_CLIENTS_LIMIT: usize = 8;

/// Handle to one allocation of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lease {
    index: usize,
    generation: u64,
}

impl Lease {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotPhase {
    #[default]
    Free,
    Connecting,
    Open,
}

/// How the socket is closed once the event loop drops the write half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Normal close, queued frames are delivered first.
    Graceful,
    /// Zero-linger close, the peer sees a reset.
    Abortive,
}

#[derive(Default)]
struct SlotInner {
    phase: SlotPhase,
    generation: u64,
    running: bool,
    peer: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    reporter: Option<JoinHandle<()>>,
}

impl SlotInner {
    fn holds(&self, lease: Lease) -> bool {
        self.phase != SlotPhase::Free && self.generation == lease.generation
    }
}

pub struct ClientSlot {
    inner: Mutex<SlotInner>,
    smeter_enabled: AtomicBool,
}

impl ClientSlot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner::default()),
            smeter_enabled: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-client S-meter reporting switch, toggled by `rx_sensors_enable`.
    pub fn smeter_enabled(&self) -> &AtomicBool {
        &self.smeter_enabled
    }

    pub fn phase(&self) -> SlotPhase {
        self.lock().phase
    }
}

pub struct ClientRegistry {
    slots: Box<[ClientSlot]>,
    events: EventLoopHandle,
}

impl ClientRegistry {
    pub fn new(capacity: usize, events: EventLoopHandle) -> Self {
        let capacity = capacity.clamp(1, MAX_CLIENTS_LIMIT);
        Self {
            slots: (0..capacity).map(|_| ClientSlot::new()).collect(),
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&ClientSlot> {
        self.slots.get(index)
    }

    /// Reserve the first free slot, or `None` when all are occupied.
    pub fn allocate(&self) -> Option<Lease> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let mut inner = slot.lock();
            if inner.phase != SlotPhase::Free {
                return None;
            }
            inner.phase = SlotPhase::Connecting;
            inner.generation = inner.generation.wrapping_add(1);
            inner.running = false;
            slot.smeter_enabled.store(false, Ordering::Relaxed);
            Some(Lease {
                index,
                generation: inner.generation,
            })
        })
    }

    /// Mark a reserved slot as open and hand out its shutdown signal.
    ///
    /// Returns `None` if the lease was released in the meantime.
    pub fn open(&self, lease: Lease, peer: SocketAddr) -> Option<watch::Receiver<bool>> {
        let slot = self.slots.get(lease.index)?;
        let mut inner = slot.lock();
        if !inner.holds(lease) || inner.phase != SlotPhase::Connecting {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        inner.phase = SlotPhase::Open;
        inner.running = true;
        inner.peer = Some(peer);
        inner.shutdown = Some(tx);
        Some(rx)
    }

    /// Store the reporter timer so release can cancel it.
    pub fn set_reporter(&self, lease: Lease, handle: JoinHandle<()>) {
        let Some(slot) = self.slots.get(lease.index) else {
            handle.abort();
            return;
        };
        let mut inner = slot.lock();
        if inner.holds(lease) && inner.running {
            if let Some(old) = inner.reporter.replace(handle) {
                old.abort();
            }
        } else {
            handle.abort();
        }
    }

    pub fn is_running(&self, lease: Lease) -> bool {
        self.slots
            .get(lease.index)
            .is_some_and(|slot| {
                let inner = slot.lock();
                inner.holds(lease) && inner.running
            })
    }

    pub fn smeter_enabled(&self, lease: Lease) -> bool {
        self.slots
            .get(lease.index)
            .is_some_and(|slot| slot.smeter_enabled.load(Ordering::Relaxed))
    }

    pub fn peer(&self, lease: Lease) -> Option<SocketAddr> {
        let inner = self.slots.get(lease.index)?.lock();
        if inner.holds(lease) {
            inner.peer
        } else {
            None
        }
    }

    /// Abortive release; see [`ClientRegistry::release_with`].
    pub fn release(&self, lease: Lease) -> bool {
        self.release_with(lease, Teardown::Abortive)
    }

    /// Tear down the client holding `lease` and free its slot.
    ///
    /// Stops the connection worker, cancels the reporter timer and tells
    /// the event loop to drop the write half. Returns `false` when the
    /// lease is stale or was already released.
    pub fn release_with(&self, lease: Lease, teardown: Teardown) -> bool {
        let Some(slot) = self.slots.get(lease.index) else {
            return false;
        };

        let mut inner = slot.lock();
        if !inner.holds(lease) {
            return false;
        }
        let was_open = inner.phase == SlotPhase::Open;
        inner.phase = SlotPhase::Free;
        inner.running = false;
        let peer = inner.peer.take();
        let shutdown = inner.shutdown.take();
        let reporter = inner.reporter.take();
        slot.smeter_enabled.store(false, Ordering::Relaxed);
        // Queued while locked so the detach precedes any attach for the
        // next lease on this index.
        if was_open {
            self.events.detach(lease, teardown);
        }
        drop(inner);

        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }
        if let Some(handle) = reporter {
            handle.abort();
        }

        match peer {
            Some(peer) => info!("TCI client {} ({}) released", lease, peer),
            None => debug!("TCI slot {} released before upgrade", lease),
        }
        true
    }

    /// Leases of every slot currently open.
    pub fn open_leases(&self) -> Vec<Lease> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let inner = slot.lock();
                (inner.phase == SlotPhase::Open).then_some(Lease {
                    index,
                    generation: inner.generation,
                })
            })
            .collect()
    }

    /// Release every occupied slot.
    pub fn release_all(&self) -> usize {
        let leases: Vec<Lease> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let inner = slot.lock();
                (inner.phase != SlotPhase::Free).then_some(Lease {
                    index,
                    generation: inner.generation,
                })
            })
            .collect();
        leases
            .into_iter()
            .filter(|lease| self.release(*lease))
            .count()
    }

    pub fn open_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.phase() == SlotPhase::Open)
            .count()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.phase() != SlotPhase::Free)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::LoopTask;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn registry(capacity: usize) -> (ClientRegistry, mpsc::UnboundedReceiver<LoopTask>) {
        let (events, rx) = EventLoopHandle::channel();
        (ClientRegistry::new(capacity, events), rx)
    }

    fn count_detaches(rx: &mut mpsc::UnboundedReceiver<LoopTask>) -> usize {
        let mut count = 0;
        while let Ok(task) = rx.try_recv() {
            if matches!(task, LoopTask::Detach { .. }) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_allocate_until_full() {
        let (registry, _rx) = registry(3);
        let leases: Vec<Lease> = (0..3).map(|_| registry.allocate().unwrap()).collect();
        assert_eq!(
            leases.iter().map(Lease::index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(registry.allocate().is_none());
        assert_eq!(registry.occupied_count(), 3);
        assert_eq!(registry.open_count(), 0);

        assert!(registry.release(leases[1]));
        assert_eq!(registry.allocate().unwrap().index(), 1);
    }

    #[test]
    fn test_open_and_running() {
        let (registry, _rx) = registry(3);
        let lease = registry.allocate().unwrap();
        assert!(!registry.is_running(lease));

        let shutdown = registry.open(lease, peer()).unwrap();
        assert!(registry.is_running(lease));
        assert_eq!(registry.peer(lease), Some(peer()));
        assert!(!*shutdown.borrow());
        assert!(registry.open(lease, peer()).is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (registry, mut rx) = registry(3);
        let lease = registry.allocate().unwrap();
        let shutdown = registry.open(lease, peer()).unwrap();

        assert!(registry.release(lease));
        assert!(!registry.release(lease));
        assert!(!registry.is_running(lease));
        assert!(*shutdown.borrow());
        assert_eq!(count_detaches(&mut rx), 1);
        assert_eq!(registry.slot(0).unwrap().phase(), SlotPhase::Free);
    }

    #[test]
    fn test_stale_lease_cannot_release_new_client() {
        let (registry, _rx) = registry(1);
        let old = registry.allocate().unwrap();
        registry.open(old, peer()).unwrap();
        assert!(registry.release(old));

        let new = registry.allocate().unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        registry.open(new, peer()).unwrap();

        assert!(!registry.release(old));
        assert!(registry.is_running(new));
    }

    #[test]
    fn test_concurrent_release_has_one_winner() {
        let (registry, mut rx) = registry(3);
        let lease = registry.allocate().unwrap();
        registry.open(lease, peer()).unwrap();

        let wins = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if registry.release(lease) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(count_detaches(&mut rx), 1);
    }

    #[test]
    fn test_release_all() {
        let (registry, _rx) = registry(3);
        let a = registry.allocate().unwrap();
        registry.open(a, peer()).unwrap();
        let _reserved = registry.allocate().unwrap();

        assert_eq!(registry.open_leases(), vec![a]);
        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.occupied_count(), 0);
    }

    #[test]
    fn test_smeter_flag_resets_on_allocate() {
        let (registry, _rx) = registry(1);
        let lease = registry.allocate().unwrap();
        registry.open(lease, peer()).unwrap();
        registry
            .slot(lease.index())
            .unwrap()
            .smeter_enabled()
            .store(true, Ordering::Relaxed);
        assert!(registry.smeter_enabled(lease));

        registry.release(lease);
        let lease = registry.allocate().unwrap();
        assert!(!registry.smeter_enabled(lease));
    }

    #[tokio::test]
    async fn test_release_aborts_reporter() {
        let (registry, _rx) = registry(1);
        let registry = Arc::new(registry);
        let lease = registry.allocate().unwrap();
        registry.open(lease, peer()).unwrap();

        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let timer = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        registry.set_reporter(lease, timer);
        registry.release(lease);
        assert!(alive_rx.await.is_err());
    }
}
