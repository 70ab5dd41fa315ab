//! # In-Memory Network
//!
//! Multi-endpoint [`Dialer`] implementation for the devnet and tests.
//!
//! Sent messages are queued; [`InMemoryNetwork::flush`] delivers until the
//! queue drains (handlers may enqueue more while it runs). The network can
//! shuffle delivery order with a seeded RNG, deliver duplicates and
//! partition endpoints, which is how ordering and loss tolerance are tested
//! without sockets.

use crate::dialer::{Dialer, DialerError, MessageHandler};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::TransportId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::{debug, trace};

/// Safety valve against handlers that answer every message forever.
const MAX_DELIVERIES_PER_FLUSH: usize = 1_000_000;

#[derive(Debug, Clone)]
struct Envelope {
    channel: String,
    payload: String,
    from: TransportId,
    to: TransportId,
    duplicate: bool,
}

#[derive(Default)]
struct DeliveryPolicy {
    rng: Option<StdRng>,
    duplicate_probability: f64,
}

type Handlers = HashMap<String, Vec<Arc<dyn MessageHandler>>>;

#[derive(Default)]
struct NetworkInner {
    endpoints: RwLock<HashMap<TransportId, Handlers>>,
    queue: Mutex<VecDeque<Envelope>>,
    policy: Mutex<DeliveryPolicy>,
    partitioned: RwLock<HashSet<TransportId>>,
    notify: Notify,
    sent: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Envelopes queued (one per receiver).
    pub sent: u64,
    /// Envelopes handed to handlers.
    pub delivered: u64,
    /// Envelopes dropped by a partition or a missing subscription.
    pub dropped: u64,
}

/// Shared in-process network. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl InMemoryNetwork {
    /// FIFO network without duplicates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reattach to) the endpoint `id`.
    pub fn dialer(&self, id: impl Into<TransportId>) -> InMemoryDialer {
        let id = id.into();
        self.inner.endpoints.write().entry(id.clone()).or_default();
        InMemoryDialer {
            id,
            network: self.clone(),
        }
    }

    /// Deliver in a pseudo-random order derived from `seed`.
    pub fn shuffle_delivery(&self, seed: u64) {
        self.inner.policy.lock().rng = Some(StdRng::seed_from_u64(seed));
    }

    /// Deliver each envelope a second time with `probability`. Requires
    /// [`shuffle_delivery`](Self::shuffle_delivery) for the RNG.
    pub fn duplicate_delivery(&self, probability: f64) {
        self.inner.policy.lock().duplicate_probability = probability.clamp(0.0, 1.0);
    }

    /// Drop everything sent to or from `id` until healed.
    pub fn partition(&self, id: &TransportId) {
        self.inner.partitioned.write().insert(id.clone());
    }

    /// Reconnect a partitioned endpoint.
    pub fn heal(&self, id: &TransportId) {
        self.inner.partitioned.write().remove(id);
    }

    /// Envelopes waiting for delivery.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Delivery counters.
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            sent: self.inner.sent.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    /// Deliver queued envelopes until none remain. Returns the number
    /// delivered.
    pub async fn flush(&self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DELIVERIES_PER_FLUSH {
            let Some(envelope) = self.next_envelope() else {
                break;
            };
            if self.deliver(envelope).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Background delivery loop for the devnet runtime.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.inner.notify.notified() => {
                    self.flush().await;
                }
                _ = shutdown.changed() => {
                    debug!("[bus] in-memory network stopped");
                    break;
                }
            }
        }
    }

    fn next_envelope(&self) -> Option<Envelope> {
        let mut queue = self.inner.queue.lock();
        let mut policy = self.inner.policy.lock();
        let duplicate_probability = policy.duplicate_probability;

        let envelope = match policy.rng.as_mut() {
            Some(rng) if !queue.is_empty() => {
                let index = rng.gen_range(0..queue.len());
                let envelope = queue.swap_remove_back(index)?;
                if !envelope.duplicate
                    && duplicate_probability > 0.0
                    && rng.gen_bool(duplicate_probability)
                {
                    let mut copy = envelope.clone();
                    copy.duplicate = true;
                    queue.push_back(copy);
                }
                envelope
            }
            _ => queue.pop_front()?,
        };
        Some(envelope)
    }

    async fn deliver(&self, envelope: Envelope) -> bool {
        {
            let partitioned = self.inner.partitioned.read();
            if partitioned.contains(&envelope.from) || partitioned.contains(&envelope.to) {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(from = %envelope.from, to = %envelope.to, "[bus] dropped by partition");
                return false;
            }
        }

        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .inner
            .endpoints
            .read()
            .get(&envelope.to)
            .and_then(|channels| channels.get(&envelope.channel))
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        for handler in handlers {
            handler
                .handle(envelope.payload.clone(), &envelope.channel, envelope.from.clone())
                .await;
        }
        self.inner.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn enqueue(&self, envelopes: Vec<Envelope>) {
        let count = envelopes.len() as u64;
        self.inner.queue.lock().extend(envelopes);
        self.inner.sent.fetch_add(count, Ordering::Relaxed);
        self.inner.notify.notify_one();
    }
}

/// One endpoint on an [`InMemoryNetwork`].
#[derive(Clone)]
pub struct InMemoryDialer {
    id: TransportId,
    network: InMemoryNetwork,
}

impl InMemoryDialer {
    /// The network this endpoint is attached to.
    pub fn network(&self) -> &InMemoryNetwork {
        &self.network
    }
}

#[async_trait]
impl Dialer for InMemoryDialer {
    fn local_id(&self) -> &TransportId {
        &self.id
    }

    fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>) {
        self.network
            .inner
            .endpoints
            .write()
            .entry(self.id.clone())
            .or_default()
            .entry(channel.to_string())
            .or_default()
            .push(handler);
    }

    async fn send_message(
        &self,
        channel: &str,
        payload: String,
        receiver: Option<&TransportId>,
    ) -> Result<(), DialerError> {
        let receivers: Vec<TransportId> = {
            let endpoints = self.network.inner.endpoints.read();
            match receiver {
                Some(to) if endpoints.contains_key(to) => vec![to.clone()],
                Some(to) => return Err(DialerError::UnknownReceiver(to.clone())),
                None => endpoints
                    .keys()
                    .filter(|id| **id != self.id)
                    .cloned()
                    .collect(),
            }
        };

        let envelopes = receivers
            .into_iter()
            .map(|to| Envelope {
                channel: channel.to_string(),
                payload: payload.clone(),
                from: self.id.clone(),
                to,
                duplicate: false,
            })
            .collect();
        self.network.enqueue(envelopes);
        Ok(())
    }
}
