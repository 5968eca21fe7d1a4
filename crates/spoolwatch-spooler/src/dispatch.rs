// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event dispatch.
//
// Watcher tasks never call subscribers.  They send typed events over one
// channel to a dispatcher task, which fans out to per-subscriber bounded
// queues.  A subscriber that stops draining its queue loses events, with a
// warning, rather than stalling notification processing for any printer.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use spoolwatch_core::types::JobEvent;

/// Identity of one event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What flows from watcher tasks into the dispatcher.
pub(crate) enum DispatchMessage {
    Event(JobEvent),
    /// Acknowledged once every previously sent event has been fanned out.
    Flush(oneshot::Sender<()>),
}

pub(crate) struct SubscriberSlot {
    pub(crate) id: SubscriptionId,
    pub(crate) tx: mpsc::Sender<JobEvent>,
}

pub(crate) type SubscriberList = Arc<Mutex<Vec<SubscriberSlot>>>;

/// A registered event consumer.
///
/// Dropping the subscription prunes it from the dispatcher on the next
/// delivered event.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<JobEvent>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, rx: mpsc::Receiver<JobEvent>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event.  Returns `None` once the engine has shut
    /// down and the queue is drained.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }
}

/// Spawn the fan-out task.
pub(crate) fn spawn_dispatcher(
    mut rx: mpsc::Receiver<DispatchMessage>,
    subscribers: SubscriberList,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                DispatchMessage::Event(event) => {
                    let mut slots = subscribers.lock().expect("subscriber list lock poisoned");
                    slots.retain(|slot| match slot.tx.try_send(event.clone()) {
                        Ok(()) => true,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(
                                subscriber = %slot.id,
                                printer = %event.printer,
                                "subscriber queue full, dropping event"
                            );
                            true
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            debug!(subscriber = %slot.id, "subscriber gone, pruning");
                            false
                        }
                    });
                }
                DispatchMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!("event dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spoolwatch_core::types::{JobEventKind, JobId, JobStatus, PrintJob};

    fn event(id: u32) -> JobEvent {
        JobEvent {
            printer: "Front Desk".into(),
            job: PrintJob {
                id: JobId(id),
                printer_name: "Front Desk".into(),
                user_name: "devon".into(),
                document_name: "memo.txt".into(),
                status: JobStatus::SPOOLING,
                position: 1,
                pages_printed: 0,
                total_pages: 1,
                size_bytes: 64,
                bytes_printed: 0,
                submitted_at: Utc::now(),
            },
            kind: JobEventKind::Added,
            at: Utc::now(),
        }
    }

    async fn flush(tx: &mpsc::Sender<DispatchMessage>) {
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(DispatchMessage::Flush(ack_tx)).await.expect("send flush");
        ack_rx.await.expect("flush ack");
    }

    #[tokio::test]
    async fn events_reach_every_subscriber() {
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = spawn_dispatcher(rx, Arc::clone(&subscribers));

        let mut subs = Vec::new();
        for _ in 0..2 {
            let (sub_tx, sub_rx) = mpsc::channel(8);
            let id = SubscriptionId::new();
            subscribers
                .lock()
                .expect("lock")
                .push(SubscriberSlot { id, tx: sub_tx });
            subs.push(Subscription::new(id, sub_rx));
        }

        tx.send(DispatchMessage::Event(event(1))).await.expect("send");
        flush(&tx).await;

        for sub in &mut subs {
            let got = sub.try_recv().expect("event delivered");
            assert_eq!(got.job.id, JobId(1));
        }

        drop(tx);
        dispatcher.await.expect("dispatcher exits");
    }

    #[tokio::test]
    async fn slow_subscriber_loses_events_without_stalling() {
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(16);
        let _dispatcher = spawn_dispatcher(rx, Arc::clone(&subscribers));

        let (sub_tx, sub_rx) = mpsc::channel(1);
        let id = SubscriptionId::new();
        subscribers
            .lock()
            .expect("lock")
            .push(SubscriberSlot { id, tx: sub_tx });
        let mut sub = Subscription::new(id, sub_rx);

        // Queue depth is 1: the second event is dropped, not queued.
        tx.send(DispatchMessage::Event(event(1))).await.expect("send");
        tx.send(DispatchMessage::Event(event(2))).await.expect("send");
        flush(&tx).await;

        assert_eq!(sub.try_recv().expect("first event").job.id, JobId(1));
        assert!(sub.try_recv().is_none());
        // The slot survives to receive later events.
        tx.send(DispatchMessage::Event(event(3))).await.expect("send");
        flush(&tx).await;
        assert_eq!(sub.try_recv().expect("third event").job.id, JobId(3));
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(16);
        let _dispatcher = spawn_dispatcher(rx, Arc::clone(&subscribers));

        let (sub_tx, sub_rx) = mpsc::channel(4);
        subscribers.lock().expect("lock").push(SubscriberSlot {
            id: SubscriptionId::new(),
            tx: sub_tx,
        });
        drop(sub_rx);

        tx.send(DispatchMessage::Event(event(1))).await.expect("send");
        flush(&tx).await;

        assert!(subscribers.lock().expect("lock").is_empty());
    }
}
