// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The queue watcher.
//
// One background task per watched printer blocks on the printer's native
// change notification.  On wake it re-enumerates the queue, diffs against
// the retained snapshot, pushes the resulting events to the dispatcher, and
// replaces the snapshot wholesale.  The OS may coalesce several queue
// changes into a single wake; diffing full state against full state makes
// that harmless.
//
// Cancellation is cooperative: a stop flag checked at the top of every
// iteration, a `Notify` raced against the blocking wait, and `cancel_wait`
// to wake an in-flight native wait.  A handle-level failure terminates only
// that printer's loop and is reported once on the failure channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use spoolwatch_core::config::WatchConfig;
use spoolwatch_core::error::{Result, SpoolError};
use spoolwatch_core::types::{AccessRights, JobEvent, PrintJob, WatchFailure};

use crate::diff::{diff, Snapshot};
use crate::dispatch::{
    spawn_dispatcher, DispatchMessage, SubscriberList, SubscriberSlot, Subscription,
    SubscriptionId,
};
use crate::native::{
    os_error, ChangeFilter, ChangeWake, NativeSpooler, NotifyToken, PrinterToken, Selector,
};
use crate::protocol::enumerate;

/// Lifecycle of one printer's watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Closed,
    Opening,
    Watching,
    Closing,
}

struct PrinterWatch {
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
    notify_token: NotifyToken,
    state: Arc<Mutex<WatchState>>,
    handle: JoinHandle<()>,
}

type WatchMap = Arc<Mutex<HashMap<String, PrinterWatch>>>;

/// Watches printer queues and raises typed job-change events.
///
/// `add_printer` starts one watch loop per printer; events from every loop
/// are merged through a single dispatcher and fan out to [`Subscription`]s.
/// Call [`shutdown`](Self::shutdown) to stop every loop and the dispatcher.
pub struct QueueWatcher {
    native: Arc<dyn NativeSpooler>,
    config: WatchConfig,
    watches: WatchMap,
    subscribers: SubscriberList,
    events_tx: mpsc::Sender<DispatchMessage>,
    dispatcher: Option<JoinHandle<()>>,
    failures_tx: mpsc::Sender<WatchFailure>,
    failures_rx: Option<mpsc::Receiver<WatchFailure>>,
}

impl QueueWatcher {
    pub fn new(native: Arc<dyn NativeSpooler>) -> Self {
        Self::with_config(native, WatchConfig::default())
    }

    pub fn with_config(native: Arc<dyn NativeSpooler>, config: WatchConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = spawn_dispatcher(events_rx, Arc::clone(&subscribers));
        let (failures_tx, failures_rx) = mpsc::channel(config.error_channel_capacity);
        Self {
            native,
            config,
            watches: Arc::new(Mutex::new(HashMap::new())),
            subscribers,
            events_tx,
            dispatcher: Some(dispatcher),
            failures_tx,
            failures_rx: Some(failures_rx),
        }
    }

    /// Register an event consumer.  Events from every watched printer are
    /// delivered; a subscriber that falls behind its queue depth loses
    /// events rather than blocking the watch loops.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.subscriber_queue_capacity);
        let id = SubscriptionId::new();
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push(SubscriberSlot { id, tx });
        debug!(subscriber = %id, "event subscription registered");
        Subscription::new(id, rx)
    }

    /// Remove a subscription by id.  Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slots = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned");
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }

    /// Take the watch-failure channel.  Each printer whose loop dies from a
    /// handle-level failure is reported here exactly once.  Can be taken
    /// only once.
    pub fn failures(&mut self) -> Option<mpsc::Receiver<WatchFailure>> {
        self.failures_rx.take()
    }

    /// Start watching a printer with the configured default rights.
    pub async fn add_printer(&self, name: &str) -> Result<()> {
        self.add_printer_with_rights(name, self.config.default_access_rights)
            .await
    }

    /// Start watching a printer.
    ///
    /// Opens a handle validating `rights` (insufficient rights fail
    /// synchronously and no watch loop starts), then registers a
    /// job-scoped change notification, seeds the snapshot from a first
    /// enumeration, and spawns the wait loop.
    #[instrument(skip(self))]
    pub async fn add_printer_with_rights(&self, name: &str, rights: AccessRights) -> Result<()> {
        {
            let watches = self.watches.lock().expect("watch map lock poisoned");
            if watches.contains_key(name) {
                return Err(SpoolError::ArgumentInvalid(format!(
                    "printer `{name}` is already watched"
                )));
            }
        }

        let state = Arc::new(Mutex::new(WatchState::Opening));
        let token = self.native.open(name, rights)?;
        let notify_token = match self
            .native
            .register_change_notification(token, ChangeFilter::JOBS)
        {
            Ok(notify) => notify,
            Err(err) => {
                self.native.close(token);
                return Err(err);
            }
        };

        // Jobs already queued when the watch begins form the baseline; they
        // do not replay as Added events.
        let initial = match enumerate::<PrintJob>(self.native.as_ref(), Selector::Jobs(token)) {
            Ok(listing) => Snapshot::from_jobs(listing),
            Err(err) => {
                self.native.close_change_notification(notify_token);
                self.native.close(token);
                return Err(err);
            }
        };

        let shutdown = Arc::new(Notify::new());
        let stopping = Arc::new(AtomicBool::new(false));
        let watch_loop = WatchLoop {
            native: Arc::clone(&self.native),
            printer: name.to_owned(),
            token,
            notify: notify_token,
            shutdown: Arc::clone(&shutdown),
            stopping: Arc::clone(&stopping),
            events: self.events_tx.clone(),
            failures: self.failures_tx.clone(),
            state: Arc::clone(&state),
            watches: Arc::clone(&self.watches),
            previous: initial,
        };
        let handle = tokio::spawn(watch_loop.run());

        self.watches
            .lock()
            .expect("watch map lock poisoned")
            .insert(
                name.to_owned(),
                PrinterWatch {
                    shutdown,
                    stopping,
                    notify_token,
                    state,
                    handle,
                },
            );
        info!(printer = name, "queue watch started");
        Ok(())
    }

    /// Stop watching a printer.
    ///
    /// Signals the loop, wakes its in-flight native wait, and awaits its
    /// exit before returning; the handle and notification object are
    /// released by the exiting loop.  After this returns no further event
    /// for the printer is delivered, though events already queued to a
    /// subscriber remain readable.  Returns `false` when the printer was
    /// not being watched.
    #[instrument(skip(self))]
    pub async fn remove_printer(&self, name: &str) -> bool {
        let watch = {
            self.watches
                .lock()
                .expect("watch map lock poisoned")
                .remove(name)
        };
        let Some(watch) = watch else {
            debug!(printer = name, "remove requested for unwatched printer");
            return false;
        };

        watch.stopping.store(true, Ordering::SeqCst);
        watch.shutdown.notify_one();
        self.native.cancel_wait(watch.notify_token);
        if let Err(err) = watch.handle.await {
            error!(printer = name, error = %err, "watch loop task failed during removal");
        }

        // Drain the dispatcher so everything the loop sent before exiting
        // has been fanned out to subscriber queues.
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .events_tx
            .send(DispatchMessage::Flush(ack_tx))
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }

        info!(printer = name, "queue watch removed");
        true
    }

    /// Current lifecycle state of a printer's watch, if it is registered.
    pub fn watch_state(&self, name: &str) -> Option<WatchState> {
        self.watches
            .lock()
            .expect("watch map lock poisoned")
            .get(name)
            .map(|watch| *watch.state.lock().expect("watch state lock poisoned"))
    }

    /// Names of the printers currently being watched.
    pub fn watched_printers(&self) -> Vec<String> {
        self.watches
            .lock()
            .expect("watch map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Stop every watch loop and the dispatcher, awaiting each exit.
    pub async fn shutdown(mut self) {
        let names = self.watched_printers();
        for name in names {
            self.remove_printer(&name).await;
        }
        let dispatcher = self.dispatcher.take();
        // Dropping the watcher drops the last event sender, which lets the
        // dispatcher drain and exit.
        drop(self);
        if let Some(dispatcher) = dispatcher {
            let _ = dispatcher.await;
        }
    }
}

/// The per-printer wait loop and everything it owns.
struct WatchLoop {
    native: Arc<dyn NativeSpooler>,
    printer: String,
    token: PrinterToken,
    notify: NotifyToken,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
    events: mpsc::Sender<DispatchMessage>,
    failures: mpsc::Sender<WatchFailure>,
    state: Arc<Mutex<WatchState>>,
    watches: WatchMap,
    /// The retained snapshot, owned exclusively by this task and replaced
    /// wholesale after each diff cycle.
    previous: Snapshot,
}

impl WatchLoop {
    async fn run(mut self) {
        self.set_state(WatchState::Watching);

        loop {
            // No new wait cycle once cancellation has been requested.
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }

            let mut wait = {
                let native = Arc::clone(&self.native);
                let notify = self.notify;
                tokio::task::spawn_blocking(move || native.wait_for_change(notify))
            };

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.native.cancel_wait(self.notify);
                    let _ = (&mut wait).await;
                    break;
                }
                woken = &mut wait => match woken {
                    Ok(Ok(ChangeWake::Changed)) => {
                        if !self.run_cycle().await {
                            break;
                        }
                    }
                    Ok(Ok(ChangeWake::Cancelled)) => break,
                    Ok(Err(err)) => {
                        self.fail(err);
                        break;
                    }
                    Err(join_err) => {
                        error!(
                            printer = %self.printer,
                            error = %join_err,
                            "notification wait task failed"
                        );
                        self.fail(SpoolError::NativeCallFailure {
                            operation: "WaitForChange",
                            os_error: 0,
                        });
                        break;
                    }
                }
            }
        }

        self.set_state(WatchState::Closing);
        self.native.close_change_notification(self.notify);
        self.native.close(self.token);
        self.set_state(WatchState::Closed);
        debug!(printer = %self.printer, "watch loop exited");
    }

    /// One diff cycle: re-enumerate, diff, emit, replace the snapshot.
    /// Returns `false` when the loop must terminate.
    async fn run_cycle(&mut self) -> bool {
        let listing = match enumerate::<PrintJob>(self.native.as_ref(), Selector::Jobs(self.token))
        {
            Ok(listing) => listing,
            Err(
                err @ SpoolError::NativeCallFailure {
                    os_error: os_error::INVALID_HANDLE,
                    ..
                },
            ) => {
                // The printer went away underneath us.
                self.fail(err);
                return false;
            }
            Err(err) => {
                // Transient: keep the stale snapshot and re-diff on the
                // next wake.
                warn!(
                    printer = %self.printer,
                    error = %err,
                    "enumeration failed, retrying on next wake"
                );
                return true;
            }
        };

        let current = Snapshot::from_jobs(listing);
        let changes = diff(&self.previous, &current);
        let at = Utc::now();
        debug!(
            printer = %self.printer,
            jobs = current.len(),
            changes = changes.len(),
            "diff cycle complete"
        );

        for change in changes {
            let event = JobEvent {
                printer: self.printer.clone(),
                job: change.job,
                kind: change.kind,
                at,
            };
            if self
                .events
                .send(DispatchMessage::Event(event))
                .await
                .is_err()
            {
                // Dispatcher gone: the engine is shutting down.
                debug!(printer = %self.printer, "event channel closed, stopping loop");
                return false;
            }
        }

        self.previous = current;
        true
    }

    /// Report a terminal failure once and leave the watch set.
    fn fail(&self, err: SpoolError) {
        warn!(printer = %self.printer, error = %err, "watch loop terminating");
        self.watches
            .lock()
            .expect("watch map lock poisoned")
            .remove(&self.printer);
        let failure = WatchFailure {
            printer: self.printer.clone(),
            error: err,
        };
        if self.failures.try_send(failure).is_err() {
            warn!(
                printer = %self.printer,
                "failure channel full or closed, report dropped"
            );
        }
    }

    fn set_state(&self, state: WatchState) {
        *self.state.lock().expect("watch state lock poisoned") = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSpooler;

    fn watcher_over(grantable: AccessRights) -> (Arc<StubSpooler>, QueueWatcher) {
        let stub = Arc::new(StubSpooler::new());
        stub.register_printer("Front Desk", grantable);
        let watcher = QueueWatcher::new(Arc::clone(&stub) as Arc<dyn NativeSpooler>);
        (stub, watcher)
    }

    #[tokio::test]
    async fn insufficient_rights_starts_no_loop() {
        let (_stub, watcher) = watcher_over(AccessRights::USE);

        let err = watcher
            .add_printer_with_rights("Front Desk", AccessRights::ADMINISTER)
            .await
            .unwrap_err();
        assert!(matches!(err, SpoolError::InsufficientAccessRights { .. }));
        assert!(watcher.watched_printers().is_empty());
        // Removing a printer that never started watching is a no-op.
        assert!(!watcher.remove_printer("Front Desk").await);
    }

    #[tokio::test]
    async fn unknown_printer_is_invalid_argument() {
        let (_stub, watcher) = watcher_over(AccessRights::USE);
        let err = watcher.add_printer("Copy Room").await.unwrap_err();
        assert!(matches!(err, SpoolError::ArgumentInvalid(_)));
    }

    #[tokio::test]
    async fn watching_twice_is_rejected() {
        let (_stub, watcher) = watcher_over(AccessRights::USE);
        watcher.add_printer("Front Desk").await.expect("first add");

        let err = watcher.add_printer("Front Desk").await.unwrap_err();
        assert!(matches!(err, SpoolError::ArgumentInvalid(_)));

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn watch_state_reaches_watching_and_remove_clears_it() {
        let (_stub, watcher) = watcher_over(AccessRights::USE);
        watcher.add_printer("Front Desk").await.expect("add");

        // The loop task sets Watching as it starts; yield until it has.
        for _ in 0..100 {
            if watcher.watch_state("Front Desk") == Some(WatchState::Watching) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(watcher.watch_state("Front Desk"), Some(WatchState::Watching));

        assert!(watcher.remove_printer("Front Desk").await);
        assert_eq!(watcher.watch_state("Front Desk"), None);
        assert!(!watcher.remove_printer("Front Desk").await);

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_slot() {
        let (_stub, watcher) = watcher_over(AccessRights::USE);
        let sub = watcher.subscribe();
        let id = sub.id();
        assert!(watcher.unsubscribe(id));
        assert!(!watcher.unsubscribe(id));
    }
}
