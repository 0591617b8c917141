//! Desired-property change notifier.
//!
//! Tracks a two-state subscription (unsubscribed or subscribed) over
//! the transport's desired-update stream. While subscribed, every
//! update the hub accepts is delivered exactly once, in acceptance
//! order, through a [`DesiredStream`]. Subscribing is not retroactive;
//! updates accepted before the subscription completed are only visible
//! through a full twin fetch.

use crate::error::{TwinError, TwinResult};
use crate::transport::TwinTransport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;
use twinlink_protocol::PropertyPatch;

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No desired-update delivery; updates still mutate the hub twin.
    Unsubscribed,
    /// Updates are delivered through the active stream.
    Subscribed,
}

/// One delivered desired-property update.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredEvent {
    /// The accepted patch, as submitted to the hub.
    pub patch: PropertyPatch,
    /// Desired-section version after the hub merged the patch.
    pub version: u64,
    /// Caller context supplied at subscribe time.
    pub context: Option<String>,
}

/// Consumer handle for desired-property events.
///
/// Becomes closed when the subscription ends; events that were queued
/// but not yet received at that point are discarded, not delivered.
pub struct DesiredStream {
    rx: Receiver<DesiredEvent>,
    live: Arc<AtomicBool>,
}

impl DesiredStream {
    fn closed_check(&self) -> TwinResult<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TwinError::SubscriptionClosed)
        }
    }

    /// Blocks until the next event arrives.
    pub fn recv(&self) -> TwinResult<DesiredEvent> {
        self.closed_check()?;
        let event = self
            .rx
            .recv()
            .map_err(|_| TwinError::SubscriptionClosed)?;
        self.closed_check()?;
        Ok(event)
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> TwinResult<DesiredEvent> {
        self.closed_check()?;
        let event = self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TwinError::Timeout,
            RecvTimeoutError::Disconnected => TwinError::SubscriptionClosed,
        })?;
        self.closed_check()?;
        Ok(event)
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&self) -> TwinResult<Option<DesiredEvent>> {
        self.closed_check()?;
        match self.rx.try_recv() {
            Ok(event) => {
                self.closed_check()?;
                Ok(Some(event))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TwinError::SubscriptionClosed),
        }
    }
}

struct ActiveSubscription {
    live: Arc<AtomicBool>,
}

/// Manages the desired-update subscription for one device.
pub struct DesiredPropertyNotifier<T: TwinTransport> {
    transport: Arc<T>,
    device_id: String,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSubscription>>,
}

impl<T: TwinTransport + 'static> DesiredPropertyNotifier<T> {
    /// Creates a notifier in the unsubscribed state.
    pub fn new(transport: Arc<T>, device_id: impl Into<String>) -> Self {
        Self {
            transport,
            device_id: device_id.into(),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Current subscription state.
    pub fn state(&self) -> SubscriptionState {
        if self.active.lock().is_some() {
            SubscriptionState::Subscribed
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    /// Opens a subscription and returns its event stream.
    ///
    /// An existing subscription is replaced; its stream reports closed
    /// from that point on. The `context` string is echoed back in
    /// every event delivered through the returned stream.
    pub fn subscribe(&self, context: Option<String>) -> TwinResult<DesiredStream> {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            previous.live.store(false, Ordering::Release);
            self.transport.close_desired_stream()?;
        }

        let raw = self.transport.open_desired_stream(&self.device_id)?;
        let my_generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let live = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let generation = Arc::clone(&self.generation);
        thread::spawn(move || {
            for update in raw {
                if generation.load(Ordering::Acquire) != my_generation {
                    break;
                }
                let event = DesiredEvent {
                    patch: update.patch,
                    version: update.version,
                    context: context.clone(),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        debug!(device_id = %self.device_id, "desired subscription opened");
        *active = Some(ActiveSubscription {
            live: Arc::clone(&live),
        });
        Ok(DesiredStream { rx, live })
    }

    /// Ends the active subscription.
    ///
    /// After this returns, no further event is observable through the
    /// stream, including events that were already queued. Fails with
    /// [`TwinError::NotSubscribed`] when no subscription is active.
    pub fn unsubscribe(&self) -> TwinResult<()> {
        let mut active = self.active.lock();
        let subscription = active.take().ok_or(TwinError::NotSubscribed)?;

        // Order matters: cut off delivery before touching the
        // transport, so a concurrently arriving update cannot slip
        // through while the stream tears down.
        self.generation.fetch_add(1, Ordering::AcqRel);
        subscription.live.store(false, Ordering::Release);
        self.transport.close_desired_stream()?;

        debug!(device_id = %self.device_id, "desired subscription closed");
        Ok(())
    }
}
