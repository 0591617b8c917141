//! Device session facade.
//!
//! Ties the transport, twin cache, reported publisher, and desired
//! notifier together behind one handle per device connection.

use crate::config::ClientConfig;
use crate::error::{TwinError, TwinResult};
use crate::notifier::{DesiredPropertyNotifier, DesiredStream, SubscriptionState};
use crate::reported::ReportedPropertyPublisher;
use crate::store::TwinStore;
use crate::transport::TwinTransport;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;
use twinlink_protocol::{ConnectRequest, PropertyPatch, PropertySet, Twin};

/// Counters and status for one device session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Full twins fetched from the hub.
    pub twins_fetched: u64,
    /// Reported patches the hub accepted.
    pub patches_sent: u64,
    /// Reported patches that failed validation or were rejected.
    pub patches_rejected: u64,
    /// Most recent error, if any.
    pub last_error: Option<String>,
}

/// One device's twin session against the hub.
pub struct DeviceSession<T: TwinTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    store: TwinStore,
    publisher: ReportedPropertyPublisher<T>,
    notifier: DesiredPropertyNotifier<T>,
    stats: RwLock<SessionStats>,
}

impl<T: TwinTransport + 'static> DeviceSession<T> {
    /// Creates a session over a transport. Call [`DeviceSession::connect`]
    /// before issuing twin operations.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let transport = Arc::new(transport);
        let publisher = ReportedPropertyPublisher::new(Arc::clone(&transport), &config.device_id);
        let notifier = DesiredPropertyNotifier::new(Arc::clone(&transport), &config.device_id);
        Self {
            config,
            transport,
            store: TwinStore::new(),
            publisher,
            notifier,
            stats: RwLock::new(SessionStats::default()),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Establishes the session with the hub.
    pub fn connect(&self) -> TwinResult<()> {
        let request = ConnectRequest {
            device_id: self.config.device_id.clone(),
            protocol_version: self.config.protocol_version,
        };
        self.transport.connect(&request).inspect_err(|e| {
            self.stats.write().last_error = Some(e.to_string());
        })?;
        info!(
            device_id = %self.config.device_id,
            transport = ?self.transport.kind(),
            "session connected"
        );
        Ok(())
    }

    /// Fetches the authoritative twin from the hub.
    ///
    /// Always a round trip; the returned document reflects every patch
    /// the hub has accepted, regardless of subscription state. The
    /// fetched reported section also reseeds the local publisher view.
    pub fn twin(&self) -> TwinResult<Twin> {
        match self.transport.fetch_twin(&self.config.device_id) {
            Ok(twin) => {
                self.store.record(&twin);
                self.publisher.seed(twin.properties.reported.clone());
                self.stats.write().twins_fetched += 1;
                Ok(twin)
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Submits a reported-property patch.
    pub fn update_reported(&self, patch: &PropertyPatch) -> TwinResult<u64> {
        match self.publisher.update(patch) {
            Ok(version) => {
                self.stats.write().patches_sent += 1;
                Ok(version)
            }
            Err(e) => {
                let mut stats = self.stats.write();
                stats.patches_rejected += 1;
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Subscribes to desired-property updates.
    pub fn subscribe_desired(&self, context: Option<String>) -> TwinResult<DesiredStream> {
        self.notifier.subscribe(context)
    }

    /// Ends the desired-property subscription.
    pub fn unsubscribe_desired(&self) -> TwinResult<()> {
        self.notifier.unsubscribe()
    }

    /// Current subscription state.
    pub fn subscription_state(&self) -> SubscriptionState {
        self.notifier.state()
    }

    /// Local view of the reported section.
    pub fn reported(&self) -> PropertySet {
        self.publisher.reported()
    }

    /// Last twin fetched from the hub, without a round trip.
    pub fn last_known_twin(&self) -> Option<Twin> {
        self.store.last_known()
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Closes the session, tearing down any active subscription.
    pub fn close(&self) -> TwinResult<()> {
        match self.notifier.unsubscribe() {
            Ok(()) | Err(TwinError::NotSubscribed) => {}
            Err(e) => return Err(e),
        }
        self.transport.close()
    }
}
