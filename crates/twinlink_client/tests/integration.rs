//! End-to-end tests running a device session against an in-process hub
//! over every transport variant.

use serde_json::json;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use twinlink_client::{
    AmqpTransport, ClientConfig, DeviceSession, LoopbackHub, LoopbackLink, MqttTransport,
    SubscriptionState, TransportKind, TwinError, TwinTransport,
};
use twinlink_hub::{HubConfig, TwinHub};
use twinlink_protocol::PropertyPatch;
use uuid::Uuid;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Routes a device link into an in-process hub.
struct HubEndpoint(Arc<TwinHub>);

impl LoopbackHub for HubEndpoint {
    fn handle(&self, body: &[u8]) -> Result<Vec<u8>, String> {
        self.0.handle_envelope(body)
    }

    fn open_event_stream(&self, device_id: &str) -> Result<Receiver<Vec<u8>>, String> {
        let raw = self
            .0
            .subscribe_desired(device_id)
            .map_err(|e| e.to_string())?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for update in raw {
                let Ok(bytes) = update.encode() else { break };
                if tx.send(bytes).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn transport_over(
    hub: &Arc<TwinHub>,
    device_id: &str,
    kind: TransportKind,
) -> Box<dyn TwinTransport> {
    let link = LoopbackLink::new(HubEndpoint(Arc::clone(hub)), device_id);
    match kind {
        TransportKind::Mqtt => Box::new(MqttTransport::new("mqtt://loopback", link)),
        TransportKind::MqttWebSocket => {
            Box::new(MqttTransport::over_websockets("wss://loopback", link))
        }
        TransportKind::Amqp => Box::new(AmqpTransport::new("amqps://loopback", device_id, link)),
        TransportKind::AmqpWebSocket => Box::new(AmqpTransport::over_websockets(
            "wss://loopback",
            device_id,
            link,
        )),
    }
}

fn connected_session(
    hub: &Arc<TwinHub>,
    device_id: &str,
    kind: TransportKind,
) -> DeviceSession<Box<dyn TwinTransport>> {
    init_logging();
    let config = ClientConfig::new(device_id, "loopback").with_transport(kind);
    let session = DeviceSession::new(config, transport_over(hub, device_id, kind));
    session.connect().unwrap();
    session
}

fn property_name() -> String {
    format!("prop_{}", Uuid::new_v4().simple())
}

#[test]
fn device_reports_and_service_observes_on_every_transport() {
    for kind in TransportKind::all() {
        let hub = Arc::new(TwinHub::new(HubConfig::default()));
        let device_id = format!("dev-{}", Uuid::new_v4().simple());
        let session = connected_session(&hub, &device_id, kind);

        let name = property_name();
        let version = session
            .update_reported(&PropertyPatch::new().with(&name, json!("operational")))
            .unwrap();
        assert!(version > 1, "hub version advances past initial ({kind:?})");

        let twin = hub.twin(&device_id).unwrap();
        assert_eq!(
            twin.properties.reported.get(&name),
            Some(&json!("operational")),
            "{kind:?}"
        );
        assert_eq!(twin.properties.reported.version, version, "{kind:?}");
    }
}

#[test]
fn service_sets_desired_and_device_receives_on_every_transport() {
    for kind in TransportKind::all() {
        let hub = Arc::new(TwinHub::new(HubConfig::default()));
        let device_id = format!("dev-{}", Uuid::new_v4().simple());
        let session = connected_session(&hub, &device_id, kind);

        let stream = session.subscribe_desired(None).unwrap();
        let name = property_name();
        let version = hub
            .update_desired(&device_id, &PropertyPatch::new().with(&name, json!(42)))
            .unwrap();

        let event = stream.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(event.patch.get(&name), Some(&json!(42)), "{kind:?}");
        assert_eq!(event.version, version, "{kind:?}");
    }
}

#[test]
fn desired_updates_arrive_in_acceptance_order() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-order", TransportKind::Mqtt);
    let stream = session.subscribe_desired(None).unwrap();

    for i in 0..10 {
        hub.update_desired("dev-order", &PropertyPatch::new().with("seq", json!(i)))
            .unwrap();
    }

    let mut last_version = 0;
    for i in 0..10 {
        let event = stream.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(event.patch.get("seq"), Some(&json!(i)));
        assert!(event.version > last_version);
        last_version = event.version;
    }
}

#[test]
fn subscription_is_not_retroactive() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-late", TransportKind::Amqp);

    hub.update_desired("dev-late", &PropertyPatch::new().with("before", json!(1)))
        .unwrap();

    let stream = session.subscribe_desired(None).unwrap();
    hub.update_desired("dev-late", &PropertyPatch::new().with("after", json!(2)))
        .unwrap();

    let event = stream.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(event.patch.get("before").is_none());
    assert_eq!(event.patch.get("after"), Some(&json!(2)));

    // The missed update is still visible through a full fetch.
    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.desired.get("before"), Some(&json!(1)));
    assert_eq!(twin.properties.desired.get("after"), Some(&json!(2)));
}

#[test]
fn unsubscribe_stops_delivery_without_stopping_merges() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-unsub", TransportKind::Mqtt);

    let stream = session.subscribe_desired(None).unwrap();
    session.unsubscribe_desired().unwrap();
    assert_eq!(session.subscription_state(), SubscriptionState::Unsubscribed);

    hub.update_desired("dev-unsub", &PropertyPatch::new().with("silent", json!(true)))
        .unwrap();

    assert!(matches!(
        stream.try_recv(),
        Err(TwinError::SubscriptionClosed)
    ));

    // The update still merged into the hub twin.
    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.desired.get("silent"), Some(&json!(true)));
}

#[test]
fn queued_events_are_unobservable_after_unsubscribe() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-queue", TransportKind::Mqtt);
    let stream = session.subscribe_desired(None).unwrap();

    hub.update_desired("dev-queue", &PropertyPatch::new().with("queued", json!(1)))
        .unwrap();
    session.unsubscribe_desired().unwrap();

    assert!(matches!(stream.recv(), Err(TwinError::SubscriptionClosed)));
}

#[test]
fn subscribe_context_is_echoed() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-ctx", TransportKind::AmqpWebSocket);
    let stream = session
        .subscribe_desired(Some("telemetry-loop".into()))
        .unwrap();

    hub.update_desired("dev-ctx", &PropertyPatch::new().with("a", json!(1)))
        .unwrap();
    hub.update_desired("dev-ctx", &PropertyPatch::new().with("b", json!(2)))
        .unwrap();

    for _ in 0..2 {
        let event = stream.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(event.context.as_deref(), Some("telemetry-loop"));
    }
}

#[test]
fn reserved_names_never_reach_the_hub() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-reserved", TransportKind::Mqtt);

    let err = session
        .update_reported(&PropertyPatch::new().with("$metadata", json!({})))
        .unwrap_err();
    assert!(matches!(err, TwinError::InvalidPropertyName { .. }));

    let twin = hub.twin("dev-reserved").unwrap();
    assert!(twin.properties.reported.values.is_empty());
    assert_eq!(twin.properties.reported.version, 1);
}

#[test]
fn null_deletes_reported_property_end_to_end() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-null", TransportKind::MqttWebSocket);

    session
        .update_reported(&PropertyPatch::new().with("lifetime", json!("short")))
        .unwrap();
    session
        .update_reported(&PropertyPatch::new().with("lifetime", json!(null)))
        .unwrap();

    let twin = session.twin().unwrap();
    assert!(!twin.properties.reported.values.contains_key("lifetime"));
    assert!(!session.reported().values.contains_key("lifetime"));
}

#[test]
fn nested_null_on_empty_twin_creates_empty_parent() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-nested", TransportKind::Amqp);

    let patch = PropertyPatch::new().with("parent", json!({ "child": null }));
    session.update_reported(&patch).unwrap();
    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.reported.get("parent"), Some(&json!({})));

    // Applying the same patch again does not change the value shape.
    session.update_reported(&patch).unwrap();
    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.reported.get("parent"), Some(&json!({})));
}

#[test]
fn value_shapes_survive_the_full_path_on_every_transport() {
    let shapes = [
        ("plain", json!("a string")),
        ("numeric_string", json!("1234")),
        ("array", json!([1, "x", false])),
        ("object", json!({ "inner": { "deep": 3 } })),
        ("boolean", json!(true)),
    ];

    for kind in TransportKind::all() {
        let hub = Arc::new(TwinHub::new(HubConfig::default()));
        let device_id = format!("dev-{}", Uuid::new_v4().simple());
        let session = connected_session(&hub, &device_id, kind);

        let mut patch = PropertyPatch::new();
        for (name, value) in &shapes {
            patch.set(*name, value.clone());
        }
        session.update_reported(&patch).unwrap();

        let twin = session.twin().unwrap();
        for (name, value) in &shapes {
            assert_eq!(
                twin.properties.reported.get(name),
                Some(value),
                "{name} ({kind:?})"
            );
        }
    }
}

#[test]
fn concurrent_reported_and_desired_writes_are_independent() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = Arc::new(connected_session(&hub, "dev-race", TransportKind::Mqtt));

    let device = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            for i in 0..20 {
                session
                    .update_reported(&PropertyPatch::new().with("reported_seq", json!(i)))
                    .unwrap();
            }
        })
    };
    for i in 0..20 {
        hub.update_desired("dev-race", &PropertyPatch::new().with("desired_seq", json!(i)))
            .unwrap();
    }
    device.join().unwrap();

    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.reported.get("reported_seq"), Some(&json!(19)));
    assert_eq!(twin.properties.desired.get("desired_seq"), Some(&json!(19)));
    assert_eq!(twin.properties.reported.version, 21);
    assert_eq!(twin.properties.desired.version, 21);
}

#[test]
fn rejected_patch_rolls_back_local_state() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-reject", TransportKind::Mqtt);
    session
        .update_reported(&PropertyPatch::new().with("state", json!("steady")))
        .unwrap();
    let version_before = session.reported().version;

    // Exceeds the hub's nesting limit, so the hub rejects the patch.
    let mut value = json!("leaf");
    for _ in 0..12 {
        value = json!({ "level": value });
    }
    let err = session
        .update_reported(&PropertyPatch::new().with("deep", json!({ "level": value })))
        .unwrap_err();
    assert!(matches!(err, TwinError::RejectedByService(_)));

    assert_eq!(session.reported().version, version_before);
    assert!(!session.reported().values.contains_key("deep"));
    let twin = hub.twin("dev-reject").unwrap();
    assert!(!twin.properties.reported.values.contains_key("deep"));
}

#[test]
fn versions_advance_monotonically_per_section() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-version", TransportKind::Amqp);

    let mut last = 1;
    for i in 0..5 {
        let version = session
            .update_reported(&PropertyPatch::new().with("count", json!(i)))
            .unwrap();
        assert!(version > last);
        last = version;
    }

    // The desired section versions independently.
    hub.update_desired("dev-version", &PropertyPatch::new().with("d", json!(1)))
        .unwrap();
    let twin = session.twin().unwrap();
    assert_eq!(twin.properties.desired.version, 2);
    assert_eq!(twin.properties.reported.version, last);
}

#[test]
fn protocol_version_mismatch_is_rejected() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let mut config = ClientConfig::new("dev-proto", "loopback");
    config.protocol_version = 99;
    let session = DeviceSession::new(
        config,
        transport_over(&hub, "dev-proto", TransportKind::Mqtt),
    );

    assert!(matches!(
        session.connect(),
        Err(TwinError::RejectedByService(_))
    ));
}

#[test]
fn tags_are_visible_to_the_device() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-tags", TransportKind::Mqtt);

    hub.update_tags("dev-tags", &PropertyPatch::new().with("building", json!(43)))
        .unwrap();
    let twin = session.twin().unwrap();
    assert_eq!(twin.tags.get("building"), Some(&json!(43)));
}

#[test]
fn session_stats_track_activity() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-stats", TransportKind::Mqtt);

    session.twin().unwrap();
    session
        .update_reported(&PropertyPatch::new().with("ok", json!(1)))
        .unwrap();
    let _ = session.update_reported(&PropertyPatch::new().with("$bad", json!(1)));

    let stats = session.stats();
    assert_eq!(stats.twins_fetched, 1);
    assert_eq!(stats.patches_sent, 1);
    assert_eq!(stats.patches_rejected, 1);
    assert!(stats.last_error.is_some());
}

#[test]
fn close_ends_subscription_and_connection() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let session = connected_session(&hub, "dev-close", TransportKind::Mqtt);
    let stream = session.subscribe_desired(None).unwrap();

    session.close().unwrap();

    assert!(matches!(stream.recv(), Err(TwinError::SubscriptionClosed)));
    assert_eq!(session.subscription_state(), SubscriptionState::Unsubscribed);
}

#[test]
fn two_devices_do_not_cross_talk() {
    let hub = Arc::new(TwinHub::new(HubConfig::default()));
    let alpha = connected_session(&hub, "dev-alpha", TransportKind::Mqtt);
    let beta = connected_session(&hub, "dev-beta", TransportKind::Amqp);

    let alpha_stream = alpha.subscribe_desired(None).unwrap();
    let beta_stream = beta.subscribe_desired(None).unwrap();

    hub.update_desired("dev-beta", &PropertyPatch::new().with("only", json!("beta")))
        .unwrap();

    let event = beta_stream.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.patch.get("only"), Some(&json!("beta")));
    assert!(matches!(
        alpha_stream.recv_timeout(Duration::from_millis(100)),
        Err(TwinError::Timeout)
    ));
}
