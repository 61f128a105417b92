use std::time::Duration;

use bytes::Bytes;
use mqtt_delivery::{
    packet_id::PacketIdAllocator, ClientError, ConnectionConfig, DeliveryClient, Event,
    PublishOptions, QoS, SubscriptionGrant,
};
use tokio::{sync::mpsc, time};

type TestClient = DeliveryClient<mpsc::UnboundedSender<Bytes>>;

struct Harness {
    client: TestClient,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    fn new() -> Self {
        Self::with_packet_ids(PacketIdAllocator::new())
    }

    fn with_packet_ids(packet_ids: PacketIdAllocator) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let (transport, outbound) = mpsc::unbounded_channel();
        let (client, events) = DeliveryClient::with_packet_ids(transport, packet_ids);
        Self { client, outbound, events }
    }

    fn sent(&mut self) -> Bytes {
        self.outbound.try_recv().expect("expected an outbound packet")
    }

    fn nothing_sent(&mut self) -> bool {
        self.outbound.try_recv().is_err()
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::builder().client_id("abc").build().unwrap()
}

#[tokio::test]
async fn connect_sends_connect_packet() {
    let mut harness = Harness::new();

    let _connect = harness.client.connect(&config()).unwrap();

    #[rustfmt::skip]
    let expected = [
        0x10, 0x0F,
        0x00, 0x04, b'M', b'Q', b'T', b'T',
        0x04,
        0x02,
        0x00, 0x3C,
        0x00, 0x03, b'a', b'b', b'c',
    ];
    assert_eq!(&harness.sent()[..], &expected);
}

#[tokio::test]
async fn connect_accepted_reports_session_present() {
    let mut harness = Harness::new();
    let connect = harness.client.connect(&config()).unwrap();

    harness.client.handle_data(&[0x20, 0x02, 0x01, 0x00]).unwrap();

    let conn_ack = connect.await.unwrap();
    assert!(conn_ack.session_present);
    assert!(matches!(
        harness.events.try_recv().unwrap(),
        Event::Connect(conn_ack) if conn_ack.session_present
    ));
}

#[tokio::test]
async fn connect_rejected_names_the_reason() {
    let mut harness = Harness::new();
    let connect = harness.client.connect(&config()).unwrap();

    harness.client.handle_data(&[0x20, 0x02, 0x00, 0x05]).unwrap();

    let error = connect.await.unwrap_err();
    assert!(matches!(error, ClientError::ConnectionRejected(_)));
    assert!(error.to_string().contains("Client not authorized"));
    assert!(matches!(harness.events.try_recv().unwrap(), Event::Error(_)));
}

#[tokio::test]
async fn qos0_publish_completes_without_acknowledgment() {
    let mut harness = Harness::new();

    let publish =
        harness.client.publish("a/b", "hi", PublishOptions::qos(QoS::AtMostOnce)).unwrap();

    assert_eq!(&harness.sent()[..], &[0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'h', b'i']);
    time::timeout(Duration::from_millis(100), publish).await.unwrap().unwrap();
    assert_eq!(harness.client.pending_acks(), 0);
}

#[tokio::test]
async fn qos1_publish_waits_for_matching_puback() {
    let mut harness = Harness::new();

    let mut publish =
        harness.client.publish("a/b", "hi", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();

    let sent = harness.sent();
    assert_eq!(sent[0], 0x32);
    assert_eq!(&sent[7..9], &[0x00, 0x01]);

    // PUBACK for another identifier
    harness.client.handle_data(&[0x40, 0x02, 0x00, 0x02]).unwrap();
    assert!(publish.try_take().is_none());

    harness.client.handle_data(&[0x40, 0x02, 0x00, 0x01]).unwrap();
    assert!(publish.try_take().unwrap().is_ok());
    assert_eq!(harness.client.pending_acks(), 0);
}

#[tokio::test]
async fn qos2_publish_releases_then_completes() {
    let mut harness = Harness::new();

    let mut publish =
        harness.client.publish("a/b", "hi", PublishOptions::qos(QoS::ExactlyOnce)).unwrap();
    assert_eq!(harness.sent()[0], 0x34);

    harness.client.handle_data(&[0x50, 0x02, 0x00, 0x01]).unwrap();
    assert_eq!(&harness.sent()[..], &[0x62, 0x02, 0x00, 0x01]);
    assert!(publish.try_take().is_none());

    harness.client.handle_data(&[0x70, 0x02, 0x00, 0x01]).unwrap();
    assert!(publish.try_take().unwrap().is_ok());
}

#[tokio::test]
async fn subscribe_pairs_grants_with_topics() {
    let mut harness = Harness::new();

    let subscribe = harness
        .client
        .subscribe([("x", QoS::AtLeastOnce), ("y", QoS::AtLeastOnce)])
        .unwrap();

    #[rustfmt::skip]
    let expected = [
        0x82, 0x0A,
        0x00, 0x01,
        0x00, 0x01, b'x', 0x01,
        0x00, 0x01, b'y', 0x01,
    ];
    assert_eq!(&harness.sent()[..], &expected);

    harness.client.handle_data(&[0x90, 0x04, 0x00, 0x01, 0x01, 0x80]).unwrap();

    let grants = subscribe.await.unwrap();
    assert_eq!(
        grants,
        vec![
            SubscriptionGrant { topic: "x".to_string(), qos: 1 },
            SubscriptionGrant { topic: "y".to_string(), qos: 128 },
        ]
    );
}

#[tokio::test]
async fn unsubscribe_completes_on_unsuback() {
    let mut harness = Harness::new();

    let unsubscribe = harness.client.unsubscribe(["a/b"]).unwrap();
    assert_eq!(&harness.sent()[..], &[0xA2, 0x07, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'b']);

    harness.client.handle_data(&[0xB0, 0x02, 0x00, 0x01]).unwrap();
    unsubscribe.await.unwrap();
}

#[tokio::test]
async fn acknowledgments_match_by_identifier_not_order() {
    let mut harness = Harness::new();

    let mut first = harness.client.subscribe(["a"]).unwrap();
    let mut second = harness.client.subscribe(["b"]).unwrap();

    harness.client.handle_data(&[0x90, 0x03, 0x00, 0x02, 0x00]).unwrap();
    assert!(first.try_take().is_none());
    assert_eq!(second.try_take().unwrap().unwrap()[0].topic, "b");

    harness.client.handle_data(&[0x90, 0x03, 0x00, 0x01, 0x01]).unwrap();
    assert_eq!(first.try_take().unwrap().unwrap()[0].topic, "a");
}

#[tokio::test]
async fn close_fails_every_pending_request() {
    let mut harness = Harness::with_packet_ids(PacketIdAllocator::starting_at(3));

    let three =
        harness.client.publish("a", "one", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    let _four = harness.client.publish("a", "two", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    harness.client.handle_data(&[0x40, 0x02, 0x00, 0x04]).unwrap();
    let _five = harness.client.publish("a", "x", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    let _six = harness.client.publish("a", "x", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    harness.client.handle_data(&[0x40, 0x02, 0x00, 0x05, 0x40, 0x02, 0x00, 0x06]).unwrap();
    let seven = harness.client.subscribe(["b"]).unwrap();
    assert_eq!(harness.client.pending_acks(), 2);

    harness.client.handle_close();

    assert!(matches!(three.await, Err(ClientError::TransportClosed)));
    assert!(matches!(seven.await, Err(ClientError::TransportClosed)));
    assert!(matches!(harness.events.try_recv().unwrap(), Event::Close));
}

#[tokio::test]
async fn inbound_qos1_message_is_emitted_before_puback() {
    let mut harness = Harness::new();

    harness
        .client
        .handle_data(&[0x32, 0x08, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x09, b'!'])
        .unwrap();

    match harness.events.try_recv().unwrap() {
        Event::Message(message) => {
            assert_eq!(message.topic, "a/b");
            assert_eq!(&message.payload[..], b"!");
            assert_eq!(message.packet_id, Some(9));
        }
        other => panic!("expected message, got {other:?}"),
    }
    assert_eq!(&harness.sent()[..], &[0x40, 0x02, 0x00, 0x09]);
}

#[tokio::test]
async fn fragmented_and_coalesced_deliveries() {
    let mut harness = Harness::new();
    let mut publish =
        harness.client.publish("t", "m", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    harness.sent();

    // QoS 0 PUBLISH split across deliveries, followed by PUBACK in the same delivery
    harness.client.handle_data(&[0x30, 0x04, 0x00]).unwrap();
    assert!(harness.events.try_recv().is_err());

    harness.client.handle_data(&[0x01, b'z', b'?', 0x40, 0x02, 0x00, 0x01]).unwrap();

    assert!(matches!(
        harness.events.try_recv().unwrap(),
        Event::Message(message) if message.topic == "z"
    ));
    assert!(publish.try_take().unwrap().is_ok());
}

#[tokio::test]
async fn orphan_acknowledgments_are_ignored() {
    let mut harness = Harness::new();

    harness.client.handle_data(&[0x40, 0x02, 0x00, 0x2A, 0x70, 0x02, 0x00, 0x2B]).unwrap();

    assert!(harness.events.try_recv().is_err());
    assert!(harness.nothing_sent());
}

#[tokio::test]
async fn ping_and_disconnect_are_bare_headers() {
    let mut harness = Harness::new();

    harness.client.ping().unwrap();
    assert_eq!(&harness.sent()[..], &[0xC0, 0x00]);

    // PINGRESP is only liveness
    harness.client.handle_data(&[0xD0, 0x00]).unwrap();
    assert!(harness.events.try_recv().is_err());

    harness.client.disconnect().unwrap();
    assert_eq!(&harness.sent()[..], &[0xE0, 0x00]);
    assert_eq!(harness.client.pending_acks(), 0);
}

#[tokio::test]
async fn identifiers_wrap_around_skipping_pending() {
    let mut harness = Harness::with_packet_ids(PacketIdAllocator::starting_at(u16::MAX));

    let _last = harness.client.publish("a", "x", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    assert_eq!(&harness.sent()[5..7], &[0xFF, 0xFF]);

    let _first = harness.client.publish("a", "x", PublishOptions::qos(QoS::AtLeastOnce)).unwrap();
    assert_eq!(&harness.sent()[5..7], &[0x00, 0x01]);
}

#[tokio::test]
async fn malformed_length_is_a_protocol_error() {
    let mut harness = Harness::new();

    let result = harness.client.handle_data(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);

    assert!(matches!(result, Err(ClientError::Protocol(_))));
    assert!(matches!(harness.events.try_recv().unwrap(), Event::Error(ClientError::Protocol(_))));
}
