use std::{collections::HashMap, io, sync::Arc};

use bytes::Bytes;
use log::{debug, error, trace, warn};
use tokio::sync::{mpsc, oneshot};

use crate::{
    ack_registry::{Ack, AckRegistry, AckResult},
    completion::Completion,
    config::ConnectionConfig,
    connection::{ReceiveBuffer, Transport},
    constants::CONNECT_ACK_ID,
    error::ClientError,
    packet_id::PacketIdAllocator,
    packets::{
        ack_packet::{PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket, UnsubAckPacket},
        conn_ack_packet::{ConnAckPacket, ConnectReturnCode},
        connect_packet::ConnectPacket,
        disconnect_packet::DisconnectPacket,
        ping_req_packet::PingReqPacket,
        ping_resp_packet::PingRespPacket,
        publish_packet::PublishPacket,
        subscribe_packet::{SubAckPacket, SubscribePacket, Subscription, SUBSCRIPTION_FAILURE},
        unsubscribe_packet::UnsubscribePacket,
        EncodablePacket, PacketError, RawPacket,
    },
    protocol::{
        validation::{validate_topic_filter, validate_topic_name},
        PacketType, QoS,
    },
};

/// A message the broker delivered to this client.
pub type IncomingPublish = PublishPacket;

/// Outcome of an accepted CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
}

/// Notifications for the application, delivered in the order they happen.
#[derive(Debug, Clone)]
pub enum Event {
    Connect(ConnAck),
    Message(IncomingPublish),
    Error(ClientError),
    Close,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub qos: QoS,
    pub retain: bool,
    /// Sent as given. Only meaningful above `QoS::AtMostOnce`.
    pub dup: bool,
}

impl PublishOptions {
    pub fn qos(qos: QoS) -> Self {
        Self { qos, ..Self::default() }
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn dup(mut self, dup: bool) -> Self {
        self.dup = dup;
        self
    }
}

/// The broker's answer for one requested topic filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionGrant {
    pub topic: String,
    /// Granted `QoS` or `SUBSCRIPTION_FAILURE`, as sent by the broker.
    pub qos: u8,
}

impl SubscriptionGrant {
    pub fn is_failure(&self) -> bool {
        self.qos == SUBSCRIPTION_FAILURE
    }

    pub fn granted_qos(&self) -> Option<QoS> {
        QoS::from_u8(self.qos)
    }
}

/// MQTT 3.1.1 client engine for a single connection.
///
/// The engine never touches a socket. Outbound packets go to the `Transport`, and whoever
/// reads the socket hands the bytes to [`handle_data`](Self::handle_data). Requests that need
/// an acknowledgment return a [`Completion`] matched to it by packet identifier, so
/// acknowledgments may arrive in any order.
pub struct DeliveryClient<T: Transport> {
    transport: T,
    acks: AckRegistry,
    packet_ids: PacketIdAllocator,
    receive_buffer: ReceiveBuffer,
    /// Inbound QoS 2 messages held until the broker releases them.
    incoming_qos2: HashMap<u16, IncomingPublish>,
    events: mpsc::UnboundedSender<Event>,
    closed: bool,
}

impl<T: Transport> DeliveryClient<T> {
    pub fn new(transport: T) -> (Self, mpsc::UnboundedReceiver<Event>) {
        Self::with_packet_ids(transport, PacketIdAllocator::new())
    }

    pub fn with_packet_ids(
        transport: T,
        packet_ids: PacketIdAllocator,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, events_rx) = mpsc::unbounded_channel();

        let client = Self {
            transport,
            acks: AckRegistry::new(),
            packet_ids,
            receive_buffer: ReceiveBuffer::new(),
            incoming_qos2: HashMap::new(),
            events,
            closed: false,
        };

        (client, events_rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of requests still waiting for an acknowledgment.
    pub fn pending_acks(&self) -> usize {
        self.acks.len()
    }

    /// Send CONNECT and wait for the broker's CONNACK.
    ///
    /// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028>
    ///
    /// # Errors
    /// - Returns `ClientError::TransportClosed` after the transport closed.
    /// - Returns `ClientError::Transport` if the packet cannot be sent.
    ///
    /// The completion fails with `ClientError::ConnectionRejected` on a non-zero return code.
    pub fn connect(&mut self, config: &ConnectionConfig) -> Result<Completion<ConnAck>, ClientError> {
        self.ensure_open()?;

        let packet = ConnectPacket::from(config);
        debug!("Connecting as {} (keep alive {}s)", packet.client_id, packet.keep_alive);

        let rx = self.request(CONNECT_ACK_ID, PacketType::ConnAck, &packet)?;

        Ok(Completion::pending(rx, |ack| match ack {
            Ack::ConnAck(conn_ack) => match conn_ack.return_code {
                ConnectReturnCode::Accepted => {
                    Ok(ConnAck { session_present: conn_ack.session_present })
                }
                code => Err(ClientError::ConnectionRejected(code)),
            },
            other => Err(unexpected_ack(&other)),
        }))
    }

    /// Publish an application message.
    ///
    /// At `QoS::AtMostOnce` the completion is ready as soon as the packet is handed to the
    /// transport. At `QoS::AtLeastOnce` it waits for PUBACK, at `QoS::ExactlyOnce` for the
    /// PUBCOMP that ends the PUBREC/PUBREL exchange.
    ///
    /// # Errors
    /// - Returns `ClientError::InvalidTopic` if the topic is empty or contains wildcards.
    /// - Returns `ClientError::IdentifiersExhausted` if no packet identifier is free.
    /// - Returns `ClientError::Protocol` if the message does not fit in a packet.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: impl Into<Bytes>,
        options: PublishOptions,
    ) -> Result<Completion<()>, ClientError> {
        self.ensure_open()?;
        validate_topic_name(topic)?;

        let mut packet = PublishPacket {
            topic: topic.to_string(),
            payload: payload.into(),
            qos: options.qos,
            dup: options.dup,
            retain: options.retain,
            packet_id: None,
        };

        let expects = match options.qos {
            QoS::AtMostOnce => {
                self.send_packet(&packet)?;
                return Ok(Completion::ready(Ok(())));
            }
            QoS::AtLeastOnce => PacketType::PubAck,
            QoS::ExactlyOnce => PacketType::PubComp,
        };

        let packet_id = self.packet_ids.allocate(&self.acks)?;
        packet.packet_id = Some(packet_id);

        let rx = self.request(packet_id, expects, &packet)?;

        Ok(Completion::pending(rx, |_| Ok(())))
    }

    /// Subscribe to one or more topic filters.
    ///
    /// Accepts anything that converts into a [`Subscription`]: plain filters (requested at
    /// `QoS::AtMostOnce`) or `(filter, qos)` pairs. The completion yields one grant per filter,
    /// in request order, with failure codes kept verbatim.
    ///
    /// # Errors
    /// - Returns `ClientError::InvalidTopic` if no filter is given or a filter is empty.
    /// - Returns `ClientError::IdentifiersExhausted` if no packet identifier is free.
    pub fn subscribe<I>(
        &mut self,
        subscriptions: I,
    ) -> Result<Completion<Vec<SubscriptionGrant>>, ClientError>
    where
        I: IntoIterator,
        I::Item: Into<Subscription>,
    {
        self.ensure_open()?;

        let subscriptions: Vec<Subscription> = subscriptions.into_iter().map(Into::into).collect();
        if subscriptions.is_empty() {
            return Err(ClientError::InvalidTopic("no topic filters to subscribe".to_string()));
        }

        for subscription in &subscriptions {
            validate_topic_filter(&subscription.topic_filter)?;
        }

        let topics: Vec<String> =
            subscriptions.iter().map(|subscription| subscription.topic_filter.clone()).collect();

        let packet_id = self.packet_ids.allocate(&self.acks)?;
        let packet = SubscribePacket { packet_id, subscriptions };
        let rx = self.request(packet_id, PacketType::SubAck, &packet)?;

        Ok(Completion::pending(rx, move |ack| match ack {
            Ack::SubAck(return_codes) => pair_grants(topics, return_codes),
            other => Err(unexpected_ack(&other)),
        }))
    }

    /// Unsubscribe from one or more topic filters.
    ///
    /// # Errors
    /// - Returns `ClientError::InvalidTopic` if no filter is given or a filter is empty.
    /// - Returns `ClientError::IdentifiersExhausted` if no packet identifier is free.
    pub fn unsubscribe<I>(&mut self, topic_filters: I) -> Result<Completion<()>, ClientError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.ensure_open()?;

        let topic_filters: Vec<String> = topic_filters.into_iter().map(Into::into).collect();
        if topic_filters.is_empty() {
            return Err(ClientError::InvalidTopic("no topic filters to unsubscribe".to_string()));
        }

        for topic_filter in &topic_filters {
            validate_topic_filter(topic_filter)?;
        }

        let packet_id = self.packet_ids.allocate(&self.acks)?;
        let packet = UnsubscribePacket { packet_id, topic_filters };
        let rx = self.request(packet_id, PacketType::UnsubAck, &packet)?;

        Ok(Completion::pending(rx, |_| Ok(())))
    }

    /// Send PINGREQ. The PINGRESP is not tracked.
    pub fn ping(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.send_packet(&PingReqPacket)
    }

    /// Send DISCONNECT. Closing the transport afterwards is up to the caller.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        debug!("Disconnecting");
        self.send_packet(&DisconnectPacket)
    }

    /// Feed bytes read from the transport.
    ///
    /// Every complete packet is dispatched. A partial packet waits for the next call.
    ///
    /// # Errors
    /// - Returns `ClientError::Protocol` for bytes that cannot be parsed or a packet a client
    ///   should never receive. The same error is emitted as `Event::Error`, and the connection
    ///   should be considered unusable.
    /// - Returns `ClientError::Transport` if an acknowledgment cannot be sent.
    pub fn handle_data(&mut self, data: &[u8]) -> Result<(), ClientError> {
        if self.closed {
            debug!("Dropping {} bytes received after close", data.len());
            return Ok(());
        }

        self.receive_buffer.extend(data);

        loop {
            let result = match self.receive_buffer.next_packet() {
                Ok(Some(packet)) => self.dispatch(packet),
                Ok(None) => return Ok(()),
                Err(e) => {
                    self.receive_buffer.clear();
                    Err(e.into())
                }
            };

            if let Err(e) = result {
                error!("Failed to handle inbound data: {e}");
                self.emit(Event::Error(e.clone()));
                return Err(e);
            }
        }
    }

    /// The transport closed. Every pending request fails with `ClientError::TransportClosed`.
    pub fn handle_close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        debug!("Transport closed with {} pending acknowledgments", self.acks.len());

        self.receive_buffer.clear();
        self.incoming_qos2.clear();
        self.acks.cancel_all(|| ClientError::TransportClosed);
        self.emit(Event::Close);
    }

    /// The transport reported an error. Closure is reported separately.
    pub fn handle_error(&mut self, e: io::Error) {
        warn!("Transport error: {e}");
        self.emit(Event::Error(ClientError::Transport(Arc::new(e))));
    }

    fn dispatch(&mut self, packet: RawPacket) -> Result<(), ClientError> {
        trace!("Received {} ({} bytes)", packet.packet_type, packet.body.len());

        match packet.packet_type {
            PacketType::ConnAck => {
                let conn_ack = packet.decode::<ConnAckPacket>()?;
                self.handle_conn_ack(conn_ack);
            }
            PacketType::Publish => {
                let publish = packet.decode::<PublishPacket>()?;
                self.handle_publish(publish)?;
            }
            PacketType::PubAck => {
                let pub_ack = packet.decode::<PubAckPacket>()?;
                self.acks.resolve(pub_ack.packet_id, Ack::PubAck);
            }
            PacketType::PubRec => {
                // Publisher side of QoS 2: release right away, PUBCOMP completes the request
                let pub_rec = packet.decode::<PubRecPacket>()?;
                self.send_packet(&PubRelPacket::new(pub_rec.packet_id))?;
            }
            PacketType::PubRel => {
                let pub_rel = packet.decode::<PubRelPacket>()?;
                self.handle_pub_rel(pub_rel.packet_id)?;
            }
            PacketType::PubComp => {
                let pub_comp = packet.decode::<PubCompPacket>()?;
                self.acks.resolve(pub_comp.packet_id, Ack::PubComp);
            }
            PacketType::SubAck => {
                let sub_ack = packet.decode::<SubAckPacket>()?;
                self.acks.resolve(sub_ack.packet_id, Ack::SubAck(sub_ack.return_codes));
            }
            PacketType::UnsubAck => {
                let unsub_ack = packet.decode::<UnsubAckPacket>()?;
                self.acks.resolve(unsub_ack.packet_id, Ack::UnsubAck);
            }
            PacketType::PingResp => {
                packet.decode::<PingRespPacket>()?;
                trace!("Broker answered ping");
            }
            PacketType::Connect
            | PacketType::Subscribe
            | PacketType::Unsubscribe
            | PacketType::PingReq
            | PacketType::Disconnect => {
                return Err(PacketError::UnexpectedPacketType(packet.packet_type.to_u8()).into());
            }
        }

        Ok(())
    }

    fn handle_conn_ack(&mut self, conn_ack: ConnAckPacket) {
        match conn_ack.return_code {
            ConnectReturnCode::Accepted => {
                debug!("Connected (session present: {})", conn_ack.session_present);
                self.emit(Event::Connect(ConnAck { session_present: conn_ack.session_present }));
            }
            code => {
                warn!("Connection rejected: {code}");
                self.emit(Event::Error(ClientError::ConnectionRejected(code)));
            }
        }

        self.acks.resolve(CONNECT_ACK_ID, Ack::ConnAck(conn_ack));
    }

    /// The message event goes out before the acknowledgment that confirms it.
    fn handle_publish(&mut self, publish: IncomingPublish) -> Result<(), ClientError> {
        match (publish.qos, publish.packet_id) {
            (QoS::AtMostOnce, _) => {
                self.emit(Event::Message(publish));
                Ok(())
            }
            (QoS::AtLeastOnce, Some(packet_id)) => {
                self.emit(Event::Message(publish));
                self.send_packet(&PubAckPacket::new(packet_id))
            }
            (QoS::ExactlyOnce, Some(packet_id)) => {
                // A redelivery before PUBREL must not produce a second message
                self.incoming_qos2.entry(packet_id).or_insert(publish);
                self.send_packet(&PubRecPacket::new(packet_id))
            }
            (_, None) => {
                Err(PacketError::malformed("PUBLISH above QoS 0 without packet identifier").into())
            }
        }
    }

    fn handle_pub_rel(&mut self, packet_id: u16) -> Result<(), ClientError> {
        match self.incoming_qos2.remove(&packet_id) {
            Some(publish) => self.emit(Event::Message(publish)),
            None => debug!("PUBREL for unknown packet identifier {packet_id}"),
        }

        self.send_packet(&PubCompPacket::new(packet_id))
    }

    /// Register the acknowledgment before sending, and withdraw it if sending fails.
    fn request<P: EncodablePacket>(
        &mut self,
        packet_id: u16,
        expects: PacketType,
        packet: &P,
    ) -> Result<oneshot::Receiver<AckResult>, ClientError> {
        let rx = self.acks.register(packet_id, expects);

        if let Err(e) = self.send_packet(packet) {
            self.acks.fail(packet_id, ClientError::Cancelled);
            return Err(e);
        }

        Ok(rx)
    }

    fn send_packet<P: EncodablePacket>(&mut self, packet: &P) -> Result<(), ClientError> {
        let bytes = packet.encode()?;
        trace!("Sending {}: {}", P::packet_type(), hex::encode(&bytes));

        self.transport.send(bytes)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }

        Ok(())
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            trace!("Event dropped, nobody is listening");
        }
    }
}

fn pair_grants(
    topics: Vec<String>,
    return_codes: Vec<u8>,
) -> Result<Vec<SubscriptionGrant>, ClientError> {
    if topics.len() != return_codes.len() {
        return Err(PacketError::MalformedPacket(Some(format!(
            "SUBACK has {} return codes for {} topic filters",
            return_codes.len(),
            topics.len()
        )))
        .into());
    }

    Ok(topics
        .into_iter()
        .zip(return_codes)
        .map(|(topic, qos)| SubscriptionGrant { topic, qos })
        .collect())
}

fn unexpected_ack(ack: &Ack) -> ClientError {
    PacketError::UnexpectedPacketType(ack.packet_type().to_u8()).into()
}
