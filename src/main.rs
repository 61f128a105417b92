use std::{env, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use log::{error, info, warn};
use mqtt_delivery::{Completion, ConnectionConfig, DeliveryClient, Event, QoS, SubscriptionGrant};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    time,
};

const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:1883";
const DEFAULT_TOPIC: &str = "#";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let addr = env::var("MQTT_BROKER_ADDR").unwrap_or_else(|_| DEFAULT_BROKER_ADDR.to_string());
    let topic = env::var("MQTT_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string());

    let mut builder = ConnectionConfig::builder();
    if let Ok(client_id) = env::var("MQTT_CLIENT_ID") {
        builder = builder.client_id(client_id);
    }
    let config = builder.build()?;

    info!("Connecting to MQTT broker on {addr}...");
    let stream =
        TcpStream::connect(&addr).await.with_context(|| format!("Failed to connect to {addr}"))?;
    let (mut reader, mut writer) = stream.into_split();

    // The writer task owns the write half, the client only sees the channel
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    let writer_task = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = writer.write_all(&packet).await {
                error!("Failed to write to broker: {e}");
                break;
            }
        }
    });

    let (mut client, mut events) = DeliveryClient::new(outbound_tx);

    let mut connecting = Some(client.connect(&config)?);
    let mut subscribing: Option<Completion<Vec<SubscriptionGrant>>> = None;

    let keep_alive_secs = u64::from(config.keep_alive());
    let mut keep_alive = time::interval(Duration::from_secs(keep_alive_secs.max(1)));
    keep_alive.tick().await;

    let mut read_buffer = vec![0; 4096];

    loop {
        tokio::select! {
            read = reader.read(&mut read_buffer) => match read {
                Ok(0) => client.handle_close(),
                Ok(n) => {
                    if let Err(e) = client.handle_data(&read_buffer[..n]) {
                        error!("Dropping connection: {e}");
                        client.handle_close();
                    }
                }
                Err(e) => {
                    client.handle_error(e);
                    client.handle_close();
                }
            },
            _ = keep_alive.tick(), if keep_alive_secs > 0 => {
                client.ping()?;
            }
            Some(event) = events.recv() => match event {
                Event::Connect(conn_ack) => {
                    info!(
                        "Connected as {} (session present: {})",
                        config.client_id(),
                        conn_ack.session_present
                    );
                }
                Event::Message(message) => {
                    println!("{} {}", message.topic, String::from_utf8_lossy(&message.payload));
                }
                Event::Error(e) => error!("{e}"),
                Event::Close => {
                    info!("Connection closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Disconnecting...");
                client.disconnect()?;
                break;
            }
        }

        if let Some(result) = connecting.as_mut().and_then(Completion::try_take) {
            connecting = None;
            result.context("CONNECT failed")?;
            subscribing = Some(client.subscribe([(topic.as_str(), QoS::AtLeastOnce)])?);
        }

        if let Some(result) = subscribing.as_mut().and_then(Completion::try_take) {
            subscribing = None;
            for grant in result.context("SUBSCRIBE failed")? {
                if grant.is_failure() {
                    warn!("Broker refused subscription to {}", grant.topic);
                } else {
                    info!("Subscribed to {} with QoS {}", grant.topic, grant.qos);
                }
            }
        }
    }

    drop(client);
    writer_task.await?;

    Ok(())
}
