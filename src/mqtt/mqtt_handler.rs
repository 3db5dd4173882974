use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet, QoS};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use crate::client::{Transport, TransportError};
use crate::protocol::MessageDispatcher;

const REQUEST_CAPACITY: usize = 100;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connection health as seen by the event loop. Shown on the web panel and by
/// `dyslink status`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MqttStatus {
    pub connection_state: ConnectionState,
    pub last_error: Option<String>,
    /// Subscriptions replayed on the last `ConnAck`
    pub subscriptions: usize,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub last_activity: Option<DateTime<Local>>,
}

/// `Transport` backed by a rumqttc client.
///
/// Remembers every subscription so the event loop can restore them after the
/// broker drops us.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    subscriptions: Arc<Mutex<HashMap<String, QoS>>>,
    status: Arc<watch::Sender<MqttStatus>>,
}

impl MqttTransport {
    fn new(client: AsyncClient) -> (Self, watch::Receiver<MqttStatus>) {
        let (status_tx, status_rx) = watch::channel(MqttStatus {
            connection_state: ConnectionState::Connecting,
            ..Default::default()
        });
        let transport = MqttTransport {
            client,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            status: Arc::new(status_tx),
        };
        (transport, status_rx)
    }

    fn remember(&self, topic: &str, qos: QoS) {
        match self.subscriptions.lock() {
            Ok(mut subscriptions) => {
                subscriptions.insert(topic.to_string(), qos);
            }
            Err(e) => warn!("Subscription registry poisoned: {}", e),
        }
    }

    fn remembered(&self) -> Vec<(String, QoS)> {
        match self.subscriptions.lock() {
            Ok(subscriptions) => subscriptions
                .iter()
                .map(|(topic, qos)| (topic.clone(), *qos))
                .collect(),
            Err(e) => {
                warn!("Subscription registry poisoned: {}", e);
                Vec::new()
            }
        }
    }

    /// Re-issues all known subscriptions without waiting on the request queue.
    /// Returns how many were queued.
    fn resubscribe(&self) -> usize {
        let mut queued = 0;
        for (topic, qos) in self.remembered() {
            match self.client.try_subscribe(topic.clone(), qos) {
                Ok(()) => {
                    debug!("Subscribed to {}", topic);
                    queued += 1;
                }
                Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
            }
        }
        queued
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        self.client.publish(topic, qos, false, payload).await?;
        self.status.send_modify(|status| {
            status.messages_sent += 1;
            status.last_activity = Some(Local::now());
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        self.remember(topic, qos);
        self.client.subscribe(topic, qos).await?;
        Ok(())
    }
}

/// Owns the connection to the device broker and the task driving it.
pub struct MqttHandler {
    transport: MqttTransport,
    status: watch::Receiver<MqttStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MqttHandler {
    /// Starts connecting in the background. Incoming publishes go to `dispatcher`.
    pub fn spawn(
        config: &MqttConfig,
        dispatcher: MessageDispatcher,
        cancel: CancellationToken,
    ) -> Self {
        let (client, eventloop) = AsyncClient::new(config.mqtt_options(), REQUEST_CAPACITY);
        let (transport, status_rx) = MqttTransport::new(client);

        info!(
            "Connecting to {} device at {} as {}",
            config.model,
            config.address(),
            config.username
        );
        let task = tokio::spawn(run_event_loop(
            eventloop,
            transport.clone(),
            dispatcher,
            cancel.clone(),
        ));

        MqttHandler {
            transport,
            status: status_rx,
            cancel,
            task,
        }
    }

    pub fn transport(&self) -> MqttTransport {
        self.transport.clone()
    }

    pub fn status(&self) -> watch::Receiver<MqttStatus> {
        self.status.clone()
    }

    /// Sends a disconnect and waits briefly for the event loop to wind down.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.transport.client.disconnect().await {
            warn!("Failed to request disconnect: {}", e);
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            debug!("Event loop did not stop after disconnect, cancelling");
            self.cancel.cancel();
            if let Err(e) = self.task.await {
                error!("MQTT event loop task failed: {}", e);
            }
        }
        info!("MQTT connection closed");
    }
}

/// What the event loop does after handling one event.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    /// Back off before polling again
    Retry,
    Stop,
}

fn handle_event(
    event: &Result<Event, ConnectionError>,
    transport: &MqttTransport,
    dispatcher: &MessageDispatcher,
) -> Step {
    match event {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
            info!("MQTT connection acknowledged");
            let replayed = transport.resubscribe();
            transport.status.send_modify(|status| {
                status.connection_state = ConnectionState::Connected;
                status.last_error = None;
                status.subscriptions = replayed;
            });
            Step::Continue
        }
        Ok(Event::Incoming(Packet::Publish(publish))) => {
            dispatcher.on_message(&publish.topic, &publish.payload);
            transport.status.send_modify(|status| {
                status.messages_received += 1;
                status.last_activity = Some(Local::now());
            });
            Step::Continue
        }
        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
            info!("Disconnect sent, stopping event loop");
            Step::Stop
        }
        Ok(_) => Step::Continue,
        Err(e) => {
            warn!("MQTT connection error: {}", e);
            transport.status.send_modify(|status| {
                status.connection_state = ConnectionState::Reconnecting;
                status.last_error = Some(e.to_string());
            });
            Step::Retry
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    transport: MqttTransport,
    dispatcher: MessageDispatcher,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match handle_event(&event, &transport, &dispatcher) {
            Step::Continue => {}
            Step::Stop => break,
            Step::Retry => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    transport.status.send_modify(|status| {
        status.connection_state = ConnectionState::Disconnected;
    });
}
