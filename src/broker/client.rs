//! MQTT Broker Client
//!
//! Connects to the broker with `rumqttc`, (re)subscribes to the topic set on
//! every ConnAck, and hands each publish to the `EventNormalizer` in arrival
//! order. Reconnection is left to `rumqttc`: polling the event loop again after
//! an error starts a new connection attempt.

use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::topics::TopicSet;
use crate::config::BrokerConfig;
use crate::normalizer::EventNormalizer;

/// Capacity of the request channel between `AsyncClient` and the event loop
const REQUEST_CAPACITY: usize = 10;

/// Shared broker availability flag
#[derive(Debug, Clone, Default)]
pub struct BrokerStatus(Arc<AtomicBool>);

impl BrokerStatus {
    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Set the flag, returning the previous value
    pub fn set_connected(&self, connected: bool) -> bool {
        self.0.swap(connected, Ordering::Relaxed)
    }
}

/// Errors raised by the broker client
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Subscribe to {topic} failed: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },

    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

pub struct BrokerClient {
    options: MqttOptions,
    topics: TopicSet,
    reconnect_delay: Duration,
    status: BrokerStatus,
}

impl BrokerClient {
    pub fn new(config: &BrokerConfig) -> Self {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("polychaeta-relay-{}", Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        Self {
            options,
            topics: config.topics.clone(),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            status: BrokerStatus::default(),
        }
    }

    /// Availability flag, updated by the running client
    pub fn status(&self) -> BrokerStatus {
        self.status.clone()
    }

    /// Spawn the subscription loop; it runs until `shutdown` flips to true
    pub fn start(
        self,
        normalizer: Arc<EventNormalizer>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let (client, eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let (host, port) = self.options.broker_address();
        tracing::info!(host = %host, port, "Connecting to MQTT broker");
        tokio::spawn(run(
            client,
            eventloop,
            self.topics,
            self.reconnect_delay,
            self.status,
            normalizer,
            shutdown,
        ))
    }
}

async fn run(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topics: TopicSet,
    reconnect_delay: Duration,
    status: BrokerStatus,
    normalizer: Arc<EventNormalizer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    status.set_connected(true);
                    tracing::info!("Connected to MQTT broker");
                    for result in subscribe_all(&client, &topics) {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Subscription failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    tracing::debug!(pkid = ack.pkid, "Subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match topics.classify(&publish.topic) {
                        Some(kind) => {
                            normalizer
                                .handle_message(kind, &publish.payload, Utc::now())
                                .await;
                        }
                        None => {
                            tracing::debug!(topic = %publish.topic, "Message on unexpected topic ignored");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let err = BrokerError::from(e);
                    if status.set_connected(false) {
                        tracing::warn!(error = %err, "Lost connection to MQTT broker");
                    } else {
                        tracing::debug!(error = %err, "MQTT broker unavailable");
                    }
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    }

    status.set_connected(false);
    if let Err(e) = client.try_disconnect() {
        tracing::debug!(error = %e, "MQTT disconnect request not queued");
    }
    tracing::info!("MQTT client stopped");
}

/// Queue a subscription for every topic
///
/// Uses the non-blocking path since this runs inside the event loop task.
fn subscribe_all<'a>(
    client: &'a AsyncClient,
    topics: &'a TopicSet,
) -> impl Iterator<Item = Result<(), BrokerError>> + 'a {
    topics.all().into_iter().map(move |topic| {
        client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map(|()| tracing::info!(topic, "Subscribed"))
            .map_err(|source| BrokerError::Subscribe {
                topic: topic.to_string(),
                source,
            })
    })
}
