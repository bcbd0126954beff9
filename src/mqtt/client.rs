use std::collections::HashMap;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// An inbound publish, payload decoded as UTF-8.
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// An outbound publish requested by the bridge.
pub struct MqttPublish {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    config: Config,
    subscriptions: Vec<String>,
}

impl MqttClient {
    pub fn new(config: &Config, subscriptions: Vec<String>) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(std::time::Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        let lwt = rumqttc::LastWill::new(
            config.bridge_status_topic(),
            "offline".as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        );
        mqttopts.set_last_will(lwt);

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            config: config.clone(),
            subscriptions,
        }
    }

    /// Run the MQTT event loop. Subscribes on every (re)connect, forwards
    /// incoming publishes through `inbound_tx` and publishes whatever arrives
    /// on `outbound_rx`. Retained publishes identical to the previous one on
    /// the same topic are skipped.
    pub async fn run(
        mut self,
        inbound_tx: mpsc::Sender<MqttMessage>,
        mut outbound_rx: mpsc::Receiver<MqttPublish>,
    ) {
        let mut last_values: HashMap<String, String> = HashMap::new();

        loop {
            tokio::select! {
                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                            info!("Connected to MQTT broker");

                            if let Err(e) = self
                                .client
                                .publish(self.config.bridge_status_topic(), QoS::AtLeastOnce, true, "online")
                                .await
                            {
                                error!("Failed to publish online status: {}", e);
                            }

                            for topic in &self.subscriptions {
                                if let Err(e) = self.client.subscribe(topic, QoS::AtMostOnce).await {
                                    error!("Failed to subscribe to {}: {}", topic, e);
                                }
                            }
                            // The broker may have lost retained state; republish.
                            last_values.clear();
                        }
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            let msg = MqttMessage {
                                topic: publish.topic.clone(),
                                payload: String::from_utf8_lossy(&publish.payload).to_string(),
                            };
                            if inbound_tx.send(msg).await.is_err() {
                                warn!("Inbound channel closed");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("MQTT connection error: {}. Reconnecting...", e);
                            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        }
                    }
                }
                Some(out) = outbound_rx.recv() => {
                    if out.retain {
                        if last_values.get(&out.topic) == Some(&out.payload) {
                            continue;
                        }
                        last_values.insert(out.topic.clone(), out.payload.clone());
                    }
                    debug!("Publishing {}: {}", out.topic, out.payload);
                    if let Err(e) = self
                        .client
                        .publish(&out.topic, QoS::AtMostOnce, out.retain, out.payload.into_bytes())
                        .await
                    {
                        warn!("Failed to publish {}: {}", out.topic, e);
                    }
                }
            }
        }
    }
}
