use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::mqtt::client::{MqttMessage, MqttPublish};
use crate::router::{Route, TopicRouter};
use crate::speaker::SpeakerCommand;
use crate::speaker::adapter::{SpeakerAdapter, SpeakerControl};

/// Owns every attached speaker and routes inbound MQTT messages to them.
///
/// Runs on the main loop only, so adapter state needs no locking. Publishing
/// never waits on the MQTT task: that task may itself be blocked handing us
/// inbound messages.
pub struct Bridge {
    router: TopicRouter,
    adapters: HashMap<String, SpeakerAdapter>,
    outbound_tx: mpsc::Sender<MqttPublish>,
}

impl Bridge {
    pub fn new(prefix: &str, outbound_tx: mpsc::Sender<MqttPublish>) -> Self {
        Self {
            router: TopicRouter::new(prefix),
            adapters: HashMap::new(),
            outbound_tx,
        }
    }

    pub fn attach(&mut self, adapter: SpeakerAdapter) {
        self.router.add_device(adapter.device_id());
        self.adapters.insert(adapter.device_id().to_string(), adapter);
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.router.subscriptions()
    }

    #[cfg(test)]
    pub fn adapter(&self, device_id: &str) -> Option<&SpeakerAdapter> {
        self.adapters.get(device_id)
    }

    pub fn publish_all(&self) {
        for adapter in self.adapters.values() {
            self.publish_snapshot(adapter);
        }
    }

    /// Handle one inbound message. Device topics update state and publish a
    /// snapshot; command topics spawn the command and return its handle.
    pub fn handle(&mut self, msg: MqttMessage) -> Option<JoinHandle<()>> {
        match self.router.route(&msg.topic) {
            Some(Route::Device { device_id, kind }) => {
                let Some(adapter) = self.adapters.get_mut(device_id) else {
                    warn!("Message for unknown device: {}", msg.topic);
                    return None;
                };
                adapter.handle_message(kind, &msg.payload);
                debug!("{} <- {:?} {:?}: {:?}", device_id, kind, msg.payload, adapter.state());
                let adapter = &self.adapters[device_id];
                self.publish_snapshot(adapter);
                None
            }
            Some(Route::Command { device_id, action }) => {
                let adapter = self.adapters.get(device_id)?;
                let Some(command) = SpeakerCommand::parse(action, &msg.payload) else {
                    warn!(
                        "Could not build command: action={}, payload={}",
                        action, msg.payload
                    );
                    return None;
                };
                let control = adapter.control().clone();
                let browse_topic = self.router.browse_topic(device_id);
                let tx = self.outbound_tx.clone();
                Some(tokio::spawn(async move {
                    execute(control, command, browse_topic, tx).await;
                }))
            }
            None => {
                debug!("Ignoring message on {}", msg.topic);
                None
            }
        }
    }

    fn publish_snapshot(&self, adapter: &SpeakerAdapter) {
        let snapshot = adapter.snapshot();
        let payload = match serde_json::to_string(&snapshot) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize snapshot for {}: {}", snapshot.device_id, e);
                return;
            }
        };
        let publish = MqttPublish {
            topic: self.router.entity_topic(&snapshot.device_id),
            payload,
            retain: true,
        };
        match self.outbound_tx.try_send(publish) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => warn!("Outbound queue full, dropping {}", p.topic),
            Err(TrySendError::Closed(_)) => warn!("Outbound channel closed"),
        }
    }
}

/// Run one command against a speaker. Failures are logged by the control.
async fn execute(
    control: SpeakerControl,
    command: SpeakerCommand,
    browse_topic: String,
    outbound_tx: mpsc::Sender<MqttPublish>,
) {
    match command {
        SpeakerCommand::Play => control.media_play().await,
        SpeakerCommand::Stop => {
            control.stop().await;
        }
        SpeakerCommand::SetVolume(level) => {
            control.set_volume(level).await;
        }
        SpeakerCommand::PlayMedia(media_ref) => {
            control.play_media(&media_ref).await;
        }
        SpeakerCommand::Browse(content_id) => {
            let tree = match control.browse_media(content_id.as_deref()).await {
                Ok(tree) => tree,
                Err(e) => {
                    error!("Browse failed: {}", e);
                    return;
                }
            };
            match serde_json::to_string(&tree) {
                Ok(payload) => {
                    let publish = MqttPublish {
                        topic: browse_topic,
                        payload,
                        retain: false,
                    };
                    if outbound_tx.send(publish).await.is_err() {
                        warn!("Outbound channel closed");
                    }
                }
                Err(e) => error!("Failed to serialize browse result: {}", e),
            }
        }
    }
}
