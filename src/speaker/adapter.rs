use std::sync::Arc;

use tracing::{debug, error, info};

use crate::media::{self, BrowseMedia, MediaBrowser, MediaError, MediaResolver};
use crate::registration::DeviceConfig;

use super::http::DeviceClient;
use super::{EntitySnapshot, PlaybackState, SpeakerState, TopicKind};

/// Outbound side of a speaker. Cheap to clone so commands can run in their
/// own tasks.
#[derive(Clone)]
pub struct SpeakerControl {
    device: DeviceClient,
    resolver: Arc<dyn MediaResolver>,
    browser: Arc<dyn MediaBrowser>,
}

impl SpeakerControl {
    pub fn new(
        device: DeviceClient,
        resolver: Arc<dyn MediaResolver>,
        browser: Arc<dyn MediaBrowser>,
    ) -> Self {
        Self {
            device,
            resolver,
            browser,
        }
    }

    pub async fn set_volume(&self, level: f64) -> bool {
        self.device.set_volume(level).await
    }

    pub async fn stop(&self) -> bool {
        self.device.stop().await
    }

    /// Resume is not supported: the last played URL is not tracked.
    pub async fn media_play(&self) {
        debug!("Ignoring bare play for {}: resume not supported", self.device.host());
    }

    /// Play a raw URL, or a media-source reference after resolving it.
    pub async fn play_media(&self, media_ref: &str) -> bool {
        let url = if media::is_media_source(media_ref) {
            match self.resolver.resolve(media_ref).await {
                Ok(resolved) => {
                    debug!("Resolved {} ({})", media_ref, resolved.mime_type);
                    resolved.url
                }
                Err(e) => {
                    error!("Error resolving media source: {}", e);
                    return false;
                }
            }
        } else {
            media_ref.to_string()
        };

        info!("Playing media URL: {}", url);
        self.device.play_url(&url).await
    }

    /// Browse the media catalog, limited to audio items.
    pub async fn browse_media(&self, content_id: Option<&str>) -> Result<BrowseMedia, MediaError> {
        self.browser.browse(content_id, &media::audio_only).await
    }
}

/// One registered speaker attached to the bridge.
pub struct SpeakerAdapter {
    config: DeviceConfig,
    state: SpeakerState,
    control: SpeakerControl,
}

impl SpeakerAdapter {
    pub fn new(config: DeviceConfig, control: SpeakerControl) -> Self {
        Self {
            config,
            state: SpeakerState::default(),
            control,
        }
    }

    pub fn state(&self) -> &SpeakerState {
        &self.state
    }

    pub fn control(&self) -> &SpeakerControl {
        &self.control
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            device_id: self.config.device_id.clone(),
            name: self.config.name.clone(),
            state: self.state.playback,
            volume: self.state.volume,
            available: self.state.available,
        }
    }

    pub fn handle_message(&mut self, kind: TopicKind, payload: &str) {
        match kind {
            TopicKind::State => self.on_state(payload),
            TopicKind::Volume => self.on_volume(payload),
            TopicKind::Availability => self.on_availability(payload),
        }
    }

    /// Anything other than "playing" counts as idle.
    fn on_state(&mut self, payload: &str) {
        self.state.playback = match payload {
            "playing" => PlaybackState::Playing,
            _ => PlaybackState::Idle,
        };
    }

    /// Volume arrives as a percentage.
    fn on_volume(&mut self, payload: &str) {
        match payload.trim().parse::<f64>() {
            Ok(percent) if percent.is_finite() => {
                self.state.volume = (percent / 100.0).clamp(0.0, 1.0);
            }
            _ => error!("Invalid volume value: {}", payload),
        }
    }

    fn on_availability(&mut self, payload: &str) {
        self.state.available = payload == "online";
    }
}
