pub mod adapter;
pub mod http;

use serde::Serialize;

/// Which device topic an inbound message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    State,
    Volume,
    Availability,
}

impl TopicKind {
    pub const ALL: [TopicKind; 3] = [TopicKind::State, TopicKind::Volume, TopicKind::Availability];

    pub fn suffix(self) -> &'static str {
        match self {
            TopicKind::State => "state",
            TopicKind::Volume => "volume",
            TopicKind::Availability => "availability",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Last reported device state. Only the inbound message handlers write it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerState {
    pub playback: PlaybackState,
    pub volume: f64,
    pub available: bool,
}

impl Default for SpeakerState {
    fn default() -> Self {
        Self {
            playback: PlaybackState::Idle,
            volume: 0.5,
            available: false,
        }
    }
}

/// Published view of one speaker entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub device_id: String,
    pub name: String,
    pub state: PlaybackState,
    pub volume: f64,
    pub available: bool,
}

/// An action requested on a command topic.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakerCommand {
    /// Resume without a URL. Not supported by the device.
    Play,
    Stop,
    SetVolume(f64),
    PlayMedia(String),
    Browse(Option<String>),
}

impl SpeakerCommand {
    /// Parse `{action}` + payload from a command topic.
    pub fn parse(action: &str, payload: &str) -> Option<Self> {
        match action {
            "play" => Some(Self::Play),
            "stop" => Some(Self::Stop),
            "volume" => {
                let level: f64 = payload.trim().parse().ok()?;
                (0.0..=1.0).contains(&level).then_some(Self::SetVolume(level))
            }
            "play_media" => {
                let media_ref = payload.trim();
                (!media_ref.is_empty()).then(|| Self::PlayMedia(media_ref.to_string()))
            }
            "browse" => {
                let content_id = payload.trim();
                Some(Self::Browse(
                    (!content_id.is_empty()).then(|| content_id.to_string()),
                ))
            }
            _ => None,
        }
    }
}
