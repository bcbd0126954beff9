use std::collections::HashMap;

use crate::speaker::TopicKind;

/// Where an inbound topic should be delivered.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    /// `{prefix}/{device_id}/{state|volume|availability}`
    Device { device_id: &'a str, kind: TopicKind },
    /// `{prefix}/{device_id}/command/{action}`
    Command { device_id: &'a str, action: &'a str },
}

/// Exact-match topic table for the attached devices.
///
/// Device ids are free-form and may contain '/', so topics are matched
/// against the literal strings that were subscribed instead of being split.
#[derive(Debug, Default)]
pub struct TopicRouter {
    prefix: String,
    device_topics: HashMap<String, (String, TopicKind)>,
    /// `{prefix}/{device_id}/command` -> device_id
    command_bases: HashMap<String, String>,
}

impl TopicRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn device_topic(&self, device_id: &str, kind: TopicKind) -> String {
        format!("{}/{}/{}", self.prefix, device_id, kind.suffix())
    }

    pub fn entity_topic(&self, device_id: &str) -> String {
        format!("{}/{}/entity", self.prefix, device_id)
    }

    pub fn browse_topic(&self, device_id: &str) -> String {
        format!("{}/{}/browse", self.prefix, device_id)
    }

    fn command_base(&self, device_id: &str) -> String {
        format!("{}/{}/command", self.prefix, device_id)
    }

    pub fn add_device(&mut self, device_id: &str) {
        for kind in TopicKind::ALL {
            self.device_topics
                .insert(self.device_topic(device_id, kind), (device_id.to_string(), kind));
        }
        self.command_bases
            .insert(self.command_base(device_id), device_id.to_string());
    }

    /// Topics to subscribe: three device topics plus one command wildcard per device.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.device_topics.keys().cloned().collect();
        topics.extend(self.command_bases.keys().map(|base| format!("{base}/+")));
        topics.sort();
        topics
    }

    pub fn route<'a>(&'a self, topic: &'a str) -> Option<Route<'a>> {
        if let Some((device_id, kind)) = self.device_topics.get(topic) {
            return Some(Route::Device {
                device_id,
                kind: *kind,
            });
        }

        let (base, action) = topic.rsplit_once('/')?;
        if action.is_empty() {
            return None;
        }
        self.command_bases
            .get(base)
            .map(|device_id| Route::Command { device_id, action })
    }
}
