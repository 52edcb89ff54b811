//! Push-channel events.
//!
//! Events carry identifiers only. They tell a screen *what* to re-fetch,
//! never the new data itself.

use serde_json::Value;

pub const DISASTER_UPDATED: &str = "disaster_updated";
pub const SOCIAL_MEDIA_UPDATED: &str = "social_media_updated";
pub const RESOURCES_UPDATED: &str = "resources_updated";

/// A named event as delivered by the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub name: String,
    pub payload: Value,
}

impl PushEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Typed view of the events the dashboard reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    DisasterUpdated { id: String },
    SocialMediaUpdated { disaster_id: String },
    ResourcesUpdated { disaster_id: String },
    Other,
}

impl LiveEvent {
    pub fn from_push(event: &PushEvent) -> Self {
        let field = |key: &str| -> Option<String> {
            match event.payload.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };
        match event.name.as_str() {
            DISASTER_UPDATED => field("id")
                .map(|id| LiveEvent::DisasterUpdated { id })
                .unwrap_or(LiveEvent::Other),
            SOCIAL_MEDIA_UPDATED => field("disasterId")
                .map(|disaster_id| LiveEvent::SocialMediaUpdated { disaster_id })
                .unwrap_or(LiveEvent::Other),
            RESOURCES_UPDATED => field("disasterId")
                .map(|disaster_id| LiveEvent::ResourcesUpdated { disaster_id })
                .unwrap_or(LiveEvent::Other),
            _ => LiveEvent::Other,
        }
    }

    /// Identifier of the disaster the event concerns.
    pub fn disaster_id(&self) -> Option<&str> {
        match self {
            LiveEvent::DisasterUpdated { id } => Some(id),
            LiveEvent::SocialMediaUpdated { disaster_id }
            | LiveEvent::ResourcesUpdated { disaster_id } => Some(disaster_id),
            LiveEvent::Other => None,
        }
    }
}
