//! # Domain Models
//!
//! Client-side views of the entities owned by the remote disaster service.
//! Identifiers are opaque server strings; the client never mints them except
//! when synthesizing fallback data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything with a collection-unique identifier.
pub trait Identified {
    fn id(&self) -> &str;
}

/// A tracked disaster event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disaster {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-text tags, order preserved exactly as submitted
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Opaque server-side audit entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_trail: Option<Vec<serde_json::Value>>,
}

impl Disaster {
    /// The disaster's position, if it has a usable one.
    ///
    /// The create form submits `0, 0` as a placeholder, so only that exact
    /// pair counts as unset. A zero on a single axis is a real position.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) if !(latitude == 0.0 && longitude == 0.0) => {
                Some(Coordinates { latitude, longitude })
            }
            _ => None,
        }
    }
}

impl Identified for Disaster {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Used for resource lookups when the disaster has no position yet.
    pub const DEFAULT: Coordinates = Coordinates {
        latitude: 40.7128,
        longitude: -74.006,
    };
}

/// A social-media post surfaced for a disaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMediaPost {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub engagement: u64,
}

impl Identified for SocialMediaPost {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A relief resource near a disaster (shelter, medical unit, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub location: String,
    /// Free text, e.g. "Available"
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub contact: String,
}

impl Resource {
    pub fn is_available(&self) -> bool {
        self.availability == "Available"
    }
}

impl Identified for Resource {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An announcement from an official source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialUpdate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub author: String,
    /// "high", "medium", ...
    #[serde(default)]
    pub priority: String,
}

impl OfficialUpdate {
    pub fn is_high_priority(&self) -> bool {
        self.priority.eq_ignore_ascii_case("high")
    }
}

impl Identified for OfficialUpdate {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Body of `POST /createDisaster`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDisaster {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(
        rename = "locationDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub location_description: Option<String>,
}

/// Body of `PUT /update/{id}`. Absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDisaster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
}

/// A field report backed by an image to verify.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSubmission {
    pub content: String,
    pub image_url: String,
}

/// Answer of `POST /verify-image/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReceipt {
    #[serde(rename = "isValid", default)]
    pub is_valid: bool,
    #[serde(default)]
    pub message: String,
}

/// Identity a call is made under. The remote service decides what each
/// role may do; the client only labels its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    /// May create disasters and submit reports
    Contributor,
    /// May update disasters
    Admin,
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallerRole::Contributor => f.write_str("contributor"),
            CallerRole::Admin => f.write_str("admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disaster_at(latitude: Option<f64>, longitude: Option<f64>) -> Disaster {
        Disaster {
            id: "1".into(),
            title: "Quake".into(),
            description: String::new(),
            tags: vec![],
            location_name: None,
            latitude,
            longitude,
            created_at: None,
            updated_at: None,
            owner_id: None,
            audit_trail: None,
        }
    }

    #[test]
    fn coordinates_require_both_axes() {
        assert!(disaster_at(Some(37.7), None).coordinates().is_none());
        assert!(disaster_at(None, Some(-122.4)).coordinates().is_none());
        let c = disaster_at(Some(37.7), Some(-122.4)).coordinates().unwrap();
        assert_eq!(c.latitude, 37.7);
    }

    #[test]
    fn zero_placeholder_coordinates_are_unset() {
        assert!(disaster_at(Some(0.0), Some(0.0)).coordinates().is_none());
    }

    #[test]
    fn single_zero_axis_is_a_real_position() {
        let c = disaster_at(Some(0.0), Some(32.5)).coordinates().unwrap();
        assert_eq!((c.latitude, c.longitude), (0.0, 32.5));
        let c = disaster_at(Some(-1.25), Some(0.0)).coordinates().unwrap();
        assert_eq!((c.latitude, c.longitude), (-1.25, 0.0));
    }

    #[test]
    fn create_payload_uses_wire_names() {
        let payload = CreateDisaster {
            title: "T".into(),
            description: "D".into(),
            tags: vec!["a".into(), "b".into()],
            location_name: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            location_description: Some("river bank".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["locationDescription"], "river bank");
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn partial_update_omits_absent_fields() {
        let patch = UpdateDisaster {
            title: Some("New".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "New" }));
    }

    #[test]
    fn resource_type_field_maps_to_kind() {
        let raw = serde_json::json!({
            "id": "r1", "name": "Shelter", "type": "Shelter",
            "location": "Main St", "availability": "Full", "contact": "555"
        });
        let resource: Resource = serde_json::from_value(raw).unwrap();
        assert_eq!(resource.kind, "Shelter");
        assert!(!resource.is_available());
    }
}
