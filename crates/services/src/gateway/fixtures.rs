//! Built-in demo payloads served when the remote API is unreachable.
//!
//! Timestamps are relative to `now` so the demo always looks recent. These
//! values are illustrative only and must never be persisted.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

fn ago(now: DateTime<Utc>, seconds: i64) -> String {
    (now - Duration::seconds(seconds)).to_rfc3339()
}

pub fn demo_disasters(now: DateTime<Utc>) -> Value {
    json!([
        {
            "id": "1",
            "title": "Earthquake in California",
            "description": "A 6.2 magnitude earthquake struck Northern California, affecting multiple counties.",
            "tags": ["earthquake", "emergency", "california"],
            "location_name": "Northern California, USA",
            "latitude": 37.7749,
            "longitude": -122.4194,
            "created_at": ago(now, 86_400),
            "updated_at": now.to_rfc3339(),
        },
        {
            "id": "2",
            "title": "Hurricane Maria Recovery",
            "description": "Ongoing recovery efforts following Hurricane Maria's impact on the coastal regions.",
            "tags": ["hurricane", "recovery", "coastal"],
            "location_name": "Gulf Coast, USA",
            "latitude": 29.7604,
            "longitude": -95.3698,
            "created_at": ago(now, 172_800),
            "updated_at": now.to_rfc3339(),
        }
    ])
}

pub fn demo_social_posts(now: DateTime<Utc>) -> Value {
    json!([
        {
            "id": "1",
            "content": "Emergency shelters are now open at the community center. Please bring essentials and stay safe.",
            "platform": "Twitter",
            "author": "Emergency Services",
            "timestamp": ago(now, 3_600),
            "engagement": 245,
        },
        {
            "id": "2",
            "content": "Road closures on Highway 101 due to ongoing emergency response. Use alternate routes.",
            "platform": "Facebook",
            "author": "Local Traffic Authority",
            "timestamp": ago(now, 7_200),
            "engagement": 156,
        }
    ])
}

pub fn demo_resources() -> Value {
    json!([
        {
            "id": "1",
            "name": "Red Cross Emergency Shelter",
            "type": "Shelter",
            "location": "123 Main St, Downtown",
            "availability": "Available",
            "contact": "(555) 123-4567",
        },
        {
            "id": "2",
            "name": "Mobile Medical Unit",
            "type": "Medical",
            "location": "City Park, North Side",
            "availability": "Available",
            "contact": "(555) 987-6543",
        }
    ])
}

pub fn demo_official_updates(now: DateTime<Utc>) -> Value {
    json!([
        {
            "id": "1",
            "title": "Evacuation Order Lifted",
            "content": "The mandatory evacuation order for zones A and B has been lifted. Residents may return to their homes.",
            "timestamp": ago(now, 1_800),
            "author": "Emergency Management Office",
            "priority": "high",
        },
        {
            "id": "2",
            "title": "Water Service Restoration",
            "content": "Water service has been restored to 85% of affected areas. Boil water advisory remains in effect.",
            "timestamp": ago(now, 3_600),
            "author": "Public Utilities",
            "priority": "medium",
        }
    ])
}

pub fn verified_receipt() -> Value {
    json!({ "isValid": true, "message": "Image verified successfully" })
}
