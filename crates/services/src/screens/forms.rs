//! HTML form state and its conversion into API payloads.

use domains::{AppError, CreateDisaster, Disaster, ReportSubmission, Result, UpdateDisaster};
use serde::Deserialize;

/// Splits a comma-separated tag field, trimming and dropping empties.
/// Order and duplicates are kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CreateForm {
    pub title: String,
    pub description: String,
    /// Comma-separated
    pub tags: String,
    pub location_name: String,
    pub location_description: String,
}

impl CreateForm {
    /// Coordinates are not collected by the form and go out as `0, 0`.
    pub fn to_payload(&self) -> Result<CreateDisaster> {
        let location_description = self.location_description.trim();
        Ok(CreateDisaster {
            title: required(&self.title, "title")?,
            description: required(&self.description, "description")?,
            tags: parse_tags(&self.tags),
            location_name: self.location_name.trim().to_owned(),
            latitude: 0.0,
            longitude: 0.0,
            location_description: (!location_description.is_empty())
                .then(|| location_description.to_owned()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateForm {
    pub title: String,
    pub description: String,
    pub tags: String,
    pub location_name: String,
}

impl UpdateForm {
    pub fn from_disaster(disaster: &Disaster) -> Self {
        Self {
            title: disaster.title.clone(),
            description: disaster.description.clone(),
            tags: disaster.tags.join(", "),
            location_name: disaster.location_name.clone().unwrap_or_default(),
        }
    }

    pub fn to_patch(&self) -> Result<UpdateDisaster> {
        Ok(UpdateDisaster {
            title: Some(required(&self.title, "title")?),
            description: Some(required(&self.description, "description")?),
            tags: Some(parse_tags(&self.tags)),
            location_name: Some(self.location_name.trim().to_owned()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportForm {
    pub content: String,
    pub image_url: String,
}

impl ReportForm {
    pub fn to_submission(&self) -> ReportSubmission {
        ReportSubmission {
            content: self.content.clone(),
            image_url: self.image_url.clone(),
        }
    }
}
