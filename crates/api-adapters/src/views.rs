//! HTML views for the list and detail screens.
//!
//! Screen state is flattened into plain strings and flags here so the
//! templates stay free of formatting logic.

use askama::Template;
use chrono::{DateTime, Utc};
use domains::{Disaster, OfficialUpdate, Resource, SocialMediaPost, VerificationReceipt};
use services::live::RECONNECT_EXHAUSTED;
use services::screens::{CreateForm, ReportForm, UpdateForm, DISASTER_NOT_FOUND, LOADING_DETAILS};
use services::{ApiStatus, ConnectionStatus, DetailState, ListState, PanelView};

pub struct StatusBadge {
    pub label: &'static str,
    pub degraded: bool,
}

impl From<ApiStatus> for StatusBadge {
    fn from(status: ApiStatus) -> Self {
        Self {
            label: status.label(),
            degraded: status.is_degraded(),
        }
    }
}

pub struct LiveBadge {
    pub label: String,
    pub connected: bool,
}

impl LiveBadge {
    pub fn new(status: Option<ConnectionStatus>) -> Self {
        match status {
            None => Self {
                label: "Real-time updates off".into(),
                connected: false,
            },
            Some(s) if s.connected => Self {
                label: "Real-time connected".into(),
                connected: true,
            },
            Some(s) if s.gave_up => Self {
                label: s.last_error.unwrap_or_else(|| RECONNECT_EXHAUSTED.to_owned()),
                connected: false,
            },
            Some(_) => Self {
                label: "Real-time disconnected".into(),
                connected: false,
            },
        }
    }
}

fn date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn date_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub struct DisasterCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub created: String,
    pub tags: Vec<String>,
    /// Four decimals, absent when the disaster has no usable position
    pub coordinates: Option<String>,
}

impl From<&Disaster> for DisasterCard {
    fn from(d: &Disaster) -> Self {
        Self {
            id: d.id.clone(),
            title: d.title.clone(),
            description: d.description.clone(),
            location: d
                .location_name
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Unknown location".into()),
            created: d.created_at.as_ref().map(date).unwrap_or_default(),
            tags: d.tags.clone(),
            coordinates: d
                .coordinates()
                .map(|c| format!("{:.4}, {:.4}", c.latitude, c.longitude)),
        }
    }
}

pub struct PostRow {
    pub author: String,
    pub platform: String,
    pub content: String,
    pub posted: String,
    pub engagement: u64,
}

impl From<&SocialMediaPost> for PostRow {
    fn from(p: &SocialMediaPost) -> Self {
        Self {
            author: p.author.clone(),
            platform: p.platform.clone(),
            content: p.content.clone(),
            posted: date_time(&p.timestamp),
            engagement: p.engagement,
        }
    }
}

pub struct ResourceRow {
    pub name: String,
    pub kind: String,
    pub location: String,
    pub availability: String,
    pub available: bool,
    pub contact: String,
}

impl From<&Resource> for ResourceRow {
    fn from(r: &Resource) -> Self {
        Self {
            name: r.name.clone(),
            kind: r.kind.clone(),
            location: r.location.clone(),
            availability: r.availability.clone(),
            available: r.is_available(),
            contact: r.contact.clone(),
        }
    }
}

pub struct UpdateRow {
    pub title: String,
    pub content: String,
    pub author: String,
    pub published: String,
    pub high_priority: bool,
}

impl From<&OfficialUpdate> for UpdateRow {
    fn from(u: &OfficialUpdate) -> Self {
        Self {
            title: u.title.clone(),
            content: u.content.clone(),
            author: u.author.clone(),
            published: date_time(&u.timestamp),
            high_priority: u.is_high_priority(),
        }
    }
}

/// A collection panel: either a placeholder text or rows.
pub struct Panel<R> {
    pub placeholder: Option<&'static str>,
    pub rows: Vec<R>,
}

impl<R> Panel<R> {
    fn from_view<T>(view: PanelView<T>) -> Self
    where
        for<'a> R: From<&'a T>,
    {
        Self {
            placeholder: view.placeholder(),
            rows: view.items().iter().map(R::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListPage {
    pub status: StatusBadge,
    pub live: LiveBadge,
    pub disasters: Panel<DisasterCard>,
    pub form: CreateForm,
    pub form_open: bool,
    pub form_error: Option<String>,
    pub notice: Option<String>,
    /// Server-sent event stream the page listens on, when live updates run
    pub events_url: Option<String>,
}

impl ListPage {
    pub fn new(state: &ListState, live: Option<ConnectionStatus>) -> Self {
        Self {
            status: state.api_status.into(),
            events_url: live.as_ref().map(|_| "/events".to_owned()),
            live: LiveBadge::new(live),
            disasters: Panel::from_view(state.panel()),
            form: state.create_form.clone(),
            form_open: state.form_open,
            form_error: state.form_error.clone(),
            notice: state.notice.clone(),
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailPage {
    pub status: StatusBadge,
    pub live: LiveBadge,
    pub disaster_id: String,
    pub disaster: Option<DisasterCard>,
    /// Shown instead of the disaster card
    pub missing: &'static str,
    pub social: Panel<PostRow>,
    pub resources: Panel<ResourceRow>,
    pub updates: Panel<UpdateRow>,
    pub update_form: UpdateForm,
    pub update_open: bool,
    pub update_error: Option<String>,
    pub report_form: ReportForm,
    pub report_open: bool,
    pub report_error: Option<String>,
    pub receipt: Option<VerificationReceipt>,
    pub notice: Option<String>,
    pub events_url: Option<String>,
}

impl DetailPage {
    pub fn new(disaster_id: &str, state: &DetailState, live: Option<ConnectionStatus>) -> Self {
        Self {
            status: state.api_status().into(),
            events_url: live
                .as_ref()
                .map(|_| format!("/events?disaster={}", urlencoding::encode(disaster_id))),
            live: LiveBadge::new(live),
            disaster_id: disaster_id.to_owned(),
            disaster: state.disaster.as_ref().map(DisasterCard::from),
            missing: if state.loading { LOADING_DETAILS } else { DISASTER_NOT_FOUND },
            social: Panel::from_view(state.social_panel()),
            resources: Panel::from_view(state.resources_panel()),
            updates: Panel::from_view(state.updates_panel()),
            update_form: state.update_form.clone(),
            update_open: state.update_form_open,
            update_error: state.update_error.clone(),
            report_form: state.report_form.clone(),
            report_open: state.report_form_open,
            report_error: state.report_error.clone(),
            receipt: state.last_receipt.clone(),
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn is_missing(&self) -> bool {
        self.disaster.is_none()
    }
}
