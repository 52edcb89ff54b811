//! Screen models for the list and detail pages.
//!
//! A screen owns transient copies of server data, issues fetches through
//! the gateway and re-fetches on push events. Responses that arrive after
//! unmount, or after a newer request for the same collection, are dropped.

mod detail;
pub mod forms;
mod guard;
mod list;

pub use detail::{DetailScreen, DetailState};
pub use forms::{parse_tags, CreateForm, ReportForm, UpdateForm};
pub use guard::Slot;
pub use list::{ListScreen, ListState};

use domains::ResponseSource;

pub const LOADING_DISASTERS: &str = "Loading disasters...";
pub const NO_DISASTERS: &str = "No disasters found";
pub const LOADING_DETAILS: &str = "Loading disaster details...";
pub const DISASTER_NOT_FOUND: &str = "Disaster not found";
pub const NO_SOCIAL_POSTS: &str = "No social media posts available";
pub const NO_RESOURCES: &str = "No resources available";
pub const NO_OFFICIAL_UPDATES: &str = "No official updates available";

/// What the screen knows about the remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiStatus {
    #[default]
    Checking,
    Connected,
    /// Demo data substituted by the fallback layer
    Fallback,
    /// A call failed with nothing to substitute
    Unavailable,
}

impl ApiStatus {
    pub fn from_source(source: ResponseSource) -> Self {
        match source {
            ResponseSource::Remote => ApiStatus::Connected,
            ResponseSource::Fallback => ApiStatus::Fallback,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApiStatus::Checking => "Checking API...",
            ApiStatus::Connected => "Connected to API Server",
            ApiStatus::Fallback => "Using Demo Data (API Unavailable)",
            ApiStatus::Unavailable => "API Unavailable",
        }
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, ApiStatus::Fallback | ApiStatus::Unavailable)
    }
}

/// Render-ready content of one collection panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelView<T> {
    Loading(&'static str),
    Empty(&'static str),
    Items(Vec<T>),
}

impl<T> PanelView<T> {
    pub fn of(loading: bool, items: Vec<T>, loading_text: &'static str, empty_text: &'static str) -> Self {
        if loading {
            PanelView::Loading(loading_text)
        } else if items.is_empty() {
            PanelView::Empty(empty_text)
        } else {
            PanelView::Items(items)
        }
    }

    /// Text shown instead of items, if any.
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            PanelView::Loading(text) | PanelView::Empty(text) => Some(*text),
            PanelView::Items(_) => None,
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            PanelView::Items(items) => items,
            _ => &[],
        }
    }
}
