use domains::{
    AppError, Coordinates, Disaster, LiveEvent, OfficialUpdate, PushEvent, Resource,
    ResponseSource, Result, SocialMediaPost, VerificationReceipt, DISASTER_UPDATED,
    RESOURCES_UPDATED, SOCIAL_MEDIA_UPDATED,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use super::forms::{ReportForm, UpdateForm};
use super::guard::{FetchGuard, Slot, Ticket};
use super::{
    ApiStatus, PanelView, LOADING_DETAILS, NO_OFFICIAL_UPDATES, NO_RESOURCES, NO_SOCIAL_POSTS,
};
use crate::gateway::DisasterGateway;
use crate::live::{ConnectionStatus, LiveUpdates, SubscriptionId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailState {
    /// True until the initial round of fetches has resolved
    pub loading: bool,
    pub disaster: Option<Disaster>,
    pub social_posts: Vec<SocialMediaPost>,
    pub resources: Vec<Resource>,
    pub official_updates: Vec<OfficialUpdate>,
    /// Collections currently showing substituted demo data
    pub fallback_slots: BTreeSet<Slot>,
    /// Collections whose last fetch failed outright
    pub failed_slots: BTreeSet<Slot>,
    pub update_form: UpdateForm,
    pub update_form_open: bool,
    pub update_error: Option<String>,
    pub report_form: ReportForm,
    pub report_form_open: bool,
    pub report_error: Option<String>,
    pub last_receipt: Option<VerificationReceipt>,
}

impl DetailState {
    fn initial() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn api_status(&self) -> ApiStatus {
        if self.loading {
            ApiStatus::Checking
        } else if !self.fallback_slots.is_empty() {
            ApiStatus::Fallback
        } else if !self.failed_slots.is_empty() {
            ApiStatus::Unavailable
        } else {
            ApiStatus::Connected
        }
    }

    pub fn social_panel(&self) -> PanelView<SocialMediaPost> {
        PanelView::of(self.loading, self.social_posts.clone(), LOADING_DETAILS, NO_SOCIAL_POSTS)
    }

    pub fn resources_panel(&self) -> PanelView<Resource> {
        PanelView::of(self.loading, self.resources.clone(), LOADING_DETAILS, NO_RESOURCES)
    }

    pub fn updates_panel(&self) -> PanelView<OfficialUpdate> {
        PanelView::of(
            self.loading,
            self.official_updates.clone(),
            LOADING_DETAILS,
            NO_OFFICIAL_UPDATES,
        )
    }

    /// Position used for the resource lookup.
    pub fn resource_coordinates(&self) -> Coordinates {
        self.disaster
            .as_ref()
            .and_then(Disaster::coordinates)
            .unwrap_or(Coordinates::DEFAULT)
    }

    fn record_source(&mut self, slot: Slot, source: ResponseSource) {
        self.failed_slots.remove(&slot);
        match source {
            ResponseSource::Remote => self.fallback_slots.remove(&slot),
            ResponseSource::Fallback => self.fallback_slots.insert(slot),
        };
    }

    fn record_failure(&mut self, slot: Slot) {
        self.fallback_slots.remove(&slot);
        self.failed_slots.insert(slot);
    }
}

struct DetailInner {
    gateway: Arc<DisasterGateway>,
    live: Option<LiveUpdates>,
    disaster_id: String,
    state: Mutex<DetailState>,
    guard: FetchGuard,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

/// One disaster with its social-media, resources and official-updates tabs.
pub struct DetailScreen {
    inner: Arc<DetailInner>,
}

impl DetailScreen {
    pub fn new(
        gateway: Arc<DisasterGateway>,
        live: Option<LiveUpdates>,
        disaster_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(DetailInner {
                gateway,
                live,
                disaster_id: disaster_id.into(),
                state: Mutex::new(DetailState::initial()),
                guard: FetchGuard::default(),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn disaster_id(&self) -> &str {
        &self.inner.disaster_id
    }

    /// Subscribes to push events for this disaster, schedules the live
    /// connection and runs the initial fetches.
    pub async fn mount(&self) {
        self.inner.guard.set_mounted(true);
        if let Some(live) = &self.inner.live {
            let mut subscriptions = self.inner.subscriptions.lock();
            for event in [DISASTER_UPDATED, SOCIAL_MEDIA_UPDATED, RESOURCES_UPDATED] {
                let weak = Arc::downgrade(&self.inner);
                subscriptions.push(live.on(event, move |e| DetailInner::on_push(&weak, e)));
            }
            live.start();
        }
        self.load().await;
    }

    /// Runs every fetch concurrently. Resources wait for the disaster so the
    /// lookup uses its coordinates rather than the default pair.
    pub async fn load(&self) {
        let inner = &self.inner;
        tokio::join!(
            inner.refresh_disaster_and_resources(),
            inner.refresh_social_media(),
            inner.refresh_official_updates(),
        );
        let mut state = inner.state.lock();
        if inner.guard.is_mounted() {
            state.loading = false;
        }
    }

    pub async fn refresh_disaster(&self) {
        self.inner.refresh_disaster().await;
    }

    pub async fn refresh_social_media(&self) {
        self.inner.refresh_social_media().await;
    }

    pub async fn refresh_resources(&self) {
        self.inner.refresh_resources().await;
    }

    pub async fn refresh_official_updates(&self) {
        self.inner.refresh_official_updates().await;
    }

    pub fn state(&self) -> DetailState {
        self.inner.state.lock().clone()
    }

    pub fn live_status(&self) -> Option<ConnectionStatus> {
        self.inner.live.as_ref().map(LiveUpdates::status)
    }

    pub fn toggle_update_form(&self) {
        let mut state = self.inner.state.lock();
        state.update_form_open = !state.update_form_open;
    }

    pub fn toggle_report_form(&self) {
        let mut state = self.inner.state.lock();
        state.report_form_open = !state.report_form_open;
    }

    pub fn edit_update_form(&self, edit: impl FnOnce(&mut UpdateForm)) {
        let mut state = self.inner.state.lock();
        state.update_form_open = true;
        edit(&mut state.update_form);
    }

    pub fn edit_report_form(&self, edit: impl FnOnce(&mut ReportForm)) {
        let mut state = self.inner.state.lock();
        state.report_form_open = true;
        edit(&mut state.report_form);
    }

    /// Reopens the update form with a rejected submission and its error.
    pub fn restore_update_form(&self, form: UpdateForm, error: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.update_form = form;
        state.update_form_open = true;
        state.update_error = Some(error.into());
    }

    pub fn restore_report_form(&self, form: ReportForm, error: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.report_form = form;
        state.report_form_open = true;
        state.report_error = Some(error.into());
    }

    pub fn show_receipt(&self, receipt: VerificationReceipt) {
        self.inner.state.lock().last_receipt = Some(receipt);
    }

    /// Sends the update form as an admin. On failure the form stays open
    /// with its values.
    pub async fn submit_update(&self) -> Result<Disaster> {
        let form = {
            let mut state = self.inner.state.lock();
            state.update_error = None;
            state.update_form.clone()
        };
        let outcome = match form.to_patch() {
            Ok(patch) => self.inner.gateway.update(&self.inner.disaster_id, &patch).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(updated) => {
                info!(id = %self.inner.disaster_id, fallback = updated.is_fallback(), "disaster updated");
                self.inner.state.lock().update_form_open = false;
                self.inner.refresh_disaster().await;
                Ok(updated.data)
            }
            Err(err) => {
                error!(error = %err, "error updating disaster");
                let mut state = self.inner.state.lock();
                state.update_form_open = true;
                state.update_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Sends the report form as a contributor. An empty image URL is
    /// rejected without a network call.
    pub async fn submit_report(&self) -> Result<VerificationReceipt> {
        let submission = {
            let mut state = self.inner.state.lock();
            state.report_error = None;
            state.report_form.to_submission()
        };
        match self
            .inner
            .gateway
            .submit_report(&self.inner.disaster_id, &submission)
            .await
        {
            Ok(receipt) => {
                info!(id = %self.inner.disaster_id, valid = receipt.data.is_valid, "report submitted");
                let mut state = self.inner.state.lock();
                state.report_form = ReportForm::default();
                state.report_form_open = false;
                state.last_receipt = Some(receipt.data.clone());
                Ok(receipt.data)
            }
            Err(err) => {
                error!(error = %err, "error submitting report");
                let mut state = self.inner.state.lock();
                state.report_form_open = true;
                state.report_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Deregisters handlers, closes the live channel and drops any
    /// in-flight responses.
    pub fn unmount(&self) {
        {
            let _state = self.inner.state.lock();
            self.inner.guard.set_mounted(false);
        }
        if let Some(live) = &self.inner.live {
            for id in self.inner.subscriptions.lock().drain(..) {
                live.off(id);
            }
            live.close();
        }
    }
}

impl DetailInner {
    fn on_push(weak: &Weak<DetailInner>, event: &PushEvent) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.guard.is_mounted() {
            return;
        }
        let live_event = LiveEvent::from_push(event);
        if live_event.disaster_id() != Some(inner.disaster_id.as_str()) {
            return;
        }
        debug!(event = %event.name, id = %inner.disaster_id, "refreshing on push event");
        match live_event {
            LiveEvent::DisasterUpdated { .. } => {
                spawn(async move { inner.refresh_disaster_and_resources().await })
            }
            LiveEvent::SocialMediaUpdated { .. } => {
                spawn(async move { inner.refresh_social_media().await })
            }
            LiveEvent::ResourcesUpdated { .. } => {
                spawn(async move { inner.refresh_resources().await })
            }
            LiveEvent::Other => {}
        }
    }

    fn apply(&self, ticket: Ticket, update: impl FnOnce(&mut DetailState)) -> bool {
        let mut state = self.state.lock();
        if !self.guard.is_current(ticket) {
            debug!(id = %self.disaster_id, "dropping stale response");
            return false;
        }
        update(&mut state);
        true
    }

    async fn refresh_disaster_and_resources(&self) {
        self.refresh_disaster().await;
        self.refresh_resources().await;
    }

    async fn refresh_disaster(&self) {
        let ticket = self.guard.issue(Slot::Disaster);
        let result = self.gateway.get_by_id(&self.disaster_id).await;
        self.apply(ticket, |s| match result {
            Ok(fetched) => {
                s.record_source(Slot::Disaster, fetched.source);
                // never clobber edits in progress
                if !s.update_form_open {
                    s.update_form = UpdateForm::from_disaster(&fetched.data);
                }
                s.disaster = Some(fetched.data);
            }
            Err(AppError::NotFound(..)) => {
                s.record_source(Slot::Disaster, ResponseSource::Remote);
                s.disaster = None;
            }
            Err(err) => {
                error!(error = %err, "error fetching disaster details");
                s.record_failure(Slot::Disaster);
            }
        });
    }

    async fn refresh_social_media(&self) {
        let ticket = self.guard.issue(Slot::SocialMedia);
        let result = self.gateway.social_media(&self.disaster_id).await;
        self.apply(ticket, |s| match result {
            Ok(fetched) => {
                s.record_source(Slot::SocialMedia, fetched.source);
                s.social_posts = fetched.data;
            }
            Err(err) => {
                error!(error = %err, "error fetching social media");
                s.record_failure(Slot::SocialMedia);
                s.social_posts.clear();
            }
        });
    }

    async fn refresh_resources(&self) {
        let ticket = self.guard.issue(Slot::Resources);
        let near = self.state.lock().resource_coordinates();
        let result = self.gateway.resources(&self.disaster_id, Some(near)).await;
        self.apply(ticket, |s| match result {
            Ok(fetched) => {
                s.record_source(Slot::Resources, fetched.source);
                s.resources = fetched.data;
            }
            Err(err) => {
                error!(error = %err, "error fetching resources");
                s.record_failure(Slot::Resources);
                s.resources.clear();
            }
        });
    }

    async fn refresh_official_updates(&self) {
        let ticket = self.guard.issue(Slot::OfficialUpdates);
        let merged = self.gateway.official_updates_merged(&self.disaster_id).await;
        self.apply(ticket, |s| {
            s.record_source(Slot::OfficialUpdates, merged.source);
            s.official_updates = merged.data;
        });
    }
}

fn spawn(task: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => debug!("no runtime to refresh on"),
    }
}
