use domains::{Disaster, Result, DISASTER_UPDATED};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use super::forms::CreateForm;
use super::guard::{FetchGuard, Slot, Ticket};
use super::{ApiStatus, PanelView, LOADING_DISASTERS, NO_DISASTERS};
use crate::gateway::DisasterGateway;
use crate::live::{ConnectionStatus, LiveUpdates, SubscriptionId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    /// True until the first list fetch resolves
    pub loading: bool,
    pub disasters: Vec<Disaster>,
    pub api_status: ApiStatus,
    pub create_form: CreateForm,
    pub form_open: bool,
    pub submitting: bool,
    pub form_error: Option<String>,
    pub notice: Option<String>,
}

impl ListState {
    fn initial() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn panel(&self) -> PanelView<Disaster> {
        PanelView::of(self.loading, self.disasters.clone(), LOADING_DISASTERS, NO_DISASTERS)
    }
}

struct ListInner {
    gateway: Arc<DisasterGateway>,
    live: Option<LiveUpdates>,
    state: Mutex<ListState>,
    guard: FetchGuard,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

/// The disaster listing with its create form.
pub struct ListScreen {
    inner: Arc<ListInner>,
}

impl ListScreen {
    pub fn new(gateway: Arc<DisasterGateway>, live: Option<LiveUpdates>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                gateway,
                live,
                state: Mutex::new(ListState::initial()),
                guard: FetchGuard::default(),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribes to push events, schedules the live connection and loads
    /// the list.
    pub async fn mount(&self) {
        self.inner.guard.set_mounted(true);
        if let Some(live) = &self.inner.live {
            let weak = Arc::downgrade(&self.inner);
            let id = live.on(DISASTER_UPDATED, move |event| {
                debug!(payload = %event.payload, "disaster updated");
                ListInner::spawn_refresh(&weak);
            });
            self.inner.subscriptions.lock().push(id);
            live.start();
        }
        self.inner.refresh().await;
    }

    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub fn state(&self) -> ListState {
        self.inner.state.lock().clone()
    }

    pub fn live_status(&self) -> Option<ConnectionStatus> {
        self.inner.live.as_ref().map(LiveUpdates::status)
    }

    pub fn toggle_create_form(&self) {
        let mut state = self.inner.state.lock();
        state.form_open = !state.form_open;
    }

    pub fn open_create_form(&self) {
        self.inner.state.lock().form_open = true;
    }

    pub fn close_create_form(&self) {
        self.inner.state.lock().form_open = false;
    }

    pub fn edit_create_form(&self, edit: impl FnOnce(&mut CreateForm)) {
        edit(&mut self.inner.state.lock().create_form);
    }

    /// Reopens the create form with a rejected submission and its error.
    pub fn restore_create_form(&self, form: CreateForm, error: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.create_form = form;
        state.form_open = true;
        state.submitting = false;
        state.form_error = Some(error.into());
    }

    /// Submits the create form.
    ///
    /// The list only changes after the server (or the fallback layer)
    /// confirms; on failure the form stays open with its values so the user
    /// can retry.
    pub async fn submit_create(&self) -> Result<Disaster> {
        let form = {
            let mut state = self.inner.state.lock();
            state.submitting = true;
            state.form_error = None;
            state.notice = None;
            state.create_form.clone()
        };

        let outcome = match form.to_payload() {
            Ok(payload) => self.inner.gateway.create(&payload).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(created) => {
                info!(id = %created.data.id, fallback = created.is_fallback(), "disaster created");
                {
                    let mut state = self.inner.state.lock();
                    state.submitting = false;
                    state.create_form = CreateForm::default();
                    state.form_open = false;
                    state.notice = Some("Disaster created successfully".into());
                }
                self.inner.refresh().await;
                Ok(created.data)
            }
            Err(err) => {
                error!(error = %err, "error creating disaster");
                let mut state = self.inner.state.lock();
                state.submitting = false;
                state.form_open = true;
                state.form_error = Some(err.to_string());
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

impl ListInner {
    fn spawn_refresh(weak: &Weak<ListInner>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.guard.is_mounted() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { inner.refresh().await });
            }
            Err(_) => debug!("no runtime to refresh on"),
        }
    }

    fn apply(&self, ticket: Ticket, update: impl FnOnce(&mut ListState)) -> bool {
        let mut state = self.state.lock();
        if !self.guard.is_current(ticket) {
            debug!("dropping stale disaster list response");
            return false;
        }
        update(&mut state);
        true
    }

    async fn refresh(&self) {
        let ticket = self.guard.issue(Slot::Disasters);
        self.apply(ticket, |s| s.api_status = ApiStatus::Checking);
        let result = self.gateway.list().await;
        self.apply(ticket, |s| {
            match result {
                Ok(fetched) => {
                    s.api_status = ApiStatus::from_source(fetched.source);
                    s.disasters = fetched.data;
                }
                Err(err) => {
                    error!(error = %err, "error fetching disasters");
                    s.api_status = ApiStatus::Unavailable;
                }
            }
            s.loading = false;
        });
    }
}
