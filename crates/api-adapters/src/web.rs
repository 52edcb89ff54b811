//! axum routes serving the dashboard.
//!
//! Each page request builds a fresh screen, mounts it, renders the settled
//! state and unmounts it again. Form posts hit the API first: success
//! redirects, failure mounts a screen and re-renders with the form open.
//! Browsers follow push events through `/events`, a server-sent stream that
//! tells the page which panels to re-fetch.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use domains::{LiveEvent, DISASTER_UPDATED, RESOURCES_UPDATED, SOCIAL_MEDIA_UPDATED};
use serde::Deserialize;
use services::screens::{CreateForm, ReportForm, UpdateForm};
use services::{
    ConnectionStatus, DetailScreen, DisasterGateway, ListScreen, LiveUpdates, SubscriptionId,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::metrics::GatewayMetrics;
use crate::views::{DetailPage, ListPage};

/// Shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<DisasterGateway>,
    /// Application-wide subscriber feeding the badge and `/events`
    pub live: Option<LiveUpdates>,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    fn live_status(&self) -> Option<ConnectionStatus> {
        self.live.as_ref().map(LiveUpdates::status)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_page))
        .route("/disasters", post(create_disaster))
        .route("/disaster/{id}", get(detail_page))
        .route("/disaster/{id}/update", post(update_disaster))
        .route("/disaster/{id}/report", post(submit_report))
        .route("/events", get(live_events))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn render(template: &impl Template, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!(error = %err, "template rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn detail_location(id: &str) -> String {
    format!("/disaster/{}", urlencoding::encode(id))
}

#[derive(Debug, Default, Deserialize)]
pub struct Notice {
    pub created: Option<String>,
    pub updated: Option<String>,
}

async fn list_page(State(state): State<AppState>, Query(notice): Query<Notice>) -> Response {
    let screen = ListScreen::new(state.gateway.clone(), None);
    screen.mount().await;
    let mut page = ListPage::new(&screen.state(), state.live_status());
    screen.unmount();
    if notice.created.is_some() {
        page = page.with_notice("Disaster created successfully");
    }
    render(&page, StatusCode::OK)
}

async fn create_disaster(State(state): State<AppState>, Form(form): Form<CreateForm>) -> Response {
    let outcome = match form.to_payload() {
        Ok(payload) => state.gateway.create(&payload).await,
        Err(err) => Err(err),
    };
    let err = match outcome {
        Ok(created) => {
            info!(id = %created.data.id, fallback = created.is_fallback(), "disaster created");
            return Redirect::to("/?created=1").into_response();
        }
        Err(err) => err,
    };
    error!(error = %err, "error creating disaster");
    let screen = ListScreen::new(state.gateway.clone(), None);
    screen.mount().await;
    screen.restore_create_form(form, err.to_string());
    let page = ListPage::new(&screen.state(), state.live_status());
    screen.unmount();
    render(&page, StatusCode::UNPROCESSABLE_ENTITY)
}

async fn detail_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(notice): Query<Notice>,
) -> Response {
    let screen = DetailScreen::new(state.gateway.clone(), None, id.as_str());
    screen.mount().await;
    let mut page = DetailPage::new(&id, &screen.state(), state.live_status());
    screen.unmount();
    if notice.updated.is_some() {
        page = page.with_notice("Disaster updated successfully");
    }
    let status = if page.is_missing() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    render(&page, status)
}

/// Mounts a detail screen for a re-render after a post.
async fn remount(state: &AppState, id: &str, restore: impl FnOnce(&DetailScreen)) -> DetailPage {
    let screen = DetailScreen::new(state.gateway.clone(), None, id);
    screen.mount().await;
    restore(&screen);
    let page = DetailPage::new(id, &screen.state(), state.live_status());
    screen.unmount();
    page
}

async fn update_disaster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<UpdateForm>,
) -> Response {
    let outcome = match form.to_patch() {
        Ok(patch) => state.gateway.update(&id, &patch).await,
        Err(err) => Err(err),
    };
    match outcome {
        Ok(updated) => {
            info!(%id, fallback = updated.is_fallback(), "disaster updated");
            Redirect::to(&format!("{}?updated=1", detail_location(&id))).into_response()
        }
        Err(err) => {
            error!(error = %err, "error updating disaster");
            let page = remount(&state, &id, |screen| {
                screen.restore_update_form(form, err.to_string())
            })
            .await;
            render(&page, StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

async fn submit_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ReportForm>,
) -> Response {
    match state.gateway.submit_report(&id, &form.to_submission()).await {
        Ok(receipt) => {
            info!(%id, valid = receipt.data.is_valid, "report submitted");
            let page = remount(&state, &id, |screen| screen.show_receipt(receipt.data)).await;
            render(&page, StatusCode::OK)
        }
        Err(err) => {
            error!(error = %err, "error submitting report");
            let page = remount(&state, &id, |screen| {
                screen.restore_report_form(form, err.to_string())
            })
            .await;
            render(&page, StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only forward events concerning this disaster
    pub disaster: Option<String>,
}

/// Handlers registered for one `/events` client, removed when its stream
/// is dropped.
struct Subscription {
    live: LiveUpdates,
    ids: Vec<SubscriptionId>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.live.off(id);
        }
        debug!("event stream closed");
    }
}

async fn live_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let Some(live) = state.live.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let ids: Vec<SubscriptionId> = [DISASTER_UPDATED, SOCIAL_MEDIA_UPDATED, RESOURCES_UPDATED]
        .into_iter()
        .map(|name| {
            let tx = tx.clone();
            let only = query.disaster.clone();
            live.on(name, move |event| {
                if let Some(only) = &only {
                    if LiveEvent::from_push(event).disaster_id() != Some(only.as_str()) {
                        return;
                    }
                }
                // the receiver is gone once the client disconnects
                let _ = tx.send(event.name.clone());
            })
        })
        .collect();
    let subscription = Subscription { live, ids };

    let stream = futures_util::stream::unfold(
        (rx, subscription),
        |(mut rx, subscription)| async move {
            let name = rx.recv().await?;
            let event = Event::default().event(name).data("refresh");
            Some((Ok::<_, Infallible>(event), (rx, subscription)))
        },
    );
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}
