mod common;

use common::{eventually, gateway_with, ScriptedPush, ScriptedTransport, SlowTransport};
use domains::{
    ApiRequest, ApiResponse, PushEvent, TransportError, DISASTER_UPDATED, RESOURCES_UPDATED,
    SOCIAL_MEDIA_UPDATED,
};
use serde_json::json;
use services::screens::{DISASTER_NOT_FOUND, NO_OFFICIAL_UPDATES, NO_RESOURCES, NO_SOCIAL_POSTS};
use services::{ApiStatus, DetailScreen, FallbackTable, LiveUpdates, PanelView, ReconnectPolicy};
use std::time::Duration;

#[tokio::test]
async fn failed_disaster_fetch_leaves_every_panel_with_a_placeholder() {
    let transport = ScriptedTransport::offline();
    let screen = DetailScreen::new(gateway_with(transport, FallbackTable::empty()), None, "42");
    screen.mount().await;

    let state = screen.state();
    assert!(!state.loading);
    assert!(state.disaster.is_none());
    assert_eq!(state.api_status(), ApiStatus::Unavailable);
    assert_eq!(state.social_panel(), PanelView::Empty(NO_SOCIAL_POSTS));
    assert_eq!(state.resources_panel(), PanelView::Empty(NO_RESOURCES));
    assert_eq!(state.updates_panel(), PanelView::Empty(NO_OFFICIAL_UPDATES));
    assert_eq!(DISASTER_NOT_FOUND, "Disaster not found");
}

#[tokio::test]
async fn demo_data_marks_the_screen_as_fallback() {
    let screen = DetailScreen::new(
        gateway_with(ScriptedTransport::offline(), FallbackTable::demo()),
        None,
        "1",
    );
    screen.mount().await;
    let state = screen.state();
    assert_eq!(state.api_status(), ApiStatus::Fallback);
    assert_eq!(state.disaster.as_ref().map(|d| d.id.as_str()), Some("1"));
    assert!(!state.social_posts.is_empty());
    assert!(!state.official_updates.is_empty());
}

fn flood_api(req: &ApiRequest) -> Result<ApiResponse, TransportError> {
    let body = match req.path.as_str() {
        "/getDisasters" => {
            json!([{ "id": "7", "title": "Flood", "latitude": 10.5, "longitude": 20.25 }])
        }
        "/social-media/7" => json!([{
            "id": "p1", "content": "Water rising", "timestamp": "2024-05-01T10:00:00Z"
        }]),
        _ => json!([]),
    };
    Ok(ApiResponse::remote(200, body))
}

fn quick_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        connect_delay: Duration::from_millis(10),
        max_attempts: 1,
        backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn push_events_refetch_only_the_matching_collection() {
    let transport = ScriptedTransport::new(flood_api);
    let push = ScriptedPush::new();
    let session = push.open_session();
    let live = LiveUpdates::new(push.clone(), quick_policy());
    let screen = DetailScreen::new(
        gateway_with(transport.clone(), FallbackTable::empty()),
        Some(live.clone()),
        "7",
    );
    screen.mount().await;
    assert!(eventually(|| live.status().connected).await);
    assert_eq!(transport.count("/resources/7"), 1);
    assert_eq!(transport.count("/social-media/7"), 1);

    // another disaster's event is ignored
    session
        .send(PushEvent::new(RESOURCES_UPDATED, json!({ "disasterId": "8" })))
        .unwrap();
    session
        .send(PushEvent::new(RESOURCES_UPDATED, json!({ "disasterId": "7" })))
        .unwrap();
    assert!(eventually(|| transport.count("/resources/7") == 2).await);

    session
        .send(PushEvent::new(SOCIAL_MEDIA_UPDATED, json!({ "disasterId": 7 })))
        .unwrap();
    assert!(eventually(|| transport.count("/social-media/7") == 2).await);
    assert_eq!(transport.count("/resources/8"), 0);
    assert_eq!(transport.count("/resources/7"), 2);

    let resources = transport
        .requests()
        .into_iter()
        .filter(|r| r.path == "/resources/7")
        .last()
        .unwrap();
    assert_eq!(resources.url(), "/resources/7?lat=10.5&lon=20.25");

    screen.unmount();
    assert!(live.is_closed());
}

#[tokio::test]
async fn disaster_updated_after_unmount_fetches_nothing() {
    let transport = ScriptedTransport::new(flood_api);
    let push = ScriptedPush::new();
    let session = push.open_session();
    let live = LiveUpdates::new(push.clone(), quick_policy());
    let screen = DetailScreen::new(
        gateway_with(transport.clone(), FallbackTable::empty()),
        Some(live.clone()),
        "7",
    );
    screen.mount().await;
    assert!(eventually(|| live.status().connected).await);
    let fetched = transport.requests().len();

    screen.unmount();
    assert_eq!(live.handler_count(), 0);
    let _ = session.send(PushEvent::new(DISASTER_UPDATED, json!({ "id": "7" })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.requests().len(), fetched);
    assert_eq!(screen.state().disaster.map(|d| d.title), Some("Flood".to_owned()));
}

#[tokio::test]
async fn unmount_while_loading_drops_every_late_response() {
    let transport = ScriptedTransport::new(flood_api);
    let slow = SlowTransport::wrap(transport.clone(), Duration::from_millis(200));
    let screen = DetailScreen::new(gateway_with(slow, FallbackTable::empty()), None, "7");

    tokio::join!(screen.mount(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        screen.unmount();
    });
    assert!(transport.count("/social-media/7") == 1);
    let state = screen.state();
    assert!(state.loading);
    assert!(state.disaster.is_none());
    assert!(state.social_posts.is_empty());
    assert!(state.official_updates.is_empty());
}
