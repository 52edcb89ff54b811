use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{ApiRequest, ApiResponse, HttpMethod, TransportError};
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::chain::Interceptor;
use super::fixtures;

/// Delay before a substituted answer, so the demo feels like a network call.
pub const DEFAULT_FALLBACK_LATENCY: Duration = Duration::from_millis(300);

/// How a matching rule builds its answer.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackResponder {
    /// A canned body
    Static(Value),
    /// Echo the request body as a freshly created disaster,
    /// wrapped as `{disaster, message}`
    EchoCreated,
    /// Echo the request body merged with the id from the last path segment
    EchoUpdated,
}

/// Matches failed requests by URL substring and optional method.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRule {
    pub pattern: String,
    pub method: Option<HttpMethod>,
    pub responder: FallbackResponder,
}

impl FallbackRule {
    pub fn new(pattern: impl Into<String>, responder: FallbackResponder) -> Self {
        Self {
            pattern: pattern.into(),
            method: None,
            responder,
        }
    }

    pub fn only(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn matches(&self, request: &ApiRequest) -> bool {
        self.method.map_or(true, |m| m == request.method) && request.url().contains(&self.pattern)
    }

    pub fn respond(&self, request: &ApiRequest, now: DateTime<Utc>) -> Value {
        match &self.responder {
            FallbackResponder::Static(body) => body.clone(),
            FallbackResponder::EchoCreated => {
                let mut disaster = body_object(request);
                disaster.insert("id".into(), json!(Uuid::now_v7().to_string()));
                disaster.insert("created_at".into(), json!(now.to_rfc3339()));
                disaster.insert("updated_at".into(), json!(now.to_rfc3339()));
                json!({ "disaster": disaster, "message": "Disaster created successfully" })
            }
            FallbackResponder::EchoUpdated => {
                let mut disaster = body_object(request);
                let segment = request.last_segment().unwrap_or_default();
                let id = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));
                disaster.insert("id".into(), json!(id));
                disaster.insert("updated_at".into(), json!(now.to_rfc3339()));
                Value::Object(disaster)
            }
        }
    }
}

fn body_object(request: &ApiRequest) -> Map<String, Value> {
    match &request.body {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Ordered fallback rules; the first match answers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackTable {
    rules: Vec<FallbackRule>,
}

impl FallbackTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: FallbackRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The built-in demo table covering every endpoint the dashboard calls.
    pub fn demo() -> Self {
        let now = Utc::now();
        Self::empty()
            .with_rule(FallbackRule::new(
                "/getDisasters",
                FallbackResponder::Static(fixtures::demo_disasters(now)),
            ))
            .with_rule(FallbackRule::new(
                "/social-media/",
                FallbackResponder::Static(fixtures::demo_social_posts(now)),
            ))
            .with_rule(FallbackRule::new(
                "/resources/",
                FallbackResponder::Static(fixtures::demo_resources()),
            ))
            // also covers /disaster/official-updates-no-cache/
            .with_rule(FallbackRule::new(
                "/official-updates",
                FallbackResponder::Static(fixtures::demo_official_updates(now)),
            ))
            .with_rule(
                FallbackRule::new("/createDisaster", FallbackResponder::EchoCreated)
                    .only(HttpMethod::Post),
            )
            .with_rule(
                FallbackRule::new("/update/", FallbackResponder::EchoUpdated).only(HttpMethod::Put),
            )
            .with_rule(
                FallbackRule::new(
                    "/verify-image/",
                    FallbackResponder::Static(fixtures::verified_receipt()),
                )
                .only(HttpMethod::Post),
            )
    }

    pub fn lookup(&self, request: &ApiRequest) -> Option<&FallbackRule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Answers failed requests from a [`FallbackTable`].
#[derive(Debug, Clone)]
pub struct FallbackInterceptor {
    table: FallbackTable,
    latency: Duration,
}

impl FallbackInterceptor {
    pub fn new(table: FallbackTable) -> Self {
        Self {
            table,
            latency: DEFAULT_FALLBACK_LATENCY,
        }
    }

    pub fn demo() -> Self {
        Self::new(FallbackTable::demo())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl Interceptor for FallbackInterceptor {
    async fn on_failure(&self, request: &ApiRequest, _error: &TransportError) -> Option<ApiResponse> {
        let rule = self.table.lookup(request)?;
        debug!(pattern = %rule.pattern, url = %request.url(), "serving fallback data");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Some(ApiResponse::fallback(rule.respond(request, Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_table_matches_every_dashboard_endpoint() {
        let table = FallbackTable::demo();
        let cases = [
            ApiRequest::get("/getDisasters"),
            ApiRequest::get("/social-media/5"),
            ApiRequest::get("/resources/5").with_query("lat", 1).with_query("lon", 2),
            ApiRequest::get("/official-updates/5"),
            ApiRequest::get("/disaster/official-updates-no-cache/5"),
            ApiRequest::post("/createDisaster", json!({})),
            ApiRequest::put("/update/5", json!({})),
            ApiRequest::post("/verify-image/5", json!({})),
        ];
        for request in &cases {
            assert!(table.lookup(request).is_some(), "no rule for {}", request.url());
        }
    }

    #[test]
    fn method_restricted_rules_ignore_other_methods() {
        let table = FallbackTable::demo();
        assert!(table.lookup(&ApiRequest::get("/createDisaster")).is_none());
        assert!(table.lookup(&ApiRequest::get("/update/5")).is_none());
        assert!(table.lookup(&ApiRequest::get("/nothing-here")).is_none());
    }

    #[test]
    fn echo_created_wraps_payload_with_generated_identity() {
        let rule = FallbackRule::new("/createDisaster", FallbackResponder::EchoCreated);
        let request = ApiRequest::post("/createDisaster", json!({ "title": "T", "tags": ["a", "b"] }));
        let now = Utc::now();
        let body = rule.respond(&request, now);

        assert_eq!(body["message"], "Disaster created successfully");
        assert_eq!(body["disaster"]["title"], "T");
        assert_eq!(body["disaster"]["tags"], json!(["a", "b"]));
        assert_eq!(body["disaster"]["created_at"], json!(now.to_rfc3339()));
        assert!(!body["disaster"]["id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn echo_updated_takes_id_from_path() {
        let rule = FallbackRule::new("/update/", FallbackResponder::EchoUpdated);
        let request = ApiRequest::put("/update/abc", json!({ "title": "Renamed" }));
        let body = rule.respond(&request, Utc::now());
        assert_eq!(body["id"], "abc");
        assert_eq!(body["title"], "Renamed");
        assert!(body.get("created_at").is_none());

        let escaped = ApiRequest::put("/update/a%2Fb", json!({}));
        assert_eq!(rule.respond(&escaped, Utc::now())["id"], "a/b");
    }

    #[tokio::test]
    async fn interceptor_declines_unknown_endpoints() {
        let interceptor = FallbackInterceptor::demo().with_latency(Duration::ZERO);
        let err = TransportError::Timeout;
        assert!(interceptor
            .on_failure(&ApiRequest::get("/health"), &err)
            .await
            .is_none());
        let res = interceptor
            .on_failure(&ApiRequest::get("/getDisasters"), &err)
            .await
            .unwrap();
        assert_eq!(res.source, domains::ResponseSource::Fallback);
    }

    #[test]
    fn report_fallback_is_a_positive_receipt() {
        let interceptor = FallbackInterceptor::demo().with_latency(Duration::ZERO);
        let request = ApiRequest::post("/verify-image/1", json!({ "imageUrl": "https://x/y.jpg" }));
        let res = tokio_test::block_on(
            interceptor.on_failure(&request, &TransportError::Network("down".into())),
        )
        .unwrap();
        assert_eq!(res.body["isValid"], true);
        assert_eq!(res.body["message"], "Image verified successfully");
    }
}
