use domains::{
    merge_unique, ApiRequest, AppError, CallerRole, Coordinates, CreateDisaster,
    CredentialProvider, Disaster, Fetched, OfficialUpdate, ReportSubmission, Resource,
    ResponseSource, Result, SocialMediaPost, Transport, UpdateDisaster, VerificationReceipt,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

use super::chain::MiddlewareChain;

/// Create and update endpoints answer either `{disaster, message}` or the
/// bare entity.
#[derive(Deserialize)]
#[serde(untagged)]
enum DisasterEnvelope {
    Wrapped { disaster: Disaster },
    Bare(Disaster),
}

impl From<DisasterEnvelope> for Disaster {
    fn from(envelope: DisasterEnvelope) -> Self {
        match envelope {
            DisasterEnvelope::Wrapped { disaster } | DisasterEnvelope::Bare(disaster) => disaster,
        }
    }
}

/// Escapes a disaster id for use as one path segment.
fn segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

/// Typed request facade over the remote disaster API.
#[derive(Clone)]
pub struct DisasterGateway {
    transport: Arc<dyn Transport>,
    chain: MiddlewareChain,
    credentials: Arc<dyn CredentialProvider>,
}

impl DisasterGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        chain: MiddlewareChain,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            chain,
            credentials,
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Fetched<T>> {
        let response = self.chain.execute(self.transport.as_ref(), &request).await?;
        let data = serde_json::from_value(response.body)?;
        Ok(Fetched {
            data,
            source: response.source,
        })
    }

    fn as_role(&self, request: ApiRequest, role: CallerRole) -> ApiRequest {
        request.with_headers(self.credentials.headers_for(role))
    }

    /// `GET /getDisasters`
    pub async fn list(&self) -> Result<Fetched<Vec<Disaster>>> {
        self.call(ApiRequest::get("/getDisasters")).await
    }

    /// Fetches the full list and filters locally; the API has no per-id
    /// endpoint. The demo list is filtered too, so an unknown id is
    /// `NotFound` even while falling back.
    pub async fn get_by_id(&self, id: &str) -> Result<Fetched<Disaster>> {
        let Fetched { data, source } = self.list().await?;
        data.into_iter()
            .find(|d| d.id == id)
            .map(|data| Fetched { data, source })
            .ok_or_else(|| AppError::NotFound("Disaster".into(), id.into()))
    }

    /// `POST /createDisaster` as a contributor.
    pub async fn create(&self, payload: &CreateDisaster) -> Result<Fetched<Disaster>> {
        let request = ApiRequest::post("/createDisaster", serde_json::to_value(payload)?);
        let fetched: Fetched<DisasterEnvelope> =
            self.call(self.as_role(request, CallerRole::Contributor)).await?;
        Ok(fetched.map(Disaster::from))
    }

    /// `PUT /update/{id}` as an admin.
    pub async fn update(&self, id: &str, patch: &UpdateDisaster) -> Result<Fetched<Disaster>> {
        let request = ApiRequest::put(format!("/update/{}", segment(id)), serde_json::to_value(patch)?);
        let fetched: Fetched<DisasterEnvelope> =
            self.call(self.as_role(request, CallerRole::Admin)).await?;
        Ok(fetched.map(Disaster::from))
    }

    /// `POST /verify-image/{id}` as a contributor. Only the image URL is
    /// sent; an empty one is rejected before any network call.
    pub async fn submit_report(
        &self,
        id: &str,
        report: &ReportSubmission,
    ) -> Result<Fetched<VerificationReceipt>> {
        let image_url = report.image_url.trim();
        if image_url.is_empty() {
            return Err(AppError::ValidationError(
                "an image URL is required to verify a report".into(),
            ));
        }
        let request = ApiRequest::post(
            format!("/verify-image/{}", segment(id)),
            json!({ "imageUrl": image_url }),
        );
        self.call(self.as_role(request, CallerRole::Contributor)).await
    }

    /// `GET /social-media/{id}`
    pub async fn social_media(&self, id: &str) -> Result<Fetched<Vec<SocialMediaPost>>> {
        self.call(ApiRequest::get(format!("/social-media/{}", segment(id)))).await
    }

    /// `GET /resources/{id}`, with `lat`/`lon` only when a position is given.
    pub async fn resources(
        &self,
        id: &str,
        near: Option<Coordinates>,
    ) -> Result<Fetched<Vec<Resource>>> {
        let mut request = ApiRequest::get(format!("/resources/{}", segment(id)));
        if let Some(c) = near {
            request = request
                .with_query("lat", c.latitude)
                .with_query("lon", c.longitude);
        }
        self.call(request).await
    }

    /// `GET /official-updates/{id}` (cached server-side)
    pub async fn official_updates(&self, id: &str) -> Result<Fetched<Vec<OfficialUpdate>>> {
        self.call(ApiRequest::get(format!("/official-updates/{}", segment(id)))).await
    }

    /// `GET /disaster/official-updates-no-cache/{id}`
    pub async fn official_updates_fresh(&self, id: &str) -> Result<Fetched<Vec<OfficialUpdate>>> {
        self.call(ApiRequest::get(format!(
            "/disaster/official-updates-no-cache/{}",
            segment(id)
        )))
        .await
    }

    /// Both official-update sources, fetched concurrently and merged by id.
    ///
    /// Each call's failure degrades to an empty list independently, so this
    /// never fails. The result is marked as fallback if either half was.
    pub async fn official_updates_merged(&self, id: &str) -> Fetched<Vec<OfficialUpdate>> {
        let (cached, fresh) = tokio::join!(self.official_updates(id), self.official_updates_fresh(id));
        let mut source = ResponseSource::Remote;
        let mut unpack = |result: Result<Fetched<Vec<OfficialUpdate>>>, which: &str| match result {
            Ok(fetched) => {
                if fetched.is_fallback() {
                    source = ResponseSource::Fallback;
                }
                fetched.data
            }
            Err(error) => {
                warn!(disaster_id = id, %error, source = which, "official updates unavailable");
                Vec::new()
            }
        };
        let cached = unpack(cached, "cached");
        let fresh = unpack(fresh, "fresh");
        Fetched {
            data: merge_unique(cached, fresh),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FallbackInterceptor, FallbackTable};
    use domains::{
        ApiResponse, HttpMethod, MockCredentialProvider, MockTransport, TransportError,
    };
    use std::time::Duration;

    fn credentials() -> Arc<dyn CredentialProvider> {
        let mut credentials = MockCredentialProvider::new();
        credentials.expect_headers_for().returning(|role| {
            vec![("x-user".to_string(), format!("{role}-label"))]
        });
        Arc::new(credentials)
    }

    fn demo_chain() -> MiddlewareChain {
        MiddlewareChain::new().with(FallbackInterceptor::demo().with_latency(Duration::ZERO))
    }

    fn offline() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(TransportError::Network("unreachable".into())));
        transport
    }

    #[tokio::test]
    async fn submit_report_without_image_never_touches_the_network() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);
        let gateway = DisasterGateway::new(Arc::new(transport), demo_chain(), credentials());

        let err = gateway
            .submit_report(
                "1",
                &ReportSubmission {
                    content: "flooded".into(),
                    image_url: "   ".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn role_headers_are_attached_per_operation() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.path == "/update/9"
                    && req.header("x-user") == Some("admin-label")
            })
            .returning(|_| Ok(ApiResponse::remote(200, json!({ "id": "9", "title": "New" }))));
        let gateway = DisasterGateway::new(Arc::new(transport), demo_chain(), credentials());

        let patch = UpdateDisaster {
            title: Some("New".into()),
            ..Default::default()
        };
        let updated = gateway.update("9", &patch).await.unwrap();
        assert_eq!(updated.data.title, "New");
        assert!(!updated.is_fallback());
    }

    #[tokio::test]
    async fn coordinates_are_appended_only_when_present() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url() == "/resources/3")
            .times(1)
            .returning(|_| Ok(ApiResponse::remote(200, json!([]))));
        transport
            .expect_send()
            .withf(|req| req.url() == "/resources/3?lat=1.5&lon=2.5")
            .times(1)
            .returning(|_| Ok(ApiResponse::remote(200, json!([]))));
        let gateway = DisasterGateway::new(Arc::new(transport), demo_chain(), credentials());

        gateway.resources("3", None).await.unwrap();
        gateway
            .resources(
                "3",
                Some(Coordinates {
                    latitude: 1.5,
                    longitude: 2.5,
                }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_by_id_filters_the_fallback_list() {
        let gateway = DisasterGateway::new(Arc::new(offline()), demo_chain(), credentials());

        let found = gateway.get_by_id("2").await.unwrap();
        assert_eq!(found.data.title, "Hurricane Maria Recovery");
        assert!(found.is_fallback());

        let missing = gateway.get_by_id("42").await.unwrap_err();
        assert_eq!(missing, AppError::NotFound("Disaster".into(), "42".into()));
    }

    #[tokio::test]
    async fn created_entity_is_unwrapped_from_envelope() {
        let gateway = DisasterGateway::new(Arc::new(offline()), demo_chain(), credentials());
        let payload = CreateDisaster {
            title: "T".into(),
            description: "D".into(),
            tags: vec!["a".into(), "b".into()],
            location_name: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            location_description: None,
        };
        let created = gateway.create(&payload).await.unwrap();
        assert_eq!(created.data.tags, vec!["a", "b"]);
        assert!(created.data.created_at.is_some());
        assert!(created.is_fallback());
    }

    #[tokio::test]
    async fn merged_updates_survive_one_failing_source() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.path.starts_with("/official-updates/"))
            .returning(|_| {
                Ok(ApiResponse::remote(
                    200,
                    json!([{ "id": "a", "title": "A", "timestamp": "2025-01-01T00:00:00Z" }]),
                ))
            });
        transport
            .expect_send()
            .withf(|req| req.path.starts_with("/disaster/"))
            .returning(|_| Err(TransportError::Status { status: 500, body: String::new() }));
        let gateway = DisasterGateway::new(
            Arc::new(transport),
            MiddlewareChain::new().with(FallbackInterceptor::new(FallbackTable::empty())),
            credentials(),
        );

        let merged = gateway.official_updates_merged("1").await;
        assert_eq!(merged.data.len(), 1);
        assert!(!merged.is_fallback());
    }

    #[tokio::test]
    async fn ids_are_escaped_as_one_path_segment() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.path == "/social-media/a%2Fb%3Fx%3D1%23c")
            .times(1)
            .returning(|_| Ok(ApiResponse::remote(200, json!([]))));
        let gateway = DisasterGateway::new(Arc::new(transport), demo_chain(), credentials());

        gateway.social_media("a/b?x=1#c").await.unwrap();
    }

    #[tokio::test]
    async fn remote_create_keeps_tags_wrapped_or_bare() {
        let mut transport = MockTransport::new();
        let mut answers = vec![
            json!({ "id": "b", "title": "T", "tags": ["a", "b"] }),
            json!({ "disaster": { "id": "w", "title": "T", "tags": ["a", "b"] }, "message": "ok" }),
        ];
        transport
            .expect_send()
            .withf(|req| req.path == "/createDisaster")
            .times(2)
            .returning(move |req| {
                assert_eq!(req.body.as_ref().unwrap()["tags"], json!(["a", "b"]));
                Ok(ApiResponse::remote(201, answers.pop().unwrap()))
            });
        let gateway = DisasterGateway::new(Arc::new(transport), demo_chain(), credentials());
        let payload = CreateDisaster {
            title: "T".into(),
            description: "D".into(),
            tags: vec!["a".into(), "b".into()],
            location_name: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            location_description: None,
        };

        for expected_id in ["w", "b"] {
            let created = gateway.create(&payload).await.unwrap();
            assert_eq!(created.data.id, expected_id);
            assert_eq!(created.data.tags, vec!["a", "b"]);
            assert!(!created.is_fallback());
        }
    }
}
