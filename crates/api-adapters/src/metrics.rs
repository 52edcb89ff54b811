//! Prometheus counters for gateway traffic.

use async_trait::async_trait;
use domains::{ApiRequest, ApiResponse, ResponseSource, TransportError};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use services::Interceptor;
use std::fmt;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub method: String,
    /// `remote`, `fallback` or `failed`
    pub outcome: String,
}

type Requests = Family<OutcomeLabels, Counter>;

pub struct GatewayMetrics {
    registry: Registry,
    requests: Requests,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("dashboard");
        let requests = Requests::default();
        registry.register(
            "gateway_requests",
            "Gateway calls by outcome",
            requests.clone(),
        );
        Self { registry, requests }
    }

    /// An interceptor feeding this registry; install it in the gateway chain.
    pub fn interceptor(&self) -> MetricsInterceptor {
        MetricsInterceptor {
            requests: self.requests.clone(),
        }
    }

    pub fn count(&self, method: &str, outcome: &str) -> u64 {
        self.requests
            .get_or_create(&OutcomeLabels {
                method: method.to_owned(),
                outcome: outcome.to_owned(),
            })
            .get()
    }

    /// OpenMetrics text exposition.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct MetricsInterceptor {
    requests: Requests,
}

impl MetricsInterceptor {
    fn record(&self, request: &ApiRequest, outcome: &str) {
        self.requests
            .get_or_create(&OutcomeLabels {
                method: request.method.as_str().to_owned(),
                outcome: outcome.to_owned(),
            })
            .inc();
    }
}

#[async_trait]
impl Interceptor for MetricsInterceptor {
    async fn after_receive(&self, request: &ApiRequest, response: &ApiResponse) {
        let outcome = match response.source {
            ResponseSource::Remote => "remote",
            ResponseSource::Fallback => "fallback",
        };
        self.record(request, outcome);
    }

    async fn after_failure(&self, request: &ApiRequest, _error: &TransportError) {
        self.record(request, "failed");
    }
}
