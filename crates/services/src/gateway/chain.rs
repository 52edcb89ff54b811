use async_trait::async_trait;
use domains::{ApiRequest, ApiResponse, ResponseSource, Transport, TransportError};
use std::sync::Arc;
use tracing::{info, warn};

/// A hook around every gateway exchange.
///
/// All methods default to no-ops so an interceptor only implements what it
/// cares about.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called before the transport sees the request.
    async fn before_send(&self, _request: &ApiRequest) {}

    /// Called with the final response, remote or substituted.
    async fn after_receive(&self, _request: &ApiRequest, _response: &ApiResponse) {}

    /// Offered every transport failure in chain order. The first interceptor
    /// returning `Some` answers the request on behalf of the remote service.
    async fn on_failure(
        &self,
        _request: &ApiRequest,
        _error: &TransportError,
    ) -> Option<ApiResponse> {
        None
    }

    /// Called when no interceptor answered and the failure is about to
    /// reach the caller.
    async fn after_failure(&self, _request: &ApiRequest, _error: &TransportError) {}
}

/// Ordered interceptors applied to each request.
///
/// Passed into [`crate::DisasterGateway::new`] rather than installed on a
/// shared transport, so each gateway (and each test) owns its own chain.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs `request` through the chain and the transport.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        for interceptor in &self.interceptors {
            interceptor.before_send(request).await;
        }

        let response = match transport.send(request).await {
            Ok(response) => response,
            Err(error) => match self.recover(request, &error).await {
                Some(response) => response,
                None => {
                    for interceptor in &self.interceptors {
                        interceptor.after_failure(request, &error).await;
                    }
                    return Err(error);
                }
            },
        };

        for interceptor in &self.interceptors {
            interceptor.after_receive(request, &response).await;
        }
        Ok(response)
    }

    async fn recover(&self, request: &ApiRequest, error: &TransportError) -> Option<ApiResponse> {
        for interceptor in &self.interceptors {
            if let Some(response) = interceptor.on_failure(request, error).await {
                return Some(response);
            }
        }
        None
    }
}

/// Logs every exchange with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn before_send(&self, request: &ApiRequest) {
        info!(
            method = %request.method,
            url = %request.url(),
            payload = ?request.body,
            "api request"
        );
    }

    async fn after_receive(&self, request: &ApiRequest, response: &ApiResponse) {
        let fallback = response.source == ResponseSource::Fallback;
        info!(
            status = response.status,
            url = %request.url(),
            fallback,
            "api response"
        );
    }

    async fn on_failure(&self, request: &ApiRequest, error: &TransportError) -> Option<ApiResponse> {
        let status = error
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "network error".to_owned());
        warn!(
            method = %request.method,
            url = %request.url(),
            %status,
            %error,
            "api error, trying fallback data"
        );
        None
    }

    async fn after_failure(&self, request: &ApiRequest, error: &TransportError) {
        warn!(
            method = %request.method,
            url = %request.url(),
            %error,
            "no fallback for endpoint, propagating failure"
        );
    }
}
