//! Fallback-aware API gateway.
//!
//! Requests flow `DisasterGateway` → [`MiddlewareChain`] → [`domains::Transport`].
//! Interceptors observe traffic and may answer a failed request with
//! substituted data; anything they don't answer propagates unchanged.

mod chain;
mod client;
mod fallback;
pub mod fixtures;

pub use chain::{Interceptor, LoggingInterceptor, MiddlewareChain};
pub use client::DisasterGateway;
pub use fallback::{FallbackInterceptor, FallbackResponder, FallbackRule, FallbackTable};
