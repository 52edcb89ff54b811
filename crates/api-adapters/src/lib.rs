//! # api-adapters
//!
//! Browser delivery of the dashboard: HTML views rendered with askama,
//! gateway metrics, and (feature `web-axum`) the axum routes serving them.

pub mod metrics;
pub mod views;

#[cfg(feature = "web-axum")]
pub mod web;

pub use metrics::{GatewayMetrics, MetricsInterceptor};
