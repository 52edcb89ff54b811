//! # services
//!
//! Client-side orchestration for the disaster dashboard:
//!
//! - [`gateway`]: a fallback-aware request facade over a [`domains::Transport`],
//!   built from an explicit interceptor chain.
//! - [`live`]: a reconnecting push-channel subscriber whose events only ever
//!   trigger re-fetches.
//! - [`screens`]: list and detail screen models that hold transient state,
//!   guard against stale responses and expose render-ready placeholders.

pub mod gateway;
pub mod live;
pub mod screens;

pub use gateway::{
    DisasterGateway, FallbackInterceptor, FallbackResponder, FallbackRule, FallbackTable,
    Interceptor, LoggingInterceptor, MiddlewareChain,
};
pub use live::{ConnectionStatus, EventHandler, LiveUpdates, ReconnectPolicy, SubscriptionId};
pub use screens::{ApiStatus, DetailScreen, DetailState, ListScreen, ListState, PanelView};
