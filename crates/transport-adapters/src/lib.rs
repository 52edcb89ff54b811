//! Outbound adapters: the HTTP transport for the disaster API and the
//! Socket.IO push channel.

pub mod http;
pub mod socketio;

pub use http::ReqwestTransport;
pub use socketio::{socket_url, SocketIoChannel};
