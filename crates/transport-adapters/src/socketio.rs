//! Push channel over a Socket.IO server.
//!
//! Only the WebSocket transport is spoken, using Engine.IO v4 text frames
//! that carry Socket.IO packets. Binary attachments are not supported.

use async_trait::async_trait;
use domains::{PushChannel, PushError, PushEvent, PushStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// An Engine.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(Value),
    Close,
    Ping,
    Pong,
    Noop,
    Message(Packet),
}

/// A Socket.IO packet carried in an Engine.IO message frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect,
    Disconnect,
    Event(PushEvent),
    Ack,
    ConnectError(String),
}

/// Decodes one text frame.
pub fn decode_frame(text: &str) -> Result<Frame, PushError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PushError::Protocol("empty frame".into()))?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Frame::Open(serde_json::from_str(rest).unwrap_or(Value::Null))),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(rest).map(Frame::Message),
        '6' => Ok(Frame::Noop),
        other => Err(PushError::Protocol(format!("unknown frame type {other:?}"))),
    }
}

fn decode_packet(text: &str) -> Result<Packet, PushError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PushError::Protocol("empty packet".into()))?;
    let mut rest = chars.as_str();

    // optional namespace, then optional ack id
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, tail)| tail);
    }
    rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(rest).map(Packet::Event),
        '3' => Ok(Packet::Ack),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| rest.to_owned());
            Ok(Packet::ConnectError(message))
        }
        other => Err(PushError::Protocol(format!(
            "unsupported packet type {other:?}"
        ))),
    }
}

fn decode_event(json: &str) -> Result<PushEvent, PushError> {
    let args: Vec<Value> =
        serde_json::from_str(json).map_err(|e| PushError::Protocol(format!("bad event: {e}")))?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(PushError::Protocol("event without a name".into())),
    };
    Ok(PushEvent::new(name, args.next().unwrap_or(Value::Null)))
}

/// Turns the configured push address into the Socket.IO WebSocket endpoint.
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
/// An explicit path is kept as given.
pub fn socket_url(push_url: &str) -> Result<String, PushError> {
    let trimmed = push_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| PushError::Connect(format!("invalid push url: {push_url}")))?;
    let scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(PushError::Connect(format!("unsupported scheme: {other}"))),
    };
    let path = if rest.contains('/') { "" } else { "/socket.io/" };
    Ok(format!("{scheme}://{rest}{path}?EIO=4&transport=websocket"))
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens Socket.IO sessions on the default namespace.
#[derive(Debug, Clone)]
pub struct SocketIoChannel {
    url: String,
    connect_timeout: Duration,
}

impl SocketIoChannel {
    pub fn new(push_url: &str, connect_timeout: Duration) -> Result<Self, PushError> {
        Ok(Self {
            url: socket_url(push_url)?,
            connect_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn handshake(&self) -> Result<Socket, PushError> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| PushError::Connect(e.to_string()))?;

        let mut joined = false;
        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| PushError::Connect(e.to_string()))?;
            let Message::Text(text) = message else {
                continue;
            };
            match decode_frame(text.as_str())? {
                Frame::Open(info) => {
                    debug!(sid = ?info.get("sid"), "engine.io session opened");
                    socket
                        .send(Message::text("40"))
                        .await
                        .map_err(|e| PushError::Connect(e.to_string()))?;
                    joined = true;
                }
                Frame::Ping => socket
                    .send(Message::text("3"))
                    .await
                    .map_err(|e| PushError::Connect(e.to_string()))?,
                Frame::Message(Packet::Connect) if joined => return Ok(socket),
                Frame::Message(Packet::ConnectError(message)) => {
                    return Err(PushError::Connect(message))
                }
                Frame::Close | Frame::Message(Packet::Disconnect) => break,
                _ => {}
            }
        }
        Err(PushError::Connect("server closed during handshake".into()))
    }
}

#[async_trait]
impl PushChannel for SocketIoChannel {
    async fn connect(&self) -> Result<Box<dyn PushStream>, PushError> {
        let socket = tokio::time::timeout(self.connect_timeout, self.handshake())
            .await
            .map_err(|_| PushError::Connect("handshake timed out".into()))??;
        info!(url = %self.url, "socket.io connected");
        Ok(Box::new(SocketIoStream {
            socket,
            closed: false,
        }))
    }
}

struct SocketIoStream {
    socket: Socket,
    closed: bool,
}

#[async_trait]
impl PushStream for SocketIoStream {
    async fn next_event(&mut self) -> Option<Result<PushEvent, PushError>> {
        if self.closed {
            return None;
        }
        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => {
                    warn!(error = %err, "socket.io transport error");
                    self.closed = true;
                    return None;
                }
                None => {
                    self.closed = true;
                    return None;
                }
            };
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    self.closed = true;
                    return None;
                }
                _ => continue,
            };
            match decode_frame(text.as_str()) {
                Ok(Frame::Ping) => {
                    if self.socket.send(Message::text("3")).await.is_err() {
                        self.closed = true;
                        return None;
                    }
                }
                Ok(Frame::Message(Packet::Event(event))) => return Some(Ok(event)),
                Ok(Frame::Close | Frame::Message(Packet::Disconnect)) => {
                    debug!("server disconnected");
                    self.closed = true;
                    return None;
                }
                Ok(Frame::Message(Packet::ConnectError(message))) => {
                    return Some(Err(PushError::Protocol(message)))
                }
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.socket.send(Message::text("41")).await {
            debug!(error = %err, "namespace disconnect failed");
        }
        if let Err(err) = self.socket.close(None).await {
            debug!(error = %err, "socket close failed");
        }
    }
}
