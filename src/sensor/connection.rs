//! One WebSocket connection to a tracking service.

use crate::config::{DeviceConfig, TransportConfig};
use crate::error::TransportError;
use crate::sensor::types::RawFrame;
use serde_json::json;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::info;
use tungstenite::client::IntoClientRequest;
use tungstenite::{Message, WebSocket};

/// A text message from the service, sorted by kind.
#[derive(Debug, Clone)]
pub enum Incoming {
    Frame(Box<RawFrame>),
    /// Connect/disconnect notice, e.g. `{"event": {"type": "deviceEvent", ...}}`
    Lifecycle(String),
}

/// Classify a text message. Anything mentioning `"event"` is lifecycle traffic.
pub fn classify_text(text: &str) -> Result<Incoming, TransportError> {
    if text.contains("\"event\"") {
        return Ok(Incoming::Lifecycle(text.to_string()));
    }
    RawFrame::from_json(text)
        .map(|frame| Incoming::Frame(Box::new(frame)))
        .map_err(|e| TransportError::Malformed(e.to_string()))
}

/// An open, configured device socket.
pub struct DeviceConnection {
    socket: WebSocket<TcpStream>,
    read_timeout: Duration,
}

impl DeviceConnection {
    /// Connect, announce the tracking mode and read the handshake.
    ///
    /// The read timeout covers the opening handshake as well, so a service that
    /// accepts the TCP connection but never answers counts as unreachable.
    pub fn open(
        device: &DeviceConfig,
        read_timeout: Duration,
    ) -> Result<(Self, Option<String>), TransportError> {
        let connect_error =
            |e: &dyn std::fmt::Display| TransportError::Connect(format!("{}: {e}", device.url));

        let request = device
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_error(&e))?;
        let host = request
            .uri()
            .host()
            .ok_or_else(|| connect_error(&"no host in url"))?
            .to_string();
        let port = request.uri().port_u16().unwrap_or(80);
        let address = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| connect_error(&e))?
            .next()
            .ok_or_else(|| connect_error(&"host did not resolve"))?;

        let stream =
            TcpStream::connect_timeout(&address, read_timeout).map_err(|e| connect_error(&e))?;
        stream
            .set_read_timeout(Some(read_timeout))
            .map_err(|e| connect_error(&e))?;
        let (mut socket, _response) =
            tungstenite::client(request, stream).map_err(|e| connect_error(&e))?;

        let announce = json!({ "optimizeHMD": device.mode.optimize_hmd() }).to_string();
        socket.send(Message::text(announce))?;

        let mut connection = Self {
            socket,
            read_timeout,
        };
        let handshake = connection.read_text()?;
        info!(
            "Connected to {} ({})",
            device.url,
            handshake.as_deref().unwrap_or("no handshake")
        );

        Ok((connection, handshake))
    }

    /// Block until the next text message.
    pub fn next_message(&mut self) -> Result<Incoming, TransportError> {
        loop {
            if let Some(text) = self.read_text()? {
                return classify_text(&text);
            }
        }
    }

    /// Read one message. Control and binary frames yield `None`.
    fn read_text(&mut self) -> Result<Option<String>, TransportError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text.as_str().to_string())),
            Ok(Message::Close(_)) => Err(TransportError::Closed),
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Err(TransportError::Timeout(self.read_timeout))
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(TransportError::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn close(mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

/// Exponential reconnection delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            max: config.max_backoff,
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    /// Failed attempts since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts != 0 && self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.attempt += 1;
        Some(self.initial.saturating_mul(factor).min(self.max))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
