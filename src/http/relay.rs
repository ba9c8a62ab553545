//! Full-duplex WebSocket message relay.
//!
//! # Data Flow
//! ```text
//! Client ──→ client_rx ──pump──→ backend_tx ──→ Backend
//! Client ←── client_tx ←──pump── backend_rx ←── Backend
//! ```
//!
//! # Design Decisions
//! - Messages are forwarded one at a time, unmodified (text stays text, binary stays binary)
//! - Both pumps are polled concurrently; the first to stop ends the session
//! - Teardown closes both sinks and drops both sockets, so neither side is left half-open

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{self, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{self, protocol::CloseFrame},
    MaybeTlsStream, WebSocketStream,
};

use crate::net::SessionGuard;
use crate::observability::metrics;

/// Backend side of a relay session.
pub type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on sending close frames during teardown.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which way a pump moves messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => f.write_str("client->backend"),
            Direction::BackendToClient => f.write_str("backend->client"),
        }
    }
}

/// A socket failed mid-session.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{direction}: read failed: {source}")]
    Read {
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("{direction}: write failed: {source}")]
    Write {
        direction: Direction,
        #[source]
        source: BoxError,
    },
}

/// How a pump stopped when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// The source stream ended.
    Eof,
    /// A close frame was read and passed on.
    CloseForwarded,
}

/// Messages the relay can carry.
pub trait RelayMessage {
    fn is_close(&self) -> bool;
}

impl RelayMessage for ws::Message {
    fn is_close(&self) -> bool {
        matches!(self, ws::Message::Close(_))
    }
}

impl RelayMessage for tungstenite::Message {
    fn is_close(&self) -> bool {
        matches!(self, tungstenite::Message::Close(_))
    }
}

/// Move messages from `source` to `sink` until one side stops.
///
/// `convert` returning `None` drops the message.
pub async fn pump<R, W, In, Out, RE, WE>(
    direction: Direction,
    source: &mut R,
    sink: &mut W,
    convert: impl Fn(In) -> Option<Out>,
) -> Result<PumpEnd, RelayError>
where
    R: Stream<Item = Result<In, RE>> + Unpin,
    W: Sink<Out, Error = WE> + Unpin,
    In: RelayMessage,
    RE: std::error::Error + Send + Sync + 'static,
    WE: std::error::Error + Send + Sync + 'static,
{
    while let Some(next) = source.next().await {
        let message = next.map_err(|e| RelayError::Read {
            direction,
            source: Box::new(e),
        })?;
        let is_close = message.is_close();

        if let Some(message) = convert(message) {
            sink.send(message).await.map_err(|e| RelayError::Write {
                direction,
                source: Box::new(e),
            })?;
        }

        if is_close {
            return Ok(PumpEnd::CloseForwarded);
        }
    }
    Ok(PumpEnd::Eof)
}

/// Client message → backend message.
pub fn to_backend(message: ws::Message) -> Option<tungstenite::Message> {
    use tungstenite::Message;

    Some(match message {
        ws::Message::Text(text) => Message::text(text.as_str()),
        ws::Message::Binary(data) => Message::Binary(data),
        ws::Message::Ping(data) => Message::Ping(data),
        // Each side's library already answered the ping it received.
        ws::Message::Pong(_) => return None,
        ws::Message::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
    })
}

/// Backend message → client message.
pub fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    use tungstenite::Message;

    Some(match message {
        Message::Text(text) => ws::Message::Text(text.as_str().into()),
        Message::Binary(data) => ws::Message::Binary(data),
        Message::Ping(data) => ws::Message::Ping(data),
        Message::Pong(_) => return None,
        Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
        // Only produced when writing raw frames; never read.
        Message::Frame(_) => return None,
    })
}

/// Relay between an upgraded client and a connected backend until either
/// side stops, then close both.
pub async fn relay(client: WebSocket, backend: BackendSocket, session: SessionGuard) {
    let session_id = session.id();
    tracing::debug!(session_id = %session_id, "Relay session started");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    let (direction, result) = tokio::select! {
        result = pump(Direction::ClientToBackend, &mut client_rx, &mut backend_tx, to_backend) => {
            (Direction::ClientToBackend, result)
        }
        result = pump(Direction::BackendToClient, &mut backend_rx, &mut client_tx, to_client) => {
            (Direction::BackendToClient, result)
        }
    };

    let _ = tokio::time::timeout(CLOSE_GRACE, client_tx.close()).await;
    let _ = tokio::time::timeout(CLOSE_GRACE, backend_tx.close()).await;
    drop((client_tx, client_rx, backend_tx, backend_rx));

    match result {
        Ok(end) => {
            metrics::record_session_end("closed");
            tracing::info!(
                session_id = %session_id,
                direction = %direction,
                end = ?end,
                "Relay session closed"
            );
        }
        Err(e) => {
            metrics::record_session_end("error");
            tracing::warn!(session_id = %session_id, error = %e, "Relay session failed");
        }
    }

    drop(session);
}
