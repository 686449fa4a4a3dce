//! WebSocket notification subscriber.
//!
//! # Responsibilities
//! - Connect to the notification feed and register the read key
//! - Decode each frame and push it onto the notification channel
//! - Answer heartbeats and detect a silent peer with ping/timeout
//! - Park until shutdown once the connection is gone
//!
//! # Design Decisions
//! - Malformed frames are dropped, never retried or propagated
//! - No reconnect: a finished connection leaves the worker idle until shutdown
//! - Cancellation drops the serving future at its current await point

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::NotificationSender;
use crate::config::StreamConfig;
use crate::envelope::Envelope;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::subscriber::protocol::{self, Inbound};
use crate::subscriber::types::{StreamError, StreamResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Background consumer of the notification feed.
pub struct StreamSubscriber {
    config: StreamConfig,
    read_key: Option<String>,
    sender: NotificationSender,
    shutdown: Shutdown,
}

impl StreamSubscriber {
    /// Create a subscriber that pushes onto `sender` until `shutdown` fires.
    pub fn new(config: StreamConfig, sender: NotificationSender, shutdown: Shutdown) -> Self {
        Self {
            config,
            read_key: None,
            sender,
            shutdown,
        }
    }

    /// Key sent in the registration command.
    pub fn with_read_key(mut self, read_key: impl Into<String>) -> Self {
        self.read_key = Some(read_key.into());
        self
    }

    /// Serve the feed, then wait for shutdown.
    ///
    /// Returns only once the shutdown flag is set (or the future is dropped).
    pub async fn run(self) {
        tracing::info!(url = %self.config.url, "Stream subscriber starting");

        tokio::select! {
            result = self.serve() => match result {
                Ok(()) => tracing::info!("Notification stream ended"),
                Err(e) => tracing::error!(error = %e, "Notification stream failed"),
            },
            _ = self.shutdown.wait() => {
                tracing::debug!("Notification stream cancelled by shutdown");
            }
        }

        self.idle_until_shutdown().await;
        tracing::info!("Stream subscriber stopped");
    }

    /// Serve one connection until it closes, fails or goes silent.
    pub async fn serve(&self) -> StreamResult<()> {
        let connect_secs = self.config.connect_timeout_secs;
        let (mut ws, _) = timeout(
            Duration::from_secs(connect_secs),
            connect_async(self.config.url.as_str()),
        )
        .await
        .map_err(|_| StreamError::ConnectTimeout(connect_secs))??;

        tracing::info!(url = %self.config.url, "Connected to notification stream");

        let session_id = if self.config.register {
            Some(self.register(&mut ws).await?)
        } else {
            None
        };

        let idle = Duration::from_secs(self.config.idle_timeout_secs);
        let ping_wait = Duration::from_secs(self.config.ping_timeout_secs);

        loop {
            let next = match timeout(idle, ws.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!("Stream idle, sending ping");
                    ws.send(Message::Ping(Default::default())).await?;
                    timeout(ping_wait, ws.next())
                        .await
                        .map_err(|_| StreamError::Unresponsive(self.config.ping_timeout_secs))?
                }
            };

            let message = match next {
                Some(message) => message?,
                None => return Ok(()),
            };

            match message {
                Message::Close(frame) => {
                    tracing::info!(frame = ?frame, "Notification stream closed by server");
                    return Ok(());
                }
                message => {
                    let Some(text) = message_text(&message) else {
                        continue;
                    };
                    metrics::record_frame_received();
                    match protocol::classify(text) {
                        Ok(Inbound::Envelope(envelope)) => self.enqueue(envelope),
                        Ok(Inbound::Heartbeat) => {
                            if let Some(id) = session_id.as_deref() {
                                ws.send(Message::text(protocol::heartbeat_command(id))).await?;
                                tracing::trace!("Heartbeat answered");
                            }
                        }
                        Ok(Inbound::RegisterAck { .. }) => {
                            tracing::debug!("Ignoring repeated registration ack");
                        }
                        Err(e) => drop_malformed(&e),
                    }
                }
            }
        }
    }

    /// Send the registration command and wait for its ack.
    ///
    /// Notifications that arrive before the ack are still delivered.
    async fn register(&self, ws: &mut WsStream) -> StreamResult<String> {
        let read_key = self.read_key.as_deref().ok_or(StreamError::MissingReadKey)?;
        ws.send(Message::text(protocol::register_command(read_key))).await?;

        let connect_secs = self.config.connect_timeout_secs;
        let deadline = Instant::now() + Duration::from_secs(connect_secs);

        loop {
            let next = timeout_at(deadline, ws.next())
                .await
                .map_err(|_| StreamError::HandshakeTimeout(connect_secs))?;
            let message = match next {
                Some(message) => message?,
                None => return Err(StreamError::ClosedDuringHandshake),
            };
            if let Message::Close(_) = message {
                return Err(StreamError::ClosedDuringHandshake);
            }
            let Some(text) = message_text(&message) else {
                continue;
            };
            metrics::record_frame_received();
            match protocol::classify(text) {
                Ok(Inbound::RegisterAck { session_id }) => {
                    tracing::info!(session_id = %session_id, "Registered with notification stream");
                    return Ok(session_id);
                }
                Ok(Inbound::Envelope(envelope)) => self.enqueue(envelope),
                Ok(Inbound::Heartbeat) => {}
                Err(e) => drop_malformed(&e),
            }
        }
    }

    fn enqueue(&self, envelope: Envelope) {
        let kind = envelope.kind().as_str();
        match self.sender.push(envelope) {
            Ok(()) => {
                metrics::record_envelope_enqueued(kind);
                tracing::trace!(kind = kind, "Envelope enqueued");
            }
            Err(_) => {
                metrics::record_frame_dropped("closed_channel");
                tracing::debug!(kind = kind, "Receiver gone, dropping envelope");
            }
        }
    }

    async fn idle_until_shutdown(&self) {
        let mut ticker = interval(Duration::from_millis(self.config.idle_poll_ms));
        while !self.shutdown.is_triggered() {
            ticker.tick().await;
        }
    }
}

fn message_text(message: &Message) -> Option<&str> {
    match message {
        Message::Text(text) => Some(text.as_str()),
        Message::Binary(data) => match std::str::from_utf8(data) {
            Ok(text) => Some(text),
            Err(_) => {
                metrics::record_frame_dropped("malformed");
                tracing::debug!(len = data.len(), "Dropping non-UTF-8 binary frame");
                None
            }
        },
        _ => None,
    }
}

fn drop_malformed(error: &crate::envelope::DecodeError) {
    metrics::record_frame_dropped("malformed");
    tracing::debug!(error = %error, "Dropping malformed frame");
}
