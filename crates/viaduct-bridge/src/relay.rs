//! The relay loop: a sequential pump between one socket and one engine
//! instance.

use crate::StatusShared;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;
use viaduct_engine::EngineInstance;
use viaduct_types::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the pump loop stopped.
enum Exit {
    /// `disconnect()` (or bridge teardown) requested the close.
    LocalShutdown,
    /// The peer closed the socket or the stream ended.
    RemoteClosed,
    /// A transport-level failure was observed (already logged at the site).
    TransportError,
    /// The engine failed in a way the wire protocol cannot represent.
    EngineFailure,
}

/// One relay session: owns the socket and pumps frames strictly in order.
///
/// The engine instance is a stateful, non-reentrant resource, so frames are
/// processed one at a time: the response for frame *n* is fully sent before
/// frame *n+1* is read off the socket. There is no fan-out.
pub(crate) struct RelaySession {
    session_id: Uuid,
    database_id: String,
    instance: Arc<EngineInstance>,
    shared: Arc<StatusShared>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl RelaySession {
    pub(crate) fn new(
        session_id: Uuid,
        database_id: String,
        instance: Arc<EngineInstance>,
        shared: Arc<StatusShared>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            session_id,
            database_id,
            instance,
            shared,
            shutdown_rx,
        }
    }

    /// Runs the relay until a terminal event, then publishes the terminal
    /// state. Never panics across this boundary: every transport and engine
    /// failure becomes a status transition.
    pub(crate) async fn run(mut self, mut ws: WsStream) {
        let exit = self.pump(&mut ws).await;

        match exit {
            Exit::LocalShutdown => {
                self.transition(ConnectionState::Closing);
                if let Err(e) = ws.close(None).await {
                    tracing::debug!(
                        database_id = %self.database_id,
                        "error closing socket after local shutdown: {}",
                        e
                    );
                }
                self.transition(ConnectionState::Closed);
                tracing::info!(database_id = %self.database_id, "connection closed by local request");
            }
            Exit::RemoteClosed => {
                self.transition(ConnectionState::Closed);
                tracing::info!(database_id = %self.database_id, "connection closed by remote peer");
            }
            Exit::TransportError => {
                self.transition(ConnectionState::Errored);
                tracing::warn!(database_id = %self.database_id, "connection ended with transport error");
            }
            Exit::EngineFailure => {
                if let Err(e) = ws.close(None).await {
                    tracing::debug!(
                        database_id = %self.database_id,
                        "error closing socket after engine failure: {}",
                        e
                    );
                }
                self.transition(ConnectionState::Errored);
                tracing::warn!(database_id = %self.database_id, "connection closed after engine failure");
            }
        }
    }

    async fn pump(&mut self, ws: &mut WsStream) -> Exit {
        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => return Exit::LocalShutdown,
                message = ws.next() => message,
            };

            match message {
                Some(Ok(Message::Binary(frame))) => {
                    if let Err(exit) = self.relay_frame(ws, frame).await {
                        return exit;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = ws.send(Message::Pong(payload)).await {
                        tracing::warn!(
                            database_id = %self.database_id,
                            "transport error answering ping: {}",
                            e
                        );
                        return Exit::TransportError;
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Text(_))) => {
                    // The wire contract is binary-only; a text frame is a peer
                    // bug, not a reason to kill the relay.
                    tracing::warn!(
                        database_id = %self.database_id,
                        "ignoring text frame from peer on a binary-only connection"
                    );
                }
                Some(Ok(Message::Close(_))) => return Exit::RemoteClosed,
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(database_id = %self.database_id, "transport error: {}", e);
                    return Exit::TransportError;
                }
                None => return Exit::RemoteClosed,
            }
        }
    }

    /// Hands one complete inbound frame to the engine and sends the complete
    /// response back, in order.
    async fn relay_frame(&mut self, ws: &mut WsStream, frame: Bytes) -> Result<(), Exit> {
        tracing::trace!(
            database_id = %self.database_id,
            bytes = frame.len(),
            "relaying request frame to engine"
        );

        let execution = {
            let instance = self.instance.clone();
            async move { instance.execute_raw(&frame).await }
        };
        tokio::pin!(execution);

        let result = tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => {
                // Disconnected mid-execution. The engine call runs to
                // completion on its blocking thread; its response is moot
                // because the socket is going away.
                tracing::debug!(
                    database_id = %self.database_id,
                    "local shutdown during engine execution; discarding in-flight response"
                );
                return Err(Exit::LocalShutdown);
            }
            result = &mut execution => result,
        };

        match result {
            Ok(payload) => {
                tracing::trace!(
                    database_id = %self.database_id,
                    bytes = payload.len(),
                    "relaying response frame to peer"
                );
                if let Err(e) = ws.send(Message::Binary(payload.into())).await {
                    tracing::warn!(
                        database_id = %self.database_id,
                        "transport error sending response: {}",
                        e
                    );
                    return Err(Exit::TransportError);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    database_id = %self.database_id,
                    "engine failed to process frame: {}",
                    e
                );
                Err(Exit::EngineFailure)
            }
        }
    }

    fn transition(&self, state: ConnectionState) {
        self.shared.transition(self.session_id, state);
    }
}
