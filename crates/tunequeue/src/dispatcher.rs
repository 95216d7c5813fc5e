//! Per-connection dispatcher for the session namespace.
//!
//! Each accepted connection gets its own Tokio task running this code:
//!   1. Refuse anything not on the session namespace (404)
//!   2. Receive Handshake → validate version (400)
//!   3. Authenticate the credential → identity (401 on failure)
//!   4. Send HandshakeAck and admit the connection to presence
//!   5. Loop: route requests, answer heartbeats, forward room broadcasts
//!   6. On any exit, run the presence disconnect transition

use std::sync::Arc;
use std::time::Instant;

use tokio::time::Instant as Deadline;
use tunequeue_auth::{AuthError, Authenticator, UserIdentity};
use tunequeue_presence::{ConnectionContext, OutboundReceiver, PresenceError};
use tunequeue_protocol::{
    AckResult, ClientRequest, Codec, Envelope, Payload, ProtocolError, SessionCode, SystemMessage,
};
use tunequeue_store::SessionStore;
use tunequeue_transport::{Connection, WebSocketConnection};

use crate::server::{ServerState, PROTOCOL_VERSION};
use crate::TunequeueError;

/// Writes envelopes to one connection and numbers them.
struct Outbox<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<'a, C: Codec> Outbox<'a, C> {
    fn new(conn: &'a WebSocketConnection, codec: &'a C) -> Self {
        Self {
            conn,
            codec,
            seq: 0,
            start: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    async fn send(&mut self, payload: Payload) -> Result<(), TunequeueError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.elapsed_ms(),
            payload,
        };
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn error(&mut self, code: u16, message: &str) -> Result<(), TunequeueError> {
        self.send(Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }))
        .await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), TunequeueError>
where
    A: Authenticator,
    S: SessionStore,
    C: Codec,
{
    let conn_id = conn.id();
    let mut out = Outbox::new(&conn, &state.codec);

    if conn.path() != state.config.namespace {
        tracing::debug!(%conn_id, path = %conn.path(), "refusing unknown namespace");
        out.error(404, &format!("unknown namespace {}", conn.path()))
            .await?;
        close(&conn).await;
        return Ok(());
    }

    let identity = match perform_handshake(&conn, &state, &mut out).await {
        Ok(identity) => identity,
        Err(e) => {
            close(&conn).await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, user_id = %identity.id(), "user connected");

    let (mut ctx, mut outbound) = state.presence.admit(conn_id, identity);
    let result = message_loop(&conn, &state, &mut ctx, &mut outbound, &mut out).await;

    state.presence.disconnect(&mut ctx).await;
    close(&conn).await;
    result
}

/// Receives the Handshake, checks it, and authenticates the credential.
async fn perform_handshake<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
    out: &mut Outbox<'_, C>,
) -> Result<UserIdentity, TunequeueError>
where
    A: Authenticator,
    S: SessionStore,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => return Err(invalid("connection closed before handshake")),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(invalid("handshake timed out")),
    };

    let handshake = state
        .codec
        .decode::<Envelope>(&data)
        .ok()
        .and_then(|envelope| match envelope.payload {
            Payload::System(SystemMessage::Handshake { version, token }) => Some((version, token)),
            _ => None,
        });
    let Some((version, token)) = handshake else {
        out.error(400, "expected Handshake").await?;
        return Err(invalid("first message must be Handshake"));
    };

    if version != PROTOCOL_VERSION {
        out.error(
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(invalid("protocol version mismatch"));
    }

    // The handshake token wins; the upgrade request's credential is the
    // fallback for clients that authenticate at the HTTP layer.
    let token = token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| conn.bearer_token().map(str::to_string))
        .unwrap_or_default();

    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) if !identity.id().is_empty() => identity,
        Ok(_) => {
            tracing::error!(conn_id = %conn.id(), "credential resolved to an empty user id");
            let err = AuthError::InvalidToken;
            out.error(401, &err.to_string()).await?;
            return Err(err.into());
        }
        Err(e) => {
            tracing::info!(conn_id = %conn.id(), error = %e, "authentication failed");
            out.error(401, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    let server_time = out.elapsed_ms();
    out.send(Payload::System(SystemMessage::HandshakeAck {
        user_id: identity.id().clone(),
        server_time,
    }))
    .await?;

    Ok(identity)
}

/// Reads frames until the connection closes, times out, or says goodbye,
/// forwarding room broadcasts in between.
async fn message_loop<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
    ctx: &mut ConnectionContext,
    outbound: &mut OutboundReceiver,
    out: &mut Outbox<'_, C>,
) -> Result<(), TunequeueError>
where
    A: Authenticator,
    S: SessionStore,
    C: Codec,
{
    let idle = state.config.idle_timeout;
    // Only inbound frames keep the connection alive; outgoing broadcasts
    // do not push the deadline back.
    let mut deadline = Deadline::now() + idle;

    loop {
        tokio::select! {
            inbound = tokio::time::timeout_at(deadline, conn.recv()) => {
                let data = match inbound {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(user_id = %ctx.user_id(), "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(user_id = %ctx.user_id(), error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(user_id = %ctx.user_id(), "connection timed out");
                        break;
                    }
                };
                deadline = Deadline::now() + idle;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(user_id = %ctx.user_id(), error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::System(msg) => {
                        if handle_system_message(ctx, msg, out).await? {
                            break;
                        }
                    }
                    Payload::Request(request) => {
                        handle_request(state, ctx, outbound, out, envelope.seq, request).await?;
                    }
                    Payload::Ack { .. } | Payload::Event(_) => {
                        tracing::debug!(user_id = %ctx.user_id(), "ignoring server-only payload from client");
                    }
                }
            }
            Some(event) = outbound.recv() => {
                out.send(Payload::Event(event)).await?;
            }
        }
    }

    Ok(())
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<C: Codec>(
    ctx: &ConnectionContext,
    msg: SystemMessage,
    out: &mut Outbox<'_, C>,
) -> Result<bool, TunequeueError> {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = out.elapsed_ms();
            out.send(Payload::System(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            }))
            .await?;
        }
        SystemMessage::Disconnect { reason } => {
            tracing::info!(user_id = %ctx.user_id(), %reason, "client disconnected");
            return Ok(true);
        }
        _ => {
            tracing::debug!(user_id = %ctx.user_id(), "ignoring unexpected system message");
        }
    }
    Ok(false)
}

/// Runs a join or leave and acknowledges it.
///
/// Broadcasts the request caused in the requester's own room are flushed
/// first, so a client always sees its `user_joined` before the join ack.
async fn handle_request<A, S, C>(
    state: &ServerState<A, S, C>,
    ctx: &mut ConnectionContext,
    outbound: &mut OutboundReceiver,
    out: &mut Outbox<'_, C>,
    request_seq: u64,
    request: ClientRequest,
) -> Result<(), TunequeueError>
where
    A: Authenticator,
    S: SessionStore,
    C: Codec,
{
    let result = match request {
        ClientRequest::JoinSession(code) => match state.presence.join(ctx, &code).await {
            Ok(session) => AckResult::Success {
                session: Some(session),
            },
            Err(e) => failure_ack(ctx, &code, e, "Error joining"),
        },
        ClientRequest::LeaveSession(code) => match state.presence.leave(ctx, &code).await {
            Ok(()) => AckResult::ok(),
            Err(e) => failure_ack(ctx, &code, e, "Error leaving"),
        },
    };

    while let Ok(event) = outbound.try_recv() {
        out.send(Payload::Event(event)).await?;
    }
    out.send(Payload::Ack {
        seq: request_seq,
        result,
    })
    .await
}

fn failure_ack(
    ctx: &ConnectionContext,
    code: &SessionCode,
    err: PresenceError,
    message: &'static str,
) -> AckResult {
    match err {
        PresenceError::SessionNotFound(_) => {
            tracing::debug!(user_id = %ctx.user_id(), %code, "session not found");
            AckResult::failure("Not found")
        }
        other => {
            tracing::warn!(user_id = %ctx.user_id(), %code, error = %other, "request failed");
            AckResult::failure(message)
        }
    }
}

async fn close(conn: &WebSocketConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

fn invalid(reason: &str) -> TunequeueError {
    TunequeueError::Protocol(ProtocolError::InvalidMessage(reason.to_string()))
}
