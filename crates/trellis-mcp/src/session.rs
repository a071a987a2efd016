//! Line-delimited JSON-RPC session engine.
//!
//! A [`Session`] owns one duplex byte stream and runs the framing and
//! correlation machinery over it: one JSON value per line, outbound
//! request ids assigned monotonically, a pending-waiter table with a
//! fixed per-request timeout, and the
//! `uninitialized → handshaking → ready → closed` lifecycle.
//!
//! Line decoding is strictly sequential: arrival order is dispatch
//! order. Each inbound request runs as its own task, so responses
//! may complete out of order. The engine is symmetric: the stdio server
//! and the test-suite client are the same type with different handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::{
    methods, Frame, FrameError, Implementation, InitializeParams, InitializeResult, RpcError,
    RpcNotification, RpcRequest, RpcResponse, JSONRPC_VERSION, PROTOCOL_VERSION,
};

/// How long an outbound request may stay unanswered.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake traffic yet.
    Uninitialized,

    /// `initialize` exchanged, awaiting the `initialized` notification.
    Handshaking,

    /// Fully operational.
    Ready,

    /// Stream ended; no further traffic.
    Closed,
}

/// Errors surfaced to request waiters.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No response arrived within [`REQUEST_TIMEOUT`].
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The session closed with the request still pending.
    #[error("session closed")]
    Closed,

    /// The peer answered with a JSON-RPC error object.
    #[error("remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the peer.
        message: String,
    },

    /// A frame failed to encode or a payload failed to decode.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Handles inbound traffic dispatched by a [`Session`].
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle one inbound request and produce its result payload.
    async fn handle_request(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError>;

    /// Handle one inbound notification. The default ignores it.
    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        let _ = params;
        trace!(method, "ignoring notification");
    }
}

/// A handler that answers every request with method-not-found.
///
/// Used for the client role, which sends requests but serves none.
pub struct NullHandler;

#[async_trait]
impl RequestHandler for NullHandler {
    async fn handle_request(&self, method: &str, _params: Option<Value>) -> Result<Value, RpcError> {
        Err(RpcError::method_not_found(method))
    }
}

/// Lock a mutex, recovering the guard if a panicking task poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionInner {
    outbound: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<i64, oneshot::Sender<Result<Value, SessionError>>>>,
    next_id: AtomicI64,
    state: Mutex<SessionState>,
    timeout: Duration,
    closed: watch::Sender<bool>,
}

impl SessionInner {
    /// Queue one already-serialized frame for writing.
    fn send_line(&self, line: String) -> Result<(), SessionError> {
        self.outbound.send(line).map_err(|_| SessionError::Closed)
    }

    fn send_response(&self, response: &RpcResponse) {
        match serde_json::to_string(response) {
            Ok(line) => {
                if self.send_line(line).is_err() {
                    warn!("dropping response: session closed");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode response"),
        }
    }

    /// Resolve the waiter registered for a response id, if any.
    ///
    /// Responses for unknown ids are dropped: either the request already
    /// timed out, or the peer invented an id. Neither disturbs the
    /// session.
    fn resolve(&self, id: &Value, outcome: Result<Value, SessionError>) {
        let Some(id) = id.as_i64() else {
            warn!(?id, "response with non-numeric id ignored");
            return;
        };
        match lock(&self.pending).remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => debug!(id, "late or unknown response id ignored"),
        }
    }

    /// Gate an inbound request against the lifecycle state.
    ///
    /// `ping` is always answerable. `initialize` is only valid once.
    /// Everything else requires the handshake to have completed.
    fn gate_inbound(&self, method: &str) -> Result<(), RpcError> {
        let mut state = lock(&self.state);
        match (method, *state) {
            (methods::PING, _) => Ok(()),
            (methods::INITIALIZE, SessionState::Uninitialized) => {
                *state = SessionState::Handshaking;
                Ok(())
            }
            (methods::INITIALIZE, _) => {
                Err(RpcError::invalid_request("session already initialized"))
            }
            (_, SessionState::Ready) => Ok(()),
            (_, SessionState::Closed) => Err(RpcError::invalid_request("session closed")),
            (_, SessionState::Uninitialized | SessionState::Handshaking) => Err(
                RpcError::invalid_request("session not initialized; complete the handshake first"),
            ),
        }
    }

    /// Observe an inbound notification for lifecycle transitions.
    fn observe_notification(&self, method: &str) {
        if method == methods::INITIALIZED {
            let mut state = lock(&self.state);
            if *state == SessionState::Handshaking {
                *state = SessionState::Ready;
                debug!("handshake complete, session ready");
            } else {
                warn!(state = ?*state, "unexpected initialized notification");
            }
        }
    }

    /// Transition to closed and reject every pending waiter.
    fn mark_closed(&self) {
        *lock(&self.state) = SessionState::Closed;
        let waiters: Vec<_> = lock(&self.pending).drain().collect();
        if !waiters.is_empty() {
            debug!(count = waiters.len(), "rejecting pending requests on close");
        }
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(SessionError::Closed));
        }
        // send_replace updates the value even with no live subscribers,
        // so a wait_closed() that starts after the close still returns.
        let _ = self.closed.send_replace(true);
    }
}

/// A running JSON-RPC session over one byte stream.
///
/// Dropping the session aborts its I/O tasks and rejects any pending
/// waiters.
pub struct Session {
    inner: Arc<SessionInner>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Session {
    /// Attach a session to a stream pair with the default request timeout.
    pub fn connect<R, W>(reader: R, writer: W, handler: Arc<dyn RequestHandler>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_timeout(reader, writer, handler, REQUEST_TIMEOUT)
    }

    /// Attach a session with an explicit request timeout.
    pub fn with_timeout<R, W>(
        reader: R,
        writer: W,
        handler: Arc<dyn RequestHandler>,
        timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, mut outbox) = mpsc::unbounded_channel::<String>();
        let (closed, _) = watch::channel(false);

        let inner = Arc::new(SessionInner {
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(0),
            state: Mutex::new(SessionState::Uninitialized),
            timeout,
            closed,
        });

        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = outbox.recv().await {
                trace!(len = line.len(), "writing frame");
                if writer.write_all(line.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                    || writer.flush().await.is_err()
                {
                    warn!("write side of session stream failed");
                    break;
                }
            }
        });

        let reader_inner = Arc::clone(&inner);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        dispatch_line(&reader_inner, &handler, &line);
                    }
                    Ok(None) => {
                        debug!("session stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "session stream read failed");
                        break;
                    }
                }
            }
            reader_inner.mark_closed();
        });

        Self {
            inner,
            reader_task,
            writer_task,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    /// Send a request and wait for its response.
    ///
    /// The id is assigned synchronously before any await, so ids are
    /// monotonic in call order even under concurrent callers. On timeout
    /// the pending entry is removed first; a response arriving later for
    /// that id is ignored.
    ///
    /// # Errors
    ///
    /// [`SessionError::Timeout`] after the configured deadline,
    /// [`SessionError::Closed`] if the stream ends first,
    /// [`SessionError::Remote`] for a peer-reported error.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, SessionError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);

        let frame = RpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        };
        let line = serde_json::to_string(&frame)?;
        trace!(id, method, "sending request");

        if self.inner.send_line(line).is_err() {
            lock(&self.inner.pending).remove(&id);
            return Err(SessionError::Closed);
        }

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Waiter dropped without an outcome: the session closed.
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                warn!(id, method, "request timed out");
                Err(SessionError::Timeout(self.inner.timeout))
            }
        }
    }

    /// Send a fire-and-forget notification.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] if the stream has ended.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        let frame = RpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        };
        self.inner.send_line(serde_json::to_string(&frame)?)
    }

    /// Drive the two-phase handshake from the caller side.
    ///
    /// Sends `initialize`, then the `initialized` notification, and moves
    /// this session to ready.
    ///
    /// # Errors
    ///
    /// Any [`SessionError`] from the underlying request, or a codec error
    /// if the peer's reply does not decode.
    pub async fn initialize(
        &self,
        client_info: Implementation,
    ) -> Result<InitializeResult, SessionError> {
        *lock(&self.inner.state) = SessionState::Handshaking;

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info,
        };
        let value = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(&params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(value)?;

        self.notify(methods::INITIALIZED, None)?;
        *lock(&self.inner.state) = SessionState::Ready;
        debug!(server = %result.server_info.name, "handshake complete");
        Ok(result)
    }

    /// Wait until the session reaches the closed state.
    pub async fn wait_closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Close the session, rejecting all pending waiters.
    pub fn close(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
        self.inner.mark_closed();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
        self.inner.mark_closed();
    }
}

/// Decode and dispatch one inbound line.
///
/// Decoding happens on the reader task (sequential); request handling is
/// spawned so slow tools never block the stream.
fn dispatch_line(inner: &Arc<SessionInner>, handler: &Arc<dyn RequestHandler>, line: &str) {
    match Frame::parse(line) {
        Ok(Frame::Response(response)) => {
            let outcome = match response.error {
                Some(err) => Err(SessionError::Remote {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            inner.resolve(&response.id, outcome);
        }
        Ok(Frame::Request(request)) => {
            trace!(id = request.id, method = %request.method, "inbound request");
            if let Err(err) = inner.gate_inbound(&request.method) {
                inner.send_response(&RpcResponse::error(request.id, err));
                return;
            }
            if request.method == methods::PING {
                inner.send_response(&RpcResponse::result(request.id, json!({})));
                return;
            }
            let inner = Arc::clone(inner);
            let handler = Arc::clone(handler);
            tokio::spawn(async move {
                let response = match handler
                    .handle_request(&request.method, request.params)
                    .await
                {
                    Ok(result) => RpcResponse::result(request.id, result),
                    Err(err) => RpcResponse::error(request.id, err),
                };
                inner.send_response(&response);
            });
        }
        Ok(Frame::Notification(notification)) => {
            inner.observe_notification(&notification.method);
            let handler = Arc::clone(handler);
            tokio::spawn(async move {
                handler
                    .handle_notification(&notification.method, notification.params)
                    .await;
            });
        }
        Err(FrameError::Unparseable(reason)) => {
            warn!(%reason, "unparseable frame");
            inner.send_response(&RpcResponse::error(
                Value::Null,
                RpcError::parse_error(reason),
            ));
        }
        Err(FrameError::Invalid { id, reason }) => {
            warn!(%reason, "invalid frame");
            inner.send_response(&RpcResponse::error(id, RpcError::invalid_request(reason)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Echo handler: returns its params as the result.
    struct EchoHandler;

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle_request(
            &self,
            _method: &str,
            params: Option<Value>,
        ) -> Result<Value, RpcError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    fn session_pair(
        server_handler: Arc<dyn RequestHandler>,
        timeout: Duration,
    ) -> (Session, Session) {
        let (client_io, server_io) = duplex(64 * 1024);
        let (cr, cw) = split(client_io);
        let (sr, sw) = split(server_io);
        let server = Session::with_timeout(sr, sw, server_handler, timeout);
        let client = Session::with_timeout(cr, cw, Arc::new(NullHandler), timeout);
        (client, server)
    }

    #[tokio::test]
    async fn handshake_moves_both_sides_to_ready() {
        let (client, server) = session_pair(Arc::new(EchoHandler), REQUEST_TIMEOUT);
        assert_eq!(client.state(), SessionState::Uninitialized);

        // EchoHandler returns the params, which happen to decode as an
        // InitializeResult only if we shape them; use a real server shape.
        // Here we drive the raw methods instead.
        let reply = client
            .request(methods::INITIALIZE, Some(json!({"ok": true})))
            .await
            .unwrap();
        assert_eq!(reply, json!({"ok": true}));
        client.notify(methods::INITIALIZED, None).unwrap();

        // Give the notification a turn to be decoded.
        tokio::task::yield_now().await;
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while server.state() != SessionState::Ready && std::time::Instant::now() < deadline {
            tokio::task::yield_now().await;
        }
        assert_eq!(server.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn request_ids_are_monotonic() {
        let (client, _server) = session_pair(Arc::new(EchoHandler), REQUEST_TIMEOUT);
        let _ = client.request(methods::INITIALIZE, None).await.unwrap();
        client.notify(methods::INITIALIZED, None).unwrap();

        // Echoed params prove each request/response pair correlates.
        for expected in 1..=5u64 {
            let reply = client
                .request("echo", Some(json!({ "n": expected })))
                .await
                .unwrap();
            assert_eq!(reply, json!({ "n": expected }));
        }
    }

    #[tokio::test]
    async fn request_before_handshake_is_rejected() {
        let (client, _server) = session_pair(Arc::new(EchoHandler), REQUEST_TIMEOUT);
        let err = client.request("tools/list", None).await.unwrap_err();
        match err {
            SessionError::Remote { code, message } => {
                assert_eq!(code, crate::protocol::error_codes::INVALID_REQUEST);
                assert!(message.contains("not initialized"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_is_answered_in_any_state() {
        let (client, _server) = session_pair(Arc::new(EchoHandler), REQUEST_TIMEOUT);
        let reply = client.request(methods::PING, None).await.unwrap();
        assert_eq!(reply, json!({}));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_and_entry_is_removed() {
        // A stream whose far end never answers.
        let (client_io, black_hole) = duplex(64 * 1024);
        let (cr, cw) = split(client_io);
        let client = Session::with_timeout(
            cr,
            cw,
            Arc::new(NullHandler),
            Duration::from_millis(250),
        );

        let err = client.request("ping", None).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(lock(&client.inner.pending).is_empty());

        // A late response for the timed-out id must be ignored, and the
        // session must keep working for later requests.
        let (mut bh_read, mut bh_write) = split(black_hole);
        bh_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"late\":true}}\n")
            .await
            .unwrap();

        // Drain the client's outbound so the next request can be answered
        // by hand: skip the first line (the timed-out request).
        let mut lines = BufReader::new(&mut bh_read).lines();
        let _ = lines.next_line().await.unwrap();

        let pending = tokio::spawn({
            let fut = async move {
                bh_write
                    .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"fresh\":true}}\n")
                    .await
                    .unwrap();
            };
            async move {
                // Wait for the second request to hit the wire first.
                tokio::time::sleep(Duration::from_millis(10)).await;
                fut.await;
            }
        });

        let reply = client.request("ping", None).await.unwrap();
        assert_eq!(reply, json!({"fresh": true}));
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn closing_stream_rejects_pending_waiters() {
        let (client_io, server_io) = duplex(64 * 1024);
        let (cr, cw) = split(client_io);
        let client = Session::connect(cr, cw, Arc::new(NullHandler));

        let request = tokio::spawn({
            let fut = async move { client.request("ping", None).await };
            fut
        });

        // Give the request a moment to register, then drop the far end.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(server_io);

        let outcome = request.await.unwrap();
        assert!(matches!(outcome, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn malformed_line_gets_parse_error_response() {
        let (raw_client, server_io) = duplex(64 * 1024);
        let (sr, sw) = split(server_io);
        let _server = Session::connect(sr, sw, Arc::new(EchoHandler));

        let (read_half, mut write_half) = split(raw_client);
        write_half.write_all(b"this is not json\n").await.unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(
            response.error.unwrap().code,
            crate::protocol::error_codes::PARSE_ERROR
        );
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let (client, _server) = session_pair(Arc::new(EchoHandler), REQUEST_TIMEOUT);
        let _ = client.request(methods::INITIALIZE, None).await.unwrap();
        client.notify(methods::INITIALIZED, None).unwrap();

        let err = client.request(methods::INITIALIZE, None).await.unwrap_err();
        assert!(matches!(err, SessionError::Remote { code, .. }
            if code == crate::protocol::error_codes::INVALID_REQUEST));
    }
}
