//! Per-connection pipeline: startup negotiation, TLS upgrade, frame
//! dispatch, and the bidirectional relay loop.
//!
//! Each accepted socket gets one task running [`Connection::run`]. The task
//! owns both socket halves; admission-resolution callbacks never touch the
//! sockets directly. Instead every connection carries an mpsc command
//! channel, the registered callbacks send [`SessionCommand`]s on it, and
//! the relay loop performs the actual writes.

use crate::classifier::SqlClassifier;
use crate::error::ProxyError;
use bytes::{BufMut, Bytes, BytesMut};
use querygate_admission::{AdmissionRegistry, QueryKind};
use querygate_audit::AuditLogger;
use querygate_core::BackendConfig;
use querygate_wire::{
    error_response, is_ssl_request, message_frame_len, parse_extended_query, parse_simple_query,
    ready_for_query, startup_frame_len, Decoded, FrontendMessage, SSL_ACCEPT, SSL_DENY,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

/// A write the connection task performs on behalf of a resolution.
#[derive(Debug)]
pub enum SessionCommand {
    /// Forward the released original bytes to the backend.
    Forward(Bytes),
    /// Send the client an ErrorResponse with this reason, then ReadyForQuery.
    Reject(String),
}

/// Client-side stream, possibly upgraded to TLS mid-negotiation.
trait ClientIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientIo for T {}

type ClientStream = Box<dyn ClientIo>;

/// An extended-protocol batch being withheld after a blocked Parse.
struct OpenBatch {
    sql: String,
    frames: Vec<Bytes>,
}

/// One intercepted client connection.
pub struct Connection {
    conn_id: String,
    backend: BackendConfig,
    classifier: Arc<dyn SqlClassifier>,
    registry: Arc<AdmissionRegistry>,
    audit: Arc<AuditLogger>,
    tls: Option<TlsAcceptor>,
}

impl Connection {
    pub fn new(
        conn_id: String,
        backend: BackendConfig,
        classifier: Arc<dyn SqlClassifier>,
        registry: Arc<AdmissionRegistry>,
        audit: Arc<AuditLogger>,
        tls: Option<TlsAcceptor>,
    ) -> Self {
        Self {
            conn_id,
            backend,
            classifier,
            registry,
            audit,
            tls,
        }
    }

    /// Drive the connection to completion, then tear down its pending
    /// queries. Errors end the connection; they are logged, not propagated.
    pub async fn run<S>(self, socket: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if let Err(e) = self.drive(Box::new(socket)).await {
            tracing::debug!(conn_id = %self.conn_id, error = %e, "Connection ended with error");
        }

        let removed = self.registry.cleanup(&self.conn_id).await;
        if removed > 0 {
            tracing::info!(
                conn_id = %self.conn_id,
                removed,
                "Dropped pending queries on disconnect"
            );
        }
        if let Err(e) = self.audit.log_connection(false, &self.conn_id).await {
            tracing::warn!(conn_id = %self.conn_id, error = %e, "Failed to audit disconnect");
        }
        tracing::debug!(conn_id = %self.conn_id, "Connection closed");
    }

    async fn drive(&self, mut client: ClientStream) -> Result<(), ProxyError> {
        let mut buf = BytesMut::with_capacity(8 * 1024);
        let mut ssl_negotiated = false;

        // Startup phase: untagged frames until the startup message arrives.
        // SSLRequests are answered here; at most one succeeds.
        let startup = loop {
            match startup_frame_len(&buf) {
                Decoded::Complete(len) => {
                    let frame = buf.split_to(len).freeze();
                    if !is_ssl_request(&frame) {
                        break frame;
                    }
                    match (&self.tls, ssl_negotiated) {
                        (Some(acceptor), false) => {
                            if !buf.is_empty() {
                                return Err(ProxyError::Protocol(
                                    "data pipelined behind SSLRequest".to_string(),
                                ));
                            }
                            client.write_all(&[SSL_ACCEPT]).await?;
                            client.flush().await?;
                            let acceptor = acceptor.clone();
                            client = Box::new(
                                acceptor
                                    .accept(client)
                                    .await
                                    .map_err(|e| ProxyError::Tls(format!("handshake failed: {e}")))?,
                            );
                            ssl_negotiated = true;
                            tracing::debug!(conn_id = %self.conn_id, "TLS session established");
                        }
                        _ => {
                            client.write_all(&[SSL_DENY]).await?;
                            client.flush().await?;
                        }
                    }
                }
                Decoded::Partial => {
                    if client.read_buf(&mut buf).await? == 0 {
                        // Client went away before completing startup.
                        return Ok(());
                    }
                }
                Decoded::Invalid => {
                    return Err(ProxyError::Protocol("malformed startup frame".to_string()));
                }
            }
        };

        // Bounded backend dial. Failure is reported to the client in
        // protocol terms before closing; the client is never left hanging.
        let backend = match self.dial_backend().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(conn_id = %self.conn_id, error = %e, "Backend dial failed");
                if let Err(audit_err) = self
                    .audit
                    .log_backend_dial_failed(&self.conn_id, &e.to_string())
                    .await
                {
                    tracing::warn!(conn_id = %self.conn_id, error = %audit_err, "Failed to audit dial failure");
                }
                client
                    .write_all(&error_response("backend database is unavailable"))
                    .await?;
                client.write_all(&ready_for_query()).await?;
                client.flush().await?;
                return Err(e);
            }
        };

        let (mut backend_rd, mut backend_wr) = backend.into_split();
        backend_wr.write_all(&startup).await?;

        let (mut client_rd, mut client_wr) = tokio::io::split(client);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let mut batch: Option<OpenBatch> = None;
        let mut back_buf = BytesMut::with_capacity(8 * 1024);

        // Frames pipelined behind the startup message are dispatched before
        // the first read.
        self.pump_client_frames(&mut buf, &mut batch, &cmd_tx, &mut backend_wr)
            .await?;

        loop {
            tokio::select! {
                read = client_rd.read_buf(&mut buf) => {
                    if read? == 0 {
                        break;
                    }
                    self.pump_client_frames(&mut buf, &mut batch, &cmd_tx, &mut backend_wr)
                        .await?;
                }
                read = backend_rd.read_buf(&mut back_buf) => {
                    if read? == 0 {
                        tracing::debug!(conn_id = %self.conn_id, "Backend closed the connection");
                        break;
                    }
                    // Relayed unchanged; a write failure means the client is
                    // gone and the bytes are dropped with the connection.
                    client_wr.write_all(&back_buf).await?;
                    client_wr.flush().await?;
                    back_buf.clear();
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Forward(bytes)) => {
                            backend_wr.write_all(&bytes).await?;
                        }
                        Some(SessionCommand::Reject(reason)) => {
                            self.send_rejection(&mut client_wr, &reason).await?;
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }

    async fn dial_backend(&self) -> Result<TcpStream, ProxyError> {
        let address = self.backend.address();
        let timeout = Duration::from_secs(self.backend.connect_timeout_secs);
        match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(conn_id = %self.conn_id, backend = %address, "Backend connected");
                Ok(stream)
            }
            Ok(Err(source)) => Err(ProxyError::BackendConnectFailed { address, source }),
            Err(_) => Err(ProxyError::BackendConnectTimeout {
                address,
                timeout_secs: self.backend.connect_timeout_secs,
            }),
        }
    }

    /// Dispatch every complete tagged frame currently buffered.
    async fn pump_client_frames(
        &self,
        buf: &mut BytesMut,
        batch: &mut Option<OpenBatch>,
        cmd_tx: &mpsc::UnboundedSender<SessionCommand>,
        backend_wr: &mut OwnedWriteHalf,
    ) -> Result<(), ProxyError> {
        loop {
            match message_frame_len(buf) {
                Decoded::Complete(len) => {
                    let frame = buf.split_to(len).freeze();
                    self.dispatch(frame, batch, cmd_tx, backend_wr).await?;
                }
                Decoded::Partial => return Ok(()),
                Decoded::Invalid => {
                    // Unframeable input is forwarded untouched; the backend
                    // owns the protocol error.
                    let rest = buf.split().freeze();
                    backend_wr.write_all(&rest).await?;
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch(
        &self,
        frame: Bytes,
        batch: &mut Option<OpenBatch>,
        cmd_tx: &mpsc::UnboundedSender<SessionCommand>,
        backend_wr: &mut OwnedWriteHalf,
    ) -> Result<(), ProxyError> {
        let message = FrontendMessage::from_tag(frame[0]);

        // An open batch swallows the rest of its extended-protocol unit.
        if let Some(open) = batch.as_mut() {
            if message.buffers_in_batch() {
                open.frames.push(frame);
                return Ok(());
            }
            if message == FrontendMessage::Parse {
                if let Decoded::Complete(sql) = parse_extended_query(&frame) {
                    open.sql.push('\n');
                    open.sql.push_str(&sql);
                }
                open.frames.push(frame);
                return Ok(());
            }
        }

        if message == FrontendMessage::Sync {
            if let Some(mut open) = batch.take() {
                open.frames.push(frame);
                let combined = concat_frames(&open.frames);
                return self.hold(QueryKind::Extended, &open.sql, combined, cmd_tx).await;
            }
            backend_wr.write_all(&frame).await?;
            return Ok(());
        }

        match message {
            FrontendMessage::SimpleQuery => {
                if let Decoded::Complete(sql) = parse_simple_query(&frame) {
                    if self.classifier.should_block(&sql) {
                        return self.hold(QueryKind::Simple, &sql, frame, cmd_tx).await;
                    }
                }
                // Unparseable or not blocked: forward as-is.
                backend_wr.write_all(&frame).await?;
            }
            FrontendMessage::Parse => {
                if let Decoded::Complete(sql) = parse_extended_query(&frame) {
                    if self.classifier.should_block(&sql) {
                        tracing::debug!(conn_id = %self.conn_id, "Blocked Parse opens batch buffering");
                        *batch = Some(OpenBatch {
                            sql,
                            frames: vec![frame],
                        });
                        return Ok(());
                    }
                }
                backend_wr.write_all(&frame).await?;
            }
            _ => {
                backend_wr.write_all(&frame).await?;
            }
        }
        Ok(())
    }

    /// Register a blocked query, wiring the resolution callbacks to the
    /// session command channel.
    async fn hold(
        &self,
        kind: QueryKind,
        sql: &str,
        original: Bytes,
        cmd_tx: &mpsc::UnboundedSender<SessionCommand>,
    ) -> Result<(), ProxyError> {
        let forward_tx = cmd_tx.clone();
        let reject_tx = cmd_tx.clone();
        let result = self
            .registry
            .register(
                &self.conn_id,
                kind,
                sql,
                original,
                Box::new(move |bytes| {
                    let _ = forward_tx.send(SessionCommand::Forward(bytes));
                }),
                Box::new(move |reason| {
                    let _ = reject_tx.send(SessionCommand::Reject(reason));
                }),
            )
            .await;

        match result {
            Ok(id) => {
                tracing::info!(
                    conn_id = %self.conn_id,
                    query_id = id,
                    kind = %kind,
                    "Query held for approval"
                );
                Ok(())
            }
            Err(e) => {
                // A query that should be held must not slip through on a
                // store failure; the client gets a rejection instead.
                tracing::error!(conn_id = %self.conn_id, error = %e, "Failed to hold blocked query");
                let _ = cmd_tx.send(SessionCommand::Reject(
                    "query could not be held for approval".to_string(),
                ));
                Ok(())
            }
        }
    }

    async fn send_rejection(
        &self,
        client_wr: &mut WriteHalf<ClientStream>,
        reason: &str,
    ) -> Result<(), ProxyError> {
        client_wr.write_all(&error_response(reason)).await?;
        client_wr.write_all(&ready_for_query()).await?;
        client_wr.flush().await?;
        tracing::info!(conn_id = %self.conn_id, reason = %reason, "Rejection delivered to client");
        Ok(())
    }
}

/// Concatenate the buffered frames of a batch into one contiguous unit,
/// preserving arrival order.
fn concat_frames(frames: &[Bytes]) -> Bytes {
    let total = frames.iter().map(|f| f.len()).sum();
    let mut combined = BytesMut::with_capacity(total);
    for frame in frames {
        combined.put_slice(frame);
    }
    combined.freeze()
}
