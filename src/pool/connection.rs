use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error};

use crate::protocol::resultset::{parse_column_name, parse_text_row, read_lenenc_int};
use crate::protocol::{
    capabilities, compute_auth_response, is_eof_packet, is_err_packet, is_ok_packet,
    AuthSwitchRequest, Command, ErrPacket, HandshakeResponse, InitialHandshake, Packet,
    PacketCodec, ResultSet, NATIVE_PASSWORD_PLUGIN,
};

use super::uri::DbUri;

/// Upper bound on columns in a result set (the server's own table limit)
const MAX_COLUMNS: u64 = 4096;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is available for use
    Idle,
    /// Connection is currently in use
    InUse,
    /// A command was sent and its response is not fully read
    Busy,
    /// Connection is broken/closed
    Closed,
}

/// A client connection to a MySQL endpoint
pub struct PooledConnection {
    framed: Framed<TcpStream, PacketCodec>,
    state: ConnectionState,
    last_used_at: Instant,
    capabilities: u32,
    addr: String,
}

impl PooledConnection {
    /// Open and authenticate a connection
    ///
    /// `default_timeout` bounds the TCP connect when the URI carries no
    /// `timeout` parameter. Nothing bounds the handshake or later queries.
    pub async fn connect(
        uri: &DbUri,
        default_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let addr = uri.addr();
        let connect_timeout = uri.timeout.unwrap_or(default_timeout);
        debug!(addr = %addr, timeout_ms = connect_timeout.as_millis() as u64, "Connecting to endpoint");

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(addr = %addr, error = %e, "Failed to connect to endpoint");
                return Err(ConnectionError::Connect(format!("{addr}: {e}")));
            }
            Err(_) => {
                error!(addr = %addr, "Connect timed out");
                return Err(ConnectionError::Timeout(addr));
            }
        };
        let _ = stream.set_nodelay(true);

        let mut framed = Framed::new(stream, PacketCodec);

        let handshake_packet = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if is_err_packet(&handshake_packet.payload) {
            // e.g. "Host is blocked" or "Too many connections" before handshake
            let err = ErrPacket::parse(&handshake_packet.payload, 0)
                .unwrap_or_else(|| ErrPacket::new(2013, "HY000", "Lost connection"));
            return Err(ConnectionError::Server(err.error_message));
        }

        let handshake = InitialHandshake::parse(&handshake_packet.payload)
            .ok_or_else(|| ConnectionError::Protocol("Invalid server handshake".into()))?;

        debug!(
            server_version = %handshake.server_version,
            connection_id = handshake.connection_id,
            "Received server handshake"
        );

        let mut caps = capabilities::DEFAULT_CAPABILITIES & handshake.capability_flags;
        if uri.schema.is_some() {
            caps |= capabilities::CLIENT_CONNECT_WITH_DB;
        } else {
            caps &= !capabilities::CLIENT_CONNECT_WITH_DB;
        }

        let response = HandshakeResponse {
            capability_flags: caps,
            max_packet_size: 16 * 1024 * 1024,
            character_set: 0x21, // utf8_general_ci
            username: uri.user.clone(),
            auth_response: compute_auth_response(&uri.password, &handshake.auth_plugin_data()),
            database: uri.schema.clone(),
            auth_plugin_name: NATIVE_PASSWORD_PLUGIN.to_string(),
        };

        framed
            .send(response.encode(handshake_packet.sequence_id.wrapping_add(1)))
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        let mut reply = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        // Server may ask to re-scramble with a different seed or plugin
        if reply.payload.first() == Some(&0xFE) {
            let switch = AuthSwitchRequest::parse(&reply.payload)
                .ok_or_else(|| ConnectionError::Protocol("Invalid auth switch request".into()))?;
            if switch.plugin_name != NATIVE_PASSWORD_PLUGIN {
                return Err(ConnectionError::Auth(format!(
                    "unsupported auth plugin: {}",
                    switch.plugin_name
                )));
            }
            let scramble = compute_auth_response(&uri.password, &switch.auth_data);
            framed
                .send(Packet::new(reply.sequence_id.wrapping_add(1), scramble))
                .await
                .map_err(|e| ConnectionError::Io(e.to_string()))?;
            reply = framed
                .next()
                .await
                .ok_or(ConnectionError::Disconnected)?
                .map_err(|e| ConnectionError::Io(e.to_string()))?;
        }

        if is_err_packet(&reply.payload) {
            let err = ErrPacket::parse(&reply.payload, caps)
                .unwrap_or_else(|| ErrPacket::new(1045, "28000", "Access denied"));
            error!(
                addr = %addr,
                error_code = err.error_code,
                error_message = %err.error_message,
                "Authentication failed"
            );
            return Err(ConnectionError::Auth(err.error_message));
        }

        if !is_ok_packet(&reply.payload) {
            return Err(ConnectionError::Protocol(
                "Expected OK packet after authentication".into(),
            ));
        }

        debug!(addr = %addr, "Authenticated");

        let now = Instant::now();
        Ok(Self {
            framed,
            state: ConnectionState::Idle,
            last_used_at: now,
            capabilities: caps,
            addr,
        })
    }

    /// Run a statement and buffer its text result set
    ///
    /// The connection stays [`ConnectionState::Busy`] until the response is
    /// read to its terminating packet. If this future is dropped early the
    /// connection is closed on release instead of being reused.
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError> {
        if !self.is_usable() {
            return Err(ConnectionError::Disconnected.into());
        }
        self.state = ConnectionState::Busy;
        self.send(Packet::command(Command::Query, sql.as_bytes()))
            .await?;

        let result = self.read_result_set().await;
        self.finish_command();
        result
    }

    async fn read_result_set(&mut self) -> Result<ResultSet, QueryError> {
        let first = self.recv().await?;
        if is_err_packet(&first.payload) {
            return Err(self.server_error(&first));
        }
        if is_ok_packet(&first.payload) {
            return Ok(ResultSet::empty());
        }

        let column_count = match read_lenenc_int(&first.payload) {
            Some((n, _)) if n > 0 && n <= MAX_COLUMNS => n as usize,
            _ => return Err(self.protocol_error("invalid column count")),
        };

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let def = self.recv().await?;
            let name = parse_column_name(&def.payload)
                .ok_or_else(|| self.protocol_error("invalid column definition"))?;
            columns.push(name);
        }

        // EOF after column definitions (DEPRECATE_EOF is never negotiated)
        let eof = self.recv().await?;
        if !is_eof_packet(&eof.payload) {
            return Err(self.protocol_error("expected EOF after column definitions"));
        }

        let mut rows = Vec::new();
        loop {
            let packet = self.recv().await?;
            if is_eof_packet(&packet.payload) {
                break;
            }
            if is_err_packet(&packet.payload) {
                return Err(self.server_error(&packet));
            }
            let row = parse_text_row(&packet.payload, columns.len())
                .ok_or_else(|| self.protocol_error("malformed row"))?;
            rows.push(row);
        }

        Ok(ResultSet::new(columns, rows))
    }

    /// Check if connection is healthy by sending a ping
    pub async fn ping(&mut self) -> bool {
        self.state = ConnectionState::Busy;
        if self.send(Packet::command(Command::Ping, &[])).await.is_err() {
            return false;
        }
        match self.recv().await {
            Ok(packet) if is_ok_packet(&packet.payload) => {
                self.finish_command();
                true
            }
            _ => {
                self.state = ConnectionState::Closed;
                false
            }
        }
    }

    /// Response fully read; a closed connection stays closed
    fn finish_command(&mut self) {
        if self.state == ConnectionState::Busy {
            self.state = ConnectionState::InUse;
            self.last_used_at = Instant::now();
        }
    }

    /// Send COM_QUIT and mark closed
    pub async fn quit(&mut self) {
        let _ = self.framed.send(Packet::command(Command::Quit, &[])).await;
        self.state = ConnectionState::Closed;
    }

    /// Check if connection has been idle too long
    pub fn is_idle_too_long(&self, max_idle: Duration) -> bool {
        self.last_used_at.elapsed() > max_idle
    }

    /// Mark connection as in use
    pub fn acquire(&mut self) {
        self.state = ConnectionState::InUse;
        self.last_used_at = Instant::now();
    }

    /// Mark connection as available
    ///
    /// A connection released mid-command has unread response packets on
    /// the wire and is closed instead.
    pub fn release(&mut self) {
        self.state = match self.state {
            ConnectionState::Idle | ConnectionState::InUse => ConnectionState::Idle,
            ConnectionState::Busy | ConnectionState::Closed => ConnectionState::Closed,
        };
    }

    /// Check if connection is usable
    pub fn is_usable(&self) -> bool {
        matches!(self.state, ConnectionState::Idle | ConnectionState::InUse)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint address (host:port)
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn send(&mut self, packet: Packet) -> Result<(), ConnectionError> {
        match self.framed.send(packet).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = ConnectionState::Closed;
                Err(ConnectionError::Io(e.to_string()))
            }
        }
    }

    async fn recv(&mut self) -> Result<Packet, ConnectionError> {
        match self.framed.next().await {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => {
                self.state = ConnectionState::Closed;
                Err(ConnectionError::Io(e.to_string()))
            }
            None => {
                self.state = ConnectionState::Closed;
                Err(ConnectionError::Disconnected)
            }
        }
    }

    fn server_error(&self, packet: &Packet) -> QueryError {
        let err = ErrPacket::parse(&packet.payload, self.capabilities)
            .unwrap_or_else(|| ErrPacket::new(0, "HY000", "Unknown server error"));
        QueryError::Server {
            code: err.error_code,
            state: err.sql_state,
            message: err.error_message,
        }
    }

    /// The stream position is unknown after a decode failure, so the
    /// connection is not reused
    fn protocol_error(&mut self, msg: &str) -> QueryError {
        self.state = ConnectionState::Closed;
        QueryError::Protocol(msg.to_string())
    }
}

/// Connection errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid connection URI: {0}")]
    InvalidUri(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server refused connection: {0}")]
    Server(String),

    #[error("Connection disconnected")]
    Disconnected,
}

/// Errors running a statement or scanning its result
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Error {code} ({state}): {message}")]
    Server {
        code: u16,
        state: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("no rows in result set")]
    NoRows,

    #[error("expected {expected} columns in result, got {actual}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("{0}")]
    Scan(String),
}
