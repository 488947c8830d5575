//! Connection state machine driving the handshake, a single in-flight
//! query/insert, and packet multiplexing. [`crate::client::Client`] is a
//! thin wrapper over this type: it owns the `Session` and translates its
//! calls into the public, ergonomic surface (`query`, `execute`, `insert`).

use crate::block::Block;
use crate::client::ClientOptions;
use crate::connection::Connection;
use crate::io::{BlockReader, BlockWriter};
use crate::progress::AccumulatedProgress;
use crate::protocol::{ClientCode, ServerCode, Stage};
use crate::protocol::revision;
use crate::query::{Progress, Query, ServerInfo, ServerException};
use crate::{Error, Result};
use bytes::BytesMut;
use std::time::{Duration, Instant};

/// Lifecycle state of a [`Session`]. Transitions: `Connecting` ->
/// `Handshaking` -> `Idle` <-> `{Querying, Inserting}` -> `Closed`.
///
/// `Session::connect` folds `Connecting`/`Handshaking` into a single
/// constructor call rather than modeling them as held state, and a
/// connection that errors out is simply dropped rather than transitioned
/// to `Closed`; those two variants exist to name the full state machine in
/// one place, not because anything currently constructs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub(crate) enum State {
    Connecting,
    Handshaking,
    Idle,
    Querying,
    Inserting,
    Closed,
}

/// Outcome of draining a query to completion: the buffered blocks plus the
/// final accumulated progress, handed back to `Client::query`.
pub(crate) struct QueryOutcome {
    pub blocks: Vec<Block>,
    pub progress: Progress,
    pub accumulated_progress: AccumulatedProgress,
}

/// Owns the TCP connection and protocol state for one logical session
/// against a single server. Not `Clone`: a session is either idle or busy
/// running exactly one query/insert at a time, enforced by `state`.
pub(crate) struct Session {
    conn: Connection,
    server_info: ServerInfo,
    block_reader: BlockReader,
    block_writer: BlockWriter,
    state: State,
}

impl Session {
    /// Perform the TCP connect (trying each configured endpoint in turn)
    /// and the handshake, landing in `Idle` on success.
    pub(crate) async fn connect(options: &ClientOptions) -> Result<Self> {
        let mut conn = Self::connect_with_failover(options).await?;

        Self::send_hello(&mut conn, options).await?;
        let server_info = Self::receive_hello(&mut conn).await?;

        if server_info.revision >= revision::WITH_QUOTA_KEY {
            conn.write_string("").await?;
            conn.flush().await?;
        }

        let mut block_reader = BlockReader::new(server_info.revision);
        let mut block_writer = BlockWriter::new(server_info.revision);
        if let Some(compression) = options.compression {
            block_reader = block_reader.with_compression(compression);
            block_writer = block_writer.with_compression(compression);
        }

        Ok(Self {
            conn,
            server_info,
            block_reader,
            block_writer,
            state: State::Idle,
        })
    }

    /// Try `options.host`/`options.port` first, then every endpoint added
    /// with `ClientOptions::add_endpoint`, retrying the whole list up to
    /// `options.send_retries` times with `options.retry_timeout` between
    /// full passes. Returns the first endpoint that accepts a TCP (or TLS)
    /// connection.
    async fn connect_with_failover(options: &ClientOptions) -> Result<Connection> {
        let mut endpoints = Vec::with_capacity(1 + options.extra_endpoints.len());
        endpoints.push((options.host.clone(), options.port));
        endpoints.extend(options.extra_endpoints.iter().cloned());

        let attempts = options.send_retries.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(options.retry_timeout).await;
            }
            for (host, port) in &endpoints {
                let result = Self::connect_one(host, port, options).await;
                match result {
                    Ok(conn) => return Ok(conn),
                    Err(e) => {
                        tracing::debug!(host, port, error = %e, "endpoint connect failed");
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Transport("no endpoints configured".to_string())
        }))
    }

    async fn connect_one(
        host: &str,
        port: &u16,
        options: &ClientOptions,
    ) -> Result<Connection> {
        #[cfg(feature = "tls")]
        {
            if let Some(ssl_options) = &options.ssl_options {
                return Connection::connect_tls(
                    host,
                    *port,
                    &options.connection_options,
                    ssl_options,
                )
                .await;
            }
        }
        Connection::connect_with_options(host, *port, &options.connection_options).await
    }

    async fn send_hello(conn: &mut Connection, options: &ClientOptions) -> Result<()> {
        conn.write_varint(ClientCode::Hello as u64).await?;
        conn.write_string(&options.client_info.client_name).await?;
        conn.write_varint(options.client_info.client_version_major).await?;
        conn.write_varint(options.client_info.client_version_minor).await?;
        conn.write_varint(options.client_info.client_revision).await?;
        conn.write_string(&options.database).await?;
        conn.write_string(&options.user).await?;
        conn.write_string(&options.password).await?;
        conn.flush().await?;
        Ok(())
    }

    async fn receive_hello(conn: &mut Connection) -> Result<ServerInfo> {
        let packet_type = conn.read_varint().await?;

        if packet_type == ServerCode::Exception as u64 {
            let exception = read_exception(conn).await?;
            return Err(Error::Server(exception));
        }
        if packet_type != ServerCode::Hello as u64 {
            return Err(Error::Protocol(format!(
                "expected Hello packet, got {}",
                packet_type
            )));
        }

        // ServerInfo::read_from operates on an in-memory slice; the
        // handshake fields arrive one at a time over the wire instead, so
        // they're read directly off the connection and assembled here.
        let name = conn.read_string().await?;
        let version_major = conn.read_varint().await?;
        let version_minor = conn.read_varint().await?;
        let revision = conn.read_varint().await?;

        let timezone = if revision >= self::revision::WITH_SERVER_TIMEZONE {
            conn.read_string().await?
        } else {
            String::new()
        };
        let display_name = if revision >= self::revision::WITH_SERVER_DISPLAY_NAME {
            conn.read_string().await?
        } else {
            String::new()
        };
        let version_patch = if revision >= self::revision::WITH_VERSION_PATCH {
            conn.read_varint().await?
        } else {
            0
        };

        Ok(ServerInfo {
            name,
            version_major,
            version_minor,
            version_patch,
            revision,
            timezone,
            display_name,
        })
    }

    pub(crate) fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn enter(&mut self, next: State) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::SessionBusy);
        }
        self.state = next;
        Ok(())
    }

    fn leave(&mut self) {
        self.state = State::Idle;
    }

    /// Run a query to completion, invoking the query's callbacks as each
    /// packet arrives and honoring `query_timeout`/cancellation.
    pub(crate) async fn execute_query(
        &mut self,
        query: &Query,
        options: &ClientOptions,
    ) -> Result<QueryOutcome> {
        self.enter(State::Querying)?;
        let outcome = self.drive_query(query, options).await;
        self.leave();
        outcome
    }

    async fn drive_query(
        &mut self,
        query: &Query,
        options: &ClientOptions,
    ) -> Result<QueryOutcome> {
        let body = async {
            self.send_query(query, options).await?;
            self.read_query_response(query).await
        };

        match options.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, body).await {
                Ok(result) => result,
                Err(_) => {
                    self.cancel_and_drain(options.cancel_grace_period).await;
                    Err(Error::Timeout { operation: "query" })
                }
            },
            None => body.await,
        }
    }

    async fn read_query_response(&mut self, query: &Query) -> Result<QueryOutcome> {
        let mut blocks = Vec::new();
        let mut progress_info = Progress::default();
        let mut accumulated = AccumulatedProgress::default();
        let started_at = Instant::now();
        let token = query.cancellation_token();

        loop {
            if let Some(token) = token {
                if token.is_cancelled() {
                    self.send_cancel().await?;
                }
            }

            let packet_type = self.conn.read_varint().await?;
            let code = ServerCode::try_from(packet_type)?;

            match code {
                ServerCode::Data | ServerCode::Totals | ServerCode::Extremes => {
                    if self.server_info.revision >= revision::WITH_TEMPORARY_TABLES {
                        let _temp_table = self.conn.read_string().await?;
                    }
                    let block = self.block_reader.read_block(&mut self.conn).await?;
                    if !block.is_empty() {
                        if let Some(cb) = query.get_on_data() {
                            cb(&block);
                        }
                        let keep_going = query
                            .get_on_data_cancelable()
                            .map(|cb| cb(&block))
                            .unwrap_or(true);
                        blocks.push(block);
                        if !keep_going {
                            self.send_cancel().await?;
                        }
                    }
                }
                ServerCode::Progress => {
                    progress_info = Progress::read_from_conn(&mut self.conn, self.server_info.revision).await?;
                    accumulated.apply_progress(
                        &progress_info,
                        started_at.elapsed().as_nanos() as u64,
                    );
                    if let Some(cb) = query.get_on_progress() {
                        cb(&progress_info);
                    }
                }
                ServerCode::EndOfStream => break,
                ServerCode::ProfileInfo => {
                    let profile = read_profile(&mut self.conn).await?;
                    if let Some(cb) = query.get_on_profile() {
                        cb(&profile);
                    }
                }
                ServerCode::Log => {
                    let _log_tag = self.conn.read_string().await?;
                    let uncompressed_reader = BlockReader::new(self.server_info.revision);
                    let block = uncompressed_reader.read_block(&mut self.conn).await?;
                    let keep_going = query
                        .get_on_server_log()
                        .map(|cb| cb(&block))
                        .unwrap_or(true);
                    if !keep_going {
                        self.send_cancel().await?;
                    }
                }
                ServerCode::ProfileEvents => {
                    let _table_name = self.conn.read_string().await?;
                    let uncompressed_reader = BlockReader::new(self.server_info.revision);
                    let block = uncompressed_reader.read_block(&mut self.conn).await?;
                    accumulated.apply_profile_events(&block);
                    let keep_going = query
                        .get_on_profile_events()
                        .map(|cb| cb(&block))
                        .unwrap_or(true);
                    if !keep_going {
                        self.send_cancel().await?;
                    }
                }
                ServerCode::TableColumns => {
                    let _table_name = self.conn.read_string().await?;
                    let _columns_metadata = self.conn.read_string().await?;
                }
                ServerCode::TimezoneUpdate => {
                    let _new_timezone = self.conn.read_string().await?;
                }
                ServerCode::Exception => {
                    let exception = read_exception(&mut self.conn).await?;
                    if let Some(cb) = query.get_on_exception() {
                        cb(&exception);
                    }
                    return Err(Error::Server(exception));
                }
                other if other.is_tolerated_unknown() => {
                    tracing::debug!(?other, "tolerating unknown-to-us packet");
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected packet type: {:?}",
                        other
                    )));
                }
            }
        }

        Ok(QueryOutcome { blocks, progress: progress_info, accumulated_progress: accumulated })
    }

    async fn send_cancel(&mut self) -> Result<()> {
        self.conn.write_varint(ClientCode::Cancel as u64).await?;
        self.conn.flush().await
    }

    /// Best-effort drain after a cancellation or timeout: send Cancel and
    /// read/discard packets until EndOfStream (or the grace period lapses)
    /// so the next query on this connection starts stream-aligned.
    async fn cancel_and_drain(&mut self, grace_period: Duration) {
        if self.send_cancel().await.is_err() {
            return;
        }
        let drain = async {
            loop {
                let packet_type = match self.conn.read_varint().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                match ServerCode::try_from(packet_type) {
                    Ok(ServerCode::EndOfStream) | Err(_) => return,
                    Ok(ServerCode::Data | ServerCode::Totals | ServerCode::Extremes) => {
                        if self.server_info.revision >= revision::WITH_TEMPORARY_TABLES {
                            let _ = self.conn.read_string().await;
                        }
                        let _ = self.block_reader.read_block(&mut self.conn).await;
                    }
                    Ok(ServerCode::Progress) => {
                        let _ = Progress::read_from_conn(&mut self.conn, self.server_info.revision).await;
                    }
                    Ok(ServerCode::Exception) => {
                        let _ = read_exception(&mut self.conn).await;
                        return;
                    }
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(grace_period, drain).await;
    }

    async fn send_query(&mut self, query: &Query, options: &ClientOptions) -> Result<()> {
        self.conn.write_varint(ClientCode::Query as u64).await?;
        self.conn.write_string(query.id()).await?;

        let revision = self.server_info.revision;
        if revision >= revision::WITH_CLIENT_INFO {
            let mut buf = BytesMut::new();
            options.client_info.write_to(&mut buf, revision)?;
            self.conn.write_bytes(&buf).await?;
        }

        if revision >= revision::WITH_SETTINGS_SERIALIZED_AS_STRINGS {
            for (key, value) in query.settings() {
                self.conn.write_string(key).await?;
                self.conn.write_varint(0).await?; // flags: not custom
                self.conn.write_string(value).await?;
            }
        }
        self.conn.write_string("").await?; // end of settings

        if revision >= revision::WITH_INTERSERVER_SECRET {
            self.conn.write_string("").await?;
        }

        self.conn.write_varint(Stage::Complete as u64).await?;
        let compression_enabled = if options.compression.is_some() { 1u64 } else { 0u64 };
        self.conn.write_varint(compression_enabled).await?;
        self.conn.write_string(query.text()).await?;

        if revision >= revision::WITH_PARAMETERS {
            for (key, value) in query.parameters() {
                self.conn.write_string(key).await?;
                self.conn.write_varint(2).await?; // custom flag
                self.conn.write_string(value).await?;
            }
            self.conn.write_string("").await?;
        }

        for table in query.external_tables() {
            self.conn.write_varint(ClientCode::Data as u64).await?;
            self.conn.write_string(&table.name).await?;
            self.block_writer.write_block(&mut self.conn, &table.block).await?;
        }

        self.conn.write_varint(ClientCode::Data as u64).await?;
        self.conn.write_string("").await?;
        let empty_block = Block::new();
        self.block_writer.write_block(&mut self.conn, &empty_block).await?;

        self.conn.flush().await
    }

    /// Run an insert: send the INSERT query, wait for the server's
    /// acknowledging (empty) Data packet, validate the block against it if
    /// the server sent a header, then stream the data.
    pub(crate) async fn execute_insert(
        &mut self,
        table_name: &str,
        query_id: &str,
        block: Block,
        options: &ClientOptions,
    ) -> Result<()> {
        self.enter(State::Inserting)?;
        let result = self.drive_insert(table_name, query_id, block, options).await;
        self.leave();
        result
    }

    async fn drive_insert(
        &mut self,
        table_name: &str,
        query_id: &str,
        block: Block,
        options: &ClientOptions,
    ) -> Result<()> {
        let col_names: Vec<String> = (0..block.column_count())
            .filter_map(|i| block.column_name(i))
            .map(|n| format!("`{}`", n.replace('`', "``")))
            .collect();

        if col_names.is_empty() {
            return Err(Error::Validation("block has no columns".to_string()));
        }

        let query_text = format!("INSERT INTO {} ({}) VALUES", table_name, col_names.join(", "));
        let query = Query::new(query_text).with_query_id(query_id);

        self.send_query(&query, options).await?;

        // Wait for the server's header (empty) Data packet, validating the
        // insert block's schema against it when column metadata is present.
        loop {
            let packet_type = self.conn.read_varint().await?;
            match ServerCode::try_from(packet_type)? {
                ServerCode::Data => {
                    if self.server_info.revision >= revision::WITH_TEMPORARY_TABLES {
                        let _temp_table = self.conn.read_string().await?;
                    }
                    let header = self.block_reader.read_block(&mut self.conn).await?;
                    if header.column_count() > 0 {
                        validate_insert_schema(&header, &block)?;
                    }
                    break;
                }
                ServerCode::Progress => {
                    let _ = Progress::read_from_conn(&mut self.conn, self.server_info.revision).await?;
                }
                ServerCode::TableColumns => {
                    let _table_name = self.conn.read_string().await?;
                    let _columns_metadata = self.conn.read_string().await?;
                }
                ServerCode::Exception => {
                    let exception = read_exception(&mut self.conn).await?;
                    return Err(Error::Server(exception));
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected packet while waiting for insert header: {:?}",
                        other
                    )));
                }
            }
        }

        self.conn.write_varint(ClientCode::Data as u64).await?;
        self.block_writer.write_block(&mut self.conn, &block).await?;

        let empty_block = Block::new();
        self.conn.write_varint(ClientCode::Data as u64).await?;
        self.block_writer.write_block(&mut self.conn, &empty_block).await?;
        self.conn.flush().await?;

        loop {
            let packet_type = self.conn.read_varint().await?;
            match ServerCode::try_from(packet_type)? {
                ServerCode::EndOfStream => break,
                ServerCode::Data => {
                    if self.server_info.revision >= revision::WITH_TEMPORARY_TABLES {
                        let _temp_table = self.conn.read_string().await?;
                    }
                    let _block = self.block_reader.read_block(&mut self.conn).await?;
                }
                ServerCode::Progress => {
                    let _ = Progress::read_from_conn(&mut self.conn, self.server_info.revision).await?;
                }
                ServerCode::ProfileEvents => {
                    let _table_name = self.conn.read_string().await?;
                    let uncompressed_reader = BlockReader::new(self.server_info.revision);
                    let _block = uncompressed_reader.read_block(&mut self.conn).await?;
                }
                ServerCode::TableColumns => {
                    let _table_name = self.conn.read_string().await?;
                    let _columns_metadata = self.conn.read_string().await?;
                }
                ServerCode::Exception => {
                    let exception = read_exception(&mut self.conn).await?;
                    return Err(Error::Server(exception));
                }
                other => {
                    tracing::debug!(?other, "ignoring unexpected packet after insert data");
                }
            }
        }

        Ok(())
    }

    pub(crate) async fn ping(&mut self) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::SessionBusy);
        }
        self.conn.write_varint(ClientCode::Ping as u64).await?;
        self.conn.flush().await?;

        let packet_type = self.conn.read_varint().await?;
        if packet_type == ServerCode::Pong as u64 {
            Ok(())
        } else if packet_type == ServerCode::Exception as u64 {
            let exception = read_exception(&mut self.conn).await?;
            Err(Error::Server(exception))
        } else {
            Err(Error::Protocol(format!("expected Pong, got {}", packet_type)))
        }
    }
}

/// Compare an insert block's column names against the server-sent header
/// block. Order-independent: the server may echo columns in table order
/// rather than the order the insert specified them in.
fn validate_insert_schema(header: &Block, inserted: &Block) -> Result<()> {
    if header.column_count() != inserted.column_count() {
        return Err(Error::SchemaMismatch(format!(
            "server expects {} columns, insert block has {}",
            header.column_count(),
            inserted.column_count()
        )));
    }

    for i in 0..header.column_count() {
        let expected_name = header.column_name(i);
        let found = (0..inserted.column_count())
            .filter_map(|j| inserted.column_name(j))
            .any(|n| Some(n) == expected_name);
        if !found {
            return Err(Error::SchemaMismatch(format!(
                "server expects column {:?}, not present in insert block",
                expected_name
            )));
        }
    }

    Ok(())
}

async fn read_profile(conn: &mut Connection) -> Result<crate::query::Profile> {
    let rows = conn.read_varint().await?;
    let blocks = conn.read_varint().await?;
    let bytes = conn.read_varint().await?;
    let applied_limit = conn.read_u8().await? != 0;
    let rows_before_limit = conn.read_varint().await?;
    let calculated_rows_before_limit = conn.read_u8().await? != 0;

    Ok(crate::query::Profile {
        rows,
        blocks,
        bytes,
        rows_before_limit,
        applied_limit,
        calculated_rows_before_limit,
    })
}

async fn read_exception(conn: &mut Connection) -> Result<ServerException> {
    let code = conn.read_i32().await?;
    let name = conn.read_string().await?;
    let message = conn.read_string().await?;
    let stack_trace = conn.read_string().await?;

    let has_nested = conn.read_u8().await?;
    let nested = if has_nested != 0 {
        Some(Box::new(Box::pin(read_exception(conn)).await?))
    } else {
        None
    };

    Ok(ServerException { code, name, message, stack_trace, nested })
}

/// Extension trait giving `Progress` an async constructor that reads
/// straight off a [`Connection`] instead of a pre-buffered slice, since the
/// progress packet arrives one field at a time over the wire.
trait ProgressExt: Sized {
    fn read_from_conn(
        conn: &mut Connection,
        server_revision: u64,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self>> + '_>>;
}

impl ProgressExt for Progress {
    fn read_from_conn(
        conn: &mut Connection,
        server_revision: u64,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self>> + '_>> {
        Box::pin(async move {
            let rows = conn.read_varint().await?;
            let bytes = conn.read_varint().await?;
            let total_rows = conn.read_varint().await?;

            let (written_rows, written_bytes) = if server_revision >= revision::WITH_PROGRESS_WRITTEN {
                (conn.read_varint().await?, conn.read_varint().await?)
            } else {
                (0, 0)
            };

            Ok(Progress { rows, bytes, total_rows, written_rows, written_bytes })
        })
    }
}
