use crate::protocol::revision;
use crate::{
    block::Block,
    Error,
    Result,
};
use bytes::{
    Buf,
    BufMut,
    BytesMut,
};
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
};

/// Query settings, sent to the server as a sequence of (name, value)
/// strings with an empty-string terminator.
pub type QuerySettings = HashMap<String, String>;

/// A single query setting's wire representation: ClickHouse settings are
/// sent as strings with a "custom" flag byte; this client only ever sends
/// the plain (non-custom) form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySettingsField {
    /// Setting name.
    pub name: String,
    /// Stringified setting value.
    pub value: String,
}

/// A named external table sent alongside a query (e.g. for `IN` clauses
/// against client-supplied data). Sent as a Data packet with the table's
/// name instead of the empty string used for the main payload.
#[derive(Clone)]
pub struct ExternalTable {
    /// Table name as referenced in the query text.
    pub name: String,
    /// The table's contents.
    pub block: Block,
}

/// OpenTelemetry tracing context (W3C Trace Context)
/// See: <https://www.w3.org/TR/trace-context/>
#[derive(Clone, Debug, Default)]
pub struct TracingContext {
    /// Trace ID (128-bit identifier)
    pub trace_id: u128,
    /// Span ID (64-bit identifier)
    pub span_id: u64,
    /// Tracestate header value
    pub tracestate: String,
    /// Trace flags (8-bit flags)
    pub trace_flags: u8,
}

impl TracingContext {
    /// Create a new empty tracing context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracing context with trace and span IDs
    pub fn with_ids(trace_id: u128, span_id: u64) -> Self {
        Self { trace_id, span_id, tracestate: String::new(), trace_flags: 0 }
    }

    /// Set trace ID
    pub fn trace_id(mut self, trace_id: u128) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Set span ID
    pub fn span_id(mut self, span_id: u64) -> Self {
        self.span_id = span_id;
        self
    }

    /// Set tracestate
    pub fn tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = tracestate.into();
        self
    }

    /// Set trace flags
    pub fn trace_flags(mut self, flags: u8) -> Self {
        self.trace_flags = flags;
        self
    }

    /// Check if tracing is enabled (non-zero trace_id)
    pub fn is_enabled(&self) -> bool {
        self.trace_id != 0
    }
}

/// Query structure for building and executing queries
#[derive(Clone)]
pub struct Query {
    query_text: String,
    query_id: String,
    settings: QuerySettings,
    parameters: HashMap<String, String>,
    tracing_context: Option<TracingContext>,
    external_tables: Vec<ExternalTable>,
    on_progress: Option<ProgressCallback>,
    on_profile: Option<ProfileCallback>,
    on_profile_events: Option<ProfileEventsCallback>,
    on_server_log: Option<ServerLogCallback>,
    on_exception: Option<ExceptionCallback>,
    on_data: Option<DataCallback>,
    on_data_cancelable: Option<DataCancelableCallback>,
    cancellation_token: Option<tokio_util::sync::CancellationToken>,
}

impl Query {
    /// Create a new query
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            query_id: String::new(),
            settings: HashMap::new(),
            parameters: HashMap::new(),
            tracing_context: None,
            external_tables: Vec::new(),
            on_progress: None,
            on_profile: None,
            on_profile_events: None,
            on_server_log: None,
            on_exception: None,
            on_data: None,
            on_data_cancelable: None,
            cancellation_token: None,
        }
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Query::new(s)
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Query::new(s)
    }
}

impl Query {
    /// Set the query ID
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = query_id.into();
        self
    }

    /// Set a query setting
    pub fn with_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Set a query parameter
    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set OpenTelemetry tracing context
    pub fn with_tracing_context(mut self, context: TracingContext) -> Self {
        self.tracing_context = Some(context);
        self
    }

    /// Attach an external table to the query.
    pub fn with_external_table(mut self, table: ExternalTable) -> Self {
        self.external_tables.push(table);
        self
    }

    /// Attach a cancellation token: cancelling it mid-query causes the
    /// session to send a `Cancel` packet and drain the remaining response.
    pub fn with_cancellation_token(
        mut self,
        token: tokio_util::sync::CancellationToken,
    ) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub(crate) fn cancellation_token(&self) -> Option<&tokio_util::sync::CancellationToken> {
        self.cancellation_token.as_ref()
    }

    /// Get the query text
    pub fn text(&self) -> &str {
        &self.query_text
    }

    /// Get the tracing context
    pub fn tracing_context(&self) -> Option<&TracingContext> {
        self.tracing_context.as_ref()
    }

    /// Get the query ID
    pub fn id(&self) -> &str {
        &self.query_id
    }

    /// Get the settings
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Get the parameters
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Get the external tables attached to the query.
    pub fn external_tables(&self) -> &[ExternalTable] {
        &self.external_tables
    }

    /// Set progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Set profile callback
    pub fn on_profile<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Profile) + Send + Sync + 'static,
    {
        self.on_profile = Some(Arc::new(callback));
        self
    }

    /// Set profile events callback
    pub fn on_profile_events<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Block) -> bool + Send + Sync + 'static,
    {
        self.on_profile_events = Some(Arc::new(callback));
        self
    }

    /// Set server log callback
    pub fn on_server_log<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Block) -> bool + Send + Sync + 'static,
    {
        self.on_server_log = Some(Arc::new(callback));
        self
    }

    /// Set exception callback
    pub fn on_exception<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ServerException) + Send + Sync + 'static,
    {
        self.on_exception = Some(Arc::new(callback));
        self
    }

    /// Set data callback
    pub fn on_data<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Block) + Send + Sync + 'static,
    {
        self.on_data = Some(Arc::new(callback));
        self
    }

    /// Set cancelable data callback (return false to cancel)
    pub fn on_data_cancelable<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Block) -> bool + Send + Sync + 'static,
    {
        self.on_data_cancelable = Some(Arc::new(callback));
        self
    }

    // Internal getters for Session to invoke callbacks

    pub(crate) fn get_on_progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_ref()
    }

    pub(crate) fn get_on_profile(&self) -> Option<&ProfileCallback> {
        self.on_profile.as_ref()
    }

    pub(crate) fn get_on_profile_events(
        &self,
    ) -> Option<&ProfileEventsCallback> {
        self.on_profile_events.as_ref()
    }

    pub(crate) fn get_on_server_log(&self) -> Option<&ServerLogCallback> {
        self.on_server_log.as_ref()
    }

    pub(crate) fn get_on_exception(&self) -> Option<&ExceptionCallback> {
        self.on_exception.as_ref()
    }

    pub(crate) fn get_on_data(&self) -> Option<&DataCallback> {
        self.on_data.as_ref()
    }

    pub(crate) fn get_on_data_cancelable(
        &self,
    ) -> Option<&DataCancelableCallback> {
        self.on_data_cancelable.as_ref()
    }
}

/// Client information sent during handshake and at the start of every
/// query.
#[derive(Clone, Debug)]
pub struct ClientInfo {
    /// 1 = TCP interface.
    pub interface_type: u8,
    /// 0 = initial query, 1 = secondary query (distributed).
    pub query_kind: u8,
    /// The user that issued the initial query in a distributed chain.
    pub initial_user: String,
    /// The query id of the initial query in a distributed chain.
    pub initial_query_id: String,
    /// The address the initial query was issued from.
    pub initial_address: String,
    /// Quota key for user-level resource accounting.
    pub quota_key: String,
    /// OS user running the client process.
    pub os_user: String,
    /// Client machine hostname.
    pub client_hostname: String,
    /// Client application name.
    pub client_name: String,
    /// Client major version.
    pub client_version_major: u64,
    /// Client minor version.
    pub client_version_minor: u64,
    /// Client patch version.
    pub client_version_patch: u64,
    /// Client protocol revision.
    pub client_revision: u64,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            interface_type: 1, // TCP
            query_kind: 0,
            initial_user: String::new(),
            initial_query_id: String::new(),
            initial_address: "0.0.0.0:0".to_string(),
            quota_key: String::new(),
            os_user: std::env::var("USER")
                .unwrap_or_else(|_| "default".to_string()),
            client_hostname: gethostname(),
            client_name: "clickhouse-native-client".to_string(),
            client_version_major: 1,
            client_version_minor: 0,
            client_version_patch: 0,
            client_revision: revision::WITH_PARAMETERS,
        }
    }
}

fn gethostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

impl ClientInfo {
    /// Serialize the full client-info block sent as part of the Query
    /// packet, gating each optional section on `effective_revision`.
    pub fn write_to(
        &self,
        buffer: &mut BytesMut,
        effective_revision: u64,
    ) -> Result<()> {
        buffer.put_u8(self.query_kind);
        if self.query_kind != 0 {
            write_string(buffer, &self.initial_user);
            write_string(buffer, &self.initial_query_id);
            write_string(buffer, &self.initial_address);
            if effective_revision >= revision::WITH_INITIAL_QUERY_START_TIME
            {
                buffer.put_i64_le(0); // initial_query_start_time_microseconds
            }
        }

        buffer.put_u8(self.interface_type);
        write_string(buffer, &self.os_user);
        write_string(buffer, &self.client_hostname);
        write_string(buffer, &self.client_name);
        write_varint(buffer, self.client_version_major);
        write_varint(buffer, self.client_version_minor);
        write_varint(buffer, self.client_revision);

        if effective_revision >= revision::WITH_QUOTA_KEY_IN_CLIENT_INFO {
            write_string(buffer, &self.quota_key);
        }
        if effective_revision >= revision::WITH_DISTRIBUTED_DEPTH {
            write_varint(buffer, 0); // distributed_depth
        }
        if effective_revision >= revision::WITH_VERSION_PATCH {
            write_varint(buffer, self.client_version_patch);
        }
        if effective_revision >= revision::WITH_OPENTELEMETRY {
            buffer.put_u8(0); // no OpenTelemetry tracing context
        }
        if effective_revision >= revision::WITH_PARALLEL_REPLICAS {
            write_varint(buffer, 0); // collaborate_with_initiator
            write_varint(buffer, 0); // count_participating_replicas
            write_varint(buffer, 0); // number_of_current_replica
        }

        Ok(())
    }

    /// Deserialize from buffer (used by tests and server-side tooling that
    /// reuses this crate's wire types).
    pub fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        if buffer.is_empty() {
            return Err(Error::Protocol(
                "not enough data to read ClientInfo".to_string(),
            ));
        }

        let interface_type = buffer[0];
        buffer.advance(1);

        let os_user = read_string(buffer)?;
        let client_hostname = read_string(buffer)?;
        let client_name = read_string(buffer)?;

        let client_version_major = read_varint(buffer)?;
        let client_version_minor = read_varint(buffer)?;
        let client_revision = read_varint(buffer)?;

        Ok(Self {
            interface_type,
            client_version_major,
            client_version_minor,
            client_revision,
            client_hostname,
            client_name,
            os_user,
            ..Self::default()
        })
    }
}

/// Server information received during handshake
#[derive(Clone, Debug, Default)]
pub struct ServerInfo {
    /// Server product name, e.g. `"ClickHouse"`.
    pub name: String,
    /// Server major version.
    pub version_major: u64,
    /// Server minor version.
    pub version_minor: u64,
    /// Server patch version.
    pub version_patch: u64,
    /// Server protocol revision.
    pub revision: u64,
    /// Server timezone name.
    pub timezone: String,
    /// Human-readable server display name.
    pub display_name: String,
}

impl ServerInfo {
    /// Serialize to buffer
    pub fn write_to(&self, buffer: &mut BytesMut) -> Result<()> {
        write_string(buffer, &self.name);
        write_varint(buffer, self.version_major);
        write_varint(buffer, self.version_minor);
        write_varint(buffer, self.revision);

        if self.revision >= revision::WITH_SERVER_TIMEZONE {
            write_string(buffer, &self.timezone);
        }

        if self.revision >= revision::WITH_SERVER_DISPLAY_NAME {
            write_string(buffer, &self.display_name);
        }

        if self.revision >= revision::WITH_VERSION_PATCH {
            write_varint(buffer, self.version_patch);
        }

        Ok(())
    }

    /// Deserialize from buffer
    pub fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        let name = read_string(buffer)?;
        let version_major = read_varint(buffer)?;
        let version_minor = read_varint(buffer)?;
        let revision = read_varint(buffer)?;

        let timezone = if revision >= self::revision::WITH_SERVER_TIMEZONE {
            read_string(buffer)?
        } else {
            String::new()
        };

        let display_name =
            if revision >= self::revision::WITH_SERVER_DISPLAY_NAME {
                read_string(buffer)?
            } else {
                String::new()
            };

        let version_patch = if revision >= self::revision::WITH_VERSION_PATCH
        {
            read_varint(buffer)?
        } else {
            0
        };

        Ok(Self {
            name,
            version_major,
            version_minor,
            version_patch,
            revision,
            timezone,
            display_name,
        })
    }
}

/// A single delta of query progress, as sent by the server on a `Progress`
/// packet. See [`crate::progress::AccumulatedProgress`] for the
/// session-wide running total this feeds into.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    /// Rows read since the last Progress packet.
    pub rows: u64,
    /// Bytes read since the last Progress packet.
    pub bytes: u64,
    /// Server's current estimate of total rows to read (may increase).
    pub total_rows: u64,
    /// Rows written since the last Progress packet (inserts).
    pub written_rows: u64,
    /// Bytes written since the last Progress packet (inserts).
    pub written_bytes: u64,
}

/// Profiling summary sent once per query on a `ProfileInfo` packet.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    /// Total rows produced by the query (before any `LIMIT`).
    pub rows: u64,
    /// Number of blocks produced.
    pub blocks: u64,
    /// Total bytes produced.
    pub bytes: u64,
    /// Row count before `LIMIT` was applied.
    pub rows_before_limit: u64,
    /// Whether a `LIMIT` clause was applied.
    pub applied_limit: bool,
    /// Whether `rows_before_limit` reflects an exact or approximate count.
    pub calculated_rows_before_limit: bool,
}

/// Callback types for query execution
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;
/// Callback invoked once with the final [`Profile`] summary.
pub type ProfileCallback = Arc<dyn Fn(&Profile) + Send + Sync>;
/// Callback invoked with each decoded ProfileEvents block; return `false`
/// to stop receiving further events for this query.
pub type ProfileEventsCallback = Arc<dyn Fn(&Block) -> bool + Send + Sync>;
/// Callback invoked with each decoded server Log block.
pub type ServerLogCallback = Arc<dyn Fn(&Block) -> bool + Send + Sync>;
/// Callback invoked when the server raises an exception.
pub type ExceptionCallback = Arc<dyn Fn(&ServerException) + Send + Sync>;
/// Callback invoked with each decoded Data block.
pub type DataCallback = Arc<dyn Fn(&Block) + Send + Sync>;
/// Callback invoked with each decoded Data block; return `false` to
/// request early abandonment of the query.
pub type DataCancelableCallback = Arc<dyn Fn(&Block) -> bool + Send + Sync>;

impl Progress {
    /// Serialize to buffer
    pub fn write_to(
        &self,
        buffer: &mut BytesMut,
        server_revision: u64,
    ) -> Result<()> {
        write_varint(buffer, self.rows);
        write_varint(buffer, self.bytes);
        write_varint(buffer, self.total_rows);

        if server_revision >= revision::WITH_PROGRESS_WRITTEN {
            write_varint(buffer, self.written_rows);
            write_varint(buffer, self.written_bytes);
        }

        Ok(())
    }

    /// Deserialize from buffer
    pub fn read_from(
        buffer: &mut &[u8],
        server_revision: u64,
    ) -> Result<Self> {
        let rows = read_varint(buffer)?;
        let bytes = read_varint(buffer)?;
        let total_rows = read_varint(buffer)?;

        let (written_rows, written_bytes) =
            if server_revision >= revision::WITH_PROGRESS_WRITTEN {
                (read_varint(buffer)?, read_varint(buffer)?)
            } else {
                (0, 0)
            };

        Ok(Self { rows, bytes, total_rows, written_rows, written_bytes })
    }
}

impl Profile {
    /// Deserialize from buffer (ProfileInfo packet)
    pub fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        let rows = read_varint(buffer)?;
        let blocks = read_varint(buffer)?;
        let bytes = read_varint(buffer)?;

        let applied_limit = if !buffer.is_empty() {
            let val = buffer[0];
            buffer.advance(1);
            val != 0
        } else {
            false
        };

        let rows_before_limit = read_varint(buffer)?;

        let calculated_rows_before_limit = if !buffer.is_empty() {
            let val = buffer[0];
            buffer.advance(1);
            val != 0
        } else {
            false
        };

        Ok(Self {
            rows,
            blocks,
            bytes,
            rows_before_limit,
            applied_limit,
            calculated_rows_before_limit,
        })
    }
}

/// A typed exception raised by the server, including its nested chain.
/// Constructed from the five-field exception record: `i32LE code, string
/// name, string message, string server_stack, u8 has_nested, [nested]`.
#[derive(Clone, Debug)]
pub struct ServerException {
    /// ClickHouse numeric error code (e.g. 60 = `UNKNOWN_TABLE`).
    pub code: i32,
    /// The exception type name, e.g. `"DB::Exception"`.
    pub name: String,
    /// Human-readable message text.
    pub message: String,
    /// Server-side stack trace, if the server was configured to send one.
    pub stack_trace: String,
    /// The exception this one was raised while handling, if any.
    pub nested: Option<Box<ServerException>>,
}

impl fmt::Display for ServerException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.code, self.message)?;
        let mut cause = self.nested.as_deref();
        while let Some(exc) = cause {
            write!(
                f,
                "\ncaused by: {} ({}): {}",
                exc.name, exc.code, exc.message
            )?;
            cause = exc.nested.as_deref();
        }
        Ok(())
    }
}

impl ServerException {
    /// Serialize to buffer
    pub fn write_to(&self, buffer: &mut BytesMut) -> Result<()> {
        buffer.put_i32_le(self.code);
        write_string(buffer, &self.name);
        write_string(buffer, &self.message);
        write_string(buffer, &self.stack_trace);

        let has_nested = self.nested.is_some();
        buffer.put_u8(if has_nested { 1 } else { 0 });

        if let Some(nested) = &self.nested {
            nested.write_to(buffer)?;
        }

        Ok(())
    }

    /// Deserialize from buffer
    pub fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        if buffer.len() < 4 {
            return Err(Error::Protocol(
                "not enough data to read ServerException".to_string(),
            ));
        }

        let code = {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&buffer[..4]);
            buffer.advance(4);
            i32::from_le_bytes(bytes)
        };

        let name = read_string(buffer)?;
        let message = read_string(buffer)?;
        let stack_trace = read_string(buffer)?;

        if buffer.is_empty() {
            return Err(Error::Protocol(
                "not enough data to read nested-exception flag".to_string(),
            ));
        }

        let has_nested = buffer[0] != 0;
        buffer.advance(1);

        let nested = if has_nested {
            Some(Box::new(ServerException::read_from(buffer)?))
        } else {
            None
        };

        Ok(Self { code, name, message, stack_trace, nested })
    }
}

// Helper functions for varint and string encoding. These mirror
// `io::buffer_utils` exactly; this module keeps its own copies because it
// operates on borrowed `&[u8]`/`BytesMut` slices built up ad hoc during
// handshake, before a `BufferReader`/`StreamingReader` exists.
fn read_varint(buffer: &mut &[u8]) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        if buffer.is_empty() {
            return Err(Error::Protocol(
                "unexpected end of buffer reading varint".to_string(),
            ));
        }

        let byte = buffer[0];
        buffer.advance(1);

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            break;
        }

        shift += 7;
        if shift >= 64 {
            return Err(Error::Protocol("varint overflow".to_string()));
        }
    }

    Ok(result)
}

fn write_varint(buffer: &mut BytesMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80;
        }

        buffer.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

fn read_string(buffer: &mut &[u8]) -> Result<String> {
    let len = read_varint(buffer)? as usize;

    if buffer.len() < len {
        return Err(Error::Protocol(format!(
            "not enough data for string: need {}, have {}",
            len,
            buffer.len()
        )));
    }

    let string_data = &buffer[..len];
    let s = String::from_utf8(string_data.to_vec()).map_err(|e| {
        Error::Protocol(format!("invalid UTF-8 in string: {}", e))
    })?;

    buffer.advance(len);
    Ok(s)
}

fn write_string(buffer: &mut BytesMut, s: &str) {
    write_varint(buffer, s.len() as u64);
    buffer.put_slice(s.as_bytes());
}
