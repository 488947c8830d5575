use crate::connection::ConnectionOptions;
use crate::progress::AccumulatedProgress;
use crate::protocol::CompressionMethod;
use crate::query::{ClientInfo, Progress, Query, ServerInfo};
use crate::session::Session;
use crate::Result;
use std::time::Duration;

#[cfg(feature = "tls")]
use crate::ssl::SSLOptions;

/// Default number of full passes over the configured endpoint list before
/// giving up on connect.
const DEFAULT_SEND_RETRIES: u32 = 1;
/// Default pause between endpoint-list passes.
const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(1);
/// Default grace period given to a best-effort drain after a cancelled or
/// timed-out query, before the connection is considered unusable.
const DEFAULT_CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Connection and session configuration for [`Client::connect`].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Primary server host.
    pub host: String,
    /// Primary server port.
    pub port: u16,
    /// Additional host/port pairs to fail over to, in order, if the
    /// primary is unreachable. See [`Self::add_endpoint`].
    pub extra_endpoints: Vec<(String, u16)>,
    /// Database name.
    pub database: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
    /// Compression method negotiated for this session's blocks.
    pub compression: Option<CompressionMethod>,
    /// Client identification sent during the handshake and with every
    /// query.
    pub client_info: ClientInfo,
    /// Transport-level options (currently: connect timeout).
    pub connection_options: ConnectionOptions,
    /// TLS configuration. Only meaningful when connecting with the `tls`
    /// feature enabled; `Client::connect` uses TLS iff this is `Some`.
    #[cfg(feature = "tls")]
    pub ssl_options: Option<SSLOptions>,
    /// Maximum time a single query/insert may run before being cancelled.
    /// `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    /// How long to wait for a clean drain (Cancel -> EndOfStream) after a
    /// timeout or mid-query cancellation before giving up on the
    /// connection.
    pub cancel_grace_period: Duration,
    /// Number of full passes to make over the endpoint list when
    /// connecting before giving up.
    pub send_retries: u32,
    /// Delay between endpoint-list passes.
    pub retry_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            extra_endpoints: Vec::new(),
            database: "default".to_string(),
            user: "default".to_string(),
            password: String::new(),
            compression: Some(CompressionMethod::LZ4),
            client_info: ClientInfo::default(),
            connection_options: ConnectionOptions::default(),
            #[cfg(feature = "tls")]
            ssl_options: None,
            query_timeout: None,
            cancel_grace_period: DEFAULT_CANCEL_GRACE_PERIOD,
            send_retries: DEFAULT_SEND_RETRIES,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Create new client options with host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Default::default() }
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set compression method.
    pub fn compression(mut self, method: Option<CompressionMethod>) -> Self {
        self.compression = method;
        self
    }

    /// Add a fallback host/port to try, in order, if earlier endpoints in
    /// the list (the primary first, then each added endpoint) fail to
    /// connect. Useful for failover across a cluster's replicas.
    pub fn add_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.extra_endpoints.push((host.into(), port));
        self
    }

    /// Set transport-level connection options (connect timeout).
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Set TLS configuration. Connecting with `Some` uses
    /// [`crate::connection::Connection::connect_tls`] for every endpoint.
    #[cfg(feature = "tls")]
    pub fn ssl_options(mut self, options: SSLOptions) -> Self {
        self.ssl_options = Some(options);
        self
    }

    /// Set the maximum time a query/insert may run before being cancelled.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set how long to wait for a clean drain after a cancelled/timed-out
    /// query before giving up on the connection.
    pub fn cancel_grace_period(mut self, period: Duration) -> Self {
        self.cancel_grace_period = period;
        self
    }

    /// Set how many full passes to make over the endpoint list when
    /// connecting.
    pub fn send_retries(mut self, retries: u32) -> Self {
        self.send_retries = retries;
        self
    }

    /// Set the delay between endpoint-list passes.
    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }
}

/// Async ClickHouse client speaking the native TCP protocol.
///
/// A thin, ergonomic wrapper over [`Session`]: `Client` owns the
/// connection options and the underlying session state machine, and
/// translates its calls into this crate's public surface.
pub struct Client {
    session: Session,
    options: ClientOptions,
}

impl Client {
    /// Connect to a ClickHouse server, trying each configured endpoint in
    /// turn, and perform the handshake.
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        let session = Session::connect(&options).await?;
        Ok(Self { session, options })
    }

    /// Execute a query and collect all result blocks.
    pub async fn query(&mut self, query: impl Into<Query>) -> Result<QueryResult> {
        let query = query.into();
        let outcome = self.session.execute_query(&query, &self.options).await?;
        Ok(QueryResult {
            blocks: outcome.blocks,
            progress: outcome.progress,
            accumulated_progress: outcome.accumulated_progress,
        })
    }

    /// Execute a query with an explicit query id and collect all result
    /// blocks.
    pub async fn query_with_id(
        &mut self,
        query_text: impl Into<String>,
        query_id: impl Into<String>,
    ) -> Result<QueryResult> {
        let query = Query::new(query_text).with_query_id(query_id);
        self.query(query).await
    }

    /// Execute a query, discarding any result rows. Intended for DDL/DML
    /// statements (`CREATE`, `ALTER`, `DROP`, ...) that don't return data.
    pub async fn execute(&mut self, query: impl Into<Query>) -> Result<()> {
        self.query(query).await?;
        Ok(())
    }

    /// Execute a query with an explicit query id, discarding any result
    /// rows.
    pub async fn execute_with_id(
        &mut self,
        query_text: impl Into<String>,
        query_id: impl Into<String>,
    ) -> Result<()> {
        self.query_with_id(query_text, query_id).await?;
        Ok(())
    }

    /// Insert a block into `table_name`. Builds an `INSERT INTO ... VALUES`
    /// query from the block's column names, matching the server's
    /// acknowledged header against it, then streams the data.
    pub async fn insert(&mut self, table_name: &str, block: crate::block::Block) -> Result<()> {
        self.session.execute_insert(table_name, "", block, &self.options).await
    }

    /// Insert a block into `table_name` with an explicit query id.
    pub async fn insert_with_id(
        &mut self,
        table_name: &str,
        query_id: &str,
        block: crate::block::Block,
    ) -> Result<()> {
        self.session.execute_insert(table_name, query_id, block, &self.options).await
    }

    /// Ping the server to verify the connection is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.session.ping().await
    }

    /// Get the server information received during the handshake.
    pub fn server_info(&self) -> &ServerInfo {
        self.session.server_info()
    }
}

/// The outcome of [`Client::query`]: all decoded result blocks plus
/// progress information.
pub struct QueryResult {
    /// Result blocks.
    pub blocks: Vec<crate::block::Block>,
    /// Progress delta from the last `Progress` packet received.
    pub progress: Progress,
    /// Progress totals accumulated across the whole query.
    pub accumulated_progress: AccumulatedProgress,
}

impl QueryResult {
    /// Get all blocks.
    pub fn blocks(&self) -> &[crate::block::Block] {
        &self.blocks
    }

    /// Get the most recent progress delta.
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Get the progress accumulated over the whole query.
    pub fn accumulated_progress(&self) -> &AccumulatedProgress {
        &self.accumulated_progress
    }

    /// Get total number of rows across all blocks.
    pub fn total_rows(&self) -> usize {
        self.blocks.iter().map(|b| b.row_count()).sum()
    }
}
