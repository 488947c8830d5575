//! Packet ids, processing stages, and the central table of protocol
//! revision gates.
//!
//! Every revision-gated field anywhere in this crate reads its minimum
//! revision from [`revision`] — no inline literal revision numbers belong
//! anywhere else.

/// Types of packets received from server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ServerCode {
    /// Server handshake response containing name, version, and revision.
    Hello = 0,
    /// Block of data, may be compressed.
    Data = 1,
    /// Exception that occurred during query execution.
    Exception = 2,
    /// Query execution progress: rows and bytes read.
    Progress = 3,
    /// Response to a client Ping request.
    Pong = 4,
    /// Signals that all packets for the current operation have been sent.
    EndOfStream = 5,
    /// Profiling data for query execution.
    ProfileInfo = 6,
    /// Block of totals, may be compressed.
    Totals = 7,
    /// Block of extremes (mins and maxs), may be compressed.
    Extremes = 8,
    /// Response to a TableStatus request. Tolerated but not acted upon.
    TablesStatusResponse = 9,
    /// Query execution log (always uncompressed).
    Log = 10,
    /// Columns description for default values calculation.
    TableColumns = 11,
    /// List of unique part UUIDs. Tolerated but not acted upon.
    PartUUIDs = 12,
    /// Request for the next distributed read task. Tolerated but not acted
    /// upon.
    ReadTaskRequest = 13,
    /// Profile events from the server (always uncompressed).
    ProfileEvents = 14,
    /// Request for a parallel-replicas announcement. Tolerated but not
    /// acted upon.
    MergeTreeAllRangesAnnouncement = 15,
    /// Request for the next parallel-replicas read task. Tolerated but not
    /// acted upon.
    MergeTreeReadTaskRequest = 16,
    /// Server-side timezone changed mid-session; update session state and
    /// continue.
    TimezoneUpdate = 17,
}

impl ServerCode {
    /// True for packet ids that must be accepted for forward compatibility
    /// but whose payload this client does not interpret: the session reads
    /// and discards their framing (if understood) and continues, rather
    /// than treating the id as a protocol violation.
    pub fn is_tolerated_unknown(self) -> bool {
        matches!(
            self,
            ServerCode::TablesStatusResponse
                | ServerCode::PartUUIDs
                | ServerCode::ReadTaskRequest
                | ServerCode::MergeTreeAllRangesAnnouncement
                | ServerCode::MergeTreeReadTaskRequest
        )
    }
}

impl TryFrom<u64> for ServerCode {
    type Error = crate::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ServerCode::Hello),
            1 => Ok(ServerCode::Data),
            2 => Ok(ServerCode::Exception),
            3 => Ok(ServerCode::Progress),
            4 => Ok(ServerCode::Pong),
            5 => Ok(ServerCode::EndOfStream),
            6 => Ok(ServerCode::ProfileInfo),
            7 => Ok(ServerCode::Totals),
            8 => Ok(ServerCode::Extremes),
            9 => Ok(ServerCode::TablesStatusResponse),
            10 => Ok(ServerCode::Log),
            11 => Ok(ServerCode::TableColumns),
            12 => Ok(ServerCode::PartUUIDs),
            13 => Ok(ServerCode::ReadTaskRequest),
            14 => Ok(ServerCode::ProfileEvents),
            15 => Ok(ServerCode::MergeTreeAllRangesAnnouncement),
            16 => Ok(ServerCode::MergeTreeReadTaskRequest),
            17 => Ok(ServerCode::TimezoneUpdate),
            _ => Err(crate::Error::ProtocolViolation(format!(
                "unknown server packet id: {}",
                value
            ))),
        }
    }
}

/// Types of packets sent by client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ClientCode {
    /// Client handshake containing name, version, and default database.
    Hello = 0,
    /// Query packet with query id, settings, stage, compression, and query
    /// text.
    Query = 1,
    /// Data block (e.g. INSERT data), may be compressed.
    Data = 2,
    /// Cancel the currently running query.
    Cancel = 3,
    /// Ping the server to check the connection is alive.
    Ping = 4,
}

/// Should we compress Blocks of data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum CompressionState {
    /// Block compression is disabled.
    Disable = 0,
    /// Block compression is enabled.
    Enable = 1,
}

/// Query processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stage {
    /// Fully process the query and return the final result.
    Complete = 2,
}

/// Methods of block compression
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    /// No compression (default).
    #[default]
    None = -1,
    /// LZ4 compression -- fast with good compression ratio.
    LZ4 = 1,
    /// ZSTD compression -- better ratio but slower than LZ4.
    ZSTD = 2,
}

/// Central, named table of minimum protocol revisions gating optional wire
/// fields. Every revision comparison elsewhere in the crate names one of
/// these constants; no bare numeric literal should appear in a revision
/// check outside this module.
pub mod revision {
    /// Temporary tables are announced by name ahead of a Data block.
    pub const WITH_TEMPORARY_TABLES: u64 = 50264;
    /// Blocks carry a `BlockInfo` header (is_overflows/bucket_num).
    pub const WITH_BLOCK_INFO: u64 = 51903;
    /// `ServerInfo` carries a timezone string.
    pub const WITH_SERVER_TIMEZONE: u64 = 54058;
    /// `ServerInfo` carries a display name.
    pub const WITH_SERVER_DISPLAY_NAME: u64 = 54372;
    /// `ServerInfo`/`ClientInfo` carry a version patch component.
    pub const WITH_VERSION_PATCH: u64 = 54401;
    /// The `Query` packet carries a full `ClientInfo` block.
    pub const WITH_CLIENT_INFO: u64 = 54032;
    /// `ClientInfo` carries a quota key.
    pub const WITH_QUOTA_KEY_IN_CLIENT_INFO: u64 = 54060;
    /// `Progress` carries written_rows/written_bytes fields.
    pub const WITH_PROGRESS_WRITTEN: u64 = 54405;
    /// Query settings are sent as a sequence of (name, value, flags).
    pub const WITH_SETTINGS_SERIALIZED_AS_STRINGS: u64 = 54429;
    /// The interserver secret field is present (sent empty; no auth beyond
    /// cleartext user/password/quota key is implemented).
    pub const WITH_INTERSERVER_SECRET: u64 = 54441;
    /// OpenTelemetry tracing-context-absent marker byte is present.
    pub const WITH_OPENTELEMETRY: u64 = 54442;
    /// `ClientInfo` carries a distributed-depth counter.
    pub const WITH_DISTRIBUTED_DEPTH: u64 = 54448;
    /// `ClientInfo` carries an initial query start time (microseconds).
    pub const WITH_INITIAL_QUERY_START_TIME: u64 = 54449;
    /// `ClientInfo` carries parallel-replicas fields (sent as zeros; no
    /// cluster discovery is implemented).
    pub const WITH_PARALLEL_REPLICAS: u64 = 54453;
    /// Each serialized column carries a custom-serialization byte ahead of
    /// its prefix/body (kind-tree gate, see `column::kind`).
    pub const WITH_CUSTOM_SERIALIZATION: u64 = 54454;
    /// Handshake is followed by an Addendum packet (quota key et al.).
    pub const WITH_QUOTA_KEY: u64 = 54458;
    /// The `Query` packet carries query parameters with the CUSTOM flag.
    pub const WITH_PARAMETERS: u64 = 54459;
}
