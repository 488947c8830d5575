use crate::block::{Block, BlockInfo};
use crate::column::ColumnRef;
use crate::compression::{compress, decompress};
use crate::connection::Connection;
use crate::protocol::CompressionMethod;
use crate::types::Type;
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::sync::Arc;

/// Minimum revision constants
const DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES: u64 = 50264;
const DBMS_MIN_REVISION_WITH_BLOCK_INFO: u64 = 51903;
const DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION: u64 = 54454;

/// True for errors raised by running a synchronous buffer parser off the
/// end of a not-yet-fully-buffered block: these are retried after pulling
/// more bytes rather than treated as a hard failure. Column codecs and the
/// block-framing helpers in this crate signal "ran out of buffer" as
/// [`Error::Underflow`] or, in a few older buffer-utility call sites, as an
/// [`Error::Protocol`] whose message says as much; both are recognized here
/// so the retry loop works uniformly across all column types.
fn looks_like_underflow(err: &Error) -> bool {
    if err.is_underflow() {
        return true;
    }
    match err {
        Error::Protocol(msg) => {
            let m = msg.to_ascii_lowercase();
            m.contains("not enough")
                || m.contains("unexpected end")
                || m.contains("underflow")
        }
        _ => false,
    }
}

/// Create a column instance for the given type
/// This is used internally by column types like Array and Nullable
pub fn create_column(type_: &Type) -> Result<ColumnRef> {
    use crate::column::array::ColumnArray;
    use crate::column::date::{ColumnDate, ColumnDate32, ColumnDateTime, ColumnDateTime64};
    use crate::column::decimal::ColumnDecimal;
    use crate::column::enum_column::{ColumnEnum8, ColumnEnum16};
    use crate::column::ipv4::ColumnIpv4;
    use crate::column::ipv6::ColumnIpv6;
    use crate::column::lowcardinality::ColumnLowCardinality;
    use crate::column::map::ColumnMap;
    use crate::column::nothing::ColumnNothing;
    use crate::column::nullable::ColumnNullable;
    use crate::column::numeric::*;
    use crate::column::string::{ColumnFixedString, ColumnString};
    use crate::column::uuid::ColumnUuid;

    match type_ {
        Type::Simple(code) => {
            use crate::types::TypeCode;
            match code {
                TypeCode::UInt8 => Ok(Arc::new(ColumnUInt8::with_type(type_.clone()))),
                TypeCode::UInt16 => Ok(Arc::new(ColumnUInt16::with_type(type_.clone()))),
                TypeCode::UInt32 => Ok(Arc::new(ColumnUInt32::with_type(type_.clone()))),
                TypeCode::UInt64 => Ok(Arc::new(ColumnUInt64::with_type(type_.clone()))),
                TypeCode::Int8 => Ok(Arc::new(ColumnInt8::with_type(type_.clone()))),
                TypeCode::Int16 => Ok(Arc::new(ColumnInt16::with_type(type_.clone()))),
                TypeCode::Int32 => Ok(Arc::new(ColumnInt32::with_type(type_.clone()))),
                TypeCode::Int64 => Ok(Arc::new(ColumnInt64::with_type(type_.clone()))),
                TypeCode::Float32 => Ok(Arc::new(ColumnFloat32::with_type(type_.clone()))),
                TypeCode::Float64 => Ok(Arc::new(ColumnFloat64::with_type(type_.clone()))),
                TypeCode::String => Ok(Arc::new(ColumnString::new(type_.clone()))),
                TypeCode::Date => Ok(Arc::new(ColumnDate::new(type_.clone()))),
                TypeCode::Date32 => Ok(Arc::new(ColumnDate32::new(type_.clone()))),
                TypeCode::UUID => Ok(Arc::new(ColumnUuid::new(type_.clone()))),
                TypeCode::IPv4 => Ok(Arc::new(ColumnIpv4::new(type_.clone()))),
                TypeCode::IPv6 => Ok(Arc::new(ColumnIpv6::new(type_.clone()))),
                TypeCode::Void => Ok(Arc::new(ColumnNothing::new(type_.clone()))),
                _ => Err(Error::Protocol(format!("Unsupported type: {}", type_.name()))),
            }
        }
        Type::FixedString { .. } => Ok(Arc::new(ColumnFixedString::new(type_.clone()))),
        Type::DateTime { .. } => {
            // Use specialized ColumnDateTime with timezone support
            Ok(Arc::new(ColumnDateTime::new(type_.clone())))
        }
        Type::DateTime64 { .. } => {
            // Use specialized ColumnDateTime64 with precision and timezone
            Ok(Arc::new(ColumnDateTime64::new(type_.clone())))
        }
        Type::Enum8 { .. } => {
            // Use specialized ColumnEnum8 with name-value mapping
            Ok(Arc::new(ColumnEnum8::new(type_.clone())))
        }
        Type::Enum16 { .. } => {
            // Use specialized ColumnEnum16 with name-value mapping
            Ok(Arc::new(ColumnEnum16::new(type_.clone())))
        }
        Type::Decimal { .. } => {
            // Use specialized ColumnDecimal with precision and scale
            Ok(Arc::new(ColumnDecimal::new(type_.clone())))
        }
        Type::Nullable { .. } => {
            Ok(Arc::new(ColumnNullable::new(type_.clone())))
        }
        Type::Array { .. } => {
            Ok(Arc::new(ColumnArray::new(type_.clone())))
        }
        Type::Map { .. } => {
            Ok(Arc::new(ColumnMap::new(type_.clone())))
        }
        Type::LowCardinality { .. } => {
            Ok(Arc::new(ColumnLowCardinality::new(type_.clone())))
        }
        Type::Json { .. } => {
            Ok(Arc::new(crate::column::json::ColumnJson::new(type_.clone())))
        }
        Type::Tuple { item_types } => {
            // Create empty columns for each tuple element
            let mut columns = Vec::new();
            for item_type in item_types {
                columns.push(create_column(item_type)?);
            }
            Ok(Arc::new(crate::column::ColumnTuple::new(
                type_.clone(),
                columns,
            )))
        }
    }
}

/// Reader for blocks from network
pub struct BlockReader {
    server_revision: u64,
    compression: Option<CompressionMethod>,
}

impl BlockReader {
    /// Create a new block reader
    pub fn new(server_revision: u64) -> Self {
        Self {
            server_revision,
            compression: None,
        }
    }

    /// Enable compression
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = Some(method);
        self
    }

    /// Read a block from the connection.
    /// Caller is responsible for skipping the temp table name first, if any.
    pub async fn read_block(&self, conn: &mut Connection) -> Result<Block> {
        if self.compression.is_some() {
            // Read compressed data: checksum (16) + header (9) + compressed data (N)
            let checksum = conn.read_bytes(16).await?;

            let method = conn.read_u8().await?;
            let compressed_size = conn.read_u32().await? as usize;
            let uncompressed_size = conn.read_u32().await?;

            let compressed_data_len = compressed_size.saturating_sub(9);
            let compressed_data = conn.read_bytes(compressed_data_len).await?;

            let mut full_block = BytesMut::with_capacity(16 + 9 + compressed_data_len);
            full_block.extend_from_slice(&checksum);
            full_block.put_u8(method);
            full_block.put_u32_le(compressed_size as u32);
            full_block.put_u32_le(uncompressed_size);
            full_block.extend_from_slice(&compressed_data);

            let block_data = decompress(&full_block)?;
            self.parse_block_from_buffer(&mut &block_data[..])
        } else {
            self.read_block_direct(conn).await
        }
    }

    /// Read block directly from connection (uncompressed).
    ///
    /// There is no frame-level length prefix for uncompressed blocks, so we
    /// cannot know ahead of time how many bytes to read. Instead this
    /// accumulates bytes from the connection and retries the same
    /// synchronous buffer parser used for the compressed path each time the
    /// buffer grows, mirroring the retry-on-underflow approach used for
    /// reading block bodies from a sequence of decompressed frames: a
    /// partial buffer fails the same way a too-short frame would, and the
    /// caller tops it up and tries again.
    async fn read_block_direct(&self, conn: &mut Connection) -> Result<Block> {
        let mut buf = BytesMut::new();
        loop {
            let mut cursor = &buf[..];
            match self.parse_block_from_buffer(&mut cursor) {
                Ok(block) => return Ok(block),
                Err(e) if looks_like_underflow(&e) => {
                    let chunk = conn.read_some().await?;
                    buf.extend_from_slice(&chunk);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Parse block from buffer (compressed data)
    fn parse_block_from_buffer(&self, buffer: &mut &[u8]) -> Result<Block> {
        let mut block = Block::new();

        // Read block info if supported
        if self.server_revision >= DBMS_MIN_REVISION_WITH_BLOCK_INFO {
            let info = self.read_block_info_from_buffer(buffer)?;
            block.set_info(info);
        }

        // Read column count and row count
        let num_columns = read_varint(buffer)? as usize;
        let num_rows = read_varint(buffer)? as usize;

        // Read each column
        for _ in 0..num_columns {
            let name = read_string(buffer)?;
            let type_name = read_string(buffer)?;

            // Check for custom serialization. Reuses the kind-tree reader
            // so Dense columns (the common case once a server negotiates
            // this revision) decode normally; only Sparse is refused.
            if self.server_revision >= DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION {
                crate::column::KindTree::read_from(buffer, self.server_revision, 0)?;
            }

            // Parse the type
            let column_type = Type::parse(&type_name)?;

            // Create column and load its prefix (LowCardinality's key
            // version, JSON's typed-path declarations, ...) before the
            // row payload, per the column's serialization contract.
            let mut column = self.create_column_by_type(&column_type)?;
            let column_mut = Arc::get_mut(&mut column)
                .ok_or_else(|| Error::Protocol("Column not mutable".to_string()))?;
            column_mut.load_prefix(buffer, num_rows)?;

            if num_rows > 0 {
                // Load column data from buffer
                column_mut.load_from_buffer(buffer, num_rows)?;
            }

            block.append_column(name, column)?;
        }

        Ok(block)
    }

    /// Read block info from buffer
    fn read_block_info_from_buffer(&self, buffer: &mut &[u8]) -> Result<BlockInfo> {
        let _num1 = read_varint(buffer)?;

        if buffer.is_empty() {
            return Err(Error::Protocol("Unexpected end reading block info".to_string()));
        }
        let is_overflows = buffer[0];
        buffer.advance(1);

        let _num2 = read_varint(buffer)?;

        if buffer.len() < 4 {
            return Err(Error::Protocol("Unexpected end reading bucket_num".to_string()));
        }
        let bucket_num = i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        buffer.advance(4);

        let _num3 = read_varint(buffer)?;

        Ok(BlockInfo {
            is_overflows,
            bucket_num,
        })
    }

    /// Create a column by type. Delegates to the crate-wide factory so this
    /// reader supports every codec it implements (UUID, IPv4/6, Decimal,
    /// Map, LowCardinality, Tuple, JSON, ...) rather than a hand-picked
    /// subset.
    fn create_column_by_type(&self, type_: &Type) -> Result<ColumnRef> {
        create_column(type_)
    }
}

/// Writer for blocks to network
pub struct BlockWriter {
    server_revision: u64,
    compression: Option<CompressionMethod>,
}

impl BlockWriter {
    /// Create a new block writer
    pub fn new(server_revision: u64) -> Self {
        Self {
            server_revision,
            compression: None,
        }
    }

    /// Enable compression
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = Some(method);
        self
    }

    /// Write a block to the connection
    pub async fn write_block(&self, conn: &mut Connection, block: &Block) -> Result<()> {
        tracing::debug!(
            columns = block.column_count(),
            rows = block.row_count(),
            "writing block"
        );

        // Skip temporary table name if protocol supports it
        if self.server_revision >= DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES {
            conn.write_string("").await?;
        }

        // Serialize block to buffer
        let mut buffer = BytesMut::new();
        self.write_block_to_buffer(&mut buffer, block)?;

        // Compress if needed
        if let Some(compression_method) = self.compression {
            let compressed = compress(compression_method, &buffer)?;
            // Compressed data already includes checksum + header, write it directly
            conn.write_bytes(&compressed).await?;
        } else {
            conn.write_bytes(&buffer).await?;
        }

        conn.flush().await?;
        Ok(())
    }

    /// Write block to buffer
    fn write_block_to_buffer(&self, buffer: &mut BytesMut, block: &Block) -> Result<()> {
        // Write block info if supported
        if self.server_revision >= DBMS_MIN_REVISION_WITH_BLOCK_INFO {
            write_varint(buffer, 1);
            buffer.put_u8(block.info().is_overflows);
            write_varint(buffer, 2);
            buffer.put_i32_le(block.info().bucket_num);
            write_varint(buffer, 0);
        }

        // Write column count and row count
        write_varint(buffer, block.column_count() as u64);
        write_varint(buffer, block.row_count() as u64);

        // Write each column
        for (name, type_, column) in block.iter() {
            write_string(buffer, name);
            write_string(buffer, &type_.name());

            // Custom serialization flag
            if self.server_revision >= DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION {
                buffer.put_u8(0); // No custom serialization
            }

            // Prefix (LowCardinality's key version, JSON's typed-path
            // declarations, ...) always precedes the row payload.
            column.save_prefix(buffer)?;

            // Write column data (only if rows > 0)
            if block.row_count() > 0 {
                column.save_to_buffer(buffer)?;
            }
        }

        Ok(())
    }
}

// Helper functions
fn read_varint(buffer: &mut &[u8]) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        if buffer.is_empty() {
            return Err(Error::Protocol(
                "Unexpected end of buffer reading varint".to_string(),
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
            return Err(Error::Protocol("Varint overflow".to_string()));
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
            "Not enough data for string: need {}, have {}",
            len,
            buffer.len()
        )));
    }

    let string_data = &buffer[..len];
    let s = String::from_utf8(string_data.to_vec())
        .map_err(|e| Error::Protocol(format!("Invalid UTF-8 in string: {}", e)))?;

    buffer.advance(len);
    Ok(s)
}

fn write_string(buffer: &mut BytesMut, s: &str) {
    write_varint(buffer, s.len() as u64);
    buffer.put_slice(s.as_bytes());
}
