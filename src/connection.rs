use crate::wire_format::WireFormat;
use crate::{Error, Result};
use bytes::Bytes;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;

/// Default buffer sizes for reading and writing
const DEFAULT_READ_BUFFER_SIZE: usize = 8192;
const DEFAULT_WRITE_BUFFER_SIZE: usize = 8192;

/// Default time allotted to the TCP connect + (optional) TLS handshake
/// before giving up.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type DynAsyncRead = Pin<Box<dyn AsyncRead + Send>>;
type DynAsyncWrite = Pin<Box<dyn AsyncWrite + Send>>;

/// Options controlling how the TCP (and optional TLS) transport is
/// established. Kept separate from [`crate::client::ClientOptions`] so the
/// transport-level knobs (timeouts) can be reused independently of
/// credentials/database selection.
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
    /// Maximum time to wait for the TCP connect (and TLS handshake, when
    /// used) to complete. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

impl ConnectionOptions {
    /// Create connection options with the default connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout. Pass a very large duration to effectively
    /// disable it.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Async connection wrapper for TCP (optionally TLS-wrapped) socket.
/// This is the async I/O boundary - all socket operations are async.
pub struct Connection {
    reader: BufReader<DynAsyncRead>,
    writer: BufWriter<DynAsyncWrite>,
}

impl Connection {
    /// Build a connection from a pair of already-split async read/write
    /// halves, regardless of whether they came from a plain `TcpStream` or
    /// a TLS-wrapped one.
    fn from_halves(
        read_half: impl AsyncRead + Send + 'static,
        write_half: impl AsyncWrite + Send + 'static,
    ) -> Self {
        Self {
            reader: BufReader::with_capacity(
                DEFAULT_READ_BUFFER_SIZE,
                Box::pin(read_half) as DynAsyncRead,
            ),
            writer: BufWriter::with_capacity(
                DEFAULT_WRITE_BUFFER_SIZE,
                Box::pin(write_half) as DynAsyncWrite,
            ),
        }
    }

    /// Create a new connection from a plain TCP stream.
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::from_halves(read_half, write_half)
    }

    /// Connect to a ClickHouse server over plain TCP.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_options(host, port, &ConnectionOptions::default()).await
    }

    /// Connect to a ClickHouse server over plain TCP, racing the attempt
    /// against `options.connect_timeout`.
    pub async fn connect_with_options(
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> Result<Self> {
        let stream = Self::connect_tcp(host, port, options).await?;
        Ok(Self::new(stream))
    }

    async fn connect_tcp(
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> Result<TcpStream> {
        let addr = format!("{}:{}", host, port);
        let connect_fut = TcpStream::connect(&addr);

        let stream = match options.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect_fut)
                .await
                .map_err(|_| Error::Timeout { operation: "connect" })?
                .map_err(|e| {
                    Error::Transport(format!("Failed to connect to {}: {}", addr, e))
                })?,
            None => connect_fut.await.map_err(|e| {
                Error::Transport(format!("Failed to connect to {}: {}", addr, e))
            })?,
        };

        stream
            .set_nodelay(true)
            .map_err(|e| Error::Transport(format!("Failed to set TCP_NODELAY: {}", e)))?;

        Ok(stream)
    }

    /// Connect to a ClickHouse server over TLS, racing the full
    /// connect+handshake against `options.connect_timeout`.
    #[cfg(feature = "tls")]
    pub async fn connect_tls(
        host: &str,
        port: u16,
        options: &ConnectionOptions,
        ssl_options: &crate::ssl::SSLOptions,
    ) -> Result<Self> {
        use tokio_rustls::rustls::ServerName;
        use tokio_rustls::TlsConnector;

        let handshake = async {
            let stream = Self::connect_tcp(host, port, options).await?;

            let config = ssl_options.build_client_config()?;
            let connector = TlsConnector::from(config);

            let sni_name = ssl_options
                .server_name
                .as_deref()
                .unwrap_or(host)
                .to_string();
            let server_name = ServerName::try_from(sni_name.as_str())
                .map_err(|e| Error::Tls(format!("Invalid server name {}: {}", sni_name, e)))?;

            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| Error::Tls(format!("TLS handshake failed: {}", e)))?;

            let (read_half, write_half) = tokio::io::split(tls_stream);
            Ok(Self::from_halves(read_half, write_half))
        };

        match options.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| Error::Timeout { operation: "connect" })?,
            None => handshake.await,
        }
    }

    /// Read a varint-encoded u64
    pub async fn read_varint(&mut self) -> Result<u64> {
        WireFormat::read_varint64(&mut self.reader).await
    }

    /// Write a varint-encoded u64
    pub async fn write_varint(&mut self, value: u64) -> Result<()> {
        WireFormat::write_varint64(&mut self.writer, value).await
    }

    /// Read a fixed-size value
    pub async fn read_u8(&mut self) -> Result<u8> {
        Ok(self.reader.read_u8().await?)
    }

    pub async fn read_u16(&mut self) -> Result<u16> {
        Ok(self.reader.read_u16_le().await?)
    }

    pub async fn read_u32(&mut self) -> Result<u32> {
        Ok(self.reader.read_u32_le().await?)
    }

    pub async fn read_u64(&mut self) -> Result<u64> {
        Ok(self.reader.read_u64_le().await?)
    }

    pub async fn read_i8(&mut self) -> Result<i8> {
        Ok(self.reader.read_i8().await?)
    }

    pub async fn read_i16(&mut self) -> Result<i16> {
        Ok(self.reader.read_i16_le().await?)
    }

    pub async fn read_i32(&mut self) -> Result<i32> {
        Ok(self.reader.read_i32_le().await?)
    }

    pub async fn read_i64(&mut self) -> Result<i64> {
        Ok(self.reader.read_i64_le().await?)
    }

    /// Write fixed-size values
    pub async fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.writer.write_u8(value).await?)
    }

    pub async fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.writer.write_u16_le(value).await?)
    }

    pub async fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.writer.write_u32_le(value).await?)
    }

    pub async fn write_u64(&mut self, value: u64) -> Result<()> {
        Ok(self.writer.write_u64_le(value).await?)
    }

    pub async fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.writer.write_i8(value).await?)
    }

    pub async fn write_i16(&mut self, value: i16) -> Result<()> {
        Ok(self.writer.write_i16_le(value).await?)
    }

    pub async fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.writer.write_i32_le(value).await?)
    }

    pub async fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.writer.write_i64_le(value).await?)
    }

    /// Read a length-prefixed string
    pub async fn read_string(&mut self) -> Result<String> {
        WireFormat::read_string(&mut self.reader).await
    }

    /// Write a length-prefixed string
    pub async fn write_string(&mut self, s: &str) -> Result<()> {
        WireFormat::write_string(&mut self.writer, s).await
    }

    /// Read exact number of bytes into a buffer
    pub async fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Read bytes into an existing buffer
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).await?;
        Ok(())
    }

    /// Write bytes
    pub async fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.writer.write_all(data).await?)
    }

    /// Flush the write buffer
    pub async fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush().await?)
    }

    /// Pull whatever bytes are currently available from the socket (at
    /// least one byte), without knowing how many are needed ahead of time.
    /// Used by the uncompressed block-decode retry-on-underflow loop: the
    /// caller attempts a synchronous parse against its accumulated buffer
    /// and, on underflow, tops it up with one more call to this method.
    /// Fails with [`Error::Transport`] if the peer closed the connection.
    pub async fn read_some(&mut self) -> Result<Bytes> {
        let chunk = self.reader.fill_buf().await?;
        if chunk.is_empty() {
            return Err(Error::Transport(
                "connection closed before expected data arrived".to_string(),
            ));
        }
        let bytes = Bytes::copy_from_slice(chunk);
        let len = bytes.len();
        self.reader.consume(len);
        Ok(bytes)
    }

    /// Read a complete packet (length-prefixed data)
    /// Returns the packet data without the length prefix
    pub async fn read_packet(&mut self) -> Result<Bytes> {
        let len = self.read_varint().await? as usize;

        if len == 0 {
            return Ok(Bytes::new());
        }

        if len > 0x40000000 {
            // 1GB limit
            return Err(Error::Protocol(format!("Packet too large: {}", len)));
        }

        self.read_bytes(len).await
    }

    /// Write a packet with length prefix
    pub async fn write_packet(&mut self, data: &[u8]) -> Result<()> {
        self.write_varint(data.len() as u64).await?;
        self.write_bytes(data).await?;
        Ok(())
    }
}
