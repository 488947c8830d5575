use crate::{
    protocol::CompressionMethod,
    Error,
    Result,
};
use bytes::{
    Buf,
    BufMut,
    Bytes,
    BytesMut,
};
use cityhash_rs::cityhash_102_128;

/// Compression header size (9 bytes: 1 byte method + 4 bytes compressed + 4
/// bytes uncompressed)
const HEADER_SIZE: usize = 9;

/// Checksum size (16 bytes for CityHash128)
const CHECKSUM_SIZE: usize = 16;

/// Compression method byte values (from ClickHouse CompressionMethodByte)
#[repr(u8)]
enum CompressionMethodByte {
    None = 0x02,
    LZ4 = 0x82,
    ZSTD = 0x90,
}

/// Maximum compressed block size (1GB)
const MAX_COMPRESSED_SIZE: usize = 0x40000000;

/// Compress data using the specified method
pub fn compress(method: CompressionMethod, data: &[u8]) -> Result<Bytes> {
    match method {
        CompressionMethod::None => {
            // No compression, but still add header
            compress_none(data)
        }
        CompressionMethod::LZ4 => compress_lz4(data),
        CompressionMethod::ZSTD => compress_zstd(data),
    }
}

/// Compute the embedded checksum (high 64 bits, then low 64 bits, each
/// little-endian) against a fresh CityHash128 of `header || payload`
/// (everything in `frame` after the 16-byte checksum).
pub fn verify_checksum(frame: &[u8]) -> Result<bool> {
    if frame.len() < CHECKSUM_SIZE {
        return Err(Error::Compression(
            "frame too small to contain a checksum".to_string(),
        ));
    }
    let stored_hi = u64::from_le_bytes(frame[0..8].try_into().unwrap());
    let stored_lo = u64::from_le_bytes(frame[8..16].try_into().unwrap());
    let stored = ((stored_hi as u128) << 64) | (stored_lo as u128);
    let computed = cityhash_102_128(&frame[CHECKSUM_SIZE..]);
    Ok(stored == computed)
}

/// Decompress data (auto-detects compression method from header), verifying
/// the embedded 128-bit CityHash checksum first.
pub fn decompress(data: &[u8]) -> Result<Bytes> {
    if data.len() < CHECKSUM_SIZE + HEADER_SIZE {
        return Err(Error::Compression(
            "Data too small for checksum and compression header".to_string(),
        ));
    }

    if !verify_checksum(data)? {
        return Err(Error::ChecksumMismatch);
    }

    let data_without_checksum = &data[CHECKSUM_SIZE..];

    let method = data_without_checksum[0];
    let mut reader = &data_without_checksum[1..];

    // Read compressed size (4 bytes) and uncompressed size (4 bytes)
    let compressed_size = reader.get_u32_le() as usize;
    let uncompressed_size = reader.get_u32_le() as usize;

    // Validate sizes
    if compressed_size > MAX_COMPRESSED_SIZE {
        return Err(Error::Compression(format!(
            "Compressed size too large: {}",
            compressed_size
        )));
    }

    if uncompressed_size > MAX_COMPRESSED_SIZE {
        return Err(Error::Compression(format!(
            "Uncompressed size too large: {}",
            uncompressed_size
        )));
    }

    // The remaining data after header
    let compressed_data = &data_without_checksum[HEADER_SIZE..];

    match method {
        0x02 => {
            // No compression
            if compressed_data.len() != uncompressed_size {
                return Err(Error::Compression(format!(
                    "Uncompressed data size mismatch: expected {}, got {}",
                    uncompressed_size,
                    compressed_data.len()
                )));
            }
            Ok(Bytes::copy_from_slice(compressed_data))
        }
        0x82 => {
            // LZ4
            decompress_lz4(compressed_data, uncompressed_size)
        }
        0x90 => {
            // ZSTD
            decompress_zstd(compressed_data, uncompressed_size)
        }
        _ => Err(Error::Compression(format!(
            "Unknown compression method: 0x{:02x}",
            method
        ))),
    }
}

/// The on-wire size of one frame (checksum + header + compressed payload),
/// read from its own header without decompressing. Returns `None` if
/// `data` doesn't even contain a full header yet.
fn frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < CHECKSUM_SIZE + HEADER_SIZE {
        return None;
    }
    let compressed_size = u32::from_le_bytes(
        data[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5].try_into().unwrap(),
    ) as usize;
    Some(CHECKSUM_SIZE + compressed_size)
}

/// Walk consecutive compressed frames in `data`, decompressing each and
/// concatenating the plaintext. Stops at the first truncated/incomplete
/// frame and returns whatever was successfully decoded up to that point,
/// along with the number of input bytes consumed.
pub fn decompress_multi(data: &[u8]) -> Result<(Bytes, usize)> {
    let mut out = BytesMut::new();
    let mut offset = 0;

    loop {
        let Some(len) = frame_len(&data[offset..]) else {
            break;
        };
        if offset + len > data.len() {
            break;
        }
        let frame = &data[offset..offset + len];
        out.put_slice(&decompress(frame)?);
        offset += len;
    }

    Ok((out.freeze(), offset))
}

/// Compress using LZ4
fn compress_lz4(data: &[u8]) -> Result<Bytes> {
    let max_compressed_size = lz4::block::compress_bound(data.len())?;
    let mut compressed = vec![0u8; max_compressed_size];

    let compressed_size =
        lz4::block::compress_to_buffer(data, None, false, &mut compressed)?;

    compressed.truncate(compressed_size);

    // Build header + compressed data
    let mut header_and_data =
        BytesMut::with_capacity(HEADER_SIZE + compressed_size);

    // Write header
    header_and_data.put_u8(CompressionMethodByte::LZ4 as u8);
    header_and_data.put_u32_le((HEADER_SIZE + compressed_size) as u32); // Total size including header
    header_and_data.put_u32_le(data.len() as u32); // Uncompressed size

    // Write compressed data
    header_and_data.put_slice(&compressed);

    // Compute CityHash128 checksum of header + compressed data
    let checksum = cityhash_102_128(&header_and_data);

    // Build final output with checksum
    // CityHash128 returns u128, write as (high64, low64) - reverse of typical
    // order
    let mut output =
        BytesMut::with_capacity(CHECKSUM_SIZE + header_and_data.len());
    output.put_u64_le((checksum >> 64) as u64); // High 64 bits first
    output.put_u64_le(checksum as u64); // Low 64 bits second
    output.put_slice(&header_and_data);

    Ok(output.freeze())
}

/// Decompress LZ4 data
fn decompress_lz4(data: &[u8], uncompressed_size: usize) -> Result<Bytes> {
    let decompressed =
        lz4::block::decompress(data, Some(uncompressed_size as i32))?;

    if decompressed.len() != uncompressed_size {
        return Err(Error::Compression(format!(
            "LZ4 decompression size mismatch: expected {}, got {}",
            uncompressed_size,
            decompressed.len()
        )));
    }

    Ok(Bytes::from(decompressed))
}

/// Compress using ZSTD
fn compress_zstd(data: &[u8]) -> Result<Bytes> {
    let compressed = zstd::bulk::compress(data, 3) // Compression level 3
        .map_err(|e| {
            Error::Compression(format!("ZSTD compression failed: {}", e))
        })?;

    // Build header + compressed data
    let mut header_and_data =
        BytesMut::with_capacity(HEADER_SIZE + compressed.len());

    // Write header
    header_and_data.put_u8(CompressionMethodByte::ZSTD as u8);
    header_and_data.put_u32_le((HEADER_SIZE + compressed.len()) as u32); // Total size including header
    header_and_data.put_u32_le(data.len() as u32); // Uncompressed size

    // Write compressed data
    header_and_data.put_slice(&compressed);

    // Compute CityHash128 checksum of header + compressed data
    let checksum = cityhash_102_128(&header_and_data);

    // Build final output with checksum
    // CityHash128 returns u128, write as (high64, low64) - reverse of typical
    // order
    let mut output =
        BytesMut::with_capacity(CHECKSUM_SIZE + header_and_data.len());
    output.put_u64_le((checksum >> 64) as u64); // High 64 bits first
    output.put_u64_le(checksum as u64); // Low 64 bits second
    output.put_slice(&header_and_data);

    Ok(output.freeze())
}

/// Decompress ZSTD data
fn decompress_zstd(data: &[u8], uncompressed_size: usize) -> Result<Bytes> {
    let decompressed = zstd::bulk::decompress(data, uncompressed_size)
        .map_err(|e| {
            Error::Compression(format!("ZSTD decompression failed: {}", e))
        })?;

    if decompressed.len() != uncompressed_size {
        return Err(Error::Compression(format!(
            "ZSTD decompression size mismatch: expected {}, got {}",
            uncompressed_size,
            decompressed.len()
        )));
    }

    Ok(Bytes::from(decompressed))
}

/// No compression (just adds header)
fn compress_none(data: &[u8]) -> Result<Bytes> {
    // Build header + data
    let mut header_and_data =
        BytesMut::with_capacity(HEADER_SIZE + data.len());

    // Write header
    header_and_data.put_u8(CompressionMethodByte::None as u8);
    header_and_data.put_u32_le((HEADER_SIZE + data.len()) as u32); // Total size
    header_and_data.put_u32_le(data.len() as u32); // Uncompressed size (same as total)

    // Write uncompressed data
    header_and_data.put_slice(data);

    // Compute CityHash128 checksum of header + data
    let checksum = cityhash_102_128(&header_and_data);

    // Build final output with checksum: high 64 bits first, then low 64
    // bits, each little-endian -- matches compress_lz4/compress_zstd.
    let mut output =
        BytesMut::with_capacity(CHECKSUM_SIZE + header_and_data.len());
    output.put_u64_le((checksum >> 64) as u64);
    output.put_u64_le(checksum as u64);
    output.put_slice(&header_and_data);

    Ok(output.freeze())
}
