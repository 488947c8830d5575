//! Numeric column implementations
//!
//! **ClickHouse Documentation:**
//! - [Integer Types](https://clickhouse.com/docs/en/sql-reference/data-types/int-uint)
//!   - Int8/16/32/64/128, UInt8/16/32/64/128
//! - [Floating-Point Types](https://clickhouse.com/docs/en/sql-reference/data-types/float)
//!   - Float32, Float64
//! - [Decimal Types](https://clickhouse.com/docs/en/sql-reference/data-types/decimal)
//!   - Fixed-point numbers
//!
//! ## Integer Types
//!
//! All integer types are stored in **little-endian** format:
//!
//! | Type | Rust Type | Storage | Min | Max |
//! |------|-----------|---------|-----|-----|
//! | `Int8` | `i8` | 1 byte | -128 | 127 |
//! | `Int16` | `i16` | 2 bytes | -32,768 | 32,767 |
//! | `Int32` | `i32` | 4 bytes | -2³¹ | 2³¹-1 |
//! | `Int64` | `i64` | 8 bytes | -2⁶³ | 2⁶³-1 |
//! | `Int128` | `i128` | 16 bytes | -2¹²⁷ | 2¹²⁷-1 |
//! | `UInt8` | `u8` | 1 byte | 0 | 255 |
//! | `UInt16` | `u16` | 2 bytes | 0 | 65,535 |
//! | `UInt32` | `u32` | 4 bytes | 0 | 2³²-1 |
//! | `UInt64` | `u64` | 8 bytes | 0 | 2⁶⁴-1 |
//! | `UInt128` | `u128` | 16 bytes | 0 | 2¹²⁸-1 |
//!
//! ## Floating-Point Types
//!
//! IEEE 754 floating-point numbers, stored in little-endian:
//! - `Float32` - Single precision (32-bit)
//! - `Float64` - Double precision (64-bit)
//!
//! ## Bool Type
//!
//! `Bool` is an alias for `UInt8` where 0 = false, 1 = true.

use super::{
    Column,
    ColumnRef,
    ColumnTyped,
};
use crate::{
    types::{
        ToType,
        Type,
    },
    Error,
    Result,
};
use bytes::{
    Buf,
    BufMut,
    BytesMut,
};
use std::sync::Arc;

/// Trait for types that can be read/written as fixed-size values (synchronous
/// version for columns)
///
/// All numeric types are stored in **little-endian** format in ClickHouse wire
/// protocol.
pub trait FixedSize: Sized + Clone + Send + Sync + 'static {
    fn read_from(buffer: &mut &[u8]) -> Result<Self>;
    fn write_to(&self, buffer: &mut BytesMut);
}

// Implement FixedSize for primitive types
macro_rules! impl_fixed_size {
    ($type:ty, $get:ident, $put:ident) => {
        impl FixedSize for $type {
            fn read_from(buffer: &mut &[u8]) -> Result<Self> {
                if buffer.len() < std::mem::size_of::<$type>() {
                    return Err(Error::Protocol(
                        "Buffer underflow".to_string(),
                    ));
                }
                Ok(buffer.$get())
            }

            fn write_to(&self, buffer: &mut BytesMut) {
                buffer.$put(*self);
            }
        }
    };
}

impl_fixed_size!(u8, get_u8, put_u8);
impl_fixed_size!(u16, get_u16_le, put_u16_le);
impl_fixed_size!(u32, get_u32_le, put_u32_le);
impl_fixed_size!(u64, get_u64_le, put_u64_le);
impl_fixed_size!(i8, get_i8, put_i8);
impl_fixed_size!(i16, get_i16_le, put_i16_le);
impl_fixed_size!(i32, get_i32_le, put_i32_le);
impl_fixed_size!(i64, get_i64_le, put_i64_le);
impl_fixed_size!(f32, get_f32_le, put_f32_le);
impl_fixed_size!(f64, get_f64_le, put_f64_le);

impl FixedSize for i128 {
    fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        if buffer.len() < 16 {
            return Err(Error::Protocol("Buffer underflow".to_string()));
        }
        Ok(buffer.get_i128_le())
    }

    fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_i128_le(*self);
    }
}

impl FixedSize for u128 {
    fn read_from(buffer: &mut &[u8]) -> Result<Self> {
        if buffer.len() < 16 {
            return Err(Error::Protocol("Buffer underflow".to_string()));
        }
        Ok(buffer.get_u128_le())
    }

    fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_u128_le(*self);
    }
}

/// Generic column for numeric types
pub struct ColumnVector<T: FixedSize> {
    type_: Type,
    data: Vec<T>,
}

impl<T: FixedSize + Clone + Send + Sync + 'static> ColumnVector<T> {
    /// Create a new column with explicit type (backward compatible)
    pub fn with_type(type_: Type) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Create a new column with explicit type and capacity (backward
    /// compatible)
    pub fn with_type_and_capacity(type_: Type, capacity: usize) -> Self {
        Self { type_, data: Vec::with_capacity(capacity) }
    }

    pub fn from_vec(type_: Type, data: Vec<T>) -> Self {
        Self { type_, data }
    }

    /// Create a column with initial data (builder pattern)
    pub fn with_data(mut self, data: Vec<T>) -> Self {
        self.data = data;
        self
    }

    /// Reserve capacity for additional elements (for
    /// benchmarking/optimization)
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Clear the column while preserving capacity (for
    /// benchmarking/optimization)
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    /// Get value at index (panics if out of bounds - for tests)
    pub fn at(&self, index: usize) -> T {
        self.data[index].clone()
    }

    /// Get the number of elements (alias for size())
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the column is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn append(&mut self, value: T) {
        self.data.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<T> {
        &mut self.data
    }
}

/// Type-inferred constructors for ColumnVector
impl<T: FixedSize + ToType + Clone + Send + Sync + 'static> ColumnVector<T> {
    /// Create a new column with type inferred from T
    ///
    /// # Examples
    ///
    /// ```
    /// use clickhouse_client::column::ColumnVector;
    /// use clickhouse_client::types::Type;
    ///
    /// let col = ColumnVector::<i32>::new();
    /// assert_eq!(col.column_type(), &Type::int32());
    /// ```
    pub fn new() -> Self {
        Self { type_: T::to_type(), data: Vec::new() }
    }

    /// Create a new column with type inferred from T and specified capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use clickhouse_client::column::ColumnVector;
    ///
    /// let col = ColumnVector::<u64>::with_capacity(100);
    /// assert_eq!(col.len(), 0);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self { type_: T::to_type(), data: Vec::with_capacity(capacity) }
    }
}

impl<T: FixedSize + ToType + Clone + Send + Sync + 'static> Default
    for ColumnVector<T>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FixedSize> Column for ColumnVector<T> {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn clear(&mut self) {
        self.data.clear()
    }

    fn reserve(&mut self, new_cap: usize) {
        self.data.reserve(new_cap);
    }

    fn append_column(&mut self, other: ColumnRef) -> Result<()> {
        let other = other
            .as_any()
            .downcast_ref::<ColumnVector<T>>()
            .ok_or_else(|| Error::TypeMismatch {
                expected: self.type_.name(),
                actual: other.column_type().name(),
            })?;

        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    fn load_from_buffer(
        &mut self,
        buffer: &mut &[u8],
        rows: usize,
    ) -> Result<()> {
        // Optimize: Use bulk read instead of loop for massive performance gain
        let bytes_needed = rows * std::mem::size_of::<T>();

        if buffer.len() < bytes_needed {
            return Err(Error::Protocol(format!(
                "Buffer underflow: need {} bytes, have {}",
                bytes_needed,
                buffer.len()
            )));
        }

        // Pre-allocate and read directly into Vec's memory
        self.data.clear();
        self.data.reserve(rows);

        unsafe {
            // Read bytes directly into Vec's uninitialized memory
            let dest_ptr = self.data.as_mut_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(
                buffer.as_ptr(),
                dest_ptr,
                bytes_needed,
            );
            self.data.set_len(rows);
        }

        // Advance buffer
        *buffer = &buffer[bytes_needed..];
        Ok(())
    }

    fn save_to_buffer(&self, buffer: &mut BytesMut) -> Result<()> {
        // Optimize: Use bulk write instead of loop for massive performance
        // gain. This achieves the same with
        // extend_from_slice on the raw bytes
        if !self.data.is_empty() {
            let byte_slice = unsafe {
                std::slice::from_raw_parts(
                    self.data.as_ptr() as *const u8,
                    self.data.len() * std::mem::size_of::<T>(),
                )
            };
            buffer.extend_from_slice(byte_slice);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnVector::<T>::with_type(self.type_.clone()))
    }

    fn slice(&self, begin: usize, len: usize) -> Result<ColumnRef> {
        if begin + len > self.data.len() {
            return Err(Error::InvalidArgument(format!(
                "Slice range out of bounds: begin={}, len={}, size={}",
                begin,
                len,
                self.data.len()
            )));
        }

        let sliced_data = self.data[begin..begin + len].to_vec();
        Ok(Arc::new(ColumnVector::<T>::from_vec(
            self.type_.clone(),
            sliced_data,
        )))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl<T: FixedSize + Clone + Send + Sync + 'static> ColumnTyped<T>
    for ColumnVector<T>
{
    fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).cloned()
    }

    fn append(&mut self, value: T) {
        self.data.push(value);
    }
}

// Type aliases for common numeric columns
pub type ColumnUInt8 = ColumnVector<u8>;
pub type ColumnUInt16 = ColumnVector<u16>;
pub type ColumnUInt32 = ColumnVector<u32>;
pub type ColumnUInt64 = ColumnVector<u64>;
pub type ColumnUInt128 = ColumnVector<u128>;

pub type ColumnInt8 = ColumnVector<i8>;
pub type ColumnInt16 = ColumnVector<i16>;
pub type ColumnInt32 = ColumnVector<i32>;
pub type ColumnInt64 = ColumnVector<i64>;
pub type ColumnInt128 = ColumnVector<i128>;

pub type ColumnFloat32 = ColumnVector<f32>;
pub type ColumnFloat64 = ColumnVector<f64>;
