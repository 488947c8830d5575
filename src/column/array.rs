//! Array column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/array>
//!
//! ## Overview
//!
//! Array columns store variable-length arrays of elements. All elements are
//! stored in a single nested column (flattened), with offsets tracking where
//! each array begins/ends.
//!
//! ## Important Restriction
//!
//! **Arrays cannot be wrapped in Nullable:**
//! - ❌ `Nullable(Array(String))` - Error: "Nested type Array(String) cannot
//!   be inside Nullable type" (Error code 43)
//! - ✅ `Array(Nullable(String))` - CORRECT: Each element can be NULL
//!
//! If you need to represent "no array", use an empty array `[]` instead of
//! NULL.
//!
//! See: <https://github.com/ClickHouse/ClickHouse/issues/1062>
//!
//! ## Wire Format
//!
//! ```text
//! [offsets: UInt64 * num_arrays]  // Cumulative element counts
//! [nested_column_data]             // All elements concatenated
//! ```
//!
//! Example: `[[1,2], [3], [4,5,6]]`
//! - Offsets: `[2, 3, 6]` (2 elements in first array, 3 total after second, 6
//!   total after third)
//! - Nested data: `[1, 2, 3, 4, 5, 6]`

use super::{
    Column,
    ColumnRef,
};
use crate::{
    types::Type,
    Error,
    Result,
};
use bytes::{
    Buf,
    BytesMut,
};
use std::sync::Arc;

/// Column for arrays of variable length
///
/// Stores a nested column with all array elements concatenated,
/// and an offsets array that marks where each array ends.
///
pub struct ColumnArray {
    type_: Type,
    nested: ColumnRef,
    offsets: Vec<u64>, /* Cumulative offsets: offsets[i] = total elements
                        * up to and including array i */
}

impl ColumnArray {
    /// Create a new array column from an array type
    pub fn new(type_: Type) -> Self {
        // Extract nested type and create nested column
        let nested = match &type_ {
            Type::Array { item_type } => {
                crate::io::block_stream::create_column(item_type)
                    .expect("Failed to create nested column")
            }
            _ => panic!("ColumnArray requires Array type"),
        };

        Self { type_, nested, offsets: Vec::new() }
    }

    /// Create a new array column with an existing nested column
    pub fn with_nested(nested: ColumnRef) -> Self {
        let nested_type = nested.column_type().clone();
        Self { type_: Type::array(nested_type), nested, offsets: Vec::new() }
    }

    /// Create a new array column from parts (for geo types that need custom
    /// type names)
    pub(crate) fn from_parts(type_: Type, nested: ColumnRef) -> Self {
        Self { type_, nested, offsets: Vec::new() }
    }

    /// Create with reserved capacity
    pub fn with_capacity(type_: Type, capacity: usize) -> Self {
        let nested = match &type_ {
            Type::Array { item_type } => {
                crate::io::block_stream::create_column(item_type)
                    .expect("Failed to create nested column")
            }
            _ => panic!("ColumnArray requires Array type"),
        };

        Self { type_, nested, offsets: Vec::with_capacity(capacity) }
    }

    /// Append an array (specified by the number of elements in the nested
    /// column to consume) The caller must ensure that `len` elements have
    /// been added to the nested column
    pub fn append_len(&mut self, len: u64) {
        let new_offset = if self.offsets.is_empty() {
            len
        } else {
            self.offsets.last().unwrap() + len
        };
        self.offsets.push(new_offset);
    }

    /// Get the start and end indices for the array at the given index
    pub fn get_array_range(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.offsets.len() {
            return None;
        }

        let end = self.offsets[index] as usize;
        let start =
            if index == 0 { 0 } else { self.offsets[index - 1] as usize };

        Some((start, end))
    }

    /// Get the length of the array at the given index
    pub fn get_array_len(&self, index: usize) -> Option<usize> {
        self.get_array_range(index).map(|(start, end)| end - start)
    }

    /// Get the nested column
    pub fn nested(&self) -> &ColumnRef {
        &self.nested
    }

    /// Get mutable access to the nested column
    pub fn nested_mut(&mut self) -> &mut ColumnRef {
        &mut self.nested
    }

    /// Get the offsets
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Append an entire array column as a single array element
    /// This takes all the data from the provided column and adds it as one
    /// array
    pub fn append_array(&mut self, array_data: ColumnRef) {
        let len = array_data.size() as u64;

        // Append the array data to nested column
        let nested_mut = Arc::get_mut(&mut self.nested)
            .expect("Cannot append to shared array column - column has multiple references");
        nested_mut
            .append_column(array_data)
            .expect("Failed to append array data to nested column");

        // Update offsets
        self.append_len(len);
    }

    /// Get the array at the given index as a sliced column
    pub fn at(&self, index: usize) -> ColumnRef {
        if let Some((start, end)) = self.get_array_range(index) {
            self.nested.slice(start, end - start).expect("Valid slice")
        } else {
            panic!("Array index out of bounds: {}", index);
        }
    }

    /// Get the number of arrays (alias for size())
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Check if the array column is empty
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl Column for ColumnArray {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn size(&self) -> usize {
        self.offsets.len()
    }

    fn clear(&mut self) {
        self.offsets.clear();
        // CRITICAL: Must also clear nested data to maintain consistency
        // If we clear offsets but not nested data, the column is in a corrupt
        // state
        let nested_mut = Arc::get_mut(&mut self.nested)
            .expect("Cannot clear shared array column - column has multiple references");
        nested_mut.clear();
    }

    fn reserve(&mut self, new_cap: usize) {
        self.offsets.reserve(new_cap);
    }

    fn append_column(&mut self, other: ColumnRef) -> Result<()> {
        let other =
            other.as_any().downcast_ref::<ColumnArray>().ok_or_else(|| {
                Error::TypeMismatch {
                    expected: self.type_.name(),
                    actual: other.column_type().name(),
                }
            })?;

        // Check that nested types match
        if self.nested.column_type().name()
            != other.nested.column_type().name()
        {
            return Err(Error::TypeMismatch {
                expected: self.nested.column_type().name(),
                actual: other.nested.column_type().name(),
            });
        }

        // Adjust offsets from other and append
        let offset_base = self.offsets.last().copied().unwrap_or(0);
        for &offset in &other.offsets {
            self.offsets.push(offset_base + offset);
        }

        // CRITICAL: Must also append the nested data!
        // Without this, offsets point to wrong/missing data → DATA CORRUPTION
        let nested_mut = Arc::get_mut(&mut self.nested)
            .ok_or_else(|| Error::Protocol(
                "Cannot append to shared array column - column has multiple references".to_string()
            ))?;
        nested_mut.append_column(other.nested.clone())?;

        Ok(())
    }

    fn load_from_buffer(
        &mut self,
        buffer: &mut &[u8],
        rows: usize,
    ) -> Result<()> {
        self.offsets.reserve(rows);

        // Read offsets (fixed UInt64, not varint!)
        // Wire format: UInt64 values stored as 8-byte little-endian
        let bytes_needed = rows * 8;
        if buffer.len() < bytes_needed {
            return Err(Error::Protocol(format!(
                "Buffer underflow reading array offsets: need {} bytes, have {}",
                bytes_needed,
                buffer.len()
            )));
        }

        // Use bulk copy for performance
        self.offsets.reserve(rows);
        let current_len = self.offsets.len();
        unsafe {
            // Set length first to claim ownership of the memory
            self.offsets.set_len(current_len + rows);
            // Cast dest to bytes and use byte offset
            let dest_ptr =
                (self.offsets.as_mut_ptr() as *mut u8).add(current_len * 8);
            std::ptr::copy_nonoverlapping(
                buffer.as_ptr(),
                dest_ptr,
                bytes_needed,
            );
        }

        buffer.advance(bytes_needed);

        // CRITICAL: Must also load the nested column data
        // The total number of nested elements is the last offset value
        let total_nested_elements =
            self.offsets.last().copied().unwrap_or(0) as usize;
        if total_nested_elements > 0 {
            let nested_mut = Arc::get_mut(&mut self.nested)
                .ok_or_else(|| Error::Protocol(
                    "Cannot load into shared array column - column has multiple references".to_string()
                ))?;
            nested_mut.load_from_buffer(buffer, total_nested_elements)?;
        }

        Ok(())
    }

    fn load_prefix(&mut self, buffer: &mut &[u8], rows: usize) -> Result<()> {
        // Delegate to nested column's load_prefix
        // Critical for Array(LowCardinality(X)) to read LowCardinality
        // key_version before offsets
        let nested_mut = Arc::get_mut(&mut self.nested).ok_or_else(|| {
            Error::Protocol(
                "Cannot load prefix for shared array column".to_string(),
            )
        })?;
        nested_mut.load_prefix(buffer, rows)
    }

    fn save_prefix(&self, buffer: &mut BytesMut) -> Result<()> {
        // Delegate to nested column's save_prefix
        // Critical for Array(LowCardinality(X)) to write LowCardinality
        // version before offsets
        self.nested.save_prefix(buffer)
    }

    fn save_to_buffer(&self, buffer: &mut BytesMut) -> Result<()> {
        // Write offsets as fixed UInt64 (not varints!)
        // Wire format: UInt64 values stored as 8-byte little-endian
        // This matches load_from_buffer which reads fixed UInt64
        if !self.offsets.is_empty() {
            let byte_slice = unsafe {
                std::slice::from_raw_parts(
                    self.offsets.as_ptr() as *const u8,
                    self.offsets.len() * 8,
                )
            };
            buffer.extend_from_slice(byte_slice);
        }

        // Write nested column data
        self.nested.save_to_buffer(buffer)?;

        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnArray::with_nested(self.nested.clone_empty()))
    }

    fn slice(&self, begin: usize, len: usize) -> Result<ColumnRef> {
        if begin + len > self.offsets.len() {
            return Err(Error::InvalidArgument(format!(
                "Slice out of bounds: begin={}, len={}, size={}",
                begin,
                len,
                self.offsets.len()
            )));
        }

        // Calculate the range of nested elements we need
        let nested_start =
            if begin == 0 { 0 } else { self.offsets[begin - 1] as usize };
        let nested_end = self.offsets[begin + len - 1] as usize;
        let nested_len = nested_end - nested_start;

        // Slice the nested column
        let sliced_nested = self.nested.slice(nested_start, nested_len)?;

        // Adjust offsets for the slice
        let mut sliced_offsets = Vec::with_capacity(len);
        let offset_base = if begin == 0 { 0 } else { self.offsets[begin - 1] };

        for i in begin..begin + len {
            sliced_offsets.push(self.offsets[i] - offset_base);
        }

        let mut result = ColumnArray::with_nested(sliced_nested);
        result.offsets = sliced_offsets;

        Ok(Arc::new(result))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// Helper functions removed - using buffer_utils module
