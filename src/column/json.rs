//! JSON column implementation (`JSON(path1 T1, path2 T2, ...)`).
//!
//! The on-wire layout follows the server's own `SerializationJSON`: the
//! prefix re-declares each typed path's name and type (the structure lives
//! in the stream, not just the type string), followed by a version for the
//! dynamic subcolumn that carries any path not in the typed set. Each typed
//! path then serializes as an ordinary child column of its declared type, in
//! declaration order; a `Nullable` typed path decodes a null entry as an
//! absent key rather than a null value, per the wire contract.
//!
//! This implementation supports the declared typed paths fully. It does not
//! implement the server's `Dynamic`/`Variant` subcolumn encoding for paths
//! outside the declared set: writers here always declare zero dynamic
//! paths, and a decode that finds a non-zero dynamic path count fails with
//! [`Error::UnsupportedType`], the same posture this crate takes for
//! `Sparse` kind trees it can't fully materialize.

use super::{
    Column,
    ColumnRef,
};
use crate::{
    io::buffer_utils::{
        read_string,
        read_varint,
        write_string,
        write_varint,
    },
    types::Type,
    Error,
    Result,
};
use bytes::BytesMut;
use std::sync::Arc;

/// Column for the dynamic `JSON` type with statically declared typed paths.
pub struct ColumnJson {
    type_: Type,
    size: usize,
    typed_paths: Vec<(String, Type)>,
    typed_columns: Vec<ColumnRef>,
}

impl ColumnJson {
    /// Create a new empty JSON column for the given `Json` type.
    ///
    /// # Panics
    ///
    /// Panics if `type_` is not `Type::Json`.
    pub fn new(type_: Type) -> Self {
        let typed_paths = match &type_ {
            Type::Json { typed_paths } => typed_paths.clone(),
            _ => panic!("ColumnJson requires Json type"),
        };

        let typed_columns = typed_paths
            .iter()
            .map(|(_, t)| {
                crate::io::block_stream::create_column(t)
                    .expect("Failed to create JSON typed-path column")
            })
            .collect();

        Self { type_, size: 0, typed_paths, typed_columns }
    }

    /// The declared typed paths, in wire order.
    pub fn typed_paths(&self) -> &[(String, Type)] {
        &self.typed_paths
    }

    /// The column backing a given typed path, by index.
    pub fn typed_column(&self, index: usize) -> ColumnRef {
        self.typed_columns[index].clone()
    }

    /// The column backing a given typed path, by name.
    pub fn typed_column_by_name(&self, name: &str) -> Option<ColumnRef> {
        self.typed_paths
            .iter()
            .position(|(path, _)| path == name)
            .map(|i| self.typed_columns[i].clone())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Column for ColumnJson {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        for col in &mut self.typed_columns {
            let col_mut = Arc::get_mut(col).expect(
                "Cannot clear shared JSON column - column has multiple references",
            );
            col_mut.clear();
        }
        self.size = 0;
    }

    fn reserve(&mut self, new_cap: usize) {
        for col in &mut self.typed_columns {
            if let Some(col_mut) = Arc::get_mut(col) {
                col_mut.reserve(new_cap);
            }
        }
    }

    fn append_column(&mut self, other: ColumnRef) -> Result<()> {
        let other =
            other.as_any().downcast_ref::<ColumnJson>().ok_or_else(|| {
                Error::TypeMismatch {
                    expected: self.type_.name(),
                    actual: other.column_type().name(),
                }
            })?;

        if self.typed_paths.len() != other.typed_paths.len()
            || self
                .typed_paths
                .iter()
                .zip(&other.typed_paths)
                .any(|((a, _), (b, _))| a != b)
        {
            return Err(Error::TypeMismatch {
                expected: self.type_.name(),
                actual: other.type_.name(),
            });
        }

        for (i, col) in self.typed_columns.iter_mut().enumerate() {
            let col_mut = Arc::get_mut(col).ok_or_else(|| {
                Error::Protocol(
                    "Cannot append to shared JSON column - column has multiple references"
                        .to_string(),
                )
            })?;
            col_mut.append_column(other.typed_columns[i].clone())?;
        }

        self.size += other.size;
        Ok(())
    }

    fn load_prefix(
        &mut self,
        buffer: &mut &[u8],
        rows: usize,
    ) -> Result<()> {
        let num_typed_paths = read_varint(buffer)? as usize;
        let mut typed_paths = Vec::with_capacity(num_typed_paths);
        for _ in 0..num_typed_paths {
            let name = read_string(buffer)?;
            let type_name = read_string(buffer)?;
            let parsed = Type::parse(&type_name)?;
            typed_paths.push((name, parsed));
        }

        let _dynamic_structure_version = read_varint(buffer)?;
        let num_dynamic_paths = read_varint(buffer)?;
        if num_dynamic_paths > 0 {
            return Err(Error::UnsupportedType(format!(
                "JSON dynamic paths beyond the {} declared typed path(s) are not supported",
                typed_paths.len()
            )));
        }

        let mut typed_columns = Vec::with_capacity(typed_paths.len());
        for (_, t) in &typed_paths {
            typed_columns
                .push(crate::io::block_stream::create_column(t)?);
        }

        for col in &mut typed_columns {
            let col_mut = Arc::get_mut(col).ok_or_else(|| {
                Error::Protocol(
                    "Cannot load prefix for JSON typed-path column".to_string(),
                )
            })?;
            col_mut.load_prefix(buffer, rows)?;
        }

        self.typed_paths = typed_paths;
        self.typed_columns = typed_columns;
        Ok(())
    }

    fn load_from_buffer(
        &mut self,
        buffer: &mut &[u8],
        rows: usize,
    ) -> Result<()> {
        for col in &mut self.typed_columns {
            let col_mut = Arc::get_mut(col).ok_or_else(|| {
                Error::Protocol(
                    "Cannot load into shared JSON column - column has multiple references"
                        .to_string(),
                )
            })?;
            col_mut.load_from_buffer(buffer, rows)?;
        }
        self.size += rows;
        Ok(())
    }

    fn save_prefix(&self, buffer: &mut BytesMut) -> Result<()> {
        write_varint(buffer, self.typed_paths.len() as u64);
        for (name, t) in &self.typed_paths {
            write_string(buffer, name);
            write_string(buffer, &t.name());
        }
        // Dynamic subcolumn structure version, then zero declared dynamic
        // paths: this crate only ever writes the statically declared typed
        // paths.
        write_varint(buffer, 1);
        write_varint(buffer, 0);

        for col in &self.typed_columns {
            col.save_prefix(buffer)?;
        }
        Ok(())
    }

    fn save_to_buffer(&self, buffer: &mut BytesMut) -> Result<()> {
        for col in &self.typed_columns {
            col.save_to_buffer(buffer)?;
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnJson::new(self.type_.clone()))
    }

    fn slice(&self, begin: usize, len: usize) -> Result<ColumnRef> {
        if begin + len > self.size {
            return Err(Error::InvalidArgument(format!(
                "Slice out of bounds: begin={}, len={}, size={}",
                begin, len, self.size
            )));
        }

        let sliced: Result<Vec<ColumnRef>> = self
            .typed_columns
            .iter()
            .map(|col| col.slice(begin, len))
            .collect();

        Ok(Arc::new(ColumnJson {
            type_: self.type_.clone(),
            size: len,
            typed_paths: self.typed_paths.clone(),
            typed_columns: sliced?,
        }))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
