//! The custom-serialization kind tree.
//!
//! Every serialized column is optionally preceded by a byte declaring
//! whether it uses "custom serialization" (revision-gated by
//! [`crate::protocol::revision::WITH_CUSTOM_SERIALIZATION`]). When it does,
//! the byte is followed by a small recursive structure naming the kind of
//! each (possibly nested) sub-column, mirroring the server's own
//! `ISerialization::Kind` enum.

use crate::{
    Error,
    Result,
};

/// The serialization kind of a column, or of one of its nested children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KindTree {
    /// Ordinary, one-value-per-row serialization. This crate always writes
    /// `Dense`.
    Dense,
    /// Sparse serialization (most values are a fixed default, only non-default
    /// offsets and values are stored). Refused on decode; see
    /// `Error::UnsupportedKind`.
    Sparse,
    /// A composite column (Array, Tuple, Map, Nullable, ...) whose children
    /// each carry their own kind.
    Nested(Vec<KindTree>),
}

impl Default for KindTree {
    fn default() -> Self {
        KindTree::Dense
    }
}

impl KindTree {
    /// Read the custom-serialization byte and, if set, the kind tree that
    /// follows it. `num_children` is how many direct sub-kinds a `Nested`
    /// kind is expected to carry for this column's type (0 for leaf types).
    pub fn read_from(
        buffer: &mut &[u8],
        server_revision: u64,
        num_children: usize,
    ) -> Result<Self> {
        if server_revision
            < crate::protocol::revision::WITH_CUSTOM_SERIALIZATION
        {
            return Ok(KindTree::Dense);
        }

        if buffer.is_empty() {
            return Err(Error::ProtocolViolation(
                "unexpected end of data reading custom-serialization byte"
                    .to_string(),
            ));
        }
        let has_custom = buffer[0] != 0;
        bytes::Buf::advance(buffer, 1);

        if !has_custom {
            return Ok(KindTree::Dense);
        }

        Self::read_kind(buffer, num_children)
    }

    fn read_kind(buffer: &mut &[u8], num_children: usize) -> Result<Self> {
        if buffer.is_empty() {
            return Err(Error::ProtocolViolation(
                "unexpected end of data reading serialization kind"
                    .to_string(),
            ));
        }
        let tag = buffer[0];
        bytes::Buf::advance(buffer, 1);

        match tag {
            0 => Ok(KindTree::Dense),
            1 => Err(Error::UnsupportedKind(
                "sparse column serialization is not supported".to_string(),
            )),
            2 => {
                let mut children = Vec::with_capacity(num_children);
                for _ in 0..num_children {
                    children.push(Self::read_kind(buffer, 0)?);
                }
                Ok(KindTree::Nested(children))
            }
            other => Err(Error::ProtocolViolation(format!(
                "unknown serialization kind tag: {}",
                other
            ))),
        }
    }

    /// True if this kind (or any descendant) is `Sparse`.
    pub fn contains_sparse(&self) -> bool {
        match self {
            KindTree::Dense => false,
            KindTree::Sparse => true,
            KindTree::Nested(children) => {
                children.iter().any(Self::contains_sparse)
            }
        }
    }
}
