// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the EBX codec.
//!
//! Three failure classes cross the API boundary plus one for invalid caller
//! input. `CorruptFormat` and `UnsupportedFieldKind` are always fatal.
//! `MissingType` is downgraded to a skip by the per-field dispatch only;
//! every other layer propagates it untouched.

use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    /// Structural damage: bad magic, truncated section, out-of-range
    /// table index, malformed chunk.
    CorruptFormat { offset: usize, reason: String },
    /// A wire type tag this codec has no encode/decode rule for.
    UnsupportedFieldKind { flags: u16, context: String },
    /// The type schema cannot resolve a referenced type id.
    MissingType { id: String },
    /// The caller-supplied object graph is not writable as-is.
    InvalidGraph { reason: String },
}

impl Error {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Error::CorruptFormat {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(flags: u16, context: impl Into<String>) -> Self {
        Error::UnsupportedFieldKind {
            flags,
            context: context.into(),
        }
    }

    pub(crate) fn missing_type(id: impl fmt::Display) -> Self {
        Error::MissingType {
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_graph(reason: impl Into<String>) -> Self {
        Error::InvalidGraph {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CorruptFormat { offset, reason } => {
                write!(f, "corrupt format at offset {}: {}", offset, reason)
            }
            Error::UnsupportedFieldKind { flags, context } => {
                write!(f, "unsupported field kind {:#06x} in {}", flags, context)
            }
            Error::MissingType { id } => write!(f, "type not found in schema: {}", id),
            Error::InvalidGraph { reason } => write!(f, "invalid object graph: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
