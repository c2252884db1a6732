// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # EBX - Schema-driven binary object graph codec
//!
//! A pure Rust reader and writer for the EBX binary format used by game
//! asset pipelines: typed object graphs with cross-file references,
//! serialized either as a flat partition with inline type descriptors or as
//! a RIFF container backed by a shared type descriptor table.
//!
//! ## Quick Start
//!
//! ```rust
//! use ebx::{
//!     FieldKind, Guid, Instance, ObjectGraph, PartitionReader, PartitionWriter,
//!     SchemaSet, TypeId, TypeLayoutBuilder, TypeSchema, Value,
//! };
//!
//! fn main() -> ebx::Result<()> {
//!     let mut schema = SchemaSet::new();
//!     schema.insert(
//!         TypeLayoutBuilder::class("Entity")
//!             .field("Name", FieldKind::CString)
//!             .field("Health", FieldKind::Int32)
//!             .build(),
//!     )?;
//!
//!     let id = TypeId::name("Entity");
//!     let table = schema.field_table(&id).expect("registered type");
//!     let mut value = schema.instantiate(&id).expect("registered type");
//!     let (slot, _) = table.slot_by_name("Health").expect("declared field");
//!     value.fields[slot] = Value::I32(250);
//!
//!     let mut graph = ObjectGraph::new(Guid::from_name("demo/entities"));
//!     graph.add_instance(Instance::exported(Guid::from_name("demo/hero"), value));
//!
//!     let bytes = PartitionWriter::new(&schema).write(&graph)?;
//!     let back = PartitionReader::new(&schema).read(&bytes)?;
//!     assert_eq!(back.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## File layouts
//!
//! ```text
//! legacy partition                    RIFF container
//! +--------------------------+       +---------------------------+
//! | header (56/64 bytes)     |       | RIFF <size> "EBX\0"       |
//! | imports                  |       | EBXD  instance data       |
//! | type names               |       |       element blocks      |
//! | field/type descriptors   |       |       boxed payloads      |
//! | instance runs            |       |       string pool         |
//! | array/boxed tables       |       | EFIX  relocation lists    |
//! | string pool              |       | EBXX  content hashes      |
//! | instance data            |       +---------------------------+
//! | element blocks, payloads |
//! +--------------------------+
//! ```
//!
//! Legacy files carry their type descriptors inline, or as 16-byte key
//! stubs into a shared table. RIFF files always resolve types through a
//! [`SharedTypeDescriptors`] table distributed separately.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SchemaSet`] | In-memory type system the codec resolves layouts against |
//! | [`ObjectGraph`] | Decoded partition: instance arena plus file identity |
//! | [`PartitionReader`] / [`PartitionWriter`] | Legacy flat layout codec |
//! | [`RiffReader`] / [`RiffWriter`] | RIFF container codec |
//! | [`SharedTypeDescriptors`] | Cross-file descriptor table keyed by guid |

/// Format constants, magic numbers and write configuration.
pub mod config;
/// Byte-level primitives: bounds-checked cursors, guids, name hashing and
/// string pools.
pub mod core;
/// Wire type descriptors, their flags and the shared descriptor table.
pub mod descriptor;
mod error;
pub(crate) mod field_codec;
/// Decoded object graphs: instances, values, references.
pub mod graph;
/// The legacy flat partition layout.
pub mod partition;
/// The RIFF container layout.
pub mod riff;
/// Type layouts and the schema trait the codec resolves against.
pub mod schema;

pub use crate::core::Guid;
pub use config::{PartitionVersion, WriteOptions};
pub use descriptor::SharedTypeDescriptors;
pub use error::{Error, Result};
pub use graph::{
    BoxedValue, ImportRef, Instance, ObjectGraph, PointerRef, StructValue, TypeRef, Value,
};
pub use partition::{PartitionReader, PartitionWriter};
pub use riff::{RiffReader, RiffWriter};
pub use schema::{FieldKind, FieldTable, SchemaSet, TypeId, TypeLayoutBuilder, TypeSchema};

use config::{PARTITION_MAGIC, PARTITION_MAGIC_BOXED, RIFF_TAG};

/// Decode a partition file of either layout, sniffing the container from
/// its first bytes.
///
/// RIFF containers carry no descriptors and need `shared`; legacy files
/// need it only when they were written with key stubs.
pub fn read(
    bytes: &[u8],
    schema: &dyn TypeSchema,
    shared: Option<&SharedTypeDescriptors>,
) -> Result<ObjectGraph> {
    if bytes.starts_with(&RIFF_TAG) {
        let shared = shared.ok_or_else(|| {
            Error::corrupt(0, "riff partition requires a shared type descriptor table")
        })?;
        return RiffReader::new(schema, shared).read(bytes);
    }
    let magic = bytes
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
    match magic {
        Some(PARTITION_MAGIC | PARTITION_MAGIC_BOXED) => {
            let reader = PartitionReader::new(schema);
            match shared {
                Some(shared) => reader.with_shared(shared).read(bytes),
                None => reader.read(bytes),
            }
        }
        _ => Err(Error::corrupt(0, "not an ebx partition file")),
    }
}
