// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! EBX wire constants and write configuration - Single Source of Truth
//!
//! This module centralizes ALL on-disk magic values, record sizes and
//! reserved markers for both partition layouts.
//! **NEVER hardcode elsewhere!**

// =======================================================================
// Legacy partition layout
// =======================================================================

/// Partition magic, original sub-version (no boxed-value section).
pub const PARTITION_MAGIC: u32 = 0x0FB2_D1CE;

/// Partition magic, newer sub-version with boxed-value table and section.
pub const PARTITION_MAGIC_BOXED: u32 = 0x0FB2_D1CD;

/// Fixed header length, original sub-version.
pub const PARTITION_HEADER_LEN: usize = 56;

/// Fixed header length with the boxed-value extension.
pub const PARTITION_HEADER_LEN_BOXED: usize = 64;

/// One import reference on disk: file guid + instance guid.
pub const IMPORT_ENTRY_LEN: usize = 32;

/// One type descriptor record.
pub const TYPE_DESCRIPTOR_LEN: usize = 16;

/// One field descriptor record.
pub const FIELD_DESCRIPTOR_LEN: usize = 16;

/// One array table record: offset, count, type ref.
pub const ARRAY_DESCRIPTOR_LEN: usize = 12;

/// One boxed-value table record: offset, type ref, flags.
pub const BOXED_DESCRIPTOR_LEN: usize = 8;

/// Section bases (strings, data, arrays, boxed values) are 16-byte aligned.
pub const SECTION_ALIGN: usize = 16;

/// High bit of `field_start`: the descriptor is a 16-byte shared-table key,
/// not an embedded layout.
pub const SHARED_KEY_MARKER: u32 = 0x8000_0000;

/// High bit of a legacy 32-bit pointer: the value is an import table index.
pub const POINTER_IMPORT_BIT: u32 = 0x8000_0000;

/// Inline `String` fields occupy a fixed NUL-padded slot of this many bytes.
pub const INLINE_STRING_LEN: usize = 32;

// =======================================================================
// RIFF partition layout
// =======================================================================

/// RIFF container tag.
pub const RIFF_TAG: [u8; 4] = *b"RIFF";

/// Container form for regular asset partitions.
pub const FORM_EBX: [u8; 4] = *b"EBX\0";

/// Container form for sound-bank partitions; identical layout, accepted on
/// read, never written.
pub const FORM_EBXS: [u8; 4] = *b"EBXS";

/// Chunk tag: raw instance payload.
pub const CHUNK_DATA: [u8; 4] = *b"EBXD";

/// Chunk tag: fixup table (type ids, offsets, relocation lists).
pub const CHUNK_FIXUP: [u8; 4] = *b"EFIX";

/// Chunk tag: per-array/per-boxed-value extra metadata.
pub const CHUNK_EXTRA: [u8; 4] = *b"EBXX";

/// The EBXD payload opens with this many zero bytes so the data section
/// lands 16-byte aligned at file offset 32.
pub const DATA_LEAD_PAD: usize = 12;

/// Every zero-length array points at one shared sentinel this many bytes
/// into the array section (its count word sits 4 bytes before it).
pub const EMPTY_ARRAY_SENTINEL: usize = 16;

/// EBXX entry type ref meaning "no shared-table descriptor".
pub const NO_SHARED_TYPE: u16 = 0xFFFF;

// =======================================================================
// Shared type descriptor table stream
// =======================================================================

/// Leading tag of a serialized shared descriptor table.
pub const SHARED_TABLE_TAG: [u8; 4] = *b"EBXT";

// =======================================================================
// Write configuration
// =======================================================================

/// Which legacy sub-version the partition writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionVersion {
    /// Original header, no boxed-value section. Writing a graph that contains
    /// boxed values under this version is an error, never a silent drop.
    Original,
    /// Newer header with boxed-value table and section.
    BoxedValues,
}

/// Partition writer configuration.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub version: PartitionVersion,
    /// Emit types present in the shared table as 16-byte key stubs and leave
    /// the local field table empty. Requires a shared table handle.
    pub shared_descriptors: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            version: PartitionVersion::BoxedValues,
            shared_descriptors: false,
        }
    }
}
