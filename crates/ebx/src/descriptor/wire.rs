// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size wire records shared by the descriptor tables.

use crate::config::SHARED_KEY_MARKER;
use crate::core::{Cursor, Guid};
use crate::descriptor::flags::TypeFlags;
use crate::error::Result;
use crate::graph::ImportRef;

/// One type entry of a descriptor table (16 bytes on wire).
///
/// When the high bit of `field_start` is set the entry is a stub: its 16
/// bytes with that bit cleared form the guid key of the full descriptor in
/// the shared table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name_hash: u32,
    pub field_start: u32,
    pub field_count: u8,
    pub alignment: u8,
    pub flags: TypeFlags,
    pub size: u16,
    pub reserved: u16,
}

impl TypeDescriptor {
    pub const WIRE_LEN: usize = 16;

    pub fn is_shared_key(&self) -> bool {
        self.field_start & SHARED_KEY_MARKER != 0
    }

    /// The shared-table key encoded in a stub entry.
    pub fn shared_key(&self) -> Guid {
        let mut unmasked = *self;
        unmasked.field_start &= !SHARED_KEY_MARKER;
        Guid::from_bytes(unmasked.to_bytes())
    }

    /// Build the stub entry that keys a shared descriptor.
    pub fn from_shared_key(key: Guid) -> Self {
        let mut desc = Self::from_bytes(*key.as_bytes());
        desc.field_start |= SHARED_KEY_MARKER;
        desc
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..4].copy_from_slice(&self.name_hash.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.field_start.to_le_bytes());
        bytes[8] = self.field_count;
        bytes[9] = self.alignment;
        bytes[10..12].copy_from_slice(&self.flags.bits().to_le_bytes());
        bytes[12..14].copy_from_slice(&self.size.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; Self::WIRE_LEN]) -> Self {
        Self {
            name_hash: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            field_start: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            field_count: bytes[8],
            alignment: bytes[9],
            flags: TypeFlags::from_bits(u16::from_le_bytes([bytes[10], bytes[11]])),
            size: u16::from_le_bytes([bytes[12], bytes[13]]),
            reserved: u16::from_le_bytes([bytes[14], bytes[15]]),
        }
    }

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes.copy_from_slice(cur.read_bytes(Self::WIRE_LEN)?);
        Ok(Self::from_bytes(bytes))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

/// One field entry of a descriptor table (16 bytes on wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name_hash: u32,
    pub flags: TypeFlags,
    /// Type-table reference; self-relative signed delta inside the shared
    /// table, absolute index otherwise.
    pub type_ref: u16,
    pub data_offset: u32,
    pub secondary_offset: u32,
}

impl FieldDescriptor {
    pub const WIRE_LEN: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0..4].copy_from_slice(&self.name_hash.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.flags.bits().to_le_bytes());
        bytes[6..8].copy_from_slice(&self.type_ref.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.data_offset.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.secondary_offset.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; Self::WIRE_LEN]) -> Self {
        Self {
            name_hash: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            flags: TypeFlags::from_bits(u16::from_le_bytes([bytes[4], bytes[5]])),
            type_ref: u16::from_le_bytes([bytes[6], bytes[7]]),
            data_offset: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            secondary_offset: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes.copy_from_slice(cur.read_bytes(Self::WIRE_LEN)?);
        Ok(Self::from_bytes(bytes))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

/// One entry of the legacy array table (12 bytes on wire). Entry 0 is the
/// reserved empty entry every zero-length array aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayEntry {
    /// Offset into the array payload section.
    pub offset: u32,
    pub count: u32,
    /// Ref of the array type descriptor, not of the element.
    pub type_ref: u32,
}

impl ArrayEntry {
    pub const WIRE_LEN: usize = 12;

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            offset: cur.read_u32_le()?,
            count: cur.read_u32_le()?,
            type_ref: cur.read_u32_le()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.type_ref.to_le_bytes());
    }
}

/// One entry of the legacy boxed-value table (8 bytes on wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxedEntry {
    /// Offset into the boxed payload section.
    pub offset: u32,
    pub type_ref: u16,
    pub flags: TypeFlags,
}

impl BoxedEntry {
    pub const WIRE_LEN: usize = 8;

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            offset: cur.read_u32_le()?,
            type_ref: cur.read_u16_le()?,
            flags: TypeFlags::from_bits(cur.read_u16_le()?),
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.type_ref.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
    }
}

/// Import table record: file guid then instance guid (32 bytes on wire).
pub fn read_import(cur: &mut Cursor<'_>) -> Result<ImportRef> {
    let file_guid = Guid::read(cur)?;
    let instance_guid = Guid::read(cur)?;
    Ok(ImportRef::new(file_guid, instance_guid))
}

pub fn write_import(out: &mut Vec<u8>, import: &ImportRef) {
    out.extend_from_slice(import.file_guid.as_bytes());
    out.extend_from_slice(import.instance_guid.as_bytes());
}
