// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flat partition header: 56 bytes in the original sub-version, 64 with the
//! boxed-value extension. Field order is wire contract.

use crate::config::{
    PartitionVersion, PARTITION_HEADER_LEN, PARTITION_HEADER_LEN_BOXED, PARTITION_MAGIC,
    PARTITION_MAGIC_BOXED,
};
use crate::core::{Cursor, CursorMut, Guid};
use crate::error::{Error, Result};

/// Decoded partition header. Counts describe the descriptor tables and
/// sections that follow. `instance_count` counts instance runs, not objects;
/// `exported_count` counts objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionHeader {
    pub magic: u32,
    /// Absolute offset of the string table.
    pub strings_offset: u32,
    /// Bytes from `strings_offset` to the end of the file.
    pub strings_and_data_len: u32,
    pub import_count: u32,
    pub instance_count: u16,
    pub exported_count: u16,
    /// Distinct instance types (run type refs deduplicated).
    pub unique_type_count: u16,
    pub type_desc_count: u16,
    pub field_desc_count: u16,
    pub type_names_len: u16,
    /// String table bytes, zero-padded to the section alignment.
    pub strings_len: u32,
    pub array_count: u32,
    /// Instance data bytes, padded to the section alignment.
    pub data_len: u32,
    pub file_guid: Guid,
    /// Boxed-value table entry count; zero under the original magic.
    pub boxed_count: u32,
    /// Absolute offset of the boxed payload section; zero under the original
    /// magic.
    pub boxed_offset: u32,
}

impl PartitionHeader {
    pub fn version(&self) -> Result<PartitionVersion> {
        match self.magic {
            PARTITION_MAGIC => Ok(PartitionVersion::Original),
            PARTITION_MAGIC_BOXED => Ok(PartitionVersion::BoxedValues),
            other => Err(Error::corrupt(
                0,
                format!("unknown partition magic {other:#010x}"),
            )),
        }
    }

    /// Header length on wire for this magic.
    pub fn wire_len(&self) -> usize {
        if self.magic == PARTITION_MAGIC_BOXED {
            PARTITION_HEADER_LEN_BOXED
        } else {
            PARTITION_HEADER_LEN
        }
    }

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        let magic = cur.read_u32_le()?;
        if magic != PARTITION_MAGIC && magic != PARTITION_MAGIC_BOXED {
            return Err(Error::corrupt(
                0,
                format!("unknown partition magic {magic:#010x}"),
            ));
        }
        let strings_offset = cur.read_u32_le()?;
        let strings_and_data_len = cur.read_u32_le()?;
        let import_count = cur.read_u32_le()?;
        let instance_count = cur.read_u16_le()?;
        let exported_count = cur.read_u16_le()?;
        let unique_type_count = cur.read_u16_le()?;
        let type_desc_count = cur.read_u16_le()?;
        let field_desc_count = cur.read_u16_le()?;
        let type_names_len = cur.read_u16_le()?;
        let strings_len = cur.read_u32_le()?;
        let array_count = cur.read_u32_le()?;
        let data_len = cur.read_u32_le()?;
        let file_guid = Guid::read(cur)?;
        let (boxed_count, boxed_offset) = if magic == PARTITION_MAGIC_BOXED {
            (cur.read_u32_le()?, cur.read_u32_le()?)
        } else {
            (0, 0)
        };
        Ok(Self {
            magic,
            strings_offset,
            strings_and_data_len,
            import_count,
            instance_count,
            exported_count,
            unique_type_count,
            type_desc_count,
            field_desc_count,
            type_names_len,
            strings_len,
            array_count,
            data_len,
            file_guid,
            boxed_count,
            boxed_offset,
        })
    }

    /// Patch the header into the space reserved at the start of the file.
    pub(crate) fn write(&self, cur: &mut CursorMut<'_>) -> Result<()> {
        cur.write_u32_le(self.magic)?;
        cur.write_u32_le(self.strings_offset)?;
        cur.write_u32_le(self.strings_and_data_len)?;
        cur.write_u32_le(self.import_count)?;
        cur.write_u16_le(self.instance_count)?;
        cur.write_u16_le(self.exported_count)?;
        cur.write_u16_le(self.unique_type_count)?;
        cur.write_u16_le(self.type_desc_count)?;
        cur.write_u16_le(self.field_desc_count)?;
        cur.write_u16_le(self.type_names_len)?;
        cur.write_u32_le(self.strings_len)?;
        cur.write_u32_le(self.array_count)?;
        cur.write_u32_le(self.data_len)?;
        cur.write_bytes(self.file_guid.as_bytes())?;
        if self.magic == PARTITION_MAGIC_BOXED {
            cur.write_u32_le(self.boxed_count)?;
            cur.write_u32_le(self.boxed_offset)?;
        }
        Ok(())
    }
}
