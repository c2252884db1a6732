// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 16-byte identities: partition file guids, instance guids, type guids and
//! shared-descriptor keys all share this representation.

use std::fmt;

use md5::{Digest, Md5};

use crate::core::cursor::Cursor;
use crate::error::Result;

/// Opaque 16-byte identity, stored and written as raw bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub const fn zero() -> Self {
        Self([0u8; 16])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }

    /// Deterministic guid derived from a type name (MD5 of the UTF-8 bytes).
    ///
    /// Schemas without authored type guids use this so that shared-table keys
    /// and fixup type guids stay stable across runs. The high bit of byte 7
    /// is cleared: key-stub descriptor entries reserve it as their marker, so
    /// a derived key must never carry it.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Md5::new();
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        bytes[7] &= 0x7F;
        Self(bytes)
    }

    /// Big-endian value of the first 4 bytes.
    ///
    /// The partition writer orders exported instances by this key.
    pub fn sort_key(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(cur.read_bytes(16)?);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for Guid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_display_grouping() {
        let guid = Guid::from_bytes([
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef,
        ]);
        assert_eq!(
            format!("{}", guid),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
    }

    #[test]
    fn test_guid_sort_key_is_big_endian() {
        let guid = Guid::from_bytes([
            0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        assert_eq!(guid.sort_key(), 0x0000_0100);

        let smaller = Guid::from_bytes([
            0x00, 0x00, 0x00, 0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        assert!(smaller.sort_key() < guid.sort_key());
    }

    #[test]
    fn test_guid_from_name_deterministic() {
        let a = Guid::from_name("Vec3");
        let b = Guid::from_name("Vec3");
        let c = Guid::from_name("Vec4");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn test_guid_from_name_never_carries_the_stub_marker() {
        // raw md5 of both names has the high bit of byte 7 set
        for name in ["Vec3", "MeshAsset"] {
            assert_eq!(Guid::from_name(name).as_bytes()[7] & 0x80, 0, "{name}");
        }
    }

    #[test]
    fn test_guid_read_from_cursor() {
        let mut bytes = vec![0u8; 20];
        bytes[4] = 0x7F;
        let mut cur = Cursor::new(&bytes);
        cur.seek(4).expect("Seek should succeed");
        let guid = Guid::read(&mut cur).expect("Read guid should succeed");
        assert_eq!(guid.as_bytes()[0], 0x7F);
        assert_eq!(cur.offset(), 20);
    }

    #[test]
    fn test_guid_zero() {
        assert!(Guid::zero().is_zero());
        assert_eq!(Guid::zero().sort_key(), 0);
    }
}
