// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packed type flags shared by both file variants.
//!
//! `flags = (kind << 5) | (category << 1)`, bit 0 reserved zero. The kind
//! codes are the engine's on-wire type tags; 0x01 and 0x05 are unassigned
//! and decode to an error.

/// On-wire type tag (5 bits inside [`TypeFlags`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Void = 0x00,
    Struct = 0x02,
    Class = 0x03,
    Array = 0x04,
    String = 0x06,
    CString = 0x07,
    Enum = 0x08,
    FileRef = 0x09,
    Boolean = 0x0A,
    Int8 = 0x0B,
    UInt8 = 0x0C,
    Int16 = 0x0D,
    UInt16 = 0x0E,
    Int32 = 0x0F,
    UInt32 = 0x10,
    Int64 = 0x11,
    UInt64 = 0x12,
    Float32 = 0x13,
    Float64 = 0x14,
    Guid = 0x15,
    Sha1 = 0x16,
    ResourceRef = 0x17,
    TypeRef = 0x18,
    BoxedValueRef = 0x19,
    Delegate = 0x1A,
}

impl TypeCode {
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0x00 => TypeCode::Void,
            0x02 => TypeCode::Struct,
            0x03 => TypeCode::Class,
            0x04 => TypeCode::Array,
            0x06 => TypeCode::String,
            0x07 => TypeCode::CString,
            0x08 => TypeCode::Enum,
            0x09 => TypeCode::FileRef,
            0x0A => TypeCode::Boolean,
            0x0B => TypeCode::Int8,
            0x0C => TypeCode::UInt8,
            0x0D => TypeCode::Int16,
            0x0E => TypeCode::UInt16,
            0x0F => TypeCode::Int32,
            0x10 => TypeCode::UInt32,
            0x11 => TypeCode::Int64,
            0x12 => TypeCode::UInt64,
            0x13 => TypeCode::Float32,
            0x14 => TypeCode::Float64,
            0x15 => TypeCode::Guid,
            0x16 => TypeCode::Sha1,
            0x17 => TypeCode::ResourceRef,
            0x18 => TypeCode::TypeRef,
            0x19 => TypeCode::BoxedValueRef,
            0x1A => TypeCode::Delegate,
            _ => return None,
        })
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Fixed in-image slot `(size, alignment)` for kinds with one, `None`
    /// for Void and Struct (struct layouts are computed from their fields).
    pub fn fixed_slot(self) -> Option<(u16, u8)> {
        Some(match self {
            TypeCode::Boolean | TypeCode::Int8 | TypeCode::UInt8 => (1, 1),
            TypeCode::Int16 | TypeCode::UInt16 => (2, 2),
            TypeCode::Int32 | TypeCode::UInt32 | TypeCode::Float32 | TypeCode::Enum => (4, 4),
            TypeCode::Int64
            | TypeCode::UInt64
            | TypeCode::Float64
            | TypeCode::ResourceRef => (8, 8),
            TypeCode::Guid => (16, 4),
            TypeCode::Sha1 => (20, 4),
            TypeCode::String => (32, 1),
            TypeCode::CString
            | TypeCode::FileRef
            | TypeCode::Class
            | TypeCode::Array
            | TypeCode::TypeRef
            | TypeCode::Delegate => (8, 8),
            TypeCode::BoxedValueRef => (16, 8),
            TypeCode::Void | TypeCode::Struct => return None,
        })
    }
}

/// Category nibble (4 bits inside [`TypeFlags`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    None = 0,
    Scalar = 1,
    Array = 2,
}

impl TypeCategory {
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => TypeCategory::None,
            1 => TypeCategory::Scalar,
            2 => TypeCategory::Array,
            _ => return None,
        })
    }
}

/// The packed u16 both descriptor kinds carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u16);

impl TypeFlags {
    pub fn new(code: TypeCode, category: TypeCategory) -> Self {
        Self(((code.bits() as u16) << 5) | ((category as u16) << 1))
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    /// `None` for the unassigned kind codes.
    pub fn code(self) -> Option<TypeCode> {
        TypeCode::from_bits(((self.0 >> 5) & 0x1F) as u8)
    }

    pub fn category(self) -> TypeCategory {
        TypeCategory::from_bits(((self.0 >> 1) & 0x0F) as u8).unwrap_or(TypeCategory::None)
    }

    pub fn is_array(self) -> bool {
        self.category() == TypeCategory::Array
    }
}
