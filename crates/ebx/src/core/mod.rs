// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Low-level building blocks: bounds-checked cursors, 16-byte identities,
//! the engine name hash, and the deduplicating string table.

pub mod cursor;
pub mod guid;
pub mod hash;
pub mod strings;

pub use cursor::{Cursor, CursorMut};
pub use guid::Guid;
pub use hash::name_hash;

/// Round `value` up to the next multiple of `alignment` (power of two).
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Zero-pad `buf` until its length is a multiple of `alignment`.
pub(crate) fn pad_to(buf: &mut Vec<u8>, alignment: usize) {
    let target = align_up(buf.len(), alignment);
    buf.resize(target, 0);
}
