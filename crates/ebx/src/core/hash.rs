// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine string hash for type and field names.

/// Hash a type or field name the way the asset pipeline does: seed 5381,
/// per byte `h = h * 33 ^ b` over the UTF-8 bytes.
pub fn name_hash(name: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in name.bytes() {
        hash = hash.wrapping_mul(33) ^ u32::from(byte);
    }
    hash
}
