// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deduplicating string table used by both writers.
//!
//! String-like fields (CString, FileRef, type names) never embed their bytes
//! in the instance image. They reference a NUL-terminated entry in a shared
//! table; identical strings share one entry.

use std::collections::HashMap;

use crate::core::cursor::Cursor;
use crate::error::{Error, Result};

#[derive(Default)]
pub(crate) struct StringTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `s` within the table, appending a NUL-terminated entry the
    /// first time a string is seen.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&off) = self.offsets.get(s) {
            return off;
        }
        let off = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_owned(), off);
        off
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read the NUL-terminated string starting at `pos` without disturbing the
/// cursor position. Invalid UTF-8 is replaced, not rejected; string payloads
/// are diagnostic data, not structure.
pub(crate) fn read_cstring(cur: &mut Cursor<'_>, pos: usize) -> Result<String> {
    cur.at(pos, |c| {
        let mut out = Vec::new();
        loop {
            let byte = c.read_u8()?;
            if byte == 0 {
                break;
            }
            out.push(byte);
            if out.len() > u16::MAX as usize {
                return Err(Error::corrupt(pos, "unterminated string"));
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    })
}
