// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The RIFF container variant: an `EBXD` data chunk of self-relative
//! sections, an `EFIX` chunk of relocation lists, and an optional `EBXX`
//! chunk of content hashes. Type descriptors live outside the file in a
//! shared table.

pub mod chunks;
pub mod fixup;
pub mod reader;
pub mod writer;

pub use reader::RiffReader;
pub use writer::RiffWriter;
