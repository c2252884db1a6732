// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The flat partition container: one little-endian header, inline descriptor
//! tables, then strings, instance data and out-of-line payload sections.

pub mod header;
pub mod reader;
pub mod writer;

pub use header::PartitionHeader;
pub use reader::PartitionReader;
pub use writer::PartitionWriter;
