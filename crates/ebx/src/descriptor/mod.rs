// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire descriptor tables: flags, fixed records, resolution and the shared
//! table.

pub mod flags;
pub(crate) mod resolver;
pub mod shared;
pub(crate) mod table_builder;
pub mod wire;

pub use flags::{TypeCategory, TypeCode, TypeFlags};
pub use shared::SharedTypeDescriptors;
pub use wire::{FieldDescriptor, TypeDescriptor};

pub(crate) use resolver::{DescriptorResolver, ResolvedType};
pub(crate) use table_builder::{kind_flags, kind_wire_name, TypeTable, TypeTableBuilder};
pub(crate) use wire::{read_import, write_import, ArrayEntry, BoxedEntry};
