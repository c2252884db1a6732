// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory object model: values, instances and the partition arena.

pub mod object_graph;
pub mod value;

pub use object_graph::{Instance, ObjectGraph};
pub use value::{BoxedValue, ImportRef, PointerRef, StructValue, TypeRef, Value};

pub(crate) use value::walk_value;
