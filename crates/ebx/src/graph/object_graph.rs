// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The typed object arena both codec variants produce and consume.

use std::collections::HashSet;

use crate::core::Guid;
use crate::graph::value::{walk_value, ImportRef, PointerRef, StructValue, Value};
use crate::schema::TypeId;

/// One object in a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Identity guid; present iff the object is exported (addressable from
    /// other partitions).
    pub guid: Option<Guid>,
    pub value: StructValue,
}

impl Instance {
    pub fn exported(guid: Guid, value: StructValue) -> Self {
        Self {
            guid: Some(guid),
            value,
        }
    }

    pub fn internal(value: StructValue) -> Self {
        Self { guid: None, value }
    }

    pub fn type_id(&self) -> &TypeId {
        &self.value.type_id
    }

    pub fn is_exported(&self) -> bool {
        self.guid.is_some()
    }
}

/// A decoded partition: instance arena, reference counts and external
/// dependencies.
///
/// Instances reference each other by arena index, never by owned pointer, so
/// cyclic graphs need no interior mutability. Index 0 is the root instance.
/// Reference counts and the dependency list are derived state; call
/// [`recount_refs`](ObjectGraph::recount_refs) after mutating pointers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectGraph {
    file_guid: Guid,
    instances: Vec<Instance>,
    ref_counts: Vec<u32>,
    dependencies: Vec<ImportRef>,
}

impl ObjectGraph {
    pub fn new(file_guid: Guid) -> Self {
        Self {
            file_guid,
            instances: Vec::new(),
            ref_counts: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn file_guid(&self) -> Guid {
        self.file_guid
    }

    /// Append an instance and return its arena index.
    pub fn add_instance(&mut self, instance: Instance) -> u32 {
        let index = self.instances.len() as u32;
        self.instances.push(instance);
        self.ref_counts.push(0);
        index
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, index: u32) -> Option<&Instance> {
        self.instances.get(index as usize)
    }

    pub fn instance_mut(&mut self, index: u32) -> Option<&mut Instance> {
        self.instances.get_mut(index as usize)
    }

    /// The partition's primary object.
    pub fn root(&self) -> Option<&Instance> {
        self.instances.first()
    }

    /// Exported instances with their arena indices.
    pub fn exported(&self) -> impl Iterator<Item = (u32, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.is_exported())
            .map(|(i, inst)| (i as u32, inst))
    }

    pub fn exported_count(&self) -> usize {
        self.instances.iter().filter(|i| i.is_exported()).count()
    }

    /// Incoming internal pointer count for one instance.
    pub fn ref_count(&self, index: u32) -> u32 {
        self.ref_counts.get(index as usize).copied().unwrap_or(0)
    }

    /// Distinct `(file, instance)` pairs referenced by external pointers, in
    /// first-seen walk order.
    pub fn dependencies(&self) -> &[ImportRef] {
        &self.dependencies
    }

    /// Distinct partition files this graph depends on, in first-seen order.
    pub fn dependency_files(&self) -> Vec<Guid> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for dep in &self.dependencies {
            if seen.insert(dep.file_guid) {
                files.push(dep.file_guid);
            }
        }
        files
    }

    /// Rebuild reference counts and the dependency list by walking every
    /// pointer in the arena.
    pub fn recount_refs(&mut self) {
        let mut counts = vec![0u32; self.instances.len()];
        let mut deps = Vec::new();
        let mut seen: HashSet<ImportRef> = HashSet::new();
        for instance in &self.instances {
            for field in &instance.value.fields {
                walk_value(field, &mut |v| {
                    if let Value::Pointer(ptr) = v {
                        match ptr {
                            PointerRef::Internal(target) => {
                                if let Some(count) = counts.get_mut(*target as usize) {
                                    *count += 1;
                                }
                            }
                            PointerRef::External(import) => {
                                if seen.insert(*import) {
                                    deps.push(*import);
                                }
                            }
                            PointerRef::Null => {}
                        }
                    }
                });
            }
        }
        self.ref_counts = counts;
        self.dependencies = deps;
    }
}
