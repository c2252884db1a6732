// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec round-trip benchmarks
//!
//! Measures writer and reader throughput for both layouts with:
//! - Graph sizes (4, 32, 256 instances)
//! - Array-heavy payloads (256 and 4096 elements)
//!
//! Schema resolution is set up once per group; the timed path is the codec
//! alone.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box as bb;

use ebx::{
    FieldKind, Guid, Instance, ObjectGraph, PartitionReader, PartitionWriter, PointerRef,
    RiffReader, RiffWriter, SchemaSet, SharedTypeDescriptors, TypeId, TypeLayoutBuilder,
    TypeSchema, Value,
};

fn bench_schema() -> SchemaSet {
    let mut schema = SchemaSet::new();
    schema
        .insert(
            TypeLayoutBuilder::class("Node")
                .field("Id", FieldKind::Int32)
                .field("Weight", FieldKind::Float32)
                .field("Tag", FieldKind::CString)
                .field("Data", FieldKind::Array(Box::new(FieldKind::Int32)))
                .field("Peer", FieldKind::Pointer(TypeId::name("Node")))
                .build(),
        )
        .expect("Node layout");
    schema
}

/// A chain of `count` nodes, each pointing at the next, with `array_len`
/// payload integers per node.
fn build_graph(schema: &SchemaSet, count: u32, array_len: usize) -> ObjectGraph {
    let table = schema
        .field_table(&TypeId::name("Node"))
        .expect("Node table");
    let slot = |name: &str| table.slot_by_name(name).expect("declared field").0;

    let mut graph = ObjectGraph::new(Guid::from_name("bench/nodes"));
    for index in 0..count {
        let mut value = schema
            .instantiate(&TypeId::name("Node"))
            .expect("Node instantiates");
        value.fields[slot("Id")] = Value::I32(index as i32);
        value.fields[slot("Weight")] = Value::F32(index as f32 * 0.5);
        value.fields[slot("Tag")] = Value::CString(format!("bench/node/{index}"));
        value.fields[slot("Data")] = Value::Array(
            (0..array_len).map(|i| Value::I32(i as i32)).collect(),
        );
        if index + 1 < count {
            value.fields[slot("Peer")] = Value::Pointer(PointerRef::Internal(index + 1));
        }
        if index == 0 {
            graph.add_instance(Instance::exported(Guid::from_name("bench/nodes/root"), value));
        } else {
            graph.add_instance(Instance::internal(value));
        }
    }
    graph
}

fn bench_partition_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_write");
    let schema = bench_schema();

    for count in [4u32, 32, 256] {
        let graph = build_graph(&schema, count, 8);
        let writer = PartitionWriter::new(&schema);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _count| {
            b.iter(|| writer.write(bb(&graph)).expect("write should succeed"));
        });
    }

    group.finish();
}

fn bench_partition_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_read");
    let schema = bench_schema();

    for count in [4u32, 32, 256] {
        let graph = build_graph(&schema, count, 8);
        let bytes = PartitionWriter::new(&schema)
            .write(&graph)
            .expect("write should succeed");
        let reader = PartitionReader::new(&schema);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _count| {
            b.iter(|| reader.read(bb(&bytes)).expect("read should succeed"));
        });
    }

    group.finish();
}

fn bench_riff_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("riff_roundtrip");
    let schema = bench_schema();

    for count in [4u32, 32, 256] {
        let graph = build_graph(&schema, count, 8);
        let mut shared = SharedTypeDescriptors::new();
        shared.ingest(&schema, &graph).expect("ingest");
        let writer = RiffWriter::new(&schema, &shared);
        let reader = RiffReader::new(&schema, &shared);
        let bytes = writer.write(&graph).expect("write should succeed");

        group.bench_with_input(
            BenchmarkId::new("write", count),
            &count,
            |b, _count| {
                b.iter(|| writer.write(bb(&graph)).expect("write should succeed"));
            },
        );
        group.bench_with_input(BenchmarkId::new("read", count), &count, |b, _count| {
            b.iter(|| reader.read(bb(&bytes)).expect("read should succeed"));
        });
    }

    group.finish();
}

fn bench_array_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_heavy");
    let schema = bench_schema();

    for array_len in [256usize, 4096] {
        let graph = build_graph(&schema, 4, array_len);
        let writer = PartitionWriter::new(&schema);
        let bytes = writer.write(&graph).expect("write should succeed");
        let reader = PartitionReader::new(&schema);

        group.bench_with_input(
            BenchmarkId::new("write", array_len),
            &array_len,
            |b, _len| {
                b.iter(|| writer.write(bb(&graph)).expect("write should succeed"));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("read", array_len),
            &array_len,
            |b, _len| {
                b.iter(|| reader.read(bb(&bytes)).expect("read should succeed"));
            },
        );
    }

    group.finish();
}

criterion_group!(
    roundtrip_benches,
    bench_partition_write,
    bench_partition_read,
    bench_riff_roundtrip,
    bench_array_heavy
);
criterion_main!(roundtrip_benches);
