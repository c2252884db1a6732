// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end write/read tests for the flat partition layout.
//!
//! Every test builds a graph against an in-memory schema, writes it with
//! [`PartitionWriter`] and checks what [`PartitionReader`] recovers. The
//! rewrite tests additionally pin the byte-level layout: a graph that came
//! out of a file must write back to the identical file.

use ebx::config::{PARTITION_MAGIC, PARTITION_MAGIC_BOXED};
use ebx::core::Cursor;
use ebx::partition::PartitionHeader;
use ebx::{
    BoxedValue, Error, FieldKind, Guid, ImportRef, Instance, ObjectGraph, PartitionReader,
    PartitionVersion, PartitionWriter, PointerRef, SchemaSet, StructValue, TypeId,
    TypeLayoutBuilder, TypeRef, TypeSchema, Value, WriteOptions,
};

/// Schema with one of everything: structs, enums, a primitive wrapper,
/// inheritance, pointers, arrays and boxed values.
fn demo_schema() -> SchemaSet {
    let mut schema = SchemaSet::new();
    schema
        .insert(
            TypeLayoutBuilder::structure("Vec3")
                .field("X", FieldKind::Float32)
                .field("Y", FieldKind::Float32)
                .field("Z", FieldKind::Float32)
                .build(),
        )
        .expect("Vec3");
    schema
        .insert(
            TypeLayoutBuilder::enumeration("Color")
                .member("Red", 0)
                .member("Green", 1)
                .member("Blue", 2)
                .build(),
        )
        .expect("Color");
    schema
        .insert(TypeLayoutBuilder::wrapper("ShaderParam", FieldKind::Float32).build())
        .expect("ShaderParam");
    schema
        .insert(
            TypeLayoutBuilder::class("RefData")
                .field("Label", FieldKind::CString)
                .field("Next", FieldKind::Pointer(TypeId::name("RefData")))
                .build(),
        )
        .expect("RefData");
    schema
        .insert(
            TypeLayoutBuilder::class("Asset")
                .field("Name", FieldKind::CString)
                .build(),
        )
        .expect("Asset");
    schema
        .insert(
            TypeLayoutBuilder::class("MeshAsset")
                .extends("Asset")
                .field("LodCount", FieldKind::Int32)
                .field("Origin", FieldKind::Struct(TypeId::name("Vec3")))
                .field("Tint", FieldKind::Enum(TypeId::name("Color")))
                .field("Intensity", FieldKind::Struct(TypeId::name("ShaderParam")))
                .build(),
        )
        .expect("MeshAsset");
    schema
        .insert(
            TypeLayoutBuilder::class("Holder")
                .field("Ints", FieldKind::Array(Box::new(FieldKind::Int32)))
                .field(
                    "Children",
                    FieldKind::Array(Box::new(FieldKind::Pointer(TypeId::name("RefData")))),
                )
                .field("Tags", FieldKind::Array(Box::new(FieldKind::CString)))
                .build(),
        )
        .expect("Holder");
    schema
        .insert(
            TypeLayoutBuilder::class("Blob")
                .field("Payload", FieldKind::BoxedValue)
                .field("Note", FieldKind::String)
                .build(),
        )
        .expect("Blob");
    schema
        .insert(
            TypeLayoutBuilder::class("Level")
                .field("Title", FieldKind::CString)
                .field("Source", FieldKind::FileRef)
                .field("Mesh", FieldKind::Pointer(TypeId::name("Asset")))
                .field("Stream", FieldKind::ResourceRef)
                .field("Kind", FieldKind::TypeRef)
                .field("Anchor", FieldKind::Guid)
                .field("Digest", FieldKind::Sha1)
                .build(),
        )
        .expect("Level");
    schema
}

fn blank(schema: &SchemaSet, name: &str) -> StructValue {
    schema
        .instantiate(&TypeId::name(name))
        .expect("type registered in demo schema")
}

fn set(schema: &SchemaSet, value: &mut StructValue, field: &str, v: Value) {
    let table = schema.field_table(&value.type_id).expect("field table");
    let (slot, _) = table.slot_by_name(field).expect("declared field");
    value.fields[slot] = v;
}

fn get<'a>(schema: &SchemaSet, value: &'a StructValue, field: &str) -> &'a Value {
    let table = schema.field_table(&value.type_id).expect("field table");
    let (slot, _) = table.slot_by_name(field).expect("declared field");
    &value.fields[slot]
}

fn roundtrip(schema: &SchemaSet, graph: &ObjectGraph) -> ObjectGraph {
    let bytes = PartitionWriter::new(schema).write(graph).expect("write");
    PartitionReader::new(schema).read(&bytes).expect("read")
}

fn header_of(bytes: &[u8]) -> PartitionHeader {
    PartitionHeader::read(&mut Cursor::new(bytes)).expect("header")
}

#[test]
fn test_scalar_fields_roundtrip() {
    let schema = demo_schema();
    let mut mesh = blank(&schema, "MeshAsset");
    set(&schema, &mut mesh, "Name", Value::CString("meshes/crate_01".into()));
    set(&schema, &mut mesh, "LodCount", Value::I32(4));
    let mut origin = blank(&schema, "Vec3");
    set(&schema, &mut origin, "X", Value::F32(1.0));
    set(&schema, &mut origin, "Y", Value::F32(-2.5));
    set(&schema, &mut origin, "Z", Value::F32(0.125));
    set(&schema, &mut mesh, "Origin", Value::Struct(origin));
    set(&schema, &mut mesh, "Tint", Value::Enum(2, "Blue".into()));
    set(&schema, &mut mesh, "Intensity", Value::F32(0.75));

    let mut graph = ObjectGraph::new(Guid::from_name("levels/crate_test"));
    let root_guid = Guid::from_name("levels/crate_test/mesh");
    graph.add_instance(Instance::exported(root_guid, mesh.clone()));

    let back = roundtrip(&schema, &graph);
    assert_eq!(back.len(), 1);
    assert_eq!(back.file_guid(), graph.file_guid());
    let inst = back.instance(0).expect("root survives");
    assert_eq!(inst.guid, Some(root_guid));
    assert_eq!(inst.value, mesh);
}

#[test]
fn test_references_and_internal_child_roundtrip() {
    let schema = demo_schema();
    let mut level = blank(&schema, "Level");
    set(&schema, &mut level, "Title", Value::CString("levels/yard".into()));
    set(&schema, &mut level, "Source", Value::FileRef("source/yard.dae".into()));
    set(&schema, &mut level, "Mesh", Value::Pointer(PointerRef::Internal(1)));
    set(&schema, &mut level, "Stream", Value::ResourceRef(0x0011_2233_4455_6677));
    set(
        &schema,
        &mut level,
        "Kind",
        Value::TypeRef(TypeRef::Named(ebx::core::name_hash("MeshAsset"))),
    );
    set(&schema, &mut level, "Anchor", Value::Guid(Guid::from_name("anchors/spawn")));
    set(&schema, &mut level, "Digest", Value::Sha1([0xAB; 20]));

    let mut mesh = blank(&schema, "MeshAsset");
    set(&schema, &mut mesh, "Name", Value::CString("meshes/yard_floor".into()));
    set(&schema, &mut mesh, "LodCount", Value::I32(2));

    let mut graph = ObjectGraph::new(Guid::from_name("levels/yard"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/yard/root"), level.clone()));
    graph.add_instance(Instance::internal(mesh.clone()));

    let back = roundtrip(&schema, &graph);
    assert_eq!(back.len(), 2);
    let root = back.instance(0).expect("root");
    assert_eq!(root.value, level);
    let child = back.instance(1).expect("internal child");
    assert_eq!(child.guid, None);
    assert_eq!(child.value, mesh);
    // the one pointer from the root is the only reference to the child
    assert_eq!(back.ref_count(1), 1);
    assert_eq!(back.ref_count(0), 0);
}

#[test]
fn test_two_imports_from_one_file() {
    let schema = demo_schema();
    let other_file = Guid::from_name("shared/props");
    let import_a = ImportRef::new(other_file, Guid::from_name("shared/props/barrel"));
    let import_b = ImportRef::new(other_file, Guid::from_name("shared/props/crate"));

    let mut holder = blank(&schema, "Holder");
    set(
        &schema,
        &mut holder,
        "Children",
        Value::Array(vec![
            Value::Pointer(PointerRef::External(import_a)),
            Value::Pointer(PointerRef::External(import_b)),
            Value::Pointer(PointerRef::External(import_a)),
        ]),
    );

    let mut graph = ObjectGraph::new(Guid::from_name("levels/import_test"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/import_test/holder"), holder.clone()));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");
    assert_eq!(header_of(&bytes).import_count, 2, "repeat import dedups");

    let back = PartitionReader::new(&schema).read(&bytes).expect("read");
    assert_eq!(back.dependencies(), &[import_a, import_b]);
    assert_eq!(back.dependency_files(), vec![other_file]);
    assert_eq!(back.instance(0).expect("root").value, holder);
}

#[test]
fn test_arrays_roundtrip() {
    let schema = demo_schema();
    let mut child = blank(&schema, "RefData");
    set(&schema, &mut child, "Label", Value::CString("ref/leaf".into()));

    let mut holder = blank(&schema, "Holder");
    set(
        &schema,
        &mut holder,
        "Ints",
        Value::Array(vec![Value::I32(-1), Value::I32(0), Value::I32(i32::MAX)]),
    );
    set(
        &schema,
        &mut holder,
        "Children",
        Value::Array(vec![
            Value::Pointer(PointerRef::Null),
            Value::Pointer(PointerRef::Internal(1)),
        ]),
    );
    set(
        &schema,
        &mut holder,
        "Tags",
        Value::Array(vec![
            Value::CString("a".into()),
            Value::CString("bb".into()),
            Value::CString("ccc".into()),
        ]),
    );

    let mut graph = ObjectGraph::new(Guid::from_name("levels/array_test"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/array_test/holder"), holder.clone()));
    graph.add_instance(Instance::internal(child.clone()));

    let back = roundtrip(&schema, &graph);
    assert_eq!(back.instance(0).expect("root").value, holder);
    assert_eq!(back.instance(1).expect("child").value, child);
    assert_eq!(back.ref_count(1), 1);
}

#[test]
fn test_empty_arrays_share_one_table_entry() {
    let schema = demo_schema();
    let holder = blank(&schema, "Holder");

    let mut graph = ObjectGraph::new(Guid::from_name("levels/empty_arrays"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/empty_arrays/holder"), holder.clone()));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");
    // three empty array fields all reference the single shared entry
    assert_eq!(header_of(&bytes).array_count, 1);

    let back = PartitionReader::new(&schema).read(&bytes).expect("read");
    let value = &back.instance(0).expect("root").value;
    assert_eq!(get(&schema, value, "Ints"), &Value::Array(vec![]));
    assert_eq!(get(&schema, value, "Children"), &Value::Array(vec![]));
    assert_eq!(get(&schema, value, "Tags"), &Value::Array(vec![]));
}

#[test]
fn test_boxed_values_roundtrip() {
    let schema = demo_schema();
    let mut origin = blank(&schema, "Vec3");
    set(&schema, &mut origin, "Y", Value::F32(9.5));
    let boxed_struct = BoxedValue::new(
        FieldKind::Struct(TypeId::name("Vec3")),
        Value::Struct(origin),
    );

    let mut blob = blank(&schema, "Blob");
    set(
        &schema,
        &mut blob,
        "Payload",
        Value::BoxedValue(Some(Box::new(boxed_struct))),
    );
    set(&schema, &mut blob, "Note", Value::String("inline note".into()));

    let mut scalar_blob = blank(&schema, "Blob");
    set(
        &schema,
        &mut scalar_blob,
        "Payload",
        Value::BoxedValue(Some(Box::new(BoxedValue::new(
            FieldKind::Int32,
            Value::I32(-77),
        )))),
    );

    let mut graph = ObjectGraph::new(Guid::from_name("levels/boxed_test"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/boxed_test/a"), blob.clone()));
    graph.add_instance(Instance::internal(scalar_blob.clone()));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");
    let header = header_of(&bytes);
    assert_eq!(header.magic, PARTITION_MAGIC_BOXED);
    assert_eq!(header.boxed_count, 2);
    assert_ne!(header.boxed_offset, 0);

    let back = PartitionReader::new(&schema).read(&bytes).expect("read");
    assert_eq!(back.instance(0).expect("a").value, blob);
    assert_eq!(back.instance(1).expect("b").value, scalar_blob);
}

#[test]
fn test_boxed_empty_array_is_not_null() {
    let schema = demo_schema();
    let mut with_empty = blank(&schema, "Blob");
    set(
        &schema,
        &mut with_empty,
        "Payload",
        Value::BoxedValue(Some(Box::new(BoxedValue::new(
            FieldKind::Array(Box::new(FieldKind::Int32)),
            Value::Array(vec![]),
        )))),
    );
    let with_null = blank(&schema, "Blob");
    assert_eq!(
        get(&schema, &with_null, "Payload"),
        &Value::BoxedValue(None)
    );

    let mut graph = ObjectGraph::new(Guid::from_name("levels/boxed_empty"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/boxed_empty/some"), with_empty.clone()));
    graph.add_instance(Instance::internal(with_null.clone()));

    let back = roundtrip(&schema, &graph);
    assert_eq!(
        back.instance(0).expect("some").value,
        with_empty,
        "a boxed empty array stays a boxed empty array"
    );
    assert_eq!(
        back.instance(1).expect("null").value,
        with_null,
        "a null boxed value stays null"
    );
}

#[test]
fn test_original_version_rejects_boxed_fields() {
    let schema = demo_schema();
    let blob = blank(&schema, "Blob");
    let mut graph = ObjectGraph::new(Guid::from_name("levels/original_boxed"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/original_boxed/a"), blob));

    let options = WriteOptions {
        version: PartitionVersion::Original,
        shared_descriptors: false,
    };
    let err = PartitionWriter::new(&schema)
        .with_options(options)
        .write(&graph)
        .expect_err("boxed slot has no encoding under the original layout");
    assert!(
        matches!(err, Error::UnsupportedFieldKind { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_original_version_roundtrip_without_boxed() {
    let schema = demo_schema();
    let mut mesh = blank(&schema, "MeshAsset");
    set(&schema, &mut mesh, "Name", Value::CString("meshes/old".into()));
    set(&schema, &mut mesh, "LodCount", Value::I32(1));

    let mut graph = ObjectGraph::new(Guid::from_name("levels/original"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/original/mesh"), mesh.clone()));

    let options = WriteOptions {
        version: PartitionVersion::Original,
        shared_descriptors: false,
    };
    let bytes = PartitionWriter::new(&schema)
        .with_options(options)
        .write(&graph)
        .expect("write");

    let header = header_of(&bytes);
    assert_eq!(header.magic, PARTITION_MAGIC);
    assert_eq!(header.version().expect("known magic"), PartitionVersion::Original);
    assert_eq!(header.wire_len(), 56);
    assert_eq!(header.boxed_count, 0);
    assert_eq!(header.boxed_offset, 0);

    let back = PartitionReader::new(&schema).read(&bytes).expect("read");
    assert_eq!(back.instance(0).expect("mesh").value, mesh);
}

#[test]
fn test_exported_order_is_root_then_guid_key() {
    let schema = demo_schema();
    let root_guid = Guid::from_bytes([0xF0; 16]);
    let low_guid = Guid::from_bytes([
        0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
    ]);
    let high_guid = Guid::from_bytes([
        0x20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2,
    ]);

    let mut graph = ObjectGraph::new(Guid::from_name("levels/order"));
    graph.add_instance(Instance::exported(root_guid, blank(&schema, "Asset")));
    // inserted high before low; the file orders them low before high
    graph.add_instance(Instance::exported(high_guid, blank(&schema, "Asset")));
    graph.add_instance(Instance::exported(low_guid, blank(&schema, "Asset")));

    let back = roundtrip(&schema, &graph);
    let guids: Vec<Option<Guid>> = back.instances().iter().map(|i| i.guid).collect();
    assert_eq!(
        guids,
        vec![Some(root_guid), Some(low_guid), Some(high_guid)],
        "root leads regardless of its key, the rest sort by guid key"
    );
}

#[test]
fn test_rewrite_is_byte_identical() {
    let schema = demo_schema();
    let mut level = blank(&schema, "Level");
    set(&schema, &mut level, "Title", Value::CString("levels/stable".into()));
    set(&schema, &mut level, "Mesh", Value::Pointer(PointerRef::Internal(2)));

    let mut mesh = blank(&schema, "MeshAsset");
    set(&schema, &mut mesh, "Name", Value::CString("meshes/stable".into()));

    let mut holder = blank(&schema, "Holder");
    set(
        &schema,
        &mut holder,
        "Ints",
        Value::Array(vec![Value::I32(3), Value::I32(1), Value::I32(4)]),
    );
    set(
        &schema,
        &mut holder,
        "Tags",
        Value::Array(vec![Value::CString("stable".into()), Value::CString("levels/stable".into())]),
    );

    let mut blob = blank(&schema, "Blob");
    set(
        &schema,
        &mut blob,
        "Payload",
        Value::BoxedValue(Some(Box::new(BoxedValue::new(
            FieldKind::Struct(TypeId::name("Vec3")),
            Value::Struct(blank(&schema, "Vec3")),
        )))),
    );

    let mut graph = ObjectGraph::new(Guid::from_name("levels/stable"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/stable/root"), level));
    graph.add_instance(Instance::exported(Guid::from_name("levels/stable/holder"), holder));
    graph.add_instance(Instance::internal(mesh));
    graph.add_instance(Instance::internal(blob));

    let writer = PartitionWriter::new(&schema);
    let first = writer.write(&graph).expect("first write");
    let reread = PartitionReader::new(&schema).read(&first).expect("read");
    let second = writer.write(&reread).expect("second write");
    assert_eq!(first, second, "write(read(write(g))) must reproduce the file");
}

#[test]
fn test_unknown_field_is_skipped_on_read() {
    let mut writer_schema = SchemaSet::new();
    writer_schema
        .insert(
            TypeLayoutBuilder::class("Widget")
                .field("A", FieldKind::Int32)
                .field("Extra", FieldKind::Float64)
                .field("B", FieldKind::CString)
                .build(),
        )
        .expect("writer Widget");
    let mut reader_schema = SchemaSet::new();
    reader_schema
        .insert(
            TypeLayoutBuilder::class("Widget")
                .field("A", FieldKind::Int32)
                .field("B", FieldKind::CString)
                .build(),
        )
        .expect("reader Widget");

    let mut widget = blank(&writer_schema, "Widget");
    set(&writer_schema, &mut widget, "A", Value::I32(7));
    set(&writer_schema, &mut widget, "Extra", Value::F64(3.25));
    set(&writer_schema, &mut widget, "B", Value::CString("kept".into()));

    let mut graph = ObjectGraph::new(Guid::from_name("levels/skew"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/skew/widget"), widget));

    let bytes = PartitionWriter::new(&writer_schema).write(&graph).expect("write");
    let back = PartitionReader::new(&reader_schema).read(&bytes).expect("read");
    let value = &back.instance(0).expect("widget").value;
    assert_eq!(get(&reader_schema, value, "A"), &Value::I32(7));
    assert_eq!(get(&reader_schema, value, "B"), &Value::CString("kept".into()));
}

#[test]
fn test_unknown_internal_instance_is_dropped_on_write() {
    let schema = demo_schema();
    let mut level = blank(&schema, "Level");
    set(&schema, &mut level, "Mesh", Value::Pointer(PointerRef::Internal(1)));

    let mut graph = ObjectGraph::new(Guid::from_name("levels/ghost"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/ghost/root"), level));
    graph.add_instance(Instance::internal(StructValue::new(TypeId::name("Ghost"))));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write drops the ghost");
    let back = PartitionReader::new(&schema).read(&bytes).expect("read");
    assert_eq!(back.len(), 1, "the unknown instance is gone");
    assert_eq!(
        get(&schema, &back.instance(0).expect("root").value, "Mesh"),
        &Value::Pointer(PointerRef::Null),
        "the pointer to it decays to null"
    );
}

#[test]
fn test_unknown_root_type_fails_the_write() {
    let schema = demo_schema();
    let mut graph = ObjectGraph::new(Guid::from_name("levels/ghost_root"));
    graph.add_instance(Instance::exported(
        Guid::from_name("levels/ghost_root/root"),
        StructValue::new(TypeId::name("Ghost")),
    ));

    let err = PartitionWriter::new(&schema)
        .write(&graph)
        .expect_err("the root is never droppable");
    assert!(matches!(err, Error::MissingType { .. }), "unexpected error: {err}");
}

#[test]
fn test_internal_root_is_rejected() {
    let schema = demo_schema();
    let mut graph = ObjectGraph::new(Guid::from_name("levels/anon_root"));
    graph.add_instance(Instance::internal(blank(&schema, "Asset")));

    let err = PartitionWriter::new(&schema)
        .write(&graph)
        .expect_err("the root must be exported");
    assert!(matches!(err, Error::InvalidGraph { .. }), "unexpected error: {err}");
}

#[test]
fn test_repeated_strings_intern_once() {
    let schema = demo_schema();
    let label = "shared/label/with/some/length";

    let mut one = ObjectGraph::new(Guid::from_name("levels/strings_one"));
    let mut asset = blank(&schema, "Asset");
    set(&schema, &mut asset, "Name", Value::CString(label.into()));
    one.add_instance(Instance::exported(Guid::from_name("levels/strings_one/a"), asset.clone()));

    let mut two = ObjectGraph::new(Guid::from_name("levels/strings_two"));
    two.add_instance(Instance::exported(Guid::from_name("levels/strings_two/a"), asset.clone()));
    two.add_instance(Instance::internal(asset));

    let bytes_one = PartitionWriter::new(&schema).write(&one).expect("write one");
    let bytes_two = PartitionWriter::new(&schema).write(&two).expect("write two");
    assert_eq!(
        header_of(&bytes_one).strings_len,
        header_of(&bytes_two).strings_len,
        "the second occurrence reuses the interned string"
    );
}

#[test]
fn test_sniffing_read_entry_point() {
    let schema = demo_schema();
    let mut asset = blank(&schema, "Asset");
    set(&schema, &mut asset, "Name", Value::CString("sniffed".into()));
    let mut graph = ObjectGraph::new(Guid::from_name("levels/sniff"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/sniff/a"), asset.clone()));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");
    let back = ebx::read(&bytes, &schema, None).expect("magic dispatch");
    assert_eq!(back.instance(0).expect("a").value, asset);

    let err = ebx::read(b"not an ebx file at all", &schema, None)
        .expect_err("garbage is rejected");
    assert!(matches!(err, Error::CorruptFormat { .. }), "unexpected error: {err}");
}

#[test]
fn test_file_roundtrip_through_disk() {
    let schema = demo_schema();
    let mut mesh = blank(&schema, "MeshAsset");
    set(&schema, &mut mesh, "Name", Value::CString("meshes/disk".into()));
    set(&schema, &mut mesh, "LodCount", Value::I32(3));
    let mut graph = ObjectGraph::new(Guid::from_name("levels/disk"));
    graph.add_instance(Instance::exported(Guid::from_name("levels/disk/mesh"), mesh.clone()));

    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("disk_test.ebx");
    std::fs::write(&path, &bytes).expect("write file");
    let loaded = std::fs::read(&path).expect("read file");
    assert_eq!(loaded, bytes);

    let back = PartitionReader::new(&schema).read(&loaded).expect("read");
    assert_eq!(back.instance(0).expect("mesh").value, mesh);
}

#[test]
fn test_truncated_file_is_corrupt_not_panic() {
    let schema = demo_schema();
    let mut graph = ObjectGraph::new(Guid::from_name("levels/trunc"));
    graph.add_instance(Instance::exported(
        Guid::from_name("levels/trunc/a"),
        blank(&schema, "MeshAsset"),
    ));
    let bytes = PartitionWriter::new(&schema).write(&graph).expect("write");

    // cut points land in the header, the descriptor tables and the data
    // section; the trailing section pad is the one region a cut can miss
    for len in [0, 4, 16, 40, bytes.len() / 2] {
        let err = PartitionReader::new(&schema)
            .read(&bytes[..len])
            .expect_err("truncated input must fail cleanly");
        assert!(
            matches!(err, Error::CorruptFormat { .. }),
            "truncation to {len} gave: {err}"
        );
    }
}
