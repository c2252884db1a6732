// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-level value codec shared by both container variants.
//!
//! Scalar slots have a single little-endian layout everywhere. Everything
//! that crosses a section boundary (pointers, table strings, arrays, type
//! refs, boxed values) is container specific, so those reads and writes go
//! through the [`ValueSource`] and [`ValueSink`] traits the legacy partition
//! and RIFF codecs implement.

use std::collections::HashMap;

use crate::config::INLINE_STRING_LEN;
use crate::core::{name_hash, Cursor, Guid};
use crate::descriptor::{
    kind_flags, kind_wire_name, DescriptorResolver, FieldDescriptor, ResolvedType, TypeCategory,
    TypeCode, TypeFlags, TypeTable,
};
use crate::error::{Error, Result};
use crate::graph::{BoxedValue, ImportRef, PointerRef, StructValue, TypeRef, Value};
use crate::schema::{FieldKind, FieldTable, LayoutKind, TypeId, TypeSchema};

/// Shared state for one decode pass.
pub(crate) struct DecodeCtx<'a> {
    pub schema: &'a dyn TypeSchema,
    pub resolver: &'a DescriptorResolver<'a>,
}

/// A field's wire flags plus its resolved target type when the kind needs
/// one (structs, enums and arrays).
#[derive(Clone, Copy)]
pub(crate) struct FieldRef<'a> {
    pub flags: TypeFlags,
    pub rt: Option<ResolvedType<'a>>,
}

/// Build the [`FieldRef`] for a declared field, resolving the target type
/// for the kinds whose decode or layout depends on it.
pub(crate) fn field_ref<'a>(
    resolver: &DescriptorResolver<'a>,
    fd: &FieldDescriptor,
    owner: &ResolvedType<'a>,
) -> Result<FieldRef<'a>> {
    let rt = match fd.flags.code() {
        Some(TypeCode::Struct | TypeCode::Enum | TypeCode::Array) => {
            Some(resolver.resolve_type_from_field(fd, owner)?)
        }
        _ => None,
    };
    Ok(FieldRef {
        flags: fd.flags,
        rt,
    })
}

/// Variant-specific reads for values that reference other sections.
pub(crate) trait ValueSource {
    /// Decode a pointer slot at the cursor.
    fn read_pointer(&self, cur: &mut Cursor<'_>) -> Result<PointerRef>;
    /// Decode a table-string slot at the cursor.
    fn read_string(&self, cur: &mut Cursor<'_>) -> Result<String>;
    /// Decode an array slot: absolute element position and count.
    fn read_array(&self, cur: &mut Cursor<'_>) -> Result<(usize, u32)>;
    /// Decode a type-ref slot at the cursor.
    fn read_type_ref(&self, cur: &mut Cursor<'_>) -> Result<TypeRef>;
    /// Decode a boxed-value slot; `None` is the null box.
    fn read_boxed(&self, cur: &mut Cursor<'_>) -> Result<Option<BoxedWire>>;
}

/// A boxed-value reference lifted off the wire before payload decode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoxedWire {
    /// Payload flags; array category for boxed arrays.
    pub flags: TypeFlags,
    /// Element flags when the payload is an array.
    pub elem_flags: TypeFlags,
    /// How the payload type resolves.
    pub type_ref: BoxedTypeRef,
    pub payload: BoxedPayload,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BoxedTypeRef {
    /// Local type-table index, as the legacy partition records it.
    Local(u16),
    /// Shared-table name hash, as the RIFF type word records it. Zero for
    /// primitive payloads.
    NameHash(u32),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BoxedPayload {
    /// Absolute position of a non-array payload image.
    At(usize),
    /// Absolute element position and count of an array payload.
    Block { pos: usize, count: u32 },
}

/// Decode the declared fields of one struct or instance image starting at
/// `start`, filling `out` slots by field name hash.
///
/// A field the schema does not know is skipped, as is a field whose own type
/// is missing from the schema; both keep the rest of the object readable.
pub(crate) fn decode_fields<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    rt: &ResolvedType<'_>,
    start: usize,
    table: &FieldTable,
    out: &mut StructValue,
) -> Result<()> {
    for fd in ctx.resolver.fields_of(rt)? {
        if fd.flags.code() == Some(TypeCode::Void) {
            // synthetic super-type link; the base image shares this start
            let base = ctx.resolver.resolve_type_from_field(fd, rt)?;
            decode_fields(ctx, src, cur, &base, start, table, out)?;
            continue;
        }
        let Some((slot, _)) = table.slot_by_hash(fd.name_hash) else {
            log::debug!(
                "[FIELDS] {} has no field {:#010x}, skipping",
                out.type_id,
                fd.name_hash
            );
            continue;
        };
        cur.seek(start + fd.data_offset as usize)?;
        let fr = field_ref(ctx.resolver, fd, rt)?;
        match decode_value(ctx, src, cur, &fr) {
            Ok(value) => out.fields[slot] = value,
            Err(Error::MissingType { id }) => {
                log::debug!(
                    "[FIELDS] skipping field {:#010x} of {}: type {id} not in schema",
                    fd.name_hash,
                    out.type_id
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Decode one value slot at the cursor.
pub(crate) fn decode_value<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    fr: &FieldRef<'_>,
) -> Result<Value> {
    let code = fr
        .flags
        .code()
        .ok_or_else(|| Error::unsupported(fr.flags.bits(), "field decode"))?;
    Ok(match code {
        TypeCode::Void => {
            return Err(Error::corrupt(
                cur.offset(),
                "void field outside a super-type chain",
            ))
        }
        TypeCode::Boolean => Value::Bool(cur.read_u8()? != 0),
        TypeCode::Int8 => Value::I8(cur.read_i8()?),
        TypeCode::UInt8 => Value::U8(cur.read_u8()?),
        TypeCode::Int16 => Value::I16(cur.read_i16_le()?),
        TypeCode::UInt16 => Value::U16(cur.read_u16_le()?),
        TypeCode::Int32 => Value::I32(cur.read_i32_le()?),
        TypeCode::UInt32 => Value::U32(cur.read_u32_le()?),
        TypeCode::Int64 => Value::I64(cur.read_i64_le()?),
        TypeCode::UInt64 => Value::U64(cur.read_u64_le()?),
        TypeCode::Float32 => Value::F32(cur.read_f32_le()?),
        TypeCode::Float64 => Value::F64(cur.read_f64_le()?),
        TypeCode::Guid => Value::Guid(Guid::read(cur)?),
        TypeCode::Sha1 => {
            let mut digest = [0u8; 20];
            digest.copy_from_slice(cur.read_bytes(20)?);
            Value::Sha1(digest)
        }
        TypeCode::ResourceRef => Value::ResourceRef(cur.read_u64_le()?),
        TypeCode::String => Value::String(read_inline_string(cur)?),
        TypeCode::CString => Value::CString(src.read_string(cur)?),
        TypeCode::FileRef => Value::FileRef(src.read_string(cur)?),
        TypeCode::Class => Value::Pointer(src.read_pointer(cur)?),
        TypeCode::TypeRef | TypeCode::Delegate => Value::TypeRef(src.read_type_ref(cur)?),
        TypeCode::Enum => decode_enum(ctx, cur, fr)?,
        TypeCode::Struct => decode_struct(ctx, src, cur, fr)?,
        TypeCode::Array => decode_array(ctx, src, cur, fr)?,
        TypeCode::BoxedValueRef => match src.read_boxed(cur)? {
            Some(wire) => decode_boxed(ctx, src, cur, wire)?,
            None => Value::BoxedValue(None),
        },
    })
}

fn decode_enum(ctx: &DecodeCtx<'_>, cur: &mut Cursor<'_>, fr: &FieldRef<'_>) -> Result<Value> {
    let raw = cur.read_i32_le()?;
    let rt = fr
        .rt
        .as_ref()
        .ok_or_else(|| Error::corrupt(cur.offset(), "enum field without a type target"))?;
    let name = match ctx.schema.resolve(&TypeId::NameHash(rt.desc.name_hash)) {
        Some(layout) => match layout.member_by_value(raw) {
            Some(member) => member.name.to_string(),
            None => {
                log::debug!("[FIELDS] enum {} has no member for {raw}", layout.name);
                String::new()
            }
        },
        None => {
            log::debug!(
                "[FIELDS] enum type {:#010x} not in schema",
                rt.desc.name_hash
            );
            String::new()
        }
    };
    Ok(Value::Enum(raw, name))
}

fn decode_struct<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    fr: &FieldRef<'_>,
) -> Result<Value> {
    let rt = fr
        .rt
        .as_ref()
        .ok_or_else(|| Error::corrupt(cur.offset(), "struct field without a type target"))?;
    let start = cur.offset();
    Ok(Value::Struct(decode_struct_at(ctx, src, cur, rt, start)?))
}

/// Decode a struct image of descriptor type `rt` at `start`. A type the
/// schema does not know surfaces as [`Error::MissingType`] so the owning
/// field can be skipped.
pub(crate) fn decode_struct_at<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    rt: &ResolvedType<'_>,
    start: usize,
) -> Result<StructValue> {
    let hash_id = TypeId::NameHash(rt.desc.name_hash);
    let layout = ctx
        .schema
        .resolve(&hash_id)
        .ok_or_else(|| Error::missing_type(&hash_id))?;
    let canonical = TypeId::Name(layout.name.clone());
    let table = ctx
        .schema
        .field_table(&canonical)
        .ok_or_else(|| Error::missing_type(&canonical))?;
    let mut value = ctx
        .schema
        .instantiate(&canonical)
        .ok_or_else(|| Error::missing_type(&canonical))?;
    decode_fields(ctx, src, cur, rt, start, &table, &mut value)?;
    Ok(value)
}

fn decode_array<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    fr: &FieldRef<'_>,
) -> Result<Value> {
    let rt = fr
        .rt
        .as_ref()
        .ok_or_else(|| Error::corrupt(cur.offset(), "array field without a type target"))?;
    let (pos, count) = src.read_array(cur)?;
    if count == 0 {
        return Ok(Value::Array(Vec::new()));
    }
    let member = array_member(ctx.resolver, rt)?;
    Ok(Value::Array(decode_elements(
        ctx, src, cur, pos, count, &member,
    )?))
}

/// Element descriptor of an array type: field ref, image stride, alignment.
pub(crate) struct ArrayMember<'a> {
    pub fr: FieldRef<'a>,
    pub stride: usize,
    pub align: usize,
}

pub(crate) fn array_member<'a>(
    resolver: &DescriptorResolver<'a>,
    rt: &ResolvedType<'a>,
) -> Result<ArrayMember<'a>> {
    let fields = resolver.fields_of(rt)?;
    let member = fields.first().ok_or_else(|| {
        Error::corrupt(
            0,
            format!(
                "array type {:#010x} declares no member field",
                rt.desc.name_hash
            ),
        )
    })?;
    let fr = field_ref(resolver, member, rt)?;
    let (stride, align) = image_slot(&fr)?;
    Ok(ArrayMember { fr, stride, align })
}

/// In-image slot of a value of this kind. Struct kinds take the size of the
/// resolved descriptor; everything else has a fixed slot.
pub(crate) fn image_slot(fr: &FieldRef<'_>) -> Result<(usize, usize)> {
    let code = fr
        .flags
        .code()
        .ok_or_else(|| Error::unsupported(fr.flags.bits(), "value slot"))?;
    match code {
        TypeCode::Struct => {
            let rt = fr
                .rt
                .as_ref()
                .ok_or_else(|| Error::corrupt(0, "struct value without a type target"))?;
            Ok((rt.desc.size as usize, rt.desc.alignment.max(1) as usize))
        }
        TypeCode::Array => Err(Error::unsupported(fr.flags.bits(), "nested array element")),
        _ => {
            let (size, align) = code
                .fixed_slot()
                .ok_or_else(|| Error::unsupported(fr.flags.bits(), "value slot"))?;
            Ok((size as usize, align.max(1) as usize))
        }
    }
}

fn decode_elements<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    pos: usize,
    count: u32,
    member: &ArrayMember<'_>,
) -> Result<Vec<Value>> {
    let span = (count as usize)
        .checked_mul(member.stride)
        .ok_or_else(|| Error::corrupt(pos, "array extent overflows"))?;
    let end = pos
        .checked_add(span)
        .ok_or_else(|| Error::corrupt(pos, "array extent overflows"))?;
    if end > cur.offset() + cur.remaining() {
        return Err(Error::corrupt(
            pos,
            format!("array of {count} elements runs past the buffer"),
        ));
    }
    let mut elems = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let at = pos + i * member.stride;
        elems.push(cur.at(at, |c| decode_value(ctx, src, c, &member.fr))?);
    }
    Ok(elems)
}

fn decode_boxed<S: ValueSource>(
    ctx: &DecodeCtx<'_>,
    src: &S,
    cur: &mut Cursor<'_>,
    wire: BoxedWire,
) -> Result<Value> {
    if wire.flags.is_array() {
        let BoxedPayload::Block { pos, count } = wire.payload else {
            return Err(Error::corrupt(
                cur.offset(),
                "boxed array without an element block",
            ));
        };
        let member = match wire.type_ref {
            BoxedTypeRef::Local(index) => {
                let rt = ctx.resolver.resolve_type(index as usize)?;
                array_member(ctx.resolver, &rt)?
            }
            BoxedTypeRef::NameHash(hash) => {
                let rt = boxed_target(ctx, wire.elem_flags, hash)?;
                let fr = FieldRef {
                    flags: wire.elem_flags,
                    rt,
                };
                let (stride, align) = image_slot(&fr)?;
                ArrayMember { fr, stride, align }
            }
        };
        let kind = FieldKind::Array(Box::new(kind_of(ctx, &member.fr)?));
        let value = if count == 0 {
            Value::Array(Vec::new())
        } else {
            Value::Array(decode_elements(ctx, src, cur, pos, count, &member)?)
        };
        return Ok(Value::BoxedValue(Some(Box::new(BoxedValue::new(
            kind, value,
        )))));
    }

    let rt = match wire.type_ref {
        BoxedTypeRef::Local(index) => Some(ctx.resolver.resolve_type(index as usize)?),
        BoxedTypeRef::NameHash(hash) => boxed_target(ctx, wire.flags, hash)?,
    };
    let fr = FieldRef {
        flags: wire.flags,
        rt,
    };
    let kind = kind_of(ctx, &fr)?;
    let BoxedPayload::At(pos) = wire.payload else {
        return Err(Error::corrupt(
            cur.offset(),
            "boxed scalar with an element block",
        ));
    };
    let value = cur.at(pos, |c| decode_value(ctx, src, c, &fr))?;
    Ok(Value::BoxedValue(Some(Box::new(BoxedValue::new(
        kind, value,
    )))))
}

/// Resolve the shared-table target a RIFF boxed word names. Primitives carry
/// a zero hash and need none.
fn boxed_target<'a>(
    ctx: &DecodeCtx<'a>,
    flags: TypeFlags,
    hash: u32,
) -> Result<Option<ResolvedType<'a>>> {
    if hash != 0 {
        return Ok(Some(ctx.resolver.resolve_shared_named(hash)?));
    }
    match flags.code() {
        Some(TypeCode::Struct | TypeCode::Enum | TypeCode::Class) => Err(Error::corrupt(
            0,
            "boxed payload names no type but its kind needs one",
        )),
        _ => Ok(None),
    }
}

/// Schema kind of a boxed payload, recovered from wire flags and target.
fn kind_of(ctx: &DecodeCtx<'_>, fr: &FieldRef<'_>) -> Result<FieldKind> {
    let code = fr
        .flags
        .code()
        .ok_or_else(|| Error::unsupported(fr.flags.bits(), "boxed payload"))?;
    if let TypeCode::Struct | TypeCode::Enum | TypeCode::Class = code {
        let rt = fr
            .rt
            .as_ref()
            .ok_or_else(|| Error::corrupt(0, "boxed payload without a type target"))?;
        let hash_id = TypeId::NameHash(rt.desc.name_hash);
        let layout = ctx
            .schema
            .resolve(&hash_id)
            .ok_or_else(|| Error::missing_type(&hash_id))?;
        let id = TypeId::Name(layout.name.clone());
        return Ok(match code {
            TypeCode::Struct => FieldKind::Struct(id),
            TypeCode::Enum => FieldKind::Enum(id),
            _ => FieldKind::Pointer(id),
        });
    }
    // a scalar payload resolving to a named wrapper layout keeps that identity
    if let Some(rt) = fr.rt.as_ref() {
        if let Some(layout) = ctx.schema.resolve(&TypeId::NameHash(rt.desc.name_hash)) {
            if layout.kind == LayoutKind::PrimitiveWrapper {
                return Ok(FieldKind::Struct(TypeId::Name(layout.name.clone())));
            }
        }
    }
    Ok(match code {
        TypeCode::Boolean => FieldKind::Bool,
        TypeCode::Int8 => FieldKind::Int8,
        TypeCode::UInt8 => FieldKind::UInt8,
        TypeCode::Int16 => FieldKind::Int16,
        TypeCode::UInt16 => FieldKind::UInt16,
        TypeCode::Int32 => FieldKind::Int32,
        TypeCode::UInt32 => FieldKind::UInt32,
        TypeCode::Int64 => FieldKind::Int64,
        TypeCode::UInt64 => FieldKind::UInt64,
        TypeCode::Float32 => FieldKind::Float32,
        TypeCode::Float64 => FieldKind::Float64,
        TypeCode::Guid => FieldKind::Guid,
        TypeCode::Sha1 => FieldKind::Sha1,
        TypeCode::ResourceRef => FieldKind::ResourceRef,
        TypeCode::String => FieldKind::String,
        TypeCode::CString => FieldKind::CString,
        TypeCode::FileRef => FieldKind::FileRef,
        TypeCode::TypeRef => FieldKind::TypeRef,
        TypeCode::Delegate => FieldKind::Delegate,
        TypeCode::BoxedValueRef => FieldKind::BoxedValue,
        _ => return Err(Error::corrupt(0, "boxed payload flags carry no kind")),
    })
}

fn read_inline_string(cur: &mut Cursor<'_>) -> Result<String> {
    let bytes = cur.read_bytes(INLINE_STRING_LEN)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Shared state for one encode pass.
pub(crate) struct EncodeCtx<'a> {
    pub schema: &'a dyn TypeSchema,
    pub table: &'a TypeTable,
    pub resolver: &'a DescriptorResolver<'a>,
    /// Graph index to final file position; `None` marks dropped instances.
    pub order: &'a [Option<u32>],
    pub import_index: &'a HashMap<ImportRef, u32>,
}

/// Section a write lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dest {
    Data,
    Arrays,
    Boxed,
}

/// Variant-specific writes for values that reference other sections. Images
/// are pre-sized and zeroed; scalar bytes are patched in place.
pub(crate) trait ValueSink {
    fn buf(&mut self, dest: Dest) -> &mut Vec<u8>;
    fn write_pointer(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        ptr: &PointerRef,
    ) -> Result<()>;
    fn write_string(&mut self, dest: Dest, at: usize, value: &str) -> Result<()>;
    fn write_type_ref(&mut self, dest: Dest, at: usize, value: &TypeRef) -> Result<()>;
    fn write_resource_ref(&mut self, dest: Dest, at: usize, value: u64) -> Result<()>;
    fn write_array(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        rt: &ResolvedType<'_>,
        elems: &[Value],
    ) -> Result<()>;
    fn write_boxed(
        &mut self,
        ctx: &EncodeCtx<'_>,
        dest: Dest,
        at: usize,
        value: Option<&BoxedValue>,
    ) -> Result<()>;
}

/// Encode the declared fields of one struct or instance image starting at
/// byte `at` of the destination buffer.
pub(crate) fn encode_fields<S: ValueSink>(
    ctx: &EncodeCtx<'_>,
    sink: &mut S,
    dest: Dest,
    at: usize,
    rt: &ResolvedType<'_>,
    table: &FieldTable,
    value: &StructValue,
) -> Result<()> {
    for fd in ctx.resolver.fields_of(rt)? {
        if fd.flags.code() == Some(TypeCode::Void) {
            let base = ctx.resolver.resolve_type_from_field(fd, rt)?;
            encode_fields(ctx, sink, dest, at, &base, table, value)?;
            continue;
        }
        let Some((slot, _)) = table.slot_by_hash(fd.name_hash) else {
            return Err(Error::invalid_graph(format!(
                "{} lost field {:#010x} between layout and encode",
                value.type_id, fd.name_hash
            )));
        };
        let field_value = value.fields.get(slot).ok_or_else(|| {
            Error::invalid_graph(format!(
                "{} carries no value for field slot {slot}",
                value.type_id
            ))
        })?;
        let fr = field_ref(ctx.resolver, fd, rt)?;
        encode_value(ctx, sink, dest, at + fd.data_offset as usize, &fr, field_value)?;
    }
    Ok(())
}

/// Encode one value into its slot at byte `at` of the destination buffer.
pub(crate) fn encode_value<S: ValueSink>(
    ctx: &EncodeCtx<'_>,
    sink: &mut S,
    dest: Dest,
    at: usize,
    fr: &FieldRef<'_>,
    value: &Value,
) -> Result<()> {
    let code = fr
        .flags
        .code()
        .ok_or_else(|| Error::unsupported(fr.flags.bits(), "field encode"))?;
    match (code, value) {
        (TypeCode::Boolean, Value::Bool(v)) => put_at(sink.buf(dest), at, &[u8::from(*v)])?,
        (TypeCode::Int8, Value::I8(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::UInt8, Value::U8(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Int16, Value::I16(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::UInt16, Value::U16(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Int32, Value::I32(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::UInt32, Value::U32(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Int64, Value::I64(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::UInt64, Value::U64(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Float32, Value::F32(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Float64, Value::F64(v)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Guid, Value::Guid(v)) => put_at(sink.buf(dest), at, v.as_bytes())?,
        (TypeCode::Sha1, Value::Sha1(v)) => put_at(sink.buf(dest), at, v)?,
        (TypeCode::String, Value::String(v)) => put_inline_string(sink.buf(dest), at, v)?,
        (TypeCode::ResourceRef, Value::ResourceRef(v)) => {
            sink.write_resource_ref(dest, at, *v)?
        }
        (TypeCode::CString, Value::CString(v)) | (TypeCode::FileRef, Value::FileRef(v)) => {
            sink.write_string(dest, at, v)?
        }
        (TypeCode::Class, Value::Pointer(p)) => sink.write_pointer(ctx, dest, at, p)?,
        (TypeCode::TypeRef | TypeCode::Delegate, Value::TypeRef(t)) => {
            sink.write_type_ref(dest, at, t)?
        }
        (TypeCode::Enum, Value::Enum(v, _)) => put_at(sink.buf(dest), at, &v.to_le_bytes())?,
        (TypeCode::Struct, Value::Struct(sv)) => {
            let rt = fr
                .rt
                .as_ref()
                .ok_or_else(|| Error::corrupt(0, "struct field without a type target"))?;
            let hash_id = TypeId::NameHash(rt.desc.name_hash);
            let layout = ctx
                .schema
                .resolve(&hash_id)
                .ok_or_else(|| Error::missing_type(&hash_id))?;
            let canonical = TypeId::Name(layout.name.clone());
            let table = ctx
                .schema
                .field_table(&canonical)
                .ok_or_else(|| Error::missing_type(&canonical))?;
            encode_fields(ctx, sink, dest, at, rt, &table, sv)?
        }
        (TypeCode::Array, Value::Array(elems)) => {
            let rt = fr
                .rt
                .as_ref()
                .ok_or_else(|| Error::corrupt(0, "array field without a type target"))?;
            sink.write_array(ctx, dest, at, rt, elems)?
        }
        (TypeCode::BoxedValueRef, Value::BoxedValue(b)) => {
            sink.write_boxed(ctx, dest, at, b.as_deref())?
        }
        (TypeCode::Void, _) => {
            return Err(Error::corrupt(0, "void field outside a super-type chain"))
        }
        (code, value) => {
            return Err(Error::invalid_graph(format!(
                "field expects {code:?} but the value is {}",
                value.kind_name()
            )))
        }
    }
    Ok(())
}

/// Patch bytes into a pre-sized image.
pub(crate) fn put_at(buf: &mut Vec<u8>, at: usize, bytes: &[u8]) -> Result<()> {
    let end = at
        .checked_add(bytes.len())
        .ok_or_else(|| Error::corrupt(at, "write offset overflows"))?;
    let Some(slot) = buf.get_mut(at..end) else {
        return Err(Error::corrupt(at, "write outside the reserved image"));
    };
    slot.copy_from_slice(bytes);
    Ok(())
}

/// Inline strings occupy a fixed 32-byte slot and must keep a terminator.
fn put_inline_string(buf: &mut Vec<u8>, at: usize, value: &str) -> Result<()> {
    let text = clamp_inline(value);
    if text.len() < value.len() {
        log::warn!(
            "[FIELDS] inline string of {} bytes truncated to {}",
            value.len(),
            text.len()
        );
    }
    let mut slot = [0u8; INLINE_STRING_LEN];
    slot[..text.len()].copy_from_slice(text.as_bytes());
    put_at(buf, at, &slot)
}

/// Longest prefix that fits an inline slot with its terminator, cut on a
/// char boundary.
fn clamp_inline(value: &str) -> &str {
    let max = INLINE_STRING_LEN - 1;
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Wire identity of a boxed payload: its flags, element flags for arrays,
/// the writer-table index of the payload type and the name hash the RIFF
/// type word carries.
pub(crate) struct BoxedInfo {
    pub flags: TypeFlags,
    pub elem_flags: TypeFlags,
    pub type_ref: u16,
    pub name_hash: u32,
}

pub(crate) fn boxed_info(ctx: &EncodeCtx<'_>, kind: &FieldKind) -> Result<BoxedInfo> {
    if matches!(kind, FieldKind::BoxedValue) {
        return Err(Error::unsupported(
            TypeFlags::new(TypeCode::BoxedValueRef, TypeCategory::Scalar).bits(),
            "boxed value nested in a boxed value",
        ));
    }
    let flags = kind_flags(ctx.schema, kind)?;
    let name = kind_wire_name(ctx.schema, kind)?;
    let hash = name_hash(&name);
    let type_ref = ctx.table.index_of(hash).ok_or_else(|| {
        Error::invalid_graph(format!("boxed payload type {name} missing from the type table"))
    })?;
    let (elem_flags, name_hash) = match kind {
        FieldKind::Array(elem) => {
            let elem_flags = kind_flags(ctx.schema, elem)?;
            let elem_hash = match elem.as_ref() {
                FieldKind::Enum(_) | FieldKind::Struct(_) | FieldKind::Pointer(_) => {
                    name_hash(&kind_wire_name(ctx.schema, elem)?)
                }
                _ => 0,
            };
            (elem_flags, elem_hash)
        }
        FieldKind::Enum(_) | FieldKind::Struct(_) | FieldKind::Pointer(_) => {
            (TypeFlags::default(), hash)
        }
        _ => (TypeFlags::default(), 0),
    };
    Ok(BoxedInfo {
        flags,
        elem_flags,
        type_ref,
        name_hash,
    })
}

/// Field ref for encoding a non-array boxed payload image.
pub(crate) fn boxed_payload_ref<'a>(
    ctx: &EncodeCtx<'a>,
    info: &BoxedInfo,
) -> Result<FieldRef<'a>> {
    let rt = match info.flags.code() {
        Some(TypeCode::Struct | TypeCode::Enum | TypeCode::Class) => {
            Some(ctx.resolver.resolve_type(info.type_ref as usize)?)
        }
        _ => None,
    };
    Ok(FieldRef {
        flags: info.flags,
        rt,
    })
}

/// Writer-table index of a resolved type, for array and boxed table entries.
pub(crate) fn local_type_ref(ctx: &EncodeCtx<'_>, rt: &ResolvedType<'_>) -> Result<u16> {
    ctx.table.index_of(rt.desc.name_hash).ok_or_else(|| {
        Error::corrupt(
            0,
            format!(
                "type {:#010x} missing from the writer table",
                rt.desc.name_hash
            ),
        )
    })
}
