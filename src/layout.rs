//! The structural size/offset/alignment engine. See `spec.md` §4.4, ported
//! from `original_source/src/codegen/type.cc`.

use hashbrown::HashSet;

use crate::error::CompileError;
use crate::hir::{BuiltinKind, Type};
use crate::span::Span;
use crate::symbol::Symbol;
use crate::tables::{LayoutFlags, StructFieldEntry, StructTable};

#[must_use]
pub fn round_up(n: u64, to: u64) -> u64 {
    if to == 0 {
        return n;
    }
    n.div_ceil(to) * to
}

/// Size in bytes. `Void` and unresolved struct names are errors, not
/// panics, because a user program can legally try to use `void` as an
/// object type (`spec.md` §4.4: "report error if used as object type").
pub fn size_of(ty: &Type, structs: &mut StructTable, span: Span) -> Result<u64, CompileError> {
    size_of_with(ty, structs, span, &mut HashSet::new())
}

/// Alignment in bytes. Primitive alignment equals size; pointer alignment
/// is 8; array alignment is element alignment; enum alignment is 8 (an enum
/// is encoded as a `u64`, so a `Name` that resolves to an enum rather than a
/// struct is handled by the caller — the layout engine only lays out
/// structs, since enums have no fields to offset).
pub fn align_of(ty: &Type, structs: &mut StructTable, span: Span) -> Result<u64, CompileError> {
    align_of_with(ty, structs, span, &mut HashSet::new())
}

/// As [`size_of`], but threading the same cycle-detection `computing` set
/// through nested struct-field recursion (a fresh set per call, as
/// [`size_of`] uses, would defeat cycle detection across nested fields).
fn size_of_with(
    ty: &Type,
    structs: &mut StructTable,
    span: Span,
    computing: &mut HashSet<Symbol>,
) -> Result<u64, CompileError> {
    Ok(match ty {
        Type::Builtin(BuiltinKind::Void) => {
            return Err(CompileError::VoidAsObjectType { span });
        }
        Type::Builtin(b) => b.width(),
        Type::Pointer(_) => 8,
        Type::Array(of, n) => size_of_with(of, structs, span, computing)? * n,
        Type::Name(name) => compute_struct_layout(*name, structs, span, computing)?.0,
    })
}

fn align_of_with(
    ty: &Type,
    structs: &mut StructTable,
    span: Span,
    computing: &mut HashSet<Symbol>,
) -> Result<u64, CompileError> {
    Ok(match ty {
        Type::Builtin(BuiltinKind::Void) => {
            return Err(CompileError::VoidAsObjectType { span });
        }
        Type::Builtin(b) => b.width(),
        Type::Pointer(_) => 8,
        Type::Array(of, _) => align_of_with(of, structs, span, computing)?,
        Type::Name(name) => compute_struct_layout(*name, structs, span, computing)?.1,
    })
}

/// Computes (and memoizes) `(size, align)` for the named struct, walking
/// fields in declaration order: each field's offset is its running total
/// aligned up to the field's own alignment, then the field's size is added;
/// the struct's final size is rounded up to the struct's alignment (the max
/// of its field alignments, minimum 1).
///
/// `computing` tracks structs currently being laid out on this call stack,
/// so a cyclic field chain (a struct that, without pointer indirection,
/// contains itself) is diagnosed rather than looping forever — this
/// resolves the Open Question in `spec.md` §9 about consistent memoization.
pub fn compute_struct_layout(
    name: Symbol,
    structs: &mut StructTable,
    span: Span,
    computing: &mut HashSet<Symbol>,
) -> Result<(u64, u64), CompileError> {
    if let Some(entry) = structs.get(name) {
        if entry.computed() {
            return Ok((entry.size, entry.align));
        }
    } else {
        return Err(CompileError::UnknownStruct { name: String::new(), span });
    }

    if !computing.insert(name) {
        // Fatal per `spec.md` §7 ("Internal errors (fatal): struct layout
        // cycle"); the type system is supposed to make this unreachable by
        // construction, so reaching it means the frontend let a recursive
        // aggregate through rather than rejecting it at parse/resolve time.
        panic!("internal error: cyclic struct layout (recursive aggregate without pointer indirection)");
    }

    let field_order = structs.query(name).field_order.clone();
    let mut offset = 0u64;
    let mut max_align = 1u64;
    let mut computed_fields: Vec<(Symbol, StructFieldEntry)> = Vec::with_capacity(field_order.len());

    for field_name in field_order {
        let field_ty = structs.query(name).field(field_name).unwrap().ty.clone();
        let falign = align_of_with(&field_ty, structs, span, computing)?;
        let fsize = size_of_with(&field_ty, structs, span, computing)?;
        offset = round_up(offset, falign);
        computed_fields.push((field_name, StructFieldEntry { ty: field_ty, offset }));
        offset += fsize;
        max_align = max_align.max(falign);
    }

    let size = round_up(offset, max_align);

    computing.remove(&name);

    let entry = structs.get_mut(name).expect("checked above");
    for (fname, fentry) in computed_fields {
        if let Some(slot) = entry.field_mut(fname) {
            slot.offset = fentry.offset;
        }
    }
    entry.size = size;
    entry.align = max_align;
    entry.flags |= LayoutFlags::SIZE_AND_OFFSETS | LayoutFlags::ALIGN;

    Ok((size, max_align))
}

/// Whether a type is "fat" — represented on the evaluation stack by its
/// address rather than its value, per `spec.md` §4.6 and the glossary entry
/// "Fat object". Only arrays and named *structs* can be fat; a `Name` that
/// resolves to an *enum* is a plain `u64` discriminant (`spec.md` §4.4:
/// "enum alignment 8 (encoded as `u64`)"), so it is non-fat like any other
/// builtin-sized value — this needs `enums` to tell the two `Name` cases
/// apart, since [`Type::Name`] alone does not carry struct-vs-enum.
#[must_use]
pub fn is_fat(ty: &Type, enums: &crate::tables::EnumTable) -> bool {
    match ty {
        Type::Array(..) => true,
        Type::Name(name) => !enums.exists(*name),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, Pos};
    use crate::symbol::Interner;

    fn span() -> Span {
        Span::new(FileId(0), Pos::new(0, 0), Pos::new(0, 0))
    }

    #[test]
    fn builtin_sizes_match_spec_table() {
        let mut structs = StructTable::new();
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Int8), &mut structs, span()).unwrap(), 1);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Bool), &mut structs, span()).unwrap(), 1);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Char), &mut structs, span()).unwrap(), 1);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Int16), &mut structs, span()).unwrap(), 2);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Int32), &mut structs, span()).unwrap(), 4);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::Int64), &mut structs, span()).unwrap(), 8);
        assert_eq!(size_of(&Type::Builtin(BuiltinKind::USize), &mut structs, span()).unwrap(), 8);
    }

    #[test]
    fn void_is_an_error_not_a_size() {
        let mut structs = StructTable::new();
        assert!(size_of(&Type::Builtin(BuiltinKind::Void), &mut structs, span()).is_err());
    }

    #[test]
    fn pointer_is_always_eight() {
        let mut structs = StructTable::new();
        let ty = Type::Pointer(Box::new(Type::Builtin(BuiltinKind::Int8)));
        assert_eq!(size_of(&ty, &mut structs, span()).unwrap(), 8);
        assert_eq!(align_of(&ty, &mut structs, span()).unwrap(), 8);
    }

    #[test]
    fn array_size_has_no_tail_padding() {
        let mut structs = StructTable::new();
        let ty = Type::Array(Box::new(Type::Builtin(BuiltinKind::Int32)), 3);
        assert_eq!(size_of(&ty, &mut structs, span()).unwrap(), 12);
    }

    #[test]
    fn struct_layout_aligns_fields_and_rounds_total_to_struct_align() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let name = interner.intern("P");

        let mut structs = StructTable::new();
        let mut entry = crate::tables::StructEntry::new(span());
        entry.field_order = vec![x, y];
        entry.fields.push((x, StructFieldEntry { ty: Type::Builtin(BuiltinKind::Int8), offset: 0 }));
        entry.fields.push((y, StructFieldEntry { ty: Type::Builtin(BuiltinKind::Int64), offset: 0 }));
        structs.insert(name, entry);

        let (size, align) = compute_struct_layout(name, &mut structs, span(), &mut HashSet::new()).unwrap();
        // x:i8 at 0 (size 1), y:i64 must align to 8 -> offset 8, size 8 -> total 16.
        assert_eq!(align, 8);
        assert_eq!(size, 16);
        let entry = structs.query(name);
        assert_eq!(entry.field(x).unwrap().offset, 0);
        assert_eq!(entry.field(y).unwrap().offset, 8);
    }

    #[test]
    fn structs_are_fat_but_enums_are_not() {
        let mut interner = Interner::new();
        let struct_name = interner.intern("P");
        let enum_name = interner.intern("Color");
        let mut enums = crate::tables::EnumTable::new();
        enums.insert(enum_name, span(), hashbrown::HashMap::new());

        assert!(is_fat(&Type::Name(struct_name), &enums));
        assert!(!is_fat(&Type::Name(enum_name), &enums));
        assert!(is_fat(&Type::Array(Box::new(Type::Builtin(BuiltinKind::Int32)), 4), &enums));
        assert!(!is_fat(&Type::Builtin(BuiltinKind::Int64), &enums));
        assert!(!is_fat(&Type::Pointer(Box::new(Type::Builtin(BuiltinKind::Int8))), &enums));
    }

    #[test]
    fn struct_layout_is_memoized() {
        let mut interner = Interner::new();
        let name = interner.intern("Empty");
        let mut structs = StructTable::new();
        structs.insert(name, crate::tables::StructEntry::new(span()));
        let first = compute_struct_layout(name, &mut structs, span(), &mut HashSet::new()).unwrap();
        assert_eq!(first, (0, 1));
        assert!(structs.query(name).computed());
        // Second call must hit the memoized fast path (no panic, same result).
        let second = compute_struct_layout(name, &mut structs, span(), &mut HashSet::new()).unwrap();
        assert_eq!(first, second);
    }
}
