//! Implicit conversion lattice and the integer-promotion merge rule. See
//! `spec.md` §4.5, ported from `original_source/src/codegen/type.cc`.

use crate::hir::{BuiltinKind, Type};

/// What kind of machine code (if any) an implicit conversion needs, so the
/// code generator (`spec.md` §4.6) knows whether to emit a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// Same representation; no instruction needed.
    NoOp,
    /// Sign-extend from `from_width` to `to_width` bytes.
    SignExtend { from_width: u64, to_width: u64 },
    /// Zero-extend from `from_width` to `to_width` bytes.
    ZeroExtend { from_width: u64, to_width: u64 },
    /// `Array(T, n) -> Pointer(T)` decay: the array's address is already on
    /// the stack, so this needs no code either, but is tracked separately
    /// from `NoOp` since it does change the static type.
    ArrayDecay,
}

/// Can `from` be implicitly converted to `to`? Returns the conversion kind
/// if so. This never panics: an unsupported pair is a user-facing
/// `implicit conversion failed` diagnostic, not an internal error.
#[must_use]
pub fn implicit_conversion(from: &Type, to: &Type) -> Option<ConversionKind> {
    match (from, to) {
        (Type::Builtin(f), Type::Builtin(t)) => builtin_conversion(*f, *t),
        (Type::Pointer(fp), Type::Pointer(tp)) => {
            if fp == tp || matches!(**fp, Type::Builtin(BuiltinKind::Void)) {
                Some(ConversionKind::NoOp)
            } else {
                None
            }
        }
        (Type::Array(fe, fn_), Type::Array(te, tn)) => {
            if fe == te && fn_ == tn {
                Some(ConversionKind::NoOp)
            } else {
                None
            }
        }
        (Type::Array(fe, _), Type::Pointer(tp)) => {
            if fe.as_ref() == tp.as_ref() {
                Some(ConversionKind::ArrayDecay)
            } else {
                None
            }
        }
        (Type::Name(f), Type::Name(t)) => {
            if f == t {
                Some(ConversionKind::NoOp)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn builtin_conversion(from: BuiltinKind, to: BuiltinKind) -> Option<ConversionKind> {
    use BuiltinKind::{Bool, Char, ISize, Int64, UInt64, USize, Void};

    if from == to {
        return Some(ConversionKind::NoOp);
    }
    // `Void`, `Char`, `Bool` convert only to themselves.
    if matches!(from, Void | Char | Bool) || matches!(to, Void | Char | Bool) {
        return None;
    }
    // `USize <-> UInt64` and `ISize <-> Int64` are no-ops: same
    // representation, just a different static spelling.
    if matches!((from, to), (USize, UInt64) | (UInt64, USize) | (ISize, Int64) | (Int64, ISize)) {
        return Some(ConversionKind::NoOp);
    }

    if !from.is_integer() || !to.is_integer() {
        return None;
    }

    let (fw, tw) = (effective_width(from), effective_width(to));
    if tw < fw {
        return None;
    }
    if from.is_signed() == to.is_signed() {
        if fw == tw {
            return Some(ConversionKind::NoOp);
        }
        return Some(if from.is_signed() {
            ConversionKind::SignExtend { from_width: fw, to_width: tw }
        } else {
            ConversionKind::ZeroExtend { from_width: fw, to_width: tw }
        });
    }
    // Unsigned -> signed or signed -> unsigned widening: the spec picks the
    // extension by the *source*'s signedness ("`UIntK -> UIntK+` or larger
    // uses zero-extend; `IntK -> IntK+` or larger uses sign-extend").
    // Unsigned 32->64 is a no-op on x86-64 because a 32-bit write already
    // zeroes the upper 32 bits of the destination register.
    if fw == 4 && tw == 8 && !from.is_signed() {
        return Some(ConversionKind::NoOp);
    }
    if fw == tw {
        // Equal width, different sign: this is a same-width reinterpret,
        // which the spec treats as the equal-width no-op case.
        return Some(ConversionKind::NoOp);
    }
    Some(if from.is_signed() {
        ConversionKind::SignExtend { from_width: fw, to_width: tw }
    } else {
        ConversionKind::ZeroExtend { from_width: fw, to_width: tw }
    })
}

fn effective_width(kind: BuiltinKind) -> u64 {
    match kind {
        BuiltinKind::ISize | BuiltinKind::USize => 8,
        other => other.width(),
    }
}

/// The integer-promotion merge rule for binary arithmetic (`spec.md` §4.5):
/// given operand types `l` and `r`, pick the common type both sides widen
/// to before the operation.
#[must_use]
pub fn merge(l: &Type, r: &Type) -> Option<Type> {
    match (l, r) {
        (Type::Builtin(lb), Type::Builtin(rb)) if lb.is_integer() && rb.is_integer() => {
            let (lw, rw) = (effective_width(*lb), effective_width(*rb));
            Some(Type::Builtin(if lw != rw {
                if lw > rw { *lb } else { *rb }
            } else if lb.is_signed() != rb.is_signed() {
                // Equal width, differing sign: pick the unsigned one.
                if lb.is_signed() { *rb } else { *lb }
            } else {
                *lb
            }))
        }
        (Type::Pointer(lp), Type::Pointer(rp)) => {
            if lp == rp {
                Some(Type::Pointer(lp.clone()))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BuiltinKind::*;

    fn b(k: BuiltinKind) -> Type {
        Type::Builtin(k)
    }

    #[test]
    fn identical_types_are_noop() {
        assert_eq!(implicit_conversion(&b(Int32), &b(Int32)), Some(ConversionKind::NoOp));
    }

    #[test]
    fn widening_signed_is_sign_extend() {
        assert_eq!(
            implicit_conversion(&b(Int8), &b(Int32)),
            Some(ConversionKind::SignExtend { from_width: 1, to_width: 4 })
        );
    }

    #[test]
    fn widening_unsigned_is_zero_extend() {
        assert_eq!(
            implicit_conversion(&b(UInt8), &b(UInt32)),
            Some(ConversionKind::ZeroExtend { from_width: 1, to_width: 4 })
        );
    }

    #[test]
    fn narrowing_is_rejected() {
        assert_eq!(implicit_conversion(&b(Int32), &b(Int8)), None);
    }

    #[test]
    fn unsigned_32_to_64_is_noop() {
        assert_eq!(implicit_conversion(&b(UInt32), &b(UInt64)), Some(ConversionKind::NoOp));
    }

    #[test]
    fn usize_uint64_are_interchangeable_noop() {
        assert_eq!(implicit_conversion(&b(USize), &b(UInt64)), Some(ConversionKind::NoOp));
        assert_eq!(implicit_conversion(&b(UInt64), &b(USize)), Some(ConversionKind::NoOp));
    }

    #[test]
    fn bool_char_void_convert_only_to_self() {
        assert_eq!(implicit_conversion(&b(Bool), &b(Int32)), None);
        assert_eq!(implicit_conversion(&b(Char), &b(UInt8)), None);
        assert_eq!(implicit_conversion(&b(Bool), &b(Bool)), Some(ConversionKind::NoOp));
    }

    #[test]
    fn pointer_to_void_pointer_source_is_allowed() {
        let void_ptr = Type::Pointer(Box::new(b(Void)));
        let int_ptr = Type::Pointer(Box::new(b(Int32)));
        assert_eq!(implicit_conversion(&void_ptr, &int_ptr), Some(ConversionKind::NoOp));
    }

    #[test]
    fn mismatched_pointee_pointers_are_rejected() {
        let int_ptr = Type::Pointer(Box::new(b(Int32)));
        let char_ptr = Type::Pointer(Box::new(b(Char)));
        assert_eq!(implicit_conversion(&int_ptr, &char_ptr), None);
    }

    #[test]
    fn array_decays_to_matching_pointer() {
        let arr = Type::Array(Box::new(b(Int32)), 4);
        let ptr = Type::Pointer(Box::new(b(Int32)));
        assert_eq!(implicit_conversion(&arr, &ptr), Some(ConversionKind::ArrayDecay));
    }

    #[test]
    fn identical_arrays_are_noop() {
        let a = Type::Array(Box::new(b(Int32)), 4);
        let a2 = Type::Array(Box::new(b(Int32)), 4);
        assert_eq!(implicit_conversion(&a, &a2), Some(ConversionKind::NoOp));
    }

    #[test]
    fn different_length_arrays_are_rejected() {
        let a = Type::Array(Box::new(b(Int32)), 4);
        let a2 = Type::Array(Box::new(b(Int32)), 5);
        assert_eq!(implicit_conversion(&a, &a2), None);
    }

    #[test]
    fn merge_picks_wider_width() {
        assert_eq!(merge(&b(Int8), &b(Int32)), Some(b(Int32)));
    }

    #[test]
    fn merge_picks_unsigned_on_equal_width_sign_mismatch() {
        assert_eq!(merge(&b(Int32), &b(UInt32)), Some(b(UInt32)));
    }

    #[test]
    fn merge_of_non_integers_fails() {
        assert_eq!(merge(&b(Bool), &b(Int32)), None);
    }
}
