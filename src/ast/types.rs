use std::fmt;

/// The closed sum of Lim types.
///
/// Compound types hold arena references, so a `Type` is `Copy` and
/// structural equality is plain `==`. Invariants (error-union sides must
/// differ and may not themselves be unions or arrays; slice elements may not
/// be arrays) are enforced by the analyzer, not by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type<'a> {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Str,
    Void,
    Array { len: usize, elem: &'a Type<'a> },
    Slice { elem: &'a Type<'a> },
    ErrorUnion { ok: &'a Type<'a>, err: &'a Type<'a> },
}

impl<'a> Type<'a> {
    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Type::U8 | Type::U16 | Type::U32 | Type::U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// 64-bit integer width, used to pick the induction variable type of
    /// range loops.
    pub fn is_wide_integer(&self) -> bool {
        matches!(self, Type::I64 | Type::U64)
    }
}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Void => write!(f, "void"),
            Type::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            Type::Slice { elem } => write!(f, "[]{}", elem),
            Type::ErrorUnion { ok, err } => write!(f, "{}!{}", ok, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_compares_through_references() {
        let i32a = Type::I32;
        let i32b = Type::I32;
        let arr_a = Type::Array { len: 3, elem: &i32a };
        let arr_b = Type::Array { len: 3, elem: &i32b };
        assert_eq!(arr_a, arr_b);
        assert_ne!(arr_a, Type::Array { len: 4, elem: &i32a });
    }

    #[test]
    fn display_spells_surface_syntax() {
        let i32t = Type::I32;
        let strt = Type::Str;
        assert_eq!(Type::Array { len: 3, elem: &i32t }.to_string(), "[3]i32");
        assert_eq!(Type::Slice { elem: &i32t }.to_string(), "[]i32");
        assert_eq!(Type::ErrorUnion { ok: &i32t, err: &strt }.to_string(), "i32!str");
    }

    #[test]
    fn numeric_classification() {
        assert!(Type::U8.is_integer());
        assert!(!Type::U8.is_signed_integer());
        assert!(Type::F32.is_float());
        assert!(!Type::Bool.is_numeric());
        assert!(Type::I64.is_wide_integer());
        assert!(!Type::I32.is_wide_integer());
    }
}
