//! Value-type representation (spec.md §3 Type, §4.3 Type System).
//!
//! `Type` is a tagged union over `{void, i8..i64, u8..u64, f32, f64,
//! pointer-of(T), struct(name, [(field, T)])}`. Structs carry their
//! declared name and ordered field list; fields are looked up by name but
//! occupy deterministic positional slots in the lowered record.

use std::fmt;

/// A value type. Pointers and struct members recurse through `Box`/`Vec`
/// rather than the original's `shared_ptr` graph — there is no sharing
/// requirement beyond what `Clone` already gives a tree this small.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
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
    Pointer(Box<Type>),
    Struct {
        name: String,
        members: Vec<(String, Type)>,
    },
}

impl Type {
    pub fn pointer(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    pub fn strukt(name: impl Into<String>, members: Vec<(String, Type)>) -> Type {
        Type::Struct {
            name: name.into(),
            members,
        }
    }

    pub fn signed(bits: u32) -> Type {
        match bits {
            8 => Type::I8,
            16 => Type::I16,
            32 => Type::I32,
            _ => Type::I64,
        }
    }

    pub fn unsigned(bits: u32) -> Type {
        match bits {
            8 => Type::U8,
            16 => Type::U16,
            32 => Type::U32,
            _ => Type::U64,
        }
    }

    pub fn floating(bits: u32) -> Type {
        match bits {
            32 => Type::F32,
            _ => Type::F64,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::U8 | Type::U16 | Type::U32 | Type::U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct { .. })
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Unwraps nested pointers down to the underlying non-pointer type
    /// (spec.md §4.3: used when deciding whether a pointer chain bottoms
    /// out at a struct for `.`/`->` member access).
    pub fn base_type(&self) -> &Type {
        match self {
            Type::Pointer(inner) => inner.base_type(),
            other => other,
        }
    }

    /// Declared name for structs; the primitive spelling otherwise.
    pub fn name(&self) -> String {
        match self {
            Type::Struct { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }

    pub fn has_member(&self, field: &str) -> bool {
        match self {
            Type::Struct { members, .. } => members.iter().any(|(n, _)| n == field),
            _ => false,
        }
    }

    pub fn member_index(&self, field: &str) -> Option<usize> {
        match self {
            Type::Struct { members, .. } => members.iter().position(|(n, _)| n == field),
            _ => None,
        }
    }

    pub fn member_type(&self, field: &str) -> Option<&Type> {
        match self {
            Type::Struct { members, .. } => {
                members.iter().find(|(n, _)| n == field).map(|(_, t)| t)
            }
            _ => None,
        }
    }

    /// Bit width of a numeric literal lowered at this type; 0 for
    /// non-numeric types (spec.md §4.4.1 payload bit-width hint).
    pub fn number_bit_width(&self) -> u32 {
        match self {
            Type::U8 | Type::I8 => 8,
            Type::U16 | Type::I16 => 16,
            Type::U32 | Type::I32 | Type::F32 => 32,
            Type::U64 | Type::I64 | Type::F64 => 64,
            Type::Pointer(_) | Type::Struct { .. } | Type::Void => 0,
        }
    }

    /// Position in the widening order (spec.md §3):
    /// `void < u8 < i8 < u16 < i16 < u32 < i32 < u64 < i64 < f32 < f64 < pointer < struct`.
    fn ordinal(&self) -> u8 {
        match self {
            Type::Void => 0,
            Type::U8 => 1,
            Type::I8 => 2,
            Type::U16 => 3,
            Type::I16 => 4,
            Type::U32 => 5,
            Type::I32 => 6,
            Type::U64 => 7,
            Type::I64 => 8,
            Type::F32 => 9,
            Type::F64 => 10,
            Type::Pointer(_) => 11,
            Type::Struct { .. } => 12,
        }
    }

    /// Returns the operand with the larger ordinal, ties going to `lhs`
    /// (spec.md §4.3.3, grounded in `meta/type.cc`'s
    /// `lhs->tag >= rhs->tag ? lhs : rhs`).
    pub fn align(lhs: &Type, rhs: &Type) -> Type {
        if lhs.ordinal() >= rhs.ordinal() {
            lhs.clone()
        } else {
            rhs.clone()
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
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
            Type::Pointer(inner) => write!(f, "{inner}*"),
            Type::Struct { members, .. } => {
                write!(f, "struct {{")?;
                for (i, (name, ty)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Built-in primitive keyword table (spec.md §4.3.2: `fromTypeName` matches
/// these first, before falling back to the user-type registry).
fn primitive_from_name(name: &str) -> Option<Type> {
    Some(match name {
        "void" => Type::Void,
        "i8" => Type::I8,
        "i16" => Type::I16,
        "i32" => Type::I32,
        "i64" => Type::I64,
        "u8" => Type::U8,
        "u16" => Type::U16,
        "u32" => Type::U32,
        "u64" => Type::U64,
        "f32" => Type::F32,
        "f64" => Type::F64,
        _ => return None,
    })
}

/// User-defined struct type registry (spec.md §4.3.2, §4.5). The original
/// keeps this as a process-wide static reachable from `Type` itself; here
/// it is an owned value held by `GlobalContext` instead (see DESIGN.md,
/// "Type registry ownership") so that two compiler sessions in the same
/// process — e.g. two tests — never see each other's struct declarations.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    custom_types: std::collections::HashMap<String, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Struct declarations must register before any later use of `name`
    /// as a type (spec.md §4.3.2).
    pub fn register_custom_type(&mut self, name: impl Into<String>, ty: Type) {
        self.custom_types.insert(name.into(), ty);
    }

    pub fn get_custom_type(&self, name: &str) -> Option<&Type> {
        self.custom_types.get(name)
    }

    /// Primitive keyword set first, then the user-type registry
    /// (spec.md §4.3.2).
    pub fn from_type_name(&self, name: &str) -> Option<Type> {
        primitive_from_name(name).or_else(|| self.custom_types.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn primitive_round_trips_through_to_string_and_from_type_name() {
        let registry = TypeRegistry::new();
        for name in [
            "void", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64",
        ] {
            let ty = registry.from_type_name(name).expect("known primitive");
            assert_eq!(ty.to_string(), name);
        }
    }

    #[test]
    fn struct_registration_returns_same_metadata_on_lookup() {
        let mut registry = TypeRegistry::new();
        let s = Type::strukt("P", vec![("x".into(), Type::I32), ("y".into(), Type::I32)]);
        registry.register_custom_type("P", s.clone());
        assert_eq!(registry.from_type_name("P"), Some(s.clone()));
        assert_eq!(registry.from_type_name("P"), Some(s));
    }

    #[test]
    fn alignment_is_commutative_for_primitives() {
        let cases = [
            (Type::I32, Type::I64),
            (Type::U8, Type::F64),
            (Type::I32, Type::I32),
            (Type::Pointer(Box::new(Type::I8)), Type::U64),
        ];
        for (a, b) in cases {
            assert_eq!(Type::align(&a, &b), Type::align(&b, &a));
        }
    }

    #[test]
    fn alignment_widens_to_the_higher_ordinal_operand() {
        assert_eq!(Type::align(&Type::U8, &Type::I64), Type::I64);
        assert_eq!(Type::align(&Type::I32, &Type::F32), Type::F32);
        assert_eq!(
            Type::align(&Type::Pointer(Box::new(Type::I8)), &Type::I64),
            Type::Pointer(Box::new(Type::I8))
        );
    }

    /// Table-driven coverage of the full widening order (spec.md §3):
    /// `void < u8 < i8 < u16 < i16 < u32 < i32 < u64 < i64 < f32 < f64 <
    /// pointer < struct`.
    #[test_case(Type::Void, Type::U8, Type::U8)]
    #[test_case(Type::U8, Type::I8, Type::I8)]
    #[test_case(Type::I8, Type::U16, Type::U16)]
    #[test_case(Type::U16, Type::I16, Type::I16)]
    #[test_case(Type::I16, Type::U32, Type::U32)]
    #[test_case(Type::U32, Type::I32, Type::I32)]
    #[test_case(Type::I32, Type::U64, Type::U64)]
    #[test_case(Type::U64, Type::I64, Type::I64)]
    #[test_case(Type::I64, Type::F32, Type::F32)]
    #[test_case(Type::F32, Type::F64, Type::F64)]
    fn alignment_orders_adjacent_widening_steps(lower: Type, higher: Type, expected: Type) {
        assert_eq!(Type::align(&lower, &higher), expected);
        assert_eq!(Type::align(&higher, &lower), expected);
    }

    #[test]
    fn struct_member_lookup() {
        let s = Type::strukt("P", vec![("x".into(), Type::I32), ("y".into(), Type::I32)]);
        assert!(s.has_member("y"));
        assert_eq!(s.member_index("y"), Some(1));
        assert_eq!(s.member_type("x"), Some(&Type::I32));
        assert!(!s.has_member("z"));
    }

    #[test]
    fn base_type_unwraps_nested_pointers() {
        let t = Type::pointer(Type::pointer(Type::I32));
        assert_eq!(t.base_type(), &Type::I32);
    }
}
