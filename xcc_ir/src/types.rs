//! Meta-type → backend (LLVM) type mapping (spec.md §4.3.4, §4.3.5).
//!
//! `xcc_types::Type` has no notion of LLVM; this module is the backend
//! half of the type system, grounded on `meta/type.cc`'s `getLLVMType`
//! and `getDefault`.

use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::BasicValueEnum;
use inkwell::AddressSpace;
use xcc_types::Type;

use crate::error::{CodegenError, CodegenResult};

/// Maps a meta-type to its LLVM representation. `Type::Void` has no
/// value representation and must be handled by the caller before
/// reaching here (function return types are the only place void is
/// legal, and those go through `llvm_fn_type` instead).
pub fn llvm_type<'ctx>(context: &'ctx Context, ty: &Type) -> CodegenResult<BasicTypeEnum<'ctx>> {
    Ok(match ty {
        Type::Void => {
            return Err(CodegenError::Internal(
                "void has no value-level LLVM type".to_string(),
            ))
        }
        Type::I8 | Type::U8 => context.i8_type().into(),
        Type::I16 | Type::U16 => context.i16_type().into(),
        Type::I32 | Type::U32 => context.i32_type().into(),
        Type::I64 | Type::U64 => context.i64_type().into(),
        Type::F32 => context.f32_type().into(),
        Type::F64 => context.f64_type().into(),
        // Opaque pointers (LLVM 15+): the pointee type carries no LLVM
        // representation of its own, only xcc_types::Type tracks it.
        Type::Pointer(_) => context.ptr_type(AddressSpace::default()).into(),
        Type::Struct { members, .. } => {
            let field_types = members
                .iter()
                .map(|(_, field_ty)| llvm_type(context, field_ty))
                .collect::<CodegenResult<Vec<_>>>()?;
            context.struct_type(&field_types, false).into()
        }
    })
}

/// Function type mapping, kept separate from `llvm_type` since `void` is
/// only meaningful as a return type (spec.md §4.4.13).
pub fn llvm_fn_type<'ctx>(
    context: &'ctx Context,
    return_type: &Type,
    param_types: &[BasicTypeEnum<'ctx>],
    is_variadic: bool,
) -> inkwell::types::FunctionType<'ctx> {
    let param_meta: Vec<_> = param_types.iter().map(|t| (*t).into()).collect();
    if return_type.is_void() {
        context.void_type().fn_type(&param_meta, is_variadic)
    } else {
        // infallible: non-void Type always has an llvm_type.
        let ret = llvm_type(context, return_type).expect("non-void type always maps to an LLVM type");
        ret.fn_type(&param_meta, is_variadic)
    }
}

/// Zero value for a type (spec.md §4.3.5). Structs get a field-wise
/// zero aggregate, matching `getDefault`'s per-member recursion.
pub fn default_value<'ctx>(llvm_ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
    match llvm_ty {
        BasicTypeEnum::IntType(t) => t.const_zero().into(),
        BasicTypeEnum::FloatType(t) => t.const_zero().into(),
        BasicTypeEnum::PointerType(t) => t.const_zero().into(),
        BasicTypeEnum::StructType(t) => t.const_zero().into(),
        BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
        BasicTypeEnum::VectorType(t) => t.const_zero().into(),
        BasicTypeEnum::ScalableVectorType(t) => t.const_zero().into(),
    }
}
