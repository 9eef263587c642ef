//! Value coercion (spec.md §4.4.18 `cast`/`castIfNotSame`), grounded on
//! `codegen.cc`'s free `cast()` function.

use inkwell::builder::Builder;
use inkwell::types::BasicTypeEnum;
use inkwell::values::BasicValueEnum;

use crate::error::{CodegenError, CodegenResult};

fn builder_err(e: impl std::fmt::Display) -> CodegenError {
    CodegenError::Internal(format!("LLVM builder rejected cast: {e}"))
}

/// Unconditional coercion. Only called once the caller has already
/// established `val`'s LLVM type differs from `target` (see
/// `cast_if_needed`) — `castIfNotSame` is the entry point lowering hooks
/// actually call.
pub fn cast<'ctx>(
    builder: &Builder<'ctx>,
    line: usize,
    val: BasicValueEnum<'ctx>,
    target: BasicTypeEnum<'ctx>,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    use BasicTypeEnum as T;
    use BasicValueEnum::*;

    match (val, target) {
        (IntValue(v), T::FloatType(t)) => builder
            .build_signed_int_to_float(v, t, "castf")
            .map(Into::into)
            .map_err(builder_err),
        (FloatValue(v), T::IntType(t)) => builder
            .build_float_to_signed_int(v, t, "casti")
            .map(Into::into)
            .map_err(builder_err),
        (FloatValue(v), T::FloatType(t)) => builder
            .build_float_cast(v, t, "castfp")
            .map(Into::into)
            .map_err(builder_err),
        (IntValue(v), T::IntType(t)) => {
            if v.get_type().get_bit_width() > t.get_bit_width() {
                builder.build_int_truncate(v, t, "casttrunc")
            } else {
                builder.build_int_z_extend(v, t, "castzext")
            }
            .map(Into::into)
            .map_err(builder_err)
        }
        (PointerValue(v), T::IntType(t)) => builder
            .build_ptr_to_int(v, t, "castptrint")
            .map(Into::into)
            .map_err(builder_err),
        (IntValue(v), T::PointerType(t)) => builder
            .build_int_to_ptr(v, t, "castintptr")
            .map(Into::into)
            .map_err(builder_err),
        (PointerValue(v), T::PointerType(t)) => builder
            .build_pointer_cast(v, t, "castptr")
            .map(Into::into)
            .map_err(builder_err),
        (other, target) => Err(CodegenError::InvalidCast {
            line,
            from: format!("{:?}", other.get_type()),
            to: format!("{target:?}"),
        }),
    }
}

/// Coerces `val` to `target` only if it isn't already that type
/// (`castIfNotSame` in `codegen.cc`).
pub fn cast_if_needed<'ctx>(
    builder: &Builder<'ctx>,
    line: usize,
    val: BasicValueEnum<'ctx>,
    target: BasicTypeEnum<'ctx>,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    if val.get_type() == target {
        Ok(val)
    } else {
        cast(builder, line, val, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use inkwell::AddressSpace;
    use test_case::test_case;

    #[derive(Debug, Clone, Copy)]
    enum Kind {
        I8,
        I64,
        F32,
        F64,
        Ptr,
    }

    fn basic_type<'ctx>(context: &'ctx Context, kind: Kind) -> BasicTypeEnum<'ctx> {
        match kind {
            Kind::I8 => context.i8_type().into(),
            Kind::I64 => context.i64_type().into(),
            Kind::F32 => context.f32_type().into(),
            Kind::F64 => context.f64_type().into(),
            Kind::Ptr => context.ptr_type(AddressSpace::default()).into(),
        }
    }

    /// Builds a throwaway value of `kind`, using `builder` (already
    /// positioned inside a function) for the one kind — `Ptr` — that
    /// needs an instruction rather than a constant.
    fn sample_value<'ctx>(
        builder: &Builder<'ctx>,
        context: &'ctx Context,
        kind: Kind,
    ) -> BasicValueEnum<'ctx> {
        match kind {
            Kind::I8 => context.i8_type().const_int(1, false).into(),
            Kind::I64 => context.i64_type().const_int(1, false).into(),
            Kind::F32 => context.f32_type().const_float(1.0).into(),
            Kind::F64 => context.f64_type().const_float(1.0).into(),
            Kind::Ptr => builder
                .build_alloca(context.i8_type(), "p")
                .expect("alloca")
                .into(),
        }
    }

    /// Returns the module alongside the builder: the builder's position is
    /// only valid as long as the function/block it points into is alive,
    /// and `Module::drop` frees those, so the caller must keep both bound
    /// for the builder's entire use.
    fn positioned_builder(context: &Context) -> (inkwell::module::Module<'_>, Builder<'_>) {
        let module = context.create_module("cast_test");
        let fn_type = context.void_type().fn_type(&[], false);
        let function = module.add_function("scratch", fn_type, None);
        let block = context.append_basic_block(function, "entry");
        let builder = context.create_builder();
        builder.position_at_end(block);
        (module, builder)
    }

    /// Table-driven coverage of the coercion matrix (spec.md §4.4.18):
    /// every `(from, to)` pair `cast_if_needed` is actually asked to bridge
    /// during lowering.
    #[test_case(Kind::I64, Kind::F64; "int to float")]
    #[test_case(Kind::F64, Kind::I64; "float to int")]
    #[test_case(Kind::F32, Kind::F64; "float widening")]
    #[test_case(Kind::I64, Kind::I8; "int truncation")]
    #[test_case(Kind::I8, Kind::I64; "int zero extension")]
    #[test_case(Kind::Ptr, Kind::I64; "pointer to int")]
    #[test_case(Kind::I64, Kind::Ptr; "int to pointer")]
    fn coerces_between_kinds(from: Kind, to: Kind) {
        let context = Context::create();
        let (_module, builder) = positioned_builder(&context);

        let target = basic_type(&context, to);
        let value = sample_value(&builder, &context, from);
        let result = cast_if_needed(&builder, 0, value, target).expect("cast should succeed");
        assert_eq!(result.get_type(), target);
    }

    #[test]
    fn same_type_is_a_no_op() {
        let context = Context::create();
        let (_module, builder) = positioned_builder(&context);

        let target = basic_type(&context, Kind::I64);
        let value = sample_value(&builder, &context, Kind::I64);
        let result = cast_if_needed(&builder, 0, value, target).expect("no-op cast should succeed");
        assert_eq!(result.get_type(), target);
    }

    #[test]
    fn unsupported_pair_is_an_invalid_cast_error() {
        let context = Context::create();
        let (_module, builder) = positioned_builder(&context);

        // Structs aren't one of `cast`'s supported source/target kinds
        // (only int/float/pointer scalars are); a struct-typed value has
        // no entry in the match and must surface as `InvalidCast`, not
        // panic.
        let struct_ty = context.struct_type(&[context.i32_type().into()], false);
        let struct_val = struct_ty.const_zero();
        let result = cast(&builder, 7, struct_val.into(), basic_type(&context, Kind::I64));
        assert!(matches!(result, Err(CodegenError::InvalidCast { line: 7, .. })));
    }
}
