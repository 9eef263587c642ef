//! AST-to-IR lowering (spec.md §4.4.1 – §4.4.18), grounded on the
//! `generateValue`/`generateValueWithoutLoad`/`generateFunction` family in
//! `src/ast/*.cc`.
//!
//! The original dispatches through a virtual method per AST node class.
//! Since `xcc_parser::ast::Node` is one flat enum (see its module doc),
//! that dispatch becomes a `match` here instead — `lower_value` is the
//! `generateValue` equivalent, `lower_lvalue` is
//! `generateValueWithoutLoad`, and `lower_statement` is what a `Block`
//! calls per child statement.

use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::AddressSpace;
use std::rc::Rc;

use xcc_parser::ast::{
    AssignOp, BinaryOp, FnDecl, FnDef, MemberKind, Node, NumberLiteral, NumberTag, StructDef,
    TypeExpr, UnaryOp,
};
use xcc_types::Type;

use crate::binop;
use crate::cast::cast_if_needed;
use crate::context::{FunctionMeta, GlobalContext, ModuleContext, TypedValue};
use crate::error::{CodegenError, CodegenResult};
use crate::types::{default_value, llvm_type};

/// Resolves a parsed type expression to a meta-type (spec.md §4.3.2),
/// substituting `Self` with the struct currently being lowered, if any.
pub fn resolve_type(
    gctx: &GlobalContext,
    texpr: &TypeExpr,
    self_name: Option<&str>,
) -> CodegenResult<Type> {
    let resolved_name = if texpr.name == "Self" {
        self_name.ok_or_else(|| CodegenError::UnknownTypeName {
            line: 0,
            name: "Self".to_string(),
        })?
    } else {
        texpr.name.as_str()
    };
    let base = gctx
        .types()
        .from_type_name(resolved_name)
        .ok_or_else(|| CodegenError::UnknownTypeName {
            line: 0,
            name: resolved_name.to_string(),
        })?;
    Ok((0..texpr.pointer_depth).fold(base, |t, _| Type::pointer(t)))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn builder_err(e: impl std::fmt::Display) -> CodegenError {
    CodegenError::Internal(format!("LLVM builder rejected instruction: {e}"))
}

fn block_terminated<'ctx>(mctx: &ModuleContext<'ctx>) -> bool {
    mctx.builder
        .get_insert_block()
        .and_then(|b| b.get_terminator())
        .is_some()
}

// ---------------------------------------------------------------------
// Expression lowering ("generateValue")
// ---------------------------------------------------------------------

pub fn lower_value<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    node: &Node,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    match node {
        Node::Number(tag, lit) => lower_number(gctx, *tag, *lit),
        Node::String(contents) => lower_string(gctx, mctx, contents),
        Node::Identifier(_) | Node::Unary { op: UnaryOp::Deref, .. } | Node::Subscript { .. } | Node::MemberAccess { .. } => {
            let (ptr, ty) = lower_lvalue(gctx, mctx, node)?;
            let llvm_ty = llvm_type(gctx.llvm(), &ty)?;
            mctx.builder
                .build_load(llvm_ty, ptr, "loadtmp")
                .map_err(builder_err)
        }
        Node::Binary { op, lhs, rhs } => lower_binary(gctx, mctx, *op, lhs, rhs),
        Node::Unary { op: UnaryOp::Addr, rhs } => {
            if !rhs.is_lvalue_form() {
                return Err(CodegenError::NotAnLvalue { line: 0, construct: "&".to_string() });
            }
            let (ptr, _) = lower_lvalue(gctx, mctx, rhs)?;
            Ok(ptr.as_basic_value_enum())
        }
        Node::Unary { op: UnaryOp::Neg, rhs } => lower_neg(gctx, mctx, rhs),
        Node::Unary { op: UnaryOp::Not, rhs } => lower_not(gctx, mctx, rhs),
        Node::Call { callee, args } => lower_call(gctx, mctx, callee, args)?.ok_or_else(|| {
            CodegenError::Internal("call to a void function used as a value".to_string())
        }),
        Node::Cast { expr, ty } => lower_cast(gctx, mctx, expr, ty),
        Node::Assign { op, lhs, rhs } => lower_assign(gctx, mctx, *op, lhs, rhs),
        other => Err(CodegenError::Internal(format!(
            "{other:?} is not a value-producing expression"
        ))),
    }
}

/// `generateValueWithoutLoad`: returns the address of an lvalue plus its
/// meta-type, without reading through it.
fn lower_lvalue<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    node: &Node,
) -> CodegenResult<(PointerValue<'ctx>, Type)> {
    match node {
        Node::Identifier(name) => lower_identifier_lvalue(gctx, mctx, name),
        Node::Unary { op: UnaryOp::Deref, rhs } => {
            let value = lower_value(gctx, mctx, rhs)?;
            let ptr = value.into_pointer_value();
            let ty = infer_type(gctx, mctx, rhs)?;
            let pointee = ty.pointee().cloned().ok_or_else(|| CodegenError::SubscriptOnNonPointer {
                line: 0,
                found: ty.to_string(),
            })?;
            Ok((ptr, pointee))
        }
        Node::Subscript { base, index } => lower_subscript_lvalue(gctx, mctx, base, index),
        Node::MemberAccess { kind, lhs, name } => lower_member_lvalue(gctx, mctx, *kind, lhs, name),
        other => Err(CodegenError::NotAnLvalue {
            line: 0,
            construct: format!("{other:?}"),
        }),
    }
}

fn lower_identifier_lvalue<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    name: &str,
) -> CodegenResult<(PointerValue<'ctx>, Type)> {
    if let Some(local) = mctx.locals.get(name) {
        return Ok((local.ptr, local.ty.clone()));
    }
    if let Some(ty) = gctx.global_type(name) {
        let llvm_ty = llvm_type(gctx.llvm(), &ty)?;
        let global = match mctx.module.get_global(name) {
            Some(g) => g,
            None => {
                // An import, not a definition: the defining initializer lives
                // in whichever module first declared this global (normally
                // the global module). Leaving this a declaration (no
                // initializer) lets the JIT link it to that real storage
                // instead of shadowing it with a fresh zero-valued global
                // (spec.md §4.4.3: "re-imported ... via get-or-insert global").
                mctx.module.add_global(llvm_ty, Some(AddressSpace::default()), name)
            }
        };
        return Ok((global.as_pointer_value(), ty));
    }
    Err(CodegenError::UndefinedIdentifier { line: 0, name: name.to_string() })
}

fn lower_subscript_lvalue<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    base: &Node,
    index: &Node,
) -> CodegenResult<(PointerValue<'ctx>, Type)> {
    let base_ty = infer_type(gctx, mctx, base)?;
    let pointee = base_ty.pointee().cloned().ok_or_else(|| CodegenError::SubscriptOnNonPointer {
        line: 0,
        found: base_ty.to_string(),
    })?;
    let base_ptr = lower_value(gctx, mctx, base)?.into_pointer_value();
    let index_val = lower_value(gctx, mctx, index)?;
    if !index_val.is_int_value() {
        return Err(CodegenError::SubscriptOnNonPointer {
            line: 0,
            found: "non-integer index".to_string(),
        });
    }
    let elem_llvm_ty = llvm_type(gctx.llvm(), &pointee)?;
    let gep = unsafe {
        mctx.builder
            .build_gep(elem_llvm_ty, base_ptr, &[index_val.into_int_value()], "subtmp")
            .map_err(builder_err)?
    };
    Ok((gep, pointee))
}

fn lower_member_lvalue<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    kind: MemberKind,
    lhs: &Node,
    field: &str,
) -> CodegenResult<(PointerValue<'ctx>, Type)> {
    let lhs_ty = infer_type(gctx, mctx, lhs)?;
    let (struct_ptr, struct_ty) = match kind {
        // `a.b`: `a` must itself be an lvalue holding the struct in place.
        MemberKind::Value => {
            let (ptr, ty) = lower_lvalue(gctx, mctx, lhs)?;
            (ptr, ty)
        }
        // `a->b`: `a` is a pointer value; load it to get the struct address.
        MemberKind::Pointer => {
            let ptr_val = lower_value(gctx, mctx, lhs)?.into_pointer_value();
            let pointee = lhs_ty.pointee().cloned().ok_or_else(|| CodegenError::MemberAccessOnNonStruct {
                line: 0,
                found: lhs_ty.to_string(),
            })?;
            (ptr_val, pointee)
        }
    };
    if !struct_ty.is_struct() {
        return Err(CodegenError::MemberAccessOnNonStruct { line: 0, found: struct_ty.to_string() });
    }
    let index = struct_ty.member_index(field).ok_or_else(|| CodegenError::UnknownStructField {
        line: 0,
        struct_name: struct_ty.name(),
        field: field.to_string(),
    })?;
    let field_ty = struct_ty.member_type(field).expect("index just found above").clone();
    let struct_llvm_ty = llvm_type(gctx.llvm(), &struct_ty)?;
    let gep = mctx
        .builder
        .build_struct_gep(struct_llvm_ty, struct_ptr, index as u32, "memtmp")
        .map_err(|_| CodegenError::UnknownStructField {
            line: 0,
            struct_name: struct_ty.name(),
            field: field.to_string(),
        })?;
    Ok((gep, field_ty))
}

fn lower_number<'ctx>(
    gctx: &GlobalContext<'ctx>,
    tag: NumberTag,
    lit: NumberLiteral,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    // Numeric literals are always typed signed-64 / float-64 (spec.md
    // §4.4.1); a later `Cast` narrows them if the surrounding context
    // needs a smaller width.
    Ok(match (tag, lit) {
        (NumberTag::Integer, NumberLiteral::Integer(v)) => {
            gctx.llvm().i64_type().const_int(v as u64, true).as_basic_value_enum()
        }
        (NumberTag::Floating, NumberLiteral::Floating(v)) => {
            gctx.llvm().f64_type().const_float(v).as_basic_value_enum()
        }
        _ => {
            return Err(CodegenError::Internal(
                "number literal tag/payload mismatch".to_string(),
            ))
        }
    })
}

fn lower_string<'ctx>(
    gctx: &GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    contents: &str,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    // Each referencing module carries its own private defining constant
    // under the content-hash name, rather than importing a shared
    // definition from the perpetual global module (see DESIGN.md, "String
    // literal storage") — observably identical (same content -> same
    // name, single value), and avoids tying a function's own module to the
    // lifetime of a module it didn't define.
    let name = format!(".str.{:x}", fnv1a(contents.as_bytes()));
    let arr_ty = gctx.llvm().i8_type().array_type(contents.len() as u32 + 1);
    let global = match mctx.module.get_global(&name) {
        Some(g) => g,
        None => {
            let const_str = gctx.llvm().const_string(contents.as_bytes(), true);
            let g = mctx.module.add_global(arr_ty, None, &name);
            g.set_initializer(&const_str);
            g.set_constant(true);
            g.set_linkage(inkwell::module::Linkage::Private);
            g
        }
    };
    let zero = gctx.llvm().i32_type().const_zero();
    let gep = unsafe {
        mctx.builder
            .build_gep(arr_ty, global.as_pointer_value(), &[zero, zero], "strtmp")
            .map_err(builder_err)?
    };
    Ok(gep.as_basic_value_enum())
}

fn type_class_mask(ty: &Type) -> u8 {
    let mut mask = 0;
    if ty.is_integer() {
        mask |= binop::INTEGER;
    }
    if ty.is_float() {
        mask |= binop::FLOAT;
    }
    if ty.is_signed() {
        mask |= binop::SIGNED;
    }
    if ty.is_unsigned() {
        mask |= binop::UNSIGNED;
    }
    mask
}

/// Pointers are never a binary-arithmetic result type in their own right;
/// aligning against a pointer only picks it as the *wider* operand so the
/// other side gets widened far enough, then the comparison/arithmetic
/// itself runs in `u64` (spec.md §4.4.4: "if common is a pointer, promote
/// it to u64 for the purpose of arithmetic/comparison").
fn promote_pointer_for_arithmetic(ty: Type) -> Type {
    if ty.is_pointer() {
        Type::U64
    } else {
        ty
    }
}

fn lower_binary<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    op: BinaryOp,
    lhs: &Node,
    rhs: &Node,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    let lhs_ty = infer_type(gctx, mctx, lhs)?;
    let rhs_ty = infer_type(gctx, mctx, rhs)?;
    let target_ty = promote_pointer_for_arithmetic(Type::align(&lhs_ty, &rhs_ty));
    let target_llvm = llvm_type(gctx.llvm(), &target_ty)?;

    let lhs_val = lower_value(gctx, mctx, lhs)?;
    let lhs_val = cast_if_needed(&mctx.builder, 0, lhs_val, target_llvm)?;
    let rhs_val = lower_value(gctx, mctx, rhs)?;
    let rhs_val = cast_if_needed(&mctx.builder, 0, rhs_val, target_llvm)?;

    binop::lower(&mctx.builder, op, type_class_mask(&target_ty), lhs_val, rhs_val)
}

fn lower_neg<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    rhs: &Node,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    let value = lower_value(gctx, mctx, rhs)?;
    Ok(match value {
        BasicValueEnum::IntValue(v) => mctx.builder.build_int_neg(v, "negtmp").map_err(builder_err)?.into(),
        BasicValueEnum::FloatValue(v) => mctx.builder.build_float_neg(v, "negftmp").map_err(builder_err)?.into(),
        other => {
            return Err(CodegenError::Internal(format!(
                "can't negate a {:?} value",
                other.get_type()
            )))
        }
    })
}

fn lower_not<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    rhs: &Node,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    let value = lower_value(gctx, mctx, rhs)?;
    let int_val = match value {
        BasicValueEnum::IntValue(v) => v,
        other => {
            return Err(CodegenError::Internal(format!(
                "can't apply '!' to a {:?} value",
                other.get_type()
            )))
        }
    };
    let zero = int_val.get_type().const_zero();
    // The type system has no dedicated i1/bool; a `!` result is provisionally
    // typed `u8` (see DESIGN.md, "Unary ! result type").
    mctx.builder
        .build_int_compare(inkwell::IntPredicate::EQ, int_val, zero, "nottmp")
        .map(|v| mctx.builder.build_int_z_extend(v, gctx.llvm().i8_type(), "notzext").map(Into::into))
        .map_err(builder_err)?
        .map_err(builder_err)
}

fn lower_cast<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    expr: &Node,
    ty: &TypeExpr,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    let target = resolve_type(gctx, ty, None)?;
    let target_llvm = llvm_type(gctx.llvm(), &target)?;
    let value = lower_value(gctx, mctx, expr)?;
    cast_if_needed(&mctx.builder, 0, value, target_llvm)
}

fn callee_name(callee: &Node) -> Option<(String, bool)> {
    match callee {
        Node::Identifier(name) => Some((name.clone(), false)),
        Node::MemberAccess { name, .. } => Some((name.clone(), true)),
        _ => None,
    }
}

fn lower_call<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    callee: &Node,
    args: &[Node],
) -> CodegenResult<Option<BasicValueEnum<'ctx>>> {
    let (base_name, is_member) = callee_name(callee).ok_or_else(|| CodegenError::Internal(
        "call target must be an identifier or a member access".to_string(),
    ))?;

    let (resolved_name, implicit_self) = if is_member {
        let (kind, member_lhs, member_name) = match callee {
            Node::MemberAccess { kind, lhs, name } => (*kind, lhs.as_ref(), name.as_str()),
            _ => unreachable!(),
        };
        let lhs_ty = infer_type(gctx, mctx, member_lhs)?;
        // Same base-pointer rule as field access (`lower_member_lvalue`):
        // `.` takes the address of the lhs lvalue, `->` loads the lhs to
        // get the pointer it already holds.
        let self_ptr = match kind {
            MemberKind::Value => lower_lvalue(gctx, mctx, member_lhs)?.0,
            MemberKind::Pointer => lower_value(gctx, mctx, member_lhs)?.into_pointer_value(),
        };
        let struct_name = lhs_ty.base_type().name();
        (format!("{struct_name}_{member_name}"), Some(self_ptr))
    } else {
        (base_name, None)
    };

    let meta = gctx.function_meta(&resolved_name).ok_or_else(|| CodegenError::FunctionAbsent {
        name: resolved_name.clone(),
    })?;

    let declared_arity = meta.params.len();
    let actual_arity = args.len() + implicit_self.is_some() as usize;
    if !meta.is_variadic && actual_arity != declared_arity {
        return Err(CodegenError::ArgumentCountMismatch {
            line: 0,
            name: resolved_name,
            expected: declared_arity,
            actual: actual_arity,
        });
    }

    let mut llvm_args: Vec<inkwell::values::BasicMetadataValueEnum> = Vec::with_capacity(actual_arity);
    if let Some(self_ptr) = implicit_self {
        llvm_args.push(self_ptr.into());
    }
    let explicit_param_types: Vec<Type> = meta
        .params
        .values()
        .skip(implicit_self.is_some() as usize)
        .cloned()
        .collect();
    for (i, arg) in args.iter().enumerate() {
        let value = lower_value(gctx, mctx, arg)?;
        let value = match explicit_param_types.get(i) {
            Some(param_ty) => {
                let llvm_ty = llvm_type(gctx.llvm(), param_ty)?;
                cast_if_needed(&mctx.builder, 0, value, llvm_ty)?
            }
            None => value, // past the declared arity: variadic tail, passed as-is.
        };
        llvm_args.push(value.into());
    }

    let function = mctx.get_function(gctx, &resolved_name)?;
    let call_name = if meta.return_type.is_void() { "" } else { "calltmp" };
    let call_site = mctx
        .builder
        .build_call(function, &llvm_args, call_name)
        .map_err(builder_err)?;
    Ok(call_site.try_as_basic_value().left())
}

/// Type inference used only to pick the widened type for a binary
/// operand, a cast target, or an lvalue's pointee — a light structural
/// pass rather than a second, independent type checker.
pub(crate) fn infer_type<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    node: &Node,
) -> CodegenResult<Type> {
    Ok(match node {
        Node::Number(NumberTag::Integer, _) => Type::I64,
        Node::Number(NumberTag::Floating, _) => Type::F64,
        Node::String(_) => Type::pointer(Type::I8),
        Node::Identifier(name) => {
            if let Some(local) = mctx.locals.get(name) {
                local.ty.clone()
            } else if let Some(ty) = gctx.global_type(name) {
                ty
            } else {
                return Err(CodegenError::UndefinedIdentifier { line: 0, name: name.clone() });
            }
        }
        Node::Unary { op: UnaryOp::Addr, rhs } => Type::pointer(infer_type(gctx, mctx, rhs)?),
        Node::Unary { op: UnaryOp::Deref, rhs } => {
            let t = infer_type(gctx, mctx, rhs)?;
            t.pointee().cloned().ok_or_else(|| CodegenError::SubscriptOnNonPointer {
                line: 0,
                found: t.to_string(),
            })?
        }
        Node::Unary { op: UnaryOp::Not, .. } => Type::U8,
        Node::Unary { op: UnaryOp::Neg, rhs } => infer_type(gctx, mctx, rhs)?,
        Node::Binary { op, lhs, rhs } if matches!(op, BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge) => {
            let _ = (lhs, rhs);
            Type::U8
        }
        Node::Binary { lhs, rhs, .. } => promote_pointer_for_arithmetic(Type::align(
            &infer_type(gctx, mctx, lhs)?,
            &infer_type(gctx, mctx, rhs)?,
        )),
        Node::Subscript { base, .. } => {
            let t = infer_type(gctx, mctx, base)?;
            t.pointee().cloned().ok_or_else(|| CodegenError::SubscriptOnNonPointer {
                line: 0,
                found: t.to_string(),
            })?
        }
        Node::MemberAccess { kind, lhs, name } => {
            let lhs_ty = infer_type(gctx, mctx, lhs)?;
            let struct_ty = match kind {
                MemberKind::Value => lhs_ty,
                MemberKind::Pointer => lhs_ty.pointee().cloned().ok_or_else(|| CodegenError::MemberAccessOnNonStruct {
                    line: 0,
                    found: lhs_ty.to_string(),
                })?,
            };
            struct_ty.member_type(name).cloned().ok_or_else(|| CodegenError::UnknownStructField {
                line: 0,
                struct_name: struct_ty.name(),
                field: name.clone(),
            })?
        }
        Node::Cast { ty, .. } => resolve_type(gctx, ty, None)?,
        Node::Call { callee, .. } => {
            let (name, is_member) = callee_name(callee).ok_or_else(|| CodegenError::Internal(
                "call target must be an identifier or a member access".to_string(),
            ))?;
            let resolved = if is_member {
                match callee {
                    Node::MemberAccess { lhs, name: member, .. } => {
                        format!("{}_{}", infer_type(gctx, mctx, lhs)?.base_type().name(), member)
                    }
                    _ => unreachable!(),
                }
            } else {
                name
            };
            gctx.function_meta(&resolved)
                .ok_or(CodegenError::FunctionAbsent { name: resolved })?
                .return_type
                .clone()
        }
        Node::Assign { lhs, .. } => infer_type(gctx, mctx, lhs)?,
        other => {
            return Err(CodegenError::Internal(format!(
                "{other:?} has no inferable value type"
            )))
        }
    })
}

fn lower_assign<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    op: AssignOp,
    lhs: &Node,
    rhs: &Node,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    if !lhs.is_lvalue_form() {
        return Err(CodegenError::NotAnLvalue { line: 0, construct: "=".to_string() });
    }
    let (ptr, lhs_ty) = lower_lvalue(gctx, mctx, lhs)?;
    let llvm_ty = llvm_type(gctx.llvm(), &lhs_ty)?;

    let new_value = match op {
        AssignOp::Assign => {
            let rhs_val = lower_value(gctx, mctx, rhs)?;
            cast_if_needed(&mctx.builder, 0, rhs_val, llvm_ty)?
        }
        AssignOp::Compound(bin_op) => {
            let current = mctx.builder.build_load(llvm_ty, ptr, "compoundtmp").map_err(builder_err)?;
            let rhs_val = lower_value(gctx, mctx, rhs)?;
            let rhs_val = cast_if_needed(&mctx.builder, 0, rhs_val, llvm_ty)?;
            binop::lower(&mctx.builder, bin_op, type_class_mask(&lhs_ty), current, rhs_val)?
        }
    };
    mctx.builder.build_store(ptr, new_value).map_err(builder_err)?;
    Ok(new_value)
}

// ---------------------------------------------------------------------
// Statement lowering
// ---------------------------------------------------------------------

pub fn lower_statement<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    node: &Node,
) -> CodegenResult<()> {
    match node {
        Node::Block(stmts) => lower_block(gctx, mctx, stmts),
        Node::VarDecl { name, ty, init, .. } => lower_var_decl(gctx, mctx, name, ty.as_ref(), init.as_deref()),
        Node::If { cond, then_branch, else_branch } => {
            lower_if(gctx, mctx, cond, then_branch, else_branch.as_deref())
        }
        Node::For { init, cond, step, body } => lower_for(gctx, mctx, init, cond, step, body),
        Node::While { cond, body } => lower_while(gctx, mctx, cond, body),
        Node::Return(value) => lower_return(gctx, mctx, value.as_deref()),
        Node::FnDecl(decl) => {
            lower_fn_decl(gctx, decl, None)?;
            Ok(())
        }
        Node::FnDef(def) => {
            lower_fn_def(gctx, mctx, def, None)?;
            Ok(())
        }
        Node::Struct(def) => lower_struct_def(gctx, mctx, def),
        Node::Call { callee, args } => {
            // A call used as a bare statement may legitimately return void,
            // which `lower_value` (an expression context) would reject.
            lower_call(gctx, mctx, callee, args)?;
            Ok(())
        }
        expr => {
            lower_value(gctx, mctx, expr)?;
            Ok(())
        }
    }
}

/// `Block` must stop lowering statements once the current basic block
/// already ends in a terminator (e.g. an earlier unconditional `return`):
/// emitting anything after a terminator is invalid IR. The original
/// C++ snippet for `Block::generateValue` doesn't show this check; it's
/// required by spec.md §4.4.10 and added here.
fn lower_block<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    stmts: &[Node],
) -> CodegenResult<()> {
    for stmt in stmts {
        if block_terminated(mctx) {
            break;
        }
        lower_statement(gctx, mctx, stmt)?;
    }
    Ok(())
}

/// Spec.md §4.4.9 requires an explicit type, an inferred one from the
/// initializer, or both; the source snapshot only ever reads an explicit
/// type, so the inference branch is new here.
fn lower_var_decl<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    name: &str,
    ty: Option<&TypeExpr>,
    init: Option<&Node>,
) -> CodegenResult<()> {
    let resolved_ty = match (ty, init) {
        (Some(texpr), _) => resolve_type(gctx, texpr, None)?,
        (None, Some(init_expr)) => infer_type(gctx, mctx, init_expr)?,
        (None, None) => {
            return Err(CodegenError::AmbiguousVarDeclType { line: 0, name: name.to_string() })
        }
    };
    let llvm_ty = llvm_type(gctx.llvm(), &resolved_ty)?;

    let init_value = match init {
        Some(expr) => {
            let v = lower_value(gctx, mctx, expr)?;
            Some(cast_if_needed(&mctx.builder, 0, v, llvm_ty)?)
        }
        None => None,
    };

    let is_global_module = mctx.locals.is_empty() && gctx.current_function().is_none();
    if is_global_module {
        // Top-level `var`: a real global, materialized once into the
        // global module (spec.md §4.4.9, §9 "global module resurrection").
        let global = mctx.module.add_global(llvm_ty, Some(AddressSpace::default()), name);
        let init_const = match init {
            Some(Node::Number(NumberTag::Integer, NumberLiteral::Integer(v))) if llvm_ty.is_int_type() => {
                llvm_ty.into_int_type().const_int(*v as u64, true).as_basic_value_enum()
            }
            Some(Node::Number(NumberTag::Floating, NumberLiteral::Floating(v))) if llvm_ty.is_float_type() => {
                llvm_ty.into_float_type().const_float(*v).as_basic_value_enum()
            }
            _ => default_value(llvm_ty),
        };
        global.set_initializer(&init_const);
        gctx.register_global(name.to_string(), resolved_ty);
        return Ok(());
    }

    let alloca = mctx.builder.build_alloca(llvm_ty, name).map_err(builder_err)?;
    if let Some(v) = init_value {
        mctx.builder.build_store(alloca, v).map_err(builder_err)?;
    } else {
        mctx.builder.build_store(alloca, default_value(llvm_ty)).map_err(builder_err)?;
    }
    mctx.locals.insert(name.to_string(), TypedValue { ty: resolved_ty, ptr: alloca });
    Ok(())
}

fn to_i1<'ctx>(mctx: &ModuleContext<'ctx>, cond: BasicValueEnum<'ctx>) -> CodegenResult<inkwell::values::IntValue<'ctx>> {
    let int_val = match cond {
        BasicValueEnum::IntValue(v) => v,
        other => {
            return Err(CodegenError::Internal(format!(
                "condition must be an integer value, found {:?}",
                other.get_type()
            )))
        }
    };
    let zero = int_val.get_type().const_zero();
    mctx.builder
        .build_int_compare(inkwell::IntPredicate::NE, int_val, zero, "ifcond")
        .map_err(builder_err)
}

fn lower_if<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    cond: &Node,
    then_branch: &Node,
    else_branch: Option<&Node>,
) -> CodegenResult<()> {
    let cond_val = lower_value(gctx, mctx, cond)?;
    let cond_i1 = to_i1(mctx, cond_val)?;

    let function = mctx.builder.get_insert_block().unwrap().get_parent().unwrap();
    let then_block = gctx.llvm().append_basic_block(function, "then");
    let else_block = gctx.llvm().append_basic_block(function, "else");
    let merge_block = gctx.llvm().append_basic_block(function, "ifcont");

    mctx.builder.build_conditional_branch(cond_i1, then_block, else_block).map_err(builder_err)?;

    mctx.builder.position_at_end(then_block);
    lower_statement(gctx, mctx, then_branch)?;
    if !block_terminated(mctx) {
        mctx.builder.build_unconditional_branch(merge_block).map_err(builder_err)?;
    }

    mctx.builder.position_at_end(else_block);
    if let Some(else_node) = else_branch {
        lower_statement(gctx, mctx, else_node)?;
    }
    if !block_terminated(mctx) {
        mctx.builder.build_unconditional_branch(merge_block).map_err(builder_err)?;
    }

    mctx.builder.position_at_end(merge_block);
    Ok(())
}

/// Do-while-shaped, per `for.cc`: the body runs before the step and the
/// condition re-check, so a `for` loop always executes its body at least
/// once. The induction variable shadows any outer local of the same name
/// for the loop's duration and is restored afterward.
fn lower_for<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    init: &Node,
    cond: &Node,
    step: &Node,
    body: &Node,
) -> CodegenResult<()> {
    let shadowed_name = match init {
        Node::VarDecl { name, .. } => Some(name.clone()),
        _ => None,
    };
    let shadowed = shadowed_name.as_ref().and_then(|n| mctx.locals.get(n).cloned());

    lower_statement(gctx, mctx, init)?;

    let function = mctx.builder.get_insert_block().unwrap().get_parent().unwrap();
    let body_block = gctx.llvm().append_basic_block(function, "forbody");
    let after_block = gctx.llvm().append_basic_block(function, "forcont");

    mctx.builder.build_unconditional_branch(body_block).map_err(builder_err)?;
    mctx.builder.position_at_end(body_block);

    lower_statement(gctx, mctx, body)?;
    if !block_terminated(mctx) {
        lower_value(gctx, mctx, step)?;
        let cond_val = lower_value(gctx, mctx, cond)?;
        let cond_i1 = to_i1(mctx, cond_val)?;
        mctx.builder.build_conditional_branch(cond_i1, body_block, after_block).map_err(builder_err)?;
    }

    mctx.builder.position_at_end(after_block);

    if let Some(name) = shadowed_name {
        match shadowed {
            Some(prev) => {
                mctx.locals.insert(name, prev);
            }
            None => {
                mctx.locals.remove(&name);
            }
        }
    }
    Ok(())
}

/// A real, condition-checked-first loop. The source snapshot's
/// `While::generateValue` unconditionally throws "while loops are
/// unsupported" — there is no existing behavior to preserve, unlike
/// `For`'s deliberately do-while-shaped quirk, so this implements the
/// conventional semantics spec.md §4.4.12 describes directly.
fn lower_while<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    cond: &Node,
    body: &Node,
) -> CodegenResult<()> {
    let function = mctx.builder.get_insert_block().unwrap().get_parent().unwrap();
    let cond_block = gctx.llvm().append_basic_block(function, "whilecond");
    let body_block = gctx.llvm().append_basic_block(function, "whilebody");
    let after_block = gctx.llvm().append_basic_block(function, "whilecont");

    mctx.builder.build_unconditional_branch(cond_block).map_err(builder_err)?;

    mctx.builder.position_at_end(cond_block);
    let cond_val = lower_value(gctx, mctx, cond)?;
    let cond_i1 = to_i1(mctx, cond_val)?;
    mctx.builder.build_conditional_branch(cond_i1, body_block, after_block).map_err(builder_err)?;

    mctx.builder.position_at_end(body_block);
    lower_statement(gctx, mctx, body)?;
    if !block_terminated(mctx) {
        mctx.builder.build_unconditional_branch(cond_block).map_err(builder_err)?;
    }

    mctx.builder.position_at_end(after_block);
    Ok(())
}

fn lower_return<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    value: Option<&Node>,
) -> CodegenResult<()> {
    let current = gctx.current_function().ok_or_else(|| CodegenError::Internal(
        "return outside of a function body".to_string(),
    ))?;
    match value {
        Some(expr) => {
            let v = lower_value(gctx, mctx, expr)?;
            let ret_llvm = llvm_type(gctx.llvm(), &current.return_type)?;
            let v = cast_if_needed(&mctx.builder, 0, v, ret_llvm)?;
            mctx.builder.build_return(Some(&v)).map_err(builder_err)?;
        }
        None => {
            mctx.builder.build_return(None).map_err(builder_err)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Top-level items: functions and structs
// ---------------------------------------------------------------------

/// `FnDecl::generateFunction`: registers the signature and creates the
/// (possibly body-less) LLVM function in `mctx`'s module.
pub fn lower_fn_decl<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    decl: &FnDecl,
    self_name: Option<&str>,
) -> CodegenResult<Rc<FunctionMeta>> {
    let return_type = resolve_type(gctx, &decl.return_ty, self_name)?;
    let mut params = indexmap::IndexMap::new();
    for p in &decl.params {
        let texpr = p.ty.as_ref().ok_or_else(|| CodegenError::AmbiguousVarDeclType {
            line: 0,
            name: p.name.clone(),
        })?;
        params.insert(p.name.clone(), resolve_type(gctx, texpr, self_name)?);
    }
    let meta = FunctionMeta {
        name: decl.name.clone(),
        return_type,
        params,
        is_extern: decl.is_extern,
        is_variadic: decl.is_variadic,
    };
    gctx.register_function(meta)
}

/// `FnDef::generateFunction`: declares the function (if not already
/// declared), then builds its body.
pub fn lower_fn_def<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    def: &FnDef,
    self_name: Option<&str>,
) -> CodegenResult<FunctionValue<'ctx>> {
    let meta = lower_fn_decl(gctx, &def.decl, self_name)?;
    let function = mctx.declare_function(gctx, &meta)?;

    let entry = gctx.llvm().append_basic_block(function, "entry");
    mctx.builder.position_at_end(entry);

    let saved_locals = std::mem::take(&mut mctx.locals);
    for (i, (pname, pty)) in meta.params.iter().enumerate() {
        let param_value = function
            .get_nth_param(i as u32)
            .expect("declared parameter count matches the function's arity");
        let llvm_ty = llvm_type(gctx.llvm(), pty)?;
        let alloca = mctx.builder.build_alloca(llvm_ty, pname).map_err(builder_err)?;
        mctx.builder.build_store(alloca, param_value).map_err(builder_err)?;
        mctx.locals.insert(pname.clone(), TypedValue { ty: pty.clone(), ptr: alloca });
    }

    gctx.set_current_function(meta.clone());
    lower_statement(gctx, mctx, &def.body)?;
    if !block_terminated(mctx) {
        if meta.return_type.is_void() {
            mctx.builder.build_return(None).map_err(builder_err)?;
        } else {
            let default = default_value(llvm_type(gctx.llvm(), &meta.return_type)?);
            mctx.builder.build_return(Some(&default)).map_err(builder_err)?;
        }
    }
    gctx.clear_current_function();
    mctx.locals = saved_locals;

    if !function.verify(false) {
        return Err(CodegenError::VerificationFailed {
            name: meta.name.clone(),
            diagnostic: "LLVM module verifier rejected the generated function body".to_string(),
        });
    }
    Ok(function)
}

/// Registers the struct's shape in the type registry, then lowers each
/// method as an ordinary function under its mangled name
/// (`<StructName>_<method>`), matching the implicit-self call convention
/// `lower_call` expects. This particular AST's `struct` grammar (unlike
/// the source snapshot's, which has no method support at all) always
/// carries `methods`, so mangled registration is authored fresh here.
pub fn lower_struct_def<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    mctx: &mut ModuleContext<'ctx>,
    def: &StructDef,
) -> CodegenResult<()> {
    let mut members = Vec::with_capacity(def.fields.len());
    for f in &def.fields {
        let texpr = f.ty.as_ref().ok_or_else(|| CodegenError::AmbiguousVarDeclType {
            line: 0,
            name: f.name.clone(),
        })?;
        members.push((f.name.clone(), resolve_type(gctx, texpr, Some(&def.name))?));
    }
    let struct_ty = Type::strukt(def.name.clone(), members);
    gctx.types_mut().register_custom_type(def.name.clone(), struct_ty);

    for method in &def.methods {
        let mangled_name = format!("{}_{}", def.name, method.decl.name);
        let mangled_def = FnDef {
            decl: FnDecl {
                name: mangled_name,
                ..method.decl.clone()
            },
            body: method.body.clone(),
        };
        lower_fn_def(gctx, mctx, &mangled_def, Some(&def.name))?;
    }
    Ok(())
}
