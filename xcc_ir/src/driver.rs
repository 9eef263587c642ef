//! Top-level driver (spec.md §4.9): lexes and parses a source unit, splits
//! it into function items / globals-and-structs / (in REPL mode) bare
//! statements, lowers each into the right module, and either runs `main`
//! (whole-program mode) or wraps the trailing statements into a synthetic
//! `__anonymous__` function and runs that (REPL mode).
//!
//! File reading, the REPL's line-editing loop, and process exit codes are
//! the CLI crate's job (spec.md §1 "out of scope: external collaborators");
//! this module only ever sees a complete unit of source text.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use xcc_lexer::Lexer;
use xcc_parser::ast::{FnDecl, FnDef, Node, TypeExpr};
use xcc_parser::Parser;
use xcc_types::Type;

use crate::context::GlobalContext;
use crate::jit::JitValue;
use crate::lower;

/// Reverse of `lower::resolve_type`: turns an already-resolved meta-type
/// back into the `TypeExpr` spelling `resolve_type` would accept, so the
/// REPL's synthetic wrapper function can declare a return type built from
/// an inferred `Type` rather than parsed source text.
fn type_expr_for(ty: &Type) -> TypeExpr {
    match ty {
        Type::Pointer(inner) => type_expr_for(inner).pointer_to(),
        Type::Struct { name, .. } => TypeExpr::named(name.clone()),
        other => TypeExpr::named(other.to_string()),
    }
}

/// Whether lowering `node` through `lower_value` (rather than only
/// `lower_statement`) is meaningful — used to decide whether the REPL's
/// trailing item becomes `return <expr>;` or is left as a bare statement
/// with a `void` wrapper return type.
fn is_value_producing(node: &Node) -> bool {
    matches!(
        node,
        Node::Number(..)
            | Node::String(_)
            | Node::Identifier(_)
            | Node::Binary { .. }
            | Node::Unary { .. }
            | Node::Call { .. }
            | Node::Cast { .. }
            | Node::Assign { .. }
            | Node::Subscript { .. }
            | Node::MemberAccess { .. }
    )
}

/// Runs a complete unit of source text against `gctx` (spec.md §4.9
/// `run(globalCtx, source, isRepl)`).
///
/// Whole-program mode (`is_repl = false`) ingests the unit, then looks up
/// and invokes `main`. REPL mode ingests the unit and, if it contained any
/// bare statement/expression beyond function/global/struct declarations,
/// evaluates that tail immediately and returns its value.
pub fn run<'ctx>(
    gctx: &mut GlobalContext<'ctx>,
    source: &str,
    is_repl: bool,
    emit_ir: bool,
) -> Result<Option<JitValue>> {
    let tokens = Lexer::tokenize(source)?;
    let program = Parser::parse(tokens, is_repl)?;
    debug!("parsed {} top-level item(s)", program.items.len());

    let mut rest = Vec::new();
    for item in program.items {
        match item {
            Node::FnDecl(_) | Node::FnDef(_) => lower_function_item(gctx, item, emit_ir)?,
            other => rest.push(other),
        }
    }

    // Globals and struct definitions always land in the perpetual global
    // module, before any REPL tail expression that might reference them
    // (spec.md §4.9 step 4, preceding step 5).
    let mut global_module = gctx.take_global_module();
    let mut tail = Vec::new();
    for item in rest {
        match item {
            Node::VarDecl { .. } | Node::Struct(_) => {
                let result = lower::lower_statement(gctx, &mut global_module, &item);
                if let Err(e) = result {
                    gctx.put_global_module(global_module);
                    return Err(e.into());
                }
            }
            other => tail.push(other),
        }
    }
    gctx.put_global_module(global_module);

    if is_repl {
        if tail.is_empty() {
            return Ok(None);
        }
        return run_expr(gctx, tail, emit_ir).map(Some);
    }

    Ok(Some(run_function(gctx, "main")?))
}

fn lower_function_item<'ctx>(gctx: &mut GlobalContext<'ctx>, item: Node, emit_ir: bool) -> Result<()> {
    match item {
        Node::FnDecl(decl) => {
            // A bodyless declaration (an `extern` prototype, or a forward
            // declaration) only registers its signature; no module needs to
            // be added since there's no body to JIT.
            lower::lower_fn_decl(gctx, &decl, None)?;
            Ok(())
        }
        Node::FnDef(def) => {
            let mut mctx = gctx.create_module(&format!("xcc_fn_{}", def.decl.name));
            lower::lower_fn_def(gctx, &mut mctx, &def, None)?;
            if emit_ir {
                eprintln!("{}", mctx.module.print_to_string());
            }
            gctx.add_module(&mctx.module)?;
            info!("compiled and registered function '{}'", def.decl.name);
            Ok(())
        }
        other => Err(anyhow!("not a function item: {other:?}")),
    }
}

/// Wraps `tail` (the REPL turn's non-declaration items) in a synthetic
/// `__anonymous__` function, lowers and runs it in a disposable scratch
/// module, then detaches that module (spec.md §4.5 `runExpr`, §5/§9 "global
/// module resurrection").
///
/// The wrapper never shares the perpetual global module that `run` uses for
/// `var` globals and structs (see `context::GlobalContext::remove_module`):
/// that module's backing storage must survive every REPL turn, not just the
/// one in which a given global was declared. Cross-module references from
/// the wrapper to globals or functions defined elsewhere are resolved the
/// same way any two xcc modules resolve each other — `ModuleContext::get_function`
/// and the get-or-insert-global fallback in `lower::lower_identifier_lvalue`.
pub fn run_expr<'ctx>(gctx: &mut GlobalContext<'ctx>, mut tail: Vec<Node>, emit_ir: bool) -> Result<JitValue> {
    let mut turn_module = gctx.create_module("xcc_repl_turn");

    let last = tail.pop();
    let (return_ty, final_stmt) = match last {
        Some(expr) if is_value_producing(&expr) => {
            let ty = lower::infer_type(gctx, &mut turn_module, &expr).unwrap_or_else(|e| {
                warn!("couldn't infer REPL expression type ({e}); defaulting to i32");
                Type::I32
            });
            (ty, Node::Return(Some(Box::new(expr))))
        }
        Some(stmt) => {
            tail.push(stmt);
            (Type::Void, Node::Return(None))
        }
        None => (Type::Void, Node::Return(None)),
    };
    tail.push(final_stmt);

    let wrapper = FnDef {
        decl: FnDecl {
            name: "__anonymous__".to_string(),
            return_ty: type_expr_for(&return_ty),
            params: Vec::new(),
            is_extern: false,
            is_variadic: false,
            is_method: false,
        },
        body: Box::new(Node::Block(tail)),
    };

    let lowering_result = lower::lower_fn_def(gctx, &mut turn_module, &wrapper, None);
    if emit_ir && lowering_result.is_ok() {
        eprintln!("{}", turn_module.module.print_to_string());
    }
    if let Err(e) = lowering_result {
        // `lower_fn_def` registers the function's signature before lowering
        // its body, so a body-lowering failure still leaves a stale
        // `__anonymous__` entry behind; forget it before propagating.
        gctx.forget_function("__anonymous__");
        return Err(e.into());
    }

    gctx.add_module(&turn_module.module)?;
    let result = run_function(gctx, "__anonymous__");

    // Whether this turn's call succeeded or trapped, the wrapper must not
    // survive into the next turn (spec.md §8 invariant 8): detach its
    // scratch module from the JIT and forget its registry entry. Every
    // global/struct/function the wrapper touched lives in a different,
    // untouched module.
    gctx.remove_module(&turn_module.module)?;
    gctx.forget_function("__anonymous__");

    result
}

/// Looks up `name` in the JIT and invokes it with no arguments, dispatching
/// on its declared return type (spec.md §4.5 `runFunction`).
pub fn run_function(gctx: &GlobalContext<'_>, name: &str) -> Result<JitValue> {
    let meta = gctx
        .function_meta(name)
        .ok_or_else(|| anyhow!("function '{name}' was never defined"))?;
    info!("running '{name}'");
    Ok(gctx.jit().call_zero_arg(name, &meta.return_type)?)
}
