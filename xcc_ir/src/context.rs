//! Global and per-module compilation state (spec.md §4.5, §4.6), grounded
//! on `codegen.h`'s `GlobalContext`/`ModuleContext`.
//!
//! The original gives `ModuleContext` a stored reference back to its
//! owning `GlobalContext`. Rust can't give a struct owned by
//! `GlobalContext` a live `&GlobalContext` back into its owner without
//! either unsafe aliasing or a reference-counted cell — so here that
//! back-reference becomes a parameter threaded through every lowering
//! call instead of a stored field: `lower::lower(gctx, mctx, node)` rather
//! than `mctx.global_context.something()`. Functionally this is the same
//! graph of lookups the original performs, just passed explicitly instead
//! of stored implicitly. See DESIGN.md, "ModuleContext back-reference".

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::values::{FunctionValue, PointerValue};

use xcc_types::{Type, TypeRegistry};

use crate::error::{CodegenError, CodegenResult};
use crate::jit::Jit;
use crate::types::llvm_fn_type;

/// Registered shape of a declared or defined function (spec.md §4.5
/// `functions: Map<String, FunctionMeta>`). Parameters keep declaration
/// order since call-site argument casting walks them positionally.
#[derive(Debug, Clone)]
pub struct FunctionMeta {
    pub name: String,
    pub return_type: Type,
    pub params: IndexMap<String, Type>,
    pub is_extern: bool,
    pub is_variadic: bool,
}

/// A named stack slot and its meta-type, the unit `locals`/`globals`
/// store (spec.md §4.6 `locals: Map<String, TypedValue>`).
#[derive(Debug, Clone, Copy)]
pub struct TypedValue<'ctx> {
    pub ty: Type,
    pub ptr: PointerValue<'ctx>,
}

/// Compiler-wide state: the JIT, the function/global registries, the
/// user-type registry, and the "current function" cursor `Return`
/// lowering consults for its declared return type (spec.md §4.5).
pub struct GlobalContext<'ctx> {
    context: &'ctx Context,
    jit: Jit<'ctx>,
    functions: HashMap<String, Rc<FunctionMeta>>,
    globals: HashMap<String, Type>,
    types: TypeRegistry,
    current_function: Option<Rc<FunctionMeta>>,
    /// The perpetual global module (spec.md §5): every top-level `var`
    /// global and struct definition is materialized here and it is never
    /// retired, so their backing storage outlives any individual REPL turn.
    /// Always `Some` except during the brief window `take_global_module`
    /// holds it out for `lower::*` calls.
    global_module: Option<ModuleContext<'ctx>>,
}

impl<'ctx> GlobalContext<'ctx> {
    pub fn new(context: &'ctx Context) -> CodegenResult<Self> {
        let global_module = ModuleContext::new(context, "xcc_global");
        let jit = Jit::new(&global_module.module)?;
        Ok(Self {
            context,
            jit,
            functions: HashMap::new(),
            globals: HashMap::new(),
            types: TypeRegistry::new(),
            current_function: None,
            global_module: Some(global_module),
        })
    }

    pub fn llvm(&self) -> &'ctx Context {
        self.context
    }

    pub fn jit(&self) -> &Jit<'ctx> {
        &self.jit
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn create_module(&self, name: &str) -> ModuleContext<'ctx> {
        ModuleContext::new(self.context, name)
    }

    pub fn add_module(&self, module: &Module<'ctx>) -> CodegenResult<()> {
        self.jit.add_module(module)
    }

    /// Takes the global module out so it can be passed to `lower::*` as an
    /// ordinary `&mut ModuleContext` without aliasing `self`. Must be paired
    /// with `put_global_module`.
    pub fn take_global_module(&mut self) -> ModuleContext<'ctx> {
        self.global_module
            .take()
            .expect("global module taken twice without being returned")
    }

    pub fn put_global_module(&mut self, module: ModuleContext<'ctx>) {
        self.global_module = Some(module);
    }

    /// Detaches `module` from the JIT (spec.md §8 invariant 8: a REPL
    /// turn's anonymous-wrapper module must not remain resolvable once the
    /// turn ends). Never call this on the perpetual global module — only
    /// on the disposable per-turn scratch module `run_expr` creates via
    /// `create_module`, which never carries any `var` global's backing
    /// storage.
    pub fn remove_module(&self, module: &Module<'ctx>) -> CodegenResult<()> {
        self.jit.remove_module(module)
    }

    /// Forgets a function's registry entry, so a later turn can
    /// re-synthesize one under the same name without colliding (spec.md §7:
    /// "function name collision"). Used to retire `__anonymous__` after
    /// each REPL turn.
    pub fn forget_function(&mut self, name: &str) {
        self.functions.remove(name);
    }

    pub fn register_function(&mut self, meta: FunctionMeta) -> CodegenResult<Rc<FunctionMeta>> {
        if let Some(existing) = self.functions.get(&meta.name) {
            // Re-declaring the exact same signature (e.g. an `extern`
            // prototype seen again) is tolerated; anything else collides.
            if existing.return_type == meta.return_type
                && existing.params.len() == meta.params.len()
                && existing.is_variadic == meta.is_variadic
            {
                return Ok(existing.clone());
            }
            return Err(CodegenError::FunctionCollision { name: meta.name });
        }
        let rc = Rc::new(meta);
        self.functions.insert(rc.name.clone(), rc.clone());
        Ok(rc)
    }

    pub fn function_meta(&self, name: &str) -> Option<Rc<FunctionMeta>> {
        self.functions.get(name).cloned()
    }

    pub fn set_current_function(&mut self, meta: Rc<FunctionMeta>) {
        self.current_function = Some(meta);
    }

    pub fn clear_current_function(&mut self) {
        self.current_function = None;
    }

    pub fn current_function(&self) -> Option<Rc<FunctionMeta>> {
        self.current_function.clone()
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn global_type(&self, name: &str) -> Option<Type> {
        self.globals.get(name).cloned()
    }

    pub fn register_global(&mut self, name: String, ty: Type) {
        self.globals.insert(name, ty);
    }

    /// Registered top-level function names, for the REPL's `/list`
    /// meta-command (spec.md §4.9.1).
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Registered top-level global names, for the REPL's `/list`
    /// meta-command (spec.md §4.9.1).
    pub fn global_names(&self) -> Vec<&str> {
        self.globals.keys().map(String::as_str).collect()
    }
}

/// A single compilation unit's IR builder, module, and local symbol table
/// (spec.md §4.6).
pub struct ModuleContext<'ctx> {
    pub module: Module<'ctx>,
    pub builder: inkwell::builder::Builder<'ctx>,
    pub locals: HashMap<String, TypedValue<'ctx>>,
}

impl<'ctx> ModuleContext<'ctx> {
    fn new(context: &'ctx Context, name: &str) -> Self {
        Self {
            module: context.create_module(name),
            builder: context.create_builder(),
            locals: HashMap::new(),
        }
    }

    /// Looks up a function in this module, regenerating a declaration
    /// from the global registry if it was defined in a different module
    /// (spec.md §4.6 `getFunction`: cross-module calls need a local
    /// declaration referencing the same external symbol).
    pub fn get_function(
        &mut self,
        gctx: &GlobalContext<'ctx>,
        name: &str,
    ) -> CodegenResult<FunctionValue<'ctx>> {
        if let Some(f) = self.module.get_function(name) {
            return Ok(f);
        }
        let meta = gctx
            .function_meta(name)
            .ok_or_else(|| CodegenError::FunctionAbsent { name: name.to_string() })?;
        self.declare_function(gctx, &meta)
    }

    pub fn declare_function(
        &mut self,
        gctx: &GlobalContext<'ctx>,
        meta: &FunctionMeta,
    ) -> CodegenResult<FunctionValue<'ctx>> {
        let context = gctx.llvm();
        let param_types = meta
            .params
            .values()
            .map(|t| crate::types::llvm_type(context, t))
            .collect::<CodegenResult<Vec<_>>>()?;
        let fn_type = llvm_fn_type(context, &meta.return_type, &param_types, meta.is_variadic);
        // External linkage uniformly: MCJIT resolves same-named externally
        // linked symbols across every module added to the engine, which is
        // all the cross-module call-resolution this needs. The original's
        // `CommonLinkage` for non-extern functions doesn't carry over —
        // LLVM only allows that linkage on globals, not functions. See
        // DESIGN.md, "Function linkage".
        let function = self.module.add_function(&meta.name, fn_type, Some(Linkage::External));
        for (i, pname) in meta.params.keys().enumerate() {
            if let Some(param) = function.get_nth_param(i as u32) {
                param.set_name(pname);
            }
        }
        Ok(function)
    }
}
