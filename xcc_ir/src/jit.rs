//! JIT execution wrapper (spec.md §4.7), grounded on `jit.h`/`jit.cc`.
//!
//! The original builds an ORC `ExecutionSession` with a hand-written
//! `SymbolResolverGenerator` that checks the session's own `JITDylib`
//! first and otherwise falls back to
//! `DynamicLibrarySearchGenerator::GetForCurrentProcess` so calls into
//! libc (`printf`, `malloc`, ...) resolve against the host process.
//! inkwell's MCJIT-backed `ExecutionEngine` performs that same
//! fallback internally — `get_function_address` resolves unknown
//! symbols via the process's own dynamic symbol table during
//! relocation, so no resolver generator needs porting here.
//!
//! What the original's per-`ModuleContext` private `LLVMContext` (bundled
//! into a `ThreadSafeModule` so cross-context modules can still be linked
//! together by ORC) becomes: a single `llvm::Context` created once in the
//! driver and threaded down by reference as `&'ctx Context`, since
//! inkwell's MCJIT `ExecutionEngine<'ctx>` ties every module it holds to
//! one shared context lifetime. Each `ModuleContext` still gets its own
//! `Module<'ctx>` — only the `Context` itself is shared. See DESIGN.md.

use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::OptimizationLevel;

use crate::error::{CodegenError, CodegenResult};
use xcc_types::Type;

/// A JIT-produced value, tagged by the return type of the function that
/// produced it (spec.md §4.7 `run`: dispatches on the callee's declared
/// return type to invoke the correctly-typed function pointer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitValue {
    Void,
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Pointer(usize),
}

impl std::fmt::Display for JitValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitValue::Void => write!(f, "void"),
            JitValue::I8(v) => write!(f, "{v}"),
            JitValue::I16(v) => write!(f, "{v}"),
            JitValue::I32(v) => write!(f, "{v}"),
            JitValue::I64(v) => write!(f, "{v}"),
            JitValue::U8(v) => write!(f, "{v}"),
            JitValue::U16(v) => write!(f, "{v}"),
            JitValue::U32(v) => write!(f, "{v}"),
            JitValue::U64(v) => write!(f, "{v}"),
            JitValue::F32(v) => write!(f, "{v}"),
            JitValue::F64(v) => write!(f, "{v}"),
            JitValue::Pointer(v) => write!(f, "{v:#x}"),
        }
    }
}

pub struct Jit<'ctx> {
    engine: ExecutionEngine<'ctx>,
}

impl<'ctx> Jit<'ctx> {
    /// `seed_module` must be the first module ever added; MCJIT derives its
    /// engine from one initial module and grows from there via
    /// `add_module`.
    pub fn new(seed_module: &Module<'ctx>) -> CodegenResult<Self> {
        let engine = seed_module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| CodegenError::Internal(format!("failed to create JIT engine: {e}")))?;
        Ok(Self { engine })
    }

    pub fn add_module(&self, module: &Module<'ctx>) -> CodegenResult<()> {
        self.engine.add_module(module).map_err(|()| CodegenError::ModuleLoadFailed {
            name: module.get_name().to_string_lossy().into_owned(),
            reason: "module is already owned by an execution engine".to_string(),
        })
    }

    /// Detaches `module` from the engine (spec.md §5: REPL resource-tracker
    /// release — each REPL turn's anonymous wrapper module is removed
    /// immediately after it runs so its symbols don't persist).
    pub fn remove_module(&self, module: &Module<'ctx>) -> CodegenResult<()> {
        self.engine.remove_module(module).map_err(|_| CodegenError::ModuleLoadFailed {
            name: module.get_name().to_string_lossy().into_owned(),
            reason: "module was not owned by this execution engine".to_string(),
        })
    }

    /// Resolves and invokes a zero-argument function by name, dispatching
    /// on its declared return type (the only shape the driver ever calls:
    /// `main` and the REPL's synthesized `__anonymous__` wrapper both take
    /// no arguments per spec.md §4.9).
    pub fn call_zero_arg(&self, name: &str, return_type: &Type) -> CodegenResult<JitValue> {
        let addr = self
            .engine
            .get_function_address(name)
            .map_err(|_| CodegenError::SymbolNotFound { name: name.to_string() })?;

        // SAFETY: `addr` was just resolved for a function we ourselves
        // generated with exactly this zero-argument, C-ABI signature; the
        // return type matches what the caller compiled it with.
        unsafe {
            Ok(match return_type {
                Type::Void => {
                    let f: extern "C" fn() = std::mem::transmute(addr);
                    f();
                    JitValue::Void
                }
                Type::I8 => {
                    let f: extern "C" fn() -> i8 = std::mem::transmute(addr);
                    JitValue::I8(f())
                }
                Type::I16 => {
                    let f: extern "C" fn() -> i16 = std::mem::transmute(addr);
                    JitValue::I16(f())
                }
                Type::I32 => {
                    let f: extern "C" fn() -> i32 = std::mem::transmute(addr);
                    JitValue::I32(f())
                }
                Type::I64 => {
                    let f: extern "C" fn() -> i64 = std::mem::transmute(addr);
                    JitValue::I64(f())
                }
                Type::U8 => {
                    let f: extern "C" fn() -> u8 = std::mem::transmute(addr);
                    JitValue::U8(f())
                }
                Type::U16 => {
                    let f: extern "C" fn() -> u16 = std::mem::transmute(addr);
                    JitValue::U16(f())
                }
                Type::U32 => {
                    let f: extern "C" fn() -> u32 = std::mem::transmute(addr);
                    JitValue::U32(f())
                }
                Type::U64 => {
                    let f: extern "C" fn() -> u64 = std::mem::transmute(addr);
                    JitValue::U64(f())
                }
                Type::F32 => {
                    let f: extern "C" fn() -> f32 = std::mem::transmute(addr);
                    JitValue::F32(f())
                }
                Type::F64 => {
                    let f: extern "C" fn() -> f64 = std::mem::transmute(addr);
                    JitValue::F64(f())
                }
                Type::Pointer(_) => {
                    let f: extern "C" fn() -> usize = std::mem::transmute(addr);
                    JitValue::Pointer(f())
                }
                Type::Struct { name, .. } => {
                    return Err(CodegenError::Internal(format!(
                        "by-value struct return ('{name}') is not supported by the JIT entry point"
                    )))
                }
            })
        }
    }
}
