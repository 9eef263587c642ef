//! AST-to-IR lowering, module/JIT lifecycle management, and the top-level
//! driver for `xcc` (spec.md §4.4 – §4.9).
//!
//! This crate owns everything downstream of the parser: resolving parsed
//! `TypeExpr`s against the type registry, lowering the AST to LLVM IR via
//! `inkwell`, the binary-operator dispatch table, the coercion matrix, the
//! per-compilation-unit/cross-module contexts, the JIT wrapper, and the
//! driver that threads a unit of source text through all of the above.

pub mod binop;
pub mod cast;
pub mod context;
pub mod driver;
pub mod error;
pub mod jit;
pub mod lower;
pub mod types;

pub use context::{FunctionMeta, GlobalContext, ModuleContext, TypedValue};
pub use driver::{run, run_expr, run_function};
pub use error::{CodegenError, CodegenResult};
pub use jit::{Jit, JitValue};
