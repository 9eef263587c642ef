//! Value-type representation and the user-type registry for xcc
//! (spec.md §3, §4.3).
//!
//! This crate has no knowledge of LLVM or of the AST; it only models the
//! value-type lattice and its widening order. Lowering a `Type` to an
//! LLVM `BasicTypeEnum`, and mapping parse-time `TypeExpr` nodes onto
//! this lattice, both live in `xcc_ir` since they depend on an
//! in-progress compilation (the registry needs struct definitions that
//! are only known mid-lowering).

pub mod types;

pub use types::{Type, TypeRegistry};
