//! Code-generation error taxonomy (spec.md §7, SPEC_FULL.md §7.1).

use thiserror::Error;

/// Errors raised while lowering an AST to IR, or while the JIT resolves
/// and runs a compiled unit. Every variant that originates from a
/// specific AST node carries the node's source line; variants that
/// describe a purely structural failure (backend verification, an
/// internal invariant) do not have one to report.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("line {line}: undefined identifier '{name}'")]
    UndefinedIdentifier { line: usize, name: String },

    #[error("line {line}: function '{name}' expects {expected} argument(s), got {actual}")]
    ArgumentCountMismatch {
        line: usize,
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported binary operator {op:?} for type mask {type_mask:#b}")]
    UnsupportedBinaryOp { op: String, type_mask: u8 },

    #[error("line {line}: unknown type name '{name}'")]
    UnknownTypeName { line: usize, name: String },

    #[error("line {line}: struct '{struct_name}' has no field '{field}'")]
    UnknownStructField {
        line: usize,
        struct_name: String,
        field: String,
    },

    #[error("line {line}: can't perform cast from {from} to {to}")]
    InvalidCast { line: usize, from: String, to: String },

    #[error("function '{name}' failed LLVM verification: {diagnostic}")]
    VerificationFailed { name: String, diagnostic: String },

    #[error("function '{name}' is already defined")]
    FunctionCollision { name: String },

    #[error("function '{name}' has no definition or declaration")]
    FunctionAbsent { name: String },

    #[error("line {line}: '{construct}' requires an lvalue operand")]
    NotAnLvalue { line: usize, construct: String },

    #[error("line {line}: subscript base must be a pointer type, found {found}")]
    SubscriptOnNonPointer { line: usize, found: String },

    #[error("line {line}: member access base must be a struct (or pointer to struct), found {found}")]
    MemberAccessOnNonStruct { line: usize, found: String },

    #[error("line {line}: variable '{name}' needs either a type annotation or an initializer")]
    AmbiguousVarDeclType { line: usize, name: String },

    #[error("module with name '{name}' could not be added to the JIT: {reason}")]
    ModuleLoadFailed { name: String, reason: String },

    #[error("symbol '{name}' could not be resolved by the JIT")]
    SymbolNotFound { name: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CodegenResult<T> = std::result::Result<T, CodegenError>;
