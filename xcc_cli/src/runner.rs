//! Whole-program mode (spec.md §6.4, §4.9.1): reads a source file in full
//! and hands it to the core driver as a single unit, which synthesizes and
//! invokes a call to `main`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use inkwell::context::Context as LlvmContext;
use log::info;

use xcc_ir::GlobalContext;

pub fn run_file(path: &Path, emit_ir: bool) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read source file: {}", path.display()))?;

    let llvm_ctx = LlvmContext::create();
    let mut gctx = GlobalContext::new(&llvm_ctx).context("failed to initialize the JIT")?;

    info!("compiling '{}'", path.display());
    xcc_ir::run(&mut gctx, &source, false, emit_ir)?;
    Ok(())
}
