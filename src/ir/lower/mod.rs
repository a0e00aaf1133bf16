//! AST → IR lowering.
//!
//! Walks the typed AST and appends instructions linearly; control flow
//! becomes labels and conditional jumps, string literals become data
//! definitions. The temporary and label counters are reset at every
//! function boundary so the produced IR is deterministic.

pub mod context;
pub mod expr;
pub mod stmt;

use thiserror::Error;

use crate::ast;
use crate::ir::CompilationUnit;

pub use context::Gen;

/// Invariant violation inside the lowering pass. Reaching one of these
/// means an earlier pass let an ill-formed tree through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("internal error: {message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lower a checked compilation unit to IR.
pub fn lower(unit: &ast::CompilationUnit) -> Result<CompilationUnit, InternalError> {
    let mut gen = Gen::new(unit);

    for func in &unit.funcs {
        gen.lower_func(func)?;
    }

    Ok(gen.finish())
}
