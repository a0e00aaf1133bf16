//! Compiler front-end and mid-end for the Ember language.
//!
//! The pipeline runs `source text → tokens → AST → typed AST → SSA-style
//! IR`, single-threaded, each pass short-circuiting on its first error.
//! Serializing the IR for a backend, assembling and linking are external
//! concerns; this crate stops at the `ir::CompilationUnit`.

pub mod ast;
pub mod frontend;
pub mod ir;
pub mod typecheck;

use thiserror::Error;

pub use frontend::lexer::{LexError, Location};
pub use frontend::parser::ParseError;
pub use ir::lower::InternalError;
pub use typecheck::{TypeError, TypeErrorKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Compile a source buffer to IR, attributing diagnostics to `<input>`.
pub fn compile_to_ir(source: &str) -> Result<ir::CompilationUnit, CompileError> {
    compile_file_to_ir("<input>", source)
}

/// Compile a source buffer to IR, attributing diagnostics to `file`.
pub fn compile_file_to_ir(file: &str, source: &str) -> Result<ir::CompilationUnit, CompileError> {
    let tokens = frontend::lexer::lex(file, source)?;
    let mut unit = frontend::parser::parse(tokens)?;
    typecheck::check(&mut unit)?;

    Ok(ir::lower::lower(&unit)?)
}
