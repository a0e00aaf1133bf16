// Keep the IR types reachable as `crate::ir::*`
pub mod ir;
pub use ir::*;

pub mod lower;
