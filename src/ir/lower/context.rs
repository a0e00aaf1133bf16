use crate::ast;
use crate::ir::{AbiTy, CompilationUnit, Instr};

/// Lowering state. The instruction buffer and the name counters belong to
/// the function currently being lowered.
pub struct Gen<'a> {
    /// Checked source unit, used for O(1) callee lookup.
    pub ast: &'a ast::CompilationUnit,
    pub unit: CompilationUnit,
    pub instrs: Vec<Instr>,
    tmp_counter: usize,
    label_counter: usize,
}

impl<'a> Gen<'a> {
    pub fn new(ast: &'a ast::CompilationUnit) -> Self {
        Self {
            ast,
            unit: CompilationUnit::new(ast.package.clone()),
            instrs: Vec::new(),
            tmp_counter: 0,
            label_counter: 0,
        }
    }

    pub fn finish(self) -> CompilationUnit {
        self.unit
    }

    /// Counters restart at each function boundary; IR names only need to be
    /// unique within one function.
    pub fn reset_function(&mut self) {
        self.tmp_counter = 0;
        self.label_counter = 0;
        self.instrs.clear();
    }

    /// Fresh `_tmp_0001`-style identifier.
    pub fn next_ident(&mut self, prefix: &str) -> String {
        self.tmp_counter += 1;
        format!("_{}_{:04}", prefix, self.tmp_counter)
    }

    /// Fresh `L0001_then`-style label.
    pub fn next_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("L{:04}_{}", self.label_counter, tag)
    }

    /// Append an instruction. A non-label instruction directly after a
    /// `Ret` is preceded by a fresh label, so no code ever follows a return
    /// within its block.
    pub fn emit(&mut self, instr: Instr) {
        if !matches!(instr, Instr::Label(_))
            && matches!(self.instrs.last(), Some(Instr::Ret(_)))
        {
            let label = self.next_label("block");
            self.instrs.push(Instr::Label(label));
        }

        self.instrs.push(instr);
    }

    pub fn abi_of(&self, ty: &ast::Type) -> AbiTy {
        match ty {
            ast::Type::Int | ast::Type::Bool => AbiTy::Word,
            ast::Type::String => AbiTy::Long,
            ast::Type::Pointer(_) => AbiTy::Long,
            _ => AbiTy::Word,
        }
    }
}
