//! Expression lowering. Every expression produces a `Val` and may append
//! instructions along the way.

use crate::ast;
use crate::ir::{Arg, BinOp, DataDef, Instr, Val};

use super::context::Gen;
use super::InternalError;

impl Gen<'_> {
    pub fn lower_expr(&mut self, e: &ast::Expression) -> Result<Val, InternalError> {
        match e {
            ast::Expression::IntLiteral { value, .. } => Ok(Val::Integer(*value)),
            ast::Expression::BoolLiteral { value, .. } => {
                Ok(Val::Integer(if *value { 1 } else { 0 }))
            }
            ast::Expression::StringLiteral { value, .. } => {
                // Equal literals are interned separately; deduplication is
                // a non-requirement.
                let name = self.next_ident("str");
                self.unit.data_defs.push(DataDef::string_z(name.clone(), value));
                Ok(Val::Global(name))
            }
            ast::Expression::VariableRef { name, .. } => Ok(Val::Ident(name.clone())),
            ast::Expression::Deref { ptr, .. } => {
                let addr = self.lower_expr(ptr)?;
                let dest = Val::Ident(self.next_ident("tmp"));
                self.emit(Instr::Load {
                    dest: dest.clone(),
                    addr,
                });
                Ok(dest)
            }
            ast::Expression::Binop { op, lhs, rhs, .. } => self.lower_binop(*op, lhs, rhs),
            ast::Expression::Call { name, args, ty, .. } => self
                .lower_call(name, args, ty)?
                .ok_or_else(|| InternalError::new("void call used as an expression")),
        }
    }

    fn lower_binop(
        &mut self,
        op: ast::BinOpKind,
        lhs: &ast::Expression,
        rhs: &ast::Expression,
    ) -> Result<Val, InternalError> {
        let left = self.lower_expr(lhs)?;
        let result = Val::Ident(self.next_ident("tmp"));

        if op.is_logical() {
            return self.lower_short_circuit(op, left, result, rhs);
        }

        let right = self.lower_expr(rhs)?;
        let ir_op = map_binop(op)
            .ok_or_else(|| InternalError::new(format!("unsupported binary operation `{op}`")))?;

        // Pointer arithmetic: scale the integer side by the element size
        // before adding or subtracting.
        if matches!(op, ast::BinOpKind::Add | ast::BinOpKind::Sub) {
            let lhs_ptr = matches!(lhs.ty(), ast::Type::Pointer(_));
            let rhs_ptr = matches!(rhs.ty(), ast::Type::Pointer(_));

            if lhs_ptr != rhs_ptr {
                let (ptr_side, int_side, ptr_ty) = if lhs_ptr {
                    (left.clone(), right.clone(), lhs.ty())
                } else {
                    (right.clone(), left.clone(), rhs.ty())
                };

                let size = elem_size(ptr_ty);
                if size != 1 {
                    let scaled = Val::Ident(self.next_ident("idx"));
                    self.emit(Instr::Binop {
                        op: BinOp::Mul,
                        dest: scaled.clone(),
                        lhs: int_side,
                        rhs: Val::Integer(size),
                    });
                    self.emit(Instr::Binop {
                        op: ir_op,
                        dest: result.clone(),
                        lhs: ptr_side,
                        rhs: scaled,
                    });
                    return Ok(result);
                }
            }
        }

        self.emit(Instr::Binop {
            op: ir_op,
            dest: result.clone(),
            lhs: left,
            rhs: right,
        });
        Ok(result)
    }

    /// Shape of a lowered `&&` (the `||` form swaps the arm order):
    ///
    /// ```text
    ///     jnz %left, @true, @false
    /// @false:
    ///     %result = add %left, 0
    ///     jmp @end
    /// @true:
    ///     <right>
    ///     %result = add %right, 0
    /// @end:
    /// ```
    ///
    /// The left value is kept when it decides the outcome, the right value
    /// otherwise.
    fn lower_short_circuit(
        &mut self,
        op: ast::BinOpKind,
        left: Val,
        result: Val,
        rhs: &ast::Expression,
    ) -> Result<Val, InternalError> {
        let true_label = self.next_label("true");
        let false_label = self.next_label("false");
        let end_label = self.next_label("end");

        self.emit(Instr::Jnz {
            cond: left.clone(),
            if_true: true_label.clone(),
            if_false: false_label.clone(),
        });

        let (keep_label, eval_label) = match op {
            ast::BinOpKind::LogAnd => (false_label, true_label),
            _ => (true_label, false_label),
        };

        self.emit(Instr::Label(keep_label));
        self.emit(Instr::Binop {
            op: BinOp::Add,
            dest: result.clone(),
            lhs: left,
            rhs: Val::Integer(0),
        });
        self.emit(Instr::Jmp(end_label.clone()));

        self.emit(Instr::Label(eval_label));
        let right = self.lower_expr(rhs)?;
        self.emit(Instr::Binop {
            op: BinOp::Add,
            dest: result.clone(),
            lhs: right,
            rhs: Val::Integer(0),
        });

        self.emit(Instr::Label(end_label));
        Ok(result)
    }

    /// Lower a call. Returns the result value when the callee returns one.
    /// A callee with a `linkname` attribute is called through the external
    /// symbol instead of its source name.
    pub fn lower_call(
        &mut self,
        name: &str,
        args: &[ast::Expression],
        ty: &ast::Type,
    ) -> Result<Option<Val>, InternalError> {
        let mut ir_args = Vec::with_capacity(args.len());
        for arg in args {
            let abi = self.abi_of(arg.ty());
            let val = self.lower_expr(arg)?;
            ir_args.push(Arg { abi, val });
        }

        let symbol = self
            .ast
            .lookup(name)
            .and_then(|f| f.linkname())
            .unwrap_or(name)
            .to_string();

        let dest = if ty.is_void() {
            None
        } else {
            Some((self.next_ident("tmp"), self.abi_of(ty)))
        };

        self.emit(Instr::Call {
            dest: dest.clone(),
            callee: Val::Global(symbol),
            args: ir_args,
        });

        Ok(dest.map(|(ident, _)| Val::Ident(ident)))
    }
}

fn map_binop(op: ast::BinOpKind) -> Option<BinOp> {
    let mapped = match op {
        ast::BinOpKind::Add => BinOp::Add,
        ast::BinOpKind::Sub => BinOp::Sub,
        ast::BinOpKind::Mul => BinOp::Mul,
        ast::BinOpKind::Div => BinOp::Div,
        ast::BinOpKind::Shl => BinOp::Shl,
        ast::BinOpKind::Shr => BinOp::Shr,
        ast::BinOpKind::BitAnd => BinOp::And,
        ast::BinOpKind::BitOr => BinOp::Or,
        ast::BinOpKind::Eq => BinOp::Eq,
        ast::BinOpKind::Ne => BinOp::Ne,
        ast::BinOpKind::Lt => BinOp::Lt,
        ast::BinOpKind::Le => BinOp::Le,
        ast::BinOpKind::Gt => BinOp::Gt,
        ast::BinOpKind::Ge => BinOp::Ge,
        ast::BinOpKind::LogAnd | ast::BinOpKind::LogOr => return None,
    };
    Some(mapped)
}

/// Pointer element size used for address scaling. Every pointable type in
/// the current surface is int-sized; a full per-type size table is a
/// backend concern.
fn elem_size(_ptr_ty: &ast::Type) -> i64 {
    4
}
