//! Statement lowering: functions, assignments, returns, `if` and `for`.

use crate::ast;
use crate::ir::{BinOp, FuncDef, Instr, Linkage, Param, Val};

use super::context::Gen;
use super::InternalError;

impl Gen<'_> {
    pub fn lower_func(&mut self, func: &ast::FuncDef) -> Result<(), InternalError> {
        self.reset_function();

        let params = func
            .params
            .iter()
            .map(|p| Param {
                abi: self.abi_of(&p.ty),
                name: p.name.clone(),
            })
            .collect();

        let link_name = func.linkname().map(str::to_string);
        let linkage = func.is_export().then_some(Linkage::Export);
        let ret = (!func.return_type.is_void()).then(|| self.abi_of(&func.return_type));

        let body = match &func.body {
            Some(body) => {
                self.lower_body(body)?;
                Some(std::mem::take(&mut self.instrs))
            }
            None => None,
        };

        self.unit.func_defs.push(FuncDef {
            name: func.name.clone(),
            link_name,
            linkage,
            ret,
            params,
            body,
        });

        Ok(())
    }

    pub fn lower_body(&mut self, body: &ast::Body) -> Result<(), InternalError> {
        for instr in &body.instructions {
            self.lower_instruction(instr)?;
        }
        Ok(())
    }

    pub fn lower_instruction(&mut self, instr: &ast::Instruction) -> Result<(), InternalError> {
        match instr {
            // Locals live in virtual registers; the declaration itself
            // emits nothing.
            ast::Instruction::Declare { .. } => Ok(()),
            ast::Instruction::Assign { target, value, .. } => self.lower_assign(target, value),
            ast::Instruction::Call(expr) => match expr {
                ast::Expression::Call { name, args, ty, .. } => {
                    self.lower_call(name, args, ty)?;
                    Ok(())
                }
                _ => Err(InternalError::new(
                    "call statement does not hold a call expression",
                )),
            },
            ast::Instruction::Return { value, .. } => {
                let val = match value {
                    Some(expr) => Some(self.lower_expr(expr)?),
                    None => None,
                };
                self.emit(Instr::Ret(val));
                Ok(())
            }
            ast::Instruction::If {
                init,
                cond,
                then_body,
                else_body,
                ..
            } => self.lower_if(init, cond, then_body, else_body.as_ref()),
            ast::Instruction::For {
                init,
                cond,
                post,
                body,
                ..
            } => self.lower_for(init, cond, post, body),
        }
    }

    fn lower_assign(
        &mut self,
        target: &ast::LValue,
        value: &ast::Expression,
    ) -> Result<(), InternalError> {
        match target {
            ast::LValue::Var { name, .. } => {
                let val = self.lower_expr(value)?;
                // add 0 as a move into the named register
                self.emit(Instr::Binop {
                    op: BinOp::Add,
                    dest: Val::Ident(name.clone()),
                    lhs: val,
                    rhs: Val::Integer(0),
                });
            }
            ast::LValue::Deref { ptr, .. } => {
                let addr = self.lower_expr(ptr)?;
                let val = self.lower_expr(value)?;
                self.emit(Instr::Store { value: val, addr });
            }
        }
        Ok(())
    }

    /// Shape of a lowered `if`:
    ///
    /// ```text
    ///     <init>
    ///     <cond>
    ///     jnz %cond, @then, @else
    /// @then:
    ///     <then block>
    ///     jmp @end
    /// @else:
    ///     <else block, if any>
    /// @end:
    /// ```
    fn lower_if(
        &mut self,
        init: &[ast::Instruction],
        cond: &ast::Expression,
        then_body: &ast::Body,
        else_body: Option<&ast::Body>,
    ) -> Result<(), InternalError> {
        let then_label = self.next_label("then");
        let else_label = self.next_label("else");
        let end_label = self.next_label("end");

        for instr in init {
            self.lower_instruction(instr)?;
        }

        let cond_val = self.lower_expr(cond)?;
        self.emit(Instr::Jnz {
            cond: cond_val,
            if_true: then_label.clone(),
            if_false: else_label.clone(),
        });

        self.emit(Instr::Label(then_label));
        self.lower_body(then_body)?;
        self.emit(Instr::Jmp(end_label.clone()));

        self.emit(Instr::Label(else_label));
        if let Some(else_body) = else_body {
            self.lower_body(else_body)?;
        }

        self.emit(Instr::Label(end_label));
        Ok(())
    }

    /// Shape of a lowered `for`:
    ///
    /// ```text
    ///     <init>
    /// @for:
    ///     <cond>
    ///     jnz %cond, @body, @end
    /// @body:
    ///     <loop body>
    ///     <post>
    ///     jmp @for
    /// @end:
    /// ```
    fn lower_for(
        &mut self,
        init: &[ast::Instruction],
        cond: &ast::Expression,
        post: &[ast::Instruction],
        body: &ast::Body,
    ) -> Result<(), InternalError> {
        let start_label = self.next_label("for");
        let body_label = self.next_label("body");
        let end_label = self.next_label("end");

        for instr in init {
            self.lower_instruction(instr)?;
        }

        self.emit(Instr::Label(start_label.clone()));
        let cond_val = self.lower_expr(cond)?;
        self.emit(Instr::Jnz {
            cond: cond_val,
            if_true: body_label.clone(),
            if_false: end_label.clone(),
        });

        self.emit(Instr::Label(body_label));
        self.lower_body(body)?;
        for instr in post {
            self.lower_instruction(instr)?;
        }
        self.emit(Instr::Jmp(start_label));

        self.emit(Instr::Label(end_label));
        Ok(())
    }
}
