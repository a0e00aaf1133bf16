//! Type resolution and checking.
//!
//! Runs between parsing and lowering: resolves every `Unknown` left by an
//! omitted annotation, decorates every expression with its type, and
//! rejects ill-typed programs. The first error aborts the pass.

pub mod scope;

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{
    BinOpKind, CompilationUnit, Expression, FuncDef, Instruction, LValue, Type,
};
use crate::frontend::lexer::Location;
use scope::ScopeStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    Mismatch,
    UnknownIdentifier,
    UnknownFunction,
    Redeclaration,
    ArityMismatch,
    NonBoolCondition,
    InvalidAssignment,
    InvalidOperand,
    ReturnMismatch,
    CannotInfer,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at {location}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub location: Location,
    pub message: String,
}

impl TypeError {
    fn new(kind: TypeErrorKind, location: &Location, message: String) -> Self {
        Self {
            kind,
            location: location.clone(),
            message,
        }
    }
}

/// Callable signature recorded before function bodies are checked, so call
/// sites resolve independent of declaration order.
#[derive(Debug, Clone)]
struct Signature {
    params: Vec<Type>,
    ret: Type,
    fixed: usize,
    variadic: bool,
}

pub fn check(unit: &mut CompilationUnit) -> Result<(), TypeError> {
    // Resolve omitted parameter types from literal default values before
    // signatures are recorded.
    for func in unit.funcs.iter_mut() {
        for param in func.params.iter_mut() {
            if !param.ty.is_unknown() {
                continue;
            }

            let inferred = param.default.as_ref().and_then(literal_type);
            match inferred {
                Some(ty) => param.ty = ty,
                None => {
                    return Err(TypeError::new(
                        TypeErrorKind::CannotInfer,
                        &param.location,
                        format!(
                            "parameter `{}` needs a type annotation or a literal default",
                            param.name
                        ),
                    ))
                }
            }
        }
    }

    let mut funcs = HashMap::new();
    for func in &unit.funcs {
        if funcs.contains_key(&func.name) {
            return Err(TypeError::new(
                TypeErrorKind::Redeclaration,
                &func.location,
                format!("function `{}` is already defined", func.name),
            ));
        }

        funcs.insert(
            func.name.clone(),
            Signature {
                params: func.params.iter().map(|p| p.ty.clone()).collect(),
                ret: func.return_type.clone(),
                fixed: func.fixed_param_count(),
                variadic: func.is_variadic(),
            },
        );
    }

    let mut checker = Checker {
        funcs,
        scopes: ScopeStack::new(),
        current_ret: Type::Void,
    };

    for func in unit.funcs.iter_mut() {
        checker.check_func(func)?;
    }

    Ok(())
}

/// Type of a literal expression, if it is one.
fn literal_type(e: &Expression) -> Option<Type> {
    match e {
        Expression::IntLiteral { .. } => Some(Type::Int),
        Expression::BoolLiteral { .. } => Some(Type::Bool),
        Expression::StringLiteral { .. } => Some(Type::String),
        _ => None,
    }
}

struct Checker {
    funcs: HashMap<String, Signature>,
    scopes: ScopeStack,
    current_ret: Type,
}

impl Checker {
    fn check_func(&mut self, func: &mut FuncDef) -> Result<(), TypeError> {
        self.current_ret = func.return_type.clone();
        self.scopes.push();

        for param in &func.params {
            if self.scopes.declare(&param.name, param.ty.clone()).is_err() {
                return Err(TypeError::new(
                    TypeErrorKind::Redeclaration,
                    &param.location,
                    format!("duplicate parameter `{}`", param.name),
                ));
            }
        }

        for param in func.params.iter_mut() {
            let expected = param.ty.clone();
            if let Some(default) = param.default.as_mut() {
                let got = self.check_expr(default)?;
                if got != expected {
                    return Err(TypeError::new(
                        TypeErrorKind::Mismatch,
                        default.location(),
                        format!(
                            "default value of parameter `{}` has type {got}, expected {expected}",
                            param.name
                        ),
                    ));
                }
            }
        }

        if let Some(body) = func.body.as_mut() {
            self.check_instructions(&mut body.instructions)?;
        }

        self.scopes.pop();
        Ok(())
    }

    /// Check a sequence of instructions in the current scope. A `Declare`
    /// with an omitted type takes its type from the initializing `Assign`
    /// the parser placed directly after it.
    fn check_instructions(&mut self, instrs: &mut [Instruction]) -> Result<(), TypeError> {
        let mut i = 0;

        while i < instrs.len() {
            let (head, tail) = instrs.split_at_mut(i + 1);
            match &mut head[i] {
                Instruction::Declare { name, ty, location } => {
                    if ty.is_unknown() {
                        let init = match tail.first_mut() {
                            Some(Instruction::Assign {
                                target: LValue::Var { name: target, .. },
                                value,
                                ..
                            }) if target == name => Some(value),
                            _ => None,
                        };

                        let Some(value) = init else {
                            return Err(TypeError::new(
                                TypeErrorKind::CannotInfer,
                                location,
                                format!("cannot infer type of `{name}` without an initializer"),
                            ));
                        };

                        *ty = self.check_expr(value)?;
                    }

                    if ty.is_void() {
                        return Err(TypeError::new(
                            TypeErrorKind::Mismatch,
                            location,
                            format!("cannot declare `{name}` with type void"),
                        ));
                    }

                    if self.scopes.declare(name, ty.clone()).is_err() {
                        return Err(TypeError::new(
                            TypeErrorKind::Redeclaration,
                            location,
                            format!("`{name}` is already declared in this scope"),
                        ));
                    }
                }
                other => self.check_instruction(other)?,
            }
            i += 1;
        }

        Ok(())
    }

    fn check_instruction(&mut self, instr: &mut Instruction) -> Result<(), TypeError> {
        match instr {
            Instruction::Declare { name, ty, location } => {
                // A declaration without an adjacent initializer; the type
                // must have been written out.
                if ty.is_unknown() {
                    return Err(TypeError::new(
                        TypeErrorKind::CannotInfer,
                        location,
                        format!("cannot infer type of `{name}` without an initializer"),
                    ));
                }
                if self.scopes.declare(name, ty.clone()).is_err() {
                    return Err(TypeError::new(
                        TypeErrorKind::Redeclaration,
                        location,
                        format!("`{name}` is already declared in this scope"),
                    ));
                }
                Ok(())
            }
            Instruction::Assign { target, value, .. } => self.check_assign(target, value),
            Instruction::Call(expr) => {
                // Statement position: a non-void result is discarded.
                self.check_expr(expr)?;
                Ok(())
            }
            Instruction::Return { value, location } => match value {
                Some(expr) => {
                    let got = self.check_expr(expr)?;
                    if got != self.current_ret {
                        return Err(TypeError::new(
                            TypeErrorKind::ReturnMismatch,
                            expr.location(),
                            format!(
                                "return value has type {got}, expected {}",
                                self.current_ret
                            ),
                        ));
                    }
                    Ok(())
                }
                None => {
                    if !self.current_ret.is_void() {
                        return Err(TypeError::new(
                            TypeErrorKind::ReturnMismatch,
                            location,
                            format!("missing return value of type {}", self.current_ret),
                        ));
                    }
                    Ok(())
                }
            },
            Instruction::If {
                init,
                cond,
                then_body,
                else_body,
                ..
            } => {
                self.scopes.push();
                self.check_instructions(init)?;
                self.check_condition(cond)?;
                self.check_block(&mut then_body.instructions)?;
                if let Some(else_body) = else_body {
                    self.check_block(&mut else_body.instructions)?;
                }
                self.scopes.pop();
                Ok(())
            }
            Instruction::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.scopes.push();
                self.check_instructions(init)?;
                self.check_condition(cond)?;
                self.check_block(&mut body.instructions)?;
                self.check_instructions(post)?;
                self.scopes.pop();
                Ok(())
            }
        }
    }

    fn check_block(&mut self, instrs: &mut [Instruction]) -> Result<(), TypeError> {
        self.scopes.push();
        let result = self.check_instructions(instrs);
        self.scopes.pop();
        result
    }

    fn check_condition(&mut self, cond: &mut Expression) -> Result<(), TypeError> {
        let ty = self.check_expr(cond)?;
        if ty != Type::Bool {
            return Err(TypeError::new(
                TypeErrorKind::NonBoolCondition,
                cond.location(),
                format!("condition has type {ty}, expected bool"),
            ));
        }
        Ok(())
    }

    fn check_assign(&mut self, target: &mut LValue, value: &mut Expression) -> Result<(), TypeError> {
        let got = self.check_expr(value)?;

        match target {
            LValue::Var { name, ty, location } => {
                let Some(declared) = self.scopes.lookup(name) else {
                    return Err(TypeError::new(
                        TypeErrorKind::UnknownIdentifier,
                        location,
                        format!("unknown identifier `{name}`"),
                    ));
                };
                let declared = declared.clone();

                if got != declared {
                    return Err(TypeError::new(
                        TypeErrorKind::Mismatch,
                        value.location(),
                        format!("cannot assign {got} to `{name}` of type {declared}"),
                    ));
                }

                *ty = declared;
                Ok(())
            }
            LValue::Deref { ptr, ty, location } => {
                let pt = self.check_expr(ptr)?;
                let Type::Pointer(elem) = pt else {
                    return Err(TypeError::new(
                        TypeErrorKind::InvalidAssignment,
                        location,
                        format!("cannot assign through a value of type {pt}"),
                    ));
                };

                if got != *elem {
                    return Err(TypeError::new(
                        TypeErrorKind::Mismatch,
                        value.location(),
                        format!("cannot store {got} through a pointer to {elem}"),
                    ));
                }

                *ty = *elem;
                Ok(())
            }
        }
    }

    fn check_expr(&mut self, e: &mut Expression) -> Result<Type, TypeError> {
        let ty = match e {
            Expression::IntLiteral { .. } => Type::Int,
            Expression::BoolLiteral { .. } => Type::Bool,
            Expression::StringLiteral { .. } => Type::String,
            Expression::VariableRef { name, location, .. } => {
                let Some(ty) = self.scopes.lookup(name) else {
                    return Err(TypeError::new(
                        TypeErrorKind::UnknownIdentifier,
                        location,
                        format!("unknown identifier `{name}`"),
                    ));
                };
                ty.clone()
            }
            Expression::Deref { ptr, location, .. } => {
                let pt = self.check_expr(ptr)?;
                let Type::Pointer(elem) = pt else {
                    return Err(TypeError::new(
                        TypeErrorKind::InvalidOperand,
                        location,
                        format!("cannot dereference a value of type {pt}"),
                    ));
                };
                *elem
            }
            Expression::Binop {
                op,
                lhs,
                rhs,
                location,
                ..
            } => {
                let op = *op;
                let location = location.clone();
                let lt = self.check_expr(lhs)?;
                let rt = self.check_expr(rhs)?;
                binop_type(op, lt, rt, &location)?
            }
            Expression::Call {
                name,
                args,
                location,
                ..
            } => {
                let Some(sig) = self.funcs.get(name) else {
                    return Err(TypeError::new(
                        TypeErrorKind::UnknownFunction,
                        location,
                        format!("unknown function `{name}`"),
                    ));
                };
                let sig = sig.clone();
                let name = name.clone();
                let location = location.clone();

                if args.len() < sig.fixed || (!sig.variadic && args.len() > sig.fixed) {
                    let shape = if sig.variadic { "at least " } else { "" };
                    return Err(TypeError::new(
                        TypeErrorKind::ArityMismatch,
                        &location,
                        format!(
                            "`{name}` expects {shape}{} argument(s), got {}",
                            sig.fixed,
                            args.len()
                        ),
                    ));
                }

                for (i, arg) in args.iter_mut().enumerate() {
                    let got = self.check_expr(arg)?;
                    let expected = if i < sig.fixed {
                        &sig.params[i]
                    } else {
                        // Extra arguments match the vararg element type.
                        match sig.params.last() {
                            Some(Type::Vararg(elem)) => elem.as_ref(),
                            _ => &Type::Any,
                        }
                    };

                    if !matches!(expected, Type::Any) && got != *expected {
                        return Err(TypeError::new(
                            TypeErrorKind::Mismatch,
                            arg.location(),
                            format!(
                                "argument {} of `{name}` has type {got}, expected {expected}",
                                i + 1
                            ),
                        ));
                    }
                }

                sig.ret
            }
        };

        e.set_ty(ty.clone());
        Ok(ty)
    }
}

fn binop_type(
    op: BinOpKind,
    lt: Type,
    rt: Type,
    location: &Location,
) -> Result<Type, TypeError> {
    use BinOpKind::*;

    let mismatch = |lt: &Type, rt: &Type| {
        TypeError::new(
            TypeErrorKind::Mismatch,
            location,
            format!("operator `{op}` cannot be applied to {lt} and {rt}"),
        )
    };

    match op {
        Add | Sub => {
            if lt == Type::Int && rt == Type::Int {
                Ok(Type::Int)
            } else if matches!(lt, Type::Pointer(_)) && rt == Type::Int {
                Ok(lt)
            } else if op == Add && lt == Type::Int && matches!(rt, Type::Pointer(_)) {
                Ok(rt)
            } else {
                Err(mismatch(&lt, &rt))
            }
        }
        Mul | Div | Shl | Shr | BitAnd | BitOr => {
            if lt == Type::Int && rt == Type::Int {
                Ok(Type::Int)
            } else {
                Err(mismatch(&lt, &rt))
            }
        }
        Eq | Ne | Lt | Le | Gt | Ge => {
            if lt == rt && (lt == Type::Int || lt == Type::Bool) {
                Ok(Type::Bool)
            } else {
                Err(mismatch(&lt, &rt))
            }
        }
        LogAnd | LogOr => {
            if lt == Type::Bool && rt == Type::Bool {
                Ok(Type::Bool)
            } else {
                Err(mismatch(&lt, &rt))
            }
        }
    }
}
