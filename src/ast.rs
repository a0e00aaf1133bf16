//! Abstract syntax tree for Ember compilation units.
//!
//! The parser builds this tree, the type checker decorates it in place
//! (every expression carries a `Type` that starts out `Unknown` unless the
//! literal form fixes it), and the lowering pass consumes it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::frontend::lexer::Location;

/// Structurally compared value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    String,
    Void,
    /// Matches any argument type when checking calls to variadic externs.
    Any,
    /// Placeholder for an omitted type annotation; resolved (or rejected)
    /// by the type checker before lowering.
    Unknown,
    Pointer(Box<Type>),
    Array { elem: Box<Type>, size: ArraySize },
    Vararg(Box<Type>),
}

impl Type {
    /// Wrap `elem` in `depth` levels of pointer.
    pub fn pointer(elem: Type, depth: usize) -> Type {
        let mut ty = elem;
        for _ in 0..depth {
            ty = Type::Pointer(Box::new(ty));
        }
        ty
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Any => write!(f, "any"),
            Type::Unknown => write!(f, "unknown"),
            Type::Pointer(elem) => write!(f, "^{elem}"),
            Type::Array { elem, size } => write!(f, "[{size}]{elem}"),
            Type::Vararg(elem) => write!(f, "..{elem}"),
        }
    }
}

/// Array extent: either a literal length or a symbolic name resolved by a
/// later pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArraySize {
    Literal(i64),
    Symbol(String),
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySize::Literal(n) => write!(f, "{n}"),
            ArraySize::Symbol(s) => write!(f, "{s}"),
        }
    }
}

// --- Attributes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKey {
    Extern,
    Export,
    Linkname,
    Pure,
    Inline,
    Private,
}

impl FromStr for AttrKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extern" => Ok(AttrKey::Extern),
            "export" => Ok(AttrKey::Export),
            "linkname" => Ok(AttrKey::Linkname),
            "pure" => Ok(AttrKey::Pure),
            "inline" => Ok(AttrKey::Inline),
            "private" => Ok(AttrKey::Private),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttrKey::Extern => "extern",
            AttrKey::Export => "export",
            AttrKey::Linkname => "linkname",
            AttrKey::Pure => "pure",
            AttrKey::Inline => "inline",
            AttrKey::Private => "private",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    None,
    Str(String),
    Int(i64),
}

pub type Attributes = HashMap<AttrKey, AttrValue>;

// --- Compilation unit ---

#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub package: String,
    pub attributes: Attributes,
    pub funcs: Vec<FuncDef>,
    /// Function name -> index into `funcs`; first definition wins.
    index: HashMap<String, usize>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_func(&mut self, def: FuncDef) {
        let i = self.funcs.len();
        self.index.entry(def.name.clone()).or_insert(i);
        self.funcs.push(def);
    }

    pub fn lookup(&self, name: &str) -> Option<&FuncDef> {
        self.index.get(name).map(|&i| &self.funcs[i])
    }
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub attributes: Attributes,
    pub params: Vec<Param>,
    pub return_type: Type,
    /// Extern functions have no body.
    pub body: Option<Body>,
    pub location: Location,
}

impl FuncDef {
    pub fn is_extern(&self) -> bool {
        self.attributes.contains_key(&AttrKey::Extern)
    }

    pub fn is_export(&self) -> bool {
        self.attributes.contains_key(&AttrKey::Export)
    }

    /// External symbol name carried by the `linkname` attribute, if any.
    pub fn linkname(&self) -> Option<&str> {
        match self.attributes.get(&AttrKey::Linkname) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether the trailing parameter makes the function variadic.
    pub fn is_variadic(&self) -> bool {
        matches!(
            self.params.last().map(|p| &p.ty),
            Some(Type::Vararg(_))
        )
    }

    /// Number of parameters that must be matched positionally.
    pub fn fixed_param_count(&self) -> usize {
        if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub default: Option<Expression>,
    pub attributes: Attributes,
    pub location: Location,
}

#[derive(Debug, Clone, Default)]
pub struct Body {
    pub instructions: Vec<Instruction>,
}

/// Statement-level node.
#[derive(Debug, Clone)]
pub enum Instruction {
    Declare {
        name: String,
        ty: Type,
        location: Location,
    },
    Assign {
        target: LValue,
        value: Expression,
        location: Location,
    },
    /// Call in statement position; always an `Expression::Call`.
    Call(Expression),
    Return {
        value: Option<Expression>,
        location: Location,
    },
    If {
        init: Vec<Instruction>,
        cond: Expression,
        then_body: Body,
        /// An `else if` chain is represented as an else body holding a
        /// single nested `If`.
        else_body: Option<Body>,
        location: Location,
    },
    For {
        init: Vec<Instruction>,
        cond: Expression,
        post: Vec<Instruction>,
        body: Body,
        location: Location,
    },
}

/// Assignment target; the parser only admits these two shapes.
#[derive(Debug, Clone)]
pub enum LValue {
    Var {
        name: String,
        ty: Type,
        location: Location,
    },
    Deref {
        ptr: Box<Expression>,
        ty: Type,
        location: Location,
    },
}

#[derive(Debug, Clone)]
pub enum Expression {
    IntLiteral {
        value: i64,
        ty: Type,
        location: Location,
    },
    BoolLiteral {
        value: bool,
        ty: Type,
        location: Location,
    },
    StringLiteral {
        value: String,
        ty: Type,
        location: Location,
    },
    VariableRef {
        name: String,
        ty: Type,
        location: Location,
    },
    Deref {
        ptr: Box<Expression>,
        ty: Type,
        location: Location,
    },
    Binop {
        op: BinOpKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        ty: Type,
        location: Location,
    },
    Call {
        name: String,
        args: Vec<Expression>,
        ty: Type,
        location: Location,
    },
}

impl Expression {
    pub fn int(value: i64, location: Location) -> Self {
        Expression::IntLiteral {
            value,
            ty: Type::Int,
            location,
        }
    }

    pub fn bool(value: bool, location: Location) -> Self {
        Expression::BoolLiteral {
            value,
            ty: Type::Bool,
            location,
        }
    }

    pub fn string(value: String, location: Location) -> Self {
        Expression::StringLiteral {
            value,
            ty: Type::String,
            location,
        }
    }

    pub fn var(name: String, location: Location) -> Self {
        Expression::VariableRef {
            name,
            ty: Type::Unknown,
            location,
        }
    }

    pub fn deref(ptr: Expression, location: Location) -> Self {
        Expression::Deref {
            ptr: Box::new(ptr),
            ty: Type::Unknown,
            location,
        }
    }

    pub fn binop(op: BinOpKind, lhs: Expression, rhs: Expression) -> Self {
        let location = lhs.location().clone();
        Expression::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty: Type::Unknown,
            location,
        }
    }

    pub fn call(name: String, args: Vec<Expression>, location: Location) -> Self {
        Expression::Call {
            name,
            args,
            ty: Type::Unknown,
            location,
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            Expression::IntLiteral { ty, .. }
            | Expression::BoolLiteral { ty, .. }
            | Expression::StringLiteral { ty, .. }
            | Expression::VariableRef { ty, .. }
            | Expression::Deref { ty, .. }
            | Expression::Binop { ty, .. }
            | Expression::Call { ty, .. } => ty,
        }
    }

    pub fn set_ty(&mut self, new_ty: Type) {
        match self {
            Expression::IntLiteral { ty, .. }
            | Expression::BoolLiteral { ty, .. }
            | Expression::StringLiteral { ty, .. }
            | Expression::VariableRef { ty, .. }
            | Expression::Deref { ty, .. }
            | Expression::Binop { ty, .. }
            | Expression::Call { ty, .. } => *ty = new_ty,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Expression::IntLiteral { location, .. }
            | Expression::BoolLiteral { location, .. }
            | Expression::StringLiteral { location, .. }
            | Expression::VariableRef { location, .. }
            | Expression::Deref { location, .. }
            | Expression::Binop { location, .. }
            | Expression::Call { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

impl BinOpKind {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinOpKind::LogAnd | BinOpKind::LogOr)
    }
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::Shl => "<<",
            BinOpKind::Shr => ">>",
            BinOpKind::BitAnd => "&",
            BinOpKind::BitOr => "|",
            BinOpKind::Eq => "==",
            BinOpKind::Ne => "!=",
            BinOpKind::Lt => "<",
            BinOpKind::Le => "<=",
            BinOpKind::Gt => ">",
            BinOpKind::Ge => ">=",
            BinOpKind::LogAnd => "&&",
            BinOpKind::LogOr => "||",
        };
        write!(f, "{s}")
    }
}
