//! SSA-style intermediate representation: a linear instruction list per
//! function, with basic blocks implied by `Label` markers, plus data
//! definitions for interned string literals.

use std::fmt;

/// Backend-facing size/kind tag attached to parameters, call arguments and
/// return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiTy {
    /// 32-bit word.
    Word,
    /// 64-bit long; also pointers.
    Long,
    /// 32-bit float.
    Single,
    /// 64-bit float.
    Double,
}

impl AbiTy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbiTy::Word => "w",
            AbiTy::Long => "l",
            AbiTy::Single => "s",
            AbiTy::Double => "d",
        }
    }
}

impl fmt::Display for AbiTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An IR operand: integer constant, global symbol, or local SSA identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    Integer(i64),
    Global(String),
    Ident(String),
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Integer(n) => write!(f, "{n}"),
            Val::Global(name) => write!(f, "${name}"),
            Val::Ident(name) => write!(f, "%{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub abi: AbiTy,
    pub val: Val,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Binop {
        op: BinOp,
        dest: Val,
        lhs: Val,
        rhs: Val,
    },
    Call {
        /// Result identifier and its ABI type, when the callee returns a
        /// value.
        dest: Option<(String, AbiTy)>,
        callee: Val,
        args: Vec<Arg>,
    },
    Ret(Option<Val>),
    Jnz {
        cond: Val,
        if_true: String,
        if_false: String,
    },
    Jmp(String),
    Label(String),
    Load {
        dest: Val,
        addr: Val,
    },
    Store {
        value: Val,
        addr: Val,
    },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Binop { op, dest, lhs, rhs } => write!(f, "{dest} = {op} {lhs}, {rhs}"),
            Instr::Call { dest, callee, args } => {
                if let Some((name, abi)) = dest {
                    write!(f, "%{name} ={abi} ")?;
                }
                write!(f, "call {callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", arg.abi, arg.val)?;
                }
                write!(f, ")")
            }
            Instr::Ret(Some(val)) => write!(f, "ret {val}"),
            Instr::Ret(None) => write!(f, "ret"),
            Instr::Jnz {
                cond,
                if_true,
                if_false,
            } => write!(f, "jnz {cond}, @{if_true}, @{if_false}"),
            Instr::Jmp(label) => write!(f, "jmp @{label}"),
            Instr::Label(label) => write!(f, "@{label}"),
            Instr::Load { dest, addr } => write!(f, "{dest} = load {addr}"),
            Instr::Store { value, addr } => write!(f, "store {value}, {addr}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub abi: AbiTy,
    pub name: String,
}

/// Symbol visibility; `Export` marks a symbol externally visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDef {
    pub name: String,
    /// External symbol substituted at call sites, from the `linkname`
    /// attribute.
    pub link_name: Option<String>,
    pub linkage: Option<Linkage>,
    pub ret: Option<AbiTy>,
    pub params: Vec<Param>,
    /// Extern functions have no body.
    pub body: Option<Vec<Instr>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Str(String),
    Byte(u8),
    Word(i64),
}

impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataItem::Str(s) => write!(f, "b \"{s}\""),
            DataItem::Byte(b) => write!(f, "b {b}"),
            DataItem::Word(w) => write!(f, "w {w}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDef {
    pub name: String,
    pub items: Vec<DataItem>,
}

impl DataDef {
    /// Zero-terminated string data.
    pub fn string_z(name: String, value: &str) -> Self {
        Self {
            name,
            items: vec![DataItem::Str(value.to_string()), DataItem::Byte(0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompilationUnit {
    pub name: String,
    pub data_defs: Vec<DataDef>,
    pub func_defs: Vec<FuncDef>,
}

impl CompilationUnit {
    pub fn new(name: String) -> Self {
        Self {
            name,
            data_defs: Vec::new(),
            func_defs: Vec::new(),
        }
    }

    /// Render the unit one line per instruction, in emission order. Used by
    /// tests and debugging; the backend serialization proper lives outside
    /// this crate.
    pub fn to_lines(&self) -> Vec<String> {
        let mut out = Vec::new();

        for func in &self.func_defs {
            let mut header = String::new();
            if matches!(func.linkage, Some(Linkage::Export)) {
                header.push_str("export ");
            }
            header.push_str("function ");
            if let Some(ret) = &func.ret {
                header.push_str(ret.as_str());
                header.push(' ');
            }
            header.push_str(&format!("${}(", func.name));
            for (i, param) in func.params.iter().enumerate() {
                if i > 0 {
                    header.push_str(", ");
                }
                header.push_str(&format!("{} %{}", param.abi, param.name));
            }
            header.push(')');
            if let Some(link) = &func.link_name {
                header.push_str(&format!(" linkname \"{link}\""));
            }

            match &func.body {
                None => out.push(header),
                Some(instrs) => {
                    header.push_str(" {");
                    out.push(header);
                    out.push("@start".to_string());
                    for instr in instrs {
                        match instr {
                            Instr::Label(_) => out.push(instr.to_string()),
                            _ => out.push(format!("  {instr}")),
                        }
                    }
                    out.push("}".to_string());
                }
            }
        }

        for data in &self.data_defs {
            let items = data
                .items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push(format!("data ${} = {{ {items} }}", data.name));
        }

        out
    }
}
