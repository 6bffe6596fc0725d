//! Closed sum types for the abstract syntax tree (`spec.md` §3 "AST").
//!
//! Every node that can fail at runtime carries a `line` for diagnostics, per
//! `spec.md` §3.

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub is_handle: bool,
    pub is_const: bool,
    pub template_arg: Option<Box<TypeRef>>,
}

impl TypeRef {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_handle: false,
            is_const: false,
            template_arg: None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.name == "array"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<TopLevelDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevelDecl {
    Var(VarDecl),
    Func(FuncDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub type_ref: TypeRef,
    pub name: String,
    pub initializer: Option<Expr>,
    pub array_size_init: Option<Expr>,
    pub is_const: bool,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamQualifier {
    In,
    Out,
    Inout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub type_ref: TypeRef,
    pub name: String,
    pub qualifier: Option<ParamQualifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub return_type: TypeRef,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field(VarDecl),
    Method(FuncDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<ClassMember>,
    pub line: u32,
}

impl ClassDecl {
    pub fn constructor(&self) -> Option<&FuncDecl> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Method(f) if f.name == self.name => Some(f),
            _ => None,
        })
    }

    pub fn method(&self, name: &str) -> Option<&FuncDecl> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Method(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &VarDecl> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Field(v) => Some(v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Block),
    Var(VarDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Break,
    Continue,
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` marks the `default:` case.
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    HandleOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Identifier(String),
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
        line: u32,
    },
    HandleAssign {
        target: Box<Expr>,
        value: Box<Expr>,
        line: u32,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        prefix: bool,
        line: u32,
    },
    IncDec {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
        line: u32,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    Member {
        object: Box<Expr>,
        member: String,
        line: u32,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        line: u32,
    },
    Cast {
        target_type: TypeRef,
        expr: Box<Expr>,
        line: u32,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

impl Expr {
    /// Best-effort source line for a diagnostic; literals with no attached
    /// line report `None`.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Assign { line, .. }
            | Self::HandleAssign { line, .. }
            | Self::Binary { line, .. }
            | Self::Unary { line, .. }
            | Self::IncDec { line, .. }
            | Self::Call { line, .. }
            | Self::Member { line, .. }
            | Self::Index { line, .. }
            | Self::New { line, .. }
            | Self::Cast { line, .. } => Some(*line),
            _ => None,
        }
    }
}
