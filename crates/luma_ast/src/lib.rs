//! AST node definitions for the Luma language.
//!
//! The front end (lexer, parser, type checker) produces these trees; the
//! code generator in `lumac` consumes them. A program is an ordered forest
//! of modules, and every module carries an ordered statement body. Order is
//! significant throughout: module order is the canonical tie-break for
//! dependency scheduling, and statement order is lowering order.

/// A fully parsed program: one node per source module, in file/CLI order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    pub fn new(modules: Vec<Module>) -> Self {
        Program { modules }
    }
}

/// A single source module.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Module name; non-empty, unique within a program.
    pub name: String,
    /// Optional module-level documentation string.
    pub doc: Option<String>,
    /// Ordered statement body, including `use` directives.
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Module {
            name: name.into(),
            doc: None,
            body,
        }
    }

    /// Names of the modules this module references via `use` directives,
    /// in body order.
    pub fn use_targets(&self) -> Vec<&str> {
        self.body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Use(u) => Some(u.module.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `@use "module"` or `@use "module" as alias`
    Use(UseDecl),
    FnDecl(FnDecl),
    StructDecl(StructDecl),
    EnumDecl(EnumDecl),
    VarDecl(VarDecl),
    Return(Option<Expr>),
    ExprStmt(Expr),
    If(IfStmt),
    While(WhileStmt),
    Block(Vec<Stmt>),
    Break,
    Continue,
    /// Statement deferred to function exit, last-in first-out.
    Defer(Box<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub module: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeAnn,
    pub body: Vec<Stmt>,
    /// Public functions receive external linkage and may be imported by
    /// other modules. `main` is always external regardless of this flag.
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeAnn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeAnn,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    /// Explicit discriminant; members without one continue counting from
    /// the previous value, starting at zero.
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeAnn>,
    pub init: Option<Expr>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// Type annotations as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAnn {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    Void,
    /// A user-defined struct or enum name.
    Named(String),
    Ptr(Box<TypeAnn>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Raw string literal text; escape sequences are processed during
    /// lowering, not during parsing.
    Str(String),
    Ident(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.member` (runtime field access) or `object::member` when
    /// `is_compiletime` is set. Chained compile-time access
    /// (`A::B::C`) nests another compile-time `Member` in `object`.
    Member {
        object: Box<Expr>,
        member: String,
        is_compiletime: bool,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    StructLit {
        name: String,
        fields: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}
