//! The AST, as produced by the parser (out of core scope — see `spec.md`
//! §1/§4.7; this module is the contract the parser must satisfy).
//!
//! Visitor hierarchies in `original_source/src/ast/*.h` become tagged sum
//! types here, per the Design Note in `spec.md` §9: every "visitor" becomes
//! a plain function matching on the enum rather than a double-dispatch
//! trait object.

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Ref,
    Deref,
    Minus,
    Inv,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Or,
    And,
    BitOr,
    BitAnd,
    BitXor,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LShift,
    RShift,
}

impl InfixOp {
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge)
    }

    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, InfixOp::Or | InfixOp::And)
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    ISize,
    USize,
    Bool,
    Char,
    Pointer(Box<Type>),
    Array(Box<Type>, Box<Expr>),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct StructInit {
    pub name: String,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Unary(UnaryOp, Box<Expr>),
    Infix(InfixOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Access(Box<Expr>, String),
    Cast(Box<Expr>, Type),
    ESizeof(Box<Expr>),
    TSizeof(Type),
    EnumSelect(String, String),
    Variable(String),
    Integer(u64),
    String(Vec<u8>),
    Char(u8),
    Bool(bool),
    NullPtr,
    Struct(String, Vec<StructInit>),
    Array(Vec<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// A single `let` body: `name: type [= expr]`.
#[derive(Debug, Clone)]
pub struct VarBody {
    pub name: String,
    pub ty: Type,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    While(Expr, Box<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Block(Vec<BlockItem>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    #[must_use]
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum BlockItem {
    VarDecls(Vec<VarBody>),
    Statement(Stmt),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Type>,
    /// `None` for an extern (imported) declaration with no body.
    pub body: Option<Vec<BlockItem>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumField {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub fields: Vec<EnumField>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub items: Vec<String>,
    pub path: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Function(Function),
    Struct(Struct),
    Enum(Enum),
    Import(Import),
}

impl Decl {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Decl::Function(f) => f.span,
            Decl::Struct(s) => s.span,
            Decl::Enum(e) => e.span,
            Decl::Import(i) => i.span,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Decl::Function(f) => &f.name,
            Decl::Struct(s) => &s.name,
            Decl::Enum(e) => &e.name,
            Decl::Import(_) => "",
        }
    }
}
