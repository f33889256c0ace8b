//! The typed, name-resolved HIR. See `spec.md` §3.3.
//!
//! Differences from the AST: variable names are renamed to globally-unique
//! symbols; nested `let`s are hoisted to a flat per-function `decls` list
//! with initializers turned into assignment statements; enum discriminants
//! and array sizes are const-evaluated; string literals are interned.

pub mod lower;

use smallvec::SmallVec;

use crate::ast::{InfixOp, UnaryOp};
use crate::span::Span;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
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
}

impl BuiltinKind {
    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(self, BuiltinKind::Void | BuiltinKind::Bool | BuiltinKind::Char)
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            BuiltinKind::Int8
                | BuiltinKind::Int16
                | BuiltinKind::Int32
                | BuiltinKind::Int64
                | BuiltinKind::ISize
        )
    }

    /// Width in bytes; meaningful only for integer kinds (see
    /// [`BuiltinKind::is_integer`]) plus `Bool`/`Char` which are 1 byte.
    #[must_use]
    pub fn width(self) -> u64 {
        match self {
            BuiltinKind::Void => 0,
            BuiltinKind::Int8 | BuiltinKind::UInt8 | BuiltinKind::Bool | BuiltinKind::Char => 1,
            BuiltinKind::Int16 | BuiltinKind::UInt16 => 2,
            BuiltinKind::Int32 | BuiltinKind::UInt32 => 4,
            BuiltinKind::Int64
            | BuiltinKind::UInt64
            | BuiltinKind::ISize
            | BuiltinKind::USize => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(BuiltinKind),
    Pointer(Box<Type>),
    Array(Box<Type>, u64),
    /// A named struct or enum; resolved against the struct/enum table at
    /// codegen time, per the invariant in `spec.md` §3.3(iii).
    Name(Symbol),
}

impl Type {
    #[must_use]
    pub fn void() -> Self {
        Type::Builtin(BuiltinKind::Void)
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Builtin(BuiltinKind::Void))
    }

    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    #[must_use]
    pub fn as_builtin(&self) -> Option<BuiltinKind> {
        match self {
            Type::Builtin(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructInit {
    pub name: Symbol,
    pub value: Box<Expr>,
}

/// `Enum::Variant` resolved to exactly two named positions — see the Open
/// Question resolution in `SPEC_FULL.md` §4.1: there is no src/dst-named
/// pair to accidentally swap.
#[derive(Debug, Clone)]
pub struct EnumSelectExpr {
    pub enum_name: Symbol,
    pub variant: Symbol,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Unary(UnaryOp, Box<Expr>),
    Infix(InfixOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Access(Box<Expr>, Symbol),
    Cast(Box<Expr>, Type),
    ESizeof(Box<Expr>),
    TSizeof(Type),
    EnumSelect(EnumSelectExpr),
    Variable(Symbol),
    Integer(u64),
    /// Interned string-literal symbol (`string_literal_<n>`), see
    /// [`crate::tables::StringTable`].
    StringLiteral(Symbol),
    Char(u8),
    Bool(bool),
    NullPtr,
    Struct(Symbol, SmallVec<[StructInit; 4]>),
    Array(SmallVec<[Expr; 4]>),
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

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Return(Option<Expr>, Span),
    Break(Span),
    Continue(Span),
    While(Expr, Box<Stmt>, Span),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>, Span),
    Block(Vec<Stmt>, Span),
}

impl Stmt {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span,
            Stmt::Return(_, s)
            | Stmt::Break(s)
            | Stmt::Continue(s)
            | Stmt::While(_, _, s)
            | Stmt::If(_, _, _, s)
            | Stmt::Block(_, s) => *s,
        }
    }
}

/// A local variable hoisted out of its source-level `let`, per `spec.md`
/// §3.3: "Block statements carry no local `let` declarations: all
/// declarations from every nested scope in a function are hoisted to the
/// function's `decls` list."
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Symbol,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub ret: Type,
    pub decls: Vec<VarDecl>,
    /// `None` for an extern (imported) function: "A function with no body
    /// represents an extern (imported) function."
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

impl Function {
    #[must_use]
    pub fn is_extern(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: Symbol,
    pub fields: Vec<StructField>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: Symbol,
    pub fields: Vec<(Symbol, u64)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Function(Function),
    Struct(Struct),
    Enum(Enum),
}

/// A lowered whole program: its top-level declarations. The interned string
/// table and struct/enum/function tables populated alongside lowering are
/// owned by the driver (see [`lower::LowerCtx`]), not by `Program` itself,
/// since codegen needs them independently keyed by [`Symbol`] rather than
/// walked off the tree.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
}
