//! Syntax tree produced by the parser.

use std::sync::Arc;

use crate::parser::token::Span;

/// Interned-by-sharing identifier or property name
pub type Name = Arc<str>;

/// A parsed script
#[derive(Debug)]
pub struct Program {
    pub resource: Name,
    pub body: Vec<Stmt>,
    /// Hoisted `var` names of the top level
    pub var_names: Vec<Name>,
    /// Hoisted function declarations of the top level
    pub functions: Vec<Arc<FunctionNode>>,
}

/// A function literal or declaration
#[derive(Debug)]
pub struct FunctionNode {
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub body: Vec<Stmt>,
    pub var_names: Vec<Name>,
    pub functions: Vec<Arc<FunctionNode>>,
    pub resource: Name,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug)]
pub struct VarDeclarator {
    pub name: Name,
    pub init: Option<Expr>,
}

#[derive(Debug)]
pub enum ForInit {
    Declaration(VarKind, Vec<VarDeclarator>),
    Expression(Expr),
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum StmtKind {
    Expression(Expr),
    Declaration(VarKind, Vec<VarDeclarator>),
    /// Hoisted at scope entry; nothing to do when reached
    Function(Arc<FunctionNode>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block {
        body: Vec<Stmt>,
        /// Contains `let`/`const` declarations that need their own scope
        scoped: bool,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        kind: Option<VarKind>,
        name: Name,
        object: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Name>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Empty,
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug)]
pub enum ExprKind {
    Number(f64),
    String(Name),
    Bool(bool),
    Null,
    Identifier(Name),
    This,
    Array(Vec<Expr>),
    Object(Vec<(Name, Expr)>),
    Function(Arc<FunctionNode>),
    Member {
        object: Box<Expr>,
        property: Name,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression can appear on the left of an assignment
    pub fn is_assignment_target(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}
