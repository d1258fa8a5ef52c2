//! Abstract syntax tree produced by the parser.

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum BaseType {
    NotAType,
    Void,
    Int,
    Char,
    Struct,
}

/// A type name plus pointer depth, e.g. `int **` is `{Int, 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct TypeDesc {
    pub base: BaseType,
    pub pointer_depth: usize,
}

impl TypeDesc {
    pub fn not_a_type() -> Self {
        TypeDesc { base: BaseType::NotAType, pointer_depth: 0 }
    }

    pub fn is_void_value(&self) -> bool {
        self.base == BaseType::Void && self.pointer_depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    LessThan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    NumberLit(i64),
    CharLit(u8),
    StringLit(String),
    Ident(String),
    Call(Box<Expr>, Vec<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    AddressOf(Box<Expr>),
    Deref(Box<Expr>),
    Inc(Box<Expr>),
    BinaryOp(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Func {
        name: String,
        return_type: TypeDesc,
        params: Vec<(String, TypeDesc)>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    VarDecl {
        name: String,
        ty: TypeDesc,
        init: Option<Expr>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
}

pub type Program = Vec<Stmt>;

/// Up to this many call arguments / function parameters are accepted; the
/// original C target used fixed 6-slot arrays with no overflow guard, so a
/// safe rewrite must reject the overflow explicitly instead.
pub const MAX_CALL_ARGS: usize = 6;
