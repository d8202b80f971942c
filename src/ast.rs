
#[derive(Clone, Debug)]
pub struct Program {
    pub fns: Vec<Function>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Void,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub return_type: Type,
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    // `int x;` defaults to an initializer of literal 0.
    VarDecl { name: String, slot: usize, init: Expr },
    Expr(Expr),
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    Return(Option<Expr>),
}

#[derive(Clone, Debug)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    // Strings appear only as a print argument; they never flow through arithmetic.
    StrLit(String),
    Var(usize),
    Assign { slot: usize, rhs: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { callee: String, args: Vec<Expr> },
}
