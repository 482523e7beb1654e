use std::cell::Cell;
use tiger_lexer::Span;

/// A Tiger program is a single expression
pub type Program = Expr;

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Variable read: x, r.f, a[i]
    Var(Var),
    /// nil
    Nil,
    /// Integer literal: 42
    Int(i64),
    /// String literal: "hello"
    Str(String),
    /// Function call: f(a, b)
    Call { func: Ident, args: Vec<Expr> },
    /// Binary operation: a + b, a < b
    Op {
        left: Box<Expr>,
        op: Oper,
        right: Box<Expr>,
    },
    /// Record creation: point { x = 1, y = 2 }
    Record { ty: Ident, fields: Vec<FieldInit> },
    /// Sequence: (e1; e2; e3)
    Seq(Vec<Expr>),
    /// Assignment: lvalue := e
    Assign { var: Var, expr: Box<Expr> },
    /// if test then e1 [else e2]
    If {
        test: Box<Expr>,
        then: Box<Expr>,
        els: Option<Box<Expr>>,
    },
    /// while test do body
    While { test: Box<Expr>, body: Box<Expr> },
    /// for i := lo to hi do body
    For {
        var: Ident,
        escape: Cell<bool>,
        lo: Box<Expr>,
        hi: Box<Expr>,
        body: Box<Expr>,
    },
    Break,
    /// let decs in body end
    Let { decs: Vec<Dec>, body: Box<Expr> },
    /// Array creation: intArray [n] of 0
    Array {
        ty: Ident,
        size: Box<Expr>,
        init: Box<Expr>,
    },
}

/// An lvalue
#[derive(Debug, Clone)]
pub struct Var {
    pub kind: VarKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum VarKind {
    Simple(Ident),
    Field(Box<Var>, Ident),
    Subscript(Box<Var>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oper {
    Plus,
    Minus,
    Times,
    Divide,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Oper {
    pub fn precedence(self) -> u8 {
        match self {
            Oper::Eq | Oper::Neq | Oper::Lt | Oper::Le | Oper::Gt | Oper::Ge => 3,
            Oper::Plus | Oper::Minus => 4,
            Oper::Times | Oper::Divide => 5,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Oper::Plus | Oper::Minus | Oper::Times | Oper::Divide)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Oper::Eq | Oper::Neq)
    }
}

impl std::fmt::Display for Oper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Oper::Plus => write!(f, "+"),
            Oper::Minus => write!(f, "-"),
            Oper::Times => write!(f, "*"),
            Oper::Divide => write!(f, "/"),
            Oper::Eq => write!(f, "="),
            Oper::Neq => write!(f, "<>"),
            Oper::Lt => write!(f, "<"),
            Oper::Le => write!(f, "<="),
            Oper::Gt => write!(f, ">"),
            Oper::Ge => write!(f, ">="),
        }
    }
}

/// `name = expr` inside a record creation
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub name: Ident,
    pub expr: Expr,
    pub span: Span,
}

/// Declarations. Adjacent function or type declarations form one
/// mutually recursive group.
#[derive(Debug, Clone)]
pub enum Dec {
    Function(Vec<FunDec>),
    Var(VarDec),
    Type(Vec<TypeDec>),
}

#[derive(Debug, Clone)]
pub struct FunDec {
    pub name: Ident,
    pub params: Vec<Field>,
    pub result: Option<Ident>,
    pub body: Expr,
    pub span: Span,
}

/// `name: type`, used by function parameters and record type fields.
/// `escape` is only meaningful for parameters.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: Ident,
    pub ty: Ident,
    pub escape: Cell<bool>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDec {
    pub name: Ident,
    pub escape: Cell<bool>,
    pub ty: Option<Ident>,
    pub init: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDec {
    pub name: Ident,
    pub ty: TyExpr,
    pub span: Span,
}

/// Right-hand side of a type declaration
#[derive(Debug, Clone)]
pub struct TyExpr {
    pub kind: TyKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TyKind {
    Name(Ident),
    Record(Vec<Field>),
    Array(Ident),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: String, span: Span) -> Self {
        Self { name, span }
    }
}

// === Pretty Printing ===

impl Expr {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match &self.kind {
            ExprKind::Var(v) => format!("{}Var {}\n", ind, v.pretty_print()),
            ExprKind::Nil => format!("{}Nil\n", ind),
            ExprKind::Int(n) => format!("{}Int {}\n", ind, n),
            ExprKind::Str(s) => format!("{}Str {:?}\n", ind, s),
            ExprKind::Call { func, args } => {
                let mut out = format!("{}Call '{}'\n", ind, func.name);
                for arg in args {
                    out.push_str(&arg.pretty_print(indent + 1));
                }
                out
            }
            ExprKind::Op { left, op, right } => {
                let mut out = format!("{}Op {}\n", ind, op);
                out.push_str(&left.pretty_print(indent + 1));
                out.push_str(&right.pretty_print(indent + 1));
                out
            }
            ExprKind::Record { ty, fields } => {
                let mut out = format!("{}Record '{}'\n", ind, ty.name);
                for field in fields {
                    out.push_str(&format!("{}  {} =\n", ind, field.name.name));
                    out.push_str(&field.expr.pretty_print(indent + 2));
                }
                out
            }
            ExprKind::Seq(exprs) => {
                let mut out = format!("{}Seq\n", ind);
                for e in exprs {
                    out.push_str(&e.pretty_print(indent + 1));
                }
                out
            }
            ExprKind::Assign { var, expr } => {
                let mut out = format!("{}Assign {}\n", ind, var.pretty_print());
                out.push_str(&expr.pretty_print(indent + 1));
                out
            }
            ExprKind::If { test, then, els } => {
                let mut out = format!("{}If\n", ind);
                out.push_str(&test.pretty_print(indent + 1));
                out.push_str(&then.pretty_print(indent + 1));
                if let Some(els) = els {
                    out.push_str(&els.pretty_print(indent + 1));
                }
                out
            }
            ExprKind::While { test, body } => {
                let mut out = format!("{}While\n", ind);
                out.push_str(&test.pretty_print(indent + 1));
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            ExprKind::For { var, escape, lo, hi, body } => {
                let mut out = format!("{}For '{}'{}\n", ind, var.name, escape_marker(escape));
                out.push_str(&lo.pretty_print(indent + 1));
                out.push_str(&hi.pretty_print(indent + 1));
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            ExprKind::Break => format!("{}Break\n", ind),
            ExprKind::Let { decs, body } => {
                let mut out = format!("{}Let\n", ind);
                for dec in decs {
                    out.push_str(&dec.pretty_print(indent + 1));
                }
                out.push_str(&format!("{}In\n", ind));
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            ExprKind::Array { ty, size, init } => {
                let mut out = format!("{}Array '{}'\n", ind, ty.name);
                out.push_str(&size.pretty_print(indent + 1));
                out.push_str(&init.pretty_print(indent + 1));
                out
            }
        }
    }
}

impl Var {
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            VarKind::Simple(id) => id.name.clone(),
            VarKind::Field(base, field) => format!("{}.{}", base.pretty_print(), field.name),
            VarKind::Subscript(base, _) => format!("{}[..]", base.pretty_print()),
        }
    }
}

impl Dec {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match self {
            Dec::Function(group) => {
                let mut out = String::new();
                for f in group {
                    let params = f
                        .params
                        .iter()
                        .map(|p| format!("{}{}: {}", p.name.name, escape_marker(&p.escape), p.ty.name))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let result = f
                        .result
                        .as_ref()
                        .map(|r| format!(": {}", r.name))
                        .unwrap_or_default();
                    out.push_str(&format!("{}Function '{}'({}){}\n", ind, f.name.name, params, result));
                    out.push_str(&f.body.pretty_print(indent + 1));
                }
                out
            }
            Dec::Var(v) => {
                let ty = v.ty.as_ref().map(|t| format!(": {}", t.name)).unwrap_or_default();
                let mut out = format!("{}VarDec '{}'{}{}\n", ind, v.name.name, escape_marker(&v.escape), ty);
                out.push_str(&v.init.pretty_print(indent + 1));
                out
            }
            Dec::Type(group) => group
                .iter()
                .map(|t| format!("{}TypeDec '{}' = {}\n", ind, t.name.name, t.ty.pretty_print()))
                .collect(),
        }
    }
}

impl TyExpr {
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            TyKind::Name(id) => id.name.clone(),
            TyKind::Array(id) => format!("array of {}", id.name),
            TyKind::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name.name, f.ty.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", fields)
            }
        }
    }
}

fn escape_marker(escape: &Cell<bool>) -> &'static str {
    if escape.get() { " (escapes)" } else { "" }
}
