//! Tree IR data structures

use crate::temp::{Label, Temp};

/// Handle to a jump target that is filled in after the jump is built.
/// The table that owns the slots lives with whoever builds the jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

/// Destination of a jump
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Label(Label),
    /// Not known yet; must be patched before the code leaves translation
    Slot(SlotId),
}

impl Target {
    pub fn label(&self) -> Option<&Label> {
        match self {
            Target::Label(l) => Some(l),
            Target::Slot(_) => None,
        }
    }
}

/// Value-producing expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Const(i64),
    /// Address of a label
    Name(Label),
    Temp(Temp),
    BinOp(BinOp, Box<Exp>, Box<Exp>),
    /// Word-sized memory cell at the given address
    Mem(Box<Exp>),
    /// Call a function address with arguments
    Call(Box<Exp>, Vec<Exp>),
    /// Run the statement, then evaluate the expression
    ESeq(Box<Stm>, Box<Exp>),
}

/// Side-effecting statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stm {
    /// Store: destination is a `Temp` or a `Mem`
    Move(Box<Exp>, Box<Exp>),
    /// Evaluate and discard
    Exp(Box<Exp>),
    Jump(Target),
    CJump {
        op: RelOp,
        left: Box<Exp>,
        right: Box<Exp>,
        if_true: Target,
        if_false: Target,
    },
    Seq(Box<Stm>, Box<Stm>),
    Label(Label),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Exp {
    pub fn binop(op: BinOp, left: Exp, right: Exp) -> Exp {
        Exp::BinOp(op, Box::new(left), Box::new(right))
    }

    pub fn mem(addr: Exp) -> Exp {
        Exp::Mem(Box::new(addr))
    }

    pub fn eseq(stm: Stm, exp: Exp) -> Exp {
        Exp::ESeq(Box::new(stm), Box::new(exp))
    }

    /// `base + offset`
    pub fn offset(base: Exp, offset: i64) -> Exp {
        Exp::binop(BinOp::Plus, base, Exp::Const(offset))
    }

    /// Visit this expression and every nested expression, pre-order
    pub fn for_each_exp(&self, f: &mut impl FnMut(&Exp)) {
        f(self);
        match self {
            Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => {}
            Exp::BinOp(_, l, r) => {
                l.for_each_exp(f);
                r.for_each_exp(f);
            }
            Exp::Mem(addr) => addr.for_each_exp(f),
            Exp::Call(func, args) => {
                func.for_each_exp(f);
                for arg in args {
                    arg.for_each_exp(f);
                }
            }
            Exp::ESeq(s, e) => {
                s.for_each_exp(f);
                e.for_each_exp(f);
            }
        }
    }
}

impl Stm {
    pub fn move_(dst: Exp, src: Exp) -> Stm {
        Stm::Move(Box::new(dst), Box::new(src))
    }

    pub fn exp(e: Exp) -> Stm {
        Stm::Exp(Box::new(e))
    }

    pub fn jump(label: Label) -> Stm {
        Stm::Jump(Target::Label(label))
    }

    /// Right-nested sequence. An empty list becomes a no-op.
    pub fn seq(stms: Vec<Stm>) -> Stm {
        let mut iter = stms.into_iter().rev();
        let Some(last) = iter.next() else {
            return Stm::exp(Exp::Const(0));
        };
        iter.fold(last, |acc, s| Stm::Seq(Box::new(s), Box::new(acc)))
    }

    /// Visit every expression nested in this statement, pre-order
    pub fn for_each_exp(&self, f: &mut impl FnMut(&Exp)) {
        match self {
            Stm::Move(d, s) => {
                d.for_each_exp(f);
                s.for_each_exp(f);
            }
            Stm::Exp(e) => e.for_each_exp(f),
            Stm::Jump(_) | Stm::Label(_) => {}
            Stm::CJump { left, right, .. } => {
                left.for_each_exp(f);
                right.for_each_exp(f);
            }
            Stm::Seq(a, b) => {
                a.for_each_exp(f);
                b.for_each_exp(f);
            }
        }
    }

    /// Visit this statement and every nested statement, including those
    /// inside `ESeq` expressions, pre-order
    pub fn for_each_stm(&self, f: &mut impl FnMut(&Stm)) {
        f(self);
        match self {
            Stm::Seq(a, b) => {
                a.for_each_stm(f);
                b.for_each_stm(f);
            }
            Stm::Move(d, s) => {
                d.for_each_nested_stm(f);
                s.for_each_nested_stm(f);
            }
            Stm::Exp(e) => e.for_each_nested_stm(f),
            Stm::CJump { left, right, .. } => {
                left.for_each_nested_stm(f);
                right.for_each_nested_stm(f);
            }
            Stm::Jump(_) | Stm::Label(_) => {}
        }
    }
}

impl Exp {
    fn for_each_nested_stm(&self, f: &mut impl FnMut(&Stm)) {
        match self {
            Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => {}
            Exp::BinOp(_, l, r) => {
                l.for_each_nested_stm(f);
                r.for_each_nested_stm(f);
            }
            Exp::Mem(addr) => addr.for_each_nested_stm(f),
            Exp::Call(func, args) => {
                func.for_each_nested_stm(f);
                for arg in args {
                    arg.for_each_nested_stm(f);
                }
            }
            Exp::ESeq(s, e) => {
                s.for_each_stm(f);
                e.for_each_nested_stm(f);
            }
        }
    }
}

// === Pretty Printing ===

impl Exp {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = " ".repeat(indent);
        match self {
            Exp::Const(n) => format!("{}CONST {}", ind, n),
            Exp::Name(l) => format!("{}NAME {}", ind, l),
            Exp::Temp(t) => format!("{}TEMP {}", ind, t),
            Exp::BinOp(op, l, r) => format!(
                "{}BINOP({},\n{},\n{})",
                ind,
                op.pretty_print(),
                l.pretty_print(indent + 1),
                r.pretty_print(indent + 1)
            ),
            Exp::Mem(addr) => format!("{}MEM(\n{})", ind, addr.pretty_print(indent + 1)),
            Exp::Call(func, args) => {
                let mut out = format!("{}CALL(\n{}", ind, func.pretty_print(indent + 1));
                for arg in args {
                    out.push_str(",\n");
                    out.push_str(&arg.pretty_print(indent + 2));
                }
                out.push(')');
                out
            }
            Exp::ESeq(s, e) => format!(
                "{}ESEQ(\n{},\n{})",
                ind,
                s.pretty_print(indent + 1),
                e.pretty_print(indent + 1)
            ),
        }
    }
}

impl Stm {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = " ".repeat(indent);
        match self {
            Stm::Move(d, s) => format!(
                "{}MOVE(\n{},\n{})",
                ind,
                d.pretty_print(indent + 1),
                s.pretty_print(indent + 1)
            ),
            Stm::Exp(e) => format!("{}EXP(\n{})", ind, e.pretty_print(indent + 1)),
            Stm::Jump(t) => format!("{}JUMP {}", ind, t.pretty_print()),
            Stm::CJump { op, left, right, if_true, if_false } => format!(
                "{}CJUMP({},\n{},\n{},\n{} {},{} {})",
                ind,
                op.pretty_print(),
                left.pretty_print(indent + 1),
                right.pretty_print(indent + 1),
                ind,
                if_true.pretty_print(),
                ind,
                if_false.pretty_print()
            ),
            Stm::Seq(a, b) => format!(
                "{}SEQ(\n{},\n{})",
                ind,
                a.pretty_print(indent + 1),
                b.pretty_print(indent + 1)
            ),
            Stm::Label(l) => format!("{}LABEL {}", ind, l),
        }
    }
}

impl Target {
    pub fn pretty_print(&self) -> String {
        match self {
            Target::Label(l) => l.to_string(),
            Target::Slot(s) => format!("?{}", s.0),
        }
    }
}

impl BinOp {
    pub fn pretty_print(&self) -> &'static str {
        match self {
            BinOp::Plus => "PLUS",
            BinOp::Minus => "MINUS",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
        }
    }
}

impl RelOp {
    pub fn pretty_print(&self) -> &'static str {
        match self {
            RelOp::Eq => "EQ",
            RelOp::Ne => "NE",
            RelOp::Lt => "LT",
            RelOp::Gt => "GT",
            RelOp::Le => "LE",
            RelOp::Ge => "GE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_nests_right() {
        let l = |n| Stm::Label(Label::Anon(n));
        let s = Stm::seq(vec![l(0), l(1), l(2)]);
        let Stm::Seq(first, rest) = s else {
            panic!("expected seq");
        };
        assert_eq!(*first, l(0));
        assert!(matches!(*rest, Stm::Seq(..)));
    }

    #[test]
    fn test_empty_seq_is_noop() {
        assert_eq!(Stm::seq(vec![]), Stm::exp(Exp::Const(0)));
    }

    #[test]
    fn test_for_each_exp_counts_mem() {
        let e = Exp::mem(Exp::offset(Exp::mem(Exp::Temp(Temp(0))), 8));
        let mut mems = 0;
        e.for_each_exp(&mut |e| {
            if matches!(e, Exp::Mem(_)) {
                mems += 1;
            }
        });
        assert_eq!(mems, 2);
    }

    #[test]
    fn test_pretty_print() {
        let s = Stm::move_(Exp::Temp(Temp(100)), Exp::Const(1));
        assert_eq!(s.pretty_print(0), "MOVE(\n TEMP t100,\n CONST 1)");
    }
}
