//! Translated expressions and jump patching
//!
//! A conditional is built before anyone knows where its true and false
//! exits go. Each exit is a `Target::Slot`; the slots are collected into
//! patch lists and filled with real labels once the consumer decides, then
//! rewritten away when the procedure is finished.

use crate::Translator;
use tiger_frame::Frame;
use tiger_ir::{Exp, Label, RelOp, SlotId, Stm, Target};

/// Slots waiting for the same label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchList(Vec<SlotId>);

impl PatchList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(slot: SlotId) -> Self {
        Self(vec![slot])
    }

    pub fn join(mut self, other: PatchList) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Side table of label slots. Each slot is filled at most once.
#[derive(Debug, Clone, Default)]
pub struct PatchTable {
    slots: Vec<Option<Label>>,
}

impl PatchTable {
    pub fn new_slot(&mut self) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(None);
        id
    }

    /// Fill every slot in `list` with `label`
    pub fn patch(&mut self, list: PatchList, label: &Label) {
        for slot in list.0 {
            let cell = &mut self.slots[slot.0 as usize];
            assert!(cell.is_none(), "jump slot {} patched twice", slot.0);
            *cell = Some(label.clone());
        }
    }

    pub fn lookup(&self, slot: SlotId) -> Option<&Label> {
        self.slots[slot.0 as usize].as_ref()
    }

    /// Replace every slot reachable from `stm` with its label
    pub fn resolve(&self, stm: Stm) -> Stm {
        match stm {
            Stm::Move(dst, src) => Stm::move_(self.resolve_exp(*dst), self.resolve_exp(*src)),
            Stm::Exp(e) => Stm::exp(self.resolve_exp(*e)),
            Stm::Jump(target) => Stm::Jump(self.resolve_target(target)),
            Stm::CJump { op, left, right, if_true, if_false } => Stm::CJump {
                op,
                left: Box::new(self.resolve_exp(*left)),
                right: Box::new(self.resolve_exp(*right)),
                if_true: self.resolve_target(if_true),
                if_false: self.resolve_target(if_false),
            },
            Stm::Seq(a, b) => Stm::Seq(Box::new(self.resolve(*a)), Box::new(self.resolve(*b))),
            Stm::Label(l) => Stm::Label(l),
        }
    }

    fn resolve_exp(&self, exp: Exp) -> Exp {
        match exp {
            Exp::BinOp(op, l, r) => Exp::binop(op, self.resolve_exp(*l), self.resolve_exp(*r)),
            Exp::Mem(addr) => Exp::mem(self.resolve_exp(*addr)),
            Exp::Call(func, args) => Exp::Call(
                Box::new(self.resolve_exp(*func)),
                args.into_iter().map(|a| self.resolve_exp(a)).collect(),
            ),
            Exp::ESeq(s, e) => Exp::eseq(self.resolve(*s), self.resolve_exp(*e)),
            leaf => leaf,
        }
    }

    fn resolve_target(&self, target: Target) -> Target {
        match target {
            Target::Slot(slot) => match self.lookup(slot) {
                Some(label) => Target::Label(label.clone()),
                None => panic!("jump slot {} was never patched", slot.0),
            },
            resolved => resolved,
        }
    }
}

/// A conditional jump whose exits are still open
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    pub stm: Stm,
    pub trues: PatchList,
    pub falses: PatchList,
}

/// The three shapes a translated expression can take
#[derive(Debug, Clone, PartialEq)]
pub enum TrExp {
    /// Produces a value
    Ex(Exp),
    /// Produces no value
    Nx(Stm),
    /// Jumps to a true or false exit
    Cx(Cond),
}

impl<F: Frame> Translator<F> {
    /// Coerce to a value. A conditional becomes 1 or 0 in a fresh temp.
    pub fn un_ex(&mut self, e: TrExp) -> Exp {
        match e {
            TrExp::Ex(exp) => exp,
            TrExp::Nx(stm) => Exp::eseq(stm, Exp::Const(0)),
            TrExp::Cx(cond) => {
                let r = Exp::Temp(self.temps.new_temp());
                let t = self.temps.new_label();
                let f = self.temps.new_label();
                let join = self.temps.new_label();
                self.patches.patch(cond.trues, &t);
                self.patches.patch(cond.falses, &f);
                Exp::eseq(
                    Stm::seq(vec![
                        cond.stm,
                        Stm::Label(t),
                        Stm::move_(r.clone(), Exp::Const(1)),
                        Stm::jump(join.clone()),
                        Stm::Label(f),
                        Stm::move_(r.clone(), Exp::Const(0)),
                        Stm::Label(join),
                    ]),
                    r,
                )
            }
        }
    }

    /// Coerce to a statement, discarding any value. A conditional keeps
    /// only the side effects of its test.
    pub fn un_nx(&mut self, e: TrExp) -> Stm {
        match e {
            TrExp::Ex(exp) => Stm::exp(exp),
            TrExp::Nx(stm) => stm,
            TrExp::Cx(cond) => {
                let done = self.temps.new_label();
                self.patches.patch(cond.trues.join(cond.falses), &done);
                Stm::seq(vec![cond.stm, Stm::Label(done)])
            }
        }
    }

    /// Coerce to a conditional. A value tests "not equal to zero".
    ///
    /// # Panics
    ///
    /// A statement has no value to test; asking for one is a bug in the
    /// caller.
    pub fn un_cx(&mut self, e: TrExp) -> Cond {
        match e {
            TrExp::Ex(exp) => self.cond(RelOp::Ne, exp, Exp::Const(0)),
            TrExp::Cx(cond) => cond,
            TrExp::Nx(stm) => panic!("cannot use a statement as a condition: {:?}", stm),
        }
    }

    /// `left op right` with both exits open
    pub(crate) fn cond(&mut self, op: RelOp, left: Exp, right: Exp) -> Cond {
        let t = self.patches.new_slot();
        let f = self.patches.new_slot();
        Cond {
            stm: Stm::CJump {
                op,
                left: Box::new(left),
                right: Box::new(right),
                if_true: Target::Slot(t),
                if_false: Target::Slot(f),
            },
            trues: PatchList::single(t),
            falses: PatchList::single(f),
        }
    }
}
