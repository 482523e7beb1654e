//! One builder per source construct

use crate::exp::{PatchList, TrExp};
use crate::level::{Access, LevelId};
use crate::Translator;
use tiger_frame::{Fragment, Frame};
use tiger_ir::{BinOp, Exp, Label, RelOp, Stm, Target};

impl<F: Frame> Translator<F> {
    // === Variables ===

    /// Read of a variable declared at `access.level`, from code in `level`
    pub fn simple_var(&self, access: &Access, level: LevelId) -> TrExp {
        let frame_ptr = self.levels.frame_address(level, access.level);
        TrExp::Ex(F::exp(&access.access, frame_ptr))
    }

    /// Field `index` of the record at `base`
    pub fn field_var(&mut self, base: TrExp, index: usize) -> TrExp {
        let base = self.un_ex(base);
        TrExp::Ex(Exp::mem(Exp::offset(base, index as i64 * F::WORD_SIZE)))
    }

    /// Element `index` of the array at `base`
    pub fn subscript_var(&mut self, base: TrExp, index: TrExp) -> TrExp {
        let base = self.un_ex(base);
        let index = self.un_ex(index);
        let offset = Exp::binop(BinOp::Mul, index, Exp::Const(F::WORD_SIZE));
        TrExp::Ex(Exp::mem(Exp::binop(BinOp::Plus, base, offset)))
    }

    // === Literals ===

    pub fn int(&self, value: i64) -> TrExp {
        TrExp::Ex(Exp::Const(value))
    }

    pub fn nil(&self) -> TrExp {
        TrExp::Ex(Exp::Const(0))
    }

    /// A statement that does nothing
    pub fn no_op(&self) -> TrExp {
        TrExp::Nx(Stm::exp(Exp::Const(0)))
    }

    /// Place `value` in a string fragment and yield its address
    pub fn string(&mut self, value: &str) -> TrExp {
        let label = self.temps.new_label();
        tracing::trace!(%label, "string fragment");
        self.fragments.push(Fragment::Str {
            label: label.clone(),
            value: value.to_string(),
        });
        TrExp::Ex(Exp::Name(label))
    }

    // === Operators ===

    pub fn arith(&mut self, op: BinOp, left: TrExp, right: TrExp) -> TrExp {
        let left = self.un_ex(left);
        let right = self.un_ex(right);
        TrExp::Ex(Exp::binop(op, left, right))
    }

    pub fn compare(&mut self, op: RelOp, left: TrExp, right: TrExp) -> TrExp {
        let left = self.un_ex(left);
        let right = self.un_ex(right);
        TrExp::Cx(self.cond(op, left, right))
    }

    /// String comparison through the runtime's three-way compare
    pub fn string_compare(&mut self, op: RelOp, left: TrExp, right: TrExp) -> TrExp {
        let left = self.un_ex(left);
        let right = self.un_ex(right);
        let ordering = F::external_call("stringCompare", vec![left, right]);
        TrExp::Cx(self.cond(op, ordering, Exp::Const(0)))
    }

    // === Control flow ===

    pub fn if_then(&mut self, test: TrExp, then: TrExp) -> TrExp {
        let cond = self.un_cx(test);
        let t = self.temps.new_label();
        let f = self.temps.new_label();
        self.patches.patch(cond.trues, &t);
        self.patches.patch(cond.falses, &f);
        let then = self.un_nx(then);
        TrExp::Nx(Stm::seq(vec![cond.stm, Stm::Label(t), then, Stm::Label(f)]))
    }

    /// Two statements join as a statement; anything else joins through a
    /// shared temp.
    pub fn if_then_else(&mut self, test: TrExp, then: TrExp, els: TrExp) -> TrExp {
        let cond = self.un_cx(test);
        let t = self.temps.new_label();
        let f = self.temps.new_label();
        let join = self.temps.new_label();
        self.patches.patch(cond.trues, &t);
        self.patches.patch(cond.falses, &f);

        match (then, els) {
            (TrExp::Nx(then), TrExp::Nx(els)) => TrExp::Nx(Stm::seq(vec![
                cond.stm,
                Stm::Label(t),
                then,
                Stm::jump(join.clone()),
                Stm::Label(f),
                els,
                Stm::Label(join),
            ])),
            (then, els) => {
                let r = Exp::Temp(self.temps.new_temp());
                let then = self.un_ex(then);
                let els = self.un_ex(els);
                TrExp::Ex(Exp::eseq(
                    Stm::seq(vec![
                        cond.stm,
                        Stm::Label(t),
                        Stm::move_(r.clone(), then),
                        Stm::jump(join.clone()),
                        Stm::Label(f),
                        Stm::move_(r.clone(), els),
                        Stm::Label(join),
                    ]),
                    r,
                ))
            }
        }
    }

    /// `breaks` are the jumps out of `body`; they go to the loop's exit.
    pub fn while_loop(&mut self, test: TrExp, body: TrExp, breaks: PatchList) -> TrExp {
        let test_label = self.temps.new_label();
        let body_label = self.temps.new_label();
        let done = self.temps.new_label();

        let cond = self.un_cx(test);
        self.patches.patch(cond.trues, &body_label);
        self.patches.patch(cond.falses, &done);
        self.patches.patch(breaks, &done);
        let body = self.un_nx(body);

        TrExp::Nx(Stm::seq(vec![
            Stm::Label(test_label.clone()),
            cond.stm,
            Stm::Label(body_label),
            body,
            Stm::jump(test_label),
            Stm::Label(done),
        ]))
    }

    /// The index is compared against the upper bound before it is
    /// incremented, so a bound of the largest integer cannot overflow it.
    pub fn for_loop(
        &mut self,
        index: TrExp,
        lo: TrExp,
        hi: TrExp,
        body: TrExp,
        breaks: PatchList,
    ) -> TrExp {
        let index = self.un_ex(index);
        let lo = self.un_ex(lo);
        let hi = self.un_ex(hi);
        let body = self.un_nx(body);
        let limit = Exp::Temp(self.temps.new_temp());
        let body_label = self.temps.new_label();
        let incr = self.temps.new_label();
        let done = self.temps.new_label();
        self.patches.patch(breaks, &done);

        TrExp::Nx(Stm::seq(vec![
            Stm::move_(index.clone(), lo),
            Stm::move_(limit.clone(), hi),
            cjump(RelOp::Le, index.clone(), limit.clone(), &body_label, &done),
            Stm::Label(body_label.clone()),
            body,
            cjump(RelOp::Lt, index.clone(), limit, &incr, &done),
            Stm::Label(incr),
            Stm::move_(
                index.clone(),
                Exp::binop(BinOp::Plus, index, Exp::Const(1)),
            ),
            Stm::jump(body_label),
            Stm::Label(done),
        ]))
    }

    /// A jump to the exit of the innermost enclosing loop. The returned
    /// list must be handed to that loop's builder.
    pub fn break_jump(&mut self) -> (TrExp, PatchList) {
        let slot = self.patches.new_slot();
        (TrExp::Nx(Stm::Jump(Target::Slot(slot))), PatchList::single(slot))
    }

    // === Calls ===

    /// Call a function declared at `callee`'s parent level from code in
    /// `caller`. The static link is the first argument.
    pub fn call(&mut self, callee: LevelId, label: Label, caller: LevelId, args: Vec<TrExp>) -> TrExp {
        let static_link = match self.levels.parent(callee) {
            Some(declared_in) => self.levels.frame_address(caller, declared_in),
            None => Exp::Temp(F::frame_pointer()),
        };
        let mut actuals = Vec::with_capacity(args.len() + 1);
        actuals.push(static_link);
        for arg in args {
            actuals.push(self.un_ex(arg));
        }
        TrExp::Ex(Exp::Call(Box::new(Exp::Name(label)), actuals))
    }

    /// Call a runtime routine; no static link
    pub fn external_call(&mut self, name: &str, args: Vec<TrExp>) -> TrExp {
        let args = args.into_iter().map(|a| self.un_ex(a)).collect();
        TrExp::Ex(F::external_call(name, args))
    }

    // === Allocation ===

    /// Allocate `field_count` words and store each `(index, value)` pair at
    /// its field's offset. Values are stored in the order given.
    pub fn record(&mut self, field_count: usize, fields: Vec<(usize, TrExp)>) -> TrExp {
        let r = Exp::Temp(self.temps.new_temp());
        let size = Exp::Const(field_count as i64 * F::WORD_SIZE);
        let mut stms = vec![Stm::move_(r.clone(), F::external_call("malloc", vec![size]))];
        for (index, value) in fields {
            let value = self.un_ex(value);
            let slot = Exp::mem(Exp::offset(r.clone(), index as i64 * F::WORD_SIZE));
            stms.push(Stm::move_(slot, value));
        }
        TrExp::Ex(Exp::eseq(Stm::seq(stms), r))
    }

    /// Allocate `size` words and fill every element with `init`
    pub fn array(&mut self, size: TrExp, init: TrExp) -> TrExp {
        let size = self.un_ex(size);
        let init = self.un_ex(init);
        let n = Exp::Temp(self.temps.new_temp());
        let value = Exp::Temp(self.temps.new_temp());
        let base = Exp::Temp(self.temps.new_temp());
        let i = Exp::Temp(self.temps.new_temp());
        let test = self.temps.new_label();
        let body = self.temps.new_label();
        let done = self.temps.new_label();

        let bytes = Exp::binop(BinOp::Mul, n.clone(), Exp::Const(F::WORD_SIZE));
        let element = Exp::mem(Exp::binop(
            BinOp::Plus,
            base.clone(),
            Exp::binop(BinOp::Mul, i.clone(), Exp::Const(F::WORD_SIZE)),
        ));

        TrExp::Ex(Exp::eseq(
            Stm::seq(vec![
                Stm::move_(n.clone(), size),
                Stm::move_(value.clone(), init),
                Stm::move_(base.clone(), F::external_call("malloc", vec![bytes])),
                Stm::move_(i.clone(), Exp::Const(0)),
                Stm::Label(test.clone()),
                cjump(RelOp::Lt, i.clone(), n, &body, &done),
                Stm::Label(body),
                Stm::move_(element, value),
                Stm::move_(i.clone(), Exp::binop(BinOp::Plus, i, Exp::Const(1))),
                Stm::jump(test),
                Stm::Label(done),
            ]),
            base,
        ))
    }

    // === Sequencing ===

    pub fn assign(&mut self, dst: TrExp, src: TrExp) -> TrExp {
        let dst = self.un_ex(dst);
        let src = self.un_ex(src);
        TrExp::Nx(Stm::move_(dst, src))
    }

    /// Evaluate in order; the last element decides the shape of the result
    pub fn seq(&mut self, mut exps: Vec<TrExp>) -> TrExp {
        let Some(last) = exps.pop() else {
            return self.no_op();
        };
        if exps.is_empty() {
            return last;
        }
        let stms: Vec<Stm> = exps.into_iter().map(|e| self.un_nx(e)).collect();
        match last {
            TrExp::Nx(stm) => TrExp::Nx(Stm::seq(stms.into_iter().chain([stm]).collect())),
            last => {
                let value = self.un_ex(last);
                TrExp::Ex(Exp::eseq(Stm::seq(stms), value))
            }
        }
    }

    /// Variable initialisers run before the body
    pub fn let_exp(&mut self, inits: Vec<TrExp>, body: TrExp) -> TrExp {
        if inits.is_empty() {
            return body;
        }
        let mut exps = inits;
        exps.push(body);
        self.seq(exps)
    }

    /// Store the initial value of a variable declared in `level`
    pub fn var_init(&mut self, access: &Access, level: LevelId, init: TrExp) -> TrExp {
        let dst = self.simple_var(access, level);
        self.assign(dst, init)
    }
}

fn cjump(op: RelOp, left: Exp, right: Exp, t: &Label, f: &Label) -> Stm {
    Stm::CJump {
        op,
        left: Box::new(left),
        right: Box::new(right),
        if_true: Target::Label(t.clone()),
        if_false: Target::Label(f.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiger_frame::X64Frame;

    fn translator() -> Translator<X64Frame> {
        Translator::new()
    }

    fn labels(stm: &Stm) -> Vec<Label> {
        let mut out = Vec::new();
        stm.for_each_stm(&mut |s| {
            if let Stm::Label(l) = s {
                out.push(l.clone());
            }
        });
        out
    }

    fn jumps(stm: &Stm) -> Vec<Target> {
        let mut out = Vec::new();
        stm.for_each_stm(&mut |s| {
            if let Stm::Jump(t) = s {
                out.push(t.clone());
            }
        });
        out
    }

    #[test]
    fn test_string_adds_fragment() {
        let mut tr = translator();
        let TrExp::Ex(Exp::Name(label)) = tr.string("hello") else {
            panic!("expected a name");
        };
        assert!(matches!(
            &tr.fragments()[0],
            Fragment::Str { label: l, value } if *l == label && value == "hello"
        ));
    }

    #[test]
    fn test_field_var_offset() {
        let mut tr = translator();
        let base = TrExp::Ex(Exp::Temp(tiger_ir::Temp(200)));
        let e = tr.field_var(base, 2);
        assert_eq!(
            e,
            TrExp::Ex(Exp::mem(Exp::offset(Exp::Temp(tiger_ir::Temp(200)), 16)))
        );
    }

    #[test]
    fn test_if_with_two_statements_is_statement() {
        let mut tr = translator();
        let test = tr.int(1);
        let e = tr.if_then_else(test, tr.no_op(), tr.no_op());
        assert!(matches!(e, TrExp::Nx(_)));
    }

    #[test]
    fn test_if_with_values_joins_through_temp() {
        let mut tr = translator();
        let test = tr.compare(RelOp::Lt, tr.int(1), tr.int(2));
        let e = tr.if_then_else(test, tr.int(3), tr.int(4));
        let TrExp::Ex(Exp::ESeq(stm, result)) = e else {
            panic!("expected eseq");
        };
        assert!(matches!(*result, Exp::Temp(_)));
        let stm = tr.patches.resolve(*stm);
        assert_eq!(labels(&stm).len(), 3);
    }

    #[test]
    fn test_break_goes_to_innermost_loop_exit() {
        let mut tr = translator();
        let (inner_break, inner_list) = tr.break_jump();
        let inner = tr.while_loop(tr.int(1), inner_break, inner_list);
        let (outer_break, outer_list) = tr.break_jump();
        let body = tr.seq(vec![inner, outer_break]);
        let outer = tr.while_loop(tr.int(1), body, outer_list);

        let stm = tr.un_nx(outer);
        let stm = tr.patches.resolve(stm);
        let all_labels = labels(&stm);
        // Outer: test, body, done. Inner: test, body, done.
        let outer_done = all_labels.last().cloned().unwrap();
        let inner_done = all_labels[all_labels.len() - 2].clone();

        let targets: Vec<Label> = jumps(&stm)
            .into_iter()
            .map(|t| t.label().cloned().unwrap())
            .collect();
        assert!(targets.contains(&inner_done));
        assert!(targets.contains(&outer_done));
    }

    #[test]
    fn test_call_passes_static_link_first() {
        let mut tr = translator();
        let main = tr.new_level(tr.outermost(), Label::named("main"), &[]);
        let f = tr.new_level(main, Label::named("f"), &[true]);
        let e = tr.call(f, Label::named("f"), main, vec![tr.int(2)]);
        let TrExp::Ex(Exp::Call(_, args)) = e else {
            panic!("expected call");
        };
        assert_eq!(args[0], Exp::Temp(X64Frame::frame_pointer()));
        assert_eq!(args[1], Exp::Const(2));
    }

    #[test]
    fn test_recursive_call_follows_one_link() {
        let mut tr = translator();
        let main = tr.new_level(tr.outermost(), Label::named("main"), &[]);
        let f = tr.new_level(main, Label::named("f"), &[]);
        let e = tr.call(f, Label::named("f"), f, vec![]);
        let TrExp::Ex(Exp::Call(_, args)) = e else {
            panic!("expected call");
        };
        assert!(matches!(args[0], Exp::Mem(_)));
    }

    #[test]
    fn test_record_allocates_then_stores_each_field() {
        let mut tr = translator();
        let e = tr.record(2, vec![(1, tr.int(10)), (0, tr.int(20))]);
        let TrExp::Ex(Exp::ESeq(stm, _)) = e else {
            panic!("expected eseq");
        };
        let mut calls = 0;
        let mut stores = 0;
        stm.for_each_stm(&mut |s| {
            if let Stm::Move(dst, src) = s {
                if matches!(**src, Exp::Call(..)) {
                    calls += 1;
                }
                if matches!(**dst, Exp::Mem(_)) {
                    stores += 1;
                }
            }
        });
        assert_eq!(calls, 1);
        assert_eq!(stores, 2);
    }

    #[test]
    fn test_seq_shape_follows_last_element() {
        let mut tr = translator();
        let e = tr.seq(vec![tr.no_op(), tr.int(1)]);
        assert!(matches!(e, TrExp::Ex(Exp::ESeq(..))));
        let e = tr.seq(vec![tr.int(1), tr.no_op()]);
        assert!(matches!(e, TrExp::Nx(_)));
        let e = tr.seq(vec![]);
        assert!(matches!(e, TrExp::Nx(_)));
    }

    #[test]
    fn test_proc_entry_exit_moves_result_to_return_register() {
        let mut tr = translator();
        let main = tr.new_level(tr.outermost(), Label::named("tigermain"), &[]);
        let body = tr.compare(RelOp::Eq, tr.int(1), tr.int(1));
        tr.proc_entry_exit(main, body, true);
        let Fragment::Proc { body, frame } = &tr.fragments()[0] else {
            panic!("expected proc");
        };
        assert_eq!(frame.name(), &Label::named("tigermain"));
        let Stm::Move(dst, _) = body else {
            panic!("expected move");
        };
        assert_eq!(**dst, Exp::Temp(X64Frame::return_value()));
    }
}
