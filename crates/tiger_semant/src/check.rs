//! Type checking and translation pass

use crate::env::{base_tenv, base_venv, EnvEntry, FunEntry, FunKind};
use crate::error::{Diagnostic, ErrorKind};
use crate::escape::find_escapes;
use std::collections::HashSet;
use tiger_ast::*;
use tiger_frame::{Fragment, Frame};
use tiger_ir::{BinOp, Label, RelOp};
use tiger_lexer::Span;
use tiger_translate::{LevelId, PatchList, TrExp, Translator};
use tiger_types::{Table, Type, TypeContext, TypeId};

/// Knobs for a single analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Compute escapes before checking. When off every variable is kept
    /// in memory.
    pub escape_analysis: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            escape_analysis: true,
        }
    }
}

/// Everything one analysis run produces
#[derive(Debug)]
pub struct Translation<F: Frame> {
    pub fragments: Vec<Fragment<F>>,
    pub diagnostics: Vec<Diagnostic>,
    pub types: TypeContext,
    /// Type of the whole program
    pub ty: TypeId,
}

impl<F: Frame> Translation<F> {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Check `program` and translate it to fragments. The main program becomes
/// the procedure `tigermain`; it is emitted last.
#[tracing::instrument(skip_all)]
pub fn translate<F: Frame>(program: &Program, options: &Options) -> Translation<F> {
    if options.escape_analysis {
        find_escapes(program);
    }
    let translation = Semant::new().translate_program(program);
    tracing::debug!(
        fragments = translation.fragments.len(),
        diagnostics = translation.diagnostics.len(),
        "semantic analysis finished"
    );
    translation
}

/// Like `translate`, but fails if any diagnostic was reported
pub fn check<F: Frame>(program: &Program, options: &Options) -> Result<Vec<Fragment<F>>, Vec<Diagnostic>> {
    let translation = translate::<F>(program, options);
    if translation.diagnostics.is_empty() {
        Ok(translation.fragments)
    } else {
        Err(translation.diagnostics)
    }
}

/// Translated expression with its type
struct ExpTy {
    exp: TrExp,
    ty: TypeId,
}

struct Semant<F: Frame> {
    types: TypeContext,
    tenv: Table<TypeId>,
    venv: Table<EnvEntry>,
    tr: Translator<F>,
    diagnostics: Vec<Diagnostic>,
    /// Break lists of the enclosing loops, innermost last
    loops: Vec<PatchList>,
    /// Undefined names already reported
    reported_undefined: HashSet<(Namespace, String)>,
}

/// Types and values are looked up in separate environments, so the same
/// spelling can be undefined in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Type,
    Value,
}

impl<F: Frame> Semant<F> {
    fn new() -> Self {
        Self {
            types: TypeContext::new(),
            tenv: base_tenv(),
            venv: base_venv(),
            tr: Translator::new(),
            diagnostics: Vec::new(),
            loops: Vec::new(),
            reported_undefined: HashSet::new(),
        }
    }

    fn translate_program(mut self, program: &Program) -> Translation<F> {
        let outermost = self.tr.outermost();
        let main = self.tr.new_level(outermost, Label::named("tigermain"), &[]);
        let body = self.trans_exp(main, program);
        let returns_value = self.types.is_int(body.ty);
        self.tr.proc_entry_exit(main, body.exp, returns_value);
        Translation {
            fragments: self.tr.into_fragments(),
            diagnostics: self.diagnostics,
            types: self.types,
            ty: body.ty,
        }
    }

    // === Diagnostics ===

    fn error(&mut self, kind: ErrorKind, span: Span) {
        tracing::debug!(%kind, start = span.start, end = span.end, "semantic error");
        self.diagnostics.push(Diagnostic { kind, span });
    }

    /// Report an undefined name the first time it is seen in its namespace
    fn undefined(&mut self, kind: ErrorKind, span: Span) {
        let key = match &kind {
            ErrorKind::UndefinedType(name) => (Namespace::Type, name.clone()),
            ErrorKind::UndefinedVariable(name) | ErrorKind::UndefinedFunction(name) => {
                (Namespace::Value, name.clone())
            }
            _ => return self.error(kind, span),
        };
        if self.reported_undefined.insert(key) {
            self.error(kind, span);
        }
    }

    fn show(&self, ty: TypeId) -> String {
        self.types.display(ty)
    }

    /// Placeholder result after an error
    fn fallback(&self) -> ExpTy {
        ExpTy {
            exp: self.tr.int(0),
            ty: TypeId::ERROR,
        }
    }

    /// False if `ty` is not an integer. The error type is rejected without
    /// a second diagnostic.
    fn expect_int(&mut self, ty: TypeId, span: Span) -> bool {
        if self.types.is_int(ty) {
            return true;
        }
        if self.types.is_error(ty) {
            return false;
        }
        let found = self.show(ty);
        self.error(ErrorKind::IntegerRequired { found }, span);
        false
    }

    fn expect_no_value(&mut self, construct: &'static str, ty: TypeId, span: Span) {
        if !self.types.is_void(ty) && !self.types.is_error(ty) {
            let found = self.show(ty);
            self.error(ErrorKind::BodyProducesValue { construct, found }, span);
        }
    }

    /// Run `f` inside a fresh scope of both environments
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.venv.begin_scope();
        self.tenv.begin_scope();
        let result = f(self);
        self.tenv.end_scope();
        self.venv.end_scope();
        result
    }

    fn lookup_type(&mut self, id: &Ident) -> TypeId {
        match self.tenv.look(&id.name) {
            Some(&ty) => ty,
            None => {
                self.undefined(ErrorKind::UndefinedType(id.name.clone()), id.span);
                TypeId::ERROR
            }
        }
    }

    // === Expressions ===

    fn trans_exp(&mut self, level: LevelId, expr: &Expr) -> ExpTy {
        match &expr.kind {
            ExprKind::Var(var) => self.trans_var(level, var),
            ExprKind::Nil => ExpTy {
                exp: self.tr.nil(),
                ty: TypeId::NIL,
            },
            ExprKind::Int(n) => ExpTy {
                exp: self.tr.int(*n),
                ty: TypeId::INT,
            },
            ExprKind::Str(s) => ExpTy {
                exp: self.tr.string(s),
                ty: TypeId::STRING,
            },
            ExprKind::Call { func, args } => self.trans_call(level, func, args, expr.span),
            ExprKind::Op { left, op, right } => self.trans_op(level, left, *op, right, expr.span),
            ExprKind::Record { ty, fields } => self.trans_record(level, ty, fields, expr.span),
            ExprKind::Seq(exprs) => {
                let mut exps = Vec::with_capacity(exprs.len());
                let mut ty = TypeId::VOID;
                for e in exprs {
                    let et = self.trans_exp(level, e);
                    ty = et.ty;
                    exps.push(et.exp);
                }
                ExpTy {
                    exp: self.tr.seq(exps),
                    ty,
                }
            }
            ExprKind::Assign { var, expr: rhs } => self.trans_assign(level, var, rhs),
            ExprKind::If { test, then, els } => {
                self.trans_if(level, test, then, els.as_deref(), expr.span)
            }
            ExprKind::While { test, body } => self.trans_while(level, test, body),
            ExprKind::For {
                var,
                escape,
                lo,
                hi,
                body,
            } => self.trans_for(level, var, escape.get(), lo, hi, body),
            ExprKind::Break => self.trans_break(expr.span),
            ExprKind::Let { decs, body } => self.scoped(|this| {
                let mut inits = Vec::new();
                for dec in decs {
                    inits.extend(this.trans_dec(level, dec));
                }
                let body = this.trans_exp(level, body);
                ExpTy {
                    exp: this.tr.let_exp(inits, body.exp),
                    ty: body.ty,
                }
            }),
            ExprKind::Array { ty, size, init } => self.trans_array(level, ty, size, init),
        }
    }

    fn trans_var(&mut self, level: LevelId, var: &Var) -> ExpTy {
        match &var.kind {
            VarKind::Simple(id) => match self.venv.look(&id.name) {
                Some(&EnvEntry::Var { access, ty }) => ExpTy {
                    exp: self.tr.simple_var(&access, level),
                    ty,
                },
                Some(EnvEntry::Fun(_)) => {
                    self.error(ErrorKind::NotAVariable(id.name.clone()), id.span);
                    self.fallback()
                }
                None => {
                    self.undefined(ErrorKind::UndefinedVariable(id.name.clone()), id.span);
                    self.fallback()
                }
            },
            VarKind::Field(base, field) => {
                let base_et = self.trans_var(level, base);
                if let Some((index, ty)) = self.types.record_field(base_et.ty, &field.name) {
                    return ExpTy {
                        exp: self.tr.field_var(base_et.exp, index),
                        ty,
                    };
                }
                if self.types.is_error(base_et.ty) {
                    return self.fallback();
                }
                let ty = self.show(base_et.ty);
                if self.types.is_record(base_et.ty) {
                    let field = field.name.clone();
                    self.error(ErrorKind::UnknownField { field, ty }, var.span);
                } else {
                    self.error(ErrorKind::NotARecord(ty), base.span);
                }
                self.fallback()
            }
            VarKind::Subscript(base, index) => {
                let base_et = self.trans_var(level, base);
                let index_et = self.trans_exp(level, index);
                self.expect_int(index_et.ty, index.span);
                match self.types.array_element(base_et.ty) {
                    Some(element) => ExpTy {
                        exp: self.tr.subscript_var(base_et.exp, index_et.exp),
                        ty: element,
                    },
                    None if self.types.is_error(base_et.ty) => self.fallback(),
                    None => {
                        let ty = self.show(base_et.ty);
                        self.error(ErrorKind::NotAnArray(ty), base.span);
                        self.fallback()
                    }
                }
            }
        }
    }

    fn trans_call(&mut self, level: LevelId, func: &Ident, args: &[Expr], span: Span) -> ExpTy {
        let entry = match self.venv.look(&func.name) {
            Some(EnvEntry::Fun(entry)) => entry.clone(),
            Some(EnvEntry::Var { .. }) => {
                self.error(ErrorKind::NotAFunction(func.name.clone()), func.span);
                return self.discard_args(level, args);
            }
            None => {
                self.undefined(ErrorKind::UndefinedFunction(func.name.clone()), func.span);
                return self.discard_args(level, args);
            }
        };

        let mut actuals = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let arg_et = self.trans_exp(level, arg);
            if let Some(&formal) = entry.formals.get(i) {
                if !self.types.compatible(arg_et.ty, formal) {
                    let expected = self.show(formal);
                    let found = self.show(arg_et.ty);
                    self.error(ErrorKind::TypeMismatch { expected, found }, arg.span);
                }
            }
            actuals.push(arg_et.exp);
        }
        if args.len() != entry.formals.len() {
            self.error(
                ErrorKind::ArityMismatch {
                    name: func.name.clone(),
                    expected: entry.formals.len(),
                    found: args.len(),
                },
                span,
            );
        }

        let exp = match entry.kind {
            FunKind::Runtime => self.tr.external_call(&entry.label.to_string(), actuals),
            FunKind::Declared(callee) => self.tr.call(callee, entry.label, level, actuals),
        };
        ExpTy {
            exp,
            ty: entry.result,
        }
    }

    /// Check the arguments of a call that cannot be made
    fn discard_args(&mut self, level: LevelId, args: &[Expr]) -> ExpTy {
        for arg in args {
            self.trans_exp(level, arg);
        }
        self.fallback()
    }

    fn trans_op(&mut self, level: LevelId, left: &Expr, op: Oper, right: &Expr, span: Span) -> ExpTy {
        let l = self.trans_exp(level, left);
        let r = self.trans_exp(level, right);

        if op.is_arithmetic() {
            self.expect_int(l.ty, left.span);
            self.expect_int(r.ty, right.span);
            let op = match op {
                Oper::Plus => BinOp::Plus,
                Oper::Minus => BinOp::Minus,
                Oper::Times => BinOp::Mul,
                _ => BinOp::Div,
            };
            return ExpTy {
                exp: self.tr.arith(op, l.exp, r.exp),
                ty: TypeId::INT,
            };
        }

        if !self.operands_match(l.ty, r.ty) {
            let (left, right) = (self.show(l.ty), self.show(r.ty));
            self.error(ErrorKind::OperandMismatch { left, right }, span);
        } else if !op.is_equality()
            && !self.types.is_int(l.ty)
            && !self.types.is_string(l.ty)
            && !self.types.is_error(l.ty)
        {
            let found = self.show(l.ty);
            self.error(ErrorKind::NotOrdered { found }, span);
        }

        let relop = match op {
            Oper::Eq => RelOp::Eq,
            Oper::Neq => RelOp::Ne,
            Oper::Lt => RelOp::Lt,
            Oper::Le => RelOp::Le,
            Oper::Gt => RelOp::Gt,
            _ => RelOp::Ge,
        };
        let exp = if self.types.is_string(l.ty) && self.types.is_string(r.ty) {
            self.tr.string_compare(relop, l.exp, r.exp)
        } else {
            self.tr.compare(relop, l.exp, r.exp)
        };
        ExpTy { exp, ty: TypeId::INT }
    }

    /// Operand rule for comparisons and array initialisers: the actual
    /// types agree, or one side is nil and the other a record.
    ///
    /// `actual` strips arrays too, so with `aa` an array of array of int
    /// the initialiser in `aa[2] of 5` is accepted.
    fn operands_match(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.types.actual(a), self.types.actual(b));
        a == b
            || a == TypeId::ERROR
            || b == TypeId::ERROR
            || (a == TypeId::NIL && self.types.is_record(b))
            || (b == TypeId::NIL && self.types.is_record(a))
    }

    fn trans_record(&mut self, level: LevelId, ty: &Ident, fields: &[FieldInit], span: Span) -> ExpTy {
        let Some(&record_ty) = self.tenv.look(&ty.name) else {
            self.undefined(ErrorKind::UndefinedType(ty.name.clone()), ty.span);
            for field in fields {
                self.trans_exp(level, &field.expr);
            }
            return self.fallback();
        };
        let Some(declared) = self.types.record_fields(record_ty).map(<[_]>::to_vec) else {
            self.error(ErrorKind::NotARecord(ty.name.clone()), ty.span);
            for field in fields {
                self.trans_exp(level, &field.expr);
            }
            return self.fallback();
        };

        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let value = self.trans_exp(level, &field.expr);
            match declared.iter().position(|(name, _)| *name == field.name.name) {
                Some(index) => {
                    let expected = declared[index].1;
                    if !self.types.compatible(value.ty, expected) {
                        let expected = self.show(expected);
                        let found = self.show(value.ty);
                        self.error(ErrorKind::TypeMismatch { expected, found }, field.expr.span);
                    }
                    values.push((index, value.exp));
                }
                None => self.error(
                    ErrorKind::UnknownField {
                        field: field.name.name.clone(),
                        ty: ty.name.clone(),
                    },
                    field.name.span,
                ),
            }
        }
        for (name, _) in &declared {
            if !fields.iter().any(|f| f.name.name == *name) {
                self.error(
                    ErrorKind::MissingField {
                        field: name.clone(),
                        ty: ty.name.clone(),
                    },
                    span,
                );
            }
        }

        ExpTy {
            exp: self.tr.record(declared.len(), values),
            ty: record_ty,
        }
    }

    fn trans_assign(&mut self, level: LevelId, var: &Var, rhs: &Expr) -> ExpTy {
        let dst = self.trans_var(level, var);
        let src = self.trans_exp(level, rhs);
        if self.types.is_loop_variable(dst.ty) {
            self.error(ErrorKind::LoopVariableAssignment(var.pretty_print()), var.span);
        } else if !self.types.compatible(src.ty, dst.ty) {
            let expected = self.show(dst.ty);
            let found = self.show(src.ty);
            self.error(ErrorKind::TypeMismatch { expected, found }, rhs.span);
        }
        ExpTy {
            exp: self.tr.assign(dst.exp, src.exp),
            ty: TypeId::VOID,
        }
    }

    /// A loop or branch test. A non-integer test is reported and replaced
    /// by a constant.
    fn trans_test(&mut self, level: LevelId, test: &Expr) -> TrExp {
        let et = self.trans_exp(level, test);
        if self.expect_int(et.ty, test.span) {
            et.exp
        } else {
            self.tr.int(0)
        }
    }

    fn trans_if(&mut self, level: LevelId, test: &Expr, then: &Expr, els: Option<&Expr>, span: Span) -> ExpTy {
        let test = self.trans_test(level, test);
        let then_et = self.trans_exp(level, then);

        let Some(els) = els else {
            self.expect_no_value("if-then", then_et.ty, then.span);
            return ExpTy {
                exp: self.tr.if_then(test, then_et.exp),
                ty: TypeId::VOID,
            };
        };

        let else_et = self.trans_exp(level, els);
        let ty = self.join_branches(then_et.ty, else_et.ty, span);
        let (then_exp, else_exp) = if self.types.is_void(ty) {
            (
                TrExp::Nx(self.tr.un_nx(then_et.exp)),
                TrExp::Nx(self.tr.un_nx(else_et.exp)),
            )
        } else {
            (then_et.exp, else_et.exp)
        };
        ExpTy {
            exp: self.tr.if_then_else(test, then_exp, else_exp),
            ty,
        }
    }

    /// Result type of an if-then-else. A nil branch takes the type of the
    /// other branch.
    fn join_branches(&mut self, then: TypeId, els: TypeId, span: Span) -> TypeId {
        if self.types.compatible(then, els) {
            return if self.types.is_nil(then) || self.types.is_error(then) {
                els
            } else {
                then
            };
        }
        let nil_and_void = (self.types.is_nil(then) && self.types.is_void(els))
            || (self.types.is_void(then) && self.types.is_nil(els));
        if nil_and_void {
            return TypeId::VOID;
        }
        let (then_name, els_name) = (self.show(then), self.show(els));
        self.error(
            ErrorKind::BranchMismatch {
                then: then_name,
                els: els_name,
            },
            span,
        );
        then
    }

    fn trans_while(&mut self, level: LevelId, test: &Expr, body: &Expr) -> ExpTy {
        let test = self.trans_test(level, test);
        self.loops.push(PatchList::new());
        let body_et = self.trans_exp(level, body);
        let breaks = self.loops.pop().unwrap_or_default();
        self.expect_no_value("while", body_et.ty, body.span);
        ExpTy {
            exp: self.tr.while_loop(test, body_et.exp, breaks),
            ty: TypeId::VOID,
        }
    }

    fn trans_for(
        &mut self,
        level: LevelId,
        var: &Ident,
        escape: bool,
        lo: &Expr,
        hi: &Expr,
        body: &Expr,
    ) -> ExpTy {
        let lo_et = self.trans_exp(level, lo);
        self.expect_int(lo_et.ty, lo.span);
        let hi_et = self.trans_exp(level, hi);
        self.expect_int(hi_et.ty, hi.span);

        self.scoped(|this| {
            let access = this.tr.alloc_local(level, escape);
            let ty = this.types.loop_variable(TypeId::INT);
            this.venv.enter(var.name.clone(), EnvEntry::Var { access, ty });

            this.loops.push(PatchList::new());
            let body_et = this.trans_exp(level, body);
            let breaks = this.loops.pop().unwrap_or_default();
            this.expect_no_value("for", body_et.ty, body.span);

            let index = this.tr.simple_var(&access, level);
            ExpTy {
                exp: this.tr.for_loop(index, lo_et.exp, hi_et.exp, body_et.exp, breaks),
                ty: TypeId::VOID,
            }
        })
    }

    fn trans_break(&mut self, span: Span) -> ExpTy {
        if self.loops.is_empty() {
            self.error(ErrorKind::BreakOutsideLoop, span);
            return ExpTy {
                exp: self.tr.no_op(),
                ty: TypeId::VOID,
            };
        }
        let (exp, slots) = self.tr.break_jump();
        if let Some(breaks) = self.loops.last_mut() {
            let pending = std::mem::take(breaks);
            *breaks = pending.join(slots);
        }
        ExpTy {
            exp,
            ty: TypeId::VOID,
        }
    }

    fn trans_array(&mut self, level: LevelId, ty: &Ident, size: &Expr, init: &Expr) -> ExpTy {
        let size_et = self.trans_exp(level, size);
        self.expect_int(size_et.ty, size.span);
        let init_et = self.trans_exp(level, init);

        let Some(&array_ty) = self.tenv.look(&ty.name) else {
            self.undefined(ErrorKind::UndefinedType(ty.name.clone()), ty.span);
            return self.fallback();
        };
        let Some(element) = self.types.array_element(array_ty) else {
            self.error(ErrorKind::NotAnArray(ty.name.clone()), ty.span);
            return self.fallback();
        };
        if !self.operands_match(init_et.ty, element) {
            let expected = self.show(element);
            let found = self.show(init_et.ty);
            self.error(ErrorKind::TypeMismatch { expected, found }, init.span);
        }

        ExpTy {
            exp: self.tr.array(size_et.exp, init_et.exp),
            ty: array_ty,
        }
    }

    // === Declarations ===

    /// Returns the initialisation code the declaration contributes to the
    /// enclosing `let`
    fn trans_dec(&mut self, level: LevelId, dec: &Dec) -> Option<TrExp> {
        match dec {
            Dec::Var(v) => Some(self.trans_var_dec(level, v)),
            Dec::Type(group) => {
                self.trans_type_group(group);
                None
            }
            Dec::Function(group) => {
                self.trans_function_group(level, group);
                None
            }
        }
    }

    fn trans_var_dec(&mut self, level: LevelId, v: &VarDec) -> TrExp {
        let init = self.trans_exp(level, &v.init);
        let ty = match &v.ty {
            Some(annotation) => match self.tenv.look(&annotation.name).copied() {
                Some(declared) => {
                    let accepted = if self.types.is_nil(init.ty) {
                        !matches!(
                            self.types.get(self.types.resolve(declared)),
                            Type::Int | Type::String | Type::Nil | Type::Void
                        )
                    } else {
                        self.types.compatible(init.ty, declared)
                    };
                    if !accepted {
                        let expected = self.show(declared);
                        let found = self.show(init.ty);
                        self.error(ErrorKind::TypeMismatch { expected, found }, v.init.span);
                    }
                    declared
                }
                None => {
                    self.undefined(
                        ErrorKind::UndefinedType(annotation.name.clone()),
                        annotation.span,
                    );
                    init.ty
                }
            },
            None => {
                if self.types.is_nil(init.ty) {
                    self.error(ErrorKind::UntypedNil, v.init.span);
                }
                init.ty
            }
        };

        let access = self.tr.alloc_local(level, v.escape.get());
        self.venv.enter(v.name.name.clone(), EnvEntry::Var { access, ty });
        self.tr.var_init(&access, level, init.exp)
    }

    fn trans_type_group(&mut self, group: &[TypeDec]) {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(group.len());
        for dec in group {
            if !seen.insert(dec.name.name.as_str()) {
                self.error(ErrorKind::DuplicateType(dec.name.name.clone()), dec.name.span);
            }
            let id = self.types.name(&dec.name.name);
            self.tenv.enter(dec.name.name.clone(), id);
            ids.push(id);
        }

        for (dec, &id) in group.iter().zip(&ids) {
            let body = self.trans_ty(&dec.ty);
            self.types.bind_name(id, body);
        }

        for (dec, &id) in group.iter().zip(&ids) {
            if self.types.is_cyclic_name(id) {
                self.error(ErrorKind::IllegalCycle(dec.name.name.clone()), dec.span);
                // Break the cycle for the rest of the group
                self.types.bind_name(id, TypeId::ERROR);
            }
        }
        tracing::trace!(count = group.len(), "type group");
    }

    fn trans_ty(&mut self, ty: &TyExpr) -> TypeId {
        match &ty.kind {
            TyKind::Name(id) => self.lookup_type(id),
            TyKind::Array(id) => {
                let element = self.lookup_type(id);
                self.types.array(element)
            }
            TyKind::Record(fields) => {
                let mut seen = HashSet::new();
                let mut field_types = Vec::with_capacity(fields.len());
                for field in fields {
                    if !seen.insert(field.name.name.as_str()) {
                        self.error(ErrorKind::DuplicateField(field.name.name.clone()), field.name.span);
                    }
                    let field_ty = self.lookup_type(&field.ty);
                    field_types.push((field.name.name.clone(), field_ty));
                }
                self.types.record(field_types)
            }
        }
    }

    fn trans_function_group(&mut self, level: LevelId, group: &[FunDec]) {
        // Headers first so the bodies can call each other
        let mut seen = HashSet::new();
        let mut headers = Vec::with_capacity(group.len());
        for dec in group {
            if !seen.insert(dec.name.name.as_str()) {
                self.error(ErrorKind::DuplicateFunction(dec.name.name.clone()), dec.name.span);
            }
            let formals: Vec<TypeId> = dec.params.iter().map(|p| self.lookup_type(&p.ty)).collect();
            let result = match &dec.result {
                Some(result) => self.lookup_type(result),
                None => TypeId::VOID,
            };
            let escapes: Vec<bool> = dec.params.iter().map(|p| p.escape.get()).collect();
            let label = self.tr.function_label(&dec.name.name);
            let fun_level = self.tr.new_level(level, label.clone(), &escapes);
            let entry = FunEntry {
                kind: FunKind::Declared(fun_level),
                label,
                formals,
                result,
            };
            self.venv.enter(dec.name.name.clone(), EnvEntry::Fun(entry.clone()));
            headers.push((fun_level, entry));
        }

        for (dec, (fun_level, entry)) in group.iter().zip(headers) {
            // A break in the body cannot leave a loop around the declaration
            let outer_loops = std::mem::take(&mut self.loops);
            let body = self.scoped(|this| {
                let accesses = this.tr.formals(fun_level).to_vec();
                for ((param, &ty), access) in dec.params.iter().zip(&entry.formals).zip(accesses) {
                    this.venv.enter(param.name.name.clone(), EnvEntry::Var { access, ty });
                }
                this.trans_exp(fun_level, &dec.body)
            });
            self.loops = outer_loops;

            if dec.result.is_none() {
                let silent = self.types.is_void(body.ty)
                    || self.types.is_nil(body.ty)
                    || self.types.is_error(body.ty);
                if !silent {
                    let found = self.show(body.ty);
                    self.error(
                        ErrorKind::BodyProducesValue {
                            construct: "procedure",
                            found,
                        },
                        dec.body.span,
                    );
                }
            } else if !self.types.compatible(body.ty, entry.result) {
                let expected = self.show(entry.result);
                let found = self.show(body.ty);
                self.error(ErrorKind::TypeMismatch { expected, found }, dec.body.span);
            }

            tracing::debug!(function = %dec.name.name, label = %entry.label, "function body");
            let returns_value = !self.types.is_void(entry.result);
            self.tr.proc_entry_exit(fun_level, body.exp, returns_value);
        }
    }
}
