//! Escape analysis
//!
//! A variable escapes when it is read or written from a function nested
//! deeper than the one that declares it. Such variables must live in the
//! frame so the inner function can reach them through static links.

use std::cell::Cell;
use tiger_ast::*;
use tiger_types::Table;

/// Set the `escape` flag of every variable, formal and loop index in
/// `program`.
pub fn find_escapes(program: &Program) {
    let mut finder = EscapeFinder {
        env: Table::new(),
        depth: 0,
    };
    finder.visit_exp(program);
}

struct EscapeFinder<'a> {
    /// `None` marks a function name shadowing a variable
    env: Table<Option<(u32, &'a Cell<bool>)>>,
    depth: u32,
}

impl<'a> EscapeFinder<'a> {
    fn declare(&mut self, name: &str, escape: &'a Cell<bool>) {
        escape.set(false);
        self.env.enter(name, Some((self.depth, escape)));
    }

    fn visit_var(&mut self, var: &'a Var) {
        match &var.kind {
            VarKind::Simple(id) => {
                if let Some(&Some((depth, escape))) = self.env.look(&id.name) {
                    if depth < self.depth {
                        escape.set(true);
                    }
                }
            }
            VarKind::Field(base, _) => self.visit_var(base),
            VarKind::Subscript(base, index) => {
                self.visit_var(base);
                self.visit_exp(index);
            }
        }
    }

    fn visit_exp(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Var(var) => self.visit_var(var),
            ExprKind::Nil | ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Break => {}
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.visit_exp(arg);
                }
            }
            ExprKind::Op { left, right, .. } => {
                self.visit_exp(left);
                self.visit_exp(right);
            }
            ExprKind::Record { fields, .. } => {
                for field in fields {
                    self.visit_exp(&field.expr);
                }
            }
            ExprKind::Seq(exprs) => {
                for e in exprs {
                    self.visit_exp(e);
                }
            }
            ExprKind::Assign { var, expr } => {
                self.visit_var(var);
                self.visit_exp(expr);
            }
            ExprKind::If { test, then, els } => {
                self.visit_exp(test);
                self.visit_exp(then);
                if let Some(els) = els {
                    self.visit_exp(els);
                }
            }
            ExprKind::While { test, body } => {
                self.visit_exp(test);
                self.visit_exp(body);
            }
            ExprKind::For { var, escape, lo, hi, body } => {
                self.visit_exp(lo);
                self.visit_exp(hi);
                self.env.begin_scope();
                self.declare(&var.name, escape);
                self.visit_exp(body);
                self.env.end_scope();
            }
            ExprKind::Let { decs, body } => {
                self.env.begin_scope();
                for dec in decs {
                    self.visit_dec(dec);
                }
                self.visit_exp(body);
                self.env.end_scope();
            }
            ExprKind::Array { size, init, .. } => {
                self.visit_exp(size);
                self.visit_exp(init);
            }
        }
    }

    fn visit_dec(&mut self, dec: &'a Dec) {
        match dec {
            Dec::Function(group) => {
                for f in group {
                    self.env.enter(f.name.name.as_str(), None);
                }
                for f in group {
                    self.depth += 1;
                    self.env.begin_scope();
                    for param in &f.params {
                        self.declare(&param.name.name, &param.escape);
                    }
                    self.visit_exp(&f.body);
                    self.env.end_scope();
                    self.depth -= 1;
                }
            }
            Dec::Var(v) => {
                self.visit_exp(&v.init);
                self.declare(&v.name.name, &v.escape);
            }
            Dec::Type(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiger_lexer::Span;

    fn ident(name: &str) -> Ident {
        Ident::new(name.to_string(), Span::default())
    }

    fn var(name: &str) -> Expr {
        Expr::new(
            ExprKind::Var(Var {
                kind: VarKind::Simple(ident(name)),
                span: Span::default(),
            }),
            Span::default(),
        )
    }

    fn var_dec(name: &str) -> VarDec {
        VarDec {
            name: ident(name),
            escape: Cell::new(true),
            ty: None,
            init: Expr::new(ExprKind::Int(0), Span::default()),
            span: Span::default(),
        }
    }

    fn fun_dec(name: &str, body: Expr) -> FunDec {
        FunDec {
            name: ident(name),
            params: Vec::new(),
            result: None,
            body,
            span: Span::default(),
        }
    }

    fn let_exp(decs: Vec<Dec>, body: Expr) -> Expr {
        Expr::new(
            ExprKind::Let { decs, body: Box::new(body) },
            Span::default(),
        )
    }

    #[test]
    fn test_local_use_does_not_escape() {
        let program = let_exp(vec![Dec::Var(var_dec("x"))], var("x"));
        find_escapes(&program);
        let ExprKind::Let { decs, .. } = &program.kind else { unreachable!() };
        let Dec::Var(x) = &decs[0] else { unreachable!() };
        assert!(!x.escape.get());
    }

    #[test]
    fn test_use_from_nested_function_escapes() {
        let program = let_exp(
            vec![
                Dec::Var(var_dec("x")),
                Dec::Var(var_dec("y")),
                Dec::Function(vec![fun_dec("f", var("x"))]),
            ],
            var("y"),
        );
        find_escapes(&program);
        let ExprKind::Let { decs, .. } = &program.kind else { unreachable!() };
        let (Dec::Var(x), Dec::Var(y)) = (&decs[0], &decs[1]) else { unreachable!() };
        assert!(x.escape.get());
        assert!(!y.escape.get());
    }

    #[test]
    fn test_function_name_shadows_variable() {
        let program = let_exp(
            vec![
                Dec::Var(var_dec("x")),
                Dec::Function(vec![fun_dec("x", Expr::new(ExprKind::Int(1), Span::default()))]),
                Dec::Function(vec![fun_dec("g", var("x"))]),
            ],
            Expr::new(ExprKind::Nil, Span::default()),
        );
        find_escapes(&program);
        let ExprKind::Let { decs, .. } = &program.kind else { unreachable!() };
        let Dec::Var(x) = &decs[0] else { unreachable!() };
        assert!(!x.escape.get());
    }
}
