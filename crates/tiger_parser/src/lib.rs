use std::cell::Cell;
use tiger_ast::*;
use tiger_lexer::{Lexer, Span, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Binary operators as seen by the precedence climber. `&` and `|` never
/// reach the AST: they are rewritten into conditionals.
#[derive(Debug, Clone, Copy)]
enum BinTok {
    Or,
    And,
    Op(Oper),
}

impl BinTok {
    fn precedence(self) -> u8 {
        match self {
            BinTok::Or => 1,
            BinTok::And => 2,
            BinTok::Op(op) => op.precedence(),
        }
    }
}

impl Parser {
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = Lexer::tokenize(source)
            .map_err(|e| ParseError { message: e.message, span: e.span })?;
        Ok(Self { tokens, pos: 0 })
    }

    pub fn parse(source: &str) -> ParseResult<Program> {
        let mut parser = Parser::new(source)?;
        let program = parser.parse_expr()?;
        if !parser.is_at_end() {
            return Err(ParseError {
                message: format!("expected end of program, found '{}'", parser.peek()),
                span: parser.peek_span(),
            });
        }
        Ok(program)
    }

    // === Token Access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.peek_span()
        } else {
            self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span
        }
    }

    fn advance(&mut self) -> &SpannedToken {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, self.peek()),
                span: self.peek_span(),
            })
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.peek_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(ParseError {
                message: format!("expected identifier, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    // === Expressions ===

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_binop() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.advance(); // consume operator
            let right = self.parse_binary(prec + 1)?;
            let span = left.span.to(right.span);

            left = match op {
                // a & b  =>  if a then b else 0
                BinTok::And => Expr::new(
                    ExprKind::If {
                        test: Box::new(left),
                        then: Box::new(right),
                        els: Some(Box::new(Expr::new(ExprKind::Int(0), span))),
                    },
                    span,
                ),
                // a | b  =>  if a then 1 else b
                BinTok::Or => Expr::new(
                    ExprKind::If {
                        test: Box::new(left),
                        then: Box::new(Expr::new(ExprKind::Int(1), span)),
                        els: Some(Box::new(right)),
                    },
                    span,
                ),
                BinTok::Op(op) => Expr::new(
                    ExprKind::Op {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    span,
                ),
            };

            if let (BinTok::Op(op), Some(BinTok::Op(next))) = (op, self.peek_binop()) {
                if !op.is_arithmetic() && !next.is_arithmetic() {
                    return Err(ParseError {
                        message: "comparison operators do not associate".to_string(),
                        span: self.peek_span(),
                    });
                }
            }
        }

        Ok(left)
    }

    fn peek_binop(&self) -> Option<BinTok> {
        match self.peek() {
            Token::Pipe => Some(BinTok::Or),
            Token::Amp => Some(BinTok::And),
            Token::Plus => Some(BinTok::Op(Oper::Plus)),
            Token::Minus => Some(BinTok::Op(Oper::Minus)),
            Token::Star => Some(BinTok::Op(Oper::Times)),
            Token::Slash => Some(BinTok::Op(Oper::Divide)),
            Token::Eq => Some(BinTok::Op(Oper::Eq)),
            Token::NotEq => Some(BinTok::Op(Oper::Neq)),
            Token::Lt => Some(BinTok::Op(Oper::Lt)),
            Token::LtEq => Some(BinTok::Op(Oper::Le)),
            Token::Gt => Some(BinTok::Op(Oper::Gt)),
            Token::GtEq => Some(BinTok::Op(Oper::Ge)),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();

        if self.eat(&Token::Minus) {
            // -e  =>  0 - e
            let operand = self.parse_unary()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(
                ExprKind::Op {
                    left: Box::new(Expr::new(ExprKind::Int(0), start)),
                    op: Oper::Minus,
                    right: Box::new(operand),
                },
                span,
            ));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();

        match self.peek().clone() {
            Token::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::Nil, start))
            }
            Token::IntLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), start))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), start))
            }
            Token::Break => {
                self.advance();
                Ok(Expr::new(ExprKind::Break, start))
            }
            Token::LParen => {
                self.advance();
                let exprs = self.parse_expr_seq(&Token::RParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::new(ExprKind::Seq(exprs), start.to(self.prev_span())))
            }
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Let => self.parse_let(),
            Token::Ident(_) => self.parse_ident_expr(),
            _ => Err(ParseError {
                message: format!("expected expression, found '{}'", self.peek()),
                span: start,
            }),
        }
    }

    /// Expressions separated by `;`, stopping before `terminator`
    fn parse_expr_seq(&mut self, terminator: &Token) -> ParseResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        if self.check(terminator) {
            return Ok(exprs);
        }
        exprs.push(self.parse_expr()?);
        while self.eat(&Token::Semi) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_if(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::If)?.span;
        let test = self.parse_expr()?;
        self.expect(Token::Then)?;
        let then = self.parse_expr()?;
        let els = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                test: Box::new(test),
                then: Box::new(then),
                els,
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::While)?.span;
        let test = self.parse_expr()?;
        self.expect(Token::Do)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::While {
                test: Box::new(test),
                body: Box::new(body),
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_for(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::For)?.span;
        let var = self.expect_ident()?;
        self.expect(Token::Assign)?;
        let lo = self.parse_expr()?;
        self.expect(Token::To)?;
        let hi = self.parse_expr()?;
        self.expect(Token::Do)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::For {
                var,
                escape: Cell::new(true),
                lo: Box::new(lo),
                hi: Box::new(hi),
                body: Box::new(body),
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_let(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::Let)?.span;
        let decs = self.parse_decs()?;
        self.expect(Token::In)?;
        let body_start = self.peek_span();
        let exprs = self.parse_expr_seq(&Token::End)?;
        let body_span = body_start.to(self.prev_span());
        self.expect(Token::End)?;
        Ok(Expr::new(
            ExprKind::Let {
                decs,
                body: Box::new(Expr::new(ExprKind::Seq(exprs), body_span)),
            },
            start.to(self.prev_span()),
        ))
    }

    /// Expressions that start with an identifier: variables, assignments,
    /// calls, record creation and array creation.
    fn parse_ident_expr(&mut self) -> ParseResult<Expr> {
        let id = self.expect_ident()?;
        let start = id.span;

        match self.peek() {
            Token::LParen => {
                self.advance();
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    args.push(self.parse_expr()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::new(ExprKind::Call { func: id, args }, start.to(self.prev_span())))
            }
            Token::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                if !self.check(&Token::RBrace) {
                    fields.push(self.parse_field_init()?);
                    while self.eat(&Token::Comma) {
                        fields.push(self.parse_field_init()?);
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::new(ExprKind::Record { ty: id, fields }, start.to(self.prev_span())))
            }
            Token::LBracket => {
                // Either `ty [size] of init` or the first subscript of an lvalue.
                self.advance();
                let index = self.parse_expr()?;
                self.expect(Token::RBracket)?;
                if self.eat(&Token::Of) {
                    let init = self.parse_expr()?;
                    return Ok(Expr::new(
                        ExprKind::Array {
                            ty: id,
                            size: Box::new(index),
                            init: Box::new(init),
                        },
                        start.to(self.prev_span()),
                    ));
                }
                let base = Var { kind: VarKind::Simple(id), span: start };
                let var = Var {
                    kind: VarKind::Subscript(Box::new(base), Box::new(index)),
                    span: start.to(self.prev_span()),
                };
                self.finish_lvalue(var)
            }
            _ => {
                let var = Var { kind: VarKind::Simple(id), span: start };
                self.finish_lvalue(var)
            }
        }
    }

    /// Parse trailing `.field` / `[index]` selectors and an optional `:=`
    fn finish_lvalue(&mut self, mut var: Var) -> ParseResult<Expr> {
        loop {
            if self.eat(&Token::Dot) {
                let field = self.expect_ident()?;
                let span = var.span.to(field.span);
                var = Var { kind: VarKind::Field(Box::new(var), field), span };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expr()?;
                self.expect(Token::RBracket)?;
                let span = var.span.to(self.prev_span());
                var = Var { kind: VarKind::Subscript(Box::new(var), Box::new(index)), span };
            } else {
                break;
            }
        }

        if self.eat(&Token::Assign) {
            let expr = self.parse_expr()?;
            let span = var.span.to(expr.span);
            return Ok(Expr::new(ExprKind::Assign { var, expr: Box::new(expr) }, span));
        }

        let span = var.span;
        Ok(Expr::new(ExprKind::Var(var), span))
    }

    fn parse_field_init(&mut self) -> ParseResult<FieldInit> {
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let expr = self.parse_expr()?;
        let span = name.span.to(expr.span);
        Ok(FieldInit { name, expr, span })
    }

    // === Declarations ===

    fn parse_decs(&mut self) -> ParseResult<Vec<Dec>> {
        let mut decs = Vec::new();
        loop {
            match self.peek() {
                Token::Function => {
                    let mut group = Vec::new();
                    while self.check(&Token::Function) {
                        group.push(self.parse_fun_dec()?);
                    }
                    decs.push(Dec::Function(group));
                }
                Token::Type => {
                    let mut group = Vec::new();
                    while self.check(&Token::Type) {
                        group.push(self.parse_type_dec()?);
                    }
                    decs.push(Dec::Type(group));
                }
                Token::Var => decs.push(Dec::Var(self.parse_var_dec()?)),
                _ => return Ok(decs),
            }
        }
    }

    fn parse_fun_dec(&mut self) -> ParseResult<FunDec> {
        let start = self.expect(Token::Function)?.span;
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let params = self.parse_ty_fields(&Token::RParen)?;
        self.expect(Token::RParen)?;
        let result = if self.eat(&Token::Colon) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::Eq)?;
        let body = self.parse_expr()?;
        let span = start.to(body.span);
        Ok(FunDec { name, params, result, body, span })
    }

    fn parse_var_dec(&mut self) -> ParseResult<VarDec> {
        let start = self.expect(Token::Var)?.span;
        let name = self.expect_ident()?;
        let ty = if self.eat(&Token::Colon) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::Assign)?;
        let init = self.parse_expr()?;
        let span = start.to(init.span);
        Ok(VarDec { name, escape: Cell::new(true), ty, init, span })
    }

    fn parse_type_dec(&mut self) -> ParseResult<TypeDec> {
        let start = self.expect(Token::Type)?.span;
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let ty_start = self.peek_span();
        let kind = match self.peek() {
            Token::LBrace => {
                self.advance();
                let fields = self.parse_ty_fields(&Token::RBrace)?;
                self.expect(Token::RBrace)?;
                TyKind::Record(fields)
            }
            Token::Array => {
                self.advance();
                self.expect(Token::Of)?;
                TyKind::Array(self.expect_ident()?)
            }
            _ => TyKind::Name(self.expect_ident()?),
        };
        let ty = TyExpr { kind, span: ty_start.to(self.prev_span()) };
        let span = start.to(ty.span);
        Ok(TypeDec { name, ty, span })
    }

    /// `a: int, b: string`, possibly empty
    fn parse_ty_fields(&mut self, terminator: &Token) -> ParseResult<Vec<Field>> {
        let mut fields = Vec::new();
        if self.check(terminator) {
            return Ok(fields);
        }
        loop {
            let name = self.expect_ident()?;
            self.expect(Token::Colon)?;
            let ty = self.expect_ident()?;
            let span = name.span.to(ty.span);
            fields.push(Field { name, ty, escape: Cell::new(true), span });
            if !self.eat(&Token::Comma) {
                return Ok(fields);
            }
        }
    }
}
