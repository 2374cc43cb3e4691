//! Recursive-descent parser
//!
//! Statements are separated by newlines or `;`. Newlines are insignificant
//! inside parentheses, brackets, after binary operators and before a `.`
//! that continues a method chain.

use std::rc::Rc;

use super::ast::{AssignOp, BinOp, Expr, FunctionDef, Stmt, UnaryOp};
use super::error::{Pos, ScriptError, ScriptResult};
use super::lexer::{tokenize, Token, TokenKind};

/// Deepest expression/block nesting accepted before bailing out
const MAX_NESTING: usize = 128;

/// Parse source into a list of statements
pub fn parse(source: &str) -> ScriptResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(i) => format!("number {}", i),
        TokenKind::Float(x) => format!("number {}", x),
        TokenKind::Str(s) => format!("string '{}'", s),
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("{:?}", other),
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn token(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &TokenKind {
        &self.token().kind
    }

    fn peek_at(
        &self,
        offset: usize,
    ) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn current_pos(&self) -> Pos {
        self.token().pos
    }

    fn advance(&mut self) -> Token {
        let token = self.token().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(
        &self,
        kind: &TokenKind,
    ) -> bool {
        self.peek() == kind
    }

    fn eat(
        &mut self,
        kind: &TokenKind,
    ) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(
        &self,
        expected: &str,
    ) -> ScriptError {
        ScriptError::syntax(
            format!("Expected {} but found {}", expected, describe(self.peek())),
            self.current_pos(),
        )
    }

    fn expect(
        &mut self,
        kind: &TokenKind,
        expected: &str,
    ) -> ScriptResult<Pos> {
        if self.check(kind) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self) -> ScriptResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn enter(&mut self) -> ScriptResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::syntax("Input nested too deeply", self.current_pos()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn parse_program(&mut self) -> ScriptResult<Vec<Stmt>> {
        let stmts = self.parse_statements(&TokenKind::Eof)?;
        self.expect(&TokenKind::Eof, "end of input")?;
        Ok(stmts)
    }

    fn parse_statements(
        &mut self,
        terminator: &TokenKind,
    ) -> ScriptResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.check(terminator) || self.check(&TokenKind::Eof) {
                return Ok(stmts);
            }
            stmts.push(self.parse_statement()?);
            if !matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
            ) && !self.check(terminator)
            {
                return Err(self.unexpected("end of statement"));
            }
        }
    }

    /// `{ stmts }` or a single statement
    fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.enter()?;
        self.skip_newlines();
        let body = if self.eat(&TokenKind::LBrace) {
            let stmts = self.parse_statements(&TokenKind::RBrace)?;
            self.expect(&TokenKind::RBrace, "'}'")?;
            stmts
        } else {
            vec![self.parse_statement()?]
        };
        self.leave();
        Ok(body)
    }

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        match self.peek() {
            TokenKind::KwDef | TokenKind::KwVar => self.parse_declaration(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwReturn => {
                self.advance();
                if matches!(
                    self.peek(),
                    TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                ) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.parse_expr()?)))
                }
            }
            TokenKind::KwBreak => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::KwContinue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_declaration(&mut self) -> ScriptResult<Stmt> {
        let pos = self.advance().pos;
        let name = self.expect_ident()?;
        if self.check(&TokenKind::LParen) {
            let params = self.parse_params()?;
            self.skip_newlines();
            self.expect(&TokenKind::LBrace, "'{' to start function body")?;
            let body = self.parse_statements(&TokenKind::RBrace)?;
            self.expect(&TokenKind::RBrace, "'}'")?;
            return Ok(Stmt::Function(Rc::new(FunctionDef {
                name: Some(name),
                params,
                body: Rc::new(body),
                pos,
            })));
        }
        let init = if self.eat(&TokenKind::Assign) {
            self.skip_newlines();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Declare { name, init, pos })
    }

    fn parse_params(&mut self) -> ScriptResult<Vec<String>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        self.skip_newlines();
        if self.eat(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            self.eat(&TokenKind::KwDef);
            let name = self.expect_ident()?;
            if params.contains(&name) {
                return Err(ScriptError::syntax(
                    format!("Duplicate parameter '{}'", name),
                    self.current_pos(),
                ));
            }
            params.push(name);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(params);
        }
    }

    fn parse_condition(&mut self) -> ScriptResult<Expr> {
        self.expect(&TokenKind::LParen, "'('")?;
        self.skip_newlines();
        let cond = self.parse_expr()?;
        self.skip_newlines();
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> ScriptResult<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let then_branch = self.parse_block()?;

        let save = self.pos;
        self.skip_separators();
        let else_branch = if self.eat(&TokenKind::KwElse) {
            if self.check(&TokenKind::KwIf) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            self.pos = save;
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_for(&mut self) -> ScriptResult<Stmt> {
        let pos = self.advance().pos;
        self.expect(&TokenKind::LParen, "'('")?;
        if !self.eat(&TokenKind::KwDef) {
            self.eat(&TokenKind::KwVar);
        }
        let var = self.expect_ident()?;
        self.expect(&TokenKind::KwIn, "'in'")?;
        let iter = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            iter,
            body,
            pos,
        })
    }

    /// `println 'x'` style call: identifier followed by an argument on the same line
    fn is_command_call(&self) -> bool {
        let (TokenKind::Ident(_), Some(next)) = (self.peek(), self.tokens.get(self.pos + 1)) else {
            return false;
        };
        next.pos.line == self.current_pos().line
            && matches!(
                next.kind,
                TokenKind::Str(_)
                    | TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::Ident(_)
                    | TokenKind::KwTrue
                    | TokenKind::KwFalse
                    | TokenKind::KwNull
            )
    }

    fn parse_expression_statement(&mut self) -> ScriptResult<Stmt> {
        if self.is_command_call() {
            let pos = self.current_pos();
            let name = self.expect_ident()?;
            let mut args = vec![self.parse_expr()?];
            while self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                args.push(self.parse_expr()?);
            }
            return Ok(Stmt::Expr(Expr::Call(Box::new(Expr::Var(name, pos)), args, pos)));
        }

        let pos = self.current_pos();
        let expr = self.parse_expr()?;
        let op = match self.peek() {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            _ => return Ok(Stmt::Expr(expr)),
        };
        if !matches!(expr, Expr::Var(..) | Expr::Member(..) | Expr::Index(..)) {
            return Err(ScriptError::syntax("Invalid assignment target", pos));
        }
        self.advance();
        self.skip_newlines();
        let value = self.parse_expr()?;
        Ok(Stmt::Assign {
            target: expr,
            op,
            value,
            pos,
        })
    }

    pub fn parse_expr(&mut self) -> ScriptResult<Expr> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.skip_newlines();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            self.skip_newlines();
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> ScriptResult<Expr>,
    ) -> ScriptResult<Expr> {
        let mut left = next(self)?;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| *op)
            else {
                return Ok(left);
            };
            let pos = self.advance().pos;
            self.skip_newlines();
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), pos);
        }
    }

    fn parse_equality(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::Neq, BinOp::Ne)],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let pos = self.advance().pos;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand?), pos))
    }

    fn continues_chain(&self) -> bool {
        let mut offset = 0;
        while self.peek_at(offset) == &TokenKind::Newline {
            offset += 1;
        }
        offset > 0 && self.peek_at(offset) == &TokenKind::Dot
    }

    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.continues_chain() {
                self.skip_newlines();
            }
            match self.peek() {
                TokenKind::Dot => {
                    let pos = self.advance().pos;
                    let name = self.expect_ident()?;
                    if self.check(&TokenKind::LParen) {
                        let mut args = self.parse_args()?;
                        if self.check(&TokenKind::LBrace) {
                            args.push(self.parse_closure()?);
                        }
                        expr = Expr::MethodCall(Box::new(expr), name, args, pos);
                    } else if self.check(&TokenKind::LBrace) {
                        let closure = self.parse_closure()?;
                        expr = Expr::MethodCall(Box::new(expr), name, vec![closure], pos);
                    } else {
                        expr = Expr::Member(Box::new(expr), name, pos);
                    }
                }
                TokenKind::LBracket => {
                    let pos = self.advance().pos;
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index), pos);
                }
                TokenKind::LParen => {
                    let pos = self.current_pos();
                    let mut args = self.parse_args()?;
                    if self.check(&TokenKind::LBrace) {
                        args.push(self.parse_closure()?);
                    }
                    expr = Expr::Call(Box::new(expr), args, pos);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> ScriptResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        self.skip_newlines();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let token = self.token().clone();
        let expr = match token.kind {
            TokenKind::Int(i) => Expr::Int(i),
            TokenKind::Float(x) => Expr::Float(x),
            TokenKind::Str(s) => Expr::Str(Rc::from(s.as_str())),
            TokenKind::KwTrue => Expr::Bool(true),
            TokenKind::KwFalse => Expr::Bool(false),
            TokenKind::KwNull => Expr::Null,
            TokenKind::Ident(name) => Expr::Var(name, token.pos),
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_collection(),
            TokenKind::LBrace => return self.parse_closure(),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn is_map_key(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(_) | TokenKind::Str(_)) && self.peek_at(1) == &TokenKind::Colon
    }

    /// `[1, 2]`, `[a: 1, 'b': 2]` or `[:]`
    fn parse_collection(&mut self) -> ScriptResult<Expr> {
        self.advance();
        self.skip_newlines();
        if self.eat(&TokenKind::Colon) {
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::Map(Vec::new()));
        }
        let is_map = self.is_map_key();
        let mut items = Vec::new();
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            if is_map {
                let key = match self.advance().kind {
                    TokenKind::Ident(name) | TokenKind::Str(name) => name,
                    _ => return Err(self.unexpected("map key")),
                };
                self.expect(&TokenKind::Colon, "':'")?;
                self.skip_newlines();
                entries.push((key, self.parse_expr()?));
            } else {
                items.push(self.parse_expr()?);
            }
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                self.expect(&TokenKind::RBracket, "',' or ']'")?;
                break;
            }
        }
        Ok(if is_map {
            Expr::Map(entries)
        } else {
            Expr::List(items)
        })
    }

    /// `{ a, b -> body }` or `{ body }` (implicit `it`)
    fn parse_closure(&mut self) -> ScriptResult<Expr> {
        let pos = self.expect(&TokenKind::LBrace, "'{'")?;
        self.enter()?;
        self.skip_newlines();

        let save = self.pos;
        let mut params = Vec::new();
        if !self.eat(&TokenKind::Arrow) {
            while let TokenKind::Ident(name) = self.peek().clone() {
                self.advance();
                params.push(name);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            if params.is_empty() || !self.eat(&TokenKind::Arrow) {
                params.clear();
                self.pos = save;
            }
        }

        let body = self.parse_statements(&TokenKind::RBrace)?;
        self.expect(&TokenKind::RBrace, "'}'")?;
        self.leave();
        Ok(Expr::Closure(Rc::new(FunctionDef {
            name: None,
            params,
            body: Rc::new(body),
            pos,
        })))
    }
}
