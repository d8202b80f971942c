
use std::collections::HashMap;

use crate::ast::*;
use crate::error::VsmError;
use crate::lexer::Lexer;
use crate::token::{Tok, Token};

pub struct Parser<'a> {
    lex: Lexer<'a>,
    cur: Option<Token>,
    // Name-to-slot environment, reset at every function. Parameters take
    // slots 0..n-1, declarations continue from n; slots are never reused.
    locals: HashMap<String, usize>,
    next_slot: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut p = Self {
            lex: Lexer::new(src),
            cur: None,
            locals: HashMap::new(),
            next_slot: 0,
        };
        let _ = p.bump();
        p
    }

    fn bump(&mut self) -> Result<(), VsmError> {
        self.cur = self.lex.next_token()?;
        Ok(())
    }

    fn cur_kind(&self) -> Option<&Tok> {
        self.cur.as_ref().map(|t| &t.kind)
    }

    fn eat(&mut self, k: &Tok) -> Result<bool, VsmError> {
        if self.cur_kind() == Some(k) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, k: Tok) -> Result<(), VsmError> {
        if self.cur_kind() == Some(&k) {
            self.bump()?;
            Ok(())
        } else {
            Err(VsmError::parse(format!(
                "expected {:?}, got {:?}",
                k,
                self.cur_kind()
            )))
        }
    }

    fn take_ident(&mut self) -> Result<String, VsmError> {
        match self.cur_kind() {
            Some(Tok::Ident(s)) => {
                let out = s.clone();
                self.bump()?;
                Ok(out)
            }
            _ => Err(VsmError::parse("expected identifier")),
        }
    }

    fn declare(&mut self, name: &str) -> Result<usize, VsmError> {
        if self.locals.contains_key(name) {
            return Err(VsmError::parse(format!("duplicate declaration of '{name}'")));
        }
        let slot = self.next_slot;
        self.locals.insert(name.to_string(), slot);
        self.next_slot += 1;
        Ok(slot)
    }

    fn lookup(&self, name: &str) -> Result<usize, VsmError> {
        self.locals
            .get(name)
            .copied()
            .ok_or_else(|| VsmError::parse(format!("undeclared variable '{name}'")))
    }

    pub fn parse_program(&mut self) -> Result<Program, VsmError> {
        let mut fns = vec![];
        while self.cur.is_some() {
            fns.push(self.parse_function()?);
        }
        if fns.is_empty() {
            return Err(VsmError::parse("empty program: expected a function declaration"));
        }
        Ok(Program { fns })
    }

    fn parse_type(&mut self) -> Result<Type, VsmError> {
        match self.cur_kind() {
            Some(Tok::Int) => {
                self.bump()?;
                Ok(Type::Int)
            }
            Some(Tok::Void) => {
                self.bump()?;
                Ok(Type::Void)
            }
            other => Err(VsmError::parse(format!("expected type, got {other:?}"))),
        }
    }

    fn parse_function(&mut self) -> Result<Function, VsmError> {
        let return_type = self.parse_type()?;
        let name = self.take_ident()?;
        self.expect(Tok::LParen)?;
        self.locals.clear();
        self.next_slot = 0;
        let params = self.parse_params()?;
        self.expect(Tok::RParen)?;
        self.expect(Tok::LBrace)?;
        let body = self.parse_block_body()?;
        self.expect(Tok::RBrace)?;
        Ok(Function { return_type, name, params, body })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, VsmError> {
        match self.cur_kind() {
            Some(Tok::RParen) => Ok(vec![]),
            Some(Tok::Void) => {
                self.bump()?;
                Ok(vec![])
            }
            _ => {
                let mut params = vec![];
                loop {
                    self.expect(Tok::Int)?;
                    let name = self.take_ident()?;
                    self.declare(&name)?;
                    params.push(name);
                    if !self.eat(&Tok::Comma)? {
                        break;
                    }
                }
                Ok(params)
            }
        }
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, VsmError> {
        let mut stmts = vec![];
        while self.cur.is_some() && self.cur_kind() != Some(&Tok::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, VsmError> {
        match self.cur_kind() {
            Some(Tok::Int) => {
                self.bump()?;
                let name = self.take_ident()?;
                let slot = self.declare(&name)?;
                let init = if self.eat(&Tok::Assign)? {
                    self.parse_expr()?
                } else {
                    Expr::IntLit(0)
                };
                self.expect(Tok::Semi)?;
                Ok(Stmt::VarDecl { name, slot, init })
            }
            Some(Tok::LBrace) => {
                self.bump()?;
                let stmts = self.parse_block_body()?;
                self.expect(Tok::RBrace)?;
                Ok(Stmt::Block(stmts))
            }
            Some(Tok::If) => {
                self.bump()?;
                self.expect(Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.eat(&Tok::Else)? {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If { cond, then_branch, else_branch })
            }
            Some(Tok::While) => {
                self.bump()?;
                self.expect(Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Some(Tok::Return) => {
                self.bump()?;
                if self.eat(&Tok::Semi)? {
                    Ok(Stmt::Return(None))
                } else {
                    let e = self.parse_expr()?;
                    self.expect(Tok::Semi)?;
                    Ok(Stmt::Return(Some(e)))
                }
            }
            Some(Tok::Semi) => {
                self.bump()?;
                Ok(Stmt::Block(vec![]))
            }
            _ => {
                let e = self.parse_expr()?;
                self.expect(Tok::Semi)?;
                Ok(Stmt::Expr(e))
            }
        }
    }

    // assignment is loosest and right-associative; the target must be a variable
    fn parse_expr(&mut self) -> Result<Expr, VsmError> {
        let lhs = self.parse_comparison()?;
        if self.cur_kind() == Some(&Tok::Assign) {
            let Expr::Var(slot) = lhs else {
                return Err(VsmError::parse("assignment target must be a variable"));
            };
            self.bump()?;
            let rhs = self.parse_expr()?;
            return Ok(Expr::Assign { slot, rhs: Box::new(rhs) });
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, VsmError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.cur_kind() {
                Some(Tok::Eq) => BinOp::Eq,
                Some(Tok::Neq) => BinOp::Neq,
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Lte) => BinOp::Lte,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Gte) => BinOp::Gte,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, VsmError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.cur_kind() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, VsmError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.cur_kind() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Mod,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, VsmError> {
        match self.cur_kind() {
            Some(Tok::IntLit(n)) => {
                let v = *n;
                self.bump()?;
                Ok(Expr::IntLit(v))
            }
            Some(Tok::FloatLit(x)) => {
                let v = *x;
                self.bump()?;
                Ok(Expr::FloatLit(v))
            }
            Some(Tok::Str(s)) => {
                let v = s.clone();
                self.bump()?;
                Ok(Expr::StrLit(v))
            }
            Some(Tok::LParen) => {
                self.bump()?;
                let e = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(e)
            }
            Some(Tok::Ident(_)) => {
                let name = self.take_ident()?;
                if self.cur_kind() == Some(&Tok::LParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Var(self.lookup(&name)?))
                }
            }
            other => Err(VsmError::parse(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_call(&mut self, callee: String) -> Result<Expr, VsmError> {
        self.expect(Tok::LParen)?;
        let mut args = vec![];
        if self.cur_kind() != Some(&Tok::RParen) {
            args.push(self.parse_expr()?);
            while self.eat(&Tok::Comma)? {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Tok::RParen)?;

        // print and read are primitives, not user functions
        if callee == "print" && args.len() > 1 {
            return Err(VsmError::parse("print takes at most one argument"));
        }
        if callee == "read" && !args.is_empty() {
            return Err(VsmError::parse("read takes no arguments"));
        }

        Ok(Expr::Call { callee, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse_program().expect("parse")
    }

    #[test]
    fn params_take_the_first_slots() {
        let p = parse("int add(int x, int y) { int z = 1; return z; }");
        assert_eq!(p.fns.len(), 1);
        let f = &p.fns[0];
        assert_eq!(f.params, vec!["x".to_string(), "y".to_string()]);
        match &f.body[0] {
            Stmt::VarDecl { slot, .. } => assert_eq!(*slot, 2),
            other => panic!("expected declaration, got {other:?}"),
        }
        match &f.body[1] {
            Stmt::Return(Some(Expr::Var(slot))) => assert_eq!(*slot, 2),
            other => panic!("expected return, got {other:?}"),
        }
    }

    #[test]
    fn declaration_without_initializer_defaults_to_zero() {
        let p = parse("int main() { int a; return a; }");
        match &p.fns[0].body[0] {
            Stmt::VarDecl { init: Expr::IntLit(0), .. } => {}
            other => panic!("expected zero initializer, got {other:?}"),
        }
    }

    #[test]
    fn block_declarations_take_fresh_slots() {
        let p = parse("int main() { int a = 1; { int b = 2; } int c = 3; return c; }");
        let slots: Vec<usize> = p.fns[0]
            .body
            .iter()
            .filter_map(|s| match s {
                Stmt::VarDecl { slot, .. } => Some(*slot),
                Stmt::Block(inner) => match &inner[0] {
                    Stmt::VarDecl { slot, .. } => Some(*slot),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn undeclared_variable_is_fatal() {
        let err = Parser::new("int main() { return x; }")
            .parse_program()
            .unwrap_err();
        assert!(err.to_string().contains("undeclared variable 'x'"));
    }

    #[test]
    fn duplicate_declaration_is_fatal() {
        let err = Parser::new("int main() { int a; int a; return 0; }")
            .parse_program()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate declaration of 'a'"));
    }

    #[test]
    fn assignment_target_must_be_a_variable() {
        let err = Parser::new("int main() { 1 = 2; }")
            .parse_program()
            .unwrap_err();
        assert!(err.to_string().contains("assignment target"));
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let p = parse("int main() { return 1 + 2 * 3; }");
        match &p.fns[0].body[0] {
            Stmt::Return(Some(Expr::Binary { op: BinOp::Add, rhs, .. })) => {
                assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn comparison_is_loosest() {
        let p = parse("int main() { return 1 + 2 < 3 * 4; }");
        match &p.fns[0].body[0] {
            Stmt::Return(Some(Expr::Binary { op: BinOp::Lt, .. })) => {}
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn void_parameter_list_is_empty() {
        let p = parse("int main(void) { return 0; }");
        assert!(p.fns[0].params.is_empty());
    }

    #[test]
    fn print_arity_is_checked() {
        assert!(Parser::new(r#"int main() { print(1, 2); }"#)
            .parse_program()
            .is_err());
        assert!(Parser::new(r#"int main() { read(1); }"#)
            .parse_program()
            .is_err());
    }
}
