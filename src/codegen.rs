
use std::collections::HashMap;
use std::io::Write;

use crate::ast::*;
use crate::error::VsmError;

// Lowers a program to stack-machine assembly, one instruction or label per
// line. Output is deterministic: the two label counters are program-global
// and start at zero, so the same tree always produces identical bytes.
pub struct Emitter<W: Write> {
    out: W,
    if_labels: u32,
    while_labels: u32,
    returns: HashMap<String, Type>,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            if_labels: 0,
            while_labels: 0,
            returns: HashMap::new(),
        }
    }

    pub fn emit_program(&mut self, prog: &Program) -> Result<(), VsmError> {
        self.returns = prog
            .fns
            .iter()
            .map(|f| (f.name.clone(), f.return_type))
            .collect();

        writeln!(self.out, "jump _main:")?;
        for f in &prog.fns {
            self.emit_function(f)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn emit_function(&mut self, f: &Function) -> Result<(), VsmError> {
        writeln!(self.out, "_{}:", f.name)?;
        for st in &f.body {
            self.emit_stmt(st)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, s: &Stmt) -> Result<(), VsmError> {
        match s {
            // A declaration stores like an assignment and deliberately leaves
            // its value on the stack: the leftover lands exactly at the slot
            // index and becomes the local's storage.
            Stmt::VarDecl { slot, init, .. } => {
                self.emit_expr(init)?;
                writeln!(self.out, "push {slot}")?;
                writeln!(self.out, "store bp")?;
            }
            Stmt::Expr(e) => {
                self.emit_expr(e)?;
                if !self.leaves_no_value(e) {
                    writeln!(self.out, "pop")?;
                }
            }
            Stmt::Block(stmts) => {
                for st in stmts {
                    self.emit_stmt(st)?;
                }
            }
            Stmt::If { cond, then_branch, else_branch } => {
                let i = self.if_labels;
                self.if_labels += 1;
                self.emit_expr(cond)?;
                writeln!(self.out, "brz else_{i}:")?;
                self.emit_stmt(then_branch)?;
                match else_branch {
                    Some(e) => {
                        writeln!(self.out, "jump endif_{i}:")?;
                        writeln!(self.out, "else_{i}:")?;
                        self.emit_stmt(e)?;
                        writeln!(self.out, "jump endif_{i}:")?;
                        writeln!(self.out, "endif_{i}:")?;
                    }
                    None => {
                        writeln!(self.out, "else_{i}:")?;
                    }
                }
            }
            Stmt::While { cond, body } => {
                let i = self.while_labels;
                self.while_labels += 1;
                writeln!(self.out, "jump while_start_{i}:")?;
                writeln!(self.out, "while_start_{i}:")?;
                self.emit_expr(cond)?;
                writeln!(self.out, "brz while_end_{i}:")?;
                self.emit_stmt(body)?;
                writeln!(self.out, "jump while_start_{i}:")?;
                writeln!(self.out, "while_end_{i}:")?;
            }
            Stmt::Return(Some(e)) => {
                self.emit_expr(e)?;
                writeln!(self.out, "retv")?;
            }
            Stmt::Return(None) => {
                writeln!(self.out, "ret")?;
            }
        }
        Ok(())
    }

    fn emit_expr(&mut self, e: &Expr) -> Result<(), VsmError> {
        match e {
            Expr::IntLit(n) => {
                writeln!(self.out, "push {n}")?;
            }
            Expr::FloatLit(x) => {
                writeln!(self.out, "push {}", float_literal(*x))?;
            }
            Expr::StrLit(_) => {
                return Err(VsmError::parse(
                    "string literal is only allowed as a print argument",
                ));
            }
            Expr::Var(slot) => {
                writeln!(self.out, "push {slot}")?;
                writeln!(self.out, "load bp")?;
            }
            Expr::Assign { slot, rhs } => {
                self.emit_expr(rhs)?;
                writeln!(self.out, "push {slot}")?;
                writeln!(self.out, "store bp")?;
            }
            Expr::Binary { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                writeln!(self.out, "{}", opcode(*op))?;
            }
            Expr::Call { callee, args } => self.emit_call(callee, args)?,
        }
        Ok(())
    }

    fn emit_call(&mut self, callee: &str, args: &[Expr]) -> Result<(), VsmError> {
        match callee {
            "print" => match args {
                [Expr::StrLit(s)] => {
                    writeln!(self.out, "print \"{}\"", escape_print(s))?;
                }
                [e] => {
                    self.emit_expr(e)?;
                    writeln!(self.out, "print")?;
                }
                [] => {
                    writeln!(self.out, "print")?;
                }
                _ => {
                    return Err(VsmError::parse("print takes at most one argument"));
                }
            },
            "read" => {
                writeln!(self.out, "read")?;
            }
            _ => {
                for a in args {
                    self.emit_expr(a)?;
                }
                // the VM's call pops the argument count first
                writeln!(self.out, "push {}", args.len())?;
                writeln!(self.out, "call _{callee}:")?;
            }
        }
        Ok(())
    }

    // A print or a call to a void function pushes nothing, so the statement
    // wrapper must not emit the discarding pop.
    fn leaves_no_value(&self, e: &Expr) -> bool {
        match e {
            Expr::Call { callee, .. } if callee == "print" => true,
            Expr::Call { callee, .. } => self.returns.get(callee) == Some(&Type::Void),
            _ => false,
        }
    }
}

fn opcode(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        BinOp::Eq => "eq",
        BinOp::Neq => "neq",
        BinOp::Lt => "lt",
        BinOp::Lte => "lte",
        BinOp::Gt => "gt",
        BinOp::Gte => "gte",
    }
}

// Float pushes must keep their dot, or the loader would read them as ints.
fn float_literal(x: f64) -> String {
    if x.fract() == 0.0 && x.is_finite() {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn escape_print(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
