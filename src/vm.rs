
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use crate::error::VsmError;
use crate::value::Value;

pub const STACK_CAPACITY: usize = 4096;

#[derive(Clone, Debug, PartialEq)]
pub struct LabelRef {
    pub name: String,
    pub target: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    Bp,
    Top,
    Literal(Value),
    Str(String),
    Word(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Push(Operand),
    Pop(Operand),
    Dup,
    Load(Operand),
    Store(Operand),
    Save(Operand),
    Jump(LabelRef),
    Brz(LabelRef),
    Brt(LabelRef),
    Call(LabelRef),
    Ret,
    Retv,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Print(Option<String>),
    Read,
    End(Operand),
    Label(String),
    Unknown(String),
}

// One linear stack holds operands, saved frames, and local slots; bp marks
// the current activation and top is always the stack length. Runtime faults
// are reported on stderr and execution continues with the next instruction.
pub struct Vm<R: BufRead, W: Write> {
    instructions: Vec<Instr>,
    labels: HashMap<String, usize>,
    stack: Vec<Value>,
    bp: usize,
    pc: usize,
    // last value pushed or popped; feeds bare `end` and top-level `ret`
    gpr: Value,
    input: R,
    output: W,
}

impl Vm<BufReader<Stdin>, Stdout> {
    pub fn new() -> Self {
        Self::with_io(BufReader::new(io::stdin()), io::stdout())
    }
}

impl Default for Vm<BufReader<Stdin>, Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> Vm<R, W> {
    pub fn with_io(input: R, output: W) -> Self {
        Self {
            instructions: Vec::new(),
            labels: HashMap::new(),
            stack: Vec::new(),
            bp: 0,
            pc: 0,
            gpr: Value::Int(0),
            input,
            output,
        }
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    // Decodes assembly lines into the instruction table and binds labels.
    // Label lines keep their instruction slot so indices in both tables stay
    // aligned with the emitted output; branch targets are resolved once here
    // rather than per step.
    pub fn load<S: BufRead>(&mut self, source: S) -> Result<(), VsmError> {
        self.instructions.clear();
        self.labels.clear();

        for line in source.lines() {
            let line = line?;
            let Some((mnemonic, arg)) = split_line(&line) else {
                continue;
            };
            let index = self.instructions.len();
            let instr = match mnemonic {
                "push" => Instr::Push(operand(arg)),
                "pop" => Instr::Pop(operand(arg)),
                "dup" => Instr::Dup,
                "load" => Instr::Load(operand(arg)),
                "store" => Instr::Store(operand(arg)),
                "save" => Instr::Save(operand(arg)),
                "jump" => Instr::Jump(label_ref(arg)),
                "brz" => Instr::Brz(label_ref(arg)),
                "brt" => Instr::Brt(label_ref(arg)),
                "call" => Instr::Call(label_ref(arg)),
                "ret" => Instr::Ret,
                "retv" => Instr::Retv,
                "neg" => Instr::Neg,
                "add" => Instr::Add,
                "sub" => Instr::Sub,
                "mul" => Instr::Mul,
                "div" => Instr::Div,
                "mod" => Instr::Mod,
                "eq" => Instr::Eq,
                "neq" => Instr::Neq,
                "lt" => Instr::Lt,
                "lte" => Instr::Lte,
                "gt" => Instr::Gt,
                "gte" => Instr::Gte,
                "print" => Instr::Print(print_arg(arg)),
                "read" => Instr::Read,
                "end" => Instr::End(operand(arg)),
                m if m.ends_with(':') => {
                    self.labels.insert(m.to_string(), index);
                    Instr::Label(m.to_string())
                }
                m => Instr::Unknown(m.to_string()),
            };
            self.instructions.push(instr);
        }

        for instr in &mut self.instructions {
            if let Instr::Jump(l) | Instr::Brz(l) | Instr::Brt(l) | Instr::Call(l) = instr {
                l.target = self.labels.get(&l.name).copied();
            }
        }
        Ok(())
    }

    // Runs from instruction 0 until `end` or a top-level return, and hands
    // the exit code back to the caller.
    pub fn run(&mut self) -> i32 {
        self.pc = 0;
        loop {
            if self.pc >= self.instructions.len() {
                return self.finish(Value::Int(0));
            }
            let instr = self.instructions[self.pc].clone();
            self.pc += 1;

            match instr {
                Instr::Push(op) => self.exec_push(op),
                Instr::Pop(op) => self.exec_pop(op),
                Instr::Dup => self.exec_dup(),
                Instr::Load(op) => self.exec_load(op),
                Instr::Store(op) => self.exec_store("store", op),
                Instr::Save(op) => self.exec_store("save", op),

                Instr::Jump(l) => self.jump_to("jump", &l),
                Instr::Brz(l) => {
                    if let Some(v) = self.pop("brz") {
                        if v.as_int_lossy("brz test") == 0 {
                            self.jump_to("brz", &l);
                        }
                    }
                }
                Instr::Brt(l) => {
                    if let Some(v) = self.pop("brt") {
                        if v.as_int_lossy("brt test") == 1 {
                            self.jump_to("brt", &l);
                        }
                    }
                }
                Instr::Call(l) => self.exec_call(&l),
                Instr::Ret => {
                    if self.bp == 0 {
                        let code = self.gpr;
                        return self.finish(code);
                    }
                    self.unwind("ret");
                }
                Instr::Retv => {
                    let Some(v) = self.pop("retv") else { continue };
                    if self.bp == 0 {
                        self.push(v);
                        return self.finish(v);
                    }
                    self.unwind("retv");
                    self.push(v);
                }

                Instr::Neg => match self.stack.last_mut() {
                    Some(Value::Int(n)) => *n = n.wrapping_neg(),
                    Some(Value::Float(x)) => *x = -*x,
                    None => eprintln!("error: stack underflow in neg"),
                },
                Instr::Add => self.arith("add", i64::wrapping_add, |x, y| x + y),
                Instr::Sub => self.arith("sub", i64::wrapping_sub, |x, y| x - y),
                Instr::Mul => self.arith("mul", i64::wrapping_mul, |x, y| x * y),
                Instr::Div => self.exec_div(),
                Instr::Mod => self.exec_mod(),

                Instr::Eq => self.compare("eq", Ordering::is_eq),
                Instr::Neq => self.compare("neq", |o| !o.is_eq()),
                Instr::Lt => self.compare("lt", Ordering::is_lt),
                Instr::Lte => self.compare("lte", Ordering::is_le),
                Instr::Gt => self.compare("gt", Ordering::is_gt),
                Instr::Gte => self.compare("gte", Ordering::is_ge),

                Instr::Print(arg) => self.exec_print(arg),
                Instr::Read => self.exec_read(),
                Instr::End(op) => {
                    let code = match op {
                        Operand::None => self.gpr,
                        Operand::Bp => Value::Int(self.bp as i64),
                        Operand::Top => Value::Int(self.stack.len() as i64),
                        Operand::Literal(v) => v,
                        Operand::Str(s) | Operand::Word(s) => {
                            eprintln!("error: invalid end argument '{s}'");
                            self.gpr
                        }
                    };
                    return self.finish(code);
                }

                Instr::Label(_) => {}
                Instr::Unknown(name) => eprintln!("error: unknown mnemonic '{name}'"),
            }
        }
    }

    fn finish(&mut self, code: Value) -> i32 {
        let _ = self.output.flush();
        code.as_int_lossy("exit code") as i32
    }

    fn push(&mut self, v: Value) {
        if self.stack.len() >= STACK_CAPACITY {
            eprintln!("error: stack overflow");
            return;
        }
        self.stack.push(v);
        self.gpr = v;
    }

    fn pop(&mut self, ctx: &str) -> Option<Value> {
        match self.stack.pop() {
            Some(v) => {
                self.gpr = v;
                Some(v)
            }
            None => {
                eprintln!("error: stack underflow in {ctx}");
                None
            }
        }
    }

    // pop top / pop bp route the value into a register, not gpr
    fn pop_untracked(&mut self, ctx: &str) -> Option<Value> {
        let v = self.stack.pop();
        if v.is_none() {
            eprintln!("error: stack underflow in {ctx}");
        }
        v
    }

    fn jump_to(&mut self, mnemonic: &str, l: &LabelRef) {
        if l.name.is_empty() {
            eprintln!("error: {mnemonic} requires a label argument");
            return;
        }
        match l.target {
            Some(t) => self.pc = t,
            None => eprintln!("error: {mnemonic}: label '{}' not found", l.name),
        }
    }

    fn exec_push(&mut self, op: Operand) {
        match op {
            Operand::Literal(v) => self.push(v),
            Operand::Bp => match self.stack.get(self.bp) {
                Some(&v) => self.push(v),
                None => eprintln!("error: push bp: base pointer {} out of range", self.bp),
            },
            Operand::Top => match self.stack.last() {
                Some(&v) => self.push(v),
                None => eprintln!("error: stack underflow in push top"),
            },
            Operand::None => eprintln!("error: push requires an argument"),
            Operand::Str(s) | Operand::Word(s) => {
                eprintln!("error: invalid push argument '{s}'");
            }
        }
    }

    fn exec_pop(&mut self, op: Operand) {
        match op {
            Operand::None => {
                let _ = self.pop("pop");
            }
            Operand::Top => {
                let Some(v) = self.pop_untracked("pop top") else { return };
                let n = v.as_int_lossy("stack top");
                if n < 0 {
                    eprintln!("error: pop top: negative stack size {n}");
                } else if n as usize > self.stack.len() {
                    eprintln!("error: pop top: {n} exceeds stack size {}", self.stack.len());
                } else {
                    self.stack.truncate(n as usize);
                }
            }
            Operand::Bp => {
                let Some(v) = self.pop_untracked("pop bp") else { return };
                let n = v.as_int_lossy("base pointer");
                if n < 0 {
                    eprintln!("error: pop bp: negative base pointer {n}");
                } else {
                    self.bp = n as usize;
                }
            }
            Operand::Literal(_) | Operand::Str(_) | Operand::Word(_) => {
                eprintln!("error: invalid pop argument");
            }
        }
    }

    fn exec_dup(&mut self) {
        match self.stack.last() {
            Some(&v) => self.push(v),
            None => eprintln!("error: stack underflow in dup"),
        }
    }

    fn exec_load(&mut self, op: Operand) {
        let from_bp = match op {
            Operand::Bp => true,
            Operand::Top => false,
            _ => {
                eprintln!("error: load requires bp or top");
                return;
            }
        };
        let Some(k) = self.pop("load") else { return };
        let base = if from_bp {
            self.bp as i64
        } else {
            self.stack.len() as i64 - 1
        };
        let addr = base + k.as_int_lossy("load address");
        if addr < 0 || addr as usize >= self.stack.len() {
            eprintln!("error: load: address {addr} out of range (top = {})", self.stack.len());
            return;
        }
        let v = self.stack[addr as usize];
        self.push(v);
    }

    // Pops the offset only; the stored value stays on the stack. Assignment
    // expressions depend on the leftover, and a declaration's leftover is
    // the slot itself, so stores past the current top grow the stack.
    fn exec_store(&mut self, ctx: &str, op: Operand) {
        let from_bp = match op {
            Operand::Bp => true,
            Operand::Top => false,
            _ => {
                eprintln!("error: {ctx} requires bp or top");
                return;
            }
        };
        let Some(k) = self.pop(ctx) else { return };
        let Some(&val) = self.stack.last() else {
            eprintln!("error: stack underflow in {ctx}");
            return;
        };
        let base = if from_bp {
            self.bp as i64
        } else {
            self.stack.len() as i64 - 1
        };
        let addr = base + k.as_int_lossy("store address");
        if addr < 0 {
            eprintln!("error: stack underflow in {ctx}");
            return;
        }
        let addr = addr as usize;
        if addr >= STACK_CAPACITY {
            eprintln!("error: stack overflow in {ctx}");
            return;
        }
        if addr >= self.stack.len() {
            self.stack.resize(addr + 1, Value::Int(0));
        }
        self.stack[addr] = val;
        self.gpr = val;
    }

    // The saved frame cells go beneath the arguments: parameters stay
    // addressable as slots 0..argc-1 from bp, and locals continue above
    // the arguments at slot argc.
    fn exec_call(&mut self, l: &LabelRef) {
        let Some(v) = self.pop("call") else { return };
        let argc = v.as_int_lossy("call argument count");
        if argc < 0 || argc as usize > self.stack.len() {
            eprintln!(
                "error: call: argument count {argc} exceeds stack size {}",
                self.stack.len()
            );
            return;
        }
        if self.stack.len() + 2 > STACK_CAPACITY {
            eprintln!("error: stack overflow in call");
            return;
        }
        let at = self.stack.len() - argc as usize;
        self.stack.insert(at, Value::Int(self.bp as i64));
        self.stack.insert(at + 1, Value::Int(self.pc as i64));
        self.bp = at + 2;
        self.jump_to("call", l);
    }

    // Restores pc and bp from the cells below the frame and drops everything
    // the call and the callee pushed, so top returns to its pre-call value
    // minus the argument count.
    fn unwind(&mut self, ctx: &str) {
        if self.bp < 2 || self.bp > self.stack.len() {
            eprintln!("error: {ctx}: corrupt frame (bp = {})", self.bp);
            return;
        }
        let ret_pc = self.stack[self.bp - 1].as_int_lossy("return address");
        let saved_bp = self.stack[self.bp - 2].as_int_lossy("saved base pointer");
        if ret_pc < 0 || saved_bp < 0 {
            eprintln!("error: {ctx}: corrupt frame");
            return;
        }
        self.stack.truncate(self.bp - 2);
        self.pc = ret_pc as usize;
        self.bp = saved_bp as usize;
    }

    fn binop(&mut self, ctx: &str) -> Option<(Value, Value)> {
        let b = self.pop(ctx)?;
        let a = self.pop(ctx)?;
        Some((a, b))
    }

    fn arith(&mut self, ctx: &str, fi: fn(i64, i64) -> i64, ff: fn(f64, f64) -> f64) {
        let Some((a, b)) = self.binop(ctx) else { return };
        let v = match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(fi(x, y)),
            (x, y) => Value::Float(ff(x.as_f64(), y.as_f64())),
        };
        self.push(v);
    }

    fn exec_div(&mut self) {
        let Some((a, b)) = self.binop("div") else { return };
        let v = match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y == 0 {
                    eprintln!("error: division by zero in div");
                    Value::Int(0)
                } else {
                    Value::Int(x.wrapping_div(y))
                }
            }
            (x, y) => Value::Float(x.as_f64() / y.as_f64()),
        };
        self.push(v);
    }

    fn exec_mod(&mut self) {
        let Some((a, b)) = self.binop("mod") else { return };
        let v = match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y == 0 {
                    eprintln!("error: division by zero in mod");
                    Value::Int(0)
                } else {
                    Value::Int(x.wrapping_rem(y))
                }
            }
            _ => {
                eprintln!("error: cannot perform mod on a float");
                Value::Int(0)
            }
        };
        self.push(v);
    }

    fn compare(&mut self, ctx: &str, holds: fn(Ordering) -> bool) {
        let Some((a, b)) = self.binop(ctx) else { return };
        let res = match (a, b) {
            (Value::Int(x), Value::Int(y)) => holds(x.cmp(&y)),
            (x, y) => match x.as_f64().partial_cmp(&y.as_f64()) {
                Some(o) => holds(o),
                None => false,
            },
        };
        self.push(Value::Int(res as i64));
    }

    fn exec_print(&mut self, arg: Option<String>) {
        match arg {
            None => {
                let Some(v) = self.pop("print") else { return };
                let _ = writeln!(self.output, "{v}");
            }
            Some(s) => {
                let _ = writeln!(self.output, "{}", expand_escapes(&s));
            }
        }
    }

    fn exec_read(&mut self) {
        let Some(tok) = self.read_token() else {
            eprintln!("error: read: end of input");
            return;
        };
        match Value::from_literal(&tok) {
            Some(v) => self.push(v),
            None => eprintln!("error: read: invalid input '{tok}'"),
        }
    }

    fn read_token(&mut self) -> Option<String> {
        let mut tok = Vec::new();
        loop {
            let buf = match self.input.fill_buf() {
                Ok(b) => b,
                Err(_) => return None,
            };
            if buf.is_empty() {
                break;
            }
            let mut used = 0;
            let mut done = false;
            for &b in buf {
                if b.is_ascii_whitespace() {
                    used += 1;
                    if !tok.is_empty() {
                        done = true;
                        break;
                    }
                } else {
                    tok.push(b);
                    used += 1;
                }
            }
            self.input.consume(used);
            if done {
                break;
            }
        }
        if tok.is_empty() {
            None
        } else {
            String::from_utf8(tok).ok()
        }
    }
}

enum RawArg {
    Word(String),
    Quoted(String),
}

// A `;` outside quotes starts a comment; quoted arguments may contain
// whitespace and end at the next `"`.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_line(line: &str) -> Option<(&str, Option<RawArg>)> {
    let code = strip_comment(line).trim();
    if code.is_empty() {
        return None;
    }
    let (mnemonic, rest) = match code.find(char::is_whitespace) {
        Some(i) => (&code[..i], code[i..].trim_start()),
        None => (code, ""),
    };
    let arg = if rest.is_empty() {
        None
    } else if let Some(stripped) = rest.strip_prefix('"') {
        let content = match stripped.find('"') {
            Some(j) => &stripped[..j],
            None => stripped,
        };
        Some(RawArg::Quoted(content.to_string()))
    } else {
        Some(RawArg::Word(
            rest.split_whitespace().next().unwrap().to_string(),
        ))
    };
    Some((mnemonic, arg))
}

fn operand(arg: Option<RawArg>) -> Operand {
    match arg {
        None => Operand::None,
        Some(RawArg::Quoted(s)) => Operand::Str(s),
        Some(RawArg::Word(w)) => {
            if w == "bp" {
                Operand::Bp
            } else if w == "top" {
                Operand::Top
            } else if let Some(v) = Value::from_literal(&w) {
                Operand::Literal(v)
            } else {
                Operand::Word(w)
            }
        }
    }
}

fn label_ref(arg: Option<RawArg>) -> LabelRef {
    let name = match arg {
        Some(RawArg::Word(w)) => w,
        Some(RawArg::Quoted(s)) => s,
        None => String::new(),
    };
    LabelRef { name, target: None }
}

fn print_arg(arg: Option<RawArg>) -> Option<String> {
    match arg {
        Some(RawArg::Word(w)) => Some(w),
        Some(RawArg::Quoted(s)) => Some(s),
        None => None,
    }
}

// C-style \n and \t only; any other backslash passes through unchanged.
fn expand_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(asm: &str) -> Vm<&'static [u8], Vec<u8>> {
        let mut vm = Vm::with_io(&b""[..], Vec::new());
        vm.load(asm.as_bytes()).expect("load");
        vm
    }

    fn run(asm: &str) -> i32 {
        load(asm).run()
    }

    fn run_io(asm: &str, input: &str) -> (i32, String) {
        let mut out = Vec::new();
        let code = {
            let mut vm = Vm::with_io(input.as_bytes(), &mut out);
            vm.load(asm.as_bytes()).expect("load");
            vm.run()
        };
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn label_lines_keep_their_instruction_slot() {
        let vm = load("jump _main:\n_main:\npush 1\nend 0");
        assert_eq!(vm.labels().get("_main:"), Some(&1));
        assert_eq!(vm.instructions()[1], Instr::Label("_main:".to_string()));
        assert_eq!(vm.instructions().len(), 4);
    }

    #[test]
    fn comments_and_blank_lines_take_no_slot() {
        let vm = load("; full line comment\n\npush 1 ; trailing\nend 0");
        assert_eq!(
            vm.instructions(),
            vec![
                Instr::Push(Operand::Literal(Value::Int(1))),
                Instr::End(Operand::Literal(Value::Int(0))),
            ]
        );
    }

    #[test]
    fn semicolon_inside_quotes_is_not_a_comment() {
        let vm = load("print \"a;b\"\nend 0");
        assert_eq!(
            vm.instructions()[0],
            Instr::Print(Some("a;b".to_string()))
        );
    }

    #[test]
    fn reloading_yields_identical_tables() {
        let asm = "jump _main:\n_main:\npush 2\npush 3\nadd\nretv\n";
        let a = load(asm);
        let b = load(asm);
        assert_eq!(a.instructions(), b.instructions());
        assert_eq!(a.labels(), b.labels());
    }

    #[test]
    fn branch_targets_resolve_at_load_time() {
        let vm = load("jump done:\npush 1\ndone:\nend 0");
        match &vm.instructions()[0] {
            Instr::Jump(l) => assert_eq!(l.target, Some(2)),
            other => panic!("expected jump, got {other:?}"),
        }
    }

    #[test]
    fn push_literal_tags_follow_the_dot() {
        let vm = load("push 3\npush 2.5");
        assert_eq!(
            vm.instructions(),
            vec![
                Instr::Push(Operand::Literal(Value::Int(3))),
                Instr::Push(Operand::Literal(Value::Float(2.5))),
            ]
        );
    }

    #[test]
    fn arithmetic_int_int_stays_int() {
        assert_eq!(run("push 2\npush 3\nadd\nretv"), 5);
        assert_eq!(run("push 7\npush 2\ndiv\nretv"), 3);
        assert_eq!(run("push 17\npush 5\nmod\nretv"), 2);
    }

    #[test]
    fn arithmetic_widens_to_float() {
        // 2 + 1.5 = 3.5, truncated to 3 for the exit code
        assert_eq!(run("push 2\npush 1.5\nadd\nretv"), 3);
    }

    #[test]
    fn mod_on_float_recovers_with_zero() {
        assert_eq!(run("push 17.0\npush 5\nmod\nretv"), 0);
    }

    #[test]
    fn division_by_zero_recovers_with_zero() {
        assert_eq!(run("push 1\npush 0\ndiv\nretv"), 0);
        assert_eq!(run("push 1\npush 0\nmod\nretv"), 0);
    }

    #[test]
    fn comparisons_produce_zero_or_one() {
        assert_eq!(run("push 2\npush 3\nlt\nretv"), 1);
        assert_eq!(run("push 2\npush 3\ngte\nretv"), 0);
        assert_eq!(run("push 3\npush 3\neq\nretv"), 1);
        assert_eq!(run("push 3\npush 3\nneq\nretv"), 0);
        assert_eq!(run("push 2\npush 2.0\neq\nretv"), 1);
    }

    #[test]
    fn neg_negates_in_place() {
        assert_eq!(run("push 5\nneg\nretv"), -5);
        assert_eq!(run("push 2.5\nneg\npush 2.5\nadd\nretv"), 0);
    }

    #[test]
    fn dup_duplicates_top() {
        assert_eq!(run("push 4\ndup\nadd\nretv"), 8);
    }

    #[test]
    fn store_bp_pops_offset_but_not_value() {
        assert_eq!(run("push 5\npush 0\nstore bp\nretv"), 5);
    }

    #[test]
    fn save_is_an_alias_for_store() {
        assert_eq!(run("push 5\npush 0\nsave bp\nretv"), 5);
    }

    #[test]
    fn store_past_top_grows_the_stack() {
        // write slot 2 with only one live value, then read it back
        assert_eq!(run("push 9\npush 2\nstore bp\npush 2\nload bp\nretv"), 9);
    }

    #[test]
    fn load_bp_reads_a_slot() {
        assert_eq!(run("push 10\npush 20\npush 0\nload bp\nretv"), 10);
    }

    #[test]
    fn load_top_is_relative_to_the_top() {
        // after popping the offset, -1 addresses the value below the top
        assert_eq!(run("push 10\npush 20\npush -1\nload top\nretv"), 10);
    }

    #[test]
    fn brz_jumps_on_zero() {
        assert_eq!(run("push 0\nbrz skip:\npush 1\nretv\nskip:\npush 2\nretv"), 2);
        assert_eq!(run("push 7\nbrz skip:\npush 1\nretv\nskip:\npush 2\nretv"), 1);
    }

    #[test]
    fn brt_jumps_on_one_exactly() {
        assert_eq!(run("push 1\nbrt skip:\npush 1\nretv\nskip:\npush 2\nretv"), 2);
        assert_eq!(run("push 2\nbrt skip:\npush 1\nretv\nskip:\npush 2\nretv"), 1);
    }

    #[test]
    fn call_frame_restores_and_truncates() {
        // two values below the argument must survive the call untouched:
        // pre-call top 3, one argument, so top comes back to 2 after ret
        let asm = "push 5\npush 1\npush 2\npush 1\ncall _f:\nend top\n_f:\npush 0\nload bp\nret";
        assert_eq!(run(asm), 2);
    }

    #[test]
    fn retv_leaves_one_extra_value() {
        let asm = "push 2\npush 40\npush 2\ncall _add:\nretv\n_add:\npush 0\nload bp\npush 1\nload bp\nadd\nretv";
        assert_eq!(run(asm), 42);
    }

    #[test]
    fn call_with_bad_arg_count_reports_and_continues() {
        assert_eq!(run("push 99\ncall _f:\npush 1\nretv\n_f:\nret"), 1);
    }

    #[test]
    fn missing_label_reports_and_continues() {
        assert_eq!(run("jump nowhere:\npush 4\nretv"), 4);
    }

    #[test]
    fn unknown_mnemonic_reports_and_continues() {
        assert_eq!(run("bogus\npush 3\nretv"), 3);
    }

    #[test]
    fn end_without_argument_uses_gpr() {
        // pop leaves the popped value in gpr
        assert_eq!(run("push 7\npop\nend"), 7);
        // a later push overwrites it
        assert_eq!(run("push 7\npop\npush 0\nend"), 0);
    }

    #[test]
    fn end_register_and_literal_arguments() {
        assert_eq!(run("push 1\npush 2\nend top"), 2);
        assert_eq!(run("push 1\nend bp"), 0);
        assert_eq!(run("push 1\nend 9"), 9);
    }

    #[test]
    fn pop_top_truncates_the_stack() {
        assert_eq!(run("push 1\npush 2\npush 3\npush 1\npop top\nend top"), 1);
    }

    #[test]
    fn pop_bp_sets_the_base_pointer() {
        assert_eq!(run("push 0\npush 3\npop bp\nend bp"), 3);
    }

    #[test]
    fn running_off_the_end_exits_zero() {
        assert_eq!(run("push 1\npop"), 0);
        assert_eq!(run("push 1"), 0);
    }

    #[test]
    fn print_pops_and_writes_a_line() {
        let (code, out) = run_io("push 7\nprint\npush 0\nend", "");
        assert_eq!(code, 0);
        assert_eq!(out, "7\n");
    }

    #[test]
    fn print_string_expands_escapes_and_leaves_stack_alone() {
        let (code, out) = run_io("push 3\nprint \"a\\tb\\nc\"\nretv", "");
        assert_eq!(code, 3);
        assert_eq!(out, "a\tb\nc\n");
    }

    #[test]
    fn print_float_formatting() {
        let (_, out) = run_io("push 2.5\nprint\npush 7.0\nprint\npush 0\nend", "");
        assert_eq!(out, "2.5\n7\n");
    }

    #[test]
    fn read_pushes_ints_and_floats() {
        let (code, _) = run_io("read\nretv", "42\n");
        assert_eq!(code, 42);
        let (_, out) = run_io("read\nprint\npush 0\nend", "  2.5 ");
        assert_eq!(out, "2.5\n");
    }

    #[test]
    fn read_consumes_one_token_at_a_time() {
        let (code, _) = run_io("read\nread\nadd\nretv", "40 2\n");
        assert_eq!(code, 42);
    }

    #[test]
    fn recursion_keeps_frames_separate() {
        // f(n) = n == 0 ? 0 : n + f(n - 1); f(4) = 10
        let asm = "\
push 4
push 1
call _f:
retv
_f:
push 0
load bp
brz base:
push 0
load bp
push 0
load bp
push 1
sub
push 1
call _f:
add
retv
base:
push 0
retv";
        assert_eq!(run(asm), 10);
    }
}
