
use crate::error::VsmError;
use crate::span::Span;
use crate::token::{Tok, Token};

pub struct Lexer<'a> {
    src: &'a str,
    i: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, i: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.i..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += c.len_utf8();
        Some(c)
    }

    // Skips whitespace and both comment forms; comments never reach the parser.
    fn skip_ws(&mut self) -> Result<(), VsmError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let rest = &self.src[self.i..];
                    if rest.starts_with("//") {
                        while let Some(c2) = self.bump() {
                            if c2 == '\n' {
                                break;
                            }
                        }
                    } else if rest.starts_with("/*") {
                        self.bump();
                        self.bump();
                        loop {
                            match self.bump() {
                                Some('*') if self.peek() == Some('/') => {
                                    self.bump();
                                    break;
                                }
                                Some(_) => {}
                                None => {
                                    return Err(VsmError::parse("unterminated block comment"));
                                }
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_ident_or_kw(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.i;
        let s = &self.src[start..end];
        let kind = match s {
            "int" => Tok::Int,
            "void" => Tok::Void,
            "if" => Tok::If,
            "else" => Tok::Else,
            "while" => Tok::While,
            "return" => Tok::Return,
            _ => Tok::Ident(s.to_string()),
        };
        Token { kind, span: Span::new(start, end) }
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, VsmError> {
        let mut saw_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !saw_dot {
                saw_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        let end = self.i;
        let s = &self.src[start..end];
        let kind = if saw_dot {
            let x: f64 = s
                .parse()
                .map_err(|_| VsmError::parse(format!("invalid number: {s}")))?;
            Tok::FloatLit(x)
        } else {
            let n: i64 = s
                .parse()
                .map_err(|_| VsmError::parse(format!("invalid number: {s}")))?;
            Tok::IntLit(n)
        };
        Ok(Token { kind, span: Span::new(start, end) })
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, VsmError> {
        // opening " already consumed
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' => {
                    let end = self.i;
                    return Ok(Token { kind: Tok::Str(out), span: Span::new(start, end) });
                }
                '\\' => {
                    let esc = self.bump().ok_or_else(|| VsmError::parse("unterminated string"))?;
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
        Err(VsmError::parse("unterminated string"))
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, VsmError> {
        self.skip_ws()?;
        let start = self.i;
        let c = match self.bump() {
            None => return Ok(None),
            Some(c) => c,
        };

        let tok = match c {
            '(' => Token { kind: Tok::LParen, span: Span::new(start, self.i) },
            ')' => Token { kind: Tok::RParen, span: Span::new(start, self.i) },
            '{' => Token { kind: Tok::LBrace, span: Span::new(start, self.i) },
            '}' => Token { kind: Tok::RBrace, span: Span::new(start, self.i) },
            ',' => Token { kind: Tok::Comma, span: Span::new(start, self.i) },
            ';' => Token { kind: Tok::Semi, span: Span::new(start, self.i) },
            '+' => Token { kind: Tok::Plus, span: Span::new(start, self.i) },
            '-' => Token { kind: Tok::Minus, span: Span::new(start, self.i) },
            '*' => Token { kind: Tok::Star, span: Span::new(start, self.i) },
            '/' => Token { kind: Tok::Slash, span: Span::new(start, self.i) },
            '%' => Token { kind: Tok::Percent, span: Span::new(start, self.i) },
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: Tok::Eq, span: Span::new(start, self.i) }
                } else {
                    Token { kind: Tok::Assign, span: Span::new(start, self.i) }
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: Tok::Neq, span: Span::new(start, self.i) }
                } else {
                    return Err(VsmError::parse("unexpected char: '!'"));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: Tok::Lte, span: Span::new(start, self.i) }
                } else {
                    Token { kind: Tok::Lt, span: Span::new(start, self.i) }
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: Tok::Gte, span: Span::new(start, self.i) }
                } else {
                    Token { kind: Tok::Gt, span: Span::new(start, self.i) }
                }
            }
            '"' => return Ok(Some(self.lex_string(start)?)),
            c if c.is_ascii_digit() => return Ok(Some(self.lex_number(start)?)),
            c if c.is_alphabetic() || c == '_' => return Ok(Some(self.lex_ident_or_kw(start))),
            other => return Err(VsmError::parse(format!("unexpected char: {other:?}"))),
        };

        Ok(Some(tok))
    }
}
