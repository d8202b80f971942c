
use crate::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    // keywords
    Int,
    Void,
    If,
    Else,
    While,
    Return,

    // identifiers / literals
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    Str(String),

    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Assign,

    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: Tok,
    pub span: Span,
}
