use std::fmt;

use cantal_core::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    String(String),
    Ident(String),

    // Keywords
    Const,
    Var,
    Saved,
    State,
    Event,
    If,
    Else,
    True,
    False,

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semicolon, // ;
    Question,  // ?
    Colon,     // :

    // Operators
    Assign,   // =
    EqEq,     // ==
    BangEq,   // !=
    Bang,     // !
    AmpAmp,   // &&
    PipePipe, // ||
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=

    Eof,
}

impl TokenKind {
    pub(crate) fn keyword(text: &str) -> Option<Self> {
        match text {
            "const" => Some(Self::Const),
            "var" => Some(Self::Var),
            "saved" => Some(Self::Saved),
            "state" => Some(Self::State),
            "event" => Some(Self::Event),
            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Int(value) => return write!(f, "integer {}", value),
            Self::String(value) => return write!(f, "string \"{}\"", value),
            Self::Ident(name) => return write!(f, "identifier \"{}\"", name),
            Self::Const => "\"const\"",
            Self::Var => "\"var\"",
            Self::Saved => "\"saved\"",
            Self::State => "\"state\"",
            Self::Event => "\"event\"",
            Self::If => "\"if\"",
            Self::Else => "\"else\"",
            Self::True => "\"true\"",
            Self::False => "\"false\"",
            Self::LParen => "\"(\"",
            Self::RParen => "\")\"",
            Self::LBrace => "\"{\"",
            Self::RBrace => "\"}\"",
            Self::LBracket => "\"[\"",
            Self::RBracket => "\"]\"",
            Self::Comma => "\",\"",
            Self::Semicolon => "\";\"",
            Self::Question => "\"?\"",
            Self::Colon => "\":\"",
            Self::Assign => "\"=\"",
            Self::EqEq => "\"==\"",
            Self::BangEq => "\"!=\"",
            Self::Bang => "\"!\"",
            Self::AmpAmp => "\"&&\"",
            Self::PipePipe => "\"||\"",
            Self::Plus => "\"+\"",
            Self::Minus => "\"-\"",
            Self::Star => "\"*\"",
            Self::Slash => "\"/\"",
            Self::Lt => "\"<\"",
            Self::LtEq => "\"<=\"",
            Self::Gt => "\">\"",
            Self::GtEq => "\">=\"",
            Self::Eof => "end of file",
        };
        f.write_str(text)
    }
}
