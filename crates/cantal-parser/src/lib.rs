mod cursor;
mod lexer;
mod parser;
mod token;

pub use lexer::tokenize;
pub use parser::parse_script;
pub use token::{Token, TokenKind};
