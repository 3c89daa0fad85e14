use cantal_core::{CantalError, SourceLocation};

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// Splits CantalScript source into tokens, dropping whitespace and comments.
///
/// The returned stream always ends with a single [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, CantalError> {
    let mut lexer = Lexer {
        cursor: Cursor::new(source),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    fn skip_whitespace_and_comments(&mut self) -> Result<(), CantalError> {
        loop {
            self.cursor.eat_while(char::is_whitespace);

            if self.cursor.peek() == Some('/') && self.cursor.peek_next() == Some('/') {
                self.cursor.eat_while(|ch| ch != '\n');
                continue;
            }

            if self.cursor.peek() == Some('/') && self.cursor.peek_next() == Some('*') {
                let start = self.cursor.location();
                self.cursor.advance();
                self.cursor.advance();
                loop {
                    match self.cursor.advance() {
                        None => return Err(CantalError::parse("unterminated block comment", start)),
                        Some('*') if self.cursor.eat('/') => break,
                        Some(_) => {}
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    fn lex_string(&mut self, start: SourceLocation) -> Result<TokenKind, CantalError> {
        let mut value = String::new();
        loop {
            match self.cursor.advance() {
                None | Some('\n') => {
                    return Err(CantalError::parse("unterminated string literal", start))
                }
                Some('"') => return Ok(TokenKind::String(value)),
                Some('\\') => match self.cursor.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(ch) => {
                        value.push('\\');
                        value.push(ch);
                    }
                    None => return Err(CantalError::parse("unterminated string literal", start)),
                },
                Some(ch) => value.push(ch),
            }
        }
    }

    fn lex_number(&mut self, start_pos: usize, start: SourceLocation) -> Result<TokenKind, CantalError> {
        self.cursor.eat_while(|ch| ch.is_ascii_digit());
        let text = self.cursor.slice(start_pos, self.cursor.pos());
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| CantalError::parse(format!("integer literal \"{}\" is out of range", text), start))
    }

    fn lex_word(&mut self, start_pos: usize) -> TokenKind {
        self.cursor
            .eat_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let text = self.cursor.slice(start_pos, self.cursor.pos());
        TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }

    fn next_token(&mut self) -> Result<Token, CantalError> {
        self.skip_whitespace_and_comments()?;

        let start = self.cursor.location();
        let start_pos = self.cursor.pos();
        let Some(ch) = self.cursor.advance() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' if self.cursor.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Assign,
            '!' if self.cursor.eat('=') => TokenKind::BangEq,
            '!' => TokenKind::Bang,
            '<' if self.cursor.eat('=') => TokenKind::LtEq,
            '<' => TokenKind::Lt,
            '>' if self.cursor.eat('=') => TokenKind::GtEq,
            '>' => TokenKind::Gt,
            '&' if self.cursor.eat('&') => TokenKind::AmpAmp,
            '|' if self.cursor.eat('|') => TokenKind::PipePipe,
            '"' => self.lex_string(start)?,
            ch if ch.is_ascii_digit() => self.lex_number(start_pos, start)?,
            ch if ch.is_ascii_alphabetic() || ch == '_' => self.lex_word(start_pos),
            other => {
                return Err(CantalError::parse(
                    format!("unexpected character '{}'", other),
                    start,
                ))
            }
        };

        Ok(Token::new(kind, start))
    }
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("source should tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn comments_and_whitespace_are_insignificant() {
        let source = "// header\nconst /* inline\n comment */ X = 5; // trailing";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Const,
                TokenKind::Ident("X".to_string()),
                TokenKind::Assign,
                TokenKind::Int(5),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_character_operators_win_over_single_ones() {
        assert_eq!(
            kinds("a == b != !c <= >= < > && || ="),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::EqEq,
                TokenKind::Ident("b".to_string()),
                TokenKind::BangEq,
                TokenKind::Bang,
                TokenKind::Ident("c".to_string()),
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_literals_support_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"\n""#),
            vec![TokenKind::String("say \"hi\"\n".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn tokens_carry_their_start_location() {
        let tokens = tokenize("state\n  Idle").expect("tokenize");
        assert_eq!(tokens[0].location, SourceLocation::new(1, 1));
        assert_eq!(tokens[1].location, SourceLocation::new(2, 3));
    }

    #[test]
    fn unterminated_constructs_report_their_opening_location() {
        let error = tokenize("x = \"open").expect_err("unterminated string");
        assert_eq!(error.location(), Some(SourceLocation::new(1, 5)));

        let error = tokenize("a\n/* never closed").expect_err("unterminated comment");
        assert_eq!(error.location(), Some(SourceLocation::new(2, 1)));
        assert_eq!(error.code(), "PARSE_ERROR");
    }

    #[test]
    fn stray_characters_are_rejected() {
        let error = tokenize("a & b").expect_err("single ampersand");
        assert!(error.to_string().contains("unexpected character '&'"));
        let error = tokenize("99999999999999999999").expect_err("overflow");
        assert!(error.to_string().contains("out of range"));
    }
}
