use std::collections::BTreeMap;

use cantal_core::{
    AssignTarget, BinaryOp, BlockId, CantalError, ConstantDecl, EventName, Expr, Orientation,
    Register, RegisterSpace, Script, SourceLocation, State, Statement, StatementBlock, UnaryOp,
    Value, VariableDecl,
};

use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

/// Parses a whole CantalScript file.
///
/// Parsing is deterministic: the same text always yields an equal [`Script`],
/// with statement blocks numbered in the order their opening braces appear.
pub fn parse_script(source: &str) -> Result<Script, CantalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        script: Script::default(),
    };
    parser.parse_declarations()?;
    Ok(parser.script)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    script: Script,
}

impl Parser {
    // Token helpers

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn location(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|token| token.location)
            .unwrap_or_else(SourceLocation::synthetic)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), CantalError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(self.unexpected(&expected.to_string()))
    }

    fn expect_ident(&mut self) -> Result<String, CantalError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CantalError {
        CantalError::parse(
            format!("expected {}, found {}", expected, self.peek()),
            self.location(),
        )
    }

    // Declarations

    fn parse_declarations(&mut self) -> Result<(), CantalError> {
        loop {
            match self.peek() {
                TokenKind::Eof => return Ok(()),
                TokenKind::Const => self.parse_constant()?,
                TokenKind::Var | TokenKind::Saved => self.parse_variable()?,
                TokenKind::State => self.parse_state()?,
                _ => return Err(self.unexpected("\"const\", \"var\", \"saved\" or \"state\"")),
            }
        }
    }

    fn ensure_unique_name(&self, name: &str, location: SourceLocation) -> Result<(), CantalError> {
        let kind = if self.script.constant(name).is_some() {
            "constant"
        } else if self.script.variable(name).is_some() {
            "variable"
        } else {
            return Ok(());
        };
        Err(CantalError::DuplicateDeclaration {
            kind,
            name: name.to_string(),
            location,
        })
    }

    fn parse_constant(&mut self) -> Result<(), CantalError> {
        let location = self.location();
        self.expect(&TokenKind::Const)?;
        let name = self.expect_ident()?;
        self.ensure_unique_name(&name, location)?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_literal()?;
        self.expect(&TokenKind::Semicolon)?;
        self.script.constants.push(ConstantDecl {
            name,
            value,
            location,
        });
        Ok(())
    }

    fn parse_variable(&mut self) -> Result<(), CantalError> {
        let location = self.location();
        let persisted = self.eat(&TokenKind::Saved);
        self.expect(&TokenKind::Var)?;
        let name = self.expect_ident()?;
        self.ensure_unique_name(&name, location)?;
        let default = if self.eat(&TokenKind::Assign) {
            Some(self.parse_literal()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;
        self.script.variables.push(VariableDecl {
            name,
            persisted,
            default,
            location,
        });
        Ok(())
    }

    fn parse_literal(&mut self) -> Result<Value, CantalError> {
        let location = self.location();
        match self.advance() {
            TokenKind::Int(value) => Ok(Value::Int(value)),
            TokenKind::Minus => match self.advance() {
                TokenKind::Int(value) => Ok(Value::Int(-value)),
                _ => Err(CantalError::parse("expected integer after \"-\"", location)),
            },
            TokenKind::String(value) => Ok(Value::String(value)),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            TokenKind::Ident(name) => name
                .parse::<Orientation>()
                .map(Value::Orientation)
                .map_err(|_| {
                    CantalError::parse(
                        format!("expected literal value, found identifier \"{}\"", name),
                        location,
                    )
                }),
            other => Err(CantalError::parse(
                format!("expected literal value, found {}", other),
                location,
            )),
        }
    }

    fn parse_state(&mut self) -> Result<(), CantalError> {
        let location = self.location();
        self.expect(&TokenKind::State)?;
        let name = self.expect_ident()?;
        if self.script.state(&name).is_some() {
            return Err(CantalError::DuplicateDeclaration {
                kind: "state",
                name,
                location,
            });
        }
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;

        let open = self.location();
        self.expect(&TokenKind::LBrace)?;
        let mut events = BTreeMap::new();
        loop {
            match self.peek() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(CantalError::parse(
                        format!("unterminated state \"{}\"", name),
                        open,
                    ))
                }
                _ => {}
            }

            let event_location = self.location();
            self.expect(&TokenKind::Event)?;
            let event_name = self.expect_ident()?;
            let event = event_name
                .parse::<EventName>()
                .map_err(|_| CantalError::UnknownEvent {
                    name: event_name.clone(),
                    location: event_location,
                })?;
            if events.contains_key(&event) {
                return Err(CantalError::DuplicateEvent {
                    name: event_name,
                    state: name,
                    location: event_location,
                });
            }
            self.expect(&TokenKind::LParen)?;
            self.expect(&TokenKind::RParen)?;
            let block = self.parse_block()?;
            events.insert(event, block);
        }

        self.script.states.push(State {
            name,
            condition,
            events,
            location,
        });
        Ok(())
    }

    // Statements

    fn parse_block(&mut self) -> Result<BlockId, CantalError> {
        let open = self.location();
        self.expect(&TokenKind::LBrace)?;

        let id = BlockId(self.script.blocks.len());
        self.script.blocks.push(StatementBlock::default());

        let mut statements = Vec::new();
        loop {
            match self.peek() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => return Err(CantalError::parse("unterminated block", open)),
                _ => statements.push(self.parse_statement()?),
            }
        }

        self.script.blocks[id.0] = StatementBlock { statements };
        Ok(id)
    }

    fn parse_statement(&mut self) -> Result<Statement, CantalError> {
        let location = self.location();
        if self.at(&TokenKind::If) {
            return self.parse_if();
        }

        let name = self.expect_ident()?;
        let statement = match self.peek() {
            TokenKind::LParen => {
                let args = self.parse_call_args()?;
                Statement::Call {
                    name,
                    args,
                    location,
                }
            }
            TokenKind::LBracket => {
                let register = self.parse_register_key(&name, location)?;
                self.expect(&TokenKind::Assign)?;
                Statement::Affectation {
                    target: AssignTarget::Register { register },
                    value: self.parse_expr()?,
                    location,
                }
            }
            TokenKind::Assign => {
                self.advance();
                Statement::Affectation {
                    target: AssignTarget::Symbol { name },
                    value: self.parse_expr()?,
                    location,
                }
            }
            _ => return Err(self.unexpected("\"(\", \"[\" or \"=\"")),
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(statement)
    }

    fn parse_if(&mut self) -> Result<Statement, CantalError> {
        let location = self.location();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let then_block = self.parse_block()?;

        let else_block = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                // `else if` becomes an else block holding the nested if.
                let id = BlockId(self.script.blocks.len());
                self.script.blocks.push(StatementBlock::default());
                let nested = self.parse_if()?;
                self.script.blocks[id.0] = StatementBlock {
                    statements: vec![nested],
                };
                Some(id)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_block,
            else_block,
            location,
        })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, CantalError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_register_key(
        &mut self,
        keyword: &str,
        location: SourceLocation,
    ) -> Result<Register, CantalError> {
        let space = RegisterSpace::from_keyword(keyword).ok_or_else(|| {
            CantalError::parse(format!("\"{}\" is not a register space", keyword), location)
        })?;
        self.expect(&TokenKind::LBracket)?;
        let key = match self.advance() {
            TokenKind::Ident(key) | TokenKind::String(key) => key,
            other => {
                return Err(CantalError::parse(
                    format!("expected register key, found {}", other),
                    location,
                ))
            }
        };
        self.expect(&TokenKind::RBracket)?;
        Ok(Register::new(space, key))
    }

    // Expressions, lowest precedence first

    fn parse_expr(&mut self) -> Result<Expr, CantalError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, CantalError> {
        let condition = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then_expr = self.parse_ternary()?;
        self.expect(&TokenKind::Colon)?;
        let else_expr = self.parse_ternary()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, CantalError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CantalError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::AmpAmp) {
            let rhs = self.parse_not()?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, CantalError> {
        if self.eat(&TokenKind::Bang) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expr, CantalError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::BangEq => BinaryOp::NotEqual,
                TokenKind::Lt => BinaryOp::Less,
                TokenKind::LtEq => BinaryOp::LessEqual,
                TokenKind::Gt => BinaryOp::Greater,
                TokenKind::GtEq => BinaryOp::GreaterEqual,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CantalError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CantalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CantalError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        if op == UnaryOp::Negate {
            if let TokenKind::Int(value) = *self.peek() {
                self.advance();
                return Ok(Expr::literal(-value));
            }
        }
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, CantalError> {
        let location = self.location();
        match self.peek().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::literal(value))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::literal(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::literal(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::literal(false))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                match self.peek() {
                    TokenKind::LParen => {
                        let args = self.parse_call_args()?;
                        Ok(Expr::Call { name, args })
                    }
                    TokenKind::LBracket if matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::String(_)) => {
                        let register = self.parse_register_key(&name, location)?;
                        Ok(Expr::Register { register })
                    }
                    _ => match name.parse::<Orientation>() {
                        Ok(orientation) => Ok(Expr::literal(orientation)),
                        Err(()) => Ok(Expr::symbol(name)),
                    },
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
