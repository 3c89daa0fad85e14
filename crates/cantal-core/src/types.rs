use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn synthetic() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    Spawn,
    ActionPressed,
    CharacterEnteredTile,
    CharacterTouchEvent,
    Loop,
    EnterState,
}

impl EventName {
    pub const ALL: [EventName; 6] = [
        Self::Spawn,
        Self::ActionPressed,
        Self::CharacterEnteredTile,
        Self::CharacterTouchEvent,
        Self::Loop,
        Self::EnterState,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::ActionPressed => "actionPressed",
            Self::CharacterEnteredTile => "characterEnteredTile",
            Self::CharacterTouchEvent => "characterTouchEvent",
            Self::Loop => "loop",
            Self::EnterState => "enterState",
        }
    }
}

impl FromStr for EventName {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == raw)
            .ok_or(())
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegisterSpace {
    Parameters,
    Variables,
    SavedVariables,
    MessageParameters,
}

impl RegisterSpace {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "parameters" => Some(Self::Parameters),
            "variables" => Some(Self::Variables),
            "savedVariables" => Some(Self::SavedVariables),
            "messageParameters" => Some(Self::MessageParameters),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Parameters => "parameters",
            Self::Variables => "variables",
            Self::SavedVariables => "savedVariables",
            Self::MessageParameters => "messageParameters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    pub space: RegisterSpace,
    pub key: String,
}

impl Register {
    pub fn new(space: RegisterSpace, key: impl Into<String>) -> Self {
        Self {
            space,
            key: key.into(),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.space.keyword(), self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Symbol {
        name: String,
    },
    Register {
        register: Register,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol { name: name.into() }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssignTarget {
    Register { register: Register },
    Symbol { name: String },
}

/// Index of a statement block inside [`Script::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Statement {
    Call {
        name: String,
        args: Vec<Expr>,
        location: SourceLocation,
    },
    Affectation {
        target: AssignTarget,
        value: Expr,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_block: BlockId,
        else_block: Option<BlockId>,
        location: SourceLocation,
    },
}

impl Statement {
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::Call { location, .. }
            | Self::Affectation { location, .. }
            | Self::If { location, .. } => *location,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementBlock {
    pub statements: Vec<Statement>,
}

impl StatementBlock {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub name: String,
    pub value: Value,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub persisted: bool,
    pub default: Option<Value>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub condition: Expr,
    pub events: BTreeMap<EventName, BlockId>,
    pub location: SourceLocation,
}

/// A parsed CantalScript file. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub constants: Vec<ConstantDecl>,
    pub variables: Vec<VariableDecl>,
    pub states: Vec<State>,
    pub blocks: Vec<StatementBlock>,
}

impl Script {
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants
            .iter()
            .find(|constant| constant.name == name)
            .map(|constant| &constant.value)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|state| state.name == name)
    }

    pub fn block(&self, id: BlockId) -> Option<&StatementBlock> {
        self.blocks.get(id.0)
    }

    pub fn has_saved_variables(&self) -> bool {
        self.variables.iter().any(|variable| variable.persisted)
    }

    /// Every function name called anywhere in the script, as statement or value.
    pub fn called_functions(&self) -> Vec<(String, SourceLocation)> {
        let mut calls = Vec::new();
        for state in &self.states {
            collect_expr_calls(&state.condition, state.location, &mut calls);
        }
        for block in &self.blocks {
            for statement in &block.statements {
                let location = statement.location();
                match statement {
                    Statement::Call { name, args, .. } => {
                        calls.push((name.clone(), location));
                        for arg in args {
                            collect_expr_calls(arg, location, &mut calls);
                        }
                    }
                    Statement::Affectation { value, .. } => {
                        collect_expr_calls(value, location, &mut calls)
                    }
                    Statement::If { condition, .. } => {
                        collect_expr_calls(condition, location, &mut calls)
                    }
                }
            }
        }
        calls
    }
}

fn collect_expr_calls(expr: &Expr, location: SourceLocation, out: &mut Vec<(String, SourceLocation)>) {
    match expr {
        Expr::Literal { .. } | Expr::Symbol { .. } | Expr::Register { .. } => {}
        Expr::Call { name, args } => {
            out.push((name.clone(), location));
            for arg in args {
                collect_expr_calls(arg, location, out);
            }
        }
        Expr::Unary { operand, .. } => collect_expr_calls(operand, location, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr_calls(lhs, location, out);
            collect_expr_calls(rhs, location, out);
        }
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
        } => {
            collect_expr_calls(condition, location, out);
            collect_expr_calls(then_expr, location, out);
            collect_expr_calls(else_expr, location, out);
        }
    }
}
