use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orientation {
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Right => "RIGHT",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
        }
    }

    /// Tile offset of one step in this direction, y growing downwards.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }
}

impl FromStr for Orientation {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|orientation| orientation.as_str() == raw)
            .ok_or(())
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime value of a CantalScript expression.
///
/// The four literal kinds plus `Absent`, the result of reading a register or
/// symbol that holds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Orientation(Orientation),
    #[default]
    Absent,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_orientation(&self) -> Option<Orientation> {
        match self {
            Self::Orientation(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(value) => *value != 0,
            Self::Bool(value) => *value,
            Self::String(value) => !value.is_empty(),
            Self::Orientation(_) => true,
            Self::Absent => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::Orientation(_) => "orientation",
            Self::Absent => "absent",
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::String(value) => value.clone(),
            Self::Orientation(value) => value.as_str().to_string(),
            Self::Absent => String::new(),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Orientation> for Value {
    fn from(value: Orientation) -> Self {
        Self::Orientation(value)
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn truthiness_treats_absent_and_zero_values_as_false() {
        assert!(!Value::Absent.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Orientation(Orientation::Left).is_truthy());
    }

    #[test]
    fn to_text_renders_every_kind() {
        assert_eq!(Value::Int(42).to_text(), "42");
        assert_eq!(Value::Bool(true).to_text(), "true");
        assert_eq!(Value::Orientation(Orientation::Down).to_text(), "DOWN");
        assert_eq!(Value::Absent.to_text(), "");
    }

    #[test]
    fn orientation_parses_only_uppercase_keywords() {
        assert_eq!("RIGHT".parse::<Orientation>(), Ok(Orientation::Right));
        assert!("right".parse::<Orientation>().is_err());
        assert_eq!(Orientation::Up.delta(), (0, -1));
    }

    #[test]
    fn value_serializes_with_kind_tag() {
        let raw = serde_json::to_string(&Value::Orientation(Orientation::Up)).expect("serialize");
        assert_eq!(raw, r#"{"kind":"orientation","value":"UP"}"#);
        let back: Value = serde_json::from_str(r#"{"kind":"int","value":7}"#).expect("deserialize");
        assert_eq!(back, Value::Int(7));
        let absent: Value = serde_json::from_str(r#"{"kind":"absent"}"#).expect("absent");
        assert!(absent.is_absent());
    }
}
